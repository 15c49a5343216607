//! HTTP client: `POST /chat` (streamed), `GET /documents`, `POST /upload-pdf`.

use std::path::Path;

use futures_util::Stream;
use reqwest::{StatusCode, Url};

use crate::messages::{ChatRequest, DocumentList, ErrorBody, StreamRecord, UploadReceipt};
use crate::stream::decode_records;

/// Fallback detail when a failed response carries no usable `detail`.
pub const REQUEST_FAILED: &str = "Request failed";

/// Default chat endpoint path.
pub const DEFAULT_CHAT_PATH: &str = "/chat";

/// Client request/stream error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed stream record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid UTF-8 in stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client bound to one server.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    chat_path: String,
}

/// An accepted `POST /chat` response whose body has not been read yet.
pub struct ChatResponse {
    inner: reqwest::Response,
}

impl ChatResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Consume the body as a stream of decoded records, in arrival order.
    pub fn records(self) -> impl Stream<Item = Result<StreamRecord, ClientError>> {
        decode_records(self.inner.bytes_stream())
    }
}

impl Client {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            chat_path: DEFAULT_CHAT_PATH.to_string(),
        })
    }

    /// Override the chat endpoint path (default `/chat`).
    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Send a chat message. Non-2xx responses become `ClientError::Http`
    /// and their body is consumed; on success the body is left unread.
    pub async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ClientError> {
        let url = self.endpoint(&self.chat_path)?;
        tracing::info!(%url, "sending chat request");
        let response = self.http.post(url).json(request).send().await?;
        let response = check_status(response).await?;
        Ok(ChatResponse { inner: response })
    }

    /// List the document chunks the server has ingested.
    pub async fn documents(&self) -> Result<DocumentList, ClientError> {
        let url = self.endpoint("/documents")?;
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Upload a PDF for ingestion as multipart field `file`.
    pub async fn upload_pdf(&self, path: &Path) -> Result<UploadReceipt, ClientError> {
        let url = self.endpoint("/upload-pdf")?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".into());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        tracing::info!(%url, path = %path.display(), "uploading document");
        let response = check_status(self.http.post(url).multipart(form).send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into `ClientError::Http`, reading `detail` from
/// its JSON body when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| REQUEST_FAILED.to_string());
    tracing::debug!(%status, %detail, "request rejected");
    Err(ClientError::Http { status, detail })
}
