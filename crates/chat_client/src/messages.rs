//! HTTP message types for the chat server. Client ↔ server JSON.

use serde::{Deserialize, Serialize};

/// Client → server: body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(message: &'a str, model: Option<&'a str>) -> Self {
        Self { message, model }
    }
}

/// Server → client: JSON body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Server → client: one `data: <json>` record of the chat stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Server → client: `GET /documents`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentList {
    pub total_chunks: usize,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Server → client: `POST /upload-pdf`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub chunks: usize,
}

/// One decoded stream record. `error` wins over `content` when both are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    Content(String),
    Error(String),
    Status(String),
    Empty,
}

impl From<StreamChunk> for StreamRecord {
    fn from(chunk: StreamChunk) -> Self {
        match chunk {
            StreamChunk {
                error: Some(e), ..
            } if !e.is_empty() => StreamRecord::Error(e),
            StreamChunk {
                content: Some(c), ..
            } if !c.is_empty() => StreamRecord::Content(c),
            StreamChunk {
                status: Some(s), ..
            } if !s.is_empty() => StreamRecord::Status(s),
            _ => StreamRecord::Empty,
        }
    }
}

impl StreamRecord {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let chunk: StreamChunk = serde_json::from_str(text)?;
        Ok(chunk.into())
    }
}
