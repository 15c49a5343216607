//! Minimal in-process HTTP/1.1 server for integration tests. No mocks: the
//! client under test talks to a real socket.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: String,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What the server answers to every request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a chunked body; each element is written and flushed on its own.
    Stream { chunks: Vec<String>, delay: Duration },
    /// Fixed status and JSON body.
    Json { status: u16, body: String },
}

impl Reply {
    pub fn stream(chunks: &[&str]) -> Self {
        Reply::Stream {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay: Duration::from_millis(20),
        }
    }

    pub fn slow_stream(chunks: &[&str], delay: Duration) -> Self {
        Reply::Stream {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay,
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Reply::Json {
            status,
            body: body.to_string(),
        }
    }
}

pub struct TestServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

impl TestServer {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Bind to a free port and serve `reply` to every connection on the current runtime.
pub async fn spawn(reply: Reply) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(serve(listener, reply, requests.clone()));
    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

/// Same as `spawn`, on a dedicated thread with its own runtime (for CLI tests).
pub fn spawn_on_thread(reply: Reply) -> TestServer {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = std_listener.local_addr().unwrap().port();
    std_listener.set_nonblocking(true).unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = TcpListener::from_std(std_listener).unwrap();
            serve(listener, reply, captured).await;
        });
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

async fn serve(listener: TcpListener, reply: Reply, requests: Arc<Mutex<Vec<Captured>>>) {
    loop {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        let reply = reply.clone();
        let requests = requests.clone();
        tokio::spawn(async move {
            handle(tcp, reply, requests).await;
        });
    }
}

async fn handle(mut tcp: TcpStream, reply: Reply, requests: Arc<Mutex<Vec<Captured>>>) {
    let Some(request) = read_request(&mut tcp).await else {
        return;
    };
    requests.lock().unwrap().push(request);

    match reply {
        Reply::Json { status, body } => {
            let head = format!(
                "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = tcp.write_all(head.as_bytes()).await;
            let _ = tcp.write_all(body.as_bytes()).await;
        }
        Reply::Stream { chunks, delay } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if tcp.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                if tcp.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
                let _ = tcp.flush().await;
                tokio::time::sleep(delay).await;
            }
            let _ = tcp.write_all(b"0\r\n\r\n").await;
        }
    }
    let _ = tcp.flush().await;
    let _ = tcp.shutdown().await;
}

async fn read_request(tcp: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = tcp.read(&mut scratch).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&scratch[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = tcp.read(&mut scratch).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&scratch[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    Some(Captured {
        method,
        path,
        headers: head,
        body: buf[header_end..].to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A port with nothing listening on it.
pub fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
