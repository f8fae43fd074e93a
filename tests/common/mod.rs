//! Scripted HTTP fixture server for integration tests.
#![allow(dead_code)] // each test binary uses a different slice of this
//!
//! Binds an ephemeral local port and answers one connection per scripted
//! response, in order. Requests are recorded so tests can assert on the
//! wire format the client produced.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// One canned response.
pub struct Script {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Script {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Script {
            status,
            content_type: "application/json",
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn sse(body: impl Into<String>) -> Self {
        Script {
            status: 200,
            content_type: "text/event-stream",
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// What the client actually sent.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("recorded body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct Fixture {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Fixture {
    pub async fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().await.clone()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

async fn read_request(sock: &mut TcpStream) -> Recorded {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut buf).await.expect("read request");
        if n == 0 {
            break raw.len();
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name.to_string(), value));
        }
    }

    let mut body = raw[header_end..].to_vec();
    while body.len() < content_length {
        let n = sock.read(&mut buf).await.expect("read body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    Recorded {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

/// Starts a fixture answering `scripts` in order, one connection each.
pub async fn serve(scripts: Vec<Script>) -> Fixture {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    tokio::spawn(async move {
        for script in scripts {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let req = read_request(&mut sock).await;
            recorded.lock().await.push(req);

            let mut extra = String::new();
            for (name, value) in &script.headers {
                extra.push_str(&format!("{name}: {value}\r\n"));
            }
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: {}\r\ncontent-length: {}\r\n{}connection: close\r\n\r\n{}",
                script.status,
                reason(script.status),
                script.content_type,
                script.body.len(),
                extra,
                script.body,
            );
            let _ = sock.write_all(response.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });

    Fixture {
        base_url: format!("http://{addr}/v1"),
        requests,
    }
}

/// An engine wired to the fixture with lenient decoding and fast retry.
pub fn engine_for(
    base_url: &str,
    mode: omnigen::DecodeMode,
) -> omnigen::Engine<omnigen::prelude::ChatAdapter> {
    use omnigen::prelude::*;
    use omnigen::RetryConfig;
    use std::time::Duration;

    let transport = Transport::new()
        .with_header("Authorization", "Bearer test-key")
        .expect("auth header")
        .with_retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(10)),
        );
    let provider = Provider::new(transport, Codec::new(mode), base_url)
        .with_model(Some("test-model".to_string()))
        .with_api_key_url("https://example.com/keys");
    Engine::new(provider, ChatAdapter::new())
}
