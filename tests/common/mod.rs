//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kaze_light::net::Transport;
use kaze_light::{KazeError, KazeResult};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const PRIVATE_KEY: &str = "9ab7e154840daca3a2efadaf0df93cd3a5b51768c632f5433f86909d9b994a69";
pub const ADDRESS: &str = "KC74MjETUTAc5qv3fqL1UiyP9DRqeQgWSR";

/// In-memory transport: GET by URL, POST by `url#method`.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Result<Value, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str, body: Value) -> &Self {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(body));
        self
    }

    pub fn rpc(&self, url: &str, method: &str, result: Value) -> &Self {
        let envelope = json!({"jsonrpc": "2.0", "id": 1234, "result": result});
        self.routes.lock().unwrap().insert(format!("{}#{}", url, method), Ok(envelope));
        self
    }

    pub fn fail(&self, key: &str, message: &str) -> &Self {
        self.routes.lock().unwrap().insert(key.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, key: String) -> KazeResult<Value> {
        self.calls.lock().unwrap().push(key.clone());
        match self.routes.lock().unwrap().get(&key) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(message)) => Err(KazeError::Transport(message.clone())),
            None => Err(KazeError::Transport(format!("no route for {}", key))),
        }
    }
}

impl Transport for MockTransport {
    fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send {
        let result = self.answer(url.to_string());
        async move { result }
    }

    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send {
        let method = body["method"].as_str().unwrap_or_default().to_string();
        let result = self.answer(format!("{}#{}", url, method));
        async move { result }
    }
}

/// What the programmable backend saw.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl MockRequest {
    /// JSON-RPC method of a POST body, if any.
    pub fn rpc_method(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| v["method"].as_str().map(str::to_string))
    }
}

/// Start a programmable HTTP backend on an ephemeral port and return its address.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(MockRequest { method, path, body })
}
