//! HTTP JSON capability.
//!
//! # Responsibilities
//! - `GET url → JSON` and `POST url, JSON → JSON`, nothing more
//! - Apply the request timeout to every call
//!
//! Providers and the RPC client are generic over [`Transport`], so tests
//! can substitute an in-memory implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::resilience::with_timeout;
use crate::types::{KazeError, KazeResult};

pub trait Transport: Send + Sync {
    fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send;

    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send {
        (**self).get_json(url)
    }

    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send {
        (**self).post_json(url, body)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send {
        (**self).get_json(url)
    }

    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send {
        (**self).post_json(url, body)
    }
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn decode(response: reqwest::Response) -> KazeResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(KazeError::Transport(format!(
                "{} returned HTTP {}",
                response.url(),
                status
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| KazeError::UnexpectedResponse(format!("body is not JSON: {}", e)))
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send {
        let request = self.client.get(url);
        with_timeout(self.timeout, async move {
            let response = request.send().await.map_err(|e| KazeError::Transport(e.to_string()))?;
            Self::decode(response).await
        })
    }

    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send {
        let request = self.client.post(url).json(body);
        with_timeout(self.timeout, async move {
            let response = request.send().await.map_err(|e| KazeError::Transport(e.to_string()))?;
            Self::decode(response).await
        })
    }
}

/// In-memory transport for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;

    /// GET routes are keyed by URL. RPC routes are keyed by
    /// `url#method#first-param`, falling back to `url#method`. Calls are
    /// recorded as `url` or `url#method`.
    #[derive(Default)]
    pub struct StaticTransport {
        routes: Mutex<HashMap<String, Result<Value, String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on_get(&self, url: &str, body: Value) -> &Self {
            self.insert(url.to_string(), Ok(body))
        }

        pub fn on_rpc(&self, url: &str, method: &str, result: Value) -> &Self {
            let envelope = json!({"jsonrpc": "2.0", "id": 1234, "result": result});
            self.insert(format!("{}#{}", url, method), Ok(envelope))
        }

        pub fn on_rpc_param(&self, url: &str, method: &str, param: &str, result: Value) -> &Self {
            let envelope = json!({"jsonrpc": "2.0", "id": 1234, "result": result});
            self.insert(format!("{}#{}#{}", url, method, param), Ok(envelope))
        }

        pub fn fail(&self, key: &str, message: &str) -> &Self {
            self.insert(key.to_string(), Err(message.to_string()))
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn insert(&self, key: String, value: Result<Value, String>) -> &Self {
            if let Ok(mut routes) = self.routes.lock() {
                routes.insert(key, value);
            }
            self
        }

        fn lookup(&self, keys: &[String]) -> KazeResult<Value> {
            if let (Ok(mut calls), Some(key)) = (self.calls.lock(), keys.last()) {
                calls.push(key.clone());
            }
            let routes = self.routes.lock().map_err(|_| KazeError::Transport("poisoned".into()))?;
            for key in keys {
                if let Some(found) = routes.get(key) {
                    return found.clone().map_err(KazeError::Transport);
                }
            }
            Err(KazeError::Transport(format!("no route for {}", keys[0])))
        }
    }

    impl Transport for StaticTransport {
        fn get_json(&self, url: &str) -> impl Future<Output = KazeResult<Value>> + Send {
            let result = self.lookup(&[url.to_string()]);
            async move { result }
        }

        fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = KazeResult<Value>> + Send {
            let method = body["method"].as_str().unwrap_or_default();
            let param = match &body["params"][0] {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            let result = self.lookup(&[
                format!("{}#{}#{}", url, method, param),
                format!("{}#{}", url, method),
            ]);
            async move { result }
        }
    }
}
