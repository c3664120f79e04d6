//! JSON-over-HTTP client for the dispatcher.
//!
//! Every remote operation goes through [`RpcClient::invoke`]; operations only
//! differ in path, request shape and response shape.

use phantom_core::protocol::{Operation, PING_PATH};
use phantom_core::{Error, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Connection to one dispatcher. Cheap to clone; clones share the HTTP pool.
#[derive(Debug, Clone)]
pub struct RpcClient {
    base_url: String,
    http: Client,
    timeout: Option<Duration>,
}

impl RpcClient {
    /// Client for `http://localhost:<port>`.
    pub fn new(port: u16) -> Self {
        Self::with_base_url(base_url(port))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
            timeout: None,
        }
    }

    /// Bound every request issued by this client. The dispatcher itself
    /// never times out an operation.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness probe: `GET /ping` must answer 200.
    pub async fn ping(&self) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, PING_PATH))
            .send()
            .await
            .map_err(|e| transport_error(PING_PATH, e))?;
        if resp.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Send a typed operation as a POST with a JSON body.
    pub async fn call<O: Operation>(&self, request: &O::Request) -> Result<O::Response> {
        self.invoke(Method::POST, O::PATH, Some(request)).await
    }

    /// Send a typed operation that takes no request body.
    pub async fn call_empty<O: Operation>(&self) -> Result<O::Response> {
        self.invoke::<(), O::Response>(Method::POST, O::PATH, None).await
    }

    /// Send `body` (if any) as JSON to `path` and decode the JSON reply.
    ///
    /// An empty reply decodes as JSON `null`, so `Resp = ()` accepts
    /// operations that return nothing while struct responses reject it.
    pub async fn invoke<Req, Resp>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            let encoded = serde_json::to_vec(body)?;
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(encoded);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        debug!(method = %method, path, "RPC request");
        let response = request.send().await.map_err(|e| transport_error(path, e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(path, e))?;

        match status {
            StatusCode::NOT_FOUND => return Err(Error::NotFound(path.to_string())),
            StatusCode::INTERNAL_SERVER_ERROR => {
                return Err(Error::Remote(String::from_utf8_lossy(&bytes).into_owned()))
            }
            s if !s.is_success() => {
                return Err(Error::UnexpectedStatus {
                    status: s.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            _ => {}
        }

        let raw: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(raw)
            .map_err(|e| Error::Protocol(format!("{}: invalid response body: {}", path, e)))
    }
}

pub(crate) fn base_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

fn transport_error(path: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{}: {}", path, e))
    } else {
        Error::Transport(format!("{}: {}", path, e))
    }
}
