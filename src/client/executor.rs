use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A single outbound call: method, URL, headers, query parameters and an
/// optional JSON body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, access_token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", access_token))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header value (case-insensitive name match).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter value.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status code plus decoded body. Bodies that are not JSON are kept as a
/// string value; empty bodies decode to `null`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Decode a raw response body into a JSON value.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExecutorError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExecutorError> {
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req = req.header("Accept", "application/json");
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ExecutorError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutorError::Body(e.to_string()))?;

        Ok(HttpResponse::new(status, decode_body(&text)))
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, ExecutorError> + Send + Sync>;

    /// Executor that answers every call through a closure and records what
    /// it was asked to do.
    pub struct MockExecutor {
        handler: Handler,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockExecutor {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, ExecutorError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Requests whose method matches and whose URL contains `fragment`.
        pub fn matching(&self, method: HttpMethod, fragment: &str) -> Vec<HttpRequest> {
            self.requests()
                .into_iter()
                .filter(|r| r.method == method && r.url.contains(fragment))
                .collect()
        }
    }

    #[async_trait]
    impl RequestExecutor for MockExecutor {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExecutorError> {
            let response = (self.handler)(&request);
            self.requests.lock().unwrap().push(request);
            response
        }
    }
}
