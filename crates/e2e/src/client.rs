//! HTTP client for the system under test

use coursecheck_common::{HarnessConfig, HarnessError, HarnessResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// Raw response: status code plus parsed body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body; non-JSON text is kept as a string, an empty body is `null`
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }
}

/// Client bound to one base URL with a fixed per-call timeout and no retries
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HarnessError::Config(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HarnessError::Config(format!("header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| HarnessError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Issue one call. A call exceeding the timeout fails with `Timeout`;
    /// any non-2xx status is still returned as a response.
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> HarnessResult<ApiResponse> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.as_reqwest(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(method, &url, e))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify(method, &url, e))?;

        debug!("{} {} -> {}", method, url, status);
        Ok(ApiResponse::from_text(status, &text))
    }

    pub async fn get(&self, path: &str) -> HarnessResult<ApiResponse> {
        self.send(HttpMethod::Get, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> HarnessResult<ApiResponse> {
        self.send(HttpMethod::Post, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> HarnessResult<ApiResponse> {
        self.send(HttpMethod::Delete, path, None).await
    }

    fn classify(&self, method: HttpMethod, url: &str, err: reqwest::Error) -> HarnessError {
        if err.is_timeout() {
            HarnessError::Timeout {
                method: method.to_string(),
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            HarnessError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
