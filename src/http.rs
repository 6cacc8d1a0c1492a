//! HTTP access to the local web application.
//!
//! The transport passes every status code through to the caller; only
//! transport failures (connection refused, timeout) are errors. Callers decide
//! what a non-2xx status means.
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::time::{Duration, Instant};

pub const USER_AGENT: &str = "DreamFactory-Installer/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).context("parse response body as JSON")
    }

    /// Parse the body as JSON, failing on any non-2xx status.
    pub fn require_success(&self, what: &str) -> Result<Value> {
        if !self.is_success() {
            return Err(anyhow!(
                "{what} failed with HTTP {}: {}",
                self.status,
                crate::util::truncate_string(self.body.trim(), 500)
            ));
        }
        self.json().with_context(|| format!("{what} returned invalid JSON"))
    }
}

pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let start = Instant::now();
        let result = match (&request.method, &request.body) {
            (Method::Get, _) => {
                let mut builder = self
                    .agent
                    .get(request.url.as_str())
                    .config()
                    .timeout_global(Some(request.timeout))
                    .build()
                    .header("User-Agent", USER_AGENT);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            (Method::Post, body) => {
                let mut builder = self
                    .agent
                    .post(request.url.as_str())
                    .config()
                    .timeout_global(Some(request.timeout))
                    .build()
                    .header("User-Agent", USER_AGENT);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let body = body.clone().unwrap_or(Value::Null);
                builder.send_json(&body)
            }
        };
        let mut response =
            result.map_err(|err| anyhow!("{:?} {}: {err}", request.method, request.url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("read response body from {}", request.url))?;

        tracing::debug!(
            method = ?request.method,
            url = %request.url,
            status,
            elapsed_ms = start.elapsed().as_millis(),
            "http request complete"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
