//! HTTP client abstraction for talking to the finance API.
//!
//! The stores only see the [HttpClient] trait, so tests can swap the network
//! for an in-memory fake of the API.

use std::fmt::Display;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::{
    Error,
    logging::{log_request, log_response},
    user::AuthToken,
};

/// The HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Read a resource or a page of resources.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };

        f.write_str(method)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request to the API.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The path relative to the API base URL, including any query string.
    pub path: String,
    /// The JSON body, if any.
    pub body: Option<Value>,
    /// The session token, sent as `Authorization: Bearer <token>`.
    pub token: Option<AuthToken>,
}

impl HttpRequest {
    /// A request without a body or token.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            token: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach the session token.
    pub fn with_token(mut self, token: &AuthToken) -> Self {
        self.token = Some(token.clone());
        self
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests against the API.
///
/// Implementations only report transport failures as errors. Any response,
/// including a non-2xx one, is returned as an [HttpResponse].
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Send `request` and wait for the response.
    ///
    /// # Errors
    /// Returns [Error::Network] if the request could not be sent or the
    /// response body could not be read.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestHttpClient {
    /// Create a client that sends requests to paths under `base_url`, e.g.
    /// `http://localhost:8000/api`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let url = format!("{}{}", self.base_url, request.path);
        log_request(request.method, &url, request.body.as_ref());

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &request.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.as_str()));
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(|error| {
            tracing::error!(url = %url, error = %error, "HTTP request failed");
            Error::Network(error.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| Error::Network(error.to_string()))?;

        log_response(status, &url, &body);

        Ok(HttpResponse { status, body })
    }
}
