//! Transport abstraction.
//!
//! A [`Transport`] performs one network round-trip. The composable layer only
//! ever talks to this trait, so tests can substitute a scripted transport and
//! avoid real network calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};

use crate::error::Error;
use crate::types::{HttpResponse, RequestDescriptor, UploadRequest};

/// Default request timeout applied by [`ReqwestTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for performing HTTP round-trips.
///
/// Implementations resolve with the response for any status code the server
/// returned, and fail only when no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain request.
    async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse, Error>;

    /// Send a multipart file upload.
    async fn upload(&self, request: UploadRequest) -> Result<HttpResponse, Error> {
        Err(Error::Unsupported {
            operation: format!("upload to {}", request.url),
        })
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
        (**self).request(request).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<HttpResponse, Error> {
        (**self).upload(request).await
    }
}

/// Production transport using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport with the given default timeout.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(DEFAULT_TIMEOUT)
    }

    fn headers(headers: &HashMap<String, String>) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }
        Ok(map)
    }

    async fn send(builder: RequestBuilder) -> Result<HttpResponse, Error> {
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body_text = response.text().await?;
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

        Ok(HttpResponse {
            status,
            status_text,
            headers: resp_headers,
            body,
            body_text: Some(body_text),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
        let method: http::Method = request.method.into();

        let mut req_builder = self
            .client
            .request(method, &request.url)
            .headers(Self::headers(&request.headers)?);

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            req_builder = req_builder.json(body);
        }

        tracing::debug!(method = ?request.method, url = %request.url, "sending request");
        Self::send(req_builder).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<HttpResponse, Error> {
        let bytes = tokio::fs::read(&request.file_path).await?;
        let file_name = request
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let mut form = Form::new().part(
            request.field_name.clone(),
            Part::bytes(bytes).file_name(file_name),
        );
        for (name, value) in &request.form {
            form = form.text(name.clone(), value.clone());
        }

        let mut req_builder = self
            .client
            .post(&request.url)
            .headers(Self::headers(&request.headers)?)
            .multipart(form);

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        tracing::debug!(url = %request.url, file = %request.file_path.display(), "uploading file");
        Self::send(req_builder).await
    }
}
