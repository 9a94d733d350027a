//! Request interceptors.
//!
//! Interceptors rewrite outgoing requests before they reach the wire. They are
//! attached to one transport through [`Intercepted`], and run on both the plain
//! request path and the upload path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::transport::Transport;
use crate::types::{insert_header, HttpResponse, RequestDescriptor, UploadRequest};

/// Mutable view shared by every kind of outgoing request.
pub trait Interceptable {
    fn url_mut(&mut self) -> &mut String;
    fn headers_mut(&mut self) -> &mut HashMap<String, String>;
    fn set_timeout(&mut self, timeout: Duration);
}

impl Interceptable for RequestDescriptor {
    fn url_mut(&mut self) -> &mut String {
        &mut self.url
    }

    fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}

impl Interceptable for UploadRequest {
    fn url_mut(&mut self) -> &mut String {
        &mut self.url
    }

    fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}

/// A pre-request hook.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &mut dyn Interceptable);
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Prefixes relative addresses with a base URL.
#[derive(Debug, Clone)]
pub struct BaseUrl {
    base: String,
}

impl BaseUrl {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, url: &str) -> String {
        if is_absolute(url) {
            return url.to_string();
        }
        if url.is_empty() {
            return self.base.clone();
        }
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

impl Interceptor for BaseUrl {
    fn intercept(&self, request: &mut dyn Interceptable) {
        let resolved = self.resolve(request.url_mut());
        *request.url_mut() = resolved;
    }
}

/// Forces every request onto the same timeout.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeout(pub Duration);

impl Interceptor for FixedTimeout {
    fn intercept(&self, request: &mut dyn Interceptable) {
        request.set_timeout(self.0);
    }
}

/// Injects one fixed header, overriding any caller-supplied value.
#[derive(Debug, Clone)]
pub struct StaticHeader {
    name: String,
    value: String,
}

impl StaticHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Interceptor for StaticHeader {
    fn intercept(&self, request: &mut dyn Interceptable) {
        insert_header(request.headers_mut(), self.name.clone(), self.value.clone());
    }
}

/// Source of bearer tokens for [`Authorization`].
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Provider for deployments without authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Adds an `Authorization` header whenever the provider has a token.
pub struct Authorization<P> {
    provider: P,
}

impl<P: TokenProvider> Authorization<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: TokenProvider> Interceptor for Authorization<P> {
    fn intercept(&self, request: &mut dyn Interceptable) {
        if let Some(token) = self.provider.token() {
            insert_header(request.headers_mut(), "Authorization", token);
        }
    }
}

/// A transport with an interceptor chain in front of it.
pub struct Intercepted<T> {
    inner: T,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<T: Transport> Intercepted<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor. Interceptors run in registration order.
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn with_all(mut self, interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn apply(&self, request: &mut dyn Interceptable) {
        for interceptor in &self.interceptors {
            interceptor.intercept(request);
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for Intercepted<T> {
    async fn request(&self, mut request: RequestDescriptor) -> Result<HttpResponse, Error> {
        self.apply(&mut request);
        self.inner.request(request).await
    }

    async fn upload(&self, mut request: UploadRequest) -> Result<HttpResponse, Error> {
        self.apply(&mut request);
        self.inner.upload(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        requests: Mutex<Vec<RequestDescriptor>>,
        uploads: Mutex<Vec<UploadRequest>>,
    }

    #[async_trait]
    impl Transport for Capture {
        async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse::json(200, serde_json::Value::Null))
        }

        async fn upload(&self, request: UploadRequest) -> Result<HttpResponse, Error> {
            self.uploads.lock().unwrap().push(request);
            Ok(HttpResponse::json(200, serde_json::Value::Null))
        }
    }

    #[test]
    fn base_url_prefixes_relative_paths() {
        let base = BaseUrl::new("https://api.example.com/v1/");
        assert_eq!(base.resolve("/users"), "https://api.example.com/v1/users");
        assert_eq!(base.resolve("users"), "https://api.example.com/v1/users");
        assert_eq!(base.resolve(""), "https://api.example.com/v1/");
    }

    #[test]
    fn base_url_leaves_absolute_urls_alone() {
        let base = BaseUrl::new("https://api.example.com");
        assert_eq!(base.resolve("http://other.test/x"), "http://other.test/x");
        assert_eq!(base.resolve("https://other.test/x"), "https://other.test/x");
    }

    #[test]
    fn authorization_skipped_without_token() {
        let mut request = RequestDescriptor::get("/me");
        Authorization::new(NoToken).intercept(&mut request);
        assert!(!request.headers.contains_key("Authorization"));

        Authorization::new(|| Some("Bearer abc".to_string())).intercept(&mut request);
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer abc".to_string())
        );
    }

    #[test]
    fn static_header_overrides_caller_spelling() {
        let mut request = RequestDescriptor::get("/users")
            .with_header("x-client-source", "spoofed")
            .with_header("authorization", "Bearer stale");

        StaticHeader::new("X-Client-Source", "fetchcell").intercept(&mut request);
        Authorization::new(|| Some("Bearer fresh".to_string())).intercept(&mut request);

        assert_eq!(request.headers.len(), 2);
        assert_eq!(
            request.headers.get("X-Client-Source"),
            Some(&"fetchcell".to_string())
        );
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer fresh".to_string())
        );
    }

    #[tokio::test]
    async fn chain_applies_to_requests_and_uploads() {
        let capture = Arc::new(Capture::default());
        let transport = Intercepted::new(capture.clone())
            .with(BaseUrl::new("https://api.example.com"))
            .with(FixedTimeout(Duration::from_secs(10)))
            .with(StaticHeader::new("X-Client-Source", "fetchcell"));

        transport
            .request(RequestDescriptor::get("/users").with_timeout(Duration::from_secs(99)))
            .await
            .unwrap();
        transport
            .upload(UploadRequest::new("/files", "/tmp/report.csv", "file"))
            .await
            .unwrap();

        let requests = capture.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://api.example.com/users");
        assert_eq!(requests[0].timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            requests[0].headers.get("X-Client-Source"),
            Some(&"fetchcell".to_string())
        );

        let uploads = capture.uploads.lock().unwrap();
        assert_eq!(uploads[0].url, "https://api.example.com/files");
        assert_eq!(uploads[0].timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            uploads[0].headers.get("X-Client-Source"),
            Some(&"fetchcell".to_string())
        );
    }
}
