//! Mock transport for testing.
//!
//! Returns predefined responses based on request matching, and can hold a
//! request open until the test decides how it completes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::transport::Transport;
use crate::types::{HttpResponse, RequestDescriptor, UploadRequest};

type Reply = Result<HttpResponse, String>;

/// A mock transport that returns predefined responses.
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Responses keyed by request URL.
    responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
    /// Default response when no match found.
    default_response: Arc<Mutex<Option<HttpResponse>>>,
    /// Pending replies keyed by request URL, consumed in order.
    deferred: Arc<Mutex<HashMap<String, VecDeque<oneshot::Receiver<Reply>>>>>,
    /// Recorded requests for verification.
    recorded_requests: Arc<Mutex<Vec<RequestDescriptor>>>,
    /// Recorded uploads for verification.
    recorded_uploads: Arc<Mutex<Vec<UploadRequest>>>,
    /// Error message to fail every request with.
    failure: Arc<Mutex<Option<String>>>,
}

/// Completes one deferred request.
pub struct Responder {
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    /// Resolve the held request with `response`.
    pub fn respond(self, response: HttpResponse) {
        let _ = self.tx.send(Ok(response));
    }

    /// Fail the held request with a network error.
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response for a specific URL.
    pub fn with_response(self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.responses.lock().unwrap().insert(url.into(), response);
        self
    }

    /// Set a default response when no URL matches.
    pub fn with_default_response(self, response: HttpResponse) -> Self {
        *self.default_response.lock().unwrap() = Some(response);
        self
    }

    /// Configure to fail all requests with an error.
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.failure.lock().unwrap() = Some(message.into());
        self
    }

    /// Hold the next request to `url` open until the returned responder fires.
    ///
    /// Several deferrals for the same URL are handed out in call order. A
    /// responder dropped without firing fails its request.
    pub fn defer(&self, url: impl Into<String>) -> Responder {
        let (tx, rx) = oneshot::channel();
        self.deferred
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(rx);
        Responder { tx }
    }

    /// Get all recorded requests.
    pub fn recorded_requests(&self) -> Vec<RequestDescriptor> {
        self.recorded_requests.lock().unwrap().clone()
    }

    /// Get all recorded uploads.
    pub fn recorded_uploads(&self) -> Vec<UploadRequest> {
        self.recorded_uploads.lock().unwrap().clone()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.recorded_requests.lock().unwrap().len()
    }

    /// Clear recorded requests.
    pub fn clear_recorded(&self) {
        self.recorded_requests.lock().unwrap().clear();
        self.recorded_uploads.lock().unwrap().clear();
    }

    /// Create a success response wrapping `data` in the standard envelope.
    pub fn envelope(data: serde_json::Value) -> HttpResponse {
        HttpResponse::json(200, serde_json::json!({"code": "0", "msg": "ok", "data": data}))
    }

    /// Create an error response carrying `msg` in the standard envelope.
    pub fn error_envelope(status: u16, msg: &str) -> HttpResponse {
        HttpResponse::json(status, serde_json::json!({"code": status.to_string(), "msg": msg}))
    }

    /// Create a 404 Not Found response.
    pub fn not_found() -> HttpResponse {
        Self::error_envelope(404, "Not Found")
    }

    async fn reply_for(&self, url: &str) -> Result<HttpResponse, Error> {
        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(Error::Network { message });
        }

        let deferred = self
            .deferred
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        if let Some(rx) = deferred {
            return match rx.await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(message)) => Err(Error::Network { message }),
                Err(_) => Err(Error::Network {
                    message: "responder dropped".to_string(),
                }),
            };
        }

        let keyed = self.responses.lock().unwrap().get(url).cloned();
        if let Some(response) = keyed {
            return Ok(response);
        }

        let fallback = self.default_response.lock().unwrap().clone();
        Ok(fallback.unwrap_or_else(Self::not_found))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
        let url = request.url.clone();
        self.recorded_requests.lock().unwrap().push(request);
        self.reply_for(&url).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<HttpResponse, Error> {
        let url = request.url.clone();
        self.recorded_uploads.lock().unwrap().push(request);
        self.reply_for(&url).await
    }
}
