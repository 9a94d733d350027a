//! Reactive request state.
//!
//! A [`UseRequest`] owns a handful of observable cells (progress, data,
//! response, error) and an `execute` family of methods that run a request
//! through a [`Transport`] and write the outcome into those cells.
//!
//! Calls may overlap. Each call captures the generation counter when it
//! starts, and only the most recently started call may move the progress
//! from loading to finished and fire `on_finish`. Whether a superseded call
//! still writes its outcome is decided by [`StalePolicy`].
//!
//! ```ignore
//! let users = UseRequest::<Vec<User>>::strict(
//!     transport,
//!     "/users",
//!     RequestConfig::new(),
//!     UseRequestOptions::new().initial_data(Vec::new()),
//! );
//!
//! let snapshot = users.execute().await?;
//! println!("{} users", snapshot.data.unwrap_or_default().len());
//! ```

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fetchcell_http::{Envelope, HttpResponse, RequestConfig, RequestDescriptor, Transport};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cell::Cell;
use crate::error::RequestError;
use crate::notify::{Notification, DEFAULT_ERROR_MESSAGE, NETWORK_ERROR_MESSAGE};
use crate::options::{StalePolicy, UseRequestOptions};

/// Where a request instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing has been executed yet.
    #[default]
    Idle,
    Loading,
    Finished,
}

/// Phase plus the generation of the latest started call.
///
/// Both live in one cell so that checking the generation and finishing is a
/// single atomic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub phase: Phase,
    pub generation: u64,
}

impl Progress {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

/// How an instance was constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// An address is bound; calls default to it and may override it.
    Strict { url: String, config: RequestConfig },
    /// No address is bound; every call must supply one.
    Easy { config: RequestConfig },
}

impl Binding {
    pub fn url(&self) -> Option<&str> {
        match self {
            Binding::Strict { url, .. } => Some(url),
            Binding::Easy { .. } => None,
        }
    }

    pub fn config(&self) -> &RequestConfig {
        match self {
            Binding::Strict { config, .. } | Binding::Easy { config } => config,
        }
    }
}

/// A point-in-time copy of every state cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot<T> {
    pub is_loading: bool,
    pub is_finished: bool,
    pub data: Option<T>,
    pub response: Option<HttpResponse>,
    pub error: Option<RequestError>,
}

/// What a completed call reports to callbacks and the notifier.
enum Outcome<T> {
    Succeeded(Option<T>),
    Failed { error: RequestError, message: String },
    /// 401: nothing to report.
    Silent,
}

struct Shared<T> {
    transport: Arc<dyn Transport>,
    /// Serializes state transitions between starting and completing calls.
    gate: Mutex<()>,
    binding: Binding,
    options: UseRequestOptions<T>,
    progress: Cell<Progress>,
    data: Cell<Option<T>>,
    response: Cell<Option<HttpResponse>>,
    error: Cell<Option<RequestError>>,
}

impl<T> Shared<T> {
    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Observable request state plus the operations that drive it.
///
/// Cloning is cheap; clones share the same state.
pub struct UseRequest<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for UseRequest<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> UseRequest<T>
where
    T: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an instance with an explicit [`Binding`].
    ///
    /// With `options.immediate` set and an address bound, the first call is
    /// started before this returns. Outside a Tokio runtime that call fails
    /// with [`RequestError::NoRuntime`] instead of being sent.
    pub fn new(
        transport: impl Transport + 'static,
        binding: Binding,
        options: UseRequestOptions<T>,
    ) -> Self {
        let shared = Shared {
            transport: Arc::new(transport),
            gate: Mutex::new(()),
            data: Cell::new(options.initial_data.clone()),
            progress: Cell::default(),
            response: Cell::default(),
            error: Cell::default(),
            binding,
            options,
        };
        let request = Self {
            shared: Arc::new(shared),
        };

        if request.shared.options.immediate && request.shared.binding.url().is_some() {
            // Outcome surfaces through the state cells.
            let _ = request.execute();
        }

        request
    }

    /// Bind `url`; calls default to it and `config`.
    pub fn strict(
        transport: impl Transport + 'static,
        url: impl Into<String>,
        config: RequestConfig,
        options: UseRequestOptions<T>,
    ) -> Self {
        let binding = Binding::Strict {
            url: url.into(),
            config,
        };
        Self::new(transport, binding, options)
    }

    /// No bound address; `config` is the default for every call.
    pub fn easy(
        transport: impl Transport + 'static,
        config: RequestConfig,
        options: UseRequestOptions<T>,
    ) -> Self {
        Self::new(transport, Binding::Easy { config }, options)
    }

    /// Call the bound address (or the address in the instance config).
    pub fn execute(&self) -> Execution<T> {
        self.run(None, None)
    }

    /// Call `url`, layering `config` over the instance config.
    pub fn execute_url(&self, url: impl Into<String>, config: Option<RequestConfig>) -> Execution<T> {
        self.run(Some(url.into()), config)
    }

    /// Call with a per-call config. The config may carry the address.
    pub fn execute_with(&self, config: RequestConfig) -> Execution<T> {
        self.run(None, Some(config))
    }

    fn run(&self, url: Option<String>, config: Option<RequestConfig>) -> Execution<T> {
        let shared = &self.shared;

        let config = config
            .unwrap_or_default()
            .merged_over(shared.binding.config());
        let url = url
            .or_else(|| shared.binding.url().map(str::to_string))
            .or_else(|| config.url.clone());

        let Some(url) = url else {
            tracing::warn!("request has no address to call");
            return self.fail_early(RequestError::InvalidUrl);
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::error!(url = %url, "request started outside a Tokio runtime");
            return self.fail_early(RequestError::NoRuntime);
        };

        let generation = {
            let _gate = shared.lock_gate();
            shared.error.set(None);
            if shared.options.reset_on_execute {
                shared.data.assign(
                    shared.options.initial_data.clone(),
                    shared.options.data_detection(),
                );
            }

            let mut generation = 0;
            shared.progress.modify(|progress| {
                progress.generation += 1;
                progress.phase = Phase::Loading;
                generation = progress.generation;
                true
            });
            generation
        };

        let descriptor = RequestDescriptor::from_config(url, config);
        tracing::debug!(generation, method = ?descriptor.method, url = %descriptor.url, "executing request");

        let task = runtime.spawn({
            let request = self.clone();
            async move {
                let result = request.shared.transport.request(descriptor).await;
                request.complete(generation, result);
            }
        });

        Execution {
            request: self.clone(),
            generation,
            task: Some(task),
        }
    }

    /// Record `error` and finish without sending anything or starting a new
    /// generation.
    fn fail_early(&self, error: RequestError) -> Execution<T> {
        let shared = &self.shared;
        {
            let _gate = shared.lock_gate();
            shared.error.set(Some(error));
            shared.progress.modify(|progress| {
                progress.phase = Phase::Finished;
                true
            });
        }
        Execution {
            request: self.clone(),
            generation: self.generation(),
            task: None,
        }
    }

    fn complete(&self, generation: u64, result: Result<HttpResponse, fetchcell_http::Error>) {
        let shared = &self.shared;

        let outcome = {
            let _gate = shared.lock_gate();
            if !self.is_current(generation) && shared.options.stale_responses == StalePolicy::Discard {
                tracing::trace!(generation, "discarding superseded response");
                return;
            }
            match result {
                Ok(response) => self.apply_response(response),
                Err(error) => self.apply_failure(error),
            }
        };

        // Callbacks run outside the gate so they may start new calls.
        self.announce(outcome);

        let finished = shared.progress.modify(|progress| {
            if progress.generation != generation {
                return false;
            }
            progress.phase = Phase::Finished;
            true
        });

        if finished {
            tracing::debug!(generation, "request finished");
            if let Some(on_finish) = &shared.options.on_finish {
                on_finish();
            }
        } else {
            tracing::trace!(generation, "superseded call left progress untouched");
        }
    }

    fn apply_response(&self, response: HttpResponse) -> Outcome<T> {
        let shared = &self.shared;

        if response.is_success() {
            let envelope = Envelope::from_response(&response);
            shared.response.set(Some(response));
            match envelope.decode::<T>() {
                Ok(envelope) => {
                    shared
                        .data
                        .assign(envelope.data.clone(), shared.options.data_detection());
                    Outcome::Succeeded(envelope.data)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "response data did not match the expected type");
                    let error = RequestError::Decode {
                        message: e.to_string(),
                    };
                    shared.error.set(Some(error.clone()));
                    Outcome::Failed {
                        error,
                        message: DEFAULT_ERROR_MESSAGE.to_string(),
                    }
                }
            }
        } else if response.is_unauthorized() {
            // Authentication is handled by interceptors, not here.
            tracing::debug!("401 response left to the authentication layer");
            Outcome::Silent
        } else {
            let message = Envelope::from_response(&response).message_or(DEFAULT_ERROR_MESSAGE);
            let class = if response.is_server_error() {
                "server"
            } else if response.is_client_error() {
                "client"
            } else {
                "unexpected"
            };
            tracing::warn!(status = response.status, class, message = %message, "request returned an error status");
            Outcome::Failed {
                error: RequestError::Status {
                    status: response.status,
                    message: message.clone(),
                },
                message,
            }
        }
    }

    fn apply_failure(&self, error: fetchcell_http::Error) -> Outcome<T> {
        tracing::warn!(error = %error, "request failed before a response arrived");
        let error = RequestError::from(error);
        self.shared.error.set(Some(error.clone()));
        Outcome::Failed {
            error,
            message: NETWORK_ERROR_MESSAGE.to_string(),
        }
    }

    fn announce(&self, outcome: Outcome<T>) {
        let options = &self.shared.options;
        match outcome {
            Outcome::Succeeded(data) => {
                if let Some(on_success) = &options.on_success {
                    on_success(data.as_ref());
                }
            }
            Outcome::Failed { error, message } => {
                options.notifier.show(Notification::new(message));
                if let Some(on_error) = &options.on_error {
                    on_error(&error);
                }
            }
            Outcome::Silent => {}
        }
    }

    /// Wait until the instance is finished.
    ///
    /// Resolves with a snapshot when no error is recorded, otherwise fails with
    /// the recorded error. Never resolves for an instance that was never
    /// executed.
    pub async fn until_finished(&self) -> Result<RequestSnapshot<T>, RequestError> {
        self.shared
            .progress
            .wait_until(|progress| progress.is_finished())
            .await;
        match self.shared.error.get() {
            Some(error) => Err(error),
            None => Ok(self.snapshot()),
        }
    }
}

impl<T: Clone> UseRequest<T> {
    pub fn is_loading(&self) -> bool {
        self.shared.progress.with(Progress::is_loading)
    }

    pub fn is_finished(&self) -> bool {
        self.shared.progress.with(Progress::is_finished)
    }

    pub fn progress(&self) -> Progress {
        self.shared.progress.get()
    }

    /// Generation of the most recently started call.
    pub fn generation(&self) -> u64 {
        self.shared.progress.with(|progress| progress.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn data(&self) -> Option<T> {
        self.shared.data.get()
    }

    pub fn response(&self) -> Option<HttpResponse> {
        self.shared.response.get()
    }

    pub fn error(&self) -> Option<RequestError> {
        self.shared.error.get()
    }

    pub fn binding(&self) -> &Binding {
        &self.shared.binding
    }

    pub fn snapshot(&self) -> RequestSnapshot<T> {
        let progress = self.progress();
        RequestSnapshot {
            is_loading: progress.is_loading(),
            is_finished: progress.is_finished(),
            data: self.data(),
            response: self.response(),
            error: self.error(),
        }
    }

    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        self.shared.progress.subscribe()
    }

    pub fn watch_data(&self) -> watch::Receiver<Option<T>> {
        self.shared.data.subscribe()
    }

    pub fn watch_response(&self) -> watch::Receiver<Option<HttpResponse>> {
        self.shared.response.subscribe()
    }

    pub fn watch_error(&self) -> watch::Receiver<Option<RequestError>> {
        self.shared.error.subscribe()
    }
}

/// One started call.
///
/// Await it (or call [`Execution::finished`]) to wait for the instance to
/// finish, or [`Execution::join`] to wait for this particular call's
/// round-trip whether or not a newer call superseded it.
pub struct Execution<T> {
    request: UseRequest<T>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl<T> Execution<T>
where
    T: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    /// Generation captured when the call started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this call reached the transport.
    pub fn was_sent(&self) -> bool {
        self.task.is_some()
    }

    pub fn request(&self) -> &UseRequest<T> {
        &self.request
    }

    /// Wait until the instance is finished; see [`UseRequest::until_finished`].
    pub async fn finished(self) -> Result<RequestSnapshot<T>, RequestError> {
        self.request.until_finished().await
    }

    /// Wait for this call's transport round-trip and its side effects.
    pub async fn join(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                tracing::error!(generation = self.generation, error = %e, "request task failed");
            }
        }
    }
}

impl<T> IntoFuture for Execution<T>
where
    T: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    type Output = Result<RequestSnapshot<T>, RequestError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchcell_http::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn progress_flags_are_exclusive() {
        let idle = Progress::default();
        assert!(!idle.is_loading() && !idle.is_finished());

        for phase in [Phase::Loading, Phase::Finished] {
            let progress = Progress {
                phase,
                generation: 1,
            };
            assert!(progress.is_loading() ^ progress.is_finished());
        }
    }

    #[test]
    fn binding_exposes_url_and_config() {
        let strict = Binding::Strict {
            url: "/a".to_string(),
            config: RequestConfig::new().with_header("X", "1"),
        };
        assert_eq!(strict.url(), Some("/a"));
        assert_eq!(strict.config().headers.get("X"), Some(&"1".to_string()));

        let easy = Binding::Easy {
            config: RequestConfig::new(),
        };
        assert_eq!(easy.url(), None);
    }

    #[tokio::test]
    async fn fresh_instance_is_idle() {
        let request = UseRequest::<u32>::easy(
            MockTransport::new(),
            RequestConfig::new(),
            UseRequestOptions::new().initial_data(5),
        );

        let snapshot = request.snapshot();
        assert!(!snapshot.is_loading);
        assert!(!snapshot.is_finished);
        assert_eq!(snapshot.data, Some(5));
        assert_eq!(request.generation(), 0);
    }

    #[tokio::test]
    async fn execute_marks_loading_synchronously() {
        let transport = MockTransport::new();
        let responder = transport.defer("/slow");
        let request = UseRequest::<u32>::strict(
            transport,
            "/slow",
            RequestConfig::new(),
            UseRequestOptions::new(),
        );

        let execution = request.execute();
        assert!(request.is_loading());
        assert!(!request.is_finished());
        assert_eq!(execution.generation(), 1);
        assert!(execution.was_sent());

        responder.respond(MockTransport::envelope(json!(3)));
        let snapshot = execution.await.unwrap();
        assert_eq!(snapshot.data, Some(3));
        assert!(snapshot.is_finished);
    }

    #[test]
    fn immediate_outside_runtime_records_error_instead_of_panicking() {
        let transport = MockTransport::new().with_default_response(MockTransport::envelope(json!(1)));
        let request = UseRequest::<u32>::strict(
            transport.clone(),
            "/now",
            RequestConfig::new(),
            UseRequestOptions::new().immediate(true),
        );

        assert_eq!(request.error(), Some(RequestError::NoRuntime));
        assert!(request.is_finished());
        assert_eq!(request.generation(), 0);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completion_waits_for_in_progress_start_under_discard() {
        let transport = MockTransport::new();
        let responder = transport.defer("/old");
        let request = UseRequest::<u32>::strict(
            transport,
            "/old",
            RequestConfig::new(),
            UseRequestOptions::new().stale_responses(StalePolicy::Discard),
        );

        let old = request.execute();
        {
            // Stand in for a newer call that is midway through starting.
            let _gate = request.shared.lock_gate();
            responder.respond(MockTransport::envelope(json!(1)));
            std::thread::sleep(std::time::Duration::from_millis(50));
            request.shared.progress.modify(|progress| {
                progress.generation += 1;
                true
            });
        }
        old.join().await;

        assert_eq!(request.data(), None);
        assert_eq!(request.response(), None);
        assert!(request.is_loading());
    }

    #[tokio::test]
    async fn instance_config_carries_address_in_easy_mode() {
        let transport = MockTransport::new()
            .with_response("/from-config", MockTransport::envelope(json!(9)));
        let request = UseRequest::<u32>::easy(
            transport.clone(),
            RequestConfig::new().with_url("/from-config"),
            UseRequestOptions::new(),
        );

        let snapshot = request.execute().await.unwrap();
        assert_eq!(snapshot.data, Some(9));
        assert_eq!(transport.recorded_requests()[0].url, "/from-config");
    }
}
