//! # fetchcell
//!
//! Reactive request state over a pluggable HTTP transport.
//!
//! A [`UseRequest`] exposes `loading`, `finished`, `data`, `response` and
//! `error` as observable [`Cell`]s and drives them through `execute`. The
//! transport, the interceptor chain and the response envelope come from
//! [`fetchcell_http`].
//!
//! ## Construction
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use fetchcell::{UseRequest, UseRequestOptions};
//! use fetchcell_http::{RequestConfig, TransportConfig};
//!
//! let transport = Arc::new(TransportConfig::from_env()?.build()?);
//!
//! // Strict: an address is bound, calls may override it
//! let profile = UseRequest::<Profile>::strict(
//!     transport.clone(),
//!     "/me",
//!     RequestConfig::new(),
//!     UseRequestOptions::new().immediate(true),
//! );
//!
//! // Easy: every call names its own address
//! let api = UseRequest::<serde_json::Value>::easy(transport, RequestConfig::new(), Default::default());
//! let orders = api.execute_url("/orders", None).await?;
//! ```
//!
//! ## Observing
//!
//! ```ignore
//! let mut progress = profile.watch_progress();
//! while progress.changed().await.is_ok() {
//!     render_spinner(progress.borrow().is_loading());
//! }
//! ```

pub mod cell;
pub mod error;
pub mod notify;
pub mod options;
pub mod request;

pub use cell::{Cell, ChangeDetection};
pub use error::{RequestError, ERR_INVALID_URL};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use options::{StalePolicy, UseRequestOptions};
pub use request::{Binding, Execution, Phase, Progress, RequestSnapshot, UseRequest};

pub use fetchcell_http as http;
