//! # fetchcell-http
//!
//! Transport layer for fetchcell.
//!
//! This crate owns everything that touches the wire: request and response
//! types, the [`Transport`] trait with its reqwest implementation, the
//! interceptor chain that resolves base URLs and injects shared headers, and
//! the `{code, msg, data}` response envelope.
//!
//! ```ignore
//! use fetchcell_http::{Envelope, RequestDescriptor, Transport, TransportConfig};
//!
//! let transport = TransportConfig::from_env()?.build()?;
//!
//! // Relative paths are resolved against FETCHCELL_BASE_URL
//! let response = transport.request(RequestDescriptor::get("/users/123")).await?;
//! let envelope = Envelope::from_response(&response);
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::TransportConfig;
pub use envelope::Envelope;
pub use error::Error;
pub use interceptor::{
    Authorization, BaseUrl, FixedTimeout, Intercepted, Interceptable, Interceptor, NoToken,
    StaticHeader, TokenProvider,
};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    insert_header, HttpResponse, Method, RequestConfig, RequestDescriptor, UploadRequest,
};
