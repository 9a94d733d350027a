use std::sync::Arc;

/// Sentinel reported when no address could be resolved for a call.
pub const ERR_INVALID_URL: &str = "ERR_INVALID_URL";

/// Errors recorded in a request's `error` cell and passed to `on_error`.
///
/// Cloneable so it can live in an observable cell and be handed to several
/// observers at once.
#[derive(thiserror::Error, Debug, Clone)]
pub enum RequestError {
    /// Neither the call, the binding nor the configuration named an address.
    #[error("ERR_INVALID_URL")]
    InvalidUrl,

    /// The server answered with a status other than 2xx or 401.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// No response was obtained.
    #[error("{0}")]
    Transport(Arc<fetchcell_http::Error>),

    /// A 2xx envelope whose `data` did not match the expected type.
    #[error("failed to decode response data: {message}")]
    Decode { message: String },

    /// The call was started outside a Tokio runtime, so nothing was sent.
    #[error("no Tokio runtime available to run the request")]
    NoRuntime,
}

impl RequestError {
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, RequestError::InvalidUrl)
    }

    /// The HTTP status, for errors that came with a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<fetchcell_http::Error> for RequestError {
    fn from(error: fetchcell_http::Error) -> Self {
        RequestError::Transport(Arc::new(error))
    }
}

impl PartialEq for RequestError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RequestError::InvalidUrl, RequestError::InvalidUrl) => true,
            (
                RequestError::Status { status: a, message: m },
                RequestError::Status { status: b, message: n },
            ) => a == b && m == n,
            (RequestError::Transport(a), RequestError::Transport(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (RequestError::Decode { message: a }, RequestError::Decode { message: b }) => a == b,
            (RequestError::NoRuntime, RequestError::NoRuntime) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_displays_sentinel() {
        assert_eq!(RequestError::InvalidUrl.to_string(), ERR_INVALID_URL);
        assert!(RequestError::InvalidUrl.is_invalid_url());
    }

    #[test]
    fn status_error_displays_message() {
        let err = RequestError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn transport_errors_compare_by_message() {
        let a: RequestError = fetchcell_http::Error::Network {
            message: "reset".to_string(),
        }
        .into();
        let b: RequestError = fetchcell_http::Error::Network {
            message: "reset".to_string(),
        }
        .into();
        assert_eq!(a, b);
        assert_eq!(a.clone(), a);
        assert_ne!(a, RequestError::InvalidUrl);
    }
}
