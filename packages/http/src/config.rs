//! Transport configuration.
//!
//! Collects the settings every outgoing request shares (base URL, forced
//! timeout, client identification header) and turns them into an interceptor
//! chain attached to a concrete transport.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::interceptor::{
    Authorization, BaseUrl, FixedTimeout, Intercepted, Interceptor, StaticHeader, TokenProvider,
};
use crate::transport::{ReqwestTransport, Transport, DEFAULT_TIMEOUT};

/// Environment variable holding the base URL.
pub const BASE_URL_VAR: &str = "FETCHCELL_BASE_URL";

/// Environment variable holding the forced timeout in milliseconds.
pub const TIMEOUT_VAR: &str = "FETCHCELL_TIMEOUT_MS";

/// Header identifying this client to the backend.
pub const CLIENT_HEADER: &str = "X-Client-Source";

/// Configuration shared by every request sent through one transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Prefix for relative addresses.
    pub base_url: Option<String>,

    /// Timeout forced onto every request.
    pub timeout: Duration,

    /// Fixed `(name, value)` header sent with every request.
    pub client_header: Option<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(10),
            client_header: Some((CLIENT_HEADER.to_string(), "fetchcell".to_string())),
        }
    }
}

impl TransportConfig {
    /// Load from the environment.
    ///
    /// The base URL comes from `FETCHCELL_BASE_URL` at runtime, falling back to
    /// the value the variable had when the crate was compiled.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        let base_url = std::env::var(BASE_URL_VAR)
            .ok()
            .or_else(|| option_env!("FETCHCELL_BASE_URL").map(str::to_string))
            .filter(|url| !url.is_empty());
        if let Some(url) = base_url {
            config = config.with_base_url(url)?;
        }

        if let Ok(raw) = std::env::var(TIMEOUT_VAR) {
            let millis: u64 = raw.trim().parse().map_err(|_| Error::InvalidConfig {
                message: format!("{} must be a number of milliseconds, got '{}'", TIMEOUT_VAR, raw),
            })?;
            config.timeout = Duration::from_millis(millis);
        }

        tracing::debug!(base_url = ?config.base_url, timeout = ?config.timeout, "loaded transport config");
        Ok(config)
    }

    /// Set the base URL. It must be an absolute http(s) URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, Error> {
        let base_url = base_url.into();
        let parsed = url::Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                message: format!("base URL must use http or https: {}", base_url),
            });
        }
        self.base_url = Some(base_url);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.client_header = Some((name.into(), value.into()));
        self
    }

    pub fn without_client_header(mut self) -> Self {
        self.client_header = None;
        self
    }

    /// The standard interceptor chain: base URL, timeout, client header.
    pub fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        let mut chain: Vec<Arc<dyn Interceptor>> = Vec::new();
        if let Some(base) = &self.base_url {
            chain.push(Arc::new(BaseUrl::new(base.clone())));
        }
        chain.push(Arc::new(FixedTimeout(self.timeout)));
        if let Some((name, value)) = &self.client_header {
            chain.push(Arc::new(StaticHeader::new(name.clone(), value.clone())));
        }
        chain
    }

    /// Wrap any transport with the standard chain.
    pub fn wrap<T: Transport>(&self, transport: T) -> Intercepted<T> {
        Intercepted::new(transport).with_all(self.interceptors())
    }

    /// Build a reqwest transport with the standard chain.
    pub fn build(&self) -> Result<Intercepted<ReqwestTransport>, Error> {
        Ok(self.wrap(ReqwestTransport::new(DEFAULT_TIMEOUT)?))
    }

    /// Like [`TransportConfig::build`], also attaching bearer tokens from `provider`.
    pub fn build_with_auth(
        &self,
        provider: impl TokenProvider + 'static,
    ) -> Result<Intercepted<ReqwestTransport>, Error> {
        Ok(self.build()?.with(Authorization::new(provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    // Tests touching the process environment hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        std::env::remove_var(BASE_URL_VAR);
        std::env::remove_var(TIMEOUT_VAR);
    }

    #[test]
    fn from_env_reads_runtime_variables() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var(BASE_URL_VAR, "https://env.example.com/api");
        std::env::set_var(TIMEOUT_VAR, " 2500 ");
        let config = TransportConfig::from_env();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://env.example.com/api"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn from_env_ignores_empty_base_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var(BASE_URL_VAR, "");
        let config = TransportConfig::from_env();
        clear_env();

        let expected = option_env!("FETCHCELL_BASE_URL")
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        let config = config.unwrap();
        assert_eq!(config.base_url, expected);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn from_env_rejects_non_numeric_timeout() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var(TIMEOUT_VAR, "soon");
        let result = TransportConfig::from_env();
        clear_env();

        match result {
            Err(Error::InvalidConfig { message }) => assert!(message.contains("soon")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn from_env_rejects_invalid_base_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var(BASE_URL_VAR, "not a url");
        let result = TransportConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(Error::UrlParse(_))));
    }

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert!(config.base_url.is_none());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(
            config.client_header,
            Some((CLIENT_HEADER.to_string(), "fetchcell".to_string()))
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(TransportConfig::default().with_base_url("/api").is_err());
        assert!(TransportConfig::default().with_base_url("ftp://x.test").is_err());
        assert!(TransportConfig::default()
            .with_base_url("https://api.example.com")
            .is_ok());
    }

    #[test]
    fn interceptor_chain_follows_config() {
        let config = TransportConfig::default()
            .with_base_url("https://api.example.com")
            .unwrap();
        assert_eq!(config.interceptors().len(), 3);

        let bare = TransportConfig::default().without_client_header();
        assert_eq!(bare.interceptors().len(), 1);
    }

    #[test]
    fn build_produces_transport() {
        assert!(TransportConfig::default().build().is_ok());
        assert!(TransportConfig::default()
            .build_with_auth(crate::interceptor::NoToken)
            .is_ok());
    }
}
