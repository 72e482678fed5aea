//! Wiring of the table store and identity provider from settings.

use std::sync::Arc;
use std::time::Duration;

use dash_core::error::{DashError, Result};
use dash_core::settings::Settings;
use tracing::info;

use crate::http::{HttpClient, ReqwestHttpClient};
use crate::identity::{IdentityProvider, MemoryIdentity, SessionFile, SessionState};
use crate::rest::{RestConfig, RestIdentity, RestStore};
use crate::store::{MemoryStore, TableStore};

/// The two remote collaborators, sharing one session.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn TableStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub timeout: Duration,
    pub offline: bool,
}

impl Backend {
    /// In-memory store and identity; nothing leaves the process.
    pub fn offline(timeout: Duration) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            identity: Arc::new(MemoryIdentity::new(SessionState::ephemeral())),
            timeout,
            offline: true,
        }
    }

    /// Hosted backend over `http`, with the session kept in `session_file`.
    pub fn hosted(
        http: Arc<dyn HttpClient>,
        config: RestConfig,
        session_file: SessionFile,
    ) -> Self {
        let state = SessionState::persistent(session_file);
        let timeout = config.timeout;
        Self {
            store: Arc::new(RestStore::new(
                Arc::clone(&http),
                config.clone(),
                Arc::clone(&state),
            )),
            identity: Arc::new(RestIdentity::new(http, config, state)),
            timeout,
            offline: false,
        }
    }

    /// Build from CLI settings. Without `--offline` both the backend URL and
    /// the API key are required.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.request_timeout_secs);
        if settings.offline {
            info!("Running offline with an in-memory backend");
            return Ok(Self::offline(timeout));
        }

        let base_url = settings.backend_url.as_deref().ok_or_else(|| {
            DashError::Config(
                "backend URL is not set; pass --backend-url, set DASH_BACKEND_URL or use --offline"
                    .to_string(),
            )
        })?;
        let api_key = settings.api_key.as_deref().ok_or_else(|| {
            DashError::Config(
                "API key is not set; pass --api-key, set DASH_API_KEY or use --offline".to_string(),
            )
        })?;
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(DashError::Config(format!(
                "backend URL must start with http:// or https://, got {}",
                base_url
            )));
        }

        Ok(Self::hosted(
            Arc::new(ReqwestHttpClient::new()),
            RestConfig::new(base_url, api_key, timeout),
            SessionFile::default_location(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_offline_flag_builds_memory_backend() {
        let settings = Settings::parse_from(["finance-dash", "--offline", "--request-timeout-secs", "7"]);
        let backend = Backend::from_settings(&settings).unwrap();
        assert!(backend.offline);
        assert_eq!(backend.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let mut settings = Settings::parse_from(["finance-dash"]);
        settings.backend_url = None;
        settings.api_key = Some("k".into());
        let err = Backend::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("backend URL is not set"));
    }

    #[test]
    fn test_bad_scheme_is_config_error() {
        let mut settings = Settings::parse_from(["finance-dash"]);
        settings.backend_url = Some("ftp://example.co".into());
        settings.api_key = Some("k".into());
        let err = Backend::from_settings(&settings).err().unwrap();
        assert!(matches!(err, DashError::Config(_)));
    }
}
