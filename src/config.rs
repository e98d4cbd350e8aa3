use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "CMA AutoFill";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every backend route lives under this prefix.
pub const API_PREFIX: &str = "/api/v1";

/// Backend used when `CMA_API_URL` is not set (local FastAPI dev server).
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Pipeline progress is re-fetched at this interval while non-terminal.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Dashboard stats auto-refresh interval.
pub const DASHBOARD_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// How long a cached query stays fresh before it is fetched again.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

/// Upper bound on cached query entries.
pub const QUERY_CACHE_CAPACITY: u64 = 1_000;

/// Connect timeout for the HTTP client. Requests themselves have none.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_API_URL: &str = "CMA_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "CMA_ACCESS_TOKEN";
pub const ENV_DEPLOYMENT: &str = "CMA_ENV";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,cma_autofill_lib=debug,reqwest=warn,hyper=warn"
}

/// Where downloaded CMA workbooks land unless a path is given.
/// Falls back to the working directory on systems without a Downloads folder.
pub fn download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Deployment flavour. Some UX shortcuts (the e2e auth bypass cookie)
/// are only honoured outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Development,
    Production,
}

impl Deployment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Connection settings for the backend API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Scheme + host + port, without trailing slash and without `/api/v1`.
    pub base_url: String,
    pub deployment: Deployment,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            deployment: Deployment::Development,
        }
    }

    /// Read `CMA_API_URL` and `CMA_ENV`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let deployment = std::env::var(ENV_DEPLOYMENT)
            .map(|v| Deployment::parse(&v))
            .unwrap_or(Deployment::Development);
        Self {
            deployment,
            ..Self::new(&base_url)
        }
    }

    /// Full URL for an API path such as `/clients/abc`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_cma_autofill() {
        assert_eq!(APP_NAME, "CMA AutoFill");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn poll_interval_is_two_seconds() {
        assert_eq!(PROGRESS_POLL_INTERVAL, Duration::from_secs(2));
    }

    #[test]
    fn api_config_trims_trailing_slash() {
        let config = ApiConfig::new("http://localhost:8000/");
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn endpoint_includes_api_prefix() {
        let config = ApiConfig::new("https://api.example.com");
        assert_eq!(
            config.endpoint("/clients/c-1"),
            "https://api.example.com/api/v1/clients/c-1"
        );
    }

    #[test]
    fn default_config_points_at_local_backend() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert!(!config.deployment.is_production());
    }

    #[test]
    fn deployment_parsing() {
        assert_eq!(Deployment::parse("production"), Deployment::Production);
        assert_eq!(Deployment::parse(" PROD "), Deployment::Production);
        assert_eq!(Deployment::parse("staging"), Deployment::Development);
        assert_eq!(Deployment::parse(""), Deployment::Development);
    }
}
