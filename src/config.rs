use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from `CAIXA_*` environment variables with
/// sensible defaults. `dotenv` is loaded by the binary before this runs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub accounts_file: PathBuf,
    pub idle_poll_interval: Duration,
    pub metrics_report_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            accounts_file: PathBuf::from("fixtures/accounts.json"),
            idle_poll_interval: Duration::from_secs(5),
            metrics_report_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CAIXA_HOST").unwrap_or(defaults.host),
            port: env_parsed("CAIXA_PORT").unwrap_or(defaults.port),
            accounts_file: std::env::var("CAIXA_ACCOUNTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.accounts_file),
            idle_poll_interval: env_parsed("CAIXA_IDLE_POLL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_poll_interval),
            metrics_report_interval: env_parsed("CAIXA_METRICS_REPORT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.metrics_report_interval),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
