use std::path::PathBuf;
use std::time::Duration;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a job service on localhost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Base URL of the job service.
    pub api_url: String,
    pub poll_interval: Duration,
    /// Bound on each job's status log.
    pub max_log_entries: usize,
    pub request_timeout: Duration,
    /// JSON file holding the settings blob forwarded on start.
    pub settings_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `JOBWATCH_API_URL`              | `http://localhost:8000`  |
    /// | `JOBWATCH_POLL_INTERVAL_MS`     | `2000`                   |
    /// | `JOBWATCH_MAX_LOG_ENTRIES`      | `100`                    |
    /// | `JOBWATCH_REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `JOBWATCH_SETTINGS_PATH`        | `jobwatch-settings.json` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("JOBWATCH_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:8000".into());

        let poll_interval_ms = parse_positive(&lookup, "JOBWATCH_POLL_INTERVAL_MS", 2000)?;
        let max_log_entries = parse_positive(&lookup, "JOBWATCH_MAX_LOG_ENTRIES", 100)?;
        let request_timeout_secs = parse_positive(&lookup, "JOBWATCH_REQUEST_TIMEOUT_SECS", 30)?;

        let settings_path = lookup("JOBWATCH_SETTINGS_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "jobwatch-settings.json".into())
            .into();

        Ok(Self {
            api_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_log_entries: max_log_entries as usize,
            request_timeout: Duration::from_secs(request_timeout_secs),
            settings_path,
        })
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a positive integer",
            value: raw,
        }),
    }
}
