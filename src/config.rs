use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::IqueryError;

pub const CONFIG_FILE_NAME: &str = "iquery.json";
pub const ENDPOINT_ENV: &str = "IQUERY_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://public.ndexbio.org/integratedsearch/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REPORT_LABEL: &str = "IQuery";
pub const DEFAULT_SMTP_SERVER: &str = "localhost";
pub const DEFAULT_REPORT_FROM: &str = "no_reply@ndexbio-stats.ucsd.edu";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub report: Option<ReportSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReportSection {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub smtp_server: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub excluded_queries: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
    pub timeout: Duration,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub label: String,
    pub smtp_server: String,
    pub from: String,
    pub excluded_queries: Vec<Vec<String>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_REPORT_LABEL.to_string(),
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            from: DEFAULT_REPORT_FROM.to_string(),
            excluded_queries: Vec::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config file (explicit path, then `./iquery.json`, then the
    /// user config directory) and applies the `IQUERY_ENDPOINT` override.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IqueryError> {
        let config = match path {
            Some(path) => Self::read(PathBuf::from(path))?,
            None => match default_config_path() {
                Some(found) => Self::read(found)?,
                None => Config::default(),
            },
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                resolved.endpoint = normalize_endpoint(&endpoint)?;
            }
        }
        Ok(resolved)
    }

    fn read(path: PathBuf) -> Result<Config, IqueryError> {
        let content = fs::read_to_string(&path).map_err(|_| IqueryError::ConfigRead(path))?;
        serde_json::from_str(&content).map_err(|err| IqueryError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IqueryError> {
        let endpoint = normalize_endpoint(config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;

        let max_consecutive_failures = config
            .max_consecutive_failures
            .unwrap_or(DEFAULT_MAX_CONSECUTIVE_FAILURES);
        if max_consecutive_failures == 0 {
            return Err(IqueryError::ConfigParse(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        let report = config.report.unwrap_or_default();
        let defaults = ReportConfig::default();
        let report = ReportConfig {
            label: report.label.unwrap_or(defaults.label),
            smtp_server: report.smtp_server.unwrap_or(defaults.smtp_server),
            from: report.from.unwrap_or(defaults.from),
            excluded_queries: report.excluded_queries,
        };

        Ok(ResolvedConfig {
            endpoint,
            poll_interval: Duration::from_millis(
                config.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            max_consecutive_failures,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            report,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    ProjectDirs::from("org", "ndexbio", "iquery")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Strips trailing slashes; paths are appended as `{endpoint}/...`.
pub fn normalize_endpoint(value: &str) -> Result<String, IqueryError> {
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(IqueryError::InvalidEndpoint(value.to_string()));
    }
    Ok(trimmed.to_string())
}
