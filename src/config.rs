//! Environment-based configuration
//!
//! All credentials and endpoints are resolved once at startup into a plain
//! `Config` value that is handed to the services explicitly. Missing required
//! variables fail fast before any upstream is contacted.

use std::collections::HashSet;
use std::env;

use thiserror::Error;

/// Default client name reported to the VMS on login
const DEFAULT_CLIENT_NAME: &str = "fleetwatch";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("no credentials configured: missing environment variable {0}")]
    Missing(&'static str),
}

/// Credentials and endpoint for the on-premises VMS
#[derive(Debug, Clone)]
pub struct VmsConfig {
    /// Base URL of the VMS REST endpoint
    pub base_url: String,
    /// Account username submitted on login
    pub username: String,
    /// Account password submitted on login
    pub password: String,
    /// Client name reported alongside the credentials
    pub client_name: String,
    /// Shared key used to derive the login authorization token
    pub shared_key: String,
}

/// Endpoint for the vendor cloud hardware-health API
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the cloud health endpoint
    pub base_url: String,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// On-prem VMS connection settings
    pub vms: VmsConfig,
    /// Cloud health API connection settings
    pub cloud: CloudConfig,
    /// Trigger endpoint of the external token harvester, if deployed
    pub harvester_url: Option<String>,
    /// Server names excluded from active fleet counts
    pub standby_servers: HashSet<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Required: `VMS_BASE_URL`, `VMS_USERNAME`, `VMS_PASSWORD`,
    /// `VMS_SHARED_KEY`, `CLOUD_BASE_URL`.
    ///
    /// Optional: `VMS_CLIENT_NAME` (defaults to "fleetwatch"),
    /// `HARVESTER_URL`, `STANDBY_SERVERS` (comma-separated names).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            vms: VmsConfig {
                base_url: required("VMS_BASE_URL")?,
                username: required("VMS_USERNAME")?,
                password: required("VMS_PASSWORD")?,
                client_name: env::var("VMS_CLIENT_NAME")
                    .unwrap_or_else(|_| DEFAULT_CLIENT_NAME.to_string()),
                shared_key: required("VMS_SHARED_KEY")?,
            },
            cloud: CloudConfig {
                base_url: required("CLOUD_BASE_URL")?,
            },
            harvester_url: env::var("HARVESTER_URL").ok().filter(|v| !v.is_empty()),
            standby_servers: parse_standby_list(
                &env::var("STANDBY_SERVERS").unwrap_or_default(),
            ),
        })
    }
}

/// Reads a required environment variable, rejecting empty values
fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Parses a comma-separated list of standby server names.
///
/// Whitespace around entries is trimmed and empty entries are dropped, so
/// `"Backup-1, Backup-2,"` yields two names.
pub fn parse_standby_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
