//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use ride_client::{DEFAULT_LOOKAHEAD, DEFAULT_RENEWAL_INTERVAL};
use ride_domain::{CredentialPair, Subject};
use ride_sim::DEFAULT_INTERVAL;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend endpoints
    pub api: ApiConfig,

    /// Session configuration
    pub session: SessionSettings,

    /// Simulator configuration
    pub simulator: SimulatorConfig,

    /// Subject whose live positions are logged, if any
    pub watch_subject: Option<Subject>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Backend endpoints.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST base URL
    pub base_url: String,
    /// Live channel WebSocket URL
    pub ws_url: String,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Credential pair installed at startup, if configured
    pub initial_credentials: Option<CredentialPair>,
    /// Persist credentials to this file instead of memory
    pub credentials_path: Option<PathBuf>,
    /// Expiry lookahead
    pub lookahead: Duration,
    /// Background renewal period
    pub renewal_interval: Duration,
}

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Subject to simulate; the simulator is off when unset
    pub subject: Option<Subject>,
    /// Tick interval
    pub interval: Duration,
    /// JSON route file; the demo route is used when unset
    pub route_path: Option<PathBuf>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DaemonResult<Self> {
        let environment = load_environment(&lookup)?;
        let api = load_api_config(&lookup);
        let session = load_session_settings(&lookup)?;
        let simulator = load_simulator_config(&lookup)?;
        let watch_subject = load_subject(&lookup, "RIDE_WATCH_SUBJECT")?;

        Ok(Self {
            api,
            session,
            simulator,
            watch_subject,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://127.0.0.1:0".to_string(),
                ws_url: "ws://127.0.0.1:0/ws/positions".to_string(),
            },
            session: SessionSettings {
                initial_credentials: None,
                credentials_path: None,
                lookahead: DEFAULT_LOOKAHEAD,
                renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            },
            simulator: SimulatorConfig {
                subject: None,
                interval: Duration::from_millis(100),
                route_path: None,
            },
            watch_subject: None,
            environment: Environment::Test,
        }
    }
}

fn load_environment(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<Environment> {
    let env_str = lookup("RIDE_ENV").unwrap_or_else(|| "development".to_string());

    match env_str.to_lowercase().as_str() {
        "test" => Ok(Environment::Test),
        "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(DaemonError::Config(format!(
            "Invalid RIDE_ENV: {}. Expected: test, development, production",
            other
        ))),
    }
}

fn load_api_config(lookup: &impl Fn(&str) -> Option<String>) -> ApiConfig {
    let defaults = ApiConfig::default();
    ApiConfig {
        base_url: lookup("RIDE_API_URL").unwrap_or(defaults.base_url),
        ws_url: lookup("RIDE_WS_URL").unwrap_or(defaults.ws_url),
    }
}

fn load_session_settings(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<SessionSettings> {
    let initial_credentials = match (lookup("RIDE_ACCESS_TOKEN"), lookup("RIDE_REFRESH_TOKEN")) {
        (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
        (None, None) => None,
        _ => {
            return Err(DaemonError::Config(
                "RIDE_ACCESS_TOKEN and RIDE_REFRESH_TOKEN must be set together".to_string(),
            ))
        },
    };

    Ok(SessionSettings {
        initial_credentials,
        credentials_path: lookup("RIDE_CREDENTIALS_PATH").map(PathBuf::from),
        lookahead: load_secs(lookup, "RIDE_LOOKAHEAD_SECS", DEFAULT_LOOKAHEAD)?,
        renewal_interval: load_secs(lookup, "RIDE_RENEWAL_INTERVAL_SECS", DEFAULT_RENEWAL_INTERVAL)?,
    })
}

fn load_simulator_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<SimulatorConfig> {
    let interval_ms = load_number(lookup, "RIDE_SIM_INTERVAL_MS", DEFAULT_INTERVAL.as_millis() as u64)?;
    if interval_ms == 0 {
        return Err(DaemonError::Config("RIDE_SIM_INTERVAL_MS must be positive".to_string()));
    }

    Ok(SimulatorConfig {
        subject: load_subject(lookup, "RIDE_SIM_SUBJECT")?,
        interval: Duration::from_millis(interval_ms),
        route_path: lookup("RIDE_SIM_ROUTE_PATH").map(PathBuf::from),
    })
}

fn load_subject(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> DaemonResult<Option<Subject>> {
    match lookup(key) {
        Some(val) => Subject::new(val)
            .map(Some)
            .map_err(|e| DaemonError::Config(format!("Invalid {}: {}", key, e))),
        None => Ok(None),
    }
}

fn load_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> DaemonResult<Duration> {
    let secs = load_number(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(DaemonError::Config(format!("{} must be positive", key)));
    }
    Ok(Duration::from_secs(secs))
}

fn load_number<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> DaemonResult<T> {
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
        None => Ok(default),
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            ws_url: "ws://127.0.0.1:8080/ws/positions".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionSettings {
                initial_credentials: None,
                credentials_path: None,
                lookahead: DEFAULT_LOOKAHEAD,
                renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            },
            simulator: SimulatorConfig {
                subject: None,
                interval: DEFAULT_INTERVAL,
                route_path: None,
            },
            watch_subject: None,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
