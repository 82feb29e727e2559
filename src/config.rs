//! Application-level configuration loading: scoring constants, timeouts and oracle settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::dao::models::HostRole;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_LIVE_BACK_CONFIG_PATH";

const DEFAULT_REWARD_POINTS: i64 = 10;
const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_millis(8_000);
const DEFAULT_ORACLE_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_ORACLE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_SCRATCH_PATH: &str = "data/host-scratch.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    reward_points: i64,
    transition_timeout: Duration,
    oracle_timeout: Duration,
    oracle_model: String,
    oracle_endpoint: String,
    scratch_path: Option<PathBuf>,
    hosts: Vec<HostSeed>,
}

/// Host identity written to the store whenever a storage connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostSeed {
    /// Identity asserted by the upstream authenticator.
    pub user_id: String,
    /// Privilege granted.
    #[serde(default = "default_seed_role")]
    pub role: HostRole,
}

fn default_seed_role() -> HostRole {
    HostRole::Host
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        reward_points = app_config.reward_points,
                        oracle_model = %app_config.oracle_model,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Defaults without host-local scratch storage, for tests and throwaway servers.
    pub fn ephemeral() -> Self {
        Self {
            scratch_path: None,
            ..Self::default()
        }
    }

    /// Points awarded for a correct auto-scored answer.
    pub fn reward_points(&self) -> i64 {
        self.reward_points
    }

    /// Upper bound for the work attached to a single phase transition.
    pub fn transition_timeout(&self) -> Duration {
        self.transition_timeout
    }

    /// Upper bound for a single cheat-oracle call.
    pub fn oracle_timeout(&self) -> Duration {
        self.oracle_timeout
    }

    /// Generative model queried by the cheat oracle.
    pub fn oracle_model(&self) -> &str {
        &self.oracle_model
    }

    /// Base URL of the generative-language REST API.
    pub fn oracle_endpoint(&self) -> &str {
        &self.oracle_endpoint
    }

    /// File where the host draft survives restarts, if any.
    pub fn scratch_path(&self) -> Option<&PathBuf> {
        self.scratch_path.as_ref()
    }

    /// Host roles provisioned from the configuration file.
    pub fn hosts(&self) -> &[HostSeed] {
        &self.hosts
    }

    /// Same configuration with `hosts` as the provisioned roles.
    pub fn with_hosts(mut self, hosts: Vec<HostSeed>) -> Self {
        self.hosts = hosts;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    reward_points: i64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "transition_timeout_ms")]
    transition_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "oracle_timeout_ms")]
    oracle_timeout: Duration,
    oracle_model: String,
    oracle_endpoint: String,
    scratch_path: Option<PathBuf>,
    hosts: Vec<HostSeed>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            reward_points: DEFAULT_REWARD_POINTS,
            transition_timeout: DEFAULT_TRANSITION_TIMEOUT,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            oracle_model: DEFAULT_ORACLE_MODEL.into(),
            oracle_endpoint: DEFAULT_ORACLE_ENDPOINT.into(),
            scratch_path: Some(PathBuf::from(DEFAULT_SCRATCH_PATH)),
            hosts: Vec::new(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            reward_points: value.reward_points.max(0),
            transition_timeout: value.transition_timeout,
            oracle_timeout: value.oracle_timeout,
            oracle_model: value.oracle_model,
            oracle_endpoint: value.oracle_endpoint.trim_end_matches('/').to_owned(),
            scratch_path: value.scratch_path.filter(|path| !path.as_os_str().is_empty()),
            hosts: value
                .hosts
                .into_iter()
                .filter(|seed| !seed.user_id.trim().is_empty())
                .collect(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"reward_points": 25, "oracle_timeout_ms": 1500}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.reward_points(), 25);
        assert_eq!(config.oracle_timeout(), Duration::from_millis(1_500));
        assert_eq!(config.transition_timeout(), DEFAULT_TRANSITION_TIMEOUT);
        assert_eq!(config.oracle_model(), DEFAULT_ORACLE_MODEL);
    }

    #[test]
    fn host_seeds_default_to_full_host() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"hosts": [{"user_id": "alice"}, {"user_id": "bob", "role": "co_host"}, {"user_id": " "}]}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(
            config.hosts(),
            &[
                HostSeed {
                    user_id: "alice".into(),
                    role: HostRole::Host
                },
                HostSeed {
                    user_id: "bob".into(),
                    role: HostRole::CoHost
                },
            ]
        );
    }

    #[test]
    fn ephemeral_config_has_no_scratch_file() {
        assert!(AppConfig::ephemeral().scratch_path().is_none());
        assert!(AppConfig::default().scratch_path().is_some());
    }
}
