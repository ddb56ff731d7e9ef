//! Application-level configuration loading: listening port, match store
//! backend and the optional tournament result webhook.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PONG_ARENA_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where finished matches are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    /// Keep records in process memory only.
    Memory,
    /// Persist into MongoDB.
    Mongo {
        uri: String,
        /// Database name; falls back to the one in the URI, then to `pong`.
        database: Option<String>,
    },
}

/// Tournament service endpoint receiving bracket match results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentWebhookSettings {
    /// Service root; result paths are appended to it.
    pub base_url: String,
    /// Bearer token sent with every result.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    port: u16,
    store: StoreSettings,
    tournament_webhook: Option<TournamentWebhookSettings>,
}

impl AppConfig {
    /// Load the configuration file, then apply environment overrides.
    ///
    /// A missing or unreadable file is not fatal: built-in defaults are used.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    Some(raw)
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    None
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                None
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                None
            }
        };

        Self::from_sources(raw.unwrap_or_default(), |key| env::var(key).ok())
    }

    /// Merge a parsed file with environment variables read through `lookup`.
    fn from_sources(raw: RawConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = var("PORT")
            .or_else(|| var("SERVER_PORT"))
            .and_then(|value| match value.parse::<u16>() {
                Ok(port) => Some(port),
                Err(err) => {
                    warn!(%value, error = %err, "ignoring invalid port override");
                    None
                }
            })
            .or(raw.port)
            .unwrap_or(DEFAULT_PORT);

        let raw_store = raw.store.unwrap_or_default();
        let kind = var("MATCH_STORE")
            .and_then(|value| match value.to_ascii_lowercase().as_str() {
                "memory" => Some(RawStoreKind::Memory),
                "mongo" | "mongodb" => Some(RawStoreKind::Mongo),
                _ => {
                    warn!(%value, "ignoring unknown MATCH_STORE value");
                    None
                }
            })
            .or(raw_store.kind)
            .unwrap_or(RawStoreKind::Mongo);
        let store = match kind {
            RawStoreKind::Memory => StoreSettings::Memory,
            RawStoreKind::Mongo => StoreSettings::Mongo {
                uri: var("MONGO_URI")
                    .or(raw_store.uri)
                    .unwrap_or_else(|| DEFAULT_MONGO_URI.into()),
                database: var("MONGO_DB").or(raw_store.database),
            },
        };

        let raw_webhook = raw.tournament_webhook.unwrap_or_default();
        let tournament_webhook = var("TOURNAMENT_RESULT_URL")
            .or(raw_webhook.base_url)
            .map(|base_url| TournamentWebhookSettings {
                base_url: base_url.trim_end_matches('/').to_owned(),
                token: var("TOURNAMENT_RESULT_TOKEN").or(raw_webhook.token),
                timeout: raw_webhook
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT),
            });

        Self {
            port,
            store,
            tournament_webhook,
        }
    }

    /// TCP port the HTTP server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> &StoreSettings {
        &self.store
    }

    /// Tournament webhook endpoint, when result submission is configured.
    pub fn tournament_webhook(&self) -> Option<&TournamentWebhookSettings> {
        self.tournament_webhook.as_ref()
    }
}

/// In-process defaults: memory store, no webhook. Used by tests and tooling.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreSettings::Memory,
            tournament_webhook: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    store: Option<RawStore>,
    tournament_webhook: Option<RawWebhook>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStore {
    kind: Option<RawStoreKind>,
    uri: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawStoreKind {
    Memory,
    Mongo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebhook {
    base_url: Option<String>,
    token: Option<String>,
    timeout_ms: Option<u64>,
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
    use std::collections::HashMap;

    use super::*;

    fn config(file: &str, vars: &[(&str, &str)]) -> AppConfig {
        let raw: RawConfig = serde_json::from_str(file).unwrap();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_sources(raw, |key| vars.get(key).cloned())
    }

    #[test]
    fn empty_sources_use_mongo_on_default_port() {
        let config = config("{}", &[]);
        assert_eq!(config.port(), 8080);
        assert_eq!(
            config.store(),
            &StoreSettings::Mongo {
                uri: DEFAULT_MONGO_URI.into(),
                database: None,
            }
        );
        assert!(config.tournament_webhook().is_none());
    }

    #[test]
    fn file_values_are_used_when_env_is_silent() {
        let config = config(
            r#"{
                "port": 9000,
                "store": {"kind": "mongo", "uri": "mongodb://db:27017", "database": "arena"},
                "tournamentWebhook": {"baseUrl": "http://tournaments:4000/", "timeoutMs": 250}
            }"#,
            &[],
        );
        assert_eq!(config.port(), 9000);
        assert_eq!(
            config.store(),
            &StoreSettings::Mongo {
                uri: "mongodb://db:27017".into(),
                database: Some("arena".into()),
            }
        );
        let webhook = config.tournament_webhook().unwrap();
        assert_eq!(webhook.base_url, "http://tournaments:4000");
        assert_eq!(webhook.token, None);
        assert_eq!(webhook.timeout, Duration::from_millis(250));
    }

    #[test]
    fn environment_overrides_file() {
        let config = config(
            r#"{"port": 9000, "store": {"kind": "mongo"}}"#,
            &[
                ("SERVER_PORT", "7000"),
                ("MATCH_STORE", "memory"),
                ("TOURNAMENT_RESULT_URL", "http://t"),
                ("TOURNAMENT_RESULT_TOKEN", "secret"),
            ],
        );
        assert_eq!(config.port(), 7000);
        assert_eq!(config.store(), &StoreSettings::Memory);
        let webhook = config.tournament_webhook().unwrap();
        assert_eq!(webhook.token.as_deref(), Some("secret"));
        assert_eq!(webhook.timeout, DEFAULT_WEBHOOK_TIMEOUT);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let config = config(
            r#"{"port": 9000}"#,
            &[("PORT", "not-a-port"), ("MATCH_STORE", "redis"), ("MONGO_DB", " ")],
        );
        assert_eq!(config.port(), 9000);
        assert!(matches!(
            config.store(),
            StoreSettings::Mongo { database: None, .. }
        ));
    }
}
