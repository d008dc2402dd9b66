//! Configuration for the hookbench service.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use hookbench_core::AccessFilter;
use hookbench_forward::ClientConfig;
use serde::{Deserialize, Deserializer, Serialize};

const CONFIG_FILE: &str = "hookbench.toml";

/// Where received callbacks are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStoreKind {
    /// File-backed SQLite database.
    Sqlite,
    /// Process memory, lost on restart.
    Memory,
}

/// Answer given to a GET on the callback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GetResponse {
    /// `405` with a plain-text refusal.
    Reject,
    /// `200` with a JSON acknowledgment.
    Ack,
}

/// Body format of a successful POST response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// `key=value` lines followed by the `Response.*` trailer.
    Plain,
    /// `{"received_data": {...}}`.
    Json,
}

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`hookbench.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use hookbench_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Callbacks served under {}", config.base_path);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Path the callback endpoint is mounted on.
    ///
    /// Environment variable: `BASE_PATH`
    #[serde(default = "default_base_path", alias = "BASE_PATH")]
    pub base_path: String,

    // Storage
    /// Log store backend.
    ///
    /// Environment variable: `LOG_STORE`
    #[serde(default = "default_log_store", alias = "LOG_STORE")]
    pub log_store: LogStoreKind,
    /// SQLite connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,

    // Redirect
    /// Relay requests from non-local callers instead of handling them.
    ///
    /// Environment variable: `REDIRECT_ENABLED`
    #[serde(default, alias = "REDIRECT_ENABLED")]
    pub redirect_enabled: bool,
    /// Destination for relayed requests.
    ///
    /// Environment variable: `REDIRECT_URL`
    #[serde(default, alias = "REDIRECT_URL")]
    pub redirect_url: Option<String>,

    // Access
    /// Enforce the source address allow-list.
    ///
    /// Environment variable: `IP_PROTECTION_ENABLED`
    #[serde(default, alias = "IP_PROTECTION_ENABLED")]
    pub ip_protection_enabled: bool,
    /// Allowed addresses or CIDR blocks.
    ///
    /// Environment variable: `ALLOWED_IPS` (comma-separated)
    #[serde(default, alias = "ALLOWED_IPS", deserialize_with = "comma_list")]
    pub allowed_ips: Vec<String>,

    // Forwarding
    /// Destination for background forwarding. Forwarding is off when unset.
    ///
    /// Environment variable: `FORWARD_URL`
    #[serde(default, alias = "FORWARD_URL")]
    pub forward_url: Option<String>,
    /// Timeout for one forwarding request in seconds.
    ///
    /// Environment variable: `FORWARD_TIMEOUT_SECONDS`
    #[serde(default = "default_forward_timeout", alias = "FORWARD_TIMEOUT_SECONDS")]
    pub forward_timeout_seconds: u64,

    // Responses
    /// Answer given to GET requests.
    ///
    /// Environment variable: `GET_RESPONSE`
    #[serde(default = "default_get_response", alias = "GET_RESPONSE")]
    pub get_response: GetResponse,
    /// Body format for POST responses.
    ///
    /// Environment variable: `RESPONSE_FORMAT`
    #[serde(default = "default_response_format", alias = "RESPONSE_FORMAT")]
    pub response_format: ResponseFormat,

    /// Path to a key file. Read once at startup; never validated.
    ///
    /// Environment variable: `KEY_PATH`
    #[serde(default, alias = "KEY_PATH")]
    pub key_path: Option<String>,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the merged values
    /// fail validation.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Request timeout applied to every inbound request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Forwarding destination, if forwarding is on.
    pub fn forward_url(&self) -> Option<&str> {
        non_empty(self.forward_url.as_deref())
    }

    /// Relay destination, if redirecting is on.
    pub fn redirect_target(&self) -> Option<&str> {
        if self.redirect_enabled {
            non_empty(self.redirect_url.as_deref())
        } else {
            None
        }
    }

    /// Builds the source address gate.
    pub fn access_filter(&self) -> AccessFilter {
        AccessFilter::from_config(self.ip_protection_enabled, &self.allowed_ips)
    }

    /// Convert to forwarding client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.forward_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if !self.base_path.starts_with('/') || self.base_path.ends_with('/') {
            anyhow::bail!("base_path must start with '/' and must not end with '/'");
        }

        if self.redirect_enabled && self.redirect_target().is_none() {
            anyhow::bail!("redirect_url is required when redirect_enabled is set");
        }

        let urls = [("redirect_url", self.redirect_target()), ("forward_url", self.forward_url())];
        for (name, url) in urls {
            if url.is_some_and(|url| !(url.starts_with("http://") || url.starts_with("https://"))) {
                anyhow::bail!("{name} must be an http:// or https:// URL");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            base_path: default_base_path(),
            log_store: default_log_store(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            redirect_enabled: false,
            redirect_url: None,
            ip_protection_enabled: false,
            allowed_ips: Vec::new(),
            forward_url: None,
            forward_timeout_seconds: default_forward_timeout(),
            get_response: default_get_response(),
            response_format: default_response_format(),
            key_path: None,
            rust_log: default_log_level(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts either a list or a comma-separated string.
fn comma_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        String(String),
    }

    let entries = match ListOrString::deserialize(deserializer)? {
        ListOrString::List(entries) => entries,
        ListOrString::String(joined) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(entries.into_iter().map(|e| e.trim().to_string()).filter(|e| !e.is_empty()).collect())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_base_path() -> String {
    "/testcallback2".to_string()
}

fn default_log_store() -> LogStoreKind {
    LogStoreKind::Sqlite
}

fn default_database_url() -> String {
    "sqlite://hookbench.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_forward_timeout() -> u64 {
    hookbench_forward::DEFAULT_TIMEOUT_SECONDS
}

fn default_get_response() -> GetResponse {
    GetResponse::Reject
}

fn default_response_format() -> ResponseFormat {
    ResponseFormat::Plain
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, sync::Mutex};

    use serial_test::serial;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        vars: Vec<String>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self { _lock: lock, vars: Vec::new(), originals: HashMap::new() }
        }

        fn set_var(&mut self, key: &str, value: &str) {
            if !self.vars.contains(&key.to_string()) {
                self.originals.insert(key.to_string(), env::var(key).ok());
                self.vars.push(key.to_string());
            }
            env::set_var(key, value);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                match self.originals.get(var) {
                    Some(Some(value)) => env::set_var(var, value),
                    Some(None) => env::remove_var(var),
                    None => {},
                }
            }
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.base_path, "/testcallback2");
        assert_eq!(config.log_store, LogStoreKind::Sqlite);
        assert_eq!(config.get_response, GetResponse::Reject);
        assert_eq!(config.response_format, ResponseFormat::Plain);
        assert!(config.forward_url().is_none());
        assert!(config.redirect_target().is_none());
        assert!(!config.access_filter().is_enabled());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("PORT", "9191");
        guard.set_var("BASE_PATH", "/hooks/in");
        guard.set_var("LOG_STORE", "memory");
        guard.set_var("IP_PROTECTION_ENABLED", "true");
        guard.set_var("ALLOWED_IPS", "10.0.0.1, 192.168.0.0/16,testclient");
        guard.set_var("FORWARD_URL", "http://sink.internal/collect");
        guard.set_var("FORWARD_TIMEOUT_SECONDS", "7");
        guard.set_var("GET_RESPONSE", "ack");
        guard.set_var("RESPONSE_FORMAT", "json");

        let config = Config::load().expect("Config should load with env overrides");

        assert_eq!(config.port, 9191);
        assert_eq!(config.base_path, "/hooks/in");
        assert_eq!(config.log_store, LogStoreKind::Memory);
        assert_eq!(config.allowed_ips, vec!["10.0.0.1", "192.168.0.0/16", "testclient"]);
        assert_eq!(config.forward_url(), Some("http://sink.internal/collect"));
        assert_eq!(config.to_client_config().timeout, Duration::from_secs(7));
        assert_eq!(config.get_response, GetResponse::Ack);
        assert_eq!(config.response_format, ResponseFormat::Json);

        let filter = config.access_filter();
        assert!(filter.is_allowed("192.168.4.4"));
        assert!(filter.is_allowed("testclient"));
        assert!(!filter.is_allowed("10.0.0.2"));
    }

    #[test]
    #[serial]
    fn single_allowed_ip_from_env() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("ALLOWED_IPS", "127.0.0.1");

        let config = Config::load().expect("Config should load");

        assert_eq!(config.allowed_ips, vec!["127.0.0.1"]);
    }

    #[test]
    #[serial]
    fn redirect_without_url_is_rejected() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("REDIRECT_ENABLED", "true");
        guard.set_var("REDIRECT_URL", "");

        assert!(Config::load().is_err());
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.database_max_connections = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.base_path = "testcallback2".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.base_path = "/testcallback2/".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.forward_url = Some("ftp://files.example".to_string());
        assert!(config.validate().is_err());

        config = Config::default();
        config.redirect_enabled = true;
        config.redirect_url = Some("https://upstream.example/cb".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.redirect_target(), Some("https://upstream.example/cb"));
    }

    #[test]
    fn redirect_url_ignored_while_disabled() {
        let config = Config {
            redirect_url: Some("https://upstream.example".to_string()),
            ..Config::default()
        };
        assert!(config.redirect_target().is_none());
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { host: "127.0.0.1".to_string(), port: 9000, ..Config::default() };

        let addr = config.parse_server_addr().expect("Should parse socket address");

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
