//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. insight-gateway.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;
use crate::orchestration::AggregationStrategy;

/// Main configuration for insight-gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Orchestration configuration
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Status tracker configuration
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the HTTP API server
    #[serde(default = "default_port")]
    pub port: u16,

    /// API key for HTTP API authentication (unset allows all requests)
    pub api_key: Option<String>,

    /// Allowed CORS origins; empty means permissive
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: None,
            allowed_origins: None,
        }
    }
}

/// Orchestrator tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Maximum agents dispatched concurrently per run
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Per-agent invocation timeout, also the flat inter-retry delay
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,

    /// Retries per agent after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How per-agent results are combined
    #[serde(default)]
    pub result_aggregation: AggregationStrategy,

    /// Whether aggregates are cached by analysis id
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Cache entry time-to-live
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Advisory only: dispatch does not schedule on priority
    #[serde(default)]
    pub priority_enabled: bool,

    /// Kind tags substituted when a request names none
    #[serde(default = "default_analyze_by_default")]
    pub analyze_by_default: Vec<String>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            agent_timeout_ms: default_agent_timeout_ms(),
            max_retries: default_max_retries(),
            result_aggregation: AggregationStrategy::default(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl_secs(),
            priority_enabled: false,
            analyze_by_default: default_analyze_by_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// How long terminal status entries are retained before eviction
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval of the background eviction sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_max_concurrent_agents() -> usize {
    4
}

fn default_agent_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_analyze_by_default() -> Vec<String> {
    vec!["sentiment".to_string()]
}

fn default_db_path() -> String {
    "data/insight-gateway.db".to_string()
}

fn default_retention_secs() -> u64 {
    3_600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // '}' を消費
                        break;
                    }
                    var_name.push(c);
                    chars.next();
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// 既存の環境変数が最終的に優先されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let toml_content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded = Self::expand_env_vars(&toml_content);

        let mut config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables and defaults only
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file path, falling back to env/defaults
    pub fn load(path: Option<&str>) -> crate::Result<Self> {
        match path {
            Some(p) => Self::from_toml_file(p),
            None => {
                let default_path = "insight-gateway.toml";
                if Path::new(default_path).exists() {
                    Self::from_toml_file(default_path)
                } else {
                    Self::from_env()
                }
            }
        }
    }

    /// 環境変数で設定を上書きする（環境変数が優先）
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("API_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(key) = std::env::var("API_KEY") {
            if !key.is_empty() {
                self.server.api_key = Some(key);
            }
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.storage.db_path = path;
            }
        }
        if let Ok(timeout) = std::env::var("AGENT_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.orchestration.agent_timeout_ms = timeout;
            }
        }
        if let Ok(retries) = std::env::var("MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.orchestration.max_retries = retries;
            }
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if self.orchestration.max_concurrent_agents == 0 {
            return Err(Error::Config(
                "orchestration.max_concurrent_agents must be positive".to_string(),
            ));
        }
        if self.orchestration.agent_timeout_ms == 0 {
            return Err(Error::Config(
                "orchestration.agent_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.orchestration.max_concurrent_agents, 4);
        assert_eq!(config.orchestration.max_retries, 2);
        assert!(config.orchestration.cache_enabled);
        assert_eq!(config.status.retention_secs, 3_600);
        assert_eq!(
            config.orchestration.result_aggregation,
            AggregationStrategy::Simple
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [server]
            port = 8080

            [orchestration]
            max_retries = 5
            result_aggregation = "confidence"

            [storage]
            db_path = "/tmp/insight-test.db"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.orchestration.max_retries, 5);
        assert_eq!(
            config.orchestration.result_aggregation,
            AggregationStrategy::Confidence
        );
        assert_eq!(config.storage.db_path, "/tmp/insight-test.db");
        // Unspecified sections keep their defaults
        assert_eq!(config.orchestration.max_concurrent_agents, 4);
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("INSIGHT_TEST_VALUE", "expanded");
        }
        let result = Config::expand_env_vars("prefix-${INSIGHT_TEST_VALUE}-suffix");
        assert_eq!(result, "prefix-expanded-suffix");

        let missing = Config::expand_env_vars("x${INSIGHT_TEST_MISSING_VAR}y");
        assert_eq!(missing, "xy");
    }

    #[test]
    fn test_env_override_wins() {
        unsafe {
            std::env::set_var("MAX_RETRIES", "7");
        }
        let config = Config::from_env().unwrap();
        assert_eq!(config.orchestration.max_retries, 7);
        unsafe {
            std::env::remove_var("MAX_RETRIES");
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.orchestration.max_concurrent_agents = 0;
        assert!(config.validate().is_err());
    }
}
