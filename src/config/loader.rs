//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Sources are layered lowest to highest precedence:
//!
//! 1. compiled defaults ([`WarmupConfig::default`])
//! 2. `<dir>/warmup.toml`
//! 3. `<dir>/warmup.<environment>.toml`
//! 4. `WARMUP_*` environment variables, `__` separating nested keys
//!    (`WARMUP_PROXY__MAX_FAILURES=5`)

use super::error::{ConfigResult, ConfigurationError};
use super::WarmupConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Validated configuration plus the environment it was loaded for
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WarmupConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = crate::logging::get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful in tests that must not touch process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_layered(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = environment,
            max_proxy_failures = config.proxy.max_failures,
            max_concurrent_tasks = config.execution.max_concurrent_tasks,
            "⚙️ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: WarmupConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with secret-looking fields masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn default_config_directory() -> PathBuf {
        std::env::var("WARMUP_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_layered(config_directory: &Path, environment: &str) -> ConfigResult<WarmupConfig> {
        let defaults = Config::try_from(&WarmupConfig::default())?;
        let base_file = config_directory.join("warmup.toml");
        let env_file = config_directory.join(format!("warmup.{environment}.toml"));

        let layered = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file.clone()).required(false))
            .add_source(File::from(env_file.clone()).required(false))
            .add_source(
                Environment::with_prefix("WARMUP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                ConfigurationError::load_error(
                    format!("{} / {}", base_file.display(), env_file.display()),
                    e,
                )
            })?;

        layered
            .try_deserialize::<WarmupConfig>()
            .map_err(|e| ConfigurationError::load_error("merged configuration", e))
    }

    /// Mask fields whose names look sensitive before they reach the logs
    fn sanitize_config_for_logging(config: &WarmupConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "key", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive && !val.is_null() {
                        *val = serde_json::Value::String("[MASKED]".to_string());
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_directory_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("absent")), "test")
                .unwrap();
        assert_eq!(manager.config().proxy.max_failures, 3);
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("warmup.toml"),
            "[proxy]\nmax_failures = 5\nresponse_time_threshold_ms = 800\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("warmup.test.toml"),
            "[proxy]\nmax_failures = 2\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().proxy.max_failures, 2);
        assert_eq!(manager.config().proxy.response_time_threshold_ms, 800);
        assert_eq!(manager.config().retry.retry_delay_seconds, 300);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("warmup.toml"),
            "[execution]\ntask_hard_limit_seconds = 100\ntask_soft_limit_seconds = 200\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitize_masks_sensitive_keys() {
        let mut value = serde_json::json!({
            "proxy": { "password": "hunter2", "host": "10.0.0.1" },
            "api_key": "abc",
        });
        ConfigManager::sanitize_json_recursive(&mut value, &["password", "key"]);
        assert_eq!(value["proxy"]["password"], "[MASKED]");
        assert_eq!(value["proxy"]["host"], "10.0.0.1");
        assert_eq!(value["api_key"], "[MASKED]");
    }
}
