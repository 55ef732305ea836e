use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use glossgate_core::Policy;

use crate::service::Evaluator;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub desktop: DesktopConfig,
    pub engine: EngineConfig,
    pub policy: PolicyConfig,
    pub log: LogConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Offline deployments that multiplex sessions behind one transport identity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluator: Evaluator,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub anonymous_subjects: BTreeSet<String>,
    pub public_subjects: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    pub otlp_endpoint: String,
    pub service_name: String,
    pub sample_rate: f64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/glossgate".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let policy = Policy::default();
        Self {
            anonymous_subjects: policy.anonymous_subjects,
            public_subjects: policy.public_subjects,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "glossgate".to_string(),
            sample_rate: 1.0,
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GLOSSGATE_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_DATABASE_MAX_CONNECTIONS")
            && let Ok(n) = v.parse()
        {
            self.database.max_connections = n;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_DESKTOP_ENABLED")
            && let Ok(enabled) = v.parse()
        {
            self.desktop.enabled = enabled;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_ENGINE_EVALUATOR")
            && let Ok(evaluator) = v.parse()
        {
            self.engine.evaluator = evaluator;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("GLOSSGATE_TRACING_ENABLED")
            && let Ok(enabled) = v.parse()
        {
            self.tracing.enabled = enabled;
        }
        if let Ok(v) = std::env::var("GLOSSGATE_TRACING_OTLP_ENDPOINT") {
            self.tracing.otlp_endpoint = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tracing.sample_rate) {
            return Err(ConfigError::Validation(
                "tracing.sample_rate must be between 0.0 and 1.0".to_string(),
            ));
        }
        if let Some(subject) = self
            .policy
            .public_subjects
            .iter()
            .chain(self.policy.anonymous_subjects.iter())
            .find(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "policy subjects must be non-empty, got '{subject}'"
            )));
        }
        Ok(())
    }

    pub fn to_policy(&self) -> Policy {
        Policy::new(
            self.policy.anonymous_subjects.iter().cloned(),
            self.policy.public_subjects.iter().cloned(),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
