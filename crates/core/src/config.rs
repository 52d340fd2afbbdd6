use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::leave_type::{fixed_default_entitlement, LeaveTypePolicy, LeaveTypeRegistry};
use crate::validation::ValidationLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub evaluator: EvaluatorConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub api_key: Option<SecretString>,
    /// Confidence reported by the primary path when the service omits one.
    pub nominal_confidence: f64,
    /// Confidence of the local fail-closed path; must sit below nominal.
    pub fallback_confidence: f64,
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub default_entitlement_days: f64,
    pub concurrency_ceiling: u32,
    pub allow_negative_balance: bool,
    pub sla_hours: i64,
    pub max_request_days: f64,
    pub document_threshold_days: f64,
    pub blackout_dates: Vec<NaiveDate>,
    pub leave_types: Vec<LeaveTypeEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaveTypeEntry {
    pub code: String,
    #[serde(default = "default_true")]
    pub half_day_allowed: bool,
    #[serde(default)]
    pub requires_document: bool,
    #[serde(default)]
    pub entitlement_days: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub evaluator_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://timeoff.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            evaluator: EvaluatorConfig {
                base_url: "http://localhost:8001".to_string(),
                timeout_secs: 5,
                api_key: None,
                nominal_confidence: 0.9,
                fallback_confidence: 0.6,
            },
            policy: PolicyConfig {
                default_entitlement_days: 12.0,
                concurrency_ceiling: 2,
                allow_negative_balance: false,
                sla_hours: 24,
                max_request_days: 90.0,
                document_threshold_days: 10.0,
                blackout_dates: Vec::new(),
                leave_types: Vec::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("timeoff.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(evaluator) = patch.evaluator {
            if let Some(base_url) = evaluator.base_url {
                self.evaluator.base_url = base_url;
            }
            if let Some(timeout_secs) = evaluator.timeout_secs {
                self.evaluator.timeout_secs = timeout_secs;
            }
            if let Some(api_key) = evaluator.api_key {
                self.evaluator.api_key = Some(api_key.into());
            }
            if let Some(nominal) = evaluator.nominal_confidence {
                self.evaluator.nominal_confidence = nominal;
            }
            if let Some(fallback) = evaluator.fallback_confidence {
                self.evaluator.fallback_confidence = fallback;
            }
        }
        if let Some(policy) = patch.policy {
            if let Some(days) = policy.default_entitlement_days {
                self.policy.default_entitlement_days = days;
            }
            if let Some(ceiling) = policy.concurrency_ceiling {
                self.policy.concurrency_ceiling = ceiling;
            }
            if let Some(allow) = policy.allow_negative_balance {
                self.policy.allow_negative_balance = allow;
            }
            if let Some(hours) = policy.sla_hours {
                self.policy.sla_hours = hours;
            }
            if let Some(days) = policy.max_request_days {
                self.policy.max_request_days = days;
            }
            if let Some(days) = policy.document_threshold_days {
                self.policy.document_threshold_days = days;
            }
            if let Some(dates) = policy.blackout_dates {
                self.policy.blackout_dates = dates;
            }
            if let Some(types) = policy.leave_types {
                self.policy.leave_types = types;
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("TIMEOFF_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("TIMEOFF_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(url) = env::var("TIMEOFF_EVALUATOR_URL") {
            self.evaluator.base_url = url;
        }
        if let Ok(secs) = env::var("TIMEOFF_EVALUATOR_TIMEOUT_SECS") {
            self.evaluator.timeout_secs = secs.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "TIMEOFF_EVALUATOR_TIMEOUT_SECS".to_string(),
                    value: secs.clone(),
                }
            })?;
        }
        if let Ok(key) = env::var("TIMEOFF_EVALUATOR_API_KEY") {
            self.evaluator.api_key = Some(key.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(url) = overrides.evaluator_base_url {
            self.evaluator.base_url = url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation("database.max_connections must be >= 1".into()));
        }
        if self.evaluator.timeout_secs == 0 {
            return Err(ConfigError::Validation("evaluator.timeout_secs must be >= 1".into()));
        }
        for (name, value) in [
            ("evaluator.nominal_confidence", self.evaluator.nominal_confidence),
            ("evaluator.fallback_confidence", self.evaluator.fallback_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!("{name} must be within [0, 1]")));
            }
        }
        if self.evaluator.fallback_confidence >= self.evaluator.nominal_confidence {
            return Err(ConfigError::Validation(
                "evaluator.fallback_confidence must be below nominal_confidence".into(),
            ));
        }
        if self.policy.sla_hours <= 0 {
            return Err(ConfigError::Validation("policy.sla_hours must be positive".into()));
        }
        for (name, value) in [
            ("policy.default_entitlement_days", self.policy.default_entitlement_days),
            ("policy.max_request_days", self.policy.max_request_days),
            ("policy.document_threshold_days", self.policy.document_threshold_days),
        ] {
            if days_from_f64(value).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a non-negative multiple of 0.5, got {value}"
                )));
            }
        }
        if self.policy.max_request_days <= 0.0 {
            return Err(ConfigError::Validation("policy.max_request_days must be positive".into()));
        }
        for entry in &self.policy.leave_types {
            if entry.code.trim().is_empty() {
                return Err(ConfigError::Validation("leave type code must be non-empty".into()));
            }
            if let Some(days) = entry.entitlement_days {
                if days_from_f64(days).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "entitlement for `{}` must be a non-negative multiple of 0.5",
                        entry.code
                    )));
                }
            }
        }
        Ok(())
    }
}

impl PolicyConfig {
    pub fn registry(&self) -> LeaveTypeRegistry {
        let types = self
            .leave_types
            .iter()
            .map(|entry| LeaveTypePolicy {
                code: entry.code.clone(),
                half_day_allowed: entry.half_day_allowed,
                requires_document: entry.requires_document,
                entitlement_days: entry.entitlement_days.and_then(days_from_f64),
            })
            .collect();
        LeaveTypeRegistry::new(types)
    }

    pub fn default_entitlement(&self) -> Decimal {
        days_from_f64(self.default_entitlement_days).unwrap_or_else(fixed_default_entitlement)
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_days: days_from_f64(self.max_request_days).unwrap_or_else(|| Decimal::from(90)),
            document_threshold_days: days_from_f64(self.document_threshold_days)
                .unwrap_or_else(|| Decimal::from(10)),
        }
    }
}

/// Largest day quantity accepted from configuration or arguments. Keeps
/// the half-day conversion far away from integer overflow.
const MAX_DAY_QUANTITY: f64 = 10_000.0;

/// Converts a config-file day count into an exact decimal, accepting only
/// non-negative multiples of 0.5 up to `MAX_DAY_QUANTITY`.
pub fn days_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value < 0.0 || value > MAX_DAY_QUANTITY {
        return None;
    }
    let doubled = value * 2.0;
    if (doubled - doubled.round()).abs() > f64::EPSILON * doubled.abs().max(1.0) {
        return None;
    }
    Some(Decimal::new(doubled.round() as i64 * 5, 1).normalize())
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var("TIMEOFF_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from("timeoff.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    evaluator: Option<EvaluatorPatch>,
    policy: Option<PolicyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EvaluatorPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    api_key: Option<String>,
    nominal_confidence: Option<f64>,
    fallback_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    default_entitlement_days: Option<f64>,
    concurrency_ceiling: Option<u32>,
    allow_negative_balance: Option<bool>,
    sla_hours: Option<i64>,
    max_request_days: Option<f64>,
    document_threshold_days: Option<f64>,
    blackout_dates: Option<Vec<NaiveDate>>,
    leave_types: Option<Vec<LeaveTypeEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
