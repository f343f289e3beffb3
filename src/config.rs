//! Engine configuration: JSON file plus `GIVEBOX_*` environment overrides.
//!
//! ```json
//! {
//!   "minShare": "0.20",
//!   "minGross": "5.00",
//!   "amountStep": "5.00",
//!   "capacityMode": "slots",
//!   "setupSchedule": "tiered",
//!   "reviewSchedule": "blended",
//!   "backend": { "baseUrl": "https://api.example.org/v1", "timeoutSecs": 30 }
//! }
//! ```

use crate::capacity::{CapacityCalculator, MIN_SHARE};
use crate::fees::{FeeSchedule, FeeScheduleKind};
use crate::money::{Money, AMOUNT_STEP, MIN_GROSS};
use crate::validator::{AllocationValidator, CapacityMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    /// The file could not be read.
    Io(String),
    #[error("config parse error: {0}")]
    /// The file or an override could not be parsed.
    Parse(String),
    #[error("invalid config: {0}")]
    /// A value is out of range.
    Invalid(String),
}

/// Where the donation backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL that endpoint paths are appended to.
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token; only ever taken from `GIVEBOX_API_TOKEN`.
    #[serde(skip)]
    pub api_token: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Engine-wide tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Minimum per-beneficiary share used for capacity.
    pub min_share: Money,
    /// Smallest gross amount.
    pub min_gross: Money,
    /// Amount +/- increment.
    pub amount_step: Money,
    /// How beneficiaries are counted against capacity.
    pub capacity_mode: CapacityMode,
    /// Schedule used while setting up a box and validating changes.
    pub setup_schedule: FeeScheduleKind,
    /// Schedule used on review and checkout summaries.
    pub review_schedule: FeeScheduleKind,
    /// Backend location, when remote calls are made.
    pub backend: Option<BackendConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_share: MIN_SHARE,
            min_gross: MIN_GROSS,
            amount_step: AMOUNT_STEP,
            capacity_mode: CapacityMode::Slots,
            setup_schedule: FeeScheduleKind::Tiered,
            review_schedule: FeeScheduleKind::Blended,
            backend: None,
        }
    }
}

impl EngineConfig {
    /// Loads `path` (or defaults when `None`) and applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON config file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `GIVEBOX_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(raw) = get("GIVEBOX_MIN_SHARE") {
            self.min_share = parse_money("GIVEBOX_MIN_SHARE", &raw)?;
        }
        if let Some(raw) = get("GIVEBOX_MIN_GROSS") {
            self.min_gross = parse_money("GIVEBOX_MIN_GROSS", &raw)?;
        }
        if let Some(raw) = get("GIVEBOX_AMOUNT_STEP") {
            self.amount_step = parse_money("GIVEBOX_AMOUNT_STEP", &raw)?;
        }
        if let Some(raw) = get("GIVEBOX_CAPACITY_MODE") {
            self.capacity_mode = match raw.trim() {
                "slots" => CapacityMode::Slots,
                "expanded_causes" | "expanded" => CapacityMode::ExpandedCauses,
                other => {
                    return Err(ConfigError::Parse(format!(
                        "GIVEBOX_CAPACITY_MODE: unknown mode {other}"
                    )))
                }
            };
        }
        if let Some(raw) = get("GIVEBOX_SETUP_SCHEDULE") {
            self.setup_schedule = raw.parse().map_err(ConfigError::Parse)?;
        }
        if let Some(raw) = get("GIVEBOX_REVIEW_SCHEDULE") {
            self.review_schedule = raw.parse().map_err(ConfigError::Parse)?;
        }
        if let Some(url) = get("GIVEBOX_BACKEND_URL") {
            match self.backend.as_mut() {
                Some(backend) => backend.base_url = url,
                None => {
                    self.backend = Some(BackendConfig {
                        base_url: url,
                        timeout_secs: DEFAULT_TIMEOUT_SECS,
                        api_token: None,
                    })
                }
            }
        }
        if let (Some(token), Some(backend)) = (get("GIVEBOX_API_TOKEN"), self.backend.as_mut()) {
            backend.api_token = Some(token);
        }
        Ok(())
    }

    /// Rejects non-positive limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("minShare", self.min_share),
            ("minGross", self.min_gross),
            ("amountStep", self.amount_step),
        ] {
            if value <= Decimal::ZERO {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if let Some(backend) = &self.backend {
            if backend.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.baseUrl is empty".into()));
            }
        }
        Ok(())
    }

    /// Validator configured with this config's minimum share and mode.
    pub fn validator(&self) -> AllocationValidator {
        AllocationValidator::new(CapacityCalculator::new(self.min_share), self.capacity_mode)
    }

    /// Schedule for box setup and change validation.
    pub fn setup_schedule(&self) -> Box<dyn FeeSchedule> {
        self.setup_schedule.schedule()
    }

    /// Schedule for review and checkout summaries.
    pub fn review_schedule(&self) -> Box<dyn FeeSchedule> {
        self.review_schedule.schedule()
    }
}

fn parse_money(key: &str, raw: &str) -> Result<Money, ConfigError> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|err| ConfigError::Parse(format!("{key}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("{name}_{nanos}.json"));
        path
    }

    #[test]
    fn defaults_match_engine_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.min_share, dec!(0.20));
        assert_eq!(config.min_gross, dec!(5));
        assert_eq!(config.setup_schedule, FeeScheduleKind::Tiered);
        assert_eq!(config.review_schedule, FeeScheduleKind::Blended);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_and_partial_documents() {
        let path = temp_path("givebox_config");
        fs::write(
            &path,
            r#"{"minShare":"0.50","capacityMode":"expanded_causes","backend":{"baseUrl":"http://localhost:8080"}}"#,
        )
        .unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.min_share, dec!(0.50));
        assert_eq!(config.min_gross, dec!(5));
        assert_eq!(config.capacity_mode, CapacityMode::ExpandedCauses);
        let backend = config.backend.unwrap();
        assert_eq!(backend.timeout_secs, 30);
        assert_eq!(backend.api_token, None);
    }

    #[test]
    fn environment_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("GIVEBOX_MIN_SHARE", "1.5"),
            ("GIVEBOX_SETUP_SCHEDULE", "blended"),
            ("GIVEBOX_BACKEND_URL", "https://donate.test"),
            ("GIVEBOX_API_TOKEN", "secret"),
            ("GIVEBOX_AMOUNT_STEP", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.min_share, dec!(1.5));
        assert_eq!(config.amount_step, dec!(5));
        assert_eq!(config.setup_schedule, FeeScheduleKind::Blended);
        let backend = config.backend.unwrap();
        assert_eq!(backend.base_url, "https://donate.test");
        assert_eq!(backend.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn bad_override_is_a_parse_error() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|key| (key == "GIVEBOX_MIN_GROSS").then(|| "five".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn non_positive_limits_are_invalid() {
        let config = EngineConfig {
            min_share: dec!(0),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
