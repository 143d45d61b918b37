//! Engine configuration

use serde::{Deserialize, Serialize};
use std::env;

/// Tunables shared by every service of the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many adjustments a balance snapshot carries
    pub recent_adjustments_limit: u32,
    /// Page size used when the caller does not pick one
    pub default_page_size: u32,
    /// Upper bound for any requested page size
    pub max_page_size: u32,
    /// Prefix of payroll document numbers (`{prefix}-{MM}/{YYYY}-{employeeId}`)
    pub payroll_document_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recent_adjustments_limit: 10,
            default_page_size: 20,
            max_page_size: 100,
            payroll_document_prefix: "FOLHA".to_string(),
        }
    }
}

/// Errors raised while reading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

impl EngineConfig {
    /// Build a configuration from `LEDGER_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let recent_adjustments_limit =
            read_u32("LEDGER_RECENT_ADJUSTMENTS", defaults.recent_adjustments_limit)?;
        let default_page_size = read_u32("LEDGER_DEFAULT_PAGE_SIZE", defaults.default_page_size)?;
        let max_page_size = read_u32("LEDGER_MAX_PAGE_SIZE", defaults.max_page_size)?;

        let payroll_document_prefix = match env::var("LEDGER_PAYROLL_PREFIX") {
            Ok(value) if value.trim().is_empty() => {
                return Err(ConfigError::Empty("LEDGER_PAYROLL_PREFIX"))
            }
            Ok(value) => value.trim().to_string(),
            Err(_) => defaults.payroll_document_prefix,
        };

        Ok(Self {
            recent_adjustments_limit,
            default_page_size,
            max_page_size,
            payroll_document_prefix,
        })
    }

    /// Page request used when the caller passes none
    pub fn default_page(&self) -> crate::types::PageRequest {
        crate::types::PageRequest::new(1, self.default_page_size)
    }
}

fn read_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.recent_adjustments_limit, 10);
        assert_eq!(config.payroll_document_prefix, "FOLHA");
        assert_eq!(config.default_page().limit, 20);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "max_page_size": 50 }"#).unwrap();
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 20);
    }

    const VARS: [&str; 4] = [
        "LEDGER_RECENT_ADJUSTMENTS",
        "LEDGER_DEFAULT_PAGE_SIZE",
        "LEDGER_MAX_PAGE_SIZE",
        "LEDGER_PAYROLL_PREFIX",
    ];

    fn clear_env() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    // Every LEDGER_* case lives in this one test so no other test races the environment
    #[test]
    fn test_from_env() {
        clear_env();
        assert_eq!(EngineConfig::from_env().unwrap(), EngineConfig::default());

        env::set_var("LEDGER_MAX_PAGE_SIZE", "50");
        env::set_var("LEDGER_PAYROLL_PREFIX", " PAYROLL ");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.payroll_document_prefix, "PAYROLL");
        assert_eq!(config.default_page_size, 20);

        for bad in ["abc", "0", "-3"] {
            env::set_var("LEDGER_MAX_PAGE_SIZE", bad);
            assert!(matches!(
                EngineConfig::from_env(),
                Err(ConfigError::InvalidNumber { name: "LEDGER_MAX_PAGE_SIZE", .. })
            ));
        }
        env::remove_var("LEDGER_MAX_PAGE_SIZE");

        env::set_var("LEDGER_PAYROLL_PREFIX", "   ");
        assert!(matches!(
            EngineConfig::from_env(),
            Err(ConfigError::Empty("LEDGER_PAYROLL_PREFIX"))
        ));

        clear_env();
    }
}
