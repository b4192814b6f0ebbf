use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{InterestModel, TermUnit};

/// ledger engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// seconds between penalty sweeps
    pub sweep_interval_secs: u64,
    /// run one sweep as soon as the loan set is first populated
    pub sweep_on_first_load: bool,
    /// a balance at or below this counts as paid
    pub paid_tolerance: Money,
    /// upper bound on any single ledger command
    pub command_timeout_secs: u64,
    pub command_queue_capacity: usize,
    /// prefix used in audit details
    pub currency_symbol: String,
    pub loan_defaults: LoanDefaults,
}

/// loan terms used when the caller does not supply them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanDefaults {
    /// percentage, e.g. 40 for 40%
    pub interest_rate: Decimal,
    pub interest_model: InterestModel,
    pub term_value: u32,
    pub term_unit: TermUnit,
}

impl Default for LoanDefaults {
    fn default() -> Self {
        Self {
            interest_rate: dec!(40),
            interest_model: InterestModel::Flat,
            term_value: 1,
            term_unit: TermUnit::Months,
        }
    }
}

impl LoanDefaults {
    pub fn rate(&self) -> Rate {
        Rate::from_percentage_decimal(self.interest_rate)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            sweep_on_first_load: true,
            paid_tolerance: Money::ONE,
            command_timeout_secs: 30,
            command_queue_capacity: 64,
            currency_symbol: "R".to_string(),
            loan_defaults: LoanDefaults::default(),
        }
    }
}

impl LedgerConfig {
    /// parse from json; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json).map_err(|e| {
            LedgerError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(invalid("sweep_interval_secs must be greater than zero"));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs must be greater than zero"));
        }
        if self.command_queue_capacity == 0 {
            return Err(invalid("command_queue_capacity must be greater than zero"));
        }
        if self.paid_tolerance.is_negative() {
            return Err(invalid("paid_tolerance must not be negative"));
        }
        if self.loan_defaults.interest_rate < Decimal::ZERO {
            return Err(invalid("default interest rate must not be negative"));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// format an amount for audit details, e.g. "R1400.00"
    pub fn format_money(&self, amount: Money) -> String {
        amount.display_with(&self.currency_symbol)
    }
}

fn invalid(message: &str) -> LedgerError {
    LedgerError::InvalidConfiguration {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.paid_tolerance, Money::ONE);
        assert_eq!(config.loan_defaults.rate(), Rate::from_percentage(40));
        assert_eq!(config.loan_defaults.interest_model, InterestModel::Flat);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LedgerConfig::from_json(r#"{"sweep_interval_secs": 5, "currency_symbol": "$"}"#)
            .unwrap();
        assert_eq!(config.sweep_interval_secs, 5);
        assert_eq!(config.currency_symbol, "$");
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.loan_defaults.term_unit, TermUnit::Months);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = LedgerConfig::from_json(r#"{"sweep_interval_secs": 0}"#).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfiguration { .. }));

        let err = LedgerConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfiguration { .. }));

        let config = LedgerConfig {
            paid_tolerance: Money::from_major(-1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_money() {
        let config = LedgerConfig::default();
        assert_eq!(config.format_money(Money::from_major(400)), "R400.00");
    }
}
