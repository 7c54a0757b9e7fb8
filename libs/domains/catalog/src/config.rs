use core_config::{env_parse_or, ConfigError, FromEnv};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;
pub const DEFAULT_MAX_RENEWALS: u8 = 3;
pub const DEFAULT_FINE_PER_DAY: f64 = 0.50;

/// Lending rules applied by the loan lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Days from loan (or renewal) to due date
    pub loan_period_days: u32,
    /// Renewals allowed per loan, capped at [`DEFAULT_MAX_RENEWALS`]
    pub max_renewals: u8,
    /// Fine per overdue day
    pub fine_per_day: f64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            max_renewals: DEFAULT_MAX_RENEWALS,
            fine_per_day: DEFAULT_FINE_PER_DAY,
        }
    }
}

impl FromEnv for LoanPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let loan_period_days = env_parse_or("LOAN_PERIOD_DAYS", DEFAULT_LOAN_PERIOD_DAYS)?;
        let max_renewals = env_parse_or("LOAN_MAX_RENEWALS", DEFAULT_MAX_RENEWALS)?;
        let fine_per_day = env_parse_or("LOAN_FINE_PER_DAY", DEFAULT_FINE_PER_DAY)?;

        if loan_period_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LOAN_PERIOD_DAYS".to_string(),
                details: "loan period must be at least one day".to_string(),
            });
        }

        if max_renewals > DEFAULT_MAX_RENEWALS {
            return Err(ConfigError::InvalidValue {
                key: "LOAN_MAX_RENEWALS".to_string(),
                details: format!(
                    "at most {DEFAULT_MAX_RENEWALS} renewals are allowed, got {max_renewals}"
                ),
            });
        }

        if !fine_per_day.is_finite() || fine_per_day < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "LOAN_FINE_PER_DAY".to_string(),
                details: format!("fine must be a non-negative amount, got {fine_per_day}"),
            });
        }

        Ok(Self {
            loan_period_days,
            max_renewals,
            fine_per_day,
        })
    }
}
