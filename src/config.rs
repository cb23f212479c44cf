use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// what edit/delete do to the installment a payment settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InstallmentLinkPolicy {
    /// installments keep their settled snapshot whatever happens to the payment
    #[default]
    Detached,
    /// delete re-opens the linked installment, edit refreshes its paid snapshot
    Reopen,
}

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// longest window a daily collection report may cover
    pub max_report_days: u32,
    /// optimistic commit attempts before a transaction is aborted
    pub max_transaction_attempts: u32,
    /// decimal places for EMI derivation and report totals
    pub currency_decimal_places: u32,
    pub installment_link: InstallmentLinkPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_report_days: 90,
            max_transaction_attempts: 5,
            currency_decimal_places: 2,
            installment_link: InstallmentLinkPolicy::Detached,
        }
    }
}

impl LedgerConfig {
    /// parse from json, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json).map_err(|e| {
            LedgerError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_installment_link(mut self, policy: InstallmentLinkPolicy) -> Self {
        self.installment_link = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_report_days == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "max_report_days must be at least 1".to_string(),
            });
        }
        if self.max_transaction_attempts == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "max_transaction_attempts must be at least 1".to_string(),
            });
        }
        if self.currency_decimal_places > 8 {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "currency_decimal_places {} exceeds 8",
                    self.currency_decimal_places
                ),
            });
        }
        Ok(())
    }
}
