pub mod penalty;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::InterestModel;

pub use penalty::{PenaltyDecision, PenaltyEngine};

/// interest calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct InterestCalculation {
    pub principal: Money,
    pub interest_amount: Money,
    pub total_repayment: Money,
    pub model: InterestModel,
    /// number of times the rate was applied
    pub periods: u32,
}

/// trait for repayment-total calculations
pub trait InterestCalculator {
    fn calculate(&self, principal: Money, rate: Rate, term_value: u32) -> Result<InterestCalculation>;
}

/// computes the repayable total for a loan at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestEngine {
    pub model: InterestModel,
}

impl InterestEngine {
    pub fn new(model: InterestModel) -> Self {
        Self { model }
    }

    fn validate(principal: Money, rate: Rate) -> Result<()> {
        if !principal.is_positive() {
            return Err(LedgerError::invalid(format!(
                "principal must be positive, got {}",
                principal
            )));
        }
        if rate.is_negative() {
            return Err(LedgerError::invalid(format!(
                "interest rate must not be negative, got {}",
                rate
            )));
        }
        Ok(())
    }
}

impl InterestCalculator for InterestEngine {
    fn calculate(&self, principal: Money, rate: Rate, term_value: u32) -> Result<InterestCalculation> {
        Self::validate(principal, rate)?;

        let (total_repayment, periods) = match self.model {
            // term length is ignored: one flat fee per loan
            InterestModel::Flat | InterestModel::Simple => {
                (principal + principal.percentage(rate), 1)
            }
            InterestModel::Compound => {
                let total = principal.checked_compound(rate, term_value).ok_or_else(|| {
                    LedgerError::invalid(format!(
                        "compound repayment overflows over {} periods at {}",
                        term_value, rate
                    ))
                })?;
                (total, term_value)
            }
        };

        Ok(InterestCalculation {
            principal,
            interest_amount: total_repayment - principal,
            total_repayment,
            model: self.model,
            periods,
        })
    }
}

/// total repayable amount, kept at full precision
pub fn compute_total_repayment(
    principal: Money,
    rate: Rate,
    model: InterestModel,
    term_value: u32,
) -> Result<Money> {
    InterestEngine::new(model)
        .calculate(principal, rate, term_value)
        .map(|calc| calc.total_repayment)
}
