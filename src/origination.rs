use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LoanDefaults;
use crate::dates::compute_due_date;
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::interest::{InterestCalculator, InterestEngine};
use crate::model::{Loan, Signature};
use crate::types::{BorrowerId, InterestModel, LoanStatus, TermUnit};

/// fields supplied when creating a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoan {
    pub borrower_id: BorrowerId,
    pub principal: Money,
    pub interest_rate: Rate,
    pub interest_model: InterestModel,
    pub term_value: u32,
    pub term_unit: TermUnit,
    pub start_date: NaiveDate,
    /// optional; never blocks creation
    pub signature: Option<Signature>,
}

impl NewLoan {
    /// loan on the standard terms (40% flat over one month by default)
    pub fn with_defaults(
        borrower_id: BorrowerId,
        principal: Money,
        start_date: NaiveDate,
        defaults: &LoanDefaults,
    ) -> Self {
        Self {
            borrower_id,
            principal,
            interest_rate: defaults.rate(),
            interest_model: defaults.interest_model,
            term_value: defaults.term_value,
            term_unit: defaults.term_unit,
            start_date,
            signature: None,
        }
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn interest_model(mut self, model: InterestModel) -> Self {
        self.interest_model = model;
        self
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.interest_rate = rate;
        self
    }

    pub fn term(mut self, value: u32, unit: TermUnit) -> Self {
        self.term_value = value;
        self.term_unit = unit;
        self
    }
}

/// build a fresh loan: due date and repayment total derived, balance equal to the
/// total, status active and no payments.
///
/// Borrower existence is checked by the caller, which owns the borrower collection.
pub fn originate_loan(new_loan: NewLoan, now: DateTime<Utc>) -> Result<Loan> {
    let calculation = InterestEngine::new(new_loan.interest_model).calculate(
        new_loan.principal,
        new_loan.interest_rate,
        new_loan.term_value,
    )?;

    Ok(Loan {
        id: Uuid::new_v4(),
        borrower_id: new_loan.borrower_id,
        principal: new_loan.principal,
        interest_rate: new_loan.interest_rate,
        interest_model: new_loan.interest_model,
        term_value: new_loan.term_value,
        term_unit: new_loan.term_unit,
        start_date: new_loan.start_date,
        due_date: compute_due_date(new_loan.start_date),
        status: LoanStatus::Active,
        total_repayment: calculation.total_repayment,
        balance: calculation.total_repayment,
        payments: Vec::new(),
        signature: new_loan.signature.filter(|s| !s.is_empty()),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LedgerError;
    use chrono::TimeZone;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_originate_with_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let borrower = Uuid::new_v4();
        let new_loan = NewLoan::with_defaults(
            borrower,
            Money::from_major(1_000),
            start(),
            &LoanDefaults::default(),
        );

        let loan = originate_loan(new_loan, now).unwrap();

        assert_eq!(loan.borrower_id, borrower);
        assert_eq!(loan.due_date, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        assert_eq!(loan.total_repayment, Money::from_major(1_400));
        assert_eq!(loan.balance, loan.total_repayment);
        assert_eq!(loan.status, LoanStatus::Active);
        assert!(loan.payments.is_empty());
        assert_eq!(loan.created_at, now);
    }

    #[test]
    fn test_originate_compound() {
        let new_loan = NewLoan::with_defaults(
            Uuid::new_v4(),
            Money::from_major(1_000),
            start(),
            &LoanDefaults::default(),
        )
        .interest_model(InterestModel::Compound)
        .rate(Rate::from_percentage(10))
        .term(2, TermUnit::Months);

        let loan = originate_loan(new_loan, Utc::now()).unwrap();
        assert_eq!(loan.total_repayment, Money::from_major(1_210));
    }

    #[test]
    fn test_originate_rejects_bad_principal() {
        let new_loan = NewLoan::with_defaults(
            Uuid::new_v4(),
            Money::ZERO,
            start(),
            &LoanDefaults::default(),
        );
        assert!(matches!(
            originate_loan(new_loan, Utc::now()),
            Err(LedgerError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_empty_signature_dropped() {
        let new_loan = NewLoan::with_defaults(
            Uuid::new_v4(),
            Money::from_major(100),
            start(),
            &LoanDefaults::default(),
        )
        .signature(Signature::png(Vec::new()));

        let loan = originate_loan(new_loan, Utc::now()).unwrap();
        assert!(loan.signature.is_none());
    }
}
