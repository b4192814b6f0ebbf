use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::model::{Loan, Payment};
use crate::types::{LoanId, LoanStatus, PaymentMethod};

/// payment request
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub loan_id: LoanId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

impl PaymentRequest {
    pub fn new(loan_id: LoanId, amount: Money, method: PaymentMethod) -> Self {
        Self {
            loan_id,
            amount,
            method,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// payment application result
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResult {
    pub payment: Payment,
    pub previous_balance: Money,
    pub new_balance: Money,
    /// part of the payment beyond the balance
    pub excess: Money,
    pub settled: bool,
}

/// applies borrower payments to a loan
#[derive(Debug, Clone, Copy)]
pub struct PaymentProcessor {
    /// a balance at or below this counts as paid
    pub paid_tolerance: Money,
}

impl PaymentProcessor {
    pub fn new(paid_tolerance: Money) -> Self {
        Self { paid_tolerance }
    }

    pub fn validate(&self, loan: &Loan, request: &PaymentRequest) -> Result<()> {
        if !request.amount.is_positive() {
            return Err(LedgerError::invalid(format!(
                "payment amount must be positive, got {}",
                request.amount
            )));
        }
        if !request.method.is_borrower_method() {
            return Err(LedgerError::invalid(
                "penalties are charged by the overdue sweep, not recorded as payments",
            ));
        }
        if loan.is_terminal() {
            return Err(LedgerError::invalid(format!(
                "loan {} is {} and accepts no further payments",
                loan.id, loan.status
            )));
        }
        Ok(())
    }

    /// apply a payment in place.
    ///
    /// Balance never goes below zero. Only reaching the paid tolerance changes the
    /// status here; an overdue loan stays overdue after a partial payment.
    pub fn process(
        &self,
        loan: &mut Loan,
        request: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentResult> {
        self.validate(loan, &request)?;

        let previous_balance = loan.balance;
        let new_balance = (previous_balance - request.amount).max(Money::ZERO);
        let excess = (request.amount - previous_balance).max(Money::ZERO);

        let payment = Payment {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            amount: request.amount,
            date: now,
            method: request.method,
            note: request.note,
        };

        loan.balance = new_balance;
        loan.payments.push(payment.clone());

        let settled = new_balance <= self.paid_tolerance;
        if settled {
            loan.status = LoanStatus::Paid;
        }

        Ok(PaymentResult {
            payment,
            previous_balance,
            new_balance,
            excess,
            settled,
        })
    }
}
