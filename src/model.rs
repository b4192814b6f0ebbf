use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{
    AuditAction, AuditLogId, BorrowerId, InterestModel, LoanId, LoanStatus, PaymentId,
    PaymentMethod, RiskLevel, TermUnit,
};

/// borrower record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub name: String,
    pub phone: String,
    pub id_number: String,
    pub notes: String,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

/// fields supplied when adding a borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewBorrower {
    pub name: String,
    pub phone: String,
    pub id_number: String,
    pub notes: String,
    pub risk_level: RiskLevel,
}

impl NewBorrower {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::invalid("borrower name must not be blank"));
        }
        Ok(())
    }

    pub fn into_borrower(self, id: BorrowerId, created_at: DateTime<Utc>) -> Borrower {
        Borrower {
            id,
            name: self.name,
            phone: self.phone,
            id_number: self.id_number,
            notes: self.notes,
            risk_level: self.risk_level,
            created_at,
        }
    }
}

/// partial borrower update; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BorrowerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub notes: Option<String>,
    pub risk_level: Option<RiskLevel>,
}

impl BorrowerUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.id_number.is_none()
            && self.notes.is_none()
            && self.risk_level.is_none()
    }

    /// apply onto a copy of `borrower`
    pub fn apply_to(&self, borrower: &Borrower) -> Result<Borrower> {
        let mut updated = borrower.clone();
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(LedgerError::invalid("borrower name must not be blank"));
            }
            updated.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            updated.phone = phone.clone();
        }
        if let Some(id_number) = &self.id_number {
            updated.id_number = id_number.clone();
        }
        if let Some(notes) = &self.notes {
            updated.notes = notes.clone();
        }
        if let Some(risk_level) = self.risk_level {
            updated.risk_level = risk_level;
        }
        Ok(updated)
    }
}

/// opaque still-image blob captured when the borrower signs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Signature {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            content_type: "image/png".to_string(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// a payment, or a penalty charge when `method` is `Penalty`.
///
/// Borrower payments carry a positive amount; penalties carry the negated charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

impl Payment {
    pub fn is_penalty(&self) -> bool {
        self.method == PaymentMethod::Penalty
    }
}

/// loan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub principal: Money,
    /// rate applied once per period
    pub interest_rate: Rate,
    pub interest_model: InterestModel,
    pub term_value: u32,
    pub term_unit: TermUnit,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: LoanStatus,
    /// principal plus interest, raised by each penalty
    pub total_repayment: Money,
    pub balance: Money,
    pub payments: Vec<Payment>,
    pub signature: Option<Signature>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// sum of borrower payments (penalties excluded)
    pub fn total_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| !p.is_penalty())
            .map(|p| p.amount)
            .sum()
    }

    /// sum of penalty charges as a positive amount
    pub fn total_penalties(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.is_penalty())
            .map(|p| p.amount.abs())
            .sum()
    }

    /// sum of every recorded amount, penalties included with their sign
    pub fn net_collected(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// interest portion of the repayment total, penalties included
    pub fn total_interest(&self) -> Money {
        self.total_repayment - self.principal
    }

    /// balance implied by the payment history.
    ///
    /// `total_repayment` already contains every penalty, so only borrower payments
    /// are subtracted. Overpayment clamps at zero like payment application does.
    pub fn expected_balance(&self) -> Money {
        (self.total_repayment - self.total_paid()).max(Money::ZERO)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        dates::is_past_due(self.due_date, now)
    }

    pub fn days_past_due(&self, now: DateTime<Utc>) -> u32 {
        dates::days_past_due(self.due_date, now)
    }

    /// a penalty dated after the current due date already exists
    pub fn has_penalty_for_current_cycle(&self) -> bool {
        self.payments
            .iter()
            .any(|p| p.is_penalty() && p.date.date_naive() > self.due_date)
    }
}

/// immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub entity_id: Option<Uuid>,
}
