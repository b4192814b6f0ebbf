use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LedgerError;

/// unique identifier for a borrower
pub type BorrowerId = Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// unique identifier for an audit log entry
pub type AuditLogId = Uuid;

/// account (user) that owns every entity the ledger sees
pub type AccountId = Uuid;

/// parse an uppercase enum tag, reporting the offending value
macro_rules! uppercase_enum {
    ($name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($tag => Ok($name::$variant),)+
                    other => Err(LedgerError::InvalidInput {
                        message: format!("unknown {} value: {}", stringify!($name), other),
                    }),
                }
            }
        }
    };
}

/// qualitative borrower classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

uppercase_enum!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// performing, not yet past due
    Active,
    /// past due date, penalty charged
    Overdue,
    /// balance within the paid tolerance
    Paid,
    /// written off, no further activity
    Defaulted,
}

uppercase_enum!(LoanStatus {
    Active => "ACTIVE",
    Overdue => "OVERDUE",
    Paid => "PAID",
    Defaulted => "DEFAULTED",
});

impl LoanStatus {
    /// terminal loans accept no payments and are skipped by the sweep
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Paid | LoanStatus::Defaulted)
    }
}

/// how the repayment total is derived from principal and rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestModel {
    /// single fixed fee, common in informal lending
    #[default]
    Flat,
    /// currently identical to flat
    Simple,
    /// compounded once per term unit
    Compound,
}

uppercase_enum!(InterestModel {
    Flat => "FLAT",
    Simple => "SIMPLE",
    Compound => "COMPOUND",
});

/// unit of a loan term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TermUnit {
    Days,
    Weeks,
    #[default]
    Months,
}

uppercase_enum!(TermUnit {
    Days => "DAYS",
    Weeks => "WEEKS",
    Months => "MONTHS",
});

/// payment method; `Penalty` marks a system charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Other,
    Penalty,
}

uppercase_enum!(PaymentMethod {
    Cash => "CASH",
    Transfer => "TRANSFER",
    Other => "OTHER",
    Penalty => "PENALTY",
});

impl PaymentMethod {
    /// methods a borrower can pay with
    pub fn is_borrower_method(&self) -> bool {
        !matches!(self, PaymentMethod::Penalty)
    }
}

/// controlled vocabulary of audit actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateBorrower,
    UpdateBorrower,
    DeleteBorrower,
    CreateLoan,
    DeleteLoan,
    Payment,
    SystemPenalty,
    MarkOverdue,
    UpdateLoanDuedate,
}

uppercase_enum!(AuditAction {
    CreateBorrower => "CREATE_BORROWER",
    UpdateBorrower => "UPDATE_BORROWER",
    DeleteBorrower => "DELETE_BORROWER",
    CreateLoan => "CREATE_LOAN",
    DeleteLoan => "DELETE_LOAN",
    Payment => "PAYMENT",
    SystemPenalty => "SYSTEM_PENALTY",
    MarkOverdue => "MARK_OVERDUE",
    UpdateLoanDuedate => "UPDATE_LOAN_DUEDATE",
});

/// collections a change notification can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Borrowers,
    Loans,
    AuditLogs,
}

/// short prefix of an id used in human-readable details
pub fn short_id(id: &Uuid, len: usize) -> String {
    id.simple().to_string().chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&LoanStatus::Overdue).unwrap();
        assert_eq!(json, "\"OVERDUE\"");

        let status: LoanStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(status, LoanStatus::Paid);
    }

    #[test]
    fn test_audit_action_tags() {
        assert_eq!(AuditAction::UpdateLoanDuedate.as_str(), "UPDATE_LOAN_DUEDATE");
        let json = serde_json::to_string(&AuditAction::SystemPenalty).unwrap();
        assert_eq!(json, "\"SYSTEM_PENALTY\"");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        assert_eq!(" High ".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("weekly".parse::<TermUnit>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(LoanStatus::Paid.is_terminal());
        assert!(LoanStatus::Defaulted.is_terminal());
        assert!(!LoanStatus::Active.is_terminal());
        assert!(!LoanStatus::Overdue.is_terminal());
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        assert_eq!(short_id(&id, 4), "a1b2");
        assert_eq!(short_id(&id, 6), "a1b2c3");
    }
}
