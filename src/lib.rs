pub mod audit;
pub mod cache;
pub mod config;
pub mod dates;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod interest;
pub mod model;
pub mod origination;
pub mod payments;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod sync;
pub mod types;
pub mod views;

// re-export key types
pub use config::{LedgerConfig, LoanDefaults};
pub use dates::compute_due_date;
pub use decimal::{Money, Rate};
pub use engine::{LedgerEngine, LedgerHandle, SweepFailure, SweepReport};
pub use errors::{LedgerError, LedgerWarning, Outcome, Result, StoreError, StoreFailure};
pub use interest::{compute_total_repayment, InterestCalculation, PenaltyDecision, PenaltyEngine};
pub use model::{AuditLog, Borrower, BorrowerUpdate, Loan, NewBorrower, Payment, Signature};
pub use origination::{originate_loan, NewLoan};
pub use payments::{PaymentProcessor, PaymentRequest, PaymentResult};
pub use scheduler::PenaltyScheduler;
pub use store::{FaultPlan, LedgerStore, MemoryStore};
pub use sync::{ChangeFeed, ChangeNotification};
pub use types::{
    AccountId, AuditAction, BorrowerId, Collection, InterestModel, LoanId, LoanStatus,
    PaymentMethod, RiskLevel, TermUnit,
};
pub use views::{BorrowerView, LoanView, PortfolioSummary};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
