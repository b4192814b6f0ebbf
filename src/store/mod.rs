pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::model::{AuditLog, Borrower, Loan, Signature};
use crate::types::{AccountId, BorrowerId, LoanId};

pub use memory::{FaultPlan, MemoryStore};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// durable owner of record, every call scoped to one account
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn fetch_borrowers(&self, account: AccountId) -> StoreResult<Vec<Borrower>>;

    async fn fetch_loans(&self, account: AccountId) -> StoreResult<Vec<Loan>>;

    /// most recent first
    async fn fetch_audit_logs(&self, account: AccountId) -> StoreResult<Vec<AuditLog>>;

    async fn insert_borrower(&self, account: AccountId, borrower: &Borrower) -> StoreResult<()>;

    async fn update_borrower(&self, account: AccountId, borrower: &Borrower) -> StoreResult<()>;

    /// fails with `StillReferenced` while loans still reference the borrower
    async fn delete_borrower(&self, account: AccountId, id: BorrowerId) -> StoreResult<()>;

    /// returns the number of loans removed
    async fn delete_loans_for_borrower(
        &self,
        account: AccountId,
        borrower_id: BorrowerId,
    ) -> StoreResult<usize>;

    /// persist the core loan fields; the signature is never written here
    async fn insert_loan(&self, account: AccountId, loan: &Loan) -> StoreResult<()>;

    /// persist the optional signature of an existing loan
    async fn attach_signature(
        &self,
        account: AccountId,
        loan_id: LoanId,
        signature: &Signature,
    ) -> StoreResult<()>;

    /// replace the core fields of an existing loan, leaving its signature as stored
    async fn update_loan(&self, account: AccountId, loan: &Loan) -> StoreResult<()>;

    async fn delete_loan(&self, account: AccountId, id: LoanId) -> StoreResult<()>;

    async fn insert_audit_log(&self, account: AccountId, entry: &AuditLog) -> StoreResult<()>;
}
