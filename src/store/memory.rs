use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::errors::StoreError;
use crate::model::{AuditLog, Borrower, Loan, Signature};
use crate::sync::{ChangeFeed, ChangeNotification};
use crate::types::{AccountId, BorrowerId, Collection, LoanId};

use super::{LedgerStore, StoreResult};

/// failures the in-memory store should simulate
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// every call fails with this error
    pub outage: Option<StoreError>,
    /// the signature column is missing
    pub reject_signatures: bool,
    pub fail_audit_writes: bool,
    /// loan updates fail for these ids
    pub fail_loan_updates: HashSet<LoanId>,
    pub fail_loan_cascade: bool,
}

#[derive(Debug, Default)]
struct AccountData {
    borrowers: Vec<Borrower>,
    loans: Vec<Loan>,
    audit_logs: Vec<AuditLog>,
}

/// in-memory store with foreign keys and account scoping
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, AccountData>>,
    faults: Mutex<FaultPlan>,
    feed: Option<ChangeFeed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// publish a notification on `feed` after every successful write
    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *self.faults.lock() = plan;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut FaultPlan)) {
        f(&mut self.faults.lock());
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = FaultPlan::default();
    }

    /// stored signature for a loan, if any
    pub fn stored_signature(&self, account: AccountId, loan_id: LoanId) -> Option<Signature> {
        self.accounts
            .read()
            .get(&account)
            .and_then(|data| data.loans.iter().find(|l| l.id == loan_id))
            .and_then(|l| l.signature.clone())
    }

    /// write directly as another session on the same account would
    pub fn write_loan_externally(&self, account: AccountId, loan: Loan) {
        {
            let mut accounts = self.accounts.write();
            let data = accounts.entry(account).or_default();
            match data.loans.iter_mut().find(|l| l.id == loan.id) {
                Some(existing) => *existing = loan,
                None => data.loans.push(loan),
            }
        }
        self.notify(account, Collection::Loans);
    }

    fn check_outage(&self) -> StoreResult<()> {
        match &self.faults.lock().outage {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn notify(&self, account: AccountId, collection: Collection) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeNotification {
                account_id: account,
                collection,
            });
        }
    }

    fn with_account<T>(
        &self,
        account: AccountId,
        f: impl FnOnce(&mut AccountData) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.check_outage()?;
        let mut accounts = self.accounts.write();
        f(accounts.entry(account).or_default())
    }

    fn read_account<T>(&self, account: AccountId, f: impl FnOnce(&AccountData) -> T) -> StoreResult<T>
    where
        T: Default,
    {
        self.check_outage()?;
        let accounts = self.accounts.read();
        Ok(accounts.get(&account).map(f).unwrap_or_default())
    }
}

fn not_found(id: impl ToString) -> StoreError {
    StoreError::NotFound { id: id.to_string() }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn fetch_borrowers(&self, account: AccountId) -> StoreResult<Vec<Borrower>> {
        self.read_account(account, |data| data.borrowers.clone())
    }

    async fn fetch_loans(&self, account: AccountId) -> StoreResult<Vec<Loan>> {
        self.read_account(account, |data| data.loans.clone())
    }

    async fn fetch_audit_logs(&self, account: AccountId) -> StoreResult<Vec<AuditLog>> {
        self.read_account(account, |data| {
            let mut logs = data.audit_logs.clone();
            logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            logs
        })
    }

    async fn insert_borrower(&self, account: AccountId, borrower: &Borrower) -> StoreResult<()> {
        self.with_account(account, |data| {
            if data.borrowers.iter().any(|b| b.id == borrower.id) {
                return Err(StoreError::Conflict {
                    message: format!("borrower {} already exists", borrower.id),
                });
            }
            data.borrowers.push(borrower.clone());
            Ok(())
        })?;
        self.notify(account, Collection::Borrowers);
        Ok(())
    }

    async fn update_borrower(&self, account: AccountId, borrower: &Borrower) -> StoreResult<()> {
        self.with_account(account, |data| {
            let existing = data
                .borrowers
                .iter_mut()
                .find(|b| b.id == borrower.id)
                .ok_or_else(|| not_found(borrower.id))?;
            *existing = borrower.clone();
            Ok(())
        })?;
        self.notify(account, Collection::Borrowers);
        Ok(())
    }

    async fn delete_borrower(&self, account: AccountId, id: BorrowerId) -> StoreResult<()> {
        self.with_account(account, |data| {
            if data.loans.iter().any(|l| l.borrower_id == id) {
                return Err(StoreError::StillReferenced {
                    message: format!("loans still reference borrower {}", id),
                });
            }
            let before = data.borrowers.len();
            data.borrowers.retain(|b| b.id != id);
            if data.borrowers.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        })?;
        self.notify(account, Collection::Borrowers);
        Ok(())
    }

    async fn delete_loans_for_borrower(
        &self,
        account: AccountId,
        borrower_id: BorrowerId,
    ) -> StoreResult<usize> {
        if self.faults.lock().fail_loan_cascade {
            return Err(StoreError::Unavailable {
                message: "loan cleanup rejected".to_string(),
            });
        }
        let removed = self.with_account(account, |data| {
            let before = data.loans.len();
            data.loans.retain(|l| l.borrower_id != borrower_id);
            Ok(before - data.loans.len())
        })?;
        if removed > 0 {
            self.notify(account, Collection::Loans);
        }
        Ok(removed)
    }

    async fn insert_loan(&self, account: AccountId, loan: &Loan) -> StoreResult<()> {
        self.with_account(account, |data| {
            if !data.borrowers.iter().any(|b| b.id == loan.borrower_id) {
                return Err(StoreError::ForeignKey {
                    message: format!("borrower {} does not exist", loan.borrower_id),
                });
            }
            if data.loans.iter().any(|l| l.id == loan.id) {
                return Err(StoreError::Conflict {
                    message: format!("loan {} already exists", loan.id),
                });
            }
            let mut core = loan.clone();
            core.signature = None;
            data.loans.push(core);
            Ok(())
        })?;
        self.notify(account, Collection::Loans);
        Ok(())
    }

    async fn attach_signature(
        &self,
        account: AccountId,
        loan_id: LoanId,
        signature: &Signature,
    ) -> StoreResult<()> {
        if self.faults.lock().reject_signatures {
            return Err(StoreError::FieldRejected {
                field: "signature".to_string(),
            });
        }
        self.with_account(account, |data| {
            let loan = data
                .loans
                .iter_mut()
                .find(|l| l.id == loan_id)
                .ok_or_else(|| not_found(loan_id))?;
            loan.signature = Some(signature.clone());
            Ok(())
        })?;
        self.notify(account, Collection::Loans);
        Ok(())
    }

    async fn update_loan(&self, account: AccountId, loan: &Loan) -> StoreResult<()> {
        if self.faults.lock().fail_loan_updates.contains(&loan.id) {
            return Err(StoreError::Unavailable {
                message: format!("update of loan {} failed", loan.id),
            });
        }
        self.with_account(account, |data| {
            let existing = data
                .loans
                .iter_mut()
                .find(|l| l.id == loan.id)
                .ok_or_else(|| not_found(loan.id))?;
            let signature = existing.signature.take();
            *existing = loan.clone();
            existing.signature = signature;
            Ok(())
        })?;
        self.notify(account, Collection::Loans);
        Ok(())
    }

    async fn delete_loan(&self, account: AccountId, id: LoanId) -> StoreResult<()> {
        self.with_account(account, |data| {
            let before = data.loans.len();
            data.loans.retain(|l| l.id != id);
            if data.loans.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        })?;
        self.notify(account, Collection::Loans);
        Ok(())
    }

    async fn insert_audit_log(&self, account: AccountId, entry: &AuditLog) -> StoreResult<()> {
        if self.faults.lock().fail_audit_writes {
            return Err(StoreError::Unavailable {
                message: "audit log insert failed".to_string(),
            });
        }
        self.with_account(account, |data| {
            data.audit_logs.push(entry.clone());
            Ok(())
        })?;
        self.notify(account, Collection::AuditLogs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanDefaults;
    use crate::decimal::Money;
    use crate::model::NewBorrower;
    use crate::origination::{originate_loan, NewLoan};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn borrower(name: &str) -> Borrower {
        NewBorrower::new(name, "0820000000").into_borrower(Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.insert_borrower(alice, &borrower("Lerato")).await.unwrap();

        assert_eq!(store.fetch_borrowers(alice).await.unwrap().len(), 1);
        assert!(store.fetch_borrowers(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_borrower_conflicts() {
        let store = MemoryStore::new();
        let account = Uuid::new_v4();
        let b = borrower("Lerato");

        store.insert_borrower(account, &b).await.unwrap();
        assert!(matches!(
            store.insert_borrower(account, &b).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_referenced_borrower_cannot_be_deleted() {
        let store = MemoryStore::new();
        let account = Uuid::new_v4();
        let b = borrower("Sipho");
        store.insert_borrower(account, &b).await.unwrap();

        let new_loan = NewLoan::with_defaults(
            b.id,
            Money::from_major(800),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &LoanDefaults::default(),
        );
        let loan = originate_loan(new_loan, Utc::now()).unwrap();
        store.insert_loan(account, &loan).await.unwrap();

        assert!(matches!(
            store.delete_borrower(account, b.id).await,
            Err(StoreError::StillReferenced { .. })
        ));

        let orphan = NewLoan::with_defaults(
            Uuid::new_v4(),
            Money::from_major(800),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &LoanDefaults::default(),
        );
        let orphan = originate_loan(orphan, Utc::now()).unwrap();
        assert!(matches!(
            store.insert_loan(account, &orphan).await,
            Err(StoreError::ForeignKey { .. })
        ));

        assert_eq!(store.delete_loans_for_borrower(account, b.id).await.unwrap(), 1);
        store.delete_borrower(account, b.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let store = MemoryStore::new();
        store.set_faults(FaultPlan {
            outage: Some(StoreError::SchemaMissing),
            ..Default::default()
        });

        let account = Uuid::new_v4();
        assert_eq!(
            store.fetch_loans(account).await.unwrap_err(),
            StoreError::SchemaMissing
        );

        store.clear_faults();
        assert!(store.fetch_loans(account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_publish_notifications() {
        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe();
        let store = MemoryStore::with_feed(feed);
        let account = Uuid::new_v4();

        store.insert_borrower(account, &borrower("Naledi")).await.unwrap();

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.account_id, account);
        assert_eq!(notification.collection, Collection::Borrowers);
    }
}
