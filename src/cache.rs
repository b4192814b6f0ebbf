use crate::audit::AuditTrail;
use crate::model::{AuditLog, Borrower, Loan};
use crate::types::{BorrowerId, LoanId};

/// full state of one account as fetched from the store
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub borrowers: Vec<Borrower>,
    pub loans: Vec<Loan>,
    pub audit_logs: Vec<AuditLog>,
}

/// in-memory copy of the account's collections.
///
/// Only the engine task holds one. It is replaced wholesale on reload and otherwise
/// changed only after the store has accepted the corresponding write.
#[derive(Debug, Default)]
pub struct LedgerCache {
    borrowers: Vec<Borrower>,
    loans: Vec<Loan>,
    audit: AuditTrail,
}

impl LedgerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// swap in a freshly fetched snapshot
    pub fn replace_all(&mut self, snapshot: LedgerSnapshot) {
        self.borrowers = snapshot.borrowers;
        self.loans = snapshot.loans;
        self.audit = AuditTrail::from_entries(snapshot.audit_logs);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            borrowers: self.borrowers.clone(),
            loans: self.loans.clone(),
            audit_logs: self.audit.entries().to_vec(),
        }
    }

    pub fn borrowers(&self) -> &[Borrower] {
        &self.borrowers
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn audit_logs(&self) -> &[AuditLog] {
        self.audit.entries()
    }

    pub fn borrower(&self, id: BorrowerId) -> Option<&Borrower> {
        self.borrowers.iter().find(|b| b.id == id)
    }

    pub fn loan(&self, id: LoanId) -> Option<&Loan> {
        self.loans.iter().find(|l| l.id == id)
    }

    pub fn loans_for_borrower(&self, borrower_id: BorrowerId) -> impl Iterator<Item = &Loan> {
        self.loans.iter().filter(move |l| l.borrower_id == borrower_id)
    }

    pub fn push_borrower(&mut self, borrower: Borrower) {
        self.borrowers.push(borrower);
    }

    /// replace a borrower in place; false if it is not cached
    pub fn put_borrower(&mut self, borrower: Borrower) -> bool {
        match self.borrowers.iter_mut().find(|b| b.id == borrower.id) {
            Some(existing) => {
                *existing = borrower;
                true
            }
            None => false,
        }
    }

    /// remove a borrower and every loan that references it; returns loans removed
    pub fn remove_borrower_cascade(&mut self, id: BorrowerId) -> usize {
        self.borrowers.retain(|b| b.id != id);
        let before = self.loans.len();
        self.loans.retain(|l| l.borrower_id != id);
        before - self.loans.len()
    }

    pub fn push_loan(&mut self, loan: Loan) {
        self.loans.push(loan);
    }

    /// replace a loan in place; false if it is not cached
    pub fn put_loan(&mut self, loan: Loan) -> bool {
        match self.loans.iter_mut().find(|l| l.id == loan.id) {
            Some(existing) => {
                *existing = loan;
                true
            }
            None => false,
        }
    }

    pub fn remove_loan(&mut self, id: LoanId) -> Option<Loan> {
        let position = self.loans.iter().position(|l| l.id == id)?;
        Some(self.loans.remove(position))
    }

    pub fn append_audit(&mut self, entry: AuditLog) {
        self.audit.append(entry);
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
        NewBorrower::new(name, "0831112222").into_borrower(Uuid::new_v4(), Utc::now())
    }

    fn loan_for(borrower: &Borrower) -> Loan {
        let new_loan = NewLoan::with_defaults(
            borrower.id,
            Money::from_major(1_000),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &LoanDefaults::default(),
        );
        originate_loan(new_loan, Utc::now()).unwrap()
    }

    #[test]
    fn test_cascade_removes_only_that_borrowers_loans() {
        let mut cache = LedgerCache::new();
        let kept = borrower("Kagiso");
        let removed = borrower("Palesa");

        cache.push_loan(loan_for(&removed));
        cache.push_loan(loan_for(&kept));
        cache.push_loan(loan_for(&removed));
        cache.push_borrower(kept.clone());
        cache.push_borrower(removed.clone());

        assert_eq!(cache.remove_borrower_cascade(removed.id), 2);
        assert_eq!(cache.loans().len(), 1);
        assert_eq!(cache.loans_for_borrower(removed.id).count(), 0);
        assert!(cache.borrower(removed.id).is_none());
        assert!(cache.borrower(kept.id).is_some());
    }

    #[test]
    fn test_replace_all_discards_local_state() {
        let mut cache = LedgerCache::new();
        let local = borrower("Local");
        cache.push_borrower(local.clone());

        let remote = borrower("Remote");
        cache.replace_all(LedgerSnapshot {
            borrowers: vec![remote.clone()],
            loans: vec![loan_for(&remote)],
            audit_logs: Vec::new(),
        });

        assert!(cache.borrower(local.id).is_none());
        assert_eq!(cache.borrowers(), &[remote]);
        assert_eq!(cache.loans().len(), 1);
    }

    #[test]
    fn test_put_and_remove_loan() {
        let mut cache = LedgerCache::new();
        let b = borrower("Ayanda");
        let mut loan = loan_for(&b);
        assert!(!cache.put_loan(loan.clone()));

        cache.push_loan(loan.clone());
        loan.balance = Money::from_major(10);
        assert!(cache.put_loan(loan.clone()));
        assert_eq!(cache.loan(loan.id).unwrap().balance, Money::from_major(10));

        assert!(cache.remove_loan(loan.id).is_some());
        assert!(cache.remove_loan(loan.id).is_none());
    }
}
