use crate::model::{Borrower, Loan};

fn matches(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// borrowers whose name or phone contains `term`, case-insensitively
pub fn filter_borrowers<'a>(borrowers: &'a [Borrower], term: &str) -> Vec<&'a Borrower> {
    let needle = term.trim().to_lowercase();
    borrowers
        .iter()
        .filter(|b| needle.is_empty() || matches(&b.name, &needle) || matches(&b.phone, &needle))
        .collect()
}

/// loans whose id, status, or borrower name contains `term`, case-insensitively
pub fn filter_loans<'a>(loans: &'a [Loan], borrowers: &[Borrower], term: &str) -> Vec<&'a Loan> {
    let needle = term.trim().to_lowercase();
    loans
        .iter()
        .filter(|l| {
            if needle.is_empty() {
                return true;
            }
            let borrower_name = borrowers
                .iter()
                .find(|b| b.id == l.borrower_id)
                .map(|b| b.name.as_str())
                .unwrap_or("");

            matches(&l.id.to_string(), &needle)
                || matches(l.status.as_str(), &needle)
                || matches(borrower_name, &needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanDefaults;
    use crate::decimal::Money;
    use crate::model::NewBorrower;
    use crate::origination::{originate_loan, NewLoan};
    use crate::types::LoanStatus;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn borrower(name: &str, phone: &str) -> Borrower {
        NewBorrower::new(name, phone).into_borrower(Uuid::new_v4(), Utc::now())
    }

    fn loan_for(borrower: &Borrower) -> Loan {
        let new_loan = NewLoan::with_defaults(
            borrower.id,
            Money::from_major(500),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            &LoanDefaults::default(),
        );
        originate_loan(new_loan, Utc::now()).unwrap()
    }

    #[test]
    fn test_borrower_filter_name_and_phone() {
        let borrowers = vec![
            borrower("Nomvula Dlamini", "0825550001"),
            borrower("Pieter Botha", "0715550002"),
        ];

        assert_eq!(filter_borrowers(&borrowers, "DLAMINI").len(), 1);
        assert_eq!(filter_borrowers(&borrowers, "0715")[0].name, "Pieter Botha");
        assert_eq!(filter_borrowers(&borrowers, "555").len(), 2);
        assert_eq!(filter_borrowers(&borrowers, "").len(), 2);
        assert!(filter_borrowers(&borrowers, "xyz").is_empty());
    }

    #[test]
    fn test_loan_filter_status_id_and_borrower() {
        let nomvula = borrower("Nomvula", "1");
        let pieter = borrower("Pieter", "2");
        let mut overdue = loan_for(&nomvula);
        overdue.status = LoanStatus::Overdue;
        let active = loan_for(&pieter);
        let loans = vec![overdue.clone(), active.clone()];
        let borrowers = vec![nomvula, pieter];

        let hits = filter_loans(&loans, &borrowers, "overdue");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, overdue.id);

        let hits = filter_loans(&loans, &borrowers, "pIeTeR");
        assert_eq!(hits[0].id, active.id);

        let prefix: String = active.id.to_string().chars().take(8).collect();
        let hits = filter_loans(&loans, &borrowers, &prefix.to_uppercase());
        assert_eq!(hits[0].id, active.id);

        assert_eq!(filter_loans(&loans, &borrowers, "  ").len(), 2);
    }
}
