use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::model::{Borrower, Loan};
use crate::types::{BorrowerId, InterestModel, LoanId, LoanStatus, PaymentMethod, RiskLevel};

/// serializable view of a loan, money rounded to currency precision
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub borrower_name: Option<String>,
    pub status: LoanStatus,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub financial: LoanFinancialView,
    pub payments: Vec<PaymentLine>,
    pub has_signature: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanFinancialView {
    pub principal: Money,
    pub interest_rate: Rate,
    pub interest_model: InterestModel,
    pub interest: Money,
    pub total_repayment: Money,
    pub total_paid: Money,
    pub total_penalties: Money,
    pub balance: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentLine {
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub amount: Money,
    pub note: Option<String>,
}

impl LoanView {
    pub fn from_loan(loan: &Loan, borrower: Option<&Borrower>) -> Self {
        LoanView {
            id: loan.id,
            borrower_id: loan.borrower_id,
            borrower_name: borrower.map(|b| b.name.clone()),
            status: loan.status,
            start_date: loan.start_date,
            due_date: loan.due_date,
            financial: LoanFinancialView {
                principal: loan.principal.to_currency(),
                interest_rate: loan.interest_rate,
                interest_model: loan.interest_model,
                interest: loan.total_interest().to_currency(),
                total_repayment: loan.total_repayment.to_currency(),
                total_paid: loan.total_paid().to_currency(),
                total_penalties: loan.total_penalties().to_currency(),
                balance: loan.balance.to_currency(),
            },
            payments: loan
                .payments
                .iter()
                .map(|p| PaymentLine {
                    date: p.date,
                    method: p.method,
                    amount: p.amount.to_currency(),
                    note: p.note.clone(),
                })
                .collect(),
            has_signature: loan.signature.is_some(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// borrower with loan aggregates
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowerView {
    pub id: BorrowerId,
    pub name: String,
    pub phone: String,
    pub risk_level: RiskLevel,
    pub loan_count: usize,
    pub overdue_count: usize,
    pub outstanding: Money,
}

impl BorrowerView {
    pub fn from_borrower(borrower: &Borrower, loans: &[Loan]) -> Self {
        let own: Vec<&Loan> = loans.iter().filter(|l| l.borrower_id == borrower.id).collect();
        BorrowerView {
            id: borrower.id,
            name: borrower.name.clone(),
            phone: borrower.phone.clone(),
            risk_level: borrower.risk_level,
            loan_count: own.len(),
            overdue_count: own.iter().filter(|l| l.status == LoanStatus::Overdue).count(),
            outstanding: own.iter().map(|l| l.balance).sum::<Money>().to_currency(),
        }
    }

    /// one-line history used when reviewing a borrower's risk
    pub fn history_summary(&self) -> String {
        if self.loan_count == 0 {
            "No prior loan history.".to_string()
        } else {
            format!("{} loans, {} overdue.", self.loan_count, self.overdue_count)
        }
    }
}

/// portfolio metrics over a set of loans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioSummary {
    pub total_lent: Money,
    /// every recorded amount, penalties included with their sign
    pub total_collected: Money,
    pub outstanding: Money,
    /// collections attributable to interest
    pub realized_profit: Money,
    pub overdue_count: usize,
    pub overdue_amount: Money,
    pub active_count: usize,
    pub paid_count: usize,
    /// whole percent of loans paid
    pub paid_percentage: Decimal,
}

impl PortfolioSummary {
    pub fn from_loans<'a>(loans: impl IntoIterator<Item = &'a Loan>) -> Self {
        let mut summary = PortfolioSummary::default();
        let mut count = 0usize;

        for loan in loans {
            count += 1;
            let collected = loan.net_collected();
            summary.total_lent += loan.principal;
            summary.total_collected += collected;
            summary.outstanding += loan.balance;

            match loan.status {
                LoanStatus::Overdue => {
                    summary.overdue_count += 1;
                    summary.overdue_amount += loan.balance;
                }
                LoanStatus::Active => summary.active_count += 1,
                LoanStatus::Paid => summary.paid_count += 1,
                LoanStatus::Defaulted => {}
            }

            if loan.total_repayment.is_positive() && collected.is_positive() {
                let interest_share =
                    loan.total_interest().as_decimal() / loan.total_repayment.as_decimal();
                summary.realized_profit += collected * interest_share;
            }
        }

        summary.paid_percentage = if count == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(summary.paid_count as u64) * Decimal::from(100)
                / Decimal::from(count as u64))
            .round()
        };

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanDefaults;
    use crate::model::{NewBorrower, Payment};
    use crate::origination::{originate_loan, NewLoan};
    use uuid::Uuid;

    fn loan(principal: i64) -> Loan {
        let new_loan = NewLoan::with_defaults(
            Uuid::new_v4(),
            Money::from_major(principal),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &LoanDefaults::default(),
        );
        originate_loan(new_loan, Utc::now()).unwrap()
    }

    fn pay(loan: &mut Loan, amount: i64) {
        loan.payments.push(Payment {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            amount: Money::from_major(amount),
            date: Utc::now(),
            method: PaymentMethod::Cash,
            note: None,
        });
        loan.balance -= Money::from_major(amount);
    }

    #[test]
    fn test_portfolio_summary() {
        let mut paid = loan(1_000);
        pay(&mut paid, 1_400);
        paid.status = LoanStatus::Paid;

        let mut overdue = loan(500);
        overdue.status = LoanStatus::Overdue;

        let active = loan(250);

        let summary = PortfolioSummary::from_loans(&[paid, overdue, active]);

        assert_eq!(summary.total_lent, Money::from_major(1_750));
        assert_eq!(summary.total_collected, Money::from_major(1_400));
        assert_eq!(summary.outstanding, Money::from_major(1_050));
        assert_eq!(summary.realized_profit.to_currency(), Money::from_major(400));
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.overdue_amount, Money::from_major(700));
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.paid_percentage, Decimal::from(33));
    }

    #[test]
    fn test_empty_portfolio() {
        let summary = PortfolioSummary::from_loans(std::iter::empty());
        assert_eq!(summary, PortfolioSummary::default());
    }

    #[test]
    fn test_loan_view_rounds_money() {
        let mut l = loan(1_000);
        l.balance = Money::from_str_exact("1399.996").unwrap();
        let view = LoanView::from_loan(&l, None);

        assert_eq!(view.financial.balance.to_string(), "1400.00");
        assert_eq!(view.financial.interest, Money::from_major(400));
        assert!(view.to_json_pretty().unwrap().contains("\"due_date\": \"2024-02-05\""));
    }

    #[test]
    fn test_borrower_view_history() {
        let borrower = NewBorrower::new("Bongani", "0800").into_borrower(Uuid::new_v4(), Utc::now());
        let view = BorrowerView::from_borrower(&borrower, &[]);
        assert_eq!(view.history_summary(), "No prior loan history.");

        let mut a = loan(100);
        a.borrower_id = borrower.id;
        a.status = LoanStatus::Overdue;
        let mut b = loan(200);
        b.borrower_id = borrower.id;
        let view = BorrowerView::from_borrower(&borrower, &[a, b, loan(300)]);
        assert_eq!(view.history_summary(), "2 loans, 1 overdue.");
        assert_eq!(view.outstanding, Money::from_major(420));
    }
}
