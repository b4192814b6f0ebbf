use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::model::{Loan, Payment};
use crate::types::{LoanStatus, PaymentMethod};

/// what a sweep should do to one loan
#[derive(Debug, Clone, PartialEq)]
pub enum PenaltyDecision {
    /// terminal, or not yet past due
    NoAction,
    /// past due with no penalty in this cycle: charge one
    Charge {
        amount: Money,
        days_overdue: u32,
    },
    /// already penalised this cycle but the status was reset
    MarkOverdue,
}

/// penalty accrual rules for overdue loans.
///
/// The sweep that drives this is level-triggered and runs many times over a loan's
/// overdue life; `evaluate` only charges when no penalty dated after the current due
/// date exists, so each due-date breach is charged at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct PenaltyEngine;

impl PenaltyEngine {
    pub fn new() -> Self {
        Self
    }

    /// penalty for one missed due date: a second full interest charge on principal
    pub fn penalty_amount(&self, loan: &Loan) -> Money {
        loan.principal.percentage(loan.interest_rate)
    }

    pub fn evaluate(&self, loan: &Loan, now: DateTime<Utc>) -> PenaltyDecision {
        if loan.is_terminal() || !loan.is_past_due(now) {
            return PenaltyDecision::NoAction;
        }

        if !loan.has_penalty_for_current_cycle() {
            return PenaltyDecision::Charge {
                amount: self.penalty_amount(loan),
                days_overdue: loan.days_past_due(now),
            };
        }

        if loan.status != LoanStatus::Overdue {
            PenaltyDecision::MarkOverdue
        } else {
            PenaltyDecision::NoAction
        }
    }

    /// apply a decision to `loan`, returning the penalty record when one was charged
    pub fn apply(
        &self,
        loan: &mut Loan,
        decision: &PenaltyDecision,
        now: DateTime<Utc>,
    ) -> Option<Payment> {
        match decision {
            PenaltyDecision::NoAction => None,
            PenaltyDecision::MarkOverdue => {
                loan.status = LoanStatus::Overdue;
                None
            }
            PenaltyDecision::Charge { amount, .. } => {
                let penalty = Payment {
                    id: Uuid::new_v4(),
                    loan_id: loan.id,
                    amount: -*amount,
                    date: now,
                    method: PaymentMethod::Penalty,
                    note: Some(format!(
                        "Automatic penalty for missing due date: {}",
                        loan.due_date.format("%Y-%m-%d")
                    )),
                };

                loan.balance += *amount;
                loan.total_repayment += *amount;
                loan.payments.push(penalty.clone());
                loan.status = LoanStatus::Overdue;

                Some(penalty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::types::{InterestModel, TermUnit};
    use chrono::{NaiveDate, TimeZone};

    fn overdue_candidate() -> Loan {
        Loan {
            id: Uuid::new_v4(),
            borrower_id: Uuid::new_v4(),
            principal: Money::from_major(1_000),
            interest_rate: Rate::from_percentage(40),
            interest_model: InterestModel::Flat,
            term_value: 1,
            term_unit: TermUnit::Months,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            status: LoanStatus::Active,
            total_repayment: Money::from_major(1_400),
            balance: Money::from_major(1_400),
            payments: Vec::new(),
            signature: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_no_penalty_before_or_on_due_date() {
        let engine = PenaltyEngine::new();
        let loan = overdue_candidate();

        let on_due = Utc.with_ymd_and_hms(2024, 2, 5, 22, 0, 0).unwrap();
        assert_eq!(engine.evaluate(&loan, on_due), PenaltyDecision::NoAction);
    }

    #[test]
    fn test_single_penalty_per_cycle() {
        let engine = PenaltyEngine::new();
        let mut loan = overdue_candidate();
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();

        let decision = engine.evaluate(&loan, now);
        assert_eq!(
            decision,
            PenaltyDecision::Charge {
                amount: Money::from_major(400),
                days_overdue: 5,
            }
        );

        let penalty = engine.apply(&mut loan, &decision, now).unwrap();
        assert_eq!(penalty.amount, Money::from_major(-400));
        assert_eq!(penalty.method, PaymentMethod::Penalty);
        assert_eq!(loan.balance, Money::from_major(1_800));
        assert_eq!(loan.total_repayment, Money::from_major(1_800));
        assert_eq!(loan.status, LoanStatus::Overdue);
        assert_eq!(loan.balance, loan.expected_balance());

        let later = now + chrono::Duration::days(20);
        assert_eq!(engine.evaluate(&loan, later), PenaltyDecision::NoAction);
    }

    #[test]
    fn test_reset_status_is_marked_overdue_without_charge() {
        let engine = PenaltyEngine::new();
        let mut loan = overdue_candidate();
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();

        let decision = engine.evaluate(&loan, now);
        engine.apply(&mut loan, &decision, now);
        loan.status = LoanStatus::Active;

        let decision = engine.evaluate(&loan, now);
        assert_eq!(decision, PenaltyDecision::MarkOverdue);
        assert!(engine.apply(&mut loan, &decision, now).is_none());
        assert_eq!(loan.status, LoanStatus::Overdue);
        assert_eq!(loan.total_penalties(), Money::from_major(400));
    }

    #[test]
    fn test_terminal_loans_skipped() {
        let engine = PenaltyEngine::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut loan = overdue_candidate();
        loan.status = LoanStatus::Paid;
        assert_eq!(engine.evaluate(&loan, now), PenaltyDecision::NoAction);

        loan.status = LoanStatus::Defaulted;
        assert_eq!(engine.evaluate(&loan, now), PenaltyDecision::NoAction);
    }

    #[test]
    fn test_new_due_date_opens_new_cycle() {
        let engine = PenaltyEngine::new();
        let mut loan = overdue_candidate();
        let first = Utc.with_ymd_and_hms(2024, 2, 6, 0, 0, 0).unwrap();
        let decision = engine.evaluate(&loan, first);
        engine.apply(&mut loan, &decision, first);

        loan.due_date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap();
        assert!(matches!(
            engine.evaluate(&loan, second),
            PenaltyDecision::Charge { .. }
        ));
    }
}
