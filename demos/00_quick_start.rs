/// quick start - add a borrower, lend, take a payment
use std::sync::Arc;

use lender_ledger::chrono::{NaiveDate, Utc};
use lender_ledger::{
    LedgerConfig, LedgerEngine, LoanView, MemoryStore, Money, NewBorrower, PaymentMethod,
    PaymentRequest, SafeTimeProvider, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = Arc::new(SafeTimeProvider::new(TimeSource::System));
    let store = Arc::new(MemoryStore::new());
    let (ledger, _engine) =
        LedgerEngine::start(Uuid::new_v4(), store, time, LedgerConfig::default(), None).await?;

    let borrower = ledger
        .add_borrower(NewBorrower::new("Sizwe Mahlangu", "0825550199"))
        .await?;

    // 40% flat over one month, due on the 5th of next month
    let today: NaiveDate = Utc::now().date_naive();
    let loan = ledger
        .create_loan(ledger.loan_with_defaults(borrower.id, Money::from_major(1_000), today))
        .await?
        .into_value();

    let loan = ledger
        .apply_payment(PaymentRequest::new(loan.id, Money::from_major(600), PaymentMethod::Cash))
        .await?;

    println!("{}", LoanView::from_loan(&loan, Some(&borrower)).to_json_pretty()?);

    for entry in ledger.list_audit_logs().await? {
        println!("{} {} {}", entry.timestamp.format("%H:%M:%S"), entry.action, entry.details);
    }

    ledger.shutdown().await?;
    Ok(())
}
