/// overdue sweep - drive test time past the due date and watch the penalty land once
use std::sync::Arc;

use lender_ledger::chrono::{Duration, NaiveDate, TimeZone, Utc};
use lender_ledger::{
    LedgerConfig, LedgerEngine, MemoryStore, Money, NewBorrower, PortfolioSummary,
    SafeTimeProvider, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    )));
    let control = time.test_control().unwrap();

    let (ledger, _engine) = LedgerEngine::start(
        Uuid::new_v4(),
        Arc::new(MemoryStore::new()),
        time.clone(),
        LedgerConfig::default(),
        None,
    )
    .await?;

    let borrower = ledger.add_borrower(NewBorrower::new("Karabo", "0715550123")).await?;
    let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let loan = ledger
        .create_loan(ledger.loan_with_defaults(borrower.id, Money::from_major(1_000), start))
        .await?
        .into_value();
    println!("loan due {} balance {}", loan.due_date, loan.balance);

    for day in ["2024-02-05", "2024-02-06", "2024-02-20"] {
        let target = NaiveDate::parse_from_str(day, "%Y-%m-%d")?;
        let now = time.now().date_naive();
        control.advance(Duration::days((target - now).num_days()));

        let report = ledger.sweep_now().await?;
        let loans = ledger.list_loans().await?;
        println!(
            "{}: penalties {} status {} balance {}",
            day, report.penalties_applied, loans[0].status, loans[0].balance
        );
    }

    let summary = PortfolioSummary::from_loans(&ledger.list_loans().await?);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    ledger.shutdown().await?;
    Ok(())
}
