/// sync reload - another session writes to the store and the engine picks it up
use std::sync::Arc;
use std::time::Duration;

use lender_ledger::chrono::Utc;
use lender_ledger::{
    ChangeFeed, LedgerConfig, LedgerEngine, MemoryStore, Money, NewBorrower, Payment,
    PaymentMethod, SafeTimeProvider, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let feed = ChangeFeed::default();
    let store = Arc::new(MemoryStore::with_feed(feed.clone()));
    let account = Uuid::new_v4();
    let time = Arc::new(SafeTimeProvider::new(TimeSource::System));

    let (ledger, _engine) = LedgerEngine::start(
        account,
        store.clone(),
        time,
        LedgerConfig::default(),
        Some(&feed),
    )
    .await?;

    let borrower = ledger.add_borrower(NewBorrower::new("Refilwe", "0605550111")).await?;
    let loan = ledger
        .create_loan(ledger.loan_with_defaults(
            borrower.id,
            Money::from_major(2_000),
            Utc::now().date_naive(),
        ))
        .await?
        .into_value();

    // a second session records a transfer directly in the store
    let mut remote = loan.clone();
    remote.payments.push(Payment {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        amount: Money::from_major(800),
        date: Utc::now(),
        method: PaymentMethod::Transfer,
        note: Some("captured on another device".to_string()),
    });
    remote.balance = remote.balance - Money::from_major(800);
    store.write_loan_externally(account, remote);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let loans = ledger.list_loans().await?;
    println!("balance after remote payment: {}", loans[0].balance);
    println!("payments seen locally: {}", loans[0].payments.len());

    ledger.shutdown().await?;
    Ok(())
}
