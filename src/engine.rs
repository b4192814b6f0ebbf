use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::cache::{LedgerCache, LedgerSnapshot};
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, LedgerWarning, Outcome, Result};
use crate::interest::{PenaltyDecision, PenaltyEngine};
use crate::model::{AuditLog, Borrower, BorrowerUpdate, Loan, NewBorrower};
use crate::origination::{originate_loan, NewLoan};
use crate::payments::{PaymentProcessor, PaymentRequest};
use crate::store::LedgerStore;
use crate::sync::{ChangeFeed, ChangeNotification};
use crate::types::{short_id, AccountId, AuditAction, BorrowerId, LoanId};
use crate::views::PortfolioSummary;

type Reply<T> = oneshot::Sender<Result<T>>;

/// requests handled by the engine task, one at a time
enum Command {
    ListBorrowers { reply: Reply<Vec<Borrower>> },
    ListLoans { reply: Reply<Vec<Loan>> },
    ListAuditLogs { reply: Reply<Vec<AuditLog>> },
    Snapshot { reply: Reply<LedgerSnapshot> },
    AddBorrower { borrower: NewBorrower, reply: Reply<Borrower> },
    UpdateBorrower { id: BorrowerId, update: BorrowerUpdate, reply: Reply<Borrower> },
    DeleteBorrower { id: BorrowerId, reply: Reply<usize> },
    CreateLoan { loan: NewLoan, reply: Reply<Outcome<Loan>> },
    DeleteLoan { id: LoanId, reply: Reply<()> },
    ApplyPayment { request: PaymentRequest, reply: Reply<Loan> },
    UpdateDueDate { id: LoanId, due_date: NaiveDate, reply: Reply<Loan> },
    Sweep { reply: Reply<SweepReport> },
    Reload { reply: Reply<()> },
    Shutdown { reply: Reply<()> },
}

/// one loan whose accrual check could not be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub loan_id: LoanId,
    pub error: LedgerError,
}

/// result of one penalty sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// non-terminal loans checked
    pub examined: usize,
    pub penalties_applied: usize,
    /// already penalised this cycle, status restored to overdue
    pub marked_overdue: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn changed(&self) -> usize {
        self.penalties_applied + self.marked_overdue
    }
}

/// cloneable client for a running engine
#[derive(Clone)]
pub struct LedgerHandle {
    account: AccountId,
    commands: mpsc::Sender<Command>,
    timeout: Duration,
    config: Arc<LedgerConfig>,
}

impl LedgerHandle {
    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// loan request on the configured default terms
    pub fn loan_with_defaults(
        &self,
        borrower_id: BorrowerId,
        principal: Money,
        start_date: NaiveDate,
    ) -> NewLoan {
        NewLoan::with_defaults(borrower_id, principal, start_date, &self.config.loan_defaults)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        let call = async {
            self.commands
                .send(make(reply))
                .await
                .map_err(|_| LedgerError::EngineStopped)?;
            response.await.map_err(|_| LedgerError::EngineStopped)?
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    pub async fn list_borrowers(&self) -> Result<Vec<Borrower>> {
        self.request(|reply| Command::ListBorrowers { reply }).await
    }

    pub async fn list_loans(&self) -> Result<Vec<Loan>> {
        self.request(|reply| Command::ListLoans { reply }).await
    }

    /// most recent first
    pub async fn list_audit_logs(&self) -> Result<Vec<AuditLog>> {
        self.request(|reply| Command::ListAuditLogs { reply }).await
    }

    /// all three collections read in one step
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        let loans = self.list_loans().await?;
        Ok(PortfolioSummary::from_loans(&loans))
    }

    pub async fn add_borrower(&self, borrower: NewBorrower) -> Result<Borrower> {
        self.request(|reply| Command::AddBorrower { borrower, reply }).await
    }

    pub async fn update_borrower(&self, id: BorrowerId, update: BorrowerUpdate) -> Result<Borrower> {
        self.request(|reply| Command::UpdateBorrower { id, update, reply })
            .await
    }

    /// delete a borrower and all of its loans; returns the number of loans removed
    pub async fn delete_borrower(&self, id: BorrowerId) -> Result<usize> {
        self.request(|reply| Command::DeleteBorrower { id, reply }).await
    }

    /// create a loan; a signature the store refuses comes back as a warning
    pub async fn create_loan(&self, loan: NewLoan) -> Result<Outcome<Loan>> {
        self.request(|reply| Command::CreateLoan { loan, reply }).await
    }

    pub async fn delete_loan(&self, id: LoanId) -> Result<()> {
        self.request(|reply| Command::DeleteLoan { id, reply }).await
    }

    pub async fn apply_payment(&self, request: PaymentRequest) -> Result<Loan> {
        self.request(|reply| Command::ApplyPayment { request, reply }).await
    }

    pub async fn update_due_date(&self, id: LoanId, due_date: NaiveDate) -> Result<Loan> {
        self.request(|reply| Command::UpdateDueDate { id, due_date, reply })
            .await
    }

    /// run one penalty sweep now, queued behind any pending commands
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        self.request(|reply| Command::Sweep { reply }).await
    }

    /// re-fetch everything from the store and replace the cache
    pub async fn reload(&self) -> Result<()> {
        self.request(|reply| Command::Reload { reply }).await
    }

    /// stop the engine after the commands already queued
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// engine task state; owns one account's cache and handles one command at a time
pub struct LedgerEngine {
    account: AccountId,
    store: Arc<dyn LedgerStore>,
    time: Arc<SafeTimeProvider>,
    config: Arc<LedgerConfig>,
    cache: LedgerCache,
    audit: AuditLogger,
    payments: PaymentProcessor,
    penalties: PenaltyEngine,
    commands: mpsc::Receiver<Command>,
    changes: Option<broadcast::Receiver<ChangeNotification>>,
    /// the populated-loan-set sweep has run since the set was last empty
    populated_swept: bool,
}

impl LedgerEngine {
    /// load the account and spawn the engine task.
    ///
    /// Fails without spawning if the configuration is invalid or the initial load
    /// cannot be completed; nothing is served from a partially loaded cache.
    pub async fn start(
        account: AccountId,
        store: Arc<dyn LedgerStore>,
        time: Arc<SafeTimeProvider>,
        config: LedgerConfig,
        feed: Option<&ChangeFeed>,
    ) -> Result<(LedgerHandle, JoinHandle<()>)> {
        config.validate()?;
        let config = Arc::new(config);
        let (tx, rx) = mpsc::channel(config.command_queue_capacity);

        let mut engine = LedgerEngine {
            account,
            audit: AuditLogger::new(store.clone(), account),
            store,
            time,
            payments: PaymentProcessor::new(config.paid_tolerance),
            penalties: PenaltyEngine::new(),
            config: config.clone(),
            cache: LedgerCache::new(),
            commands: rx,
            // subscribe before loading so no change between load and loop is missed
            changes: feed.map(ChangeFeed::subscribe),
            populated_swept: false,
        };

        if let Err(e) = engine.reload().await {
            if e.is_store_unavailable() {
                tracing::error!(account = %account, error = %e, "ledger store unavailable at startup");
            } else {
                tracing::error!(account = %account, error = %e, "initial ledger load failed");
            }
            return Err(e);
        }

        tracing::info!(
            account = %account,
            borrowers = engine.cache.borrowers().len(),
            loans = engine.cache.loans().len(),
            "ledger engine started"
        );

        let handle = LedgerHandle {
            account,
            commands: tx,
            timeout: config.command_timeout(),
            config,
        };
        let task = tokio::spawn(engine.run());

        Ok((handle, task))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle(command).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                change = next_change(&mut self.changes), if self.changes.is_some() => {
                    self.on_change(change).await;
                }
            }
        }

        tracing::info!(account = %self.account, "ledger engine stopped");
    }

    /// returns false once the engine should stop
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::ListBorrowers { reply } => {
                let _ = reply.send(Ok(self.cache.borrowers().to_vec()));
            }
            Command::ListLoans { reply } => {
                let _ = reply.send(Ok(self.cache.loans().to_vec()));
            }
            Command::ListAuditLogs { reply } => {
                let _ = reply.send(Ok(self.cache.audit_logs().to_vec()));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Ok(self.cache.snapshot()));
            }
            Command::AddBorrower { borrower, reply } => {
                let _ = reply.send(self.add_borrower(borrower).await);
            }
            Command::UpdateBorrower { id, update, reply } => {
                let _ = reply.send(self.update_borrower(id, update).await);
            }
            Command::DeleteBorrower { id, reply } => {
                let _ = reply.send(self.delete_borrower(id).await);
            }
            Command::CreateLoan { loan, reply } => {
                let _ = reply.send(self.create_loan(loan).await);
            }
            Command::DeleteLoan { id, reply } => {
                let _ = reply.send(self.delete_loan(id).await);
            }
            Command::ApplyPayment { request, reply } => {
                let _ = reply.send(self.apply_payment(request).await);
            }
            Command::UpdateDueDate { id, due_date, reply } => {
                let _ = reply.send(self.update_due_date(id, due_date).await);
            }
            Command::Sweep { reply } => {
                let _ = reply.send(Ok(self.sweep().await));
            }
            Command::Reload { reply } => {
                let _ = reply.send(self.reload().await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(Ok(()));
                return false;
            }
        }
        true
    }

    async fn on_change(&mut self, change: std::result::Result<ChangeNotification, RecvError>) {
        match change {
            Ok(notification) if notification.account_id != self.account => {}
            Ok(notification) => {
                self.drain_pending_changes();
                tracing::debug!(collection = ?notification.collection, "remote change, reloading");
                if let Err(e) = self.reload().await {
                    tracing::warn!(error = %e, "reload after remote change failed, keeping cached state");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "change feed lagged, reloading");
                if let Err(e) = self.reload().await {
                    tracing::warn!(error = %e, "reload after lag failed, keeping cached state");
                }
            }
            Err(RecvError::Closed) => {
                tracing::info!("change feed closed");
                self.changes = None;
            }
        }
    }

    /// one reload covers every notification already queued
    fn drain_pending_changes(&mut self) {
        if let Some(rx) = self.changes.as_mut() {
            while rx.try_recv().is_ok() {}
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    fn money(&self, amount: Money) -> String {
        self.config.format_money(amount)
    }

    async fn record(&mut self, action: AuditAction, details: String, entity_id: Option<Uuid>) {
        let timestamp = self.now();
        if let Some(entry) = self.audit.record(action, details, entity_id, timestamp).await {
            self.cache.append_audit(entry);
        }
    }

    /// replace the cache with the store's state; on any fetch failure nothing changes
    async fn reload(&mut self) -> Result<()> {
        let mut snapshot = fetch_snapshot(self.store.as_ref(), self.account).await?;

        // signatures the store refused are only held here
        for loan in snapshot.loans.iter_mut().filter(|l| l.signature.is_none()) {
            if let Some(local) = self.cache.loan(loan.id).and_then(|l| l.signature.clone()) {
                loan.signature = Some(local);
            }
        }

        self.cache.replace_all(snapshot);
        tracing::debug!(
            borrowers = self.cache.borrowers().len(),
            loans = self.cache.loans().len(),
            audit_logs = self.cache.audit_logs().len(),
            "ledger reloaded"
        );

        self.sweep_if_first_populated().await;
        Ok(())
    }

    async fn sweep_if_first_populated(&mut self) {
        if self.cache.loans().is_empty() {
            self.populated_swept = false;
            return;
        }
        if self.populated_swept || !self.config.sweep_on_first_load {
            return;
        }
        self.populated_swept = true;
        let report = self.sweep().await;
        tracing::debug!(changed = report.changed(), "initial sweep after loans populated");
    }

    async fn add_borrower(&mut self, new_borrower: NewBorrower) -> Result<Borrower> {
        new_borrower.validate()?;
        let borrower = new_borrower.into_borrower(Uuid::new_v4(), self.now());
        self.store.insert_borrower(self.account, &borrower).await?;
        self.cache.push_borrower(borrower.clone());

        tracing::info!(borrower_id = %borrower.id, name = %borrower.name, "borrower added");
        self.record(
            AuditAction::CreateBorrower,
            format!("Added borrower {}", borrower.name),
            Some(borrower.id),
        )
        .await;

        Ok(borrower)
    }

    async fn update_borrower(&mut self, id: BorrowerId, update: BorrowerUpdate) -> Result<Borrower> {
        let current = self
            .cache
            .borrower(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("borrower", id))?;
        if update.is_empty() {
            return Ok(current);
        }

        let updated = update.apply_to(&current)?;
        self.store.update_borrower(self.account, &updated).await?;
        self.cache.put_borrower(updated.clone());

        tracing::info!(borrower_id = %id, "borrower updated");
        self.record(
            AuditAction::UpdateBorrower,
            format!("Updated borrower {}", updated.name),
            Some(id),
        )
        .await;

        Ok(updated)
    }

    async fn delete_borrower(&mut self, id: BorrowerId) -> Result<usize> {
        let borrower = self
            .cache
            .borrower(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("borrower", id))?;

        if let Err(e) = self.store.delete_loans_for_borrower(self.account, id).await {
            tracing::warn!(borrower_id = %id, error = %e, "failed to delete borrower's loans");
        }
        self.store.delete_borrower(self.account, id).await?;
        let removed = self.cache.remove_borrower_cascade(id);

        tracing::info!(borrower_id = %id, loans_removed = removed, "borrower deleted");
        self.record(
            AuditAction::DeleteBorrower,
            format!("Deleted borrower {}", borrower.name),
            Some(id),
        )
        .await;
        self.sweep_if_first_populated().await;

        Ok(removed)
    }

    async fn create_loan(&mut self, new_loan: NewLoan) -> Result<Outcome<Loan>> {
        if self.cache.borrower(new_loan.borrower_id).is_none() {
            return Err(LedgerError::not_found("borrower", new_loan.borrower_id));
        }

        let loan = originate_loan(new_loan, self.now())?;
        self.store.insert_loan(self.account, &loan).await?;

        let mut warnings = Vec::new();
        if let Some(signature) = &loan.signature {
            if let Err(e) = self.store.attach_signature(self.account, loan.id, signature).await {
                tracing::warn!(loan_id = %loan.id, error = %e, "signature not persisted, kept in memory");
                warnings.push(LedgerWarning::PartialDegradation {
                    field: "signature",
                    reason: e.to_string(),
                });
            }
        }

        self.cache.push_loan(loan.clone());
        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %loan.borrower_id,
            principal = %loan.principal,
            due_date = %loan.due_date,
            "loan created"
        );

        let mut details = format!(
            "Created loan of {} due on {}",
            self.money(loan.principal),
            loan.due_date.format("%Y-%m-%d")
        );
        if !warnings.is_empty() {
            details.push_str(" (signature saved locally)");
        }
        self.record(AuditAction::CreateLoan, details, Some(loan.id)).await;
        self.sweep_if_first_populated().await;

        let value = self.cache.loan(loan.id).cloned().unwrap_or(loan);
        Ok(Outcome { value, warnings })
    }

    async fn delete_loan(&mut self, id: LoanId) -> Result<()> {
        if self.cache.loan(id).is_none() {
            return Err(LedgerError::not_found("loan", id));
        }

        self.store.delete_loan(self.account, id).await?;
        self.cache.remove_loan(id);

        tracing::info!(loan_id = %id, "loan deleted");
        self.record(
            AuditAction::DeleteLoan,
            format!("Deleted loan {}", short_id(&id, 6)),
            Some(id),
        )
        .await;
        self.sweep_if_first_populated().await;

        Ok(())
    }

    async fn apply_payment(&mut self, request: PaymentRequest) -> Result<Loan> {
        let mut loan = self
            .cache
            .loan(request.loan_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("loan", request.loan_id))?;

        let result = self.payments.process(&mut loan, request, self.now())?;
        self.store.update_loan(self.account, &loan).await?;
        self.cache.put_loan(loan.clone());

        tracing::info!(
            loan_id = %loan.id,
            amount = %result.payment.amount,
            balance = %result.new_balance,
            status = %loan.status,
            "payment applied"
        );
        let details = format!("Received payment of {}", self.money(result.payment.amount));
        self.record(AuditAction::Payment, details, Some(loan.id)).await;

        Ok(loan)
    }

    async fn update_due_date(&mut self, id: LoanId, due_date: NaiveDate) -> Result<Loan> {
        let mut loan = self
            .cache
            .loan(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("loan", id))?;

        loan.due_date = due_date;
        self.store.update_loan(self.account, &loan).await?;
        self.cache.put_loan(loan.clone());

        tracing::info!(loan_id = %id, due_date = %due_date, "due date updated");
        self.record(
            AuditAction::UpdateLoanDuedate,
            format!("Updated due date to {}", due_date.format("%Y-%m-%d")),
            Some(id),
        )
        .await;

        Ok(loan)
    }

    /// check every non-terminal loan for overdue accrual.
    ///
    /// Each loan is persisted on its own; a failed write is reported and the sweep
    /// moves on to the next loan with that loan's cached state untouched.
    async fn sweep(&mut self) -> SweepReport {
        let now = self.now();
        let mut report = SweepReport::default();
        let candidates: Vec<Loan> = self
            .cache
            .loans()
            .iter()
            .filter(|l| !l.is_terminal())
            .cloned()
            .collect();

        for mut loan in candidates {
            report.examined += 1;
            let decision = self.penalties.evaluate(&loan, now);
            if decision == PenaltyDecision::NoAction {
                continue;
            }
            tracing::debug!(loan_id = %loan.id, decision = ?decision, "sweep decision");

            let penalty = self.penalties.apply(&mut loan, &decision, now);
            if let Err(e) = self.store.update_loan(self.account, &loan).await {
                tracing::warn!(loan_id = %loan.id, error = %e, "penalty sweep failed for loan");
                report.failures.push(SweepFailure {
                    loan_id: loan.id,
                    error: e.into(),
                });
                continue;
            }
            self.cache.put_loan(loan.clone());

            match penalty {
                Some(charge) => {
                    report.penalties_applied += 1;
                    tracing::info!(
                        loan_id = %loan.id,
                        penalty = %charge.amount.abs(),
                        balance = %loan.balance,
                        "penalty applied"
                    );
                    let details = format!(
                        "Applied penalty of {} to Loan #{}",
                        self.money(charge.amount.abs()),
                        short_id(&loan.id, 4)
                    );
                    self.record(AuditAction::SystemPenalty, details, Some(loan.id)).await;
                }
                None => {
                    report.marked_overdue += 1;
                    tracing::info!(loan_id = %loan.id, "loan marked overdue");
                    self.record(
                        AuditAction::MarkOverdue,
                        format!("Marked Loan #{} overdue", short_id(&loan.id, 4)),
                        Some(loan.id),
                    )
                    .await;
                }
            }
        }

        if report.changed() > 0 || !report.failures.is_empty() {
            tracing::info!(
                examined = report.examined,
                penalties = report.penalties_applied,
                marked_overdue = report.marked_overdue,
                failures = report.failures.len(),
                "penalty sweep finished"
            );
        }
        report
    }
}

async fn fetch_snapshot(store: &dyn LedgerStore, account: AccountId) -> Result<LedgerSnapshot> {
    let (borrowers, loans, audit_logs) = tokio::try_join!(
        store.fetch_borrowers(account),
        store.fetch_loans(account),
        store.fetch_audit_logs(account),
    )?;
    Ok(LedgerSnapshot {
        borrowers,
        loans,
        audit_logs,
    })
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<ChangeNotification>>,
) -> std::result::Result<ChangeNotification, RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
