use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::airdrop::models::{AirdropTask, RecipientOutcome, SubmissionMode, TaskStatus};
use crate::airdrop::registry::TaskWriter;
use crate::airdrop::slots::SlotAllocation;
use crate::error::{FatalError, LedgerError, SigningError};
use crate::ledger::client::{bounded, LedgerClient};
use crate::ledger::models::{SequenceTag, SubmitOutcome, UnsignedTransaction};

/// Ledgers close every few seconds
const SECONDS_PER_LEDGER: u64 = 3;
use crate::ledger::signer::{Credential, CredentialResolver, TransactionSigner};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pause between consecutive submissions
    pub tx_delay: Duration,
    /// Bound on every ledger call
    pub call_timeout: Duration,
    /// Bound on one submission including the wait for validation; longer
    /// than `LEDGER_WINDOW` closes so the ledger decides first
    pub submit_timeout: Duration,
    /// Bound on producing one signature (interactive approval can be slow)
    pub signing_timeout: Duration,
    /// In-flight submissions allowed on the slot path
    pub max_parallel_submissions: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tx_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(120),
            signing_timeout: Duration::from_secs(300),
            max_parallel_submissions: 1,
        }
    }
}

/// Why a single recipient's submission did not produce a ledger verdict
enum SubmitError {
    Signing(SigningError),
    Ledger(LedgerError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Signing(e) => write!(f, "{}", e),
            SubmitError::Ledger(e) => write!(f, "{}", e),
        }
    }
}

type SubmitResult = Result<SubmitOutcome, SubmitError>;

type InFlight<'a> = FuturesUnordered<BoxFuture<'a, (usize, &'a str, SubmitResult)>>;

/// Everything resolved before the first submission
struct RunContext {
    signer: Arc<dyn TransactionSigner>,
    account: String,
    fee_drops: u64,
    /// Ledgers added to the expiry window to cover signing time
    signing_ledgers: u32,
}

enum Plan {
    Sequence(u32),
    Slots(SlotAllocation),
}

/// Drives one submission per recipient to a verdict. A recipient's failure is
/// recorded and never stops the batch; only preconditions checked before the
/// first submission can fail the whole task.
pub struct DistributionExecutor {
    ledger: Arc<dyn LedgerClient>,
    resolver: Arc<dyn CredentialResolver>,
    config: ExecutorConfig,
}

impl DistributionExecutor {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        resolver: Arc<dyn CredentialResolver>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            ledger,
            resolver,
            config,
        }
    }

    #[instrument(skip(self, writer, credential), fields(task_id = %writer.id()))]
    pub async fn run(&self, writer: TaskWriter, credential: Credential) -> TaskStatus {
        if let Err(e) = writer.start() {
            error!("❌ Task could not start: {}", e);
            return writer.snapshot().status;
        }
        // cancelled while queued for a worker
        if writer.is_cancel_requested() {
            return Self::abort(&writer, FatalError::Cancelled);
        }

        let task = writer.snapshot();
        info!(
            "🚀 Airdrop started: {} recipients on {} ({:?} mode)",
            task.recipients.len(),
            task.network,
            task.mode
        );

        let (ctx, plan) = match self.prepare(&writer, &task, &credential).await {
            Ok(prepared) => prepared,
            Err(fatal) => return Self::abort(&writer, fatal),
        };

        let result = match plan {
            Plan::Sequence(sequence) => self.run_sequential(&writer, &task, &ctx, sequence).await,
            Plan::Slots(allocation) => self.run_slots(&writer, &task, &ctx, &allocation).await,
        };

        match result.and_then(|()| writer.complete().map_err(FatalError::from)) {
            Ok(()) => {
                let counts = writer.snapshot().counts();
                info!(
                    "✅ Airdrop completed: {} successful, {} failed",
                    counts.successful, counts.failed
                );
                TaskStatus::Completed
            }
            Err(fatal) => Self::abort(&writer, fatal),
        }
    }

    fn abort(writer: &TaskWriter, fatal: FatalError) -> TaskStatus {
        match fatal {
            FatalError::Cancelled => warn!("🛑 Airdrop cancelled"),
            ref other => error!("❌ Airdrop aborted: {}", other),
        }
        if let Err(e) = writer.fail(fatal.to_string()) {
            error!("❌ Could not record task failure: {}", e);
        }
        writer.snapshot().status
    }

    /// Task-level preconditions. Nothing here touches a recipient.
    async fn prepare(
        &self,
        writer: &TaskWriter,
        task: &AirdropTask,
        credential: &Credential,
    ) -> Result<(RunContext, Plan), FatalError> {
        let signer = match time::timeout(self.config.call_timeout, self.resolver.resolve(credential))
            .await
        {
            Ok(Ok(signer)) => signer,
            Ok(Err(e)) => return Err(FatalError::CredentialUnusable(e.to_string())),
            Err(_) => return Err(FatalError::CredentialUnusable("timed out".to_string())),
        };
        let account = signer.account().to_string();

        match &task.funding_account {
            Some(expected) if *expected != account => {
                return Err(FatalError::AccountMismatch {
                    expected: expected.clone(),
                    actual: account,
                });
            }
            Some(_) => {}
            None => writer.set_funding_account(&account),
        }

        let limit = self.config.call_timeout;
        let fee_drops = bounded("fee", limit, self.ledger.get_fee())
            .await
            .map_err(fatal_from_ledger)?;
        let info = bounded("account_info", limit, self.ledger.get_account(&account))
            .await
            .map_err(fatal_from_ledger)?;

        let plan = match task.mode {
            SubmissionMode::Sequence => Plan::Sequence(info.sequence),
            SubmissionMode::Slots => {
                let pool = bounded("account_objects", limit, self.ledger.get_slots(&account))
                    .await
                    .map_err(fatal_from_ledger)?;
                let allocation = SlotAllocation::allocate(&pool, task.recipients.len());
                if !allocation.is_complete() {
                    return Err(FatalError::InsufficientSlots {
                        available: allocation.assignments().len(),
                        required: task.recipients.len(),
                    });
                }
                writer.assign_slots(allocation.assignments())?;
                Plan::Slots(allocation)
            }
        };

        debug!(
            "🔧 Funding account {} ready, fee {} drops",
            account, fee_drops
        );

        let signing_ledgers = if credential.is_interactive() {
            let ledgers = self.config.signing_timeout.as_secs() / SECONDS_PER_LEDGER;
            u32::try_from(ledgers).unwrap_or(u32::MAX)
        } else {
            0
        };

        Ok((
            RunContext {
                signer,
                account,
                fee_drops,
                signing_ledgers,
            },
            plan,
        ))
    }

    /// One transaction at a time; each sequence number depends on the
    /// previous transaction's inclusion.
    async fn run_sequential(
        &self,
        writer: &TaskWriter,
        task: &AirdropTask,
        ctx: &RunContext,
        mut next_sequence: u32,
    ) -> Result<(), FatalError> {
        let mut stale = false;

        for (index, recipient) in task.recipients.iter().enumerate() {
            if index > 0 {
                time::sleep(self.config.tx_delay).await;
            }
            if writer.is_cancel_requested() {
                return Err(FatalError::Cancelled);
            }

            if stale {
                match bounded(
                    "account_info",
                    self.config.call_timeout,
                    self.ledger.get_account(&ctx.account),
                )
                .await
                {
                    Ok(info) => {
                        debug!("🔄 Sequence refreshed: {} -> {}", next_sequence, info.sequence);
                        next_sequence = info.sequence;
                        stale = false;
                    }
                    Err(e) => warn!("⚠️  Could not refresh sequence: {}", e),
                }
            }

            let Some(amount) = recipient.asset.to_ledger_amount(recipient.amount) else {
                self.record(writer, index, &recipient.address, Err(invalid_amount(recipient.amount)));
                continue;
            };

            let tx = UnsignedTransaction::payment(
                &ctx.account,
                &recipient.address,
                amount,
                ctx.fee_drops,
                SequenceTag::Sequence(next_sequence),
            );
            let result = self.submit_one(ctx, tx).await;

            match &result {
                Ok(outcome) if outcome.consumes_sequence() => next_sequence += 1,
                Ok(_) | Err(SubmitError::Ledger(_)) => stale = true,
                Err(SubmitError::Signing(_)) => {}
            }

            self.record(writer, index, &recipient.address, result);
        }

        Ok(())
    }

    /// Tickets are independent, so up to `max_parallel_submissions` may be in
    /// flight; the pacing delay still separates consecutive starts.
    async fn run_slots(
        &self,
        writer: &TaskWriter,
        task: &AirdropTask,
        ctx: &RunContext,
        allocation: &SlotAllocation,
    ) -> Result<(), FatalError> {
        let limit = self.config.max_parallel_submissions.max(1);
        let mut in_flight: InFlight<'_> = FuturesUnordered::new();
        let mut cancelled = false;

        for (index, recipient) in task.recipients.iter().enumerate() {
            while in_flight.len() >= limit {
                if let Some((done, address, result)) = in_flight.next().await {
                    self.record(writer, done, address, result);
                }
            }

            if index > 0 {
                let pause = time::sleep(self.config.tx_delay);
                tokio::pin!(pause);
                loop {
                    tokio::select! {
                        _ = &mut pause => break,
                        Some((done, address, result)) = in_flight.next(), if !in_flight.is_empty() => {
                            self.record(writer, done, address, result);
                        }
                    }
                }
            }

            if writer.is_cancel_requested() {
                cancelled = true;
                break;
            }

            let address = recipient.address.as_str();
            let (Some(slot), Some(amount)) = (
                allocation.slot_for(index),
                recipient.asset.to_ledger_amount(recipient.amount),
            ) else {
                self.record(writer, index, address, Err(invalid_amount(recipient.amount)));
                continue;
            };

            let tx = UnsignedTransaction::payment(
                &ctx.account,
                address,
                amount,
                ctx.fee_drops,
                SequenceTag::Slot(slot),
            );
            in_flight.push(Box::pin(async move {
                (index, address, self.submit_one(ctx, tx).await)
            }));
        }

        while let Some((done, address, result)) = in_flight.next().await {
            self.record(writer, done, address, result);
        }

        if cancelled {
            return Err(FatalError::Cancelled);
        }
        Ok(())
    }

    /// Sign and submit with a `LastLedgerSequence`, so a payment that is not
    /// validated in time can never be applied later
    async fn submit_one(&self, ctx: &RunContext, tx: UnsignedTransaction) -> SubmitResult {
        let current = bounded(
            "ledger_current",
            self.config.call_timeout,
            self.ledger.current_ledger(),
        )
        .await
        .map_err(SubmitError::Ledger)?;
        let tx = tx.expiring_after(current, ctx.signing_ledgers);

        let signed = match time::timeout(self.config.signing_timeout, ctx.signer.sign(&tx)).await {
            Ok(Ok(signed)) => signed,
            Ok(Err(e)) => return Err(SubmitError::Signing(e)),
            Err(_) => return Err(SubmitError::Signing(SigningError::Timeout)),
        };

        bounded("submit", self.config.submit_timeout, self.ledger.submit(&signed))
            .await
            .map_err(SubmitError::Ledger)
    }

    fn record(&self, writer: &TaskWriter, index: usize, address: &str, result: SubmitResult) {
        let outcome = match result {
            Ok(outcome) if outcome.accepted() => {
                info!("💸 #{} {} -> {}", index + 1, address, outcome.tx_ref);
                RecipientOutcome::success(outcome.tx_ref)
            }
            Ok(outcome) => {
                warn!("⚠️  #{} {} rejected: {}", index + 1, address, outcome.error_detail());
                RecipientOutcome::failed(outcome.error_detail())
            }
            Err(e) => {
                warn!("⚠️  #{} {} failed: {}", index + 1, address, e);
                RecipientOutcome::failed(e.to_string())
            }
        };

        if let Err(e) = writer.resolve(index, outcome) {
            error!("❌ Could not record recipient #{}: {}", index + 1, e);
        }
    }
}

fn fatal_from_ledger(error: LedgerError) -> FatalError {
    match error {
        LedgerError::AccountNotFound(account) => FatalError::FundingAccountNotFound(account),
        other => FatalError::LedgerUnreachable(other.to_string()),
    }
}

fn invalid_amount(amount: rust_decimal::Decimal) -> SubmitError {
    SubmitError::Ledger(LedgerError::Rejected {
        code: "temBAD_AMOUNT".to_string(),
        message: format!("{} is not a valid amount", amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airdrop::models::AssetDescriptor;
    use crate::airdrop::registry::{InMemoryTaskRegistry, TaskRegistry};
    use crate::ledger::models::{Network, DROPS_PER_XRP};
    use crate::testing::{MockLedger, MockResolver};
    use rust_decimal_macros::dec;

    fn fast_config(parallel: usize) -> ExecutorConfig {
        ExecutorConfig {
            tx_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(1),
            signing_timeout: Duration::from_secs(1),
            max_parallel_submissions: parallel,
        }
    }

    fn task(mode: SubmissionMode, count: usize) -> AirdropTask {
        AirdropTask::new(
            Some("rFunding".to_string()),
            Network::Testnet,
            AssetDescriptor::Native,
            mode,
            (0..count).map(|i| (format!("rDest{}", i), dec!(2))).collect(),
            12,
        )
    }

    fn funded_ledger() -> MockLedger {
        MockLedger::new().with_account("rFunding", 1_000 * DROPS_PER_XRP, 50)
    }

    #[tokio::test]
    async fn test_sequence_path_uses_consecutive_sequences() {
        let ledger = Arc::new(funded_ledger().rejecting("rDest1", "tecNO_DST_INSUF_XRP"));
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 3));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;

        assert_eq!(status, TaskStatus::Completed);
        let sequences: Vec<u64> = ledger
            .submissions()
            .iter()
            .map(|tx| tx["Sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![50, 51, 52]);
        assert!(ledger
            .submissions()
            .iter()
            .all(|tx| tx["LastLedgerSequence"] == 1020));

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.counts().successful, 2);
        assert_eq!(snapshot.counts().failed, 1);
    }

    #[tokio::test]
    async fn test_sequence_refreshed_after_transport_error() {
        let ledger = Arc::new(funded_ledger().failing_transport("rDest0"));
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 2));
        let id = writer.id();

        executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;

        let snapshot = registry.snapshot(id).unwrap();
        assert!(matches!(
            snapshot.recipients[0].outcome,
            RecipientOutcome::Failed { .. }
        ));
        assert!(matches!(
            snapshot.recipients[1].outcome,
            RecipientOutcome::Success { .. }
        ));
        assert!(ledger.account_reads() >= 2);
    }

    #[tokio::test]
    async fn test_slot_path_submits_each_slot_once() {
        let ledger = Arc::new(
            funded_ledger()
                .with_slots("rFunding", vec![90, 80, 70, 60, 50, 40])
                .with_submit_delay(Duration::from_millis(20)),
        );
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(3),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Slots, 5));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;
        assert_eq!(status, TaskStatus::Completed);

        let mut tickets: Vec<u64> = ledger
            .submissions()
            .iter()
            .map(|tx| {
                assert_eq!(tx["Sequence"], 0);
                tx["TicketSequence"].as_u64().unwrap()
            })
            .collect();
        tickets.sort_unstable();
        assert_eq!(tickets, vec![40, 50, 60, 70, 80]);
        assert!(ledger.max_in_flight() <= 3);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.recipients[0].slot, Some(40));
        assert_eq!(snapshot.recipients[4].slot, Some(80));
        assert_eq!(snapshot.counts().successful, 5);
    }

    #[tokio::test]
    async fn test_slot_shortfall_is_fatal() {
        let ledger = Arc::new(funded_ledger().with_slots("rFunding", vec![1, 2]));
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Slots, 3));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;

        assert_eq!(status, TaskStatus::Failed);
        assert!(ledger.submissions().is_empty());
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.counts().pending, 3);
        assert!(snapshot
            .error
            .unwrap()
            .contains("2 available, 3 required"));
    }

    #[tokio::test]
    async fn test_unusable_credential_is_fatal() {
        let ledger = Arc::new(funded_ledger());
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::unusable()),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 2));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sDefinitelySecret".to_string()))
            .await;

        assert_eq!(status, TaskStatus::Failed);
        let snapshot = registry.snapshot(id).unwrap();
        let error = snapshot.error.unwrap();
        assert!(error.starts_with("Signing credential unusable"));
        assert!(!error.contains("sDefinitelySecret"));
        assert!(snapshot.recipients.iter().all(|r| r.outcome.is_pending()));
    }

    #[tokio::test]
    async fn test_account_mismatch_is_fatal() {
        let ledger = Arc::new(funded_ledger());
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rSomebodyElse")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 1));

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;

        assert_eq!(status, TaskStatus::Failed);
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_submission() {
        let ledger = Arc::new(funded_ledger());
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            ExecutorConfig {
                tx_delay: Duration::from_millis(50),
                ..fast_config(1)
            },
        );
        let registry = Arc::new(InMemoryTaskRegistry::new());
        let writer = registry.create(task(SubmissionMode::Sequence, 10));
        let id = writer.id();

        let run = tokio::spawn(async move {
            executor
                .run(writer, Credential::Secret("sSecret".to_string()))
                .await
        });
        tokio::time::sleep(Duration::from_millis(75)).await;
        assert_eq!(registry.request_cancel(id), Some(true));

        assert_eq!(run.await.unwrap(), TaskStatus::Failed);
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.error.as_deref(), Some("cancelled"));
        let counts = snapshot.counts();
        assert!(counts.processed() >= 1 && counts.processed() < 10);
        assert_eq!(ledger.submissions().len(), counts.processed());
    }

    #[tokio::test]
    async fn test_cancel_while_queued_touches_nothing() {
        let ledger = Arc::new(funded_ledger());
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 3));
        let id = writer.id();
        assert_eq!(registry.request_cancel(id), Some(true));

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;

        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(ledger.account_reads(), 0);
        assert!(ledger.submissions().is_empty());
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.error.as_deref(), Some("cancelled"));
        assert_eq!(snapshot.counts().pending, 3);
    }

    #[tokio::test]
    async fn test_expired_payment_is_final_failure() {
        // every submission waits longer than the ledger window
        let ledger = Arc::new(funded_ledger().closing_ledgers_per_submit(25));
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            fast_config(1),
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 2));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;
        assert_eq!(status, TaskStatus::Completed);

        let submissions = ledger.submissions();
        assert_eq!(submissions[0]["LastLedgerSequence"], 1020);
        assert_eq!(submissions[1]["LastLedgerSequence"], 1045);
        // nothing was applied, so the sequence was never consumed
        assert_eq!(submissions[1]["Sequence"], 50);
        assert_eq!(ledger.get_account("rFunding").await.unwrap().sequence, 50);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.counts().failed, 2);
        for recipient in &snapshot.recipients {
            match &recipient.outcome {
                RecipientOutcome::Failed { error, .. } => {
                    assert!(error.starts_with("tefMAX_LEDGER"), "{}", error)
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_submit_timeout_fails_only_that_recipient() {
        let ledger = Arc::new(funded_ledger().delaying("rDest1", Duration::from_millis(500)));
        let executor = DistributionExecutor::new(
            ledger.clone(),
            Arc::new(MockResolver::new("rFunding")),
            ExecutorConfig {
                submit_timeout: Duration::from_millis(100),
                ..fast_config(1)
            },
        );
        let registry = InMemoryTaskRegistry::new();
        let writer = registry.create(task(SubmissionMode::Sequence, 3));
        let id = writer.id();

        let status = executor
            .run(writer, Credential::Secret("sSecret".to_string()))
            .await;
        assert_eq!(status, TaskStatus::Completed);

        let snapshot = registry.snapshot(id).unwrap();
        assert!(matches!(
            snapshot.recipients[0].outcome,
            RecipientOutcome::Success { .. }
        ));
        match &snapshot.recipients[1].outcome {
            RecipientOutcome::Failed { error, .. } => {
                assert_eq!(error, "Ledger call timed out: submit")
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(
            snapshot.recipients[2].outcome,
            RecipientOutcome::Success { .. }
        ));

        // the abandoned submission never reached the ledger; the refreshed
        // sequence is reused for the next recipient
        let sequences: Vec<u64> = ledger
            .submissions()
            .iter()
            .map(|tx| tx["Sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![50, 51]);
    }

    #[tokio::test]
    async fn test_delay_only_between_submissions() {
        let delay = Duration::from_millis(150);

        for mode in [SubmissionMode::Sequence, SubmissionMode::Slots] {
            let ledger = Arc::new(funded_ledger().with_slots("rFunding", vec![7, 8, 9]));
            let executor = DistributionExecutor::new(
                ledger.clone(),
                Arc::new(MockResolver::new("rFunding")),
                ExecutorConfig {
                    tx_delay: delay,
                    ..fast_config(1)
                },
            );
            let registry = InMemoryTaskRegistry::new();
            let writer = registry.create(task(mode, 3));

            let started = std::time::Instant::now();
            let status = executor
                .run(writer, Credential::Secret("sSecret".to_string()))
                .await;
            let finished = std::time::Instant::now();
            assert_eq!(status, TaskStatus::Completed);

            let times = ledger.submission_times();
            assert_eq!(times.len(), 3);
            assert!(times[0] - started < delay, "{:?} waited before first", mode);
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= delay, "{:?} gap too short", mode);
            }
            assert!(finished - times[2] < delay, "{:?} waited after last", mode);
        }
    }
}
