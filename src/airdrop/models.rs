use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StateError;
use crate::ledger::models::{xrp_to_drops, LedgerAmount, Network};

/// What is being distributed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetDescriptor {
    #[default]
    Native,
    Issued { code: String, issuer: String },
}

impl AssetDescriptor {
    pub fn label(&self) -> &str {
        match self {
            AssetDescriptor::Native => "XRP",
            AssetDescriptor::Issued { code, .. } => code,
        }
    }

    /// `None` when a native amount is not expressible in whole drops
    pub fn to_ledger_amount(&self, amount: Decimal) -> Option<LedgerAmount> {
        match self {
            AssetDescriptor::Native => xrp_to_drops(amount).map(LedgerAmount::Drops),
            AssetDescriptor::Issued { code, issuer } => Some(LedgerAmount::Issued {
                currency: code.clone(),
                issuer: issuer.clone(),
                value: amount,
            }),
        }
    }
}

/// How submissions claim their place in the funding account's history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Consecutive account sequence numbers, strictly one at a time
    #[default]
    Sequence,
    /// One pre-created ticket per recipient
    Slots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// pending -> running -> {completed | failed}; pending -> failed only for
    /// a task whose worker never started
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient sub-status. The transaction reference only exists on
/// success and the error detail only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecipientOutcome {
    Pending,
    Success {
        tx_ref: String,
        processed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        processed_at: DateTime<Utc>,
    },
}

impl RecipientOutcome {
    pub fn success(tx_ref: impl Into<String>) -> Self {
        RecipientOutcome::Success {
            tx_ref: tx_ref.into(),
            processed_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        RecipientOutcome::Failed {
            error: error.into(),
            processed_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RecipientOutcome::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientOutcome::Pending => "pending",
            RecipientOutcome::Success { .. } => "success",
            RecipientOutcome::Failed { .. } => "failed",
        }
    }
}

/// A recipient as supplied by the caller: a bare address, or an address
/// with its own amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientSpec {
    Address(String),
    WithAmount {
        address: String,
        #[serde(default)]
        amount: Option<Decimal>,
    },
}

impl RecipientSpec {
    pub fn address(&self) -> &str {
        match self {
            RecipientSpec::Address(address) => address,
            RecipientSpec::WithAmount { address, .. } => address,
        }
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            RecipientSpec::Address(_) => None,
            RecipientSpec::WithAmount { amount, .. } => *amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub asset: AssetDescriptor,
    /// Ticket this recipient was submitted with, slot mode only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
    #[serde(flatten)]
    pub outcome: RecipientOutcome,
}

/// One batch distribution from a single funding account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropTask {
    pub id: Uuid,
    /// Public address only; filled in by the worker when the task was
    /// created from a secret
    pub funding_account: Option<String>,
    pub network: Network,
    pub asset: AssetDescriptor,
    pub mode: SubmissionMode,
    pub recipients: Vec<Recipient>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
    pub estimated_fee_drops: u64,
    /// Task-level error, set only when the run was aborted
    pub error: Option<String>,
    pub cancel_requested: bool,
}

impl AirdropTask {
    pub fn new(
        funding_account: Option<String>,
        network: Network,
        asset: AssetDescriptor,
        mode: SubmissionMode,
        recipients: Vec<(String, Decimal)>,
        fee_per_tx_drops: u64,
    ) -> Self {
        let total_amount = recipients.iter().map(|(_, amount)| *amount).sum();
        let estimated_fee_drops = fee_per_tx_drops.saturating_mul(recipients.len() as u64);

        let recipients = recipients
            .into_iter()
            .map(|(address, amount)| Recipient {
                address,
                amount,
                asset: asset.clone(),
                slot: None,
                outcome: RecipientOutcome::Pending,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            funding_account,
            network,
            asset,
            mode,
            recipients,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_amount,
            estimated_fee_drops,
            error: None,
            cancel_requested: false,
        }
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), StateError> {
        if self.status != TaskStatus::Running {
            return Err(StateError::NotRunning(self.status));
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), StateError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn set_funding_account(&mut self, account: &str) {
        self.funding_account = Some(account.to_string());
    }

    /// Record the ticket each recipient will be submitted with
    pub fn assign_slot(&mut self, index: usize, slot: u32) -> Result<(), StateError> {
        self.ensure_running()?;
        let recipient = self
            .recipients
            .get_mut(index)
            .ok_or(StateError::RecipientOutOfRange(index))?;
        if !recipient.outcome.is_pending() {
            return Err(StateError::RecipientAlreadyResolved(index));
        }
        recipient.slot = Some(slot);
        Ok(())
    }

    /// Move one recipient from pending to its terminal outcome, exactly once
    pub fn resolve_recipient(
        &mut self,
        index: usize,
        outcome: RecipientOutcome,
    ) -> Result<(), StateError> {
        self.ensure_running()?;
        if outcome.is_pending() {
            return Err(StateError::NonTerminalOutcome);
        }
        let recipient = self
            .recipients
            .get_mut(index)
            .ok_or(StateError::RecipientOutOfRange(index))?;
        if !recipient.outcome.is_pending() {
            return Err(StateError::RecipientAlreadyResolved(index));
        }
        recipient.outcome = outcome;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), StateError> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), StateError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Returns false when the task already finished
    pub fn request_cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.cancel_requested = true;
        true
    }

    pub fn counts(&self) -> RecipientCounts {
        let mut counts = RecipientCounts {
            total: self.recipients.len(),
            ..Default::default()
        };
        for recipient in &self.recipients {
            match recipient.outcome {
                RecipientOutcome::Pending => counts.pending += 1,
                RecipientOutcome::Success { .. } => counts.successful += 1,
                RecipientOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn successful_amount(&self) -> Decimal {
        self.recipients
            .iter()
            .filter(|r| matches!(r.outcome, RecipientOutcome::Success { .. }))
            .map(|r| r.amount)
            .sum()
    }

    pub fn status_view(&self) -> TaskStatusView {
        let counts = self.counts();

        TaskStatusView {
            task_id: self.id,
            status: self.status,
            network: self.network,
            asset: self.asset.clone(),
            mode: self.mode,
            funding_account: self.funding_account.clone(),
            total: counts.total,
            completed: counts.processed(),
            successful: counts.successful,
            failed: counts.failed,
            pending: counts.pending,
            percentage: counts.percentage(),
            total_amount: self.total_amount,
            successful_amount: self.successful_amount(),
            estimated_fee_drops: self.estimated_fee_drops,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            cancel_requested: self.cancel_requested,
            results: self.recipients.iter().map(RecipientResult::from).collect(),
        }
    }

    pub fn summary(&self) -> TaskSummary {
        let counts = self.counts();

        TaskSummary {
            id: self.id,
            status: self.status,
            network: self.network,
            created_at: self.created_at,
            total: counts.total,
            completed: counts.processed(),
            successful: counts.successful,
            failed: counts.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
}

impl RecipientCounts {
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }

    /// Processed share of the batch, two decimal places
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.processed() as f64 / self.total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientResult {
    pub recipient: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub status: String,
    pub tx_ref: Option<String>,
    pub error: Option<String>,
    pub slot: Option<u32>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&Recipient> for RecipientResult {
    fn from(recipient: &Recipient) -> Self {
        let (tx_ref, error, processed_at) = match &recipient.outcome {
            RecipientOutcome::Pending => (None, None, None),
            RecipientOutcome::Success {
                tx_ref,
                processed_at,
            } => (Some(tx_ref.clone()), None, Some(*processed_at)),
            RecipientOutcome::Failed {
                error,
                processed_at,
            } => (None, Some(error.clone()), Some(*processed_at)),
        };

        Self {
            recipient: recipient.address.clone(),
            amount: recipient.amount,
            status: recipient.outcome.as_str().to_string(),
            tx_ref,
            error,
            slot: recipient.slot,
            processed_at,
        }
    }
}

/// Progress report returned by status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub network: Network,
    pub asset: AssetDescriptor,
    pub mode: SubmissionMode,
    pub funding_account: Option<String>,
    pub total: usize,
    /// Recipients processed so far, successful or not
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
    pub percentage: f64,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub successful_amount: Decimal,
    pub estimated_fee_drops: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub results: Vec<RecipientResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub status: TaskStatus,
    pub network: Network,
    pub created_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
}
