use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::airdrop::models::{AirdropTask, RecipientOutcome, RecipientResult, TaskStatus, TaskSummary};
use crate::airdrop::slots::SlotAssignment;
use crate::error::StateError;

/// Event channel capacity per task
const EVENT_CAPACITY: usize = 1000;

/// Progress notifications published by a task's owner
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Started {
        task_id: Uuid,
        funding_account: Option<String>,
    },
    RecipientResolved {
        task_id: Uuid,
        index: usize,
        result: RecipientResult,
        completed: usize,
        total: usize,
    },
    Finished {
        task_id: Uuid,
        status: TaskStatus,
        error: Option<String>,
        successful: usize,
        failed: usize,
    },
}

/// Shared store of airdrop tasks.
///
/// Readers get whole-task snapshots; all mutation goes through the single
/// [`TaskWriter`] handed out by `create`.
pub trait TaskRegistry: Send + Sync {
    fn create(&self, task: AirdropTask) -> TaskWriter;

    fn snapshot(&self, id: Uuid) -> Option<AirdropTask>;

    /// Newest first
    fn list(&self) -> Vec<TaskSummary>;

    fn subscribe(&self, id: Uuid) -> Option<broadcast::Receiver<TaskEvent>>;

    /// `None` for an unknown task, `Some(false)` when it already finished
    fn request_cancel(&self, id: Uuid) -> Option<bool>;

    /// Drop finished tasks that completed before `cutoff`
    fn purge_finished(&self, cutoff: DateTime<Utc>) -> usize;
}

/// Exclusive write access to one task. Not cloneable: the worker that holds
/// it is the task's only writer.
pub struct TaskWriter {
    id: Uuid,
    task: Arc<RwLock<AirdropTask>>,
    events: broadcast::Sender<TaskEvent>,
    cancel: Arc<AtomicBool>,
}

impl TaskWriter {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> AirdropTask {
        self.task.read().clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn publish(&self, event: TaskEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn start(&self) -> Result<(), StateError> {
        let event = {
            let mut task = self.task.write();
            task.start()?;
            TaskEvent::Started {
                task_id: self.id,
                funding_account: task.funding_account.clone(),
            }
        };
        self.publish(event);
        Ok(())
    }

    pub fn set_funding_account(&self, account: &str) {
        self.task.write().set_funding_account(account);
    }

    pub fn assign_slots(&self, assignments: &[SlotAssignment]) -> Result<(), StateError> {
        let mut task = self.task.write();
        for assignment in assignments {
            task.assign_slot(assignment.recipient_index, assignment.slot)?;
        }
        Ok(())
    }

    pub fn resolve(&self, index: usize, outcome: RecipientOutcome) -> Result<(), StateError> {
        let event = {
            let mut task = self.task.write();
            task.resolve_recipient(index, outcome)?;
            let counts = task.counts();
            TaskEvent::RecipientResolved {
                task_id: self.id,
                index,
                result: RecipientResult::from(&task.recipients[index]),
                completed: counts.processed(),
                total: counts.total,
            }
        };
        self.publish(event);
        Ok(())
    }

    pub fn complete(&self) -> Result<(), StateError> {
        let event = {
            let mut task = self.task.write();
            task.complete()?;
            Self::finished(&task)
        };
        self.publish(event);
        Ok(())
    }

    pub fn fail(&self, error: impl Into<String>) -> Result<(), StateError> {
        let event = {
            let mut task = self.task.write();
            task.fail(error)?;
            Self::finished(&task)
        };
        self.publish(event);
        Ok(())
    }

    fn finished(task: &AirdropTask) -> TaskEvent {
        let counts = task.counts();
        TaskEvent::Finished {
            task_id: task.id,
            status: task.status,
            error: task.error.clone(),
            successful: counts.successful,
            failed: counts.failed,
        }
    }
}

struct TaskEntry {
    task: Arc<RwLock<AirdropTask>>,
    events: broadcast::Sender<TaskEvent>,
    cancel: Arc<AtomicBool>,
}

/// In-memory registry with a lock per task
pub struct InMemoryTaskRegistry {
    tasks: RwLock<HashMap<Uuid, TaskEntry>>,
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

impl Default for InMemoryTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry for InMemoryTaskRegistry {
    fn create(&self, task: AirdropTask) -> TaskWriter {
        let id = task.id;
        let task = Arc::new(RwLock::new(task));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));

        self.tasks.write().insert(
            id,
            TaskEntry {
                task: task.clone(),
                events: events.clone(),
                cancel: cancel.clone(),
            },
        );

        TaskWriter {
            id,
            task,
            events,
            cancel,
        }
    }

    fn snapshot(&self, id: Uuid) -> Option<AirdropTask> {
        let tasks = self.tasks.read();
        tasks.get(&id).map(|entry| entry.task.read().clone())
    }

    fn list(&self) -> Vec<TaskSummary> {
        let mut summaries: Vec<TaskSummary> = self
            .tasks
            .read()
            .values()
            .map(|entry| entry.task.read().summary())
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    fn subscribe(&self, id: Uuid) -> Option<broadcast::Receiver<TaskEvent>> {
        self.tasks.read().get(&id).map(|entry| entry.events.subscribe())
    }

    fn request_cancel(&self, id: Uuid) -> Option<bool> {
        let tasks = self.tasks.read();
        let entry = tasks.get(&id)?;

        let accepted = entry.task.write().request_cancel();
        if accepted {
            entry.cancel.store(true, Ordering::SeqCst);
        }
        Some(accepted)
    }

    fn purge_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();

        tasks.retain(|_, entry| {
            let task = entry.task.read();
            !(task.status.is_terminal() && task.completed_at.map_or(false, |at| at < cutoff))
        });

        let purged = before - tasks.len();
        if purged > 0 {
            debug!("🧹 Purged {} finished tasks", purged);
        }
        purged
    }
}
