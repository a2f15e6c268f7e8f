// Worker - one long-lived execution slot of the pool

pub mod constants;
pub mod executor;
mod panic_guard;
mod shutdown;

pub use executor::{ExecutorConfig, ItemExecutor, WorkerDeps};
pub use panic_guard::{execute_guarded_async, panic_message, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::{ItemRequest, WorkerOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Index of a worker slot inside the pool
pub type SlotId = usize;

/// Worker -> coordinator notifications
#[derive(Debug)]
pub enum WorkerEvent {
    /// Slot is up and waiting for its first assignment
    Ready(SlotId),
    /// Slot produced the terminal outcome of its current assignment
    Finished {
        slot: SlotId,
        outcome: WorkerOutcome,
    },
}

/// Executes assignments for one slot, one at a time
///
/// The worker never sees the caller's reply channel: the coordinator keeps
/// it, so a worker that dies mid-item cannot strand the caller.
pub struct Worker {
    slot: SlotId,
    executor: ItemExecutor,
    assignments: mpsc::Receiver<ItemRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Worker {
    pub fn new(
        slot: SlotId,
        executor: ItemExecutor,
        assignments: mpsc::Receiver<ItemRequest>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            slot,
            executor,
            assignments,
            events,
        }
    }

    /// Run until the assignment channel closes or the pool goes away
    pub async fn run(mut self) {
        if self.events.send(WorkerEvent::Ready(self.slot)).is_err() {
            return;
        }
        debug!(slot = self.slot, "Worker ready");

        while let Some(request) = self.assignments.recv().await {
            debug!(
                slot = self.slot,
                job_key = %request.job_key,
                item_scope = %request.item_scope,
                "Worker picked up assignment"
            );
            let outcome = self.executor.execute(request).await;

            let event = WorkerEvent::Finished {
                slot: self.slot,
                outcome,
            };
            if self.events.send(event).is_err() {
                break;
            }
        }

        info!(slot = self.slot, "Worker stopped");
    }
}
