// Worker Pool - fixed set of worker slots behind a coordinator task
//
// All slot/pending state lives in the coordinator; handles talk to it only
// through the command channel.

use crate::application::worker::constants::{
    DEFAULT_POOL_SIZE, DEFAULT_RESTART_BACKOFF_MS, MAX_RESTART_BACKOFF,
};
use crate::application::worker::{
    execute_guarded_async, ExecutorConfig, ItemExecutor, PanicGuardResult, SlotId, Worker,
    WorkerDeps, WorkerEvent,
};
use crate::domain::{ItemRequest, WorkerOutcome};
use crate::error::{AppError, Result};
use crate::port::TimeProvider;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    /// Respawn delay unit, multiplied by consecutive faults
    pub restart_backoff: Duration,
    pub executor: ExecutorConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            restart_backoff: Duration::from_millis(DEFAULT_RESTART_BACKOFF_MS),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub busy: usize,
    pub pending: usize,
    pub restarts: u64,
}

enum Command {
    Submit {
        request: ItemRequest,
        reply: oneshot::Sender<WorkerOutcome>,
    },
    Stats(oneshot::Sender<PoolStats>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to the pool
#[derive(Clone)]
pub struct WorkerPool {
    commands: mpsc::UnboundedSender<Command>,
    capacity: usize,
    fallback_url: Arc<str>,
    time_provider: Arc<dyn TimeProvider>,
}

impl WorkerPool {
    /// Spawn `config.size` workers and return once every one reported ready
    pub async fn initialize(config: PoolConfig, deps: WorkerDeps) -> Result<Self> {
        if config.size == 0 {
            return Err(AppError::Config(
                "pool size must be at least 1".to_string(),
            ));
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let fallback_url: Arc<str> = Arc::from(config.executor.fallback_url.as_str());
        let mut coordinator = Coordinator {
            slots: (0..config.size).map(|_| None).collect(),
            idle: VecDeque::with_capacity(config.size),
            pending: VecDeque::new(),
            workers: JoinSet::new(),
            events_tx,
            deps: deps.clone(),
            executor_config: config.executor,
            restart_backoff: config.restart_backoff,
            consecutive_faults: 0,
            restarts: 0,
            fallback_url: fallback_url.clone(),
        };

        for slot in 0..config.size {
            coordinator.spawn_worker(slot, Duration::ZERO);
        }

        while coordinator.idle.len() < config.size {
            match events_rx.recv().await {
                Some(WorkerEvent::Ready(slot)) => coordinator.idle.push_back(slot),
                Some(other) => warn!(event = ?other, "Unexpected worker event during startup"),
                None => {
                    return Err(AppError::Internal(
                        "worker event channel closed during startup".to_string(),
                    ))
                }
            }
        }

        let (commands, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(coordinator.run(commands_rx, events_rx));

        info!(size = config.size, "Worker pool initialized");
        Ok(Self {
            commands,
            capacity: config.size,
            fallback_url,
            time_provider: deps.time_provider,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run one request on the pool
    ///
    /// Always resolves to exactly one outcome. Requests arriving while every
    /// slot is busy wait in FIFO order.
    pub async fn submit(&self, request: ItemRequest) -> WorkerOutcome {
        let (reply, outcome) = oneshot::channel();
        let retained = request.clone();

        if self.commands.send(Command::Submit { request, reply }).is_err() {
            return self.reject(&retained, AppError::PoolClosed);
        }

        match outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(job_key = %retained.job_key, "Pool dropped request during shutdown");
                self.reject(&retained, AppError::PoolClosed)
            }
        }
    }

    pub async fn stats(&self) -> Result<PoolStats> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| AppError::PoolClosed)?;
        rx.await.map_err(|_| AppError::PoolClosed)
    }

    /// Stop all workers and reject queued requests (idempotent)
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn reject(&self, request: &ItemRequest, err: AppError) -> WorkerOutcome {
        WorkerOutcome::rejected(
            request,
            err.to_string(),
            &self.fallback_url,
            self.time_provider.now_millis(),
        )
    }
}

/// Request assigned to a slot; the reply stays here, not with the worker
struct InFlight {
    request: ItemRequest,
    reply: oneshot::Sender<WorkerOutcome>,
}

struct Slot {
    assignments: mpsc::Sender<ItemRequest>,
    in_flight: Option<InFlight>,
}

/// What a worker task returns when it ends
type WorkerExit = (SlotId, Option<String>);

struct Coordinator {
    /// `None` only between a fault and the replacement's spawn
    slots: Vec<Option<Slot>>,
    idle: VecDeque<SlotId>,
    pending: VecDeque<InFlight>,
    workers: JoinSet<WorkerExit>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    deps: WorkerDeps,
    executor_config: ExecutorConfig,
    restart_backoff: Duration,
    consecutive_faults: u32,
    restarts: u64,
    fallback_url: Arc<str>,
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { request, reply }) => {
                        self.enqueue(InFlight { request, reply });
                    }
                    Some(Command::Stats(tx)) => {
                        let _ = tx.send(self.stats());
                    }
                    Some(Command::Shutdown(done)) => {
                        self.shutdown();
                        // Later submissions fail fast on the closed channel
                        commands.close();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_event(event),
                Some(joined) = self.workers.join_next() => self.on_worker_exit(joined),
            }
        }

        // Submissions still queued are dropped with their replies and
        // resolve as rejected on the caller's side.
        info!("Worker pool stopped");
    }

    fn spawn_worker(&mut self, slot: SlotId, delay: Duration) {
        let (assign_tx, assign_rx) = mpsc::channel(1);
        let executor = ItemExecutor::new(self.deps.clone(), self.executor_config.clone());
        let worker = Worker::new(slot, executor, assign_rx, self.events_tx.clone());

        self.workers.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match execute_guarded_async(worker.run()).await {
                PanicGuardResult::Success(()) => (slot, None),
                PanicGuardResult::Panicked(msg) => (slot, Some(msg)),
            }
        });

        self.slots[slot] = Some(Slot {
            assignments: assign_tx,
            in_flight: None,
        });
    }

    fn enqueue(&mut self, job: InFlight) {
        self.pending.push_back(job);
        self.dispatch();
    }

    /// Hand pending requests to idle slots, oldest first
    fn dispatch(&mut self) {
        while !self.pending.is_empty() {
            let Some(slot_id) = self.idle.pop_front() else {
                break;
            };
            let Some(slot) = self.slots[slot_id].as_mut() else {
                continue;
            };
            let Some(next) = self.pending.pop_front() else {
                self.idle.push_front(slot_id);
                break;
            };

            match slot.assignments.try_send(next.request.clone()) {
                Ok(()) => {
                    debug!(
                        slot = slot_id,
                        job_key = %next.request.job_key,
                        item_scope = %next.request.item_scope,
                        "Assigned request to worker"
                    );
                    slot.in_flight = Some(next);
                }
                Err(e) => {
                    // Worker is gone; its exit will respawn the slot
                    warn!(slot = slot_id, error = %e, "Worker refused assignment");
                    self.pending.push_front(next);
                }
            }
        }
    }

    fn on_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Ready(slot) => {
                if self.slots[slot].is_some() {
                    debug!(slot = slot, "Worker slot available");
                    self.idle.push_back(slot);
                }
            }
            WorkerEvent::Finished { slot, outcome } => {
                self.consecutive_faults = 0;
                let in_flight = self.slots[slot].as_mut().and_then(|s| s.in_flight.take());
                match in_flight {
                    Some(job) => {
                        if job.reply.send(outcome).is_err() {
                            debug!(slot = slot, "Caller went away before the outcome arrived");
                        }
                        self.idle.push_back(slot);
                    }
                    None => warn!(slot = slot, "Outcome from a slot with no assignment"),
                }
            }
        }
        self.dispatch();
    }

    fn on_worker_exit(&mut self, joined: std::result::Result<WorkerExit, JoinError>) {
        let (slot, panic_msg) = match joined {
            Ok(exit) => exit,
            Err(e) => {
                // Tasks are never aborted while the pool runs
                error!(error = %e, "Worker task could not be joined");
                return;
            }
        };

        let reason = panic_msg.unwrap_or_else(|| "worker exited unexpectedly".to_string());
        error!(slot = slot, reason = %reason, "Worker fault");

        self.idle.retain(|s| *s != slot);
        if let Some(job) = self.slots[slot].take().and_then(|s| s.in_flight) {
            let err = AppError::WorkerFault(reason);
            let outcome = WorkerOutcome::rejected(
                &job.request,
                err.to_string(),
                &self.fallback_url,
                self.deps.time_provider.now_millis(),
            );
            warn!(
                slot = slot,
                job_key = %job.request.job_key,
                item_scope = %job.request.item_scope,
                "Rejecting in-flight request of faulted worker"
            );
            let _ = job.reply.send(outcome);
        }

        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        self.restarts += 1;
        let delay = self
            .restart_backoff
            .saturating_mul(self.consecutive_faults)
            .min(MAX_RESTART_BACKOFF);
        info!(
            slot = slot,
            delay_ms = delay.as_millis() as u64,
            restarts = self.restarts,
            "Respawning worker"
        );
        self.spawn_worker(slot, delay);
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.slots.len(),
            idle: self.idle.len(),
            busy: self
                .slots
                .iter()
                .flatten()
                .filter(|s| s.in_flight.is_some())
                .count(),
            pending: self.pending.len(),
            restarts: self.restarts,
        }
    }

    fn shutdown(&mut self) {
        let now = self.deps.time_provider.now_millis();
        let rejected = self.pending.len();
        for job in self.pending.drain(..) {
            let outcome = WorkerOutcome::rejected(
                &job.request,
                AppError::PoolClosed.to_string(),
                &self.fallback_url,
                now,
            );
            let _ = job.reply.send(outcome);
        }

        // Dropping the assignment senders stops idle workers; in-flight
        // replies are dropped and their callers resolve as rejected.
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.idle.clear();
        self.workers.detach_all();

        info!(rejected = rejected, "Worker pool shutting down");
    }
}
