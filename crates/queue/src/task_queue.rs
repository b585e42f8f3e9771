//! Bounded worker pool for fire-and-forget federation tasks.

use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use fedinet_core::{AckTracker, DeliveryEngine, FederationTask, InboxService, TaskQueue};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;

/// Executes one task.
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    /// Run one task to completion.
    async fn run(&self, task: FederationTask) -> AppResult<()>;
}

/// The services tasks run against.
#[derive(Clone)]
pub struct TaskContext {
    /// Eager deliveries.
    pub delivery: DeliveryEngine,
    /// Handler dispatch.
    pub inbox: InboxService,
    /// Outgoing acknowledgments.
    pub acks: AckTracker,
}

#[async_trait]
impl TaskRunner for TaskContext {
    async fn run(&self, task: FederationTask) -> AppResult<()> {
        match task {
            FederationTask::Deliver { activity_id } => {
                let outcome = self.delivery.deliver(&activity_id).await?;
                tracing::debug!(activity_id = %activity_id, outcome = ?outcome, "Eager delivery done");
                Ok(())
            }
            FederationTask::Dispatch { inbound_id } => self.inbox.dispatch(&inbound_id).await,
            FederationTask::SendAck {
                server_url,
                envelope,
            } => {
                self.acks.send_ack(&server_url, &envelope).await;
                Ok(())
            }
        }
    }
}

/// Cloneable producer side of a [`JobQueue`].
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::Sender<FederationTask>,
}

#[async_trait]
impl TaskQueue for JobSender {
    /// Waits for room when the queue is full.
    async fn enqueue(&self, task: FederationTask) -> AppResult<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| AppError::Internal("task queue is shut down".to_string()))
    }
}

/// Bounded channel drained by at most `workers` concurrent tasks.
pub struct JobQueue {
    sender: mpsc::Sender<FederationTask>,
    receiver: mpsc::Receiver<FederationTask>,
    workers: usize,
}

impl JobQueue {
    /// Create a queue holding up to `capacity` waiting tasks.
    #[must_use]
    pub fn new(capacity: usize, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver,
            workers: workers.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    /// A cloneable handle for enqueueing.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            sender: self.sender.clone(),
        }
    }

    /// Start processing with `runner`.
    pub fn start<R: TaskRunner>(self, runner: Arc<R>) -> QueueHandle {
        let (shutdown, signal) = watch::channel(false);
        let workers = self.workers;

        let join = tokio::spawn(async move {
            tracing::info!(workers, "Task queue starting");
            run_queue(self.receiver, runner, workers, signal).await;
            tracing::info!("Task queue stopped");
        });

        QueueHandle { shutdown, join }
    }
}

/// Control handle of a running [`JobQueue`].
pub struct QueueHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl QueueHandle {
    /// Refuse new tasks, finish the buffered and in-flight ones, then
    /// return.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Task queue terminated abnormally");
        }
    }
}

async fn run_queue<R: TaskRunner>(
    mut receiver: mpsc::Receiver<FederationTask>,
    runner: Arc<R>,
    workers: usize,
    mut signal: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut closing = false;

    loop {
        let task = if closing {
            receiver.recv().await
        } else {
            tokio::select! {
                task = receiver.recv() => task,
                _ = signal.changed() => {
                    closing = true;
                    receiver.close();
                    tracing::info!(buffered = receiver.len(), "Task queue draining");
                    continue;
                }
            }
        };

        let Some(task) = task else { break };
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let runner = runner.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let kind = task.kind();
            if let Err(e) = runner.run(task).await {
                tracing::error!(task = kind, error = %e, "Task failed");
            }
        });
    }

    // Every permit back means every spawned task has finished.
    let all = u32::try_from(workers).unwrap_or(u32::MAX);
    let _ = semaphore.acquire_many(all).await;
}
