use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{JobScheduler, StageHandler, Worker};
use crate::config::{PipelineConfig, RetryPolicy};
use crate::context::PipelineContext;
use crate::error::{PipelineError, SchedulerError, StoreError, SubmissionError};
use crate::events::PipelineEvent;
use crate::orchestrator::Orchestrator;
use crate::models::{ProcessingStatus, QueueName, ResponseRecord, Submission, WorkUnit};

/// Count of scheduled units and undelivered signals
#[derive(Debug, Default)]
pub struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    pub fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once nothing is queued, running or waiting for delivery
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Scheduler backed by one bounded channel per queue
pub struct QueueScheduler {
    queues: HashMap<QueueName, mpsc::Sender<WorkUnit>>,
    tracker: Arc<Outstanding>,
}

impl QueueScheduler {
    fn new(queues: HashMap<QueueName, mpsc::Sender<WorkUnit>>, tracker: Arc<Outstanding>) -> Self {
        Self { queues, tracker }
    }
}

#[async_trait]
impl JobScheduler for QueueScheduler {
    async fn schedule(&self, unit: WorkUnit) -> Result<(), SchedulerError> {
        let Some(sender) = self.queues.get(&unit.queue).cloned() else {
            return Err(SchedulerError::QueueClosed(unit.queue.to_string()));
        };
        self.tracker.begin();

        if unit.delay.is_zero() {
            let queue = unit.queue;
            if sender.send(unit).await.is_err() {
                self.tracker.finish();
                return Err(SchedulerError::QueueClosed(queue.to_string()));
            }
            return Ok(());
        }

        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(unit.delay).await;
            let queue = unit.queue;
            if sender.send(unit).await.is_err() {
                warn!("Dropped delayed unit: queue {} is closed", queue);
                tracker.finish();
            }
        });
        Ok(())
    }
}

/// Pull units off one queue and run them on the shared worker
async fn dispatch(
    queue: QueueName,
    mut units: mpsc::Receiver<WorkUnit>,
    worker: Arc<Worker>,
    permits: Arc<Semaphore>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    tracker: Arc<Outstanding>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Dispatcher for {} started", queue);
    loop {
        let unit = tokio::select! {
            _ = shutdown.changed() => break,
            unit = units.recv() => match unit {
                Some(unit) => unit,
                None => break,
            },
        };

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let worker = worker.clone();
        let events = events.clone();
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Some(signal) = worker.execute(&unit).await {
                tracker.begin();
                if events.send(PipelineEvent::StageCompleted(signal)).is_err() {
                    warn!("Dropped completion of {}: event loop is closed", unit);
                    tracker.finish();
                }
            }
            tracker.finish();
        });
    }
    debug!("Dispatcher for {} stopped", queue);
}

/// Hand every signal to the orchestrator, redelivering on failure
async fn deliver_events(
    orchestrator: Arc<Orchestrator>,
    mut events: mpsc::UnboundedReceiver<PipelineEvent>,
    retry: RetryPolicy,
    tracker: Arc<Outstanding>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let orchestrator = orchestrator.clone();
        let tracker = tracker.clone();
        tokio::spawn(async move {
            deliver(&orchestrator, &event, retry).await;
            tracker.finish();
        });
    }
}

async fn deliver(orchestrator: &Orchestrator, event: &PipelineEvent, retry: RetryPolicy) {
    let mut attempt = 1;
    loop {
        match orchestrator.handle(event).await {
            Ok(decision) => {
                debug!("{} -> {:?}", event, decision);
                return;
            }
            Err(err) if retry.allows_another(attempt) => {
                let backoff = retry.backoff_for(attempt);
                warn!(
                    "Handling {} failed (attempt {}), redelivering in {:?}: {}",
                    event, attempt, backoff, err
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    "Giving up on {} after {} attempt(s): {}",
                    event, attempt, err
                );
                return;
            }
        }
    }
}

/// In-process pipeline: orchestrator, stage queues and their workers
///
/// Must be started inside a Tokio runtime.
pub struct Pipeline {
    orchestrator: Arc<Orchestrator>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    tracker: Arc<Outstanding>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn start(
        ctx: PipelineContext,
        config: PipelineConfig,
        handlers: Vec<Arc<dyn StageHandler>>,
    ) -> Self {
        let tracker = Arc::new(Outstanding::default());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut worker = Worker::new(ctx.clone(), config.retry);
        for handler in handlers {
            worker = worker.with_handler(handler);
        }
        let worker = Arc::new(worker);

        let mut senders = HashMap::new();
        let mut tasks = Vec::new();
        for queue in QueueName::ALL {
            let (tx, rx) = mpsc::channel(config.queues.capacity.max(1));
            senders.insert(queue, tx);

            let permits = Arc::new(Semaphore::new(config.queues.concurrency(queue)));
            tasks.push(tokio::spawn(dispatch(
                queue,
                rx,
                worker.clone(),
                permits,
                events_tx.clone(),
                tracker.clone(),
                shutdown_rx.clone(),
            )));
        }

        let scheduler = Arc::new(QueueScheduler::new(senders, tracker.clone()));
        let retry = config.retry;
        let orchestrator = Arc::new(Orchestrator::new(ctx, scheduler, config));

        tasks.push(tokio::spawn(deliver_events(
            orchestrator.clone(),
            events_rx,
            retry,
            tracker.clone(),
            shutdown_rx,
        )));

        info!("Pipeline started with {} queue(s)", QueueName::ALL.len());

        Self {
            orchestrator,
            events: events_tx,
            tracker,
            shutdown,
            tasks,
        }
    }

    /// Accept a submission and start it down the pipeline
    pub async fn submit(&self, submission: Submission) -> Result<Uuid, SubmissionError> {
        let event = self.orchestrator.accept(submission).await?;
        let id = event.response_id;
        self.emit(PipelineEvent::ResponseSubmitted(event))
            .map_err(|_| SubmissionError::Closed)?;
        Ok(id)
    }

    /// Reset a response and run it through the pipeline again
    pub async fn reprocess(&self, response_id: Uuid) -> Result<(), PipelineError> {
        let event = self.orchestrator.reprocess(response_id).await?;
        self.emit(PipelineEvent::ResponseSubmitted(event))
            .map_err(|_| SchedulerError::QueueClosed("events".to_string()))?;
        Ok(())
    }

    pub async fn record(&self, response_id: Uuid) -> Result<ResponseRecord, StoreError> {
        self.orchestrator.context().store.get(response_id).await
    }

    pub async fn records(&self, campaign_id: Option<Uuid>) -> Result<Vec<ResponseRecord>, StoreError> {
        self.orchestrator.context().store.list(campaign_id).await
    }

    pub async fn status_counts(
        &self,
        campaign_id: Option<Uuid>,
    ) -> Result<BTreeMap<ProcessingStatus, usize>, PipelineError> {
        self.orchestrator.status_counts(campaign_id).await
    }

    /// Wait until no unit or signal is outstanding; false on timeout
    pub async fn wait_for_settled(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tracker.wait_idle())
            .await
            .is_ok()
    }

    /// Stop the dispatchers and the event loop; queued work is dropped
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        drop(self.events);
        for task in self.tasks {
            if let Err(err) = task.await {
                error!("Pipeline task ended abnormally: {}", err);
            }
        }
        info!("Pipeline stopped");
    }

    fn emit(&self, event: PipelineEvent) -> Result<(), mpsc::error::SendError<PipelineEvent>> {
        self.tracker.begin();
        self.events.send(event).inspect_err(|_| self.tracker.finish())
    }
}
