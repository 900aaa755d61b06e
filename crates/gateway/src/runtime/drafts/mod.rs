//! Bulk draft generation engine.
//!
//! Entry point: [`start_operation`] takes a validated [`DraftJob`] and
//! returns a channel of [`DraftEvent`]s suitable for SSE or for draining
//! from the CLI. The stream always ends with exactly one `done` frame.

pub mod emitter;
pub mod parse;
pub mod pool;
pub mod prompt;
pub mod retry;
pub mod rotation;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mm_domain::config::DraftingConfig;
use mm_domain::drafts::{Contact, GenerationRequest, Identity};
use mm_domain::error::Result;
use mm_domain::trace::TraceEvent;
use mm_providers::ChatCompleter;

pub use emitter::{DraftEvent, Emitter, Tally};
pub use retry::{ContactOutcome, RetryPolicy};
pub use rotation::{ModelRotation, TimeoutPolicy};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A validated request with every engine setting resolved.
#[derive(Debug, Clone)]
pub struct DraftJob {
    pub operation_id: String,
    pub campaign_id: Option<i64>,
    pub contacts: Vec<Contact>,
    pub identity: Identity,
    pub prompt: String,
    pub booking_for: Option<String>,
    pub rotation: ModelRotation,
    /// Effective worker count, already clamped.
    pub workers: usize,
    pub retry: RetryPolicy,
    pub timeouts: TimeoutPolicy,
    pub system_prompts: Vec<String>,
    pub heartbeat: Duration,
    pub event_backlog: usize,
    /// Wall-clock budget after which the operation cancels itself.
    pub max_duration: Duration,
}

impl DraftJob {
    /// Validate `req` and resolve models, worker count and timing from `cfg`.
    pub fn from_request(req: GenerationRequest, cfg: &DraftingConfig) -> Result<Self> {
        req.validate()?;

        let rotation = ModelRotation::from_config(req.models.as_deref(), cfg);
        let workers = pool::effective_concurrency(
            req.concurrency,
            cfg.default_concurrency,
            cfg.max_concurrency,
            req.contacts.len(),
        );

        Ok(Self {
            operation_id: req.operation_id,
            campaign_id: req.campaign_id,
            contacts: req.contacts,
            identity: req.identity,
            prompt: req.prompt,
            booking_for: req.booking_for,
            rotation,
            workers,
            retry: RetryPolicy::from_config(cfg),
            timeouts: TimeoutPolicy::from_config(cfg),
            system_prompts: cfg.system_prompts.clone(),
            heartbeat: cfg.heartbeat_interval(),
            event_backlog: cfg.event_backlog.max(1),
            max_duration: cfg.max_duration(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// start_operation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run `job` in the background and return its event stream.
///
/// Cancelling `cancel` (client disconnect, explicit cancel, or the
/// budget elapsing) stops new work, aborts in-flight calls and suppresses
/// further per-contact events; `done` is still sent.
pub fn start_operation(
    job: DraftJob,
    completer: Arc<dyn ChatCompleter>,
    cancel: CancellationToken,
) -> mpsc::Receiver<DraftEvent> {
    let (tx, rx) = mpsc::channel::<DraftEvent>(job.event_backlog);
    tokio::spawn(run_operation(Arc::new(job), completer, cancel, tx));
    rx
}

async fn run_operation(
    job: Arc<DraftJob>,
    completer: Arc<dyn ChatCompleter>,
    cancel: CancellationToken,
    tx: mpsc::Sender<DraftEvent>,
) {
    let emitter = Arc::new(Emitter::new(
        job.operation_id.clone(),
        job.campaign_id,
        job.contacts.len(),
        cancel.clone(),
        tx,
    ));

    TraceEvent::OperationStarted {
        operation_id: job.operation_id.clone(),
        campaign_id: job.campaign_id,
        contacts: job.contacts.len(),
        workers: job.workers,
        models: job.rotation.models().to_vec(),
    }
    .emit();

    let heartbeat_stop = CancellationToken::new();
    let heartbeat = tokio::spawn(heartbeat_loop(
        emitter.clone(),
        job.heartbeat,
        heartbeat_stop.clone(),
    ));

    let workers = pool::run_workers(job.clone(), completer, emitter.clone(), cancel.clone());
    tokio::pin!(workers);

    let deadline = tokio::time::sleep(job.max_duration);
    tokio::pin!(deadline);

    let timed_out = tokio::select! {
        _ = &mut workers => false,
        _ = &mut deadline => true,
    };
    if timed_out {
        tracing::warn!(
            operation_id = %job.operation_id,
            budget_secs = job.max_duration.as_secs(),
            "draft operation exceeded its time budget"
        );
        cancel.cancel();
        workers.await;
    }

    if cancel.is_cancelled() {
        let reason = if timed_out { "deadline_exceeded" } else { "cancelled" };
        tracing::info!(operation_id = %job.operation_id, reason, "draft operation cancelled");
        TraceEvent::OperationCancelled {
            operation_id: job.operation_id.clone(),
            reason: reason.to_string(),
        }
        .emit();
    }

    heartbeat_stop.cancel();
    if let Err(e) = heartbeat.await {
        tracing::warn!(error = %e, "heartbeat task failed");
    }

    let tally = emitter.finish().await;
    TraceEvent::OperationFinished {
        operation_id: job.operation_id.clone(),
        total: job.contacts.len(),
        succeeded: tally.succeeded,
        failed: tally.failed,
        duration_ms: emitter.elapsed_ms(),
        cancelled: cancel.is_cancelled(),
    }
    .emit();
}

/// Tick every `period` (first tick after one full period) until `stop`.
async fn heartbeat_loop(emitter: Arc<Emitter>, period: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = ticker.tick() => emitter.heartbeat().await,
        }
    }
}
