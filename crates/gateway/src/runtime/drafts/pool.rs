//! Fixed-size worker pool over a shared contact cursor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mm_domain::drafts::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use mm_domain::trace::TraceEvent;
use mm_providers::ChatCompleter;

use super::emitter::{Emitter, ErrorPayload};
use super::retry::{draft_contact, ContactOutcome};
use super::DraftJob;

/// Worker count for an operation.
///
/// `clamp(requested ?? configured default, 1, max)` and never more than
/// one worker per contact. `max` is itself capped at the request limit.
pub fn effective_concurrency(
    requested: Option<i64>,
    configured_default: usize,
    configured_max: usize,
    contacts: usize,
) -> usize {
    let max = (configured_max as i64).clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
    let wanted = requested.unwrap_or(configured_default as i64);
    let clamped = wanted.clamp(MIN_CONCURRENCY, max) as usize;
    clamped.min(contacts)
}

/// Spawn `job.workers` workers and wait for all of them.
///
/// Each worker claims the next contact index with one `fetch_add`, runs it
/// to a terminal outcome, and loops; it exits when the cursor runs past the
/// end or the operation is cancelled.
pub async fn run_workers(
    job: Arc<DraftJob>,
    completer: Arc<dyn ChatCompleter>,
    emitter: Arc<Emitter>,
    cancel: CancellationToken,
) {
    let cursor = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..job.workers)
        .map(|worker| {
            let job = job.clone();
            let completer = completer.clone();
            let emitter = emitter.clone();
            let cancel = cancel.clone();
            let cursor = cursor.clone();
            tokio::spawn(async move {
                worker_loop(worker, &job, completer.as_ref(), &emitter, &cursor, &cancel).await;
            })
        })
        .collect();

    for result in futures_util::future::join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(
                operation_id = %job.operation_id,
                error = %e,
                "draft worker panicked"
            );
        }
    }
}

async fn worker_loop(
    worker: usize,
    job: &DraftJob,
    completer: &dyn ChatCompleter,
    emitter: &Emitter,
    cursor: &AtomicUsize,
    cancel: &CancellationToken,
) {
    let mut handled = 0usize;
    while !cancel.is_cancelled() {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= job.contacts.len() {
            break;
        }
        handled += 1;

        let contact_id = job.contacts[index].id;
        let draft_index = index + 1;
        match draft_contact(job, completer, index, cancel).await {
            ContactOutcome::Succeeded {
                model,
                subject,
                message,
                ..
            } => {
                emitter
                    .record_success(contact_id, draft_index, model, subject, message)
                    .await;
            }
            ContactOutcome::Failed {
                model,
                code,
                message,
                retry_count,
            } => {
                tracing::warn!(
                    operation_id = %job.operation_id,
                    campaign_id = ?job.campaign_id,
                    contact_id,
                    code = %code,
                    error = %message,
                    "contact failed after retries"
                );
                TraceEvent::ContactFailed {
                    operation_id: job.operation_id.clone(),
                    campaign_id: job.campaign_id,
                    contact_id,
                    code: code.clone(),
                    message: message.clone(),
                    retry_count,
                }
                .emit();
                emitter
                    .record_failure(ErrorPayload {
                        operation_id: job.operation_id.clone(),
                        contact_id,
                        draft_index,
                        model,
                        code,
                        message,
                        retry_count,
                    })
                    .await;
            }
            ContactOutcome::Cancelled => break,
        }
    }
    tracing::debug!(operation_id = %job.operation_id, worker, handled, "draft worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_above_contact_count_is_capped() {
        assert_eq!(effective_concurrency(Some(100), 5, 20, 3), 3);
    }

    #[test]
    fn request_is_clamped_to_limits() {
        assert_eq!(effective_concurrency(Some(100), 5, 20, 50), 20);
        assert_eq!(effective_concurrency(Some(-3), 5, 20, 50), 1);
    }

    #[test]
    fn configured_default_applies_when_not_requested() {
        assert_eq!(effective_concurrency(None, 5, 20, 50), 5);
        assert_eq!(effective_concurrency(None, 0, 20, 50), 1);
        assert_eq!(effective_concurrency(None, 64, 20, 50), 20);
    }

    #[test]
    fn configured_max_cannot_exceed_request_limit() {
        assert_eq!(effective_concurrency(Some(20), 5, 500, 50), 20);
        assert_eq!(effective_concurrency(Some(20), 5, 4, 50), 4);
    }
}
