//! Outbound event stream for one operation.
//!
//! All frames pass through one critical section that also owns the
//! `completed / succeeded / failed` tally, so every frame observes
//! `completed == succeeded + failed` and progress never goes backwards.

use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use mm_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub operation_id: String,
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayload {
    pub operation_id: String,
    pub contact_id: i64,
    pub draft_index: usize,
    pub model: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub operation_id: String,
    pub contact_id: i64,
    pub draft_index: usize,
    pub model: String,
    pub code: String,
    pub message: String,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    pub operation_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// One outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DraftEvent {
    Progress(ProgressPayload),
    Draft(DraftPayload),
    Error(ErrorPayload),
    Done(DonePayload),
    /// Keep-alive with no payload.
    Heartbeat,
}

impl DraftEvent {
    /// SSE event name; `None` for heartbeats, which go out as comments.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Progress(_) => Some("progress"),
            Self::Draft(_) => Some("draft"),
            Self::Error(_) => Some("error"),
            Self::Done(_) => Some("done"),
            Self::Heartbeat => None,
        }
    }

    /// The payload JSON, without the `event` tag.
    pub fn data_json(&self) -> String {
        let value = match self {
            Self::Progress(p) => serde_json::to_string(p),
            Self::Draft(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
            Self::Done(p) => serde_json::to_string(p),
            Self::Heartbeat => return String::new(),
        };
        value.unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Emitter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Final counts, returned by [`Emitter::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct EmitterState {
    /// `None` once closed (after `done`, or when the receiver went away).
    tx: Option<mpsc::Sender<DraftEvent>>,
    tally: Tally,
    first_draft_emitted: bool,
}

pub struct Emitter {
    operation_id: String,
    campaign_id: Option<i64>,
    total: usize,
    started: Instant,
    cancel: CancellationToken,
    state: Mutex<EmitterState>,
}

impl Emitter {
    pub fn new(
        operation_id: String,
        campaign_id: Option<i64>,
        total: usize,
        cancel: CancellationToken,
        tx: mpsc::Sender<DraftEvent>,
    ) -> Self {
        Self {
            operation_id,
            campaign_id,
            total,
            started: Instant::now(),
            cancel,
            state: Mutex::new(EmitterState {
                tx: Some(tx),
                tally: Tally::default(),
                first_draft_emitted: false,
            }),
        }
    }

    /// Record a success and emit `draft` then `progress`.
    ///
    /// Ignored once the operation is cancelled or the stream is closed.
    pub async fn record_success(
        &self,
        contact_id: i64,
        draft_index: usize,
        model: String,
        subject: String,
        message: String,
    ) {
        let mut state = self.state.lock().await;
        if state.tx.is_none() || self.cancel.is_cancelled() {
            return;
        }
        state.tally.succeeded += 1;
        state.tally.completed += 1;

        let draft = DraftEvent::Draft(DraftPayload {
            operation_id: self.operation_id.clone(),
            contact_id,
            draft_index,
            model,
            subject,
            message,
        });
        self.send_contact_frame(&mut state, draft).await;

        if !state.first_draft_emitted {
            state.first_draft_emitted = true;
            TraceEvent::FirstDraft {
                operation_id: self.operation_id.clone(),
                campaign_id: self.campaign_id,
                time_to_first_draft_ms: self.started.elapsed().as_millis() as u64,
            }
            .emit();
        }

        let progress = self.progress(&state.tally);
        self.send_contact_frame(&mut state, progress).await;
    }

    /// Record a terminal failure and emit `error` then `progress`.
    pub async fn record_failure(&self, payload: ErrorPayload) {
        let mut state = self.state.lock().await;
        if state.tx.is_none() || self.cancel.is_cancelled() {
            return;
        }
        state.tally.failed += 1;
        state.tally.completed += 1;

        self.send_contact_frame(&mut state, DraftEvent::Error(payload)).await;
        let progress = self.progress(&state.tally);
        self.send_contact_frame(&mut state, progress).await;
    }

    /// Queue a keep-alive unless the backlog is full; never waits.
    pub async fn heartbeat(&self) {
        let state = self.state.lock().await;
        if let Some(tx) = &state.tx {
            let _ = tx.try_send(DraftEvent::Heartbeat);
        }
    }

    /// Emit `done` exactly once and close the stream. Later calls return
    /// the same tally and emit nothing.
    pub async fn finish(&self) -> Tally {
        let mut state = self.state.lock().await;
        let tally = state.tally;
        if state.tx.is_some() {
            let done = DraftEvent::Done(DonePayload {
                operation_id: self.operation_id.clone(),
                total: self.total,
                succeeded: tally.succeeded,
                failed: tally.failed,
                duration_ms: self.started.elapsed().as_millis() as u64,
            });
            Self::send(&mut state, done).await;
        }
        state.tx = None;
        tally
    }

    pub async fn tally(&self) -> Tally {
        self.state.lock().await.tally
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn progress(&self, tally: &Tally) -> DraftEvent {
        DraftEvent::Progress(ProgressPayload {
            operation_id: self.operation_id.clone(),
            completed: tally.completed,
            total: self.total,
            succeeded: tally.succeeded,
            failed: tally.failed,
        })
    }

    /// Like [`Self::send`], but gives up once the operation is cancelled so
    /// a stalled consumer cannot hold workers past the budget. The frame is
    /// dropped; `done` still carries the counts.
    async fn send_contact_frame(&self, state: &mut EmitterState, event: DraftEvent) {
        let Some(tx) = &state.tx else { return };
        let receiver_gone = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(operation_id = %self.operation_id, "operation cancelled, dropping frame");
                false
            }
            sent = tx.send(event) => sent.is_err(),
        };
        if receiver_gone {
            tracing::debug!("draft event receiver dropped, closing emitter");
            state.tx = None;
        }
    }

    async fn send(state: &mut EmitterState, event: DraftEvent) {
        let Some(tx) = &state.tx else { return };
        if tx.send(event).await.is_err() {
            tracing::debug!("draft event receiver dropped, closing emitter");
            state.tx = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter(cap: usize) -> (Emitter, mpsc::Receiver<DraftEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(cap);
        let cancel = CancellationToken::new();
        (Emitter::new("op".into(), Some(3), 2, cancel.clone(), tx), rx, cancel)
    }

    fn drain(rx: &mut mpsc::Receiver<DraftEvent>) -> Vec<DraftEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn failure(contact_id: i64) -> ErrorPayload {
        ErrorPayload {
            operation_id: "op".into(),
            contact_id,
            draft_index: 2,
            model: "m".into(),
            code: "http_400".into(),
            message: "bad".into(),
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn success_emits_draft_then_progress() {
        let (em, mut rx, _) = emitter(16);
        em.record_success(1, 1, "m".into(), "s".into(), "b".into()).await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), Some("draft"));
        match &events[1] {
            DraftEvent::Progress(p) => {
                assert_eq!((p.completed, p.succeeded, p.failed, p.total), (1, 1, 0, 2));
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_emits_error_then_progress() {
        let (em, mut rx, _) = emitter(16);
        em.record_failure(failure(2)).await;
        let events = drain(&mut rx);
        assert_eq!(events[0].name(), Some("error"));
        assert!(events[0].data_json().contains("\"retryCount\":0"));
        assert_eq!(em.tally().await, Tally { completed: 1, succeeded: 0, failed: 1 });
    }

    #[tokio::test]
    async fn cancel_releases_a_send_blocked_on_full_backlog() {
        let (em, mut rx, cancel) = emitter(1);
        let em = std::sync::Arc::new(em);
        em.heartbeat().await;

        let blocked = {
            let em = em.clone();
            tokio::spawn(async move {
                em.record_success(1, 1, "m".into(), "s".into(), "b".into()).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), blocked)
            .await
            .expect("send gave up after cancel")
            .unwrap();

        assert_eq!(rx.recv().await, Some(DraftEvent::Heartbeat));
        assert_eq!(em.tally().await.succeeded, 1);
    }

    #[tokio::test]
    async fn done_is_emitted_once_and_closes() {
        let (em, mut rx, _) = emitter(16);
        em.record_success(1, 1, "m".into(), "s".into(), "b".into()).await;
        em.finish().await;
        em.finish().await;
        em.record_failure(failure(2)).await;
        em.heartbeat().await;
        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![Some("draft"), Some("progress"), Some("done")]);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_suppresses_contact_events_but_not_done() {
        let (em, mut rx, cancel) = emitter(16);
        cancel.cancel();
        em.record_success(1, 1, "m".into(), "s".into(), "b".into()).await;
        em.record_failure(failure(2)).await;
        let tally = em.finish().await;
        assert_eq!(tally, Tally::default());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DraftEvent::Done(d) => assert_eq!((d.total, d.succeeded, d.failed), (2, 0, 0)),
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn heartbeat_is_dropped_when_backlog_is_full() {
        let (em, mut rx, _) = emitter(1);
        em.heartbeat().await;
        em.heartbeat().await;
        assert_eq!(drain(&mut rx), vec![DraftEvent::Heartbeat]);
    }

    #[test]
    fn payloads_serialize_camel_case() {
        let ev = DraftEvent::Done(DonePayload {
            operation_id: "op".into(),
            total: 3,
            succeeded: 2,
            failed: 1,
            duration_ms: 10,
        });
        let v: serde_json::Value = serde_json::from_str(&ev.data_json()).unwrap();
        assert_eq!(v["operationId"], "op");
        assert_eq!(v["durationMs"], 10);
        assert!(v.get("event").is_none());
        assert_eq!(DraftEvent::Heartbeat.name(), None);
    }
}
