//! Bulk draft generation endpoints.
//!
//! - `GET  /v1/drafts/models`: allow-listed models and defaults
//! - `POST /v1/drafts/generate`: SSE stream of progress/draft/error/done
//! - `POST /v1/drafts/:operation_id/cancel`: cancel a running operation

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use tokio::sync::mpsc;

use mm_domain::drafts::GenerationRequest;
use mm_domain::error::Error;

use crate::runtime::cancel::OperationLease;
use crate::runtime::drafts::{start_operation, DraftEvent, DraftJob};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/drafts/models
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let drafting = &state.config.drafting;
    Json(serde_json::json!({
        "models": drafting.allowed_models,
        "defaultModel": drafting.default_model(),
        "defaultConcurrency": drafting.default_concurrency,
        "maxConcurrency": drafting.max_concurrency,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/drafts/generate (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::JsonDataError(e)) => {
            return bad_request(serde_json::json!({
                "error": "invalid request",
                "issues": [{ "path": "body", "message": e.body_text() }],
            }));
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected draft request body");
            return bad_request(serde_json::json!({ "error": "Invalid JSON body" }));
        }
    };

    tracing::info!(
        operation_id = %req.operation_id,
        campaign_id = ?req.campaign_id,
        contacts = req.contacts.len(),
        "draft generation requested"
    );

    let job = match DraftJob::from_request(req, &state.config.drafting) {
        Ok(job) => job,
        Err(Error::Validation(issues)) => {
            return bad_request(serde_json::json!({
                "error": "invalid request",
                "issues": issues,
            }));
        }
        Err(e) => return bad_request(serde_json::json!({ "error": e.to_string() })),
    };

    let Some(lease) = state.operations.register(&job.operation_id) else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "operation already running",
                "operationId": job.operation_id,
            })),
        )
            .into_response();
    };

    let rx = start_operation(job, state.completer.clone(), lease.token().clone());

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(make_sse_stream(rx, lease)),
    )
        .into_response()
}

fn bad_request(body: serde_json::Value) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Relay engine events as SSE frames.
///
/// Dropping the stream before `done` (client disconnect) cancels the
/// operation, even if the body was never polled; the lease unregisters it
/// either way.
fn make_sse_stream(
    mut rx: mpsc::Receiver<DraftEvent>,
    lease: OperationLease,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let cancel_on_drop = lease.token().clone().drop_guard();
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(to_sse_event(&event));
        }
        cancel_on_drop.disarm();
        drop(lease);
    }
}

pub fn to_sse_event(event: &DraftEvent) -> Event {
    match event.name() {
        Some(name) => Event::default().event(name).data(event.data_json()),
        None => Event::default().comment("heartbeat"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/drafts/:operation_id/cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> impl IntoResponse {
    if state.operations.cancel(&operation_id) {
        tracing::info!(operation_id = %operation_id, "draft operation cancel requested");
        (
            StatusCode::OK,
            Json(serde_json::json!({ "cancelled": true, "operationId": operation_id })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "no running operation with that id",
                "operationId": operation_id,
            })),
        )
    }
}
