//! `murmur-drafts generate`: run one request locally and print its events.
//!
//! The request file has the same shape as the HTTP body. Ctrl-C cancels
//! the operation; the `done` summary is still printed.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use mm_domain::config::Config;
use mm_domain::drafts::GenerationRequest;
use mm_providers::ChatCompleter;

use crate::runtime::drafts::{start_operation, DraftEvent, DraftJob};

/// Read a request from `path`, run it to completion and print every event.
///
/// Returns `true` when every contact produced a draft.
pub async fn run(
    config: Arc<Config>,
    completer: Arc<dyn ChatCompleter>,
    path: &Path,
    json_output: bool,
) -> anyhow::Result<bool> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let req: GenerationRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;

    let job = DraftJob::from_request(req, &config.drafting)?;
    tracing::info!(
        operation_id = %job.operation_id,
        contacts = job.contacts.len(),
        workers = job.workers,
        "running draft operation"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, cancelling...");
            interrupt.cancel();
        }
    });

    let mut rx = start_operation(job, completer, cancel);
    let mut all_succeeded = false;
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        if let DraftEvent::Done(done) = &event {
            all_succeeded = done.failed == 0 && done.succeeded == done.total;
        }
        if json_output {
            if !matches!(event, DraftEvent::Heartbeat) {
                let line = serde_json::to_string(&event)
                    .map_err(|e| anyhow::anyhow!("serializing event: {e}"))?;
                writeln!(stdout, "{line}")?;
            }
            continue;
        }
        print_event(&mut stdout, &event)?;
    }
    stdout.flush()?;

    Ok(all_succeeded)
}

fn print_event(out: &mut impl Write, event: &DraftEvent) -> std::io::Result<()> {
    match event {
        DraftEvent::Progress(p) => {
            eprintln!(
                "\x1b[2m[{}/{}] ok={} failed={}\x1b[0m",
                p.completed, p.total, p.succeeded, p.failed
            );
        }
        DraftEvent::Draft(d) => {
            writeln!(out, "── contact {} ({}) ──", d.contact_id, d.model)?;
            writeln!(out, "Subject: {}", d.subject)?;
            writeln!(out)?;
            writeln!(out, "{}", d.message)?;
            writeln!(out)?;
        }
        DraftEvent::Error(e) => {
            eprintln!(
                "error: contact {} failed after {} retries [{}]: {}",
                e.contact_id, e.retry_count, e.code, e.message
            );
        }
        DraftEvent::Done(d) => {
            eprintln!(
                "done: {}/{} drafted, {} failed in {} ms",
                d.succeeded, d.total, d.failed, d.duration_ms
            );
        }
        DraftEvent::Heartbeat => {}
    }
    Ok(())
}
