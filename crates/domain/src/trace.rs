use serde::Serialize;

/// Structured trace events emitted by the drafting pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    OperationStarted {
        operation_id: String,
        campaign_id: Option<i64>,
        contacts: usize,
        workers: usize,
        models: Vec<String>,
    },
    FirstDraft {
        operation_id: String,
        campaign_id: Option<i64>,
        time_to_first_draft_ms: u64,
    },
    LlmAttempt {
        operation_id: String,
        contact_id: i64,
        model: String,
        retry_count: u32,
        duration_ms: u64,
        ok: bool,
    },
    ContactFailed {
        operation_id: String,
        campaign_id: Option<i64>,
        contact_id: i64,
        code: String,
        message: String,
        retry_count: u32,
    },
    OperationCancelled {
        operation_id: String,
        reason: String,
    },
    OperationFinished {
        operation_id: String,
        total: usize,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
        cancelled: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mm_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::OperationCancelled {
            operation_id: "op".into(),
            reason: "client_disconnected".into(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "OperationCancelled");
        assert_eq!(v["reason"], "client_disconnected");
    }
}
