//! Provider failure normalization.
//!
//! Every adapter reports failures as a [`ProviderError`] carrying the
//! optional machine-readable `code`, the HTTP `status` when there was one,
//! and whether the call was aborted. Callers never see raw transport errors.

/// Status-less messages containing any of these are treated as transient.
const TRANSIENT_MESSAGE_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "fetch failed",
    "429",
    "rate limit",
];

/// Codes that always mean "try again".
const TRANSIENT_CODES: &[&str] = &["timeout", "network", "rate_limited"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<String>,
    pub status: Option<u16>,
    /// The call was cut short (timeout or caller cancellation).
    pub aborted: bool,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            aborted: false,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// A non-2xx HTTP response. 429 and 5xx get the `rate_limited` and
    /// `upstream` codes respectively.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let err = Self::new(message).with_status(status);
        match status {
            429 => err.with_code("rate_limited"),
            s if s >= 500 => err.with_code("upstream"),
            _ => err,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            aborted: true,
            ..Self::new(message).with_code("timeout")
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message).with_code("network")
    }

    /// The caller's cancellation token fired mid-call.
    pub fn cancelled() -> Self {
        Self {
            aborted: true,
            ..Self::new("Request cancelled.").with_code("cancelled")
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.code.as_deref() == Some("cancelled")
    }

    /// Machine-readable code: own code, then `http_<status>`, then
    /// `timeout` for aborted calls, else `unknown`.
    pub fn error_code(&self) -> String {
        if let Some(code) = &self.code {
            return code.clone();
        }
        if let Some(status) = self.status {
            return format!("http_{status}");
        }
        if self.aborted {
            return "timeout".into();
        }
        "unknown".into()
    }

    /// Whether retrying the same call unchanged may succeed.
    pub fn is_transient(&self) -> bool {
        if let Some(code) = self.code.as_deref() {
            if TRANSIENT_CODES.contains(&code) {
                return true;
            }
        }
        if let Some(status) = self.status {
            return status == 429 || status >= 500;
        }
        let message = self.message.to_lowercase();
        TRANSIENT_MESSAGE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}
