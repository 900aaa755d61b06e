/// Error type shared by the Murmur crates.
///
/// Provider call failures have their own type in `mm-providers`; this one
/// covers setup and request validation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Building the HTTP client failed.
    #[error("HTTP: {0}")]
    Http(String),

    /// No usable provider credential.
    #[error("auth: {0}")]
    Auth(String),

    /// The request body parsed but broke one or more rules.
    #[error("invalid request: {} issue(s)", .0.len())]
    Validation(Vec<crate::drafts::FieldIssue>),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::FieldIssue;

    #[test]
    fn validation_message_counts_issues() {
        let err = Error::Validation(vec![
            FieldIssue {
                path: "contacts".into(),
                message: "must contain at least one contact".into(),
            },
            FieldIssue {
                path: "prompt".into(),
                message: "must not be empty".into(),
            },
        ]);
        assert_eq!(err.to_string(), "invalid request: 2 issue(s)");
    }
}
