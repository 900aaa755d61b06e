//! Wire types for a bulk draft generation request.
//!
//! Field names follow the camelCase JSON the web client sends. Everything
//! the engine relies on is checked by [`GenerationRequest::validate`], which
//! reports every problem at once rather than stopping at the first.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Inclusive bounds for a requested worker count.
pub const MIN_CONCURRENCY: i64 = 1;
pub const MAX_CONCURRENCY: i64 = 20;

/// One recipient to draft an email for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-form enrichment data; strings are compacted before prompting.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// The sender's profile, injected into every prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub band_name: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// `POST /v1/drafts/generate` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Caller-supplied correlation id, echoed on every event.
    pub operation_id: String,
    /// Correlation id for logs only.
    #[serde(default)]
    pub campaign_id: Option<i64>,
    pub contacts: Vec<Contact>,
    pub identity: Identity,
    pub prompt: String,
    #[serde(default)]
    pub booking_for: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub concurrency: Option<i64>,
}

/// A single validation failure, addressed by a JSON-ish path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl GenerationRequest {
    /// Check every structural rule; `Err(Error::Validation)` carries all issues.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if self.operation_id.trim().is_empty() {
            issues.push(FieldIssue::new("operationId", "must not be empty"));
        }
        if let Some(id) = self.campaign_id {
            if id <= 0 {
                issues.push(FieldIssue::new("campaignId", "must be a positive integer"));
            }
        }
        if self.contacts.is_empty() {
            issues.push(FieldIssue::new("contacts", "must contain at least one contact"));
        }
        let mut seen = std::collections::HashSet::new();
        for (i, contact) in self.contacts.iter().enumerate() {
            if contact.id <= 0 {
                issues.push(FieldIssue::new(
                    format!("contacts[{i}].id"),
                    "must be a positive integer",
                ));
            } else if !seen.insert(contact.id) {
                issues.push(FieldIssue::new(
                    format!("contacts[{i}].id"),
                    format!("duplicate contact id {}", contact.id),
                ));
            }
        }
        if self.identity.name.trim().is_empty() {
            issues.push(FieldIssue::new("identity.name", "must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            issues.push(FieldIssue::new("prompt", "must not be empty"));
        }
        if let Some(models) = &self.models {
            for (i, model) in models.iter().enumerate() {
                if model.is_empty() {
                    issues.push(FieldIssue::new(format!("models[{i}]"), "must not be empty"));
                }
            }
        }
        if let Some(n) = self.concurrency {
            if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&n) {
                issues.push(FieldIssue::new(
                    "concurrency",
                    format!("must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"),
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(issues))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GenerationRequest {
        serde_json::from_value(serde_json::json!({
            "operationId": "op-1",
            "campaignId": 7,
            "contacts": [{ "id": 1, "firstName": "Ana", "company": "The Basement" }],
            "identity": { "name": "Jo", "bandName": "The Jos" },
            "prompt": "Ask about a Friday slot",
        }))
        .unwrap()
    }

    fn issues(req: &GenerationRequest) -> Vec<FieldIssue> {
        match req.validate() {
            Err(Error::Validation(issues)) => issues,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn camel_case_body_parses() {
        let req = valid();
        assert_eq!(req.operation_id, "op-1");
        assert_eq!(req.contacts[0].first_name.as_deref(), Some("Ana"));
        assert_eq!(req.identity.band_name.as_deref(), Some("The Jos"));
        assert!(req.models.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut req = valid();
        req.concurrency = Some(0);
        let issues = issues(&req);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "concurrency");
    }

    #[test]
    fn concurrency_above_twenty_is_rejected() {
        let mut req = valid();
        req.concurrency = Some(21);
        assert_eq!(issues(&req)[0].path, "concurrency");
    }

    #[test]
    fn empty_contacts_and_blank_fields_are_all_reported() {
        let mut req = valid();
        req.contacts.clear();
        req.prompt = "  ".into();
        req.identity.name = String::new();
        let paths: Vec<String> = issues(&req).into_iter().map(|i| i.path).collect();
        assert!(paths.contains(&"contacts".to_string()));
        assert!(paths.contains(&"prompt".to_string()));
        assert!(paths.contains(&"identity.name".to_string()));
    }

    #[test]
    fn non_positive_and_duplicate_ids_are_rejected() {
        let mut req = valid();
        req.contacts.push(Contact { id: 1, ..Default::default() });
        req.contacts.push(Contact { id: -4, ..Default::default() });
        let issues = issues(&req);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("duplicate"));
        assert_eq!(issues[1].path, "contacts[2].id");
    }

    #[test]
    fn empty_model_id_is_rejected() {
        let mut req = valid();
        req.models = Some(vec!["a".into(), String::new()]);
        assert_eq!(issues(&req)[0].path, "models[1]");
    }
}
