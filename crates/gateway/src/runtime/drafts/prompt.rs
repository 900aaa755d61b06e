//! Per-contact prompt construction.
//!
//! The user prompt only ever carries a fixed subset of sender and
//! recipient fields, serialized in a stable order.

use serde::Serialize;
use serde_json::Value;

use mm_domain::drafts::{Contact, Identity};

/// `bookingFor` value that means "no particular date".
const ANYTIME: &str = "Anytime";

/// Used when `drafting.system_prompts` is empty.
const FALLBACK_SYSTEM_PROMPT: &str = "Write a short, personal outreach email to \
{recipient_first_name} at {company}. Reply with JSON only: \
{\"subject\": string, \"message\": string}.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SenderProfile<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    band_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genre: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    area: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    website: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecipientProfile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    website: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl<'a> RecipientProfile<'a> {
    fn from_contact(contact: &'a Contact) -> Self {
        let metadata = match &contact.metadata {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(Value::String(pack_metadata(s))),
            Some(other) => Some(other.clone()),
        };
        Self {
            last_name: contact.last_name.as_deref(),
            first_name: contact.first_name.as_deref(),
            email: contact.email.as_deref(),
            company: contact.company.as_deref(),
            address: contact.address.as_deref(),
            city: contact.city.as_deref(),
            state: contact.state.as_deref(),
            country: contact.country.as_deref(),
            website: contact.website.as_deref(),
            phone: contact.phone.as_deref(),
            metadata,
        }
    }
}

fn to_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".into())
}

/// Build the user prompt for one contact.
pub fn build_user_prompt(
    contact: &Contact,
    identity: &Identity,
    goal: &str,
    booking_for: Option<&str>,
) -> String {
    let sender = SenderProfile {
        name: &identity.name,
        band_name: identity.band_name.as_deref(),
        genre: identity.genre.as_deref(),
        area: identity.area.as_deref(),
        bio: identity.bio.as_deref(),
        website: identity.website.as_deref(),
    };
    let recipient = RecipientProfile::from_contact(contact);

    let booking = booking_for
        .map(str::trim)
        .filter(|b| !b.is_empty() && *b != ANYTIME)
        .map(|b| format!("\n\nBooking For:\n{b}"))
        .unwrap_or_default();

    format!(
        "Sender information (user profile):\n{}\n\nRecipient information:\n{}{booking}\n\nUser Goal:\n{goal}",
        to_pretty(&sender),
        to_pretty(&recipient),
    )
}

/// Pick a system prompt template for this attempt and fill in the
/// recipient placeholders.
///
/// The choice steps through the templates the same way models rotate, so
/// it is reproducible per `(contact_index, retry)`.
pub fn build_system_prompt(
    templates: &[String],
    contact: &Contact,
    contact_index: usize,
    retry: u32,
) -> String {
    let template = if templates.is_empty() {
        FALLBACK_SYSTEM_PROMPT
    } else {
        templates[(contact_index + retry as usize) % templates.len()].as_str()
    };
    template
        .replace(
            "{recipient_first_name}",
            contact.first_name.as_deref().unwrap_or(""),
        )
        .replace("{company}", contact.company.as_deref().unwrap_or(""))
}

/// Compact scraped free-text metadata before it goes into a prompt.
///
/// Normalizes line endings, drops control characters, turns tabs into
/// spaces, squeezes runs of spaces, and removes consecutive duplicate
/// lines and paragraphs.
pub fn pack_metadata(metadata: &str) -> String {
    let normalized: String = metadata
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            '\n' => Some('\n'),
            c if c.is_ascii_control() => None,
            c => Some(c),
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for raw in normalized.split('\n') {
        let cleaned = squeeze_spaces(raw)
            .trim_end_matches([' ', '\u{A0}'])
            .to_string();
        if lines.last() == Some(&cleaned) {
            continue;
        }
        lines.push(cleaned);
    }
    let text = lines.join("\n");

    let mut paragraphs: Vec<&str> = Vec::new();
    for paragraph in split_paragraphs(&text) {
        if paragraphs.last() == Some(&paragraph) {
            continue;
        }
        paragraphs.push(paragraph);
    }
    paragraphs.join("\n\n").trim().to_string()
}

fn squeeze_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut prev_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

/// Split on runs of two or more newlines.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' && bytes.get(i + 1) == Some(&b'\n') {
            out.push(&text[start..i]);
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    out.push(&text[start..]);
    out
}
