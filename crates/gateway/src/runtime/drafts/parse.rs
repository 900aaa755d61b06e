//! Reduce raw model output to a `{subject, message}` pair.
//!
//! Models are asked for JSON but routinely wrap it in code fences, leave
//! trailing commas, or answer in loose `Subject: ...` prose. Strict JSON
//! is tried first; regex field extraction is the fallback.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use mm_domain::drafts::Identity;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Prompt parsing failed")]
pub struct ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDraft {
    pub subject: String,
    pub message: String,
}

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("leading fence regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("trailing fence regex"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("json object regex"));
static SPACED_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[\u{2013}\u{2014}]\s+").expect("spaced dash regex"));

static SUBJECT_QUOTED: LazyLock<Regex> = LazyLock::new(|| quoted_field("subject"));
static SUBJECT_BARE: LazyLock<Regex> = LazyLock::new(|| bare_field("subject"));
static MESSAGE_QUOTED: LazyLock<Regex> = LazyLock::new(|| quoted_field("message"));
static MESSAGE_BARE: LazyLock<Regex> = LazyLock::new(|| bare_field("message"));

/// `field: "value"` or `field: 'value'`, lazily, across lines.
fn quoted_field(field: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is){field}["']?\s*:\s*(?:"(.*?)"|'(.*?)')"#
    ))
    .expect("quoted field regex")
}

/// `field: value` up to the next comma, brace or line break.
fn bare_field(field: &str) -> Regex {
    Regex::new(&format!(r#"(?i){field}["']?\s*:\s*([^,\n\r{{}}]+)"#)).expect("bare field regex")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a model reply into a cleaned draft for `identity`.
pub fn parse_draft_response(raw: &str, identity: &Identity) -> Result<ParsedDraft, ParseError> {
    let (subject, message) = match parse_json(raw) {
        Some(obj) => (
            obj.get("subject").and_then(Value::as_str).map(str::to_string),
            obj.get("message").and_then(Value::as_str).map(str::to_string),
        ),
        None => {
            let normalized = normalize_typography(raw);
            let subject = extract_field(&normalized, &SUBJECT_QUOTED, &SUBJECT_BARE);
            let message = extract_field(&normalized, &MESSAGE_QUOTED, &MESSAGE_BARE)
                .unwrap_or_else(|| raw.to_string());
            (subject, Some(message))
        }
    };

    let (Some(subject), Some(message)) = (subject, message) else {
        return Err(ParseError);
    };
    if subject.is_empty() || message.is_empty() {
        return Err(ParseError);
    }

    let subject = remove_em_dashes(&subject).trim().to_string();
    let message = strip_signature(&remove_em_dashes(&message), identity);
    if subject.is_empty() || message.is_empty() {
        return Err(ParseError);
    }
    Ok(ParsedDraft { subject, message })
}

/// Strict JSON after fence and trailing-comma cleanup. `None` when the text
/// does not parse at all; a parsed non-object yields an empty object.
fn parse_json(raw: &str) -> Option<serde_json::Map<String, Value>> {
    let cleaned = LEADING_FENCE.replace(raw, "");
    let cleaned = TRAILING_FENCE.replace(&cleaned, "");
    let cleaned = TRAILING_COMMA.replace_all(&cleaned, "$1");
    let candidate = JSON_OBJECT
        .find(&cleaned)
        .map(|m| m.as_str())
        .unwrap_or(&cleaned);

    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(obj) => Some(obj),
        _ => Some(serde_json::Map::new()),
    }
}

fn extract_field(text: &str, quoted: &Regex, bare: &Regex) -> Option<String> {
    if let Some(caps) = quoted.captures(text) {
        let value = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            return Some(decode_escapes(v));
        }
    }
    bare.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_escapes(m.as_str()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Text cleanup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Curly quotes to straight, the whole dash family to `-`.
fn normalize_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{2010}'..='\u{2015}' => '-',
            other => other,
        })
        .collect()
}

/// Undo the JSON escapes models leave in loosely quoted values.
fn decode_escapes(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\r", "")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
        .trim()
        .to_string()
}

/// ` — ` reads as a pause, so it becomes `, `; any other em/en dash is `-`.
pub fn remove_em_dashes(text: &str) -> String {
    SPACED_DASH
        .replace_all(text, ", ")
        .replace(['\u{2013}', '\u{2014}'], "-")
}

const SIGN_OFFS: &[&str] = &[
    "best",
    "best regards",
    "best wishes",
    "all the best",
    "kind regards",
    "warm regards",
    "regards",
    "warmly",
    "warm wishes",
    "cheers",
    "thanks",
    "thank you",
    "many thanks",
    "thanks again",
    "sincerely",
    "yours",
    "talk soon",
];

/// Joiners allowed between a sender's name and band on one signature line.
const NAME_JOINERS: &[&str] = &["", "|", "-", "/", "&", "and", "of", "from", "with", "x"];

/// Remove a trailing sign-off the model added despite being told not to.
///
/// From the end: lines naming the sender or band, then one closing phrase.
pub fn strip_signature(message: &str, identity: &Identity) -> String {
    let names: Vec<String> = [Some(identity.name.as_str()), identity.band_name.as_deref()]
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();

    let mut lines: Vec<&str> = message.lines().collect();
    trim_blank_tail(&mut lines);

    let mut stripped = false;
    while let Some(last) = lines.last() {
        if !is_name_line(last, &names) {
            break;
        }
        lines.pop();
        stripped = true;
        trim_blank_tail(&mut lines);
    }
    if let Some(last) = lines.last() {
        if is_sign_off(last) {
            lines.pop();
            stripped = true;
        }
    }

    if !stripped {
        return message.trim().to_string();
    }
    lines.join("\n").trim().to_string()
}

fn trim_blank_tail(lines: &mut Vec<&str>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
}

fn is_sign_off(line: &str) -> bool {
    let normalized = line
        .trim()
        .trim_end_matches([',', '!', '.'])
        .trim()
        .to_lowercase();
    SIGN_OFFS.contains(&normalized.as_str())
}

fn is_name_line(line: &str, names: &[String]) -> bool {
    let lower = line.trim().trim_start_matches(['-', '~']).trim().to_lowercase();
    if lower.is_empty() || !names.iter().any(|n| lower.contains(n.as_str())) {
        return false;
    }
    let mut rest = lower;
    for name in names {
        rest = rest.replace(name.as_str(), " ");
    }
    rest.split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | '.' | '(' | ')')))
        .all(|w| NAME_JOINERS.contains(&w))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn jo() -> Identity {
        Identity {
            name: "Jo Park".into(),
            band_name: Some("The Low Tides".into()),
            ..Default::default()
        }
    }

    fn parse(raw: &str) -> Result<ParsedDraft, ParseError> {
        parse_draft_response(raw, &jo())
    }

    #[test]
    fn plain_json_is_taken_verbatim() {
        let draft = parse(r#"{"subject":"Hi there","message":"Line1\nLine2"}"#).unwrap();
        assert_eq!(draft.subject, "Hi there");
        assert_eq!(draft.message, "Line1\nLine2");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"subject\":\"Hi there\",\"message\":\"Line1\\nLine2\"}\n```";
        let draft = parse(raw).unwrap();
        assert_eq!(draft.subject, "Hi there");
        assert_eq!(draft.message, "Line1\nLine2");
    }

    #[test]
    fn trailing_commas_and_chatter_are_tolerated() {
        let raw = "Sure! Here you go:\n{\"subject\": \"Friday?\", \"message\": \"Hello\",}\nHope it helps.";
        let draft = parse(raw).unwrap();
        assert_eq!(draft.subject, "Friday?");
        assert_eq!(draft.message, "Hello");
    }

    #[test]
    fn loose_prose_uses_bare_fields() {
        let draft = parse("Subject: Quick question\nMessage: Let's talk soon").unwrap();
        assert_eq!(draft.subject, "Quick question");
        assert_eq!(draft.message, "Let's talk soon");
    }

    #[test]
    fn curly_quoted_fields_are_extracted() {
        let raw = "subject: \u{201C}Booking in May\u{201D}\nmessage: \u{201C}Hi Ana,\\n\\nWe would love to play.\u{201D}";
        let draft = parse(raw).unwrap();
        assert_eq!(draft.subject, "Booking in May");
        assert_eq!(draft.message, "Hi Ana,\n\nWe would love to play.");
    }

    #[test]
    fn missing_message_falls_back_to_whole_text() {
        let raw = "Subject: Hello\n\nWe play folk.";
        let draft = parse(raw).unwrap();
        assert_eq!(draft.subject, "Hello");
        assert_eq!(draft.message, raw);
    }

    #[test]
    fn no_fields_at_all_fails() {
        assert_eq!(parse("I cannot help with that."), Err(ParseError));
        assert_eq!(ParseError.to_string(), "Prompt parsing failed");
    }

    #[test]
    fn json_without_subject_fails_without_regex_fallback() {
        assert_eq!(parse(r#"{"message":"subject: sneaky"}"#), Err(ParseError));
        assert_eq!(parse(r#"{"subject":"","message":"x"}"#), Err(ParseError));
        assert_eq!(parse(r#"{"subject":3,"message":"x"}"#), Err(ParseError));
    }

    #[test]
    fn em_dashes_are_removed() {
        let raw = r#"{"subject":"Gig — May","message":"We are loud–ish — and fun"}"#;
        let draft = parse(raw).unwrap();
        assert_eq!(draft.subject, "Gig, May");
        assert_eq!(draft.message, "We are loud-ish, and fun");
    }

    #[test]
    fn signature_block_is_stripped() {
        let message = "Hi Ana,\n\nWould a Friday work?\n\nBest,\nJo Park\nThe Low Tides\n";
        assert_eq!(strip_signature(message, &jo()), "Hi Ana,\n\nWould a Friday work?");
    }

    #[test]
    fn combined_name_line_is_stripped() {
        let message = "Hello!\n\nThanks,\nJo Park | The Low Tides";
        assert_eq!(strip_signature(message, &jo()), "Hello!");
    }

    #[test]
    fn body_mentioning_the_band_is_kept() {
        let message = "Hi,\n\nThe Low Tides would love to open for you in June.";
        assert_eq!(strip_signature(message, &jo()), message);
    }

    #[test]
    fn signature_only_message_fails() {
        let raw = r#"{"subject":"Hi","message":"Best,\nJo Park"}"#;
        assert_eq!(parse(raw), Err(ParseError));
    }

    #[test]
    fn escapes_are_decoded_in_bare_values() {
        assert_eq!(decode_escapes(r#"a\tb \"c\" d\\e\r"#), "a\tb \"c\" d\\e");
    }
}
