//! Model rotation and per-model call timeouts.

use std::time::Duration;

use mm_domain::config::DraftingConfig;

/// Pick the model for one attempt: `models[(contact_index + retry) % len]`.
///
/// Each retry of the same contact moves one step along the list, so a
/// failing model is not hit twice in a row when more than one is allowed.
/// `models` must not be empty.
pub fn select_model(models: &[String], contact_index: usize, retry: u32) -> &str {
    let slot = (contact_index + retry as usize) % models.len();
    &models[slot]
}

/// The ordered, allow-listed models one operation rotates through.
///
/// Never empty: construction falls back to the default model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRotation {
    models: Vec<String>,
}

impl ModelRotation {
    /// Filter the caller's list through the allow-list.
    ///
    /// - nothing requested: the whole allow-list, in config order
    /// - otherwise: requested order, first occurrence wins, unknown ids dropped
    /// - nothing survived: just `default_model`
    pub fn new(requested: Option<&[String]>, allow_list: &[String], default_model: &str) -> Self {
        let models: Vec<String> = match requested {
            None | Some([]) => allow_list.to_vec(),
            Some(requested) => {
                let mut kept: Vec<String> = Vec::with_capacity(requested.len());
                for model in requested {
                    if allow_list.contains(model) && !kept.contains(model) {
                        kept.push(model.clone());
                    }
                }
                kept
            }
        };

        if models.is_empty() {
            return Self {
                models: vec![default_model.to_string()],
            };
        }
        Self { models }
    }

    pub fn from_config(requested: Option<&[String]>, cfg: &DraftingConfig) -> Self {
        Self::new(requested, &cfg.allowed_models, cfg.default_model())
    }

    pub fn select(&self, contact_index: usize, retry: u32) -> &str {
        select_model(&self.models, contact_index, retry)
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timeouts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call timeout chosen from the model id.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub fast: Duration,
    pub slow: Duration,
    pub slow_markers: Vec<String>,
}

impl TimeoutPolicy {
    pub fn from_config(cfg: &DraftingConfig) -> Self {
        Self {
            fast: cfg.fast_timeout(),
            slow: cfg.slow_timeout(),
            slow_markers: cfg.slow_model_markers.clone(),
        }
    }

    /// Substring match; `gpt` also catches `openai/gpt-4o-mini` and so on.
    pub fn is_slow(&self, model: &str) -> bool {
        self.slow_markers
            .iter()
            .any(|marker| !marker.is_empty() && model.contains(marker.as_str()))
    }

    pub fn for_model(&self, model: &str) -> Duration {
        if self.is_slow(model) {
            self.slow
        } else {
            self.fast
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn selection_wraps_around() {
        let models = list(&["a", "b", "c"]);
        assert_eq!(select_model(&models, 2, 1), "a");
        assert_eq!(select_model(&models, 0, 2), "c");
        assert_eq!(select_model(&models, 4, 0), "b");
        for i in 0..5 {
            for r in 0..6 {
                assert_eq!(select_model(&models, i, r), models[(i + r as usize) % 3]);
            }
        }
    }

    #[test]
    fn single_model_is_always_chosen() {
        let models = list(&["only"]);
        assert_eq!(select_model(&models, 17, 5), "only");
    }

    #[test]
    fn omitted_request_uses_whole_allow_list() {
        let allow = list(&["a", "b"]);
        assert_eq!(ModelRotation::new(None, &allow, "a").models(), &allow[..]);
        assert_eq!(ModelRotation::new(Some(&[]), &allow, "a").models(), &allow[..]);
    }

    #[test]
    fn unknown_models_are_dropped_and_duplicates_collapsed() {
        let allow = list(&["a", "b", "c"]);
        let requested = list(&["c", "zzz", "a", "c"]);
        let rotation = ModelRotation::new(Some(&requested), &allow, "a");
        assert_eq!(rotation.models(), &list(&["c", "a"])[..]);
    }

    #[test]
    fn nothing_allowed_falls_back_to_default() {
        let allow = list(&["a", "b"]);
        let requested = list(&["evil/model"]);
        let rotation = ModelRotation::new(Some(&requested), &allow, "a");
        assert_eq!(rotation.models(), &list(&["a"])[..]);
    }

    #[test]
    fn empty_allow_list_still_yields_a_model() {
        let rotation = ModelRotation::new(None, &[], "fallback");
        assert_eq!(rotation.select(3, 2), "fallback");
    }

    #[test]
    fn slow_markers_pick_the_long_timeout() {
        let policy = TimeoutPolicy::from_config(&DraftingConfig::default());
        assert_eq!(policy.for_model("openai/gpt-4o-mini"), Duration::from_millis(110_000));
        assert_eq!(policy.for_model("meta-llama/llama-3.3-70b-instruct"), Duration::from_millis(110_000));
        assert_eq!(policy.for_model("google/gemini-2.5-flash"), Duration::from_millis(110_000));
        assert_eq!(policy.for_model("x-ai/grok-4-fast"), Duration::from_millis(45_000));
        assert_eq!(
            policy.for_model("mistralai/mistral-small-3.2-24b-instruct"),
            Duration::from_millis(45_000)
        );
    }
}
