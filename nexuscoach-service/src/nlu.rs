//! Intent classification and slot extraction.

mod extract;
mod intent;
pub mod text;

pub use extract::{ItemOwner, ItemProgress, MacroTopic, Slots};
pub use intent::Intent;
use intent::{RULES, Rule};

use serde::Serialize;
use tracing::debug;

use crate::knowledge::KnowledgeBase;

/// Outcome of classifying one utterance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentResult {
    pub intent: Intent,
    /// Priority of the winning rule, 0 when nothing matched
    pub priority: u8,
    /// Name of the winning rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'static str>,
    /// Every matched intent, winner first
    pub candidates: Vec<Intent>,
    pub slots: Slots,
}

/// Classify an utterance. Never fails: no match is [`Intent::Unknown`] with
/// empty slots.
pub fn classify(text: &str, locale: &str, kb: &KnowledgeBase) -> IntentResult {
    let normalized = text::normalize(text);
    let tokens = text::tokens(&normalized);
    if tokens.is_empty() {
        return IntentResult::default();
    }

    let slots = extract::extract_slots(&normalized, &tokens, kb);

    let mut matched: Vec<&Rule> = RULES
        .iter()
        .filter(|rule| rule.matches(&tokens, &slots))
        .collect();
    // Stable sort keeps table order among equal priorities
    matched.sort_by(|a, b| b.priority.cmp(&a.priority));

    let Some(winner) = matched.first() else {
        debug!(locale, "No intent rule matched");
        return IntentResult::default();
    };

    let mut candidates = Vec::with_capacity(matched.len());
    for rule in &matched {
        if !candidates.contains(&rule.intent) {
            candidates.push(rule.intent);
        }
    }

    debug!(
        intent = %winner.intent,
        rule = winner.name,
        candidates = matched.len(),
        locale,
        "Classified utterance"
    );

    IntentResult {
        intent: winner.intent,
        priority: winner.priority,
        rule: Some(winner.name),
        candidates,
        slots,
    }
}
