//! Prompt building for text generation.

use crate::i18n::is_english;
use crate::nlu::Intent;
use crate::session::Session;

const COACH_PROMPT_TEMPLATE: &str = include_str!("../../prompts/coach.txt");

/// History turns included in the prompt
const PROMPT_HISTORY: usize = 4;

/// Remembered tips included in the prompt
pub(crate) const PROMPT_TIPS: usize = 3;

/// Everything the prompt is built from, besides the template wording
pub(crate) struct PromptInput<'a> {
    /// Session after this turn's state merge
    pub session: &'a Session,
    pub intent: Intent,
    pub tips: &'a [String],
    pub user_text: &'a str,
}

impl PromptInput<'_> {
    /// Render the coach prompt. `recommendation` is the template wording the
    /// model should rephrase.
    pub(crate) fn render(&self, recommendation: &str) -> String {
        let english = is_english(&self.session.locale);
        let state = &self.session.state;
        let unknown = if english { "unknown" } else { "desconhecido" };
        let none = if english { "none" } else { "nenhum" };

        let language_line = if english {
            "Reply in English (en-US)."
        } else {
            "Responda em português do Brasil (pt-BR)."
        };

        let or_unknown = |value: Option<String>| value.unwrap_or_else(|| unknown.to_string());
        let or_none = |values: Vec<String>| {
            if values.is_empty() {
                none.to_string()
            } else {
                values.join(", ")
            }
        };

        let score = match (state.kills, state.deaths, state.assists) {
            (None, None, None) => unknown.to_string(),
            (k, d, a) => format!(
                "{}/{}/{}",
                k.unwrap_or_default(),
                d.unwrap_or_default(),
                a.unwrap_or_default()
            ),
        };

        let mut own_items = state.items.clone();
        if let Some(building) = &state.building {
            own_items.push(format!("{building} (building)"));
        }

        let enemies: Vec<String> = state
            .enemies
            .iter()
            .map(|e| {
                let mut line = format!("{} ({})", e.champion, e.standing);
                if !e.items.is_empty() {
                    line.push_str(&format!(" items: {}", e.items.join(", ")));
                }
                line
            })
            .collect();

        let tips = self
            .tips
            .iter()
            .take(PROMPT_TIPS)
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>();

        let skip = self.session.history.len().saturating_sub(PROMPT_HISTORY);
        let history = self.session.history[skip..]
            .iter()
            .map(|h| format!("User: {}\nCoach: {}", h.text, h.reply))
            .collect::<Vec<_>>();

        fill(
            COACH_PROMPT_TEMPLATE,
            &[
                ("language_line", language_line.to_string()),
                ("champion", or_unknown(state.champion.clone())),
                ("lane", or_unknown(state.lane.map(|l| l.to_string()))),
                ("enemy", or_unknown(state.lane_opponent.clone())),
                ("phase", self.session.phase().to_string()),
                ("standing", or_unknown(state.standing.map(|s| s.to_string()))),
                ("gold", or_unknown(state.gold.map(|g| g.to_string()))),
                ("score", score),
                ("own_items", or_none(own_items)),
                ("enemies", or_none(enemies)),
                ("intent", self.intent.to_string()),
                ("last_reply", or_unknown(state.last_reply.clone())),
                ("recommendation", recommendation.to_string()),
                ("tips", or_none_lines(tips, none)),
                ("history", or_none_lines(history, none)),
                ("user_text", self.user_text.to_string()),
            ],
        )
    }
}

/// Substitute `{name}` placeholders in one pass over `template`.
///
/// Substituted values are copied verbatim and never scanned again. Unknown
/// placeholders are left as written.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn or_none_lines(lines: Vec<String>, none: &str) -> String {
    if lines.is_empty() {
        none.to_string()
    } else {
        lines.join("\n")
    }
}
