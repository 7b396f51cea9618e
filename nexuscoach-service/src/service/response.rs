//! Reply wording: generated text when a provider is available, Fluent
//! templates otherwise.

use serde::Serialize;
use strum::Display;
use tracing::{debug, warn};

use super::CoachService;
use super::prompts::PromptInput;
use crate::error::ProviderError;
use crate::i18n::I18n;
use crate::knowledge::DamageType;
use crate::nlu::ItemProgress;
use crate::strategy::{
    Acknowledgement, BuildAdvice, BuildReason, Clarification, Composition, MacroAdvice,
    MatchupAdvice, Recommendation, StateChange, StatusReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl CoachService {
    /// Word a recommendation. Provider failures only cost this turn its
    /// generated wording.
    pub(crate) async fn respond(
        &self,
        recommendation: &Recommendation,
        input: PromptInput<'_>,
    ) -> Reply {
        let fallback = render_fallback(recommendation, &self.i18n, &input.session.locale);
        let fallback_reply = Reply {
            text: fallback.clone(),
            source: ReplySource::Fallback,
        };

        let Some(generator) = &self.generator else {
            return fallback_reply;
        };

        let prompt = input.render(&fallback);
        debug!(
            provider = generator.name(),
            prompt_len = prompt.len(),
            "Generating reply"
        );

        let outcome = tokio::time::timeout(self.llm_timeout, generator.generate(&prompt)).await;
        let error = match outcome {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return Reply {
                    text: text.trim().to_string(),
                    source: ReplySource::Generated,
                };
            }
            Ok(Ok(_)) => ProviderError::EmptyOutput {
                provider: generator.name(),
            }
            .into(),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout {
                provider: generator.name(),
                secs: self.llm_timeout.as_secs(),
            }
            .into(),
        };

        warn!(provider = generator.name(), error = %error, "Text generation failed, using template");
        metrics::counter!("nexuscoach_provider_failures_total", "provider" => generator.name())
            .increment(1);
        fallback_reply
    }
}

/// Template wording for a recommendation in `locale`
pub fn render_fallback(recommendation: &Recommendation, i18n: &I18n, locale: &str) -> String {
    let words = Words { i18n, locale };
    let parts = match recommendation {
        Recommendation::Build(advice) => words.build(advice),
        Recommendation::Matchup(advice) => words.matchup(advice),
        Recommendation::Macro(advice) => words.macro_play(advice),
        Recommendation::Status(report) => words.status(report),
        Recommendation::Acknowledge(ack) => words.acknowledge(ack),
        Recommendation::Clarify(clarification) => words.clarify(clarification),
    };
    parts.join(" ")
}

struct Words<'a> {
    i18n: &'a I18n,
    locale: &'a str,
}

impl Words<'_> {
    fn get(&self, key: &str) -> String {
        self.i18n.get(self.locale, key, None)
    }

    fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.i18n.format(self.locale, key, args)
    }

    /// "A, B and C"
    fn list(&self, names: &[String]) -> String {
        match names {
            [] => String::new(),
            [only] => only.clone(),
            [rest @ .., last] => self.format("list-and", &[("first", &rest.join(", ")), ("last", last)]),
        }
    }

    fn build(&self, advice: &BuildAdvice) -> Vec<String> {
        let cost = advice.cost.to_string();
        let mut parts = Vec::new();

        if advice.save_up {
            let gold = advice.gold.unwrap_or_default().to_string();
            parts.push(self.format("build-save-up", &[("gold", &gold), ("item", &advice.item)]));
        } else if advice.reason == BuildReason::Core {
            parts.push(self.format("build-core", &[("item", &advice.item), ("cost", &cost)]));
        } else if advice.targets.is_empty() {
            parts.push(self.format("build-next", &[("item", &advice.item), ("cost", &cost)]));
        } else {
            let targets = self.list(&advice.targets);
            parts.push(self.format(
                "build-next-against",
                &[("item", &advice.item), ("cost", &cost), ("targets", &targets)],
            ));
        }

        match &advice.reason {
            BuildReason::Need(defense) => {
                let key = format!("build-reason-{}", defense.to_string().replace('_', "-"));
                parts.push(self.get(&key));
            }
            BuildReason::Counters(archetype) => {
                let archetype = self.get(&format!("archetype-{archetype}"));
                parts.push(self.format("build-reason-counters", &[("archetype", &archetype)]));
            }
            BuildReason::Core => {}
        }

        if !advice.alternatives.is_empty() {
            let items = self.list(&advice.alternatives);
            parts.push(self.format("build-alternatives", &[("items", &items)]));
        }
        parts
    }

    fn matchup(&self, advice: &MatchupAdvice) -> Vec<String> {
        let mut parts = Vec::new();

        match &advice.tips {
            Some(tips) => parts.push(self.format(
                "matchup-specific",
                &[("enemy", &advice.enemy), ("tip", tips.for_locale(self.locale))],
            )),
            None => {
                let role = advice
                    .enemy_role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let generic = self.get(&format!("matchup-role-{role}"));
                parts.push(self.format(
                    "matchup-generic",
                    &[("enemy", &advice.enemy), ("advice", &generic)],
                ));
            }
        }

        if let Some(favored) = &advice.favored {
            parts.push(self.format("matchup-favored", &[("champion", favored)]));
        }
        if let (Some(own), Some(winrate)) = (&advice.own, advice.winrate) {
            let winrate = format!("{winrate:.1}");
            parts.push(self.format(
                "matchup-winrate",
                &[("champion", own), ("winrate", &winrate)],
            ));
        }
        parts
    }

    fn macro_play(&self, advice: &MacroAdvice) -> Vec<String> {
        let mut parts = vec![self.get(&format!("macro-{}", advice.call))];
        if !advice.threats.is_empty() {
            let threats = self.list(&advice.threats);
            parts.push(self.format("macro-threats", &[("threats", &threats)]));
        }
        parts
    }

    fn status(&self, report: &StatusReport) -> Vec<String> {
        let mut parts = vec![match report.standing {
            Some(standing) => self.get(&format!("status-{standing}")),
            None => self.get("status-unknown"),
        }];

        if report.kills.is_some() || report.deaths.is_some() {
            let kills = report.kills.unwrap_or_default().to_string();
            let deaths = report.deaths.unwrap_or_default().to_string();
            parts.push(self.format("status-score", &[("kills", &kills), ("deaths", &deaths)]));
        }
        if !report.threats.is_empty() {
            let threats = self.list(&report.threats);
            parts.push(self.format("status-threats", &[("threats", &threats)]));
        }
        parts
    }

    fn acknowledge(&self, ack: &Acknowledgement) -> Vec<String> {
        let mut parts: Vec<String> = ack
            .changes
            .iter()
            .map(|change| self.change(change))
            .collect();
        if parts.is_empty() {
            parts.push(self.get("ack-generic"));
        }
        if let Some(composition) = &ack.composition {
            parts.extend(self.composition(composition));
        }
        parts
    }

    fn change(&self, change: &StateChange) -> String {
        match change {
            StateChange::Gold { gold } => self.format("ack-gold", &[("gold", &gold.to_string())]),
            StateChange::Score { kills, deaths, .. } => {
                let kills = kills.unwrap_or_default().to_string();
                let deaths = deaths.unwrap_or_default().to_string();
                self.format("ack-score", &[("kills", &kills), ("deaths", &deaths)])
            }
            StateChange::Standing { standing } => {
                let standing = self.get(&format!("standing-{standing}"));
                self.format("ack-standing", &[("standing", &standing)])
            }
            StateChange::Phase { phase } => {
                let phase = self.get(&format!("phase-{phase}"));
                self.format("ack-phase", &[("phase", &phase)])
            }
            StateChange::Champion { champion } => {
                self.format("ack-champion", &[("champion", champion)])
            }
            StateChange::Lane { lane } => {
                let lane = self.get(&format!("lane-{lane}"));
                self.format("ack-lane", &[("lane", &lane)])
            }
            StateChange::Enemy {
                champion,
                standing: Some(standing),
                ..
            } => {
                let standing = self.get(&format!("standing-{standing}"));
                self.format(
                    "ack-enemy-standing",
                    &[("champion", champion), ("standing", &standing)],
                )
            }
            StateChange::Enemy { champion, .. } => {
                self.format("ack-enemy", &[("champion", champion)])
            }
            StateChange::EnemyItem {
                champion,
                item,
                progress,
            } => {
                let key = match progress {
                    ItemProgress::Has => "ack-enemy-item",
                    ItemProgress::Building => "ack-enemy-building",
                };
                self.format(key, &[("champion", champion), ("item", item)])
            }
            StateChange::OwnItem { item, progress } => {
                let key = match progress {
                    ItemProgress::Has => "ack-self-item",
                    ItemProgress::Building => "ack-self-building",
                };
                self.format(key, &[("item", item)])
            }
        }
    }

    fn composition(&self, composition: &Composition) -> Vec<String> {
        let mut parts = Vec::new();
        match composition.dominant {
            Some(DamageType::Physical) => parts.push(self.get("composition-physical")),
            Some(DamageType::Magic) => parts.push(self.get("composition-magic")),
            Some(DamageType::Mixed) => parts.push(self.get("composition-mixed")),
            None => {}
        }
        if composition.has_healer() {
            let healers = self.list(&composition.healers);
            parts.push(self.format("composition-healer", &[("healers", &healers)]));
        }
        if composition.has_tank() {
            let tanks = self.list(&composition.tanks);
            parts.push(self.format("composition-tank", &[("tanks", &tanks)]));
        }
        if composition.has_assassin() {
            let assassins = self.list(&composition.assassins);
            parts.push(self.format("composition-assassin", &[("assassins", &assassins)]));
        }
        if !composition.threats.is_empty() {
            let threats = self.list(&composition.threats);
            parts.push(self.format("composition-threats", &[("threats", &threats)]));
        }
        parts
    }

    fn clarify(&self, clarification: &Clarification) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(last) = &clarification.last_reply {
            parts.push(self.format("clarify-continue", &[("last_reply", last)]));
        }
        if let Some(tip) = &clarification.remembered {
            parts.push(self.format("clarify-remembered", &[("tip", tip)]));
        }
        if clarification.missing_context {
            parts.push(self.get("clarify-need-context"));
        }
        if parts.is_empty() {
            parts.push(self.get("clarify-generic"));
        }
        parts
    }
}
