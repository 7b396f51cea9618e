//! The turn pipeline: classify, merge, decide, word, record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CoachService;
use super::prompts::{PROMPT_TIPS, PromptInput};
use super::response::ReplySource;
use crate::db::AdviceQuery;
use crate::error::{ServiceError, ServiceResult};
use crate::nlu::{Intent, classify};
use crate::session::{GamePhase, GameState, HistoryEntry, Session, Standing};
use crate::strategy::{apply_hint, apply_slots, recommend};
use crate::stt::AudioClip;

/// State the client already knows, sent along with a turn
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientStateHint {
    #[serde(default)]
    pub gold: Option<u32>,
    #[serde(default)]
    pub kills: Option<u32>,
    #[serde(default)]
    pub deaths: Option<u32>,
    #[serde(default)]
    pub standing: Option<Standing>,
    #[serde(default)]
    pub phase: Option<GamePhase>,
}

impl ClientStateHint {
    fn apply(&self, state: &mut GameState) {
        apply_hint(
            state,
            self.gold,
            self.kills,
            self.deaths,
            self.standing,
            self.phase,
        );
    }
}

/// Text-to-speech settings suggested to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsHint {
    pub rate: f32,
    pub voice: String,
}

impl TtsHint {
    fn for_locale(locale: &str) -> Self {
        Self {
            rate: 1.0,
            voice: locale.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply_text: String,
    pub intent: Intent,
    pub reply_source: ReplySource,
    pub updated_state: GameState,
    pub suggested_tts: TtsHint,
    /// What the player said, for audio turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl CoachService {
    /// Process one text utterance
    pub async fn process_turn(
        &self,
        session_id: &str,
        text: &str,
        hint: Option<ClientStateHint>,
    ) -> ServiceResult<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyUtterance);
        }

        let session = self.sessions.get(session_id, Utc::now())?;
        let kb = self.knowledge.snapshot();
        let result = classify(text, &session.locale, &kb);

        // Decide on a copy; the store gets the same merge applied below
        let mut working = session;
        if let Some(hint) = &hint {
            hint.apply(&mut working.state);
        }
        let tips = self.remembered_advice(&working, result.intent);
        let recommendation =
            recommend(&mut working.state, &result, &kb, working.turn_count, &tips);

        let reply = self
            .respond(
                &recommendation,
                PromptInput {
                    session: &working,
                    intent: result.intent,
                    tips: &tips,
                    user_text: text,
                },
            )
            .await;

        let now = Utc::now();
        let mut recorded = None;
        let updated = self.sessions.update(session_id, now, &mut |s| {
            if let Some(hint) = &hint {
                hint.apply(&mut s.state);
            }
            apply_slots(&mut s.state, &result.slots);
            s.state.last_intent = Some(result.intent);
            s.state.last_reply = Some(reply.text.clone());

            let entry = HistoryEntry {
                text: text.to_string(),
                reply: reply.text.clone(),
                intent: result.intent,
                context: s.turn_context(),
                timestamp: now,
            };
            s.history.push(entry.clone());
            s.turn_count += 1;
            recorded = Some(entry);
        })?;

        if self.persist_logs
            && let Some(entry) = &recorded
            && let Err(e) = self
                .db
                .insert_turn_log(session_id, entry, &reply.source.to_string())
        {
            warn!(session_id, error = %e, "Failed to write turn log");
        }

        metrics::counter!("nexuscoach_turns_total", "intent" => result.intent.to_string())
            .increment(1);
        metrics::counter!("nexuscoach_replies_total", "source" => reply.source.to_string())
            .increment(1);
        info!(
            session_id,
            intent = %result.intent,
            kind = recommendation.kind(),
            source = %reply.source,
            turn = updated.turn_count,
            "Turn processed"
        );

        Ok(TurnOutcome {
            reply_text: reply.text,
            intent: result.intent,
            reply_source: reply.source,
            suggested_tts: TtsHint::for_locale(&updated.locale),
            updated_state: updated.state,
            transcript: None,
        })
    }

    /// Transcribe an audio clip, then run the text turn.
    ///
    /// When speech cannot be turned into text the player is asked to repeat
    /// and the session is left as it was.
    pub async fn process_audio_turn(
        &self,
        session_id: &str,
        clip: AudioClip,
        locale: Option<&str>,
    ) -> ServiceResult<TurnOutcome> {
        if clip.data.is_empty() {
            return Err(ServiceError::EmptyUtterance);
        }

        let session = self.sessions.get(session_id, Utc::now())?;
        let locale = locale
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&session.locale)
            .to_string();

        let Some(transcriber) = &self.transcriber else {
            debug!(session_id, "No transcriber configured");
            return Ok(self.unheard(&session, &locale));
        };

        debug!(
            session_id,
            bytes = clip.data.len(),
            provider = transcriber.name(),
            "Transcribing audio"
        );
        match transcriber.transcribe(clip, &locale).await {
            Ok(text) if !text.trim().is_empty() => {
                let mut outcome = self.process_turn(session_id, &text, None).await?;
                outcome.transcript = Some(text);
                Ok(outcome)
            }
            Ok(_) => {
                debug!(session_id, "Empty transcript");
                Ok(self.unheard(&session, &locale))
            }
            Err(e) => {
                warn!(session_id, provider = transcriber.name(), error = %e, "Transcription failed");
                metrics::counter!("nexuscoach_provider_failures_total", "provider" => transcriber.name())
                    .increment(1);
                Ok(self.unheard(&session, &locale))
            }
        }
    }

    fn unheard(&self, session: &Session, locale: &str) -> TurnOutcome {
        TurnOutcome {
            reply_text: self.i18n.get(locale, "stt-failed", None),
            intent: Intent::Unknown,
            reply_source: ReplySource::Fallback,
            updated_state: session.state.clone(),
            suggested_tts: TtsHint::for_locale(locale),
            transcript: None,
        }
    }

    /// Best rated advice from earlier sessions in a similar context
    fn remembered_advice(&self, session: &Session, intent: Intent) -> Vec<String> {
        let query = AdviceQuery::from_context(&session.turn_context(), intent);
        match self.db.retrieve_advice(&query, PROMPT_TIPS as u32) {
            Ok(tips) => tips,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Advice retrieval failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::db::{Feedback, Rating};
    use crate::error::ProviderError;
    use crate::llm::TextGenerator;
    use crate::service::tests::{service_with, start};
    use crate::stt::Transcriber;

    struct FixedGenerator {
        reply: &'static str,
        prompt: Mutex<Option<String>>,
    }

    impl FixedGenerator {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn generate(&self, prompt: &str) -> ServiceResult<String> {
            *self.prompt.lock().unwrap() = Some(prompt.to_string());
            Ok(self.reply.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate(&self, _prompt: &str) -> ServiceResult<String> {
            Err(ProviderError::Request {
                status: 503,
                message: "overloaded".to_string(),
            }
            .into())
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> ServiceResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    struct FixedTranscriber(Result<&'static str, ()>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn transcribe(&self, _clip: AudioClip, _locale: &str) -> ServiceResult<String> {
            self.0.map(str::to_string).map_err(|_| {
                ProviderError::EmptyOutput { provider: "fixed" }.into()
            })
        }
    }

    fn clip(data: &'static [u8]) -> AudioClip {
        AudioClip {
            data: Bytes::from_static(data),
            file_name: "turn.webm".to_string(),
            content_type: Some("audio/webm".to_string()),
        }
    }

    #[tokio::test]
    async fn test_build_turn_records_gold_and_logs() {
        let service = service_with(None, None);
        let id = start(&service, "pt-BR").session_id;

        let outcome = service
            .process_turn(&id, "to com 1200 de ouro, qual item compro?", None)
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::AskBuild);
        assert_eq!(outcome.reply_source, ReplySource::Fallback);
        assert_eq!(outcome.updated_state.gold, Some(1200));
        assert_eq!(outcome.updated_state.last_intent, Some(Intent::AskBuild));
        assert_eq!(outcome.suggested_tts.voice, "pt-BR");
        assert!(!outcome.reply_text.is_empty());

        let turns = service.db.session_turns(&id, 10).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].reply_source, "fallback");
        assert_eq!(turns[0].context.gold, Some(1200));
    }

    #[tokio::test]
    async fn test_enemy_status_is_remembered() {
        let service = service_with(None, None);
        let id = start(&service, "pt-BR").session_id;

        let outcome = service.process_turn(&id, "yasuo ta fed", None).await.unwrap();
        assert_eq!(outcome.intent, Intent::UpdateEnemyStatus);

        let session = service.sessions.get(&id, Utc::now()).unwrap();
        assert_eq!(session.state.enemy("Yasuo").unwrap().standing, Standing::Ahead);
        assert_eq!(session.turn_count, 1);
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_gold_update_is_idempotent() {
        let service = service_with(None, None);
        let id = start(&service, "pt-BR").session_id;

        let first = service.process_turn(&id, "1500 de ouro", None).await.unwrap();
        let second = service.process_turn(&id, "1500 de ouro", None).await.unwrap();
        assert_eq!(first.updated_state.gold, Some(1500));
        assert_eq!(second.updated_state.gold, Some(1500));
    }

    #[tokio::test]
    async fn test_history_is_a_sliding_window() {
        let service = service_with(None, None);
        let id = start(&service, "en").session_id;

        for i in 0..25 {
            service
                .process_turn(&id, &format!("{} gold", 100 + i), None)
                .await
                .unwrap();
        }

        let session = service.sessions.get(&id, Utc::now()).unwrap();
        assert_eq!(session.history.len(), 20);
        assert_eq!(session.history[0].text, "105 gold");
        assert_eq!(session.turn_count, 25);
    }

    #[tokio::test]
    async fn test_client_hint_is_merged() {
        let service = service_with(None, None);
        let id = start(&service, "en").session_id;

        let hint = ClientStateHint {
            gold: Some(900),
            standing: Some(Standing::Behind),
            ..Default::default()
        };
        let outcome = service.process_turn(&id, "hmm", Some(hint)).await.unwrap();
        assert_eq!(outcome.intent, Intent::Unknown);
        assert_eq!(outcome.updated_state.gold, Some(900));
        assert_eq!(outcome.updated_state.standing, Some(Standing::Behind));
    }

    #[tokio::test]
    async fn test_rejects_empty_text_and_unknown_session() {
        let service = service_with(None, None);
        let id = start(&service, "en").session_id;

        let err = service.process_turn(&id, "   ", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyUtterance));

        let err = service.process_turn("missing", "hi", None).await.unwrap_err();
        assert!(err.is_session_gone());
    }

    #[tokio::test]
    async fn test_generated_reply_is_used() {
        let generator = FixedGenerator::new("Buy Thornmail.");
        let service = service_with(Some(generator.clone()), None);
        let id = start(&service, "en").session_id;

        let outcome = service
            .process_turn(&id, "what should I buy with 1200 gold?", None)
            .await
            .unwrap();
        assert_eq!(outcome.reply_text, "Buy Thornmail.");
        assert_eq!(outcome.reply_source, ReplySource::Generated);

        let prompt = generator.prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("what should I buy with 1200 gold?"));
        assert!(prompt.contains("- Gold: 1200"));
    }

    #[tokio::test]
    async fn test_failing_or_slow_generator_falls_back() {
        let generators: [Arc<dyn TextGenerator>; 3] = [
            Arc::new(FailingGenerator),
            Arc::new(SlowGenerator),
            FixedGenerator::new("   "),
        ];
        for generator in generators {
            let service = service_with(Some(generator), None);
            let id = start(&service, "en").session_id;

            let outcome = service.process_turn(&id, "yasuo ta fed", None).await.unwrap();
            assert_eq!(outcome.reply_source, ReplySource::Fallback);
            assert_eq!(outcome.intent, Intent::UpdateEnemyStatus);
            assert!(outcome.reply_text.contains("Yasuo"));
        }
    }

    #[tokio::test]
    async fn test_rated_advice_is_remembered_in_new_sessions() {
        let generator = FixedGenerator::new("Trade short and back off.");
        let service = service_with(Some(generator.clone()), None);

        let first = start(&service, "en").session_id;
        service
            .process_turn(&first, "how do I play against darius?", None)
            .await
            .unwrap();
        service
            .end_session(
                &first,
                Some(Feedback {
                    rating: Rating::Good,
                    comment: None,
                }),
            )
            .unwrap();

        let second = start(&service, "en").session_id;
        service.process_turn(&second, "hmm", None).await.unwrap();

        let prompt = generator.prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("- Trade short and back off."));
    }

    #[tokio::test]
    async fn test_audio_turn_runs_text_path() {
        let transcriber = Arc::new(FixedTranscriber(Ok("qual item compro com 1200 de ouro?")));
        let service = service_with(None, Some(transcriber));
        let id = start(&service, "pt-BR").session_id;

        let outcome = service
            .process_audio_turn(&id, clip(b"audio"), None)
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::AskBuild);
        assert_eq!(
            outcome.transcript.as_deref(),
            Some("qual item compro com 1200 de ouro?")
        );
        assert_eq!(outcome.updated_state.gold, Some(1200));
    }

    #[tokio::test]
    async fn test_audio_failures_ask_to_repeat() {
        let transcribers: [Option<Arc<dyn Transcriber>>; 3] = [
            None,
            Some(Arc::new(FixedTranscriber(Ok("  ")))),
            Some(Arc::new(FixedTranscriber(Err(())))),
        ];
        for transcriber in transcribers {
            let service = service_with(None, transcriber);
            let id = start(&service, "en").session_id;

            let outcome = service
                .process_audio_turn(&id, clip(b"audio"), Some("en-US"))
                .await
                .unwrap();
            assert_eq!(outcome.intent, Intent::Unknown);
            assert_eq!(outcome.reply_text, "I couldn't hear you. Try again.");

            let session = service.sessions.get(&id, Utc::now()).unwrap();
            assert_eq!(session.turn_count, 0);
            assert!(session.history.is_empty());
        }
    }

    #[tokio::test]
    async fn test_audio_validates_clip_and_session() {
        let service = service_with(None, None);
        let id = start(&service, "en").session_id;

        let err = service
            .process_audio_turn(&id, clip(b""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmptyUtterance));

        let err = service
            .process_audio_turn("missing", clip(b"audio"), None)
            .await
            .unwrap_err();
        assert!(err.is_session_gone());
    }
}
