//! Session lifecycle and turn endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::api::{AppState, Envelope, envelope, header_locale};
use crate::db::{Feedback, Rating};
use crate::error::{I18nError, ServiceError};
use crate::knowledge::Lane;
use crate::service::{ClientStateHint, SessionEnded, SessionStarted, StartSession, TurnOutcome};
use crate::stt::AudioClip;

/// Request body for POST /session/start
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub device_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    pub initial_context: InitialContext,
}

#[derive(Debug, Deserialize)]
pub struct InitialContext {
    pub champion: String,
    pub lane: Lane,
    #[serde(default)]
    pub enemy: Option<String>,
}

/// Request body for POST /session/{id}/turn
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: String,
    #[serde(default)]
    pub client_state_hint: Option<ClientStateHint>,
}

/// Request body for POST /turn
#[derive(Debug, Deserialize)]
pub struct BodyTurnRequest {
    pub session_id: String,
    pub text: String,
    #[serde(default)]
    pub client_state_hint: Option<ClientStateHint>,
}

/// Request body for the end endpoints. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl EndSessionRequest {
    fn feedback(&self) -> Option<Feedback> {
        self.rating.map(|rating| Feedback {
            rating,
            comment: self
                .comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

fn invalid(state: &AppState, locale: &str, message: impl Into<String>) -> I18nError {
    state.i18n_error(
        ServiceError::InvalidRequest {
            message: message.into(),
        },
        locale,
    )
}

/// Unwrap a JSON body, answering malformed ones with the error envelope
fn json_body<T>(
    state: &AppState,
    locale: &str,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, I18nError> {
    body.map(|Json(value)| value)
        .map_err(|e| invalid(state, locale, e.body_text()))
}

/// Parse an optional JSON body; an empty body is the default value
fn optional_body<T: DeserializeOwned + Default>(
    state: &AppState,
    locale: &str,
    body: &Bytes,
) -> Result<T, I18nError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| invalid(state, locale, e.to_string()))
}

/// POST /session/start
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<Envelope<SessionStarted>>, I18nError> {
    let header_locale = header_locale(&headers);
    let request = json_body(&state, header_locale, body)?;
    let locale = request
        .locale
        .clone()
        .unwrap_or_else(|| header_locale.to_string());

    let started = state
        .service
        .start_session(StartSession {
            device_id: request.device_id,
            locale: request.locale,
            champion: request.initial_context.champion,
            lane: request.initial_context.lane,
            enemy: request.initial_context.enemy,
        })
        .map_err(|e| state.i18n_error(e, &locale))?;

    Ok(envelope(started))
}

/// POST /session/{id}/turn
pub async fn turn_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<Envelope<TurnOutcome>>, I18nError> {
    let locale = header_locale(&headers);
    let request = json_body(&state, locale, body)?;
    run_turn(&state, locale, &session_id, &request.text, request.client_state_hint).await
}

/// POST /turn
pub async fn turn_body_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<BodyTurnRequest>, JsonRejection>,
) -> Result<Json<Envelope<TurnOutcome>>, I18nError> {
    let locale = header_locale(&headers);
    let request = json_body(&state, locale, body)?;
    run_turn(
        &state,
        locale,
        &request.session_id,
        &request.text,
        request.client_state_hint,
    )
    .await
}

async fn run_turn(
    state: &AppState,
    locale: &str,
    session_id: &str,
    text: &str,
    hint: Option<ClientStateHint>,
) -> Result<Json<Envelope<TurnOutcome>>, I18nError> {
    let outcome = state
        .service
        .process_turn(session_id, text, hint)
        .await
        .map_err(|e| state.i18n_error(e, locale))?;
    Ok(envelope(outcome))
}

/// POST /turn/audio (multipart: `session_id`, `audio`, `locale`)
pub async fn audio_turn_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Envelope<TurnOutcome>>, I18nError> {
    let header_locale = header_locale(&headers);
    let mut session_id: Option<String> = None;
    let mut locale: Option<String> = None;
    let mut clip: Option<AudioClip> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(&state, header_locale, e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| invalid(&state, header_locale, e.body_text()))?;
                clip = Some(AudioClip {
                    data,
                    file_name,
                    content_type,
                });
            }
            "session_id" => {
                session_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| invalid(&state, header_locale, e.body_text()))?
                        .trim()
                        .to_string(),
                );
            }
            "locale" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| invalid(&state, header_locale, e.body_text()))?;
                if !value.trim().is_empty() {
                    locale = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let error_locale = locale.as_deref().unwrap_or(header_locale);
    let session_id = session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(&state, error_locale, "session_id is required"))?;
    let clip = clip.ok_or_else(|| invalid(&state, error_locale, "audio is required"))?;

    let outcome = state
        .service
        .process_audio_turn(&session_id, clip, locale.as_deref())
        .await
        .map_err(|e| state.i18n_error(e, error_locale))?;

    Ok(envelope(outcome))
}

/// POST /session/{id}/end
pub async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<SessionEnded>>, I18nError> {
    let locale = header_locale(&headers);
    let request: EndSessionRequest = optional_body(&state, locale, &body)?;
    end_session(&state, locale, &session_id, request.feedback())
}

/// POST /session/end
pub async fn end_session_body_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<SessionEnded>>, I18nError> {
    let locale = header_locale(&headers);
    let request: EndSessionRequest = optional_body(&state, locale, &body)?;
    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(&state, locale, "session_id is required"))?;
    end_session(&state, locale, session_id, request.feedback())
}

fn end_session(
    state: &AppState,
    locale: &str,
    session_id: &str,
    feedback: Option<Feedback>,
) -> Result<Json<Envelope<SessionEnded>>, I18nError> {
    let ended = state
        .service
        .end_session(session_id, feedback)
        .map_err(|e| state.i18n_error(e, locale))?;
    Ok(envelope(ended))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;

    use crate::api::tests::{app, get, post_json, send, start_session};

    #[tokio::test]
    async fn test_start_session() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json(
                "/session/start",
                json!({
                    "device_id": "phone-1",
                    "locale": "en-US",
                    "initial_context": {"champion": "garen", "lane": "baron", "enemy": "darius"}
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["state"]["champion"], "Garen");
        assert_eq!(body["data"]["state"]["lane"], "top");
        assert!(
            body["data"]["greeting"]
                .as_str()
                .unwrap()
                .contains("against Darius")
        );
    }

    #[tokio::test]
    async fn test_start_session_rejects_bad_body() {
        let (status, body) = send(
            &app(),
            post_json(
                "/session/start",
                json!({"device_id": "phone-1", "initial_context": {"champion": "Garen", "lane": "river"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_turn_by_path_and_body() {
        let app = app();
        let id = start_session(&app, "pt-BR").await;

        let (status, body) = send(
            &app,
            post_json(
                &format!("/session/{id}/turn"),
                json!({"text": "to com 1200 de ouro, qual item compro?"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["intent"], "ask_build");
        assert_eq!(body["data"]["reply_source"], "fallback");
        assert_eq!(body["data"]["updated_state"]["gold"], 1200);
        assert_eq!(body["data"]["suggested_tts"]["voice"], "pt-BR");

        let (status, body) = send(
            &app,
            post_json(
                "/turn",
                json!({
                    "session_id": id,
                    "text": "yasuo ta fed",
                    "client_state_hint": {"kills": 3, "deaths": 1}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["intent"], "update_enemy_status");
        assert_eq!(body["data"]["updated_state"]["kills"], 3);
        assert_eq!(body["data"]["updated_state"]["enemies"][1]["champion"], "Yasuo");
    }

    #[tokio::test]
    async fn test_empty_turn_is_bad_request() {
        let app = app();
        let id = start_session(&app, "pt-BR").await;

        let (status, body) = send(
            &app,
            post_json(&format!("/session/{id}/turn"), json!({"text": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "STT_UNCLEAR");
    }

    #[tokio::test]
    async fn test_audio_turn_without_transcriber_asks_to_repeat() {
        let app = app();
        let id = start_session(&app, "en").await;

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"session_id\"\r\n\r\n\
             {id}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"locale\"\r\n\r\n\
             en-US\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"audio\"; filename=\"turn.webm\"\r\n\
             Content-Type: audio/webm\r\n\r\n\
             RIFFDATA\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::post("/turn/audio")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["intent"], "unknown");
        assert_eq!(body["data"]["reply_text"], "I couldn't hear you. Try again.");
    }

    #[tokio::test]
    async fn test_end_session_with_and_without_feedback() {
        let app = app();

        let id = start_session(&app, "en").await;
        let request = Request::post(format!("/session/{id}/end"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Session ended. Good game!");

        let (status, _) = send(
            &app,
            post_json(&format!("/session/{id}/turn"), json!({"text": "oi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = start_session(&app, "en").await;
        let (status, body) = send(
            &app,
            post_json(
                "/session/end",
                json!({"session_id": id, "rating": "good", "comment": "helpful"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Thanks for the feedback. Good game!");

        let (status, _) = send(&app, get(&format!("/admin/session/{id}/turns"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_end_without_session_id_is_rejected() {
        let (status, body) = send(&app(), post_json("/session/end", json!({"rating": "bad"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
