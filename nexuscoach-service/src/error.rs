use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session expired: {session_id}")]
    SessionExpired { session_id: String },

    #[error("Champion not found: {name}")]
    ChampionNotFound { name: String },

    #[error("Item not found: {name}")]
    ItemNotFound { name: String },

    #[error("Utterance is empty")]
    EmptyUtterance,

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Invalid game catalog: {message}")]
    InvalidCatalog { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by external providers (text generation, transcription, catalog sync)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: &'static str },

    #[error("Connection failed to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Provider {provider} timed out after {secs}s")]
    Timeout { provider: &'static str, secs: u64 },

    #[error("Request failed (status {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("Provider {provider} returned no text")]
    EmptyOutput { provider: &'static str },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Error body of the response envelope
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub user_message: String,
    pub correlation_id: String,
}

/// API error response: `{"ok": false, "error": {...}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorPayload,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::SessionNotFound { .. }
            | ServiceError::SessionExpired { .. }
            | ServiceError::ChampionNotFound { .. }
            | ServiceError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::EmptyUtterance | ServiceError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::InvalidCatalog { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            ServiceError::SessionExpired { .. } => "SESSION_EXPIRED",
            ServiceError::ChampionNotFound { .. } => "CHAMPION_NOT_FOUND",
            ServiceError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            ServiceError::EmptyUtterance => "STT_UNCLEAR",
            ServiceError::Provider(ProviderError::Timeout { .. }) => "PROVIDER_TIMEOUT",
            ServiceError::Provider(_) => "PROVIDER_ERROR",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::InvalidCatalog { .. } => "INVALID_CATALOG",
            ServiceError::InvalidRequest { .. } => "VALIDATION_ERROR",
            ServiceError::Config { .. } => "CONFIG_ERROR",
            ServiceError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller should start a new session
    pub fn is_session_gone(&self) -> bool {
        matches!(
            self,
            ServiceError::SessionNotFound { .. } | ServiceError::SessionExpired { .. }
        )
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::SessionNotFound { .. } | ServiceError::SessionExpired { .. } => {
                i18n.get(locale, "error-session-not-found", None)
            }
            ServiceError::EmptyUtterance => i18n.get(locale, "error-stt-unclear", None),
            ServiceError::ChampionNotFound { name } => {
                i18n.format(locale, "error-champion-not-found", &[("name", name)])
            }
            ServiceError::ItemNotFound { name } => {
                i18n.format(locale, "error-item-not-found", &[("name", name)])
            }
            ServiceError::InvalidRequest { message } => {
                i18n.format(locale, "error-invalid-request", &[("detail", message)])
            }
            ServiceError::InvalidCatalog { .. } => self.to_string(),
            _ => i18n.get(locale, "error-internal", None),
        }
    }

    fn into_error_response(self, message: String) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let correlation_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            error!(code, correlation_id = %correlation_id, error = %self, "Request failed");
        } else {
            warn!(code, correlation_id = %correlation_id, error = %self, "Request rejected");
        }

        let response = ErrorResponse {
            ok: false,
            error: ErrorPayload {
                code: code.to_string(),
                user_message: message,
                correlation_id,
            },
        };

        (status, Json(response)).into_response()
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let message = self.user_message(i18n, locale);
        self.into_error_response(message)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        self.into_error_response(message)
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_not_found() {
        let missing = ServiceError::SessionNotFound {
            session_id: "a".to_string(),
        };
        let expired = ServiceError::SessionExpired {
            session_id: "b".to_string(),
        };

        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(expired.status_code(), StatusCode::NOT_FOUND);
        assert!(missing.is_session_gone());
        assert!(expired.is_session_gone());
        assert_eq!(expired.error_code(), "SESSION_EXPIRED");
    }

    #[test]
    fn test_user_message_is_localized() {
        let i18n = I18n::new();
        let err = ServiceError::SessionNotFound {
            session_id: "a".to_string(),
        };

        assert_eq!(
            err.user_message(&i18n, "en-US"),
            "Session ended. Tap Start Match to continue."
        );
        assert_eq!(
            err.user_message(&i18n, "pt-BR"),
            "Sessão encerrada. Toque em Iniciar Partida para continuar."
        );
    }

    #[test]
    fn test_internal_details_are_hidden_from_users() {
        let i18n = I18n::new();
        let err = ServiceError::Internal {
            message: "mutex poisoned".to_string(),
        };

        let msg = err.user_message(&i18n, "en");
        assert!(!msg.contains("mutex"));
    }
}
