//! Admin endpoints: catalog sync, catalog lookups, turn logs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{AppState, Envelope, envelope, header_locale};
use crate::db::TurnLog;
use crate::error::{I18nError, ServiceError};
use crate::knowledge::{Champion, Item, ItemCategory};
use crate::service::SyncSummary;

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// POST /admin/sync-game-data
pub async fn sync_game_data_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<SyncSummary>>, I18nError> {
    let summary = state
        .service
        .sync_game_data()
        .await
        .map_err(|e| state.i18n_error(e, header_locale(&headers)))?;
    Ok(envelope(summary))
}

/// GET /admin/champion/{name}
pub async fn champion_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Champion>>, I18nError> {
    let champion = state
        .service
        .champion(&name)
        .map_err(|e| state.i18n_error(e, header_locale(&headers)))?;
    Ok(envelope(champion))
}

/// GET /admin/item/{name}
pub async fn item_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Item>>, I18nError> {
    let item = state
        .service
        .item(&name)
        .map_err(|e| state.i18n_error(e, header_locale(&headers)))?;
    Ok(envelope(item))
}

/// GET /admin/items?category=
pub async fn items_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemsQuery>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Vec<Item>>>, I18nError> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ItemCategory>().map_err(|_| {
            state.i18n_error(
                ServiceError::InvalidRequest {
                    message: format!("unknown item category: {raw}"),
                },
                header_locale(&headers),
            )
        })?),
    };
    Ok(envelope(state.service.items(category)))
}

/// GET /admin/session/{id}/turns?limit=
pub async fn session_turns_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Vec<TurnLog>>>, I18nError> {
    let turns = state
        .service
        .session_turns(&session_id, query.limit)
        .map_err(|e| state.i18n_error(e, header_locale(&headers)))?;
    Ok(envelope(turns))
}

/// GET /admin/turns?limit=
pub async fn recent_turns_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Vec<TurnLog>>>, I18nError> {
    let turns = state
        .service
        .recent_turns(query.limit)
        .map_err(|e| state.i18n_error(e, header_locale(&headers)))?;
    Ok(envelope(turns))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use crate::api::tests::{app, get, post_json, send, start_session};

    #[tokio::test]
    async fn test_champion_and_item_lookup() {
        let app = app();

        let (status, body) = send(&app, get("/admin/champion/darius")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Darius");

        let (status, body) = send(&app, get("/admin/item/Chain%20Vest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cost"], 800);

        let (status, body) = send(&app, get("/admin/champion/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CHAMPION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_items_filter() {
        let app = app();

        let (status, body) = send(&app, get("/admin/items?category=boots")).await;
        assert_eq!(status, StatusCode::OK);
        let boots = body["data"].as_array().unwrap();
        assert!(!boots.is_empty());
        assert!(boots.iter().all(|i| i["category"] == "boots"));

        let (status, _) = send(&app, get("/admin/items?category=hats")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_turn_logs() {
        let app = app();
        let id = start_session(&app, "pt-BR").await;
        for text in ["1200 de ouro", "yasuo ta fed", "e agora?"] {
            let (status, _) = send(
                &app,
                post_json(&format!("/session/{id}/turn"), json!({"text": text})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, get(&format!("/admin/session/{id}/turns?limit=2"))).await;
        let turns = body["data"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["text"], "yasuo ta fed");
        assert_eq!(turns[1]["intent"], "ask_macro");

        let (_, body) = send(&app, get("/admin/turns")).await;
        assert_eq!(body["data"][0]["text"], "e agora?");
    }

    #[tokio::test]
    async fn test_sync_with_embedded_source() {
        let request = Request::post("/admin/sync-game-data")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "embedded");
        assert!(body["data"]["champions"].as_u64().unwrap() > 0);
    }
}
