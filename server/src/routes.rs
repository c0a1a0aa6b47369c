use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    error::AppError,
    leader::{LeaderState, LeaderUpdatePayload},
    state::AppState,
};

#[derive(Deserialize)]
pub struct SessionQuery {
    session: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAck {
    pub success: bool,
    pub message: String,
    pub active_leaders: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAck {
    pub success: bool,
    pub message: String,
    pub remaining_leaders: usize,
}

/// The stored document stamped with the server clock at read time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderSnapshot {
    #[serde(flatten)]
    pub state: LeaderState,
    pub timestamp: i64,
    pub server_time: String,
    pub source: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemovePayload {
    #[serde(default)]
    leader_type: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

pub async fn update_leader_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    Json(body): Json<Value>,
) -> Result<Json<UpdateAck>, AppError> {
    let payload = parse_update_payload(body)?;
    let key = state.storage_key(query.session.as_deref());
    let now = Utc::now().timestamp_millis();

    let _guard = state.update_lock.lock().await;

    let mut document = state
        .store
        .get(&key)
        .await?
        .unwrap_or_else(|| LeaderState::empty(now));

    document.apply_update(payload, now);
    state.store.set(&key, &document).await?;

    info!(
        "Updated {key}: {} active leader(s)",
        document.active_leaders()
    );

    Ok(Json(UpdateAck {
        success: true,
        message: "Leader position updated".to_string(),
        active_leaders: document.active_leaders(),
    }))
}

pub async fn leader_data_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let key = state.storage_key(query.session.as_deref());
    let now = Utc::now();
    let now_ms = now.timestamp_millis();

    // Followers must always get a renderable document; an outage reads as
    // "no leader", never as a failed poll.
    let (mut document, source) = match state.store.get(&key).await {
        Ok(Some(document)) => (document, "store"),
        Ok(None) => (LeaderState::empty(now_ms), "default"),
        Err(err) => {
            warn!("Read of {key} failed, serving fallback: {err}");
            (LeaderState::empty(now_ms), "fallback")
        }
    };

    // Blobs written by older deployments may carry stale stamps.
    for stamp in ["timestamp", "serverTime", "source"] {
        document.extra.remove(stamp);
    }

    let snapshot = LeaderSnapshot {
        state: document,
        timestamp: now_ms,
        server_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        source,
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "-1"),
        ],
        Json(snapshot),
    )
        .into_response()
}

pub async fn remove_leader_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    Json(body): Json<Value>,
) -> Result<Json<RemoveAck>, AppError> {
    let payload: RemovePayload = serde_json::from_value(body)
        .map_err(|err| AppError::InvalidPayload(err.to_string()))?;

    let Some(leader_type) = payload.leader_type.filter(|name| !name.is_empty()) else {
        return Err(AppError::InvalidPayload(
            "leaderType is required".to_string(),
        ));
    };
    if payload.action.as_deref() != Some("remove") {
        return Err(AppError::InvalidPayload(
            r#"action must be "remove""#.to_string(),
        ));
    }

    let key = state.storage_key(query.session.as_deref());
    let now = Utc::now().timestamp_millis();

    let _guard = state.update_lock.lock().await;

    let mut document = state
        .store
        .get(&key)
        .await?
        .unwrap_or_else(|| LeaderState::empty(now));

    if document.remove_leader(&leader_type, now) {
        info!(
            "Removed {leader_type} from {key}, {} leader(s) remain",
            document.active_leaders()
        );
    } else {
        info!("Leader {leader_type} not present in {key}, nothing to remove");
    }

    state.store.set(&key, &document).await?;

    Ok(Json(RemoveAck {
        success: true,
        message: format!("Leader {leader_type} removed"),
        remaining_leaders: document.active_leaders(),
    }))
}

pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

fn parse_update_payload(body: Value) -> Result<LeaderUpdatePayload, AppError> {
    if !body.is_object() {
        return Err(AppError::InvalidPayload(
            "payload must be a JSON object".to_string(),
        ));
    }

    let payload: LeaderUpdatePayload = serde_json::from_value(body)
        .map_err(|err| AppError::InvalidPayload(err.to_string()))?;

    if !payload.carries_leaders() {
        return Err(AppError::InvalidPayload(
            "payload must carry leaderPosition or leaders".to_string(),
        ));
    }

    Ok(payload)
}
