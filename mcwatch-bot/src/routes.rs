use crate::AppState;
use crate::error::AppError;
use crate::validation;

use axum::{
    Json,
    extract::{Path, State},
};
use mcwatch_core::{LedgerStore, format_playtime, status_line};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    online: bool,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    players_online: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_players: Option<u32>,
    players: Vec<String>,
    /// Players in the playtime ledger
    tracked_players: usize,
}

#[derive(Serialize)]
pub(crate) struct PlayerResponse {
    name: String,
    minutes: u64,
    playtime: String,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    linked_identity: Option<String>,
}

pub(crate) async fn status<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<StatusResponse> {
    let snapshot = state.cache.current();
    let status = snapshot.status();
    Json(StatusResponse {
        online: status.is_some(),
        status: status_line(&snapshot),
        players_online: status.map(|s| s.online),
        max_players: status.map(|s| s.max),
        players: status
            .map(|s| s.player_names().map(str::to_string).collect())
            .unwrap_or_default(),
        tracked_players: state.ledger.len().await,
    })
}

pub(crate) async fn player<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<PlayerResponse>, AppError> {
    validation::validate_player_name(&name)?;

    let entry = state
        .ledger
        .entry(&name)
        .await
        .ok_or_else(|| AppError::PlayerNotFound(name.clone()))?;

    Ok(Json(PlayerResponse {
        playtime: format_playtime(entry.minutes),
        minutes: entry.minutes,
        verified: entry.is_linked(),
        linked_identity: entry.linked_identity().map(|identity| identity.name),
        name,
    }))
}
