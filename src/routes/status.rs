//! Liveness endpoints. Not part of the realtime protocol.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub message: &'static str,
    pub status: &'static str,
    pub active_boards: usize,
}

/// `GET /`: server identity and number of live boards.
pub async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        message: "Boardly API Server",
        status: "running",
        active_boards: state.active_boards().await,
    })
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
