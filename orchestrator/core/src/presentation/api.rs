// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only JSON API.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/healthz` | `{message, lastPolled, lastPolledSecondsAgo}` or 500 `{detail}` |
//! | `GET /api/leaderboard` | `{leaders}` |
//! | `GET /api/gossip?since_round=N` | `{messages, currentRound, currentStage}` |
//! | `GET /api/peers` | `{peers, discovery_active, total_count, connected_count}` |
//!
//! Handlers read the published snapshot and never wait on the poller.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::coordinator::SwarmCoordinator;
use crate::domain::health::Health;
use crate::domain::peer::PeerRoster;
use crate::domain::swarm_state::{GossipMessage, LeaderboardEntry};

pub struct AppState {
    pub coordinator: Arc<SwarmCoordinator>,
}

pub fn app(coordinator: Arc<SwarmCoordinator>) -> Router {
    let state = Arc::new(AppState { coordinator });

    Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/gossip", get(gossip))
        .route("/api/peers", get(peers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body shape: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub message: String,
    pub last_polled: DateTime<Utc>,
    pub last_polled_seconds_ago: i64,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    match state.coordinator.cache().health() {
        Health::Healthy { last_polled, age } => Ok(Json(HealthResponse {
            message: "OK".to_string(),
            last_polled,
            last_polled_seconds_ago: age.num_seconds(),
        })),
        unhealthy => {
            let detail = unhealthy.detail().unwrap_or("unhealthy");
            tracing::warn!(detail, "Health check failed");
            Err(ApiError::internal(detail))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaders: Vec<LeaderboardEntry>,
}

async fn leaderboard(State(state): State<Arc<AppState>>) -> Json<LeaderboardResponse> {
    Json(LeaderboardResponse {
        leaders: state.coordinator.cache().leaderboard(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct GossipQuery {
    #[serde(default)]
    pub since_round: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipResponse {
    pub messages: Vec<GossipMessage>,
    pub current_round: i64,
    pub current_stage: i64,
}

async fn gossip(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GossipQuery>,
) -> Json<GossipResponse> {
    let snapshot = state.coordinator.cache().snapshot();
    Json(GossipResponse {
        messages: snapshot.gossip_since(query.since_round),
        current_round: snapshot.round_stage.round,
        current_stage: snapshot.round_stage.stage,
    })
}

async fn peers(State(state): State<Arc<AppState>>) -> Json<PeerRoster> {
    Json(state.coordinator.peer_roster().await)
}
