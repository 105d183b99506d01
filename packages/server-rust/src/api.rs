//! HTTP status API: `GET /api/v1/report` and `POST /api/v1/server`.
//!
//! This is the one part of the gossip core that runs on `axum`/`tokio`
//! rather than blocking threads -- it's a thin, low-traffic read/write
//! surface for operators and monitoring, not the gossip wire protocol
//! itself, so there's no reason to keep it off the async runtime the way
//! the SWIM loops are kept off it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::membership::{now_unix_secs, Membership};
use crate::wire::{Report, Server};

#[derive(Clone)]
struct ApiState {
    membership: Arc<Membership>,
}

/// Body of `POST /api/v1/server`.
#[derive(Debug, Deserialize)]
struct AddServerRequest {
    hostname: String,
    port: u16,
    #[serde(default)]
    ip_addr: Option<String>,
}

/// Builds the router for the status API. `GET /api/v1/report` returns this
/// node's current membership view; any other path is a 404, handled by
/// axum's default fallback behavior.
#[must_use]
pub fn router(membership: Arc<Membership>) -> Router {
    Router::new()
        .route("/api/v1/report", get(get_report))
        .route("/api/v1/server", post(add_server))
        .with_state(ApiState { membership })
}

async fn get_report(State(state): State<ApiState>) -> Json<Report> {
    Json(Report {
        sender: state.membership.self_server().clone(),
        alive: state.membership.alive_records(),
        suspected: state.membership.suspected_records(),
    })
}

async fn add_server(
    State(state): State<ApiState>,
    Json(body): Json<AddServerRequest>,
) -> StatusCode {
    let mut server = Server::new(body.hostname, body.port);
    server.ip_addr = body.ip_addr;
    state.membership.mark_alive(&server, now_unix_secs());
    StatusCode::CREATED
}
