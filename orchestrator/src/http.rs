// Copyright (C) 2026  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! The orchestrator's own HTTP/JSON control plane: the
//! outward-facing surface distinct from the per-device compute RPC that
//! `compute-server` exposes.

use crate::{Error, Orchestrator};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use ii_compute_rpc::b64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
.route("/api/v1/infer", post(infer))
.route("/api/v1/batch", post(batch))
.route("/api/v1/health", get(health))
.route("/api/v1/metrics", get(metrics))
.route("/api/v1/device", get(device))
.route("/api/v1/shutdown", post(shutdown))
.layer(TraceLayer::new_for_http())
.with_state(state)
}

#[derive(Debug, Deserialize)]
struct InferRequest {
    #[serde(with = "b64")]
    data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    items: Vec<InferRequestItem>,
}

#[derive(Debug, Deserialize)]
struct InferRequestItem {
    #[serde(with = "b64")]
    data: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(err: Error) -> axum::response::Response {
    let status =
        axum::http::StatusCode::from_u16(err.http_status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody { error: err.to_string() })).into_response()
}

async fn infer(State(state): State<AppState>, Json(request): Json<InferRequest>) -> axum::response::Response {
    match state.orchestrator.infer(&request.data).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn batch(State(state): State<AppState>, Json(request): Json<BatchRequest>) -> axum::response::Response {
    let items: Vec<Vec<u8>> = request.items.into_iter().map(|i| i.data).collect();
    match state.orchestrator.batch(&items).await {
        Ok(responses) => Json(responses).into_response(),
        Err(e) => error_response(e),
    }
}

async fn health(State(state): State<AppState>) -> axum::response::Response {
    let health = state.orchestrator.health().await;
    let status = if health.status == "rebooting" || health.status == "degraded" {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    } else {
        axum::http::StatusCode::OK
    };
    (status, Json(health)).into_response()
}

async fn metrics(State(state): State<AppState>) -> axum::response::Response {
    match state.orchestrator.metrics().await {
        Ok(metrics) => Json(metrics).into_response(),
        Err(e) => error_response(e),
    }
}

async fn device(State(state): State<AppState>) -> axum::response::Response {
    match state.orchestrator.device_info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

async fn shutdown(State(state): State<AppState>) -> &'static str {
    state.orchestrator.shutdown().await;
    "shutting down"
}
