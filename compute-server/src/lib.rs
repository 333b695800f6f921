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

//! C4: the compute server. Wraps one `DeviceController` with an HTTP/JSON RPC
//! surface plus a JSON websocket for `StreamCompute`. Every RPC - unary or
//! streamed - ultimately calls the same `DeviceController`, whose own mutex
//! is the sole serialization point: this layer adds no
//! additional queue.

pub mod port_bind;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use device_controller::DeviceController;
use ii_compute_rpc::{
    ComputeBatchRequest, ComputeBatchResponse, ComputeHashRequest, ComputeHashResponse,
    MineWorkRequest, MineWorkResponse, RpcError, StreamComputeRequest, StreamComputeResponse,
};

use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub controller: DeviceController,
    pub halt: ii_halt::Sender,
}

/// Builds the full router: unary RPCs, the streaming websocket, and the
/// shutdown endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
.route("/rpc/compute_hash", post(compute_hash))
.route("/rpc/compute_batch", post(compute_batch))
.route("/rpc/mine_work", post(mine_work))
.route("/rpc/device_info", get(device_info))
.route("/rpc/metrics", get(metrics))
.route("/ws/stream_compute", get(stream_compute))
.route("/api/v1/shutdown", post(shutdown))
.layer(TraceLayer::new_for_http())
.with_state(state)
}

fn rpc_error_response(err: device_controller::Error) -> axum::response::Response {
    let rpc_err: RpcError = err.into();
    let status = axum::http::StatusCode::from_u16(rpc_err.http_status())
.unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(rpc_err)).into_response()
}

async fn compute_hash(
    State(state): State<AppState>,
    Json(request): Json<ComputeHashRequest>,
) -> axum::response::Response {
    let start = Instant::now();
    match state.controller.compute_hash(&request.data).await {
        Ok(hash) => Json(ComputeHashResponse {
            hash,
            latency_us: start.elapsed().as_micros() as u64,
        })
.into_response(),
        Err(e) => rpc_error_response(e),
    }
}

async fn compute_batch(
    State(state): State<AppState>,
    Json(request): Json<ComputeBatchRequest>,
) -> axum::response::Response {
    if request.data.len() > request.max_batch {
        let rpc_err = RpcError::bad_argument(format!(
            "batch of {} exceeds caller max_batch of {}",
            request.data.len(),
            request.max_batch
        ));
        let status = axum::http::StatusCode::from_u16(rpc_err.http_status())
.unwrap_or(axum::http::StatusCode::BAD_REQUEST);
        return (status, Json(rpc_err)).into_response();
    }
    let start = Instant::now();
    match state.controller.compute_batch(&request.data).await {
        Ok(hashes) => {
            let count = hashes.len();
            Json(ComputeBatchResponse {
                hashes,
                total_latency_us: start.elapsed().as_micros() as u64,
                count,
            })
.into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

async fn mine_work(
    State(state): State<AppState>,
    Json(request): Json<MineWorkRequest>,
) -> axum::response::Response {
    let start = Instant::now();
    let deadline = Duration::from_secs(10);
    match state
.controller
.mine_work(&request.header, request.nonce_start, deadline)
.await
    {
        Ok((nonce, _hash)) => Json(MineWorkResponse {
            nonce,
            latency_us: start.elapsed().as_micros() as u64,
        })
.into_response(),
        Err(e) => rpc_error_response(e),
    }
}

async fn device_info(State(state): State<AppState>) -> Json<ii_compute_rpc::DeviceInfo> {
    Json(state.controller.device_info().await)
}

async fn metrics(State(state): State<AppState>) -> Json<ii_compute_rpc::Metrics> {
    Json(state.controller.metrics().await)
}

async fn shutdown(State(state): State<AppState>) -> &'static str {
    ii_logging::info!("shutdown requested via HTTP control plane");
    state.halt.do_stop().await;
    "shutting down"
}

async fn stream_compute(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_compute(socket, state))
}

/// Each inbound message is handled on its own task so that a slow compute
/// does not hold up later arrivals; responses carry `request_id` so the
/// client can correlate them regardless of completion order.
async fn handle_stream_compute(socket: WebSocket, state: AppState) {
    use futures::{SinkExt, StreamExt};
    let (sink, mut stream) = socket.split();
    let sink = std::sync::Arc::new(tokio::sync::Mutex::new(sink));

    let mut in_flight = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                let Message::Text(text) = message else { continue };
                let Ok(request) = serde_json::from_str::<StreamComputeRequest>(&text) else {
                    continue;
                };
                let controller = state.controller.clone();
                let sink = sink.clone();
                in_flight.spawn(async move {
                    let start = Instant::now();
                    if let Ok(hash) = controller.compute_hash(&request.data).await {
                        let response = StreamComputeResponse {
                            hash,
                            request_id: request.request_id,
                            latency_us: start.elapsed().as_micros() as u64,
                        };
                        if let Ok(body) = serde_json::to_string(&response) {
                            let _ = sink.lock().await.send(Message::Text(body)).await;
                        }
                    }
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            else => break,
        }
    }
    while in_flight.join_next().await.is_some() {}
}
