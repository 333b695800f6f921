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

//! Wire DTOs for the compute server's RPC surface: `ComputeHash`,
//! `ComputeBatch`, `StreamCompute`, `MineWork`, `GetDeviceInfo`,
//! `GetMetrics`. These are transport-neutral - `compute-server` exposes them
//! over HTTP/JSON (unary calls) and a JSON websocket (the bidirectional
//! stream); `device-client` is the one caller of both.

use serde::{Deserialize, Serialize};

pub mod error;

pub use error::{RpcError, RpcErrorKind};

/// Binary payloads travel as base64 in JSON, matching the orchestrator's own
/// `{ data: base64 }` control-plane convention.
pub mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            bytes,
        ))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &s)
.map_err(serde::de::Error::custom)
    }
}

pub mod b64_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            bytes,
        ))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &s)
.map_err(serde::de::Error::custom)?;
        decoded
.try_into()
.map_err(|_| serde::de::Error::custom("expected exactly 32 bytes"))
    }
}

pub mod b64_80 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 80], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            bytes,
        ))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 80], D::Error> {
        let s = String::deserialize(d)?;
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &s)
.map_err(serde::de::Error::custom)?;
        decoded
.try_into()
.map_err(|_| serde::de::Error::custom("expected exactly 80 bytes"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeHashRequest {
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeHashResponse {
    #[serde(with = "b64_32")]
    pub hash: [u8; 32],
    pub latency_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeBatchRequest {
    #[serde(with = "b64_vec")]
    pub data: Vec<Vec<u8>>,
    pub max_batch: usize,
}

pub mod b64_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct One(#[serde(with = "super::b64")] Vec<u8>);

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let wrapped: Vec<One> = items.iter().cloned().map(One).collect();
        wrapped.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let wrapped = Vec::<One>::deserialize(d)?;
        Ok(wrapped.into_iter().map(|One(v)| v).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeBatchResponse {
    #[serde(with = "b64_vec_32")]
    pub hashes: Vec<[u8; 32]>,
    pub total_latency_us: u64,
    pub count: usize,
}

pub mod b64_vec_32 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct One(#[serde(with = "super::b64_32")] [u8; 32]);

    pub fn serialize<S: Serializer>(items: &[[u8; 32]], s: S) -> Result<S::Ok, S::Error> {
        let wrapped: Vec<One> = items.iter().cloned().map(One).collect();
        wrapped.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[u8; 32]>, D::Error> {
        let wrapped = Vec::<One>::deserialize(d)?;
        Ok(wrapped.into_iter().map(|One(v)| v).collect())
    }
}

/// One inbound message on the `StreamCompute` websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamComputeRequest {
    #[serde(with = "b64")]
    pub data: Vec<u8>,
    pub request_id: u64,
}

/// One outbound message on the `StreamCompute` websocket. The server may
/// reorder relative to arrival; `request_id` is the sole correlation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamComputeResponse {
    #[serde(with = "b64_32")]
    pub hash: [u8; 32],
    pub request_id: u64,
    pub latency_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineWorkRequest {
    #[serde(with = "b64_80")]
    pub header: [u8; 80],
    pub nonce_start: u32,
    pub nonce_end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineWorkResponse {
    pub nonce: u32,
    pub latency_us: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportKind {
    RawUsb,
    KernelCharDevice,
    MinerDaemonRpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub transport_kind: TransportKind,
    pub chip_count: u8,
    pub firmware_version: String,
    pub is_operational: bool,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub total_requests: u64,
    pub total_bytes: u64,
    pub total_latency_ns: u64,
    pub peak_latency_ns: u64,
    pub error_count: u64,
}
