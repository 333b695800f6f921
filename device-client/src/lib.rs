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

//! C5: the Orchestrator's single handle onto one deployed compute server.
//!
//! The subtle part is the fallback policy: exactly one
//! boolean, `allow_soft_fallback`, starts `true` and is cleared forever the
//! first time an RPC against the real server succeeds. Before that point (or
//! if a connection was simply never made), failures are masked by computing
//! the equivalent result in software; after it, failures are surfaced -
//! silently falling back after a production ASIC was proven reachable would
//! hide a real outage.

pub mod error;

pub use error::{Error, ErrorKind, Result};

use ii_bitcoin::{Header, Target};
use ii_compute_rpc::{
    ComputeBatchRequest, ComputeBatchResponse, ComputeHashRequest, ComputeHashResponse,
    DeviceInfo, MineWorkRequest, MineWorkResponse, Metrics,
};

use std::sync::Mutex;
use std::time::Duration;

struct FallbackState {
    was_ever_connected: bool,
    allow_soft_fallback: bool,
}

/// Talks HTTP/JSON to one `compute-server` instance, applying the no-silent-
/// fallback policy around every call.
pub struct DeviceClient {
    base_url: reqwest::Url,
    http: reqwest::Client,
    state: Mutex<FallbackState>,
}

impl DeviceClient {
    pub fn new(base_url: reqwest::Url, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
.timeout(request_timeout)
.build()
.expect("reqwest client with a fixed timeout always builds");
        Self {
            base_url,
            http,
            state: Mutex::new(FallbackState {
                was_ever_connected: false,
                allow_soft_fallback: true,
            }),
        }
    }

    /// Probes `GetDeviceInfo`. On success, permanently retires software
    /// fallback for this client.
    pub async fn connect(&self) -> Result<DeviceInfo> {
        let info = self.fetch_device_info().await?;
        self.note_success();
        Ok(info)
    }

    pub fn was_ever_connected(&self) -> bool {
        self.state.lock().unwrap().was_ever_connected
    }

    pub fn allow_soft_fallback(&self) -> bool {
        self.state.lock().unwrap().allow_soft_fallback
    }

    fn note_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.was_ever_connected = true;
        state.allow_soft_fallback = false;
    }

    /// Whether a failed RPC right now is allowed to be masked by a software
    /// equivalent: true before the first real success, false forever after.
    fn should_fallback(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.was_ever_connected || state.allow_soft_fallback
    }

    pub async fn compute_hash(&self, input: &[u8]) -> Result<[u8; 32]> {
        if input.is_empty() {
            return Err(ErrorKind::BadArgument("input must not be empty".to_string()).into());
        }
        match self.post_compute_hash(input).await {
            Ok(resp) => {
                self.note_success();
                Ok(resp.hash)
            }
            Err(e) if self.should_fallback() => {
                ii_logging::warn!("compute_hash RPC failed, falling back to software hash: {}", e);
                Ok(ii_bitcoin::sha256(input))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn compute_batch(&self, inputs: &[Vec<u8>], max_batch: usize) -> Result<Vec<[u8; 32]>> {
        if inputs.is_empty() {
            return Err(ErrorKind::BadArgument("batch must not be empty".to_string()).into());
        }
        if inputs.len() > max_batch {
            return Err(ErrorKind::BadArgument(format!(
                "batch of {} exceeds max of {}",
                inputs.len(),
                max_batch
            ))
.into());
        }
        match self.post_compute_batch(inputs, max_batch).await {
            Ok(resp) => {
                self.note_success();
                Ok(resp.hashes)
            }
            Err(e) if self.should_fallback() => {
                ii_logging::warn!("compute_batch RPC failed, falling back to software hashes: {}", e);
                Ok(inputs.iter().map(|input| ii_bitcoin::sha256(input)).collect())
            }
            Err(e) => Err(e),
        }
    }

    /// Finds a nonce for `header` in `[nonce_start, nonce_end]`. On fallback,
    /// searches in software against the target encoded in the header's own
    /// `nBits` field.
    pub async fn mine_header(&self, header: &[u8; 80], nonce_start: u32, nonce_end: u32) -> Result<u32> {
        match self.post_mine_work(header, nonce_start, nonce_end).await {
            Ok(resp) => {
                self.note_success();
                Ok(resp.nonce)
            }
            Err(e) if self.should_fallback() => {
                ii_logging::warn!("mine_work RPC failed, falling back to software nonce search: {}", e);
                Self::software_mine(header, nonce_start, nonce_end)
            }
            Err(e) => Err(e),
        }
    }

    fn software_mine(header: &[u8; 80], nonce_start: u32, nonce_end: u32) -> Result<u32> {
        let base = Header::from_bytes(*header);
        let target = Target::from_compact(base.n_bits());
        for nonce in nonce_start..=nonce_end {
            let candidate = base.with_nonce(nonce);
            let hash = ii_bitcoin::double_sha256(candidate.as_bytes());
            if target.is_satisfied_by(&hash) {
                return Ok(nonce);
            }
        }
        Err(ErrorKind::BadArgument(format!(
            "no nonce in [{}, {}] satisfies the target",
            nonce_start, nonce_end
        ))
.into())
    }

    /// Device metadata and metrics are ASIC-specific; there is no software
    /// equivalent, so these always surface the real error.
    pub async fn device_info(&self) -> Result<DeviceInfo> {
        self.fetch_device_info().await
    }

    pub async fn metrics(&self) -> Result<Metrics> {
        let response = self
.http
.get(self.url("rpc/metrics"))
.send()
.await?
.error_for_status()?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> reqwest::Url {
        self.base_url.join(path).expect("path is a valid relative URL")
    }

    async fn fetch_device_info(&self) -> Result<DeviceInfo> {
        let response = self
.http
.get(self.url("rpc/device_info"))
.send()
.await?
.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_compute_hash(&self, input: &[u8]) -> Result<ComputeHashResponse> {
        let request = ComputeHashRequest { data: input.to_vec() };
        let response = self
.http
.post(self.url("rpc/compute_hash"))
.json(&request)
.send()
.await?
.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_compute_batch(
        &self,
        inputs: &[Vec<u8>],
        max_batch: usize,
    ) -> Result<ComputeBatchResponse> {
        let request = ComputeBatchRequest {
            data: inputs.to_vec(),
            max_batch,
        };
        let response = self
.http
.post(self.url("rpc/compute_batch"))
.json(&request)
.send()
.await?
.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_mine_work(
        &self,
        header: &[u8; 80],
        nonce_start: u32,
        nonce_end: u32,
    ) -> Result<MineWorkResponse> {
        let request = MineWorkRequest {
            header: *header,
            nonce_start,
            nonce_end,
        };
        let response = self
.http
.post(self.url("rpc/mine_work"))
.json(&request)
.send()
.await?
.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn software_mine_finds_a_nonce_satisfying_the_easy_target() {
        let mut header = [0xAAu8; 80];
        // nBits occupies bytes 72..76; install the easy target so the search
        // terminates quickly in a unit test.
        header[72..76].copy_from_slice(&ii_bitcoin::EASY_TARGET_N_BITS.to_le_bytes());
        let nonce = DeviceClient::software_mine(&header, 0, 0xFFFF_FFFF).unwrap();
        let solved = Header::from_bytes(header).with_nonce(nonce);
        let hash = ii_bitcoin::double_sha256(solved.as_bytes());
        assert!(Target::easy().is_satisfied_by(&hash));
    }

    #[test]
    fn fresh_client_allows_fallback_before_any_success() {
        let client = DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_millis(50),
        );
        assert!(!client.was_ever_connected());
        assert!(client.should_fallback());
    }

    #[test]
    fn note_success_permanently_clears_fallback() {
        let client = DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_millis(50),
        );
        client.note_success();
        assert!(client.was_ever_connected());
        assert!(!client.allow_soft_fallback());
        assert!(!client.should_fallback());
    }
}
