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

//! C3: owns one ASIC. Runs the init state machine,
//! serializes every operation across a single mutex guarding the
//! `Transport`, and implements `compute_batch`/`mine_work` against it.

pub mod counters;
pub mod error;

pub use counters::Counters;
pub use error::{Error, ErrorKind, Result};

use asic_transport::{OpenTarget, Transport};
use ii_bitcoin::Header;
use ii_compute_rpc::{DeviceInfo, TransportKind as RpcTransportKind};

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Maximum inputs accepted by a single `compute_batch` call.
pub const MAX_BATCH: usize = 256;
/// Nonce poll budget for `compute_batch`: 100 attempts * 40ms ~= 4s.
const NONCE_POLL_ATTEMPTS: u32 = 100;
const NONCE_POLL_INTERVAL: Duration = Duration::from_millis(40);
/// How many completions between unsolicited health probes during a batch.
const HEALTH_PROBE_STRIDE: usize = 50;
/// Protocol requirement: wait at least this long after sending `TxConfig`.
const CONFIG_SETTLE_TIME: Duration = Duration::from_secs(1);
/// Consecutive transport failures before the controller drops to `Degraded`.
const DEGRADED_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Closed,
    Opening,
    Unconfigured,
    Configuring,
    Probing,
    Ready,
    Degraded,
}

struct InnerController {
    state: ControllerState,
    transport: Option<Box<dyn Transport>>,
    transport_kind: Option<RpcTransportKind>,
    is_operational: bool,
    chip_count: u8,
    firmware_version: String,
    opened_at: Option<Instant>,
    consecutive_failures: u32,
    counters: Counters,
}

impl InnerController {
    fn new() -> Self {
        Self {
            state: ControllerState::Closed,
            transport: None,
            transport_kind: None,
            is_operational: false,
            chip_count: 0,
            firmware_version: String::new(),
            opened_at: None,
            consecutive_failures: 0,
            counters: Counters::default(),
        }
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport
.as_mut()
.ok_or_else(|| ErrorKind::DeviceUnhealthy("transport not open".to_string()).into())
    }

    /// A single transport error fails only the current task; three
    /// consecutive ones drop the transport and move to `Degraded` (spec
    /// section 4.3/7).
    async fn note_failure(&mut self, err: asic_transport::TransportError) -> Error {
        self.counters.record_error();
        self.consecutive_failures += 1;
        if self.consecutive_failures >= DEGRADED_AFTER_FAILURES {
            ii_logging::warn!(
                "device controller: {} consecutive transport failures, transitioning to Degraded",
                self.consecutive_failures
            );
            self.state = ControllerState::Degraded;
            self.is_operational = false;
            if let Some(mut transport) = self.transport.take() {
                let _ = transport.close().await;
            }
        }
        err.into()
    }

    fn note_success(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// Cheaply clonable handle onto one ASIC. Every operation crosses the single
/// internal mutex; the mutex is held for the whole operation rather than
/// released across polling waits - a deliberate simplification (see
/// DESIGN.md) that still satisfies the non-interleaving invariant tests
/// require.
#[derive(Clone)]
pub struct DeviceController {
    inner: Arc<Mutex<InnerController>>,
}

impl DeviceController {
    /// Runs `Closed -> Opening -> Unconfigured -> Configuring -> Probing ->
    /// Ready`.
    pub async fn open(target: &OpenTarget, config: &ii_wire::TxConfigPayload) -> Result<Self> {
        let controller = Self {
            inner: Arc::new(Mutex::new(InnerController::new())),
        };
        {
            let mut inner = controller.inner.lock().await;
            inner.state = ControllerState::Opening;

            let transport = asic_transport::open(target).await?;
            inner.transport_kind = Some(match transport.kind() {
                asic_transport::TransportKind::RawUsb => RpcTransportKind::RawUsb,
                asic_transport::TransportKind::KernelCharDevice => {
                    RpcTransportKind::KernelCharDevice
                }
                asic_transport::TransportKind::MinerDaemonRpc => RpcTransportKind::MinerDaemonRpc,
            });
            inner.transport = Some(transport);
            inner.state = ControllerState::Unconfigured;

            inner.state = ControllerState::Configuring;
            let frame = ii_wire::build_tx_config(config);
            inner.transport_mut()?.send(&frame).await?;
            drop(inner);
            tokio::time::sleep(CONFIG_SETTLE_TIME).await;
            inner = controller.inner.lock().await;

            inner.state = ControllerState::Probing;
            let frame = ii_wire::build_rx_status();
            inner.transport_mut()?.send(&frame).await?;

            let mut buf = [0u8; 64];
            let status = match inner
.transport_mut()?
.recv(&mut buf, Duration::from_millis(500))
.await
            {
                Ok(n) => ii_wire::parse_response(&buf[..n])
.ok()
.filter(|f| f.token == ii_wire::Token::RxStatusResp)
.and_then(|f| ii_wire::parse_rx_status_payload(&f.payload).ok()),
                Err(_) => None,
            };

            inner.state = ControllerState::Ready;
            match status {
                Some(s) if s.operational && s.fifo_space > 0 => {
                    inner.is_operational = true;
                    inner.chip_count = s.chip_count;
                    inner.firmware_version = format!("hw{}", s.hw_version);
                }
                _ => {
                    inner.is_operational = false;
                }
            }
            inner.opened_at = Some(Instant::now());
        }
        Ok(controller)
    }

    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(mut transport) = inner.transport.take() {
            transport.close().await?;
        }
        inner.state = ControllerState::Closed;
        Ok(())
    }

    pub async fn state(&self) -> ControllerState {
        self.inner.lock().await.state
    }

    pub async fn is_operational(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.is_operational
            && !matches!(inner.state, ControllerState::Degraded | ControllerState::Closed)
    }

    pub async fn device_info(&self) -> DeviceInfo {
        let inner = self.inner.lock().await;
        DeviceInfo {
            transport_kind: inner
.transport_kind
.unwrap_or(RpcTransportKind::KernelCharDevice),
            chip_count: inner.chip_count,
            firmware_version: inner.firmware_version.clone(),
            is_operational: inner.is_operational && !matches!(inner.state, ControllerState::Degraded),
            uptime_secs: inner.opened_at.map(|t| t.elapsed().as_secs()).unwrap_or(0),
        }
    }

    pub async fn metrics(&self) -> ii_compute_rpc::Metrics {
        self.inner.lock().await.counters.to_rpc()
    }

    /// Computes a single hash against the ASIC: a `compute_batch` of one.
    pub async fn compute_hash(&self, input: &[u8]) -> Result<[u8; 32]> {
        if input.is_empty() {
            return Err(ErrorKind::BadArgument("input must not be empty".to_string()).into());
        }
        let results = self.compute_batch(&[input.to_vec()]).await?;
        Ok(results[0])
    }

    /// Runs a batch of `1 <= N <= 256` inputs against the ASIC, holding the
    /// controller's mutex for the whole call.
    pub async fn compute_batch(&self, inputs: &[Vec<u8>]) -> Result<Vec<[u8; 32]>> {
        if inputs.is_empty() {
            return Err(ErrorKind::BadArgument("batch must not be empty".to_string()).into());
        }
        if inputs.len() > MAX_BATCH {
            return Err(ErrorKind::BadArgument(format!(
                "batch of {} exceeds max of {}",
                inputs.len(),
                MAX_BATCH
            ))
.into());
        }

        let mut inner = self.inner.lock().await;
        if matches!(inner.state, ControllerState::Degraded) {
            return Err(ErrorKind::DeviceUnhealthy("controller is degraded".to_string()).into());
        }

        let mut hashes = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let op_start = Instant::now();
            let work_id = (i % 256) as u8;
            let midstate_digest = Sha256::digest(input);
            let mut midstate = [0u8; 32];
            midstate.copy_from_slice(&midstate_digest);
            let tail_digest = Sha256::digest([input.as_slice(), b"tail"].concat());
            let mut input_tail = [0u8; 8];
            input_tail.copy_from_slice(&tail_digest[0..8]);
            let task = ii_wire::AsicTask::from_activation(work_id, midstate, input_tail);
            let frame = ii_wire::build_tx_task(&task);

            if let Err(e) = inner.transport_mut()?.send(&frame).await {
                return Err(inner.note_failure(e).await);
            }

            let nonce = Self::poll_for_nonce(&mut inner, work_id, NONCE_POLL_ATTEMPTS).await?;
            inner.note_success();

            let mut preimage = input.clone();
            preimage.extend_from_slice(&nonce.to_le_bytes());
            let hash_digest = Sha256::digest(&preimage);
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&hash_digest);
            hashes.push(hash);

            inner
.counters
.record_success(frame.len(), op_start.elapsed());

            if (i + 1) % HEALTH_PROBE_STRIDE == 0 {
                let probe = ii_wire::build_rx_status();
                if let Err(e) = inner.transport_mut()?.send(&probe).await {
                    ii_logging::warn!("health probe during batch failed (non-fatal): {}", e);
                } else {
                    let mut buf = [0u8; 64];
                    let _ = inner
.transport_mut()?
.recv(&mut buf, Duration::from_millis(100))
.await;
                }
            }
        }
        Ok(hashes)
    }

    /// Builds one `TxTask` from an 80-byte header and polls for the first
    /// matching nonce within `deadline`.
    pub async fn mine_work(
        &self,
        header: &[u8; 80],
        nonce_start: u32,
        deadline: Duration,
    ) -> Result<(u32, [u8; 32])> {
        let op_start = Instant::now();
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, ControllerState::Degraded) {
            return Err(ErrorKind::DeviceUnhealthy("controller is degraded".to_string()).into());
        }

        let header = Header::from_bytes(*header);
        let work_id = (nonce_start % 256) as u8;
        let task = ii_wire::AsicTask::from_header(work_id, &header);
        let frame = ii_wire::build_tx_task(&task);
        if let Err(e) = inner.transport_mut()?.send(&frame).await {
            return Err(inner.note_failure(e).await);
        }

        let millis = (deadline.as_millis() as u64).max(NONCE_POLL_INTERVAL.as_millis() as u64);
        let attempts = (millis / NONCE_POLL_INTERVAL.as_millis() as u64).max(1) as u32;
        let nonce = Self::poll_for_nonce(&mut inner, work_id, attempts).await?;
        inner.note_success();
        inner
.counters
.record_success(frame.len(), op_start.elapsed());

        let solved = header.with_nonce(nonce);
        let hash = ii_bitcoin::double_sha256(solved.as_bytes());
        Ok((nonce, hash))
    }

    async fn poll_for_nonce(inner: &mut InnerController, work_id: u8, attempts: u32) -> Result<u32> {
        for _ in 0..attempts {
            let mut buf = [0u8; 256];
            let n = match inner.transport_mut()?.recv(&mut buf, NONCE_POLL_INTERVAL).await {
                Ok(n) => n,
                Err(e) if e.kind == asic_transport::TransportErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => return Err(inner.note_failure(e).await),
            };

            let frame = match ii_wire::parse_response(&buf[..n]) {
                Ok(f) if f.token == ii_wire::Token::RxNonceResp => f,
                _ => continue,
            };
            let payload = match ii_wire::parse_rx_nonce_payload(&frame.payload) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if let Some(entry) = payload.entries.iter().find(|e| e.work_id == work_id) {
                return Ok(entry.nonce);
            }
        }
        Err(ErrorKind::DeviceUnhealthy(format!(
            "no nonce for work_id {} within poll budget",
            work_id
        ))
.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use asic_transport::mock::MockTransport;

    fn crc16(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    fn build_frame(token: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![token, 0x00];
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    fn encode_nonce_resp(work_id: u8, nonce: u32) -> Vec<u8> {
        let mut payload = vec![0x00, 0x10, 0x01, 0x00];
        payload.push(work_id);
        payload.extend_from_slice(&nonce.to_le_bytes());
        payload.push(0); // chain
        build_frame(0xA2, &payload)
    }

    fn encode_status_resp(operational: bool, fifo_space: u16) -> Vec<u8> {
        let payload = vec![
            1u8,
            (fifo_space & 0xff) as u8,
            (fifo_space >> 8) as u8,
            2,
            operational as u8,
        ];
        build_frame(0xA1, &payload)
    }

    /// `open()` probes real transport backends, so controller tests build an
    /// already-`Ready` controller directly and hand it a `MockTransport`.
    async fn opened_controller_with_mock() -> (DeviceController, MockTransport) {
        let _ = encode_status_resp(true, 16); // documents the shape a real probe would see
        let mock = MockTransport::new();
        let controller = DeviceController {
            inner: Arc::new(Mutex::new(InnerController::new())),
        };
        {
            let mut inner = controller.inner.lock().await;
            inner.transport = Some(Box::new(mock.clone()));
            inner.transport_kind = Some(RpcTransportKind::KernelCharDevice);
            inner.state = ControllerState::Ready;
            inner.is_operational = true;
            inner.opened_at = Some(Instant::now());
        }
        (controller, mock)
    }

    #[tokio::test]
    async fn compute_batch_rejects_empty() {
        let (controller, _mock) = opened_controller_with_mock().await;
        let err = controller.compute_batch(&[]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }

    #[tokio::test]
    async fn compute_batch_rejects_over_max() {
        let (controller, _mock) = opened_controller_with_mock().await;
        let inputs: Vec<Vec<u8>> = (0..257u32).map(|i| vec![(i % 256) as u8]).collect();
        let err = controller.compute_batch(&inputs).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }

    #[tokio::test]
    async fn compute_batch_of_max_size_succeeds() {
        let (controller, mock) = opened_controller_with_mock().await;
        for i in 0..256u32 {
            mock.push_frame(encode_nonce_resp((i % 256) as u8, 0x1000 + i));
        }
        let inputs: Vec<Vec<u8>> = (0..=255u8).map(|i| vec![i]).collect();
        let result = controller.compute_batch(&inputs).await.unwrap();
        assert_eq!(result.len(), 256);
    }

    #[tokio::test]
    async fn mine_work_returns_asic_nonce_and_matching_hash() {
        let (controller, mock) = opened_controller_with_mock().await;
        mock.push_frame(encode_nonce_resp(0, 0x4142_4344));

        let header = [0xAAu8; 80];
        let (nonce, hash) = controller
.mine_work(&header, 0, Duration::from_millis(200))
.await
.unwrap();
        assert_eq!(nonce, 0x4142_4344);

        let expected_header = Header::from_bytes(header).with_nonce(0x4142_4344);
        let expected_hash = ii_bitcoin::double_sha256(expected_header.as_bytes());
        assert_eq!(hash, expected_hash);
    }

    #[tokio::test]
    async fn three_consecutive_transport_failures_trip_degraded() {
        let (controller, mock) = opened_controller_with_mock().await;
        mock.push_error(asic_transport::TransportErrorKind::Io, "gremlins");
        mock.push_error(asic_transport::TransportErrorKind::Io, "gremlins");
        mock.push_error(asic_transport::TransportErrorKind::Io, "gremlins");

        for _ in 0..3 {
            let _ = controller
.mine_work(&[0u8; 80], 0, Duration::from_millis(50))
.await;
        }
        assert_eq!(controller.state().await, ControllerState::Degraded);
        let err = controller
.mine_work(&[0u8; 80], 0, Duration::from_millis(50))
.await
.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DeviceUnhealthy(_)));
    }

    #[tokio::test]
    async fn overlapping_batches_do_not_interleave_on_the_transport() {
        let (controller, mock) = opened_controller_with_mock().await;
        for i in 0..2u32 {
            mock.push_frame(encode_nonce_resp(0, 0x2000 + i));
        }

        let c1 = controller.clone();
        let c2 = controller.clone();
        let h1 = tokio::spawn(async move { c1.compute_batch(&[vec![1]]).await });
        let h2 = tokio::spawn(async move { c2.compute_batch(&[vec![2]]).await });
        let (r1, r2) = tokio::join!(h1, h2);
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        assert_eq!(mock.sent_frames().len(), 2);
    }
}
