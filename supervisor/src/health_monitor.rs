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

//! C7's health monitor loop: periodic `GetDeviceInfo`, reconnect with
//! exponential backoff on failure, burst-paused after repeated failure
//!.

use crate::state::SharedState;

use device_client::DeviceClient;
use std::sync::Arc;
use std::time::Duration;

pub const INTERVAL: Duration = Duration::from_secs(10);
const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const BURST_LIMIT: u32 = 5;
const BURST_PAUSE: Duration = Duration::from_secs(60);

/// Runs until `halt` fires. Mutates only `state`; never returns an error -
/// failures are logged and folded into `reconnect_attempts`.
pub async fn run(device: Arc<DeviceClient>, state: SharedState, mut halt: ii_halt::Receiver) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = halt.wait_for_halt() => return,
        }
        if halt.is_halted() {
            return;
        }
        tick(&device, &state).await;
    }
}

async fn tick(device: &DeviceClient, state: &SharedState) {
    if state.lock().await.is_rebooting {
        return;
    }

    match device.device_info().await {
        Ok(_) => note_success(state).await,
        Err(e) => {
            let attempts = note_failure(state).await;
            ii_logging::warn!("health check failed ({} consecutive attempt(s)): {}", attempts, e);
            reconnect_with_backoff(device, state, attempts).await;
        }
    }
}

async fn note_success(state: &SharedState) {
    let mut guard = state.lock().await;
    let was_unhealthy = !guard.connection_healthy;
    guard.reconnect_attempts = 0;
    guard.connection_healthy = true;
    guard.last_health_check = Some(std::time::Instant::now());
    drop(guard);
    if was_unhealthy {
        ii_logging::info!("device connection restored");
    }
}

async fn note_failure(state: &SharedState) -> u32 {
    let mut guard = state.lock().await;
    guard.connection_healthy = false;
    guard.reconnect_attempts += 1;
    guard.reconnect_attempts
}

/// `delay = min(1s * 2^(attempts-1), 10s)`; after every 5th consecutive
/// failure, pause ~60s instead of retrying immediately.
async fn reconnect_with_backoff(device: &DeviceClient, state: &SharedState, attempts: u32) {
    if attempts > 0 && attempts % BURST_LIMIT == 0 {
        ii_logging::warn!(
            "{} consecutive reconnect failures, pausing {:?} before the next burst",
            attempts,
            BURST_PAUSE
        );
        tokio::time::sleep(BURST_PAUSE).await;
        return;
    }

    let exponent = (attempts.saturating_sub(1)).min(16);
    let delay = BACKOFF_START
.checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
.unwrap_or(BACKOFF_CAP)
.min(BACKOFF_CAP);
    tokio::time::sleep(delay).await;

    match device.connect().await {
        Ok(_) => note_success(state).await,
        Err(e) => ii_logging::warn!("reconnect attempt {} failed: {}", attempts, e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::new_shared;
    use std::time::Duration as StdDuration;

    fn unreachable_client() -> DeviceClient {
        DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            StdDuration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn tick_skips_when_rebooting() {
        let state = new_shared();
        state.lock().await.is_rebooting = true;
        let device = unreachable_client();
        tick(&device, &state).await;
        assert_eq!(state.lock().await.reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn failure_increments_attempts_and_marks_unhealthy() {
        let state = new_shared();
        let device = unreachable_client();
        tick(&device, &state).await;
        let guard = state.lock().await;
        assert_eq!(guard.reconnect_attempts, 1);
        assert!(!guard.connection_healthy);
    }
}
