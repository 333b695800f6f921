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

//! The Supervisor's one piece of mutable shared state, guarded by a single
//! mutex: `is_rebooting`, `connection_healthy`, `last_health_check`,
//! `reconnect_attempts`.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Rebooting,
}

#[derive(Debug)]
pub struct SupervisorState {
    pub is_rebooting: bool,
    pub connection_healthy: bool,
    pub last_health_check: Option<Instant>,
    pub reconnect_attempts: u32,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            is_rebooting: false,
            connection_healthy: true,
            last_health_check: None,
            reconnect_attempts: 0,
        }
    }
}

impl SupervisorState {
    /// The control plane's `health.status` field: truthful,
    /// and `rebooting` takes priority over a stale `connection_healthy`.
    pub fn status(&self) -> HealthStatus {
        if self.is_rebooting {
            HealthStatus::Rebooting
        } else if self.connection_healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

pub type SharedState = Arc<Mutex<SupervisorState>>;

pub fn new_shared() -> SharedState {
    Arc::new(Mutex::new(SupervisorState::default()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rebooting_outranks_unhealthy_for_status() {
        let mut state = SupervisorState::default();
        state.connection_healthy = false;
        state.is_rebooting = true;
        assert_eq!(state.status(), HealthStatus::Rebooting);
    }

    #[test]
    fn default_state_is_healthy() {
        assert_eq!(SupervisorState::default().status(), HealthStatus::Healthy);
    }
}
