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

//! C7: the Orchestrator's two background loops, a health monitor and a log
//! watcher, spawned per Device the Orchestrator deployed or connected to
//!. Both read/write one shared, mutex-guarded
//! `SupervisorState`; `Supervisor` is just their join point.

pub mod error;
pub mod health_monitor;
pub mod log_watcher;
pub mod state;

pub use error::{Error, ErrorKind, Result};
pub use log_watcher::LogWatcher;
pub use state::{HealthStatus, SharedState, SupervisorState};

use device_client::DeviceClient;
use discovery_deploy::{DeployPlan, SshCredential};

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Owns the shared state and spawns the two loops for one Device. Dropping
/// this (or signaling `halt`) is the only way to stop them - they carry no
/// other lifecycle of their own.
pub struct Supervisor {
    pub state: SharedState,
}

impl Supervisor {
    /// Spawns the health monitor and, if `monitor_server_logs` is set, the
    /// log watcher, both racing against `halt`.
    pub fn spawn(
        device: Arc<DeviceClient>,
        addr: IpAddr,
        credential: SshCredential,
        plan: DeployPlan,
        local_log_dir: PathBuf,
        monitor_server_logs: bool,
        halt: ii_halt::Receiver,
    ) -> Self {
        let state = state::new_shared();

        {
            let device = device.clone();
            let state = state.clone();
            let halt = halt.clone();
            tokio::spawn(async move {
                health_monitor::run(device, state, halt).await;
            });
        }

        if monitor_server_logs {
            let device = device.clone();
            let state = state.clone();
            let watcher = LogWatcher::new(addr, credential, plan, local_log_dir);
            tokio::spawn(async move {
                watcher.run(device, state, halt).await;
            });
        }

        Self { state }
    }

    pub async fn status(&self) -> HealthStatus {
        self.state.lock().await.status()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_starts_healthy() {
        let (_tx, rx) = ii_halt::make_pair();
        let device = Arc::new(DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_millis(20),
        ));
        let supervisor = Supervisor::spawn(
            device,
            "192.0.2.1".parse().unwrap(),
            SshCredential::root("x"),
            DeployPlan {
                local_binary_path: PathBuf::from("/tmp/compute-server"),
                remote_dir: "/tmp/hasher-host".to_string(),
                remote_log_path: "/tmp/hasher-host/server.log".to_string(),
                port: 8080,
                allow_kernel_module_unload: false,
                allow_device_node_creation: false,
            },
            std::env::temp_dir(),
            false,
            rx,
        );
        assert_eq!(supervisor.status().await, HealthStatus::Healthy);
        _tx.do_stop().await;
    }
}
