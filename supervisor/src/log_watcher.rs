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

//! C7's log watcher loop: tails the remote compute-server log over SSH for
//! the `AUTO_REBOOT_TRIGGERED` marker, then drives the reboot-recovery
//! sequence, holding `is_rebooting` for its entire duration so the health
//! monitor skips its own checks.

use crate::error::{ErrorKind, Result};
use crate::state::SharedState;

use device_client::DeviceClient;
use discovery_deploy::{deploy, discovery, DeployPlan, SshCredential};
use openssh::{KnownHosts, Session};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const INTERVAL: Duration = Duration::from_secs(5);
/// Sole contract between a compute server and the log watcher (spec
/// section 6 "Reboot marker").
pub const REBOOT_MARKER: &str = "AUTO_REBOOT_TRIGGERED";

const WAIT_FOR_DOWN_BUDGET: Duration = Duration::from_secs(60);
const WAIT_FOR_DOWN_POLL: Duration = Duration::from_millis(500);
const WAIT_FOR_UP_BUDGET: Duration = Duration::from_secs(120);
const WAIT_FOR_UP_POLL: Duration = Duration::from_secs(5);
const RECONNECT_BUDGET: Duration = Duration::from_secs(60);
const RECONNECT_BACKOFF_START: Duration = Duration::from_millis(500);
const RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(8);

pub struct LogWatcher {
    addr: IpAddr,
    credential: SshCredential,
    plan: DeployPlan,
    local_log_dir: PathBuf,
}

impl LogWatcher {
    pub fn new(addr: IpAddr, credential: SshCredential, plan: DeployPlan, local_log_dir: PathBuf) -> Self {
        Self {
            addr,
            credential,
            plan,
            local_log_dir,
        }
    }

    /// Runs until `halt` fires. Like the health monitor, failures are logged
    /// and do not propagate - a watcher tick that cannot reach the host this
    /// time just tries again on the next tick.
    pub async fn run(&self, device: Arc<DeviceClient>, state: SharedState, mut halt: ii_halt::Receiver) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(INTERVAL) => {}
                _ = halt.wait_for_halt() => return,
            }
            if halt.is_halted() {
                return;
            }
            if let Err(e) = self.tick(&device, &state).await {
                ii_logging::warn!("log watcher tick failed: {}", e);
            }
        }
    }

    async fn tick(&self, device: &DeviceClient, state: &SharedState) -> Result<()> {
        if state.lock().await.is_rebooting {
            return Ok(());
        }

        let tail = self.tail_remote_log().await?;
        if !tail.contains(REBOOT_MARKER) {
            return Ok(());
        }

        {
            let mut guard = state.lock().await;
            if guard.is_rebooting {
                return Ok(());
            }
            guard.is_rebooting = true;
        }

        ii_logging::warn!("{} observed in {} log, starting reboot recovery", REBOOT_MARKER, self.addr);
        let result = self.run_recovery(device).await;

        let mut guard = state.lock().await;
        guard.is_rebooting = false;
        guard.reconnect_attempts = 0;
        drop(guard);

        result
    }

    async fn tail_remote_log(&self) -> Result<String> {
        let destination = format!("ssh://{}@{}", self.credential.username, self.addr);
        let session = Session::connect(&destination, KnownHosts::Accept).await?;
        let output = session
.command("tail")
.arg("-n")
.arg("200")
.arg(&self.plan.remote_log_path)
.output()
.await?;
        let _ = session.close().await;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Waits for the device to drop off the network, come back, archives the
    /// old log, redeploys, and reconnects - run exactly once per marker
    /// sighting (the caller holds `is_rebooting` for the duration).
    async fn run_recovery(&self, device: &DeviceClient) -> Result<()> {
        self.wait_for_down().await;
        self.wait_for_up().await?;
        self.archive_remote_log().await;

        deploy::cleanup(self.addr, &self.credential, &self.plan).await.ok();
        deploy::deploy(self.addr, &self.credential, &self.plan).await?;

        self.reconnect(device).await
    }

    /// Step 1: wait up to 60s for the SSH probe to start failing, i.e. the
    /// host is actually rebooting. A host that never goes down (a false
    /// marker, or a reboot too fast to observe) is not treated as an error -
    /// the redeploy below is a no-op if the server is already back up.
    async fn wait_for_down(&self) {
        let deadline = Instant::now() + WAIT_FOR_DOWN_BUDGET;
        while Instant::now() < deadline {
            if !self.ssh_reachable().await {
                return;
            }
            tokio::time::sleep(WAIT_FOR_DOWN_POLL).await;
        }
    }

    /// Step 2: poll up to 120s at 5s intervals for the host to come back.
    async fn wait_for_up(&self) -> Result<()> {
        let deadline = Instant::now() + WAIT_FOR_UP_BUDGET;
        while Instant::now() < deadline {
            if self.ssh_reachable().await {
                return Ok(());
            }
            tokio::time::sleep(WAIT_FOR_UP_POLL).await;
        }
        Err(ErrorKind::RecoveryTimedOut(format!(
            "{} did not come back over SSH within {:?}",
            self.addr, WAIT_FOR_UP_BUDGET
        ))
.into())
    }

    async fn ssh_reachable(&self) -> bool {
        tokio::time::timeout(
            Duration::from_secs(3),
            tokio::net::TcpStream::connect((self.addr, discovery::SSH_PORT)),
        )
.await
.map(|r| r.is_ok())
.unwrap_or(false)
    }

    /// Step 3: best-effort download of the remote log to a timestamped
    /// local file, so evidence of the reboot survives the re-deploy.
    async fn archive_remote_log(&self) {
        let destination = format!("ssh://{}@{}", self.credential.username, self.addr);
        let session = match Session::connect(&destination, KnownHosts::Accept).await {
            Ok(s) => s,
            Err(_) => return,
        };
        if let Ok(output) = session.command("cat").arg(&self.plan.remote_log_path).output().await {
            let _ = tokio::fs::create_dir_all(&self.local_log_dir).await;
            let path = self
.local_log_dir
.join(format!("{}-reboot.log", self.addr.to_string().replace(':', "_")));
            let _ = tokio::fs::write(path, output.stdout).await;
        }
        let _ = session.close().await;
    }

    /// Step 7: reconnect the Device Client with a 60s budget and per-try
    /// exponential backoff.
    async fn reconnect(&self, device: &DeviceClient) -> Result<()> {
        let deadline = Instant::now() + RECONNECT_BUDGET;
        let mut delay = RECONNECT_BACKOFF_START;
        loop {
            match device.connect().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(ErrorKind::DeviceClient(format!(
                            "could not reconnect within {:?}: {}",
                            RECONNECT_BUDGET, e
                        ))
.into());
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RECONNECT_BACKOFF_CAP);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core_config::CoreConfig;

    fn plan() -> DeployPlan {
        DeployPlan {
            local_binary_path: PathBuf::from("/tmp/compute-server"),
            remote_dir: "/tmp/hasher-host".to_string(),
            remote_log_path: "/tmp/hasher-host/server.log".to_string(),
            port: 8080,
            allow_kernel_module_unload: false,
            allow_device_node_creation: false,
        }
    }

    #[test]
    fn reboot_marker_is_the_exact_literal_from_the_contract() {
        assert_eq!(REBOOT_MARKER, "AUTO_REBOOT_TRIGGERED");
    }

    #[tokio::test]
    async fn ssh_reachable_is_false_for_an_address_nothing_listens_on() {
        let watcher = LogWatcher::new(
            "192.0.2.1".parse().unwrap(),
            SshCredential::root("x"),
            plan(),
            std::env::temp_dir(),
        );
        assert!(!watcher.ssh_reachable().await);
    }

    #[test]
    fn config_default_log_path_matches_plan_default_shape() {
        let config = CoreConfig::default();
        assert!(!config.server_log_path.is_empty());
    }
}
