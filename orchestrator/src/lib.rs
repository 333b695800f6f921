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

//! The Orchestrator: wires discovery/deployment (C6), the device client
//! (C5), the supervisor loops (C7) and the ensemble scheduler (C8/C9)
//! behind one HTTP/JSON control plane.

pub mod error;
pub mod http;

pub use error::{Error, ErrorKind, Result};

use core_config::CoreConfig;
use device_client::DeviceClient;
use discovery_deploy::{DeployPlan, Deployer, SshCredential};
use ensemble::{Ensemble, EnsembleScheduler, NetworkWeights};
use supervisor::{HealthStatus, Supervisor};

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the control plane needs to serve one configured installation:
/// a device to talk to (found or deployed at startup), its supervisor
/// loops, and the scheduler that drives inference passes against it.
pub struct Orchestrator {
    device: Arc<DeviceClient>,
    supervisor: Option<Supervisor>,
    scheduler: EnsembleScheduler,
    started_at: Instant,
    halt_tx: ii_halt::Sender,
    deployer: Option<Deployer>,
    device_addr: Option<IpAddr>,
}

/// What `POST /api/v1/infer` returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InferResponse {
    pub prediction: usize,
    pub confidence: f64,
    pub average_confidence: f64,
    pub passes: u32,
    pub valid_passes: u32,
    pub latency_ms: u64,
    pub using_asic: bool,
}

impl From<Ensemble> for InferResponse {
    fn from(ensemble: Ensemble) -> Self {
        Self {
            prediction: ensemble.consensus.prediction,
            confidence: ensemble.consensus.plurality_fraction,
            average_confidence: ensemble.consensus.avg_confidence,
            passes: ensemble.total_passes,
            valid_passes: ensemble.valid_passes,
            latency_ms: ensemble.latency.as_millis() as u64,
            using_asic: true,
        }
    }
}

/// What `GET /api/v1/health` returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chip_count: u8,
    pub uptime_secs: u64,
    pub connection_healthy: bool,
    pub last_health_check_secs_ago: Option<u64>,
}

impl Orchestrator {
    /// Resolves a device per `config` (a fixed `device_ip`, or a discovery
    /// sweep with optional auto-deploy), then starts the supervisor loops
    /// and builds the ensemble scheduler.
    pub async fn new(config: CoreConfig, halt_tx: ii_halt::Sender, halt_rx: ii_halt::Receiver) -> Result<Self> {
        let weights = NetworkWeights::deterministic(config.network_sizes, "orchestrator-default");
        let scheduler = EnsembleScheduler::new(weights, config.passes, config.jitter, config.seed_rotation);

        let credential = SshCredential::root(config.device_password.clone());
        let local_binary_path = std::env::current_exe()
.ok()
.and_then(|p| p.parent().map(|d| d.join("compute-server")))
.unwrap_or_else(|| std::path::PathBuf::from("compute-server"));
        let deployer = Deployer::new(&config, credential.clone(), local_binary_path.clone());

        let (device_addr, port) = Self::resolve_device(&config, &deployer).await?;

        let base_url = reqwest::Url::parse(&format!("http://{}:{}", device_addr, port))
.map_err(|e| ErrorKind::BadArgument(format!("invalid device URL: {}", e)))?;
        let device = Arc::new(DeviceClient::new(base_url, DEFAULT_REQUEST_TIMEOUT));
        let _ = device.connect().await;

        let plan = DeployPlan {
            local_binary_path,
            remote_dir: "/tmp/hasher-host".to_string(),
            remote_log_path: config.server_log_path.clone(),
            port,
            allow_kernel_module_unload: config.allow_kernel_module_unload,
            allow_device_node_creation: config.allow_device_node_creation,
        };

        let supervisor = Supervisor::spawn(
            device.clone(),
            device_addr,
            credential,
            plan,
            std::env::temp_dir().join("hasher-host-reboot-logs"),
            config.monitor_server_logs,
            halt_rx,
        );

        Ok(Self {
            device,
            supervisor: Some(supervisor),
            scheduler,
            started_at: Instant::now(),
            halt_tx,
            deployer: Some(deployer),
            device_addr: Some(device_addr),
        })
    }

    async fn resolve_device(config: &CoreConfig, deployer: &Deployer) -> Result<(IpAddr, u16)> {
        if let Some(addr) = config.device_addr() {
            let port = if config.port == 0 { 8080 } else { config.port };
            return Ok((addr, port));
        }

        if config.discovery_subnet.is_empty() {
            return Err(ErrorKind::BadArgument(
                "neither device_ip nor discovery_subnet is configured".to_string(),
            )
.into());
        }

        if !config.auto_deploy {
            return Err(ErrorKind::BadArgument(
                "discovery_subnet is set but auto_deploy is false; nothing to connect to".to_string(),
            )
.into());
        }

        let devices = deployer.discover_and_deploy(&config.discovery_subnet).await?;
        let device = devices
.into_iter()
.next()
.ok_or_else(|| Error::from(ErrorKind::NoDevice))?;
        Ok((device.addr, device.port))
    }

    pub async fn infer(&self, data: &[u8]) -> Result<InferResponse> {
        self.reject_if_rebooting().await?;
        if data.is_empty() {
            return Err(ErrorKind::BadArgument("input must not be empty".to_string()).into());
        }
        let ensemble = self.scheduler.infer(&self.device, data).await?;
        Ok(ensemble.into())
    }

    pub async fn batch(&self, items: &[Vec<u8>]) -> Result<Vec<InferResponse>> {
        self.reject_if_rebooting().await?;
        let mut responses = Vec::with_capacity(items.len());
        for item in items {
            responses.push(self.infer(item).await?);
        }
        Ok(responses)
    }

    pub async fn health(&self) -> HealthResponse {
        let device_info = self.device.device_info().await.ok();
        let chip_count = device_info.as_ref().map(|i| i.chip_count).unwrap_or(0);

        let (status, connection_healthy, last_check) = match &self.supervisor {
            Some(s) => {
                let state = s.state.lock().await;
                let status = match state.status() {
                    HealthStatus::Healthy => "healthy",
                    HealthStatus::Degraded => "degraded",
                    HealthStatus::Rebooting => "rebooting",
                };
                let last_check_secs = state.last_health_check.map(|t| t.elapsed().as_secs());
                (status, state.connection_healthy, last_check_secs)
            }
            None => ("degraded", false, None),
        };

        HealthResponse {
            status,
            chip_count,
            uptime_secs: self.started_at.elapsed().as_secs(),
            connection_healthy,
            last_health_check_secs_ago: last_check,
        }
    }

    pub async fn device_info(&self) -> Result<ii_compute_rpc::DeviceInfo> {
        Ok(self.device.device_info().await?)
    }

    pub async fn metrics(&self) -> Result<ii_compute_rpc::Metrics> {
        Ok(self.device.metrics().await?)
    }

    /// Answers `503` while the core is `rebooting` rather than queuing work
    /// against a device mid-redeploy.
    async fn reject_if_rebooting(&self) -> Result<()> {
        if let Some(supervisor) = &self.supervisor {
            if supervisor.status().await == HealthStatus::Rebooting {
                return Err(ErrorKind::Rebooting.into());
            }
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        ii_logging::info!("shutdown requested via control plane");
        if let (Some(deployer), Some(addr)) = (&self.deployer, self.device_addr) {
            let _ = deployer.cleanup(addr).await;
        }
        self.halt_tx.do_stop().await;
    }
}
