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

//! C6: turns a CIDR range and a set of SSH credentials into a list of hosts
//! running the compute server, discovering ones that already run it and
//! deploying onto the rest.

pub mod deploy;
pub mod discovery;
pub mod error;

pub use deploy::{DeployPlan, DeployedServer};
pub use discovery::HostIdentity;
pub use error::{Error, ErrorKind, Result};

use core_config::CoreConfig;
use std::net::IpAddr;
use std::time::Duration;

/// SSH login used to reach every host in a sweep. The source hardcodes one
/// account (`root`) and a single shared password across a whole rack; this
/// keeps that assumption but names it explicitly instead of leaving it
/// implicit in a connection string.
#[derive(Debug, Clone)]
pub struct SshCredential {
    pub username: String,
    pub password: String,
}

impl SshCredential {
    pub fn root(password: impl Into<String>) -> Self {
        Self {
            username: "root".to_string(),
            password: password.into(),
        }
    }
}

/// How a `Device` entered the orchestrator's view of the world: found
/// already running, or brought up by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// Found already serving the compute RPC surface; nothing to deploy.
    AlreadyRunning,
    /// This crate killed an incumbent miner and pushed the binary itself.
    Deployed,
}

/// One host this crate has either found running a compute server or put
/// one onto. The orchestrator turns this into a `DeviceClient` to talk to
/// it.
#[derive(Debug, Clone)]
pub struct Device {
    pub addr: IpAddr,
    pub port: u16,
    pub discovered_via: DiscoveryMethod,
}

/// Ties discovery and deployment together behind the policy in
/// `CoreConfig`: which subnet to sweep, which hazardous steps are allowed,
/// and where the compute server binary lives locally.
pub struct Deployer {
    credential: SshCredential,
    plan: DeployPlan,
    discovery_timeout: Duration,
    force_redeploy: bool,
}

impl Deployer {
    pub fn new(config: &CoreConfig, credential: SshCredential, local_binary_path: std::path::PathBuf) -> Self {
        let port = if config.port == 0 { 8080 } else { config.port };
        Self {
            credential,
            plan: DeployPlan {
                local_binary_path,
                remote_dir: "/tmp/hasher-host".to_string(),
                remote_log_path: config.server_log_path.clone(),
                port,
                allow_kernel_module_unload: config.allow_kernel_module_unload,
                allow_device_node_creation: config.allow_device_node_creation,
            },
            discovery_timeout: Duration::from_millis(config.discovery_timeout_ms),
            force_redeploy: config.force_redeploy,
        }
    }

    /// Sweeps `cidr`, and for every responsive host either confirms an
    /// already-running compute server or deploys one.
    /// A host whose identification or deployment fails is logged and
    /// skipped rather than aborting the whole sweep.
    pub async fn discover_and_deploy(&self, cidr: &str) -> Result<Vec<Device>> {
        let candidates = discovery::scan_subnet(cidr, self.discovery_timeout).await?;
        ii_logging::info!("discovery found {} responsive host(s) in {}", candidates.len(), cidr);

        let mut devices = Vec::new();
        for addr in candidates {
            match self.bring_up(addr).await {
                Ok(device) => devices.push(device),
                Err(e) => ii_logging::warn!("skipping {}: {}", addr, e),
            }
        }
        Ok(devices)
    }

    async fn bring_up(&self, addr: IpAddr) -> Result<Device> {
        if !self.force_redeploy {
            if let Ok(identity) = discovery::identify(addr, &self.credential).await {
                if !identity.runs_incumbent_miner && port_already_serving(addr, self.plan.port).await {
                    return Ok(Device {
                        addr,
                        port: self.plan.port,
                        discovered_via: DiscoveryMethod::AlreadyRunning,
                    });
                }
            }
        }

        let deployed = deploy::deploy(addr, &self.credential, &self.plan).await?;
        Ok(Device {
            addr: deployed.addr,
            port: deployed.port,
            discovered_via: DiscoveryMethod::Deployed,
        })
    }

    pub async fn cleanup(&self, addr: IpAddr) -> Result<()> {
        deploy::cleanup(addr, &self.credential, &self.plan).await
    }
}

async fn port_already_serving(addr: IpAddr, port: u16) -> bool {
    tokio::net::TcpStream::connect((addr, port)).await.is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_credential_uses_root_username() {
        let cred = SshCredential::root("hunter2");
        assert_eq!(cred.username, "root");
        assert_eq!(cred.password, "hunter2");
    }

    #[tokio::test]
    async fn discover_and_deploy_rejects_bad_cidr() {
        let config = CoreConfig::default();
        let deployer = Deployer::new(
            &config,
            SshCredential::root("x"),
            std::path::PathBuf::from("/tmp/compute-server"),
        );
        let err = deployer.discover_and_deploy("not-a-cidr").await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }
}
