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

//! C6's deployment half: displace whatever the host is already running,
//! push the compute server binary over SFTP, launch it detached, and
//! confirm it bound its port.

use crate::discovery;
use crate::error::{ErrorKind, Result};
use crate::SshCredential;

use md5::{Digest, Md5};
use openssh::Session;
use openssh_sftp_client::file::TokioCompatFile;
use openssh_sftp_client::{Sftp, SftpOptions};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Process names this crate knows to evict before claiming a host.
pub const INCUMBENT_MINER_NAMES: &[&str] = &["cgminer", "bmminer", "single-board-miner"];

const REMOTE_BIN_NAME: &str = "compute-server";
const KILL_GRACE: Duration = Duration::from_secs(2);
const PORT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PORT_POLL_ATTEMPTS: u32 = 40;

/// A compute server this crate put on a host, ready for `device-client` to
/// talk to.
#[derive(Debug, Clone)]
pub struct DeployedServer {
    pub addr: IpAddr,
    pub port: u16,
    pub remote_path: String,
}

/// Deployment policy: where the local binary lives, where it lands on the
/// remote host, and which hazardous steps are opted in.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub local_binary_path: std::path::PathBuf,
    pub remote_dir: String,
    pub remote_log_path: String,
    pub port: u16,
    pub allow_kernel_module_unload: bool,
    pub allow_device_node_creation: bool,
}

impl DeployPlan {
    fn remote_bin_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), REMOTE_BIN_NAME)
    }
}

/// Deploys `plan`'s binary onto `addr`, returning a handle once the server
/// has bound its port. On any failure after the incumbent has been killed,
/// runs `cleanup` before returning the error, so a failed deploy never
/// leaves a host worse off than it found it.
pub async fn deploy(addr: IpAddr, credential: &SshCredential, plan: &DeployPlan) -> Result<DeployedServer> {
    let session = discovery::connect(addr, credential).await?;

    let result = deploy_on_session(&session, addr, credential, plan).await;
    if result.is_err() {
        let _ = cleanup_on_session(&session, plan).await;
    }
    let _ = session.close().await;
    result
}

async fn deploy_on_session(
    session: &Session,
    addr: IpAddr,
    credential: &SshCredential,
    plan: &DeployPlan,
) -> Result<DeployedServer> {
    kill_incumbent(session).await?;

    if plan.allow_kernel_module_unload {
        unload_kernel_module(session).await;
    }
    if plan.allow_device_node_creation {
        create_device_nodes(session).await;
    }

    let remote_path = plan.remote_bin_path();
    // SFTP needs to own its session's subsystem channel, so the upload runs
    // over a second multiplexed connection (cheap: openssh reuses the first
    // session's control socket) while `session` stays free for shell
    // commands either side of it.
    upload_binary(addr, credential, &plan.local_binary_path, &remote_path).await?;
    verify_digest(session, &plan.local_binary_path, &remote_path).await?;
    launch(session, &remote_path, &plan.remote_log_path, plan.port).await?;
    poll_for_bind(addr, plan.port).await?;

    Ok(DeployedServer {
        addr,
        port: plan.port,
        remote_path,
    })
}

/// SIGTERM every incumbent miner process, wait out a grace period, then
/// SIGKILL whatever is still alive.
async fn kill_incumbent(session: &Session) -> Result<()> {
    for name in INCUMBENT_MINER_NAMES {
        let _ = session.command("pkill").arg("-TERM").arg("-f").arg(name).status().await;
    }
    tokio::time::sleep(KILL_GRACE).await;
    for name in INCUMBENT_MINER_NAMES {
        let _ = session.command("pkill").arg("-KILL").arg("-f").arg(name).status().await;
    }
    Ok(())
}

/// Best-effort: a module that is not loaded, or a unmount that fails because
/// nothing is using the device, is not a deployment failure.
async fn unload_kernel_module(session: &Session) {
    let _ = session
.command("rmmod")
.arg("bitmain_soc")
.status()
.await;
}

async fn create_device_nodes(session: &Session) {
    let _ = session
.command("mknod")
.arg("-m")
.arg("666")
.arg("/dev/axi_fpga")
.arg("c")
.arg("241")
.arg("0")
.status()
.await;
}

/// Uploads `local_path` to `remote_path` over SFTP, on a fresh session of
/// its own.
async fn upload_binary(
    addr: IpAddr,
    credential: &SshCredential,
    local_path: &Path,
    remote_path: &str,
) -> Result<()> {
    let data = tokio::fs::read(local_path).await?;
    let sftp_session = discovery::connect(addr, credential).await?;
    let sftp = Sftp::from_session(sftp_session, SftpOptions::default())
.await
.map_err(|e| ErrorKind::Deploy(format!("sftp session: {}", e)))?;

    {
        let mut fs = sftp.fs();
        let remote_file = fs
.create(remote_path)
.await
.map_err(|e| ErrorKind::Deploy(format!("sftp create {}: {}", remote_path, e)))?;
        let mut remote_file = TokioCompatFile::new(remote_file);
        remote_file.write_all(&data).await?;
        remote_file.shutdown().await?;
    }
    sftp.close()
.await
.map_err(|e| ErrorKind::Deploy(format!("sftp close: {}", e)))?;
    Ok(())
}

/// Verifies the upload by comparing local and remote MD5 digests, then
/// marks the remote binary executable.
async fn verify_digest(session: &Session, local_path: &Path, remote_path: &str) -> Result<()> {
    let data = tokio::fs::read(local_path).await?;
    let local_digest_hex = hex::encode(Md5::digest(&data));

    session
.command("chmod")
.arg("+x")
.arg(remote_path)
.status()
.await?;

    let digest_out = session.command("md5sum").arg(remote_path).output().await?;
    let remote_digest_hex = String::from_utf8_lossy(&digest_out.stdout)
.split_whitespace()
.next()
.unwrap_or_default()
.to_string();

    if remote_digest_hex != local_digest_hex {
        return Err(ErrorKind::Deploy(format!(
            "digest mismatch uploading {}: local {} remote {}",
            remote_path, local_digest_hex, remote_digest_hex
        ))
.into());
    }
    Ok(())
}

/// Launches the uploaded binary detached from the SSH session, redirecting
/// its output to `log_path`.
async fn launch(session: &Session, remote_path: &str, log_path: &str, port: u16) -> Result<()> {
    let command = format!(
        "nohup {} --port {} > {} 2>&1 < /dev/null &",
        remote_path, port, log_path
    );
    session.command("sh").arg("-c").arg(command).status().await?;
    Ok(())
}

/// Polls the host's port until it accepts a connection or the attempt
/// budget is exhausted.
async fn poll_for_bind(addr: IpAddr, port: u16) -> Result<()> {
    let sock = std::net::SocketAddr::new(addr, port);
    for _ in 0..PORT_POLL_ATTEMPTS {
        if TcpStream::connect(sock).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(PORT_POLL_INTERVAL).await;
    }
    Err(ErrorKind::Deploy(format!(
        "{} never bound port {} within {:?}",
        addr,
        port,
        PORT_POLL_INTERVAL * PORT_POLL_ATTEMPTS
    ))
.into())
}

/// Stops a deployed server and removes the uploaded binary and log file,
/// returning the host to roughly its pre-deploy state.
pub async fn cleanup(addr: IpAddr, credential: &SshCredential, plan: &DeployPlan) -> Result<()> {
    let session = discovery::connect(addr, credential).await?;
    let result = cleanup_on_session(&session, plan).await;
    let _ = session.close().await;
    result
}

async fn cleanup_on_session(session: &Session, plan: &DeployPlan) -> Result<()> {
    let remote_path = plan.remote_bin_path();
    let _ = session
.command("pkill")
.arg("-TERM")
.arg("-f")
.arg(&remote_path)
.status()
.await;
    tokio::time::sleep(KILL_GRACE).await;
    let _ = session
.command("pkill")
.arg("-KILL")
.arg("-f")
.arg(&remote_path)
.status()
.await;
    let _ = session.command("rm").arg("-f").arg(&remote_path).status().await;
    let _ = session
.command("rm")
.arg("-f")
.arg(&plan.remote_log_path)
.status()
.await;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn remote_bin_path_joins_dir_and_name() {
        let plan = DeployPlan {
            local_binary_path: std::path::PathBuf::from("/tmp/compute-server"),
            remote_dir: "/tmp/hasher/".to_string(),
            remote_log_path: "/tmp/hasher/server.log".to_string(),
            port: 8080,
            allow_kernel_module_unload: false,
            allow_device_node_creation: false,
        };
        assert_eq!(plan.remote_bin_path(), "/tmp/hasher/compute-server");
    }
}
