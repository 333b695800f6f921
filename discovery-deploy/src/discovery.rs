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

//! C6's discovery half: enumerate a CIDR range, probe each host for an open
//! SSH port, then ask the responsive ones what they are.

use crate::error::{Error, ErrorKind, Result};
use crate::SshCredential;

use futures::stream::{self, StreamExt};
use ipnet::IpNet;
use openssh::{KnownHosts, Session};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

pub const SSH_PORT: u16 = 22;
const DEFAULT_CONCURRENCY: usize = 20;

/// What a reachable host told us about itself.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub addr: IpAddr,
    pub hostname: String,
    /// True when the host is running one of the incumbent miner binaries
    /// this crate knows how to displace.
    pub runs_incumbent_miner: bool,
}

/// Enumerates every host address in `cidr` and returns the ones with an open
/// SSH port, probed with bounded concurrency.
pub async fn scan_subnet(cidr: &str, timeout: Duration) -> Result<Vec<IpAddr>> {
    scan_subnet_with_concurrency(cidr, timeout, DEFAULT_CONCURRENCY).await
}

pub async fn scan_subnet_with_concurrency(
    cidr: &str,
    timeout: Duration,
    concurrency: usize,
) -> Result<Vec<IpAddr>> {
    let net: IpNet = cidr
.parse()
.map_err(|_| ErrorKind::BadArgument(format!("invalid CIDR: {}", cidr)))?;

    let hosts: Vec<IpAddr> = net.hosts().collect();

    let reachable = stream::iter(hosts)
.map(|addr| async move {
            let sock = SocketAddr::new(addr, SSH_PORT);
            match tokio::time::timeout(timeout, TcpStream::connect(sock)).await {
                Ok(Ok(_)) => Some(addr),
                _ => None,
            }
        })
.buffer_unordered(concurrency)
.filter_map(|x| async move { x })
.collect::<Vec<_>>()
.await;

    Ok(reachable)
}

/// SSHes into a responsive host and identifies it: hostname, and whether an
/// incumbent miner process is running.
pub async fn identify(addr: IpAddr, credential: &SshCredential) -> Result<HostIdentity> {
    let session = connect(addr, credential).await?;

    let hostname_out = session.command("hostname").output().await?;
    let hostname = String::from_utf8_lossy(&hostname_out.stdout).trim().to_string();

    let ps_out = session.command("ps").arg("-ef").output().await?;
    let ps_text = String::from_utf8_lossy(&ps_out.stdout);
    let runs_incumbent_miner = crate::deploy::INCUMBENT_MINER_NAMES
.iter()
.any(|name| ps_text.contains(name));

    session.close().await.map_err(|(e, _)| Error::from(e))?;

    Ok(HostIdentity {
        addr,
        hostname,
        runs_incumbent_miner,
    })
}

pub(crate) async fn connect(addr: IpAddr, credential: &SshCredential) -> Result<Session> {
    let destination = format!("ssh://{}@{}", credential.username, addr);
    Session::connect(&destination, KnownHosts::Accept)
.await
.map_err(Error::from)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_cidr() {
        let err = scan_subnet("not-a-cidr", Duration::from_millis(50))
.await
.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }

    #[tokio::test]
    async fn single_host_cidr_with_nothing_listening_finds_no_hosts() {
        // 192.0.2.1/32 is documentation space (RFC 5737) - guaranteed
        // unreachable. ipnet's `hosts()` includes the single address for a
        // /32 (no network/broadcast exclusion at that prefix length), so
        // this probes exactly one host, times out, and comes back with an
        // empty - not erroring - result.
        let found = scan_subnet("192.0.2.1/32", Duration::from_millis(50))
.await
.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn unreachable_small_subnet_returns_empty_not_error() {
        let found = scan_subnet_with_concurrency("192.0.2.0/30", Duration::from_millis(50), 4)
.await
.unwrap();
        assert!(found.is_empty());
    }
}
