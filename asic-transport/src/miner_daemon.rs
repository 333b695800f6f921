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

//! A co-resident miner daemon's JSON API, connected over TCP. This is a
//! compatibility shim for devices that can't be driven directly: our wire
//! frames are tunneled as base64 inside the daemon's null-terminated JSON
//! command protocol, so the rest of the system is unaware it's talking to
//! a shim rather than hardware.

use crate::{Transport, TransportError, TransportErrorKind, TransportKind};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Generous cap on a single JSON message; the daemon null-terminates rather
/// than length-prefixes, so we read byte-by-byte up to this bound.
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

pub struct MinerDaemonTransport {
    stream: TcpStream,
}

impl MinerDaemonTransport {
    /// Connects and issues a `version` probe; only returns `Ok` if the peer
    /// answers within `VERSION_PROBE_TIMEOUT`, confirming it is in fact a
    /// miner daemon and not some unrelated service on the port.
    pub async fn open(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(VERSION_PROBE_TIMEOUT, TcpStream::connect(addr))
.await
.map_err(|_| TransportError::new(TransportErrorKind::TimedOut, "connect timed out"))??;
        let mut transport = Self { stream };
        transport
.send_command(json!({"command": "version"}), VERSION_PROBE_TIMEOUT)
.await?;
        Ok(transport)
    }

    async fn send_command(&mut self, command: Value, deadline: Duration) -> Result<Value, TransportError> {
        let mut bytes = serde_json::to_vec(&command)
.map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        bytes.push(0);
        tokio::time::timeout(deadline, self.stream.write_all(&bytes))
.await
.map_err(|_| TransportError::new(TransportErrorKind::TimedOut, "write timed out"))??;

        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if buf.len() >= MAX_MESSAGE_BYTES {
                return Err(TransportError::new(
                    TransportErrorKind::Io,
                    "daemon response exceeded maximum message size",
                ));
            }
            let n = tokio::time::timeout(deadline, self.stream.read(&mut byte))
.await
.map_err(|_| TransportError::new(TransportErrorKind::TimedOut, "read timed out"))??;
            if n == 0 {
                return Err(TransportError::new(TransportErrorKind::Closed, "daemon closed connection"));
            }
            if byte[0] == 0 {
                break;
            }
            buf.push(byte[0]);
        }
        serde_json::from_slice(&buf).map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))
    }
}

#[async_trait]
impl Transport for MinerDaemonTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, frame);
        self.send_command(json!({"command": "asic_frame", "parameter": encoded}), Duration::from_secs(2))
.await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError> {
        let response = self
.send_command(json!({"command": "asic_poll"}), deadline)
.await?;
        let encoded = response
.get("frame")
.and_then(Value::as_str)
.ok_or_else(|| TransportError::new(TransportErrorKind::Io, "daemon response missing 'frame'"))?;
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
.map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        if decoded.len() > buf.len() {
            return Err(TransportError::new(TransportErrorKind::Io, "daemon frame larger than read buffer"));
        }
        buf[..decoded.len()].copy_from_slice(&decoded);
        Ok(decoded.len())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await.ok();
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::MinerDaemonRpc
    }
}
