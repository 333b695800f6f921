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

//! C2: delivers a framed packet (built by `ii-wire`) to an ASIC and reads a
//! response back. Three capability-probed backends implement the same
//! `Transport` trait; which one gets used is a constructor-time decision,
//! never a runtime branch.

pub mod error;
pub mod kernel_char;
pub mod miner_daemon;
pub mod mock;
pub mod raw_usb;

pub use error::{TransportError, TransportErrorKind};

use async_trait::async_trait;
use std::time::Duration;

/// USB vendor:product ID this system's ASICs present.
pub const USB_VENDOR_ID: u16 = 0x4254;
pub const USB_PRODUCT_ID: u16 = 0x4153;
pub const USB_ENDPOINT_OUT: u8 = 0x01;
pub const USB_ENDPOINT_IN: u8 = 0x81;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    RawUsb,
    KernelCharDevice,
    MinerDaemonRpc,
}

/// `send`/`recv` on a single ASIC. Implementors are not expected to be
/// internally synchronized - the Device Controller (C3) serializes all
/// access with its own mutex.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Reads one frame into `buf`, honoring `deadline` when the backend
    /// supports it. Returns the number of bytes read.
    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn kind(&self) -> TransportKind;
}

/// Where to reach a device when opening a transport.
#[derive(Debug, Clone)]
pub struct OpenTarget {
    /// TCP host:port of a co-resident miner daemon, if any.
    pub daemon_addr: Option<std::net::SocketAddr>,
    /// Kernel character device node, if any (e.g. `/dev/bmasic0`).
    pub char_device_path: Option<String>,
    /// Probe raw USB if neither of the above is available/responsive.
    pub try_raw_usb: bool,
}

/// Selects a transport by probing, in order: miner-daemon-rpc (if the port
/// answers a `version` probe), then kernel char device (if the node exists),
/// then raw USB. Failure of a probed backend releases its
/// resources before falling through to the next.
pub async fn open(target: &OpenTarget) -> Result<Box<dyn Transport>, TransportError> {
    if let Some(addr) = target.daemon_addr {
        match miner_daemon::MinerDaemonTransport::open(addr).await {
            Ok(t) => return Ok(Box::new(t)),
            Err(e) => {
                ii_logging::warn!("miner-daemon-rpc probe at {} failed: {}", addr, e);
            }
        }
    }

    if let Some(path) = &target.char_device_path {
        if std::path::Path::new(path).exists() {
            match kernel_char::KernelCharTransport::open(path) {
                Ok(t) => return Ok(Box::new(t)),
                Err(e) => {
                    ii_logging::warn!("kernel char device {} failed to open: {}", path, e);
                }
            }
        }
    }

    if target.try_raw_usb {
        let t = raw_usb::RawUsbTransport::open(USB_VENDOR_ID, USB_PRODUCT_ID)?;
        return Ok(Box::new(t));
    }

    Err(TransportError::new(
        TransportErrorKind::Unreachable,
        "no transport backend was reachable",
    ))
}
