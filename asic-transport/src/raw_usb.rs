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

//! Direct endpoint I/O against the ASIC's USB interface. Detaches any kernel driver before claiming the interface so a
//! stock HID/CDC driver binding the device doesn't fight us for it.

use crate::{Transport, TransportError, TransportErrorKind, TransportKind};
use crate::{USB_ENDPOINT_IN, USB_ENDPOINT_OUT};

use async_trait::async_trait;
use std::time::Duration;

const USB_INTERFACE: u8 = 0;

pub struct RawUsbTransport {
    handle: rusb::DeviceHandle<rusb::GlobalContext>,
    detached_kernel_driver: bool,
}

impl RawUsbTransport {
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, TransportError> {
        let mut handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Unreachable,
                format!("no USB device {:04x}:{:04x} found", vendor_id, product_id),
            )
        })?;

        let mut detached_kernel_driver = false;
        if handle.kernel_driver_active(USB_INTERFACE).unwrap_or(false) {
            handle.detach_kernel_driver(USB_INTERFACE)?;
            detached_kernel_driver = true;
        }
        handle.claim_interface(USB_INTERFACE)?;

        Ok(Self {
            handle,
            detached_kernel_driver,
        })
    }
}

#[async_trait]
impl Transport for RawUsbTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.handle
.write_bulk(USB_ENDPOINT_OUT, frame, Duration::from_secs(1))?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError> {
        let n = self.handle.read_bulk(USB_ENDPOINT_IN, buf, deadline)?;
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.handle.release_interface(USB_INTERFACE).ok();
        if self.detached_kernel_driver {
            // best-effort: reattach so the host's stock driver can reclaim the device
            self.handle.attach_kernel_driver(USB_INTERFACE).ok();
        }
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::RawUsb
    }
}
