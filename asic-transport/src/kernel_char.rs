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

//! A well-known character device node. Reads
//! carry a best-effort deadline via `timeout-readwrite` - some char drivers
//! don't honor `O_NONBLOCK`/`select` the way a socket would, so a deadline
//! miss is logged and treated as "nothing arrived yet", not a hard error.

use crate::{Transport, TransportError, TransportErrorKind, TransportKind};

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::time::Duration;
use timeout_readwrite::TimeoutReader;

pub struct KernelCharTransport {
    write_file: File,
    read_file: File,
}

impl KernelCharTransport {
    pub fn open(path: &str) -> Result<Self, TransportError> {
        let write_file = OpenOptions::new().write(true).open(path)?;
        let read_file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            write_file,
            read_file,
        })
    }
}

#[async_trait]
impl Transport for KernelCharTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.write_file.write_all(frame)?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError> {
        let cloned = self.read_file.try_clone()?;
        let mut reader = TimeoutReader::new(cloned, deadline);
        match reader.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                ii_logging::warn!(
                    "kernel char device: deadline of {:?} elapsed without data (char devices may not honor timeouts)",
                    deadline
                );
                Err(TransportError::new(TransportErrorKind::TimedOut, "recv deadline elapsed"))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::KernelCharDevice
    }
}
