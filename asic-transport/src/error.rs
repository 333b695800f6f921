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

use failure::Fail;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Fail)]
pub enum TransportErrorKind {
    #[fail(display = "timed out")]
    TimedOut,
    #[fail(display = "no backend was reachable")]
    Unreachable,
    #[fail(display = "I/O error")]
    Io,
    #[fail(display = "USB error")]
    Usb,
    #[fail(display = "closed")]
    Closed,
}

#[derive(Debug, Fail)]
#[fail(display = "{}: {}", kind, message)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        let kind = if e.kind() == std::io::ErrorKind::TimedOut {
            TransportErrorKind::TimedOut
        } else {
            TransportErrorKind::Io
        };
        Self::new(kind, e.to_string())
    }
}

impl From<rusb::Error> for TransportError {
    fn from(e: rusb::Error) -> Self {
        let kind = if e == rusb::Error::Timeout {
            TransportErrorKind::TimedOut
        } else {
            TransportErrorKind::Usb
        };
        Self::new(kind, e.to_string())
    }
}
