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

use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Debug, Display};

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "deploy: {}", _0)]
    Deploy(String),
    #[fail(display = "device client: {}", _0)]
    DeviceClient(String),
    #[fail(display = "reboot recovery timed out: {}", _0)]
    RecoveryTimedOut(String),
}

pub struct Error {
    inner: Context<ErrorKind>,
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.inner.get_context().clone()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            inner: Context::new(kind),
        }
    }
}

impl From<discovery_deploy::Error> for Error {
    fn from(e: discovery_deploy::Error) -> Self {
        ErrorKind::Deploy(e.to_string()).into()
    }
}

impl From<device_client::Error> for Error {
    fn from(e: device_client::Error) -> Self {
        ErrorKind::DeviceClient(e.to_string()).into()
    }
}

impl From<openssh::Error> for Error {
    fn from(e: openssh::Error) -> Self {
        ErrorKind::Deploy(e.to_string()).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Deploy(e.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
