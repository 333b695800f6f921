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
use ii_compute_rpc::{RpcError, RpcErrorKind};
use std::fmt::{self, Debug, Display};

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "bad argument: {}", _0)]
    BadArgument(String),
    #[fail(display = "no device configured or discovered")]
    NoDevice,
    #[fail(display = "all devices degraded")]
    AllDevicesDegraded,
    #[fail(display = "core is rebooting")]
    Rebooting,
    #[fail(display = "device client: {}", _0)]
    DeviceClient(String),
    #[fail(display = "deploy: {}", _0)]
    Deploy(String),
    #[fail(display = "no valid passes")]
    NoValidPasses,
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

    /// Maps to the control plane's `400`/`500`/`503` contract (spec
    /// section 7).
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::BadArgument(_) => 400,
            ErrorKind::NoDevice | ErrorKind::AllDevicesDegraded | ErrorKind::Rebooting => 503,
            ErrorKind::DeviceClient(_) | ErrorKind::Deploy(_) | ErrorKind::NoValidPasses => 500,
        }
    }

    pub fn as_rpc_error(&self) -> RpcError {
        let kind = match self.kind() {
            ErrorKind::BadArgument(_) => RpcErrorKind::BadArgument,
            ErrorKind::NoDevice | ErrorKind::AllDevicesDegraded | ErrorKind::Rebooting => {
                RpcErrorKind::DeviceUnhealthy
            }
            ErrorKind::DeviceClient(_) => RpcErrorKind::Transport,
            ErrorKind::Deploy(_) => RpcErrorKind::Deploy,
            ErrorKind::NoValidPasses => RpcErrorKind::NoValidPasses,
        };
        RpcError::new(kind, self.to_string())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            inner: Context::new(kind),
        }
    }
}

impl From<device_client::Error> for Error {
    fn from(e: device_client::Error) -> Self {
        ErrorKind::DeviceClient(e.to_string()).into()
    }
}

impl From<discovery_deploy::Error> for Error {
    fn from(e: discovery_deploy::Error) -> Self {
        ErrorKind::Deploy(e.to_string()).into()
    }
}

impl From<ensemble::Error> for Error {
    fn from(e: ensemble::Error) -> Self {
        match e.kind() {
            ensemble::ErrorKind::BadArgument(msg) => ErrorKind::BadArgument(msg).into(),
            ensemble::ErrorKind::DeviceClient(msg) => ErrorKind::DeviceClient(msg).into(),
            ensemble::ErrorKind::NoValidPasses => ErrorKind::NoValidPasses.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
