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

/// The subset of the system-wide error taxonomy a Device
/// Controller can itself raise.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "bad argument: {}", _0)]
    BadArgument(String),
    #[fail(display = "parse: {}", _0)]
    Parse(String),
    #[fail(display = "transport: {}", _0)]
    Transport(String),
    #[fail(display = "device unhealthy: {}", _0)]
    DeviceUnhealthy(String),
    #[fail(display = "cancelled")]
    Cancelled,
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

impl From<ii_wire::ParseErrorKind> for Error {
    fn from(e: ii_wire::ParseErrorKind) -> Self {
        ErrorKind::Parse(e.to_string()).into()
    }
}

impl From<asic_transport::TransportError> for Error {
    fn from(e: asic_transport::TransportError) -> Self {
        ErrorKind::Transport(e.to_string()).into()
    }
}

impl From<ii_compute_rpc::RpcError> for Error {
    fn from(e: ii_compute_rpc::RpcError) -> Self {
        use ii_compute_rpc::RpcErrorKind as K;
        match e.kind {
            K::BadArgument | K::QuotaOrResource => ErrorKind::BadArgument(e.message).into(),
            K::Parse => ErrorKind::Parse(e.message).into(),
            K::Transport | K::Deploy => ErrorKind::Transport(e.message).into(),
            K::DeviceUnhealthy | K::NoValidPasses => ErrorKind::DeviceUnhealthy(e.message).into(),
            K::Cancelled => ErrorKind::Cancelled.into(),
        }
    }
}

impl From<Error> for ii_compute_rpc::RpcError {
    fn from(e: Error) -> Self {
        use ii_compute_rpc::RpcErrorKind as K;
        let message = e.to_string();
        let kind = match e.kind() {
            ErrorKind::BadArgument(_) => K::BadArgument,
            ErrorKind::Parse(_) => K::Parse,
            ErrorKind::Transport(_) => K::Transport,
            ErrorKind::DeviceUnhealthy(_) => K::DeviceUnhealthy,
            ErrorKind::Cancelled => K::Cancelled,
        };
        ii_compute_rpc::RpcError::new(kind, message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
