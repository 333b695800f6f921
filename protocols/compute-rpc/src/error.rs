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

//! The sum-of-errors type used across the whole system.
//! Carried over the wire as JSON so a `device-client` surfacing a `Transport`
//! error never gets confused with, say, a `BadArgument` it could retry past.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcErrorKind {
    BadArgument,
    Parse,
    Transport,
    DeviceUnhealthy,
    Deploy,
    QuotaOrResource,
    Cancelled,
    NoValidPasses,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub kind: RpcErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::BadArgument, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::Transport, message)
    }

    pub fn device_unhealthy(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::DeviceUnhealthy, message)
    }

    pub fn cancelled() -> Self {
        Self::new(RpcErrorKind::Cancelled, "operation cancelled")
    }

    /// HTTP status the orchestrator's control plane should answer with:
    /// `400` bad input, `500` internal, `503` unhealthy.
    pub fn http_status(&self) -> u16 {
        match self.kind {
            RpcErrorKind::BadArgument | RpcErrorKind::QuotaOrResource => 400,
            RpcErrorKind::DeviceUnhealthy => 503,
            RpcErrorKind::Cancelled => 499,
            RpcErrorKind::Transport
            | RpcErrorKind::Parse
            | RpcErrorKind::Deploy
            | RpcErrorKind::NoValidPasses => 500,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RpcError {}
