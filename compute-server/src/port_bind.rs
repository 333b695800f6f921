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

//! Binds the control-plane listener. `port == 0` means auto-bind somewhere in
//! `8080..=9090`; any other value is a hard requirement.

use failure::Fail;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const AUTO_BIND_RANGE: std::ops::RangeInclusive<u16> = 8080..=9090;

#[derive(Debug, Fail)]
pub enum BindError {
    #[fail(display = "no free port in {}..={} to auto-bind", _0, _1)]
    RangeExhausted(u16, u16),
    #[fail(display = "failed to bind {}: {}", _0, _1)]
    Fixed(u16, std::io::Error),
}

pub async fn bind(preferred_port: u16) -> Result<TcpListener, BindError> {
    if preferred_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        return TcpListener::bind(addr)
.await
.map_err(|e| BindError::Fixed(preferred_port, e));
    }

    for port in AUTO_BIND_RANGE {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        if let Ok(listener) = TcpListener::bind(addr).await {
            return Ok(listener);
        }
    }
    Err(BindError::RangeExhausted(
        *AUTO_BIND_RANGE.start(),
        *AUTO_BIND_RANGE.end(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn binding_port_zero_auto_selects_within_range() {
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(AUTO_BIND_RANGE.contains(&port));
    }

    #[tokio::test]
    async fn binding_an_occupied_fixed_port_fails_without_retry() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = held.local_addr().unwrap().port();
        let err = bind(port).await.unwrap_err();
        assert!(matches!(err, BindError::Fixed(p, _) if p == port));
    }
}
