// Copyright (C) 2019  Braiins Systems s.r.o.
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

//! Thin wrapper around `slog` that gives every crate in the workspace a
//! single process-wide logger, reachable through `ii_logging::macros::*`
//! without threading a `Logger` handle through every function signature.
//!
//! Drain stack: terminal output, wrapped by `slog-envlogger` (so `RUST_LOG`
//! filters apply the same way it would for a `log`-based crate), wrapped by
//! `slog-async` so logging never blocks the caller on I/O.

use lazy_static::lazy_static;
use slog::Drain;

pub use slog;

lazy_static! {
    pub static ref ROOT_LOGGER: slog::Logger = build_root_logger();
}

fn build_root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let term_drain = slog_term::FullFormat::new(decorator).build().fuse();
    let filtered = slog_envlogger::new(term_drain);
    let async_drain = slog_async::Async::new(filtered).build().fuse();
    slog::Logger::root(async_drain, slog::o!())
}

/// Re-exports the five severity macros bound to `ROOT_LOGGER`, mirroring the
/// ergonomics of the `log` crate's free-function macros while keeping the
/// structured-logging capabilities of `slog`.
pub mod macros {
    #[macro_export]
    macro_rules! trace {
        ($($args:tt)+) => {
            $crate::slog::trace!($crate::ROOT_LOGGER, $($args)+)
        };
    }

    #[macro_export]
    macro_rules! debug {
        ($($args:tt)+) => {
            $crate::slog::debug!($crate::ROOT_LOGGER, $($args)+)
        };
    }

    #[macro_export]
    macro_rules! info {
        ($($args:tt)+) => {
            $crate::slog::info!($crate::ROOT_LOGGER, $($args)+)
        };
    }

    #[macro_export]
    macro_rules! warn {
        ($($args:tt)+) => {
            $crate::slog::warn!($crate::ROOT_LOGGER, $($args)+)
        };
    }

    #[macro_export]
    macro_rules! error {
        ($($args:tt)+) => {
            $crate::slog::error!($crate::ROOT_LOGGER, $($args)+)
        };
    }

    pub use crate::{debug, error, info, trace, warn};
}
