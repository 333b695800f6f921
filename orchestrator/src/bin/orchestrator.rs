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

//! The orchestrator binary: loads `CoreConfig`, resolves a device (direct
//! IP or discovery/auto-deploy), and serves the HTTP/JSON control plane
//!.

use clap::Parser;
use core_config::{Cli, CoreConfig};
use orchestrator::http::{router, AppState};

/// Not specified by the control-plane contract; the compute-server's
/// port-file convention only covers the per-device RPC port. Overridable
/// via `--control-port` until an installation needs something else.
const DEFAULT_CONTROL_PORT: u16 = 9100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _logger = ii_logging::ROOT_LOGGER.clone();
    let cli = Cli::parse();

    let config = CoreConfig::from_toml_file(&cli.config).unwrap_or_else(|e| {
        ii_logging::warn!("could not load {}: {}, falling back to defaults", cli.config, e);
        CoreConfig::default()
    });
    let config = cli.apply(config);
    config.validate()?;

    let (halt_tx, halt_rx) = ii_halt::make_pair();
    let orchestrator = std::sync::Arc::new(orchestrator::Orchestrator::new(config, halt_tx.clone(), halt_rx.clone()).await?);

    let app = router(AppState {
        orchestrator: orchestrator.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", DEFAULT_CONTROL_PORT)).await?;
    ii_logging::info!("control plane listening on port {}", DEFAULT_CONTROL_PORT);

    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut halt_rx_for_shutdown = halt_rx;
    let shutdown = async move {
        tokio::select! {
            _ = term.recv() => {
                ii_logging::info!("SIGTERM received, shutting down");
            }
            _ = halt_rx_for_shutdown.wait_for_halt() => {
                ii_logging::info!("shutdown endpoint invoked");
            }
        }
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
