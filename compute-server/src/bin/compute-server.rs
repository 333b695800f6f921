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

//! The binary the Deployer (C6) uploads to each ASIC host: one Device
//! Controller behind the C4 RPC surface.

use clap::Parser;
use compute_server::{router, AppState};
use core_config::port_file::PortAdvertiser;
use device_controller::DeviceController;

#[derive(Parser, Debug)]
#[command(name = "compute-server", about = "Exposes one ASIC as a compute-RPC server")]
struct Args {
    /// TCP port to bind; 0 auto-selects within 8080..=9090.
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Kernel character device node for the ASIC, e.g. /dev/bmasic0.
    #[arg(long)]
    char_device: Option<String>,

    /// Co-resident miner daemon address to probe first, host:port.
    #[arg(long)]
    daemon_addr: Option<std::net::SocketAddr>,

    /// Fall through to raw USB if no other backend answers.
    #[arg(long, default_value_t = true)]
    try_raw_usb: bool,

    /// Where to write the bound port for co-located clients to discover.
    #[arg(long)]
    port_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _logger = ii_logging::ROOT_LOGGER.clone();
    let args = Args::parse();

    let target = asic_transport::OpenTarget {
        daemon_addr: args.daemon_addr,
        char_device_path: args.char_device,
        try_raw_usb: args.try_raw_usb,
    };
    let config = ii_wire::TxConfigPayload::default();
    let controller = DeviceController::open(&target, &config).await?;
    ii_logging::info!(
        "device controller ready, operational={}",
        controller.is_operational().await
    );

    let listener = compute_server::port_bind::bind(args.port).await?;
    let bound_port = listener.local_addr()?.port();

    let port_advertiser = PortAdvertiser::new(
        args.port_file.unwrap_or_else(PortAdvertiser::default_path),
    );
    port_advertiser.advertise(bound_port)?;
    ii_logging::info!("listening on port {}", bound_port);

    let (halt_tx, halt_rx) = ii_halt::make_pair();
    let state = AppState {
        controller: controller.clone(),
        halt: halt_tx,
    };
    let app = router(state);

    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut halt_rx_for_shutdown = halt_rx.clone();
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

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    controller.close().await?;
    port_advertiser.remove()?;
    Ok(())
}
