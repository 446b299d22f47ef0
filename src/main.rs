//! Entry point for `hdlc-secondary`.
//!
//! Parses CLI arguments and runs one full secondary-station lifecycle:
//! accept a connection from the primary, deliver a message once polled,
//! then wait for the disconnect.  All protocol work is delegated to library
//! modules; `main.rs` owns only process setup (logging, argument parsing).

use std::net::SocketAddr;

use clap::Parser;

use hdlc_secondary::channel::UdpChannel;
use hdlc_secondary::link::SecondaryLink;

/// HDLC secondary station over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Local address to bind (e.g. 0.0.0.0:9730).
    #[arg(short, long, default_value = "0.0.0.0:9730")]
    bind: String,

    /// Primary station address (e.g. 127.0.0.1:9731).
    #[arg(short, long)]
    peer: String,

    /// Station address this entity answers to.
    #[arg(short, long, default_value_t = 3)]
    address: u8,

    /// Transmit window size (1-8).
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=8))]
    window: u8,

    /// Message to deliver once the primary polls.
    #[arg(short, long, default_value = "hello from the secondary station")]
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let bind: SocketAddr = cli.bind.parse()?;
    let peer: SocketAddr = cli.peer.parse()?;

    let channel = UdpChannel::bind(bind, peer).await?;
    log::info!(
        "Station {} listening on {} for primary at {peer}",
        cli.address,
        channel.local_addr
    );

    let mut link = SecondaryLink::with_window_size(channel, cli.address, cli.window as usize);

    loop {
        let outcome = link.connect_indication().await?;
        if outcome.is_successful() {
            log::info!("Connection requested (address field {})", outcome.address);
            break;
        }
        log::warn!(
            "Connection attempt rejected: {:?} ({})",
            outcome.code,
            outcome.detail.as_deref().unwrap_or("-")
        );
    }
    link.connect_response().await?;
    log::info!("Connection established");

    link.data_request(cli.message.as_bytes()).await?;
    log::info!("Message delivered ({} bytes)", cli.message.len());

    let outcome = link.disconnect_indication().await?;
    if outcome.is_successful() {
        log::info!("Disconnected by primary");
    } else {
        log::warn!(
            "Unexpected frame while waiting for disconnect: {:?} ({})",
            outcome.code,
            outcome.detail.as_deref().unwrap_or("-")
        );
    }

    link.close();
    Ok(())
}
