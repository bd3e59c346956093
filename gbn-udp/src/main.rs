//! Entry point for `gbn-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use gbn_udp::config::{ProtocolConfig, ServerConfig, DEFAULT_SERVER_PORT};
use gbn_udp::server::Server;
use gbn_udp::simulator::LossModel;

/// TCP-like reliable transport over UDP (Go-Back-N).
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run as a server, accepting clients until Ctrl-C.
    Server {
        /// Local address to bind the listening socket to.
        #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,
        /// Well-known listening port.
        #[arg(short, long, default_value_t = DEFAULT_SERVER_PORT)]
        port: u16,
        /// Probability of dropping each inbound session datagram.
        #[arg(short, long, default_value_t = 0.3)]
        loss: f64,
        /// Seed for ISNs and loss draws.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run as a client, sending `packet_count` DATA segments.
    Client {
        /// Server host name or address.
        server_address: String,
        /// Server listening port.
        server_port: u16,
        /// Number of DATA segments to deliver.
        packet_count: u32,
        /// Go-Back-N window capacity.
        #[arg(short, long, default_value_t = 5)]
        window: u32,
        /// Payload bytes per DATA segment.
        #[arg(long, default_value_t = 80)]
        payload_size: usize,
        /// Seed for the initial sequence number.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity; lifecycle events are shown by default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            bind,
            port,
            loss,
            seed,
        } => {
            if !(0.0..=1.0).contains(&loss) {
                bail!("loss probability must be within [0, 1], got {loss}");
            }
            let config = ServerConfig {
                bind: SocketAddr::new(bind, port),
                loss: LossModel::with_probability(loss),
                protocol: ProtocolConfig {
                    seed,
                    ..ProtocolConfig::default()
                },
            };
            let server = Server::bind(config)
                .await
                .with_context(|| format!("binding {bind}:{port}"))?;

            tokio::select! {
                result = server.run() => result.context("server stopped")?,
                _ = tokio::signal::ctrl_c() => log::info!("[server] shutting down"),
            }
        }
        Mode::Client {
            server_address,
            server_port,
            packet_count,
            window,
            payload_size,
            seed,
        } => {
            let config = ProtocolConfig {
                window_capacity: window,
                payload_size,
                seed,
                ..ProtocolConfig::default()
            };
            config.validate()?;

            let server = tokio::net::lookup_host((server_address.as_str(), server_port))
                .await
                .with_context(|| format!("resolving {server_address}"))?
                .next()
                .with_context(|| format!("no address found for {server_address}"))?;

            let report = gbn_udp::client::run(server, packet_count, config)
                .await
                .with_context(|| format!("transfer to {server} failed"))?;
            println!("{report}");
        }
    }

    Ok(())
}
