//! One complete client run: connect, transfer, close.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::config::ProtocolConfig;
use crate::connection::{ConnError, Connection};
use crate::socket::Socket;
use crate::stats::TransferStats;
use crate::teardown::TeardownOutcome;

/// Everything a finished client run has to say.
#[derive(Debug, Clone)]
pub struct ClientReport {
    /// Session socket the server assigned to us.
    pub session: SocketAddr,
    pub stats: TransferStats,
    pub teardown: TeardownOutcome,
}

impl fmt::Display for ClientReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "session:                              {}", self.session)?;
        writeln!(f, "{}", self.stats)?;
        writeln!(
            f,
            "final timeout:                        {:.0} ms",
            self.stats.final_timeout.as_secs_f64() * 1000.0
        )?;
        write!(f, "teardown:                             {}", self.teardown)
    }
}

/// Deliver `count` data units to `server` and close the connection.
///
/// Handshake failures are errors; teardown trouble is only reported.
pub async fn run(
    server: SocketAddr,
    count: u32,
    config: ProtocolConfig,
) -> Result<ClientReport, ConnError> {
    let local = match server {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = Socket::bind(local).await?;
    log::info!("[client] bound {}, connecting to {server}", socket.local_addr);

    let mut rng = config.rng();
    let mut conn = Connection::connect(socket, server, config, &mut rng).await?;
    let session = conn.peer();

    let stats = conn.transfer(count).await?;
    let teardown = conn.close().await;

    Ok(ClientReport {
        session,
        stats,
        teardown,
    })
}
