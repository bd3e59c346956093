//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Segment`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O and bounded waiting.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use crate::packet::{PacketError, Segment};

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    /// The received datagram could not be decoded as a valid segment.
    #[error("segment decode error: {0}")]
    Packet(#[from] PacketError),
    /// Nothing usable arrived before the deadline.
    #[error("timed out waiting for a segment")]
    TimedOut,
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, segment-oriented UDP socket.
///
/// Receiving needs `&mut self`: every datagram lands in the same buffer,
/// allocated once at bind time.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    buf: Vec<u8>,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// Encode `segment` and send it as a single UDP datagram to `dest`.
    pub async fn send_to(&self, segment: &Segment, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(&segment.encode(), dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Segment`].
    ///
    /// Returns `(segment, sender_address)`.  Datagrams that fail to decode are
    /// returned as `Err` — the caller decides whether to retry.
    pub async fn recv_from(&mut self) -> Result<(Segment, SocketAddr), SocketError> {
        let (n, addr) = self.inner.recv_from(&mut self.buf).await?;
        let segment = Segment::decode(&self.buf[..n])?;
        Ok((segment, addr))
    }

    /// Receive the next well-formed segment, giving up at `deadline`.
    ///
    /// Malformed datagrams are logged and skipped without extending the
    /// deadline.
    pub async fn recv_until(
        &mut self,
        deadline: Instant,
    ) -> Result<(Segment, SocketAddr), SocketError> {
        loop {
            match timeout_at(deadline, self.recv_from()).await {
                Err(_elapsed) => return Err(SocketError::TimedOut),
                Ok(Err(SocketError::Packet(e))) => {
                    log::warn!(
                        "[socket {}] discarding malformed datagram: {e}",
                        self.local_addr
                    );
                }
                Ok(result) => return result,
            }
        }
    }

    /// [`recv_until`](Self::recv_until) with a relative bound.
    pub async fn recv_timeout(
        &mut self,
        wait: Duration,
    ) -> Result<(Segment, SocketAddr), SocketError> {
        self.recv_until(Instant::now() + wait).await
    }
}
