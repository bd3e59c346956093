//! Per-client server session.
//!
//! A [`Session`] is created by the dispatcher for one remote peer.  It binds
//! its own socket on an OS-chosen port, so after the handshake the client
//! talks to it directly and the listening socket never sees that peer again.
//!
//! Phases, in order:
//! 1. [`Session::accept`] — answer the seed SYN, wait for the final ACK.
//! 2. [`Session::run`] — Go-Back-N receive; every datagram first goes
//!    through the [`LossInjector`].
//! 3. On FIN, answer FIN-ACK and end immediately.
//!
//! A session also ends when the peer goes quiet for `session_idle_timeout`.
//! No notification is sent to the peer in that case.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ProtocolConfig;
use crate::gbn_receiver::{Delivery, GbnReceiver};
use crate::handshake::{HandshakeError, Responder};
use crate::packet::{Segment, SegmentKind};
use crate::simulator::{LossInjector, LossModel};
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;
use crate::teardown::answer_fin;

/// Why a session ended without a clean FIN exchange.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no final handshake ACK within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("peer silent for {0:?}, giving up")]
    Inactive(Duration),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// What a session achieved, reported when it closes cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub peer: SocketAddr,
    /// In-order DATA segments accepted.
    pub segments_delivered: u32,
    pub bytes_delivered: u64,
    /// Out-of-order / duplicate segments discarded.
    pub discarded: u64,
    /// Datagrams eaten by the loss injector.
    pub dropped: u64,
    /// Sequence number carried by the peer's FIN.
    pub fin_seq: u32,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segment(s) / {} byte(s) delivered, {} discarded, {} dropped by loss simulation",
            self.segments_delivered, self.bytes_delivered, self.discarded, self.dropped
        )
    }
}

/// One established server session.
#[derive(Debug)]
pub struct Session {
    pub state: ConnectionState,
    peer: SocketAddr,
    socket: Socket,
    config: ProtocolConfig,
    receiver: GbnReceiver,
    loss: LossInjector,
    rng: StdRng,
}

impl Session {
    /// Bind a fresh socket on `bind`, answer `syn` and wait for the final ACK.
    pub async fn accept(
        peer: SocketAddr,
        syn: &Segment,
        bind: SocketAddr,
        config: ProtocolConfig,
        loss: &LossModel,
        mut rng: StdRng,
    ) -> Result<Self, SessionError> {
        let mut socket = Socket::bind(bind).await?;
        log::info!("[session {peer}] started on {}", socket.local_addr);

        let mut handshake = Responder::with_random_isn(&mut rng);
        let syn_ack = handshake.on_syn(syn)?;
        socket.send_to(&syn_ack, peer).await?;
        log::debug!("[session {peer}] ← {syn}; → {syn_ack}");

        let deadline = Instant::now() + config.syn_ack_timeout;
        loop {
            match socket.recv_until(deadline).await {
                Ok((segment, addr)) if addr == peer => {
                    if let Err(e) = handshake.on_ack(&segment) {
                        log::warn!("[session {peer}] handshake failed: {e}");
                        return Err(e.into());
                    }
                    break;
                }
                Ok((segment, addr)) => {
                    log::debug!("[session {peer}] ignoring {segment} from stranger {addr}");
                }
                Err(SocketError::TimedOut) => {
                    handshake.on_timeout();
                    log::warn!("[session {peer}] timed out waiting for handshake ACK");
                    return Err(SessionError::HandshakeTimeout(config.syn_ack_timeout));
                }
                Err(e) => return Err(e.into()),
            }
        }
        log::info!("[session {peer}] connection established");

        let loss = LossInjector::new(loss, StdRng::from_rng(&mut rng));
        Ok(Self {
            state: handshake.state(),
            peer,
            socket,
            config,
            receiver: GbnReceiver::new(),
            loss,
            rng,
        })
    }

    /// Receive data until the peer's FIN (or its silence) ends the session.
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let peer = self.peer;
        let idle = self.config.session_idle_timeout;

        loop {
            let (segment, addr) = match self.socket.recv_timeout(idle).await {
                Ok(received) => received,
                Err(SocketError::TimedOut) => {
                    self.state = ConnectionState::Closed;
                    log::warn!("[session {peer}] no traffic for {idle:?}, aborting");
                    return Err(SessionError::Inactive(idle));
                }
                Err(e) => return Err(e.into()),
            };
            if addr != peer {
                log::debug!("[session {peer}] ignoring {segment} from stranger {addr}");
                continue;
            }
            if self.loss.should_drop(&segment) {
                log::warn!("[session {peer}] simulated loss, dropping {segment}");
                continue;
            }

            match segment.kind {
                SegmentKind::Data => self.on_data(&segment).await?,
                SegmentKind::Fin => {
                    let fin_ack = answer_fin(&segment, &mut self.rng);
                    self.socket.send_to(&fin_ack, peer).await?;
                    self.state = ConnectionState::Closed;
                    log::info!("[session {peer}] ← {segment}; → {fin_ack}, closing");
                    return Ok(self.summary(segment.seq));
                }
                _ => log::debug!("[session {peer}] ignoring {segment}"),
            }
        }
    }

    async fn on_data(&mut self, segment: &Segment) -> Result<(), SessionError> {
        let delivery = self.receiver.on_segment(segment.seq, &segment.payload);
        match &delivery {
            Delivery::Accepted { ack } => {
                log::debug!("[session {}] ← {segment} in order; → {ack}", self.peer);
            }
            Delivery::Reacked { ack } => {
                log::debug!(
                    "[session {}] ← {segment} out of order (expected {}); → {ack}",
                    self.peer,
                    self.receiver.expected_seq
                );
            }
            Delivery::Discarded => {
                log::debug!(
                    "[session {}] ← {segment} out of order, nothing acknowledged yet",
                    self.peer
                );
            }
        }
        if let Some(ack) = delivery.ack() {
            self.socket.send_to(ack, self.peer).await?;
        }
        Ok(())
    }

    fn summary(&self, fin_seq: u32) -> SessionSummary {
        SessionSummary {
            peer: self.peer,
            segments_delivered: self.receiver.segments_delivered(),
            bytes_delivered: self.receiver.bytes_delivered,
            discarded: self.receiver.discarded,
            dropped: self.loss.dropped(),
            fin_seq,
        }
    }
}

/// Run a whole session for `peer`, seeded with its SYN.
pub async fn serve(
    peer: SocketAddr,
    syn: Segment,
    bind: SocketAddr,
    config: ProtocolConfig,
    loss: LossModel,
    rng: StdRng,
) -> Result<SessionSummary, SessionError> {
    Session::accept(peer, &syn, bind, config, &loss, rng)
        .await?
        .run()
        .await
}
