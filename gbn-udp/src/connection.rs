//! Client-side connection lifecycle.
//!
//! A [`Connection`] owns one ephemeral [`Socket`] and drives the three
//! phases strictly in order:
//!
//! 1. [`Connection::connect`] — handshake via [`Initiator`]; on success all
//!    further traffic goes to the session address the SYN-ACK came from.
//! 2. [`Connection::transfer`] — Go-Back-N send of `N` data units, with the
//!    receive wait governed by the [`RttEstimator`].
//! 3. [`Connection::close`] — FIN / FIN-ACK via [`Closer`]; never fails.
//!
//! Everything runs on the caller's task; nothing is shared.

use std::net::SocketAddr;
use std::time::Instant;

use rand::Rng;
use thiserror::Error;

use crate::config::{ConfigError, ProtocolConfig};
use crate::gbn_sender::GbnSender;
use crate::handshake::{HandshakeError, Initiator};
use crate::packet::SegmentKind;
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;
use crate::stats::TransferStats;
use crate::teardown::{Closer, TeardownOutcome};
use crate::timer::{RttEstimator, RttParams};

/// Errors surfaced to the client.
#[derive(Error, Debug)]
pub enum ConnError {
    /// No SYN-ACK within the handshake wait.
    #[error("handshake timed out: no reply from {0}")]
    HandshakeTimeout(SocketAddr),
    /// The reply failed validation.
    #[error("handshake failed: {0}")]
    HandshakeMismatch(HandshakeError),
    /// Operation called in the wrong phase.
    #[error("operation not allowed in state {0}")]
    BadState(ConnectionState),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

impl From<HandshakeError> for ConnError {
    fn from(e: HandshakeError) -> Self {
        match e {
            HandshakeError::BadState(state) => Self::BadState(state),
            mismatch => Self::HandshakeMismatch(mismatch),
        }
    }
}

/// An established client connection.
#[derive(Debug)]
pub struct Connection {
    /// Current FSM state.
    pub state: ConnectionState,
    socket: Socket,
    /// Session-specific responder address.
    peer: SocketAddr,
    config: ProtocolConfig,
    isn: u32,
    peer_isn: u32,
    /// Sequence number the FIN will carry: the final `base` of the transfer.
    fin_seq: u32,
}

impl Connection {
    /// Perform the initiator side of the handshake against `server`.
    ///
    /// Single attempt: a timeout or a bad SYN-ACK is final.  An invalid
    /// `config` is rejected before anything is sent.
    pub async fn connect<R: Rng>(
        mut socket: Socket,
        server: SocketAddr,
        config: ProtocolConfig,
        rng: &mut R,
    ) -> Result<Self, ConnError> {
        config.validate()?;
        let mut handshake = Initiator::with_random_isn(rng);

        let syn = handshake.syn()?;
        socket.send_to(&syn, server).await?;
        log::info!("[handshake] → {syn} to {server}");

        let (reply, session_addr) = match socket.recv_timeout(config.handshake_timeout).await {
            Ok(received) => received,
            Err(SocketError::TimedOut) => {
                handshake.on_timeout();
                log::warn!("[handshake] no reply from {server}");
                return Err(ConnError::HandshakeTimeout(server));
            }
            Err(e) => return Err(e.into()),
        };
        log::debug!("[handshake] ← {reply} from {session_addr}");

        let ack = match handshake.on_reply(&reply) {
            Ok(ack) => ack,
            Err(e) => {
                log::warn!("[handshake] rejected reply from {session_addr}: {e}");
                return Err(e.into());
            }
        };
        socket.send_to(&ack, session_addr).await?;
        log::info!("[handshake] → {ack}; established with session {session_addr}");

        Ok(Self {
            state: handshake.state(),
            socket,
            peer: session_addr,
            config,
            isn: handshake.isn(),
            peer_isn: reply.seq,
            fin_seq: 0,
        })
    }

    /// Reliably deliver `count` data units with Go-Back-N.
    ///
    /// Returns once every unit is acknowledged.  Timeouts are handled here by
    /// going back to `base` and never surface as errors.
    pub async fn transfer(&mut self, count: u32) -> Result<TransferStats, ConnError> {
        if self.state != ConnectionState::Established {
            return Err(ConnError::BadState(self.state));
        }

        let mut sender = GbnSender::new(count, self.config.window_capacity);
        let mut rtt = RttEstimator::new(RttParams::from(&self.config));
        let mut rtt_samples = Vec::new();
        let payload = vec![b'D'; self.config.payload_size];

        while !sender.is_complete() {
            while sender.can_send() {
                let segment = sender.build_data_segment(payload.clone());
                self.socket.send_to(&segment, self.peer).await?;
                sender.record_sent(Instant::now());
                log::debug!("[gbn] → {segment} in_flight={}", sender.in_flight());
            }

            let wait = rtt.timeout();
            match self.socket.recv_timeout(wait).await {
                Ok((segment, addr)) => {
                    if addr != self.peer || segment.kind != SegmentKind::DataAck {
                        log::debug!("[gbn] ignoring {segment} from {addr}");
                        continue;
                    }
                    match sender.on_ack(segment.ack, Instant::now()) {
                        Some(sample) => {
                            rtt.record_sample(sample);
                            rtt_samples.push(sample);
                            log::debug!(
                                "[gbn] ← {segment} base={} rtt={sample:?} rto={:?}",
                                sender.base,
                                rtt.timeout()
                            );
                        }
                        None => log::debug!("[gbn] ← stale {segment} (base={})", sender.base),
                    }
                }
                Err(SocketError::TimedOut) => {
                    let base = sender.base;
                    let resent = sender.on_timeout();
                    log::warn!(
                        "[gbn] timeout after {wait:?}; going back to seq={base} ({resent} segment(s))"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.fin_seq = sender.base;
        log::info!("[gbn] all {count} data units acknowledged");

        Ok(TransferStats {
            packets_sent_total: sender.packets_sent_total,
            retransmissions: sender.retransmissions,
            timeouts: sender.timeouts,
            acks_received: sender.acks_received,
            rtt_samples,
            final_timeout: rtt.timeout(),
        })
    }

    /// Send FIN and wait once for the FIN-ACK, then drop the socket.
    ///
    /// Late DATA-ACKs still in the pipe are skipped; the first other segment
    /// from the peer decides the outcome.
    pub async fn close(mut self) -> TeardownOutcome {
        let mut closer = Closer::new(self.fin_seq);
        let fin = closer.fin();
        self.state = closer.state();

        if let Err(e) = self.socket.send_to(&fin, self.peer).await {
            log::warn!("[teardown] could not send FIN: {e}");
            return closer.on_timeout();
        }
        log::info!("[teardown] → {fin}");

        let deadline = tokio::time::Instant::now() + self.config.teardown_timeout;
        let outcome = loop {
            match self.socket.recv_until(deadline).await {
                Ok((segment, addr)) => {
                    if addr != self.peer || segment.kind == SegmentKind::DataAck {
                        log::debug!("[teardown] skipping {segment} from {addr}");
                        continue;
                    }
                    break closer.on_reply(&segment);
                }
                Err(SocketError::TimedOut) => break closer.on_timeout(),
                Err(e) => {
                    log::warn!("[teardown] socket error: {e}");
                    break closer.on_timeout();
                }
            }
        };
        self.state = closer.state();

        if outcome.is_clean() {
            log::info!("[teardown] {outcome}");
        } else {
            log::warn!("[teardown] {outcome}");
        }
        outcome
    }

    /// Address of the responder's session socket.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn isn(&self) -> u32 {
        self.isn
    }

    pub fn peer_isn(&self) -> u32 {
        self.peer_isn
    }
}
