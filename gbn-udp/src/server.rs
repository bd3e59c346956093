//! Session dispatcher.
//!
//! The [`Server`] owns the well-known listening socket and the
//! [`ActiveClientRegistry`].  Its only job is to turn the first SYN from a
//! new peer into a spawned [`crate::session`] task:
//!
//! ```text
//!   listening socket ──SYN from new peer──▶ registry.admit ──▶ tokio::spawn(session)
//!          │                                                        │
//!          │◀──────────── finished_rx (peer address) ◀──────────────┘
//! ```
//!
//! Everything else arriving on the listening socket is ignored: established
//! peers talk to their session's own socket.  The registry is touched only by
//! the dispatcher task; sessions report their end over an mpsc channel so the
//! peer may connect again later.

use std::collections::HashSet;
use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::packet::{Segment, SegmentKind};
use crate::session;
use crate::socket::{Socket, SocketError};

/// The dispatcher's verdict on one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First SYN from this peer: start a session.
    Spawn,
    /// SYN from a peer that already owns a session.
    Duplicate,
    /// Not a SYN; does not belong on the listening socket.
    Ignored,
}

/// Peers that currently own a live session.
#[derive(Debug, Default)]
pub struct ActiveClientRegistry {
    active: HashSet<SocketAddr>,
}

impl ActiveClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `segment` from `peer`, registering the peer on [`Admission::Spawn`].
    pub fn admit(&mut self, peer: SocketAddr, segment: &Segment) -> Admission {
        if segment.kind != SegmentKind::Syn {
            return Admission::Ignored;
        }
        if self.active.insert(peer) {
            Admission::Spawn
        } else {
            Admission::Duplicate
        }
    }

    /// Forget `peer` once its session has ended.
    pub fn release(&mut self, peer: &SocketAddr) -> bool {
        self.active.remove(peer)
    }

    pub fn contains(&self, peer: &SocketAddr) -> bool {
        self.active.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

enum Event {
    Datagram(Result<(Segment, SocketAddr), SocketError>),
    Finished(SocketAddr),
}

/// The listening side: one dispatcher plus a task per session.
#[derive(Debug)]
pub struct Server {
    socket: Socket,
    config: ServerConfig,
    registry: ActiveClientRegistry,
    rng: StdRng,
    finished_tx: mpsc::UnboundedSender<SocketAddr>,
    finished_rx: mpsc::UnboundedReceiver<SocketAddr>,
}

impl Server {
    /// Bind the listening socket described by `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self, SocketError> {
        let socket = Socket::bind(config.bind).await?;
        let rng = config.protocol.rng();
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Ok(Self {
            socket,
            config,
            registry: ActiveClientRegistry::new(),
            rng,
            finished_tx,
            finished_rx,
        })
    }

    /// Address the listening socket actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Dispatch forever.  Returns only on a hard socket error.
    pub async fn run(mut self) -> Result<(), SocketError> {
        log::info!("[server] listening on {}", self.socket.local_addr);

        loop {
            let event = tokio::select! {
                Some(peer) = self.finished_rx.recv() => Event::Finished(peer),
                received = self.socket.recv_from() => Event::Datagram(received),
            };

            match event {
                Event::Finished(peer) => {
                    self.registry.release(&peer);
                    log::debug!("[server] {peer} released ({} active)", self.registry.len());
                }
                Event::Datagram(Ok((segment, peer))) => self.dispatch(segment, peer),
                Event::Datagram(Err(SocketError::Packet(e))) => {
                    log::warn!("[server] malformed datagram ignored: {e}");
                }
                Event::Datagram(Err(e)) => return Err(e),
            }
        }
    }

    fn dispatch(&mut self, segment: Segment, peer: SocketAddr) {
        match self.registry.admit(peer, &segment) {
            Admission::Spawn => self.spawn_session(peer, segment),
            Admission::Duplicate => {
                log::debug!("[server] duplicate {segment} from {peer}, session already running");
            }
            Admission::Ignored => {
                log::debug!("[server] ignoring {segment} from {peer} on listening socket");
            }
        }
    }

    fn spawn_session(&mut self, peer: SocketAddr, syn: Segment) {
        let rng = StdRng::from_rng(&mut self.rng);
        let bind = SocketAddr::new(self.socket.local_addr.ip(), 0);
        let protocol = self.config.protocol.clone();
        let loss = self.config.loss.clone();
        let finished = self.finished_tx.clone();

        log::info!("[server] new client {peer}, spawning session");
        tokio::spawn(async move {
            match session::serve(peer, syn, bind, protocol, loss, rng).await {
                Ok(summary) => log::info!("[session {peer}] finished: {summary}"),
                Err(e) => log::warn!("[session {peer}] ended: {e}"),
            }
            // The dispatcher may already be gone.
            let _ = finished.send(peer);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn syn() -> Segment {
        Segment::control(SegmentKind::Syn, 100, 0)
    }

    #[test]
    fn first_syn_spawns() {
        let mut reg = ActiveClientRegistry::new();
        assert_eq!(reg.admit(addr(5000), &syn()), Admission::Spawn);
        assert!(reg.contains(&addr(5000)));
    }

    #[test]
    fn second_syn_from_same_peer_is_duplicate() {
        let mut reg = ActiveClientRegistry::new();
        reg.admit(addr(5000), &syn());
        assert_eq!(reg.admit(addr(5000), &syn()), Admission::Duplicate);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn distinct_peers_get_distinct_sessions() {
        let mut reg = ActiveClientRegistry::new();
        assert_eq!(reg.admit(addr(5000), &syn()), Admission::Spawn);
        assert_eq!(reg.admit(addr(5001), &syn()), Admission::Spawn);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn non_syn_segments_are_ignored() {
        let mut reg = ActiveClientRegistry::new();
        for kind in [SegmentKind::Ack, SegmentKind::Data, SegmentKind::Fin] {
            let seg = Segment::control(kind, 0, 0);
            assert_eq!(reg.admit(addr(5000), &seg), Admission::Ignored);
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn released_peer_may_reconnect() {
        let mut reg = ActiveClientRegistry::new();
        reg.admit(addr(5000), &syn());
        assert!(reg.release(&addr(5000)));
        assert!(!reg.release(&addr(5000)));
        assert_eq!(reg.admit(addr(5000), &syn()), Admission::Spawn);
    }
}
