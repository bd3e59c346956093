//! `gbn-udp` — a TCP-like reliable transport implemented over UDP.
//!
//! # Architecture
//!
//! ```text
//!  client                                   server
//!  ┌────────────┐  SYN   ┌──────────────────────────────┐
//!  │ Connection │───────▶│ Server (listening socket)    │
//!  │            │        │   ActiveClientRegistry       │
//!  │            │        └──────────────┬───────────────┘
//!  │            │                       │ spawn
//!  │            │ SYN-ACK / DATA-ACK ┌──▼──────────────┐
//!  │ GbnSender  │◀──────────────────▶│ Session         │
//!  │ RttEstim.  │  ACK / DATA / FIN  │  GbnReceiver    │
//!  └─────┬──────┘                    │  LossInjector   │
//!        │                           └──────┬──────────┘
//!  ┌─────▼─────┐                      ┌─────▼─────┐
//!  │  Socket   │     UDP datagrams    │  Socket   │
//!  └───────────┘                      └───────────┘
//! ```
//!
//! The protocol engines (`handshake`, `gbn_sender`, `gbn_receiver`,
//! `teardown`, `timer`) are plain state machines with no I/O; `connection`
//! and `session` drive them over a [`socket::Socket`].
//!
//! - [`packet`]        — 12-byte header wire format
//! - [`handshake`]     — three-way handshake, both roles
//! - [`gbn_sender`]    — Go-Back-N outbound window
//! - [`gbn_receiver`]  — in-order delivery with cumulative ACKs
//! - [`teardown`]      — FIN / FIN-ACK close
//! - [`timer`]         — adaptive retransmission timeout
//! - [`state`]         — connection state type
//! - [`simulator`]     — server-side loss injection
//! - [`socket`]        — async UDP socket abstraction
//! - [`connection`]    — client lifecycle
//! - [`session`]       — per-client server lifecycle
//! - [`server`]        — listening dispatcher
//! - [`client`]        — one full client run
//! - [`stats`]         — transfer counters and RTT summary
//! - [`config`]        — tunables

pub mod client;
pub mod config;
pub mod connection;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod handshake;
pub mod packet;
pub mod server;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod stats;
pub mod teardown;
pub mod timer;
