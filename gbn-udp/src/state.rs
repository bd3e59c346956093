//! Connection finite-state machine (FSM) types.
//!
//! Both roles share one state enum.  Transitions are driven by
//! [`crate::handshake`] and [`crate::teardown`]; this module only names the
//! states.
//!
//! ```text
//!  initiator:  CLOSED ──SYN──▶ SYN_SENT ──SYN-ACK / ACK──▶ ESTABLISHED
//!                                                              │ FIN
//!                                                              ▼
//!              CLOSED ◀────────────── FIN-ACK / timeout ── FIN_WAIT
//!
//!  responder:  LISTEN ──SYN / SYN-ACK──▶ SYN_RECEIVED ──ACK──▶ ESTABLISHED
//!                                                              │ FIN / FIN-ACK
//!                                                              ▼
//!                                                           CLOSED
//! ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection exists; initial initiator state.
    #[default]
    Closed,
    /// Responder waiting for a SYN.
    Listen,
    /// SYN has been sent; waiting for SYN-ACK.
    SynSent,
    /// SYN received; SYN-ACK sent; waiting for ACK.
    SynReceived,
    /// Three-way handshake complete; data transfer in progress.
    Established,
    /// Initiator sent FIN; waiting for FIN-ACK.
    FinWait,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
            Self::FinWait => "FIN_WAIT",
        };
        f.write_str(name)
    }
}
