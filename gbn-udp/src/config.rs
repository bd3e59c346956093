//! Tunable protocol parameters.
//!
//! Each struct carries a [`Default`] with the values both peers were
//! designed around; the binary overrides individual fields from CLI flags.

use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::simulator::LossModel;

/// Well-known port the server listens on for SYNs.
pub const DEFAULT_SERVER_PORT: u16 = 12000;

/// Parameters shared by the client and every server session.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Go-Back-N window capacity in segments.
    pub window_capacity: u32,
    /// Bytes of payload carried by each DATA segment.
    pub payload_size: usize,
    /// EWMA gain for the RTT estimate.
    pub alpha: f64,
    /// EWMA gain for the RTT deviation.
    pub beta: f64,
    /// Receive-wait bound used before the first RTT sample.
    pub initial_rto: Duration,
    /// Lower clamp for the retransmission timeout.
    pub min_rto: Duration,
    /// Upper clamp for the retransmission timeout.
    pub max_rto: Duration,
    /// Client wait for the SYN-ACK.
    pub handshake_timeout: Duration,
    /// Server wait for the final handshake ACK.
    pub syn_ack_timeout: Duration,
    /// Client wait for the FIN-ACK.
    pub teardown_timeout: Duration,
    /// Server session gives up after this long without any datagram.
    pub session_idle_timeout: Duration,
    /// Seed for ISNs and loss draws; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_capacity: 5,
            payload_size: 80,
            alpha: 0.125,
            beta: 0.25,
            initial_rto: Duration::from_millis(500),
            min_rto: Duration::from_millis(100),
            max_rto: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(1),
            syn_ack_timeout: Duration::from_secs(2),
            teardown_timeout: Duration::from_secs(2),
            session_idle_timeout: Duration::from_secs(10),
            seed: None,
        }
    }
}

/// A [`ProtocolConfig`] the protocol engines cannot run with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window capacity must be at least 1")]
    ZeroWindow,
    #[error("{name} must be within [0, 1], got {value}")]
    Gain { name: &'static str, value: f64 },
    #[error("min_rto {min:?} exceeds max_rto {max:?}")]
    RtoBounds { min: Duration, max: Duration },
}

impl ProtocolConfig {
    /// Reject settings that would make the sender or the RTT estimator panic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Gain { name, value });
            }
        }
        if self.min_rto > self.max_rto {
            return Err(ConfigError::RtoBounds {
                min: self.min_rto,
                max: self.max_rto,
            });
        }
        Ok(())
    }

    /// Build the random source for ISNs and loss draws.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Server-only settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the well-known listening socket.
    pub bind: SocketAddr,
    /// Loss model instantiated once per session.
    pub loss: LossModel,
    pub protocol: ProtocolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVER_PORT)),
            loss: LossModel::Random { probability: 0.3 },
            protocol: ProtocolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ProtocolConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = ProtocolConfig {
            window_capacity: 0,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn gains_outside_unit_interval_are_rejected() {
        let config = ProtocolConfig {
            beta: 1.5,
            ..ProtocolConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Gain {
                name: "beta",
                value: 1.5
            })
        );

        let config = ProtocolConfig {
            alpha: -0.1,
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Gain { name: "alpha", .. })
        ));
    }

    #[test]
    fn inverted_rto_bounds_are_rejected() {
        let config = ProtocolConfig {
            min_rto: Duration::from_secs(3),
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RtoBounds { .. })
        ));
    }
}
