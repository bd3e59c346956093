//! Adaptive retransmission timeout.
//!
//! [`RttEstimator`] turns round-trip samples into the bound the Go-Back-N
//! sender waits for an acknowledgement before going back to `base`:
//!
//! ```text
//!   first sample R:  EstRTT = R,  DevRTT = R/2
//!   afterwards:      EstRTT = (1-α)·EstRTT + α·R
//!                    DevRTT = (1-β)·DevRTT + β·|R - EstRTT|
//!   timeout        = clamp(EstRTT + 4·DevRTT, min_rto, max_rto)
//! ```
//!
//! Unlike RFC 6298 there is no exponential back-off on timeout; the value
//! only moves when a new sample arrives.

use std::time::Duration;

use crate::config::ProtocolConfig;

/// Smoothing gains and clamp bounds for an [`RttEstimator`].
#[derive(Debug, Clone, Copy)]
pub struct RttParams {
    pub alpha: f64,
    pub beta: f64,
    pub initial_rto: Duration,
    pub min_rto: Duration,
    pub max_rto: Duration,
}

impl Default for RttParams {
    fn default() -> Self {
        Self::from(&ProtocolConfig::default())
    }
}

impl From<&ProtocolConfig> for RttParams {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            alpha: config.alpha,
            beta: config.beta,
            initial_rto: config.initial_rto,
            min_rto: config.min_rto,
            max_rto: config.max_rto,
        }
    }
}

/// Smoothed RTT / deviation state for one sender.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    params: RttParams,
    /// Smoothed RTT estimate; `None` until the first sample.
    estimated: Option<Duration>,
    deviation: Duration,
    timeout: Duration,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(RttParams::default())
    }
}

impl RttEstimator {
    /// Gains outside `[0, 1]` are clamped into it; if `min_rto` exceeds
    /// `max_rto`, `max_rto` wins.  [`ProtocolConfig::validate`] rejects both.
    pub fn new(mut params: RttParams) -> Self {
        params.alpha = params.alpha.clamp(0.0, 1.0);
        params.beta = params.beta.clamp(0.0, 1.0);
        Self {
            params,
            estimated: None,
            deviation: Duration::ZERO,
            timeout: params.initial_rto,
        }
    }

    /// Fold one round-trip sample into the estimate and recompute the timeout.
    pub fn record_sample(&mut self, sample: Duration) {
        let RttParams { alpha, beta, .. } = self.params;

        let estimated = match self.estimated {
            None => {
                self.deviation = sample / 2;
                sample
            }
            Some(prev) => {
                let estimated = prev.mul_f64(1.0 - alpha) + sample.mul_f64(alpha);
                self.deviation = self.deviation.mul_f64(1.0 - beta)
                    + sample.abs_diff(estimated).mul_f64(beta);
                estimated
            }
        };
        self.estimated = Some(estimated);

        self.timeout = (estimated + self.deviation * 4)
            .max(self.params.min_rto)
            .min(self.params.max_rto);
    }

    /// Bound for the next acknowledgement wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn estimated_rtt(&self) -> Option<Duration> {
        self.estimated
    }

    pub fn deviation_rtt(&self) -> Duration {
        self.deviation
    }
}
