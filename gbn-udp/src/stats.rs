//! Transfer-quality accounting for the sending side.

use std::fmt;
use std::time::Duration;

/// Counters and RTT samples collected by one Go-Back-N transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// DATA segments put on the wire, retransmissions included.
    pub packets_sent_total: u64,
    /// Segments re-originated after a timeout.
    pub retransmissions: u64,
    /// Acknowledgement waits that expired.
    pub timeouts: u64,
    /// DATA-ACKs that advanced the window.
    pub acks_received: u64,
    /// One sample per accepted DATA-ACK, in arrival order.
    pub rtt_samples: Vec<Duration>,
    /// Retransmission timeout in force when the transfer ended.
    pub final_timeout: Duration,
}

impl TransferStats {
    /// Retransmitted share of all transmissions, in percent.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent_total == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.packets_sent_total as f64 * 100.0
    }

    pub fn rtt_summary(&self) -> Option<RttSummary> {
        RttSummary::from_samples(&self.rtt_samples)
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "packets sent (incl. retransmissions): {}", self.packets_sent_total)?;
        writeln!(f, "retransmitted packets:                {}", self.retransmissions)?;
        writeln!(f, "timeouts:                             {}", self.timeouts)?;
        write!(f, "loss rate:                            {:.2}%", self.loss_rate())?;
        if let Some(rtt) = self.rtt_summary() {
            write!(f, "\n{rtt}")?;
        }
        Ok(())
    }
}

/// Descriptive statistics over RTT samples, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    /// Sample standard deviation (n − 1); 0 for a single sample.
    pub std_dev_ms: f64,
}

impl RttSummary {
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        let n = ms.len() as f64;

        let min_ms = ms.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = ms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_ms = ms.iter().sum::<f64>() / n;
        let std_dev_ms = if ms.len() > 1 {
            let var = ms.iter().map(|x| (x - mean_ms).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        Some(Self {
            min_ms,
            max_ms,
            mean_ms,
            std_dev_ms,
        })
    }
}

impl fmt::Display for RttSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "min RTT:                              {:.2} ms", self.min_ms)?;
        writeln!(f, "max RTT:                              {:.2} ms", self.max_ms)?;
        writeln!(f, "mean RTT:                             {:.2} ms", self.mean_ms)?;
        write!(f, "RTT std dev:                          {:.2} ms", self.std_dev_ms)
    }
}
