//! Inbound loss injection for server sessions.
//!
//! Loopback never drops datagrams, so each session consults a
//! [`LossInjector`] before any data-phase processing and silently discards
//! whatever it says to.  This is the only way the Go-Back-N recovery path
//! gets exercised end to end.
//!
//! | Model                  | Behaviour                                         |
//! |------------------------|---------------------------------------------------|
//! | `None`                 | Pass-through.                                     |
//! | `Random { probability }` | Drop each datagram with `probability`.          |
//! | `DropOnce { sequences }` | Drop the first arrival of each listed DATA seq. |
//!
//! The random model draws from the session's own seeded [`StdRng`], so a
//! fixed seed reproduces the exact loss pattern.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::Rng;

use crate::packet::{Segment, SegmentKind};

/// Fault model description, cloned into every session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LossModel {
    /// No loss.
    #[default]
    None,
    /// Independent loss with the given probability in `[0.0, 1.0]`.
    Random { probability: f64 },
    /// Deterministic loss of specific DATA sequence numbers, once each.
    DropOnce { sequences: Vec<u32> },
}

impl LossModel {
    /// Random loss, or no loss at all for a zero probability.
    pub fn with_probability(probability: f64) -> Self {
        if probability <= 0.0 {
            Self::None
        } else {
            Self::Random {
                probability: probability.min(1.0),
            }
        }
    }
}

/// Per-session loss policy.
#[derive(Debug)]
pub struct LossInjector {
    model: LossModel,
    rng: StdRng,
    /// DATA sequence numbers still due to be dropped (`DropOnce` only).
    pending: BTreeSet<u32>,
    dropped: u64,
}

impl LossInjector {
    pub fn new(model: &LossModel, rng: StdRng) -> Self {
        let pending = match model {
            LossModel::DropOnce { sequences } => sequences.iter().copied().collect(),
            _ => BTreeSet::new(),
        };
        Self {
            model: model.clone(),
            rng,
            pending,
            dropped: 0,
        }
    }

    /// Decide whether `segment` never "arrived".
    pub fn should_drop(&mut self, segment: &Segment) -> bool {
        let drop = match &self.model {
            LossModel::None => false,
            LossModel::Random { probability } => self.rng.random::<f64>() < *probability,
            LossModel::DropOnce { .. } => {
                segment.kind == SegmentKind::Data && self.pending.remove(&segment.seq)
            }
        };
        if drop {
            self.dropped += 1;
        }
        drop
    }

    /// Datagrams dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
