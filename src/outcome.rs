//! Per-item results of batch transfers.

use crate::error::Error;

/// What happened to one item of a batch.
#[derive(Debug)]
pub enum Outcome {
    /// Transferred this many bytes.
    Transferred(u64),
    /// Left alone because the destination already existed.
    Skipped,
    /// Failed; the batch carried on with the next item.
    Failed(Error),
}

/// Outcome of a single named item.
#[derive(Debug)]
pub struct TransferOutcome {
    pub name: String,
    pub outcome: Outcome,
}

impl TransferOutcome {
    pub fn new(name: impl Into<String>, outcome: Outcome) -> Self {
        TransferOutcome {
            name: name.into(),
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// Counts of (transferred, skipped, failed) items.
pub fn tally(outcomes: &[TransferOutcome]) -> (usize, usize, usize) {
    outcomes
        .iter()
        .fold((0, 0, 0), |(t, s, f), o| match o.outcome {
            Outcome::Transferred(_) => (t + 1, s, f),
            Outcome::Skipped => (t, s + 1, f),
            Outcome::Failed(_) => (t, s, f + 1),
        })
}
