//! Orchestrator lifecycle.

use std::fmt;

/// States of a scoring run.
///
/// ```text
/// Idle → Validating → FeedingAndWorking → Aggregating → Done
///   └──────────┴──────────────┴──────────────┴──→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, nothing started.
    Idle,
    /// Checking options and probing inputs.
    Validating,
    /// Feeder and workers running.
    FeedingAndWorking,
    /// Workers finished; draining the last scores.
    Aggregating,
    /// Total published.
    Done,
    /// Stopped by an error or cancellation.
    Aborted,
}

impl RunState {
    /// Returns true for `Done` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Validating)
            | (Validating, FeedingAndWorking)
            | (FeedingAndWorking, Aggregating)
            | (Aggregating, Done) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Numeric code exported as a metrics gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Validating => 1,
            Self::FeedingAndWorking => 2,
            Self::Aggregating => 3,
            Self::Done => 4,
            Self::Aborted => 5,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::FeedingAndWorking => "feeding",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
