/// Run state definitions for tracking crawl progress
///
/// A run moves `Start -> Authenticating -> Listing -> Enriching -> Done`.
/// Listing and enrichment overlap in time: items are enriched while later
/// listing pages are still being fetched, and the run enters `Enriching` once
/// the listing stream is exhausted and only stragglers remain. `Failed` is
/// reachable from every non-terminal state.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    // ===== Active States =====
    /// Run created, nothing requested yet
    Start,

    /// Fetching the landing page and signing in
    Authenticating,

    /// Walking listing pages; enrichment workers may already be running
    Listing,

    /// Listing exhausted, waiting for in-flight enrichments
    Enriching,

    // ===== Terminal States =====
    /// Listing exhausted and every item resolved
    Done,

    /// Aborted by an authentication, listing, or cancellation failure
    Failed,
}

impl RunState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the run finished successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        match (self, next) {
            (current, Self::Failed) => current.is_active(),
            (Self::Start, Self::Authenticating) => true,
            (Self::Authenticating, Self::Listing) => true,
            (Self::Listing, Self::Enriching) => true,
            (Self::Enriching, Self::Done) => true,
            _ => false,
        }
    }

    /// Converts the run state to its report string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Authenticating => "authenticating",
            Self::Listing => "listing",
            Self::Enriching => "enriching",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible run states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::Authenticating,
            Self::Listing,
            Self::Enriching,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
