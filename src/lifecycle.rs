use serde::{Deserialize, Serialize};

use crate::model::Timestamp;

/// Where a poll sits relative to its voting window. Never stored, always
/// derived from the window and the current time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    NotStarted,
    Active,
    Ended,
}

impl PollStatus {
    pub fn of(starts_at: Option<Timestamp>, ends_at: Option<Timestamp>, now: Timestamp) -> PollStatus {
        match (starts_at, ends_at) {
            (Some(start), _) if now < start => PollStatus::NotStarted,
            (_, Some(end)) if now > end => PollStatus::Ended,
            _ => PollStatus::Active,
        }
    }

    pub fn can_vote(self) -> bool {
        self == PollStatus::Active
    }

    /// A poll that has not started yet still accepts changes and retractions.
    pub fn can_change_or_remove_vote(self) -> bool {
        self != PollStatus::Ended
    }

    pub fn describe(self) -> &'static str {
        match self {
            PollStatus::NotStarted => "Poll has not started yet",
            PollStatus::Active => "Poll is active",
            PollStatus::Ended => "Poll has ended",
        }
    }
}
