use chrono::{DateTime, offset::Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::PollStatus;

pub type Timestamp = DateTime<Utc>;

/// Body of both `POST /polls` and `PUT /polls/{poll_id}`.
#[derive(Deserialize, Serialize, Debug)]
#[cfg_attr(test, derive(Clone))]
pub struct PollRequest {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[cfg_attr(test, derive(Clone))]
pub struct DuplicatePollRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[cfg_attr(test, derive(Clone))]
pub struct PostPollResponse {
    pub id: Uuid,
}

#[derive(Deserialize, Serialize, Debug)]
#[cfg_attr(test, derive(Clone))]
pub struct VoteRequest {
    pub option_id: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy)]
pub struct ListPollsQuery {
    #[serde(default, rename = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(default, rename = "includeArchived")]
    pub include_archived: bool,
}

/// A poll as returned by the aggregation read, options in creation order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PollDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub archived: bool,
    pub user_name: Option<String>,
    pub options: Vec<OptionDetails>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptionDetails {
    pub id: Uuid,
    pub value: String,
    pub created_at: Timestamp,
    pub vote_count: i64,
}

/// `PollDetails` annotated with values that depend on the time of the read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PollView {
    #[serde(flatten)]
    pub poll: PollDetails,
    pub status: PollStatus,
    pub total_votes: i64,
}

impl PollView {
    pub fn new(poll: PollDetails, now: Timestamp) -> PollView {
        let status = PollStatus::of(poll.starts_at, poll.ends_at, now);
        let total_votes = poll.options.iter().map(|o| o.vote_count).sum();
        PollView { poll, status, total_votes }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[cfg_attr(test, derive(Clone))]
pub struct UserVoteResponse {
    pub has_voted: bool,
    pub option_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct OwnershipResponse {
    pub is_owner: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct VotingStats {
    pub user_id: Uuid,
    pub polls_created: i64,
    pub votes_cast: i64,
    pub votes_received: i64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Identity issued by the auth provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl User {
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata.name.as_deref()
            .or_else(|| self.user_metadata.full_name.as_deref())
            .or_else(|| self.email.as_deref())
    }
}
