mod postgres;
#[cfg(test)]
pub mod memory;

use std::fmt::{self, Display};

use async_trait::async_trait;
use uuid::Uuid;

use crate::lifecycle::PollStatus;
use crate::model::{PollDetails, Timestamp, VotingStats};

pub use postgres::PollDb;

#[cfg(test)]
use mockall::automock;

#[derive(sqlx::FromRow, Debug, Clone, Eq, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, Eq, PartialEq)]
pub struct Poll {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub archived: bool,
}

impl Poll {
    pub fn status(&self, now: Timestamp) -> PollStatus {
        PollStatus::of(self.starts_at, self.ends_at, now)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PollUpdate {
    pub question: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
}

#[derive(sqlx::FromRow, Debug, Clone, Eq, PartialEq)]
pub struct PollOption {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub value: String,
    pub created_at: Timestamp,
}

#[derive(sqlx::FromRow, Debug, Clone, Eq, PartialEq)]
pub struct Vote {
    pub id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub poll_id: Uuid,
    pub created_at: Timestamp,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct PollFilter {
    pub poll_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug)]
pub enum DbError {
    /// A unique constraint rejected the write.
    Conflict,
    /// A foreign key pointed at a row that does not exist.
    MissingReference,
    PostgresErr(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> DbError {
        let code = e.as_database_error()
            .and_then(|de| de.code())
            .map(|code| code.into_owned());
        match code.as_deref() {
            Some("23505") => DbError::Conflict,
            Some("23503") => DbError::MissingReference,
            _ => DbError::PostgresErr(e),
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DbError::Conflict => write!(f, "unique constraint violated"),
            DbError::MissingReference => write!(f, "foreign key constraint violated"),
            DbError::PostgresErr(e) => {
                write!(f, "sqlx error {:?}", e)?;
                if let Some(de) = e.as_database_error() {
                    write!(f, ": {}", de.message())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DbError {}

/// Everything the services need from the relational store. Owner-gated writes
/// take the owner's id and report how many rows they touched.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PollStore {
    async fn upsert_user(&self, user: &UserProfile) -> Result<(), DbError>;

    async fn insert_poll(&self, poll: &Poll) -> Result<(), DbError>;
    async fn select_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, DbError>;
    async fn update_poll(&self, owner_id: Uuid, poll_id: Uuid, update: &PollUpdate) -> Result<u64, DbError>;
    async fn delete_poll(&self, owner_id: Uuid, poll_id: Uuid) -> Result<u64, DbError>;
    async fn set_archived(&self, owner_id: Uuid, poll_id: Uuid, archived: bool) -> Result<u64, DbError>;

    async fn insert_options(&self, options: Vec<PollOption>) -> Result<(), DbError>;
    async fn select_options(&self, poll_id: Uuid) -> Result<Vec<PollOption>, DbError>;
    async fn delete_options(&self, poll_id: Uuid, option_ids: Vec<Uuid>) -> Result<u64, DbError>;

    async fn select_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<Option<Vote>, DbError>;
    async fn insert_vote(&self, vote: &Vote) -> Result<(), DbError>;
    async fn update_vote(&self, user_id: Uuid, poll_id: Uuid, option_id: Uuid) -> Result<u64, DbError>;
    async fn delete_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<u64, DbError>;

    /// The aggregation read: polls with options and per-option vote counts,
    /// newest poll first.
    async fn select_polls_with_details(&self, filter: PollFilter) -> Result<Vec<PollDetails>, DbError>;
    async fn select_voting_stats(&self, user_id: Uuid) -> Result<VotingStats, DbError>;
}
