pub mod polls;
pub mod votes;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{DbError, PollStore, UserProfile};
use crate::lifecycle::PollStatus;
use crate::model::*;
use crate::validation::ValidationErrors;

#[cfg(test)]
use mockall::automock;

#[derive(Debug)]
pub enum PollError {
    Invalid(ValidationErrors),
    NotFound,
    Unexpected,
}

impl From<DbError> for PollError {
    fn from(e: DbError) -> Self {
        log_db_error(&e);
        Self::Unexpected
    }
}

#[derive(Debug)]
pub enum VoteError {
    Invalid(ValidationErrors),
    PollNotFound,
    OptionNotFound,
    VoteNotFound,
    AlreadyVoted,
    PollNotActive(PollStatus),
    PollEnded,
    Unexpected,
}

impl From<DbError> for VoteError {
    fn from(e: DbError) -> Self {
        log_db_error(&e);
        Self::Unexpected
    }
}

fn log_db_error(e: &DbError) {
    error!("unexpected storage error: {}", e);
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PollOperationsT {
    /// Mirrors an authenticated identity into the users table.
    async fn register_user(&self, user: &User) -> Result<(), PollError>;

    async fn list_polls(&self, query: ListPollsQuery) -> Result<Vec<PollView>, PollError>;
    async fn get_poll(&self, poll_id: Uuid) -> Result<PollView, PollError>;
    async fn create_poll(&self, user_id: Uuid, request: &PollRequest) -> Result<PostPollResponse, PollError>;
    async fn edit_poll(&self, user_id: Uuid, poll_id: Uuid, request: &PollRequest) -> Result<(), PollError>;
    async fn delete_poll(&self, user_id: Uuid, poll_id: Uuid) -> Result<(), PollError>;
    async fn duplicate_poll(&self, user_id: Uuid, poll_id: Uuid, request: &DuplicatePollRequest)
        -> Result<PostPollResponse, PollError>;
    async fn set_archived(&self, user_id: Uuid, poll_id: Uuid, archived: bool) -> Result<(), PollError>;
    async fn validate_ownership(&self, poll_id: Uuid, user_id: Option<Uuid>) -> bool;
    async fn voting_stats(&self, user_id: Uuid) -> Result<VotingStats, PollError>;

    async fn has_voted(&self, user_id: Uuid, poll_id: &str) -> Result<bool, VoteError>;
    async fn get_user_vote(&self, user_id: Uuid, poll_id: &str) -> Result<UserVoteResponse, VoteError>;
    async fn cast_vote(&self, user_id: Uuid, poll_id: &str, request: &VoteRequest) -> Result<(), VoteError>;
    async fn change_vote(&self, user_id: Uuid, poll_id: &str, request: &VoteRequest) -> Result<(), VoteError>;
    async fn remove_vote(&self, user_id: Uuid, poll_id: &str) -> Result<(), VoteError>;
}

#[derive(Clone)]
pub struct PollOperations<S> {
    store: S,
}

impl<S> PollOperations<S> {
    pub fn new(store: S) -> PollOperations<S> {
        PollOperations {
            store
        }
    }
}

#[async_trait]
impl<S> PollOperationsT for PollOperations<S>
where S: PollStore + Send + Sync + 'static {

    async fn register_user(&self, user: &User) -> Result<(), PollError> {
        let profile = UserProfile {
            id: user.id,
            email: user.email.clone(),
            name: user.display_name().map(String::from),
        };
        self.store.upsert_user(&profile).await?;
        Ok(())
    }

    async fn list_polls(&self, query: ListPollsQuery) -> Result<Vec<PollView>, PollError> {
        polls::list_polls(&self.store, query, Utc::now()).await
    }

    async fn get_poll(&self, poll_id: Uuid) -> Result<PollView, PollError> {
        polls::get_poll(&self.store, poll_id, Utc::now()).await
    }

    async fn create_poll(&self, user_id: Uuid, request: &PollRequest) -> Result<PostPollResponse, PollError> {
        let id = polls::create_poll(&self.store, user_id, request, Utc::now()).await?;
        Ok(PostPollResponse { id })
    }

    async fn edit_poll(&self, user_id: Uuid, poll_id: Uuid, request: &PollRequest) -> Result<(), PollError> {
        polls::edit_poll(&self.store, user_id, poll_id, request, Utc::now()).await
    }

    async fn delete_poll(&self, user_id: Uuid, poll_id: Uuid) -> Result<(), PollError> {
        polls::delete_poll(&self.store, user_id, poll_id).await
    }

    async fn duplicate_poll(&self, user_id: Uuid, poll_id: Uuid, request: &DuplicatePollRequest)
    -> Result<PostPollResponse, PollError> {
        let id = polls::duplicate_poll(&self.store, user_id, poll_id, request.question.clone(), Utc::now()).await?;
        Ok(PostPollResponse { id })
    }

    async fn set_archived(&self, user_id: Uuid, poll_id: Uuid, archived: bool) -> Result<(), PollError> {
        polls::set_archived(&self.store, user_id, poll_id, archived).await
    }

    async fn validate_ownership(&self, poll_id: Uuid, user_id: Option<Uuid>) -> bool {
        polls::validate_ownership(&self.store, poll_id, user_id).await
    }

    async fn voting_stats(&self, user_id: Uuid) -> Result<VotingStats, PollError> {
        Ok(self.store.select_voting_stats(user_id).await?)
    }

    async fn has_voted(&self, user_id: Uuid, poll_id: &str) -> Result<bool, VoteError> {
        votes::has_voted(&self.store, user_id, poll_id).await
    }

    async fn get_user_vote(&self, user_id: Uuid, poll_id: &str) -> Result<UserVoteResponse, VoteError> {
        let option_id = votes::get_user_vote(&self.store, user_id, poll_id).await?;
        Ok(UserVoteResponse {
            has_voted: option_id.is_some(),
            option_id,
        })
    }

    async fn cast_vote(&self, user_id: Uuid, poll_id: &str, request: &VoteRequest) -> Result<(), VoteError> {
        votes::cast_vote(&self.store, user_id, poll_id, &request.option_id, Utc::now()).await
    }

    async fn change_vote(&self, user_id: Uuid, poll_id: &str, request: &VoteRequest) -> Result<(), VoteError> {
        votes::change_vote(&self.store, user_id, poll_id, &request.option_id, Utc::now()).await
    }

    async fn remove_vote(&self, user_id: Uuid, poll_id: &str) -> Result<(), VoteError> {
        votes::remove_vote(&self.store, user_id, poll_id, Utc::now()).await
    }
}
