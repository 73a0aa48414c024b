use uuid::Uuid;

use super::VoteError;
use crate::db::{self, DbError, PollStore};
use crate::model::Timestamp;
use crate::validation;

async fn select_poll<S: PollStore>(store: &S, poll_id: Uuid) -> Result<db::Poll, VoteError> {
    store.select_poll(poll_id)
        .await?
        .ok_or(VoteError::PollNotFound)
}

async fn ensure_option_in_poll<S: PollStore>(store: &S, poll_id: Uuid, option_id: Uuid) -> Result<(), VoteError> {
    let options = store.select_options(poll_id).await?;
    if options.iter().any(|o| o.id == option_id) {
        Ok(())
    } else {
        Err(VoteError::OptionNotFound)
    }
}

pub async fn get_user_vote<S: PollStore>(store: &S, user_id: Uuid, poll_id: &str) -> Result<Option<Uuid>, VoteError> {
    let poll_id = validation::validate_poll_id(poll_id).map_err(VoteError::Invalid)?;
    select_poll(store, poll_id).await?;
    let vote = store.select_vote(user_id, poll_id).await?;
    Ok(vote.map(|v| v.option_id))
}

pub async fn has_voted<S: PollStore>(store: &S, user_id: Uuid, poll_id: &str) -> Result<bool, VoteError> {
    Ok(get_user_vote(store, user_id, poll_id).await?.is_some())
}

/// Records the user's vote. The lookup for an earlier vote only produces a
/// friendlier early error; the `(poll_id, user_id)` unique constraint is what
/// keeps two concurrent casts from both landing.
pub async fn cast_vote<S: PollStore>(store: &S, user_id: Uuid, poll_id: &str, option_id: &str, now: Timestamp)
-> Result<(), VoteError> {
    let (poll_id, option_id) = validation::validate_vote(poll_id, option_id)
        .map_err(VoteError::Invalid)?;
    let poll = select_poll(store, poll_id).await?;

    if store.select_vote(user_id, poll_id).await?.is_some() {
        return Err(VoteError::AlreadyVoted);
    }
    let status = poll.status(now);
    if !status.can_vote() {
        return Err(VoteError::PollNotActive(status));
    }
    ensure_option_in_poll(store, poll_id, option_id).await?;

    let vote = db::Vote {
        id: Uuid::new_v4(),
        option_id,
        user_id,
        poll_id,
        created_at: now,
    };
    match store.insert_vote(&vote).await {
        Ok(()) => {
            info!("user_id={} voted on poll_id={}", user_id, poll_id);
            Ok(())
        }
        Err(DbError::Conflict) => {
            debug!("Concurrent vote by user_id={} on poll_id={} rejected", user_id, poll_id);
            Err(VoteError::AlreadyVoted)
        }
        Err(DbError::MissingReference) => Err(VoteError::OptionNotFound),
        Err(e) => Err(e.into()),
    }
}

pub async fn change_vote<S: PollStore>(store: &S, user_id: Uuid, poll_id: &str, option_id: &str, now: Timestamp)
-> Result<(), VoteError> {
    let (poll_id, option_id) = validation::validate_vote(poll_id, option_id)
        .map_err(VoteError::Invalid)?;
    let poll = select_poll(store, poll_id).await?;

    if !poll.status(now).can_change_or_remove_vote() {
        return Err(VoteError::PollEnded);
    }
    ensure_option_in_poll(store, poll_id, option_id).await?;

    match store.update_vote(user_id, poll_id, option_id).await {
        Ok(0) => Err(VoteError::VoteNotFound),
        Ok(_) => Ok(()),
        Err(DbError::MissingReference) => Err(VoteError::OptionNotFound),
        Err(e) => Err(e.into()),
    }
}

/// Deletes the user's vote. Having no vote to remove is not an error.
pub async fn remove_vote<S: PollStore>(store: &S, user_id: Uuid, poll_id: &str, now: Timestamp)
-> Result<(), VoteError> {
    let poll_id = validation::validate_poll_id(poll_id).map_err(VoteError::Invalid)?;
    let poll = select_poll(store, poll_id).await?;

    if !poll.status(now).can_change_or_remove_vote() {
        return Err(VoteError::PollEnded);
    }
    if store.delete_vote(user_id, poll_id).await? == 0 {
        debug!("No vote by user_id={} on poll_id={} to remove", user_id, poll_id);
    }
    Ok(())
}
