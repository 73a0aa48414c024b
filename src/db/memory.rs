use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::*;
use crate::model::OptionDetails;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserProfile>,
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    votes: Vec<Vote>,
}

/// In-process stand-in for the Postgres schema in `migrations/`, with the same
/// cascades and the same `(poll_id, user_id)` vote constraint.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn vote_count(&self) -> usize {
        self.tables.lock().unwrap().votes.len()
    }

    pub fn option_count(&self) -> usize {
        self.tables.lock().unwrap().options.len()
    }

    pub fn poll_count(&self) -> usize {
        self.tables.lock().unwrap().polls.len()
    }
}

impl Tables {
    fn remove_options_where(&mut self, remove: impl Fn(&PollOption) -> bool) -> u64 {
        let (removed, kept): (Vec<PollOption>, Vec<PollOption>) = self.options
            .drain(..)
            .partition(|o| remove(o));
        self.options = kept;
        let removed_ids: Vec<Uuid> = removed.iter().map(|o| o.id).collect();
        self.votes.retain(|v| !removed_ids.contains(&v.option_id));
        removed.len() as u64
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn upsert_user(&self, user: &UserProfile) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let name = user.name.clone()
            .or_else(|| tables.users.get(&user.id).and_then(|u| u.name.clone()));
        tables.users.insert(user.id, UserProfile { name, ..user.clone() });
        Ok(())
    }

    async fn insert_poll(&self, poll: &Poll) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(&poll.user_id) {
            return Err(DbError::MissingReference);
        }
        if tables.polls.iter().any(|p| p.id == poll.id) {
            return Err(DbError::Conflict);
        }
        tables.polls.push(poll.clone());
        Ok(())
    }

    async fn select_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, DbError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.polls.iter().find(|p| p.id == poll_id).cloned())
    }

    async fn update_poll(&self, owner_id: Uuid, poll_id: Uuid, update: &PollUpdate) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for poll in tables.polls.iter_mut().filter(|p| p.id == poll_id && p.user_id == owner_id) {
            poll.question = update.question.clone();
            poll.starts_at = update.starts_at;
            poll.ends_at = update.ends_at;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_poll(&self, owner_id: Uuid, poll_id: Uuid) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.polls.len();
        tables.polls.retain(|p| !(p.id == poll_id && p.user_id == owner_id));
        let deleted = (before - tables.polls.len()) as u64;
        if deleted > 0 {
            tables.remove_options_where(|o| o.poll_id == poll_id);
            tables.votes.retain(|v| v.poll_id != poll_id);
        }
        Ok(deleted)
    }

    async fn set_archived(&self, owner_id: Uuid, poll_id: Uuid, archived: bool) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for poll in tables.polls.iter_mut().filter(|p| p.id == poll_id && p.user_id == owner_id) {
            poll.archived = archived;
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_options(&self, options: Vec<PollOption>) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        for option in options.iter() {
            if !tables.polls.iter().any(|p| p.id == option.poll_id) {
                return Err(DbError::MissingReference);
            }
        }
        tables.options.extend(options);
        Ok(())
    }

    async fn select_options(&self, poll_id: Uuid) -> Result<Vec<PollOption>, DbError> {
        let tables = self.tables.lock().unwrap();
        let mut options: Vec<PollOption> = tables.options.iter()
            .filter(|o| o.poll_id == poll_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| o.created_at);
        Ok(options)
    }

    async fn delete_options(&self, poll_id: Uuid, option_ids: Vec<Uuid>) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.remove_options_where(|o| o.poll_id == poll_id && option_ids.contains(&o.id)))
    }

    async fn select_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<Option<Vote>, DbError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.votes.iter().find(|v| v.user_id == user_id && v.poll_id == poll_id).cloned())
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.votes.iter().any(|v| v.user_id == vote.user_id && v.poll_id == vote.poll_id) {
            return Err(DbError::Conflict);
        }
        let option_exists = tables.options.iter().any(|o| o.id == vote.option_id);
        let poll_exists = tables.polls.iter().any(|p| p.id == vote.poll_id);
        if !option_exists || !poll_exists || !tables.users.contains_key(&vote.user_id) {
            return Err(DbError::MissingReference);
        }
        tables.votes.push(vote.clone());
        Ok(())
    }

    async fn update_vote(&self, user_id: Uuid, poll_id: Uuid, option_id: Uuid) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.options.iter().any(|o| o.id == option_id) {
            return Err(DbError::MissingReference);
        }
        let mut updated = 0;
        for vote in tables.votes.iter_mut().filter(|v| v.user_id == user_id && v.poll_id == poll_id) {
            vote.option_id = option_id;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<u64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.votes.len();
        tables.votes.retain(|v| !(v.user_id == user_id && v.poll_id == poll_id));
        Ok((before - tables.votes.len()) as u64)
    }

    async fn select_polls_with_details(&self, filter: PollFilter) -> Result<Vec<PollDetails>, DbError> {
        let tables = self.tables.lock().unwrap();
        let mut polls: Vec<&Poll> = tables.polls.iter()
            .filter(|p| filter.poll_id.map(|id| p.id == id).unwrap_or(true))
            .filter(|p| filter.user_id.map(|id| p.user_id == id).unwrap_or(true))
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let details = polls.into_iter()
            .map(|p| {
                let mut options: Vec<&PollOption> = tables.options.iter()
                    .filter(|o| o.poll_id == p.id)
                    .collect();
                options.sort_by_key(|o| o.created_at);
                let user_name = tables.users.get(&p.user_id)
                    .and_then(|u| u.name.clone().or_else(|| u.email.clone()));
                PollDetails {
                    id: p.id,
                    user_id: p.user_id,
                    question: p.question.clone(),
                    starts_at: p.starts_at,
                    ends_at: p.ends_at,
                    created_at: p.created_at,
                    archived: p.archived,
                    user_name,
                    options: options.into_iter()
                        .map(|o| OptionDetails {
                            id: o.id,
                            value: o.value.clone(),
                            created_at: o.created_at,
                            vote_count: tables.votes.iter().filter(|v| v.option_id == o.id).count() as i64,
                        })
                        .collect(),
                }
            })
            .collect();
        Ok(details)
    }

    async fn select_voting_stats(&self, user_id: Uuid) -> Result<VotingStats, DbError> {
        let tables = self.tables.lock().unwrap();
        let own_polls: Vec<Uuid> = tables.polls.iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.id)
            .collect();
        Ok(VotingStats {
            user_id,
            polls_created: own_polls.len() as i64,
            votes_cast: tables.votes.iter().filter(|v| v.user_id == user_id).count() as i64,
            votes_received: tables.votes.iter().filter(|v| own_polls.contains(&v.poll_id)).count() as i64,
        })
    }
}
