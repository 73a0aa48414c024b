use async_trait::async_trait;
use itertools::Itertools;
use sqlx::{Done, PgPool};
use uuid::Uuid;

use super::*;
use crate::model::OptionDetails;

#[derive(Clone)]
pub struct PollDb {
    pool: PgPool,
}

impl PollDb {
    pub fn new(db_pool: PgPool) -> PollDb {
        PollDb { pool: db_pool }
    }
}

/// One row of `get_polls_with_details`: a poll joined with one of its options.
#[derive(sqlx::FromRow, Debug, Clone)]
struct DetailsRow {
    id: Uuid,
    user_id: Uuid,
    question: String,
    starts_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
    created_at: Timestamp,
    archived: bool,
    user_name: Option<String>,
    option_id: Option<Uuid>,
    option_value: Option<String>,
    option_created_at: Option<Timestamp>,
    vote_count: i64,
}

/// Folds consecutive rows of the same poll into one `PollDetails`, keeping the
/// order the function returned them in. A poll without options comes back as a
/// single row with null option columns.
fn assemble_details(rows: Vec<DetailsRow>) -> Vec<PollDetails> {
    let mut polls = Vec::new();
    for (_, group) in &rows.into_iter().group_by(|r| r.id) {
        let group: Vec<DetailsRow> = group.collect();
        let options = group.iter()
            .filter_map(|r| match (r.option_id, &r.option_value, r.option_created_at) {
                (Some(id), Some(value), Some(created_at)) => Some(OptionDetails {
                    id,
                    value: value.clone(),
                    created_at,
                    vote_count: r.vote_count,
                }),
                _ => None,
            })
            .collect();
        if let Some(first) = group.into_iter().next() {
            polls.push(PollDetails {
                id: first.id,
                user_id: first.user_id,
                question: first.question,
                starts_at: first.starts_at,
                ends_at: first.ends_at,
                created_at: first.created_at,
                archived: first.archived,
                user_name: first.user_name,
                options,
            });
        }
    }
    polls
}

#[async_trait]
impl PollStore for PollDb {
    async fn upsert_user(&self, user: &UserProfile) -> Result<(), DbError> {
        sqlx::query(
            "insert into users(id, email, name) values ($1, $2, $3) \
            on conflict (id) do update \
                set email = excluded.email, name = coalesce(excluded.name, users.name)"
        ).bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_poll(&self, poll: &Poll) -> Result<(), DbError> {
        sqlx::query(
            "insert \
                into polls(id, user_id, question, starts_at, ends_at, created_at, archived) \
                values ($1, $2, $3, $4, $5, $6, $7)"
        ).bind(poll.id)
        .bind(poll.user_id)
        .bind(&poll.question)
        .bind(poll.starts_at)
        .bind(poll.ends_at)
        .bind(poll.created_at)
        .bind(poll.archived)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, DbError> {
        let poll = sqlx::query_as::<_, Poll>(
            "select id, user_id, question, starts_at, ends_at, created_at, archived \
            from polls where id = $1"
        ).bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(poll)
    }

    async fn update_poll(&self, owner_id: Uuid, poll_id: Uuid, update: &PollUpdate) -> Result<u64, DbError> {
        let done = sqlx::query(
            "update polls set question = $1, starts_at = $2, ends_at = $3 \
            where id = $4 and user_id = $5"
        ).bind(&update.question)
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(poll_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn delete_poll(&self, owner_id: Uuid, poll_id: Uuid) -> Result<u64, DbError> {
        let done = sqlx::query("delete from polls where id = $1 and user_id = $2")
            .bind(poll_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn set_archived(&self, owner_id: Uuid, poll_id: Uuid, archived: bool) -> Result<u64, DbError> {
        let done = sqlx::query("update polls set archived = $1 where id = $2 and user_id = $3")
            .bind(archived)
            .bind(poll_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn insert_options(&self, options: Vec<PollOption>) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for option in options.iter() {
            sqlx::query(
                "insert into options(id, poll_id, value, created_at) values ($1, $2, $3, $4)"
            ).bind(option.id)
            .bind(option.poll_id)
            .bind(&option.value)
            .bind(option.created_at)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn select_options(&self, poll_id: Uuid) -> Result<Vec<PollOption>, DbError> {
        let options = sqlx::query_as::<_, PollOption>(
            "select id, poll_id, value, created_at from options \
            where poll_id = $1 order by created_at, id"
        ).bind(poll_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    async fn delete_options(&self, poll_id: Uuid, option_ids: Vec<Uuid>) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for option_id in option_ids {
            let done = sqlx::query("delete from options where id = $1 and poll_id = $2")
                .bind(option_id)
                .bind(poll_id)
                .execute(&mut tx)
                .await?;
            deleted += done.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn select_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<Option<Vote>, DbError> {
        let vote = sqlx::query_as::<_, Vote>(
            "select id, option_id, user_id, poll_id, created_at from votes \
            where user_id = $1 and poll_id = $2"
        ).bind(user_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<(), DbError> {
        sqlx::query(
            "insert into votes(id, option_id, user_id, poll_id, created_at) values ($1, $2, $3, $4, $5)"
        ).bind(vote.id)
        .bind(vote.option_id)
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_vote(&self, user_id: Uuid, poll_id: Uuid, option_id: Uuid) -> Result<u64, DbError> {
        let done = sqlx::query("update votes set option_id = $1 where user_id = $2 and poll_id = $3")
            .bind(option_id)
            .bind(user_id)
            .bind(poll_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete_vote(&self, user_id: Uuid, poll_id: Uuid) -> Result<u64, DbError> {
        let done = sqlx::query("delete from votes where user_id = $1 and poll_id = $2")
            .bind(user_id)
            .bind(poll_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn select_polls_with_details(&self, filter: PollFilter) -> Result<Vec<PollDetails>, DbError> {
        let rows = sqlx::query_as::<_, DetailsRow>(
            "select id, user_id, question, starts_at, ends_at, created_at, archived, user_name, \
                option_id, option_value, option_created_at, vote_count \
            from get_polls_with_details($1, $2)"
        ).bind(filter.poll_id)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assemble_details(rows))
    }

    async fn select_voting_stats(&self, user_id: Uuid) -> Result<VotingStats, DbError> {
        let (polls_created, votes_cast, votes_received): (i64, i64, i64) = sqlx::query_as(
            "select \
                (select count(*) from polls where user_id = $1), \
                (select count(*) from votes where user_id = $1), \
                (select count(*) from votes v join polls p on p.id = v.poll_id where p.user_id = $1)"
        ).bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(VotingStats {
            user_id,
            polls_created,
            votes_cast,
            votes_received,
        })
    }
}
