use std::collections::HashSet;

use chrono::Duration;
use uuid::Uuid;

use super::PollError;
use crate::db::{self, PollFilter, PollOption, PollStore, PollUpdate};
use crate::model::{ListPollsQuery, PollRequest, PollView, Timestamp};
use crate::{util, validation};

pub async fn list_polls<S: PollStore>(store: &S, query: ListPollsQuery, now: Timestamp)
-> Result<Vec<PollView>, PollError> {
    let filter = PollFilter {
        poll_id: None,
        user_id: query.user_id,
    };
    let polls = store.select_polls_with_details(filter)
        .await?
        .into_iter()
        .filter(|p| query.include_archived || !p.archived)
        .map(|p| PollView::new(p, now))
        .collect();
    Ok(polls)
}

pub async fn get_poll<S: PollStore>(store: &S, poll_id: Uuid, now: Timestamp) -> Result<PollView, PollError> {
    let filter = PollFilter {
        poll_id: Some(poll_id),
        user_id: None,
    };
    store.select_polls_with_details(filter)
        .await?
        .into_iter()
        .next()
        .map(|p| PollView::new(p, now))
        .ok_or(PollError::NotFound)
}

/// Option rows for `values`, spaced a microsecond apart so that ordering by
/// `created_at` returns them in submission order.
fn new_options(poll_id: Uuid, values: Vec<String>, now: Timestamp) -> Vec<PollOption> {
    values.into_iter()
        .enumerate()
        .map(|(i, value)| PollOption {
            id: Uuid::new_v4(),
            poll_id,
            value,
            created_at: now + Duration::microseconds(i as i64),
        })
        .collect()
}

/// Inserts the options of a freshly created poll. Poll and options are written
/// separately, so on failure the poll is deleted again rather than left behind
/// with no options.
async fn insert_options_or_discard<S: PollStore>(store: &S, poll: &db::Poll, values: Vec<String>, now: Timestamp)
-> Result<(), PollError> {
    if let Err(e) = store.insert_options(new_options(poll.id, values, now)).await {
        error!("Failed to insert options for poll_id={}, removing poll: {}", poll.id, e);
        if let Err(e) = store.delete_poll(poll.user_id, poll.id).await {
            error!("Failed to remove poll_id={} without options: {}", poll.id, e);
        }
        return Err(PollError::Unexpected);
    }
    Ok(())
}

pub async fn create_poll<S: PollStore>(store: &S, owner_id: Uuid, request: &PollRequest, now: Timestamp)
-> Result<Uuid, PollError> {
    validation::validate_poll(request).map_err(PollError::Invalid)?;

    let poll = db::Poll {
        id: Uuid::new_v4(),
        user_id: owner_id,
        question: request.question.clone(),
        starts_at: request.starts_at,
        ends_at: request.ends_at,
        created_at: now,
        archived: false,
    };
    store.insert_poll(&poll).await?;
    insert_options_or_discard(store, &poll, request.options.clone(), now).await?;

    info!("Created poll_id={} for user_id={}", poll.id, owner_id);
    Ok(poll.id)
}

/// Splits a submitted option list against the stored options by value: values
/// to insert, and ids of stored options whose value is no longer submitted.
/// Unchanged values keep their rows (and votes).
pub fn reconcile_options(existing: &[PollOption], submitted: &[String]) -> (Vec<String>, Vec<Uuid>) {
    let existing_values: HashSet<&str> = existing.iter().map(|o| o.value.as_str()).collect();
    let submitted_values: HashSet<&str> = submitted.iter().map(|v| v.as_str()).collect();

    let added = util::not_in(submitted, &existing_values, |v| v.as_str())
        .into_iter()
        .cloned()
        .collect();
    let removed = util::not_in(existing, &submitted_values, |o| o.value.as_str())
        .into_iter()
        .map(|o| o.id)
        .collect();
    (added, removed)
}

pub async fn edit_poll<S: PollStore>(store: &S, owner_id: Uuid, poll_id: Uuid, request: &PollRequest, now: Timestamp)
-> Result<(), PollError> {
    validation::validate_poll(request).map_err(PollError::Invalid)?;

    store.select_poll(poll_id)
        .await?
        .ok_or(PollError::NotFound)?;

    let update = PollUpdate {
        question: request.question.clone(),
        starts_at: request.starts_at,
        ends_at: request.ends_at,
    };
    if store.update_poll(owner_id, poll_id, &update).await? == 0 {
        debug!("user_id={} does not own poll_id={}, edit ignored", owner_id, poll_id);
        return Ok(());
    }

    let existing = store.select_options(poll_id).await?;
    let (added, removed) = reconcile_options(&existing, &request.options);
    if !added.is_empty() {
        store.insert_options(new_options(poll_id, added, now)).await?;
    }
    if !removed.is_empty() {
        store.delete_options(poll_id, removed).await?;
    }
    Ok(())
}

pub async fn delete_poll<S: PollStore>(store: &S, owner_id: Uuid, poll_id: Uuid) -> Result<(), PollError> {
    if store.delete_poll(owner_id, poll_id).await? == 0 {
        debug!("Nothing deleted for poll_id={}, user_id={}", poll_id, owner_id);
    }
    Ok(())
}

/// Copies a poll's question and option values into a new poll owned by
/// `owner_id`. The voting window is not copied.
pub async fn duplicate_poll<S: PollStore>(
    store: &S,
    owner_id: Uuid,
    poll_id: Uuid,
    question: Option<String>,
    now: Timestamp,
) -> Result<Uuid, PollError> {
    if let Some(question) = &question {
        let mut errors = validation::ValidationErrors::default();
        validation::validate_question(question, &mut errors);
        if !errors.is_empty() {
            return Err(PollError::Invalid(errors));
        }
    }

    let source = store.select_poll(poll_id)
        .await?
        .ok_or(PollError::NotFound)?;
    let values = store.select_options(poll_id)
        .await?
        .into_iter()
        .map(|o| o.value)
        .collect();

    let poll = db::Poll {
        id: Uuid::new_v4(),
        user_id: owner_id,
        question: question.unwrap_or_else(|| format!("Copy of {}", source.question)),
        starts_at: None,
        ends_at: None,
        created_at: now,
        archived: false,
    };
    store.insert_poll(&poll).await?;
    insert_options_or_discard(store, &poll, values, now).await?;

    info!("Duplicated poll_id={} into poll_id={} for user_id={}", poll_id, poll.id, owner_id);
    Ok(poll.id)
}

pub async fn set_archived<S: PollStore>(store: &S, owner_id: Uuid, poll_id: Uuid, archived: bool)
-> Result<(), PollError> {
    store.select_poll(poll_id)
        .await?
        .ok_or(PollError::NotFound)?;
    if store.set_archived(owner_id, poll_id, archived).await? == 0 {
        debug!("user_id={} does not own poll_id={}, archive ignored", owner_id, poll_id);
    }
    Ok(())
}

pub async fn validate_ownership<S: PollStore>(store: &S, poll_id: Uuid, user_id: Option<Uuid>) -> bool {
    let user_id = match user_id {
        Some(user_id) => user_id,
        None => return false,
    };
    match store.select_poll(poll_id).await {
        Ok(poll) => poll.map(|p| p.user_id == user_id).unwrap_or(false),
        Err(e) => {
            error!("Failed to look up owner of poll_id={}: {}", poll_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::{DbError, MockPollStore, UserProfile};
    use crate::db::memory::MemoryStore;
    use crate::lifecycle::PollStatus;

    fn request(question: &str, options: &[&str]) -> PollRequest {
        PollRequest {
            question: question.to_owned(),
            options: options.iter().map(|o| o.to_string()).collect(),
            starts_at: None,
            ends_at: None,
        }
    }

    async fn new_user(store: &MemoryStore) -> Uuid {
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: None,
            name: Some("mock user".to_owned()),
        };
        store.upsert_user(&user).await.unwrap();
        user.id
    }

    async fn option_ids(store: &MemoryStore, poll_id: Uuid) -> Vec<(String, Uuid)> {
        store.select_options(poll_id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| (o.value, o.id))
            .collect()
    }

    #[tokio::test]
    async fn create_rejects_invalid_input_before_storage() {
        let store = MockPollStore::new();
        let error = create_poll(&store, Uuid::new_v4(), &request("Hm?", &["Red"]), Utc::now())
            .await
            .expect_err("invalid poll");
        match error {
            PollError::Invalid(errors) => {
                assert!(errors.field("question").is_some());
                assert!(errors.field("options").is_some());
            }
            _ => panic!("Expected PollError::Invalid {:?}", error),
        }
    }

    #[tokio::test]
    async fn create_removes_poll_when_options_fail() {
        let mut store = MockPollStore::new();
        store.expect_insert_poll()
            .times(1)
            .returning(|_| Ok(()));
        store.expect_insert_options()
            .times(1)
            .returning(|_| Err(DbError::MissingReference));
        store.expect_delete_poll()
            .times(1)
            .returning(|_, _| Ok(1));

        let error = create_poll(&store, Uuid::new_v4(), &request("Favorite color?", &["Red", "Blue"]), Utc::now())
            .await
            .expect_err("option insert failed");
        match error {
            PollError::Unexpected => (),
            _ => panic!("Expected PollError::Unexpected {:?}", error),
        }
    }

    #[tokio::test]
    async fn created_poll_without_window_is_active() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();

        let view = get_poll(&store, poll_id, now).await.unwrap();
        assert_eq!(view.status, PollStatus::Active);
        assert_eq!(view.poll.options.len(), 2);
        assert_eq!(view.total_votes, 0);
    }

    #[test]
    fn reconcile_by_value() {
        let poll_id = Uuid::new_v4();
        let existing = new_options(poll_id, vec!("Red".to_owned(), "Blue".to_owned()), Utc::now());

        let (added, removed) = reconcile_options(&existing, &["Blue".to_owned(), "Red".to_owned()]);
        assert!(added.is_empty());
        assert!(removed.is_empty());

        let (added, removed) = reconcile_options(&existing, &["Red".to_owned(), "Green".to_owned()]);
        assert_eq!(added, vec!("Green".to_owned()));
        assert_eq!(removed, vec!(existing[1].id));
    }

    #[tokio::test]
    async fn reordered_options_keep_ids() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();
        let before = option_ids(&store, poll_id).await;

        edit_poll(&store, owner, poll_id, &request("Favorite colour?", &["Blue", "Red"]), now)
            .await
            .unwrap();

        assert_eq!(before, option_ids(&store, poll_id).await);
        let poll = store.select_poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.question, "Favorite colour?");
    }

    #[tokio::test]
    async fn renamed_option_loses_its_votes() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let voter = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();
        let before = option_ids(&store, poll_id).await;
        let (_, red) = before[0].clone();
        store.insert_vote(&db::Vote {
            id: Uuid::new_v4(),
            option_id: red,
            user_id: voter,
            poll_id,
            created_at: now,
        }).await.unwrap();

        edit_poll(&store, owner, poll_id, &request("Favorite color?", &["Crimson", "Blue"]), now)
            .await
            .unwrap();

        let after = option_ids(&store, poll_id).await;
        assert_eq!(after.len(), 2);
        assert!(after.contains(&before[1]), "Blue keeps its row");
        assert!(!after.iter().any(|(_, id)| *id == red), "Red is gone");
        assert!(after.iter().any(|(value, _)| value == "Crimson"));
        assert_eq!(store.vote_count(), 0);
    }

    #[tokio::test]
    async fn edit_by_stranger_changes_nothing() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let stranger = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();
        let before = option_ids(&store, poll_id).await;

        edit_poll(&store, stranger, poll_id, &request("Stolen question", &["X", "Y"]), now)
            .await
            .expect("not owning the poll is a silent no-op");

        assert_eq!(before, option_ids(&store, poll_id).await);
        let poll = store.select_poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.question, "Favorite color?");
    }

    #[tokio::test]
    async fn edit_rejects_inverted_window() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();

        let mut edit = request("Favorite color?", &["Red", "Blue"]);
        edit.starts_at = Some(now + Duration::hours(2));
        edit.ends_at = Some(now + Duration::hours(1));
        let error = edit_poll(&store, owner, poll_id, &edit, now)
            .await
            .expect_err("end before start");
        match error {
            PollError::Invalid(errors) => assert!(errors.field("ends_at").is_some()),
            _ => panic!("Expected PollError::Invalid {:?}", error),
        }
        let poll = store.select_poll(poll_id).await.unwrap().unwrap();
        assert_eq!((poll.starts_at, poll.ends_at), (None, None));
    }

    #[tokio::test]
    async fn edit_missing_poll() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let error = edit_poll(&store, owner, Uuid::new_v4(), &request("Favorite color?", &["Red", "Blue"]), Utc::now())
            .await
            .expect_err("no such poll");
        match error {
            PollError::NotFound => (),
            _ => panic!("Expected PollError::NotFound {:?}", error),
        }
    }

    #[tokio::test]
    async fn delete_cascades_and_respects_owner() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let stranger = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();
        let (_, red) = option_ids(&store, poll_id).await[0].clone();
        store.insert_vote(&db::Vote {
            id: Uuid::new_v4(),
            option_id: red,
            user_id: stranger,
            poll_id,
            created_at: now,
        }).await.unwrap();

        delete_poll(&store, stranger, poll_id).await.unwrap();
        assert_eq!((store.poll_count(), store.option_count(), store.vote_count()), (1, 2, 1));

        delete_poll(&store, owner, poll_id).await.unwrap();
        assert_eq!((store.poll_count(), store.option_count(), store.vote_count()), (0, 0, 0));
    }

    #[tokio::test]
    async fn duplicate_copies_options_without_votes() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let copier = new_user(&store).await;
        let now = Utc::now();
        let mut original = request("Best letter?", &["A", "B"]);
        original.ends_at = Some(now + Duration::days(1));
        let poll_id = create_poll(&store, owner, &original, now).await.unwrap();
        let (_, a) = option_ids(&store, poll_id).await[0].clone();
        store.insert_vote(&db::Vote {
            id: Uuid::new_v4(),
            option_id: a,
            user_id: copier,
            poll_id,
            created_at: now,
        }).await.unwrap();

        let copy_id = duplicate_poll(&store, copier, poll_id, None, now).await.unwrap();

        let copy = get_poll(&store, copy_id, now).await.unwrap();
        assert_eq!(copy.poll.question, "Copy of Best letter?");
        assert_eq!(copy.poll.user_id, copier);
        assert_eq!(copy.poll.ends_at, None);
        assert_eq!(
            copy.poll.options.iter().map(|o| (o.value.as_str(), o.vote_count)).collect::<Vec<_>>(),
            vec!(("A", 0), ("B", 0))
        );
        assert!(copy.poll.options.iter().all(|o| o.id != a));
    }

    #[tokio::test]
    async fn duplicate_with_new_question() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Best letter?", &["A", "B"]), now).await.unwrap();

        let copy_id = duplicate_poll(&store, owner, poll_id, Some("Best vowel?".to_owned()), now)
            .await
            .unwrap();
        assert_eq!(get_poll(&store, copy_id, now).await.unwrap().poll.question, "Best vowel?");

        let error = duplicate_poll(&store, owner, poll_id, Some("A?".to_owned()), now)
            .await
            .expect_err("question too short");
        match error {
            PollError::Invalid(_) => (),
            _ => panic!("Expected PollError::Invalid {:?}", error),
        }
    }

    #[tokio::test]
    async fn duplicate_removes_copy_when_options_fail() {
        let owner = Uuid::new_v4();
        let source_id = Uuid::new_v4();
        let mut store = MockPollStore::new();
        store.expect_select_poll()
            .returning(move |id| Ok(Some(db::Poll {
                id,
                user_id: owner,
                question: "Best letter?".to_owned(),
                starts_at: None,
                ends_at: None,
                created_at: Utc::now(),
                archived: false,
            })));
        store.expect_select_options()
            .returning(|poll_id| Ok(new_options(poll_id, vec!("A".to_owned(), "B".to_owned()), Utc::now())));
        store.expect_insert_poll()
            .times(1)
            .returning(|_| Ok(()));
        store.expect_insert_options()
            .returning(|_| Err(DbError::Conflict));
        store.expect_delete_poll()
            .withf(move |user_id, poll_id| *user_id == owner && *poll_id != source_id)
            .times(1)
            .returning(|_, _| Ok(1));

        let error = duplicate_poll(&store, owner, source_id, None, Utc::now())
            .await
            .expect_err("option copy failed");
        match error {
            PollError::Unexpected => (),
            _ => panic!("Expected PollError::Unexpected {:?}", error),
        }
    }

    #[tokio::test]
    async fn archive_hides_from_listing() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let stranger = new_user(&store).await;
        let now = Utc::now();
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), now)
            .await
            .unwrap();
        let listed = |include_archived| ListPollsQuery { user_id: Some(owner), include_archived };

        set_archived(&store, stranger, poll_id, true).await.unwrap();
        assert_eq!(list_polls(&store, listed(false), now).await.unwrap().len(), 1);

        set_archived(&store, owner, poll_id, true).await.unwrap();
        assert!(list_polls(&store, listed(false), now).await.unwrap().is_empty());
        assert_eq!(list_polls(&store, listed(true), now).await.unwrap().len(), 1);
        assert!(get_poll(&store, poll_id, now).await.unwrap().poll.archived);

        set_archived(&store, owner, poll_id, false).await.unwrap();
        assert_eq!(list_polls(&store, listed(false), now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_newest_first() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let other = new_user(&store).await;
        let now = Utc::now();
        let older = create_poll(&store, owner, &request("Older poll", &["Red", "Blue"]), now - Duration::hours(1))
            .await
            .unwrap();
        let newer = create_poll(&store, owner, &request("Newer poll", &["Red", "Blue"]), now)
            .await
            .unwrap();
        create_poll(&store, other, &request("Someone else's", &["Red", "Blue"]), now)
            .await
            .unwrap();

        let mine = list_polls(&store, ListPollsQuery { user_id: Some(owner), include_archived: false }, now)
            .await
            .unwrap();
        assert_eq!(mine.iter().map(|p| p.poll.id).collect::<Vec<_>>(), vec!(newer, older));

        let all = list_polls(&store, ListPollsQuery::default(), now).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn ownership() {
        let store = MemoryStore::new();
        let owner = new_user(&store).await;
        let stranger = new_user(&store).await;
        let poll_id = create_poll(&store, owner, &request("Favorite color?", &["Red", "Blue"]), Utc::now())
            .await
            .unwrap();

        assert!(validate_ownership(&store, poll_id, Some(owner)).await);
        assert!(!validate_ownership(&store, poll_id, Some(stranger)).await);
        assert!(!validate_ownership(&store, poll_id, None).await);
        assert!(!validate_ownership(&store, Uuid::new_v4(), Some(owner)).await);
    }

    #[tokio::test]
    async fn ownership_is_false_on_storage_error() {
        let mut store = MockPollStore::new();
        store.expect_select_poll()
            .returning(|_| Err(DbError::Conflict));
        assert!(!validate_ownership(&store, Uuid::new_v4(), Some(Uuid::new_v4())).await);
    }
}
