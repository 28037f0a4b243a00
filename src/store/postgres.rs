use async_trait::async_trait;
use sqlx::PgPool;

use super::{OptionCount, PollFilter, Store, StoreResult};
use crate::error::StoreError;
use crate::models::{OptionId, Poll, PollId, PollOption, User, UserId, Vote};

/// Postgres-backed store. Cascades and vote uniqueness come from the schema
/// in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingReference;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, is_admin, token_hash, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.is_admin)
        .bind(&user.token_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET username = $2, is_admin = $3 WHERE id = $1")
            .bind(user.id)
            .bind(&user.username)
            .bind(user.is_admin)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (id, created_by, title, description, is_active, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(poll.id)
        .bind(poll.created_by)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.is_active)
        .bind(poll.created_at)
        .bind(poll.expires_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn find_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(poll)
    }

    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE polls
            SET title = $2, description = $3, is_active = $4, expires_at = $5
            WHERE id = $1
            "#,
        )
        .bind(poll.id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.is_active)
        .bind(poll.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_polls(&self, filter: PollFilter) -> StoreResult<Vec<Poll>> {
        let sql = match filter {
            PollFilter::All => "SELECT * FROM polls ORDER BY created_at DESC",
            PollFilter::Votable => {
                r#"
                SELECT p.* FROM polls p
                WHERE p.is_active
                  AND EXISTS (SELECT 1 FROM options o WHERE o.poll_id = p.id)
                ORDER BY p.created_at DESC
                "#
            }
        };
        let polls = sqlx::query_as::<_, Poll>(sql).fetch_all(&self.pool).await?;
        Ok(polls)
    }

    async fn insert_option(&self, option: &PollOption) -> StoreResult<()> {
        sqlx::query("INSERT INTO options (id, poll_id, label) VALUES ($1, $2, $3)")
            .bind(option.id)
            .bind(option.poll_id)
            .bind(&option.label)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_option(&self, id: OptionId) -> StoreResult<Option<PollOption>> {
        let option = sqlx::query_as::<_, PollOption>("SELECT * FROM options WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(option)
    }

    async fn update_option(&self, option: &PollOption) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE options SET label = $2 WHERE id = $1")
            .bind(option.id)
            .bind(&option.label)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_option(&self, id: OptionId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM options WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_options(&self, poll: PollId) -> StoreResult<Vec<PollOption>> {
        let options =
            sqlx::query_as::<_, PollOption>("SELECT * FROM options WHERE poll_id = $1 ORDER BY label")
                .bind(poll)
                .fetch_all(&self.pool)
                .await?;
        Ok(options)
    }

    async fn options_for_polls(&self, polls: &[PollId]) -> StoreResult<Vec<PollOption>> {
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT * FROM options WHERE poll_id = ANY($1) ORDER BY poll_id, label",
        )
        .bind(polls)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        // UNIQUE (user_id, poll_id) serializes concurrent attempts; the loser
        // gets a unique violation and nothing is written.
        sqlx::query(
            r#"
            INSERT INTO votes (id, user_id, poll_id, option_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vote.id)
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn tally(&self, poll: PollId) -> StoreResult<Vec<OptionCount>> {
        let counts = sqlx::query_as::<_, OptionCount>(
            r#"
            SELECT o.id AS option_id, o.label, COUNT(v.id) AS votes
            FROM options o
            LEFT JOIN votes v ON v.option_id = o.id
            WHERE o.poll_id = $1
            GROUP BY o.id, o.label
            ORDER BY o.label
            "#,
        )
        .bind(poll)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}

/// Run against the database named by `DATABASE_URL`; skipped when it is unset.
/// Every test works on freshly generated rows, so a shared database is fine.
#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::db::create_pool;
    use crate::users::hash_token;

    async fn store() -> Option<PgStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres store test");
            return None;
        };
        Some(PgStore::new(create_pool(&url, 10).await.unwrap()))
    }

    async fn user(store: &PgStore, is_admin: bool) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            username: format!("user-{}", id.simple()),
            is_admin,
            token_hash: hash_token(&id.to_string()),
            created_at: Utc::now(),
        };
        store.insert_user(&user).await.unwrap();
        user
    }

    async fn poll_with(store: &PgStore, owner: &User, labels: &[&str]) -> (Poll, Vec<PollOption>) {
        let poll = Poll {
            id: Uuid::new_v4(),
            created_by: owner.id,
            title: "Lunch".to_string(),
            description: String::new(),
            is_active: true,
            created_at: Utc::now(),
            expires_at: None,
        };
        store.insert_poll(&poll).await.unwrap();
        let mut options = Vec::new();
        for label in labels {
            let option = PollOption {
                id: Uuid::new_v4(),
                poll_id: poll.id,
                label: label.to_string(),
            };
            store.insert_option(&option).await.unwrap();
            options.push(option);
        }
        (poll, options)
    }

    fn vote(user: &User, poll: &Poll, option: &PollOption) -> Vote {
        Vote {
            id: Uuid::new_v4(),
            user_id: user.id,
            poll_id: poll.id,
            option_id: option.id,
            created_at: Utc::now(),
        }
    }

    async fn votes_in(store: &PgStore, poll: PollId) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = $1")
            .bind(poll)
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_for_one_pair_keep_one_vote() {
        let Some(store) = store().await else { return };
        let owner = user(&store, true).await;
        let voter = user(&store, false).await;
        let (poll, options) = poll_with(&store, &owner, &["A", "B"]).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let vote = vote(&voter, &poll, &options[i % 2]);
            handles.push(tokio::spawn(async move { store.insert_vote(&vote).await }));
        }

        let mut accepted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(StoreError::Conflict) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((accepted, conflicts), (1, 7));
        assert_eq!(votes_in(&store, poll.id).await, 1);
    }

    #[tokio::test]
    async fn option_of_another_poll_is_a_missing_reference() {
        let Some(store) = store().await else { return };
        let owner = user(&store, true).await;
        let voter = user(&store, false).await;
        let (poll, _) = poll_with(&store, &owner, &["Mine"]).await;
        let (_, foreign) = poll_with(&store, &owner, &["Theirs"]).await;

        let err = store
            .insert_vote(&vote(&voter, &poll, &foreign[0]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference));
        assert_eq!(votes_in(&store, poll.id).await, 0);
    }

    #[tokio::test]
    async fn duplicate_username_and_label_conflict() {
        let Some(store) = store().await else { return };
        let owner = user(&store, true).await;
        let twin = User {
            id: Uuid::new_v4(),
            token_hash: hash_token(&Uuid::new_v4().to_string()),
            ..owner.clone()
        };
        assert!(matches!(store.insert_user(&twin).await, Err(StoreError::Conflict)));

        let (poll, options) = poll_with(&store, &owner, &["Same"]).await;
        let again = PollOption {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            label: options[0].label.clone(),
        };
        assert!(matches!(store.insert_option(&again).await, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn tally_includes_options_without_votes() {
        let Some(store) = store().await else { return };
        let owner = user(&store, true).await;
        let voter = user(&store, false).await;
        let (poll, options) = poll_with(&store, &owner, &["Yes", "No", "Maybe"]).await;
        store.insert_vote(&vote(&voter, &poll, &options[0])).await.unwrap();

        let counts: Vec<(String, i64)> = store
            .tally(poll.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.label, c.votes))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("Maybe".to_string(), 0),
                ("No".to_string(), 0),
                ("Yes".to_string(), 1)
            ]
        );
    }

    #[tokio::test]
    async fn deletes_cascade_to_dependents() {
        let Some(store) = store().await else { return };
        let owner = user(&store, true).await;
        let voter = user(&store, false).await;
        let other = user(&store, false).await;
        let (poll, options) = poll_with(&store, &owner, &["A", "B"]).await;
        store.insert_vote(&vote(&voter, &poll, &options[0])).await.unwrap();
        store.insert_vote(&vote(&other, &poll, &options[1])).await.unwrap();

        assert!(store.delete_option(options[1].id).await.unwrap());
        assert_eq!(votes_in(&store, poll.id).await, 1);

        assert!(store.delete_user(voter.id).await.unwrap());
        assert_eq!(votes_in(&store, poll.id).await, 0);
        assert!(store.find_poll(poll.id).await.unwrap().is_some());

        store.insert_vote(&vote(&other, &poll, &options[0])).await.unwrap();
        assert!(store.delete_poll(poll.id).await.unwrap());
        assert!(store.find_option(options[0].id).await.unwrap().is_none());
        assert_eq!(votes_in(&store, poll.id).await, 0);
        assert!(!store.delete_poll(poll.id).await.unwrap());

        let (owned, _) = poll_with(&store, &owner, &["C"]).await;
        assert!(store.delete_user(owner.id).await.unwrap());
        assert!(store.find_poll(owned.id).await.unwrap().is_none());
    }
}
