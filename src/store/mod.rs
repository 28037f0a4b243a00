//! Entity store.
//!
//! Durable records for users, polls, options and votes. Cascading deletes and
//! the `(user, poll)` vote uniqueness are the store's job; everything else is
//! enforced by the core.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{OptionId, Poll, PollId, PollOption, User, UserId, Vote};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFilter {
    All,
    /// Active polls with at least one option.
    Votable,
}

/// Vote count for one option, as produced by the grouped tally read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OptionCount {
    pub option_id: OptionId,
    pub label: String,
    pub votes: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`StoreError::Conflict`] on a taken username or token.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Fails with [`StoreError::Conflict`] on a taken username.
    async fn update_user(&self, user: &User) -> StoreResult<bool>;
    /// Removes the user with their votes and the polls they created.
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;

    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()>;
    async fn find_poll(&self, id: PollId) -> StoreResult<Option<Poll>>;
    /// Returns false if the poll no longer exists.
    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool>;
    /// Removes the poll with its options and votes.
    async fn delete_poll(&self, id: PollId) -> StoreResult<bool>;
    async fn list_polls(&self, filter: PollFilter) -> StoreResult<Vec<Poll>>;

    /// Fails with [`StoreError::Conflict`] when the label is taken in the poll.
    async fn insert_option(&self, option: &PollOption) -> StoreResult<()>;
    async fn find_option(&self, id: OptionId) -> StoreResult<Option<PollOption>>;
    async fn update_option(&self, option: &PollOption) -> StoreResult<bool>;
    /// Removes the option with its votes.
    async fn delete_option(&self, id: OptionId) -> StoreResult<bool>;
    async fn list_options(&self, poll: PollId) -> StoreResult<Vec<PollOption>>;
    async fn options_for_polls(&self, polls: &[PollId]) -> StoreResult<Vec<PollOption>>;

    /// Atomically inserts the vote. A vote already recorded for the same
    /// `(user, poll)` pair yields [`StoreError::Conflict`] and writes nothing.
    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()>;

    /// One aggregate read: every option of the poll with its vote count,
    /// zero-vote options included, ordered by label.
    async fn tally(&self, poll: PollId) -> StoreResult<Vec<OptionCount>>;
}
