// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PollId = Uuid;
pub type OptionId = Uuid;
pub type VoteId = Uuid;

/// Identity as the core sees it. Credentials beyond the token digest live
/// with the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    #[serde(skip)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: PollId,
    pub created_by: UserId,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub label: String,
}

/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: VoteId,
    pub user_id: UserId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub title: String,
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Partial update. `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl From<NewPoll> for PollChanges {
    fn from(poll: NewPoll) -> Self {
        Self {
            title: Some(poll.title),
            description: Some(poll.description),
            is_active: Some(poll.is_active),
            expires_at: Some(poll.expires_at),
        }
    }
}

impl PollChanges {
    pub fn apply(self, poll: &mut Poll) {
        if let Some(title) = self.title {
            poll.title = title;
        }
        if let Some(description) = self.description {
            poll.description = description;
        }
        if let Some(is_active) = self.is_active {
            poll.is_active = is_active;
        }
        if let Some(expires_at) = self.expires_at {
            poll.expires_at = expires_at;
        }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionLabel {
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub option: OptionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Partial update of an account. The token is never changed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}
