//! Per-role projections applied at the API boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::lifecycle::PollDetails;
use crate::models::{PollOption, User};
use crate::policy::Actor;
use crate::users::Registration;

#[derive(Debug, Serialize)]
pub struct OptionView {
    pub id: Uuid,
    pub label: String,
}

impl From<PollOption> for OptionView {
    fn from(option: PollOption) -> Self {
        Self {
            id: option.id,
            label: option.label,
        }
    }
}

/// `is_active` and `created_at` are only shown to administrators.
#[derive(Debug, Serialize)]
pub struct PollView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub options: Vec<OptionView>,
}

impl PollView {
    pub fn project(actor: &Actor, PollDetails { poll, options }: PollDetails) -> Self {
        let admin = actor.is_admin();
        Self {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            created_by: poll.created_by,
            is_active: admin.then_some(poll.is_active),
            created_at: admin.then_some(poll.created_at),
            expires_at: poll.expires_at,
            options: options.into_iter().map(OptionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegistrationView {
    pub user: UserView,
    pub token: String,
}

impl From<Registration> for RegistrationView {
    fn from(Registration { user, token }: Registration) -> Self {
        Self {
            user: user.into(),
            token,
        }
    }
}
