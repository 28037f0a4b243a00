//! Participant registration and bearer-token resolution.
//!
//! Tokens are handed out once at registration and stored only as a SHA-256
//! digest.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::models::{NewUser, User, UserChanges, UserId};
use crate::policy::{Action, Actor};
use crate::service::Core;

const MAX_USERNAME_LEN: usize = 150;

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::validation(format!(
            "username must be between 1 and {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(Error::validation(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    Ok(username.to_string())
}

/// A freshly registered user with the only copy of its bearer token.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub token: String,
}

impl Core {
    /// Registers a participant. Creating an administrator requires an
    /// administrator caller.
    pub async fn register_user(&self, actor: &Actor, new: NewUser) -> Result<Registration> {
        let action = if new.is_admin {
            Action::ManageUsers
        } else {
            Action::RegisterParticipant
        };
        self.policy.authorize(actor, action)?;

        let token = generate_token();
        let user = User {
            id: Uuid::new_v4(),
            username: validate_username(&new.username)?,
            is_admin: new.is_admin,
            token_hash: hash_token(&token),
            created_at: Utc::now(),
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                return Err(Error::validation("a user with that username already exists"))
            }
            Err(e) => return Err(e.into()),
        }

        info!(user = %user.id, admin = user.is_admin, "user registered");
        Ok(Registration { user, token })
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        self.policy.authorize(actor, Action::ManageUsers)?;
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, actor: &Actor, id: UserId) -> Result<User> {
        self.policy.authorize(actor, Action::ManageUsers)?;
        self.store.find_user(id).await?.ok_or(Error::NotFound("user"))
    }

    pub async fn update_user(&self, actor: &Actor, id: UserId, changes: UserChanges) -> Result<User> {
        self.policy.authorize(actor, Action::ManageUsers)?;
        let mut user = self.store.find_user(id).await?.ok_or(Error::NotFound("user"))?;

        if let Some(username) = changes.username {
            user.username = validate_username(&username)?;
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }

        match self.store.update_user(&user).await {
            Ok(true) => {}
            Ok(false) => return Err(Error::NotFound("user")),
            Err(StoreError::Conflict) => {
                return Err(Error::validation("a user with that username already exists"))
            }
            Err(e) => return Err(e.into()),
        }
        info!(user = %id, admin = user.is_admin, "user updated");
        Ok(user)
    }

    /// Deletes the account together with its votes and the polls it created.
    pub async fn delete_user(&self, actor: &Actor, id: UserId) -> Result<()> {
        self.policy.authorize(actor, Action::ManageUsers)?;
        if !self.store.delete_user(id).await? {
            return Err(Error::NotFound("user"));
        }
        info!(user = %id, "user deleted");
        Ok(())
    }

    /// Resolves a bearer token. No token means an anonymous caller; an
    /// unknown token is rejected.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Actor> {
        let Some(token) = token else {
            return Ok(Actor::Anonymous);
        };

        match self.store.find_user_by_token_hash(&hash_token(token)).await? {
            Some(user) => Ok(Actor::from(&user)),
            None => {
                warn!("rejected unknown bearer token");
                Err(Error::Unauthorized)
            }
        }
    }

    /// Makes sure an administrator holding `token` exists.
    pub async fn ensure_admin(&self, username: &str, token: &str) -> Result<User> {
        let token_hash = hash_token(token);
        if let Some(user) = self.store.find_user_by_token_hash(&token_hash).await? {
            if !user.is_admin {
                return Err(Error::validation(
                    "the bootstrap token belongs to a non-administrator",
                ));
            }
            return Ok(user);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: validate_username(username)?,
            is_admin: true,
            token_hash,
            created_at: Utc::now(),
        };
        match self.store.insert_user(&user).await {
            Ok(()) => {
                info!(user = %user.id, "bootstrap administrator created");
                Ok(user)
            }
            Err(StoreError::Conflict) => Err(Error::validation(format!(
                "username {username} is taken by an account with a different token"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
