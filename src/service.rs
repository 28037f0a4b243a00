use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Poll, PollId};
use crate::policy::{AccessPolicy, Actor};
use crate::store::Store;

/// Entry point for every poll, option, vote and user operation.
///
/// Operations take the acting identity explicitly and check it against the
/// [`AccessPolicy`] before reading or writing the store.
#[derive(Clone)]
pub struct Core {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) policy: AccessPolicy,
}

impl Core {
    pub fn new(store: Arc<dyn Store>, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Loads a poll the actor is allowed to see. Polls hidden from
    /// participants are reported as missing.
    pub(crate) async fn visible_poll(&self, actor: &Actor, id: PollId) -> Result<Poll> {
        let poll = self
            .store
            .find_poll(id)
            .await?
            .ok_or(Error::NotFound("poll"))?;

        if actor.is_admin() {
            return Ok(poll);
        }
        if !poll.is_active || self.store.list_options(id).await?.is_empty() {
            return Err(Error::NotFound("poll"));
        }
        Ok(poll)
    }

    pub(crate) async fn existing_poll(&self, id: PollId) -> Result<Poll> {
        self.store
            .find_poll(id)
            .await?
            .ok_or(Error::NotFound("poll"))
    }
}
