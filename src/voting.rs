//! Voting core: one vote per participant per poll.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::models::{OptionId, PollId, Vote};
use crate::policy::{Action, Actor};
use crate::service::Core;

impl Core {
    /// Records `actor`'s vote for `option` in `poll`.
    ///
    /// The option must belong to the poll. The `(user, poll)` uniqueness is
    /// enforced by the store's single constrained insert, so concurrent
    /// attempts by one participant resolve to exactly one accepted vote.
    pub async fn cast_vote(&self, actor: &Actor, poll_id: PollId, option_id: OptionId) -> Result<Vote> {
        self.policy.authorize(actor, Action::CastVote)?;
        let user_id = actor.user_id().ok_or(Error::Unauthorized)?;

        self.visible_poll(actor, poll_id).await?;

        match self.store.find_option(option_id).await? {
            Some(option) if option.poll_id == poll_id => {}
            _ => {
                debug!(poll = %poll_id, option = %option_id, "option outside poll");
                return Err(Error::InvalidOption);
            }
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            user_id,
            poll_id,
            option_id,
            created_at: Utc::now(),
        };

        match self.store.insert_vote(&vote).await {
            Ok(()) => {
                info!(poll = %poll_id, user = %user_id, option = %option_id, "vote recorded");
                Ok(vote)
            }
            Err(StoreError::Conflict) => {
                debug!(poll = %poll_id, user = %user_id, "duplicate vote rejected");
                Err(Error::DuplicateVote)
            }
            // option deleted between the lookup and the insert
            Err(StoreError::MissingReference) => Err(Error::InvalidOption),
            Err(e) => Err(e.into()),
        }
    }
}
