//! Access policy.
//!
//! Every core operation asks [`AccessPolicy::authorize`] before touching the
//! store. The table in [`AccessPolicy::decide`] is the only place where roles
//! are mapped to permissions.

use crate::error::{Error, Result};
use crate::models::{User, UserId};

/// The caller of a core operation, resolved at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Participant(UserId),
    Administrator(UserId),
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Administrator(_))
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::Participant(id) | Actor::Administrator(id) => Some(*id),
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        if user.is_admin {
            Actor::Administrator(user.id)
        } else {
            Actor::Participant(user.id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListPolls,
    ViewPoll,
    CreatePoll,
    UpdatePoll,
    DeletePoll,
    ListOptions,
    AddOption,
    UpdateOption,
    DeleteOption,
    CastVote,
    ViewResults,
    RegisterParticipant,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
    /// Lets participants read tallies. Off unless configured.
    pub participants_view_results: bool,
}

impl AccessPolicy {
    pub fn decide(&self, actor: &Actor, action: Action) -> Decision {
        use Action::*;

        let allowed = match actor {
            Actor::Anonymous => matches!(action, RegisterParticipant),
            // single-poll and option reads stay with administrators
            Actor::Participant(_) => match action {
                ListPolls | CastVote => true,
                ViewResults => self.participants_view_results,
                _ => false,
            },
            // administrators own polls and never vote in them
            Actor::Administrator(_) => !matches!(action, CastVote),
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub fn authorize(&self, actor: &Actor, action: Action) -> Result<()> {
        match (self.decide(actor, action), actor) {
            (Decision::Allow, _) => Ok(()),
            (Decision::Deny, Actor::Anonymous) => Err(Error::Unauthorized),
            (Decision::Deny, _) => {
                tracing::debug!(?actor, ?action, "access denied");
                Err(Error::Forbidden)
            }
        }
    }
}
