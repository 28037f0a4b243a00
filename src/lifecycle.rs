//! Poll lifecycle: creation, updates, option management and visibility.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::models::{NewPoll, OptionId, OptionLabel, Poll, PollChanges, PollId, PollOption};
use crate::policy::{Action, Actor};
use crate::service::Core;
use crate::store::PollFilter;

const MAX_TITLE_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 255;

fn validate_text(field: &str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} may not be blank")));
    }
    if trimmed.chars().count() > max {
        return Err(Error::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn label_conflict(err: StoreError) -> Error {
    match err {
        StoreError::Conflict => Error::validation("an option with this label already exists"),
        StoreError::MissingReference => Error::NotFound("poll"),
        other => other.into(),
    }
}

/// A poll together with its options.
#[derive(Debug, Clone)]
pub struct PollDetails {
    pub poll: Poll,
    pub options: Vec<PollOption>,
}

impl Core {
    pub async fn create_poll(&self, actor: &Actor, new: NewPoll) -> Result<Poll> {
        self.policy.authorize(actor, Action::CreatePoll)?;
        let created_by = actor.user_id().ok_or(Error::Unauthorized)?;

        let poll = Poll {
            id: Uuid::new_v4(),
            created_by,
            title: validate_text("title", &new.title, MAX_TITLE_LEN)?,
            description: new.description,
            is_active: new.is_active,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        self.store.insert_poll(&poll).await?;

        info!(poll = %poll.id, user = %created_by, "poll created");
        Ok(poll)
    }

    pub async fn get_poll(&self, actor: &Actor, id: PollId) -> Result<PollDetails> {
        self.policy.authorize(actor, Action::ViewPoll)?;
        let poll = self.visible_poll(actor, id).await?;
        let options = self.store.list_options(id).await?;
        Ok(PollDetails { poll, options })
    }

    /// Applies `changes` to the poll. A full replacement is a
    /// [`PollChanges`] with every field set.
    pub async fn update_poll(&self, actor: &Actor, id: PollId, changes: PollChanges) -> Result<Poll> {
        self.policy.authorize(actor, Action::UpdatePoll)?;
        let mut poll = self.existing_poll(id).await?;

        let changes = PollChanges {
            title: changes
                .title
                .map(|t| validate_text("title", &t, MAX_TITLE_LEN))
                .transpose()?,
            ..changes
        };
        changes.apply(&mut poll);

        if !self.store.update_poll(&poll).await? {
            return Err(Error::NotFound("poll"));
        }
        info!(poll = %id, "poll updated");
        Ok(poll)
    }

    /// Deletes the poll; its options and votes go with it.
    pub async fn delete_poll(&self, actor: &Actor, id: PollId) -> Result<()> {
        self.policy.authorize(actor, Action::DeletePoll)?;
        if !self.store.delete_poll(id).await? {
            return Err(Error::NotFound("poll"));
        }
        info!(poll = %id, "poll deleted");
        Ok(())
    }

    /// Administrators see every poll; everybody else only sees active polls
    /// that have at least one option.
    pub async fn list_polls(&self, actor: &Actor) -> Result<Vec<PollDetails>> {
        self.policy.authorize(actor, Action::ListPolls)?;
        let filter = if actor.is_admin() {
            PollFilter::All
        } else {
            PollFilter::Votable
        };

        let polls = self.store.list_polls(filter).await?;
        let ids: Vec<PollId> = polls.iter().map(|p| p.id).collect();

        let mut grouped: HashMap<PollId, Vec<PollOption>> = HashMap::new();
        for option in self.store.options_for_polls(&ids).await? {
            grouped.entry(option.poll_id).or_default().push(option);
        }

        Ok(polls
            .into_iter()
            .map(|poll| {
                let options = grouped.remove(&poll.id).unwrap_or_default();
                PollDetails { poll, options }
            })
            // options may have been deleted since the poll read
            .filter(|d| filter == PollFilter::All || !d.options.is_empty())
            .collect())
    }

    pub async fn list_options(&self, actor: &Actor, poll_id: PollId) -> Result<Vec<PollOption>> {
        self.policy.authorize(actor, Action::ListOptions)?;
        self.visible_poll(actor, poll_id).await?;
        Ok(self.store.list_options(poll_id).await?)
    }

    /// Adds an option and returns the poll's full option list.
    pub async fn add_option(&self, actor: &Actor, poll_id: PollId, new: OptionLabel) -> Result<Vec<PollOption>> {
        self.policy.authorize(actor, Action::AddOption)?;
        self.existing_poll(poll_id).await?;

        let option = PollOption {
            id: Uuid::new_v4(),
            poll_id,
            label: validate_text("label", &new.label, MAX_LABEL_LEN)?,
        };
        self.store.insert_option(&option).await.map_err(label_conflict)?;

        info!(poll = %poll_id, option = %option.id, "option added");
        Ok(self.store.list_options(poll_id).await?)
    }

    pub async fn update_option(
        &self,
        actor: &Actor,
        poll_id: PollId,
        option_id: OptionId,
        changes: OptionLabel,
    ) -> Result<PollOption> {
        self.policy.authorize(actor, Action::UpdateOption)?;
        let mut option = self.option_in_poll(poll_id, option_id).await?;

        option.label = validate_text("label", &changes.label, MAX_LABEL_LEN)?;
        if !self.store.update_option(&option).await.map_err(label_conflict)? {
            return Err(Error::NotFound("option"));
        }
        Ok(option)
    }

    /// Deletes the option and every vote cast for it.
    pub async fn delete_option(&self, actor: &Actor, poll_id: PollId, option_id: OptionId) -> Result<()> {
        self.policy.authorize(actor, Action::DeleteOption)?;
        self.option_in_poll(poll_id, option_id).await?;

        if !self.store.delete_option(option_id).await? {
            return Err(Error::NotFound("option"));
        }
        info!(poll = %poll_id, option = %option_id, "option deleted");
        Ok(())
    }

    /// An option addressed through a poll it does not belong to is missing.
    async fn option_in_poll(&self, poll_id: PollId, option_id: OptionId) -> Result<PollOption> {
        self.existing_poll(poll_id).await?;
        self.store
            .find_option(option_id)
            .await?
            .filter(|o| o.poll_id == poll_id)
            .ok_or(Error::NotFound("option"))
    }
}
