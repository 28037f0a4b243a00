use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::PollId;
use crate::policy::{Action, Actor};
use crate::service::Core;
use crate::store::OptionCount;

/// Vote counts for every option of a poll, zero-vote options included.
#[derive(Debug, Clone, Serialize)]
pub struct Tally {
    pub poll_id: PollId,
    pub entries: Vec<OptionCount>,
    pub total: i64,
}

impl Tally {
    pub fn new(poll_id: PollId, entries: Vec<OptionCount>) -> Self {
        let total = entries.iter().map(|e| e.votes).sum();
        Self {
            poll_id,
            entries,
            total,
        }
    }

    /// `label -> count`, the shape returned by the results endpoint.
    pub fn by_label(&self) -> BTreeMap<String, i64> {
        self.entries
            .iter()
            .map(|e| (e.label.clone(), e.votes))
            .collect()
    }

    pub fn counts(&self) -> Vec<(&str, i64)> {
        self.entries
            .iter()
            .map(|e| (e.label.as_str(), e.votes))
            .collect()
    }
}

impl Core {
    /// Counts the votes of `poll_id` with a single grouped read.
    pub async fn tally(&self, actor: &Actor, poll_id: PollId) -> Result<Tally> {
        self.policy.authorize(actor, Action::ViewResults)?;
        let poll = self.visible_poll(actor, poll_id).await?;

        let entries = self.store.tally(poll.id).await?;
        Ok(Tally::new(poll.id, entries))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use crate::models::{NewPoll, OptionLabel};
    use crate::policy::AccessPolicy;
    use crate::store::MemoryStore;
    use crate::users::tests::register;

    async fn poll_with(core: &Core, admin: &Actor, labels: &[&str]) -> PollId {
        let poll = core
            .create_poll(
                admin,
                NewPoll {
                    title: "Tally".to_string(),
                    description: String::new(),
                    is_active: true,
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        for label in labels {
            core.add_option(admin, poll.id, OptionLabel { label: label.to_string() })
                .await
                .unwrap();
        }
        poll.id
    }

    #[tokio::test]
    async fn empty_poll_has_empty_tally() {
        let core = Core::new(Arc::new(MemoryStore::new()), AccessPolicy::default());
        let admin = register(&core, "admin", true).await;
        let poll = poll_with(&core, &admin, &[]).await;

        let tally = core.tally(&admin, poll).await.unwrap();
        assert!(tally.by_label().is_empty());
        assert_eq!(tally.total, 0);
    }

    #[tokio::test]
    async fn each_vote_moves_only_its_option() {
        let core = Core::new(Arc::new(MemoryStore::new()), AccessPolicy::default());
        let admin = register(&core, "admin", true).await;
        let poll = poll_with(&core, &admin, &["Yes", "No", "Maybe"]).await;
        let options = core.list_options(&admin, poll).await.unwrap();
        let yes = options.iter().find(|o| o.label == "Yes").unwrap().id;

        let before = core.tally(&admin, poll).await.unwrap().by_label();
        assert_eq!(before.values().sum::<i64>(), 0);
        assert_eq!(before.len(), 3);

        let voter = register(&core, "voter", false).await;
        core.cast_vote(&voter, poll, yes).await.unwrap();

        let after = core.tally(&admin, poll).await.unwrap().by_label();
        assert_eq!(after["Yes"], before["Yes"] + 1);
        assert_eq!(after["No"], before["No"]);
        assert_eq!(after["Maybe"], before["Maybe"]);
    }

    #[tokio::test]
    async fn participants_need_policy_opt_in() {
        let store = Arc::new(MemoryStore::new());
        let closed = Core::new(store.clone(), AccessPolicy::default());
        let open = Core::new(
            store,
            AccessPolicy {
                participants_view_results: true,
            },
        );
        let admin = register(&closed, "admin", true).await;
        let voter = register(&closed, "voter", false).await;
        let poll = poll_with(&closed, &admin, &["Only"]).await;

        assert!(matches!(closed.tally(&voter, poll).await, Err(Error::Forbidden)));
        assert_eq!(open.tally(&voter, poll).await.unwrap().counts(), vec![("Only", 0)]);
    }
}
