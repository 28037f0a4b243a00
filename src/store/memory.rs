use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{OptionCount, PollFilter, Store, StoreResult};
use crate::error::StoreError;
use crate::models::{OptionId, Poll, PollId, PollOption, User, UserId, Vote, VoteId};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    polls: HashMap<PollId, Poll>,
    options: HashMap<OptionId, PollOption>,
    votes: HashMap<VoteId, Vote>,
}

impl Tables {
    fn has_options(&self, poll: PollId) -> bool {
        self.options.values().any(|o| o.poll_id == poll)
    }

    fn label_taken(&self, option: &PollOption) -> bool {
        self.options
            .values()
            .any(|o| o.poll_id == option.poll_id && o.id != option.id && o.label == option.label)
    }
}

/// In-process store. Each operation holds the table lock for its whole
/// duration, which makes every write atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_label(mut options: Vec<PollOption>) -> Vec<PollOption> {
    options.sort_by(|a, b| a.label.cmp(&b.label));
    options
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let taken = tables
            .users
            .values()
            .any(|u| u.username == user.username || u.token_hash == user.token_hash);
        if taken || tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict);
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read();
        Ok(tables.users.values().find(|u| u.token_hash == token_hash).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().users.values().cloned().collect();
        users.sort_by(|a, b| (a.created_at, &a.username).cmp(&(b.created_at, &b.username)));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&user.id) {
            return Ok(false);
        }
        let taken = tables
            .users
            .values()
            .any(|u| u.id != user.id && u.username == user.username);
        if taken {
            return Err(StoreError::Conflict);
        }
        if let Some(existing) = tables.users.get_mut(&user.id) {
            existing.username = user.username.clone();
            existing.is_admin = user.is_admin;
        }
        Ok(true)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<PollId> = tables
            .polls
            .values()
            .filter(|p| p.created_by == id)
            .map(|p| p.id)
            .collect();
        tables.polls.retain(|_, p| p.created_by != id);
        tables.options.retain(|_, o| !owned.contains(&o.poll_id));
        tables
            .votes
            .retain(|_, v| v.user_id != id && !owned.contains(&v.poll_id));
        Ok(true)
    }

    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&poll.created_by) {
            return Err(StoreError::MissingReference);
        }
        if tables.polls.contains_key(&poll.id) {
            return Err(StoreError::Conflict);
        }
        tables.polls.insert(poll.id, poll.clone());
        Ok(())
    }

    async fn find_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        Ok(self.tables.read().polls.get(&id).cloned())
    }

    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.polls.get_mut(&poll.id) {
            Some(existing) => {
                existing.title = poll.title.clone();
                existing.description = poll.description.clone();
                existing.is_active = poll.is_active;
                existing.expires_at = poll.expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.polls.remove(&id).is_none() {
            return Ok(false);
        }
        tables.options.retain(|_, o| o.poll_id != id);
        tables.votes.retain(|_, v| v.poll_id != id);
        Ok(true)
    }

    async fn list_polls(&self, filter: PollFilter) -> StoreResult<Vec<Poll>> {
        let tables = self.tables.read();
        let mut polls: Vec<Poll> = tables
            .polls
            .values()
            .filter(|p| match filter {
                PollFilter::All => true,
                PollFilter::Votable => p.is_active && tables.has_options(p.id),
            })
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn insert_option(&self, option: &PollOption) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.polls.contains_key(&option.poll_id) {
            return Err(StoreError::MissingReference);
        }
        if tables.options.contains_key(&option.id) || tables.label_taken(option) {
            return Err(StoreError::Conflict);
        }
        tables.options.insert(option.id, option.clone());
        Ok(())
    }

    async fn find_option(&self, id: OptionId) -> StoreResult<Option<PollOption>> {
        Ok(self.tables.read().options.get(&id).cloned())
    }

    async fn update_option(&self, option: &PollOption) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if !tables.options.contains_key(&option.id) {
            return Ok(false);
        }
        if tables.label_taken(option) {
            return Err(StoreError::Conflict);
        }
        if let Some(existing) = tables.options.get_mut(&option.id) {
            existing.label = option.label.clone();
        }
        Ok(true)
    }

    async fn delete_option(&self, id: OptionId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.options.remove(&id).is_none() {
            return Ok(false);
        }
        tables.votes.retain(|_, v| v.option_id != id);
        Ok(true)
    }

    async fn list_options(&self, poll: PollId) -> StoreResult<Vec<PollOption>> {
        let tables = self.tables.read();
        let options = tables
            .options
            .values()
            .filter(|o| o.poll_id == poll)
            .cloned()
            .collect();
        Ok(sorted_by_label(options))
    }

    async fn options_for_polls(&self, polls: &[PollId]) -> StoreResult<Vec<PollOption>> {
        let tables = self.tables.read();
        let options = tables
            .options
            .values()
            .filter(|o| polls.contains(&o.poll_id))
            .cloned()
            .collect();
        Ok(sorted_by_label(options))
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let belongs = tables
            .options
            .get(&vote.option_id)
            .is_some_and(|o| o.poll_id == vote.poll_id);
        if !belongs || !tables.users.contains_key(&vote.user_id) {
            return Err(StoreError::MissingReference);
        }
        let duplicate = tables
            .votes
            .values()
            .any(|v| v.user_id == vote.user_id && v.poll_id == vote.poll_id);
        if duplicate {
            return Err(StoreError::Conflict);
        }
        tables.votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn tally(&self, poll: PollId) -> StoreResult<Vec<OptionCount>> {
        let tables = self.tables.read();
        let mut counts: HashMap<OptionId, i64> = tables
            .options
            .values()
            .filter(|o| o.poll_id == poll)
            .map(|o| (o.id, 0))
            .collect();
        for vote in tables.votes.values().filter(|v| v.poll_id == poll) {
            if let Some(count) = counts.get_mut(&vote.option_id) {
                *count += 1;
            }
        }

        let mut tally: Vec<OptionCount> = counts
            .into_iter()
            .filter_map(|(id, votes)| {
                tables.options.get(&id).map(|o| OptionCount {
                    option_id: id,
                    label: o.label.clone(),
                    votes,
                })
            })
            .collect();
        tally.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            is_admin: false,
            token_hash: format!("hash-{name}"),
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (MemoryStore, User, Poll, PollOption) {
        let store = MemoryStore::new();
        let owner = user("owner");
        store.insert_user(&owner).await.unwrap();
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
        let option = PollOption {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            label: "Pizza".to_string(),
        };
        store.insert_option(&option).await.unwrap();
        (store, owner, poll, option)
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

    #[tokio::test]
    async fn second_vote_for_same_poll_conflicts() {
        let (store, _, poll, option) = seeded().await;
        let voter = user("voter");
        store.insert_user(&voter).await.unwrap();

        store.insert_vote(&vote(&voter, &poll, &option)).await.unwrap();
        let err = store.insert_vote(&vote(&voter, &poll, &option)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.tally(poll.id).await.unwrap()[0].votes, 1);
    }

    #[tokio::test]
    async fn vote_for_foreign_option_is_rejected() {
        let (store, owner, poll, _) = seeded().await;
        let other = Poll {
            id: Uuid::new_v4(),
            ..poll.clone()
        };
        store.insert_poll(&other).await.unwrap();
        let foreign = PollOption {
            id: Uuid::new_v4(),
            poll_id: other.id,
            label: "Sushi".to_string(),
        };
        store.insert_option(&foreign).await.unwrap();

        let err = store.insert_vote(&vote(&owner, &poll, &foreign)).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingReference));
    }

    #[tokio::test]
    async fn deleting_poll_cascades() {
        let (store, owner, poll, option) = seeded().await;
        store.insert_vote(&vote(&owner, &poll, &option)).await.unwrap();

        assert!(store.delete_poll(poll.id).await.unwrap());
        assert!(store.find_option(option.id).await.unwrap().is_none());
        assert!(store.tables.read().votes.is_empty());
        assert!(!store.delete_poll(poll.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_option_cascades_to_votes_only() {
        let (store, owner, poll, option) = seeded().await;
        store.insert_vote(&vote(&owner, &poll, &option)).await.unwrap();

        assert!(store.delete_option(option.id).await.unwrap());
        assert!(store.tables.read().votes.is_empty());
        assert!(store.find_poll(poll.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_user_removes_their_votes_and_polls() {
        let (store, owner, poll, option) = seeded().await;
        let voter = user("voter");
        store.insert_user(&voter).await.unwrap();
        store.insert_vote(&vote(&voter, &poll, &option)).await.unwrap();

        assert!(store.delete_user(voter.id).await.unwrap());
        assert!(store.find_user(voter.id).await.unwrap().is_none());
        assert_eq!(store.tally(poll.id).await.unwrap()[0].votes, 0);
        assert!(store.find_poll(poll.id).await.unwrap().is_some());

        store.insert_vote(&vote(&owner, &poll, &option)).await.unwrap();
        assert!(store.delete_user(owner.id).await.unwrap());
        assert!(store.find_poll(poll.id).await.unwrap().is_none());
        assert!(store.find_option(option.id).await.unwrap().is_none());
        assert!(store.tables.read().votes.is_empty());
        assert!(!store.delete_user(owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn renaming_user_keeps_usernames_unique() {
        let (store, owner, _, _) = seeded().await;
        let other = user("other");
        store.insert_user(&other).await.unwrap();

        let clash = User {
            username: "owner".to_string(),
            ..other.clone()
        };
        assert!(matches!(store.update_user(&clash).await, Err(StoreError::Conflict)));

        let promoted = User {
            is_admin: true,
            ..owner
        };
        assert!(store.update_user(&promoted).await.unwrap());
        assert!(store.find_user(promoted.id).await.unwrap().unwrap().is_admin);
    }

    #[tokio::test]
    async fn labels_are_unique_per_poll() {
        let (store, _, poll, option) = seeded().await;
        let twin = PollOption {
            id: Uuid::new_v4(),
            ..option.clone()
        };
        assert!(matches!(
            store.insert_option(&twin).await,
            Err(StoreError::Conflict)
        ));

        let renamed = PollOption {
            label: "Tacos".to_string(),
            ..option
        };
        assert!(store.update_option(&renamed).await.unwrap());
        assert_eq!(store.list_options(poll.id).await.unwrap()[0].label, "Tacos");
    }

    #[tokio::test]
    async fn votable_filter_requires_active_poll_with_options() {
        let (store, owner, poll, _) = seeded().await;
        let empty = Poll {
            id: Uuid::new_v4(),
            created_by: owner.id,
            ..poll.clone()
        };
        store.insert_poll(&empty).await.unwrap();

        let votable = store.list_polls(PollFilter::Votable).await.unwrap();
        assert_eq!(votable, vec![poll.clone()]);

        let inactive = Poll {
            is_active: false,
            ..poll
        };
        store.update_poll(&inactive).await.unwrap();
        assert!(store.list_polls(PollFilter::Votable).await.unwrap().is_empty());
        assert_eq!(store.list_polls(PollFilter::All).await.unwrap().len(), 2);
    }
}
