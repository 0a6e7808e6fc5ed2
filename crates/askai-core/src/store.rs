//! In-memory conversation collection mirrored to a repository
//!
//! The store is the single writer of the collection. Every mutation takes
//! `&mut self`, edits the owned collection in place and then saves the whole
//! collection, so there is never a second snapshot that could go stale.

use chrono::Utc;

use crate::error::StoreError;
use crate::repository::ConversationRepository;
use crate::state::{derive_title, ChatMessage, ChatRole, Conversation, ConversationId, DEFAULT_TITLE};

pub struct ConversationStore<R> {
    repository: R,
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
}

impl<R: ConversationRepository> ConversationStore<R> {
    /// Load the collection from `repository`. Nothing is selected.
    pub fn open(repository: R) -> Self {
        let conversations = repository.load();
        tracing::info!(count = conversations.len(), "loaded conversations");
        Self {
            repository,
            conversations,
            active: None,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// Messages of the active conversation, empty when nothing is selected
    pub fn active_messages(&self) -> &[ChatMessage] {
        self.active_conversation()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Start a new empty conversation and make it active.
    pub fn create_conversation(&mut self) -> Result<ConversationId, StoreError> {
        let id = self.insert_conversation(DEFAULT_TITLE);
        tracing::debug!(%id, "created conversation");
        self.active = Some(id.clone());
        self.persist()?;
        Ok(id)
    }

    /// Make `id` active and return its messages.
    pub fn select_conversation(&mut self, id: &ConversationId) -> Result<&[ChatMessage], StoreError> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.active = Some(id.clone());
        Ok(self.conversations[index].messages.as_slice())
    }

    /// Deselect the active conversation; the next message starts a new one.
    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    /// Replace the title of `id`. Unknown ids are ignored.
    pub fn rename_conversation(&mut self, id: &ConversationId, title: &str) -> Result<(), StoreError> {
        if let Some(conversation) = self.conversations.iter_mut().find(|c| &c.id == id) {
            conversation.title = title.to_string();
            tracing::debug!(%id, title, "renamed conversation");
        }
        self.persist()
    }

    /// Remove `id`, clearing the selection if it was active.
    pub fn delete_conversation(&mut self, id: &ConversationId) -> Result<(), StoreError> {
        self.conversations.retain(|c| &c.id != id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        tracing::debug!(%id, "deleted conversation");
        self.persist()
    }

    /// Append `messages` to a conversation, creating one when `id` is `None`.
    ///
    /// A new conversation, or an existing one still titled "New Chat", takes
    /// its title from the first user message. Returns the id the messages
    /// were appended to.
    pub fn append_messages(
        &mut self,
        id: Option<&ConversationId>,
        messages: Vec<ChatMessage>,
    ) -> Result<ConversationId, StoreError> {
        let title = title_source(&messages).map(derive_title);

        let id = match id {
            None => {
                let id = self.insert_conversation(title.as_deref().unwrap_or(DEFAULT_TITLE));
                self.active = Some(id.clone());
                tracing::debug!(%id, "created conversation from first message");
                id
            }
            Some(id) => id.clone(),
        };

        let index = self
            .position(&id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let conversation = &mut self.conversations[index];
        if conversation.has_default_title() {
            if let Some(title) = title {
                conversation.title = title;
            }
        }
        conversation.messages.extend(messages);

        self.persist()?;
        Ok(id)
    }

    fn position(&self, id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == id)
    }

    /// Prepend a conversation with a fresh id and return that id.
    fn insert_conversation(&mut self, title: &str) -> ConversationId {
        let now = Utc::now();
        let id = self.unique_id(now.timestamp_millis());
        self.conversations
            .insert(0, Conversation::new(id.clone(), title, now));
        id
    }

    fn unique_id(&self, mut millis: i64) -> ConversationId {
        loop {
            let id = ConversationId::from_millis(millis);
            if self.position(&id).is_none() {
                return id;
            }
            millis += 1;
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.repository.save(&self.conversations).map_err(|e| {
            tracing::error!(error = %e, "failed to save conversations");
            e
        })
    }
}

/// Text a title is derived from: the first user message, else the first message.
fn title_source(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .find(|m| m.role == ChatRole::User)
        .or_else(|| messages.first())
        .map(|m| m.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FailingRepository, MemoryRepository};

    fn empty_store() -> (ConversationStore<MemoryRepository>, MemoryRepository) {
        let repo = MemoryRepository::new();
        (ConversationStore::open(repo.clone()), repo)
    }

    #[test]
    fn test_create_conversation_prepends_and_activates() {
        let (mut store, repo) = empty_store();

        let first = store.create_conversation().unwrap();
        let second = store.create_conversation().unwrap();

        assert_ne!(first, second);
        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[1].id, first);
        assert_eq!(store.active_id(), Some(&second));
        assert_eq!(store.conversations()[0].title, DEFAULT_TITLE);
        assert!(store.conversations()[0].messages.is_empty());
        assert_eq!(repo.snapshot(), store.conversations());
    }

    #[test]
    fn test_create_then_append_derives_title() {
        let (mut store, repo) = empty_store();

        let id = store.create_conversation().unwrap();
        let appended = store
            .append_messages(Some(&id), vec![ChatMessage::user("hello")])
            .unwrap();

        assert_eq!(appended, id);
        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.title, "hello");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(repo.snapshot()[0].title, "hello");
    }

    #[test]
    fn test_append_without_id_creates_titled_conversation() {
        let (mut store, _repo) = empty_store();

        let id = store
            .append_messages(None, vec![ChatMessage::user("x".repeat(60))])
            .unwrap();

        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.title.chars().count(), 53);
        assert_eq!(conversation.title, format!("{}...", "x".repeat(50)));
        assert_eq!(store.active_id(), Some(&id));
    }

    #[test]
    fn test_append_keeps_custom_title() {
        let (mut store, _repo) = empty_store();
        let id = store.create_conversation().unwrap();
        store.rename_conversation(&id, "Recipes").unwrap();

        store
            .append_messages(Some(&id), vec![ChatMessage::user("how do I bake bread")])
            .unwrap();

        assert_eq!(store.get(&id).unwrap().title, "Recipes");
    }

    #[test]
    fn test_append_preserves_order() {
        let (mut store, _repo) = empty_store();
        let id = store
            .append_messages(None, vec![ChatMessage::user("one")])
            .unwrap();
        store
            .append_messages(Some(&id), vec![ChatMessage::assistant("two")])
            .unwrap();
        store
            .append_messages(Some(&id), vec![ChatMessage::user("three")])
            .unwrap();

        let contents: Vec<&str> = store
            .active_messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.get(&id).unwrap().title, "one");
    }

    #[test]
    fn test_append_to_unknown_id_is_not_found() {
        let (mut store, repo) = empty_store();
        let missing = ConversationId::from("42");

        let result = store.append_messages(Some(&missing), vec![ChatMessage::user("hi")]);

        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == missing));
        assert!(store.conversations().is_empty());
        assert!(repo.snapshot().is_empty());
    }

    #[test]
    fn test_select_conversation() {
        let (mut store, _repo) = empty_store();
        let id = store
            .append_messages(None, vec![ChatMessage::user("hi")])
            .unwrap();
        store.clear_selection();
        assert!(store.active_messages().is_empty());

        let messages = store.select_conversation(&id).unwrap();
        assert_eq!(messages, &[ChatMessage::user("hi")]);
        assert_eq!(store.active_id(), Some(&id));
    }

    #[test]
    fn test_select_unknown_leaves_state_unchanged() {
        let (mut store, _repo) = empty_store();
        let id = store.create_conversation().unwrap();

        let result = store.select_conversation(&ConversationId::from("nope"));

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.active_id(), Some(&id));
    }

    #[test]
    fn test_rename_unknown_is_noop() {
        let (mut store, _repo) = empty_store();
        store.create_conversation().unwrap();
        let before = store.conversations().to_vec();

        store
            .rename_conversation(&ConversationId::from("nope"), "whatever")
            .unwrap();

        assert_eq!(store.conversations(), before.as_slice());
    }

    #[test]
    fn test_create_then_delete_restores_collection() {
        let (mut store, repo) = empty_store();
        store
            .append_messages(None, vec![ChatMessage::user("keep me")])
            .unwrap();
        let before = store.conversations().to_vec();

        let id = store.create_conversation().unwrap();
        store.delete_conversation(&id).unwrap();

        assert_eq!(store.conversations(), before.as_slice());
        assert_eq!(repo.snapshot(), before);
    }

    #[test]
    fn test_delete_active_clears_selection() {
        let (mut store, _repo) = empty_store();
        let other = store.create_conversation().unwrap();
        let active = store.create_conversation().unwrap();

        store.delete_conversation(&other).unwrap();
        assert_eq!(store.active_id(), Some(&active));

        store.delete_conversation(&active).unwrap();
        assert_eq!(store.active_id(), None);
        assert!(store.active_messages().is_empty());
    }

    #[test]
    fn test_open_loads_existing_collection() {
        let repo = MemoryRepository::new();
        {
            let mut store = ConversationStore::open(repo.clone());
            store
                .append_messages(None, vec![ChatMessage::user("persisted")])
                .unwrap();
        }

        let store = ConversationStore::open(repo);
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.conversations()[0].title, "persisted");
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn test_failed_save_is_reported_and_kept_in_memory() {
        let mut store = ConversationStore::open(FailingRepository);

        let created = store.create_conversation();
        assert!(matches!(created, Err(StoreError::Persistence(_))));
        assert_eq!(store.conversations().len(), 1);
        let id = store.active_id().cloned().unwrap();

        let appended = store.append_messages(Some(&id), vec![ChatMessage::user("hello")]);
        assert!(matches!(appended, Err(StoreError::Persistence(_))));
        assert_eq!(store.active_messages(), &[ChatMessage::user("hello")]);
        assert_eq!(store.get(&id).unwrap().title, "hello");

        let started = store.append_messages(None, vec![ChatMessage::user("second")]);
        assert!(matches!(started, Err(StoreError::Persistence(_))));
        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.conversations()[0].title, "second");
        assert_eq!(store.active_id(), Some(&store.conversations()[0].id));

        assert!(store.rename_conversation(&id, "Renamed").is_err());
        assert_eq!(store.get(&id).unwrap().title, "Renamed");
        assert!(store.delete_conversation(&id).is_err());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_ids_are_unique_when_created_quickly() {
        let (mut store, _repo) = empty_store();
        let ids: Vec<ConversationId> = (0..20)
            .map(|_| store.create_conversation().unwrap())
            .collect();

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }
}
