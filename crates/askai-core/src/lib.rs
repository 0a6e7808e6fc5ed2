pub mod ai;
pub mod config;
pub mod error;
pub mod exchange;
pub mod repository;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{CompletionService, GeminiClient};
pub use config::Config;
pub use error::{ExchangeError, StoreError};
pub use exchange::{ExchangeController, ExchangeStatus, NO_REPLY_TEXT, SERVICE_ERROR_TEXT};
pub use repository::{ConversationRepository, JsonFileRepository, MemoryRepository};
pub use state::{ChatMessage, ChatRole, Conversation, ConversationId};
pub use store::ConversationStore;
