pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::ExchangeError;

/// An external text-generation endpoint, called once per user message.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate a reply to `prompt`.
    ///
    /// `Ok(None)` means the service answered but the reply carried no text.
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ExchangeError>;
}
