//! Response capture
//!
//! The polling state machine that decides when a streamed chat response is
//! final, and the transcript writer that persists a conversation. Both talk to
//! the page only through [`ChatPage`], so they run unchanged against the live
//! browser or a scripted fake.

pub mod engine;
pub mod transcript;

pub use engine::ResponseCapture;
pub use transcript::{SaveReport, TranscriptWriter, Turn};

use crate::error::Result;
use async_trait::async_trait;

/// Everything the capture logic is allowed to ask of the chat page
#[async_trait]
pub trait ChatPage: Send + Sync {
    /// Text of every rendered message block, in page order
    async fn read_blocks(&self) -> Result<Vec<String>>;

    /// Text of the last rendered message block, if any
    async fn read_last_block(&self) -> Result<Option<String>> {
        Ok(self.read_blocks().await?.pop())
    }

    /// Whether the "stop generating" control is currently shown
    async fn streaming_indicator_present(&self) -> Result<bool>;

    /// Titles of the conversations listed in the sidebar
    async fn conversation_titles(&self) -> Result<Vec<String>>;

    /// Open a sidebar conversation by its 1-based position
    async fn select_conversation(&self, index: usize) -> Result<()>;

    /// Type a prompt into the input field and submit it
    async fn submit_prompt(&self, prompt: &str) -> Result<()>;
}
