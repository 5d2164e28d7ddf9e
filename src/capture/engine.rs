//! Response completion detection
//!
//! A response is considered final after three phases:
//!
//! 1. the last rendered block has non-blank text (the answer has started),
//! 2. the "stop generating" control is gone (streaming has ended),
//! 3. two reads of the last block, one stability gap apart, agree.
//!
//! All phases share a single deadline so a stalled page turns into
//! [`ChatError::Timeout`] instead of a hang.

use super::transcript::{SaveReport, TranscriptWriter};
use super::ChatPage;
use crate::config::PollSettings;
use crate::error::{ChatError, Result, WaitPhase};
use std::time::Duration;
use tokio::time::Instant;

/// Deadline shared by every phase of one wait
struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Sleep for `interval`, or fail if the deadline has already passed
    async fn pause(&self, interval: Duration, phase: WaitPhase) -> Result<()> {
        let waited = self.started.elapsed();
        if waited >= self.limit {
            return Err(ChatError::Timeout { phase, waited });
        }
        tokio::time::sleep(interval.min(self.limit - waited)).await;
        Ok(())
    }
}

/// Captures responses and transcripts from a [`ChatPage`]
pub struct ResponseCapture<'a, P: ChatPage + ?Sized> {
    page: &'a P,
    timing: PollSettings,
    writer: TranscriptWriter,
}

impl<'a, P: ChatPage + ?Sized> ResponseCapture<'a, P> {
    pub fn new(page: &'a P, timing: PollSettings, writer: TranscriptWriter) -> Self {
        Self {
            page,
            timing,
            writer,
        }
    }

    /// Submit a prompt and wait for its complete response
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        self.page.submit_prompt(prompt).await?;
        self.await_last_response().await
    }

    /// Wait until the latest response has finished streaming and return its trimmed text
    pub async fn await_last_response(&self) -> Result<String> {
        let deadline = Deadline::start(self.timing.deadline);

        let mut previous = loop {
            deadline
                .pause(self.timing.poll_interval, WaitPhase::ResponseStart)
                .await?;
            let blocks = self.page.read_blocks().await?;
            match blocks.last() {
                Some(text) if !text.trim().is_empty() => break text.clone(),
                _ => continue,
            }
        };
        log::debug!("Response started ({} chars)", previous.len());

        while self.page.streaming_indicator_present().await? {
            deadline
                .pause(self.timing.poll_interval, WaitPhase::Streaming)
                .await?;
        }
        log::debug!("Streaming indicator gone");

        loop {
            deadline
                .pause(self.timing.stability_gap, WaitPhase::Stabilizing)
                .await?;
            let current = self.page.read_last_block().await?.ok_or_else(|| {
                ChatError::ElementNotFound("last response block disappeared".to_string())
            })?;

            if current == previous {
                log::debug!("Response stable after {:?}", deadline.started.elapsed());
                return Ok(current.trim().to_string());
            }
            previous = current;
        }
    }

    /// Every visible block, prompts and responses interleaved
    pub async fn enumerate_conversation(&self) -> Result<Vec<String>> {
        self.page.read_blocks().await
    }

    /// Append the visible conversation to `file_name` in the storage directory
    pub async fn save_conversation(&self, file_name: &str) -> Result<SaveReport> {
        let blocks = self.enumerate_conversation().await?;
        self.writer.append(file_name, &blocks).await
    }
}
