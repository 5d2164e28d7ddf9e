//! Transcript persistence
//!
//! A transcript is a plain-text file with one record per turn:
//!
//! ```text
//! prompt: <prompt>
//! response: <response>
//!
//! <delimiter>
//!
//! ```
//!
//! Saves always append. Nothing is deduplicated, so saving the same
//! conversation twice stores it twice.

use crate::error::{ChatError, Result};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// One prompt and the response rendered after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub prompt: String,
    pub response: String,
}

impl Turn {
    /// Pair up rendered blocks by position: even index prompt, odd index response.
    /// Text is trimmed the same way a captured response is.
    ///
    /// Returns the complete turns and, for an odd-length input, the trailing
    /// prompt that has no response yet.
    pub fn pair_blocks(blocks: &[String]) -> (Vec<Turn>, Option<String>) {
        let turns = blocks
            .chunks_exact(2)
            .map(|pair| Turn {
                prompt: pair[0].trim().to_string(),
                response: pair[1].trim().to_string(),
            })
            .collect();
        let trailing = blocks
            .chunks_exact(2)
            .remainder()
            .first()
            .map(|prompt| prompt.trim().to_string());
        (turns, trailing)
    }

    pub fn to_record(&self, delimiter: &str) -> String {
        format!(
            "prompt: {}\nresponse: {}\n\n{}\n\n",
            self.prompt, self.response, delimiter
        )
    }
}

/// Outcome of one save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub records_written: usize,
    /// Prompt left out because the page showed no response for it
    pub skipped_prompt: Option<String>,
}

/// Appends conversation records under a storage directory
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
    delimiter: String,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>, delimiter: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: delimiter.into(),
        }
    }

    /// Append every complete turn in `blocks` to `<dir>/<file_name>`
    pub async fn append(&self, file_name: &str, blocks: &[String]) -> Result<SaveReport> {
        if file_name.trim().is_empty() {
            return Err(ChatError::Other("Transcript file name is empty".to_string()));
        }
        // Only a bare file name, so the transcript cannot land outside `dir`
        let mut components = Path::new(file_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ChatError::Other(format!(
                "Transcript file name must not contain a path: {:?}",
                file_name
            )));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);

        let (turns, skipped_prompt) = Turn::pair_blocks(blocks);
        if let Some(prompt) = &skipped_prompt {
            log::warn!(
                "Unanswered trailing prompt skipped while saving {}: {:?}",
                path.display(),
                prompt
            );
        }

        let body: String = turns
            .iter()
            .map(|turn| turn.to_record(&self.delimiter))
            .collect();

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;

        log::info!("Saved {} turn(s) to {}", turns.len(), path.display());

        Ok(SaveReport {
            path,
            records_written: turns.len(),
            skipped_prompt,
        })
    }
}
