//! Operator console helpers and the interactive chat loop
//!
//! Generic over tokio's async I/O traits so the same code runs against
//! stdin/stdout or in-memory buffers.

use crate::capture::{ChatPage, ResponseCapture};
use crate::error::{ChatError, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Write a line to the operator
pub async fn say<W>(output: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

/// Print `question` and read one line. `None` means the input is closed.
pub async fn ask<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(question.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Block until the operator confirms that login or human verification is done
pub async fn wait_for_operator<R, W>(input: &mut R, output: &mut W, retry_pause: Duration) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    say(
        output,
        "You need to manually complete the log-in or the human verification if required.",
    )
    .await?;

    loop {
        let answer = ask(
            input,
            output,
            "Enter 'y' if you have completed the log-in or the human verification, or 'n' to check again: ",
        )
        .await?
        .ok_or_else(|| ChatError::Other("Input closed before verification was confirmed".to_string()))?;

        match answer.trim().to_lowercase().as_str() {
            "y" => {
                say(output, "Continuing with the automation process...").await?;
                return Ok(());
            }
            "n" => {
                say(output, "Waiting for you to complete the human verification...").await?;
                tokio::time::sleep(retry_pause).await;
            }
            _ => say(output, "Invalid input. Please enter 'y' or 'n'.").await?,
        }
    }
}

const SEPARATOR: &str = "===========================";
const QUIT_SENTINEL: &str = "q";

/// Interactive loop: pick a conversation, relay prompts, save the transcript.
///
/// A failed turn is reported and the loop goes on; setup faults end it.
pub async fn run_chat<P, R, W>(
    page: &P,
    capture: &ResponseCapture<'_, P>,
    transcript_name: &str,
    input: &mut R,
    output: &mut W,
) -> Result<()>
where
    P: ChatPage + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match page.conversation_titles().await {
        Ok(titles) => {
            for (i, title) in titles.iter().enumerate() {
                say(output, &format!("{} : {}", i + 1, title)).await?;
            }
        }
        Err(e) => log::warn!("Could not list conversations: {}", e),
    }

    let choice = ask(input, output, "chat number:").await?.unwrap_or_default();
    match choice.trim().parse::<usize>() {
        Ok(0) | Err(_) => say(output, "Starting new chat").await?,
        Ok(index) => match page.select_conversation(index).await {
            Ok(()) => match capture.await_last_response().await {
                Ok(response) => show_response(output, &response).await?,
                Err(e) => report_turn_error(output, e).await?,
            },
            Err(ChatError::ElementNotFound(_)) => {
                say(output, "Invalid chat_id provided").await?;
            }
            Err(e) => report_turn_error(output, e).await?,
        },
    }

    loop {
        let prompt = match ask(input, output, "me: ").await? {
            Some(prompt) if prompt.trim() != QUIT_SENTINEL => prompt,
            _ => break,
        };
        if prompt.trim().is_empty() {
            continue;
        }

        match capture.ask(&prompt).await {
            Ok(response) => show_response(output, &response).await?,
            Err(e) => report_turn_error(output, e).await?,
        }
    }

    let report = capture.save_conversation(transcript_name).await?;
    if let Some(prompt) = &report.skipped_prompt {
        say(
            output,
            &format!("Unanswered trailing prompt skipped: {}", prompt),
        )
        .await?;
    }
    say(
        output,
        &format!(
            "Saved {} turn(s) to {}",
            report.records_written,
            report.path.display()
        ),
    )
    .await?;

    Ok(())
}

async fn show_response<W: AsyncWrite + Unpin>(output: &mut W, response: &str) -> Result<()> {
    say(output, &format!("ai: {{ {} }}", response)).await?;
    say(output, SEPARATOR).await
}

async fn report_turn_error<W: AsyncWrite + Unpin>(output: &mut W, error: ChatError) -> Result<()> {
    if error.is_session_fatal() {
        return Err(error);
    }
    log::error!("Turn failed: {}", error);
    say(output, &format!("error: {}", error)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TranscriptWriter;
    use crate::config::PollSettings;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Page that answers every prompt with an echo, except "stuck",
    /// whose response block never gets any text
    struct EchoPage {
        titles: Vec<String>,
        blocks: Mutex<Vec<String>>,
        fail_submit_with: Mutex<Option<ChatError>>,
    }

    impl EchoPage {
        fn new(titles: &[&str]) -> Self {
            Self {
                titles: titles.iter().map(|t| t.to_string()).collect(),
                blocks: Mutex::new(Vec::new()),
                fail_submit_with: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatPage for EchoPage {
        async fn read_blocks(&self) -> Result<Vec<String>> {
            Ok(self.blocks.lock().unwrap().clone())
        }

        async fn streaming_indicator_present(&self) -> Result<bool> {
            Ok(false)
        }

        async fn conversation_titles(&self) -> Result<Vec<String>> {
            Ok(self.titles.clone())
        }

        async fn select_conversation(&self, index: usize) -> Result<()> {
            if index == 0 || index > self.titles.len() {
                return Err(ChatError::ElementNotFound(format!("conversation #{}", index)));
            }
            Ok(())
        }

        async fn submit_prompt(&self, prompt: &str) -> Result<()> {
            if let Some(error) = self.fail_submit_with.lock().unwrap().take() {
                return Err(error);
            }
            let mut blocks = self.blocks.lock().unwrap();
            blocks.push(prompt.to_string());
            if prompt == "stuck" {
                blocks.push(String::new());
            } else {
                blocks.push(format!("echo: {}", prompt));
            }
            Ok(())
        }
    }


    #[tokio::test]
    async fn test_ask_strips_line_ending() {
        let mut input: &[u8] = b"hello\r\nworld\n";
        let mut output = Vec::new();

        let first = ask(&mut input, &mut output, "me: ").await.unwrap();
        let second = ask(&mut input, &mut output, "me: ").await.unwrap();
        let closed = ask(&mut input, &mut output, "me: ").await.unwrap();

        assert_eq!(first.as_deref(), Some("hello"));
        assert_eq!(second.as_deref(), Some("world"));
        assert_eq!(closed, None);
        assert_eq!(String::from_utf8(output).unwrap(), "me: me: me: ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_operator_retries_until_yes() {
        let mut input: &[u8] = b"maybe\nn\nY\n";
        let mut output = Vec::new();

        wait_for_operator(&mut input, &mut output, Duration::from_secs(5))
            .await
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Invalid input"));
        assert!(printed.contains("Waiting for you"));
        assert!(printed.ends_with("Continuing with the automation process...\n"));
    }

    #[tokio::test]
    async fn test_wait_for_operator_fails_on_closed_input() {
        let mut input: &[u8] = b"n\n";
        let mut output = Vec::new();

        let result = wait_for_operator(&mut input, &mut output, Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_chat_survives_failed_turns_and_saves() {
        let page = EchoPage::new(&["first", "second"]);
        let tmp = tempfile::tempdir().unwrap();
        let capture = ResponseCapture::new(
            &page,
            PollSettings::default(),
            TranscriptWriter::new(tmp.path(), "|^_^|"),
        );
        let mut input: &[u8] = b"7\nstuck\nhello\nq\n";
        let mut output = Vec::new();

        run_chat(&page, &capture, "conversation.txt", &mut input, &mut output)
            .await
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("1 : first\n2 : second\n"));
        assert!(printed.contains("Invalid chat_id provided"));
        assert!(printed.contains("error: Timed out"));
        assert!(printed.contains("ai: { echo: hello }"));
        assert!(printed.contains("Saved 2 turn(s)"));

        let written = std::fs::read_to_string(tmp.path().join("conversation.txt")).unwrap();
        assert_eq!(
            written,
            "prompt: stuck\nresponse: \n\n|^_^|\n\nprompt: hello\nresponse: echo: hello\n\n|^_^|\n\n"
        );
    }

    #[tokio::test]
    async fn test_run_chat_stops_on_setup_fault() {
        let page = EchoPage::new(&[]);
        *page.fail_submit_with.lock().unwrap() =
            Some(ChatError::ConnectionFailed("browser went away".to_string()));
        let tmp = tempfile::tempdir().unwrap();
        let capture = ResponseCapture::new(
            &page,
            PollSettings::default(),
            TranscriptWriter::new(tmp.path(), "|^_^|"),
        );
        let mut input: &[u8] = b"0\nhello\nagain\nq\n";
        let mut output = Vec::new();

        let result = run_chat(&page, &capture, "conversation.txt", &mut input, &mut output).await;

        assert!(matches!(result, Err(ChatError::ConnectionFailed(_))));
        assert!(String::from_utf8(output).unwrap().contains("Starting new chat"));
        assert!(!tmp.path().join("conversation.txt").exists());
    }
}
