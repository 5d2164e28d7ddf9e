//! Chat session lifecycle
//!
//! A [`ChatSession`] owns the browser process and the attached driver. It is
//! created by [`ChatSession::start`], handed to whoever drives the chat, and
//! torn down with [`ChatSession::quit`].

use crate::browser::{find_available_port, BrowserProcess, ChromeDriver};
use crate::capture::{ResponseCapture, TranscriptWriter};
use crate::config::AutomationConfig;
use crate::console::wait_for_operator;
use crate::error::Result;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};

/// How long the browser gets to exit after the driver closes it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct ChatSession {
    config: AutomationConfig,
    process: BrowserProcess,
    driver: ChromeDriver,
}

impl ChatSession {
    /// Launch the browser, wait for the operator to finish verification, then attach.
    ///
    /// Every failure here is a setup fault and ends the session.
    pub async fn start<R, W>(config: AutomationConfig, input: &mut R, output: &mut W) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        config.validate()?;

        let port = find_available_port()?;
        log::info!("Using remote debugging port {}", port);

        let process = BrowserProcess::launch(&config, port)?;

        wait_for_operator(input, output, config.timing.verification_retry).await?;
        process.ensure_running()?;

        let driver = match ChromeDriver::connect_debug_port(port).await {
            Ok(driver) => driver
                .with_selectors(config.selectors.clone())
                .with_typing_pause(config.timing.typing_pause),
            Err(e) => {
                log::error!("Attaching to the browser failed: {}", e);
                process.shutdown(Duration::ZERO).await;
                return Err(e);
            }
        };

        Ok(Self {
            config,
            process,
            driver,
        })
    }

    pub fn driver(&self) -> &ChromeDriver {
        &self.driver
    }

    /// Capture engine bound to this session's page and storage settings
    pub fn capture(&self) -> ResponseCapture<'_, ChromeDriver> {
        ResponseCapture::new(
            &self.driver,
            self.config.timing,
            TranscriptWriter::new(&self.config.storage_dir, &self.config.delimiter),
        )
    }

    /// Close the browser and release the session
    pub async fn quit(self) -> Result<()> {
        log::info!("Closing the browser...");
        let closed = self.driver.close().await;
        if let Err(e) = &closed {
            log::warn!("Browser did not close cleanly: {}", e);
        }

        let state = self.process.shutdown(SHUTDOWN_GRACE).await;
        log::debug!("Browser process final state: {:?}", state);
        closed
    }
}
