use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Failed to allocate a debugging port: {0}")]
    PortAllocation(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("No page available")]
    NoPage,

    #[error("Timed out after {waited:?} while {phase}")]
    Timeout { phase: WaitPhase, waited: Duration },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ChatError {
    /// Setup faults end the session; everything else only aborts the current turn.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ChatError::PortAllocation(_)
                | ChatError::LaunchFailed(_)
                | ChatError::ConnectionFailed(_)
                | ChatError::Config(_)
        )
    }
}

/// Which part of response capture was waiting when a deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    ResponseStart,
    Streaming,
    Stabilizing,
}

impl std::fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitPhase::ResponseStart => write!(f, "waiting for the response to start"),
            WaitPhase::Streaming => write!(f, "waiting for streaming to finish"),
            WaitPhase::Stabilizing => write!(f, "waiting for the response text to settle"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
