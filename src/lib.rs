pub mod browser;
pub mod capture;
pub mod config;
pub mod console;
pub mod error;
pub mod session;

//  Re-export commonly used items
pub use browser::chrome::ChromeDriver;
pub use browser::launcher::{find_available_port, BrowserProcess, ProcessState};
pub use capture::{ChatPage, ResponseCapture, SaveReport, TranscriptWriter, Turn};
pub use config::{AutomationConfig, PollSettings, Selector, Selectors};
pub use error::{ChatError, Result, WaitPhase};
pub use session::ChatSession;
