pub mod chrome;
pub mod launcher;

pub use chrome::ChromeDriver;
pub use launcher::{find_available_port, BrowserProcess, ProcessState};
