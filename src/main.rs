use anyhow::Context;
use chat_webdriver::console::run_chat;
use chat_webdriver::{AutomationConfig, ChatSession};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Browser executable to launch
    #[arg(long)]
    chrome_path: Option<String>,

    /// Chat page to open
    #[arg(long)]
    url: Option<String>,

    /// Directory transcripts are written to
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Transcript file name inside the storage directory
    #[arg(short, long, default_value = "conversation.txt")]
    output: String,

    /// Give up on a response after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn load_config(args: &Args) -> anyhow::Result<AutomationConfig> {
    let path = args.config.clone().or_else(AutomationConfig::default_path);
    let mut config = match path {
        Some(path) => AutomationConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AutomationConfig::default(),
    };

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = chrome_path.clone();
    }
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(storage_dir) = &args.storage_dir {
        config.storage_dir = storage_dir.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.timing.deadline = Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    log::info!("Starting chat automation against {}", config.url);

    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();

    let session = ChatSession::start(config, &mut input, &mut output)
        .await
        .context("Failed to start the browser session")?;

    let outcome = run_chat(
        session.driver(),
        &session.capture(),
        &args.output,
        &mut input,
        &mut output,
    )
    .await;

    session.quit().await?;
    outcome.context("Chat ended with an error")
}
