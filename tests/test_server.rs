//! Local HTTP server for tests
//!
//! Serves a small imitation of the chat page: a conversation sidebar, message
//! blocks, a prompt textarea and a "Stop generating" button that is only shown
//! while the canned answer streams in.
//!
//! Each server instance runs on a random available port for test isolation.

use std::net::SocketAddr;
use tokio::sync::oneshot;
use warp::Filter;

/// Page markup mirroring the selectors the automation expects
pub const CHAT_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Fake Chat</title>
</head>
<body>
    <nav>
        <ol id="history">
            <li class="relative"><a href="#"><div class="flex-1">Arithmetic</div></a></li>
            <li class="relative"><a href="#"><div class="flex-1">Greetings</div></a></li>
        </ol>
    </nav>
    <main id="thread"></main>
    <div id="controls"></div>
    <form id="composer">
        <textarea placeholder="Send a message"></textarea>
    </form>
    <script>
        const thread = document.getElementById('thread');
        const controls = document.getElementById('controls');
        const textarea = document.querySelector('textarea');

        function addBlock(text) {
            const block = document.createElement('div');
            block.className = 'text-base';
            block.innerText = text;
            thread.appendChild(block);
            return block;
        }

        function stream(block, frames) {
            const stop = document.createElement('button');
            stop.innerText = 'Stop generating';
            controls.appendChild(stop);
            frames.forEach((frame, i) => {
                setTimeout(() => {
                    block.innerText = frame;
                    if (i === frames.length - 1) stop.remove();
                }, 300 * (i + 1));
            });
        }

        function answerFor(prompt) {
            if (prompt === '2+2?') return ['4', '4.'];
            return ['You said', 'You said: ' + prompt];
        }

        document.querySelectorAll('#history li').forEach((entry, i) => {
            entry.addEventListener('click', () => {
                thread.innerHTML = '';
                addBlock('Opened conversation ' + (i + 1));
                addBlock('Welcome back to conversation ' + (i + 1));
            });
        });

        textarea.addEventListener('keydown', (event) => {
            if (event.key !== 'Enter') return;
            event.preventDefault();
            const prompt = textarea.value;
            textarea.value = '';
            addBlock(prompt);
            stream(addBlock(''), answerFor(prompt));
        });
    </script>
</body>
</html>"##;

/// Test server that serves the fake chat page
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a new test server on a random available port
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let index = warp::path::end().map(|| warp::reply::html(CHAT_PAGE));

        // Bind to random port
        let (addr, server) =
            warp::serve(index).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        // Spawn server in background
        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this server (e.g., "http://127.0.0.1:12345")
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the server to be ready by making a test request
    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        let url = self.url();
        let max_attempts = 10;

        for attempt in 1..=max_attempts {
            match reqwest::get(&url).await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    println!(
                        "Attempt {}: Server returned status {}",
                        attempt,
                        response.status()
                    );
                }
                Err(e) => {
                    println!("Attempt {}: Server not ready - {}", attempt, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        anyhow::bail!(
            "Server did not become ready after {} attempts",
            max_attempts
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Signal server to shutdown
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
