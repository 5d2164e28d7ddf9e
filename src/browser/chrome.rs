// chromiumoxide drives the browser over the DevTools protocol
use crate::capture::ChatPage;
use crate::config::{Selector, Selectors};
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Driver attached to a browser that was started with remote debugging
pub struct ChromeDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
    selectors: Selectors,
    typing_pause: Duration,
}

impl ChromeDriver {
    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<Page> {
        let pages = self.browser.pages().await?;

        // Prefer the first real page, fall back to the most recently created one
        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        pages.last().cloned().ok_or(ChatError::NoPage)
    }

    /// Connect to an already running Chrome on its debug port
    pub async fn connect_debug_port(port: u16) -> Result<Self> {
        let url = format!("http://127.0.0.1:{}", port);
        let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
            ChatError::ConnectionFailed(format!(
                "Failed to connect to Chrome on port {}. \
                     Make sure Chrome is running with --remote-debugging-port={}: {}",
                port, port, e
            ))
        })?;

        // Spawn handler task
        let handler_task = tokio::spawn(async move {
            while (handler.next().await).is_some() {
                // Handle browser events
            }
        });

        log::info!("Attached to Chrome on {}", url);

        Ok(Self {
            browser,
            handler_task,
            selectors: Selectors::default(),
            typing_pause: Duration::from_secs(1),
        })
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_typing_pause(mut self, typing_pause: Duration) -> Self {
        self.typing_pause = typing_pause;
        self
    }

    /// Execute JavaScript and return a specific type
    pub async fn execute_script_typed<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| ChatError::Other(format!("Script execution failed: {}", e)))?;

        result
            .into_value()
            .map_err(|e| ChatError::Other(format!("Failed to deserialize result: {}", e)))
    }

    /// Check if the browser is still alive and responsive
    pub async fn is_alive(&self) -> bool {
        match self.browser.pages().await {
            Ok(pages) => match pages.first() {
                Some(page) => matches!(
                    tokio::time::timeout(Duration::from_secs(2), page.url()).await,
                    Ok(Ok(_))
                ),
                None => true,
            },
            Err(_) => false,
        }
    }

    /// Close the browser and stop the event handler
    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        self.handler_task.abort();
        closed.map_err(|e| ChatError::Other(e.to_string()))?;
        Ok(())
    }

    /// Locate the prompt input as a DOM element so real key events can be sent to it
    async fn find_input(&self, page: &Page) -> Result<Element> {
        let selector = &self.selectors.prompt_input;
        let not_found = || ChatError::ElementNotFound(format!("prompt input ({})", selector));

        match selector {
            Selector::Css(query) => page
                .find_element(query.as_str())
                .await
                .map_err(|_| not_found()),
            Selector::XPath(query) => page
                .find_xpaths(query.as_str())
                .await
                .map_err(|_| not_found())?
                .into_iter()
                .next()
                .ok_or_else(not_found),
        }
    }
}

/// JavaScript expression evaluating to an array of the nodes matching `selector`
fn nodes_expression(selector: &Selector) -> String {
    // JSON string literals are valid JavaScript string literals
    let query = serde_json::Value::String(selector.query().to_string()).to_string();
    match selector {
        Selector::Css(_) => format!("Array.from(document.querySelectorAll({}))", query),
        Selector::XPath(_) => format!(
            "(() => {{ \
                const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                const nodes = []; \
                for (let i = 0; i < snapshot.snapshotLength; i++) nodes.push(snapshot.snapshotItem(i)); \
                return nodes; \
            }})()",
            query
        ),
    }
}

fn block_texts_script(selector: &Selector) -> String {
    format!(
        "{}.map(node => node.innerText || '')",
        nodes_expression(selector)
    )
}

fn count_script(selector: &Selector) -> String {
    format!("{}.length", nodes_expression(selector))
}

fn titles_script(entries: &Selector, title: &str) -> String {
    let title = serde_json::Value::String(title.to_string()).to_string();
    format!(
        "{}.map(entry => {{ const t = entry.querySelector({}); return t ? t.innerText : ''; }})",
        nodes_expression(entries),
        title
    )
}

fn click_script(entries: &Selector, position: usize) -> String {
    format!(
        "(() => {{ const entry = {}[{}]; if (!entry) return false; entry.click(); return true; }})()",
        nodes_expression(entries),
        position
    )
}

const CLEAR_INPUT_FN: &str = r#"function() {
    this.focus();
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

#[async_trait]
impl ChatPage for ChromeDriver {
    async fn read_blocks(&self) -> Result<Vec<String>> {
        self.execute_script_typed(&block_texts_script(&self.selectors.text_blocks))
            .await
    }

    async fn streaming_indicator_present(&self) -> Result<bool> {
        let count: usize = self
            .execute_script_typed(&count_script(&self.selectors.stop_generating))
            .await?;
        Ok(count > 0)
    }

    async fn conversation_titles(&self) -> Result<Vec<String>> {
        self.execute_script_typed(&titles_script(
            &self.selectors.conversation_entries,
            &self.selectors.conversation_title,
        ))
        .await
    }

    async fn select_conversation(&self, index: usize) -> Result<()> {
        let clicked = match index.checked_sub(1) {
            Some(position) => {
                self.execute_script_typed::<bool>(&click_script(
                    &self.selectors.conversation_entries,
                    position,
                ))
                .await?
            }
            None => false,
        };

        if !clicked {
            log::warn!("No conversation at position {}", index);
            return Err(ChatError::ElementNotFound(format!(
                "conversation #{} ({})",
                index, self.selectors.conversation_entries
            )));
        }

        log::info!("Selected conversation #{}", index);
        Ok(())
    }

    async fn submit_prompt(&self, prompt: &str) -> Result<()> {
        let page = self.get_active_page().await?;
        let input = self.find_input(&page).await?;

        input.click().await?;
        input.call_js_fn(CLEAR_INPUT_FN, false).await?;
        input.type_str(prompt).await?;

        tokio::time::sleep(self.typing_pause).await;
        input.press_key("Enter").await?;

        log::debug!("Submitted prompt ({} chars)", prompt.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_nodes_expression_escapes_query() {
        let script = nodes_expression(&Selector::css(r#"div[data-x="a"]"#));
        assert_eq!(
            script,
            r#"Array.from(document.querySelectorAll("div[data-x=\"a\"]"))"#
        );
    }

    #[test]
    fn test_xpath_nodes_expression_uses_snapshot() {
        let script = nodes_expression(&Selector::xpath(r#"//button[contains(text(), "Stop generating")]"#));
        assert!(script.contains("document.evaluate("));
        assert!(script.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        assert!(script.contains(r#"\"Stop generating\""#));
    }

    #[test]
    fn test_click_script_targets_zero_based_position() {
        let script = click_script(&Selector::css("li"), 2);
        assert!(script.contains(r#"document.querySelectorAll("li"))[2]"#));
        assert!(script.contains("return false"));
    }

    #[test]
    fn test_titles_script_reads_relative_title() {
        let script = titles_script(&Selector::css("li.relative"), "div.flex-1");
        assert!(script.contains(r#"entry.querySelector("div.flex-1")"#));
    }
}
