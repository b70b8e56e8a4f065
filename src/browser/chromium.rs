//! Chromium adapter using chromiumoxide.
//!
//! Attaches to an already running, already authenticated Chromium over its
//! DevTools websocket. Launching the browser and logging in are left to the
//! session manager that owns that process.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowserError, BrowserHandle, BrowserProvider, BrowserResult};
use crate::config::BrowserConfig;

/// Polling interval used while waiting for an element
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Connects to a DevTools endpoint once per tick
pub struct ChromiumProvider {
    config: BrowserConfig,
}

impl ChromiumProvider {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserProvider for ChromiumProvider {
    type Handle = ChromiumSession;

    async fn acquire(&self) -> BrowserResult<ChromiumSession> {
        let (browser, mut handler) = Browser::connect(self.config.devtools_url.clone())
            .await
            .map_err(|e| BrowserError::SessionUnavailable(e.to_string()))?;

        // The handler must be polled for the connection to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let existing = browser.pages().await.map_err(BrowserError::driver)?;
        let page = match existing.into_iter().next() {
            Some(page) => page,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(BrowserError::driver)?,
        };

        tracing::debug!(url = %self.config.devtools_url, "Attached to Chromium session");

        Ok(ChromiumSession {
            _browser: browser,
            page,
            handler_task,
            navigation_timeout: Duration::from_millis(self.config.navigation_timeout_ms),
        })
    }
}

/// A single attached Chromium page
pub struct ChromiumSession {
    _browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

impl ChromiumSession {
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Some(element);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BrowserHandle for ChromiumSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::navigation(url, e)),
            Err(_) => Err(BrowserError::navigation(url, "navigation timed out")),
        }
    }

    async fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<Element>> {
        self.page
            .find_elements(selector)
            .await
            .map_err(BrowserError::driver)
    }

    async fn find_one(&mut self, selector: &str, timeout: Duration) -> BrowserResult<Option<Element>> {
        Ok(self.wait_for(selector, timeout).await)
    }

    async fn find_in(&mut self, element: &Element, selector: &str) -> BrowserResult<Option<Element>> {
        Ok(element.find_element(selector).await.ok())
    }

    async fn send_keys(&mut self, selector: &str, text: &str) -> BrowserResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(BrowserError::driver)?;
        element.type_str(text).await.map_err(BrowserError::driver)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element.click().await.map_err(BrowserError::driver)?;
        Ok(true)
    }

    async fn scroll(&mut self, steps: u32, px_per_step: u32) -> BrowserResult<()> {
        for _ in 0..steps {
            self.page
                .evaluate(format!("window.scrollBy(0, {px_per_step})"))
                .await
                .map_err(BrowserError::driver)?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    async fn get_attribute(&mut self, element: &Element, name: &str) -> BrowserResult<Option<String>> {
        element.attribute(name).await.map_err(BrowserError::driver)
    }

    async fn get_text(&mut self, selector: &str, timeout: Duration) -> BrowserResult<Option<String>> {
        match self.wait_for(selector, timeout).await {
            Some(element) => element.inner_text().await.map_err(BrowserError::driver),
            None => Ok(None),
        }
    }

    async fn is_enabled(&mut self, element: &Element) -> BrowserResult<bool> {
        let disabled = element
            .attribute("disabled")
            .await
            .map_err(BrowserError::driver)?;
        let aria_disabled = element
            .attribute("aria-disabled")
            .await
            .map_err(BrowserError::driver)?;
        Ok(disabled.is_none() && aria_disabled.as_deref() != Some("true"))
    }
}
