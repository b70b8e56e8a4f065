//! Browser automation capability
//!
//! The crawler never owns a browser session. It is handed a [`BrowserHandle`]
//! that is already authenticated, borrows it mutably for the duration of a
//! scheduler tick and gives it back. Session lifecycle (launch, login, cookie
//! refresh, pooling) lives behind a [`BrowserProvider`].
//!
//! - [`chromium`] - Chromium DevTools adapter (feature `chromium`)

#[cfg(feature = "chromium")]
pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors raised by a browser automation handle
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Navigation did not complete
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// An operation exceeded its timeout
    #[error("Timed out after {timeout_ms}ms waiting for '{selector}'")]
    Timeout { selector: String, timeout_ms: u64 },

    /// A required element is not on the page
    #[error("Element '{selector}' not found")]
    ElementNotFound { selector: String },

    /// No usable session could be obtained
    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(String),

    /// Any other driver/protocol failure
    #[error("Browser driver error: {0}")]
    Driver(String),
}

impl BrowserError {
    /// Create a driver error from any displayable cause
    pub fn driver(err: impl std::fmt::Display) -> Self {
        Self::Driver(err.to_string())
    }

    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if the error only concerns a single element or wait
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ElementNotFound { .. })
    }
}

/// A pre-authenticated page the crawler can drive
///
/// Element handles are opaque to the crawler; they are only passed back to
/// the same handle that produced them.
#[async_trait]
pub trait BrowserHandle: Send {
    /// Opaque element reference
    type Element: Send + Sync;

    /// Navigate the page to a URL and wait for it to load
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// All elements currently matching a selector
    async fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<Self::Element>>;

    /// First element matching a selector, waiting up to `timeout`
    async fn find_one(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<Option<Self::Element>>;

    /// First descendant of `element` matching a selector
    async fn find_in(
        &mut self,
        element: &Self::Element,
        selector: &str,
    ) -> BrowserResult<Option<Self::Element>>;

    /// Type text into the element matching a selector
    async fn send_keys(&mut self, selector: &str, text: &str) -> BrowserResult<()>;

    /// Click the element matching a selector. Returns false if it was not found.
    async fn click(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Scroll the page down in `steps` increments of `px_per_step` pixels
    async fn scroll(&mut self, steps: u32, px_per_step: u32) -> BrowserResult<()>;

    /// Read an attribute of an element
    async fn get_attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> BrowserResult<Option<String>>;

    /// Text content of the element matching a selector, waiting up to `timeout`
    async fn get_text(&mut self, selector: &str, timeout: Duration)
        -> BrowserResult<Option<String>>;

    /// Whether an element is interactable (not disabled)
    async fn is_enabled(&mut self, element: &Self::Element) -> BrowserResult<bool>;
}

/// Source of browser handles for the periodic scheduler loop
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    type Handle: BrowserHandle;

    /// Obtain an authenticated handle for one tick
    async fn acquire(&self) -> BrowserResult<Self::Handle>;
}
