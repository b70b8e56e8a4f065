//! Error taxonomy for a campaign crawl
//!
//! Recoverable errors are contained where they occur: a filter failure
//! degrades to the unfiltered search, an entry failure skips that entry.
//! Anything else aborts the run and marks the campaign failed.

use thiserror::Error;

use crate::browser::BrowserError;
use crate::storage::StorageError;

/// Result type for crawl operations
pub type CrawlResult<T> = Result<T, CrawlError>;

#[derive(Error, Debug)]
pub enum CrawlError {
    /// The filter panel or one of its controls could not be used
    #[error("Failed to apply {filter} filter: {reason}")]
    FilterApplication { filter: String, reason: String },

    /// An expected element inside a result entry is missing
    #[error("Element '{selector}' not found in result entry")]
    EntityLocate { selector: String },

    /// A canonical identifier could not be derived from a result link
    #[error("Cannot extract identifier from '{href}': {reason}")]
    Extraction { href: String, reason: String },

    /// The identifier was already recorded
    #[error("Identifier already recorded: {0}")]
    DuplicateIdentifier(String),

    /// A dedup or lead write failed
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),

    /// A page-level browser operation failed
    #[error("Browser failure: {0}")]
    Browser(#[from] BrowserError),

    /// Anything else that makes the run impossible to continue
    #[error("Crawl aborted: {0}")]
    Unhandled(String),
}

impl CrawlError {
    pub fn filter(filter: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::FilterApplication {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(href: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            href: href.into(),
            reason: reason.into(),
        }
    }

    pub fn entity_locate(selector: impl Into<String>) -> Self {
        Self::EntityLocate {
            selector: selector.into(),
        }
    }

    /// Whether the error can be contained without failing the run
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Browser(_) | Self::Unhandled(_))
    }
}
