//! Unified error handling for the prospector crate
//!
//! Each module owns a domain error (`StorageError`, `LockError`, ...). This
//! module consolidates them into a single [`Error`] for code that crosses
//! module boundaries, such as the CLI commands, and classifies them for the
//! `prospector_errors_total` metric.
//!
//! # Architecture
//!
//! - [`ProspectorErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use prospector::error::{Error, ProspectorErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "Will retry next tick: {err}");
//!     } else {
//!         tracing::error!("Fatal error: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::browser::BrowserError;
pub use crate::crawler::CrawlError;
pub use crate::enrichment::EnrichmentError;
pub use crate::lock::LockError;
pub use crate::scheduler::SchedulerError;
pub use crate::server::ServerError;
pub use crate::storage::StorageError;

/// Common trait for all prospector error types
pub trait ProspectorErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Browser automation errors
    Browser,
    /// Persistence errors
    Storage,
    /// Cluster lock errors
    Lock,
    /// Enrichment queue errors
    Queue,
    /// Crawl loop errors
    Crawl,
    /// Campaign lifecycle and scheduling errors
    Scheduler,
    /// Configuration and validation errors
    Config,
    /// HTTP endpoint errors
    Server,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Storage => "storage",
            Self::Lock => "lock",
            Self::Queue => "queue",
            Self::Crawl => "crawl",
            Self::Scheduler => "scheduler",
            Self::Config => "config",
            Self::Server => "server",
            Self::Other => "other",
        }
    }
}

macro_rules! impl_error_trait {
    ($($ty:ty => $category:expr),* $(,)?) => {
        $(
            impl ProspectorErrorTrait for $ty {
                fn is_recoverable(&self) -> bool {
                    <$ty>::is_recoverable(self)
                }

                fn category(&self) -> ErrorCategory {
                    $category
                }
            }
        )*
    };
}

impl_error_trait! {
    BrowserError => ErrorCategory::Browser,
    StorageError => ErrorCategory::Storage,
    LockError => ErrorCategory::Lock,
    EnrichmentError => ErrorCategory::Queue,
    CrawlError => ErrorCategory::Crawl,
    SchedulerError => ErrorCategory::Scheduler,
}

/// Unified error type for the prospector crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProspectorErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Browser(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Lock(e) => e.is_recoverable(),
            Self::Enrichment(e) => e.is_recoverable(),
            Self::Crawl(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Server(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Browser(_) => ErrorCategory::Browser,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Lock(_) => ErrorCategory::Lock,
            Self::Enrichment(_) => ErrorCategory::Queue,
            Self::Crawl(_) => ErrorCategory::Crawl,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Server(_) => ErrorCategory::Server,
            Self::Other { .. } => ErrorCategory::Other,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
