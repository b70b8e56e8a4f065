//! Campaign crawling through a browser automation handle
//!
//! - [`engine`] - the paginated crawl loop and its report
//! - [`page`] - search page layout: selectors, URLs, identifiers, filters
//! - [`sink`] - per-run accumulator of new lead ids
//! - [`pacing`] - randomized delays between actions
//! - [`error`] - error taxonomy deciding what a run can survive

pub mod engine;
pub mod error;
pub mod pacing;
pub mod page;
pub mod sink;

pub use engine::{CrawlEngine, CrawlOutcome, CrawlReport, StopReason};
pub use error::{CrawlError, CrawlResult};
pub use pacing::Pacing;
pub use page::PageAdapter;
pub use sink::ResultSink;
