//! Search page adapter
//!
//! Everything that depends on the layout of the search page lives here:
//! selectors, search URL construction, identifier extraction from result
//! links, result-count parsing, the filter panel and the "next" control.
//! The crawl engine only sees the outcomes.

use regex::Regex;
use url::Url;

use super::error::{CrawlError, CrawlResult};
use super::pacing::Pacing;
use crate::browser::{BrowserError, BrowserHandle};
use crate::config::{CrawlConfig, SelectorConfig};
use crate::models::{FilterKind, SearchFilters};

/// Layout-specific operations on the search page
pub struct PageAdapter {
    config: CrawlConfig,
    identifier_pattern: Regex,
    count_pattern: Regex,
}

impl PageAdapter {
    #[must_use]
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            // Profile slugs: letters, digits, dashes, underscores, percent escapes
            identifier_pattern: Regex::new(r"^[A-Za-z0-9_%\-]+$").unwrap(),
            // First number, allowing thousands separators
            count_pattern: Regex::new(r"\d[\d,.\x{a0} ]*").unwrap(),
        }
    }

    pub fn selectors(&self) -> &SelectorConfig {
        &self.config.selectors
    }

    /// Initial search URL for a query
    pub fn search_url(&self, query: &str) -> CrawlResult<String> {
        let mut url = Url::parse(&self.config.search_url).map_err(|e| {
            CrawlError::Unhandled(format!(
                "invalid search URL '{}': {e}",
                self.config.search_url
            ))
        })?;
        url.query_pairs_mut().append_pair("keywords", query.trim());
        Ok(url.into())
    }

    /// Canonical external identifier from a result link's `href`.
    ///
    /// Relative links are resolved against the search URL. The identifier is
    /// the path segment following the configured profile segment, so query
    /// strings and trailing path parts do not produce distinct identifiers.
    pub fn extract_identifier(&self, href: &str) -> CrawlResult<String> {
        let href = href.trim();
        if href.is_empty() {
            return Err(CrawlError::extraction(href, "empty link"));
        }

        let url = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&self.config.search_url)
                .and_then(|base| base.join(href))
                .map_err(|e| CrawlError::extraction(href, e.to_string()))?,
            Err(e) => return Err(CrawlError::extraction(href, e.to_string())),
        };

        let mut segments = url
            .path_segments()
            .ok_or_else(|| CrawlError::extraction(href, "link has no path"))?;

        let marker = self.config.profile_path_segment.as_str();
        if !segments.any(|segment| segment == marker) {
            return Err(CrawlError::extraction(
                href,
                format!("no '/{marker}/' segment"),
            ));
        }

        let identifier = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| CrawlError::extraction(href, "empty identifier segment"))?;

        if !self.identifier_pattern.is_match(identifier) {
            return Err(CrawlError::extraction(
                href,
                format!("unexpected characters in '{identifier}'"),
            ));
        }

        Ok(identifier.to_string())
    }

    /// Parse an approximate result count such as "About 1,234 results"
    pub fn parse_total_results(&self, text: &str) -> Option<i64> {
        let matched = self.count_pattern.find(text)?;
        let digits: String = matched
            .as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }

    /// Read the result-count indicator, if present and parseable
    pub async fn read_total_results<B: BrowserHandle>(&self, browser: &mut B) -> Option<i64> {
        let selector = &self.config.selectors.total_results;
        match browser
            .get_text(selector, self.config.element_timeout())
            .await
        {
            Ok(Some(text)) => self.parse_total_results(&text),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Result count indicator unavailable");
                None
            }
        }
    }

    fn filter_input(&self, kind: FilterKind) -> &str {
        let selectors = &self.config.selectors;
        match kind {
            FilterKind::Company => &selectors.company_input,
            FilterKind::PastCompany => &selectors.past_company_input,
            FilterKind::School => &selectors.school_input,
        }
    }

    /// Open the filter panel, fill every set filter and apply.
    ///
    /// Any failure is reported as [`CrawlError::FilterApplication`]; the
    /// caller decides how to recover.
    pub async fn apply_filters<B: BrowserHandle>(
        &self,
        browser: &mut B,
        filters: &SearchFilters,
        pacing: &Pacing,
    ) -> CrawlResult<()> {
        let selectors = &self.config.selectors;
        let timeout = self.config.element_timeout();
        let failed = |filter: &str, e: BrowserError| CrawlError::filter(filter, e);

        if !browser
            .click(&selectors.filter_panel_button)
            .await
            .map_err(|e| failed("panel", e))?
        {
            return Err(CrawlError::filter("panel", "filter panel button not found"));
        }
        pacing.action().await;

        for (kind, value) in filters.entries() {
            let input = self.filter_input(kind);

            browser
                .find_one(input, timeout)
                .await
                .map_err(|e| failed(kind.as_str(), e))?
                .ok_or_else(|| CrawlError::filter(kind.as_str(), "input not found"))?;

            browser
                .send_keys(input, value)
                .await
                .map_err(|e| failed(kind.as_str(), e))?;
            pacing.action().await;

            if !browser
                .click(&selectors.filter_suggestion)
                .await
                .map_err(|e| failed(kind.as_str(), e))?
            {
                return Err(CrawlError::filter(kind.as_str(), "no suggestion for value"));
            }
            pacing.action().await;

            tracing::debug!(filter = kind.as_str(), value, "Filter populated");
        }

        if !browser
            .click(&selectors.filter_apply_button)
            .await
            .map_err(|e| failed("apply", e))?
        {
            return Err(CrawlError::filter("apply", "apply button not found"));
        }
        pacing.settle().await;

        Ok(())
    }

    /// Move to the next result page.
    ///
    /// Returns false when the control is absent, disabled or not clickable.
    /// Only non-recoverable browser failures are errors.
    pub async fn advance<B: BrowserHandle>(&self, browser: &mut B) -> CrawlResult<bool> {
        let selector = &self.config.selectors.next_button;

        let next = match browser.find_one(selector, self.config.element_timeout()).await {
            Ok(Some(element)) => element,
            Ok(None) => return Ok(false),
            Err(e) if e.is_recoverable() => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match browser.is_enabled(&next).await {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) if e.is_recoverable() => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match browser.click(selector).await {
            Ok(clicked) => Ok(clicked),
            Err(e) if e.is_recoverable() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
