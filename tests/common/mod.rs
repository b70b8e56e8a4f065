//! Common test utilities
//!
//! [`FakeBrowser`] plays back scripted search result pages using the default
//! selectors, so the crawl engine and scheduler can run without Chromium.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use prospector::browser::{BrowserError, BrowserHandle, BrowserProvider, BrowserResult};
use prospector::campaign::Transition;
use prospector::config::{CrawlConfig, SelectorConfig};
use prospector::crawler::{CrawlEngine, Pacing};
use prospector::models::{Campaign, DedupRecord, Lead};
use prospector::storage::{
    CampaignStore, DedupStore, InMemoryStore, LeadStore, StorageError, StorageResult, Stores,
};

/// Profile link for an identifier, as it appears in a result entry
pub fn profile_href(id: &str) -> String {
    format!("https://www.example.com/in/{id}/?miniProfile=abc")
}

/// One result entry on a scripted page
#[derive(Debug, Clone)]
pub enum FakeEntry {
    /// Entry with a profile link
    Link(String),
    /// Entry whose link element is missing
    NoLink,
    /// Entry whose link goes stale before its href is read
    StaleLink,
    /// Entry whose href read fails because the session died
    DeadSession,
}

/// A scripted search result page
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub entries: Vec<FakeEntry>,
    pub has_next: bool,
    /// Listing entries on this page fails with a driver error
    pub fail: bool,
    /// Checking the "next" control times out
    pub stale_next: bool,
}

impl FakePage {
    /// Page listing the given profile identifiers
    pub fn profiles(ids: &[&str]) -> Self {
        Self {
            entries: ids
                .iter()
                .map(|id| FakeEntry::Link(profile_href(id)))
                .collect(),
            has_next: false,
            fail: false,
            stale_next: false,
        }
    }

    pub fn with_next(mut self) -> Self {
        self.has_next = true;
        self
    }

    /// Page with a "next" control that times out when checked
    pub fn with_stale_next(mut self) -> Self {
        self.has_next = true;
        self.stale_next = true;
        self
    }

    pub fn with_entry(mut self, entry: FakeEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Page whose entry listing fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

/// Element handles handed out by [`FakeBrowser`]
#[derive(Debug, Clone)]
pub enum FakeElement {
    Entry(usize),
    Link(String),
    StaleLink,
    DeadLink,
    Control(String),
}

/// Scripted [`BrowserHandle`]
#[derive(Debug, Clone)]
pub struct FakeBrowser {
    selectors: SelectorConfig,
    default_pages: Vec<FakePage>,
    scripts: HashMap<String, Vec<FakePage>>,
    pages: Vec<FakePage>,
    current: usize,
    filters_available: bool,
    total_text: Option<String>,
    panic_on_query: Option<String>,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
}

impl FakeBrowser {
    /// Browser that shows `pages` for every search
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            selectors: SelectorConfig::default(),
            default_pages: pages,
            scripts: HashMap::new(),
            pages: Vec::new(),
            current: 0,
            filters_available: true,
            total_text: Some("About 1,234 results".to_string()),
            panic_on_query: None,
            navigations: Vec::new(),
            clicks: Vec::new(),
            typed: Vec::new(),
        }
    }

    /// Show `pages` when the search query is `query`
    pub fn with_script(mut self, query: &str, pages: Vec<FakePage>) -> Self {
        self.scripts.insert(query.to_string(), pages);
        self
    }

    /// Remove the filter panel from the page
    pub fn without_filters(mut self) -> Self {
        self.filters_available = false;
        self
    }

    pub fn with_total_text(mut self, text: Option<&str>) -> Self {
        self.total_text = text.map(str::to_string);
        self
    }

    /// Panic when navigating to a search for `query`
    pub fn panic_on(mut self, query: &str) -> Self {
        self.panic_on_query = Some(query.to_string());
        self
    }

    fn page(&self) -> Option<&FakePage> {
        self.pages.get(self.current)
    }

    fn is_filter_input(&self, selector: &str) -> bool {
        selector == self.selectors.company_input
            || selector == self.selectors.past_company_input
            || selector == self.selectors.school_input
    }
}

fn keywords(url: &str) -> Option<String> {
    let url = url::Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "keywords")
        .map(|(_, value)| value.into_owned())
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.navigations.push(url.to_string());
        let query = keywords(url).unwrap_or_default();

        if self.panic_on_query.as_deref() == Some(query.as_str()) {
            panic!("renderer crashed while loading {url}");
        }

        self.pages = self
            .scripts
            .get(&query)
            .unwrap_or(&self.default_pages)
            .clone();
        self.current = 0;
        Ok(())
    }

    async fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<FakeElement>> {
        if selector != self.selectors.result_entry {
            return Ok(Vec::new());
        }
        match self.page() {
            Some(page) if page.fail => Err(BrowserError::driver("target closed")),
            Some(page) => Ok((0..page.entries.len()).map(FakeElement::Entry).collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn find_one(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> BrowserResult<Option<FakeElement>> {
        let found = if selector == self.selectors.next_button {
            self.page().is_some_and(|page| page.has_next)
        } else if self.is_filter_input(selector) {
            self.filters_available
        } else {
            false
        };
        Ok(found.then(|| FakeElement::Control(selector.to_string())))
    }

    async fn find_in(
        &mut self,
        element: &FakeElement,
        selector: &str,
    ) -> BrowserResult<Option<FakeElement>> {
        let FakeElement::Entry(index) = element else {
            return Ok(None);
        };
        if selector != self.selectors.result_link {
            return Ok(None);
        }
        match self.page().and_then(|page| page.entries.get(*index)) {
            Some(FakeEntry::Link(href)) => Ok(Some(FakeElement::Link(href.clone()))),
            Some(FakeEntry::StaleLink) => Ok(Some(FakeElement::StaleLink)),
            Some(FakeEntry::DeadSession) => Ok(Some(FakeElement::DeadLink)),
            _ => Ok(None),
        }
    }

    async fn send_keys(&mut self, selector: &str, text: &str) -> BrowserResult<()> {
        self.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        self.clicks.push(selector.to_string());

        if selector == self.selectors.next_button {
            if self.page().is_some_and(|page| page.has_next) {
                self.current += 1;
                return Ok(true);
            }
            return Ok(false);
        }

        let filter_control = selector == self.selectors.filter_panel_button
            || selector == self.selectors.filter_suggestion
            || selector == self.selectors.filter_apply_button;
        Ok(filter_control && self.filters_available)
    }

    async fn scroll(&mut self, _steps: u32, _px_per_step: u32) -> BrowserResult<()> {
        Ok(())
    }

    async fn get_attribute(
        &mut self,
        element: &FakeElement,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        match element {
            FakeElement::Link(href) if name == "href" => Ok(Some(href.clone())),
            FakeElement::StaleLink => Err(BrowserError::Timeout {
                selector: name.to_string(),
                timeout_ms: 50,
            }),
            FakeElement::DeadLink => Err(BrowserError::driver("session closed")),
            _ => Ok(None),
        }
    }

    async fn get_text(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> BrowserResult<Option<String>> {
        if selector == self.selectors.total_results {
            Ok(self.total_text.clone())
        } else {
            Ok(None)
        }
    }

    async fn is_enabled(&mut self, _element: &FakeElement) -> BrowserResult<bool> {
        if self.page().is_some_and(|page| page.stale_next) {
            return Err(BrowserError::Timeout {
                selector: self.selectors.next_button.clone(),
                timeout_ms: 50,
            });
        }
        Ok(true)
    }
}

/// Provider that hands out clones of a scripted browser
pub struct FakeProvider {
    pub browser: FakeBrowser,
    pub unavailable: bool,
}

#[async_trait]
impl BrowserProvider for FakeProvider {
    type Handle = FakeBrowser;

    async fn acquire(&self) -> BrowserResult<FakeBrowser> {
        if self.unavailable {
            return Err(BrowserError::SessionUnavailable("no session".to_string()));
        }
        Ok(self.browser.clone())
    }
}

/// Lead store that rejects writes for selected identifiers
pub struct FailingLeadStore {
    pub inner: Arc<InMemoryStore>,
    pub fail_for: HashSet<String>,
}

#[async_trait]
impl LeadStore for FailingLeadStore {
    async fn create_lead(&self, lead: &Lead) -> StorageResult<()> {
        if self.fail_for.contains(&lead.external_id) {
            return Err(StorageError::Pool("connection reset".to_string()));
        }
        self.inner.create_lead(lead).await
    }

    async fn leads_for_campaign(&self, campaign_id: Uuid) -> StorageResult<Vec<Lead>> {
        self.inner.leads_for_campaign(campaign_id).await
    }
}

/// Dedup store that loses the insert race for selected identifiers
///
/// `exists` reports them absent, then `insert_if_absent` finds them taken.
pub struct RacingDedupStore {
    pub inner: Arc<InMemoryStore>,
    pub racing: HashSet<String>,
}

#[async_trait]
impl DedupStore for RacingDedupStore {
    async fn exists(&self, external_id: &str) -> StorageResult<bool> {
        if self.racing.contains(external_id) {
            return Ok(false);
        }
        self.inner.exists(external_id).await
    }

    async fn insert_if_absent(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        if self.racing.contains(external_id) {
            return Ok(false);
        }
        self.inner.insert_if_absent(external_id, campaign_id).await
    }

    async fn get(&self, external_id: &str) -> StorageResult<Option<DedupRecord>> {
        self.inner.get(external_id).await
    }

    async fn release(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        self.inner.release(external_id, campaign_id).await
    }
}

/// Campaign store whose completion write always fails
pub struct FailingCompleteStore {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl CampaignStore for FailingCompleteStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        self.inner.insert_campaign(campaign).await
    }

    async fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        self.inner.get_campaign(id).await
    }

    async fn find_eligible(&self, limit: usize) -> StorageResult<Vec<Campaign>> {
        self.inner.find_eligible(limit).await
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> StorageResult<Option<Campaign>> {
        if matches!(transition, Transition::Complete { .. }) {
            return Err(StorageError::Pool("pool timed out".to_string()));
        }
        self.inner.transition(id, transition).await
    }
}

/// Crawl settings for tests
pub fn test_crawl_config() -> CrawlConfig {
    CrawlConfig {
        page_cap: 10,
        ..CrawlConfig::default()
    }
}

/// Engine over `stores` with no pacing delays
pub fn test_engine(stores: &Stores, config: CrawlConfig) -> CrawlEngine {
    CrawlEngine::new(stores, config).with_pacing(Pacing::none())
}

/// Insert a campaign and claim it, as the scheduler would
pub async fn picked_up(store: &Arc<InMemoryStore>, campaign: Campaign) -> Campaign {
    let id = campaign.id;
    store.insert_campaign(&campaign).await.unwrap();
    store
        .transition(id, &Transition::pickup())
        .await
        .unwrap()
        .unwrap()
}

/// Current state of a campaign
pub async fn reload(store: &Arc<InMemoryStore>, id: Uuid) -> Campaign {
    store.get_campaign(id).await.unwrap().unwrap()
}
