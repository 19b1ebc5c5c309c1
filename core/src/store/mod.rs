//! Storage ports consumed by the crawler, the index builder and search.
//!
//! All operations are synchronous and must be safe to call from many crawl
//! tasks at once. The insert-if-absent operations are the only coordination
//! point between concurrent branches of a crawl, so implementations must make
//! them atomic.

mod sled_store;

pub use sled_store::SledStore;

use crate::error::Result;
use crate::model::{IndexEntry, Lemma, LemmaId, Page, PageId, Site, SiteId, SiteStatus};
use std::collections::{BTreeSet, HashMap};
use time::OffsetDateTime;

pub trait SiteStore {
    fn site_by_url(&self, url: &str) -> Result<Option<Site>>;
    fn site_by_id(&self, id: SiteId) -> Result<Option<Site>>;
    fn list_sites(&self) -> Result<Vec<Site>>;
    /// Creates the site when `site.id` is unknown, replaces it otherwise.
    /// Returns the stored row with its assigned id.
    fn insert_or_update_site(&self, site: Site) -> Result<Site>;
    fn set_status(&self, id: SiteId, status: SiteStatus) -> Result<()>;
    fn set_failed(&self, id: SiteId, status: SiteStatus, error: &str) -> Result<()>;
    fn set_last_error(&self, id: SiteId, error: &str) -> Result<()>;
    fn set_status_time(&self, id: SiteId, time: OffsetDateTime) -> Result<()>;
    /// Ids of stored sites whose url is not among `active_urls`.
    fn stale_site_ids(&self, active_urls: &[String]) -> Result<Vec<SiteId>>;
    fn delete_sites(&self, ids: &[SiteId]) -> Result<()>;
}

pub trait PageStore {
    /// Reserves `path` for a site with an empty page. Returns false if the
    /// path already existed.
    fn insert_path_if_absent(&self, site_id: SiteId, path: &str) -> Result<bool>;
    fn insert_page_if_absent(
        &self,
        site_id: SiteId,
        path: &str,
        code: u16,
        content: &str,
    ) -> Result<bool>;
    /// Returns the number of rows updated (0 or 1).
    fn update_page(&self, code: u16, content: &str, site_id: SiteId, path: &str) -> Result<usize>;
    fn page_by_path(&self, path: &str, site_id: SiteId) -> Result<Option<Page>>;
    fn page_id_by_path(&self, path: &str, site_id: SiteId) -> Result<Option<PageId>>;
    fn page_by_id(&self, id: PageId) -> Result<Option<Page>>;
    fn count_pages(&self, site_id: SiteId) -> Result<u64>;
    fn delete_pages_by_site(&self, site_id: SiteId) -> Result<()>;
    fn delete_page(&self, id: PageId) -> Result<()>;
    /// Stores a page under a fresh id, replacing any row with the same path.
    fn save_page(&self, site_id: SiteId, path: &str, code: u16, content: &str) -> Result<Page>;
}

pub trait LemmaStore {
    /// Ensures a row exists for every lemma without touching existing rows.
    fn upsert_lemmas_if_absent(&self, site_id: SiteId, lemmas: &[String]) -> Result<()>;
    /// Rows for the given normal forms, in one site or across all sites.
    fn lemmas_by_forms(&self, site_id: Option<SiteId>, lemmas: &[String]) -> Result<Vec<Lemma>>;
    /// Decrements every lemma the page was indexed with. Rows stay at zero
    /// so a concurrent upsert-then-resolve still finds them.
    fn adjust_frequency_on_page_removal(&self, page_id: PageId) -> Result<()>;
    fn count_lemmas(&self, site_id: SiteId) -> Result<u64>;
    fn delete_lemmas_by_site(&self, site_id: SiteId) -> Result<()>;
}

pub trait IndexStore {
    /// Inserts entries whose (page, lemma) pair is new and counts each in its
    /// lemma's frequency, atomically. Returns the inserted entries.
    fn insert_entries(&self, entries: &[IndexEntry]) -> Result<Vec<IndexEntry>>;
    fn delete_entries_by_page(&self, page_id: PageId) -> Result<()>;
    fn delete_entries_by_sites(&self, site_ids: &[SiteId]) -> Result<()>;
    /// Sorted ids of pages indexed with any of `lemma_ids`, optionally
    /// restricted to `within`.
    fn page_ids_by_lemmas(
        &self,
        lemma_ids: &[LemmaId],
        within: Option<&BTreeSet<PageId>>,
    ) -> Result<BTreeSet<PageId>>;
    /// Sum of every entry weight of the given pages.
    fn total_weight(&self, page_ids: &[PageId]) -> Result<f64>;
    /// Per page, the sum of entry weights restricted to `lemma_ids`.
    fn weight_by_lemmas(
        &self,
        page_ids: &[PageId],
        lemma_ids: &[LemmaId],
    ) -> Result<HashMap<PageId, f64>>;
}

/// Everything the core needs from storage, as one object.
pub trait Store: SiteStore + PageStore + LemmaStore + IndexStore + Send + Sync {}

impl<T> Store for T where T: SiteStore + PageStore + LemmaStore + IndexStore + Send + Sync {}
