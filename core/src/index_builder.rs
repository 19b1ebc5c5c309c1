use crate::error::Result;
use crate::lemmatizer::LemmaCounts;
use crate::model::{IndexEntry, Page, SiteId};
use crate::store::Store;
use tracing::debug;

/// Persists a page's lemma counts as lemma rows and weighted index entries.
pub struct IndexBuilder<'a> {
    store: &'a dyn Store,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Indexes `page` with its counting-mode lemmas. Error pages and empty
    /// lemma sets are skipped. Returns the number of entries written.
    pub fn index_page(&self, page: &Page, counts: &LemmaCounts) -> Result<usize> {
        if page.is_error() || counts.is_empty() {
            return Ok(0);
        }
        let forms: Vec<String> = counts.keys().cloned().collect();
        self.store.upsert_lemmas_if_absent(page.site_id, &forms)?;

        let lemmas = self.store.lemmas_by_forms(Some(page.site_id), &forms)?;
        let entries: Vec<IndexEntry> = lemmas
            .iter()
            .filter_map(|lemma| {
                counts.get(&lemma.lemma).map(|count| IndexEntry {
                    page_id: page.id,
                    lemma_id: lemma.id,
                    weight: f64::from(*count),
                })
            })
            .collect();

        let inserted = self.store.insert_entries(&entries)?;
        debug!(page = %page.path, site_id = page.site_id, entries = inserted.len(), "page indexed");
        Ok(inserted.len())
    }

    /// Withdraws a page's contribution: lemma frequencies, index entries and
    /// the page row itself.
    pub fn remove_page(&self, page_id: u64) -> Result<()> {
        self.store.adjust_frequency_on_page_removal(page_id)?;
        self.store.delete_entries_by_page(page_id)?;
        self.store.delete_page(page_id)
    }

    /// Clears everything indexed for the given sites, keeping the site rows.
    pub fn clear_sites(&self, site_ids: &[SiteId]) -> Result<()> {
        self.store.delete_entries_by_sites(site_ids)?;
        for site_id in site_ids {
            self.store.delete_lemmas_by_site(*site_id)?;
            self.store.delete_pages_by_site(*site_id)?;
        }
        Ok(())
    }
}
