use super::{IndexStore, LemmaStore, PageStore, SiteStore};
use crate::error::{Error, Result};
use crate::model::{IndexEntry, Lemma, LemmaId, Page, PageId, Site, SiteId, SiteStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Transactional, Tree};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use time::OffsetDateTime;

/// Store backed by an embedded sled database.
///
/// Layout (all ids are big-endian u64):
/// - `sites`: site id -> Site, `site_urls`: url -> site id
/// - `pages`: page id -> Page, `page_paths`: site id ++ path -> page id
/// - `lemmas`: lemma id -> Lemma, `lemma_forms`: site id ++ lemma -> lemma id
/// - `entries`: page id ++ lemma id -> weight, `postings`: lemma id ++ page id -> weight
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    sites: Tree,
    site_urls: Tree,
    pages: Tree,
    page_paths: Tree,
    lemmas: Tree,
    lemma_forms: Tree,
    entries: Tree,
    postings: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            sites: db.open_tree("sites")?,
            site_urls: db.open_tree("site_urls")?,
            pages: db.open_tree("pages")?,
            page_paths: db.open_tree("page_paths")?,
            lemmas: db.open_tree("lemmas")?,
            lemma_forms: db.open_tree("lemma_forms")?,
            entries: db.open_tree("entries")?,
            postings: db.open_tree("postings")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    fn get<T: DeserializeOwned>(tree: &Tree, id: u64) -> Result<Option<T>> {
        match tree.get(id_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn modify_site<F>(&self, id: SiteId, f: F) -> Result<()>
    where
        F: Fn(&mut Site),
    {
        self.sites
            .transaction(|sites| -> ConflictableTransactionResult<(), Error> {
                let Some(bytes) = sites.get(id_key(id))? else {
                    return Err(ConflictableTransactionError::Abort(Error::NotFound(format!(
                        "site {id} not found"
                    ))));
                };
                let mut site: Site = abort(decode(&bytes))?;
                f(&mut site);
                sites.insert(&id_key(id)[..], abort(encode(&site))?)?;
                Ok(())
            })
            .map_err(from_tx)
    }

    fn page_ids_of_site(&self, site_id: SiteId) -> Result<Vec<PageId>> {
        self.page_paths
            .scan_prefix(id_key(site_id))
            .values()
            .map(|v| -> Result<PageId> { Ok(read_id(&v?)) })
            .collect()
    }
}

impl SiteStore for SledStore {
    fn site_by_url(&self, url: &str) -> Result<Option<Site>> {
        match self.site_urls.get(url.as_bytes())? {
            Some(id) => Self::get(&self.sites, read_id(&id)),
            None => Ok(None),
        }
    }

    fn site_by_id(&self, id: SiteId) -> Result<Option<Site>> {
        Self::get(&self.sites, id)
    }

    fn list_sites(&self) -> Result<Vec<Site>> {
        self.sites.iter().values().map(|v| -> Result<Site> { decode(&v?) }).collect()
    }

    fn insert_or_update_site(&self, site: Site) -> Result<Site> {
        let fresh_id = self.next_id()?;
        (&self.sites, &self.site_urls)
            .transaction(|(sites, urls)| -> ConflictableTransactionResult<Site, Error> {
                let mut site = site.clone();
                let previous: Option<Site> = match sites.get(id_key(site.id))? {
                    Some(bytes) => Some(abort(decode(&bytes))?),
                    None => None,
                };
                site.id = match (&previous, urls.get(site.url.as_bytes())?) {
                    (Some(_), _) => site.id,
                    (None, Some(existing)) => read_id(&existing),
                    (None, None) => fresh_id,
                };
                if let Some(previous) = previous.filter(|p| p.url != site.url) {
                    urls.remove(previous.url.as_bytes())?;
                }
                urls.insert(site.url.as_bytes(), &id_key(site.id)[..])?;
                sites.insert(&id_key(site.id)[..], abort(encode(&site))?)?;
                Ok(site)
            })
            .map_err(from_tx)
    }

    fn set_status(&self, id: SiteId, status: SiteStatus) -> Result<()> {
        self.modify_site(id, |s| {
            s.status = status;
            s.status_time = OffsetDateTime::now_utc();
        })
    }

    fn set_failed(&self, id: SiteId, status: SiteStatus, error: &str) -> Result<()> {
        self.modify_site(id, |s| {
            s.status = status;
            s.last_error = error.to_string();
            s.status_time = OffsetDateTime::now_utc();
        })
    }

    fn set_last_error(&self, id: SiteId, error: &str) -> Result<()> {
        self.modify_site(id, |s| s.last_error = error.to_string())
    }

    fn set_status_time(&self, id: SiteId, time: OffsetDateTime) -> Result<()> {
        self.modify_site(id, |s| s.status_time = time)
    }

    fn stale_site_ids(&self, active_urls: &[String]) -> Result<Vec<SiteId>> {
        let active: HashSet<&str> = active_urls.iter().map(String::as_str).collect();
        Ok(self
            .list_sites()?
            .into_iter()
            .filter(|s| !active.contains(s.url.as_str()))
            .map(|s| s.id)
            .collect())
    }

    fn delete_sites(&self, ids: &[SiteId]) -> Result<()> {
        for id in ids {
            if let Some(site) = self.site_by_id(*id)? {
                self.site_urls.remove(site.url.as_bytes())?;
            }
            self.sites.remove(id_key(*id))?;
        }
        Ok(())
    }
}

impl PageStore for SledStore {
    fn insert_path_if_absent(&self, site_id: SiteId, path: &str) -> Result<bool> {
        self.insert_page_if_absent(site_id, path, 0, "")
    }

    fn insert_page_if_absent(
        &self,
        site_id: SiteId,
        path: &str,
        code: u16,
        content: &str,
    ) -> Result<bool> {
        let id = self.next_id()?;
        let key = scoped_key(site_id, path);
        let page = Page { id, site_id, path: path.to_string(), code, content: content.to_string() };
        let bytes = encode(&page)?;
        (&self.page_paths, &self.pages)
            .transaction(|(paths, pages)| -> ConflictableTransactionResult<bool, Error> {
                if paths.get(key.as_slice())?.is_some() {
                    return Ok(false);
                }
                paths.insert(key.as_slice(), &id_key(id)[..])?;
                pages.insert(&id_key(id)[..], bytes.as_slice())?;
                Ok(true)
            })
            .map_err(from_tx)
    }

    fn update_page(&self, code: u16, content: &str, site_id: SiteId, path: &str) -> Result<usize> {
        let key = scoped_key(site_id, path);
        (&self.page_paths, &self.pages)
            .transaction(|(paths, pages)| -> ConflictableTransactionResult<usize, Error> {
                let Some(id) = paths.get(key.as_slice())? else {
                    return Ok(0);
                };
                let Some(bytes) = pages.get(&id[..])? else {
                    return Ok(0);
                };
                let mut page: Page = abort(decode(&bytes))?;
                page.code = code;
                page.content = content.to_string();
                pages.insert(&id[..], abort(encode(&page))?)?;
                Ok(1)
            })
            .map_err(from_tx)
    }

    fn page_by_path(&self, path: &str, site_id: SiteId) -> Result<Option<Page>> {
        match self.page_id_by_path(path, site_id)? {
            Some(id) => self.page_by_id(id),
            None => Ok(None),
        }
    }

    fn page_id_by_path(&self, path: &str, site_id: SiteId) -> Result<Option<PageId>> {
        Ok(self.page_paths.get(scoped_key(site_id, path))?.map(|v| read_id(&v)))
    }

    fn page_by_id(&self, id: PageId) -> Result<Option<Page>> {
        Self::get(&self.pages, id)
    }

    fn count_pages(&self, site_id: SiteId) -> Result<u64> {
        Ok(self.page_paths.scan_prefix(id_key(site_id)).count() as u64)
    }

    fn delete_pages_by_site(&self, site_id: SiteId) -> Result<()> {
        let keys: Vec<_> = self
            .page_paths
            .scan_prefix(id_key(site_id))
            .collect::<std::result::Result<_, _>>()?;
        for (path_key, id) in keys {
            self.pages.remove(&id)?;
            self.page_paths.remove(path_key)?;
        }
        Ok(())
    }

    fn delete_page(&self, id: PageId) -> Result<()> {
        if let Some(page) = self.page_by_id(id)? {
            self.page_paths.remove(scoped_key(page.site_id, &page.path))?;
        }
        self.pages.remove(id_key(id))?;
        Ok(())
    }

    fn save_page(&self, site_id: SiteId, path: &str, code: u16, content: &str) -> Result<Page> {
        let id = self.next_id()?;
        let key = scoped_key(site_id, path);
        let page = Page { id, site_id, path: path.to_string(), code, content: content.to_string() };
        let bytes = encode(&page)?;
        (&self.page_paths, &self.pages)
            .transaction(|(paths, pages)| -> ConflictableTransactionResult<(), Error> {
                if let Some(old) = paths.get(key.as_slice())? {
                    pages.remove(&old[..])?;
                }
                paths.insert(key.as_slice(), &id_key(id)[..])?;
                pages.insert(&id_key(id)[..], bytes.as_slice())?;
                Ok(())
            })
            .map_err(from_tx)?;
        Ok(page)
    }
}

impl LemmaStore for SledStore {
    fn upsert_lemmas_if_absent(&self, site_id: SiteId, lemmas: &[String]) -> Result<()> {
        let mut rows = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let id = self.next_id()?;
            let row = Lemma { id, site_id, lemma: lemma.clone(), frequency: 0 };
            rows.push((scoped_key(site_id, lemma), id, encode(&row)?));
        }
        (&self.lemma_forms, &self.lemmas)
            .transaction(|(forms, lemmas)| -> ConflictableTransactionResult<(), Error> {
                for (key, id, bytes) in &rows {
                    if forms.get(key.as_slice())?.is_some() {
                        continue;
                    }
                    forms.insert(key.as_slice(), &id_key(*id)[..])?;
                    lemmas.insert(&id_key(*id)[..], bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(from_tx)
    }

    fn lemmas_by_forms(&self, site_id: Option<SiteId>, lemmas: &[String]) -> Result<Vec<Lemma>> {
        let site_ids: Vec<SiteId> = match site_id {
            Some(id) => vec![id],
            None => self
                .sites
                .iter()
                .keys()
                .map(|k| -> Result<SiteId> { Ok(read_id(&k?)) })
                .collect::<Result<_>>()?,
        };
        let mut rows = Vec::new();
        for site_id in site_ids {
            for lemma in lemmas {
                if let Some(id) = self.lemma_forms.get(scoped_key(site_id, lemma))? {
                    if let Some(row) = Self::get::<Lemma>(&self.lemmas, read_id(&id))? {
                        rows.push(row);
                    }
                }
            }
        }
        Ok(rows)
    }

    fn adjust_frequency_on_page_removal(&self, page_id: PageId) -> Result<()> {
        let lemma_ids: Vec<LemmaId> = self
            .entries
            .scan_prefix(id_key(page_id))
            .keys()
            .map(|k| -> Result<LemmaId> { Ok(read_id(&k?[8..])) })
            .collect::<Result<_>>()?;
        self.lemmas
            .transaction(|lemmas| -> ConflictableTransactionResult<(), Error> {
                for id in &lemma_ids {
                    let Some(bytes) = lemmas.get(id_key(*id))? else { continue };
                    let mut row: Lemma = abort(decode(&bytes))?;
                    row.frequency = row.frequency.saturating_sub(1);
                    lemmas.insert(&id_key(*id)[..], abort(encode(&row))?)?;
                }
                Ok(())
            })
            .map_err(from_tx)
    }

    fn count_lemmas(&self, site_id: SiteId) -> Result<u64> {
        Ok(self.lemma_forms.scan_prefix(id_key(site_id)).count() as u64)
    }

    fn delete_lemmas_by_site(&self, site_id: SiteId) -> Result<()> {
        let keys: Vec<_> = self
            .lemma_forms
            .scan_prefix(id_key(site_id))
            .collect::<std::result::Result<_, _>>()?;
        for (form_key, id) in keys {
            self.lemmas.remove(&id)?;
            self.lemma_forms.remove(form_key)?;
        }
        Ok(())
    }
}

impl IndexStore for SledStore {
    fn insert_entries(&self, entries: &[IndexEntry]) -> Result<Vec<IndexEntry>> {
        (&self.entries, &self.postings, &self.lemmas)
            .transaction(|(by_page, by_lemma, lemmas)| -> ConflictableTransactionResult<_, Error> {
                let mut inserted = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = pair_key(entry.page_id, entry.lemma_id);
                    if by_page.get(&key[..])?.is_some() {
                        continue;
                    }
                    let weight = entry.weight.to_be_bytes();
                    by_page.insert(&key[..], &weight[..])?;
                    by_lemma.insert(&pair_key(entry.lemma_id, entry.page_id)[..], &weight[..])?;
                    if let Some(bytes) = lemmas.get(id_key(entry.lemma_id))? {
                        let mut row: Lemma = abort(decode(&bytes))?;
                        row.frequency += 1;
                        lemmas.insert(&id_key(entry.lemma_id)[..], abort(encode(&row))?)?;
                    }
                    inserted.push(entry.clone());
                }
                Ok(inserted)
            })
            .map_err(from_tx)
    }

    fn delete_entries_by_page(&self, page_id: PageId) -> Result<()> {
        let keys: Vec<_> = self
            .entries
            .scan_prefix(id_key(page_id))
            .keys()
            .collect::<std::result::Result<_, _>>()?;
        for key in keys {
            let lemma_id = read_id(&key[8..]);
            self.postings.remove(&pair_key(lemma_id, page_id)[..])?;
            self.entries.remove(key)?;
        }
        Ok(())
    }

    fn delete_entries_by_sites(&self, site_ids: &[SiteId]) -> Result<()> {
        for site_id in site_ids {
            for page_id in self.page_ids_of_site(*site_id)? {
                self.delete_entries_by_page(page_id)?;
            }
        }
        Ok(())
    }

    fn page_ids_by_lemmas(
        &self,
        lemma_ids: &[LemmaId],
        within: Option<&BTreeSet<PageId>>,
    ) -> Result<BTreeSet<PageId>> {
        let mut ids = BTreeSet::new();
        for lemma_id in lemma_ids {
            for key in self.postings.scan_prefix(id_key(*lemma_id)).keys() {
                let page_id = read_id(&key?[8..]);
                if within.map_or(true, |w| w.contains(&page_id)) {
                    ids.insert(page_id);
                }
            }
        }
        Ok(ids)
    }

    fn total_weight(&self, page_ids: &[PageId]) -> Result<f64> {
        let mut total = 0.0;
        for page_id in page_ids {
            for weight in self.entries.scan_prefix(id_key(*page_id)).values() {
                total += read_weight(&weight?);
            }
        }
        Ok(total)
    }

    fn weight_by_lemmas(
        &self,
        page_ids: &[PageId],
        lemma_ids: &[LemmaId],
    ) -> Result<HashMap<PageId, f64>> {
        let mut weights = HashMap::new();
        for page_id in page_ids {
            for lemma_id in lemma_ids {
                if let Some(w) = self.entries.get(&pair_key(*page_id, *lemma_id)[..])? {
                    *weights.entry(*page_id).or_insert(0.0) += read_weight(&w);
                }
            }
        }
        Ok(weights)
    }
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

fn scoped_key(scope: u64, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + name.len());
    key.extend_from_slice(&scope.to_be_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

fn read_id(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_be_bytes(buf)
}

fn read_weight(bytes: &[u8]) -> f64 {
    f64::from_bits(read_id(bytes))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn abort<T>(result: Result<T>) -> ConflictableTransactionResult<T, Error> {
    result.map_err(ConflictableTransactionError::Abort)
}

fn from_tx(err: TransactionError<Error>) -> Error {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => Error::Storage(e),
    }
}
