use crate::config::SearchSettings;
use crate::error::{Error, Result};
use crate::html::{clean_html, extract_title};
use crate::lemmatizer::Lemmatizer;
use crate::model::{canonical_url, ids_of, Lemma, LemmaId, PageId, Site, SiteId, SiteStatus};
use crate::snippet::generate_snippet;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    /// Site url; all indexed sites when absent.
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub site: String,
    pub site_name: String,
    pub uri: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchPage {
    /// Matches before pagination.
    pub count: usize,
    pub data: Vec<SearchResult>,
}

/// One query lemma, possibly stored under several sites.
#[derive(Debug)]
struct Term {
    lemma: String,
    lemma_ids: Vec<LemmaId>,
    frequency: u64,
}

#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn Store>,
    lemmatizer: Arc<Lemmatizer>,
    settings: SearchSettings,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn Store>,
        lemmatizer: Arc<Lemmatizer>,
        settings: SearchSettings,
    ) -> Self {
        Self { store, lemmatizer, settings }
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(Error::Validation("search query must not be blank".into()));
        }
        let site = self.resolve_site(query.site.as_deref())?;

        let query_lemmas: HashSet<String> = self.lemmatizer.lemmatize(text).into_keys().collect();
        let forms: Vec<String> = query_lemmas.iter().cloned().collect();
        let rows = self.store.lemmas_by_forms(site.as_ref().map(|s| s.id), &forms)?;
        let rows = self.searchable(rows, site.is_some())?;
        let terms = rarest_first(rows);
        if terms.is_empty() {
            debug!(query = text, "no query lemma is indexed");
            return Ok(SearchPage::default());
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(self.settings.default_limit);
        let (count, page_ids) = self.intersect(&terms, offset, limit)?;
        if page_ids.is_empty() {
            return Ok(SearchPage { count, data: Vec::new() });
        }

        let lemma_ids: Vec<LemmaId> =
            terms.iter().flat_map(|t| t.lemma_ids.iter().copied()).collect();
        let ranked = self.rank(&page_ids, &lemma_ids)?;
        let data = self.render(ranked, &query_lemmas)?;
        debug!(query = text, count, returned = data.len(), "search finished");
        Ok(SearchPage { count, data })
    }

    fn resolve_site(&self, url: Option<&str>) -> Result<Option<Site>> {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let url = canonical_url(url);
        let site = self
            .store
            .site_by_url(&url)?
            .ok_or_else(|| Error::NotFound(format!("site not found: {url}")))?;
        if site.status != SiteStatus::Indexed {
            return Err(Error::NotReady(format!("site is not indexed: {}", site.status)));
        }
        Ok(Some(site))
    }

    /// Without an explicit site, only lemmas of fully indexed sites count.
    fn searchable(&self, rows: Vec<Lemma>, site_given: bool) -> Result<Vec<Lemma>> {
        if site_given {
            return Ok(rows);
        }
        let sites: Vec<Site> = self
            .store
            .list_sites()?
            .into_iter()
            .filter(|s| s.status == SiteStatus::Indexed)
            .collect();
        let indexed: HashSet<SiteId> = ids_of(&sites).into_iter().collect();
        Ok(rows.into_iter().filter(|l| indexed.contains(&l.site_id)).collect())
    }

    /// Narrows candidates term by term, rarest first. Pagination applies to
    /// the last term's match set only.
    fn intersect(
        &self,
        terms: &[Term],
        offset: usize,
        limit: usize,
    ) -> Result<(usize, Vec<PageId>)> {
        let mut candidates: Option<BTreeSet<PageId>> = None;
        for (i, term) in terms.iter().enumerate() {
            let matched = self.store.page_ids_by_lemmas(&term.lemma_ids, candidates.as_ref())?;
            if matched.is_empty() {
                return Ok((0, Vec::new()));
            }
            if i + 1 == terms.len() {
                let count = matched.len();
                let page = matched.into_iter().skip(offset).take(limit).collect();
                return Ok((count, page));
            }
            candidates = Some(matched);
        }
        Ok((0, Vec::new()))
    }

    /// Relevance is each page's share of the matched weight of the whole
    /// candidate set. Pages with no matched weight are dropped.
    fn rank(&self, page_ids: &[PageId], lemma_ids: &[LemmaId]) -> Result<Vec<(PageId, f64)>> {
        let weights = self.store.weight_by_lemmas(page_ids, lemma_ids)?;
        let total: f64 = weights.values().sum();
        let mut ranked: Vec<(PageId, f64)> = page_ids
            .iter()
            .filter_map(|id| weights.get(id).filter(|w| **w > 0.0).map(|w| (*id, w / total)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
        });
        Ok(ranked)
    }

    fn render(
        &self,
        ranked: Vec<(PageId, f64)>,
        query_lemmas: &HashSet<String>,
    ) -> Result<Vec<SearchResult>> {
        let mut sites: HashMap<SiteId, Site> = HashMap::new();
        let mut results = Vec::with_capacity(ranked.len());
        for (page_id, relevance) in ranked {
            let Some(page) = self.store.page_by_id(page_id)? else { continue };
            if !sites.contains_key(&page.site_id) {
                let Some(site) = self.store.site_by_id(page.site_id)? else { continue };
                sites.insert(site.id, site);
            }
            let Some(site) = sites.get(&page.site_id) else { continue };
            let body = clean_html(&page.content);
            let words = self.settings.snippet_words;
            let snippet = generate_snippet(&self.lemmatizer, &body, query_lemmas, words);
            results.push(SearchResult {
                site: site.url.clone(),
                site_name: site.name.clone(),
                uri: page.path,
                title: extract_title(&page.content),
                snippet,
                relevance,
            });
        }
        Ok(results)
    }
}

/// Groups lemma rows by normal form and orders them by ascending corpus
/// frequency, ties broken by the lemma itself.
fn rarest_first(rows: Vec<Lemma>) -> Vec<Term> {
    let mut grouped: BTreeMap<String, Term> = BTreeMap::new();
    for row in rows {
        let term = grouped.entry(row.lemma.clone()).or_insert_with(|| Term {
            lemma: row.lemma.clone(),
            lemma_ids: Vec::new(),
            frequency: 0,
        });
        term.lemma_ids.push(row.id);
        term.frequency += u64::from(row.frequency);
    }
    let mut terms: Vec<Term> = grouped.into_values().collect();
    terms.sort_by(|a, b| a.frequency.cmp(&b.frequency).then_with(|| a.lemma.cmp(&b.lemma)));
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemma(id: LemmaId, site_id: SiteId, form: &str, frequency: u32) -> Lemma {
        Lemma { id, site_id, lemma: form.into(), frequency }
    }

    #[test]
    fn terms_are_ordered_rarest_first() {
        let terms = rarest_first(vec![
            lemma(1, 1, "собак", 5),
            lemma(2, 1, "кошк", 2),
            lemma(3, 1, "мыш", 9),
        ]);
        let order: Vec<_> = terms.iter().map(|t| t.lemma.as_str()).collect();
        assert_eq!(order, vec!["кошк", "собак", "мыш"]);
    }

    #[test]
    fn same_lemma_across_sites_is_one_term() {
        let terms = rarest_first(vec![lemma(1, 1, "кошк", 2), lemma(7, 2, "кошк", 3)]);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].lemma_ids, vec![1, 7]);
        assert_eq!(terms[0].frequency, 5);
    }
}
