use crate::cancel::CancellationToken;
use crate::fetch::Fetcher;
use crate::links::site_path;
use crate::task::{crawl_page, CrawlJob, STOPPED_BY_USER};
use parking_lot::Mutex;
use reqwest::Url;
use sitesearch_core::model::canonical_url;
use sitesearch_core::{
    AppConfig, Error, IndexBuilder, Lemmatizer, Result, Site, SiteConfig, SiteStatus, Store,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Owns the indexing lifecycle: at most one crawl job at a time, a bounded
/// pool of site workers, and single-page re-indexing.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: AppConfig,
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    lemmatizer: Arc<Lemmatizer>,
    workers: Arc<Semaphore>,
    active: Mutex<Option<ActiveJob>>,
}

struct ActiveJob {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ActiveJob {
    fn is_running(&self) -> bool {
        !*self.done.borrow()
    }
}

impl Coordinator {
    pub fn new(
        mut config: AppConfig,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        lemmatizer: Arc<Lemmatizer>,
    ) -> Self {
        for site in &mut config.sites {
            site.url = canonical_url(&site.url);
        }
        let workers = Arc::new(Semaphore::new(config.crawler.parallel_sites()));
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                fetcher,
                lemmatizer,
                workers,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.inner.store.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.active.lock().as_ref().is_some_and(ActiveJob::is_running)
    }

    /// Starts crawling every configured site in the background. Must be
    /// called from within a Tokio runtime.
    pub fn start_indexing(&self) -> Result<()> {
        let mut active = self.inner.active.lock();
        if active.as_ref().is_some_and(ActiveJob::is_running) {
            return Err(Error::Conflict("Indexing is already running".into()));
        }
        let mut config = self.inner.config.clone();
        config.validate()?;

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            inner.run(config.sites, token).await;
            let _ = done_tx.send(true);
        });
        *active = Some(ActiveJob { cancel, done: done_rx });
        info!("indexing started");
        Ok(())
    }

    pub fn stop_indexing(&self) -> Result<()> {
        let active = self.inner.active.lock();
        match active.as_ref() {
            Some(job) if job.is_running() => {
                job.cancel.cancel(STOPPED_BY_USER);
                info!("indexing stop requested");
                Ok(())
            }
            _ => Err(Error::Conflict("Indexing is not running".into())),
        }
    }

    /// Resolves once the current crawl job, if any, has finished.
    pub async fn wait(&self) {
        let done = self.inner.active.lock().as_ref().map(|job| job.done.clone());
        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Fetches and re-indexes one page of a configured site, replacing
    /// whatever was stored for it.
    pub async fn index_page(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Validation("Page url must not be blank".into()));
        }
        let seed = self.inner.config.site_for_url(url).ok_or_else(|| {
            Error::NotFound(
                "This page is located outside the sites specified in the configuration file".into(),
            )
        })?;
        let parsed =
            Url::parse(url).map_err(|e| Error::Validation(format!("invalid url {url}: {e}")))?;
        let path = site_path(parsed.as_str(), &seed.url)
            .ok_or_else(|| Error::Validation(format!("{url} is outside {}", seed.url)))?;

        let fetched = self.inner.fetcher.fetch(&parsed).await?;

        let store = self.inner.store.as_ref();
        let (site, created) = match store.site_by_url(&seed.url)? {
            Some(site) => (site, false),
            None => (store.insert_or_update_site(new_site(seed))?, true),
        };
        let builder = IndexBuilder::new(store);
        if let Some(page_id) = store.page_id_by_path(&path, site.id)? {
            builder.remove_page(page_id)?;
        }
        let page = store.save_page(site.id, &path, fetched.status, &fetched.body)?;
        if !page.is_error() {
            let counts = self.inner.lemmatizer.lemmatize_html(&page.content);
            builder.index_page(&page, &counts)?;
        }
        if created {
            store.set_status(site.id, SiteStatus::Indexed)?;
        } else {
            store.set_status_time(site.id, OffsetDateTime::now_utc())?;
        }
        info!(site = %site.url, %path, status = page.code, "page re-indexed");
        Ok(())
    }
}

impl Inner {
    async fn run(self: Arc<Self>, sites: Vec<SiteConfig>, cancel: CancellationToken) {
        let active: Vec<String> = sites.iter().map(|s| s.url.clone()).collect();
        if let Err(e) = self.remove_stale_sites(&active) {
            error!(error = %e, "could not remove stale sites");
        }

        let mut jobs = JoinSet::new();
        for seed in sites {
            let inner = self.clone();
            let cancel = cancel.clone();
            jobs.spawn(async move {
                let Ok(_permit) = inner.workers.clone().acquire_owned().await else { return };
                inner.crawl_site(seed, cancel).await;
            });
        }
        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "site worker panicked");
            }
        }
        info!(cancelled = cancel.is_cancelled(), "indexing finished");
    }

    async fn crawl_site(&self, seed: SiteConfig, cancel: CancellationToken) {
        let site = match self.prepare_site(&seed) {
            Ok(site) => site,
            Err(e) => {
                error!(site = %seed.url, error = %e, "could not prepare site");
                return;
            }
        };
        if cancel.is_cancelled() {
            self.finish_site(&site, &cancel);
            return;
        }
        let root = match Url::parse(&site.url) {
            Ok(url) => url,
            Err(e) => {
                let message = format!("invalid site url {}: {e}", site.url);
                if let Err(e) = self.store.set_failed(site.id, SiteStatus::Failed, &message) {
                    error!(site = %site.url, error = %e, "could not mark site failed");
                }
                return;
            }
        };

        info!(site = %site.url, "site crawl started");
        let job = Arc::new(CrawlJob {
            site: site.clone(),
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            lemmatizer: self.lemmatizer.clone(),
            cancel: cancel.clone(),
            delay: self.config.crawler.politeness_delay(),
        });
        crawl_page(job, root, true).await;
        self.finish_site(&site, &cancel);
    }

    /// Clears previous data of the site, or creates it, in INDEXING state.
    fn prepare_site(&self, seed: &SiteConfig) -> Result<Site> {
        let store = self.store.as_ref();
        let mut site = new_site(seed);
        if let Some(existing) = store.site_by_url(&seed.url)? {
            IndexBuilder::new(store).clear_sites(&[existing.id])?;
            site.id = existing.id;
        }
        store.insert_or_update_site(site)
    }

    fn finish_site(&self, site: &Site, cancel: &CancellationToken) {
        let outcome = if cancel.is_cancelled() {
            match self.store.site_by_id(site.id) {
                Ok(Some(current)) if current.status == SiteStatus::Indexing => {
                    let reason = cancel.reason().unwrap_or_else(|| STOPPED_BY_USER.to_owned());
                    warn!(site = %site.url, %reason, "site crawl stopped");
                    self.store.set_failed(site.id, SiteStatus::Failed, &reason)
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            info!(site = %site.url, "site indexed");
            self.store.set_status(site.id, SiteStatus::Indexed)
        };
        if let Err(e) = outcome {
            error!(site = %site.url, error = %e, "could not update site status");
        }
    }

    /// Deletes sites (and their data) that are no longer configured.
    fn remove_stale_sites(&self, active: &[String]) -> Result<()> {
        let stale = self.store.stale_site_ids(active)?;
        if stale.is_empty() {
            return Ok(());
        }
        IndexBuilder::new(self.store.as_ref()).clear_sites(&stale)?;
        self.store.delete_sites(&stale)?;
        info!(count = stale.len(), "stale sites removed");
        Ok(())
    }
}

fn new_site(seed: &SiteConfig) -> Site {
    Site {
        id: 0,
        url: seed.url.clone(),
        name: seed.name.clone(),
        status: SiteStatus::Indexing,
        status_time: OffsetDateTime::now_utc(),
        last_error: String::new(),
    }
}
