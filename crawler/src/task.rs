use crate::cancel::CancellationToken;
use crate::fetch::{FetchedPage, Fetcher};
use crate::links::{extract_links, site_path};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Url;
use sitesearch_core::{Error, IndexBuilder, Lemmatizer, Result, Site, SiteStatus, Store};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Shared state of one site crawl. Every page task holds an `Arc` to it.
pub struct CrawlJob {
    pub site: Site,
    pub store: Arc<dyn Store>,
    pub fetcher: Arc<dyn Fetcher>,
    pub lemmatizer: Arc<Lemmatizer>,
    pub cancel: CancellationToken,
    pub delay: Duration,
}

impl CrawlJob {
    fn base(&self) -> &str {
        &self.site.url
    }

    /// Records a page failure on the site. Once the job is cancelled any
    /// failure marks the site FAILED.
    fn record_failure(&self, url: &Url, err: &Error) {
        let message = err.to_string();
        let outcome = if self.cancel.is_cancelled() {
            error!(site = %self.site.url, %url, %message, "crawl aborted");
            self.store.set_failed(self.site.id, SiteStatus::Failed, &message)
        } else {
            warn!(site = %self.site.url, %url, %message, "page failed");
            self.store.set_last_error(self.site.id, &message)
        };
        if let Err(e) = outcome {
            error!(site = %self.site.url, error = %e, "could not record failure");
        }
    }
}

/// Crawls `url` and, recursively, every new same-site page it links to.
/// Resolves once the whole subtree has finished.
pub fn crawl_page(job: Arc<CrawlJob>, url: Url, root: bool) -> BoxFuture<'static, ()> {
    async move {
        if job.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = visit(&job, &url, root).await {
            job.record_failure(&url, &e);
        }
    }
    .boxed()
}

async fn visit(job: &Arc<CrawlJob>, url: &Url, root: bool) -> Result<()> {
    tokio::time::sleep(job.delay).await;
    if job.cancel.is_cancelled() {
        return Ok(());
    }
    let fetched = job.fetcher.fetch(url).await?;
    let path = site_path(url.as_str(), job.base())
        .ok_or_else(|| Error::Validation(format!("{url} is outside {}", job.base())))?;

    persist(job, &path, &fetched, root)?;
    debug!(site = %job.site.url, %path, status = fetched.status, "page stored");

    let links = extract_links(&fetched.body, url, job.base());
    let mut children = JoinSet::new();
    let spawned = spawn_children(job, links, &mut children);
    while let Some(joined) = children.join_next().await {
        if let Err(e) = joined {
            error!(site = %job.site.url, error = %e, "page task panicked");
        }
    }
    spawned
}

fn persist(job: &CrawlJob, path: &str, fetched: &FetchedPage, root: bool) -> Result<()> {
    let store = job.store.as_ref();
    let site_id = job.site.id;
    let stored = root && store.insert_page_if_absent(site_id, path, fetched.status, &fetched.body)?;
    if !stored && store.update_page(fetched.status, &fetched.body, site_id, path)? == 0 {
        return Err(Error::Persistence(format!("page {path} was not updated")));
    }
    store.set_status_time(site_id, OffsetDateTime::now_utc())?;

    let page = store
        .page_by_path(path, site_id)?
        .ok_or_else(|| Error::Persistence(format!("page {path} not found after save")))?;
    if !page.is_error() {
        let counts = job.lemmatizer.lemmatize_html(&page.content);
        IndexBuilder::new(store).index_page(&page, &counts)?;
    }
    Ok(())
}

/// Claims each unseen link and forks a task for it. The claim is atomic in
/// the store, so concurrent tasks never crawl the same path twice.
fn spawn_children(job: &Arc<CrawlJob>, links: Vec<Url>, children: &mut JoinSet<()>) -> Result<()> {
    for link in links {
        let Some(path) = site_path(link.as_str(), job.base()) else { continue };
        if !job.store.insert_path_if_absent(job.site.id, &path)? {
            continue;
        }
        if job.cancel.is_cancelled() {
            let reason = job.cancel.reason().unwrap_or_else(|| STOPPED_BY_USER.to_owned());
            return Err(Error::Cancelled(reason));
        }
        children.spawn(crawl_page(job.clone(), link, false));
    }
    Ok(())
}
