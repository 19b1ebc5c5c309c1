use async_trait::async_trait;
use reqwest::{header, redirect, Client, Url};
use sitesearch_core::{CrawlerSettings, Error, Result};

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// A fetched document. Non-2xx responses are regular results.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

/// HTTP fetcher identifying itself with the configured user agent and referrer.
pub struct HttpFetcher {
    client: Client,
    referrer: String,
}

impl HttpFetcher {
    pub fn new(settings: &CrawlerSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .timeout(settings.fetch_timeout())
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { client, referrer: settings.referrer.clone() })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let resp = self
            .client
            .get(url.clone())
            .header(header::REFERER, self.referrer.as_str())
            .send()
            .await
            .map_err(|e| Error::Connection(format!("{url}: {e}")))?;
        let status = resp.status().as_u16();

        // Only HTML bodies are kept; other documents are recorded with their status.
        let is_html = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map_or(true, |ct| ct.starts_with("text/html") || ct.starts_with("application/xhtml"));
        if !is_html {
            return Ok(FetchedPage { status, body: String::new() });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Connection(format!("{url}: {e}")))?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(Error::Connection(format!(
                "{url}: response exceeds {MAX_BODY_BYTES} bytes"
            )));
        }
        Ok(FetchedPage { status, body: String::from_utf8_lossy(&bytes).into_owned() })
    }
}
