use crate::error::{Error, Result};
use crate::model::canonical_url;
use crate::snippet::DEFAULT_SNIPPET_WORDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    pub user_agent: String,
    pub referrer: String,
    /// Delay taken before every fetch.
    pub politeness_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub max_redirects: usize,
    /// Number of sites crawled at once; defaults to available parallelism.
    pub max_parallel_sites: Option<usize>,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            user_agent: "SearchEngineBot".into(),
            referrer: "https://www.google.com".into(),
            politeness_delay_ms: 2_000,
            fetch_timeout_secs: 12,
            max_redirects: 5,
            max_parallel_sites: None,
        }
    }
}

impl CrawlerSettings {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn parallel_sites(&self) -> usize {
        self.max_parallel_sites
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    /// Word budget shared by all snippet windows of one result.
    pub snippet_words: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 20, snippet_words: DEFAULT_SNIPPET_WORDS }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub crawler: CrawlerSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

impl AppConfig {
    /// Reads a JSON config file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let mut config: AppConfig =
            serde_json::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects blank seeds and canonicalizes seed urls in place.
    pub fn validate(&mut self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(Error::Validation("site list must not be empty".into()));
        }
        for site in self.sites.iter_mut() {
            if site.name.trim().is_empty() {
                return Err(Error::Validation("site name must not be blank".into()));
            }
            if site.url.trim().is_empty() {
                return Err(Error::Validation("site url must not be blank".into()));
            }
            site.url = canonical_url(&site.url);
        }
        Ok(())
    }

    /// Finds the configured site whose url prefixes `url` up to a path or
    /// query boundary.
    pub fn site_for_url(&self, url: &str) -> Option<&SiteConfig> {
        let url = url.trim();
        self.sites.iter().find(|s| {
            let seed = canonical_url(&s.url);
            !seed.is_empty()
                && url.strip_prefix(seed.as_str()).is_some_and(|rest| {
                    rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sites: &[(&str, &str)]) -> AppConfig {
        AppConfig {
            sites: sites
                .iter()
                .map(|(url, name)| SiteConfig { url: url.to_string(), name: name.to_string() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_strips_trailing_slash() {
        let mut c = config(&[("https://a.example/", "A")]);
        c.validate().unwrap();
        assert_eq!(c.sites[0].url, "https://a.example");
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut c = config(&[("https://a.example", "  ")]);
        assert!(matches!(c.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn blank_url_is_rejected() {
        let mut c = config(&[("https://a.example", "A"), ("", "B")]);
        assert!(matches!(c.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let c: AppConfig =
            serde_json::from_str(r#"{"sites":[{"url":"https://a.example","name":"A"}]}"#).unwrap();
        assert_eq!(c.crawler.politeness_delay_ms, 2_000);
        assert_eq!(c.search.default_limit, 20);
        assert!(c.crawler.parallel_sites() >= 1);
    }

    #[test]
    fn site_for_url_matches_prefix() {
        let mut c = config(&[("https://a.example", "A"), ("https://b.example", "B")]);
        c.validate().unwrap();
        assert_eq!(c.site_for_url("https://b.example/news/1").unwrap().name, "B");
        assert!(c.site_for_url("https://c.example/").is_none());
    }

    #[test]
    fn site_for_url_stops_at_host_boundary() {
        let c = config(&[("https://a.example/", "A")]);
        assert!(c.site_for_url("https://a.example.evil.org/x").is_none());
        assert!(c.site_for_url("https://a.examplex/").is_none());
        assert_eq!(c.site_for_url("https://a.example").unwrap().name, "A");
        assert_eq!(c.site_for_url("https://a.example?q=1").unwrap().name, "A");
    }
}
