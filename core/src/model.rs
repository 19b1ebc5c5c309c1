use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub type SiteId = u64;
pub type PageId = u64;
pub type LemmaId = u64;

/// Status codes at or above this value are recorded but never lemmatized.
pub const ERROR_STATUS_CODE: u16 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SiteStatus::Indexing => "INDEXING",
            SiteStatus::Indexed => "INDEXED",
            SiteStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    /// Canonical url, never with a trailing slash.
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub status_time: OffsetDateTime,
    pub last_error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub site_id: SiteId,
    /// Site-relative path, always starting with "/".
    pub path: String,
    pub code: u16,
    pub content: String,
}

impl Page {
    pub fn is_error(&self) -> bool {
        self.code >= ERROR_STATUS_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lemma {
    pub id: LemmaId,
    pub site_id: SiteId,
    pub lemma: String,
    /// Number of distinct pages of the site indexed with this lemma.
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub page_id: PageId,
    pub lemma_id: LemmaId,
    pub weight: f64,
}

/// Identifier extraction shared by every stored row type.
pub trait Identified {
    fn id(&self) -> u64;
}

impl Identified for Site {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Page {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Lemma {
    fn id(&self) -> u64 {
        self.id
    }
}

pub fn ids_of<T: Identified>(rows: &[T]) -> Vec<u64> {
    rows.iter().map(Identified::id).collect()
}

/// Strips surrounding whitespace and a trailing slash from a site url.
pub fn canonical_url(url: &str) -> String {
    let url = url.trim();
    url.strip_suffix('/').unwrap_or(url).to_string()
}
