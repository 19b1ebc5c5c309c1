pub mod config;
pub mod error;
pub mod html;
pub mod index_builder;
pub mod lemmatizer;
pub mod model;
pub mod morphology;
pub mod search;
pub mod snippet;
pub mod statistics;
pub mod store;

pub use config::{AppConfig, CrawlerSettings, SearchSettings, SiteConfig};
pub use error::{Error, Result};
pub use index_builder::IndexBuilder;
pub use lemmatizer::{LemmaCounts, LemmaPositions, Lemmatizer};
pub use model::{IndexEntry, Lemma, LemmaId, Page, PageId, Site, SiteId, SiteStatus};
pub use search::{SearchEngine, SearchPage, SearchQuery, SearchResult};
pub use statistics::{collect_statistics, Statistics};
pub use store::{SledStore, Store};
