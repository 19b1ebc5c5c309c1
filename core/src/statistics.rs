use crate::error::Result;
use crate::model::SiteStatus;
use crate::store::Store;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: u64,
    pub lemmas: u64,
    pub indexing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedStatistics {
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub status_time: OffsetDateTime,
    pub error: String,
    pub pages: u64,
    pub lemmas: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<DetailedStatistics>,
}

pub fn collect_statistics(store: &dyn Store) -> Result<Statistics> {
    let sites = store.list_sites()?;
    let mut stats = Statistics {
        total: TotalStatistics { sites: sites.len(), ..Default::default() },
        detailed: Vec::with_capacity(sites.len()),
    };
    for site in sites {
        let pages = store.count_pages(site.id)?;
        let lemmas = store.count_lemmas(site.id)?;
        stats.total.pages += pages;
        stats.total.lemmas += lemmas;
        stats.total.indexing |= site.status == SiteStatus::Indexing;
        stats.detailed.push(DetailedStatistics {
            url: site.url,
            name: site.name,
            status: site.status,
            status_time: site.status_time,
            error: site.last_error,
            pages,
            lemmas,
        });
    }
    Ok(stats)
}
