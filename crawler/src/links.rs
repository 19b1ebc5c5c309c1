use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").expect("valid anchor selector");
}

/// Extensions of documents that are never followed.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "pdf", "svg", "webp", "ico", "zip", "gz", "mp3", "mp4", "doc",
    "docx", "xls", "xlsx",
];

/// Absolute links of `html` that stay under `base`, in document order,
/// without duplicates. Fragment links and binary documents are skipped.
pub fn extract_links(html: &str, page_url: &Url, base: &str) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in doc.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else { continue };
        let href = href.trim();
        if href.is_empty() || href.contains('#') {
            continue;
        }
        let Ok(url) = page_url.join(href) else { continue };
        if !matches!(url.scheme(), "http" | "https") || site_path(url.as_str(), base).is_none() {
            continue;
        }
        if is_binary(&url) {
            continue;
        }
        if seen.insert(url.as_str().to_owned()) {
            links.push(url);
        }
    }
    links
}

fn is_binary(url: &Url) -> bool {
    let last = url.path().rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((_, ext)) => BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Site-relative path of `url` under `base`; the site root maps to `/`.
pub fn site_path(url: &str, base: &str) -> Option<String> {
    let rest = url.strip_prefix(base)?;
    match rest.chars().next() {
        None => Some("/".into()),
        Some('/') => Some(rest.to_owned()),
        Some('?') => Some(format!("/{rest}")),
        Some(_) => None,
    }
}
