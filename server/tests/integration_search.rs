use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sitesearch_core::store::{PageStore, SiteStore};
use sitesearch_core::{
    AppConfig, CrawlerSettings, Error, IndexBuilder, Lemmatizer, Result, SearchSettings, Site,
    SiteConfig, SiteStatus, SledStore, Store,
};
use sitesearch_crawler::{FetchedPage, Fetcher};
use sitesearch_server::{build_app, AppState};
use std::sync::Arc;
use time::OffsetDateTime;
use tower::ServiceExt;

const SITE: &str = "https://docs.test";

/// Serves the same page for every url of the site.
struct StaticFetcher;

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &url::Url) -> Result<FetchedPage> {
        if url.as_str().starts_with(SITE) {
            Ok(FetchedPage {
                status: 200,
                body: "<html><head><title>Новости</title></head><body>кошка нашлась</body></html>"
                    .into(),
            })
        } else {
            Err(Error::Connection(format!("{url}: unreachable")))
        }
    }
}

struct TestApp {
    app: Router,
    state: AppState,
}

fn app_with_pages(pages: &[(&str, &str)]) -> TestApp {
    let store = Arc::new(SledStore::temporary().unwrap());
    let lemmatizer = Arc::new(Lemmatizer::new().unwrap());
    let site = store
        .insert_or_update_site(Site {
            id: 0,
            url: SITE.into(),
            name: "Docs".into(),
            status: SiteStatus::Indexed,
            status_time: OffsetDateTime::now_utc(),
            last_error: String::new(),
        })
        .unwrap();
    let builder = IndexBuilder::new(store.as_ref());
    for (path, html) in pages {
        let page = store.save_page(site.id, path, 200, html).unwrap();
        builder.index_page(&page, &lemmatizer.lemmatize_html(html)).unwrap();
    }

    let config = AppConfig {
        sites: vec![SiteConfig { url: SITE.into(), name: "Docs".into() }],
        crawler: CrawlerSettings { politeness_delay_ms: 0, ..Default::default() },
        search: SearchSettings::default(),
    };
    let store: Arc<dyn Store> = store;
    let state = AppState::new(config, store, Arc::new(StaticFetcher), lemmatizer);
    TestApp { app: build_app(state.clone()), state }
}

fn default_app() -> TestApp {
    app_with_pages(&[
        ("/cats", "<html><head><title>Кошки</title></head><body>кошка кошка собака</body></html>"),
        ("/dogs", "<html><head><title>Собаки</title></head><body>собака лает</body></html>"),
    ])
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let t = default_app();
    let (status, json) = get(&t.app, &format!("/api/search?query={}", encode("собака"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], true);
    assert_eq!(json["count"], 2);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["uri"], "/cats");
    assert_eq!(data[0]["site"], SITE);
    assert_eq!(data[0]["site_name"], "Docs");
    assert_eq!(data[0]["title"], "Кошки");
    assert!(data[0]["snippet"].as_str().unwrap().contains("<b>собака</b>"));
    assert!(data[0]["relevance"].as_f64().unwrap() >= data[1]["relevance"].as_f64().unwrap());
}

#[tokio::test]
async fn search_paginates() {
    let t = default_app();
    let uri = format!("/api/search?query={}&offset=1&limit=1", encode("собака"));
    let (status, json) = get(&t.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_query_is_bad_request() {
    let t = default_app();
    let (status, json) = get(&t.app, "/api/search?query=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["result"], false);
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn unknown_site_is_not_found() {
    let t = default_app();
    let uri =
        format!("/api/search?query={}&site={}", encode("собака"), encode("https://nowhere.test"));
    let (status, json) = get(&t.app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["result"], false);
}

#[tokio::test]
async fn statistics_report_totals() {
    let t = default_app();
    let (status, json) = get(&t.app, "/api/statistics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], true);
    assert_eq!(json["statistics"]["total"]["sites"], 1);
    assert_eq!(json["statistics"]["total"]["pages"], 2);
    assert_eq!(json["statistics"]["total"]["indexing"], false);
    let detailed = &json["statistics"]["detailed"][0];
    assert_eq!(detailed["status"], "INDEXED");
    assert_eq!(detailed["url"], SITE);
}

#[tokio::test]
async fn stop_without_running_job_conflicts() {
    let t = default_app();
    let (status, json) = get(&t.app, "/api/stopIndexing").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["result"], false);
    assert_eq!(json["error"], "Indexing is not running");
}

#[tokio::test]
async fn start_twice_conflicts() {
    let t = default_app();
    let (status, json) = get(&t.app, "/api/startIndexing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], true);
    let (status, _) = get(&t.app, "/api/startIndexing").await;
    assert_eq!(status, StatusCode::CONFLICT);
    t.state.coordinator.wait().await;

    let (_, json) = get(&t.app, "/api/statistics").await;
    assert_eq!(json["statistics"]["detailed"][0]["status"], "INDEXED");
    assert_eq!(json["statistics"]["total"]["pages"], 1);
}

#[tokio::test]
async fn index_page_accepts_form_and_query() {
    let t = default_app();
    let req = Request::post("/api/indexPage")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("url={}", encode(&format!("{SITE}/news")))))
        .unwrap();
    let (status, json) = call(&t.app, req).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["result"], true);

    let uri = format!("/api/indexPage?url={}", encode(&format!("{SITE}/more")));
    let (status, _) = call(&t.app, Request::post(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = get(&t.app, &format!("/api/search?query={}", encode("кошка"))).await;
    assert_eq!(json["count"], 3);
}

#[tokio::test]
async fn index_page_outside_sites_is_not_found() {
    let t = default_app();
    let uri = format!("/api/indexPage?url={}", encode("https://elsewhere.test/a"));
    let (status, json) = call(&t.app, Request::post(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["result"], false);
    assert_eq!(t.state.store.list_sites().unwrap().len(), 1);
}

#[tokio::test]
async fn health_is_ok() {
    let t = default_app();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let resp = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
