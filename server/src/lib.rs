use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use sitesearch_core::{
    collect_statistics, AppConfig, Error, Lemmatizer, SearchEngine, SearchQuery, SearchResult,
    Statistics, Store,
};
use sitesearch_crawler::{Coordinator, Fetcher};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub engine: SearchEngine,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        lemmatizer: Arc<Lemmatizer>,
    ) -> Self {
        let engine = SearchEngine::new(store.clone(), lemmatizer.clone(), config.search.clone());
        let coordinator = Coordinator::new(config, store.clone(), fetcher, lemmatizer);
        Self { coordinator, engine, store }
    }
}

#[derive(Serialize)]
pub struct Ack {
    pub result: bool,
}

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub result: bool,
    pub statistics: Statistics,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub result: bool,
    pub count: usize,
    pub data: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub result: bool,
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub url: Option<String>,
}

/// Maps domain errors onto HTTP statuses. Internal errors are logged and
/// reported without detail.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) | Error::NotReady(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = if self.0.is_internal() {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            tracing::warn!(error = %self.0, %status, "request rejected");
            self.0.to_string()
        };
        (status, Json(ErrorResponse { result: false, error })).into_response()
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let api = Router::new()
        .route("/statistics", get(statistics_handler))
        .route("/startIndexing", get(start_handler))
        .route("/stopIndexing", get(stop_handler))
        .route("/indexPage", post(index_page_handler))
        .route("/search", get(search_handler));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn statistics_handler(
    State(state): State<AppState>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let mut statistics = collect_statistics(state.store.as_ref())?;
    statistics.total.indexing |= state.coordinator.is_running();
    Ok(Json(StatisticsResponse { result: true, statistics }))
}

pub async fn start_handler(State(state): State<AppState>) -> Result<Json<Ack>, ApiError> {
    state.coordinator.start_indexing()?;
    Ok(Json(Ack { result: true }))
}

pub async fn stop_handler(State(state): State<AppState>) -> Result<Json<Ack>, ApiError> {
    state.coordinator.stop_indexing()?;
    Ok(Json(Ack { result: true }))
}

/// Accepts `url` either as a query parameter or as a form field.
pub async fn index_page_handler(
    State(state): State<AppState>,
    Query(query): Query<PageParams>,
    form: Option<Form<PageParams>>,
) -> Result<Json<Ack>, ApiError> {
    let url = form
        .and_then(|Form(p)| p.url)
        .or(query.url)
        .unwrap_or_default();
    state.coordinator.index_page(&url).await?;
    Ok(Json(Ack { result: true }))
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let page = state.engine.search(&params)?;
    Ok(Json(SearchResponse { result: true, count: page.count, data: page.data }))
}
