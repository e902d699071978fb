use crate::{
    capture::{CaptureOutcome, Capturer, LinkDraft},
    errors::AppError,
    items::Collection,
    library::{fetch_all, Filters, Library, ReaderView},
    search::LibraryView,
};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{fmt::Debug, sync::Arc};
use tokio::{signal, sync::RwLock};

#[derive(Clone)]
pub struct SharedState {
    library: Arc<RwLock<Library>>,
    capturer: Arc<Capturer>,
}

impl SharedState {
    pub fn new(library: Library, capturer: Capturer) -> Self {
        Self {
            library: Arc::new(RwLock::new(library)),
            capturer: Arc::new(capturer),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("received ctrl-c, shutting down"),
        _ = terminate => log::warn!("received terminate, shutting down"),
    }
}

/// Re-fetches everything and re-runs the newest search. The lock is held
/// only while state is swapped in.
pub async fn refresh(library: &RwLock<Library>) -> Result<bool, AppError> {
    let store = library.read().await.store();
    let view = fetch_all(store.as_ref()).await?;

    let (ticket, resolver) = {
        let mut library = library.write().await;
        (library.replace_all(view), library.resolver())
    };
    let outcome = ticket.run(&resolver).await;

    Ok(library.write().await.finish_search(outcome))
}

/// Refreshes the library whenever the store reports a change.
pub async fn watch_changes(library: Arc<RwLock<Library>>) {
    let mut changes = match library.read().await.subscribe().await {
        Ok(rx) => rx,
        Err(err) => {
            log::error!("change feed unavailable: {err}");
            return;
        }
    };

    while let Some(event) = changes.recv().await {
        log::info!("{} changed, reloading", event.collection);
        if let Err(err) = refresh(&library).await {
            log::error!("reload failed: {err}");
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/items", get(items))
        .route("/api/search", post(search))
        .route("/api/delete", post(delete))
        .route("/api/open", post(open))
        .route("/api/reader/:id", get(reader))
        .route("/api/export", get(export))
        .route("/api/facets", get(facets))
        .route("/api/links", post(save_link))
        .route("/api/clip", post(clip))
        .route("/api/quick_save", post(quick_save))
        .route("/api/save_link_target", post(save_link_target))
        .route("/api/screenshots", post(save_screenshot))
        .route("/api/documents", post(save_document))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

pub async fn serve(state: SharedState, addr: &str) -> anyhow::Result<()> {
    let watcher = tokio::spawn(watch_changes(state.library.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    Ok(())
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::NotFound => axum::http::StatusCode::NOT_FOUND,
            AppError::Base64(_) | AppError::Json(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Store(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::BAD_GATEWAY
            }
            AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn items(State(state): State<SharedState>) -> Json<LibraryView> {
    Json(state.library.read().await.filtered().clone())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, flatten)]
    pub filters: Filters,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// False when a newer search finished first; `results` then holds the
    /// newer search's view.
    pub applied: bool,
    pub query: String,
    pub results: LibraryView,
}

async fn search(
    State(state): State<SharedState>,
    Json(payload): Json<SearchRequest>,
) -> Json<SearchResponse> {
    log::debug!("payload: {payload:?}");

    // the lock is not held while ranking runs
    let (ticket, resolver) = {
        let mut library = state.library.write().await;
        (
            library.begin_search(payload.query, payload.filters),
            library.resolver(),
        )
    };
    let outcome = ticket.run(&resolver).await;

    let mut library = state.library.write().await;
    let applied = library.finish_search(outcome);

    Json(SearchResponse {
        applied,
        query: library.query().to_string(),
        results: library.filtered().clone(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ItemRef {
    pub collection: Collection,
    pub id: String,
}

async fn delete(
    State(state): State<SharedState>,
    Json(payload): Json<ItemRef>,
) -> Result<Json<serde_json::Value>, HttpError> {
    log::debug!("payload: {payload:?}");

    let mut library = state.library.write().await;
    library.delete(payload.collection, &payload.id).await?;
    Ok(Json(json!({"deleted": payload.id})))
}

async fn open(
    State(state): State<SharedState>,
    Json(payload): Json<ItemRef>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let library = state.library.read().await;
    let url = library.open_target(payload.collection, &payload.id)?;
    Ok(Json(json!({"url": url})))
}

async fn reader(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ReaderView>, HttpError> {
    Ok(Json(state.library.read().await.reader(&id)?))
}

async fn export(State(state): State<SharedState>) -> Result<impl IntoResponse, HttpError> {
    let body = state.library.read().await.export_links()?;
    let filename = format!(
        "attachment; filename=\"second-memory-export-{}.json\"",
        chrono::Utc::now().timestamp_millis()
    );

    Ok((
        [
            (axum::http::header::CONTENT_TYPE, "application/json".to_string()),
            (axum::http::header::CONTENT_DISPOSITION, filename),
        ],
        body,
    ))
}

#[derive(Debug, Serialize)]
pub struct Facets {
    pub categories: Vec<(String, usize)>,
    pub platforms: Vec<(String, usize)>,
    pub content_types: Vec<(String, usize)>,
    pub tags: Vec<String>,
}

async fn facets(State(state): State<SharedState>) -> Json<Facets> {
    let library = state.library.read().await;
    Json(Facets {
        categories: library.categories_with_counts(),
        platforms: library.platforms_with_counts(),
        content_types: library.content_types_with_counts(),
        tags: library.all_tags(),
    })
}

async fn save_link(
    State(state): State<SharedState>,
    Json(payload): Json<LinkDraft>,
) -> Json<CaptureOutcome> {
    log::debug!("payload: {payload:?}");
    Json(state.capturer.save_link(payload).await)
}

#[derive(Debug, Deserialize)]
pub struct ClipRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

async fn clip(
    State(state): State<SharedState>,
    Json(payload): Json<ClipRequest>,
) -> Json<CaptureOutcome> {
    Json(
        state
            .capturer
            .clip_selection(&payload.url, &payload.title, &payload.text)
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

async fn quick_save(
    State(state): State<SharedState>,
    Json(payload): Json<PageRequest>,
) -> Json<CaptureOutcome> {
    Json(state.capturer.quick_save(&payload.url, &payload.title).await)
}

#[derive(Debug, Deserialize)]
pub struct LinkTargetRequest {
    pub link_url: String,
    #[serde(default)]
    pub page_title: String,
}

async fn save_link_target(
    State(state): State<SharedState>,
    Json(payload): Json<LinkTargetRequest>,
) -> Json<CaptureOutcome> {
    log::debug!("payload: {payload:?}");
    Json(
        state
            .capturer
            .save_link_target(&payload.link_url, &payload.page_title)
            .await,
    )
}

#[derive(Deserialize)]
pub struct UploadRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// File contents, base64. A `data:...;base64,` prefix is accepted.
    pub data_b64: String,
}

impl Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UploadRequest {{ url: {:?}, title: {:?}, data_b64: [REDACTED] }}",
            self.url, self.title
        )
    }
}

impl UploadRequest {
    fn decode(&self) -> Result<Vec<u8>, AppError> {
        let data = match self.data_b64.split_once(";base64,") {
            Some((_, data)) => data,
            None => self.data_b64.as_str(),
        };
        Ok(STANDARD.decode(data.trim())?)
    }
}

async fn save_screenshot(
    State(state): State<SharedState>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<CaptureOutcome>, HttpError> {
    log::debug!("payload: {payload:?}");
    let png = payload.decode()?;
    Ok(Json(
        state
            .capturer
            .save_screenshot(&payload.url, &payload.title, png)
            .await,
    ))
}

async fn save_document(
    State(state): State<SharedState>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<CaptureOutcome>, HttpError> {
    log::debug!("payload: {payload:?}");
    let pdf = payload.decode()?;
    Ok(Json(
        state
            .capturer
            .save_document(&payload.url, &payload.title, pdf)
            .await,
    ))
}
