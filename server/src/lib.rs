use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bookrec_core::{
    highlighted_excerpt, load_library, open_data_dir, Book, DataPaths, FieldToggles, PreferenceAnalysis, RankedResult,
    RecommendOptions, RecommendationMode, Recommender, RecommenderConfig, RecommenderStats, SaveStatus, SignalError,
    SignalSnapshot, SignalStore, UserId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const EXCERPT_CHARS: usize = 200;
const MAX_K: usize = 100;

type ApiError = (StatusCode, String);

pub struct ServerConfig {
    pub library: PathBuf,
    pub data_dir: PathBuf,
    /// Recommender settings; `<data_dir>/config.json` when absent.
    pub config: Option<PathBuf>,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    /// Admin token from `ADMIN_TOKEN`.
    pub fn from_env(library: PathBuf, data_dir: PathBuf, config: Option<PathBuf>) -> Self {
        Self { library, data_dir, config, admin_token: std::env::var("ADMIN_TOKEN").ok() }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Mutex<Recommender>>,
    pub library: Arc<Vec<Book>>,
    pub admin_token: Option<String>,
}

pub fn build_app(server: ServerConfig) -> Result<Router> {
    let library = load_library(&server.library)?;
    let paths = DataPaths::new(&server.data_dir);
    let config_path = server.config.clone().unwrap_or_else(|| paths.config());
    let config = RecommenderConfig::from_file_or_default(&config_path)?;

    let user_id = UserId::load_or_create(&paths.user_id())?;
    let mut signals = SignalStore::with_backend(user_id, Box::new(open_data_dir(&paths)?));
    if let Err(err) = signals.load() {
        tracing::warn!(error = %err, "starting with empty signals");
    }
    let recommender = Recommender::new(config, signals);
    tracing::info!(books = library.len(), user_id = %recommender.signals().user_id(), "recommender ready");

    let state = AppState {
        recommender: Arc::new(Mutex::new(recommender)),
        library: Arc::new(library),
        admin_token: server.admin_token,
    };

    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/books", get(list_books))
        .route("/books/:id/recommendations", get(book_recommendations))
        .route("/recommendations", post(recommend_handler))
        .route("/feedback", post(feedback_handler))
        .route("/preferences/:key", get(get_preference).put(put_preference).delete(delete_preference))
        .route("/signals/export", get(export_signals))
        .route("/signals/import", post(import_signals))
        .route("/signals/reset", post(reset_signals))
        .route("/stats", get(stats_handler))
        .route("/analysis", post(analysis_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// Browser access for the listed origins (comma-separated), or for any
/// origin when none parse.
pub fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[derive(Serialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
}

pub async fn list_books(State(state): State<AppState>) -> Json<Vec<BookSummary>> {
    Json(
        state
            .library
            .iter()
            .map(|b| BookSummary { id: b.id.clone(), title: b.title.clone(), author: b.author.clone() })
            .collect(),
    )
}

#[derive(Deserialize)]
pub struct RecommendParams {
    pub mode: Option<String>,
    pub k: Option<usize>,
    /// Comma-separated subset of title, author, tags, genre, description.
    pub fields: Option<String>,
}

#[derive(Serialize)]
pub struct RecommendationResponse {
    pub selected: String,
    pub mode: RecommendationMode,
    pub took_s: f64,
    pub results: Vec<RecommendationHit>,
}

#[derive(Serialize)]
pub struct RecommendationHit {
    #[serde(flatten)]
    pub result: RankedResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl From<RankedResult> for RecommendationHit {
    fn from(result: RankedResult) -> Self {
        let terms: &[String] = if result.common_terms.is_empty() { &result.book.tags } else { &result.common_terms };
        let excerpt = result.book.description.as_deref().and_then(|d| highlighted_excerpt(d, terms, EXCERPT_CHARS));
        Self { result, excerpt }
    }
}

pub async fn book_recommendations(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let selected = state
        .library
        .iter()
        .find(|b| b.id == id)
        .cloned()
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no book with id {id:?}")))?;
    let mode = params
        .mode
        .as_deref()
        .map(str::parse::<RecommendationMode>)
        .transpose()
        .map_err(|err| (StatusCode::BAD_REQUEST, err))?;
    let options = RecommendOptions {
        mode,
        fields: params.fields.as_deref().map(FieldToggles::from_list).unwrap_or_default(),
        top_n: params.k.map(|k| k.clamp(1, MAX_K)),
    };
    Ok(Json(run_recommendation(&state, &selected, &state.library, options)))
}

#[derive(Deserialize)]
pub struct RecommendRequest {
    pub selected: Book,
    /// Candidates; the loaded library when absent.
    pub pool: Option<Vec<Book>>,
    #[serde(default)]
    pub options: RecommendOptions,
}

pub async fn recommend_handler(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> Json<RecommendationResponse> {
    let pool = req.pool.as_deref().unwrap_or(state.library.as_slice());
    Json(run_recommendation(&state, &req.selected, pool, req.options))
}

fn run_recommendation(state: &AppState, selected: &Book, pool: &[Book], options: RecommendOptions) -> RecommendationResponse {
    let start = std::time::Instant::now();
    let mut rec = state.recommender.lock();
    let mode = options.mode.unwrap_or(rec.config().default_mode);
    let results = rec.recommend(selected, pool, &options);
    drop(rec);
    RecommendationResponse {
        selected: selected.title.clone(),
        mode,
        took_s: start.elapsed().as_secs_f64(),
        results: results.into_iter().map(RecommendationHit::from).collect(),
    }
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    /// Signal key: the book title, or its id when signals are keyed by id.
    #[serde(alias = "title")]
    pub key: String,
    pub rating: f64,
}

#[derive(Serialize)]
pub struct MutationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl MutationResponse {
    fn new(value: Option<serde_json::Value>, status: &SaveStatus) -> Self {
        Self { value, warning: status.warning().map(str::to_string) }
    }
}

pub async fn feedback_handler(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let mut rec = state.recommender.lock();
    let status = rec.submit_feedback(&req.key, req.rating).map_err(signal_error)?;
    let value = rec.signals().feedback(&req.key);
    Ok(Json(MutationResponse::new(Some(value.into()), &status)))
}

pub async fn get_preference(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rec = state.recommender.lock();
    rec.signals()
        .preference(&key)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no preference {key:?}")))
}

pub async fn put_preference(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<MutationResponse>, ApiError> {
    let mut rec = state.recommender.lock();
    let status = rec.signals_mut().set_preference(&key, value.clone()).map_err(signal_error)?;
    Ok(Json(MutationResponse::new(Some(value), &status)))
}

pub async fn delete_preference(State(state): State<AppState>, Path(key): Path<String>) -> Json<MutationResponse> {
    let mut rec = state.recommender.lock();
    let status = rec.signals_mut().remove_preference(&key);
    Json(MutationResponse::new(None, &status))
}

pub async fn export_signals(State(state): State<AppState>) -> Json<SignalSnapshot> {
    Json(state.recommender.lock().signals().export_all())
}

pub async fn import_signals(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<MutationResponse>, ApiError> {
    authorize(&state, &headers)?;
    let mut rec = state.recommender.lock();
    let status = rec.import_json(&body).map_err(signal_error)?;
    Ok(Json(MutationResponse::new(None, &status)))
}

pub async fn reset_signals(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MutationResponse>, ApiError> {
    authorize(&state, &headers)?;
    let status = state.recommender.lock().reset();
    Ok(Json(MutationResponse::new(None, &status)))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<RecommenderStats> {
    Json(state.recommender.lock().stats())
}

pub async fn analysis_handler(State(state): State<AppState>) -> Result<Json<PreferenceAnalysis>, ApiError> {
    let mut rec = state.recommender.lock();
    rec.analyze(&state.library).map(Json).map_err(signal_error)
}

fn signal_error(err: SignalError) -> ApiError {
    let status = match &err {
        SignalError::InvalidRating { .. } | SignalError::EmptyKey | SignalError::MalformedSnapshot { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SignalError::Encode { .. } | SignalError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
