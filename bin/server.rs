// Dino Tracker - Web Server
// JSON API over the level calculator and the task store

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use dino_tracker::{
    Config, Creature, LevelBreakdown, LevelCalculator, SpecialStatRule, SqliteTaskStore,
    StatDefinition, StatSheet, StatusFilter, StoredEvent, Task, TaskFilter, TaskStore,
    TrackerError, TypeId, TypeRules,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteTaskStore>>,
    calc: Arc<LevelCalculator>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Store errors mapped onto HTTP statuses
struct ApiError(TrackerError);

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackerError::NotFound { .. } => StatusCode::NOT_FOUND,
            TrackerError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            TrackerError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn lock_store(state: &AppState) -> Result<MutexGuard<'_, SqliteTaskStore>, ApiError> {
    state
        .store
        .lock()
        .map_err(|_| ApiError(TrackerError::LockPoisoned))
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Serialize)]
struct CatalogResponse {
    base_stats: Vec<StatDefinition>,
    special_stats: Vec<StatDefinition>,
    special_rules: Vec<SpecialStatRule>,
}

#[derive(Deserialize)]
struct LevelRequest {
    species: String,
    #[serde(default)]
    base: StatSheet,
    #[serde(default)]
    mutations: Option<StatSheet>,
    #[serde(default)]
    types: BTreeSet<TypeId>,
}

#[derive(Serialize)]
struct CreatureResponse {
    #[serde(flatten)]
    creature: Creature,
    levels: LevelBreakdown,
}

#[derive(Deserialize)]
struct StatEditRequest {
    actor: String,
    base: StatSheet,
    /// Omitted keeps the stored mutation sheet, `{}` clears it
    #[serde(default)]
    mutations: Option<StatSheet>,
}

#[derive(Deserialize)]
struct CompleteRequest {
    actor: String,
}

#[derive(Deserialize, Default)]
struct TaskQuery {
    status: Option<String>,
    tribe: Option<String>,
    creature: Option<String>,
}

#[derive(Deserialize, Default)]
struct TribeQuery {
    tribe: Option<String>,
}

#[derive(Deserialize, Default)]
struct EventQuery {
    after: Option<i64>,
}

#[derive(Serialize)]
struct CountResponse {
    pending: u64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Stat catalog
async fn get_catalog(State(state): State<AppState>) -> Json<ApiResponse<CatalogResponse>> {
    let catalog = state.calc.catalog();
    Json(ApiResponse::ok(CatalogResponse {
        base_stats: catalog.list_base_stats().to_vec(),
        special_stats: catalog.list_special_stats().to_vec(),
        special_rules: catalog.special_rules().to_vec(),
    }))
}

/// POST /api/level - Level of an ad-hoc sheet
async fn post_level(
    State(state): State<AppState>,
    Json(request): Json<LevelRequest>,
) -> Json<ApiResponse<LevelBreakdown>> {
    let mut creature = Creature::new("", request.species).with_base(request.base);
    creature.types = request.types;
    creature.mutations = request.mutations;

    Json(ApiResponse::ok(state.calc.creature_levels(&creature)))
}

/// GET /api/creatures?tribe= - Creatures with levels
async fn list_creatures(
    State(state): State<AppState>,
    Query(query): Query<TribeQuery>,
) -> ApiResult<Vec<CreatureResponse>> {
    let creatures = lock_store(&state)?.list_creatures(query.tribe.as_deref())?;
    let response = creatures
        .into_iter()
        .map(|creature| CreatureResponse {
            levels: state.calc.creature_levels(&creature),
            creature,
        })
        .collect();
    Ok(Json(ApiResponse::ok(response)))
}

/// POST /api/creatures - Create or replace a creature record
async fn upsert_creature(
    State(state): State<AppState>,
    Json(creature): Json<Creature>,
) -> ApiResult<CreatureResponse> {
    if creature.id.trim().is_empty() {
        return Err(TrackerError::InvalidRecord("creature id is required".to_string()).into());
    }
    lock_store(&state)?.upsert_creature(&creature)?;
    Ok(Json(ApiResponse::ok(CreatureResponse {
        levels: state.calc.creature_levels(&creature),
        creature,
    })))
}

/// GET /api/creatures/:id - One creature with its level breakdown
async fn get_creature(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CreatureResponse> {
    let creature = lock_store(&state)?
        .get_creature(&id)?
        .ok_or_else(|| TrackerError::creature_not_found(&id))?;
    Ok(Json(ApiResponse::ok(CreatureResponse {
        levels: state.calc.creature_levels(&creature),
        creature,
    })))
}

/// PUT /api/creatures/:id/stats - Commit a stat edit, returns the new tasks
async fn put_creature_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatEditRequest>,
) -> ApiResult<Vec<Task>> {
    let tasks = lock_store(&state)?.apply_stat_edit(
        &id,
        request.base,
        request.mutations,
        &request.actor,
        Utc::now(),
    )?;
    Ok(Json(ApiResponse::ok(tasks)))
}

/// GET /api/tasks?status=&tribe=&creature= - Task feed
async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Vec<Task>> {
    let status = match query.status.as_deref() {
        None => StatusFilter::Pending,
        Some(text) => StatusFilter::parse(text).ok_or_else(|| {
            TrackerError::InvalidRecord(format!("unknown status filter '{}'", text))
        })?,
    };
    let filter = TaskFilter {
        status,
        creature_id: query.creature,
        tribe_id: query.tribe,
    };
    let tasks = lock_store(&state)?.list_tasks(&filter)?;
    Ok(Json(ApiResponse::ok(tasks)))
}

/// GET /api/tasks/pending-count?tribe= - Badge counter
async fn pending_count(
    State(state): State<AppState>,
    Query(query): Query<TribeQuery>,
) -> ApiResult<CountResponse> {
    let pending = lock_store(&state)?.pending_count(query.tribe.as_deref())?;
    Ok(Json(ApiResponse::ok(CountResponse { pending })))
}

/// POST /api/tasks/:id/complete - Mark a task done
async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> ApiResult<Task> {
    let task = lock_store(&state)?.complete_task(&id, &request.actor, Utc::now())?;
    Ok(Json(ApiResponse::ok(task)))
}

/// GET /api/events?after= - Task lifecycle events after a sequence number
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Vec<StoredEvent>> {
    let events = lock_store(&state)?.events_since(query.after.unwrap_or(0))?;
    Ok(Json(ApiResponse::ok(events)))
}

// ============================================================================
// Main Server
// ============================================================================

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_catalog))
        .route("/level", post(post_level))
        .route("/creatures", get(list_creatures).post(upsert_creature))
        .route("/creatures/:id", get(get_creature))
        .route("/creatures/:id/stats", put(put_creature_stats))
        .route("/tasks", get(list_tasks))
        .route("/tasks/pending-count", get(pending_count))
        .route("/tasks/:id/complete", post(complete_task))
        .route("/events", get(list_events))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env();

    let store = SqliteTaskStore::open(&config.db_path)?;
    tracing::info!("Database opened: {:?}", config.db_path);

    let calc = LevelCalculator::new(config.load_catalog()?, TypeRules::standard());

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        calc: Arc::new(calc),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
