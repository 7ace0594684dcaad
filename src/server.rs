//! Directory HTTP API.
//!
//! Every route lives under `/api` and speaks JSON. Creating or editing an
//! agent runs the profile-image pipeline inline before the record is stored.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Database round-trip check |
//! | `GET`/`POST` | `/api/agents` | List (filtered) / create |
//! | `GET`/`PUT`/`DELETE` | `/api/agents/{id}` | Read / update / delete one agent |
//! | `POST` | `/api/agents/{id}/refresh-image` | Re-run enrichment |
//! | `GET`  | `/api/agents/{id}/comments` | Comments, newest first |
//! | `POST` | `/api/comments` | Add a comment |
//! | `POST` | `/api/suggestions` | Submit a suggestion |
//! | `GET`  | `/api/tags`, `/api/rating-levels`, `/api/service-area-types` | Vocabularies |
//! | `GET`  | `/api/search-location?query=` | Offline place lookup |
//! | `POST` | `/api/ghl/add-contact?agent_id=` | Push an agent to the CRM |
//! | `*`    | `/api/admin/...?password=` | Password-gated tag and suggestion admin |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "agent 42 not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `bad_gateway` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the directory front end
//! is served from a different origin.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin::check_password;
use crate::agents;
use crate::comments;
use crate::config::Config;
use crate::crm::{self, CrmError};
use crate::db;
use crate::enrich::Pipeline;
use crate::error::StoreError;
use crate::geocode;
use crate::migrate::migrate_pool;
use crate::models::{Agent, AgentFilter, AgentPatch, Comment, NewAgent, NewComment, NewSuggestion, Suggestion};
use crate::ratings;
use crate::suggestions;
use crate::tags;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub pipeline: Arc<Pipeline>,
    /// Client for outbound CRM calls.
    pub http: reqwest::Client,
}

/// Starts the directory server with the configured enrichment pipeline.
///
/// Binds to `[server].bind`, makes sure the schema exists, and serves until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(&config.enrichment)?;
    run_server_with_pipeline(config, Arc::new(pipeline)).await
}

/// Like [`run_server`], but with a caller-built pipeline, e.g. one carrying a
/// real [`ImageSearch`](crate::enrich::ImageSearch) backend.
pub async fn run_server_with_pipeline(
    config: &Config,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool, &config.directory.default_tags).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        pipeline,
        http: reqwest::Client::new(),
    };

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "directory server listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/agents", get(handle_list_agents).post(handle_create_agent))
        .route(
            "/agents/{id}",
            get(handle_get_agent)
                .put(handle_update_agent)
                .delete(handle_delete_agent),
        )
        .route("/agents/{id}/refresh-image", post(handle_refresh_image))
        .route("/agents/{id}/comments", get(handle_list_comments))
        .route("/comments", post(handle_create_comment))
        .route("/suggestions", post(handle_create_suggestion))
        .route("/tags", get(handle_tags))
        .route("/rating-levels", get(handle_rating_levels))
        .route("/service-area-types", get(handle_service_area_types))
        .route("/search-location", get(handle_search_location))
        .route("/ghl/add-contact", post(handle_add_contact))
        .route("/admin/auth", post(handle_admin_auth))
        .route(
            "/admin/tags",
            get(handle_admin_tags).post(handle_admin_replace_tags),
        )
        .route("/admin/tags/{tag}", delete(handle_admin_delete_tag))
        .route("/admin/suggestions", get(handle_admin_suggestions));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn bad_gateway(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "bad_gateway",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => not_found(err.to_string()),
            StoreError::Invalid(msg) => bad_request(msg),
            StoreError::Database(_) | StoreError::Corrupt(_) => {
                tracing::error!(error = %err, "store failure");
                internal(err.to_string())
            }
        }
    }
}

impl From<CrmError> for AppError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Unauthorized(_) => unauthorized(err.to_string()),
            CrmError::Status { .. } | CrmError::Transport(_) => {
                tracing::warn!(error = %err, "CRM push failed");
                bad_gateway(err.to_string())
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

#[derive(Deserialize)]
struct PasswordQuery {
    #[serde(default)]
    password: String,
}

fn require_admin(state: &AppState, password: &str) -> Result<(), AppError> {
    if check_password(&state.config.admin, password) {
        Ok(())
    } else {
        Err(unauthorized("invalid admin password"))
    }
}

// ============ GET / and /health ============

async fn handle_root() -> Json<Value> {
    Json(json!({
        "message": "Atlas agent directory API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    match db::ping(&state.pool).await {
        Ok(()) => Json(json!({ "status": "healthy", "database": "connected" })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            Json(json!({ "status": "unhealthy", "error": e.to_string() }))
        }
    }
}

// ============ Agents ============

async fn handle_list_agents(
    State(state): State<AppState>,
    Query(filter): Query<AgentFilter>,
) -> ApiResult<Vec<Agent>> {
    let agents = agents::list_agents(&state.pool, &state.config.directory, &filter).await?;
    Ok(Json(agents))
}

async fn handle_create_agent(
    State(state): State<AppState>,
    Json(new): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    let agent =
        agents::create_agent(&state.pool, &state.config.directory, &state.pipeline, new).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn handle_get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Agent> {
    Ok(Json(agents::get_agent(&state.pool, &id).await?))
}

async fn handle_update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> ApiResult<Agent> {
    let agent = agents::update_agent(
        &state.pool,
        &state.config.directory,
        &state.pipeline,
        &id,
        patch,
    )
    .await?;
    Ok(Json(agent))
}

async fn handle_delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    agents::delete_agent(&state.pool, &id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn handle_refresh_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Agent> {
    let agent = agents::refresh_profile_image(&state.pool, &state.pipeline, &id).await?;
    Ok(Json(agent))
}

// ============ Comments & suggestions ============

async fn handle_list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    Ok(Json(comments::list_comments(&state.pool, &id).await?))
}

async fn handle_create_comment(
    State(state): State<AppState>,
    Json(new): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = comments::create_comment(&state.pool, new).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn handle_create_suggestion(
    State(state): State<AppState>,
    Json(new): Json<NewSuggestion>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let suggestion = suggestions::create_suggestion(&state.pool, new).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Suggestion submitted for review",
            "id": suggestion.id,
        })),
    ))
}

// ============ Vocabularies & lookup ============

async fn handle_tags(State(state): State<AppState>) -> ApiResult<Value> {
    let tags = tags::list_tags(&state.pool).await?;
    Ok(Json(json!({ "tags": tags })))
}

async fn handle_rating_levels(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ratings": ratings::levels_by_key(&state.config.directory) }))
}

async fn handle_service_area_types(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "types": state.config.directory.service_area_types }))
}

#[derive(Deserialize)]
struct LocationQuery {
    #[serde(default)]
    query: String,
}

async fn handle_search_location(
    Query(params): Query<LocationQuery>,
) -> ApiResult<geocode::Location> {
    if params.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    geocode::lookup(&params.query)
        .map(Json)
        .ok_or_else(|| not_found(format!("no known location matches '{}'", params.query.trim())))
}

// ============ CRM ============

#[derive(Deserialize)]
struct AddContactQuery {
    agent_id: String,
}

async fn handle_add_contact(
    State(state): State<AppState>,
    Query(params): Query<AddContactQuery>,
) -> ApiResult<crm::CrmOutcome> {
    let agent = agents::get_agent(&state.pool, &params.agent_id).await?;
    let outcome = crm::add_contact(&state.http, &state.config.crm, &agent).await?;
    Ok(Json(outcome))
}

// ============ Admin ============

#[derive(Deserialize)]
struct AuthBody {
    #[serde(default)]
    password: String,
}

/// Accepts the password as `?password=` or as a JSON body `{ "password": ... }`.
async fn handle_admin_auth(
    State(state): State<AppState>,
    Query(query): Query<PasswordQuery>,
    body: Bytes,
) -> ApiResult<Value> {
    let password = if query.password.is_empty() && !body.is_empty() {
        serde_json::from_slice::<AuthBody>(&body)
            .map_err(|e| bad_request(format!("invalid body: {}", e)))?
            .password
    } else {
        query.password
    };
    require_admin(&state, &password)?;
    Ok(Json(json!({ "authenticated": true })))
}

async fn handle_admin_tags(
    State(state): State<AppState>,
    Query(query): Query<PasswordQuery>,
) -> ApiResult<Value> {
    require_admin(&state, &query.password)?;
    let tags = tags::list_tags(&state.pool).await?;
    Ok(Json(json!({ "tags": tags })))
}

#[derive(Deserialize)]
struct TagsBody {
    tags: Vec<String>,
}

async fn handle_admin_replace_tags(
    State(state): State<AppState>,
    Query(query): Query<PasswordQuery>,
    Json(body): Json<TagsBody>,
) -> ApiResult<Value> {
    require_admin(&state, &query.password)?;
    let tags = tags::replace_tags(&state.pool, &body.tags).await?;
    Ok(Json(json!({ "tags": tags })))
}

async fn handle_admin_delete_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<PasswordQuery>,
) -> ApiResult<Value> {
    require_admin(&state, &query.password)?;
    let tags = tags::delete_tag(&state.pool, &tag).await?;
    Ok(Json(json!({ "tags": tags })))
}

async fn handle_admin_suggestions(
    State(state): State<AppState>,
    Query(query): Query<PasswordQuery>,
) -> ApiResult<Vec<Suggestion>> {
    require_admin(&state, &query.password)?;
    Ok(Json(suggestions::list_suggestions(&state.pool).await?))
}
