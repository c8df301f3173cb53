use crate::config::{Config, GraphConfig};
use crate::error::{AssetGraphError, Result};
use crate::model::{Asset, AssetEntity, EntityPatch, Relationship};
use crate::service::AssetGraph;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// HTTP front end over [`AssetGraph`]
pub struct HttpApiServer {
    graph: AssetGraph,
    config: Config,
}

impl HttpApiServer {
    pub fn new(graph: AssetGraph, config: Config) -> Self {
        Self { graph, config }
    }

    /// Bind and serve until the process is stopped
    pub async fn run(&self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.config.http_server.bind_address, self.config.http_server.port
        );
        let app = create_router(self.graph.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            let message = if e.kind() == std::io::ErrorKind::AddrInUse {
                format!(
                    "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                    self.config.http_server.port
                )
            } else {
                format!("Failed to bind to {}: {}", addr, e)
            };
            AssetGraphError::Io(std::io::Error::new(e.kind(), message))
        })?;

        log::info!("AssetGraph API listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| AssetGraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e)
            )))?;

        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    graph: AssetGraph,
    limits: GraphConfig,
}

/// Build the axum router
pub fn create_router(graph: AssetGraph, config: &Config) -> Router {
    let allowed_origins = &config.http_server.allowed_origins;

    // Empty list: local development, allow any origin.
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let state = AppState {
        graph,
        limits: config.graph.clone(),
    };

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/entities", get(list_entities).post(create_entity))
        .route(
            "/api/entities/:id",
            get(get_entity).put(update_entity).delete(delete_entity),
        )
        .route("/api/entities/:id/relationships", get(entity_relationships))
        .route("/api/entities/:id/relationships/indirect", get(indirect_relationships))
        .route("/api/entities/:id/positions", get(entity_positions).post(add_position))
        .route("/api/entities/:id/ownerships", get(entity_ownerships))
        .route("/api/relationships", post(upsert_relationship))
        .route("/api/relationships/:id", get(get_relationship))
        .route("/api/assets", get(list_assets).post(create_asset))
        .route("/api/assets/:id", get(get_asset).delete(delete_asset))
        .route("/api/assets/:id/owners", get(asset_owners))
        .route("/api/ownerships", post(record_ownership))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

impl IntoResponse for AssetGraphError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssetGraphError::NotFound(_) => StatusCode::NOT_FOUND,
            AssetGraphError::Conflict(_) => StatusCode::CONFLICT,
            AssetGraphError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => {
                log::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AssetGraphError>;

/// JSON body extractor whose rejection uses the crate error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AssetGraphError))]
struct ApiJson<T>(T);

impl From<JsonRejection> for AssetGraphError {
    fn from(rejection: JsonRejection) -> Self {
        AssetGraphError::Validation(rejection.body_text())
    }
}

fn not_found(what: &str, id: Uuid) -> AssetGraphError {
    AssetGraphError::NotFound(format!("{} {}", what, id))
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "assetgraph",
            "version": env!("CARGO_PKG_VERSION")
        }))
    ).into_response()
}

async fn list_entities(State(state): State<AppState>) -> ApiResult<Json<Vec<AssetEntity>>> {
    Ok(Json(state.graph.list_entities().await?))
}

async fn get_entity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AssetEntity>> {
    state
        .graph
        .get_entity(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("entity", id))
}

async fn create_entity(
    State(state): State<AppState>,
    ApiJson(entity): ApiJson<AssetEntity>,
) -> ApiResult<(StatusCode, Json<AssetEntity>)> {
    let created = state.graph.create_entity(entity).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Absent entities answer 404 and nothing is created.
async fn update_entity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<EntityPatch>,
) -> ApiResult<StatusCode> {
    if state.graph.patch_entity(id, patch).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("entity", id))
    }
}

async fn delete_entity(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.graph.delete_entity(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn entity_relationships(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Relationship>>> {
    Ok(Json(state.graph.relationships_touching(id).await?))
}

#[derive(Debug, Deserialize)]
struct TraverseParams {
    depth: Option<usize>,
}

async fn indirect_relationships(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<TraverseParams>,
) -> ApiResult<Json<Vec<Relationship>>> {
    let depth = params.depth.unwrap_or(state.limits.default_traversal_depth);
    if depth > state.limits.max_traversal_depth {
        return Err(AssetGraphError::Validation(format!(
            "depth {} exceeds the maximum of {}",
            depth, state.limits.max_traversal_depth
        )));
    }
    Ok(Json(state.graph.traverse_relationships(id, depth).await?))
}

#[derive(Debug, Deserialize)]
struct PositionPayload {
    x: f32,
    y: f32,
}

async fn entity_positions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    Ok(Json(state.graph.positions_of_entity(id).await?).into_response())
}

async fn add_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<PositionPayload>,
) -> ApiResult<Response> {
    let position = state.graph.add_position(id, payload.x, payload.y).await?;
    Ok((StatusCode::CREATED, Json(position)).into_response())
}

async fn entity_ownerships(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    Ok(Json(state.graph.ownerships_of_entity(id).await?).into_response())
}

/// 201 when a new edge was created, 200 when an existing one was updated.
async fn upsert_relationship(
    State(state): State<AppState>,
    ApiJson(relationship): ApiJson<Relationship>,
) -> ApiResult<(StatusCode, Json<Relationship>)> {
    let outcome = state.graph.upsert_relationship(relationship).await?;
    let status = if outcome.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.into_relationship())))
}

async fn get_relationship(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Relationship>> {
    state
        .graph
        .get_relationship(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("relationship", id))
}

async fn list_assets(State(state): State<AppState>) -> ApiResult<Json<Vec<Asset>>> {
    Ok(Json(state.graph.list_assets().await?))
}

async fn create_asset(
    State(state): State<AppState>,
    ApiJson(asset): ApiJson<Asset>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    let created = state.graph.create_asset(asset).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_asset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Asset>> {
    state
        .graph
        .get_asset(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("asset", id))
}

async fn delete_asset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.graph.delete_asset(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn asset_owners(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    Ok(Json(state.graph.owners_of_asset(id).await?).into_response())
}

#[derive(Debug, Deserialize)]
struct OwnershipPayload {
    entity_id: Uuid,
    asset_id: Uuid,
    ownership_percentage: f32,
}

async fn record_ownership(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<OwnershipPayload>,
) -> ApiResult<Response> {
    let ownership = state
        .graph
        .record_ownership(payload.entity_id, payload.asset_id, payload.ownership_percentage)
        .await?;
    Ok((StatusCode::CREATED, Json(ownership)).into_response())
}
