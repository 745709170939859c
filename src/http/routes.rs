//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::store::games::{GameRecord, Turn};
use crate::store::players::PlayerRecord;
use crate::store::supabase::SupabaseError;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/player", post(create_player_handler))
        .route("/player/find", post(find_player_handler))
        .route("/game", post(create_game_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS configuration - `*` or a comma-separated list of origins
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    cors.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connected_players: usize,
    active_sessions: usize,
    player_waiting: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        connected_players: state.matchmaking.connected_players(),
        active_sessions: state.session_registry.active_sessions(),
        player_waiting: state.matchmaking.player_waiting().await,
    })
}

// ============================================================================
// Player endpoints
// ============================================================================

#[derive(Deserialize)]
struct PlayerNameRequest {
    name: String,
}

/// Player as the browser client reads it
#[derive(Serialize)]
struct PlayerResponse {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PlayerRecord> for PlayerResponse {
    fn from(p: PlayerRecord) -> Self {
        Self {
            id: p.id,
            name: p.name,
            created_at: p.created_at,
        }
    }
}

impl PlayerNameRequest {
    fn validated_name(&self) -> Result<&str, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Player name must not be empty".to_string()));
        }
        Ok(name)
    }
}

async fn create_player_handler(
    State(state): State<AppState>,
    Json(req): Json<PlayerNameRequest>,
) -> Result<(StatusCode, Json<PlayerResponse>), AppError> {
    let name = req.validated_name()?;

    if state.player_store.find_by_name(name).await?.is_some() {
        return Err(AppError::BadRequest("Player already exists".to_string()));
    }

    let player = state.player_store.create(name).await.map_err(|e| match e {
        SupabaseError::Conflict => AppError::BadRequest("Player already exists".to_string()),
        other => other.into(),
    })?;

    Ok((StatusCode::CREATED, Json(player.into())))
}

async fn find_player_handler(
    State(state): State<AppState>,
    Json(req): Json<PlayerNameRequest>,
) -> Result<Json<PlayerResponse>, AppError> {
    let name = req.validated_name()?;

    state
        .player_store
        .find_by_name(name)
        .await?
        .map(|p| Json(p.into()))
        .ok_or_else(|| AppError::NotFound(format!("Player '{}' not found", name)))
}

// ============================================================================
// Game endpoints
// ============================================================================

/// The client posts `{player1Id, player2Id}`; snake_case is accepted too
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGameRequest {
    #[serde(alias = "player1_id")]
    player1_id: Uuid,
    #[serde(alias = "player2_id")]
    player2_id: Uuid,
}

/// Game as the browser client reads it
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GameResponse {
    #[serde(rename = "_id")]
    id: Uuid,
    game_id: String,
    player1: Uuid,
    player2: Uuid,
    player1_board: Vec<u32>,
    player2_board: Vec<u32>,
    turn: Turn,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<GameRecord> for GameResponse {
    fn from(g: GameRecord) -> Self {
        Self {
            id: g.id,
            game_id: g.game_id,
            player1: g.player1_id,
            player2: g.player2_id,
            player1_board: g.player1_board,
            player2_board: g.player2_board,
            turn: g.turn,
            created_at: g.created_at,
        }
    }
}

async fn create_game_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    if req.player1_id == req.player2_id {
        return Err(AppError::BadRequest("A game needs two different players".to_string()));
    }

    for id in [req.player1_id, req.player2_id] {
        if state.player_store.get(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Player {} not found", id)));
        }
    }

    let game = state
        .game_store
        .create(req.player1_id, req.player2_id)
        .await?;

    Ok((StatusCode::CREATED, Json(game.into())))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SupabaseError> for AppError {
    fn from(e: SupabaseError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
