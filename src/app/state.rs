//! Application state shared across routes

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::game::SessionRegistry;
use crate::matchmaking::MatchmakingService;
use crate::store::{GameStore, PlayerStore, SupabaseClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub player_store: PlayerStore,
    pub game_store: GameStore,
    pub matchmaking: Arc<MatchmakingService>,
    pub session_registry: Arc<SessionRegistry>,
    /// When this state was built, reported as uptime by `/health`
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize Supabase client and record stores
        let supabase = SupabaseClient::new(&config);
        let player_store = PlayerStore::new(supabase.clone());
        let game_store = GameStore::new(supabase);

        // Initialize session registry
        let session_registry = Arc::new(SessionRegistry::new());

        // Initialize matchmaking service (Arc for sharing across cloned AppState)
        let matchmaking = Arc::new(MatchmakingService::new(session_registry.clone()));

        Self {
            config,
            player_store,
            game_store,
            matchmaking,
            session_registry,
            started_at: Instant::now(),
        }
    }
}
