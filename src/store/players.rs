//! Player records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

const TABLE: &str = "players";

/// Stored player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// New player for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewPlayer {
    pub id: Uuid,
    pub name: String,
}

/// Player store operations
#[derive(Clone)]
pub struct PlayerStore {
    client: SupabaseClient,
}

impl PlayerStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Look up a player by exact name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, SupabaseError> {
        self.client
            .get_one(TABLE, &[("name", format!("eq.{}", name))])
            .await
    }

    /// Look up a player by id
    pub async fn get(&self, id: Uuid) -> Result<Option<PlayerRecord>, SupabaseError> {
        self.client
            .get_one(TABLE, &[("id", format!("eq.{}", id))])
            .await
    }

    /// Create a new player
    pub async fn create(&self, name: &str) -> Result<PlayerRecord, SupabaseError> {
        let player = NewPlayer {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.client.insert(TABLE, &player).await
    }
}
