//! Game records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use crate::game::session::INITIAL_BOARD_SIZE;

/// Which side moves first on the stored boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    Player1,
    Player2,
}

/// Stored game between two players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: Uuid,
    /// Short public code for the game
    pub game_id: String,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_board: Vec<u32>,
    pub player2_board: Vec<u32>,
    pub turn: Turn,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// New game for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewGame {
    pub id: Uuid,
    pub game_id: String,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_board: Vec<u32>,
    pub player2_board: Vec<u32>,
    pub turn: Turn,
}

impl NewGame {
    /// Fresh game: both boards unrevealed at the opening size, player1 to move
    pub fn new(player1_id: Uuid, player2_id: Uuid) -> Self {
        let id = Uuid::new_v4();
        let cells = (INITIAL_BOARD_SIZE * INITIAL_BOARD_SIZE) as usize;
        Self {
            id,
            game_id: id.simple().to_string()[..8].to_string(),
            player1_id,
            player2_id,
            player1_board: vec![0; cells],
            player2_board: vec![0; cells],
            turn: Turn::Player1,
        }
    }
}

/// Game store operations
#[derive(Clone)]
pub struct GameStore {
    client: SupabaseClient,
}

impl GameStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, player1_id: Uuid, player2_id: Uuid) -> Result<GameRecord, SupabaseError> {
        self.client
            .insert("games", &NewGame::new(player1_id, player2_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_starts_with_blank_opening_boards() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let game = NewGame::new(p1, p2);

        assert_eq!(game.player1_board, vec![0; 25]);
        assert_eq!(game.player2_board.len(), 25);
        assert_eq!(game.game_id.len(), 8);

        let row = serde_json::to_value(&game).unwrap();
        assert_eq!(row["turn"], "player1");
        assert_eq!(row["player1_id"], p1.to_string());
    }
}
