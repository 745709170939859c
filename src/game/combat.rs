//! Round damage rules

/// Flat damage dealt when a player clears their board first
pub const BOARD_CLEARED_DAMAGE: u32 = 15;

/// Base damage for a conceded round
pub const BASE_DAMAGE: f64 = 10.0;

/// Extra damage per second of gap between the two finish times
pub const TIME_MULTIPLIER: f64 = 5.0;

/// Damage for a conceded round.
///
/// `loser_ms` is the elapsed time reported by the conceding player and
/// `opponent_ms` is the server-measured elapsed time of the other player.
/// Halves round up.
pub fn conceded_round_damage(loser_ms: f64, opponent_ms: f64) -> u32 {
    let gap_secs = (loser_ms - opponent_ms).abs() / 1000.0;
    let damage = (BASE_DAMAGE + gap_secs * TIME_MULTIPLIER + 0.5).floor();
    if damage.is_finite() {
        damage as u32
    } else {
        BASE_DAMAGE as u32
    }
}
