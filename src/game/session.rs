//! Per-pair round state machine

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::matchmaking::connection::{ConnectionId, Outbox};
use crate::ws::protocol::{Outbound, ServerMsg};

use super::combat::{conceded_round_damage, BOARD_CLEARED_DAMAGE};
use super::SessionError;

/// Board size of the first round
pub const INITIAL_BOARD_SIZE: u32 = 5;

/// Number of the first round
pub const INITIAL_ROUND: u32 = 1;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Both players racing the current board
    Active,
    /// A participant disconnected
    Terminated,
}

/// One participant's per-round state
#[derive(Debug)]
struct Seat {
    conn_id: ConnectionId,
    /// Non-owning handle to the participant's outbox
    peer: mpsc::WeakUnboundedSender<Outbound>,
    /// Round number and reported time of the last concession accepted from this seat
    last_concession: Option<(u32, f64)>,
    start_time: Instant,
}

impl Seat {
    fn new(conn_id: ConnectionId, outbox: &Outbox, now: Instant) -> Self {
        Self {
            conn_id,
            peer: outbox.downgrade(),
            last_concession: None,
            start_time: now,
        }
    }

    /// Same report as the concession that ended the previous round
    fn repeats_last_concession(&self, round: u32, time_ms: f64) -> bool {
        self.last_concession
            .is_some_and(|(conceded_in, t)| conceded_in + 1 == round && t == time_ms)
    }

    fn send(&self, msg: impl Into<Outbound>) -> Result<(), SessionError> {
        let outbox = self.peer.upgrade().ok_or(SessionError::PeerUnavailable)?;
        outbox
            .send(msg.into())
            .map_err(|_| SessionError::PeerUnavailable)
    }
}

/// Shared round state, guarded by the session lock
#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    board_size: u32,
    round: u32,
    /// Index 0 is player1 (the connection that was waiting)
    seats: [Seat; 2],
}

/// Result of an accepted round outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundAdvance {
    /// Damage dealt for the finished round
    pub damage: u32,
    /// Round now being played
    pub round: u32,
    /// Board size of the new round
    pub board_size: u32,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub board_size: u32,
    pub round: u32,
}

/// An active 1v1 match.
///
/// Every mutation happens under a single lock, so outcomes reported by both
/// players at once are applied one after the other and never interleave.
/// Sends go to unbounded outboxes and never block while the lock is held.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: Mutex<SessionState>,
}

impl Session {
    /// Pair two connections. `player1` is the one that was waiting.
    pub fn new(
        id: Uuid,
        player1: (ConnectionId, &Outbox),
        player2: (ConnectionId, &Outbox),
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Active,
                board_size: INITIAL_BOARD_SIZE,
                round: INITIAL_ROUND,
                seats: [
                    Seat::new(player1.0, player1.1, now),
                    Seat::new(player2.0, player2.1, now),
                ],
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            phase: state.phase,
            board_size: state.board_size,
            round: state.round,
        }
    }

    /// The other participant
    pub fn opponent_of(&self, conn_id: ConnectionId) -> Option<ConnectionId> {
        let state = self.state.lock();
        let idx = seat_index(&state, conn_id).ok()?;
        Some(state.seats[1 - idx].conn_id)
    }

    /// Restamp round start times and send `matchFound` to both sides
    pub fn start(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let (board_size, round) = (state.board_size, state.round);

        for (idx, seat) in state.seats.iter_mut().enumerate() {
            seat.start_time = now;
            deliver(
                self.id,
                seat,
                ServerMsg::MatchFound {
                    is_player1: idx == 0,
                    board_size,
                    round,
                },
            );
        }
    }

    /// Relay an opaque move payload to the opponent
    pub fn relay_move(&self, from: ConnectionId, raw: &str) -> Result<(), SessionError> {
        let state = self.state.lock();
        ensure_live(&state)?;
        let idx = seat_index(&state, from)?;

        match state.seats[1 - idx].send(Outbound::Relay(raw.to_owned())) {
            Err(SessionError::PeerUnavailable) => {
                debug!(session_id = %self.id, conn_id = %from, "Move dropped, opponent unavailable");
                Ok(())
            }
            other => other,
        }
    }

    /// `from` cleared their board first: flat damage to the opponent, then next round
    pub fn board_cleared(&self, from: ConnectionId) -> Result<RoundAdvance, SessionError> {
        let mut state = self.state.lock();
        ensure_live(&state)?;
        let winner = seat_index(&state, from)?;
        let damage = BOARD_CLEARED_DAMAGE;

        deliver(self.id, &state.seats[1 - winner], ServerMsg::RoundLost { damage });
        deliver(self.id, &state.seats[winner], ServerMsg::RoundWon { damage });

        Ok(self.advance_round(&mut state, damage))
    }

    /// `from` concedes the round after `time_ms` of play.
    ///
    /// A report is stale when it repeats the concession that ended the previous
    /// round, or claims more play time than has passed since the current round
    /// began. Either way it belongs to an outcome that already advanced the round.
    pub fn round_lost(&self, from: ConnectionId, time_ms: f64) -> Result<RoundAdvance, SessionError> {
        let mut state = self.state.lock();
        ensure_live(&state)?;
        let loser = seat_index(&state, from)?;
        let winner = 1 - loser;

        let now = Instant::now();
        let seat = &state.seats[loser];
        let round_elapsed_ms = now.duration_since(seat.start_time).as_secs_f64() * 1000.0;
        if seat.repeats_last_concession(state.round, time_ms) || time_ms > round_elapsed_ms {
            return Err(SessionError::StaleState);
        }

        let opponent_ms =
            now.duration_since(state.seats[winner].start_time).as_secs_f64() * 1000.0;
        let damage = conceded_round_damage(time_ms, opponent_ms);

        state.seats[loser].last_concession = Some((state.round, time_ms));
        deliver(self.id, &state.seats[loser], ServerMsg::ApplyDamage { damage });
        deliver(self.id, &state.seats[winner], ServerMsg::RoundWon { damage });

        Ok(self.advance_round(&mut state, damage))
    }

    /// End the session because `departed` disconnected.
    ///
    /// Returns the surviving participant the first time it is called, `None`
    /// afterwards.
    pub fn terminate(&self, departed: ConnectionId) -> Option<ConnectionId> {
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Terminated {
            return None;
        }
        let idx = seat_index(&state, departed).ok()?;
        state.phase = SessionPhase::Terminated;

        let survivor = &state.seats[1 - idx];
        deliver(self.id, survivor, ServerMsg::OpponentLeft);
        info!(
            session_id = %self.id,
            departed = %departed,
            survivor = %survivor.conn_id,
            round = state.round,
            "Session terminated"
        );
        Some(survivor.conn_id)
    }

    fn advance_round(&self, state: &mut SessionState, damage: u32) -> RoundAdvance {
        state.round += 1;
        state.board_size += 1;

        let now = Instant::now();
        for seat in state.seats.iter_mut() {
            seat.start_time = now;
        }

        let next = ServerMsg::NextRound {
            board_size: state.board_size,
            round: state.round,
        };
        for seat in state.seats.iter() {
            deliver(self.id, seat, next.clone());
        }

        info!(
            session_id = %self.id,
            round = state.round,
            board_size = state.board_size,
            damage,
            "Round advanced"
        );

        RoundAdvance {
            damage,
            round: state.round,
            board_size: state.board_size,
        }
    }
}

fn ensure_live(state: &SessionState) -> Result<(), SessionError> {
    if state.phase == SessionPhase::Terminated {
        return Err(SessionError::Terminated);
    }
    Ok(())
}

fn seat_index(state: &SessionState, conn_id: ConnectionId) -> Result<usize, SessionError> {
    state
        .seats
        .iter()
        .position(|s| s.conn_id == conn_id)
        .ok_or(SessionError::NotParticipant)
}

/// Fire-and-forget send; a gone peer is handled by the disconnect path
fn deliver(session_id: Uuid, seat: &Seat, msg: ServerMsg) {
    if let Err(e) = seat.send(msg) {
        debug!(session_id = %session_id, conn_id = %seat.conn_id, error = %e, "Send skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_test::{assert_err, assert_ok};

    struct Player {
        id: ConnectionId,
        outbox: Outbox,
        rx: UnboundedReceiver<Outbound>,
    }

    impl Player {
        fn new() -> Self {
            let (outbox, rx) = mpsc::unbounded_channel();
            Self {
                id: Uuid::new_v4(),
                outbox,
                rx,
            }
        }

        fn drain(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    fn paired() -> (Session, Player, Player) {
        let a = Player::new();
        let b = Player::new();
        let session = Session::new(Uuid::new_v4(), (a.id, &a.outbox), (b.id, &b.outbox));
        (session, a, b)
    }

    fn msg(m: ServerMsg) -> Outbound {
        Outbound::Msg(m)
    }

    #[test]
    fn start_announces_complementary_roles() {
        let (session, mut a, mut b) = paired();
        session.start();

        assert_eq!(
            a.drain(),
            vec![msg(ServerMsg::MatchFound { is_player1: true, board_size: 5, round: 1 })]
        );
        assert_eq!(
            b.drain(),
            vec![msg(ServerMsg::MatchFound { is_player1: false, board_size: 5, round: 1 })]
        );
        assert_eq!(session.opponent_of(a.id), Some(b.id));
        assert_eq!(session.opponent_of(Uuid::new_v4()), None);
    }

    #[test]
    fn board_cleared_deals_flat_damage_and_advances() {
        let (session, mut a, mut b) = paired();

        let advance = assert_ok!(session.board_cleared(a.id));
        assert_eq!(advance, RoundAdvance { damage: 15, round: 2, board_size: 6 });

        assert_eq!(
            a.drain(),
            vec![
                msg(ServerMsg::RoundWon { damage: 15 }),
                msg(ServerMsg::NextRound { board_size: 6, round: 2 }),
            ]
        );
        assert_eq!(
            b.drain(),
            vec![
                msg(ServerMsg::RoundLost { damage: 15 }),
                msg(ServerMsg::NextRound { board_size: 6, round: 2 }),
            ]
        );
        assert_eq!(session.snapshot().phase, SessionPhase::Active);
    }

    #[test]
    fn board_size_grows_every_round() {
        let (session, a, b) = paired();
        assert_ok!(session.board_cleared(a.id));
        assert_ok!(session.board_cleared(b.id));
        let advance = assert_ok!(session.board_cleared(a.id));

        assert_eq!(advance.round, 4);
        assert_eq!(advance.board_size, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn round_lost_damage_scales_with_time_gap() {
        let (session, mut a, mut b) = paired();
        tokio::time::advance(Duration::from_millis(2600)).await;

        let advance = assert_ok!(session.round_lost(a.id, 2000.0));
        assert_eq!(advance.damage, 13);

        assert_eq!(
            a.drain(),
            vec![
                msg(ServerMsg::ApplyDamage { damage: 13 }),
                msg(ServerMsg::NextRound { board_size: 6, round: 2 }),
            ]
        );
        assert_eq!(
            b.drain(),
            vec![
                msg(ServerMsg::RoundWon { damage: 13 }),
                msg(ServerMsg::NextRound { board_size: 6, round: 2 }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_round_lost_is_ignored() {
        let (session, mut a, mut b) = paired();
        tokio::time::advance(Duration::from_millis(3000)).await;

        assert_ok!(session.round_lost(a.id, 2500.0));
        let dup = session.round_lost(a.id, 2500.0);
        assert!(matches!(dup, Err(SessionError::StaleState)));

        assert_eq!(a.drain().len(), 2);
        assert_eq!(b.drain().len(), 2);
        assert_eq!(session.snapshot().round, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_round_lost_after_the_clock_moves_on_is_ignored() {
        let (session, mut a, mut b) = paired();
        tokio::time::advance(Duration::from_millis(3000)).await;
        assert_ok!(session.round_lost(a.id, 150.0));

        // The resend arrives once the new round has run past the reported time
        tokio::time::advance(Duration::from_millis(200)).await;
        let dup = session.round_lost(a.id, 150.0);
        assert!(matches!(dup, Err(SessionError::StaleState)));

        assert_eq!(a.drain().len(), 2);
        assert_eq!(b.drain().len(), 2);
        assert_eq!(session.snapshot().round, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_time_two_rounds_later_is_processed() {
        let (session, a, _b) = paired();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_ok!(session.round_lost(a.id, 500.0));
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_ok!(session.board_cleared(a.id));

        tokio::time::advance(Duration::from_millis(1000)).await;
        let advance = assert_ok!(session.round_lost(a.id, 500.0));
        assert_eq!(advance.round, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn late_concession_after_board_cleared_is_stale() {
        let (session, mut a, mut b) = paired();
        tokio::time::advance(Duration::from_millis(4000)).await;

        assert_ok!(session.board_cleared(a.id));
        // B's concession for the round A just won arrives afterwards
        assert_err!(session.round_lost(b.id, 3900.0));

        let next_rounds = |msgs: Vec<Outbound>| {
            msgs.into_iter()
                .filter(|m| matches!(m, Outbound::Msg(ServerMsg::NextRound { .. })))
                .count()
        };
        assert_eq!(next_rounds(a.drain()), 1);
        assert_eq!(next_rounds(b.drain()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concession_in_a_later_round_is_processed() {
        let (session, a, _b) = paired();
        tokio::time::advance(Duration::from_millis(3000)).await;
        assert_ok!(session.round_lost(a.id, 2800.0));

        tokio::time::advance(Duration::from_millis(5000)).await;
        let advance = assert_ok!(session.round_lost(a.id, 4800.0));
        assert_eq!(advance.round, 3);
        assert_eq!(advance.damage, 11);
    }

    #[test]
    fn moves_are_relayed_verbatim_in_order() {
        let (session, a, mut b) = paired();
        let first = r#"{"type":"move","x":1,"y":2}"#;
        let second = r#"{"type":"move","x":3,"y":4,"flag":true}"#;

        assert_ok!(session.relay_move(a.id, first));
        assert_ok!(session.relay_move(a.id, second));

        assert_eq!(
            b.drain(),
            vec![
                Outbound::Relay(first.to_string()),
                Outbound::Relay(second.to_string()),
            ]
        );
        assert_eq!(session.snapshot().round, 1);
    }

    #[test]
    fn strangers_are_rejected() {
        let (session, _a, _b) = paired();
        let stranger = Uuid::new_v4();
        assert!(matches!(
            session.board_cleared(stranger),
            Err(SessionError::NotParticipant)
        ));
        assert!(matches!(
            session.relay_move(stranger, "{}"),
            Err(SessionError::NotParticipant)
        ));
    }

    #[test]
    fn terminate_notifies_survivor_once() {
        let (session, a, mut b) = paired();

        assert_eq!(session.terminate(a.id), Some(b.id));
        assert_eq!(session.terminate(b.id), None);
        assert_eq!(session.terminate(a.id), None);

        assert_eq!(b.drain(), vec![msg(ServerMsg::OpponentLeft)]);
        assert_eq!(session.snapshot().phase, SessionPhase::Terminated);
        assert!(matches!(
            session.board_cleared(b.id),
            Err(SessionError::Terminated)
        ));
    }

    #[test]
    fn gone_opponent_does_not_fail_the_sender() {
        let (session, mut a, b) = paired();
        let Player { outbox, rx, .. } = b;
        drop(outbox);
        drop(rx);

        let advance = assert_ok!(session.board_cleared(a.id));
        assert_eq!(advance.round, 2);
        assert_ok!(session.relay_move(a.id, r#"{"type":"move"}"#));
        assert_eq!(
            a.drain(),
            vec![
                msg(ServerMsg::RoundWon { damage: 15 }),
                msg(ServerMsg::NextRound { board_size: 6, round: 2 }),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_outcomes_keep_rounds_consistent() {
        let (session, mut a, mut b) = paired();
        let session = Arc::new(session);
        let (a_id, b_id) = (a.id, b.id);

        let mut tasks = Vec::new();
        for i in 0..50 {
            let session = session.clone();
            let from = if i % 2 == 0 { a_id } else { b_id };
            tasks.push(tokio::spawn(async move { session.board_cleared(from) }));
        }
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        assert_eq!(session.snapshot().round, 51);
        assert_eq!(session.snapshot().board_size, 55);

        let rounds = |msgs: Vec<Outbound>| -> Vec<u32> {
            msgs.into_iter()
                .filter_map(|m| match m {
                    Outbound::Msg(ServerMsg::NextRound { round, .. }) => Some(round),
                    _ => None,
                })
                .collect()
        };
        let expected: Vec<u32> = (2..=51).collect();
        assert_eq!(rounds(a.drain()), expected);
        assert_eq!(rounds(b.drain()), expected);
    }
}
