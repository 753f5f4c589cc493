// Client-side state of one match. The server is authoritative: every transition here either
// mirrors a server push or is a local prediction that the server will later confirm or override.

use std::fmt;
use std::time::Duration;

use derive_new::new;
use instant::Instant;
use log::info;
use serde::{Deserialize, Serialize};

use crate::clock::MatchClock;
use crate::error::{CommandError, SessionError};
use crate::identity::PlayerId;
use crate::position::Position;
use crate::rules_engine::{MoveRequest, RulesEngine};
use crate::side::Side;


#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn new(s: impl Into<String>) -> Self { Self(s.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum MatchPhase {
    Uninitialized,
    AwaitingOpponent,
    Active,
    Ended,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

// Outcome from the point of view of one side.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LocalResult {
    Win,
    Loss,
    Draw,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EndResult {
    pub outcome: Outcome,
    pub reason: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionKind {
    Resign,
    OfferDraw,
    ClaimCheckmate,
}

// Everything needed to (re)establish a match: sent by the server on create, join, pairing and
// on explicit state requests.
#[derive(Clone, PartialEq, Eq, Debug, new)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub position: Position,
    pub local_side: Side,
    pub duration: Duration,
    pub opponent: Option<PlayerId>,
    pub move_seq: u64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MoveRecord {
    pub seq: u64,
    pub position: Position,
    pub received_at: Instant,
}

// A local move that has been sent to the server, but not confirmed yet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PendingMove {
    pub request: MoveRequest,
    pub predicted: Position,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActionIntent {
    pub match_id: MatchId,
    pub kind: ActionKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AppliedMove {
    pub mover: Side,
    // The move confirms our pending prediction exactly.
    pub matched_prediction: bool,
}

impl Outcome {
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => Outcome::WhiteWins,
            Side::Black => Outcome::BlackWins,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::WhiteWins => Some(Side::White),
            Outcome::BlackWins => Some(Side::Black),
            Outcome::Draw => None,
        }
    }

    pub fn for_side(self, side: Side) -> LocalResult {
        match self.winner() {
            None => LocalResult::Draw,
            Some(winner) if winner == side => LocalResult::Win,
            Some(_) => LocalResult::Loss,
        }
    }
}


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MatchSession {
    match_id: Option<MatchId>,
    phase: MatchPhase,
    position: Position,
    local_side: Option<Side>,
    opponent: Option<PlayerId>,
    clock: MatchClock,
    move_seq: u64,
    end_result: Option<EndResult>,
    move_log: Vec<MoveRecord>,
    pending_move: Option<PendingMove>,
    pending_actions: Vec<ActionKind>,
    timeout_candidate: Option<Side>,
}

impl Default for MatchSession {
    fn default() -> Self { Self::new() }
}

impl MatchSession {
    pub fn new() -> Self {
        MatchSession {
            match_id: None,
            phase: MatchPhase::Uninitialized,
            position: Position::start(),
            local_side: None,
            opponent: None,
            clock: MatchClock::new(Duration::ZERO),
            move_seq: 0,
            end_result: None,
            move_log: Vec::new(),
            pending_move: None,
            pending_actions: Vec::new(),
            timeout_candidate: None,
        }
    }

    pub fn match_id(&self) -> Option<&MatchId> { self.match_id.as_ref() }
    pub fn phase(&self) -> MatchPhase { self.phase }
    pub fn position(&self) -> &Position { &self.position }
    pub fn side_to_move(&self) -> Side { self.position.side_to_move() }
    pub fn local_side(&self) -> Option<Side> { self.local_side }
    pub fn opponent(&self) -> Option<&PlayerId> { self.opponent.as_ref() }
    pub fn clock(&self) -> &MatchClock { &self.clock }
    pub fn move_seq(&self) -> u64 { self.move_seq }
    pub fn end_result(&self) -> Option<&EndResult> { self.end_result.as_ref() }
    pub fn move_log(&self) -> &[MoveRecord] { &self.move_log }
    pub fn pending_move(&self) -> Option<&PendingMove> { self.pending_move.as_ref() }
    pub fn pending_actions(&self) -> &[ActionKind] { &self.pending_actions }
    pub fn timeout_candidate(&self) -> Option<Side> { self.timeout_candidate }

    pub fn can_move_locally(&self) -> bool {
        self.phase == MatchPhase::Active
            && self.local_side == Some(self.side_to_move())
            && self.pending_move.is_none()
    }

    // What the board should show: our unconfirmed move, if any, on top of the server position.
    pub fn displayed_position(&self) -> &Position {
        match &self.pending_move {
            Some(pending) => &pending.predicted,
            None => &self.position,
        }
    }

    pub fn local_result(&self) -> Option<LocalResult> {
        let result = self.end_result.as_ref()?;
        Some(result.outcome.for_side(self.local_side?))
    }
    pub fn is_local_winner(&self) -> bool { self.local_result() == Some(LocalResult::Win) }

    // Establishes the match, or resyncs it after a reconnection. A resync never moves the phase
    // backwards, so a snapshot without an opponent leaves an active match active.
    pub fn initialize(&mut self, snapshot: MatchSnapshot, now: Instant) -> Result<(), SessionError> {
        if self.phase == MatchPhase::Ended {
            return Err(SessionError::IllegalTransition { from: self.phase, operation: "initialize" });
        }
        self.check_snapshot(&snapshot)?;

        let opponent = snapshot.opponent.or_else(|| self.opponent.take());
        let new_phase = if opponent.is_some() || self.phase == MatchPhase::Active {
            MatchPhase::Active
        } else {
            MatchPhase::AwaitingOpponent
        };
        info!(
            "Match {}: {:?} -> {:?}, playing {}, move #{}",
            snapshot.match_id, self.phase, new_phase, snapshot.local_side, snapshot.move_seq
        );
        self.match_id = Some(snapshot.match_id);
        self.local_side = Some(snapshot.local_side);
        self.opponent = opponent;
        self.position = snapshot.position;
        self.move_seq = snapshot.move_seq;
        self.clock = MatchClock::new(snapshot.duration);
        self.pending_move = None;
        self.pending_actions.clear();
        self.timeout_candidate = None;
        self.phase = new_phase;
        if new_phase == MatchPhase::Active {
            self.clock.switch_to(self.side_to_move(), now);
        }
        Ok(())
    }

    // Whether the snapshot describes this match as we know it: same match, same side, not older.
    pub fn check_snapshot(&self, snapshot: &MatchSnapshot) -> Result<(), SessionError> {
        if let Some(match_id) = &self.match_id {
            if *match_id != snapshot.match_id {
                return Err(SessionError::InvalidSnapshot(format!(
                    "match {} is already tracked, got snapshot for {}",
                    match_id, snapshot.match_id
                )));
            }
        }
        if let Some(local_side) = self.local_side {
            if local_side != snapshot.local_side {
                return Err(SessionError::InvalidSnapshot(format!(
                    "playing as {}, got snapshot for {}",
                    local_side, snapshot.local_side
                )));
            }
        }
        if snapshot.move_seq < self.move_seq {
            return Err(SessionError::StaleMove {
                received: snapshot.move_seq,
                current: self.move_seq,
            });
        }
        Ok(())
    }

    // The server turned down what we asked for. Intents can be sent again.
    pub fn clear_pending_actions(&mut self) { self.pending_actions.clear(); }

    // Returns whether the phase changed. Redelivery of the same join is a no-op.
    pub fn opponent_joined(&mut self, opponent: PlayerId, now: Instant) -> Result<bool, SessionError> {
        match self.phase {
            MatchPhase::AwaitingOpponent => {
                info!("Match {}: opponent {} joined", self.match_id_str(), opponent.as_str());
                self.opponent = Some(opponent);
                self.phase = MatchPhase::Active;
                self.clock.switch_to(self.side_to_move(), now);
                Ok(true)
            }
            MatchPhase::Active if self.opponent.as_ref() == Some(&opponent) => Ok(false),
            _ => Err(SessionError::IllegalTransition {
                from: self.phase,
                operation: "accept opponent",
            }),
        }
    }

    pub fn apply_move(
        &mut self, position: Position, move_seq: u64, now: Instant,
    ) -> Result<AppliedMove, SessionError> {
        if self.phase != MatchPhase::Active {
            return Err(SessionError::IllegalTransition { from: self.phase, operation: "apply move" });
        }
        if move_seq <= self.move_seq {
            return Err(SessionError::StaleMove { received: move_seq, current: self.move_seq });
        }
        let matched_prediction =
            self.pending_move.take().is_some_and(|pending| pending.predicted == position);
        let mover = position.side_to_move().opponent();
        self.move_log.push(MoveRecord {
            seq: move_seq,
            position: position.clone(),
            received_at: now,
        });
        self.position = position;
        self.move_seq = move_seq;
        self.timeout_candidate = None;
        self.clock.switch_to(self.side_to_move(), now);
        Ok(AppliedMove { mover, matched_prediction })
    }

    // Display projection only. Returns the side that has just been observed to run out of time.
    // This is advisory: only the server can end the match.
    pub fn apply_clock_tick(&mut self, now: Instant) -> Option<Side> {
        self.clock.project(now);
        if self.phase != MatchPhase::Active || self.timeout_candidate.is_some() {
            return None;
        }
        let side = self.clock.active_side()?;
        if !self.clock.time_left(side, now).is_zero() {
            return None;
        }
        info!("Match {}: {} is out of time locally", self.match_id_str(), side);
        self.timeout_candidate = Some(side);
        Some(side)
    }

    // Returns whether the match has just ended, as opposed to a redelivered result.
    pub fn apply_end(
        &mut self, outcome: Outcome, reason: String, now: Instant,
    ) -> Result<bool, SessionError> {
        let received = EndResult { outcome, reason };
        match self.phase {
            MatchPhase::Ended => match &self.end_result {
                Some(recorded) if *recorded == received => Ok(false),
                Some(recorded) => {
                    Err(SessionError::ConflictingResult { recorded: recorded.clone(), received })
                }
                None => Err(SessionError::IllegalTransition {
                    from: self.phase,
                    operation: "record result",
                }),
            },
            MatchPhase::Uninitialized => Err(SessionError::IllegalTransition {
                from: self.phase,
                operation: "record result",
            }),
            MatchPhase::AwaitingOpponent | MatchPhase::Active => {
                info!(
                    "Match {}: ended with {:?} ({})",
                    self.match_id_str(),
                    received.outcome,
                    received.reason
                );
                self.clock.stop(now);
                self.phase = MatchPhase::Ended;
                self.end_result = Some(received);
                self.pending_move = None;
                self.pending_actions.clear();
                self.timeout_candidate = None;
                Ok(true)
            }
        }
    }

    // Records the intent and returns it for sending. The phase is left to the server's verdict.
    pub fn request_action(&mut self, kind: ActionKind) -> Result<ActionIntent, SessionError> {
        let match_id = match (&self.match_id, self.phase) {
            (Some(match_id), MatchPhase::Active) => match_id.clone(),
            _ => {
                return Err(SessionError::IllegalTransition {
                    from: self.phase,
                    operation: "request action",
                });
            }
        };
        if !self.pending_actions.contains(&kind) {
            self.pending_actions.push(kind);
        }
        Ok(ActionIntent { match_id, kind })
    }

    pub fn propose_move(
        &mut self, request: MoveRequest, engine: &dyn RulesEngine,
    ) -> Result<&PendingMove, CommandError> {
        if self.phase != MatchPhase::Active {
            return Err(CommandError::NotAllowed(SessionError::IllegalTransition {
                from: self.phase,
                operation: "make move",
            }));
        }
        if self.pending_move.is_some() {
            return Err(CommandError::AwaitingConfirmation);
        }
        if self.local_side != Some(self.side_to_move()) {
            return Err(CommandError::NotYourTurn);
        }
        let predicted =
            engine.apply_move(&self.position, request).map_err(CommandError::IllegalMove)?;
        Ok(self.pending_move.insert(PendingMove { request, predicted }))
    }

    // The move never reached the server.
    pub fn discard_pending_move(&mut self) -> Option<PendingMove> { self.pending_move.take() }

    fn match_id_str(&self) -> &str { self.match_id.as_ref().map_or("?", |id| id.as_str()) }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::coord::Square;
    use crate::rules_engine::MoveRejection;
    use crate::test_util::*;

    fn active_session(t0: Instant) -> MatchSession {
        let mut session = MatchSession::new();
        session.initialize(sample_snapshot(), t0).unwrap();
        session.opponent_joined(PlayerId::new("p2"), t0).unwrap();
        session
    }

    #[test]
    fn awaiting_then_active() {
        let t0 = Instant::now();
        let mut session = MatchSession::new();
        assert_eq!(session.phase(), MatchPhase::Uninitialized);
        session.initialize(sample_snapshot(), t0).unwrap();
        assert_eq!(session.phase(), MatchPhase::AwaitingOpponent);
        assert_eq!(session.match_id(), Some(&MatchId::new("m1")));
        assert!(!session.clock().is_running());

        assert_eq!(session.opponent_joined(PlayerId::new("p2"), t0), Ok(true));
        assert_eq!(session.phase(), MatchPhase::Active);
        assert_eq!(session.side_to_move(), Side::White);
        assert_eq!(session.clock().active_side(), Some(Side::White));

        // Redelivery.
        assert_eq!(session.opponent_joined(PlayerId::new("p2"), t0), Ok(false));
        assert!(matches!(
            session.opponent_joined(PlayerId::new("p3"), t0),
            Err(SessionError::IllegalTransition { from: MatchPhase::Active, .. })
        ));
    }

    #[test]
    fn opponent_cannot_join_uninitialized() {
        let mut session = MatchSession::new();
        assert!(session.opponent_joined(PlayerId::new("p2"), Instant::now()).is_err());
        assert_eq!(session, MatchSession::new());
    }

    #[test]
    fn initialize_resets_clocks() {
        let t0 = Instant::now();
        let mut session = MatchSession::new();
        let snapshot = MatchSnapshot {
            opponent: Some(PlayerId::new("p2")),
            position: after_e4(),
            move_seq: 1,
            ..sample_snapshot()
        };
        session.initialize(snapshot, t0).unwrap();
        assert_eq!(session.phase(), MatchPhase::Active);
        let reading = session.clock().remaining();
        assert_eq!(reading.white_remaining, Duration::from_millis(300_000));
        assert_eq!(reading.black_remaining, Duration::from_millis(300_000));
        assert_eq!(session.clock().active_side(), Some(Side::Black));
    }

    #[test]
    fn initialize_rejects_other_match() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        let before = session.clone();
        let snapshot = MatchSnapshot { match_id: MatchId::new("m2"), ..sample_snapshot() };
        assert!(matches!(
            session.initialize(snapshot, t0),
            Err(SessionError::InvalidSnapshot(_))
        ));
        let snapshot = MatchSnapshot { local_side: Side::Black, ..sample_snapshot() };
        assert!(matches!(
            session.initialize(snapshot, t0),
            Err(SessionError::InvalidSnapshot(_))
        ));
        assert_eq!(session, before);
    }

    #[test]
    fn resync_never_goes_backwards() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        session.apply_move(after_e4(), 1, t0).unwrap();

        // Snapshot without opponent and with the same move count: stays active.
        let snapshot = MatchSnapshot { position: after_e4(), move_seq: 1, ..sample_snapshot() };
        session.initialize(snapshot, t0).unwrap();
        assert_eq!(session.phase(), MatchPhase::Active);
        assert_eq!(session.opponent(), Some(&PlayerId::new("p2")));

        // Older snapshot.
        let before = session.clone();
        assert_eq!(
            session.initialize(sample_snapshot(), t0),
            Err(SessionError::StaleMove { received: 0, current: 1 })
        );
        assert_eq!(session, before);

        session.apply_end(Outcome::Draw, "agreement".to_owned(), t0).unwrap();
        assert!(matches!(
            session.initialize(sample_snapshot(), t0),
            Err(SessionError::IllegalTransition { from: MatchPhase::Ended, .. })
        ));
    }

    #[test]
    fn stale_move_is_ignored() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        let applied = session.apply_move(after_e4(), 1, t0).unwrap();
        assert_eq!(applied.mover, Side::White);
        assert_eq!(session.move_seq(), 1);
        assert_eq!(session.side_to_move(), Side::Black);

        let before = session.clone();
        assert_eq!(
            session.apply_move(after_e4(), 1, t0),
            Err(SessionError::StaleMove { received: 1, current: 1 })
        );
        assert_eq!(
            session.apply_move(after_e4_e5(), 0, t0),
            Err(SessionError::StaleMove { received: 0, current: 1 })
        );
        assert_eq!(session, before);
        assert_eq!(session.move_log().len(), 1);
    }

    #[test]
    fn moves_require_active_phase() {
        let t0 = Instant::now();
        let mut session = MatchSession::new();
        session.initialize(sample_snapshot(), t0).unwrap();
        assert!(matches!(
            session.apply_move(after_e4(), 1, t0),
            Err(SessionError::IllegalTransition { from: MatchPhase::AwaitingOpponent, .. })
        ));
    }

    #[test]
    fn move_switches_clock() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        let t1 = t0 + Duration::from_secs(10);
        session.apply_move(after_e4(), 1, t1).unwrap();
        let t2 = t1 + Duration::from_secs(5);
        assert_eq!(session.clock().time_left(Side::White, t2), Duration::from_secs(290));
        assert_eq!(session.clock().time_left(Side::Black, t2), Duration::from_secs(295));
    }

    #[test]
    fn clock_tick_is_projection_only() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        assert_eq!(session.apply_clock_tick(t0 + Duration::from_millis(1_000)), None);

        let t_out = t0 + Duration::from_millis(300_001);
        assert_eq!(session.apply_clock_tick(t_out), Some(Side::White));
        assert_eq!(session.clock().remaining().white_remaining, Duration::ZERO);
        assert_eq!(session.clock().remaining().black_remaining, Duration::from_millis(300_000));
        assert_eq!(session.phase(), MatchPhase::Active);
        assert_eq!(session.move_seq(), 0);
        assert_eq!(session.timeout_candidate(), Some(Side::White));

        // Reported once.
        assert_eq!(session.apply_clock_tick(t_out + Duration::from_secs(1)), None);
    }

    #[test]
    fn end_is_idempotent() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        assert_eq!(session.apply_end(Outcome::WhiteWins, "checkmate".to_owned(), t0), Ok(true));
        let before = session.clone();
        assert_eq!(session.apply_end(Outcome::WhiteWins, "checkmate".to_owned(), t0), Ok(false));
        assert_eq!(session, before);

        let err = session.apply_end(Outcome::BlackWins, "timeout".to_owned(), t0).unwrap_err();
        assert!(matches!(err, SessionError::ConflictingResult { .. }));
        assert_eq!(session, before);
        assert_eq!(
            session.end_result(),
            Some(&EndResult {
                outcome: Outcome::WhiteWins,
                reason: "checkmate".to_owned()
            })
        );
        assert!(session.is_local_winner());
        assert!(!session.clock().is_running());
    }

    #[test]
    fn end_while_waiting() {
        let t0 = Instant::now();
        let mut session = MatchSession::new();
        assert!(session.apply_end(Outcome::Draw, "cancelled".to_owned(), t0).is_err());
        session.initialize(sample_snapshot(), t0).unwrap();
        assert_eq!(session.apply_end(Outcome::Draw, "cancelled".to_owned(), t0), Ok(true));
        assert_eq!(session.phase(), MatchPhase::Ended);
        assert_eq!(session.local_result(), Some(LocalResult::Draw));
    }

    #[test]
    fn resign_does_not_end_match() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        let intent = session.request_action(ActionKind::Resign).unwrap();
        assert_eq!(intent, ActionIntent {
            match_id: MatchId::new("m1"),
            kind: ActionKind::Resign
        });
        assert_eq!(session.phase(), MatchPhase::Active);
        session.request_action(ActionKind::Resign).unwrap();
        assert_eq!(session.pending_actions(), &[ActionKind::Resign]);

        session.apply_end(Outcome::BlackWins, "resignation".to_owned(), t0).unwrap();
        assert!(session.pending_actions().is_empty());
        assert!(!session.is_local_winner());
        assert!(session.request_action(ActionKind::OfferDraw).is_err());
    }

    #[test]
    fn resync_forgets_pending_actions() {
        let t0 = Instant::now();
        let mut session = active_session(t0);
        session.request_action(ActionKind::OfferDraw).unwrap();
        session.clear_pending_actions();
        assert!(session.pending_actions().is_empty());

        session.request_action(ActionKind::ClaimCheckmate).unwrap();
        session.initialize(sample_snapshot(), t0).unwrap();
        assert!(session.pending_actions().is_empty());
        assert_eq!(session.phase(), MatchPhase::Active);
    }

    #[test]
    fn snapshot_check() {
        let t0 = Instant::now();
        let mut session = MatchSession::new();
        assert_eq!(session.check_snapshot(&sample_snapshot()), Ok(()));
        session.initialize(sample_snapshot(), t0).unwrap();
        let black = MatchSnapshot { local_side: Side::Black, ..sample_snapshot() };
        assert!(matches!(session.check_snapshot(&black), Err(SessionError::InvalidSnapshot(_))));
        let other = MatchSnapshot { match_id: MatchId::new("m9"), ..sample_snapshot() };
        assert!(matches!(session.check_snapshot(&other), Err(SessionError::InvalidSnapshot(_))));
    }

    #[test]
    fn local_prediction() {
        let t0 = Instant::now();
        let rules = ScriptedRules::opening();
        let mut session = active_session(t0);
        assert!(session.can_move_locally());

        let illegal = MoveRequest::new(Square::E2, Square::E5);
        assert_eq!(
            session.propose_move(illegal, &rules),
            Err(CommandError::IllegalMove(MoveRejection::IllegalMove))
        );

        let e2e4 = MoveRequest::new(Square::E2, Square::E4);
        session.propose_move(e2e4, &rules).unwrap();
        assert_eq!(session.displayed_position(), &after_e4());
        assert_eq!(session.position(), &Position::start());
        assert!(!session.can_move_locally());
        assert_eq!(session.propose_move(e2e4, &rules), Err(CommandError::AwaitingConfirmation));

        let applied = session.apply_move(after_e4(), 1, t0).unwrap();
        assert!(applied.matched_prediction);
        assert_eq!(session.pending_move(), None);
        assert_eq!(
            session.propose_move(MoveRequest::new(Square::E7, Square::E5), &rules),
            Err(CommandError::NotYourTurn)
        );
    }
}
