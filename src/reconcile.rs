// Gate between the transport and the session. Every inbound envelope goes through here: envelopes
// for other matches are dropped, the rest are applied to the session, and whatever the session
// refuses is logged and forgotten. The server will resend the truth if it matters.

use instant::Instant;
use log::{debug, info, warn};

use crate::chat::{ChatLine, ChatParty};
use crate::error::{ClientFault, EventError, SessionError};
use crate::event::{GameEnded, MatchAssignment, MatchSummary, ServerEvent};
use crate::identity::PlayerId;
use crate::position::Position;
use crate::session::{MatchId, MatchPhase, MatchSession, Outcome};
use crate::side::Side;
use crate::utc_time::UtcDateTime;


#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NotableEvent {
    // A match has been established: we are either waiting for an opponent or already playing.
    MatchStarted,
    OpponentJoined,
    OpponentMoved,
    MyMoveConfirmed,
    MatchEnded {
        outcome: Outcome,
        reason: String,
        local_win: bool,
    },
    // Local observation only. The match goes on until the server says otherwise.
    TimeoutCandidate(Side),
    Chat(ChatLine),
    MatchListUpdated,
    Info(String),
    Fault(ClientFault),
}

// Things the reconciler needs to know about the local player.
#[derive(Clone, Copy, Debug)]
pub struct ReconcileContext<'a> {
    pub me: &'a PlayerId,
    pub wall_now: UtcDateTime,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ReconcileStats {
    pub applied: u64,
    pub foreign_discarded: u64,
    pub session_errors: u64,
    pub event_errors: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    tracked: Option<MatchId>,
    session: Option<MatchSession>,
    lobby: Vec<MatchSummary>,
    stats: ReconcileStats,
}

enum Rejection {
    Session(SessionError),
    Event(EventError),
}

impl From<SessionError> for Rejection {
    fn from(err: SessionError) -> Self { Rejection::Session(err) }
}

impl From<EventError> for Rejection {
    fn from(err: EventError) -> Self { Rejection::Event(err) }
}

impl Reconciler {
    pub fn new() -> Self { Self::default() }

    pub fn tracked(&self) -> Option<&MatchId> { self.tracked.as_ref() }
    pub fn session(&self) -> Option<&MatchSession> { self.session.as_ref() }
    pub fn session_mut(&mut self) -> Option<&mut MatchSession> { self.session.as_mut() }
    pub fn lobby(&self) -> &[MatchSummary] { &self.lobby }
    pub fn stats(&self) -> ReconcileStats { self.stats }

    // Declares which match the front end is showing. Anything known about another match is
    // dropped.
    pub fn track(&mut self, match_id: MatchId) {
        if self.tracked.as_ref() == Some(&match_id) {
            return;
        }
        info!("Tracking match {match_id}");
        self.session = None;
        self.tracked = Some(match_id);
    }

    pub fn abandon(&mut self) {
        if let Some(match_id) = self.tracked.take() {
            info!("Abandoning match {match_id}");
        }
        self.session = None;
    }

    pub fn apply(
        &mut self, event: ServerEvent, ctx: ReconcileContext, now: Instant,
    ) -> Vec<NotableEvent> {
        if !self.accepts(&event) {
            self.stats.foreign_discarded += 1;
            return vec![];
        }
        let event_name = event.type_name();
        match self.dispatch(event, ctx, now) {
            Ok(notable) => {
                self.stats.applied += 1;
                notable
            }
            Err(Rejection::Session(err)) => {
                warn!("Ignoring {event_name}: {err}");
                self.stats.session_errors += 1;
                vec![]
            }
            Err(Rejection::Event(err)) => {
                warn!("Ignoring {event_name}: {err}");
                self.stats.event_errors += 1;
                vec![]
            }
        }
    }

    pub fn tick(&mut self, now: Instant) -> Vec<NotableEvent> {
        let Some(session) = self.session.as_mut() else {
            return vec![];
        };
        session.apply_clock_tick(now).map(NotableEvent::TimeoutCandidate).into_iter().collect()
    }

    // Match filter. Starts tracking on the first state-establishing envelope if nothing is
    // tracked yet.
    fn accepts(&mut self, event: &ServerEvent) -> bool {
        let Some(event_match) = event.match_id() else {
            return true;
        };
        match &self.tracked {
            Some(tracked) if tracked == event_match => true,
            Some(tracked) => {
                debug!(
                    "Discarding {} for match {}: tracking {}",
                    event.type_name(),
                    event_match,
                    tracked
                );
                false
            }
            None if event.assignment().is_some() => {
                info!("Tracking match {event_match}");
                self.tracked = Some(event_match.clone());
                true
            }
            None => {
                let name = event.type_name();
                debug!("Discarding {name} for match {event_match}: no match tracked");
                false
            }
        }
    }

    fn dispatch(
        &mut self, event: ServerEvent, ctx: ReconcileContext, now: Instant,
    ) -> Result<Vec<NotableEvent>, Rejection> {
        use ServerEvent::*;
        match event {
            Created(assignment)
            | Joined(assignment)
            | Paired(assignment)
            | MatchState { assignment } => self.apply_assignment(assignment, now),
            Move { position, move_seq, .. } => self.apply_move(position, move_seq, now),
            ServerEvent::GameEnded(ended) => self.apply_end(ended, ctx, now),
            Chat { sender, message, .. } => {
                let opponent = self.session.as_ref().and_then(|s| s.opponent());
                let line = ChatLine {
                    sender: ChatParty::classify(&sender, ctx.me, opponent),
                    text: message,
                    time: ctx.wall_now,
                };
                Ok(vec![NotableEvent::Chat(line)])
            }
            Error { message } => {
                if let Some(session) = self.session.as_mut() {
                    session.clear_pending_actions();
                }
                Ok(vec![NotableEvent::Fault(ClientFault::ServerError(message))])
            }
            MatchList { matches } => {
                self.lobby = matches;
                Ok(vec![NotableEvent::MatchListUpdated])
            }
            Pairing { message } => Ok(vec![NotableEvent::Info(message)]),
        }
    }

    fn apply_assignment(
        &mut self, assignment: MatchAssignment, now: Instant,
    ) -> Result<Vec<NotableEvent>, Rejection> {
        let session = self.session.get_or_insert_with(MatchSession::new);
        let prev_phase = session.phase();
        // The creator learns about the opponent from a repeated assignment.
        if prev_phase == MatchPhase::AwaitingOpponent && assignment.opponent.is_some() {
            let snapshot = assignment.to_snapshot();
            session.check_snapshot(&snapshot)?;
            if let Some(opponent) = snapshot.opponent {
                let joined = session.opponent_joined(opponent, now)?;
                return Ok(if joined { vec![NotableEvent::OpponentJoined] } else { vec![] });
            }
        }
        session.initialize(assignment.to_snapshot(), now)?;
        Ok(match (prev_phase, session.phase()) {
            (MatchPhase::Uninitialized, _) => vec![NotableEvent::MatchStarted],
            (MatchPhase::AwaitingOpponent, MatchPhase::Active) => {
                vec![NotableEvent::OpponentJoined]
            }
            _ => vec![],
        })
    }

    fn apply_move(
        &mut self, position: Position, move_seq: Option<u64>, now: Instant,
    ) -> Result<Vec<NotableEvent>, Rejection> {
        let session = self.session_for("apply move")?;
        // Without numbering, a repeated position is the only duplicate we can recognize.
        let move_seq = match move_seq {
            Some(seq) => seq,
            None if position == *session.position() => session.move_seq(),
            None => session.move_seq().checked_add(1).ok_or(SessionError::StaleMove {
                received: session.move_seq(),
                current: session.move_seq(),
            })?,
        };
        let applied = session.apply_move(position, move_seq, now)?;
        Ok(vec![if Some(applied.mover) == session.local_side() {
            if !applied.matched_prediction {
                debug!("Server position differs from the local prediction");
            }
            NotableEvent::MyMoveConfirmed
        } else {
            NotableEvent::OpponentMoved
        }])
    }

    fn apply_end(
        &mut self, ended: GameEnded, ctx: ReconcileContext, now: Instant,
    ) -> Result<Vec<NotableEvent>, Rejection> {
        let session = self.session_for("record result")?;
        let Some(local_side) = session.local_side() else {
            return Err(SessionError::IllegalTransition {
                from: session.phase(),
                operation: "record result",
            }
            .into());
        };
        let outcome = ended.outcome(local_side, ctx.me, session.opponent())?;
        let reason = ended.reason;
        if !session.apply_end(outcome, reason.clone(), now)? {
            debug!("Duplicate result: {outcome:?} ({reason})");
            return Ok(vec![]);
        }
        Ok(vec![NotableEvent::MatchEnded {
            outcome,
            reason,
            local_win: session.is_local_winner(),
        }])
    }

    fn session_for(&mut self, operation: &'static str) -> Result<&mut MatchSession, SessionError> {
        self.session.as_mut().ok_or(SessionError::IllegalTransition {
            from: MatchPhase::Uninitialized,
            operation,
        })
    }
}
