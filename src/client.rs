use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Duration;

use instant::Instant;
use log::info;

use crate::chat::{ChatHistory, prepare_outgoing_text};
use crate::coord::Square;
use crate::error::{ClientFault, CommandError};
use crate::event::{ClientEvent, MatchSummary, ServerEvent, Wager};
use crate::identity::PlayerId;
use crate::reconcile::{NotableEvent, ReconcileContext, Reconciler};
use crate::rules_engine::{MoveRequest, RulesEngine};
use crate::session::{ActionKind, MatchId, MatchPhase, MatchSession};
use crate::side::SideChoice;
use crate::utc_time::UtcDateTime;


// A piece picked by the user, together with the squares it can go to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Selection {
    pub from: Square,
    pub destinations: Vec<Square>,
}

// Front-end independent client logic. Turns user intents into outgoing events and incoming events
// into state updates plus a queue of `NotableEvent`s for the front end to react to.
pub struct ClientState {
    me: PlayerId,
    events_tx: mpsc::Sender<ClientEvent>,
    rules: Box<dyn RulesEngine>,
    reconciler: Reconciler,
    selection: Option<Selection>,
    chat: ChatHistory,
    waiting_since: Option<Instant>,
    notable_event_queue: VecDeque<NotableEvent>,
}

impl ClientState {
    pub fn new(
        me: PlayerId, events_tx: mpsc::Sender<ClientEvent>, rules: Box<dyn RulesEngine>,
    ) -> Self {
        ClientState {
            me,
            events_tx,
            rules,
            reconciler: Reconciler::new(),
            selection: None,
            chat: ChatHistory::new(),
            waiting_since: None,
            notable_event_queue: VecDeque::new(),
        }
    }

    pub fn me(&self) -> &PlayerId { &self.me }
    pub fn reconciler(&self) -> &Reconciler { &self.reconciler }
    pub fn session(&self) -> Option<&MatchSession> { self.reconciler.session() }
    pub fn tracked_match(&self) -> Option<&MatchId> { self.reconciler.tracked() }
    pub fn lobby(&self) -> &[MatchSummary] { self.reconciler.lobby() }
    pub fn selection(&self) -> Option<&Selection> { self.selection.as_ref() }
    pub fn chat(&self) -> &ChatHistory { &self.chat }
    pub fn waiting_since(&self) -> Option<Instant> { self.waiting_since }

    // The reply is a new match, so whatever is on screen now is left behind.
    pub fn create_match(
        &mut self, side: SideChoice, duration: Duration, category: String, wager: Option<Wager>,
    ) -> Result<(), CommandError> {
        self.abandon();
        self.send(ClientEvent::Create {
            player: self.me.clone(),
            side,
            duration,
            category,
            betting: wager,
        })
    }

    pub fn pair(&mut self, side: SideChoice) -> Result<(), CommandError> {
        self.abandon();
        self.send(ClientEvent::PairRequest { player: self.me.clone(), side })
    }

    pub fn list_matches(&mut self) -> Result<(), CommandError> {
        self.send(ClientEvent::ListMatches)
    }

    pub fn join(&mut self, match_id: MatchId) -> Result<(), CommandError> {
        self.track(match_id.clone());
        self.send(ClientEvent::Join { match_id, player: self.me.clone() })
    }

    // Also used to resync after a reconnection.
    pub fn request_state(&mut self, match_id: MatchId) -> Result<(), CommandError> {
        self.track(match_id.clone());
        self.send(ClientEvent::StateMatch { match_id })
    }

    // Click semantics: pick an own piece to see where it can go, pick it again to put it back,
    // pick a destination to move.
    pub fn select_square(&mut self, sq: Square) -> Result<(), CommandError> {
        let session = self.reconciler.session().ok_or(CommandError::NoMatch)?;
        if !session.can_move_locally() {
            self.selection = None;
            return Err(if session.phase() != MatchPhase::Active {
                CommandError::NoMatch
            } else if session.pending_move().is_some() {
                CommandError::AwaitingConfirmation
            } else {
                CommandError::NotYourTurn
            });
        }
        let position = session.displayed_position();
        let own_piece = position.piece_at(sq).is_some_and(|p| Some(p.side) == session.local_side());
        match self.selection.take() {
            Some(selection) if selection.from == sq => Ok(()),
            _ if own_piece => {
                let destinations = self.rules.legal_destinations(position, sq);
                self.selection = Some(Selection { from: sq, destinations });
                Ok(())
            }
            Some(selection) => {
                let from = selection.from;
                let ret = self.confirm_move(from, sq);
                if ret.is_err() {
                    self.selection = Some(selection);
                }
                ret
            }
            None => Ok(()),
        }
    }

    pub fn confirm_move(&mut self, from: Square, to: Square) -> Result<(), CommandError> {
        let session = self.reconciler.session_mut().ok_or(CommandError::NoMatch)?;
        let match_id = session.match_id().cloned().ok_or(CommandError::NoMatch)?;
        let request = MoveRequest::new(from, to);
        let predicted = session.propose_move(request, self.rules.as_ref())?.predicted.clone();
        let event = ClientEvent::Move {
            match_id,
            player: self.me.clone(),
            move_notation: request.to_coordinate_notation(),
            resulting_position: predicted,
            client_time: UtcDateTime::now().unix_millis(),
        };
        if self.events_tx.send(event).is_err() {
            session.discard_pending_move();
            return Err(CommandError::Disconnected);
        }
        self.selection = None;
        Ok(())
    }

    pub fn resign(&mut self) -> Result<(), CommandError> { self.request_action(ActionKind::Resign) }
    pub fn offer_draw(&mut self) -> Result<(), CommandError> {
        self.request_action(ActionKind::OfferDraw)
    }
    pub fn claim_checkmate(&mut self) -> Result<(), CommandError> {
        self.request_action(ActionKind::ClaimCheckmate)
    }

    // Blank messages are silently ignored.
    pub fn send_chat(&mut self, text: &str) -> Result<(), CommandError> {
        let Some(message) = prepare_outgoing_text(text) else {
            return Ok(());
        };
        let match_id = self.reconciler.tracked().cloned().ok_or(CommandError::NoMatch)?;
        self.send(ClientEvent::Chat { match_id, player: self.me.clone(), message })
    }

    pub fn process_server_event(&mut self, event: ServerEvent, now: Instant) {
        let ctx = ReconcileContext { me: &self.me, wall_now: UtcDateTime::now() };
        let notable = self.reconciler.apply(event, ctx, now);
        for event in notable {
            match &event {
                NotableEvent::MatchStarted => {
                    self.chat.clear();
                    self.selection = None;
                    self.waiting_since = self
                        .session()
                        .is_some_and(|s| s.phase() == MatchPhase::AwaitingOpponent)
                        .then_some(now);
                }
                NotableEvent::OpponentJoined => self.waiting_since = None,
                NotableEvent::OpponentMoved | NotableEvent::MatchEnded { .. } => {
                    self.selection = None;
                }
                NotableEvent::Chat(line) => self.chat.add(line.clone()),
                NotableEvent::MyMoveConfirmed
                | NotableEvent::TimeoutCandidate(_)
                | NotableEvent::MatchListUpdated
                | NotableEvent::Info(_)
                | NotableEvent::Fault(_) => {}
            }
            self.notable_event_queue.push_back(event);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let notable = self.reconciler.tick(now);
        self.notable_event_queue.extend(notable);
    }

    pub fn transport_fault(&mut self, message: String) {
        self.notable_event_queue
            .push_back(NotableEvent::Fault(ClientFault::TransportFault(message)));
    }

    // Leaves the current match view. Nothing that was in flight is retried.
    pub fn abandon(&mut self) {
        self.reconciler.abandon();
        self.selection = None;
        self.waiting_since = None;
        self.chat.clear();
    }

    pub fn next_notable_event(&mut self) -> Option<NotableEvent> {
        self.notable_event_queue.pop_front()
    }

    fn track(&mut self, match_id: MatchId) {
        if self.reconciler.tracked() != Some(&match_id) {
            self.selection = None;
            self.waiting_since = None;
            self.chat.clear();
        }
        self.reconciler.track(match_id);
    }

    fn request_action(&mut self, kind: ActionKind) -> Result<(), CommandError> {
        let session = self.reconciler.session_mut().ok_or(CommandError::NoMatch)?;
        let intent = session.request_action(kind).map_err(CommandError::NotAllowed)?;
        info!("Requesting {:?} in match {}", kind, intent.match_id);
        let match_id = intent.match_id;
        let player = self.me.clone();
        self.send(match kind {
            ActionKind::Resign => ClientEvent::Resign { match_id, player },
            ActionKind::OfferDraw => ClientEvent::OfferDraw { match_id, player },
            ActionKind::ClaimCheckmate => ClientEvent::ClaimCheckmate { match_id, player },
        })
    }

    fn send(&self, event: ClientEvent) -> Result<(), CommandError> {
        self.events_tx.send(event).map_err(|_| CommandError::Disconnected)
    }
}
