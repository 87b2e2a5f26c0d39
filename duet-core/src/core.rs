//! Host-driven API: DuetCore receives events and commands from the host, returns actions.

use tracing::{debug, warn};

use crate::ids::{MediaHandle, ParticipantId, PeerHandle, SessionId};
use crate::invite::{InviteCoordinator, InviteError};
use crate::peer::{PeerEvent, PeerLifecycle, PeerRoute, RemoteStream};
use crate::protocol::{Invite, RelayEvent, SignalData};
use crate::roster::Roster;
use crate::session::{EndReason, Role, Session, SessionMachine, SessionState};
use crate::signaling;

/// Default number of ended session ids remembered to refuse late rejoins.
pub const DEFAULT_ENDED_SESSION_MEMORY: usize = 32;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub ended_session_memory: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ended_session_memory: DEFAULT_ENDED_SESSION_MEMORY,
        }
    }
}

/// Everything that can happen to the core besides local commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Relay(RelayEvent),
    Peer { handle: PeerHandle, event: PeerEvent },
    MediaAcquired { session_id: SessionId, media: MediaHandle },
    MediaFailed { session_id: SessionId, reason: String },
}

/// Work for the host, in the order it must be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Relay(RelayEvent),
    AcquireMedia { session_id: SessionId },
    ReleaseMedia(MediaHandle),
    CreatePeer {
        handle: PeerHandle,
        initiator: bool,
        media: MediaHandle,
    },
    SignalPeer { handle: PeerHandle, data: SignalData },
    DestroyPeer(PeerHandle),
    AttachRemoteStream {
        session_id: SessionId,
        stream: RemoteStream,
    },
    Notify(Notice),
}

/// Things the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    RosterChanged,
    InviteReceived(Invite),
    InviteAccepted { by: ParticipantId },
    SessionStarted {
        session_id: SessionId,
        role: Role,
        remote: ParticipantId,
    },
    Connected { session_id: SessionId },
    SessionEnded {
        session_id: SessionId,
        reason: EndReason,
    },
}

/// Main coordinator for one relay-connected participant.
pub struct DuetCore {
    me: ParticipantId,
    display_name: String,
    roster: Roster,
    invites: InviteCoordinator,
    session: SessionMachine,
    peers: PeerLifecycle,
}

impl DuetCore {
    pub fn new(me: ParticipantId, display_name: impl Into<String>) -> Self {
        Self::with_config(me, display_name, CoreConfig::default())
    }

    pub fn with_config(
        me: ParticipantId,
        display_name: impl Into<String>,
        config: CoreConfig,
    ) -> Self {
        Self {
            me,
            display_name: display_name.into(),
            roster: Roster::new(),
            invites: InviteCoordinator::new(),
            session: SessionMachine::new(config.ended_session_memory),
            peers: PeerLifecycle::new(),
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.me
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.current()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn pending_invites(&self) -> &[Invite] {
        self.invites.pending()
    }

    /// Invite `receiver`. Delivery is the relay's concern; no session state changes.
    pub fn send_invite(&mut self, receiver: ParticipantId) -> Vec<Action> {
        if !self.roster.is_reachable(&receiver) {
            warn!(%receiver, "inviting a participant not present in the roster");
        }
        let mut actions = Vec::new();
        self.invites
            .send_invite(&self.me, receiver, &self.display_name, &mut actions);
        actions
    }

    /// Accept the pending invite from `sender`. This side mints the id and becomes the Initiator.
    pub fn accept_invite(&mut self, sender: &ParticipantId) -> Result<Vec<Action>, InviteError> {
        let mut actions = Vec::new();
        let id = self
            .invites
            .accept(&self.me, sender, self.session.is_active(), &mut actions)?;
        self.session
            .join(id, Role::Initiator, sender.clone(), &mut actions)
            .map_err(|_| InviteError::SessionActive)?;
        Ok(actions)
    }

    pub fn decline_invite(&mut self, sender: &ParticipantId) -> Result<(), InviteError> {
        self.invites.decline(sender).map(|invite| {
            debug!(sender = %invite.sender, "invite declined");
        })
    }

    /// Leave the current session from any state. No-op when idle.
    pub fn leave(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self
            .session
            .teardown(EndReason::LocalLeave, &mut self.peers, &mut actions)
        {
            debug!("leave while idle");
        }
        actions
    }

    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();
        match event {
            Event::Relay(ev) => self.on_relay_event(ev, &mut actions),
            Event::Peer { handle, event } => self.on_peer_event(handle, event, &mut actions),
            Event::MediaAcquired { session_id, media } => {
                self.session
                    .on_media_acquired(session_id, media, &mut self.peers, &mut actions);
            }
            Event::MediaFailed { session_id, reason } => {
                self.session
                    .on_media_failed(session_id, reason, &mut self.peers, &mut actions);
            }
        }
        actions
    }

    fn on_relay_event(&mut self, ev: RelayEvent, actions: &mut Vec<Action>) {
        match ev {
            RelayEvent::SendInvite(invite) => {
                if self.invites.on_invite_received(&self.me, invite.clone()) {
                    actions.push(Action::Notify(Notice::InviteReceived(invite)));
                }
            }
            RelayEvent::AcceptInvite { sender, receiver } => {
                if receiver == self.me && self.invites.is_outgoing(&sender) {
                    actions.push(Action::Notify(Notice::InviteAccepted { by: sender }));
                } else {
                    debug!(%sender, %receiver, "unexpected accept discarded");
                }
            }
            RelayEvent::SendSessionId {
                id,
                sender,
                receiver,
            } => self.on_session_id(id, sender, receiver, actions),
            RelayEvent::Offer(msg) => match self.session.current_mut() {
                Some(session) => signaling::on_offer(session, msg, &mut self.peers, actions),
                None => debug!(session = %msg.session_id, "offer while idle discarded"),
            },
            RelayEvent::Answer(msg) => match self.session.current_mut() {
                Some(session) => signaling::on_answer(session, msg, actions),
                None => debug!(session = %msg.session_id, "answer while idle discarded"),
            },
            RelayEvent::LeaveSession(id) => {
                if self.session.current().map(|s| s.id()) == Some(id) {
                    self.session
                        .teardown(EndReason::RemoteLeave, &mut self.peers, actions);
                } else {
                    debug!(session = %id, "leave for another session discarded");
                }
            }
            RelayEvent::Roster(entries) => {
                self.roster.apply(entries);
                self.invites
                    .prune_outgoing(|p| self.roster.is_reachable(p));
                actions.push(Action::Notify(Notice::RosterChanged));
            }
            RelayEvent::SessionJoin(id) => {
                debug!(session = %id, "join notice is hub-bound; ignored");
            }
        }
    }

    /// The acceptor sent the id of the session we asked for. We join as Responder.
    fn on_session_id(
        &mut self,
        id: SessionId,
        sender: ParticipantId,
        receiver: ParticipantId,
        actions: &mut Vec<Action>,
    ) {
        if receiver != self.me {
            debug!(session = %id, %receiver, "session id for someone else discarded");
            return;
        }
        if self.session.current().map(|s| s.id()) == Some(id) || self.session.has_ended(&id) {
            debug!(session = %id, "duplicate session id discarded");
            return;
        }
        if !self.invites.on_session_id(&sender) {
            return;
        }
        if let Err(e) = self
            .session
            .join(id, Role::Responder, sender.clone(), actions)
        {
            warn!(session = %id, %sender, error = %e, "refusing session id");
            actions.push(Action::Relay(RelayEvent::LeaveSession(id)));
        }
    }

    fn on_peer_event(&mut self, handle: PeerHandle, event: PeerEvent, actions: &mut Vec<Action>) {
        let Some(route) = self.peers.route(handle, event) else {
            return;
        };
        match route {
            PeerRoute::Signal(data) => {
                if let Some(session) = self.session.current_mut() {
                    signaling::on_local_signal(session, data, actions);
                }
            }
            PeerRoute::Connected(stream) => self.session.on_remote_stream(stream, actions),
            PeerRoute::Teardown(reason) => {
                if let EndReason::PeerError(err) = &reason {
                    warn!(%handle, error = %err, "peer connection failed");
                }
                if !self.session.teardown(reason, &mut self.peers, actions) {
                    self.peers.destroy(handle, actions);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RosterEntry, SignalingMessage};

    /// Two participants wired through an in-memory relay. Peer and media are simulated.
    struct Pair {
        a: DuetCore,
        b: DuetCore,
        relayed: Vec<RelayEvent>,
        next_media: u64,
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum Side {
        A,
        B,
    }

    impl Pair {
        fn new() -> Self {
            Self {
                a: DuetCore::new("sock-a".into(), "Ann"),
                b: DuetCore::new("sock-b".into(), "Bob"),
                relayed: Vec::new(),
                next_media: 0,
            }
        }

        fn core(&mut self, side: Side) -> &mut DuetCore {
            match side {
                Side::A => &mut self.a,
                Side::B => &mut self.b,
            }
        }

        /// Deliver relay output of `from` to the other side; answer media requests at once.
        /// Returns the non-relay actions of every step, per side, for inspection.
        fn run(&mut self, from: Side, actions: Vec<Action>) -> Vec<(Side, Action)> {
            let mut queue: Vec<(Side, Action)> = actions.into_iter().map(|a| (from, a)).collect();
            let mut seen = Vec::new();
            while !queue.is_empty() {
                let (side, action) = queue.remove(0);
                match &action {
                    Action::Relay(ev) => {
                        self.relayed.push(ev.clone());
                        let to = match side {
                            Side::A => Side::B,
                            Side::B => Side::A,
                        };
                        if matches!(ev, RelayEvent::SessionJoin(_)) {
                            continue;
                        }
                        let out = self.core(to).handle(Event::Relay(ev.clone()));
                        queue.extend(out.into_iter().map(|a| (to, a)));
                    }
                    Action::AcquireMedia { session_id } => {
                        self.next_media += 1;
                        let media = MediaHandle(self.next_media);
                        let out = self.core(side).handle(Event::MediaAcquired {
                            session_id: *session_id,
                            media,
                        });
                        queue.extend(out.into_iter().map(|a| (side, a)));
                    }
                    _ => {}
                }
                seen.push((side, action));
            }
            seen
        }

        fn peer_event(&mut self, side: Side, handle: PeerHandle, event: PeerEvent) -> Vec<(Side, Action)> {
            let out = self.core(side).handle(Event::Peer { handle, event });
            self.run(side, out)
        }

        fn offers(&self) -> usize {
            self.relayed
                .iter()
                .filter(|e| matches!(e, RelayEvent::Offer(_)))
                .count()
        }

        fn answers(&self) -> usize {
            self.relayed
                .iter()
                .filter(|e| matches!(e, RelayEvent::Answer(_)))
                .count()
        }
    }

    fn created_peer(seen: &[(Side, Action)], side: Side) -> Option<(PeerHandle, bool)> {
        seen.iter().find_map(|(s, a)| match a {
            Action::CreatePeer {
                handle, initiator, ..
            } if *s == side => Some((*handle, *initiator)),
            _ => None,
        })
    }

    fn sdp(kind: &str) -> SignalData {
        SignalData(format!(r#"{{"type":"{kind}","sdp":"v=0"}}"#))
    }

    /// A invites B, B accepts. Returns the session id and the peer handles (B initiator, A responder)
    /// after the Offer reached A.
    fn negotiate(pair: &mut Pair) -> (SessionId, PeerHandle, PeerHandle) {
        let out = pair.a.send_invite("sock-b".into());
        pair.run(Side::A, out);
        assert_eq!(pair.b.pending_invites().len(), 1);

        let out = pair.b.accept_invite(&"sock-a".into()).unwrap();
        let seen = pair.run(Side::B, out);
        let id = pair.b.session().unwrap().id();
        assert_eq!(pair.a.session().unwrap().id(), id);
        assert_eq!(pair.b.session().unwrap().role(), Role::Initiator);
        assert_eq!(pair.a.session().unwrap().role(), Role::Responder);
        assert_eq!(pair.a.state(), SessionState::Negotiating);

        let (b_peer, b_init) = created_peer(&seen, Side::B).expect("initiator peer");
        assert!(b_init);
        assert!(created_peer(&seen, Side::A).is_none());

        let seen = pair.peer_event(Side::B, b_peer, PeerEvent::Signal(sdp("offer")));
        let (a_peer, a_init) = created_peer(&seen, Side::A).expect("responder peer");
        assert!(!a_init);
        assert!(seen.iter().any(|(s, a)| *s == Side::A
            && matches!(a, Action::SignalPeer { handle, data } if *handle == a_peer && *data == sdp("offer"))));
        (id, b_peer, a_peer)
    }

    fn connect(pair: &mut Pair) -> (SessionId, PeerHandle, PeerHandle) {
        let (id, b_peer, a_peer) = negotiate(pair);
        let seen = pair.peer_event(Side::A, a_peer, PeerEvent::Signal(sdp("answer")));
        assert!(seen.iter().any(|(s, a)| *s == Side::B
            && matches!(a, Action::SignalPeer { handle, .. } if *handle == b_peer)));
        pair.peer_event(Side::A, a_peer, PeerEvent::Stream(RemoteStream("b-cam".into())));
        pair.peer_event(Side::B, b_peer, PeerEvent::Stream(RemoteStream("a-cam".into())));
        (id, b_peer, a_peer)
    }

    #[test]
    fn invite_accept_offer_answer_reaches_connected() {
        let mut pair = Pair::new();
        connect(&mut pair);
        assert_eq!(pair.a.state(), SessionState::Connected);
        assert_eq!(pair.b.state(), SessionState::Connected);
        assert_eq!(pair.offers(), 1);
        assert_eq!(pair.answers(), 1);
    }

    #[test]
    fn offer_sent_once_regardless_of_signal_events() {
        let mut pair = Pair::new();
        let (_, b_peer, a_peer) = negotiate(&mut pair);
        pair.peer_event(Side::B, b_peer, PeerEvent::Signal(sdp("offer")));
        pair.peer_event(Side::B, b_peer, PeerEvent::Signal(sdp("offer")));
        pair.peer_event(Side::A, a_peer, PeerEvent::Signal(sdp("answer")));
        pair.peer_event(Side::B, b_peer, PeerEvent::Signal(sdp("offer")));
        assert_eq!(pair.offers(), 1);
        assert_eq!(pair.answers(), 1);
        assert!(pair.b.session().unwrap().signaling().answered());
    }

    #[test]
    fn duplicate_answer_has_no_effect() {
        let mut pair = Pair::new();
        let (id, _, a_peer) = negotiate(&mut pair);
        pair.peer_event(Side::A, a_peer, PeerEvent::Signal(sdp("answer")));
        let dup = RelayEvent::Answer(SignalingMessage {
            data: sdp("answer"),
            session_id: id,
        });
        assert!(pair.b.handle(Event::Relay(dup.clone())).is_empty());
        assert!(pair.b.handle(Event::Relay(dup)).is_empty());
        assert_eq!(pair.b.state(), SessionState::Negotiating);
    }

    #[test]
    fn duplicate_offer_creates_no_second_connection() {
        let mut pair = Pair::new();
        let (id, _, _) = negotiate(&mut pair);
        let dup = RelayEvent::Offer(SignalingMessage {
            data: sdp("offer"),
            session_id: id,
        });
        assert!(pair.a.handle(Event::Relay(dup)).is_empty());
    }

    #[test]
    fn mismatched_session_id_rejected() {
        let mut pair = Pair::new();
        negotiate(&mut pair);
        let stray = RelayEvent::Answer(SignalingMessage {
            data: sdp("answer"),
            session_id: SessionId::generate(),
        });
        assert!(pair.b.handle(Event::Relay(stray)).is_empty());
        assert!(!pair.b.session().unwrap().signaling().answered());
    }

    #[test]
    fn accept_while_active_is_rejected_and_state_unchanged() {
        let mut pair = Pair::new();
        let (id, _, _) = connect(&mut pair);
        let third = Invite {
            sender: "sock-c".into(),
            receiver: "sock-b".into(),
            display_name: "Cy".into(),
        };
        pair.b.handle(Event::Relay(RelayEvent::SendInvite(third)));
        assert_eq!(
            pair.b.accept_invite(&"sock-c".into()),
            Err(InviteError::SessionActive)
        );
        let s = pair.b.session().unwrap();
        assert_eq!(s.id(), id);
        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(pair.b.pending_invites().len(), 1);
    }

    #[test]
    fn leave_during_media_acquisition_releases_late_media() {
        let mut core = DuetCore::new("sock-b".into(), "Bob");
        core.handle(Event::Relay(RelayEvent::SendInvite(Invite {
            sender: "sock-a".into(),
            receiver: "sock-b".into(),
            display_name: "Ann".into(),
        })));
        let actions = core.accept_invite(&"sock-a".into()).unwrap();
        let id = match actions.iter().find(|a| matches!(a, Action::AcquireMedia { .. })) {
            Some(Action::AcquireMedia { session_id }) => *session_id,
            _ => panic!("expected media request"),
        };
        assert_eq!(core.state(), SessionState::AwaitingMedia);

        let left = core.leave();
        assert_eq!(core.state(), SessionState::Idle);
        assert!(left.contains(&Action::Relay(RelayEvent::LeaveSession(id))));

        let late = core.handle(Event::MediaAcquired {
            session_id: id,
            media: MediaHandle(9),
        });
        assert_eq!(late, vec![Action::ReleaseMedia(MediaHandle(9))]);
        assert_eq!(core.state(), SessionState::Idle);
    }

    #[test]
    fn leave_during_negotiation_releases_media_and_peer() {
        let mut pair = Pair::new();
        let (id, b_peer, _) = negotiate(&mut pair);
        assert_eq!(pair.b.state(), SessionState::Negotiating);
        let media = pair.b.session().unwrap().media().unwrap();
        let out = pair.b.leave();
        assert_eq!(pair.b.state(), SessionState::Idle);
        assert_eq!(out[0], Action::Relay(RelayEvent::LeaveSession(id)));
        assert!(out.contains(&Action::ReleaseMedia(media)));
        assert!(out.contains(&Action::DestroyPeer(b_peer)));
        assert!(matches!(
            out.last(),
            Some(Action::Notify(Notice::SessionEnded {
                reason: EndReason::LocalLeave,
                ..
            }))
        ));
    }

    #[test]
    fn late_offer_after_idle_is_discarded() {
        let mut pair = Pair::new();
        let (id, _, _) = connect(&mut pair);
        pair.a.leave();
        let late = RelayEvent::Offer(SignalingMessage {
            data: sdp("offer"),
            session_id: id,
        });
        assert!(pair.a.handle(Event::Relay(late)).is_empty());
        assert_eq!(pair.a.state(), SessionState::Idle);
    }

    #[test]
    fn leave_while_connected_tears_down_remote_without_echo() {
        let mut pair = Pair::new();
        let (id, b_peer, a_peer) = connect(&mut pair);
        let out = pair.b.leave();
        assert_eq!(out[0], Action::Relay(RelayEvent::LeaveSession(id)));
        assert!(out.contains(&Action::DestroyPeer(b_peer)));
        let before = pair.relayed.len();
        let seen = pair.run(Side::B, out);
        assert_eq!(pair.a.state(), SessionState::Idle);
        assert_eq!(pair.b.state(), SessionState::Idle);
        assert_eq!(pair.relayed.len(), before + 1);
        assert!(seen
            .iter()
            .any(|(s, a)| *s == Side::A && *a == Action::DestroyPeer(a_peer)));
        assert!(seen.iter().any(|(s, a)| *s == Side::A
            && matches!(a, Action::ReleaseMedia(_))));
    }

    #[test]
    fn peer_error_resets_to_idle_without_retry() {
        let mut pair = Pair::new();
        let (_, b_peer, _) = negotiate(&mut pair);
        let seen = pair.peer_event(Side::B, b_peer, PeerEvent::Error("ice failed".into()));
        assert_eq!(pair.b.state(), SessionState::Idle);
        assert!(created_peer(&seen, Side::B).is_none());
        assert!(seen.iter().any(|(_, a)| matches!(
            a,
            Action::Notify(Notice::SessionEnded {
                reason: EndReason::PeerError(_),
                ..
            })
        )));
        // Late close from the destroyed connection changes nothing.
        assert!(pair
            .b
            .handle(Event::Peer {
                handle: b_peer,
                event: PeerEvent::Close
            })
            .is_empty());
    }

    #[test]
    fn offer_during_media_acquisition_is_buffered() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        core.send_invite("sock-b".into());
        let id = SessionId::generate();
        let actions = core.handle(Event::Relay(RelayEvent::SendSessionId {
            id,
            sender: "sock-b".into(),
            receiver: "sock-a".into(),
        }));
        assert!(actions.contains(&Action::AcquireMedia { session_id: id }));

        let early = core.handle(Event::Relay(RelayEvent::Offer(SignalingMessage {
            data: sdp("offer"),
            session_id: id,
        })));
        assert!(early.is_empty());

        let actions = core.handle(Event::MediaAcquired {
            session_id: id,
            media: MediaHandle(1),
        });
        let handle = match &actions[1] {
            Action::CreatePeer {
                handle,
                initiator: false,
                ..
            } => *handle,
            other => panic!("expected responder peer, got {other:?}"),
        };
        assert_eq!(
            actions[2],
            Action::SignalPeer {
                handle,
                data: sdp("offer")
            }
        );
    }

    #[test]
    fn session_id_without_invite_is_ignored() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        let actions = core.handle(Event::Relay(RelayEvent::SendSessionId {
            id: SessionId::generate(),
            sender: "sock-z".into(),
            receiver: "sock-a".into(),
        }));
        assert!(actions.is_empty());
        assert_eq!(core.state(), SessionState::Idle);
    }

    #[test]
    fn session_id_while_busy_is_refused_with_leave() {
        let mut pair = Pair::new();
        connect(&mut pair);
        pair.a.send_invite("sock-c".into());
        let other = SessionId::generate();
        let actions = pair.a.handle(Event::Relay(RelayEvent::SendSessionId {
            id: other,
            sender: "sock-c".into(),
            receiver: "sock-a".into(),
        }));
        assert_eq!(actions, vec![Action::Relay(RelayEvent::LeaveSession(other))]);
        assert_eq!(pair.a.state(), SessionState::Connected);
    }

    #[test]
    fn roster_update_is_applied() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        let actions = core.handle(Event::Relay(RelayEvent::Roster(vec![
            RosterEntry {
                participant: "sock-a".into(),
                present: true,
            },
            RosterEntry {
                participant: "sock-b".into(),
                present: true,
            },
        ])));
        assert_eq!(actions, vec![Action::Notify(Notice::RosterChanged)]);
        let me = core.participant_id().clone();
        let reachable: Vec<_> = core.roster().reachable(&me).cloned().collect();
        assert_eq!(reachable, vec![ParticipantId::from("sock-b")]);
    }

    #[test]
    fn roster_departure_drops_outgoing_invite() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        core.send_invite("sock-b".into());
        core.handle(Event::Relay(RelayEvent::Roster(vec![RosterEntry {
            participant: "sock-a".into(),
            present: true,
        }])));
        let actions = core.handle(Event::Relay(RelayEvent::SendSessionId {
            id: SessionId::generate(),
            sender: "sock-b".into(),
            receiver: "sock-a".into(),
        }));
        assert!(actions.is_empty());
        assert_eq!(core.state(), SessionState::Idle);
    }

    #[test]
    fn accept_notice_surfaces_for_outgoing_invite_only() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        let stray = core.handle(Event::Relay(RelayEvent::AcceptInvite {
            sender: "sock-b".into(),
            receiver: "sock-a".into(),
        }));
        assert!(stray.is_empty());
        core.send_invite("sock-b".into());
        let notice = core.handle(Event::Relay(RelayEvent::AcceptInvite {
            sender: "sock-b".into(),
            receiver: "sock-a".into(),
        }));
        assert_eq!(
            notice,
            vec![Action::Notify(Notice::InviteAccepted { by: "sock-b".into() })]
        );
    }

    #[test]
    fn leave_when_idle_is_a_no_op() {
        let mut core = DuetCore::new("sock-a".into(), "Ann");
        assert!(core.leave().is_empty());
    }
}
