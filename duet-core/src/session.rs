//! Session state machine. Holds the single owned session; teardown always releases media and
//! destroys the peer connection before reporting the session ended.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::core::{Action, Notice};
use crate::ids::{MediaHandle, ParticipantId, PeerHandle, SessionId};
use crate::peer::{PeerLifecycle, RemoteStream};
use crate::protocol::RelayEvent;
use crate::signaling::{self, SignalingExchange};

/// Which side of the offer/answer exchange this participant plays.
/// The side that accepted the invite is the Initiator (sends the Offer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Id assigned, media not requested yet.
    Joining,
    /// Local media acquisition in flight.
    AwaitingMedia,
    /// Offer/answer in progress.
    Negotiating,
    /// Remote stream received.
    Connected,
    /// Teardown in progress.
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalLeave,
    RemoteLeave,
    PeerClosed,
    PeerError(String),
    MediaDenied(String),
}

impl EndReason {
    /// Whether ending for this reason tells the remote side to tear down as well.
    pub fn notifies_remote(&self) -> bool {
        matches!(self, EndReason::LocalLeave | EndReason::MediaDenied(_))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("session {0} is already active")]
    Busy(SessionId),
    #[error("session {0} already ended")]
    Stale(SessionId),
}

/// The local participant's current session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    role: Role,
    remote: ParticipantId,
    state: SessionState,
    pub(crate) media: Option<MediaHandle>,
    pub(crate) peer: Option<PeerHandle>,
    pub(crate) signaling: SignalingExchange,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn media(&self) -> Option<MediaHandle> {
        self.media
    }

    pub fn peer(&self) -> Option<PeerHandle> {
        self.peer
    }

    pub fn signaling(&self) -> &SignalingExchange {
        &self.signaling
    }

    pub(crate) fn set_state(&mut self, to: SessionState) {
        debug!(session = %self.id, from = ?self.state, ?to, "session transition");
        self.state = to;
    }
}

/// Owns at most one session; remembers recently ended ids so they cannot be rejoined.
#[derive(Debug)]
pub struct SessionMachine {
    current: Option<Session>,
    ended: VecDeque<SessionId>,
    ended_cap: usize,
}

impl SessionMachine {
    pub fn new(ended_cap: usize) -> Self {
        Self {
            current: None,
            ended: VecDeque::with_capacity(ended_cap),
            ended_cap,
        }
    }

    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut Session> {
        self.current.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_ended(&self, id: &SessionId) -> bool {
        self.ended.contains(id)
    }

    /// Start a session with a fresh id and request local media.
    pub fn join(
        &mut self,
        id: SessionId,
        role: Role,
        remote: ParticipantId,
        actions: &mut Vec<Action>,
    ) -> Result<(), JoinError> {
        if let Some(s) = &self.current {
            return Err(JoinError::Busy(s.id));
        }
        if self.has_ended(&id) {
            return Err(JoinError::Stale(id));
        }
        info!(session = %id, ?role, %remote, "joining session");
        let mut session = Session {
            id,
            role,
            remote: remote.clone(),
            state: SessionState::Joining,
            media: None,
            peer: None,
            signaling: SignalingExchange::default(),
        };
        actions.push(Action::Notify(Notice::SessionStarted {
            session_id: id,
            role,
            remote,
        }));
        session.set_state(SessionState::AwaitingMedia);
        actions.push(Action::AcquireMedia { session_id: id });
        self.current = Some(session);
        Ok(())
    }

    /// Media for `id` is ready. Media that arrives for anything but the waiting session is released.
    pub fn on_media_acquired(
        &mut self,
        id: SessionId,
        media: MediaHandle,
        peers: &mut PeerLifecycle,
        actions: &mut Vec<Action>,
    ) {
        let session = match self.current.as_mut() {
            Some(s) if s.id == id && s.state == SessionState::AwaitingMedia => s,
            _ => {
                debug!(session = %id, ?media, "media for inactive session released");
                actions.push(Action::ReleaseMedia(media));
                return;
            }
        };
        session.media = Some(media);
        actions.push(Action::Relay(RelayEvent::SessionJoin(id)));
        session.set_state(SessionState::Negotiating);
        signaling::begin(session, peers, actions);
    }

    pub fn on_media_failed(
        &mut self,
        id: SessionId,
        reason: String,
        peers: &mut PeerLifecycle,
        actions: &mut Vec<Action>,
    ) {
        match &self.current {
            Some(s) if s.id == id && s.state == SessionState::AwaitingMedia => {}
            _ => {
                debug!(session = %id, %reason, "media failure for inactive session ignored");
                return;
            }
        }
        warn!(session = %id, %reason, "local media denied");
        self.teardown(EndReason::MediaDenied(reason), peers, actions);
    }

    pub fn on_remote_stream(&mut self, stream: RemoteStream, actions: &mut Vec<Action>) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.state != SessionState::Negotiating {
            debug!(session = %session.id, ?stream, "additional remote stream ignored");
            return;
        }
        session.set_state(SessionState::Connected);
        info!(session = %session.id, remote = %session.remote, "session connected");
        actions.push(Action::AttachRemoteStream {
            session_id: session.id,
            stream,
        });
        actions.push(Action::Notify(Notice::Connected {
            session_id: session.id,
        }));
    }

    /// Close the current session. Returns false when already idle.
    pub fn teardown(
        &mut self,
        reason: EndReason,
        peers: &mut PeerLifecycle,
        actions: &mut Vec<Action>,
    ) -> bool {
        let Some(mut session) = self.current.take() else {
            return false;
        };
        session.set_state(SessionState::Closing);
        if reason.notifies_remote() {
            actions.push(Action::Relay(RelayEvent::LeaveSession(session.id)));
        }
        if let Some(media) = session.media.take() {
            actions.push(Action::ReleaseMedia(media));
        }
        if let Some(peer) = session.peer.take() {
            peers.destroy(peer, actions);
        }
        self.remember_ended(session.id);
        info!(session = %session.id, ?reason, "session ended");
        actions.push(Action::Notify(Notice::SessionEnded {
            session_id: session.id,
            reason,
        }));
        true
    }

    fn remember_ended(&mut self, id: SessionId) {
        if self.ended_cap == 0 {
            return;
        }
        if self.ended.len() == self.ended_cap {
            self.ended.pop_front();
        }
        self.ended.push_back(id);
    }
}
