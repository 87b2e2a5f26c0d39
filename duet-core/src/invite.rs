//! Invite handshake: send, receive, accept (mints the session id), decline.

use tracing::{debug, warn};

use crate::core::Action;
use crate::ids::{ParticipantId, SessionId};
use crate::protocol::{Invite, RelayEvent};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InviteError {
    #[error("a session is already active; leave it first")]
    SessionActive,
    #[error("no pending invite from {0}")]
    UnknownInvite(ParticipantId),
}

/// Tracks invites awaiting a local decision and invites this side sent.
#[derive(Debug, Default)]
pub struct InviteCoordinator {
    /// Received, undecided. At most one per sender.
    incoming: Vec<Invite>,
    /// Receivers of invites we sent that have not produced a session yet.
    outgoing: Vec<ParticipantId>,
}

impl InviteCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_invite(
        &mut self,
        me: &ParticipantId,
        receiver: ParticipantId,
        display_name: &str,
        actions: &mut Vec<Action>,
    ) {
        if !self.outgoing.contains(&receiver) {
            self.outgoing.push(receiver.clone());
        }
        actions.push(Action::Relay(RelayEvent::SendInvite(Invite {
            sender: me.clone(),
            receiver,
            display_name: display_name.to_owned(),
        })));
    }

    /// Store a received invite. Returns false when it is not addressed to `me`.
    pub fn on_invite_received(&mut self, me: &ParticipantId, invite: Invite) -> bool {
        if invite.receiver != *me || invite.sender == *me {
            debug!(sender = %invite.sender, receiver = %invite.receiver, "misrouted invite dropped");
            return false;
        }
        self.incoming.retain(|i| i.sender != invite.sender);
        self.incoming.push(invite);
        true
    }

    /// Accept the pending invite from `sender`: mint the session id and answer the inviter.
    /// Refused while a session is active; the invite then stays pending.
    pub fn accept(
        &mut self,
        me: &ParticipantId,
        sender: &ParticipantId,
        session_active: bool,
        actions: &mut Vec<Action>,
    ) -> Result<SessionId, InviteError> {
        if session_active {
            return Err(InviteError::SessionActive);
        }
        let invite = self
            .take_incoming(sender)
            .ok_or_else(|| InviteError::UnknownInvite(sender.clone()))?;
        let id = SessionId::generate();
        actions.push(Action::Relay(RelayEvent::AcceptInvite {
            sender: me.clone(),
            receiver: invite.sender.clone(),
        }));
        actions.push(Action::Relay(RelayEvent::SendSessionId {
            id,
            sender: me.clone(),
            receiver: invite.sender,
        }));
        Ok(id)
    }

    pub fn decline(&mut self, sender: &ParticipantId) -> Result<Invite, InviteError> {
        self.take_incoming(sender)
            .ok_or_else(|| InviteError::UnknownInvite(sender.clone()))
    }

    /// Whether an invite we sent to `receiver` is still outstanding.
    pub fn is_outgoing(&self, receiver: &ParticipantId) -> bool {
        self.outgoing.contains(receiver)
    }

    /// Forget outgoing invites whose receiver no longer passes `keep`.
    pub fn prune_outgoing(&mut self, keep: impl Fn(&ParticipantId) -> bool) {
        self.outgoing.retain(|r| {
            let live = keep(r);
            if !live {
                debug!(receiver = %r, "outgoing invite dropped");
            }
            live
        });
    }

    /// A session id arrived from `sender`. Consumes the matching outgoing invite.
    pub fn on_session_id(&mut self, sender: &ParticipantId) -> bool {
        let before = self.outgoing.len();
        self.outgoing.retain(|r| r != sender);
        if self.outgoing.len() == before {
            warn!(%sender, "session id from a participant we did not invite");
            return false;
        }
        true
    }

    pub fn pending(&self) -> &[Invite] {
        &self.incoming
    }

    fn take_incoming(&mut self, sender: &ParticipantId) -> Option<Invite> {
        let pos = self.incoming.iter().position(|i| i.sender == *sender)?;
        Some(self.incoming.remove(pos))
    }
}
