//! Relay event surface: every named event the core consumes or produces.

use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantId, SessionId};

/// Request from `sender` to open a session with `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    /// Sender's display name, shown to the receiver.
    #[serde(rename = "name")]
    pub display_name: String,
}

/// Opaque signal data produced and consumed by the peer connection (SDP as JSON in practice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalData(pub String);

/// Offer or Answer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingMessage {
    pub data: SignalData,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// One roster row: a participant and whether it is currently present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub participant: ParticipantId,
    pub present: bool,
}

/// First frame the relay sends on a new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub participant: ParticipantId,
}

/// Named relay events. Variant names on the wire follow the hub's event names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayEvent {
    #[serde(rename = "SEND_INVITE")]
    SendInvite(Invite),
    #[serde(rename = "ACCEPT_INVITE")]
    AcceptInvite {
        sender: ParticipantId,
        receiver: ParticipantId,
    },
    /// Session id minted by the acceptor, addressed to the original inviter.
    #[serde(rename = "SEND_VIDEOCHATID")]
    SendSessionId {
        id: SessionId,
        sender: ParticipantId,
        receiver: ParticipantId,
    },
    /// Announces local media is ready and the participant joined the session.
    #[serde(rename = "newVideoChatPeer")]
    SessionJoin(SessionId),
    Offer(SignalingMessage),
    Answer(SignalingMessage),
    #[serde(rename = "LEAVE_VIDEO_CHAT")]
    LeaveSession(SessionId),
    #[serde(rename = "VIDEOCHAT_LIST")]
    Roster(Vec<RosterEntry>),
}

impl RelayEvent {
    /// Event name as the hub knows it.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::SendInvite(_) => "SEND_INVITE",
            RelayEvent::AcceptInvite { .. } => "ACCEPT_INVITE",
            RelayEvent::SendSessionId { .. } => "SEND_VIDEOCHATID",
            RelayEvent::SessionJoin(_) => "newVideoChatPeer",
            RelayEvent::Offer(_) => "Offer",
            RelayEvent::Answer(_) => "Answer",
            RelayEvent::LeaveSession(_) => "LEAVE_VIDEO_CHAT",
            RelayEvent::Roster(_) => "VIDEOCHAT_LIST",
        }
    }
}
