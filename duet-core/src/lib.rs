//! Duet session signaling core: one exclusive one-to-one media session per participant.
//! Host-driven: no I/O; host passes events and receives actions.

pub mod ids;
pub mod protocol;
pub mod wire;

pub use crate::core::{Action, CoreConfig, DuetCore, Event, Notice};
pub use ids::{MediaHandle, ParticipantId, PeerHandle, SessionId};
pub use invite::InviteError;
pub use peer::{PeerEvent, RemoteStream};
pub use protocol::{Invite, RelayEvent, RosterEntry, SignalData, SignalingMessage, Welcome};
pub use session::{EndReason, Role, SessionState};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};

pub mod core;
pub mod invite;
pub mod peer;
pub mod roster;
pub mod session;
pub mod signaling;
