//! Offer/answer exchange over the relay. One Offer and at most one Answer per session;
//! anything late, duplicated, or addressed to another session is dropped.

use tracing::debug;

use crate::core::Action;
use crate::ids::MediaHandle;
use crate::peer::PeerLifecycle;
use crate::protocol::{RelayEvent, SignalData, SignalingMessage};
use crate::session::{Role, Session, SessionState};

/// Per-session idempotency flags.
#[derive(Debug, Default)]
pub struct SignalingExchange {
    offer_sent: bool,
    offer_received: bool,
    answer_sent: bool,
    answered: bool,
    /// Offer that arrived while local media was still being acquired.
    pending_offer: Option<SignalData>,
}

impl SignalingExchange {
    pub fn offer_sent(&self) -> bool {
        self.offer_sent
    }

    pub fn offer_received(&self) -> bool {
        self.offer_received
    }

    pub fn answer_sent(&self) -> bool {
        self.answer_sent
    }

    /// Initiator side: an Answer has been fed into the connection.
    pub fn answered(&self) -> bool {
        self.answered
    }
}

/// Session just entered Negotiating with media in hand.
pub(crate) fn begin(session: &mut Session, peers: &mut PeerLifecycle, actions: &mut Vec<Action>) {
    let Some(media) = session.media else {
        return;
    };
    match session.role() {
        Role::Initiator => {
            session.peer = Some(peers.create(true, media, actions));
        }
        Role::Responder => {
            if let Some(offer) = session.signaling.pending_offer.take() {
                answer_offer(session, media, offer, peers, actions);
            }
        }
    }
}

fn answer_offer(
    session: &mut Session,
    media: MediaHandle,
    offer: SignalData,
    peers: &mut PeerLifecycle,
    actions: &mut Vec<Action>,
) {
    let handle = peers.create(false, media, actions);
    session.peer = Some(handle);
    actions.push(Action::SignalPeer { handle, data: offer });
}

/// Local connection produced signal data.
pub(crate) fn on_local_signal(session: &mut Session, data: SignalData, actions: &mut Vec<Action>) {
    let id = session.id();
    if session.state() != SessionState::Negotiating {
        debug!(session = %id, state = ?session.state(), "local signal outside negotiation ignored");
        return;
    }
    let role = session.role();
    let ex = &mut session.signaling;
    match role {
        Role::Initiator => {
            if ex.answered {
                debug!(session = %id, "signal after answer; offer not re-sent");
                return;
            }
            if ex.offer_sent {
                debug!(session = %id, "offer already sent");
                return;
            }
            ex.offer_sent = true;
            actions.push(Action::Relay(RelayEvent::Offer(SignalingMessage {
                data,
                session_id: id,
            })));
        }
        Role::Responder => {
            if ex.answer_sent {
                debug!(session = %id, "answer already sent");
                return;
            }
            ex.answer_sent = true;
            actions.push(Action::Relay(RelayEvent::Answer(SignalingMessage {
                data,
                session_id: id,
            })));
        }
    }
}

/// Offer from the relay. Only the Responder consumes it, once.
pub(crate) fn on_offer(
    session: &mut Session,
    msg: SignalingMessage,
    peers: &mut PeerLifecycle,
    actions: &mut Vec<Action>,
) {
    let id = session.id();
    if msg.session_id != id {
        debug!(session = %msg.session_id, current = %id, "offer for another session discarded");
        return;
    }
    if session.role() != Role::Responder {
        debug!(session = %id, "offer received by initiator discarded");
        return;
    }
    if session.signaling.offer_received {
        debug!(session = %id, "duplicate offer discarded");
        return;
    }
    match session.state() {
        SessionState::Joining | SessionState::AwaitingMedia => {
            debug!(session = %id, "offer buffered until local media is ready");
            session.signaling.offer_received = true;
            session.signaling.pending_offer = Some(msg.data);
        }
        SessionState::Negotiating => {
            let Some(media) = session.media else {
                return;
            };
            session.signaling.offer_received = true;
            answer_offer(session, media, msg.data, peers, actions);
        }
        state => {
            debug!(session = %id, ?state, "late offer discarded");
        }
    }
}

/// Answer from the relay. Only the Initiator consumes it, once, after its Offer went out.
pub(crate) fn on_answer(session: &mut Session, msg: SignalingMessage, actions: &mut Vec<Action>) {
    let id = session.id();
    if msg.session_id != id {
        debug!(session = %msg.session_id, current = %id, "answer for another session discarded");
        return;
    }
    if session.role() != Role::Initiator {
        debug!(session = %id, "answer received by responder discarded");
        return;
    }
    if session.state() != SessionState::Negotiating {
        debug!(session = %id, state = ?session.state(), "late answer discarded");
        return;
    }
    let handle = session.peer;
    let ex = &mut session.signaling;
    if ex.answered {
        debug!(session = %id, "duplicate answer discarded");
        return;
    }
    if !ex.offer_sent {
        debug!(session = %id, "answer before offer discarded");
        return;
    }
    let Some(handle) = handle else {
        return;
    };
    ex.answered = true;
    actions.push(Action::SignalPeer {
        handle,
        data: msg.data,
    });
}
