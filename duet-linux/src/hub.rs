//! Relay hub: accepts participants over TCP, assigns their ids, and routes relay events.
//! Invite-phase events go to the named receiver; offer, answer and leave go to the other
//! members of the session. Sender fields are overwritten with the connection's real id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use duet_core::{encode_frame, ParticipantId, RelayEvent, RosterEntry, SessionId, Welcome};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::relay::FrameReader;

type Outbox = Vec<(ParticipantId, RelayEvent)>;

/// Routing state. Pure: returns deliveries, the caller writes them.
#[derive(Debug, Default)]
pub struct HubRouter {
    /// Connected participants in arrival order.
    present: Vec<ParticipantId>,
    /// (inviter, invitee) pairs routed and not yet answered with a session id.
    invites: HashSet<(ParticipantId, ParticipantId)>,
    sessions: HashMap<SessionId, Vec<ParticipantId>>,
}

impl HubRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, who: ParticipantId) -> Outbox {
        if !self.present.contains(&who) {
            self.present.push(who);
        }
        self.roster_broadcast()
    }

    /// Drop `who`; session partners are told it left.
    pub fn disconnect(&mut self, who: &ParticipantId) -> Outbox {
        self.present.retain(|p| p != who);
        self.invites.retain(|(from, to)| from != who && to != who);
        let mut out = self.end_sessions_of(who, None);
        out.extend(self.roster_broadcast());
        out
    }

    /// Forget every session `who` belongs to except `keep`; partners get a leave.
    /// A participant holds one live session, so older entries are dead.
    fn end_sessions_of(&mut self, who: &ParticipantId, keep: Option<SessionId>) -> Outbox {
        let mut out = Vec::new();
        self.sessions.retain(|id, members| {
            if Some(*id) == keep || !members.contains(who) {
                return true;
            }
            out.extend(
                members
                    .iter()
                    .filter(|m| *m != who)
                    .map(|m| (m.clone(), RelayEvent::LeaveSession(*id))),
            );
            false
        });
        out
    }

    pub fn route(&mut self, from: &ParticipantId, ev: RelayEvent) -> Outbox {
        match ev {
            RelayEvent::SendInvite(mut invite) => {
                invite.sender = from.clone();
                let to = invite.receiver.clone();
                let out = self.direct(to.clone(), RelayEvent::SendInvite(invite));
                if !out.is_empty() {
                    self.invites.insert((from.clone(), to));
                }
                out
            }
            RelayEvent::AcceptInvite { receiver, .. } => self.direct(
                receiver.clone(),
                RelayEvent::AcceptInvite {
                    sender: from.clone(),
                    receiver,
                },
            ),
            RelayEvent::SendSessionId { id, receiver, .. } => {
                if !self.invites.remove(&(receiver.clone(), from.clone())) {
                    debug!(session = %id, sender = %from, %receiver, "session id without invite dropped");
                    return Vec::new();
                }
                if self.sessions.contains_key(&id) {
                    debug!(session = %id, "session id already in use; dropped");
                    return Vec::new();
                }
                let mut out = self.direct(
                    receiver.clone(),
                    RelayEvent::SendSessionId {
                        id,
                        sender: from.clone(),
                        receiver: receiver.clone(),
                    },
                );
                if out.is_empty() {
                    return out;
                }
                // The acceptor was idle to accept, so its older sessions are over. The
                // inviter may still be busy and refuse; its sessions stay until it joins.
                out.extend(self.end_sessions_of(from, None));
                // Pair now so an offer is not lost while the inviter still acquires media.
                self.sessions.insert(id, vec![from.clone(), receiver]);
                out
            }
            RelayEvent::SessionJoin(id) => {
                if !self.sessions.get(&id).is_some_and(|m| m.contains(from)) {
                    warn!(session = %id, participant = %from, "join for a session not paired with it; refused");
                    return vec![(from.clone(), RelayEvent::LeaveSession(id))];
                }
                self.end_sessions_of(from, Some(id))
            }
            RelayEvent::Offer(ref msg) | RelayEvent::Answer(ref msg) => {
                let id = msg.session_id;
                self.to_partners(from, id, ev)
            }
            RelayEvent::LeaveSession(id) => {
                let out = self.to_partners(from, id, RelayEvent::LeaveSession(id));
                if self.sessions.get(&id).is_some_and(|m| m.contains(from)) {
                    self.sessions.remove(&id);
                }
                out
            }
            RelayEvent::Roster(_) => {
                debug!(participant = %from, "roster from client ignored");
                Vec::new()
            }
        }
    }

    fn direct(&self, to: ParticipantId, ev: RelayEvent) -> Outbox {
        if !self.present.contains(&to) {
            debug!(receiver = %to, event = ev.name(), "receiver not connected; dropped");
            return Vec::new();
        }
        vec![(to, ev)]
    }

    fn to_partners(&self, from: &ParticipantId, id: SessionId, ev: RelayEvent) -> Outbox {
        match self.sessions.get(&id) {
            Some(members) if members.contains(from) => members
                .iter()
                .filter(|m| *m != from)
                .map(|m| (m.clone(), ev.clone()))
                .collect(),
            _ => {
                debug!(session = %id, participant = %from, event = ev.name(), "not a session member; dropped");
                Vec::new()
            }
        }
    }

    fn roster_broadcast(&self) -> Outbox {
        let entries: Vec<RosterEntry> = self
            .present
            .iter()
            .map(|p| RosterEntry {
                participant: p.clone(),
                present: true,
            })
            .collect();
        self.present
            .iter()
            .map(|p| (p.clone(), RelayEvent::Roster(entries.clone())))
            .collect()
    }
}

struct Shared {
    router: Mutex<HubRouter>,
    senders: Mutex<HashMap<ParticipantId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Shared {
    async fn deliver(&self, out: Outbox) {
        let senders = self.senders.lock().await;
        for (to, ev) in out {
            let Some(tx) = senders.get(&to) else {
                continue;
            };
            match encode_frame(&ev) {
                Ok(frame) => {
                    let _ = tx.send(frame);
                }
                Err(e) => warn!(event = ev.name(), error = %e, "encode failed"),
            }
        }
    }
}

/// Serve participants on `listen` until the listener fails.
pub async fn run_hub(listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(%listen, "relay hub listening");
    let shared = Arc::new(Shared {
        router: Mutex::new(HubRouter::new()),
        senders: Mutex::new(HashMap::new()),
    });
    let mut next_id: u64 = 1;
    loop {
        let (stream, addr) = listener.accept().await?;
        let who = ParticipantId::new(format!("sock-{next_id}"));
        next_id += 1;
        debug!(participant = %who, %addr, "participant connected");
        tokio::spawn(run_participant(stream, who, shared.clone()));
    }
}

async fn run_participant(stream: TcpStream, who: ParticipantId, shared: Arc<Shared>) {
    let _ = stream.set_nodelay(true);
    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    match encode_frame(&Welcome {
        participant: who.clone(),
    }) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => {
            warn!(error = %e, "welcome encode failed");
            return;
        }
    }
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.write_all(&frame).await.is_err() {
                break;
            }
            let _ = writer.flush().await;
        }
    });
    shared.senders.lock().await.insert(who.clone(), tx);
    let out = shared.router.lock().await.connect(who.clone());
    shared.deliver(out).await;

    let mut reader = FrameReader::new(reader);
    loop {
        match reader.next::<RelayEvent>().await {
            Ok(Some(ev)) => {
                debug!(participant = %who, event = ev.name(), "hub received");
                let out = shared.router.lock().await.route(&who, ev);
                shared.deliver(out).await;
            }
            Ok(None) => break,
            Err(e) => {
                debug!(participant = %who, error = %e, "participant read failed");
                break;
            }
        }
    }

    shared.senders.lock().await.remove(&who);
    let out = shared.router.lock().await.disconnect(&who);
    shared.deliver(out).await;
    debug!(participant = %who, "participant left");
}
