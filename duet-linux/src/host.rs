//! Host loop: owns the core, feeds it events one at a time, executes the actions it returns.

use std::time::Duration;

use anyhow::bail;
use duet_core::{Action, DuetCore, Event, ParticipantId, PeerEvent, PeerHandle, SessionState};
use tokio::io::AsyncWrite;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::console::{self, Command};
use crate::media::MediaDevices;
use crate::relay::RelayWriter;
use crate::rtc::WebRtcPeers;

/// Everything the host loop reacts to.
pub enum HostEvent {
    Core(Event),
    Command(Command),
    RelayClosed,
    Shutdown,
}

enum Flow {
    Continue,
    Stop,
}

pub struct Host<W = OwnedWriteHalf> {
    core: DuetCore,
    relay: RelayWriter<W>,
    media: MediaDevices,
    peers: WebRtcPeers,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl<W: AsyncWrite + Unpin> Host<W> {
    pub fn new(
        cfg: &Config,
        me: ParticipantId,
        relay: RelayWriter<W>,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            core: DuetCore::new(me, cfg.display_name.clone()),
            relay,
            media: MediaDevices::new(cfg.video_device.clone()),
            peers: WebRtcPeers::new(
                cfg.stun_servers.clone(),
                Duration::from_millis(cfg.ice_gather_timeout_ms),
                events.clone(),
            ),
            events,
        }
    }

    /// Run until shutdown. Losing the relay is an error; local resources are released either way.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HostEvent>) -> anyhow::Result<()> {
        while let Some(ev) = rx.recv().await {
            match self.step(ev).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => {
                    self.release_all(false).await;
                    return Err(e);
                }
            }
        }
        self.release_all(true).await;
        Ok(())
    }

    async fn step(&mut self, ev: HostEvent) -> anyhow::Result<Flow> {
        match ev {
            HostEvent::Core(ev) => {
                let actions = self.core.handle(ev);
                self.execute(actions).await?;
            }
            HostEvent::Command(cmd) => self.command(cmd).await?,
            HostEvent::RelayClosed => bail!("relay connection lost"),
            HostEvent::Shutdown => {
                info!("shutting down");
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    async fn command(&mut self, cmd: Command) -> anyhow::Result<()> {
        let actions = match cmd {
            Command::Invite(receiver) => self.core.send_invite(receiver),
            Command::Accept(sender) => {
                let Some(sender) = self.pick_invite(sender) else {
                    return Ok(());
                };
                match self.core.accept_invite(&sender) {
                    Ok(actions) => actions,
                    Err(e) => {
                        println!("{e}");
                        return Ok(());
                    }
                }
            }
            Command::Decline(sender) => {
                if let Some(sender) = self.pick_invite(sender) {
                    match self.core.decline_invite(&sender) {
                        Ok(()) => println!("declined invite from {sender}"),
                        Err(e) => println!("{e}"),
                    }
                }
                return Ok(());
            }
            Command::Leave => self.core.leave(),
            Command::Roster => {
                let me = self.core.participant_id();
                let mut any = false;
                for p in self.core.roster().reachable(me) {
                    println!("  {p}");
                    any = true;
                }
                if !any {
                    println!("nobody else is online");
                }
                return Ok(());
            }
            Command::Status => {
                self.print_status();
                return Ok(());
            }
            Command::Help => {
                println!("{}", console::HELP);
                return Ok(());
            }
        };
        self.execute(actions).await
    }

    /// Named invite, or the only pending one when no name is given.
    fn pick_invite(&self, named: Option<ParticipantId>) -> Option<ParticipantId> {
        if named.is_some() {
            return named;
        }
        match self.core.pending_invites() {
            [] => println!("no pending invites"),
            [only] => return Some(only.sender.clone()),
            many => {
                println!("several pending invites; name one:");
                for i in many {
                    println!("  {} ({})", i.sender, i.display_name);
                }
            }
        }
        None
    }

    fn print_status(&self) {
        println!("you are {}", self.core.participant_id());
        match self.core.session() {
            Some(s) => println!(
                "session {} with {} ({:?}, {:?})",
                s.id(),
                s.remote(),
                s.role(),
                s.state()
            ),
            None => println!("no session"),
        }
        for i in self.core.pending_invites() {
            println!("pending invite from {} ({})", i.sender, i.display_name);
        }
    }

    /// Runs every action even when a relay send fails, so a teardown batch always
    /// releases media and destroys the peer. The first relay error is returned afterwards.
    async fn execute(&mut self, actions: Vec<Action>) -> anyhow::Result<()> {
        let mut relay_err = None;
        for action in actions {
            match action {
                Action::Relay(ev) => {
                    if relay_err.is_some() {
                        debug!(event = ev.name(), "relay down; not sent");
                        continue;
                    }
                    if let Err(e) = self.relay.send(&ev).await {
                        warn!(event = ev.name(), error = %e, "relay send failed");
                        relay_err = Some(e);
                    }
                }
                Action::AcquireMedia { session_id } => {
                    let media = self.media.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let ev = match media.acquire(session_id).await {
                            Ok(media) => Event::MediaAcquired { session_id, media },
                            Err(e) => {
                                warn!(session = %session_id, error = %e, "media acquisition failed");
                                Event::MediaFailed {
                                    session_id,
                                    reason: e.to_string(),
                                }
                            }
                        };
                        let _ = events.send(HostEvent::Core(ev));
                    });
                }
                Action::ReleaseMedia(handle) => {
                    self.media.release(handle).await;
                }
                Action::CreatePeer {
                    handle,
                    initiator,
                    media,
                } => {
                    let result = match self.media.tracks(media).await {
                        Some(tracks) => self
                            .peers
                            .create(handle, initiator, tracks)
                            .await
                            .map_err(|e| e.to_string()),
                        None => Err(format!("media {} already released", media.0)),
                    };
                    if let Err(reason) = result {
                        self.peer_failed(handle, reason);
                    }
                }
                Action::SignalPeer { handle, data } => {
                    if let Err(e) = self.peers.signal(handle, data).await {
                        self.peer_failed(handle, e.to_string());
                    }
                }
                Action::DestroyPeer(handle) => self.peers.destroy(handle).await,
                Action::AttachRemoteStream { session_id, stream } => {
                    info!(session = %session_id, stream = %stream.0, "remote stream attached");
                }
                Action::Notify(notice) => {
                    debug!(?notice, "notice");
                    if let Some(line) = console::describe(&notice) {
                        println!("{line}");
                    }
                }
            }
        }
        match relay_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Route a local peer failure back through the core like any other peer event.
    fn peer_failed(&self, handle: PeerHandle, reason: String) {
        warn!(peer = %handle, %reason, "peer operation failed");
        let _ = self.events.send(HostEvent::Core(Event::Peer {
            handle,
            event: PeerEvent::Error(reason),
        }));
    }

    /// Leave any session and close connections. Relay sends are skipped when the relay is gone.
    async fn release_all(&mut self, relay_up: bool) {
        if self.core.state() != SessionState::Idle {
            for action in self.core.leave() {
                match action {
                    Action::Relay(ev) if relay_up => {
                        if let Err(e) = self.relay.send(&ev).await {
                            debug!(error = %e, "could not notify relay on exit");
                        }
                    }
                    Action::Relay(_) => {}
                    Action::ReleaseMedia(handle) => {
                        self.media.release(handle).await;
                    }
                    Action::DestroyPeer(handle) => self.peers.destroy(handle).await,
                    _ => {}
                }
            }
        }
        let leaked = self.media.release_all().await;
        if leaked > 0 {
            warn!(count = leaked, "released media left behind by an aborted teardown");
        }
        self.peers.close_all().await;
    }
}
