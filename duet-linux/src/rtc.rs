//! WebRTC connections behind the core's peer handles.
//!
//! Non-trickle: each side emits exactly one signal, a JSON session description sent once
//! ICE gathering completes or the gather timeout passes. Events go back to the host loop
//! tagged with the handle; the core drops events from handles it has already destroyed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use duet_core::{Event, PeerEvent, PeerHandle, RemoteStream, SignalData};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::host::HostEvent;
use crate::media::LocalMedia;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("webrtc: {0}")]
    WebRtc(#[from] webrtc::Error),
    #[error("malformed signal data: {0}")]
    Signal(#[from] serde_json::Error),
    #[error("no local description after negotiation")]
    NoLocalDescription,
    #[error("no live connection for {0}")]
    Unknown(PeerHandle),
}

#[derive(Clone)]
pub struct WebRtcPeers {
    stun_servers: Vec<String>,
    gather_timeout: Duration,
    events: mpsc::UnboundedSender<HostEvent>,
    live: Arc<Mutex<HashMap<PeerHandle, Arc<RTCPeerConnection>>>>,
}

impl WebRtcPeers {
    pub fn new(
        stun_servers: Vec<String>,
        gather_timeout: Duration,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            stun_servers,
            gather_timeout,
            events,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build the connection and register it under `handle` before returning, so a
    /// following `signal` finds it. The initiator's offer is produced in the background.
    pub async fn create(
        &self,
        handle: PeerHandle,
        initiator: bool,
        media: LocalMedia,
    ) -> Result<(), PeerError> {
        let pc = Arc::new(self.new_connection().await?);
        pc.add_track(Arc::clone(&media.video) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        pc.add_track(Arc::clone(&media.audio) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        self.install_handlers(handle, &pc);
        self.live.lock().await.insert(handle, Arc::clone(&pc));
        debug!(peer = %handle, initiator, "peer connection created");

        if initiator {
            let this = self.clone();
            tokio::spawn(async move {
                let result = async {
                    let offer = pc.create_offer(None).await?;
                    this.publish_local(handle, &pc, offer).await
                }
                .await;
                if let Err(e) = result {
                    this.report(handle, PeerEvent::Error(e.to_string()));
                }
            });
        }
        Ok(())
    }

    /// Feed remote signal data. An offer is answered in the background.
    pub async fn signal(&self, handle: PeerHandle, data: SignalData) -> Result<(), PeerError> {
        let pc = self
            .live
            .lock()
            .await
            .get(&handle)
            .cloned()
            .ok_or(PeerError::Unknown(handle))?;
        let desc: RTCSessionDescription = serde_json::from_str(&data.0)?;
        let is_offer = desc.sdp_type == RTCSdpType::Offer;
        let this = self.clone();
        tokio::spawn(async move {
            let result = async {
                pc.set_remote_description(desc).await?;
                if is_offer {
                    let answer = pc.create_answer(None).await?;
                    this.publish_local(handle, &pc, answer).await?;
                }
                Ok::<(), PeerError>(())
            }
            .await;
            if let Err(e) = result {
                this.report(handle, PeerEvent::Error(e.to_string()));
            }
        });
        Ok(())
    }

    /// Close and forget `handle`. Unknown handles are ignored.
    pub async fn destroy(&self, handle: PeerHandle) {
        let Some(pc) = self.live.lock().await.remove(&handle) else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = pc.close().await {
                debug!(peer = %handle, error = %e, "close failed");
            }
        });
        debug!(peer = %handle, "peer connection destroyed");
    }

    /// Close everything; used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.live.lock().await.drain().collect();
        for (handle, pc) in drained {
            if let Err(e) = pc.close().await {
                debug!(peer = %handle, error = %e, "close failed");
            }
        }
    }

    async fn new_connection(&self) -> Result<RTCPeerConnection, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        let mut config = RTCConfiguration::default();
        if !self.stun_servers.is_empty() {
            config.ice_servers = vec![RTCIceServer {
                urls: self.stun_servers.clone(),
                ..Default::default()
            }];
        }
        Ok(api.new_peer_connection(config).await?)
    }

    fn install_handlers(&self, handle: PeerHandle, pc: &Arc<RTCPeerConnection>) {
        let events = self.events.clone();
        let seen_track = Arc::new(AtomicBool::new(false));
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let events = events.clone();
            let first = !seen_track.swap(true, Ordering::SeqCst);
            Box::pin(async move {
                if first {
                    let stream = RemoteStream(format!("{}-{}", track.kind(), track.ssrc()));
                    info!(peer = %handle, stream = %stream.0, "remote track");
                    let _ = events.send(HostEvent::Core(Event::Peer {
                        handle,
                        event: PeerEvent::Stream(stream),
                    }));
                }
                // Drain RTP so receive buffers keep moving.
                tokio::spawn(async move { while track.read_rtp().await.is_ok() {} });
            })
        }));

        let events = self.events.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            debug!(peer = %handle, state = ?st, "peer connection state");
            let event = match st {
                RTCPeerConnectionState::Failed => {
                    Some(PeerEvent::Error("peer connection failed".to_owned()))
                }
                RTCPeerConnectionState::Closed => Some(PeerEvent::Close),
                _ => None,
            };
            if let Some(event) = event {
                let _ = events.send(HostEvent::Core(Event::Peer { handle, event }));
            }
            Box::pin(async {})
        }));
    }

    /// Set the local description, wait for gathering, then hand the full SDP to the core.
    async fn publish_local(
        &self,
        handle: PeerHandle,
        pc: &RTCPeerConnection,
        desc: RTCSessionDescription,
    ) -> Result<(), PeerError> {
        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(desc).await?;
        if tokio::time::timeout(self.gather_timeout, gather_complete.recv())
            .await
            .is_err()
        {
            debug!(peer = %handle, timeout = ?self.gather_timeout, "ICE gathering timed out");
        }
        let local = pc
            .local_description()
            .await
            .ok_or(PeerError::NoLocalDescription)?;
        let json = serde_json::to_string(&local)?;
        self.report(handle, PeerEvent::Signal(SignalData(json)));
        Ok(())
    }

    fn report(&self, handle: PeerHandle, event: PeerEvent) {
        if let PeerEvent::Error(reason) = &event {
            warn!(peer = %handle, %reason, "peer error");
        }
        let _ = self.events.send(HostEvent::Core(Event::Peer { handle, event }));
    }
}
