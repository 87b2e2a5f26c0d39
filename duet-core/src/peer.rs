//! Peer connection lifecycle: handle allocation, teardown, event routing.
//! The connection itself lives in the host; the core only sees handles and events.

use tracing::debug;

use crate::core::Action;
use crate::ids::{MediaHandle, PeerHandle};
use crate::protocol::SignalData;
use crate::session::EndReason;

/// Events a peer connection raises. Host reports them with the handle they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Local signal data ready to send to the remote side.
    Signal(SignalData),
    /// Remote media arrived.
    Stream(RemoteStream),
    Close,
    Error(String),
}

/// Host label for a remote media stream (track/stream id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream(pub String);

/// Where a peer event goes in the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRoute {
    Signal(SignalData),
    Connected(RemoteStream),
    Teardown(EndReason),
}

#[derive(Debug, Clone, Copy)]
struct LivePeer {
    handle: PeerHandle,
    initiator: bool,
}

/// Owns at most one live connection handle at a time.
#[derive(Debug, Default)]
pub struct PeerLifecycle {
    next_handle: u64,
    live: Option<LivePeer>,
}

impl PeerLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle and ask the host to create the connection.
    /// A still-live previous connection is destroyed first.
    pub fn create(
        &mut self,
        initiator: bool,
        media: MediaHandle,
        actions: &mut Vec<Action>,
    ) -> PeerHandle {
        if let Some(prev) = self.live {
            self.destroy(prev.handle, actions);
        }
        self.next_handle += 1;
        let handle = PeerHandle(self.next_handle);
        self.live = Some(LivePeer { handle, initiator });
        debug!(%handle, initiator, "creating peer connection");
        actions.push(Action::CreatePeer {
            handle,
            initiator,
            media,
        });
        handle
    }

    /// Destroy a connection. Returns false (and emits nothing) if it is not live.
    pub fn destroy(&mut self, handle: PeerHandle, actions: &mut Vec<Action>) -> bool {
        match self.live {
            Some(p) if p.handle == handle => {
                self.live = None;
                debug!(%handle, "destroying peer connection");
                actions.push(Action::DestroyPeer(handle));
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self, handle: PeerHandle) -> bool {
        self.live.map(|p| p.handle == handle).unwrap_or(false)
    }

    pub fn live_handle(&self) -> Option<PeerHandle> {
        self.live.map(|p| p.handle)
    }

    pub fn is_initiator(&self) -> Option<bool> {
        self.live.map(|p| p.initiator)
    }

    /// Route an event from `handle`. Events from connections that are no longer live yield None.
    pub fn route(&self, handle: PeerHandle, event: PeerEvent) -> Option<PeerRoute> {
        if !self.is_live(handle) {
            debug!(%handle, ?event, "event from stale peer connection ignored");
            return None;
        }
        Some(match event {
            PeerEvent::Signal(data) => PeerRoute::Signal(data),
            PeerEvent::Stream(stream) => PeerRoute::Connected(stream),
            PeerEvent::Close => PeerRoute::Teardown(EndReason::PeerClosed),
            PeerEvent::Error(err) => PeerRoute::Teardown(EndReason::PeerError(err)),
        })
    }
}
