//! Local capture: one VP8 video and one Opus audio track per acquisition.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use duet_core::{MediaHandle, SessionId};
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("video device {} not available", .0.display())]
    DeviceUnavailable(PathBuf),
    #[error("access to {} refused: {source}", path.display())]
    Denied {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Tracks handed to a peer connection.
#[derive(Clone)]
pub struct LocalMedia {
    pub video: Arc<TrackLocalStaticSample>,
    pub audio: Arc<TrackLocalStaticSample>,
}

/// An open capture device and the tracks fed from it. Dropping it closes the device.
struct Acquired {
    media: LocalMedia,
    _device: File,
}

#[derive(Clone)]
pub struct MediaDevices {
    video_device: PathBuf,
    next_handle: Arc<AtomicU64>,
    acquired: Arc<Mutex<HashMap<MediaHandle, Acquired>>>,
}

impl MediaDevices {
    pub fn new(video_device: PathBuf) -> Self {
        Self {
            video_device,
            next_handle: Arc::new(AtomicU64::new(1)),
            acquired: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open the capture device and create local tracks for `session_id`.
    pub async fn acquire(&self, session_id: SessionId) -> Result<MediaHandle, MediaError> {
        let path = &self.video_device;
        let device = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::DeviceUnavailable(path.clone()));
            }
            Err(e) => {
                return Err(MediaError::Denied {
                    path: path.clone(),
                    source: e,
                });
            }
        };

        let handle = MediaHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let stream_id = format!("duet-{session_id}");
        let media = LocalMedia {
            video: Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                "video".to_owned(),
                stream_id.clone(),
            )),
            audio: Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                "audio".to_owned(),
                stream_id,
            )),
        };
        self.acquired.lock().await.insert(
            handle,
            Acquired {
                media,
                _device: device,
            },
        );
        info!(session = %session_id, device = %path.display(), "local media acquired");
        Ok(handle)
    }

    pub async fn tracks(&self, handle: MediaHandle) -> Option<LocalMedia> {
        self.acquired
            .lock()
            .await
            .get(&handle)
            .map(|a| a.media.clone())
    }

    /// Stop capture and close the device. Releasing an unknown handle is a no-op.
    pub async fn release(&self, handle: MediaHandle) -> bool {
        let released = self.acquired.lock().await.remove(&handle).is_some();
        if released {
            debug!(media = handle.0, "local media released");
        }
        released
    }

    /// Release everything still held. Returns how many acquisitions were open.
    pub async fn release_all(&self) -> usize {
        let mut acquired = self.acquired.lock().await;
        let n = acquired.len();
        acquired.clear();
        n
    }
}
