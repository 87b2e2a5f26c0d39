//! TCP client for the signaling relay. Framed with duet_core::wire in both directions.

use anyhow::{bail, Context};
use duet_core::{decode_frame, encode_frame, Event, FrameDecodeError, ParticipantId, RelayEvent, Welcome};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::host::HostEvent;

const READ_CHUNK: usize = 8192;

/// Reads whole frames off a byte stream, keeping any trailing partial frame buffered.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Next frame, or `None` on a clean close between frames.
    pub async fn next<T: DeserializeOwned>(&mut self) -> anyhow::Result<Option<T>> {
        loop {
            match decode_frame::<T>(&self.buf) {
                Ok((msg, used)) => {
                    self.buf.drain(..used);
                    return Ok(Some(msg));
                }
                Err(FrameDecodeError::NeedMore) => {}
                Err(e) => return Err(e.into()),
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                bail!("relay closed mid-frame ({} bytes pending)", self.buf.len());
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

pub struct RelayWriter<W = OwnedWriteHalf> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> RelayWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, event: &RelayEvent) -> anyhow::Result<()> {
        let frame = encode_frame(event).with_context(|| format!("encoding {}", event.name()))?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        debug!(event = event.name(), bytes = frame.len(), "sent to relay");
        Ok(())
    }
}

pub type RelayReader = FrameReader<OwnedReadHalf>;

/// Connect and wait for the relay's Welcome, which carries our participant id.
pub async fn connect(addr: &str) -> anyhow::Result<(ParticipantId, RelayReader, RelayWriter)> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to relay {addr}"))?;
    let _ = stream.set_nodelay(true);
    let (r, w) = stream.into_split();
    let mut reader = FrameReader::new(r);
    let welcome: Welcome = reader
        .next()
        .await?
        .context("relay closed before welcome")?;
    Ok((welcome.participant, reader, RelayWriter::new(w)))
}

/// Forward relay events to the host until the connection ends.
pub async fn run_reader<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    events: mpsc::UnboundedSender<HostEvent>,
) {
    loop {
        match reader.next::<RelayEvent>().await {
            Ok(Some(ev)) => {
                debug!(event = ev.name(), "from relay");
                if events.send(HostEvent::Core(Event::Relay(ev))).is_err() {
                    return;
                }
            }
            Ok(None) => {
                info!("relay closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "relay read failed");
                break;
            }
        }
    }
    let _ = events.send(HostEvent::RelayClosed);
}
