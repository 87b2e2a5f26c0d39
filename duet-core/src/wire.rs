//! Relay framing: length-prefix (4 bytes LE) + bincode payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

const LEN_SIZE: usize = 4;
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024; // 16 MiB

/// Encode a value into a single frame: 4 bytes LE length + bincode payload.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameEncodeError> {
    let payload = bincode::serialize(msg).map_err(FrameEncodeError::Encode)?;
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(FrameEncodeError::TooLarge);
    }
    let len = payload.len() as u32;
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Error encoding a frame (bincode or size limit).
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame too large")]
    TooLarge,
}

/// Decode one frame from the front of `bytes`. Returns the value and the number of bytes consumed.
/// A partial buffer yields `NeedMore`; the caller retries once more bytes arrive.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if len > MAX_FRAME_LEN as usize {
        return Err(FrameDecodeError::TooLarge);
    }
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    let msg: T =
        bincode::deserialize(&bytes[LEN_SIZE..LEN_SIZE + len]).map_err(FrameDecodeError::Decode)?;
    Ok((msg, LEN_SIZE + len))
}

/// Error decoding a frame (need more bytes, too large, or bincode failure).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ParticipantId, SessionId};
    use crate::protocol::{Invite, RelayEvent, SignalData, SignalingMessage, Welcome};

    fn sample_offer() -> RelayEvent {
        RelayEvent::Offer(SignalingMessage {
            data: SignalData(r#"{"type":"offer","sdp":"v=0"}"#.into()),
            session_id: SessionId::generate(),
        })
    }

    #[test]
    fn offer_survives_framing() {
        let msg = sample_offer();
        let frame = encode_frame(&msg).unwrap();
        let (decoded, n): (RelayEvent, usize) = decode_frame(&frame).unwrap();
        assert_eq!(n, frame.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn partial_read_need_more() {
        let frame = encode_frame(&sample_offer()).unwrap();
        assert!(matches!(
            decode_frame::<RelayEvent>(&frame[..2]),
            Err(FrameDecodeError::NeedMore)
        ));
        assert!(matches!(
            decode_frame::<RelayEvent>(&frame[..frame.len() - 1]),
            Err(FrameDecodeError::NeedMore)
        ));
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        let mut bytes = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            decode_frame::<RelayEvent>(&bytes),
            Err(FrameDecodeError::TooLarge)
        ));
    }

    #[test]
    fn welcome_then_events_in_one_buffer() {
        let welcome = Welcome {
            participant: ParticipantId::from("sock-a"),
        };
        let invite = RelayEvent::SendInvite(Invite {
            sender: "sock-b".into(),
            receiver: "sock-a".into(),
            display_name: "Bea".into(),
        });
        let mut buf = encode_frame(&welcome).unwrap();
        buf.extend_from_slice(&encode_frame(&invite).unwrap());

        let (w, n1): (Welcome, usize) = decode_frame(&buf).unwrap();
        assert_eq!(w, welcome);
        let (e, n2): (RelayEvent, usize) = decode_frame(&buf[n1..]).unwrap();
        assert_eq!(n1 + n2, buf.len());
        assert_eq!(e.name(), "SEND_INVITE");
        assert_eq!(e, invite);
    }
}
