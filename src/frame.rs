//! RFC 6455 frame header encode/decode, masking, and the fixed-payload
//! control frames this profile uses.

use crate::errors::{ProtocolError, WsError};
use crate::transport::{Deadline, Transport};
use crate::wire;

/// Frame opcodes this profile understands. Reserved opcodes (3-7, 11-15)
/// decode to a [`ProtocolError::UnknownOpcode`] rather than a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    fn from_u8(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// Which side of the connection we are, for the masking rules (§3
/// invariant: client always masks, server never does and rejects
/// unmasked data frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// A decoded frame header, plus enough bookkeeping to read the payload
/// that follows it.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload_len: u64,
    pub mask: Option<[u8; 4]>,
}

/// XOR `buf` in place with `mask`, repeating every 4 bytes, continuing the
/// mask's phase from `offset` (so a payload read in chunks unmasks
/// correctly across chunk boundaries).
pub fn apply_mask_from(buf: &mut [u8], mask: [u8; 4], offset: usize) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= mask[(offset + i) % 4];
    }
}

/// Read one frame header (the 2-byte base, any extended length field, and
/// any mask key) off `transport`. Enforces: RSV bits clear, a known
/// opcode, and the masking rule for `role` (server requires masked data
/// frames, client rejects masked frames from the server). Control-frame
/// `fin`/size invariants are checked by the caller once the whole frame is
/// known to be a control frame, since that depends on payload length too.
pub async fn read_header<T: Transport>(
    transport: &mut T,
    role: Role,
    deadline: Deadline,
) -> Result<FrameHeader, WsError> {
    let mut base = [0u8; 2];
    transport.recv(&mut base, deadline).await?;

    if base[0] & 0x70 != 0 {
        return Err(ProtocolError::ReservedBitSet.into());
    }
    let fin = base[0] & 0x80 != 0;
    let opcode = Opcode::from_u8(base[0] & 0x0F)?;

    let masked = base[1] & 0x80 != 0;
    let len7 = base[1] & 0x7F;

    let payload_len = match len7 {
        0..=125 => len7 as u64,
        126 => {
            let mut ext = [0u8; 2];
            transport.recv(&mut ext, deadline).await?;
            wire::get_u16(&ext) as u64
        }
        127 => {
            let mut ext = [0u8; 8];
            transport.recv(&mut ext, deadline).await?;
            wire::get_u64(&ext)
        }
        _ => unreachable!("7-bit field"),
    };

    match role {
        Role::Server if !masked => return Err(ProtocolError::UnmaskedFromClient.into()),
        Role::Client if masked => return Err(ProtocolError::MaskedFromServer.into()),
        _ => {}
    }

    let mask = if masked {
        let mut m = [0u8; 4];
        transport.recv(&mut m, deadline).await?;
        Some(m)
    } else {
        None
    };

    Ok(FrameHeader {
        fin,
        opcode,
        masked,
        payload_len,
        mask,
    })
}

/// Encode a single-frame data message (opcode Text or Binary, `fin=1`).
/// If `role` is `Client`, appends a fresh mask key and masks the payload.
pub fn encode_data_frame(opcode: Opcode, payload: &[u8], role: Role) -> Vec<u8> {
    debug_assert!(matches!(opcode, Opcode::Text | Opcode::Binary));
    let mask = match role {
        Role::Client => Some(rand::random::<[u8; 4]>()),
        Role::Server => None,
    };
    encode_frame(opcode, payload, mask)
}

fn encode_frame(opcode: Opcode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = payload.len();
    let mut out = Vec::with_capacity(2 + 8 + 4 + len);
    out.push(0x80 | opcode.as_u8());

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 0xFFFF {
        out.push(mask_bit | 126);
        wire::put_u16(&mut out, len as u16);
    } else {
        out.push(mask_bit | 127);
        wire::put_u64(&mut out, len as u64);
    }

    if let Some(mask) = mask {
        out.extend_from_slice(&mask);
        let start = out.len();
        out.extend_from_slice(payload);
        apply_mask_from(&mut out[start..], mask, 0);
    } else {
        out.extend_from_slice(payload);
    }
    out
}

/// Encode a zero-payload control frame: ping/pong/close in this profile
/// never carry a payload on send. Masked the same way data
/// frames are, per role.
pub fn encode_control_frame(opcode: Opcode, role: Role) -> Vec<u8> {
    debug_assert!(opcode.is_control());
    let mask = match role {
        Role::Client => Some(rand::random::<[u8; 4]>()),
        Role::Server => None,
    };
    encode_frame(opcode, &[], mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TcpListenerTransport, TcpTransport};

    #[test]
    fn control_frames_are_two_bytes() {
        assert_eq!(encode_control_frame(Opcode::Ping, Role::Server), vec![0x89, 0x00]);
        assert_eq!(encode_control_frame(Opcode::Pong, Role::Server), vec![0x8A, 0x00]);
        let close = encode_control_frame(Opcode::Close, Role::Server);
        assert_eq!(close, vec![0x88, 0x00]);
    }

    #[test]
    fn masking_xors_payload_with_repeating_key() {
        let payload = b"hello world, this is longer than four bytes";
        let mask = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut buf = payload.to_vec();
        apply_mask_from(&mut buf, mask, 0);
        for (i, (&orig, &masked)) in payload.iter().zip(buf.iter()).enumerate() {
            assert_eq!(masked, orig ^ mask[i % 4]);
        }
        // unmasking is the same XOR applied again
        apply_mask_from(&mut buf, mask, 0);
        assert_eq!(buf, payload);
    }

    #[test]
    fn encode_uses_correct_length_class() {
        let small = encode_data_frame(Opcode::Binary, &[0u8; 10], Role::Server);
        assert_eq!(small[1], 10);
        let mid = encode_data_frame(Opcode::Binary, &[0u8; 126], Role::Server);
        assert_eq!(mid[1], 126);
        assert_eq!(wire::get_u16(&mid[2..4]), 126);
        let big = encode_data_frame(Opcode::Binary, &vec![0u8; 70000], Role::Server);
        assert_eq!(big[1], 127);
        assert_eq!(wire::get_u64(&big[2..10]), 70000);
    }

    #[test]
    fn client_frame_sets_mask_bit_and_key() {
        let frame = encode_data_frame(Opcode::Text, b"abc", Role::Client);
        assert_eq!(frame[1] & 0x80, 0x80);
        assert_eq!(frame.len(), 2 + 4 + 3);
    }

    async fn pipe() -> (TcpTransport, TcpTransport) {
        let mut listener = TcpListenerTransport::bind("127.0.0.1:0", 1).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept(Deadline::infinite()).await });
        let client = TcpTransport::connect(addr, Deadline::infinite()).await.unwrap();
        let server = accept.await.unwrap().unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn decode_rejects_reserved_bits() {
        let (mut client, mut server) = pipe().await;
        client.send(&[0x40, 0x00], Deadline::infinite()).await.unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let err = read_header(&mut server, Role::Server, Deadline::infinite()).await;
        assert!(matches!(err, Err(WsError::Protocol(ProtocolError::ReservedBitSet))));
    }

    #[tokio::test]
    async fn server_rejects_unmasked_data_frame() {
        let (mut client, mut server) = pipe().await;
        client.send(&[0x82, 0x00], Deadline::infinite()).await.unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let err = read_header(&mut server, Role::Server, Deadline::infinite()).await;
        assert!(matches!(
            err,
            Err(WsError::Protocol(ProtocolError::UnmaskedFromClient))
        ));
    }

    #[tokio::test]
    async fn client_rejects_masked_frame_from_server() {
        let (mut client, mut server) = pipe().await;
        client
            .send(&[0x82, 0x80, 0, 0, 0, 0], Deadline::infinite())
            .await
            .unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let err = read_header(&mut server, Role::Client, Deadline::infinite()).await;
        assert!(matches!(
            err,
            Err(WsError::Protocol(ProtocolError::MaskedFromServer))
        ));
    }
}
