//! The open WebSocket connection: handshake + framing + the small state
//! machine that guards which operations are legal.

use tracing::{debug, trace, warn};

use crate::errors::{ProtocolError, WsError};
use crate::frame::{self, Opcode, Role};
use crate::handshake;
use crate::smallstring::{validate_user_string, SmallString};
use crate::transport::{Deadline, Transport};

/// Where a connection sits in its lifecycle. `Listening` never appears on a
/// [`Connection`] value — it belongs to [`crate::listener::Listener`]
/// instead, so a data op on a listening handle is a type error rather than
/// a runtime guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    DoneSent,
    Broken,
}

/// An open, handshaken WebSocket connection over some [`Transport`].
pub struct Connection<T: Transport> {
    transport: T,
    role: Role,
    stage: Stage,
    url: SmallString,
    subprotocol: SmallString,
}

impl<T: Transport> Connection<T> {
    pub(crate) fn new(transport: T, role: Role, url: SmallString, subprotocol: SmallString) -> Self {
        Connection {
            transport,
            role,
            stage: Stage::Open,
            url,
            subprotocol,
        }
    }

    /// Perform the client side of the opening handshake over an
    /// already-connected transport and return an open [`Connection`].
    pub async fn connect(
        mut transport: T,
        url: &str,
        requested_subprotocols: Option<&str>,
        deadline: Deadline,
    ) -> Result<Self, WsError> {
        validate_user_string(url)?;
        if let Some(req) = requested_subprotocols {
            validate_user_string(req)?;
        }
        match handshake::connect_handshake(&mut transport, requested_subprotocols, url, deadline).await {
            Ok(subprotocol) => {
                debug!(url, subprotocol = ?subprotocol, "client handshake complete");
                Ok(Connection::new(
                    transport,
                    Role::Client,
                    SmallString::new(url),
                    SmallString::from_option(subprotocol.as_deref()),
                ))
            }
            Err(err) => {
                warn!(%err, "client handshake failed");
                let _ = transport.close().await;
                Err(err)
            }
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_str()
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_str()
    }

    /// Every op (`send`/`recv`/`ping`/`pong`/`done`) requires `Open`;
    /// `DoneSent` and `Broken` both yield `CONNABORTED`.
    fn guard_open(&self) -> Result<(), WsError> {
        match self.stage {
            Stage::Open => Ok(()),
            Stage::DoneSent | Stage::Broken => Err(WsError::ConnAborted),
        }
    }

    fn mark_broken_if_fatal(&mut self, err: &WsError) {
        if err.is_fatal() {
            self.stage = Stage::Broken;
        }
    }

    /// Send `payload` as a single binary data frame.
    pub async fn send(&mut self, payload: &[u8], deadline: Deadline) -> Result<usize, WsError> {
        self.guard_open()?;
        let frame = frame::encode_data_frame(Opcode::Binary, payload, self.role);
        match self.write_frame(&frame, deadline).await {
            Ok(()) => Ok(payload.len()),
            Err(err) => {
                self.mark_broken_if_fatal(&err);
                Err(err)
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8], deadline: Deadline) -> Result<(), WsError> {
        self.transport.send(frame, deadline).await?;
        self.transport.flush(deadline).await?;
        Ok(())
    }

    /// Receive one complete message into `buf`, reassembling fragments and
    /// transparently handling control frames (ping/pong/close).
    ///
    /// Returns the full message length, which may exceed `buf.len()` if the
    /// peer sent more than the caller had room for — the excess is drained
    /// from the stream and counted but not written.
    pub async fn recv(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, WsError> {
        self.guard_open()?;
        match self.recv_inner(buf, deadline).await {
            Ok(n) => Ok(n),
            Err(err) => {
                self.mark_broken_if_fatal(&err);
                Err(err)
            }
        }
    }

    async fn recv_inner(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, WsError> {
        let mut written = 0usize;
        let mut fragment_in_progress = false;

        loop {
            let header = frame::read_header(&mut self.transport, self.role, deadline).await?;

            if header.opcode.is_control() {
                if !header.fin {
                    return Err(ProtocolError::FragmentedControlFrame.into());
                }
                self.drain_payload(header.payload_len, deadline).await?;
                match header.opcode {
                    Opcode::Close => {
                        if self.stage != Stage::DoneSent {
                            let close = frame::encode_control_frame(Opcode::Close, self.role);
                            self.write_frame(&close, deadline).await?;
                        }
                        self.stage = Stage::Broken;
                        return Err(WsError::ConnReset);
                    }
                    Opcode::Ping => {
                        if self.stage != Stage::DoneSent {
                            let pong = frame::encode_control_frame(Opcode::Pong, self.role);
                            self.write_frame(&pong, deadline).await?;
                        }
                        trace!("replied to ping");
                        continue;
                    }
                    Opcode::Pong => {
                        trace!("observed unsolicited pong");
                        return Err(WsError::Again);
                    }
                    _ => unreachable!("is_control() covers exactly these opcodes"),
                }
            }

            // A leading Continuation frame is tolerated, not rejected: the
            // wire format in practice starts a message with opcode 0 too.
            match (fragment_in_progress, header.opcode) {
                (false, Opcode::Text | Opcode::Binary | Opcode::Continuation) => {}
                (true, Opcode::Continuation) => {}
                (true, Opcode::Text | Opcode::Binary) => {
                    return Err(ProtocolError::InterruptedFragment.into())
                }
                _ => unreachable!("control opcodes handled above"),
            }

            let dest = &mut buf[written.min(buf.len())..];
            let n = self.read_frame_payload(&header, dest, deadline).await?;
            written = written.saturating_add(n);
            fragment_in_progress = !header.fin;

            if header.fin {
                return Ok(written);
            }
        }
    }

    /// Read one frame's payload into `dest`, draining and unmasking only as
    /// much as fits, draining (and counting, but not writing) the rest.
    /// Returns the full payload length regardless of how much fit.
    async fn read_frame_payload(
        &mut self,
        header: &frame::FrameHeader,
        dest: &mut [u8],
        deadline: Deadline,
    ) -> Result<usize, WsError> {
        let total = header.payload_len;
        let to_user = (total as usize).min(dest.len());

        let mut user_buf = Vec::new();
        user_buf
            .try_reserve_exact(to_user)
            .map_err(|_| WsError::NoMemory(total))?;
        user_buf.resize(to_user, 0);
        self.transport.recv(&mut user_buf, deadline).await?;
        if let Some(mask) = header.mask {
            frame::apply_mask_from(&mut user_buf, mask, 0);
        }
        dest[..to_user].copy_from_slice(&user_buf);

        let overflow = total - to_user as u64;
        if overflow > 0 {
            self.drain_payload(overflow, deadline).await?;
        }

        Ok(total as usize)
    }

    /// Drain `len` bytes of a payload we are discarding entirely (a control
    /// frame's payload, or data-frame overflow past `to_user`), in bounded
    /// chunks so a hostile huge length cannot force one giant allocation.
    /// The drained bytes are never unmasked — only what actually reaches
    /// the caller's buffer needs unmasking.
    async fn drain_payload(&mut self, len: u64, deadline: Deadline) -> Result<(), WsError> {
        const CHUNK: usize = 4096;
        let mut remaining = len;
        let mut scratch = vec![0u8; CHUNK.min(len.max(1) as usize)];
        while remaining > 0 {
            let this = (remaining as usize).min(scratch.len());
            self.transport.recv(&mut scratch[..this], deadline).await?;
            remaining -= this as u64;
        }
        Ok(())
    }

    /// Send a ping and await nothing; the reply (if any) surfaces from a
    /// subsequent `recv` as `AGAIN`.
    pub async fn ping(&mut self, deadline: Deadline) -> Result<(), WsError> {
        self.guard_open()?;
        let frame = frame::encode_control_frame(Opcode::Ping, self.role);
        self.write_frame(&frame, deadline).await.map_err(|err| {
            self.mark_broken_if_fatal(&err);
            err
        })
    }

    pub async fn pong(&mut self, deadline: Deadline) -> Result<(), WsError> {
        self.guard_open()?;
        let frame = frame::encode_control_frame(Opcode::Pong, self.role);
        self.write_frame(&frame, deadline).await.map_err(|err| {
            self.mark_broken_if_fatal(&err);
            err
        })
    }

    /// Initiate the closing handshake: send a close frame and mark this
    /// side done-sent. Does not wait for the peer's close; the next `recv`
    /// observes it (or `CONNRESET` if the peer already sent theirs).
    pub async fn done(&mut self, deadline: Deadline) -> Result<(), WsError> {
        self.guard_open()?;
        let frame = frame::encode_control_frame(Opcode::Close, self.role);
        self.write_frame(&frame, deadline).await.map_err(|err| {
            self.mark_broken_if_fatal(&err);
            err
        })?;
        self.stage = Stage::DoneSent;
        Ok(())
    }

    /// Release the underlying transport. Idempotent in effect: safe to call
    /// from any stage, including after a prior fatal error.
    pub async fn close(self) -> Result<(), WsError> {
        self.transport.close().await?;
        Ok(())
    }
}
