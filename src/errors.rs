use thiserror::Error;

/// Frame- and handshake-level protocol violations.
///
/// Each of these corresponds to the `PROTO` error kind from the wire
/// specification; they live in their own enum so a caller that only cares
/// about protocol correctness can match on `WsError::Protocol(_)` without
/// also handling I/O and state-guard errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("http status line is malformed: {0:?}")]
    MalformedStatusLine(String),
    #[error("http line contains a byte outside 0x20-0x7F")]
    NonPrintableLine,
    #[error("expected LF after CR, line was not CRLF-terminated")]
    MissingLineFeed,
    #[error("required header `{0}` missing")]
    MissingHeader(&'static str),
    #[error("header `{0}` appeared more than once")]
    DuplicateHeader(&'static str),
    #[error("unexpected HTTP method or version in request line")]
    BadRequestLine,
    #[error("response status line was not `HTTP/1.1 101 ...`")]
    BadStatusLine,
    #[error("Sec-WebSocket-Accept did not match the expected derived value")]
    AcceptMismatch,
    #[error("requested subprotocol `{0}` was not offered by the peer")]
    SubprotocolNotOffered(String),
    #[error("no subprotocol in the client's list matched the server's")]
    NoSubprotocolMatch,
    #[error("reserved bit set on an incoming frame")]
    ReservedBitSet,
    #[error("unknown or reserved opcode {0}")]
    UnknownOpcode(u8),
    #[error("server received an unmasked data frame")]
    UnmaskedFromClient,
    #[error("client received a masked frame from the server")]
    MaskedFromServer,
    #[error("control frame was fragmented (fin=0)")]
    FragmentedControlFrame,
    #[error("Sec-WebSocket-Protocol response must be a single token, got `{0}`")]
    MultipleSubprotocolsInResponse(String),
    #[error("new data frame received while a fragmented message was in progress")]
    InterruptedFragment,
}

/// Errors returned from `wsmill` operations.
///
/// Mirrors the kinds enumerated in the wire specification: `INVAL`,
/// `NOMEM`, `PROTO` (wrapping [`ProtocolError`]), `OPNOTSUPP`,
/// `CONNABORTED`, `CONNRESET`, `AGAIN`, and transport errors passed through
/// unchanged as [`WsError::Io`].
#[derive(Debug, Error)]
pub enum WsError {
    /// Caller-supplied URL or subprotocol string was empty or contained a
    /// byte outside 0x20-0x7F.
    #[error("invalid argument: {0}")]
    Inval(String),

    /// A peer declared a payload length too large to allocate a buffer for.
    #[error("could not allocate {0} bytes to hold declared frame payload")]
    NoMemory(u64),

    /// Handshake or frame decode violated RFC 6455.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A data operation (`send`/`recv`) was attempted on a listening handle.
    #[error("operation not supported on a listening handle")]
    OpNotSupp,

    /// The connection already transitioned to broken, or a control
    /// operation (`ping`/`pong`/`done`) was attempted after `done`.
    #[error("connection is broken or already closing")]
    ConnAborted,

    /// The peer closed the connection; surfaced once from `recv`.
    #[error("connection reset by peer")]
    ConnReset,

    /// `recv` observed an unsolicited pong; no data was returned.
    #[error("no message available, an unsolicited pong was consumed")]
    Again,

    /// Propagated unchanged from the underlying transport.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WsError {
    /// Whether this error requires the connection to transition to
    /// `Stage::Broken`: every protocol violation and every I/O failure mid
    /// frame. `Again` and `ConnAborted` are not connection-ending.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            WsError::Protocol(_) | WsError::Io(_) | WsError::NoMemory(_)
        )
    }
}
