//! Inline-or-heap storage for the short strings a handle carries (URL,
//! negotiated subprotocol), with a distinguishable "no value" state.

use crate::errors::WsError;

const INLINE_CAP: usize = 32;

/// A short, read-only, optional string.
///
/// `Null` is distinct from `Some("")`: the handshake uses `Null` to mean
/// "no subprotocol negotiated", never an empty string. Values up to
/// [`INLINE_CAP`] bytes are stored inline; longer ones spill to the heap.
/// Once built from [`SmallString::new`] a value never changes.
#[derive(Debug, Clone)]
pub enum SmallString {
    Null,
    Inline { buf: [u8; INLINE_CAP], len: u8 },
    Heap(Box<str>),
}

impl SmallString {
    /// The null / "no value" state.
    pub fn null() -> Self {
        SmallString::Null
    }

    /// Build from a borrowed string slice, choosing inline vs. heap storage
    /// by length. Does not validate content; callers that need the
    /// printable-ASCII, non-empty rule from the handshake's pre-validation
    /// should call [`validate_user_string`] first.
    pub fn new(s: &str) -> Self {
        if s.len() <= INLINE_CAP {
            let mut buf = [0u8; INLINE_CAP];
            buf[..s.len()].copy_from_slice(s.as_bytes());
            SmallString::Inline {
                buf,
                len: s.len() as u8,
            }
        } else {
            SmallString::Heap(s.into())
        }
    }

    /// Build from `Option<&str>`, `None` becoming `Null`.
    pub fn from_option(s: Option<&str>) -> Self {
        match s {
            Some(s) => SmallString::new(s),
            None => SmallString::Null,
        }
    }

    /// Read as a string slice, `None` iff this is `Null`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SmallString::Null => None,
            SmallString::Inline { buf, len } => {
                std::str::from_utf8(&buf[..*len as usize]).ok()
            }
            SmallString::Heap(s) => Some(s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SmallString::Null)
    }
}

/// The pre-validation rule from the handshake: user-supplied URL and
/// subprotocol-list strings must be non-empty and contain only bytes in
/// 0x20-0x7F, checked before any network I/O.
pub fn validate_user_string(s: &str) -> Result<(), WsError> {
    if s.is_empty() {
        return Err(WsError::Inval("string must not be empty".into()));
    }
    if !s.bytes().all(|b| (0x20..=0x7F).contains(&b)) {
        return Err(WsError::Inval(format!(
            "string {s:?} contains a byte outside 0x20-0x7F"
        )));
    }
    Ok(())
}
