//! Bit-exact big-endian (network order) integer access on byte buffers.
//!
//! Thin named wrappers over `bytes::Buf`/`BufMut`, which are already
//! big-endian by default; kept as their own module because the wire
//! specification calls these out as a distinct, separately testable piece
//! used by the frame codec's 16- and 64-bit extended length fields.

use bytes::{Buf, BufMut};

#[inline]
pub fn get_u16(mut buf: &[u8]) -> u16 {
    buf.get_u16()
}

#[inline]
pub fn put_u16(dst: &mut Vec<u8>, val: u16) {
    dst.put_u16(val);
}

#[inline]
pub fn get_u32(mut buf: &[u8]) -> u32 {
    buf.get_u32()
}

#[inline]
pub fn put_u32(dst: &mut Vec<u8>, val: u32) {
    dst.put_u32(val);
}

#[inline]
pub fn get_u64(mut buf: &[u8]) -> u64 {
    buf.get_u64()
}

#[inline]
pub fn put_u64(dst: &mut Vec<u8>, val: u64) {
    dst.put_u64(val);
}
