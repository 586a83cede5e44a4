//! Splitting of logical sends into physical packets.
//!
//! The command channel carries at most [`FRAGMENT_MAX`] bytes per packet.
//! Longer payloads go out as several packets and the far end sees each one
//! separately.

/// Largest packet the physical link accepts.
pub const FRAGMENT_MAX: usize = 128;

/// Largest payload a single send may carry (8-bit length on the wire API).
pub const MAX_SEND_LEN: usize = u8::MAX as usize;

/// Number of packets a payload of `len` bytes occupies.
pub fn fragment_count(len: usize) -> usize {
    len.div_ceil(FRAGMENT_MAX)
}

/// Packets for `data`, in order. Every item is non-empty and at most
/// [`FRAGMENT_MAX`] bytes.
pub fn fragments(data: &[u8]) -> std::slice::Chunks<'_, u8> {
    data.chunks(FRAGMENT_MAX)
}
