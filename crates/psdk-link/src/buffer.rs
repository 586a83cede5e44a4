//! Per-channel flow-control buffer.
//!
//! Holds fragments that could not go out immediately. Capacity is counted in
//! payload bytes; on overflow the newest bytes are discarded.

use bytes::Bytes;
use std::collections::VecDeque;

/// Capacity of the flow-control buffer, bytes.
pub const FLOW_BUFFER_CAPACITY: usize = 512;

#[derive(Debug)]
pub struct FlowBuffer {
    frags: VecDeque<Bytes>,
    len: usize,
    capacity: usize,
}

impl Default for FlowBuffer {
    fn default() -> Self {
        Self::with_capacity(FLOW_BUFFER_CAPACITY)
    }
}

impl FlowBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { frags: VecDeque::new(), len: 0, capacity }
    }

    /// Buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.len
    }

    /// Appends as much of `frag` as fits. Returns the number of bytes kept;
    /// the rest is dropped.
    pub fn push(&mut self, frag: &[u8]) -> usize {
        let keep = frag.len().min(self.free());
        if keep > 0 {
            self.frags.push_back(Bytes::copy_from_slice(&frag[..keep]));
            self.len += keep;
        }
        keep
    }

    pub fn front_len(&self) -> Option<usize> {
        self.frags.front().map(Bytes::len)
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        let frag = self.frags.pop_front()?;
        self.len -= frag.len();
        Some(frag)
    }

    /// Puts fragments back at the head, keeping their order. If that pushes
    /// the buffer past capacity, the newest bytes are trimmed off the tail.
    /// Returns the number of bytes trimmed.
    pub fn requeue_front(&mut self, frags: Vec<Bytes>) -> usize {
        for frag in frags.into_iter().rev() {
            self.len += frag.len();
            self.frags.push_front(frag);
        }
        let mut trimmed = 0;
        while self.len > self.capacity {
            let over = self.len - self.capacity;
            let Some(back) = self.frags.back_mut() else { break };
            if back.len() <= over {
                let n = back.len();
                self.frags.pop_back();
                self.len -= n;
                trimmed += n;
            } else {
                back.truncate(back.len() - over);
                self.len -= over;
                trimmed += over;
            }
        }
        trimmed
    }

    pub fn clear(&mut self) -> usize {
        let n = self.len;
        self.frags.clear();
        self.len = 0;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full_then_drop() {
        let mut b = FlowBuffer::default();
        for _ in 0..4 {
            assert_eq!(b.push(&[1u8; 128]), 128);
        }
        assert_eq!(b.len(), 512);
        assert_eq!(b.push(&[2u8; 10]), 0);
        assert_eq!(b.len(), 512);
    }

    #[test]
    fn partial_fragment_is_truncated() {
        let mut b = FlowBuffer::default();
        b.push(&[0u8; 128]);
        b.push(&[0u8; 128]);
        b.push(&[0u8; 128]);
        b.push(&[0u8; 16]);
        assert_eq!(b.len(), 400);

        let data: Vec<u8> = (0..128u8).collect();
        assert_eq!(b.push(&data), 112);
        assert_eq!(b.len(), 512);

        for _ in 0..4 {
            b.pop();
        }
        let tail = b.pop().unwrap();
        assert_eq!(&tail[..], &data[..112]);
        assert!(b.is_empty());
    }

    #[test]
    fn pop_keeps_fragment_boundaries() {
        let mut b = FlowBuffer::default();
        b.push(b"abc");
        b.push(b"defgh");
        assert_eq!(b.front_len(), Some(3));
        assert_eq!(&b.pop().unwrap()[..], b"abc");
        assert_eq!(&b.pop().unwrap()[..], b"defgh");
        assert_eq!(b.pop(), None);
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn requeue_goes_to_front_and_trims_newest() {
        let mut b = FlowBuffer::with_capacity(10);
        b.push(b"0123");
        let head = b.pop().unwrap();
        b.push(b"456789ab");
        assert_eq!(b.len(), 8);

        let trimmed = b.requeue_front(vec![head]);
        assert_eq!(trimmed, 2);
        assert_eq!(b.len(), 10);
        assert_eq!(&b.pop().unwrap()[..], b"0123");
        assert_eq!(&b.pop().unwrap()[..], b"456789");
    }
}
