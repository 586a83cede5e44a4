//! In-process transport that records packets instead of sending them.

use psdk_proto::ChannelAddress;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Transport, TransportError};

/// Transport that records every packet in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    packets: Mutex<Vec<(ChannelAddress, Vec<u8>)>>,
    available: AtomicBool,
    busy: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            packets: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, on: bool) {
        self.available.store(on, Ordering::SeqCst);
    }

    pub fn set_busy(&self, on: bool) {
        self.busy.store(on, Ordering::SeqCst);
    }

    pub fn packets(&self) -> Vec<(ChannelAddress, Vec<u8>)> {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn packets_for(&self, channel: ChannelAddress) -> Vec<Vec<u8>> {
        self.packets()
            .into_iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn bytes_for(&self, channel: ChannelAddress) -> usize {
        self.packets_for(channel).iter().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Transport for MemoryTransport {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn send_packet(&self, channel: ChannelAddress, packet: &[u8]) -> Result<(), TransportError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable);
        }
        if self.busy.load(Ordering::SeqCst) {
            return Err(TransportError::Busy);
        }
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel, packet.to_vec()));
        Ok(())
    }
}
