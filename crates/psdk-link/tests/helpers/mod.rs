//! Shared fixtures for the link integration tests.
use psdk_link::{ChannelAddress, LinkConfig, LinkError, LowSpeedChannel, MemoryTransport, Receiver};
use std::sync::{Arc, Mutex};

/// Link over an in-memory transport with the same ceiling on every channel.
#[allow(dead_code)]
pub fn memory_link(bps: u32, drain_interval_s: u64) -> (Arc<MemoryTransport>, Arc<LowSpeedChannel>) {
    let transport = Arc::new(MemoryTransport::new());
    let cfg = LinkConfig {
        drain_interval_s,
        default_bandwidth_bps: bps,
        ..LinkConfig::default()
    };
    let link = Arc::new(LowSpeedChannel::new(cfg, transport.clone()));
    (transport, link)
}

/// Receiver that keeps every message it sees.
#[derive(Default)]
#[allow(dead_code)]
pub struct Recorder {
    pub seen: Mutex<Vec<(ChannelAddress, Vec<u8>)>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Receiver for Recorder {
    fn on_receive(&self, channel: ChannelAddress, data: &[u8]) -> Result<(), LinkError> {
        self.seen.lock().unwrap().push((channel, data.to_vec()));
        Ok(())
    }
}
