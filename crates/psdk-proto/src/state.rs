//! Point-in-time send state of one channel.

use serde::{Deserialize, Serialize};

use crate::ChannelAddress;

/// Snapshot of one channel's send side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub ts_unix_ms: i64,
    pub channel: ChannelAddress,
    /// Configured ceiling, bytes per second.
    pub bandwidth_limit: u32,
    /// Bytes submitted by callers during the last second.
    pub bandwidth_before_flow_control: u32,
    /// Bytes handed to the transport during the last second.
    pub bandwidth_after_flow_control: u32,
    /// Flow-control buffer holds data; callers should slow down.
    pub busy: bool,
    pub buffered: usize,
    // Lifetime counters
    pub sent_total: u64,
    pub dropped_total: u64,
}
