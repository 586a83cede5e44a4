//! Link configuration: drain interval and per-channel bandwidth ceilings.

use psdk_proto::ChannelAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{LinkError, Result};
use crate::fragment::FRAGMENT_MAX;

pub const DEFAULT_BANDWIDTH_BPS: u32 = 1024;
pub const MAX_BANDWIDTH_BPS: u32 = 1024 * 1024;
pub const MAX_DRAIN_INTERVAL_S: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Drain task period, whole seconds.
    pub drain_interval_s: u64,

    /// Ceiling for channels without an entry in `bandwidth_bps`.
    pub default_bandwidth_bps: u32,

    /// Per-channel ceilings, bytes per second. Keys are channel names, e.g.
    /// `master-rc-app = 2048`.
    pub bandwidth_bps: BTreeMap<ChannelAddress, u32>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drain_interval_s: 1,
            default_bandwidth_bps: DEFAULT_BANDWIDTH_BPS,
            bandwidth_bps: BTreeMap::new(),
        }
    }
}

impl LinkConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_s)
    }

    pub fn bandwidth_for(&self, channel: ChannelAddress) -> u32 {
        self.bandwidth_bps
            .get(&channel)
            .copied()
            .unwrap_or(self.default_bandwidth_bps)
    }

    pub fn with_bandwidth(mut self, channel: ChannelAddress, bps: u32) -> Self {
        self.bandwidth_bps.insert(channel, bps);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DRAIN_INTERVAL_S).contains(&self.drain_interval_s) {
            return Err(LinkError::InvalidArgument(format!(
                "drain_interval_s must be 1..={}, got {}",
                MAX_DRAIN_INTERVAL_S, self.drain_interval_s
            )));
        }
        // Below one full packet per second a buffered fragment could never drain.
        for c in ChannelAddress::ALL {
            let bps = self.bandwidth_for(c);
            if (bps as usize) < FRAGMENT_MAX || bps > MAX_BANDWIDTH_BPS {
                return Err(LinkError::InvalidArgument(format!(
                    "bandwidth for {} must be {}..={} B/s, got {}",
                    c, FRAGMENT_MAX, MAX_BANDWIDTH_BPS, bps
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = LinkConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.drain_interval(), Duration::from_secs(1));
        assert_eq!(cfg.bandwidth_for(ChannelAddress::Cloud), DEFAULT_BANDWIDTH_BPS);
    }

    #[test]
    fn parses_per_channel_overrides() {
        let cfg: LinkConfig = toml::from_str(
            r#"
            drain_interval_s = 2
            [bandwidth_bps]
            master-rc-app = 2048
            cloud = 256
            "#,
        )
        .unwrap();
        assert_eq!(cfg.drain_interval_s, 2);
        assert_eq!(cfg.bandwidth_for(ChannelAddress::MasterRcApp), 2048);
        assert_eq!(cfg.bandwidth_for(ChannelAddress::Cloud), 256);
        assert_eq!(cfg.bandwidth_for(ChannelAddress::PayloadPort2), DEFAULT_BANDWIDTH_BPS);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let zero = LinkConfig { drain_interval_s: 0, ..LinkConfig::default() };
        assert!(matches!(zero.validate(), Err(LinkError::InvalidArgument(_))));

        let slow = LinkConfig::default().with_bandwidth(ChannelAddress::Cloud, 100);
        assert!(slow.validate().is_err());
    }

    #[test]
    fn unknown_channel_name_fails_to_parse() {
        let r: std::result::Result<LinkConfig, _> = toml::from_str("[bandwidth_bps]\nsatellite = 512\n");
        assert!(r.is_err());
    }
}
