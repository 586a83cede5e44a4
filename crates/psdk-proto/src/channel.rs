//! Channel addresses and their wire values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical endpoint of the low-speed data channel.
///
/// Wire values are fixed by the platform; `0` is reserved for "unknown" and
/// is never a valid address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum ChannelAddress {
    PayloadPort1 = 1,
    PayloadPort2 = 2,
    PayloadPort3 = 3,
    ExtensionPort = 4,
    /// App running on the master remote controller ("mobile").
    MasterRcApp = 5,
    SlaveRcApp = 6,
    Cloud = 7,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("unrecognized channel address 0x{0:02x}")]
    Unknown(u8),
    #[error("unrecognized channel name {0:?}")]
    UnknownName(String),
}

impl ChannelAddress {
    pub const COUNT: usize = 7;

    pub const ALL: [ChannelAddress; Self::COUNT] = [
        ChannelAddress::PayloadPort1,
        ChannelAddress::PayloadPort2,
        ChannelAddress::PayloadPort3,
        ChannelAddress::ExtensionPort,
        ChannelAddress::MasterRcApp,
        ChannelAddress::SlaveRcApp,
        ChannelAddress::Cloud,
    ];

    pub fn wire(self) -> u8 {
        self as u8
    }

    /// Dense index into per-channel tables.
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelAddress::PayloadPort1 => "payload-port-1",
            ChannelAddress::PayloadPort2 => "payload-port-2",
            ChannelAddress::PayloadPort3 => "payload-port-3",
            ChannelAddress::ExtensionPort => "extension-port",
            ChannelAddress::MasterRcApp => "master-rc-app",
            ChannelAddress::SlaveRcApp => "slave-rc-app",
            ChannelAddress::Cloud => "cloud",
        }
    }
}

impl TryFrom<u8> for ChannelAddress {
    type Error = AddressError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ChannelAddress::PayloadPort1),
            2 => Ok(ChannelAddress::PayloadPort2),
            3 => Ok(ChannelAddress::PayloadPort3),
            4 => Ok(ChannelAddress::ExtensionPort),
            5 => Ok(ChannelAddress::MasterRcApp),
            6 => Ok(ChannelAddress::SlaveRcApp),
            7 => Ok(ChannelAddress::Cloud),
            other => Err(AddressError::Unknown(other)),
        }
    }
}

impl FromStr for ChannelAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "mobile" is what the sample programs call the master RC app
        if s == "mobile" {
            return Ok(ChannelAddress::MasterRcApp);
        }
        ChannelAddress::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| AddressError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
