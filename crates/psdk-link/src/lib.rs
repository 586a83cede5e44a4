//! Low-speed data channel between a payload and the remote parties of the
//! aircraft (RC app, cloud, extension and payload ports).
//!
//! Outbound data is split into 128-byte packets and paced against a
//! per-channel bandwidth ceiling; bursts above the ceiling wait in a
//! 512-byte flow-control buffer that a background task drains once per
//! drain interval. Inbound messages are routed to one [`Receiver`] per
//! channel.

pub mod buffer;
pub mod config;
pub mod doctor;
pub mod error;
pub mod fragment;
mod link;
pub mod registry;
pub mod transport;
pub mod window;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use link::LowSpeedChannel;
pub use psdk_proto::{ChannelAddress, ChannelState};
pub use registry::Receiver;
pub use transport::{MemoryTransport, Transport, TransportError, UdpTransport};
