//! Boundary to the layer that owns the physical link.
//!
//! The link layer hands over packets of at most
//! [`FRAGMENT_MAX`](crate::fragment::FRAGMENT_MAX) bytes addressed to a
//! channel. Framing on the wire is the transport's business.

mod memory;
mod udp;

pub use memory::MemoryTransport;
pub use udp::{decode_datagram, encode_datagram, UdpTransport};

use psdk_proto::ChannelAddress;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable")]
    Unavailable,
    /// Transient backpressure; the packet may be retried later.
    #[error("transport busy")]
    Busy,
    #[error("transport io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport: Send + Sync {
    /// Hands one packet to the link. Must not block for long.
    fn send_packet(&self, channel: ChannelAddress, packet: &[u8]) -> Result<(), TransportError>;

    /// Whether the link is up. `send` refuses new data while this is false;
    /// connectionless transports can keep the default.
    fn is_available(&self) -> bool {
        true
    }
}
