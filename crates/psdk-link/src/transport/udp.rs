//! UDP transport: one datagram per packet, prefixed with the channel address.

use bytes::{BufMut, Bytes, BytesMut};
use psdk_proto::ChannelAddress;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::{Transport, TransportError};
use crate::fragment::FRAGMENT_MAX;
use crate::LowSpeedChannel;

/// Largest inbound message accepted from the peer.
const MAX_DATAGRAM: usize = u16::MAX as usize;

/// Carries packets as UDP datagrams: one address byte, then the packet.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

pub fn encode_datagram(channel: ChannelAddress, packet: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + packet.len());
    buf.put_u8(channel.wire());
    buf.put_slice(packet);
    buf.freeze()
}

/// Splits a datagram into its raw address byte and payload.
pub fn decode_datagram(datagram: &[u8]) -> Option<(u8, &[u8])> {
    match datagram {
        [addr, payload @ ..] if !payload.is_empty() => Some((*addr, payload)),
        _ => None,
    }
}

impl UdpTransport {
    pub async fn bind(bind: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        info!("udp: bound {} -> peer {}", socket.local_addr()?, peer);
        Ok(Self { socket: Arc::new(socket), peer })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Feeds inbound datagrams into `link` until the socket fails.
    pub async fn run_receiver(&self, link: Arc<LowSpeedChannel>) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (n, from) = self.socket.recv_from(&mut buf).await?;
            match decode_datagram(&buf[..n]) {
                Some((addr, payload)) => link.dispatch(addr, payload),
                None => debug!("udp: ignoring runt datagram ({} bytes) from {}", n, from),
            }
        }
    }
}

impl Transport for UdpTransport {
    fn send_packet(&self, channel: ChannelAddress, packet: &[u8]) -> Result<(), TransportError> {
        if packet.len() > FRAGMENT_MAX {
            warn!("udp: refusing oversized packet ({} bytes)", packet.len());
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "packet exceeds fragment size",
            )));
        }
        let datagram = encode_datagram(channel, packet);
        match self.socket.try_send_to(&datagram, self.peer) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::Busy),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagram_layout() {
        let d = encode_datagram(ChannelAddress::Cloud, b"hi");
        assert_eq!(&d[..], &[7, b'h', b'i']);
        assert_eq!(decode_datagram(&d), Some((7, &b"hi"[..])));
    }

    #[test]
    fn runt_datagrams_rejected() {
        assert_eq!(decode_datagram(&[]), None);
        assert_eq!(decode_datagram(&[5]), None);
    }

    #[tokio::test]
    async fn packets_reach_peer() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), rx.local_addr().unwrap())
            .await
            .unwrap();
        tx.send_packet(ChannelAddress::MasterRcApp, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = rx.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[5, 1, 2, 3]);
    }
}
