//! init / deinit behavior.

mod helpers;

use helpers::{memory_link, Recorder};
use psdk_link::{ChannelAddress, LinkConfig, LinkError, LowSpeedChannel, MemoryTransport};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn calls_before_init_are_invalid_state() {
    let (transport, link) = memory_link(1024, 1);
    assert!(!link.is_initialized());
    assert!(matches!(link.send(ChannelAddress::Cloud, b"x"), Err(LinkError::InvalidState(_))));
    assert!(matches!(link.drain_once(), Err(LinkError::InvalidState(_))));
    assert!(matches!(link.state(ChannelAddress::Cloud), Err(LinkError::InvalidState(_))));
    assert!(matches!(link.deinit().await, Err(LinkError::InvalidState(_))));
    assert!(transport.packets().is_empty());
}

#[tokio::test]
async fn double_init_is_rejected() {
    let (_t, link) = memory_link(1024, 1);
    link.init().unwrap();
    assert!(matches!(link.init(), Err(LinkError::InvalidState(_))));
    link.deinit().await.unwrap();
}

#[tokio::test]
async fn deinit_releases_everything_and_allows_reinit() {
    let (transport, link) = memory_link(128, 1);
    link.init().unwrap();
    let rec = Recorder::new();
    link.register_receiver(ChannelAddress::Cloud, rec.clone());
    link.send(ChannelAddress::Cloud, &[0u8; 128]).unwrap();
    link.send(ChannelAddress::Cloud, &[1u8; 64]).unwrap();

    link.deinit().await.unwrap();
    assert!(!link.is_initialized());
    assert!(matches!(link.send(ChannelAddress::Cloud, b"x"), Err(LinkError::InvalidState(_))));
    link.dispatch(ChannelAddress::Cloud.wire(), b"late");
    assert_eq!(rec.count(), 0);

    link.init().unwrap();
    let st = link.state(ChannelAddress::Cloud).unwrap();
    assert_eq!(st.buffered, 0);
    assert_eq!(st.sent_total, 0);
    // Receivers do not survive deinit.
    link.dispatch(ChannelAddress::Cloud.wire(), b"again");
    assert_eq!(rec.count(), 0);
    assert_eq!(transport.packets_for(ChannelAddress::Cloud).len(), 1);
    link.deinit().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn deinit_stops_the_drain_task() {
    let (transport, link) = memory_link(128, 1);
    link.init().unwrap();
    link.send(ChannelAddress::Cloud, &[0u8; 128]).unwrap();
    link.send(ChannelAddress::Cloud, &[1u8; 64]).unwrap();
    assert_eq!(link.state(ChannelAddress::Cloud).unwrap().buffered, 64);

    link.deinit().await.unwrap();

    // Several drain intervals pass; nothing left behind may still be sending.
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.packets_for(ChannelAddress::Cloud).len(), 1);
}

#[tokio::test]
async fn invalid_config_refuses_init() {
    let cfg = LinkConfig { drain_interval_s: 0, ..LinkConfig::default() };
    let link = LowSpeedChannel::new(cfg, Arc::new(MemoryTransport::new()));
    assert!(matches!(link.init(), Err(LinkError::InvalidArgument(_))));
    assert!(!link.is_initialized());
}

#[test]
fn init_outside_runtime_fails() {
    let (_t, link) = memory_link(1024, 1);
    assert!(matches!(link.init(), Err(LinkError::InvalidState(_))));
}
