//! Receive-side table: one receiver per channel.

use psdk_proto::ChannelAddress;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::error::Result;

/// Consumer of messages arriving on a channel.
///
/// Runs on the dispatch path shared by every channel, so it must return
/// promptly and must not block. It must not register or unregister
/// receivers from inside the call.
pub trait Receiver: Send + Sync {
    fn on_receive(&self, channel: ChannelAddress, data: &[u8]) -> Result<()>;
}

impl<F> Receiver for F
where
    F: Fn(ChannelAddress, &[u8]) -> Result<()> + Send + Sync,
{
    fn on_receive(&self, channel: ChannelAddress, data: &[u8]) -> Result<()> {
        self(channel, data)
    }
}

type Slot = Option<Arc<dyn Receiver>>;

#[derive(Default)]
pub struct ReceiverRegistry {
    table: RwLock<[Slot; ChannelAddress::COUNT]>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `receiver`, returning the one it replaced.
    pub fn register(&self, channel: ChannelAddress, receiver: Arc<dyn Receiver>) -> Slot {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table[channel.index()].replace(receiver)
    }

    pub fn unregister(&self, channel: ChannelAddress) -> Slot {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table[channel.index()].take()
    }

    pub fn is_registered(&self, channel: ChannelAddress) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table[channel.index()].is_some()
    }

    pub fn clear(&self) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.iter_mut().for_each(|s| *s = None);
    }

    /// Hands `data` to the channel's receiver. Returns false when nobody is
    /// registered and the message was dropped.
    ///
    /// The read guard is held across the call so a concurrent `register`
    /// only returns once the previous receiver is done.
    pub fn deliver(&self, channel: ChannelAddress, data: &[u8]) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let Some(rx) = table[channel.index()].as_ref() else {
            debug!("link: no receiver on {}, dropping {} bytes", channel, data.len());
            return false;
        };
        if let Err(e) = rx.on_receive(channel, data) {
            warn!("link: receiver on {} failed: {}", channel, e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn Receiver>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let rx: Arc<dyn Receiver> = Arc::new(move |_: ChannelAddress, _: &[u8]| -> Result<()> {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (hits, rx)
    }

    #[test]
    fn replace_silences_old_receiver() {
        let reg = ReceiverRegistry::new();
        let (old_hits, old) = counter();
        let (new_hits, new) = counter();

        assert!(reg.register(ChannelAddress::Cloud, old).is_none());
        assert!(reg.deliver(ChannelAddress::Cloud, b"a"));
        assert!(reg.register(ChannelAddress::Cloud, new).is_some());
        assert!(reg.deliver(ChannelAddress::Cloud, b"b"));
        assert!(reg.deliver(ChannelAddress::Cloud, b"c"));

        assert_eq!(old_hits.load(Ordering::SeqCst), 1);
        assert_eq!(new_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregistered_channel_drops() {
        let reg = ReceiverRegistry::new();
        let (hits, rx) = counter();
        reg.register(ChannelAddress::ExtensionPort, rx);
        assert!(!reg.deliver(ChannelAddress::PayloadPort1, b"x"));
        reg.unregister(ChannelAddress::ExtensionPort);
        assert!(!reg.deliver(ChannelAddress::ExtensionPort, b"x"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn receiver_error_is_contained() {
        let reg = ReceiverRegistry::new();
        reg.register(
            ChannelAddress::MasterRcApp,
            Arc::new(|_: ChannelAddress, _: &[u8]| -> Result<()> {
                Err(crate::LinkError::Unknown("boom".into()))
            }),
        );
        assert!(reg.deliver(ChannelAddress::MasterRcApp, b"x"));
    }
}
