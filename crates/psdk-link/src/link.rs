//! The low-speed data channel: send path, drain task and inbound dispatch.
//!
//! Each channel owns a slot with its own mutex. The send path only ever
//! locks the slot of the channel it sends on, so traffic on one channel
//! never waits on another. The one lock shared by all channels is the
//! lifecycle `RwLock`: senders take its read side just long enough to clone
//! the slot table, and only `init`/`deinit` take the write side. A single
//! background task drains every slot's flow-control buffer once per drain
//! interval.

use bytes::Bytes;
use psdk_proto::{ChannelAddress, ChannelState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::buffer::FlowBuffer;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::fragment::{self, MAX_SEND_LEN};
use crate::registry::{Receiver, ReceiverRegistry};
use crate::transport::{Transport, TransportError};
use crate::window::BandwidthWindow;

#[derive(Debug)]
struct SlotInner {
    buffer: FlowBuffer,
    /// Bytes accepted from callers.
    submitted: BandwidthWindow,
    /// Bytes handed to the transport.
    sent: BandwidthWindow,
    /// Drain task holds popped fragments outside the lock.
    draining: bool,
    sent_total: u64,
    dropped_total: u64,
}

#[derive(Debug)]
struct ChannelSlot {
    address: ChannelAddress,
    limit: usize,
    inner: Mutex<SlotInner>,
}

impl ChannelSlot {
    fn new(address: ChannelAddress, limit: u32) -> Self {
        Self {
            address,
            limit: limit as usize,
            inner: Mutex::new(SlotInner {
                buffer: FlowBuffer::default(),
                submitted: BandwidthWindow::new(),
                sent: BandwidthWindow::new(),
                draining: false,
                sent_total: 0,
                dropped_total: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Running {
    slots: Arc<[ChannelSlot]>,
    shutdown: oneshot::Sender<()>,
    drain_task: JoinHandle<()>,
}

pub struct LowSpeedChannel {
    config: LinkConfig,
    transport: Arc<dyn Transport>,
    receivers: ReceiverRegistry,
    running: RwLock<Option<Running>>,
}

impl LowSpeedChannel {
    pub fn new(config: LinkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            receivers: ReceiverRegistry::new(),
            running: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.running.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Allocates channel slots and starts the drain task on the current
    /// tokio runtime.
    pub fn init(&self) -> Result<()> {
        self.config.validate()?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| LinkError::InvalidState("init requires a tokio runtime"))?;

        let mut running = self.running.write().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(LinkError::InvalidState("already initialized"));
        }

        let slots: Arc<[ChannelSlot]> = ChannelAddress::ALL
            .into_iter()
            .map(|c| ChannelSlot::new(c, self.config.bandwidth_for(c)))
            .collect();

        let (shutdown, shutdown_rx) = oneshot::channel();
        let drain_task = handle.spawn(drain_loop(
            slots.clone(),
            self.transport.clone(),
            self.config.drain_interval(),
            shutdown_rx,
        ));

        info!(
            "link: initialized {} channels, drain every {}s",
            slots.len(),
            self.config.drain_interval_s
        );
        *running = Some(Running { slots, shutdown, drain_task });
        Ok(())
    }

    /// Stops the drain task, waits for it to finish, then releases every
    /// channel. Data still buffered is discarded and receivers are cleared.
    pub async fn deinit(&self) -> Result<()> {
        let running = self
            .running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(LinkError::InvalidState("not initialized"))?;

        let _ = running.shutdown.send(());
        if let Err(e) = running.drain_task.await {
            warn!("drain: task ended abnormally: {}", e);
        }

        let discarded: usize = running.slots.iter().map(|s| s.lock().buffer.clear()).sum();
        if discarded > 0 {
            info!("link: deinit discarded {} buffered bytes", discarded);
        }
        self.receivers.clear();
        info!("link: deinitialized");
        Ok(())
    }

    /// Read guard is dropped before returning; readers never block each other.
    fn slots(&self) -> Result<Arc<[ChannelSlot]>> {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.slots.clone())
            .ok_or(LinkError::InvalidState("not initialized"))
    }

    /// Queues `data` for `channel`.
    ///
    /// `Ok` means accepted for transmission, not delivered. When the channel
    /// is over its bandwidth, packets go to the flow-control buffer; whatever
    /// does not fit there is dropped without an error.
    ///
    /// An unavailable transport is `InvalidState` whether or not the channel
    /// has data queued. A transport error fails the call only while none of
    /// its fragments has gone out; after that the remainder is buffered.
    pub fn send(&self, channel: ChannelAddress, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(LinkError::InvalidArgument("empty payload".into()));
        }
        if data.len() > MAX_SEND_LEN {
            return Err(LinkError::InvalidArgument(format!(
                "payload of {} bytes exceeds {}",
                data.len(),
                MAX_SEND_LEN
            )));
        }
        let slots = self.slots()?;
        let slot = &slots[channel.index()];

        // Checked up front so the answer does not depend on what is queued.
        if !self.transport.is_available() {
            return Err(LinkError::InvalidState("transport unavailable"));
        }

        let mut inner = slot.lock();
        let now = Instant::now();

        // Anything already queued must go out first.
        let mut deferred = inner.draining || !inner.buffer.is_empty();
        let mut sent_any = false;
        let mut dropped = 0;

        for frag in fragment::fragments(data) {
            if !deferred && inner.sent.available(now, slot.limit) >= frag.len() {
                match self.transport.send_packet(channel, frag) {
                    Ok(()) => {
                        inner.sent.record(now, frag.len());
                        inner.sent_total += frag.len() as u64;
                        sent_any = true;
                        continue;
                    }
                    Err(TransportError::Busy) => {
                        debug!("link: transport busy on {}, buffering", channel);
                    }
                    // Nothing of this message is out yet: fail cleanly.
                    Err(e) if !sent_any => return Err(e.into()),
                    // Part of it is on the wire; the drain task sends the rest.
                    Err(e) => {
                        warn!("link: {} send failed mid-message, buffering the rest: {}", channel, e);
                    }
                }
            }
            deferred = true;
            dropped += frag.len() - inner.buffer.push(frag);
        }
        inner.submitted.record(now, data.len());

        if dropped > 0 {
            inner.dropped_total += dropped as u64;
            debug!(
                "link: flow buffer full on {}, dropped {} bytes (total {})",
                channel, dropped, inner.dropped_total
            );
        }
        Ok(())
    }

    /// Like [`send`](Self::send) for an address taken off the wire or from
    /// user input.
    pub fn send_raw(&self, address: u8, data: &[u8]) -> Result<()> {
        let channel = ChannelAddress::try_from(address)?;
        self.send(channel, data)
    }

    /// Installs the receiver for `channel`, replacing any previous one.
    pub fn register_receiver(&self, channel: ChannelAddress, receiver: Arc<dyn Receiver>) {
        if self.receivers.register(channel, receiver).is_some() {
            debug!("link: replaced receiver on {}", channel);
        }
    }

    pub fn register_raw(&self, address: u8, receiver: Arc<dyn Receiver>) -> Result<()> {
        let channel = ChannelAddress::try_from(address)?;
        self.register_receiver(channel, receiver);
        Ok(())
    }

    pub fn unregister_receiver(&self, channel: ChannelAddress) -> bool {
        self.receivers.unregister(channel).is_some()
    }

    /// Entry point for the transport's receive path: `data` is one complete
    /// message addressed to `address`.
    pub fn dispatch(&self, address: u8, data: &[u8]) {
        let Ok(channel) = ChannelAddress::try_from(address) else {
            debug!("link: dropping message for unknown address 0x{:02x}", address);
            return;
        };
        if !self.is_initialized() {
            debug!("link: not initialized, dropping message for {}", channel);
            return;
        }
        if data.len() > u16::MAX as usize {
            warn!("link: dropping oversized message ({} bytes) for {}", data.len(), channel);
            return;
        }
        self.receivers.deliver(channel, data);
    }

    /// Runs one drain pass over every channel. Returns the number of bytes
    /// handed to the transport.
    pub fn drain_once(&self) -> Result<usize> {
        let slots = self.slots()?;
        Ok(drain_slots(&slots, self.transport.as_ref()))
    }

    pub fn state(&self, channel: ChannelAddress) -> Result<ChannelState> {
        let slots = self.slots()?;
        Ok(snapshot(&slots[channel.index()]))
    }

    pub fn states(&self) -> Result<Vec<ChannelState>> {
        let slots = self.slots()?;
        Ok(slots.iter().map(snapshot).collect())
    }
}

fn snapshot(slot: &ChannelSlot) -> ChannelState {
    let now = Instant::now();
    let mut inner = slot.lock();
    ChannelState {
        ts_unix_ms: (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
        channel: slot.address,
        bandwidth_limit: slot.limit as u32,
        bandwidth_before_flow_control: inner.submitted.used(now) as u32,
        bandwidth_after_flow_control: inner.sent.used(now) as u32,
        busy: !inner.buffer.is_empty(),
        buffered: inner.buffer.len(),
        sent_total: inner.sent_total,
        dropped_total: inner.dropped_total,
    }
}

async fn drain_loop(
    slots: Arc<[ChannelSlot]>,
    transport: Arc<dyn Transport>,
    period: std::time::Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let n = drain_slots(&slots, transport.as_ref());
                if n > 0 {
                    debug!("drain: forwarded {} bytes", n);
                }
            }
        }
    }
    debug!("drain: stopped");
}

fn drain_slots(slots: &[ChannelSlot], transport: &dyn Transport) -> usize {
    slots.iter().map(|slot| drain_slot(slot, transport)).sum()
}

fn drain_slot(slot: &ChannelSlot, transport: &dyn Transport) -> usize {
    let batch: Vec<Bytes> = {
        let mut inner = slot.lock();
        if inner.draining || inner.buffer.is_empty() {
            return 0;
        }
        let mut budget = inner.sent.available(Instant::now(), slot.limit);
        let mut batch = Vec::new();
        while let Some(len) = inner.buffer.front_len() {
            if len > budget {
                break;
            }
            budget -= len;
            batch.extend(inner.buffer.pop());
        }
        if batch.is_empty() {
            return 0;
        }
        inner.draining = true;
        batch
    };

    // Senders see `draining` and queue behind us while the lock is released.
    let mut forwarded = 0;
    let mut failed_at = None;
    for (i, frag) in batch.iter().enumerate() {
        match transport.send_packet(slot.address, frag) {
            Ok(()) => forwarded += frag.len(),
            Err(e) => {
                warn!("drain: {} forwarding failed, retrying next tick: {}", slot.address, e);
                failed_at = Some(i);
                break;
            }
        }
    }

    let mut inner = slot.lock();
    inner.sent.record(Instant::now(), forwarded);
    inner.sent_total += forwarded as u64;
    if let Some(i) = failed_at {
        let mut batch = batch;
        let trimmed = inner.buffer.requeue_front(batch.split_off(i));
        inner.dropped_total += trimmed as u64;
    }
    inner.draining = false;
    forwarded
}
