//! Host-adapter event bus: filtered broadcast with weakly-held subscribers
//! (§4.17, §6 "Events delivered").
//!
//! Single-threaded, matching this crate's cooperative-actor model (§5): a
//! `Subscription` is an `Rc`-owned queue, the `EventBus` keeps only a
//! `Weak` reference to it and prunes dead subscribers on every publish, so
//! a subscriber's lifetime is entirely governed by the handle the host
//! adapter holds — exactly "removed when their lifetime ends" (§4.17).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::ale::link::{LinkEvent, Role, TerminationReason};
use crate::config::DuplexMode;
use crate::errors::AleError;
use crate::miniprobe::ChannelEstimate;
use crate::tables::{Bandwidth, ConstraintLength, InterleaverType, Waveform};
use crate::txfsm::PacketOrder;

/// Which side of the link an event belongs to, for filtered subscriptions
/// (§6 "Shared: ... `subscribe(filter)`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Tx,
    Rx,
    All,
}

impl EventFilter {
    fn matches(self, event: &ModemEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Tx => event.side() != Side::Rx,
            EventFilter::Rx => event.side() != Side::Tx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Tx,
    Rx,
    Both,
}

/// RX carrier lifecycle reported alongside `rx_carrier` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierState {
    Detected,
    Lost,
    Receiving,
}

/// Parameters accompanying `rx_carrier` once a WID has resolved them (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierParams {
    pub waveform: Waveform,
    pub interleaver: InterleaverType,
    pub constraint_length: ConstraintLength,
    pub bandwidth: Bandwidth,
    pub data_rate_bps: usize,
}

/// Summary payload for `rx_complete` (§6, SPEC_FULL.md B: shaped here since
/// spec.md names it without a concrete shape).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RxStats {
    pub symbols_processed: usize,
    pub frames_received: usize,
    pub eot_detected: bool,
    pub final_estimate: Option<ChannelEstimate>,
}

/// Every event the core can deliver to a host adapter (§6), plus the ALE
/// link events (§4.13) — both flow through the same filtered bus.
#[derive(Debug, Clone, PartialEq)]
pub enum ModemEvent {
    TxStatus {
        queued_bytes: usize,
        free_bytes: usize,
        data_rate_bps: usize,
        blocking_factor: usize,
    },
    TxUnderrun,
    TxAudio(Vec<i16>),
    RxCarrier(CarrierState, Option<CarrierParams>),
    RxData(Vec<u8>, PacketOrder),
    WidDecoded(CarrierParams),
    RxComplete(RxStats),
    CallFailed,
    Linked { we_are: Role },
    LinkTerminated { we_are: Role, reason: TerminationReason },
    DecodeFailed(AleError),
    DuplexModeChanged(DuplexMode),
}

impl ModemEvent {
    fn side(&self) -> Side {
        match self {
            ModemEvent::TxStatus { .. } | ModemEvent::TxUnderrun | ModemEvent::TxAudio(_) => Side::Tx,
            ModemEvent::RxCarrier(..) | ModemEvent::RxData(..) | ModemEvent::WidDecoded(_) | ModemEvent::RxComplete(_) => {
                Side::Rx
            }
            ModemEvent::CallFailed
            | ModemEvent::Linked { .. }
            | ModemEvent::LinkTerminated { .. }
            | ModemEvent::DecodeFailed(_)
            | ModemEvent::DuplexModeChanged(_) => Side::Both,
        }
    }
}

impl From<LinkEvent> for ModemEvent {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::CallFailed => ModemEvent::CallFailed,
            LinkEvent::Linked { we_are } => ModemEvent::Linked { we_are },
            LinkEvent::LinkTerminated { we_are, reason } => ModemEvent::LinkTerminated { we_are, reason },
        }
    }
}

type Queue = Rc<RefCell<VecDeque<ModemEvent>>>;

/// A live subscription handle. Dropping it is the only way to unsubscribe
/// — the bus holds no strong reference.
pub struct Subscription {
    queue: Queue,
}

impl Subscription {
    /// Drain every event queued since the last call.
    pub fn drain(&self) -> Vec<ModemEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// Per-rig broadcast bus (§4.17). Owned by the `Modem`/actor that produces
/// events; `publish` is called from FSM message handlers as they emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(EventFilter, Weak<RefCell<VecDeque<ModemEvent>>>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, filter: EventFilter) -> Subscription {
        let queue: Queue = Rc::new(RefCell::new(VecDeque::new()));
        self.subscribers.push((filter, Rc::downgrade(&queue)));
        Subscription { queue }
    }

    /// Broadcast `event` to every live subscriber whose filter matches,
    /// pruning any whose handle has been dropped (§4.17).
    pub fn publish(&mut self, event: ModemEvent) {
        self.subscribers.retain(|(filter, weak)| match weak.upgrade() {
            Some(queue) => {
                if filter.matches(&event) {
                    queue.borrow_mut().push_back(event.clone());
                }
                true
            }
            None => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|(_, w)| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_subscriber_only_receives_matching_side() {
        let mut bus = EventBus::new();
        let tx_sub = bus.subscribe(EventFilter::Tx);
        let rx_sub = bus.subscribe(EventFilter::Rx);
        let all_sub = bus.subscribe(EventFilter::All);

        bus.publish(ModemEvent::TxUnderrun);
        bus.publish(ModemEvent::RxData(vec![1, 2, 3], PacketOrder::Last));

        assert_eq!(tx_sub.drain(), vec![ModemEvent::TxUnderrun]);
        assert_eq!(rx_sub.drain(), vec![ModemEvent::RxData(vec![1, 2, 3], PacketOrder::Last)]);
        assert_eq!(all_sub.drain().len(), 2);
    }

    #[test]
    fn dropped_subscription_is_pruned_on_next_publish() {
        let mut bus = EventBus::new();
        {
            let _sub = bus.subscribe(EventFilter::All);
            assert_eq!(bus.subscriber_count(), 1);
        }
        bus.publish(ModemEvent::TxUnderrun);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
