//! Half-duplex arbiter: mutually exclusive TX/RX access to one rig's audio
//! path (§4.16, §5 "Shared resources").
//!
//! Acquisition is atomic on this actor — there is only ever one `Arbiter`
//! per rig and it is never shared across a thread boundary, so a plain
//! `bool` pair is enough state. The `RxMaster` "waiting task is notified
//! `port_ready`" contract (§4.16) is given a concrete shape with
//! `crossbeam::channel`: `request_tx` under `RxMaster` with RX active
//! registers a one-shot `Sender`, and `release_rx` fires every pending one.

use crossbeam::channel::{Receiver, Sender};

use crate::config::DuplexMode;
use crate::errors::FsmError;

/// Outcome of [`Arbiter::request_tx`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxGrant {
    Granted,
    /// RX was active and has been told to abort (`TxMaster` mode).
    GrantedRxAborted,
}

/// A one-shot waiter for the `RxMaster` "port not ready" case: poll
/// [`PortReadyWaiter::ready`] or block on the channel directly.
pub struct PortReadyWaiter {
    receiver: Receiver<()>,
}

impl PortReadyWaiter {
    pub fn ready(&self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}

/// Single-writer arbiter actor (§5) owning TX/RX occupancy for one rig.
pub struct Arbiter {
    mode: DuplexMode,
    tx_active: bool,
    rx_active: bool,
    rx_abort_requested: bool,
    waiters: Vec<Sender<()>>,
}

impl Arbiter {
    pub fn new(mode: DuplexMode) -> Self {
        Self {
            mode,
            tx_active: false,
            rx_active: false,
            rx_abort_requested: false,
            waiters: Vec::new(),
        }
    }

    pub fn mode(&self) -> DuplexMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DuplexMode) {
        self.mode = mode;
    }

    pub fn rx_active(&self) -> bool {
        self.rx_active
    }

    /// RxFSM reports entering/leaving an active reception.
    pub fn set_rx_active(&mut self, active: bool) {
        self.rx_active = active;
        if !active {
            self.rx_abort_requested = false;
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    /// Whether the arbiter has asked RX to abort since the last check
    /// (`TxMaster` mode claiming TX while RX is active, §4.16).
    pub fn take_rx_abort_request(&mut self) -> bool {
        std::mem::take(&mut self.rx_abort_requested)
    }

    /// Acquire TX (§4.16).
    pub fn request_tx(&mut self) -> Result<TxGrant, FsmError> {
        match self.mode {
            DuplexMode::FullDuplex => {
                self.tx_active = true;
                Ok(TxGrant::Granted)
            }
            DuplexMode::HalfDuplexTxMaster => {
                if self.rx_active {
                    self.rx_abort_requested = true;
                    self.tx_active = true;
                    Ok(TxGrant::GrantedRxAborted)
                } else {
                    self.tx_active = true;
                    Ok(TxGrant::Granted)
                }
            }
            DuplexMode::HalfDuplexRxMaster => {
                if self.rx_active {
                    Err(FsmError::PortNotReady)
                } else {
                    self.tx_active = true;
                    Ok(TxGrant::Granted)
                }
            }
        }
    }

    /// Register to be notified once RX returns to idle (`RxMaster`,
    /// §4.16 "the waiting task is notified `port_ready`").
    pub fn wait_for_port_ready(&mut self) -> PortReadyWaiter {
        let (tx, rx) = crossbeam::channel::bounded(1);
        self.waiters.push(tx);
        PortReadyWaiter { receiver: rx }
    }

    pub fn release_tx(&mut self) {
        self.tx_active = false;
    }

    pub fn tx_active(&self) -> bool {
        self.tx_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_duplex_always_grants_immediately() {
        let mut a = Arbiter::new(DuplexMode::FullDuplex);
        a.set_rx_active(true);
        assert_eq!(a.request_tx(), Ok(TxGrant::Granted));
    }

    #[test]
    fn tx_master_aborts_active_rx() {
        let mut a = Arbiter::new(DuplexMode::HalfDuplexTxMaster);
        a.set_rx_active(true);
        assert_eq!(a.request_tx(), Ok(TxGrant::GrantedRxAborted));
        assert!(a.take_rx_abort_request());
        assert!(!a.take_rx_abort_request());
    }

    #[test]
    fn rx_master_refuses_tx_while_rx_active_then_notifies() {
        let mut a = Arbiter::new(DuplexMode::HalfDuplexRxMaster);
        a.set_rx_active(true);
        assert_eq!(a.request_tx(), Err(FsmError::PortNotReady));
        let waiter = a.wait_for_port_ready();
        assert!(!waiter.ready());
        a.set_rx_active(false);
        assert!(waiter.ready());
        assert_eq!(a.request_tx(), Ok(TxGrant::Granted));
    }
}
