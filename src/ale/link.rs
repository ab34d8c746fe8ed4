//! ALE Link FSM: 8 states driving LBT/LBR, response timing, and
//! termination (§3 "ALE Link state", §4.13).
//!
//! Modeled the way the rest of this crate's FSMs are: a synchronous
//! `step`/event-driven object owned by its driving task (§5 "single-writer,
//! cooperative, no pre-emption mid-operation") rather than an async state
//! machine — timers are deadlines the caller polls, not spawned tasks.

use std::time::{Duration, Instant};

use crate::ale::pdu::Pdu;
use crate::ale::waveform::WaleMode;
use crate::config::TimeoutConfig;
use crate::errors::AleError;

/// The 8 ALE link states (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Scanning,
    Lbt,
    Calling,
    Lbr,
    Responding,
    Linked,
    Terminating,
}

/// `we_are` at `Linked` distinguishes the station that placed the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Responder,
}

/// Cached negotiated parameters once `Linked` (§3 `link_info`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkInfo {
    pub waveform: WaleMode,
    pub snr_db: f64,
}

/// Reason attached to a `link_terminated` event (§8 scenario 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Local,
    Remote(u8),
    Timeout,
    ChannelBusy,
}

/// Events the link FSM reports to the owning task, analogous to the
/// `tx_status`/`rx_data` events in §6 but for the link layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    CallFailed,
    Linked { we_are: Role },
    LinkTerminated { we_are: Role, reason: TerminationReason },
}

struct Timer {
    deadline: Instant,
}

/// Single-writer ALE link state machine (§3, §4.13).
pub struct Link {
    state: LinkState,
    pub self_addr: u16,
    pub remote_addr: Option<u16>,
    waveform: WaleMode,
    timeouts: TimeoutConfig,
    timer: Option<Timer>,
    role: Option<Role>,
    link_info: Option<LinkInfo>,
}

impl Link {
    pub fn new(self_addr: u16, timeouts: TimeoutConfig) -> Self {
        Self {
            state: LinkState::Idle,
            self_addr,
            remote_addr: None,
            waveform: WaleMode::Fast,
            timeouts,
            timer: None,
            role: None,
            link_info: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    fn arm_timer(&mut self, duration: Duration) {
        self.timer = Some(Timer {
            deadline: Instant::now() + duration,
        });
    }

    fn clear(&mut self) {
        self.remote_addr = None;
        self.link_info = None;
        self.role = None;
        self.timer = None;
    }

    /// `scan` (§4.13 Idle row).
    pub fn scan(&mut self) -> Result<(), AleError> {
        self.require(LinkState::Idle, "scan")?;
        self.state = LinkState::Scanning;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), AleError> {
        self.require(LinkState::Scanning, "stop")?;
        self.state = LinkState::Idle;
        self.clear();
        Ok(())
    }

    /// `call(dst)`: Idle -> Lbt, arms `t_lbt` (§4.13).
    pub fn call(&mut self, dst: u16, waveform: WaleMode) -> Result<(), AleError> {
        self.require(LinkState::Idle, "call")?;
        self.remote_addr = Some(dst);
        self.waveform = waveform;
        self.role = Some(Role::Caller);
        self.state = LinkState::Lbt;
        self.arm_timer(self.timeouts.t_lbt);
        Ok(())
    }

    /// Channel-sense result while in `Lbt`: `true` clear -> advance to
    /// `Calling` once the timer elapses (driven by [`Self::poll_timer`]);
    /// `false` busy -> immediate `Idle` with `call_failed` (§4.13).
    pub fn channel_busy(&mut self) -> Result<LinkEvent, AleError> {
        self.require_any(&[LinkState::Lbt, LinkState::Lbr], "channel_busy")?;
        self.state = LinkState::Idle;
        self.clear();
        Ok(LinkEvent::CallFailed)
    }

    /// A received `LsuReq` addressed to us: Idle/Scanning -> Lbr (§4.13).
    pub fn on_lsu_req(&mut self, from: u16) -> Result<(), AleError> {
        self.require_any(&[LinkState::Idle, LinkState::Scanning], "on_lsu_req")?;
        self.remote_addr = Some(from);
        self.role = Some(Role::Responder);
        self.state = LinkState::Lbr;
        self.arm_timer(self.timeouts.t_lbr);
        Ok(())
    }

    /// Advance past an elapsed timer: `Lbt` -> `Calling`, `Lbr` ->
    /// `Responding`, `Calling`'s response wait -> timeout (LsuTerm + Idle),
    /// `Linked`'s inactivity timer -> reset (§4.13).
    pub fn poll_timer(&mut self, now: Instant) -> Result<Option<LinkEvent>, AleError> {
        let Some(timer) = &self.timer else {
            return Ok(None);
        };
        if now < timer.deadline {
            return Ok(None);
        }
        match self.state {
            LinkState::Lbt => {
                self.state = LinkState::Calling;
                self.arm_timer(self.timeouts.t_response);
                Ok(None)
            }
            LinkState::Lbr => {
                self.state = LinkState::Responding;
                self.arm_timer(self.timeouts.t_tune + self.timeouts.t_handshake);
                Ok(None)
            }
            LinkState::Calling => {
                let we_are = self.role.unwrap_or(Role::Caller);
                self.state = LinkState::Idle;
                self.clear();
                Ok(Some(LinkEvent::LinkTerminated {
                    we_are,
                    reason: TerminationReason::Timeout,
                }))
            }
            LinkState::Linked => {
                self.arm_timer(self.timeouts.t_activity);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Notify the FSM that a queued transmission (LsuConf while
    /// `Responding`, or LsuTerm while `Terminating`) completed (§4.13).
    pub fn on_tx_done(&mut self) -> Result<Option<LinkEvent>, AleError> {
        match self.state {
            LinkState::Responding => {
                self.state = LinkState::Linked;
                self.arm_timer(self.timeouts.t_activity);
                let we_are = Role::Responder;
                self.link_info = Some(LinkInfo {
                    waveform: self.waveform,
                    snr_db: 0.0,
                });
                Ok(Some(LinkEvent::Linked { we_are }))
            }
            LinkState::Terminating => {
                let we_are = self.role.unwrap_or(Role::Caller);
                self.state = LinkState::Idle;
                self.clear();
                Ok(Some(LinkEvent::LinkTerminated {
                    we_are,
                    reason: TerminationReason::Local,
                }))
            }
            _ => Err(AleError::InvalidLinkTransition {
                action: "on_tx_done",
                state: state_name(self.state),
            }),
        }
    }

    /// A received PDU while `Calling`: a matching `LsuConf` links us; an
    /// `LsuTerm` aborts to `Idle` (§4.13).
    pub fn on_pdu(&mut self, pdu: &Pdu) -> Result<Option<LinkEvent>, AleError> {
        match (self.state, pdu) {
            (LinkState::Calling, Pdu::LsuConf { caller, .. })
                if Some(*caller) == self.remote_addr =>
            {
                self.state = LinkState::Linked;
                self.arm_timer(self.timeouts.t_activity);
                self.link_info = Some(LinkInfo {
                    waveform: self.waveform,
                    snr_db: 0.0,
                });
                Ok(Some(LinkEvent::Linked { we_are: Role::Caller }))
            }
            (LinkState::Calling, Pdu::LsuTerm { reason, .. }) => {
                self.state = LinkState::Idle;
                self.clear();
                Ok(Some(LinkEvent::LinkTerminated {
                    we_are: Role::Caller,
                    reason: TerminationReason::Remote(*reason),
                }))
            }
            (LinkState::Linked, Pdu::LsuTerm { reason, .. }) => {
                let we_are = self.role.unwrap_or(Role::Caller);
                self.state = LinkState::Idle;
                self.clear();
                Ok(Some(LinkEvent::LinkTerminated {
                    we_are,
                    reason: TerminationReason::Remote(*reason),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Local request to tear down a `Linked` session (§4.13).
    pub fn terminate(&mut self) -> Result<(), AleError> {
        self.require(LinkState::Linked, "terminate")?;
        self.state = LinkState::Terminating;
        Ok(())
    }

    pub fn link_info(&self) -> Option<LinkInfo> {
        self.link_info
    }

    fn require(&self, expected: LinkState, action: &'static str) -> Result<(), AleError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AleError::InvalidLinkTransition {
                action,
                state: state_name(self.state),
            })
        }
    }

    fn require_any(&self, expected: &[LinkState], action: &'static str) -> Result<(), AleError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(AleError::InvalidLinkTransition {
                action,
                state: state_name(self.state),
            })
        }
    }
}

fn state_name(state: LinkState) -> &'static str {
    match state {
        LinkState::Idle => "Idle",
        LinkState::Scanning => "Scanning",
        LinkState::Lbt => "Lbt",
        LinkState::Calling => "Calling",
        LinkState::Lbr => "Lbr",
        LinkState::Responding => "Responding",
        LinkState::Linked => "Linked",
        LinkState::Terminating => "Terminating",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_loopback_reaches_linked_on_both_sides() {
        let timeouts = TimeoutConfig::default();
        let mut a = Link::new(0x1234, timeouts);
        let mut b = Link::new(0x5678, timeouts);

        b.scan().unwrap();
        a.call(0x5678, WaleMode::Fast).unwrap();
        assert_eq!(a.state(), LinkState::Lbt);

        let now = Instant::now() + Duration::from_millis(250);
        a.poll_timer(now).unwrap();
        assert_eq!(a.state(), LinkState::Calling);

        let req = Pdu::LsuReq {
            caller: 0x1234,
            called: 0x5678,
            voice: false,
        };
        b.on_lsu_req(req.caller()).unwrap();
        assert_eq!(b.state(), LinkState::Lbr);

        let now2 = now + Duration::from_millis(250);
        b.poll_timer(now2).unwrap();
        assert_eq!(b.state(), LinkState::Responding);

        let linked_event = b.on_tx_done().unwrap().unwrap();
        assert_eq!(linked_event, LinkEvent::Linked { we_are: Role::Responder });

        let conf = Pdu::LsuConf {
            caller: 0x1234,
            called: 0x5678,
            voice: false,
        };
        let a_event = a.on_pdu(&conf).unwrap().unwrap();
        assert_eq!(a_event, LinkEvent::Linked { we_are: Role::Caller });

        assert_eq!(a.state(), LinkState::Linked);
        assert_eq!(b.state(), LinkState::Linked);

        a.terminate().unwrap();
        let a_term = a.on_tx_done().unwrap().unwrap();
        assert_eq!(
            a_term,
            LinkEvent::LinkTerminated {
                we_are: Role::Caller,
                reason: TerminationReason::Local
            }
        );
        assert_eq!(a.state(), LinkState::Idle);

        let term_pdu = Pdu::LsuTerm {
            caller: 0x1234,
            called: 0x5678,
            reason: 0,
        };
        let b_term = b.on_pdu(&term_pdu).unwrap().unwrap();
        assert_eq!(
            b_term,
            LinkEvent::LinkTerminated {
                we_are: Role::Responder,
                reason: TerminationReason::Remote(0)
            }
        );
        assert_eq!(b.state(), LinkState::Idle);
    }

    #[test]
    fn channel_busy_during_lbt_fails_the_call() {
        let mut a = Link::new(0x1234, TimeoutConfig::default());
        a.call(0x5678, WaleMode::Fast).unwrap();
        let event = a.channel_busy().unwrap();
        assert_eq!(event, LinkEvent::CallFailed);
        assert_eq!(a.state(), LinkState::Idle);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut a = Link::new(0x1234, TimeoutConfig::default());
        assert!(a.terminate().is_err());
    }
}
