// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Port power controller.
//!
//! The hub we drive comes up with its downstream ports unpowered, and will sit
//! there forever unless someone sends it `SetFeature(PORT_POWER)` for each
//! port. This is that someone.
//!
//! The whole thing is one flag and one timestamp, advanced by [`tick`] from
//! the main loop:
//!
//! - Until port 1 has been powered, at most one attempt is made per retry
//!   interval (2 s by default), no matter how often we're ticked.
//! - An attempt first asks the host stack whether a device is ready. If not,
//!   that's the attempt; we wait for the next interval.
//! - If it is, we send the request for port 1. If that goes through, we're
//!   done for good, and we immediately send the same request for ports 2, 3
//!   and 4, in that order.
//!
//! Note the asymmetry: port 1 is retried until it works, but ports 2-4 get
//! exactly one shot each, and their results are not acted on. The hub model
//! this was written for is fine with that once port 1 has taken, and nobody
//! has established whether retrying the others would be better or worse, so
//! it stays this way until someone has a hub that says otherwise.
//!
//! There is no give-up path. An always-on box should keep trying.
//!
//! [`tick`]: PortPowerController::tick

use log::{debug, info, warn};

use crate::config::{elapsed_ms, ControllerConfig, Millis};
use crate::error::TransferError;
use crate::host::HostStack;
use crate::request::{HubPort, PortPowerRequest};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    WaitingForDevice,
    /// Port 1 has been powered. Terminal.
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControllerState {
    /// Set once, when port 1 first accepts the command; never cleared.
    pub ports_configured: bool,
    /// Clock reading at the last attempt, for the retry gate.
    pub last_attempt: Millis,
}

/// What a call to [`PortPowerController::tick`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Already done; nothing happened.
    Done,
    /// Too soon after the last attempt; nothing happened.
    Throttled,
    /// Attempted, but the host stack has no device ready.
    Waiting,
    /// Port 1 was rejected. Will retry after the interval.
    Failed(TransferError),
    /// Port 1 accepted, and ports 2-4 were sent.
    Powered,
}

pub struct PortPowerController {
    state: ControllerState,
    config: ControllerConfig,
}

impl PortPowerController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            state: ControllerState {
                ports_configured: false,
                last_attempt: 0,
            },
            config,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        if self.state.ports_configured {
            Phase::Done
        } else {
            Phase::WaitingForDevice
        }
    }

    pub fn ports_configured(&self) -> bool {
        self.state.ports_configured
    }

    /// Advances the state machine. Call once per loop iteration with the
    /// current clock reading.
    pub fn tick<H: HostStack + ?Sized>(&mut self, host: &mut H, now: Millis) -> TickOutcome {
        if self.state.ports_configured {
            return TickOutcome::Done;
        }
        if elapsed_ms(now, self.state.last_attempt) <= self.config.retry_interval_ms {
            return TickOutcome::Throttled;
        }
        self.state.last_attempt = now;

        if !host.is_ready() {
            if self.config.should_log_waiting(now) {
                info!("waiting for hub to be ready...");
            }
            return TickOutcome::Waiting;
        }

        info!("device connected, sending port power command");
        match PortPowerRequest::new(HubPort::PRIMARY).submit(host) {
            Ok(()) => {
                info!(">>> port 1 power on command sent <<<");
                self.state.ports_configured = true;
                for port in HubPort::secondaries() {
                    if let Err(e) = PortPowerRequest::new(port).submit(host) {
                        debug!("port {} power on: {} ({:#x})", port.number(), e, e.code());
                    }
                }
                TickOutcome::Powered
            }
            Err(e) => {
                warn!("command failed (error {:#x}: {}), retrying", e.code(), e);
                TickOutcome::Failed(e)
            }
        }
    }
}
