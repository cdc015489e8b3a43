// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Everything the main loop owns, and the one function it calls.

use crate::classifier::Classifier;
use crate::config::{ControllerConfig, Millis};
use crate::controller::{PortPowerController, TickOutcome};
use crate::host::HostStack;

pub struct App<H> {
    host: H,
    classifier: Classifier,
    controller: PortPowerController,
}

impl<H: HostStack> App<H> {
    pub fn new(host: H, config: ControllerConfig) -> Self {
        Self {
            host,
            classifier: Classifier::new(),
            controller: PortPowerController::new(config),
        }
    }

    /// Starts the host stack. Call once, before the first `tick`.
    pub fn begin(&mut self) {
        self.host.begin();
    }

    /// One loop iteration: service the host stack (which may feed descriptors
    /// to the classifier), then give the controller its turn.
    pub fn tick(&mut self, now: Millis) -> TickOutcome {
        self.host.task(&mut self.classifier);
        self.controller.tick(&mut self.host, now)
    }

    pub fn controller(&self) -> &PortPowerController {
        &self.controller
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
