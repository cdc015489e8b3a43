// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What we need from a USB host stack, and what it can call back into.

use crate::error::TransferError;

/// Gets handed every descriptor of a configuration while the host stack is
/// enumerating a device.
pub trait DescriptorSink {
    /// `data` starts with the descriptor's `bLength`/`bDescriptorType` and is
    /// only valid for the duration of the call. Nothing promises that it is as
    /// long as `bLength` says.
    fn on_config_descriptor(&mut self, descriptor_type: u8, data: &[u8]);
}

/// A USB host stack driving one attached device.
///
/// Everything is polled from a single loop. `task` must be called every
/// iteration; the others never block for long.
pub trait HostStack {
    /// Brings up the controller. Called once.
    fn begin(&mut self);

    /// Services the stack for one loop iteration. Descriptors found during
    /// enumeration are delivered to `sink` before this returns.
    fn task(&mut self, sink: &mut dyn DescriptorSink);

    /// True once there is a configured device we can send requests to.
    fn is_ready(&self) -> bool;

    /// Sends a control request with no data stage.
    ///
    /// Returns once the request has been handed to the device; this does not
    /// mean the device has done anything about it.
    fn submit_control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<(), TransferError>;
}
