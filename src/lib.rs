// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub port power policy.
//!
//! Some USB hubs come up with their downstream ports switched off and expect
//! the host to turn them on, one hub class request per port. Most host stacks
//! do this as part of a full hub driver. This crate is for when you have a
//! host stack that will enumerate the hub for you but has no hub driver, and
//! all you want is for the ports to get power.
//!
//! The pieces:
//!
//! - [`host::HostStack`] is what we need from the USB host stack: a way to
//!   service it, ask whether a device is ready, and send a no-data control
//!   request. The stack hands us descriptors through
//!   [`host::DescriptorSink`] while it enumerates.
//! - [`classifier::Classifier`] is that sink. It logs whether what just got
//!   plugged in is a hub or a mass storage device.
//! - [`controller::PortPowerController`] waits for the device, powers port 1,
//!   retrying every couple of seconds, and then powers the rest.
//! - [`app::App`] owns the above and is ticked from the main loop.
//!
//! Everything runs from a single cooperative loop. Nothing here blocks,
//! allocates, or needs a lock. The crate is `no_std` and builds on a host so
//! the policy can be tested without hardware; the RP2040 firmware binary in
//! this package supplies the real host stack.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod request;

pub use app::App;
pub use config::{ControllerConfig, Millis};
pub use controller::{PortPowerController, TickOutcome};
pub use error::{DescriptorError, Error, TransferError};
pub use host::{DescriptorSink, HostStack};
pub use request::{HubPort, PortPowerRequest};
