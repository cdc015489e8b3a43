// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RP2040 support for the firmware binary: the pieces `main` needs that
//! aren't policy. None of this is part of the library.

pub mod timer;
pub mod uart;
pub mod usb_host;

/// Raise the GPIO pin with index `pin`.
///
/// The pin must already be configured as an SIO output.
#[inline(always)]
pub fn raise_pin(sio: &rp2040_pac::SIO, pin: u8) {
    sio.gpio_out_set.write(|w| unsafe { w.bits(1 << pin) });
}

/// Lower the GPIO pin with index `pin`.
///
/// The pin must already be configured as an SIO output.
#[inline(always)]
pub fn lower_pin(sio: &rp2040_pac::SIO, pin: u8) {
    sio.gpio_out_clr.write(|w| unsafe { w.bits(1 << pin) });
}

/// Drive `pin` to `level`.
#[inline(always)]
pub fn set_pin(sio: &rp2040_pac::SIO, pin: u8, level: bool) {
    if level {
        raise_pin(sio, pin);
    } else {
        lower_pin(sio, pin);
    }
}
