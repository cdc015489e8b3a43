// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monotonic time from the RP2040's 64-bit microsecond TIMER.

use hub_power::config::{elapsed_ms, Millis};

/// Handle to the running TIMER.
///
/// Only the raw counter registers are ever touched, and reading those has no
/// side effects, so the handle is `Copy` and can be given to anyone who needs
/// the time.
#[derive(Copy, Clone)]
pub struct Timer {
    _claimed: (),
}

impl Timer {
    /// Starts the microsecond tick and takes TIMER out of reset.
    ///
    /// Assumes clk_ref is running from the 12 MHz crystal.
    pub fn start(
        _timer: rp2040_pac::TIMER,
        resets: &rp2040_pac::RESETS,
        watchdog: &rp2040_pac::WATCHDOG,
    ) -> Self {
        // TIMER doesn't count clock cycles, it counts ticks from the watchdog's
        // tick generator, which divides clk_ref down. 12 cycles of a 12 MHz
        // reference is one microsecond.
        watchdog.tick.write(|w| unsafe { w.cycles().bits(12).enable().set_bit() });

        resets.reset.modify(|_, w| w.timer().clear_bit());
        while !resets.reset_done.read().timer().bit() {}

        Self { _claimed: () }
    }

    fn regs(&self) -> &'static rp2040_pac::timer::RegisterBlock {
        // Safety: we hold the only claim on TIMER (we consumed it in `start`)
        // and only read the raw counter.
        unsafe { &*rp2040_pac::TIMER::ptr() }
    }

    /// Microseconds since the timer came out of reset.
    pub fn micros(&self) -> u64 {
        // The raw registers aren't latched as a pair, so reread the high word
        // to catch the low word rolling over between reads.
        let t = self.regs();
        loop {
            let hi = t.timerawh.read().bits();
            let lo = t.timerawl.read().bits();
            if t.timerawh.read().bits() == hi {
                return u64::from(hi) << 32 | u64::from(lo);
            }
        }
    }

    /// Milliseconds, truncated to 32 bits. Wraps after ~49 days.
    pub fn millis(&self) -> Millis {
        (self.micros() / 1000) as Millis
    }

    pub fn delay_ms(&self, ms: u32) {
        let start = self.millis();
        while elapsed_ms(self.millis(), start) < ms {}
    }
}
