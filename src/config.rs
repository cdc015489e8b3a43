// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timing knobs. These are compile-time decisions; there is nothing to read
//! them from at runtime.

/// Milliseconds from a free-running counter. Wraps like any 32-bit
/// millisecond clock does, after about 49 days; compare with
/// [`elapsed_ms`], never with `<`.
pub type Millis = u32;

/// Time from `since` to `now`, correct across one counter wrap.
pub fn elapsed_ms(now: Millis, since: Millis) -> u32 {
    now.wrapping_sub(since)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// An attempt is only made once more than this has passed since the
    /// previous one.
    pub retry_interval_ms: u32,
    /// The "still waiting" line is printed when `now % period < window`.
    pub waiting_log_period_ms: u32,
    pub waiting_log_window_ms: u32,
    /// How long the firmware sits idle after reset so a serial console has
    /// time to attach before the banner.
    pub startup_delay_ms: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 2000,
            waiting_log_period_ms: 4000,
            waiting_log_window_ms: 100,
            startup_delay_ms: 2000,
        }
    }
}

impl ControllerConfig {
    pub fn should_log_waiting(&self, now: Millis) -> bool {
        self.waiting_log_period_ms != 0
            && now % self.waiting_log_period_ms < self.waiting_log_window_ms
    }
}
