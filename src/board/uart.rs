// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serial console on UART0, and the `log` backend that writes to it.
//!
//! 115200 8N1 on GPIO0 (TX) and GPIO1 (RX). Output is blocking and unbuffered:
//! a log line doesn't return until its last byte is in the FIFO. That's slow,
//! but it's also the only way to be sure you see the line right before a hang.

use core::fmt::Write;

use log::{Level, LevelFilter, Metadata, Record};

const TX_PIN: usize = 0;
const RX_PIN: usize = 1;

// clk_peri is 132 MHz. Divisor = 132e6 / (16 * 115200) = 71.61, and the
// fractional part is in 64ths: 0.61 * 64 = 39.
const BAUD_DIVINT: u16 = 71;
const BAUD_DIVFRAC: u8 = 39;

/// Brings up UART0. Expects IO_BANK0 to already be out of reset and clk_peri
/// to be running.
pub fn init(
    _uart: rp2040_pac::UART0,
    resets: &rp2040_pac::RESETS,
    io: &rp2040_pac::IO_BANK0,
) {
    resets.reset.modify(|_, w| w.uart0().clear_bit());
    while !resets.reset_done.read().uart0().bit() {}

    io.gpio[TX_PIN].gpio_ctrl.write(|w| w.funcsel().uart());
    io.gpio[RX_PIN].gpio_ctrl.write(|w| w.funcsel().uart());

    let uart = regs();
    uart.uartibrd.write(|w| unsafe { w.baud_divint().bits(BAUD_DIVINT) });
    uart.uartfbrd.write(|w| unsafe { w.baud_divfrac().bits(BAUD_DIVFRAC) });
    // The divisor registers only take effect on a write to LCR_H, which this
    // is. 8 data bits, FIFOs on, no parity, one stop bit.
    uart.uartlcr_h.write(|w| unsafe { w.wlen().bits(0b11).fen().set_bit() });
    uart.uartcr.write(|w| w.uarten().set_bit().txe().set_bit().rxe().set_bit());
}

fn regs() -> &'static rp2040_pac::uart0::RegisterBlock {
    // Safety: `init` consumed the UART0 peripheral, and after that the only
    // thing touching it is `SerialWriter`, from the single main thread.
    unsafe { &*rp2040_pac::UART0::ptr() }
}

struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let uart = regs();
        for &b in s.as_bytes() {
            while uart.uartfr.read().txff().bit() {}
            uart.uartdr.write(|w| unsafe { w.data().bits(b) });
        }
        Ok(())
    }
}

pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if cfg!(debug_assertions) {
            true
        } else {
            metadata.level() <= Level::Info
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere to report a failure to write the log.
        let _ = write!(SerialWriter, "[{:5}] {}\r\n", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Installs [`SerialLogger`] as the `log` backend. Call once, after [`init`].
pub fn install_logger() -> Result<(), log::SetLoggerError> {
    // Safety: Cortex-M0+ has no compare-and-swap, so we can't use the
    // atomic `set_logger`. This runs once, from `main`, before anything could
    // possibly be logging, with interrupts unused.
    unsafe { log::set_logger_racy(&LOGGER)? };
    log::set_max_level(if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    });
    Ok(())
}
