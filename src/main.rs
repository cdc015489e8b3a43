// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RP2040 USB hub port power firmware.
//!
//! Plug a four-port USB hub into the RP2040's USB port (with VBUS supplied
//! from somewhere, since the RP2040 can't). This firmware enumerates the hub as
//! a host, reports what kind of device it found on the serial console, and then
//! asks the hub to switch on power to each of its four downstream ports.
//!
//! `main` is written to be read top to bottom: the chip comes out of reset,
//! gets clocks, gets a console, and then falls into a loop. The host stack
//! lives in `board::usb_host`; the decisions about what to send and when live
//! in the `hub_power` library, which doesn't know it's running on an RP2040
//! and is tested on the host.
//!
//! The serial console is UART0 at 115200 8N1, on GPIO0 (TX) and GPIO1 (RX).

#![no_std]
#![no_main]

mod board;

use cortex_m_rt::entry;
use log::info;

use panic_halt as _;

use hub_power::{App, ControllerConfig, HostStack, TickOutcome};

use board::timer::Timer;
use board::usb_host::Rp2040Host;
use board::{lower_pin, raise_pin, set_pin};

// GPIO numbers of pins used here, other than USB and the UART. The firmware
// toggles these to show what it's up to, so you can watch it on a logic
// analyzer or some LEDs.
cfg_if::cfg_if! {
    if #[cfg(feature = "target-pico")] {
        const LED_PIN: u8 = 25; // on once the ports are powered
        const ATTACH_PIN: u8 = 2; // high while a device is configured
        const XFER_PIN: u8 = 3; // high during each loop iteration
        const ERROR_PIN: u8 = 4; // pulses when port 1 is rejected
    } else if #[cfg(feature = "target-feather")] {
        const LED_PIN: u8 = 13; // on once the ports are powered
        const ATTACH_PIN: u8 = 2; // high while a device is configured
        const XFER_PIN: u8 = 3; // high during each loop iteration
        const ERROR_PIN: u8 = 4; // pulses when port 1 is rejected
    } else {
        compile_error!("missing or unknown target-* feature");
    }
}

#[entry]
fn main() -> ! {
    // The chip has come out of reset, executed the boot ROM, and jumped into
    // our program, running from the ring oscillator with all pins tristated.

    // There's no one to tell if this fails, and it can't: this is the only
    // call.
    let p = match rp2040_pac::Peripherals::take() {
        Some(p) => p,
        None => loop {
            cortex_m::asm::wfi();
        },
    };

    //////////////////////////////////////////////////////////////////////////
    // Diagnostic pins.

    p.RESETS.reset.modify(|_, w| w.io_bank0().clear_bit());
    while !p.RESETS.reset_done.read().io_bank0().bit() {}

    for pin in [LED_PIN, ATTACH_PIN, XFER_PIN, ERROR_PIN] {
        p.IO_BANK0.gpio[pin as usize].gpio_ctrl.write(|w| w.funcsel().sio());
        p.SIO.gpio_oe_set.write(|w| unsafe { w.bits(1 << pin) });
        lower_pin(&p.SIO, pin);
    }

    //////////////////////////////////////////////////////////////////////////
    // Clocks: XOSC, then PLL_SYS at 132 MHz for the CPU and UART, then PLL_USB
    // at 48 MHz for the USB controller.

    // Start XOSC and wait for it to stabilize.
    p.XOSC.ctrl.write(|w| unsafe { w.bits(0xfab_aa0) });
    while !p.XOSC.status.read().stable().bit() {}
    // Move clk_ref (and so clk_sys) over to it.
    p.CLOCKS.clk_ref_ctrl.write(|w| w.src().xosc_clksrc());
    while p.CLOCKS.clk_ref_selected.read().bits() != (1 << 2) {}
    // ROSC off. Crystal-governed 12 MHz from here on.
    p.ROSC.ctrl.write(|w| unsafe { w.bits(0xd1e_fa4) });

    // PLL_SYS: REFDIV 1, FBDIV 132 => VCO 1584 MHz, / (6 * 2) => 132 MHz.
    p.RESETS.reset.modify(|_, w| w.pll_sys().clear_bit());
    while !p.RESETS.reset_done.read().pll_sys().bit() {}
    p.PLL_SYS.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_SYS.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(132) });
    p.PLL_SYS.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_SYS.cs.read().lock().bit() {}
    p.PLL_SYS.prim.write(|w| unsafe { w.postdiv1().bits(6).postdiv2().bits(2) });
    p.PLL_SYS.pwr.modify(|_, w| w.postdivpd().clear_bit());

    p.CLOCKS.clk_sys_ctrl.write(|w| w.auxsrc().clksrc_pll_sys());
    p.CLOCKS.clk_sys_ctrl.modify(|_, w| w.src().clksrc_clk_sys_aux());
    while p.CLOCKS.clk_sys_selected.read().bits() != (1 << 1) {}

    // clk_peri follows clk_sys. The UART divisors assume this.
    p.CLOCKS.clk_peri_ctrl.write(|w| w.auxsrc().clk_sys().enable().set_bit());

    // PLL_USB: REFDIV 1, FBDIV 100 => VCO 1200 MHz, / (5 * 5) => 48 MHz.
    p.RESETS.reset.modify(|_, w| w.pll_usb().clear_bit());
    while !p.RESETS.reset_done.read().pll_usb().bit() {}
    p.PLL_USB.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_USB.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(100) });
    p.PLL_USB.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_USB.cs.read().lock().bit() {}
    p.PLL_USB.prim.write(|w| unsafe { w.postdiv1().bits(5).postdiv2().bits(5) });
    p.PLL_USB.pwr.modify(|_, w| w.postdivpd().clear_bit());

    p.CLOCKS.clk_usb_ctrl.write(|w| w.auxsrc().clksrc_pll_usb().enable().set_bit());

    //////////////////////////////////////////////////////////////////////////
    // Console, time, USB.

    board::uart::init(p.UART0, &p.RESETS, &p.IO_BANK0);
    // If a logger somehow got in first, we just lose our log lines.
    let _ = board::uart::install_logger();

    let timer = Timer::start(p.TIMER, &p.RESETS, &p.WATCHDOG);

    p.RESETS.reset.modify(|_, w| w.usbctrl().set_bit());
    p.RESETS.reset.modify(|_, w| w.usbctrl().clear_bit());
    while !p.RESETS.reset_done.read().usbctrl().bit() {}

    let config = ControllerConfig::default();
    let mut app = App::new(
        Rp2040Host::new(p.USBCTRL_REGS, p.USBCTRL_DPRAM, timer),
        config,
    );

    // Give whoever is about to open the serial port a moment to do it.
    timer.delay_ms(config.startup_delay_ms);

    info!("");
    info!("=== RP2040 USB hub port power ===");
    info!("waiting for a hub on the USB port");
    app.begin();

    //////////////////////////////////////////////////////////////////////////
    // Main loop.

    loop {
        raise_pin(&p.SIO, XFER_PIN);
        let outcome = app.tick(timer.millis());
        lower_pin(&p.SIO, XFER_PIN);

        set_pin(&p.SIO, ATTACH_PIN, app.host().is_ready());

        match outcome {
            TickOutcome::Powered => {
                info!("all ports sent, nothing more to do");
                raise_pin(&p.SIO, LED_PIN);
            }
            TickOutcome::Failed(_) => {
                // The controller has already logged the code.
                raise_pin(&p.SIO, ERROR_PIN);
                cortex_m::asm::delay(1000);
                lower_pin(&p.SIO, ERROR_PIN);
            }
            TickOutcome::Done | TickOutcome::Throttled | TickOutcome::Waiting => (),
        }
    }
}

// Second stage bootloader for the flash chip on each board, placed at the
// start of flash by memory.x.
cfg_if::cfg_if! {
    if #[cfg(feature = "target-feather")] {
        // The Adafruit board uses a GigaDevice flash chip.
        #[link_section = ".boot_loader"]
        #[used]
        static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GD25Q64CS;
    } else if #[cfg(feature = "target-pico")] {
        // The Pi Pico uses a Winbond W25Q080.
        #[link_section = ".boot_loader"]
        #[used]
        static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
    }
}
