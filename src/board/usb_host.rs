// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A very small USB host stack for the RP2040 controller.
//!
//! This handles exactly one device, plugged straight into the RP2040's port,
//! talked to only on its control endpoint. It will:
//!
//! - notice the device arrive (the SIE reports a line speed),
//! - reset the bus,
//! - read the device descriptor, give the device an address,
//! - read the whole configuration and hand each descriptor in it to whoever
//!   is listening,
//! - select that configuration,
//!
//! after which the device is "ready" and it can send no-data control requests
//! on request. That's all the hub power logic needs, and nothing more is here.
//!
//! All traffic goes through the controller's one general purpose endpoint,
//! EPX. Every transaction is started by hand and polled to completion, with a
//! timeout, so nothing here can hang the main loop.
//!
//! In host mode, the DPRAM layout differs from the device-mode layout that the
//! PAC models. The parts we use:
//!
//! - 0x000: SETUP packet, as in device mode.
//! - 0x080: EPX buffer control. This is where device mode keeps EP0 IN buffer
//!   control, so the PAC's `ep_buffer_control[0]` is the right register.
//! - 0x100: EPX endpoint control. The PAC has no name for this.
//! - 0x180: EPX data buffer, 64 bytes.

use log::{debug, info, warn};
use num_traits::FromPrimitive;
use rp2040_pac::usbctrl_regs::sie_ctrl;
use zerocopy::AsBytes;

use hub_power::config::{elapsed_ms, Millis};
use hub_power::descriptor::{
    request_type, view, walk, UsbConfigurationDescriptor, UsbDescType, UsbDeviceDescriptor,
    UsbDir, UsbRecipient, UsbRequestKind, UsbSetupPacket, UsbSetupRequest,
};
use hub_power::{DescriptorSink, HostStack, TransferError};

use super::timer::Timer;

/// Address given to the device. There is only ever one.
const DEVICE_ADDRESS: u8 = 1;

/// How long the line has to show a device before we believe it.
const ATTACH_DEBOUNCE_MS: u32 = 100;
/// Recovery after bus reset before the first request.
const RESET_RECOVERY_MS: u32 = 50;
/// Devices get 2 ms to start answering at their new address.
const SET_ADDRESS_RECOVERY_MS: u32 = 2;
/// After a failed enumeration, wait this long before resetting again.
const ENUMERATION_BACKOFF_MS: u32 = 1000;
/// Longest any single transaction may take, NAK retries included.
const TRANSACTION_TIMEOUT_MS: u32 = 50;

/// Largest configuration we'll read. A hub's is 25 bytes.
const CONFIG_BUFFER_LEN: usize = 256;

const EPX_BUFFER_CONTROL: usize = 0;
const EPX_CONTROL_OFFSET: usize = 0x100;
const EPX_DATA_OFFSET: usize = 0x180;
const EPX_DATA_LEN: usize = 64;

// EPX endpoint control bits.
const EP_CTRL_ENABLE: u32 = 1 << 31;
const EP_CTRL_INTERRUPT_PER_BUFFER: u32 = 1 << 29;
const EP_CTRL_TYPE_SHIFT: u32 = 26;
const EP_TYPE_CONTROL: u32 = 0;

/// The SIE seems to need a few cycles between writing a control register and
/// setting its "go" bit (AVAILABLE, START_TRANS), or it can act on stale
/// values. Pico SDK uses 12; so do we.
const SIE_SETTLE_CYCLES: u32 = 12;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Attachment {
    Detached,
    /// Something is on the line; waiting for it to stay there.
    Debouncing { since: Millis },
    Resetting { since: Millis },
    Configured,
    /// Enumeration went wrong; waiting to try again.
    Failed { since: Millis },
}

/// Which way a single EPX transaction goes.
enum Stage<'a> {
    Setup(&'a UsbSetupPacket),
    In { data1: bool, max: usize },
    Out { data1: bool, data: &'a [u8] },
}

pub struct Rp2040Host {
    regs: rp2040_pac::USBCTRL_REGS,
    dpram: rp2040_pac::USBCTRL_DPRAM,
    timer: Timer,
    state: Attachment,
    /// Max packet size for EP0 of the attached device. Starts at the minimum
    /// until we've read the device descriptor.
    max_packet: usize,
}

impl Rp2040Host {
    /// Wraps the USB controller. USBCTRL must already be out of reset and
    /// clk_usb running at 48 MHz; nothing is touched until `begin`.
    pub fn new(
        regs: rp2040_pac::USBCTRL_REGS,
        dpram: rp2040_pac::USBCTRL_DPRAM,
        timer: Timer,
    ) -> Self {
        Self {
            regs,
            dpram,
            timer,
            state: Attachment::Detached,
            max_packet: 8,
        }
    }

    fn reset_bus(&mut self, now: Millis) {
        // RESET_BUS clears itself once the hardware has driven the reset.
        self.regs.sie_ctrl.modify(|_, w| w.reset_bus().set_bit());
        self.max_packet = 8;
        self.state = Attachment::Resetting { since: now };
    }

    /// Line speed: 0 nothing attached, 1 low speed, 2 full speed.
    fn line_speed(&self) -> u8 {
        self.regs.sie_status.read().speed().bits()
    }

    fn epx_control(&self) -> *mut u32 {
        let base = rp2040_pac::USBCTRL_DPRAM::ptr() as *mut u8;
        // Safety: in bounds of the 4 KiB DPRAM.
        unsafe { base.add(EPX_CONTROL_OFFSET) as *mut u32 }
    }

    fn epx_data(&self) -> *mut u8 {
        let base = rp2040_pac::USBCTRL_DPRAM::ptr() as *mut u8;
        // Safety: in bounds of the 4 KiB DPRAM.
        unsafe { base.add(EPX_DATA_OFFSET) }
    }

    /// Runs one transaction on EPX and waits for it to finish. Returns the
    /// number of bytes moved.
    fn transaction(&mut self, stage: Stage<'_>) -> Result<usize, TransferError> {
        match stage {
            Stage::Setup(setup) => {
                // The SETUP packet has its own home at the base of DPRAM. The
                // PAC models it as two 32-bit registers.
                let bytes = setup.as_bytes();
                let lo = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let hi = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                self.dpram.setup_packet_low.write(|w| unsafe { w.bits(lo) });
                self.dpram.setup_packet_high.write(|w| unsafe { w.bits(hi) });
                self.start(|w| w.send_setup().set_bit());
            }
            Stage::In { data1, max } => {
                assert!(max <= EPX_DATA_LEN);
                self.arm_buffer(data1, false, max);
                self.start(|w| w.receive_data().set_bit());
            }
            Stage::Out { data1, data } => {
                assert!(data.len() <= EPX_DATA_LEN);
                // Safety: the buffer isn't armed, so the hardware isn't looking
                // at it, and `data` fits.
                unsafe {
                    self.epx_data()
                        .copy_from_nonoverlapping(data.as_ptr(), data.len());
                }
                self.arm_buffer(data1, true, data.len());
                self.start(|w| w.send_data().set_bit());
            }
        }
        self.wait_done()?;
        let bc = self.dpram.ep_buffer_control[EPX_BUFFER_CONTROL].read();
        Ok(bc.length_0().bits() as usize)
    }

    /// Hands the EPX buffer to the hardware.
    fn arm_buffer(&self, data1: bool, full: bool, len: usize) {
        let bc = &self.dpram.ep_buffer_control[EPX_BUFFER_CONTROL];
        bc.write(|w| unsafe {
            w
                // DATA0/1, depending
                .pid_0().bit(data1)
                // Full if we're sending, empty if we want it filled.
                .full_0().bit(full)
                // Single buffered, so every buffer is the last.
                .last_0().set_bit()
                .length_0().bits(len as u16)
        });
        cortex_m::asm::delay(SIE_SETTLE_CYCLES);
        bc.modify(|_, w| w.available_0().set_bit());
    }

    /// Points the SIE at our device and endpoint 0, sets the direction bits
    /// chosen by `f`, and starts the transaction.
    fn start<F>(&self, f: F)
    where
        F: FnOnce(&mut sie_ctrl::W) -> &mut sie_ctrl::W,
    {
        self.regs.sie_ctrl.write(|w| f(host_sie_base(w)));
        cortex_m::asm::delay(SIE_SETTLE_CYCLES);
        self.regs.sie_ctrl.modify(|_, w| w.start_trans().set_bit());
    }

    fn wait_done(&self) -> Result<(), TransferError> {
        let start = self.timer.millis();
        let result = loop {
            let status = self.regs.sie_status.read();
            if status.stall_rec().bit() {
                break Err(TransferError::Stall);
            }
            if status.data_seq_error().bit() {
                break Err(TransferError::DataSequence);
            }
            if status.crc_error().bit() {
                break Err(TransferError::Crc);
            }
            if status.bit_stuff_error().bit() {
                break Err(TransferError::BitStuff);
            }
            if status.rx_overflow().bit() {
                break Err(TransferError::RxOverflow);
            }
            if status.rx_timeout().bit() {
                break Err(TransferError::Timeout);
            }
            if status.trans_complete().bit() {
                break Ok(());
            }
            if elapsed_ms(self.timer.millis(), start) > TRANSACTION_TIMEOUT_MS {
                // Probably the device is NAKing forever. Call it off.
                self.regs.sie_ctrl.modify(|_, w| w.stop_trans().set_bit());
                break Err(TransferError::Timeout);
            }
        };
        // Clear whatever we saw (write-one-to-clear).
        self.regs.sie_status.write(|w| {
            w.trans_complete()
                .set_bit()
                .stall_rec()
                .set_bit()
                .data_seq_error()
                .set_bit()
                .crc_error()
                .set_bit()
                .bit_stuff_error()
                .set_bit()
                .rx_overflow()
                .set_bit()
                .rx_timeout()
                .set_bit()
                .nak_rec()
                .set_bit()
                .ack_rec()
                .set_bit()
        });
        result
    }

    fn select(&self, address: u8) {
        self.regs
            .addr_endp
            .write(|w| unsafe { w.address().bits(address).endpoint().bits(0) });
    }

    /// Control read: SETUP, IN data packets until short or `buf` is full,
    /// then a zero-length OUT status.
    fn control_in(
        &mut self,
        address: u8,
        setup: &UsbSetupPacket,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        self.select(address);
        self.transaction(Stage::Setup(setup))?;

        let wanted = buf.len().min(usize::from(setup.length.get()));
        let mut got = 0;
        // The data stage always begins with DATA1.
        let mut data1 = true;
        while got < wanted {
            let max = self.max_packet.min(wanted - got);
            let n = self.transaction(Stage::In { data1, max })?.min(max);
            // Safety: the transaction is complete, so the hardware has handed
            // the buffer back, and `n` is within both buffers.
            unsafe {
                buf[got..got + n]
                    .as_mut_ptr()
                    .copy_from_nonoverlapping(self.epx_data(), n);
            }
            got += n;
            data1 = !data1;
            if n < self.max_packet {
                break;
            }
        }

        self.transaction(Stage::Out {
            data1: true,
            data: &[],
        })?;
        Ok(got)
    }

    /// Control write with no data stage: SETUP, then a zero-length IN status.
    fn control_out(&mut self, address: u8, setup: &UsbSetupPacket) -> Result<(), TransferError> {
        self.select(address);
        self.transaction(Stage::Setup(setup))?;
        self.transaction(Stage::In {
            data1: true,
            max: 0,
        })?;
        Ok(())
    }

    fn enumerate(&mut self, sink: &mut dyn DescriptorSink) -> Result<(), TransferError> {
        let mut buf = [0u8; CONFIG_BUFFER_LEN];

        // The first eight bytes of the device descriptor tell us how big EP0's
        // packets are; everything else is at the default address until then.
        let n = self.control_in(0, &get_descriptor(UsbDescType::Device, 8), &mut buf[..8])?;
        if n < 8 {
            return Err(TransferError::ShortRead);
        }
        self.max_packet = usize::from(buf[7]).clamp(8, EPX_DATA_LEN);

        self.control_out(0, &standard_out(UsbSetupRequest::SetAddress, u16::from(DEVICE_ADDRESS)))?;
        self.timer.delay_ms(SET_ADDRESS_RECOVERY_MS);

        let n = self.control_in(
            DEVICE_ADDRESS,
            &get_descriptor(UsbDescType::Device, 18),
            &mut buf[..18],
        )?;
        match view::<UsbDeviceDescriptor>(&buf[..n]) {
            Ok(dev) => info!(
                "device {:04x}:{:04x} class={:#04x} ep0={}",
                dev.vendor.get(),
                dev.product.get(),
                dev.device_class,
                dev.max_packet_size0
            ),
            Err(e) => warn!("device descriptor: {}", e),
        }

        // Configuration header first, to learn the total length, then all of
        // it.
        let n = self.control_in(
            DEVICE_ADDRESS,
            &get_descriptor(UsbDescType::Config, 9),
            &mut buf[..9],
        )?;
        let (total, value) = match view::<UsbConfigurationDescriptor>(&buf[..n]) {
            Ok(c) => (usize::from(c.total_length.get()), c.configuration_value),
            Err(_) => return Err(TransferError::ShortRead),
        };
        if total > CONFIG_BUFFER_LEN {
            warn!("configuration is {} bytes, reading the first {}", total, CONFIG_BUFFER_LEN);
        }
        let total = total.min(CONFIG_BUFFER_LEN);
        let n = self.control_in(
            DEVICE_ADDRESS,
            &get_descriptor(UsbDescType::Config, total as u16),
            &mut buf[..total],
        )?;

        for item in walk(&buf[..n]) {
            match item {
                Ok((ty, bytes)) => {
                    debug!("descriptor {:?} ({} bytes)", UsbDescType::from_u8(ty), bytes.len());
                    sink.on_config_descriptor(ty, bytes);
                }
                Err(e) => {
                    warn!("configuration descriptor: {}", e);
                    break;
                }
            }
        }

        self.control_out(
            DEVICE_ADDRESS,
            &standard_out(UsbSetupRequest::SetConfiguration, u16::from(value)),
        )?;
        info!("device configured (configuration {})", value);
        Ok(())
    }
}

impl HostStack for Rp2040Host {
    fn begin(&mut self) {
        // Clear the control portion of DPRAM, as in device mode.
        self.dpram.setup_packet_low.write(|w| unsafe { w.bits(0) });
        self.dpram.setup_packet_high.write(|w| unsafe { w.bits(0) });
        for epc in &self.dpram.ep_control {
            epc.write(|w| unsafe { w.bits(0) });
        }
        for epb in &self.dpram.ep_buffer_control {
            epb.write(|w| unsafe { w.bits(0) });
        }

        // Mux the controller to the onboard PHY.
        self.regs
            .usb_muxing
            .write(|w| w.to_phy().set_bit().softcon().set_bit());
        // Pretend VBUS is present. Supplying it is the board's problem.
        self.regs
            .usb_pwr
            .write(|w| w.vbus_detect().set_bit().vbus_detect_override_en().set_bit());
        // Enable controller in host mode.
        self.regs
            .main_ctrl
            .write(|w| w.controller_en().set_bit().host_ndevice().set_bit());
        // Pull-downs on, SOFs/keep-alives on. We're a host now.
        self.regs.sie_ctrl.write(|w| host_sie_base(w));

        // Point EPX at its data buffer, as a control endpoint.
        let epx = EP_CTRL_ENABLE
            | EP_CTRL_INTERRUPT_PER_BUFFER
            | EP_TYPE_CONTROL << EP_CTRL_TYPE_SHIFT
            | EPX_DATA_OFFSET as u32;
        // Safety: this is EPX_CTRL, which the hardware only reads.
        unsafe { self.epx_control().write_volatile(epx) };

        info!("usb host started");
    }

    fn task(&mut self, sink: &mut dyn DescriptorSink) {
        let now = self.timer.millis();
        let speed = self.line_speed();
        let attached = speed != 0;

        match self.state {
            Attachment::Detached => {
                if attached {
                    info!(
                        "device attached ({} speed)",
                        if speed == 1 { "low" } else { "full" }
                    );
                    self.state = Attachment::Debouncing { since: now };
                }
            }
            Attachment::Debouncing { since } => {
                if !attached {
                    self.state = Attachment::Detached;
                } else if elapsed_ms(now, since) >= ATTACH_DEBOUNCE_MS {
                    self.reset_bus(now);
                }
            }
            Attachment::Resetting { since } => {
                if !attached {
                    self.state = Attachment::Detached;
                } else if elapsed_ms(now, since) >= RESET_RECOVERY_MS {
                    self.state = match self.enumerate(sink) {
                        Ok(()) => Attachment::Configured,
                        Err(e) => {
                            warn!("enumeration failed (error {:#x}: {})", e.code(), e);
                            Attachment::Failed { since: now }
                        }
                    };
                }
            }
            Attachment::Configured => {
                if !attached {
                    info!("device detached");
                    self.state = Attachment::Detached;
                }
            }
            Attachment::Failed { since } => {
                if !attached {
                    self.state = Attachment::Detached;
                } else if elapsed_ms(now, since) >= ENUMERATION_BACKOFF_MS {
                    self.reset_bus(now);
                }
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.state == Attachment::Configured
    }

    fn submit_control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<(), TransferError> {
        if !self.is_ready() {
            return Err(TransferError::NotReady);
        }
        let setup = UsbSetupPacket::new(request_type, request, value, index, length);
        // We never have any data to send with a request.
        if !setup.is_no_data_out() {
            return Err(TransferError::Unsupported);
        }
        self.control_out(DEVICE_ADDRESS, &setup)
    }
}

/// SIE control bits we always want set as a host.
fn host_sie_base(w: &mut sie_ctrl::W) -> &mut sie_ctrl::W {
    w.sof_en()
        .set_bit()
        .keep_alive_en()
        .set_bit()
        .pulldown_en()
        .set_bit()
        .ep0_int_1buf()
        .set_bit()
}

fn get_descriptor(ty: UsbDescType, length: u16) -> UsbSetupPacket {
    UsbSetupPacket::new(
        request_type(UsbDir::In, UsbRequestKind::Standard, UsbRecipient::Device),
        UsbSetupRequest::GetDescriptor as u8,
        (ty as u16) << 8,
        0,
        length,
    )
}

fn standard_out(request: UsbSetupRequest, value: u16) -> UsbSetupPacket {
    UsbSetupPacket::new(
        request_type(UsbDir::Out, UsbRequestKind::Standard, UsbRecipient::Device),
        request as u8,
        value,
        0,
        0,
    )
}
