// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hub class request that turns on power to a downstream port.

use zerocopy::AsBytes;

use crate::descriptor::{
    request_type, HubPortFeature, UsbDir, UsbRecipient, UsbRequestKind, UsbSetupPacket,
    UsbSetupRequest,
};
use crate::error::{Error, TransferError};
use crate::host::HostStack;

/// Number of downstream ports on the hub we drive.
pub const HUB_PORT_COUNT: u8 = 4;

/// A downstream port number, 1-based like the hub numbers them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HubPort(u8);

impl HubPort {
    /// The port that has to come up before we bother with the others.
    pub const PRIMARY: Self = Self(1);

    pub fn new(n: u8) -> Result<Self, Error> {
        if (1..=HUB_PORT_COUNT).contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::PortOutOfRange(n))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Ports 2 and up, in order.
    pub fn secondaries() -> impl Iterator<Item = HubPort> {
        (2..=HUB_PORT_COUNT).map(HubPort)
    }
}

/// `SetFeature(PORT_POWER)` aimed at one port. Built, submitted once, dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortPowerRequest {
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
}

/// Host-to-device, class request, recipient "other" (a port): `0x23`.
pub const PORT_REQUEST_TYPE: u8 =
    request_type(UsbDir::Out, UsbRequestKind::Class, UsbRecipient::Other);

impl PortPowerRequest {
    pub fn new(port: HubPort) -> Self {
        Self {
            request_type: PORT_REQUEST_TYPE,
            request: UsbSetupRequest::SetFeature as u8,
            value: HubPortFeature::Power as u16,
            index: u16::from(port.number()),
            length: 0,
        }
    }

    pub fn request_type(&self) -> u8 {
        self.request_type
    }

    pub fn request(&self) -> u8 {
        self.request
    }

    /// Feature selector: always port power.
    pub fn value(&self) -> u16 {
        self.value
    }

    /// `wIndex`, which for a port request is the port number.
    pub fn port(&self) -> u16 {
        self.index
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn setup_packet(&self) -> UsbSetupPacket {
        UsbSetupPacket::new(
            self.request_type,
            self.request,
            self.value,
            self.index,
            self.length,
        )
    }

    /// The eight bytes that go out in the SETUP stage.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0; 8];
        out.copy_from_slice(self.setup_packet().as_bytes());
        out
    }

    pub fn submit<H: HostStack + ?Sized>(&self, host: &mut H) -> Result<(), TransferError> {
        host.submit_control_transfer(
            self.request_type,
            self.request,
            self.value,
            self.index,
            self.length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range() {
        assert_eq!(HubPort::new(0), Err(Error::PortOutOfRange(0)));
        assert_eq!(HubPort::new(5), Err(Error::PortOutOfRange(5)));
        for n in 1..=4 {
            assert_eq!(HubPort::new(n).map(HubPort::number), Ok(n));
        }
        assert_eq!(HubPort::PRIMARY.number(), 1);
    }

    #[test]
    fn secondaries_are_two_through_four() {
        let mut it = HubPort::secondaries().map(HubPort::number);
        assert_eq!(it.next(), Some(2));
        assert_eq!(it.next(), Some(3));
        assert_eq!(it.next(), Some(4));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn encodes_set_port_power() {
        let port = HubPort::new(3).unwrap();
        let req = PortPowerRequest::new(port);
        assert_eq!(req.request_type(), 0x23);
        assert_eq!(req.request(), 0x03);
        assert_eq!(req.value(), 0x0008);
        assert_eq!(req.length(), 0);
        assert_eq!(req.port(), 3);
        assert_eq!(req.to_bytes(), [0x23, 0x03, 0x08, 0x00, 0x03, 0x00, 0x00, 0x00]);
    }
}
