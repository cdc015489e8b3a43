// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB structure and constant definitions.
//!
//! The structs here are byte-for-byte layouts of what goes over the wire, so
//! they can be reinterpreted in place with `zerocopy` instead of being parsed
//! field by field. Descriptors come to us from the host stack as plain byte
//! slices, and nothing guarantees those slices are as long as they claim to
//! be, so every view goes through [`view`], which checks both the slice length
//! and the descriptor's own `bLength` field first.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned, U16};

use crate::error::DescriptorError;

/// USB deals in two different transfer directions, called OUT (host-to-device)
/// and IN (device-to-host). In the `bmRequestType` byte and in endpoint
/// addresses, OUT is a 0 in the top bit, and IN is `0x80`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum UsbDir {
    Out = 0,
    In = 0x80,
}

impl UsbDir {
    pub const fn of_endpoint_addr(addr: u8) -> Self {
        if addr & Self::In as u8 != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// Bits 6:5 of `bmRequestType`: who defined the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsbRequestKind {
    Standard = 0x00,
    Class = 0x20,
    Vendor = 0x40,
}

/// Bits 4:0 of `bmRequestType`: what the request is aimed at. Hub port
/// requests are addressed to "other", with the port number in `wIndex`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsbRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
}

/// Assembles a `bmRequestType` byte.
pub const fn request_type(dir: UsbDir, kind: UsbRequestKind, to: UsbRecipient) -> u8 {
    dir as u8 | kind as u8 | to as u8
}

/// Layout of an 8-byte USB SETUP packet.
#[repr(C)]
#[derive(Clone, Debug, AsBytes, FromBytes, Unaligned)]
pub struct UsbSetupPacket {
    /// Request type: direction, kind and recipient, assembled by
    /// [`request_type`].
    pub request_type: u8,
    /// Request. Standard setup requests are in the `UsbSetupRequest` enum;
    /// classes reuse some of the same numbers with their own meaning.
    pub request: u8,
    /// A simple argument of up to 16 bits, specific to the request.
    pub value: U16<LittleEndian>,
    /// Second argument. For hub port requests, the port number.
    pub index: U16<LittleEndian>,
    /// If data will be transferred after this request (in the direction given
    /// by `request_type`), this gives the number of bytes (OUT) or maximum
    /// number of bytes (IN).
    pub length: U16<LittleEndian>,
}

impl UsbSetupPacket {
    pub fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value: U16::new(value),
            index: U16::new(index),
            length: U16::new(length),
        }
    }

    pub fn dir(&self) -> UsbDir {
        UsbDir::of_endpoint_addr(self.request_type)
    }

    /// True for a host-to-device request with no data stage, the only kind
    /// this firmware ever issues on a device's behalf.
    pub fn is_no_data_out(&self) -> bool {
        self.dir() == UsbDir::Out && self.length.get() == 0
    }
}

/// The SETUP requests this firmware sends. Class requests (like the hub's
/// `SetFeature`) share the numbering of the standard ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum UsbSetupRequest {
    /// Turns on a feature selected by `value`. For hubs with recipient
    /// "other", that's a port feature such as power.
    SetFeature = 0x03,
    /// Assigns the device its bus address. Always an OUT.
    SetAddress = 0x05,
    /// Asks the device for a descriptor. Always an IN.
    GetDescriptor = 0x06,
    /// Selects one of the device's configurations. Always an OUT.
    SetConfiguration = 0x09,
}

/// Types of USB descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum UsbDescType {
    Device = 0x01,
    Config = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
    /// Class-specific hub descriptor.
    Hub = 0x29,
}

/// Interface class codes we care about. Everything else is "other".
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum UsbClass {
    MassStorage = 0x08,
    Hub = 0x09,
}

/// Hub port feature selectors, used as `value` in hub `SetFeature`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum HubPortFeature {
    Power = 8,
}

/// Describes a device. This is the first thing we ask an attached device for.
#[repr(C)]
#[derive(Debug, FromBytes, Unaligned)]
pub struct UsbDeviceDescriptor {
    /// Length of this structure, must be 18.
    pub length: u8,
    /// Type of this descriptor, must be `Device`.
    pub descriptor_type: u8,
    pub bcd_usb: U16<LittleEndian>,
    /// Class of device. Hubs announce themselves here as well as in their
    /// interface.
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    /// Largest packet EP0 can move. This is the one field we need before we
    /// can talk to the device properly.
    pub max_packet_size0: u8,
    pub vendor: U16<LittleEndian>,
    pub product: U16<LittleEndian>,
    pub bcd_device: U16<LittleEndian>,
    pub manufacturer_s: u8,
    pub product_s: u8,
    pub serial_s: u8,
    pub num_configurations: u8,
}

/// Description of a single available device configuration.
#[repr(C)]
#[derive(Debug, FromBytes, Unaligned)]
pub struct UsbConfigurationDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// Type of this descriptor, must be `Config`.
    pub descriptor_type: u8,
    /// Total length of all descriptors in this configuration, concatenated.
    pub total_length: U16<LittleEndian>,
    pub num_interfaces: u8,
    /// Number to use when requesting this configuration via a
    /// `SetConfiguration` request.
    pub configuration_value: u8,
    pub configuration_s: u8,
    pub attributes: u8,
    /// Maximum device power consumption in units of 2mA.
    pub max_power: u8,
}

/// Description of an interface within a configuration.
#[repr(C)]
#[derive(Debug, FromBytes, Unaligned)]
pub struct UsbInterfaceDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// Type of this descriptor, must be `Interface`.
    pub descriptor_type: u8,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    /// Interface class code, distinguishing the type of interface.
    pub interface_class: u8,
    /// Interface subclass code, refining the class of interface.
    pub interface_subclass: u8,
    /// Protocol within the interface class/subclass.
    pub interface_protocol: u8,
    pub interface_s: u8,
}

/// Reinterprets the front of `data` as a descriptor of type `T`.
///
/// Fails if `data` is too short for `T`, or if the descriptor's `bLength`
/// (always the first byte) is shorter than `T` or longer than `data`. Bytes
/// past `T` are allowed, since class-specific descriptors grow over time.
pub fn view<T: FromBytes + Unaligned>(data: &[u8]) -> Result<&T, DescriptorError> {
    let needed = core::mem::size_of::<T>();
    let (layout, _) = LayoutVerified::<_, T>::new_unaligned_from_prefix(data).ok_or(
        DescriptorError::Truncated {
            needed,
            available: data.len(),
        },
    )?;
    // The prefix check above means there is at least one byte.
    let claimed = data[0];
    if usize::from(claimed) < needed || usize::from(claimed) > data.len() {
        return Err(DescriptorError::BadLength(claimed));
    }
    Ok(layout.into_ref())
}

/// Iterates over a concatenated configuration (config, interface, endpoint,
/// class-specific...) as `(bDescriptorType, bytes)` pairs.
///
/// A zero or overlong `bLength` makes the rest of the blob unusable, so the
/// iterator yields one error and then stops.
pub fn walk(config: &[u8]) -> Descriptors<'_> {
    Descriptors { rest: config }
}

pub struct Descriptors<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = Result<(u8, &'a [u8]), DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < 2 {
            let available = self.rest.len();
            self.rest = &[];
            return Some(Err(DescriptorError::Truncated {
                needed: 2,
                available,
            }));
        }
        let len = self.rest[0];
        if len < 2 || usize::from(len) > self.rest.len() {
            self.rest = &[];
            return Some(Err(DescriptorError::BadLength(len)));
        }
        let (this, rest) = self.rest.split_at(usize::from(len));
        self.rest = rest;
        Some(Ok((this[1], this)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Config descriptor of a typical four-port full-speed hub: config,
    // interface (class 9), one interrupt endpoint.
    const HUB_CONFIG: [u8; 25] = [
        0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0xe0, 0x32, //
        0x09, 0x04, 0x00, 0x00, 0x01, 0x09, 0x00, 0x00, 0x00, //
        0x07, 0x05, 0x81, 0x03, 0x01, 0x00, 0xff,
    ];

    #[test]
    fn hub_request_type_is_0x23() {
        assert_eq!(
            request_type(UsbDir::Out, UsbRequestKind::Class, UsbRecipient::Other),
            0x23
        );
        assert_eq!(
            request_type(UsbDir::In, UsbRequestKind::Standard, UsbRecipient::Device),
            0x80
        );
    }

    #[test]
    fn setup_packet_layout() {
        let p = UsbSetupPacket::new(0x80, 0x06, 0x0200, 0, 9);
        assert_eq!(p.as_bytes(), &[0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x00]);
        assert_eq!(p.dir(), UsbDir::In);
        assert!(!p.is_no_data_out());
    }

    #[test]
    fn no_data_out_needs_both_direction_and_length() {
        let port_power = UsbSetupPacket::new(0x23, 0x03, 0x0008, 1, 0);
        assert_eq!(port_power.dir(), UsbDir::Out);
        assert!(port_power.is_no_data_out());

        let with_data = UsbSetupPacket::new(0x23, 0x03, 0x0008, 1, 4);
        assert!(!with_data.is_no_data_out());

        let zero_length_in = UsbSetupPacket::new(0xa3, 0x00, 0, 1, 0);
        assert_eq!(zero_length_in.dir(), UsbDir::In);
        assert!(!zero_length_in.is_no_data_out());
    }

    #[test]
    fn walks_hub_configuration() {
        let mut types = [0u8; 3];
        let mut n = 0;
        for item in walk(&HUB_CONFIG) {
            let (ty, bytes) = item.unwrap();
            assert_eq!(bytes[1], ty);
            types[n] = ty;
            n += 1;
        }
        assert_eq!(n, 3);
        assert_eq!(types, [0x02, 0x04, 0x05]);
    }

    #[test]
    fn walk_stops_on_zero_length() {
        let blob = [0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0xe0, 0x32, 0x00, 0x04];
        let mut it = walk(&blob);
        assert!(it.next().unwrap().is_ok());
        assert_eq!(it.next(), Some(Err(DescriptorError::BadLength(0))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn walk_stops_on_overrun() {
        let blob = [0x09, 0x04, 0x00];
        let mut it = walk(&blob);
        assert_eq!(it.next(), Some(Err(DescriptorError::BadLength(9))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn walk_reports_lone_trailing_byte() {
        let mut it = walk(&[0x07]);
        assert_eq!(
            it.next(),
            Some(Err(DescriptorError::Truncated {
                needed: 2,
                available: 1
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn view_checks_slice_and_length_field() {
        let intf = &HUB_CONFIG[9..18];
        let d = view::<UsbInterfaceDescriptor>(intf).unwrap();
        assert_eq!(d.interface_class, 0x09);

        assert_eq!(
            view::<UsbInterfaceDescriptor>(&intf[..5]).unwrap_err(),
            DescriptorError::Truncated {
                needed: 9,
                available: 5
            }
        );

        let mut short = [0u8; 9];
        short.copy_from_slice(intf);
        short[0] = 4;
        assert_eq!(
            view::<UsbInterfaceDescriptor>(&short).unwrap_err(),
            DescriptorError::BadLength(4)
        );

        let mut long = short;
        long[0] = 12;
        assert_eq!(
            view::<UsbInterfaceDescriptor>(&long).unwrap_err(),
            DescriptorError::BadLength(12)
        );
    }

    #[test]
    fn config_total_length() {
        let c = view::<UsbConfigurationDescriptor>(&HUB_CONFIG).unwrap();
        assert_eq!(c.total_length.get(), 25);
        assert_eq!(c.configuration_value, 1);
    }
}
