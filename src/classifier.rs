// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Watches configuration descriptors go by during enumeration and says what
//! kind of device showed up. It only ever logs; nothing depends on its answer.

use log::{info, warn};
use num_traits::FromPrimitive;

use crate::descriptor::{view, UsbClass, UsbDescType, UsbInterfaceDescriptor};
use crate::error::DescriptorError;
use crate::host::DescriptorSink;

/// What an interface descriptor told us.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Not an interface descriptor; nothing to say.
    Ignored,
    Hub,
    MassStorage,
    /// Some other class code.
    Other(u8),
    /// Claimed to be an interface descriptor but couldn't be read as one.
    Malformed(DescriptorError),
}

/// Reads `data` as an interface descriptor, if its type says it is one.
fn interface(
    descriptor_type: u8,
    data: &[u8],
) -> Option<Result<&UsbInterfaceDescriptor, DescriptorError>> {
    if UsbDescType::from_u8(descriptor_type) != Some(UsbDescType::Interface) {
        return None;
    }
    Some(view::<UsbInterfaceDescriptor>(data))
}

fn of_class(class: u8) -> Classification {
    match UsbClass::from_u8(class) {
        Some(UsbClass::Hub) => Classification::Hub,
        Some(UsbClass::MassStorage) => Classification::MassStorage,
        None => Classification::Other(class),
    }
}

/// Decides what `data` is, without logging anything.
pub fn classify(descriptor_type: u8, data: &[u8]) -> Classification {
    match interface(descriptor_type, data) {
        None => Classification::Ignored,
        Some(Err(e)) => Classification::Malformed(e),
        Some(Ok(intf)) => of_class(intf.interface_class),
    }
}

#[derive(Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies one descriptor and logs about it.
    pub fn inspect(&self, descriptor_type: u8, data: &[u8]) -> Classification {
        let intf = match interface(descriptor_type, data) {
            None => return Classification::Ignored,
            Some(Err(e)) => {
                warn!("skipping interface descriptor: {}", e);
                return Classification::Malformed(e);
            }
            Some(Ok(intf)) => intf,
        };
        info!(
            "INTF: class={:#04x} sub={:#04x} proto={:#04x}",
            intf.interface_class, intf.interface_subclass, intf.interface_protocol
        );
        let class = of_class(intf.interface_class);
        match class {
            Classification::Hub => info!(">>> hub detected <<<"),
            Classification::MassStorage => info!(">>> mass storage device detected <<<"),
            _ => {}
        }
        class
    }
}

impl DescriptorSink for Classifier {
    fn on_config_descriptor(&mut self, descriptor_type: u8, data: &[u8]) {
        self.inspect(descriptor_type, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface(class: u8) -> [u8; 9] {
        [0x09, 0x04, 0x00, 0x00, 0x01, class, 0x00, 0x00, 0x00]
    }

    #[test]
    fn hub_class() {
        assert_eq!(classify(0x04, &interface(0x09)), Classification::Hub);
    }

    #[test]
    fn mass_storage_class() {
        assert_eq!(classify(0x04, &interface(0x08)), Classification::MassStorage);
    }

    #[test]
    fn other_classes_are_not_special() {
        for class in (0..=0xffu8).filter(|c| *c != 0x08 && *c != 0x09) {
            assert_eq!(classify(0x04, &interface(class)), Classification::Other(class));
        }
    }

    #[test]
    fn non_interface_descriptors_ignored() {
        // Even if the bytes would read as a hub interface.
        for ty in [0x01, 0x02, 0x05, 0x29, 0xff] {
            assert_eq!(classify(ty, &interface(0x09)), Classification::Ignored);
        }
    }

    #[test]
    fn truncated_interface_is_skipped() {
        let d = interface(0x09);
        assert_eq!(
            classify(0x04, &d[..3]),
            Classification::Malformed(DescriptorError::Truncated {
                needed: 9,
                available: 3
            })
        );
        assert_eq!(
            classify(0x04, &[]),
            Classification::Malformed(DescriptorError::Truncated {
                needed: 9,
                available: 0
            })
        );
    }

    #[test]
    fn lying_length_is_skipped() {
        let mut d = interface(0x09);
        d[0] = 0x20;
        assert_eq!(
            Classifier::new().inspect(0x04, &d),
            Classification::Malformed(DescriptorError::BadLength(0x20))
        );
    }

    #[test]
    fn inspect_agrees_with_classify() {
        let classifier = Classifier::new();
        for class in 0..=0xffu8 {
            let d = interface(class);
            assert_eq!(classifier.inspect(0x04, &d), classify(0x04, &d));
            assert_eq!(classifier.inspect(0x05, &d), Classification::Ignored);
        }
        assert_eq!(classifier.inspect(0x04, &[0x09]), classify(0x04, &[0x09]));
    }

    #[test]
    fn hub_configuration_has_one_hub_interface() {
        let config = [
            0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0xe0, 0x32, //
            0x09, 0x04, 0x00, 0x00, 0x01, 0x09, 0x00, 0x00, 0x00, //
            0x07, 0x05, 0x81, 0x03, 0x01, 0x00, 0xff,
        ];
        let classifier = Classifier::new();
        let found: Vec<Classification> = crate::descriptor::walk(&config)
            .map(|item| {
                let (ty, bytes) = item.unwrap();
                classifier.inspect(ty, bytes)
            })
            .collect();
        assert_eq!(
            found,
            [
                Classification::Ignored,
                Classification::Hub,
                Classification::Ignored
            ]
        );
    }
}
