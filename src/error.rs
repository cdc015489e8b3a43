// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types.
//!
//! Nothing in here ever escapes the main loop. Transfer failures are logged and
//! retried by the controller; descriptor problems are logged and skipped.

use thiserror::Error;

/// Failure status from a control transfer submission.
///
/// Success is `Ok(())`; every variant here is a distinct failure cause. The
/// controller treats them opaquely and only prints the raw code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum TransferError {
    /// There is no configured device to talk to.
    #[error("no device ready")]
    NotReady,
    /// The device answered with STALL.
    #[error("endpoint stalled")]
    Stall,
    /// The device never answered, or kept NAKing until we gave up.
    #[error("transaction timed out")]
    Timeout,
    /// DATA0/DATA1 toggle mismatch.
    #[error("data sequence error")]
    DataSequence,
    #[error("CRC error")]
    Crc,
    #[error("bit stuffing error")]
    BitStuff,
    #[error("receive overflow")]
    RxOverflow,
    /// The device sent back less than the smallest thing we could use.
    #[error("short read")]
    ShortRead,
    /// The host stack can't issue this kind of request.
    #[error("unsupported request")]
    Unsupported,
    /// Anything else the host stack wants to report, as its raw code.
    #[error("host status {0:#x}")]
    Other(u8),
}

impl TransferError {
    /// Raw status number, for log lines.
    pub fn code(self) -> u8 {
        match self {
            Self::NotReady => 0x01,
            Self::Stall => 0x02,
            Self::Timeout => 0x03,
            Self::DataSequence => 0x04,
            Self::Crc => 0x05,
            Self::BitStuff => 0x06,
            Self::RxOverflow => 0x07,
            Self::ShortRead => 0x08,
            Self::Unsupported => 0x09,
            Self::Other(code) => code,
        }
    }
}

/// Problems found while looking at descriptor bytes handed to us by the host
/// stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Fewer bytes than the layout we want to read.
    #[error("descriptor truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    /// `bLength` is zero, shorter than the layout, or runs past the data.
    #[error("descriptor length field {0} is inconsistent")]
    BadLength(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Hub ports are numbered from 1, and this hub has four.
    #[error("hub port {0} out of range")]
    PortOutOfRange(u8),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            TransferError::NotReady,
            TransferError::Stall,
            TransferError::Timeout,
            TransferError::DataSequence,
            TransferError::Crc,
            TransferError::BitStuff,
            TransferError::RxOverflow,
            TransferError::ShortRead,
            TransferError::Unsupported,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
        assert_eq!(TransferError::Other(0x42).code(), 0x42);
    }

    #[test]
    fn wraps_into_crate_error() {
        let e: Error = TransferError::Stall.into();
        assert_eq!(e, Error::Transfer(TransferError::Stall));
        let e: Error = DescriptorError::BadLength(0).into();
        assert_eq!(e, Error::Descriptor(DescriptorError::BadLength(0)));
    }
}
