//! Device Port contract and its backends.
//!
//! The rest of the crate talks to hardware only through [`DevicePort`]. Each
//! backend turns whatever mechanism it wraps into a single success or
//! [`DeviceReadError`] per call.

/// External read-utility backend.
pub mod command;
/// In-memory backend for tests and simulation.
pub mod mock;
/// PCI BAR resource-file backend.
pub mod resource;

pub use command::CommandDevice;
pub use mock::{MockDevice, ReadRequest};
pub use resource::ResourceDevice;

use crate::DeviceReadError;

/// Register width used when a register does not configure one.
pub const DEFAULT_ACCESS_SIZE: AccessSize = AccessSize::Dword;

/// Read-only register access capability.
pub trait DevicePort {
    /// Reads `size` bytes at `addr` within region `bar`, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceReadError`] when the backend cannot produce a value.
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError>;
}

impl<T: DevicePort + ?Sized> DevicePort for Box<T> {
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError> {
        (**self).read_register(bar, addr, size)
    }
}

impl<T: DevicePort + ?Sized> DevicePort for &mut T {
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError> {
        (**self).read_register(bar, addr, size)
    }
}

/// Supported register access widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AccessSize {
    /// 8-bit access.
    Byte = 1,
    /// 16-bit access.
    Word = 2,
    /// 32-bit access.
    Dword = 4,
    /// 64-bit access.
    Qword = 8,
}

impl AccessSize {
    /// Decodes a byte count into an access size.
    #[must_use]
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::Dword),
            8 => Some(Self::Qword),
            _ => None,
        }
    }

    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        self as u8
    }

    /// Width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32 * 8
    }

    /// Mask selecting the bits an access of this width can carry.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Qword => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }
}

/// Validates a raw access width.
///
/// # Errors
///
/// Returns [`DeviceReadError::UnsupportedSize`] unless `size` is 1, 2, 4 or 8.
pub const fn validate_access_size(size: u8) -> Result<AccessSize, DeviceReadError> {
    match AccessSize::from_bytes(size) {
        Some(access) => Ok(access),
        None => Err(DeviceReadError::UnsupportedSize { size }),
    }
}

/// Validates natural alignment of `addr` for an access of `size`.
///
/// # Errors
///
/// Returns [`DeviceReadError::Misaligned`] when `addr` is not a multiple of the width.
pub fn validate_alignment(addr: u64, size: AccessSize) -> Result<(), DeviceReadError> {
    if addr % u64::from(size.bytes()) == 0 {
        Ok(())
    } else {
        Err(DeviceReadError::Misaligned {
            address: addr,
            size: size.bytes(),
        })
    }
}
