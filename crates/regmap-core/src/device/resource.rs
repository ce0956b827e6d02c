//! Device Port over BAR resource files named `resource<N>`.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{validate_access_size, validate_alignment, DevicePort};
use crate::DeviceReadError;

/// Reads registers from `<dir>/resource<bar>` files, little-endian, with
/// plain `seek` and `read`.
///
/// Meant for captured BAR images. In a sysfs PCI device directory this only
/// works for I/O port BARs: the kernel exposes memory BARs there for `mmap`
/// alone, so reads of them fail with [`DeviceReadError::Io`]. Use a
/// [`CommandDevice`](super::CommandDevice) wrapping a tool such as `pcimem`
/// for live memory-mapped registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDevice {
    dir: PathBuf,
}

impl ResourceDevice {
    /// Creates a backend rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the resource file for `bar`.
    #[must_use]
    pub fn resource_path(&self, bar: u8) -> PathBuf {
        self.dir.join(format!("resource{bar}"))
    }

    /// Directory this backend reads from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DevicePort for ResourceDevice {
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError> {
        let access = validate_access_size(size)?;
        validate_alignment(addr, access)?;

        let mut file = File::open(self.resource_path(bar)).map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                DeviceReadError::RegionNotMapped { bar }
            } else {
                DeviceReadError::Io(error)
            }
        })?;

        let mut bytes = [0u8; 8];
        let width = usize::from(access.bytes());
        file.seek(SeekFrom::Start(addr))?;
        file.read_exact(&mut bytes[..width]).map_err(|error| {
            if error.kind() == ErrorKind::UnexpectedEof {
                DeviceReadError::OutOfRange {
                    bar,
                    address: addr,
                    size,
                }
            } else {
                DeviceReadError::Io(error)
            }
        })?;

        Ok(u64::from_le_bytes(bytes))
    }
}
