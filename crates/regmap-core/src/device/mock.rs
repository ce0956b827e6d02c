//! In-memory Device Port with injectable failures and a read log.

use std::collections::{HashMap, HashSet};

use super::{validate_access_size, DevicePort};
use crate::DeviceReadError;

/// A single read observed by [`MockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Requested region.
    pub bar: u8,
    /// Requested address.
    pub addr: u64,
    /// Requested width in bytes.
    pub size: u8,
}

/// Simulated device backed by a `(bar, address) -> value` table.
///
/// Stored values are truncated to the access width on read. Locations marked
/// with [`MockDevice::fail_at`] report a transport failure; locations with no
/// entry report [`DeviceReadError::Unmapped`].
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    values: HashMap<(u8, u64), u64>,
    failures: HashSet<(u8, u64)>,
    reads: Vec<ReadRequest>,
}

impl MockDevice {
    /// Creates an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` at `(bar, addr)`.
    pub fn set(&mut self, bar: u8, addr: u64, value: u64) {
        self.values.insert((bar, addr), value);
    }

    /// Makes reads at `(bar, addr)` fail with a transport error.
    pub fn fail_at(&mut self, bar: u8, addr: u64) {
        self.failures.insert((bar, addr));
    }

    /// Builder form of [`MockDevice::set`].
    #[must_use]
    pub fn with_value(mut self, bar: u8, addr: u64, value: u64) -> Self {
        self.set(bar, addr, value);
        self
    }

    /// Builder form of [`MockDevice::fail_at`].
    #[must_use]
    pub fn with_failure(mut self, bar: u8, addr: u64) -> Self {
        self.fail_at(bar, addr);
        self
    }

    /// Every read issued so far, in order.
    #[must_use]
    pub fn reads(&self) -> &[ReadRequest] {
        &self.reads
    }

    /// Number of reads issued at `(bar, addr)`.
    #[must_use]
    pub fn read_count(&self, bar: u8, addr: u64) -> usize {
        self.reads
            .iter()
            .filter(|read| read.bar == bar && read.addr == addr)
            .count()
    }
}

impl DevicePort for MockDevice {
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError> {
        self.reads.push(ReadRequest { bar, addr, size });
        let access = validate_access_size(size)?;

        if self.failures.contains(&(bar, addr)) {
            return Err(DeviceReadError::Transport(format!(
                "simulated failure at bar {bar} address 0x{addr:X}"
            )));
        }

        self.values
            .get(&(bar, addr))
            .map(|value| value & access.mask())
            .ok_or(DeviceReadError::Unmapped { bar, address: addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_stored_value_truncated_to_width() {
        let mut device = MockDevice::new().with_value(0, 0x10, 0x1234_5678);

        assert_eq!(device.read_register(0, 0x10, 4).unwrap(), 0x1234_5678);
        assert_eq!(device.read_register(0, 0x10, 2).unwrap(), 0x5678);
        assert_eq!(device.read_register(0, 0x10, 1).unwrap(), 0x78);
    }

    #[test]
    fn bars_are_separate_address_spaces() {
        let mut device = MockDevice::new()
            .with_value(0, 0x10, 1)
            .with_value(2, 0x10, 2);

        assert_eq!(device.read_register(0, 0x10, 4).unwrap(), 1);
        assert_eq!(device.read_register(2, 0x10, 4).unwrap(), 2);
        assert!(matches!(
            device.read_register(1, 0x10, 4),
            Err(DeviceReadError::Unmapped { bar: 1, address: 0x10 })
        ));
    }

    #[test]
    fn injected_failure_wins_over_stored_value() {
        let mut device = MockDevice::new()
            .with_value(0, 0x20, 7)
            .with_failure(0, 0x20);

        assert!(matches!(
            device.read_register(0, 0x20, 4),
            Err(DeviceReadError::Transport(_))
        ));
    }

    #[test]
    fn records_every_read_including_failures() {
        let mut device = MockDevice::new().with_value(0, 0x10, 1);

        let _ = device.read_register(0, 0x10, 4);
        let _ = device.read_register(0, 0x14, 4);
        let _ = device.read_register(0, 0x10, 3);

        assert_eq!(device.reads().len(), 3);
        assert_eq!(device.read_count(0, 0x10), 2);
        assert_eq!(
            device.reads()[1],
            ReadRequest {
                bar: 0,
                addr: 0x14,
                size: 4
            }
        );
    }

    #[test]
    fn rejects_unsupported_width() {
        let mut device = MockDevice::new().with_value(0, 0x10, 1);
        assert!(matches!(
            device.read_register(0, 0x10, 3),
            Err(DeviceReadError::UnsupportedSize { size: 3 })
        ));
    }
}
