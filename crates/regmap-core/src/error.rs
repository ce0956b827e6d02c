//! Error taxonomy for register-map loading, device reads and value access.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single Device Port read.
///
/// Local to one register: the prober records it and keeps going.
#[derive(Debug, Error)]
pub enum DeviceReadError {
    /// Access width is not one of 1, 2, 4 or 8 bytes, or exceeds the backend limit.
    #[error("unsupported access size of {size} bytes")]
    UnsupportedSize {
        /// Requested width in bytes.
        size: u8,
    },
    /// Address is not naturally aligned for the access width.
    #[error("address 0x{address:X} is not aligned to {size} bytes")]
    Misaligned {
        /// Requested address.
        address: u64,
        /// Requested width in bytes.
        size: u8,
    },
    /// Backend holds no value at this location.
    #[error("no register mapped at bar {bar} address 0x{address:X}")]
    Unmapped {
        /// Requested region.
        bar: u8,
        /// Requested address.
        address: u64,
    },
    /// The whole region is unavailable.
    #[error("bar {bar} is not mapped")]
    RegionNotMapped {
        /// Requested region.
        bar: u8,
    },
    /// Read crosses the end of the region.
    #[error("read of {size} bytes at 0x{address:X} runs past the end of bar {bar}")]
    OutOfRange {
        /// Requested region.
        bar: u8,
        /// Requested address.
        address: u64,
        /// Requested width in bytes.
        size: u8,
    },
    /// External read utility could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// External read utility exited unsuccessfully.
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        /// Program that was run.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// Backend produced output that is not a value of the requested width.
    #[error("malformed read output {output:?}")]
    MalformedOutput {
        /// Offending output.
        output: String,
    },
    /// I/O error while accessing the backing store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Backend-specific transport failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// A value was requested from a node that cannot provide one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The owning register has not been resolved by a successful probe.
    #[error("register `{register}` has no resolved value")]
    Unresolved {
        /// Name of the unresolved register.
        register: String,
    },
    /// Blocks carry no directly readable value.
    #[error("block `{block}` has no value")]
    NotReadable {
        /// Name of the block.
        block: String,
    },
}

/// A structurally valid definition that is semantically inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Slash-separated path of the offending node, e.g. `top/CTRL/EN`.
    pub path: String,
    /// What is wrong with it.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a validation error for the node at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl std::error::Error for ValidationError {}

/// Classification of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Field specifies both `bits` and `width`.
    AmbiguousLayout,
    /// Field specifies neither `bits` nor `width`.
    MissingLayout,
    /// Field `bits` list is empty.
    EmptyBitList,
    /// Field `bits` names the same bit twice.
    DuplicateBit {
        /// Repeated bit index.
        bit: u8,
    },
    /// Field bit index does not exist in the register.
    BitOutOfRange {
        /// Offending bit index.
        bit: u8,
        /// Register width in bits.
        register_bits: u32,
    },
    /// Field width is zero or wider than the register.
    WidthOutOfRange {
        /// Offending width.
        width: u8,
        /// Register width in bits.
        register_bits: u32,
    },
    /// Register `size` is not 1, 2, 4 or 8 bytes.
    UnsupportedSize {
        /// Offending size.
        size: u8,
    },
    /// Expected-good value has bits set beyond the node's width.
    GoodValueTooWide {
        /// Offending value.
        good: u64,
        /// Node width in bits.
        bits: u32,
    },
    /// Recorded snapshot value has bits set beyond the register width.
    ValueTooWide {
        /// Offending value.
        value: u64,
        /// Register width in bits.
        bits: u32,
    },
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousLayout => write!(f, "field sets both `bits` and `width`"),
            Self::MissingLayout => write!(f, "field sets neither `bits` nor `width`"),
            Self::EmptyBitList => write!(f, "field `bits` list is empty"),
            Self::DuplicateBit { bit } => write!(f, "bit {bit} listed more than once"),
            Self::BitOutOfRange { bit, register_bits } => {
                write!(f, "bit {bit} is outside a {register_bits}-bit register")
            }
            Self::WidthOutOfRange {
                width,
                register_bits,
            } => write!(
                f,
                "width {width} is not within 1..={register_bits} for this register"
            ),
            Self::UnsupportedSize { size } => {
                write!(f, "size {size} is not one of 1, 2, 4 or 8 bytes")
            }
            Self::GoodValueTooWide { good, bits } => {
                write!(f, "good value 0x{good:X} does not fit in {bits} bits")
            }
            Self::ValueTooWide { value, bits } => {
                write!(f, "recorded value 0x{value:X} does not fit in {bits} bits")
            }
        }
    }
}

/// Failure to load, validate or serialize a register map description.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The description file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Structurally malformed description.
    #[error("malformed register map: {0}")]
    Parse(#[source] serde_yaml::Error),
    /// Structurally valid but inconsistent description.
    #[error("invalid register map: {0}")]
    Validation(#[from] ValidationError),
    /// The tree could not be rendered back to text.
    #[error("failed to serialize register map: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// One register whose read failed during a probe run.
#[derive(Debug)]
pub struct ProbeFailure {
    /// Slash-separated path of the register.
    pub path: String,
    /// Region the read targeted.
    pub bar: u8,
    /// Address the read targeted.
    pub address: u64,
    /// What went wrong.
    pub error: DeviceReadError,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (bar {} @ 0x{:X}): {}",
            self.path, self.bar, self.address, self.error
        )
    }
}

/// Aggregate failure of a probe run, returned after every register was attempted.
#[derive(Debug)]
pub struct ProbeError {
    /// Number of registers the run attempted.
    pub attempted: usize,
    /// Failed reads in traversal order.
    pub failures: Vec<ProbeFailure>,
}

impl ProbeError {
    /// Returns the paths of the registers whose reads failed.
    pub fn failed_paths(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|failure| failure.path.as_str())
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} register reads failed",
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProbeError {}
