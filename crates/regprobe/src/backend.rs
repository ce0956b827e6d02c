//! Builds the Device Port selected on the command line.

use std::fs;
use std::path::{Path, PathBuf};

use regmap_core::codec::Number;
use regmap_core::{CommandDevice, DevicePort, MockDevice, ResourceDevice};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::args::BackendArgs;

/// Failure to set up a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The simulated value table could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The simulated value table is malformed.
    #[error("malformed simulated value table: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One location of a simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimEntry {
    /// Region, default 0.
    #[serde(default)]
    pub bar: u8,
    /// Address within the region.
    pub address: Number,
    /// Value returned by reads; absent means unmapped.
    #[serde(default)]
    pub value: Option<Number>,
    /// Make reads at this location fail.
    #[serde(default)]
    pub fail: bool,
}

/// Builds a simulated device from a YAML list of [`SimEntry`].
///
/// # Errors
///
/// Returns [`BackendError::Parse`] when `text` is not such a list.
pub fn parse_sim(text: &str) -> Result<MockDevice, BackendError> {
    let entries: Vec<SimEntry> = serde_yaml::from_str(text)?;
    let mut device = MockDevice::new();
    for entry in &entries {
        if entry.fail {
            device.fail_at(entry.bar, entry.address.0);
        } else if let Some(Number(value)) = entry.value {
            device.set(entry.bar, entry.address.0, value);
        }
    }
    debug!(locations = entries.len(), "loaded simulated device");
    Ok(device)
}

/// Reads and parses a simulated value table.
///
/// # Errors
///
/// Returns [`BackendError::Io`] when the file cannot be read, otherwise as [`parse_sim`].
pub fn load_sim(path: &Path) -> Result<MockDevice, BackendError> {
    let text = fs::read_to_string(path).map_err(|source| BackendError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sim(&text)
}

/// Instantiates the backend described by `args`.
///
/// # Errors
///
/// Only the simulated backend reads anything up front; see [`load_sim`].
pub fn build_device(args: &BackendArgs) -> Result<Box<dyn DevicePort>, BackendError> {
    let device: Box<dyn DevicePort> = match args {
        BackendArgs::Sim(path) => Box::new(load_sim(path)?),
        BackendArgs::Resource(dir) => {
            debug!(dir = %dir.display(), "using resource-file backend");
            Box::new(ResourceDevice::new(dir))
        }
        BackendArgs::Exec { program, args } => {
            debug!(program = program.as_str(), ?args, "using external read utility");
            Box::new(CommandDevice::new(program.clone(), args.clone()))
        }
    };
    Ok(device)
}
