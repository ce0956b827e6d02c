//! Device Port that shells out to an external register-read utility.

use std::process::Command;

use tracing::trace;

use super::{validate_access_size, AccessSize, DevicePort};
use crate::DeviceReadError;

/// Runs `program` once per read and parses the value it prints.
///
/// Each argument template may contain `{bar}`, `{addr}` (rendered as `0x`-prefixed
/// hex) and `{size}` (bytes). The last whitespace-separated token of standard
/// output is parsed as hexadecimal, with or without a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDevice {
    program: String,
    args: Vec<String>,
}

impl CommandDevice {
    /// Creates a backend that runs `program` with the given argument templates.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The program this backend runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expands the argument templates for one read.
    #[must_use]
    pub fn expand_args(&self, bar: u8, addr: u64, size: u8) -> Vec<String> {
        self.args
            .iter()
            .map(|template| {
                template
                    .replace("{bar}", &bar.to_string())
                    .replace("{addr}", &format!("0x{addr:X}"))
                    .replace("{size}", &size.to_string())
            })
            .collect()
    }
}

impl DevicePort for CommandDevice {
    fn read_register(&mut self, bar: u8, addr: u64, size: u8) -> Result<u64, DeviceReadError> {
        let access = validate_access_size(size)?;
        let args = self.expand_args(bar, addr, size);
        trace!(program = %self.program, ?args, "running read utility");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| DeviceReadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DeviceReadError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_read_output(&String::from_utf8_lossy(&output.stdout), access)
    }
}

/// Parses the value printed by a read utility.
///
/// # Errors
///
/// Returns [`DeviceReadError::MalformedOutput`] when the last token is not hex
/// or carries bits beyond the access width.
pub fn parse_read_output(stdout: &str, size: AccessSize) -> Result<u64, DeviceReadError> {
    let malformed = || DeviceReadError::MalformedOutput {
        output: stdout.trim().to_string(),
    };

    let token = stdout.split_whitespace().last().ok_or_else(malformed)?;
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    let value = u64::from_str_radix(digits, 16).map_err(|_| malformed())?;

    if value & !size.mask() == 0 {
        Ok(value)
    } else {
        Err(malformed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_placeholders() {
        let device = CommandDevice::new(
            "pcimem",
            vec!["bar{bar}".into(), "{addr}".into(), "-s".into(), "{size}".into()],
        );
        assert_eq!(
            device.expand_args(2, 0x1000, 4),
            ["bar2", "0x1000", "-s", "4"]
        );
    }

    #[test]
    fn parses_last_token_as_hex() {
        assert_eq!(
            parse_read_output("Value at 0x1000: 0xDEADBEEF\n", AccessSize::Dword).unwrap(),
            0xDEAD_BEEF
        );
        assert_eq!(parse_read_output("ff\n", AccessSize::Byte).unwrap(), 0xFF);
    }

    #[test]
    fn rejects_empty_non_hex_and_oversized_output() {
        for output in ["", "   \n", "value: zz", "0x1FF"] {
            assert!(
                matches!(
                    parse_read_output(output, AccessSize::Byte),
                    Err(DeviceReadError::MalformedOutput { .. })
                ),
                "{output:?} should be malformed"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn reads_value_printed_by_program() {
        let mut device = CommandDevice::new("echo", vec!["value".into(), "{addr}".into()]);
        assert_eq!(device.read_register(0, 0x1000, 4).unwrap(), 0x1000);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_read_failure() {
        let mut device = CommandDevice::new("false", Vec::new());
        assert!(matches!(
            device.read_register(0, 0x1000, 4),
            Err(DeviceReadError::CommandFailed { .. })
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let mut device = CommandDevice::new("regprobe-no-such-read-utility", Vec::new());
        assert!(matches!(
            device.read_register(0, 0x1000, 4),
            Err(DeviceReadError::Spawn { .. })
        ));
    }
}
