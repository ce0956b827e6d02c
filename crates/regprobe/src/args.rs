//! Command-line argument parsing.

use std::ffi::OsString;
use std::path::PathBuf;

/// Help text printed for `--help` and after usage errors.
pub const USAGE_TEXT: &str = "\
Usage: regprobe <command> [options]

Commands:
  probe  <map> <backend> [options]  Read live registers and report anomalies
  report <snapshot> [options]       Report a snapshot saved by `probe -o`
  check  <map>                      Validate a register map and print it normalized

Backends (probe, exactly one):
  --sim <file>        Simulated device from a YAML value table
  --resource <dir>    Directory of BAR images or I/O BAR files named resource<bar>
  --exec <program>    External read utility, run once per register
  --arg <template>    Argument for --exec; {bar}, {addr} and {size} are expanded

Options:
  -o, --output <file>     Save the probed map with values (probe only)
  -a, --anomalies-only    Only list anomalous or unresolved nodes
  -v, --verbose           Debug logging to stderr (REGPROBE_LOG overrides)
  -h, --help              Show this help message

Exit status: 0 all good, 1 usage or configuration error, 2 anomalies or failed reads.

Examples:
  regprobe check nic.yaml
  regprobe probe nic.yaml --resource ./bars -a
  regprobe probe nic.yaml --exec pcimem --arg {bar} --arg {addr} --arg {size} -o snap.yaml
  regprobe report snap.yaml --anomalies-only
";

/// A parsed command line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Run a command.
    Command(Command),
    /// Print [`USAGE_TEXT`].
    Help,
}

/// Top-level commands.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Probe a live or simulated device.
    Probe(ProbeArgs),
    /// Render a saved snapshot.
    Report(ReportArgs),
    /// Validate a register map.
    Check(CheckArgs),
}

impl Command {
    /// Whether debug logging was requested.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        match self {
            Self::Probe(args) => args.verbose,
            Self::Report(args) => args.verbose,
            Self::Check(args) => args.verbose,
        }
    }
}

/// Where register values come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendArgs {
    /// YAML value table for a simulated device.
    Sim(PathBuf),
    /// Directory holding `resource<bar>` files.
    Resource(PathBuf),
    /// External read utility and its argument templates.
    Exec {
        /// Program to run.
        program: String,
        /// Argument templates.
        args: Vec<String>,
    },
}

/// Arguments of `probe`.
#[derive(Debug, PartialEq, Eq)]
pub struct ProbeArgs {
    /// Register-map description.
    pub map: PathBuf,
    /// Device backend.
    pub backend: BackendArgs,
    /// Snapshot destination.
    pub output: Option<PathBuf>,
    /// Report anomalies only.
    pub anomalies_only: bool,
    /// Debug logging.
    pub verbose: bool,
}

/// Arguments of `report`.
#[derive(Debug, PartialEq, Eq)]
pub struct ReportArgs {
    /// Snapshot written by `probe -o`.
    pub snapshot: PathBuf,
    /// Report anomalies only.
    pub anomalies_only: bool,
    /// Debug logging.
    pub verbose: bool,
}

/// Arguments of `check`.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckArgs {
    /// Register-map description.
    pub map: PathBuf,
    /// Debug logging.
    pub verbose: bool,
}

/// Parses the arguments following the program name.
///
/// # Errors
///
/// Returns a message describing the first problem found. Help requested after
/// a command is returned as the usage text itself.
pub fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    let command = match command_str.as_str() {
        "probe" => parse_probe_args(args).map(Command::Probe),
        "report" => parse_report_args(args).map(Command::Report),
        "check" => parse_check_args(args).map(Command::Check),
        other => Err(format!("unknown command: {other}")),
    }?;
    Ok(ParseResult::Command(command))
}

fn option_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<OsString, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn set_input(input: &mut Option<PathBuf>, arg: OsString) -> Result<(), String> {
    if arg.to_string_lossy().starts_with('-') {
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }
    if input.is_some() {
        return Err("multiple input paths provided".to_string());
    }
    *input = Some(PathBuf::from(arg));
    Ok(())
}

fn set_backend(backend: &mut Option<BackendArgs>, value: BackendArgs) -> Result<(), String> {
    if backend.is_some() {
        return Err("only one of --sim, --resource or --exec may be given".to_string());
    }
    *backend = Some(value);
    Ok(())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_probe_args(mut args: impl Iterator<Item = OsString>) -> Result<ProbeArgs, String> {
    let mut map: Option<PathBuf> = None;
    let mut backend: Option<BackendArgs> = None;
    let mut templates: Vec<String> = Vec::new();
    let mut output: Option<PathBuf> = None;
    let mut anomalies_only = false;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg == "--anomalies-only" || arg == "-a" {
            anomalies_only = true;
        } else if arg == "-o" || arg == "--output" {
            output = Some(PathBuf::from(option_value(&mut args, "-o")?));
        } else if arg == "--sim" {
            let path = option_value(&mut args, "--sim")?;
            set_backend(&mut backend, BackendArgs::Sim(PathBuf::from(path)))?;
        } else if arg == "--resource" {
            let path = option_value(&mut args, "--resource")?;
            set_backend(&mut backend, BackendArgs::Resource(PathBuf::from(path)))?;
        } else if arg == "--exec" {
            let program = option_value(&mut args, "--exec")?;
            set_backend(
                &mut backend,
                BackendArgs::Exec {
                    program: program.to_string_lossy().to_string(),
                    args: Vec::new(),
                },
            )?;
        } else if arg == "--arg" {
            let template = option_value(&mut args, "--arg")?;
            templates.push(template.to_string_lossy().to_string());
        } else {
            set_input(&mut map, arg)?;
        }
    }

    let map = map.ok_or_else(|| "missing register map path".to_string())?;
    let backend = match backend {
        Some(BackendArgs::Exec { program, .. }) => BackendArgs::Exec {
            program,
            args: templates,
        },
        Some(_) if !templates.is_empty() => {
            return Err("--arg is only valid with --exec".to_string());
        }
        Some(other) => other,
        None => return Err("missing backend: use --sim, --resource or --exec".to_string()),
    };

    Ok(ProbeArgs {
        map,
        backend,
        output,
        anomalies_only,
        verbose,
    })
}

fn parse_report_args(args: impl Iterator<Item = OsString>) -> Result<ReportArgs, String> {
    let mut snapshot: Option<PathBuf> = None;
    let mut anomalies_only = false;
    let mut verbose = false;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg == "--anomalies-only" || arg == "-a" {
            anomalies_only = true;
        } else {
            set_input(&mut snapshot, arg)?;
        }
    }

    let snapshot = snapshot.ok_or_else(|| "missing snapshot path".to_string())?;
    Ok(ReportArgs {
        snapshot,
        anomalies_only,
        verbose,
    })
}

fn parse_check_args(args: impl Iterator<Item = OsString>) -> Result<CheckArgs, String> {
    let mut map: Option<PathBuf> = None;
    let mut verbose = false;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else {
            set_input(&mut map, arg)?;
        }
    }

    let map = map.ok_or_else(|| "missing register map path".to_string())?;
    Ok(CheckArgs { map, verbose })
}
