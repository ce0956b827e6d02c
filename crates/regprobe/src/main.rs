//! CLI entry point for the regprobe binary.

use std::env;
use std::fmt::Display;

use regmap_core::{
    dump, load_file, probe, report, save_file, summarize, DumpOptions, ReportOptions,
};
use regprobe::args::{
    parse_args, CheckArgs, Command, ParseResult, ProbeArgs, ReportArgs, USAGE_TEXT,
};
use regprobe::backend::build_device;
use regprobe::logging;
use serde as _;
use serde_yaml as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing::info;
use tracing_subscriber as _;

const EXIT_ERROR: i32 = 1;
const EXIT_ANOMALIES: i32 = 2;

fn fail(error: impl Display) -> i32 {
    eprintln!("error: {error}");
    EXIT_ERROR
}

fn run_probe(args: &ProbeArgs) -> Result<(), i32> {
    let mut map = load_file(&args.map).map_err(fail)?;
    let mut device = build_device(&args.backend).map_err(fail)?;

    let outcome = probe(&mut device, &mut map);
    if let Err(error) = &outcome {
        eprintln!("error: {error}");
    }

    print!(
        "{}",
        report(
            &map,
            &ReportOptions {
                anomalies_only: args.anomalies_only,
            }
        )
    );

    if let Some(output) = &args.output {
        save_file(
            output,
            &map,
            DumpOptions {
                include_values: true,
            },
        )
        .map_err(fail)?;
        info!(path = %output.display(), "snapshot saved");
    }

    if outcome.is_err() || !summarize(&map).all_good() {
        Err(EXIT_ANOMALIES)
    } else {
        Ok(())
    }
}

fn run_report(args: &ReportArgs) -> Result<(), i32> {
    let map = load_file(&args.snapshot).map_err(fail)?;

    print!(
        "{}",
        report(
            &map,
            &ReportOptions {
                anomalies_only: args.anomalies_only,
            }
        )
    );

    if summarize(&map).all_good() {
        Ok(())
    } else {
        Err(EXIT_ANOMALIES)
    }
}

fn run_check(args: &CheckArgs) -> Result<(), i32> {
    let map = load_file(&args.map).map_err(fail)?;
    print!("{}", dump(&map).map_err(fail)?);
    info!(
        registers = map.register_count(),
        path = %args.map.display(),
        "register map is valid"
    );
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            logging::init(command.verbose());
            let result = match &command {
                Command::Probe(args) => run_probe(args),
                Command::Report(args) => run_report(args),
                Command::Check(args) => run_check(args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
