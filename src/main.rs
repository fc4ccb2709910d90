//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: UVM host entry point
// Objective: Resolve configuration, load one root program, and run the
//            scheduler until every task has halted
//=====================================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use uvm::{config, logging, FileSource, Machine, StdConsole, TelemetryCollector};

#[derive(Parser, Debug)]
#[command(name = "uvm", about = "Multitasking stack virtual machine", version)]
pub struct Args {
    /// Program to load as the root task.
    pub program: String,

    /// TOML configuration file.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Instructions per scheduling quantum.
    #[arg(long = "quantum")]
    pub quantum: Option<usize>,

    /// Start the root task with tracing enabled.
    #[arg(long = "trace")]
    pub trace: bool,

    /// Print a scheduler report at exit.
    #[arg(long = "report", value_enum)]
    pub report: Option<ReportFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("uvm");
    println!("u/vm {}", uvm::VERSION);

    let mut vm_config = config::resolve(args.config.as_deref()).context("loading configuration")?;
    if let Some(quantum) = args.quantum {
        vm_config.quantum = quantum;
        vm_config.validate()?;
    }

    let telemetry = TelemetryCollector::new();
    let mut machine =
        Machine::new(vm_config, FileSource, StdConsole::new()).with_telemetry(&telemetry);
    let root = machine
        .spawn(&args.program)
        .with_context(|| format!("failed to load '{}'", args.program))?;
    if args.trace {
        machine.set_tracing(root, true)?;
    }

    let report = machine.run();
    match args.report {
        Some(ReportFormat::Text) => println!("{report}"),
        Some(ReportFormat::Json) => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "events": telemetry.snapshot(),
            }))?
        ),
        None => {}
    }
    Ok(())
}
