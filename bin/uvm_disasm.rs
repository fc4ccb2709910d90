use anyhow::{anyhow, Result};
use serde::Serialize;
use std::env;
use uvm::loader::{FileSource, LoadOptions, Loader};
use uvm::vm::Instruction;
use uvm::Task;

#[derive(Serialize)]
struct Listing<'a> {
    entry: usize,
    labels: Vec<(i32, &'a str)>,
    code: &'a [Instruction],
}

fn main() -> Result<()> {
    let mut json = false;
    let mut input = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => input = Some(arg),
        }
    }
    let input = input.ok_or_else(|| anyhow!("no input file provided"))?;

    let config = uvm::config::resolve(None)?;
    let options = LoadOptions {
        forward_references: config.forward_references,
        ..LoadOptions::default()
    };
    let mut task = Task::new(0, input.as_str(), &config.limits());
    let labels = Loader::new(&FileSource, options).load(&mut task, &input)?;
    let code_labels = labels.code_labels();

    if json {
        let listing = Listing {
            entry: task.pc(),
            labels: code_labels,
            code: task.code(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("; {} ({} instructions, entry {:04})", input, task.code().len(), task.pc());
    for (offset, instruction) in task.code().iter().enumerate() {
        for (_, name) in code_labels.iter().filter(|(address, _)| *address as usize == offset) {
            println!("{name}");
        }
        println!(
            "  {:04}: {:<24} ; line {}",
            offset,
            instruction.to_string(),
            instruction.source_line
        );
    }
    Ok(())
}
