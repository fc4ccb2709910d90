#![allow(dead_code)]

use uvm::{Machine, MemoryConsole, MemorySource, TelemetryCollector, TelemetryEventKind, VmConfig};

pub struct Harness {
    pub machine: Machine,
    pub console: MemoryConsole,
    pub telemetry: TelemetryCollector,
}

impl Harness {
    pub fn output(&self) -> String {
        self.console.output_string()
    }

    pub fn fault_causes(&self) -> Vec<i32> {
        self.telemetry
            .of_kind(TelemetryEventKind::TaskFault)
            .iter()
            .filter_map(|record| record.cause)
            .collect()
    }
}

pub fn harness(programs: &[(&str, &str)]) -> Harness {
    harness_with(VmConfig::default(), programs)
}

pub fn harness_with(config: VmConfig, programs: &[(&str, &str)]) -> Harness {
    let source = programs
        .iter()
        .fold(MemorySource::new(), |source, (name, text)| source.with_program(*name, *text));
    let console = MemoryConsole::new();
    let telemetry = TelemetryCollector::new();
    let machine = Machine::new(config, source, console.clone()).with_telemetry(&telemetry);
    Harness {
        machine,
        console,
        telemetry,
    }
}

pub fn small_quantum(quantum: usize) -> VmConfig {
    VmConfig {
        quantum,
        idle_backoff_ms: 0,
        ..VmConfig::default()
    }
}

/// Prints the NUL-terminated string whose address is on top of the stack.
pub const PRINT_STRING: &str = "\
:print
:print_loop
dup
load
dup
jumpc :print_emit
pop
pop
ret
:print_emit
out
push 1
add
jump :print_loop
";
