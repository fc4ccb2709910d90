//=====================================================
// File: scheduler.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cooperative round-robin scheduling
// Objective: Visit registry tasks in link order, give each ready task one
//            quantum, retire halted or faulted tasks, and summarise the run
//=====================================================

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::VmConfig;
use crate::console::Console;
use crate::error::{LoadError, UvmError, UvmResult};
use crate::kernel::Kernel;
use crate::loader::ProgramSource;
use crate::task::TaskId;
use crate::telemetry::{TelemetryCollector, TelemetryEvent, TelemetryEventKind};
use crate::vm::interpreter::{run_quantum, Outcome};

//=====================================================
// SECTION 1: Report
//=====================================================

/// Totals gathered over a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub passes: u64,
    pub quanta: u64,
    pub instructions: u64,
    pub spawned: usize,
    pub halted: usize,
    pub faulted: usize,
    pub peak_memory: usize,
}

impl fmt::Display for SchedulerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "passes:       {}", self.passes)?;
        writeln!(f, "quanta:       {}", self.quanta)?;
        writeln!(f, "instructions: {}", self.instructions)?;
        writeln!(f, "spawned:      {}", self.spawned)?;
        writeln!(f, "halted:       {}", self.halted)?;
        writeln!(f, "faulted:      {}", self.faulted)?;
        write!(f, "peak memory:  {} bytes", self.peak_memory)
    }
}

//=====================================================
// SECTION 2: Machine
//=====================================================

/// A kernel plus the console its tasks talk to, driven pass by pass.
pub struct Machine {
    kernel: Kernel,
    console: Box<dyn Console>,
    passes: u64,
    quanta: u64,
    instructions: u64,
    finished: bool,
}

impl Machine {
    pub fn new(
        config: VmConfig,
        source: impl ProgramSource + 'static,
        console: impl Console + 'static,
    ) -> Self {
        Self {
            kernel: Kernel::new(config, Box::new(source)),
            console: Box::new(console),
            passes: 0,
            quanta: 0,
            instructions: 0,
            finished: false,
        }
    }

    pub fn with_telemetry(mut self, collector: &TelemetryCollector) -> Self {
        self.kernel.set_telemetry(collector.hook());
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Spawn and load a root task.
    pub fn spawn(&mut self, path: &str) -> Result<TaskId, LoadError> {
        self.kernel.spawn_program(path)
    }

    pub fn set_tracing(&mut self, id: TaskId, enabled: bool) -> UvmResult<()> {
        let task = self
            .kernel
            .registry_mut()
            .get_mut(id)
            .ok_or(UvmError::UnknownTask(id))?;
        task.set_tracing(enabled);
        Ok(())
    }

    /// Run until every task has halted.
    pub fn run(&mut self) -> SchedulerReport {
        while self.run_pass() {}
        self.report()
    }

    /// Run at most `max_passes` passes. Returns `true` once the registry is empty.
    pub fn run_until(&mut self, max_passes: u64) -> bool {
        for _ in 0..max_passes {
            if !self.run_pass() {
                return true;
            }
        }
        self.kernel.registry().is_empty()
    }

    /// One sweep from the head to the tail. Returns `false` when no tasks remain.
    pub fn run_pass(&mut self) -> bool {
        if self.kernel.registry().is_empty() {
            if !self.finished {
                self.finished = true;
                info!("scheduler: no more tasks, exiting");
            }
            return false;
        }

        self.kernel.registry_mut().rewind();
        let mut progressed = false;
        while !self.kernel.registry().at_end() {
            let Some(id) = self.kernel.registry_mut().cursor_id() else {
                break;
            };
            let ready = self.kernel.registry().get(id).is_some_and(|task| task.is_ready());
            if ready {
                progressed |= self.visit();
            }
            self.kernel.registry_mut().advance(id);
        }

        self.passes += 1;
        if !progressed {
            debug!(pass = self.passes, "no task made progress this pass");
            thread::sleep(Duration::from_millis(self.kernel.config().idle_backoff_ms));
        }
        true
    }

    /// Run the task at the cursor for one quantum. Returns `false` when the
    /// task only found its input empty.
    fn visit(&mut self) -> bool {
        let Some(mut task) = self.kernel.registry_mut().checkout() else {
            return false;
        };
        let quantum = run_quantum(&mut task, &mut self.kernel, self.console.as_mut());
        self.quanta += 1;
        self.instructions += quantum.steps as u64;
        self.kernel.emit(
            TelemetryEvent::new(TelemetryEventKind::Quantum, task.id()).with_steps(quantum.steps),
        );

        let progressed = quantum.steps > 0 || !matches!(quantum.outcome, Outcome::Starved);
        match quantum.outcome {
            Outcome::Halted => self.kernel.retire(task, None),
            Outcome::Faulted(fault) => self.kernel.retire(task, Some(fault)),
            Outcome::Exhausted | Outcome::Starved | Outcome::Blocked => {
                self.kernel.registry_mut().checkin(task)
            }
        }
        progressed
    }

    pub fn report(&self) -> SchedulerReport {
        let stats = self.kernel.stats();
        SchedulerReport {
            passes: self.passes,
            quanta: self.quanta,
            instructions: self.instructions,
            spawned: stats.spawned,
            halted: stats.halted,
            faulted: stats.faulted,
            peak_memory: self.kernel.registry().peak_memory(),
        }
    }
}
