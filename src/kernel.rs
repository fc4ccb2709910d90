//=====================================================
// File: kernel.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Shared machine state reachable from syscalls
// Objective: Tie the registry, program source, configuration, and telemetry
//            together behind spawn, halt, and abort primitives
//=====================================================

use std::fmt;

use tracing::warn;

use crate::config::VmConfig;
use crate::error::{Fault, LoadError, LOAD_FAULT_CODE};
use crate::loader::{LoadOptions, Loader, ProgramSource};
use crate::task::{Registry, Task, TaskId};
use crate::telemetry::{TelemetryEvent, TelemetryEventKind, TelemetryHook};

/// Lifetime counters folded into the scheduler report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub spawned: usize,
    pub halted: usize,
    pub faulted: usize,
}

pub struct Kernel {
    registry: Registry,
    source: Box<dyn ProgramSource>,
    config: VmConfig,
    telemetry: Option<TelemetryHook>,
    stats: KernelStats,
}

impl Kernel {
    pub fn new(config: VmConfig, source: Box<dyn ProgramSource>) -> Self {
        Self {
            registry: Registry::new(config.first_task_id, config.limits()),
            source,
            config,
            telemetry: None,
            stats: KernelStats::default(),
        }
    }

    pub fn set_telemetry(&mut self, hook: TelemetryHook) {
        self.telemetry = Some(hook);
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn stats(&self) -> KernelStats {
        self.stats
    }

    pub(crate) fn emit(&self, event: TelemetryEvent) {
        if let Some(hook) = &self.telemetry {
            hook(&event);
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            forward_references: self.config.forward_references,
            ..LoadOptions::default()
        }
    }

    /// Spawn a task named after `path` and load the program into it.
    ///
    /// A load failure aborts the fresh task before the error is returned.
    pub fn spawn_program(&mut self, path: &str) -> Result<TaskId, LoadError> {
        let id = self.registry.spawn(path);
        self.stats.spawned += 1;
        self.emit(TelemetryEvent::new(TelemetryEventKind::TaskSpawn, id));

        let loader = Loader::new(self.source.as_ref(), self.load_options());
        let result = match self.registry.get_mut(id) {
            Some(task) => loader.load(task, path).map(|_| id),
            None => Ok(id),
        };
        if let Err(err) = &result {
            self.report_fault(id, path, LOAD_FAULT_CODE, None, err);
            self.stats.faulted += 1;
            self.halt(id);
        }
        result
    }

    /// Remove a task and wake everything waiting on it.
    pub fn halt(&mut self, id: TaskId) -> bool {
        let Some(woken) = self.registry.halt(id) else {
            return false;
        };
        self.stats.halted += 1;
        self.emit(TelemetryEvent::new(TelemetryEventKind::TaskHalt, id));
        for waiter in woken {
            self.emit(TelemetryEvent::new(TelemetryEventKind::TaskWake, waiter));
        }
        true
    }

    /// Abort a parked task. Returns `false` when `id` is not a parked task.
    pub fn abort(&mut self, id: TaskId, fault: &Fault) -> bool {
        let Some(task) = self.registry.get(id) else {
            return false;
        };
        let name = task.name().to_string();
        let line = task.current_line();
        self.report_fault(id, &name, fault.code(), line, fault);
        self.stats.faulted += 1;
        self.halt(id)
    }

    /// Retire a task that was checked out for its quantum.
    pub(crate) fn retire(&mut self, task: Box<Task>, fault: Option<Fault>) {
        if let Some(fault) = fault {
            self.report_fault(task.id(), task.name(), fault.code(), task.current_line(), &fault);
            self.stats.faulted += 1;
        }
        self.halt(task.id());
    }

    fn report_fault(
        &self,
        id: TaskId,
        name: &str,
        cause: i32,
        line: Option<u32>,
        reason: &dyn fmt::Display,
    ) {
        match line {
            Some(line) => warn!(
                task = id,
                cause,
                "task '{}' ({}) aborted at line {}: {}",
                name,
                id,
                line,
                reason
            ),
            None => warn!(task = id, cause, "task '{}' ({}) aborted: {}", name, id, reason),
        }
        self.emit(TelemetryEvent::new(TelemetryEventKind::TaskFault, id).with_cause(cause));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySource;
    use crate::telemetry::TelemetryCollector;

    fn kernel(source: MemorySource) -> Kernel {
        Kernel::new(VmConfig::default(), Box::new(source))
    }

    #[test]
    fn failed_load_aborts_the_child() {
        let mut kernel = kernel(MemorySource::new().with_program("bad", "bogus\n"));
        let collector = TelemetryCollector::new();
        kernel.set_telemetry(collector.hook());

        let result = kernel.spawn_program("bad");
        assert!(matches!(result, Err(LoadError::UnknownMnemonic { .. })));
        assert!(kernel.registry().is_empty());
        assert_eq!(kernel.registry().memory_used(), 0);
        assert_eq!(collector.of_kind(TelemetryEventKind::TaskFault)[0].cause, Some(LOAD_FAULT_CODE));
        assert_eq!(
            kernel.stats(),
            KernelStats {
                spawned: 1,
                halted: 1,
                faulted: 1
            }
        );
    }

    #[test]
    fn abort_unknown_task_is_a_no_op() {
        let mut kernel = kernel(MemorySource::new().with_program("ok", "halt\n"));
        let id = kernel.spawn_program("ok").unwrap();
        assert!(!kernel.abort(id + 50, &Fault::Aborted { by: id }));
        assert!(kernel.abort(id, &Fault::Aborted { by: id }));
        assert!(kernel.registry().is_empty());
    }
}
