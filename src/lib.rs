//=====================================================
// File: lib.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: UVM library root
// Objective: Expose the multitasking stack VM: task model, loader,
//            interpreter, syscalls, scheduler, and host plumbing
//=====================================================

pub mod config;
pub mod console;
pub mod error;
pub mod kernel;
pub mod loader;
pub mod logging;
pub mod scheduler;
pub mod task;
pub mod telemetry;
pub mod vm;

pub use config::VmConfig;
pub use console::{Console, MemoryConsole, StdConsole};
pub use error::{ConfigError, Fault, LoadError, UvmError, UvmResult};
pub use kernel::Kernel;
pub use loader::{FileSource, MemorySource, ProgramSource};
pub use scheduler::{Machine, SchedulerReport};
pub use task::{Task, TaskId, TaskStatus};
pub use telemetry::{TelemetryCollector, TelemetryEventKind, TelemetryRecord};

/// Version string shown in the host banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
