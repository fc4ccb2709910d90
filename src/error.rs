//=====================================================
// File: error.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Error taxonomy for the UVM core
// Objective: Separate load faults, task-fatal execution faults, and host-level
//            errors while keeping the numeric cause codes stable
//=====================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskId;

/// Convenience alias used across the crate.
pub type UvmResult<T> = Result<T, UvmError>;

/// Problems raised while turning program text into a task image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("label '{label}' not found (line {line})")]
    UndefinedLabel { label: String, line: u32 },
    #[error("unknown op '{mnemonic}' on line {line}")]
    UnknownMnemonic { mnemonic: String, line: u32 },
    #[error("invalid operand '{operand}' on line {line}")]
    InvalidOperand { operand: String, line: u32 },
    #[error("code capacity of {capacity} instructions exceeded (line {line})")]
    CodeCapacity { capacity: usize, line: u32 },
    #[error("data segment of {capacity} bytes exhausted (line {line})")]
    DataOverflow { capacity: usize, line: u32 },
    #[error("include nesting deeper than {0} levels")]
    IncludeDepth(usize),
}

/// Cause code reported when a task's program fails to load.
pub const LOAD_FAULT_CODE: i32 = 0;

/// Conditions that terminate the task that incurred them.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("out-of-bounds program counter {pc}")]
    ProgramCounter { pc: i64 },
    #[error("assert failed {actual} != {expected}")]
    AssertionFailed { expected: i32, actual: i32 },
    #[error("unknown syscall {0}")]
    UnknownSyscall(i32),
    #[error("stack overflow")]
    StackOverflow,
    #[error("call stack overflow")]
    CallStackOverflow,
    #[error("return without call")]
    ReturnWithoutCall,
    #[error("memory fault at {address}")]
    MemoryFault { address: i64 },
    #[error("aborted by task {by}")]
    Aborted { by: TaskId },
}

impl Fault {
    /// Stable cause code reported alongside abort diagnostics.
    pub fn code(&self) -> i32 {
        match self {
            Fault::StackUnderflow => 1,
            Fault::ProgramCounter { .. } => 2,
            Fault::AssertionFailed { .. } => 3,
            Fault::UnknownSyscall(_) => 4,
            Fault::StackOverflow => 5,
            Fault::CallStackOverflow => 6,
            Fault::ReturnWithoutCall => 7,
            Fault::MemoryFault { .. } => 8,
            Fault::Aborted { .. } => 9,
        }
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config field '{0}' must be greater than zero")]
    Zero(&'static str),
}

/// Crate-level error surfaced to embedders and binaries.
#[derive(Debug, Error)]
pub enum UvmError {
    #[error("task {0} is not registered")]
    UnknownTask(TaskId),
}
