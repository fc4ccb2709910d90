//=====================================================
// File: vm/syscall.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cross-task services reachable through SYS
// Objective: Decode syscall codes, pop their arguments from the caller's
//            stack, and act on the kernel on the caller's behalf
//=====================================================

use std::fmt;

use chrono::Utc;
use tracing::warn;

use crate::error::Fault;
use crate::kernel::Kernel;
use crate::task::Task;
use crate::telemetry::{TelemetryEvent, TelemetryEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Syscall {
    Time = 101,
    Spawn = 102,
    Wait = 103,
    Abort = 104,
    TaskCount = 110,
    TaskId = 111,
    TaskName = 112,
    TaskStatus = 113,
    MemoryUsed = 120,
    IntToString = 201,
    StringToInt = 202,
}

impl Syscall {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            101 => Syscall::Time,
            102 => Syscall::Spawn,
            103 => Syscall::Wait,
            104 => Syscall::Abort,
            110 => Syscall::TaskCount,
            111 => Syscall::TaskId,
            112 => Syscall::TaskName,
            113 => Syscall::TaskStatus,
            120 => Syscall::MemoryUsed,
            201 => Syscall::IntToString,
            202 => Syscall::StringToInt,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Syscall::Time => "time",
            Syscall::Spawn => "spawn",
            Syscall::Wait => "wait",
            Syscall::Abort => "abort",
            Syscall::TaskCount => "task-count",
            Syscall::TaskId => "task-id",
            Syscall::TaskName => "task-name",
            Syscall::TaskStatus => "task-status",
            Syscall::MemoryUsed => "memory-used",
            Syscall::IntToString => "itoa",
            Syscall::StringToInt => "atoi",
        };
        write!(f, "{name}({})", self.code())
    }
}

/// What the caller does after a syscall returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SysFlow {
    Continue,
    Block,
}

pub(crate) fn dispatch(code: i32, task: &mut Task, kernel: &mut Kernel) -> Result<SysFlow, Fault> {
    let call = Syscall::from_code(code).ok_or(Fault::UnknownSyscall(code))?;
    match call {
        Syscall::Time => {
            let address = task.stack.pop()?;
            let now = Utc::now().timestamp().to_string();
            task.data.write_cstr(address, &now)?;
        }
        Syscall::Spawn => {
            let address = task.stack.pop()?;
            let path = task.data.read_cstr(address)?;
            let child = kernel.spawn_program(&path).unwrap_or(-1);
            task.stack.push(child)?;
        }
        Syscall::Wait => {
            let target = task.stack.pop()?;
            if !kernel.registry().contains(target) {
                warn!(task = task.id(), "task {} waits on unknown task {}", task.id(), target);
            }
            task.wait_for = Some(target);
            task.ready = false;
            kernel.emit(TelemetryEvent::new(TelemetryEventKind::TaskBlock, task.id()));
            return Ok(SysFlow::Block);
        }
        Syscall::Abort => {
            let target = task.stack.pop()?;
            let fault = Fault::Aborted { by: task.id() };
            if target == task.id() {
                return Err(fault);
            }
            if !kernel.abort(target, &fault) {
                warn!(task = task.id(), "abort of unknown task {} ignored", target);
            }
        }
        Syscall::TaskCount => {
            let count = to_word(kernel.registry().len());
            task.stack.push(count)?;
        }
        Syscall::TaskId => {
            let index = task.stack.pop()?;
            let id = index_of(index)
                .and_then(|index| kernel.registry().id_at(index))
                .unwrap_or(-1);
            task.stack.push(id)?;
        }
        Syscall::TaskName => {
            let index = task.stack.pop()?;
            let address = task.stack.pop()?;
            let name = index_of(index)
                .and_then(|index| kernel.registry().name_at(index))
                .map(str::to_owned);
            let length = match name {
                Some(name) => to_word(task.data.write_cstr_truncated(address, &name)?),
                None => -1,
            };
            task.stack.push(length)?;
        }
        Syscall::TaskStatus => {
            let index = task.stack.pop()?;
            let status = index_of(index)
                .and_then(|index| kernel.registry().status_at(index))
                .map_or(-1, |status| status.code());
            task.stack.push(status)?;
        }
        Syscall::MemoryUsed => {
            let used = to_word(kernel.registry().memory_used());
            task.stack.push(used)?;
        }
        Syscall::IntToString => {
            let address = task.stack.pop()?;
            let value = task.stack.pop()?;
            let length = task.data.write_cstr(address, &value.to_string())?;
            task.stack.push(to_word(length))?;
        }
        Syscall::StringToInt => {
            let address = task.stack.pop()?;
            let text = task.data.read_cstr(address)?;
            task.stack.push(parse_leading_int(&text))?;
        }
    }
    Ok(SysFlow::Continue)
}

fn index_of(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

fn to_word(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Leading whitespace, an optional sign, then as many digits as follow.
fn parse_leading_int(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add(i32::from(digit - b'0'))
        });
    if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}
