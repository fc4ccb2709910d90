//=====================================================
// File: task/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-task resource model
// Objective: Bundle code, data segment, operand stack, call stack, and
//            scheduling state for one independently scheduled task
//=====================================================

pub mod memory;
pub mod registry;

use std::mem;

use serde::Serialize;

use crate::vm::instruction::Instruction;
use memory::{CallStack, DataSegment, OperandStack};

pub use registry::Registry;

/// Numeric task identity. Ids travel on the operand stack, so they are words.
pub type TaskId = i32;

/// Fixed capacities applied to every spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLimits {
    pub code_capacity: usize,
    pub data_size: usize,
    pub stack_capacity: usize,
    pub call_depth: usize,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            code_capacity: 4024,
            data_size: 1024,
            stack_capacity: 256,
            call_depth: 64,
        }
    }
}

impl TaskLimits {
    /// Bytes charged against the process-wide memory counter per task.
    pub fn footprint(&self) -> usize {
        self.code_capacity * mem::size_of::<Instruction>()
            + self.data_size
            + self.stack_capacity * mem::size_of::<i32>()
            + self.call_depth * 3 * mem::size_of::<usize>()
    }
}

/// Scheduling status as reported by introspection syscalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Blocked,
    Ready,
    Running,
}

impl TaskStatus {
    pub fn code(self) -> i32 {
        match self {
            TaskStatus::Blocked => 0,
            TaskStatus::Ready => 1,
            TaskStatus::Running => 2,
        }
    }
}

#[derive(Debug)]
pub struct Task {
    id: TaskId,
    name: String,
    pub(crate) ready: bool,
    pub(crate) wait_for: Option<TaskId>,
    pub(crate) tracing: bool,
    code: Vec<Instruction>,
    code_capacity: usize,
    pub(crate) data: DataSegment,
    /// Next free data offset used while loading.
    pub(crate) data_cursor: usize,
    pub(crate) stack: OperandStack,
    pub(crate) frames: CallStack,
    pub(crate) pc: usize,
    pub(crate) fp: usize,
    footprint: usize,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, limits: &TaskLimits) -> Self {
        Self {
            id,
            name: name.into(),
            ready: true,
            wait_for: None,
            tracing: false,
            code: Vec::with_capacity(limits.code_capacity),
            code_capacity: limits.code_capacity,
            data: DataSegment::new(limits.data_size),
            data_cursor: 0,
            stack: OperandStack::new(limits.stack_capacity),
            frames: CallStack::new(limits.call_depth),
            pc: 0,
            fp: 0,
            footprint: limits.footprint(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn wait_for(&self) -> Option<TaskId> {
        self.wait_for
    }

    pub fn status(&self) -> TaskStatus {
        if self.ready {
            TaskStatus::Ready
        } else {
            TaskStatus::Blocked
        }
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    pub fn set_tracing(&mut self, tracing: bool) {
        self.tracing = tracing;
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn code_capacity(&self) -> usize {
        self.code_capacity
    }

    /// Append an instruction during load. Returns `false` once the capacity is used up.
    pub(crate) fn append(&mut self, instruction: Instruction) -> bool {
        if self.code.len() >= self.code_capacity {
            return false;
        }
        self.code.push(instruction);
        true
    }

    /// Patch the operand of an already appended instruction.
    pub(crate) fn patch_operand(&mut self, index: usize, operand: i32) {
        if let Some(instruction) = self.code.get_mut(index) {
            instruction.operand = operand;
        }
    }

    pub fn data(&self) -> &DataSegment {
        &self.data
    }

    /// Live operand stack values, bottom first.
    pub fn stack(&self) -> &[i32] {
        self.stack.live()
    }

    pub fn stack_top(&self) -> usize {
        self.stack.top()
    }

    pub fn call_depth(&self) -> usize {
        self.frames.depth()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn frame_pointer(&self) -> usize {
        self.fp
    }

    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Source line of the instruction at the program counter, if any.
    pub fn current_line(&self) -> Option<u32> {
        self.code.get(self.pc).map(|instruction| instruction.source_line)
    }
}
