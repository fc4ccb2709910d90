//=====================================================
// File: vm/interpreter.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Execute one task for one scheduling quantum
// Objective: Decode and run instructions against the task's private memory,
//            enforce pc bounds after each step, and report why the quantum ended
//=====================================================

use std::fmt::Write as _;

use tracing::info;

use crate::console::Console;
use crate::error::Fault;
use crate::kernel::Kernel;
use crate::task::memory::Frame;
use crate::task::Task;
use crate::vm::instruction::{Instruction, Opcode};
use crate::vm::syscall::{self, SysFlow};

/// Why a quantum ended.
#[derive(Debug)]
pub enum Outcome {
    /// The step budget ran out; the task stays ready.
    Exhausted,
    /// `IN` found no input. The pc still points at the `IN`.
    Starved,
    /// The task is waiting on another task.
    Blocked,
    Halted,
    Faulted(Fault),
}

#[derive(Debug)]
pub struct Quantum {
    pub steps: usize,
    pub outcome: Outcome,
}

enum Step {
    Next(i64),
    Starve,
    Block(i64),
    Halt,
}

/// Run `task` for at most `kernel.config().quantum` instructions.
pub fn run_quantum(task: &mut Task, kernel: &mut Kernel, console: &mut dyn Console) -> Quantum {
    let budget = kernel.config().quantum;
    let pause = kernel.config().trace_pause;
    let len = task.code().len();
    let mut steps = 0;

    while steps < budget {
        let Some(instruction) = task.code().get(task.pc).copied() else {
            return Quantum {
                steps,
                outcome: Outcome::Halted,
            };
        };
        let tracing = task.tracing;
        if tracing {
            trace_before(task, &instruction);
        }

        let step = match execute(task, instruction, kernel, console) {
            Ok(step) => step,
            Err(fault) => {
                return Quantum {
                    steps: steps + 1,
                    outcome: Outcome::Faulted(fault),
                }
            }
        };
        let (next, outcome) = match step {
            Step::Starve => {
                return Quantum {
                    steps,
                    outcome: Outcome::Starved,
                }
            }
            Step::Halt => {
                return Quantum {
                    steps: steps + 1,
                    outcome: Outcome::Halted,
                }
            }
            Step::Next(next) => (next, None),
            Step::Block(next) => (next, Some(Outcome::Blocked)),
        };
        steps += 1;

        if next < 0 || next > len as i64 {
            return Quantum {
                steps,
                outcome: Outcome::Faulted(Fault::ProgramCounter { pc: next }),
            };
        }
        task.pc = next as usize;

        if tracing {
            trace_after(task);
            if pause {
                console.wait_ack();
            }
        }
        if let Some(outcome) = outcome {
            return Quantum { steps, outcome };
        }
        if task.pc == len {
            return Quantum {
                steps,
                outcome: Outcome::Halted,
            };
        }
    }

    Quantum {
        steps,
        outcome: Outcome::Exhausted,
    }
}

fn execute(
    task: &mut Task,
    instruction: Instruction,
    kernel: &mut Kernel,
    console: &mut dyn Console,
) -> Result<Step, Fault> {
    let pc = task.pc as i64;
    let operand = instruction.operand;
    let mut next = pc + 1;

    match instruction.opcode {
        Opcode::Push => task.stack.push(operand)?,
        Opcode::Pop => {
            task.stack.pop()?;
        }
        Opcode::Dup => {
            let top = task.stack.peek()?;
            task.stack.push(top)?;
        }
        Opcode::Swap => {
            let b = task.stack.pop()?;
            let a = task.stack.pop()?;
            task.stack.push(b)?;
            task.stack.push(a)?;
        }
        Opcode::Add => {
            let b = task.stack.pop()?;
            let a = task.stack.pop()?;
            task.stack.push(a.wrapping_add(b))?;
        }
        Opcode::Eq => {
            let b = task.stack.pop()?;
            let a = task.stack.pop()?;
            task.stack.push(i32::from(a == b))?;
        }
        Opcode::Not => {
            let value = task.stack.pop()?;
            task.stack.push(i32::from(value == 0))?;
        }
        Opcode::Out => {
            let value = task.stack.pop()?;
            console.write_output(&[value as u8]);
        }
        Opcode::In => match console.poll_input() {
            Some(byte) => task.stack.push(i32::from(byte))?,
            None => return Ok(Step::Starve),
        },
        Opcode::Jump => next = i64::from(operand),
        Opcode::JumpC => {
            if task.stack.pop()? != 0 {
                next = i64::from(operand);
            }
        }
        Opcode::Skz => {
            if task.stack.pop()? == 0 {
                next = pc + 1 + i64::from(operand);
            }
        }
        Opcode::Store => {
            let address = task.stack.pop()?;
            let value = task.stack.pop()?;
            task.data.write_byte(address, value)?;
        }
        Opcode::Load => {
            let address = task.stack.pop()?;
            let value = task.data.read_byte(address)?;
            task.stack.push(value)?;
        }
        Opcode::IStore => {
            let index = task.stack.pop()?;
            let value = task.stack.pop()?;
            task.data.write_word(index, value)?;
        }
        Opcode::ILoad => {
            let index = task.stack.pop()?;
            let value = task.data.read_word(index)?;
            task.stack.push(value)?;
        }
        Opcode::FStore => {
            let slot = task.fp as i64 + i64::from(task.stack.pop()?);
            let value = task.stack.pop()?;
            task.stack.set_slot(slot, value)?;
        }
        Opcode::FLoad => {
            let slot = task.fp as i64 + i64::from(task.stack.pop()?);
            let value = task.stack.slot(slot)?;
            task.stack.push(value)?;
        }
        Opcode::Isp => {
            let top = task.stack.top() as i64;
            task.stack.set_top(top + i64::from(operand))?;
        }
        Opcode::Dsp => {
            let top = task.stack.top() as i64;
            task.stack.set_top(top - i64::from(operand))?;
        }
        Opcode::Call => {
            task.frames.push(Frame {
                return_pc: task.pc,
                saved_fp: task.fp,
                saved_sp: task.stack.top(),
            })?;
            task.fp = task.stack.top();
            next = i64::from(operand);
        }
        Opcode::Ret => {
            let frame = task.frames.pop()?;
            task.stack.set_top(frame.saved_sp as i64)?;
            task.fp = frame.saved_fp;
            next = frame.return_pc as i64 + 1;
        }
        Opcode::Sys => {
            let code = task.stack.pop()?;
            if syscall::dispatch(code, task, kernel)? == SysFlow::Block {
                return Ok(Step::Block(next));
            }
        }
        Opcode::Dump => {
            let line = dump_line(task, instruction.source_line);
            console.write_output(line.as_bytes());
        }
        Opcode::Trace => task.tracing = operand != 0,
        Opcode::Assert => {
            let actual = task.stack.pop()?;
            if actual != operand {
                return Err(Fault::AssertionFailed {
                    expected: operand,
                    actual,
                });
            }
        }
        Opcode::Halt => return Ok(Step::Halt),
    }
    Ok(Step::Next(next))
}

fn dump_line(task: &Task, line: u32) -> String {
    let mut out = format!(">>> line {line}: ");
    for value in task.stack() {
        let _ = write!(out, "[{value}]");
    }
    out.push('\n');
    out
}

fn trace_before(task: &Task, instruction: &Instruction) {
    info!(
        target: "uvm::trace",
        task = task.id(),
        "{:04}: {} {} (line {})",
        task.pc,
        instruction.opcode,
        instruction.operand,
        instruction.source_line
    );
}

fn trace_after(task: &Task) {
    info!(
        target: "uvm::trace",
        task = task.id(),
        "stack={:?} fp={} depth={}",
        task.stack(),
        task.fp,
        task.call_depth()
    );
}
