pub mod instruction;
pub mod interpreter;
pub mod syscall;

pub use instruction::{Instruction, Opcode};
pub use interpreter::{run_quantum, Outcome, Quantum};
pub use syscall::Syscall;
