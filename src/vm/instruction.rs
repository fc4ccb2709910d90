use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Push = 1,
    Add = 2,
    Out = 3,
    Halt = 4,
    Jump = 5,
    Store = 6,
    Load = 7,
    Dup = 8,
    JumpC = 9,
    Call = 10,
    Ret = 11,
    Swap = 13,
    Pop = 14,
    In = 15,
    Eq = 16,
    Dump = 17,
    Skz = 18,
    Trace = 19,
    Not = 20,
    Sys = 21,
    IStore = 23,
    ILoad = 24,
    Assert = 25,
    FStore = 26,
    FLoad = 27,
    Isp = 28,
    Dsp = 29,
}

static MNEMONICS: Lazy<HashMap<&'static str, Opcode>> = Lazy::new(|| {
    Opcode::ALL
        .iter()
        .map(|opcode| (opcode.mnemonic(), *opcode))
        .collect()
});

impl Opcode {
    pub const ALL: [Opcode; 27] = [
        Opcode::Push,
        Opcode::Add,
        Opcode::Out,
        Opcode::Halt,
        Opcode::Jump,
        Opcode::Store,
        Opcode::Load,
        Opcode::Dup,
        Opcode::JumpC,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Swap,
        Opcode::Pop,
        Opcode::In,
        Opcode::Eq,
        Opcode::Dump,
        Opcode::Skz,
        Opcode::Trace,
        Opcode::Not,
        Opcode::Sys,
        Opcode::IStore,
        Opcode::ILoad,
        Opcode::Assert,
        Opcode::FStore,
        Opcode::FLoad,
        Opcode::Isp,
        Opcode::Dsp,
    ];

    /// Look up an assembler mnemonic such as `push` or `jumpc`.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        MNEMONICS.get(name).copied()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "push",
            Opcode::Add => "add",
            Opcode::Out => "out",
            Opcode::Halt => "halt",
            Opcode::Jump => "jump",
            Opcode::Store => "store",
            Opcode::Load => "load",
            Opcode::Dup => "dup",
            Opcode::JumpC => "jumpc",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Swap => "swap",
            Opcode::Pop => "pop",
            Opcode::In => "in",
            Opcode::Eq => "eq",
            Opcode::Dump => "dump",
            Opcode::Skz => "skz",
            Opcode::Trace => "trace",
            Opcode::Not => "not",
            Opcode::Sys => "sys",
            Opcode::IStore => "istore",
            Opcode::ILoad => "iload",
            Opcode::Assert => "assert",
            Opcode::FStore => "fstore",
            Opcode::FLoad => "fload",
            Opcode::Isp => "isp",
            Opcode::Dsp => "dsp",
        }
    }

    /// Control transfers whose operand must name a `:` code label.
    pub fn takes_code_label(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpC | Opcode::Call)
    }

    /// Whether the operand is meaningful when listing the instruction.
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Opcode::Push
                | Opcode::Jump
                | Opcode::JumpC
                | Opcode::Call
                | Opcode::Skz
                | Opcode::Isp
                | Opcode::Dsp
                | Opcode::Trace
                | Opcode::Assert
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction. Immutable once the loader has produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: i32,
    pub source_line: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: i32, source_line: u32) -> Self {
        Self {
            opcode,
            operand,
            source_line,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.has_operand() {
            write!(f, "{} {}", self.opcode, self.operand)
        } else {
            write!(f, "{}", self.opcode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_has_a_unique_mnemonic() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(opcode.mnemonic()), Some(opcode));
        }
        assert_eq!(MNEMONICS.len(), Opcode::ALL.len());
    }

    #[test]
    fn numbering_follows_the_classic_table() {
        assert_eq!(Opcode::Push as u8, 1);
        assert_eq!(Opcode::Halt as u8, 4);
        assert_eq!(Opcode::Sys as u8, 21);
        assert_eq!(Opcode::Assert as u8, 25);
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        assert_eq!(Opcode::from_mnemonic("PUSH"), None);
        assert_eq!(Opcode::from_mnemonic("mul"), None);
    }
}
