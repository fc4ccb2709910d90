//=====================================================
// File: loader/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Assemble line-oriented program text into a task image
// Objective: Append instructions, lay out the data segment, resolve labels,
//            follow includes, and pick the `:main` entry point
//=====================================================

pub mod source;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::LoadError;
use crate::task::Task;
use crate::vm::instruction::{Instruction, Opcode};

pub use source::{FileSource, MemorySource, ProgramSource};

pub const ENTRY_LABEL: &str = ":main";
const DEFAULT_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Defer unresolved label references to the end of the top-level load.
    pub forward_references: bool,
    pub max_include_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            forward_references: true,
            max_include_depth: DEFAULT_INCLUDE_DEPTH,
        }
    }
}

/// Labels defined during one top-level load, shared with nested includes.
#[derive(Debug, Default, Clone)]
pub struct LabelTable {
    addresses: HashMap<String, i32>,
}

impl LabelTable {
    /// Redefinitions shadow earlier ones.
    fn define(&mut self, name: &str, address: i32) {
        self.addresses.insert(name.to_string(), address);
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.addresses.get(name).copied()
    }

    /// Code labels sorted by address, for listings.
    pub fn code_labels(&self) -> Vec<(i32, &str)> {
        let mut labels: Vec<_> = self
            .addresses
            .iter()
            .filter(|(name, _)| name.starts_with(':'))
            .map(|(name, address)| (*address, name.as_str()))
            .collect();
        labels.sort_unstable();
        labels
    }
}

#[derive(Debug)]
struct Fixup {
    index: usize,
    label: String,
    line: u32,
}

#[derive(Debug, Default)]
struct LoadState {
    labels: LabelTable,
    fixups: Vec<Fixup>,
}

enum Operand {
    Value(i32),
    Pending(String),
}

//=====================================================
// SECTION 1: Loader
//=====================================================

pub struct Loader<'a> {
    source: &'a dyn ProgramSource,
    options: LoadOptions,
}

impl<'a> Loader<'a> {
    pub fn new(source: &'a dyn ProgramSource, options: LoadOptions) -> Self {
        Self { source, options }
    }

    /// Load `path` into `task` and return the label table it produced.
    pub fn load(&self, task: &mut Task, path: &str) -> Result<LabelTable, LoadError> {
        info!(task = task.id(), "load '{}' into '{}' ({})", path, task.name(), task.id());
        let start = task.code().len();
        let mut state = LoadState::default();
        self.load_file(task, path, &mut state, 0)?;

        for fixup in std::mem::take(&mut state.fixups) {
            let address = state
                .labels
                .get(&fixup.label)
                .ok_or(LoadError::UndefinedLabel {
                    label: fixup.label,
                    line: fixup.line,
                })?;
            task.patch_operand(fixup.index, address);
        }

        task.pc = match state.labels.get(ENTRY_LABEL) {
            Some(entry) => entry as usize,
            None => start,
        };
        Ok(state.labels)
    }

    fn load_file(
        &self,
        task: &mut Task,
        path: &str,
        state: &mut LoadState,
        depth: usize,
    ) -> Result<(), LoadError> {
        if depth > self.options.max_include_depth {
            return Err(LoadError::IncludeDepth(self.options.max_include_depth));
        }
        let text = self
            .source
            .read_program(path)
            .map_err(|source| LoadError::Unreadable {
                path: path.to_string(),
                source,
            })?;
        debug!("appending on {}", task.code().len());

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index as u32 + 1;
            let stripped = strip_comment(raw_line).trim_start();
            let line = stripped.trim_end();
            if line.is_empty() {
                continue;
            }
            let (command, param) = split_command(line);

            match command.as_bytes()[0] {
                b':' => state.labels.define(command, task.code().len() as i32),
                b'.' => {
                    let offset = task.data_cursor;
                    let mut bytes = unescape(data_text(stripped));
                    bytes.push(0);
                    task.data
                        .write_bytes(offset, &bytes)
                        .map_err(|_| LoadError::DataOverflow {
                            capacity: task.data.len(),
                            line: line_no,
                        })?;
                    state.labels.define(command, offset as i32);
                    task.data_cursor += bytes.len();
                }
                b'%' => {
                    let count = parse_number(param, line_no)?;
                    let end = usize::try_from(count)
                        .ok()
                        .map(|count| task.data_cursor + count)
                        .filter(|end| *end <= task.data.len())
                        .ok_or(LoadError::DataOverflow {
                            capacity: task.data.len(),
                            line: line_no,
                        })?;
                    state.labels.define(command, task.data_cursor as i32);
                    task.data_cursor = end;
                }
                b'$' => {
                    let offset = parse_number(param, line_no)?;
                    state.labels.define(command, offset);
                }
                _ if command == "include" => self.load_file(task, param, state, depth + 1)?,
                _ => self.emit(task, command, param, line_no, state)?,
            }
        }
        Ok(())
    }

    fn emit(
        &self,
        task: &mut Task,
        mnemonic: &str,
        param: &str,
        line: u32,
        state: &mut LoadState,
    ) -> Result<(), LoadError> {
        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| LoadError::UnknownMnemonic {
            mnemonic: mnemonic.to_string(),
            line,
        })?;
        let index = task.code().len();
        let operand = match self.operand(opcode, param, line, &state.labels)? {
            Operand::Value(value) => value,
            Operand::Pending(label) => {
                state.fixups.push(Fixup { index, label, line });
                0
            }
        };
        if !task.append(Instruction::new(opcode, operand, line)) {
            return Err(LoadError::CodeCapacity {
                capacity: task.code_capacity(),
                line,
            });
        }
        Ok(())
    }

    fn operand(
        &self,
        opcode: Opcode,
        param: &str,
        line: u32,
        labels: &LabelTable,
    ) -> Result<Operand, LoadError> {
        if opcode.takes_code_label() && !param.starts_with(':') {
            return Err(LoadError::UndefinedLabel {
                label: param.to_string(),
                line,
            });
        }
        if param.is_empty() {
            return Ok(Operand::Value(0));
        }
        if param.starts_with(&[':', '.', '%', '$'][..]) {
            return match labels.get(param) {
                Some(address) => Ok(Operand::Value(address)),
                None if self.options.forward_references => Ok(Operand::Pending(param.to_string())),
                None => Err(LoadError::UndefinedLabel {
                    label: param.to_string(),
                    line,
                }),
            };
        }
        parse_number(param, line).map(Operand::Value)
    }
}

//=====================================================
// SECTION 2: Line Helpers
//=====================================================

fn strip_comment(line: &str) -> &str {
    if let Some(pos) = line.find('#') {
        &line[..pos]
    } else {
        line
    }
}

/// Split into the command word and the remainder of the line.
fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

/// Text of a `.name text` line: everything after the single separator, spaces kept.
fn data_text(line: &str) -> &str {
    match line.find(char::is_whitespace) {
        Some(pos) => {
            let rest = &line[pos..];
            let separator = rest.chars().next().map_or(0, char::len_utf8);
            &rest[separator..]
        }
        None => "",
    }
}

fn parse_number(text: &str, line: u32) -> Result<i32, LoadError> {
    text.parse::<i32>().map_err(|_| LoadError::InvalidOperand {
        operand: text.to_string(),
        line,
    })
}

fn unescape(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut chars = text.bytes();
    while let Some(byte) = chars.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match chars.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'0') => bytes.push(0),
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    bytes
}
