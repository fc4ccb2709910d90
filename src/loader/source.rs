use std::collections::HashMap;
use std::fs;
use std::io;

/// Where program text comes from when a task is loaded or a file is included.
pub trait ProgramSource {
    fn read_program(&self, path: &str) -> io::Result<String>;
}

/// Reads programs from the host filesystem, relative to the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl ProgramSource for FileSource {
    fn read_program(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// Named in-memory programs, used by embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    programs: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.programs.insert(name.into(), text.into());
    }
}

impl ProgramSource for MemorySource {
    fn read_program(&self, path: &str) -> io::Result<String> {
        self.programs.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no program named '{path}'"))
        })
    }
}
