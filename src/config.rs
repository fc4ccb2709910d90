//=============================================
// uvm/src/config.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Represent VM configuration values
// Objective: Load TOML data and expose strongly typed capacities and
//            scheduler knobs with the classic defaults
//=============================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::{TaskId, TaskLimits};

//=============================================
// SECTION: Data Model
//=============================================

/// Root configuration document for the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Instruction steps per scheduler visit.
    pub quantum: usize,
    /// Operand stack slots per task.
    pub stack_capacity: usize,
    /// Maximum nested calls per task.
    pub call_depth: usize,
    /// Data segment bytes per task.
    pub data_size: usize,
    /// Instruction slots per task.
    pub code_capacity: usize,
    /// Ids up to and including this value are reserved.
    pub first_task_id: TaskId,
    /// Patch label references that appear before their definition.
    pub forward_references: bool,
    /// Wait for an input byte after every traced step.
    pub trace_pause: bool,
    /// Sleep applied after a pass in which no task was ready.
    pub idle_backoff_ms: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        let limits = TaskLimits::default();
        Self {
            quantum: 1000,
            stack_capacity: limits.stack_capacity,
            call_depth: limits.call_depth,
            data_size: limits.data_size,
            code_capacity: limits.code_capacity,
            first_task_id: 100,
            forward_references: true,
            trace_pause: false,
            idle_backoff_ms: 1,
        }
    }
}

impl VmConfig {
    pub fn limits(&self) -> TaskLimits {
        TaskLimits {
            code_capacity: self.code_capacity,
            data_size: self.data_size,
            stack_capacity: self.stack_capacity,
            call_depth: self.call_depth,
        }
    }

    /// Reject capacities that would make every program fault immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("quantum", self.quantum),
            ("stack_capacity", self.stack_capacity),
            ("call_depth", self.call_depth),
            ("data_size", self.data_size),
            ("code_capacity", self.code_capacity),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}

//=============================================
// SECTION: IO Helpers
//=============================================

/// Load configuration from a TOML file.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<VmConfig, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str::<VmConfig>(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Resolve configuration: explicit path, then the user config dir, then defaults.
pub fn resolve(explicit: Option<&Path>) -> Result<VmConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_file(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => load_from_file(path),
        _ => Ok(VmConfig::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("uvm").join("config.toml"))
}
