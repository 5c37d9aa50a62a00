use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STACK_TOP: u8 = 0xF4;
pub const DEFAULT_CALL_STACK_LIMIT: usize = 1024;

/// Per-machine settings.
///
/// Every field has a default, so a partial JSON object (or `{}`) is a valid
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Initial SP (R7) and the ceiling POP may not exceed.
    pub stack_top: u8,
    /// PUSH may not move SP below this, nor below the end of the loaded program.
    pub stack_floor: u8,
    /// Maximum number of outstanding CALLs.
    pub call_stack_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            stack_top: DEFAULT_STACK_TOP,
            stack_floor: 0,
            call_stack_limit: DEFAULT_CALL_STACK_LIMIT,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_floor > self.stack_top {
            return Err(ConfigError::FloorAboveTop {
                floor: self.stack_floor,
                top: self.stack_top,
            });
        }
        if self.call_stack_limit == 0 {
            return Err(ConfigError::ZeroCallStackLimit);
        }
        Ok(())
    }
}
