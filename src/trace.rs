//! Human-readable trace lines.
//!
//! ```text
//! TRACE: 00 | 82 00 08 | 00 00 00 00 00 00 00 F4 | FL 00
//! ```

use std::fmt;

use crate::snapshot::MachineSnapshot;

pub struct TraceLine<'a>(pub &'a MachineSnapshot);

impl fmt::Display for TraceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;
        write!(f, "TRACE: {:02X} |", snapshot.pc)?;

        let cells = [snapshot.opcode, snapshot.operands[0], snapshot.operands[1]];
        for cell in cells {
            match cell {
                Some(value) => write!(f, " {:02X}", value)?,
                None => write!(f, " --")?,
            }
        }

        write!(f, " |")?;
        for value in snapshot.registers {
            write!(f, " {:02X}", value)?;
        }
        write!(f, " | FL {:02X}", snapshot.flags.bits())
    }
}
