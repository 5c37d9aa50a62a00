use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

// Bit positions in the packed `00000LGE` form.
pub const EQUAL_FLAG: u8 = 0x01;
pub const GREATER_FLAG: u8 = 0x02;
pub const LESS_FLAG: u8 = 0x04;

/// Condition flags written by CMP and read by the conditional jumps.
///
/// At most one flag is ever set: all clear at reset, exactly one after a
/// compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    equal: bool,
    less_than: bool,
    greater_than: bool,
}

impl Flags {
    pub fn compare(a: u8, b: u8) -> Self {
        let ordering = a.cmp(&b);
        Flags {
            equal: ordering == Ordering::Equal,
            less_than: ordering == Ordering::Less,
            greater_than: ordering == Ordering::Greater,
        }
    }

    pub fn equal(&self) -> bool {
        self.equal
    }

    pub fn less_than(&self) -> bool {
        self.less_than
    }

    pub fn greater_than(&self) -> bool {
        self.greater_than
    }

    /// Packed `00000LGE` byte, as shown in traces.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.equal {
            bits |= EQUAL_FLAG;
        }
        if self.greater_than {
            bits |= GREATER_FLAG;
        }
        if self.less_than {
            bits |= LESS_FLAG;
        }
        bits
    }
}
