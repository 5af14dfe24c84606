//! Storage result types
//!
//! Value types returned by capacity and diagnostics queries. Recomputed on
//! every query, never cached.

use std::fmt;

const MB: u64 = 1024 * 1024;

/// Raw capacity of the mounted card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapacitySnapshot {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl CapacitySnapshot {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    pub fn fits(&self, requested_bytes: u64) -> bool {
        self.free_bytes >= requested_bytes
    }
}

/// Operator-facing view of the mount state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub mounted: bool,
    pub card_type: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl Diagnostics {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SD Logger:")?;
        writeln!(f, "  Mounted: {}", if self.mounted { "Yes" } else { "No" })?;
        writeln!(f, "  Card Type: {}", self.card_type)?;
        writeln!(f, "  Card Size: {}MB", self.total_bytes / MB)?;
        write!(f, "  Free Space: {}MB", self.free_bytes / MB)
    }
}
