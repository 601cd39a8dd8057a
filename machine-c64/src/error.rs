//! Error and stop-reason types.
//!
//! The crate returns plain `Result<_, CoreError>` from its fallible entry
//! points rather than pulling in an error-handling crate; this matches the
//! rest of the workspace, which reports failure as `Result<_, String>` or a
//! small hand-rolled enum throughout.

use std::fmt;

/// A failure reported by one of the host-facing API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// A ROM image passed to [`crate::C64::new`] was not 8 KiB (BASIC/KERNAL)
    /// or 4 KiB (character) as expected.
    RomSize { what: &'static str, got: usize },
    /// `load_prg` was given fewer than 2 bytes (not even a load address).
    PrgTooSmall { got: usize },
    /// A host API call referenced an address or range outside $0000-$FFFF.
    InvalidAddress { addr: u32 },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::RomSize { what, got } => {
                write!(f, "{what} ROM image has wrong size: {got} bytes")
            }
            CoreError::PrgTooSmall { got } => {
                write!(f, "PRG data too small to contain a load address: {got} bytes")
            }
            CoreError::InvalidAddress { addr } => {
                write!(f, "address ${addr:04X} is out of the 16-bit address space")
            }
        }
    }
}

impl std::error::Error for CoreError {}

/// Why a bounded [`crate::C64::run`] call stopped driving the CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The CPU executed a KIL/JAM opcode (or any byte with no assigned
    /// effect) and will not fetch further instructions.
    Halted,
    /// The requested cycle budget was reached.
    MaxCycles,
    /// The program counter did not change across 1000 consecutive
    /// instructions and was not parked at the CHRIN trap address.
    StuckPc,
}
