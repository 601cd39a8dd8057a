//! Commodore 64 core: 6510 CPU, banked memory, CIA1 timers and a raster-only
//! VIC-II stub, driven through KERNAL trap shims rather than a ROM dump.
//!
//! # ROM images
//!
//! None are required. [`C64Config`] accepts optional BASIC/KERNAL/character
//! ROM images; without them, those address windows simply read back as RAM
//! and the three trapped KERNAL entry points (`CHROUT`, `CHRIN`, `CINT`)
//! synthesize the externally-visible behavior a running KERNAL would have
//! produced.
//!
//! # File formats
//!
//! - `.prg` - load address (2 bytes, little-endian) followed by program data.

mod bus;
mod c64;
mod cia;
mod config;
mod error;
mod petscii;
mod traps;
mod vic;

pub use c64::{C64, CpuState, CpuStatePatch};
pub use config::{C64Config, VideoStd};
pub use error::{CoreError, StopReason};
pub use petscii::{ascii_to_petscii, petscii_to_screen_code, screen_code_to_ascii};
