//! C64 machine configuration.
//!
//! Bundles the ROM images and timing parameters a [`crate::C64`] is built
//! from. Kept as a single plain struct handed to one constructor, in the same
//! spirit as the timing-mode tables this crate's wider family of machines
//! uses for their own configuration.

/// Video timing standard. Governs the CIA1 jiffy-clock latch and the VIC
/// raster wraparound point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VideoStd {
    /// PAL (Europe, Australia) - ~985 kHz, 312 raster lines, ~60 jiffies/sec.
    #[default]
    Pal,
    /// NTSC (North America, Japan) - ~1.023 MHz, 263 raster lines.
    Ntsc,
}

impl VideoStd {
    /// CPU clock frequency in Hz.
    pub const fn cpu_clock(self) -> u32 {
        match self {
            VideoStd::Pal => 985_248,
            VideoStd::Ntsc => 1_022_727,
        }
    }

    /// Timer A latch value that produces a ~60 Hz jiffy tick.
    pub const fn jiffy_latch(self) -> u16 {
        (self.cpu_clock() / 60) as u16
    }

    /// Raster lines per frame (the VIC stub's raster counter wraps here).
    pub const fn lines_per_frame(self) -> u16 {
        match self {
            VideoStd::Pal => 312,
            VideoStd::Ntsc => 263,
        }
    }
}

/// Construction-time configuration for a [`crate::C64`].
///
/// ROM images are optional: a missing ROM is tolerated and that memory
/// window simply reads as RAM (see the banking rules in `memory.rs`).
#[derive(Clone, Default)]
pub struct C64Config {
    pub basic_rom: Option<Vec<u8>>,
    pub kernal_rom: Option<Vec<u8>>,
    pub char_rom: Option<Vec<u8>>,
    pub video_std: VideoStd,
    /// When true, interrupts are serviced by vectoring through $FFFE/$FFFA
    /// like real hardware. When false (the default), a CIA1 Timer A
    /// underflow is serviced by directly advancing the jiffy clock rather
    /// than entering the KERNAL IRQ handler, which is cheaper and adequate
    /// for code that only polls the jiffy clock rather than hooking IRQ.
    pub authentic_irq: bool,
}

impl C64Config {
    pub fn new(video_std: VideoStd) -> Self {
        Self {
            video_std,
            ..Default::default()
        }
    }

    pub fn with_basic(mut self, rom: Vec<u8>) -> Self {
        self.basic_rom = Some(rom);
        self
    }

    pub fn with_kernal(mut self, rom: Vec<u8>) -> Self {
        self.kernal_rom = Some(rom);
        self
    }

    pub fn with_char_rom(mut self, rom: Vec<u8>) -> Self {
        self.char_rom = Some(rom);
        self
    }

    pub fn with_authentic_irq(mut self, authentic: bool) -> Self {
        self.authentic_irq = authentic;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jiffy_latch_is_close_to_sixty_hz() {
        let latch = VideoStd::Pal.jiffy_latch();
        assert_eq!(VideoStd::Pal.cpu_clock() / u32::from(latch), 60);
    }
}
