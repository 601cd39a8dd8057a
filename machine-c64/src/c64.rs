//! Top-level C64 machine: CPU, bus, and the host-facing API that drives them.

use cpu_6502::Mos6502;
use emu_core::{Bus, Cpu};

use crate::bus::C64Bus;
use crate::config::C64Config;
use crate::error::{CoreError, StopReason};
use crate::traps;

#[cfg(test)]
use crate::config::VideoStd;

const PC_HISTORY_LEN: usize = 32;
const STUCK_PC_THRESHOLD: u32 = 1000;

const RESET_PORT_DDR: u8 = 0x2F;
const RESET_PORT_DATA: u8 = 0x37;
const SCREEN_RAM: u16 = 0x0400;
const COLOR_RAM: u16 = 0xD800;
const SCREEN_SIZE: usize = 40 * 25;

/// A snapshot of the visible CPU registers, for inspection or save states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuState {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub cycles: u64,
}

/// A partial register override for [`C64::set_cpu_state`]. Fields left as
/// `None` keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuStatePatch {
    pub pc: Option<u16>,
    pub a: Option<u8>,
    pub x: Option<u8>,
    pub y: Option<u8>,
    pub sp: Option<u8>,
    pub p: Option<u8>,
}

/// A Commodore 64: 6510 CPU, banked 64 KiB bus, CIA1, and a raster-only
/// VIC-II stub, plus the KERNAL trap shims that stand in for ROM.
pub struct C64 {
    config: C64Config,
    cpu: Mos6502,
    bus: C64Bus,
    cycles: u64,
    stop_requested: bool,
    last_stop_reason: Option<StopReason>,
    pc_history: Vec<u16>,
    stuck_pc: u16,
    stuck_count: u32,
}

impl C64 {
    /// Build a machine from `config`. ROM images, if given, must be their
    /// real sizes (8 KiB BASIC/KERNAL, 4 KiB character); a missing ROM just
    /// leaves that bank showing RAM.
    pub fn new(config: C64Config) -> Result<Self, CoreError> {
        let bus = C64Bus::new(&config)?;
        let mut machine = Self {
            config,
            cpu: Mos6502::new(),
            bus,
            cycles: 0,
            stop_requested: false,
            last_stop_reason: None,
            pc_history: Vec::with_capacity(PC_HISTORY_LEN),
            stuck_pc: 0,
            stuck_count: 0,
        };
        machine.reset();
        Ok(machine)
    }

    /// Reinitialize RAM, ROM banking, CIA1, VIC and CPU registers to the
    /// state this core treats as "just booted": screen cleared, BASIC/
    /// KERNAL/I-O all mapped in, jiffy timer running, PC loaded from the
    /// reset vector (real KERNAL's, or a RAM vector the host set up).
    pub fn reset(&mut self) {
        for byte in self.bus.ram_mut().iter_mut() {
            *byte = 0;
        }
        self.bus.write(0x0000, RESET_PORT_DDR);
        self.bus.write(0x0001, RESET_PORT_DATA);

        for offset in 0..SCREEN_SIZE as u16 {
            self.bus.write(u32::from(SCREEN_RAM + offset), 0x20);
            self.bus.write(u32::from(COLOR_RAM + offset), 0x01);
        }

        // RAM vectors the real KERNAL's IRQ/BRK/NMI dispatch and the CHRIN/
        // CHROUT/GETIN indirect jump table read through.
        self.bus.write(0x0314, 0x31); // IRQ vector -> $EA31 (stock KERNAL IRQ)
        self.bus.write(0x0315, 0xEA);
        self.bus.write(0x0316, 0x66); // BRK vector -> $FE66
        self.bus.write(0x0317, 0xFE);
        self.bus.write(0x0318, 0x47); // NMI vector -> $FE47
        self.bus.write(0x0319, 0xFE);
        self.bus.write(0x031A, 0x4A); // OPEN
        self.bus.write(0x031B, 0xF3);
        self.bus.write(0x031C, 0x91); // CLOSE
        self.bus.write(0x031D, 0xF2);
        self.bus.write(0x031E, 0x0E); // CHKIN
        self.bus.write(0x031F, 0xF2);
        self.bus.write(0x0320, 0x50); // CHKOUT
        self.bus.write(0x0321, 0xF2);
        self.bus.write(0x0322, 0x33); // CLRCHN
        self.bus.write(0x0323, 0xF3);
        self.bus.write(0x0324, traps::CHRIN as u8);
        self.bus.write(0x0325, (traps::CHRIN >> 8) as u8);
        self.bus.write(0x0326, traps::CHROUT as u8);
        self.bus.write(0x0327, (traps::CHROUT >> 8) as u8);
        self.bus.write(0x0328, 0x2E); // STOP
        self.bus.write(0x0329, 0xF6);
        self.bus.write(0x032A, 0x33); // GETIN
        self.bus.write(0x032B, 0xF1);
        self.bus.write(0x032C, 0x57); // CLALL
        self.bus.write(0x032D, 0xF3);
        self.bus.write(0x032E, 0xA7); // USRCMD
        self.bus.write(0x032F, 0x00);
        self.bus.write(0x0330, 0x2D); // LOAD
        self.bus.write(0x0331, 0xF4);
        self.bus.write(0x0332, 0xD5); // SAVE
        self.bus.write(0x0333, 0xF5);

        // BASIC's text pointers, all set up for an empty program at $0801.
        for addr in [0x2Bu16, 0x2D, 0x2F, 0x31, 0x33] {
            self.bus.write(u32::from(addr), 0x01);
            self.bus.write(u32::from(addr + 1), 0x08);
        }
        self.bus.write(0x0801, 0x00);
        self.bus.write(0x0802, 0x00);

        self.bus.write(0x00D1, 0x00); // screen line pointer low
        self.bus.write(0x00D2, 0x04); // screen line pointer high -> $0400
        self.bus.write(0x00D3, 0x00); // cursor column
        self.bus.write(0x00D6, 0x00); // cursor row
        self.bus.write(0x00C6, 0x00); // keyboard buffer length

        self.bus.cia1.timer_a.latch = self.config.video_std.jiffy_latch();
        self.bus.cia1.timer_a.counter = self.bus.cia1.timer_a.latch;
        self.bus.cia1.timer_a.running = true;
        self.bus.cia1.timer_a.irq_enabled = true;
        self.bus.cia1.timer_a.one_shot = false;
        self.bus.cia1.timer_b.latch = 0xFFFF;
        self.bus.cia1.timer_b.counter = 0xFFFF;
        self.bus.cia1.timer_b.running = false;
        self.bus.cia1.clear_icr();

        self.bus.vic.reset();

        Cpu::<C64Bus>::reset(&mut self.cpu, &mut self.bus);

        self.cycles = 0;
        self.stop_requested = false;
        self.last_stop_reason = None;
        self.pc_history.clear();
        self.stuck_pc = self.cpu.pc();
        self.stuck_count = 0;
    }

    /// Execute one step: either a trapped KERNAL call, one 6502 instruction,
    /// or (if one was pending) interrupt service - never more than one of
    /// the three. Returns the cycle cost, which is always in 1-8 (20 for a
    /// trap) except 0 when the CPU is halted.
    pub fn step(&mut self) -> u32 {
        if self.cpu.is_stopped() {
            return 0;
        }

        let cost = if let Some(cost) = traps::service(&mut self.cpu, &mut self.bus) {
            cost
        } else {
            Cpu::<C64Bus>::step(&mut self.cpu, &mut self.bus)
        };

        self.bus.cia1.tick(cost);
        self.bus.tick_vic_raster();
        self.cycles += u64::from(cost);

        if self.bus.cia1.pending_irq() {
            if self.config.authentic_irq {
                Cpu::<C64Bus>::interrupt(&mut self.cpu, &mut self.bus);
            } else {
                self.bus.cia1.clear_icr();
                self.tick_jiffy_clock();
            }
        }

        self.track_pc(cost);
        cost
    }

    fn tick_jiffy_clock(&mut self) {
        let lo = self.bus.read(0x00A0);
        let mid = self.bus.read(0x00A1);
        let hi = self.bus.read(0x00A2);
        let jiffy = (u32::from(hi) << 16) | (u32::from(mid) << 8) | u32::from(lo);
        let jiffy = (jiffy + 1) & 0x00FF_FFFF;
        self.bus.write(0x00A0, jiffy as u8);
        self.bus.write(0x00A1, (jiffy >> 8) as u8);
        self.bus.write(0x00A2, (jiffy >> 16) as u8);
    }

    fn track_pc(&mut self, cost: u32) {
        if cost == 0 {
            return;
        }
        let pc = self.cpu.pc();
        if self.pc_history.len() == PC_HISTORY_LEN {
            self.pc_history.remove(0);
        }
        self.pc_history.push(pc);

        if pc == self.stuck_pc {
            self.stuck_count += 1;
        } else {
            self.stuck_pc = pc;
            self.stuck_count = 1;
        }
    }

    /// Drive [`Self::step`] until `max_cycles` is reached (if given), the
    /// CPU halts, the program counter gets stuck, or [`Self::request_stop`]
    /// is observed.
    pub fn run(&mut self, max_cycles: Option<u64>) -> StopReason {
        self.stop_requested = false;
        loop {
            if self.cpu.is_stopped() {
                let reason = StopReason::Halted;
                self.last_stop_reason = Some(reason);
                return reason;
            }
            if self.stuck_count >= STUCK_PC_THRESHOLD && self.stuck_pc != traps::CHRIN {
                let reason = StopReason::StuckPc;
                self.last_stop_reason = Some(reason);
                return reason;
            }
            if let Some(max) = max_cycles {
                if self.cycles >= max {
                    let reason = StopReason::MaxCycles;
                    self.last_stop_reason = Some(reason);
                    return reason;
                }
            }
            if self.stop_requested {
                let reason = StopReason::MaxCycles;
                self.last_stop_reason = Some(reason);
                return reason;
            }
            self.step();
        }
    }

    /// Ask a [`Self::run`] in progress to stop at the next step boundary.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn read_mem(&mut self, address: u16) -> u8 {
        self.bus.read(u32::from(address))
    }

    pub fn write_mem(&mut self, address: u16, value: u8) {
        self.bus.write(u32::from(address), value);
    }

    /// Load a PRG image (2-byte little-endian load address plus payload)
    /// into RAM. When the load address is $0801, also nudges the BASIC
    /// end-of-program pointer ($2D/$2E) to just past the loaded bytes, as
    /// a real LOAD would.
    pub fn load_prg(&mut self, data: &[u8]) -> Result<(), CoreError> {
        if data.len() < 2 {
            return Err(CoreError::PrgTooSmall { got: data.len() });
        }
        let load_addr = u16::from_le_bytes([data[0], data[1]]);
        let payload = &data[2..];
        for (offset, &byte) in payload.iter().enumerate() {
            let addr = load_addr.wrapping_add(offset as u16);
            self.bus.write(u32::from(addr), byte);
        }
        if load_addr == 0x0801 {
            let end = load_addr.wrapping_add(payload.len() as u16);
            self.bus.write(0x002D, end as u8);
            self.bus.write(0x002E, (end >> 8) as u8);
        }
        Ok(())
    }

    pub fn cpu_state(&self) -> CpuState {
        CpuState {
            pc: self.cpu.pc(),
            a: self.cpu.a(),
            x: self.cpu.x(),
            y: self.cpu.y(),
            sp: self.cpu.sp(),
            p: self.cpu.status(),
            cycles: self.cycles,
        }
    }

    pub fn set_cpu_state(&mut self, patch: CpuStatePatch) {
        if let Some(pc) = patch.pc {
            self.cpu.set_pc(pc);
        }
        if let Some(a) = patch.a {
            self.cpu.set_a(a);
        }
        if let Some(x) = patch.x {
            self.cpu.set_x(x);
        }
        if let Some(y) = patch.y {
            self.cpu.set_y(y);
        }
        if let Some(sp) = patch.sp {
            self.cpu.set_sp(sp);
        }
        if let Some(p) = patch.p {
            self.cpu.set_status(p);
        }
    }

    /// Append `byte` to the keyboard buffer at $0277, as if a key had been
    /// pressed. Returns `false` and drops the byte if the buffer (capacity
    /// 10, matching real hardware) is already full.
    pub fn inject_key(&mut self, byte: u8) -> bool {
        let len = self.bus.read(0x00C6);
        if len >= 10 {
            return false;
        }
        self.bus.write(0x0277 + u32::from(len), byte);
        self.bus.write(0x00C6, len + 1);
        true
    }

    /// The 1000-byte text screen, as raw screen codes (not ASCII).
    pub fn screen_snapshot(&mut self) -> [u8; SCREEN_SIZE] {
        let mut out = [0u8; SCREEN_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.bus.read(u32::from(SCREEN_RAM) + i as u32);
        }
        out
    }

    /// The 1000-byte color map, low nibble only (as color RAM stores it).
    pub fn color_snapshot(&mut self) -> [u8; SCREEN_SIZE] {
        let mut out = [0u8; SCREEN_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.bus.read(u32::from(COLOR_RAM) + i as u32) & 0x0F;
        }
        out
    }

    /// Dump `start..end` (exclusive) of the underlying RAM, not the banked
    /// view: a byte under a mapped ROM window still shows whatever was last
    /// written there, not the ROM's contents.
    pub fn memory_dump(&mut self, start: u16, end: u16) -> Result<Vec<u8>, CoreError> {
        if end < start {
            return Err(CoreError::InvalidAddress {
                addr: u32::from(end),
            });
        }
        Ok(self.bus.ram_slice(usize::from(start), usize::from(end)).to_vec())
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.last_stop_reason
    }

    pub fn pc_history(&self) -> &[u16] {
        &self.pc_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> C64 {
        C64::new(C64Config::default()).unwrap()
    }

    #[test]
    fn reset_clears_screen_and_maps_basic_kernal_io() {
        let mut m = machine();
        assert_eq!(m.screen_snapshot(), [0x20u8; SCREEN_SIZE]);
        assert!(m.bus.kernal_mapped());
    }

    #[test]
    fn load_prg_updates_basic_end_pointer() {
        let mut m = machine();
        let mut prg = vec![0x01, 0x08];
        prg.extend_from_slice(&[0xAA; 10]);
        m.load_prg(&prg).unwrap();
        let end = u16::from(m.read_mem(0x002D)) | (u16::from(m.read_mem(0x002E)) << 8);
        assert_eq!(end, 0x0801 + 10);
        assert_eq!(m.read_mem(0x0801), 0xAA);
    }

    #[test]
    fn load_prg_rejects_too_short_input() {
        let mut m = machine();
        assert_eq!(m.load_prg(&[0x01]), Err(CoreError::PrgTooSmall { got: 1 }));
    }

    #[test]
    fn inject_key_fills_keyboard_buffer_and_drops_when_full() {
        let mut m = machine();
        for i in 0..10 {
            assert!(m.inject_key(b'A' + i));
        }
        assert!(!m.inject_key(b'Z'));
        assert_eq!(m.read_mem(0x00C6), 10);
    }

    #[test]
    fn stuck_pc_is_detected_over_a_thousand_identical_steps() {
        let mut m = machine();
        m.write_mem(0x0000, 0x2F);
        m.write_mem(0x0001, 0x37);
        // JMP $0810 looping on itself.
        m.write_mem(0x0810, 0x4C);
        m.write_mem(0x0811, 0x10);
        m.write_mem(0x0812, 0x08);
        m.set_cpu_state(CpuStatePatch {
            pc: Some(0x0810),
            ..Default::default()
        });
        let reason = m.run(Some(1_000_000));
        assert_eq!(reason, StopReason::StuckPc);
    }

    #[test]
    fn chrout_banner_writes_two_characters_to_screen_ram() {
        let mut m = machine();
        m.set_cpu_state(CpuStatePatch {
            pc: Some(0xC000),
            ..Default::default()
        });
        let program = [
            0xA9, 0x48, // LDA #$48 ('H')
            0x20, 0xD2, 0xFF, // JSR $FFD2 (CHROUT)
            0xA9, 0x49, // LDA #$49 ('I')
            0x20, 0xD2, 0xFF, // JSR $FFD2 (CHROUT)
            0x00, // BRK
        ];
        for (i, &byte) in program.iter().enumerate() {
            m.write_mem(0xC000 + i as u16, byte);
        }
        m.run(Some(100));
        assert_eq!(m.read_mem(0x0400), 0x08);
        assert_eq!(m.read_mem(0x0401), 0x09);
    }

    #[test]
    fn simple_ml_program_loaded_as_prg_writes_border_color() {
        let mut m = machine();
        let mut prg = vec![0x01, 0x08]; // load address $0801
        prg.extend_from_slice(&[
            0xA9, 0x01, // LDA #$01
            0x8D, 0x20, 0xD0, // STA $D020
            0x60, // RTS
        ]);
        m.load_prg(&prg).unwrap();
        m.set_cpu_state(CpuStatePatch {
            pc: Some(0x0801),
            sp: Some(0xFF),
            ..Default::default()
        });
        m.run(Some(100));
        assert_eq!(m.read_mem(0xD020), 0x01);
    }

    #[test]
    fn jiffy_clock_advances_about_sixty_per_second_of_cpu_cycles() {
        let mut m = machine();
        let before = u32::from(m.read_mem(0x00A0))
            | (u32::from(m.read_mem(0x00A1)) << 8)
            | (u32::from(m.read_mem(0x00A2)) << 16);
        // A small NOP loop: PC keeps moving within it, so the stuck-PC
        // heuristic never mistakes the loop for a hang.
        for addr in 0x0810u16..0x0900 {
            m.write_mem(addr, 0xEA);
        }
        m.write_mem(0x0900, 0x4C); // JMP $0810
        m.write_mem(0x0901, 0x10);
        m.write_mem(0x0902, 0x08);
        m.set_cpu_state(CpuStatePatch {
            pc: Some(0x0810),
            ..Default::default()
        });
        m.run(Some(u64::from(VideoStd::Pal.cpu_clock())));
        let after = u32::from(m.read_mem(0x00A0))
            | (u32::from(m.read_mem(0x00A1)) << 8)
            | (u32::from(m.read_mem(0x00A2)) << 16);
        let delta = after.wrapping_sub(before);
        assert!((58..=62).contains(&delta), "jiffy delta was {delta}");
    }

    #[test]
    fn run_stops_at_max_cycles_when_program_keeps_moving() {
        let mut m = machine();
        m.write_mem(0x0000, 0x2F);
        m.write_mem(0x0001, 0x37);
        // NOP forever from $0810 onward, PC always advances.
        for addr in 0x0810u16..0x0900 {
            m.write_mem(addr, 0xEA);
        }
        m.set_cpu_state(CpuStatePatch {
            pc: Some(0x0810),
            ..Default::default()
        });
        let reason = m.run(Some(50));
        assert_eq!(reason, StopReason::MaxCycles);
    }
}
