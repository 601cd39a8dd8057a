//! KERNAL trap shims.
//!
//! Real BASIC ROM and KERNAL ROM aren't part of this core's data model: no
//! ROM image is required to run a program that calls into CHROUT, CHRIN or
//! CINT, because those three entry points are intercepted before the CPU
//! ever fetches an instruction from them and their externally-visible
//! effects are synthesized directly, followed by a synthesized RTS back to
//! the caller. Everything else behind KERNAL ROM (tape, disk, serial,
//! screen editor internals) stays unimplemented; code that falls into it
//! runs off into RAM or a ROM image the host supplied.

use cpu_6502::Mos6502;
use emu_core::Bus;

use crate::bus::C64Bus;
use crate::petscii::petscii_to_screen_code;

pub const CHROUT: u16 = 0xFFD2;
pub const CHRIN: u16 = 0xFFCF;
pub const CINT: u16 = 0xFF5B;

const SCREEN_RAM: u16 = 0x0400;
const COLOR_RAM: u16 = 0xD800;
const COLUMNS: u16 = 40;
const ROWS: u16 = 25;
const CURSOR_COL: u16 = 0x00D3;
const CURSOR_ROW: u16 = 0x00D6;
const CURSOR_LINE_LOW: u16 = 0x00D1;
const CURSOR_LINE_HIGH: u16 = 0x00D2;
const KEYBOARD_BUFFER: u16 = 0x0277;
const KEYBOARD_BUFFER_LEN: u16 = 0x00C6;

const TRAP_CYCLES: u32 = 20;

/// If `cpu.pc()` is one of the three trapped KERNAL entry points and that
/// entry point is currently reachable (KERNAL ROM mapped in), perform its
/// effect, synthesize the matching RTS, and return the cycle cost to charge
/// the caller. Otherwise returns `None` and the caller should let the CPU
/// fetch normally.
pub fn service(cpu: &mut Mos6502, bus: &mut C64Bus) -> Option<u32> {
    if !bus.kernal_mapped() {
        return None;
    }
    match cpu.pc() {
        CHROUT => {
            chrout(bus, cpu.a());
            synthesize_rts(cpu, bus);
            Some(TRAP_CYCLES)
        }
        CHRIN => {
            let byte = chrin(bus);
            cpu.set_a(byte);
            synthesize_rts(cpu, bus);
            Some(TRAP_CYCLES)
        }
        CINT => {
            // Real CINT falls through into further KERNAL-internal setup at
            // $FCFE rather than returning to its caller; it doesn't consume
            // the caller's return address, it just discards it.
            cint(bus);
            cpu.set_sp(cpu.sp().wrapping_add(2));
            cpu.set_pc(CINT_CONTINUATION);
            Some(TRAP_CYCLES)
        }
        _ => None,
    }
}

const CINT_CONTINUATION: u16 = 0xFCFE;

/// Pop the return address the original JSR pushed and resume just past it,
/// exactly as a real RTS would.
fn synthesize_rts(cpu: &mut Mos6502, bus: &mut C64Bus) {
    let sp = cpu.sp();
    let low = bus.read(0x0100 + u32::from(sp.wrapping_add(1)));
    let high = bus.read(0x0100 + u32::from(sp.wrapping_add(2)));
    let return_addr = (((u16::from(high) << 8) | u16::from(low)).wrapping_add(1)) & 0xFFFF;
    cpu.set_sp(sp.wrapping_add(2));
    cpu.set_pc(return_addr);
}

fn cursor_pos(bus: &mut C64Bus) -> (u16, u16) {
    let col = u16::from(bus.read(u32::from(CURSOR_COL))).min(COLUMNS - 1);
    let row = u16::from(bus.read(u32::from(CURSOR_ROW))).min(ROWS - 1);
    (col, row)
}

/// Set the cursor column/row and keep the `$D1/$D2` current-line pointer
/// (the start-of-line address the real KERNAL maintains alongside the
/// column/row pair) in sync with it.
fn set_cursor_pos(bus: &mut C64Bus, col: u16, row: u16) {
    bus.write(u32::from(CURSOR_COL), col as u8);
    bus.write(u32::from(CURSOR_ROW), row as u8);
    let line_addr = SCREEN_RAM + row * COLUMNS;
    bus.write(u32::from(CURSOR_LINE_LOW), line_addr as u8);
    bus.write(u32::from(CURSOR_LINE_HIGH), (line_addr >> 8) as u8);
}

fn scroll_screen(bus: &mut C64Bus) {
    for row in 1..ROWS {
        for col in 0..COLUMNS {
            let from = SCREEN_RAM + (row * COLUMNS) + col;
            let to = SCREEN_RAM + ((row - 1) * COLUMNS) + col;
            let value = bus.read(u32::from(from));
            bus.write(u32::from(to), value);
            let color_from = COLOR_RAM + (row * COLUMNS) + col;
            let color_to = COLOR_RAM + ((row - 1) * COLUMNS) + col;
            let color = bus.read(u32::from(color_from));
            bus.write(u32::from(color_to), color);
        }
    }
    let last_row = ROWS - 1;
    for col in 0..COLUMNS {
        bus.write(u32::from(SCREEN_RAM + last_row * COLUMNS + col), 0x20);
        bus.write(u32::from(COLOR_RAM + last_row * COLUMNS + col), 0x01);
    }
}

fn clear_screen(bus: &mut C64Bus) {
    for offset in 0..(COLUMNS * ROWS) {
        bus.write(u32::from(SCREEN_RAM + offset), 0x20);
        bus.write(u32::from(COLOR_RAM + offset), 0x01);
    }
    set_cursor_pos(bus, 0, 0);
}

/// Write the character in A to the current cursor position and advance the
/// cursor, honoring carriage return ($0D), clear-screen ($93) and
/// cursor-left/backspace ($14). Scrolls the screen up one row when a
/// newline runs past the last row.
fn chrout(bus: &mut C64Bus, a: u8) {
    match a {
        0x0D => {
            let (_, row) = cursor_pos(bus);
            if row + 1 >= ROWS {
                scroll_screen(bus);
                set_cursor_pos(bus, 0, ROWS - 1);
            } else {
                set_cursor_pos(bus, 0, row + 1);
            }
        }
        0x93 => clear_screen(bus),
        0x14 => {
            let (col, row) = cursor_pos(bus);
            if col > 0 {
                set_cursor_pos(bus, col - 1, row);
                bus.write(u32::from(SCREEN_RAM + row * COLUMNS + (col - 1)), 0x20);
            } else if row > 0 {
                set_cursor_pos(bus, COLUMNS - 1, row - 1);
                bus.write(u32::from(SCREEN_RAM + (row - 1) * COLUMNS + (COLUMNS - 1)), 0x20);
            }
        }
        _ => {
            let (col, row) = cursor_pos(bus);
            let offset = row * COLUMNS + col;
            bus.write(u32::from(SCREEN_RAM + offset), petscii_to_screen_code(a));
            let mut next_col = col + 1;
            let mut next_row = row;
            if next_col >= COLUMNS {
                next_col = 0;
                next_row += 1;
            }
            if next_row >= ROWS {
                scroll_screen(bus);
                next_row = ROWS - 1;
            }
            set_cursor_pos(bus, next_col, next_row);
        }
    }
}

fn cint(bus: &mut C64Bus) {
    clear_screen(bus);
}

/// Drain one character from the front of the keyboard buffer, shifting the
/// remainder down, and return it. A call against an empty buffer is a no-op
/// that returns 0; this shim doesn't model blocking for a keypress.
fn chrin(bus: &mut C64Bus) -> u8 {
    let len = bus.read(u32::from(KEYBOARD_BUFFER_LEN));
    if len == 0 {
        return 0;
    }
    let first = bus.read(u32::from(KEYBOARD_BUFFER));
    for i in 1..len {
        let value = bus.read(u32::from(KEYBOARD_BUFFER + u16::from(i)));
        bus.write(u32::from(KEYBOARD_BUFFER + u16::from(i - 1)), value);
    }
    bus.write(u32::from(KEYBOARD_BUFFER_LEN), len - 1);
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::C64Config;

    fn setup() -> (Mos6502, C64Bus) {
        let bus = C64Bus::new(&C64Config::default()).unwrap();
        let cpu = Mos6502::new();
        (cpu, bus)
    }

    fn push_return_addr(cpu: &mut Mos6502, bus: &mut C64Bus, addr: u16) {
        let sp = cpu.sp();
        let ret = addr.wrapping_sub(1);
        bus.write(0x0100 + u32::from(sp), (ret >> 8) as u8);
        bus.write(0x0100 + u32::from(sp.wrapping_sub(1)), ret as u8);
        cpu.set_sp(sp.wrapping_sub(2));
    }

    #[test]
    fn chrout_writes_screen_code_and_advances_cursor() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        cpu.set_a(b'H');
        cpu.set_pc(CHROUT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);

        let cost = service(&mut cpu, &mut bus);
        assert_eq!(cost, Some(TRAP_CYCLES));
        assert_eq!(bus.read(u32::from(SCREEN_RAM)), 0x08);
        assert_eq!(cpu.pc(), 0x0810);
    }

    #[test]
    fn chrout_carriage_return_moves_to_next_row() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        cpu.set_a(0x0D);
        cpu.set_pc(CHROUT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        assert_eq!(bus.read(u32::from(CURSOR_ROW)), 1);
        assert_eq!(bus.read(u32::from(CURSOR_COL)), 0);
    }

    #[test]
    fn not_mapped_when_kernal_banked_out() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x36);
        cpu.set_pc(CHROUT);
        assert_eq!(service(&mut cpu, &mut bus), None);
    }

    #[test]
    fn chrin_drains_one_character() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        bus.write(u32::from(KEYBOARD_BUFFER), b'A');
        bus.write(u32::from(KEYBOARD_BUFFER + 1), b'B');
        bus.write(u32::from(KEYBOARD_BUFFER_LEN), 2);
        cpu.set_pc(CHRIN);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), b'A');
        assert_eq!(bus.read(u32::from(KEYBOARD_BUFFER_LEN)), 1);
        assert_eq!(bus.read(u32::from(KEYBOARD_BUFFER)), b'B');
    }

    #[test]
    fn chrin_returns_zero_when_buffer_empty() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        cpu.set_a(0xFF);
        cpu.set_pc(CHRIN);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0);
        assert_eq!(bus.read(u32::from(KEYBOARD_BUFFER_LEN)), 0);
    }

    #[test]
    fn cint_clears_screen_and_jumps_without_using_return_address() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        bus.write(u32::from(SCREEN_RAM), 0xAA);
        cpu.set_pc(CINT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);

        let cost = service(&mut cpu, &mut bus);
        assert_eq!(cost, Some(TRAP_CYCLES));
        assert_eq!(bus.read(u32::from(SCREEN_RAM)), 0x20);
        assert_eq!(cpu.pc(), CINT_CONTINUATION);
    }

    #[test]
    fn chrout_writes_also_sync_the_line_pointer() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        set_cursor_pos(&mut bus, 0, 2);
        cpu.set_a(b'H');
        cpu.set_pc(CHROUT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        let line_addr = SCREEN_RAM + 2 * COLUMNS + 1;
        assert_eq!(bus.read(u32::from(CURSOR_LINE_LOW)), line_addr as u8);
        assert_eq!(bus.read(u32::from(CURSOR_LINE_HIGH)), (line_addr >> 8) as u8);
    }

    #[test]
    fn chrout_backspace_blanks_vacated_cell_and_moves_cursor() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        bus.write(u32::from(SCREEN_RAM), b'H' - b'@');
        set_cursor_pos(&mut bus, 1, 0);
        cpu.set_a(0x14);
        cpu.set_pc(CHROUT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        assert_eq!(bus.read(u32::from(SCREEN_RAM)), 0x20);
        assert_eq!(bus.read(u32::from(CURSOR_COL)), 0);
        assert_eq!(bus.read(u32::from(CURSOR_ROW)), 0);
    }

    #[test]
    fn chrout_backspace_at_origin_is_a_no_op() {
        let (mut cpu, mut bus) = setup();
        bus.write(0x0000, 0x2F);
        bus.write(0x0001, 0x37);
        bus.write(u32::from(SCREEN_RAM), 0xAA);
        set_cursor_pos(&mut bus, 0, 0);
        cpu.set_a(0x14);
        cpu.set_pc(CHROUT);
        push_return_addr(&mut cpu, &mut bus, 0x0810);
        service(&mut cpu, &mut bus);
        assert_eq!(bus.read(u32::from(SCREEN_RAM)), 0xAA);
        assert_eq!(bus.read(u32::from(CURSOR_COL)), 0);
        assert_eq!(bus.read(u32::from(CURSOR_ROW)), 0);
    }
}
