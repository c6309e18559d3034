//! Host input shared with the worker thread.
//!
//! The host writes joystick and keyboard state into an `InputState` from its
//! own thread; CIA1 samples it on every port read. Every field is a plain
//! atomic, so the last write wins and no lock is held across a CPU access.
//!
//! Keyboard matrix (row = CIA1 PA line, column = CIA1 PB bit):
//!
//! | Row | Col0 | Col1 | Col2 | Col3 | Col4 | Col5 | Col6 | Col7    |
//! |-----|------|------|------|------|------|------|------|---------|
//! | 0   | DEL  | 3    | 5    | 7    | 9    | +    | £    | 1       |
//! | 1   | RET  | W    | R    | Y    | I    | P    | *    | ←       |
//! | 2   | →    | A    | D    | G    | J    | L    | ;    | CTRL    |
//! | 3   | F7   | 4    | 6    | 8    | 0    | -    | HOME | 2       |
//! | 4   | F1   | Z    | C    | B    | M    | .    | RSHFT| SPC     |
//! | 5   | F3   | S    | F    | H    | K    | :    | =    | C=      |
//! | 6   | F5   | E    | T    | U    | O    | @    | ↑    | Q       |
//! | 7   | ↓    | LSHFT| X    | V    | N    | ,    | /    | STOP    |

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Joystick bits in the shared byte (set = pressed).
pub mod joystick {
    pub const UP: u8 = 0;
    pub const DOWN: u8 = 1;
    pub const LEFT: u8 = 2;
    pub const RIGHT: u8 = 3;
    pub const FIRE: u8 = 4;
}

const JOYSTICK_MASK: u8 = 0x1F;

/// Logical key, declared in matrix order so the discriminant is `row * 8 + col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum C64Key {
    Delete, N3, N5, N7, N9, Plus, Pound, N1,
    Return, W, R, Y, I, P, Asterisk, LeftArrow,
    CursorRight, A, D, G, J, L, Semicolon, Ctrl,
    F7, N4, N6, N8, N0, Minus, Home, N2,
    F1, Z, C, B, M, Period, RShift, Space,
    F3, S, F, H, K, Colon, Equals, Commodore,
    F5, E, T, U, O, At, UpArrow, Q,
    CursorDown, LShift, X, V, N, Comma, Slash, RunStop,
}

impl C64Key {
    /// (row, column) in the keyboard matrix.
    #[must_use]
    pub const fn matrix(self) -> (u8, u8) {
        let index = self as u8;
        (index / 8, index % 8)
    }

    /// Look up a key by the name a host sends: a single letter or digit, or
    /// one of `return`, `space`, `runstop`, `lshift`, `f1` and so on.
    #[must_use]
    #[rustfmt::skip]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "a" => Self::A, "b" => Self::B, "c" => Self::C, "d" => Self::D,
            "e" => Self::E, "f" => Self::F, "g" => Self::G, "h" => Self::H,
            "i" => Self::I, "j" => Self::J, "k" => Self::K, "l" => Self::L,
            "m" => Self::M, "n" => Self::N, "o" => Self::O, "p" => Self::P,
            "q" => Self::Q, "r" => Self::R, "s" => Self::S, "t" => Self::T,
            "u" => Self::U, "v" => Self::V, "w" => Self::W, "x" => Self::X,
            "y" => Self::Y, "z" => Self::Z,
            "0" => Self::N0, "1" => Self::N1, "2" => Self::N2, "3" => Self::N3,
            "4" => Self::N4, "5" => Self::N5, "6" => Self::N6, "7" => Self::N7,
            "8" => Self::N8, "9" => Self::N9,
            "return" | "enter" => Self::Return,
            "space" => Self::Space,
            "delete" | "del" | "backspace" => Self::Delete,
            "runstop" | "stop" | "escape" => Self::RunStop,
            "lshift" | "shift" => Self::LShift,
            "rshift" => Self::RShift,
            "ctrl" => Self::Ctrl,
            "commodore" | "cbm" => Self::Commodore,
            "home" => Self::Home,
            "down" => Self::CursorDown,
            "right" => Self::CursorRight,
            "f1" => Self::F1, "f3" => Self::F3, "f5" => Self::F5, "f7" => Self::F7,
            "+" => Self::Plus, "-" => Self::Minus, "*" => Self::Asterisk,
            "/" => Self::Slash, "=" => Self::Equals, "@" => Self::At,
            "." => Self::Period, "," => Self::Comma, ":" => Self::Colon,
            ";" => Self::Semicolon,
            "pound" => Self::Pound,
            "uparrow" => Self::UpArrow,
            "leftarrow" => Self::LeftArrow,
            _ => return None,
        };
        Some(key)
    }
}

/// Joysticks and keyboard, written by the host and read by CIA1.
#[derive(Debug, Default)]
pub struct InputState {
    /// Ports 1 and 2, bits 0-4 up/down/left/right/fire, set = pressed.
    joysticks: [AtomicU8; 2],
    /// Bit `row * 8 + col` set = key down.
    keyboard: AtomicU64,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn port(&self, port: u8) -> Option<&AtomicU8> {
        match port {
            1 | 2 => Some(&self.joysticks[usize::from(port - 1)]),
            _ => None,
        }
    }

    /// Press a joystick direction or fire. Unknown ports and bits are ignored.
    pub fn set_joystick_bit(&self, port: u8, bit: u8) {
        if let Some(joy) = self.port(port).filter(|_| bit < 5) {
            joy.fetch_or(1 << bit, Ordering::Relaxed);
        }
    }

    pub fn clear_joystick_bit(&self, port: u8, bit: u8) {
        if let Some(joy) = self.port(port).filter(|_| bit < 5) {
            joy.fetch_and(!(1 << bit), Ordering::Relaxed);
        }
    }

    /// Pressed bits of a joystick port (0 for an unknown port).
    #[must_use]
    pub fn joystick(&self, port: u8) -> u8 {
        self.port(port)
            .map_or(0, |joy| joy.load(Ordering::Relaxed) & JOYSTICK_MASK)
    }

    /// Set one matrix position. Positions outside 8x8 are ignored.
    pub fn set_key(&self, row: u8, col: u8, pressed: bool) {
        if row >= 8 || col >= 8 {
            return;
        }
        let bit = 1u64 << (row * 8 + col);
        if pressed {
            self.keyboard.fetch_or(bit, Ordering::Relaxed);
        } else {
            self.keyboard.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn press(&self, key: C64Key) {
        let (row, col) = key.matrix();
        self.set_key(row, col, true);
    }

    pub fn release(&self, key: C64Key) {
        let (row, col) = key.matrix();
        self.set_key(row, col, false);
    }

    pub fn release_all(&self) {
        self.keyboard.store(0, Ordering::Relaxed);
        for joy in &self.joysticks {
            joy.store(0, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn keyboard(&self) -> u64 {
        self.keyboard.load(Ordering::Relaxed)
    }

    /// Pins seen on CIA1 ports A and B given what the CIA drives.
    ///
    /// A closed key connects a PA line to a PB line, so a low on either
    /// side pulls the other low. Joystick 2 shares port A and joystick 1
    /// port B; both are active low.
    #[must_use]
    pub fn cia1_pins(&self, pa_out: u8, pb_out: u8) -> (u8, u8) {
        let joy1 = !self.joystick(1);
        let joy2 = !self.joystick(2);
        let matrix = self.keyboard();
        let rows = pa_out & joy2;
        let cols = pb_out & joy1;
        let pb = scan_columns(matrix, rows) & joy1;
        let pa = scan_rows(matrix, cols) & joy2;
        (pa, pb)
    }
}

fn row_bits(matrix: u64, row: u8) -> u8 {
    (matrix >> (row * 8)) as u8
}

/// Column lines (active low) with the rows low in `rows` selected.
#[must_use]
pub fn scan_columns(matrix: u64, rows: u8) -> u8 {
    let pressed = (0..8)
        .filter(|&row| rows & (1 << row) == 0)
        .fold(0u8, |acc, row| acc | row_bits(matrix, row));
    !pressed
}

/// Row lines (active low) with the columns low in `cols` selected.
#[must_use]
pub fn scan_rows(matrix: u64, cols: u8) -> u8 {
    let pressed = (0..8)
        .filter(|&row| row_bits(matrix, row) & !cols != 0)
        .fold(0u8, |acc, row| acc | (1 << row));
    !pressed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matrix_positions() {
        assert_eq!(C64Key::Delete.matrix(), (0, 0));
        assert_eq!(C64Key::Return.matrix(), (1, 0));
        assert_eq!(C64Key::A.matrix(), (2, 1));
        assert_eq!(C64Key::Space.matrix(), (4, 7));
        assert_eq!(C64Key::RunStop.matrix(), (7, 7));
    }

    #[test]
    fn key_names() {
        assert_eq!(C64Key::from_name("A"), Some(C64Key::A));
        assert_eq!(C64Key::from_name("return"), Some(C64Key::Return));
        assert_eq!(C64Key::from_name("F7"), Some(C64Key::F7));
        assert_eq!(C64Key::from_name("nope"), None);
    }

    #[test]
    fn scanning_selected_row_sees_key() {
        let input = InputState::new();
        input.press(C64Key::A);
        // Row 2 selected (PA2 low): column 1 reads low.
        let (_, pb) = input.cia1_pins(!0x04, 0xFF);
        assert_eq!(pb, !0x02);
        // Another row selected: nothing.
        let (_, pb) = input.cia1_pins(!0x01, 0xFF);
        assert_eq!(pb, 0xFF);
    }

    #[test]
    fn reverse_scan_sees_row() {
        let input = InputState::new();
        input.press(C64Key::Space);
        let (pa, _) = input.cia1_pins(0xFF, !0x80);
        assert_eq!(pa, !0x10);
    }

    #[test]
    fn joysticks_are_active_low() {
        let input = InputState::new();
        input.set_joystick_bit(2, joystick::FIRE);
        input.set_joystick_bit(1, joystick::UP);
        let (pa, pb) = input.cia1_pins(0xFF, 0xFF);
        assert_eq!(pa, !0x10);
        assert_eq!(pb, !0x01);
        input.clear_joystick_bit(2, joystick::FIRE);
        assert_eq!(input.joystick(2), 0);
    }

    #[test]
    fn out_of_range_input_is_ignored() {
        let input = InputState::new();
        input.set_joystick_bit(3, 0);
        input.set_joystick_bit(1, 7);
        input.set_key(8, 0, true);
        assert_eq!(input.joystick(1), 0);
        assert_eq!(input.keyboard(), 0);
    }

    #[test]
    fn release_all_clears_everything() {
        let input = InputState::new();
        input.press(C64Key::Q);
        input.set_joystick_bit(1, joystick::LEFT);
        input.release_all();
        assert_eq!(input.keyboard(), 0);
        assert_eq!(input.joystick(1), 0);
    }
}
