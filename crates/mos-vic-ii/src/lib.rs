//! VIC-II video chip (6569 PAL, 6567R8 NTSC).
//!
//! Renders eight pixels per CPU cycle into an ARGB32 framebuffer, runs the
//! raster counter and raster IRQ, and decides when the chip needs the bus.
//!
//! # Bus stealing
//!
//! On a badline the VIC-II fetches 40 screen codes and colours. It pulls BA
//! low at cycle 12 and owns the bus from cycle 15 through 54; the CPU may not
//! start a read while BA is low. Each sprite visible on the line costs two
//! more cycles near the end of the line. [`Vic::ba_low`] reports this for the
//! cycle about to run.
//!
//! # Framebuffer
//!
//! 416 pixels wide (cycles 10..62). PAL shows raster lines 6..290 (284 rows),
//! NTSC lines 14..261.

mod palette;
mod sprites;
mod timing;

pub use palette::{apply_pal_blur, ColourAdjust, BLUR_MAX, COLOUR_MAX, NEUTRAL, PALETTE};
pub use timing::VideoStandard;

use emu_core::{Observable, Value};
use sprites::Sprites;

/// Memory as seen through the VIC-II's 14-bit address bus.
pub trait VicMemory {
    /// Read `addr` (0..$3FFF) in 16K `bank` (0-3).
    fn vic_read(&self, bank: u8, addr: u16) -> u8;

    /// Colour RAM nibble at `offset` (0..1000).
    fn colour_read(&self, offset: u16) -> u8;
}

const FIRST_VISIBLE_CYCLE: u8 = 10;
const LAST_VISIBLE_CYCLE: u8 = 62;

/// Framebuffer width in pixels.
pub const FB_WIDTH: u32 = (LAST_VISIBLE_CYCLE - FIRST_VISIBLE_CYCLE) as u32 * 8;

/// Lines on which badlines can occur.
const BADLINE_FIRST: u16 = 0x30;
const BADLINE_END: u16 = 0xF8;

/// Framebuffer column of graphics pixel 0 with XSCROLL 0.
const DISPLAY_FB_X: i32 = 48;

/// IRQ sources in $D019/$D01A.
mod irq {
    pub const RASTER: u8 = 0x01;
    pub const SPRITE_BACKGROUND: u8 = 0x02;
    pub const SPRITE_SPRITE: u8 = 0x04;
}

/// VIC-II chip state.
pub struct Vic {
    regs: [u8; 0x40],
    standard: VideoStandard,
    raster_line: u16,
    raster_cycle: u8,
    raster_compare: u16,
    irq_status: u8,
    irq_enable: u8,
    /// Badline condition as of the last tick.
    badline: bool,
    /// DEN seen on line $30 of this frame.
    den_latch: bool,
    /// Display state (true) or idle state (false).
    display_state: bool,
    /// Row counter, 0-7 within a character row.
    rc: u8,
    /// Video matrix offset of the current character row.
    vc_base: u16,
    screen_row: [u8; 40],
    colour_row: [u8; 40],
    bank: u8,
    sprites: Sprites,
    /// Sprites whose DMA slots are taken on this line.
    sprite_dma: u8,
    colours: [u32; 16],
    framebuffer: Vec<u32>,
    frame_complete: bool,
    frames: u64,
}

impl Vic {
    #[must_use]
    pub fn new(standard: VideoStandard) -> Self {
        Self {
            regs: [0; 0x40],
            standard,
            raster_line: 0,
            raster_cycle: 0,
            raster_compare: 0,
            irq_status: 0,
            irq_enable: 0,
            badline: false,
            den_latch: false,
            display_state: false,
            rc: 7,
            vc_base: 0,
            screen_row: [0; 40],
            colour_row: [0; 40],
            bank: 0,
            sprites: Sprites::default(),
            sprite_dma: 0,
            colours: PALETTE,
            framebuffer: vec![0xFF00_0000; FB_WIDTH as usize * usize::from(standard.visible_lines())],
            frame_complete: false,
            frames: 0,
        }
    }

    /// Power-on state, keeping the video standard and palette.
    pub fn reset(&mut self) {
        let colours = self.colours;
        *self = Self::new(self.standard);
        self.colours = colours;
    }

    #[must_use]
    pub fn standard(&self) -> VideoStandard {
        self.standard
    }

    /// Replace the live palette (see [`ColourAdjust::palette`]).
    pub fn set_colours(&mut self, colours: [u32; 16]) {
        self.colours = colours;
    }

    /// Advance one CPU cycle.
    pub fn tick<M: VicMemory>(&mut self, memory: &M) {
        if self.raster_cycle == 0 {
            let screen_base = self.screen_base();
            self.sprites
                .fetch(&self.regs, self.raster_line, self.bank, screen_base, memory);
            self.sprite_dma = self.sprites.active;
        }

        self.update_badline();
        if self.badline && self.raster_cycle == 15 {
            self.fetch_row(memory);
        }

        self.render(memory);
        self.advance();

        if self.raster_cycle == 0 && self.raster_line == self.raster_compare {
            self.irq_status |= irq::RASTER;
        }
    }

    /// True when BA is low for the cycle about to run, so the CPU must wait.
    #[must_use]
    pub fn ba_low(&self) -> bool {
        let cycle = self.raster_cycle;
        if self.badline_condition() && (12..=54).contains(&cycle) {
            return true;
        }
        if self.sprite_dma == 0 {
            return false;
        }
        let per_line = self.standard.cycles_per_line();
        let first = self.standard.sprite_dma_cycle();
        (0..8u8).any(|i| {
            if self.sprite_dma & (1 << i) == 0 {
                return false;
            }
            let slot = (first + 2 * i) % per_line;
            cycle == slot || cycle == (slot + 1) % per_line
        })
    }

    fn badline_condition(&self) -> bool {
        let den = self.den_latch || (self.raster_line == BADLINE_FIRST && self.regs[0x11] & 0x10 != 0);
        den && (BADLINE_FIRST..BADLINE_END).contains(&self.raster_line)
            && self.raster_line & 7 == u16::from(self.regs[0x11] & 0x07)
    }

    /// DEN and YSCROLL writes take effect on the next cycle.
    fn update_badline(&mut self) {
        if self.raster_line == BADLINE_FIRST && self.regs[0x11] & 0x10 != 0 {
            self.den_latch = true;
        }
        self.badline = self.badline_condition();
        if self.badline {
            self.display_state = true;
        }
    }

    fn fetch_row<M: VicMemory>(&mut self, memory: &M) {
        let screen_base = self.screen_base();
        self.rc = 0;
        for col in 0..40u16 {
            let offset = (self.vc_base + col) & 0x03FF;
            self.screen_row[usize::from(col)] =
                memory.vic_read(self.bank, (screen_base + offset) & 0x3FFF);
            self.colour_row[usize::from(col)] = memory.colour_read(offset) & 0x0F;
        }
    }

    fn advance(&mut self) {
        self.raster_cycle += 1;
        if self.raster_cycle < self.standard.cycles_per_line() {
            return;
        }
        self.raster_cycle = 0;

        if self.display_state {
            if self.rc == 7 {
                self.vc_base = (self.vc_base + 40) & 0x03FF;
                if !self.badline {
                    self.display_state = false;
                }
            }
            if self.display_state {
                self.rc = (self.rc + 1) & 7;
            }
        }

        self.raster_line += 1;
        if self.raster_line >= self.standard.lines_per_frame() {
            self.raster_line = 0;
            self.vc_base = 0;
            self.den_latch = false;
            self.frame_complete = true;
            self.frames += 1;
        }
    }

    fn screen_base(&self) -> u16 {
        u16::from(self.regs[0x18] >> 4) * 0x0400
    }

    fn char_base(&self) -> u16 {
        u16::from((self.regs[0x18] >> 1) & 0x07) * 0x0800
    }

    fn bitmap_base(&self) -> u16 {
        if self.regs[0x18] & 0x08 != 0 { 0x2000 } else { 0x0000 }
    }

    /// Colour indices and foreground mask for graphics column `col`.
    fn decode_column<M: VicMemory>(&self, col: usize, memory: &M) -> ([u8; 8], u8) {
        let ecm = self.regs[0x11] & 0x40 != 0;
        let bmm = self.regs[0x11] & 0x20 != 0;
        let mcm = self.regs[0x16] & 0x10 != 0;
        let bg0 = self.regs[0x21] & 0x0F;

        if !self.display_state {
            let addr = if ecm { 0x39FF } else { 0x3FFF };
            let data = memory.vic_read(self.bank, addr);
            return hires(data, 0, bg0);
        }

        let code = self.screen_row[col];
        let colour = self.colour_row[col];
        let rc = u16::from(self.rc);
        let char_data = |c: u8| {
            let addr = self.char_base() + u16::from(c) * 8 + rc;
            memory.vic_read(self.bank, addr & 0x3FFF)
        };
        let bitmap_data = || {
            let cell = (self.vc_base + col as u16) & 0x03FF;
            let addr = self.bitmap_base() + cell * 8 + rc;
            memory.vic_read(self.bank, addr & 0x3FFF)
        };

        match (ecm, bmm, mcm) {
            (false, false, false) => hires(char_data(code), colour, bg0),
            (false, false, true) if colour & 0x08 == 0 => hires(char_data(code), colour, bg0),
            (false, false, true) => multicolour(
                char_data(code),
                [bg0, self.regs[0x22] & 0x0F, self.regs[0x23] & 0x0F, colour & 0x07],
            ),
            (false, true, false) => hires(bitmap_data(), code >> 4, code & 0x0F),
            (false, true, true) => {
                multicolour(bitmap_data(), [bg0, code >> 4, code & 0x0F, colour])
            }
            (true, false, false) => {
                let bg = self.regs[0x21 + usize::from(code >> 6)] & 0x0F;
                hires(char_data(code & 0x3F), colour, bg)
            }
            // ECM with BMM or MCM: the sequencer outputs black, but the
            // foreground still collides with sprites.
            (true, ..) => {
                let (_, fg) = if bmm { hires(bitmap_data(), 0, 0) } else { hires(char_data(code & 0x3F), 0, 0) };
                ([0; 8], fg)
            }
        }
    }

    fn render<M: VicMemory>(&mut self, memory: &M) {
        let line = self.raster_line;
        let cycle = self.raster_cycle;
        if line < self.standard.first_visible_line()
            || line >= self.standard.last_visible_line()
            || !(FIRST_VISIBLE_CYCLE..LAST_VISIBLE_CYCLE).contains(&cycle)
        {
            return;
        }

        let fb_y = usize::from(line - self.standard.first_visible_line());
        let fb_x = usize::from(cycle - FIRST_VISIBLE_CYCLE) * 8;
        let border = self.regs[0x20] & 0x0F;

        let (top, bottom) = if self.regs[0x11] & 0x08 != 0 { (0x33, 0xFB) } else { (0x37, 0xF7) };
        let (left, right) = if self.regs[0x16] & 0x08 != 0 { (48, 368) } else { (55, 359) };
        let vertical_border = !self.den_latch || line < top || line >= bottom;
        let xscroll = i32::from(self.regs[0x16] & 0x07);

        let mut pixels = [border; 8];
        let mut in_border = [true; 8];
        let mut foreground = 0u8;
        let mut cached: Option<(usize, [u8; 8], u8)> = None;

        for px in 0..8usize {
            let x = fb_x + px;
            if vertical_border || x < left || x >= right {
                continue;
            }
            in_border[px] = false;
            let dx = x as i32 - DISPLAY_FB_X - xscroll;
            if !(0..320).contains(&dx) {
                pixels[px] = self.regs[0x21] & 0x0F;
                continue;
            }
            let col = (dx / 8) as usize;
            let bit = (dx % 8) as usize;
            let (colours, fg) = match cached {
                Some((c, colours, fg)) if c == col => (colours, fg),
                _ => {
                    let (colours, fg) = self.decode_column(col, memory);
                    cached = Some((col, colours, fg));
                    (colours, fg)
                }
            };
            pixels[px] = colours[bit];
            if fg & (0x80 >> bit) != 0 {
                foreground |= 1 << px;
            }
        }

        let overlay = self.sprites.overlay(&self.regs, fb_x, foreground);
        if overlay.sprite_hit {
            self.irq_status |= irq::SPRITE_SPRITE;
        }
        if overlay.background_hit {
            self.irq_status |= irq::SPRITE_BACKGROUND;
        }

        let row = fb_y * FB_WIDTH as usize + fb_x;
        for px in 0..8usize {
            let index = match overlay.colour[px] {
                Some(c) if !in_border[px] => c,
                _ => pixels[px],
            };
            self.framebuffer[row + px] = self.colours[usize::from(index & 0x0F)];
        }
    }

    /// Read a register. $D01E and $D01F clear on read.
    pub fn read(&mut self, reg: u8) -> u8 {
        let value = self.peek(reg);
        match reg & 0x3F {
            0x1E => self.sprites.sprite_collision = 0,
            0x1F => self.sprites.background_collision = 0,
            _ => {}
        }
        value
    }

    /// Read a register without side effects.
    #[must_use]
    pub fn peek(&self, reg: u8) -> u8 {
        match reg & 0x3F {
            0x11 => {
                let bit8 = if self.raster_line & 0x100 != 0 { 0x80 } else { 0 };
                (self.regs[0x11] & 0x7F) | bit8
            }
            0x12 => self.raster_line as u8,
            0x16 => self.regs[0x16] | 0xC0,
            0x18 => self.regs[0x18] | 0x01,
            0x19 => {
                let any = if self.irq_active() { 0x80 } else { 0 };
                self.irq_status | any | 0x70
            }
            0x1A => self.irq_enable | 0xF0,
            0x1E => self.sprites.sprite_collision,
            0x1F => self.sprites.background_collision,
            r @ 0x20..=0x2E => self.regs[usize::from(r)] | 0xF0,
            r @ 0x00..=0x1D => self.regs[usize::from(r)],
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        let r = reg & 0x3F;
        if r <= 0x2E {
            self.regs[usize::from(r)] = value;
        }
        match r {
            0x11 => {
                self.raster_compare = (self.raster_compare & 0x00FF) | (u16::from(value & 0x80) << 1);
            }
            0x12 => self.raster_compare = (self.raster_compare & 0x0100) | u16::from(value),
            0x19 => self.irq_status &= !value & 0x0F,
            0x1A => self.irq_enable = value & 0x0F,
            _ => {}
        }
    }

    /// True while an enabled interrupt source is latched.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.irq_status & self.irq_enable & 0x0F != 0
    }

    /// Select the 16K bank (0-3); the machine derives it from CIA2 port A.
    pub fn set_bank(&mut self, bank: u8) {
        self.bank = bank & 0x03;
    }

    #[must_use]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// ARGB32 pixels, row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    #[must_use]
    pub const fn framebuffer_width(&self) -> u32 {
        FB_WIDTH
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        u32::from(self.standard.visible_lines())
    }

    /// Check and clear the frame-complete latch.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    #[must_use]
    pub fn raster_line(&self) -> u16 {
        self.raster_line
    }

    #[must_use]
    pub fn raster_cycle(&self) -> u8 {
        self.raster_cycle
    }

    #[must_use]
    pub fn is_badline(&self) -> bool {
        self.badline
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for Vic {
    fn default() -> Self {
        Self::new(VideoStandard::Pal)
    }
}

/// One bit per pixel: set bits take `fg`, clear bits `bg`.
fn hires(data: u8, fg: u8, bg: u8) -> ([u8; 8], u8) {
    let mut out = [bg; 8];
    for (i, px) in out.iter_mut().enumerate() {
        if data & (0x80 >> i) != 0 {
            *px = fg;
        }
    }
    (out, data)
}

/// Bit pairs select from four colours; pairs 10 and 11 count as foreground.
fn multicolour(data: u8, colours: [u8; 4]) -> ([u8; 8], u8) {
    let mut out = [0; 8];
    let mut fg = 0u8;
    for pair in 0..4 {
        let bits = (data >> (6 - pair * 2)) & 0x03;
        out[pair * 2] = colours[usize::from(bits)];
        out[pair * 2 + 1] = colours[usize::from(bits)];
        if bits & 0x02 != 0 {
            fg |= 0xC0 >> (pair * 2);
        }
    }
    (out, fg)
}

const QUERY_PATHS: &[&str] = &[
    "raster_line",
    "raster_cycle",
    "raster_compare",
    "badline",
    "ba",
    "bank",
    "irq",
    "irq_status",
    "irq_enable",
    "display_state",
    "rc",
    "vc_base",
    "frames",
];

impl Observable for Vic {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "raster_line" => self.raster_line.into(),
            "raster_cycle" => self.raster_cycle.into(),
            "raster_compare" => self.raster_compare.into(),
            "badline" => self.badline.into(),
            "ba" => self.ba_low().into(),
            "bank" => self.bank.into(),
            "irq" => self.irq_active().into(),
            "irq_status" => self.irq_status.into(),
            "irq_enable" => self.irq_enable.into(),
            "display_state" => self.display_state.into(),
            "rc" => self.rc.into(),
            "vc_base" => self.vc_base.into(),
            "frames" => self.frames.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
