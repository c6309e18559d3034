//! Sprite fetch, overlay, priority and collision detection.

use crate::VicMemory;

/// Sprite X coordinate of the left edge of the 40-column display window,
/// expressed in framebuffer pixels (`fb_x = sprite_x + SPRITE_X_TO_FB`).
pub(crate) const SPRITE_X_TO_FB: i16 = 24;

/// Per-line sprite state.
#[derive(Debug, Clone, Default)]
pub(crate) struct Sprites {
    /// 24 bits of shape data for the current line, per sprite.
    data: [[u8; 3]; 8],
    /// Sprites visible on the current line (bit per sprite).
    pub(crate) active: u8,
    /// Sprite-sprite collision latch ($D01E).
    pub(crate) sprite_collision: u8,
    /// Sprite-background collision latch ($D01F).
    pub(crate) background_collision: u8,
}

/// Colour and coverage the sprites produce for eight framebuffer pixels.
pub(crate) struct Overlay {
    pub(crate) colour: [Option<u8>; 8],
    /// Raised the first time a latch goes from empty to non-empty.
    pub(crate) sprite_hit: bool,
    pub(crate) background_hit: bool,
}

impl Sprites {
    /// Fetch shape data for every sprite visible on `line`.
    pub(crate) fn fetch<M: VicMemory>(
        &mut self,
        regs: &[u8; 0x40],
        line: u16,
        bank: u8,
        screen_base: u16,
        memory: &M,
    ) {
        self.active = 0;
        for i in 0..8usize {
            let bit = 1u8 << i;
            if regs[0x15] & bit == 0 {
                continue;
            }
            let expanded = regs[0x17] & bit != 0;
            let height = if expanded { 42 } else { 21 };
            let row = line.wrapping_sub(u16::from(regs[1 + i * 2]));
            if row >= height {
                continue;
            }
            let row = if expanded { row / 2 } else { row };
            let pointer = memory.vic_read(bank, (screen_base + 0x03F8 + i as u16) & 0x3FFF);
            let base = u16::from(pointer) * 64 + row * 3;
            for (b, byte) in self.data[i].iter_mut().enumerate() {
                *byte = memory.vic_read(bank, (base + b as u16) & 0x3FFF);
            }
            self.active |= bit;
        }
    }

    /// Overlay sprites on eight pixels starting at framebuffer column `fb_x`.
    ///
    /// `foreground` marks which of the eight pixels hold graphics foreground,
    /// for priority and sprite-background collisions.
    pub(crate) fn overlay(&mut self, regs: &[u8; 0x40], fb_x: usize, foreground: u8) -> Overlay {
        let mut coverage = [0u8; 8];
        let mut colours = [[0u8; 8]; 8];

        for i in 0..8usize {
            let bit = 1u8 << i;
            if self.active & bit == 0 {
                continue;
            }
            let x = u16::from(regs[i * 2]) | if regs[0x10] & bit != 0 { 0x100 } else { 0 };
            let start = x as i16 + SPRITE_X_TO_FB;
            let expanded = regs[0x1D] & bit != 0;
            let width: i16 = if expanded { 48 } else { 24 };
            let multicolour = regs[0x1C] & bit != 0;

            for px in 0..8usize {
                let offset = (fb_x + px) as i16 - start;
                if !(0..width).contains(&offset) {
                    continue;
                }
                let pos = if expanded { offset / 2 } else { offset } as usize;
                let colour = if multicolour {
                    let pair = pos / 2;
                    let bits = (self.data[i][pair / 4] >> (6 - (pair % 4) * 2)) & 0x03;
                    match bits {
                        0b00 => None,
                        0b01 => Some(regs[0x25]),
                        0b10 => Some(regs[0x27 + i]),
                        _ => Some(regs[0x26]),
                    }
                } else if self.data[i][pos / 8] & (0x80 >> (pos % 8)) != 0 {
                    Some(regs[0x27 + i])
                } else {
                    None
                };
                if let Some(c) = colour {
                    coverage[px] |= bit;
                    colours[px][i] = c & 0x0F;
                }
            }
        }

        let had_sprite = self.sprite_collision != 0;
        let had_background = self.background_collision != 0;
        for (px, &cov) in coverage.iter().enumerate() {
            if cov.count_ones() >= 2 {
                self.sprite_collision |= cov;
            }
            if cov != 0 && foreground & (1 << px) != 0 {
                self.background_collision |= cov;
            }
        }

        let priority = regs[0x1B];
        let mut colour = [None; 8];
        for px in 0..8usize {
            // Lowest-numbered sprite wins.
            if let Some(i) = (0..8).find(|&i| coverage[px] & (1 << i) != 0) {
                let behind = priority & (1 << i) != 0 && foreground & (1 << px) != 0;
                if !behind {
                    colour[px] = Some(colours[px][i]);
                }
            }
        }

        Overlay {
            colour,
            sprite_hit: !had_sprite && self.sprite_collision != 0,
            background_hit: !had_background && self.background_collision != 0,
        }
    }
}
