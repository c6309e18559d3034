//! The 16 VIC-II colours and the user colour controls.
//!
//! The controls use the same integer scale as the machine resources:
//! 0..=2000 with 1000 as the neutral setting, and 0..=1000 for PAL blur.

/// Base palette: 16 colours as ARGB32, VICE PAL values.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000, // 0: Black
    0xFFFF_FFFF, // 1: White
    0xFF88_3932, // 2: Red
    0xFF67_B6BD, // 3: Cyan
    0xFF8B_3F96, // 4: Purple
    0xFF55_A049, // 5: Green
    0xFF40_318D, // 6: Blue
    0xFFBF_CE72, // 7: Yellow
    0xFF8B_5429, // 8: Orange
    0xFF57_4200, // 9: Brown
    0xFFB8_6962, // 10: Light Red
    0xFF50_5050, // 11: Dark Grey
    0xFF78_7878, // 12: Medium Grey
    0xFF94_E089, // 13: Light Green
    0xFF78_68C0, // 14: Light Blue
    0xFF9F_9F9F, // 15: Light Grey
];

/// Neutral value of the colour controls.
pub const NEUTRAL: u16 = 1000;

/// Upper bound of saturation, contrast, brightness and gamma.
pub const COLOUR_MAX: u16 = 2000;

/// Upper bound of the PAL blur control.
pub const BLUR_MAX: u16 = 1000;

/// Colour controls applied when building the live palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourAdjust {
    pub saturation: u16,
    pub contrast: u16,
    pub brightness: u16,
    pub gamma: u16,
}

impl Default for ColourAdjust {
    fn default() -> Self {
        Self {
            saturation: NEUTRAL,
            contrast: NEUTRAL,
            brightness: NEUTRAL,
            gamma: NEUTRAL,
        }
    }
}

impl ColourAdjust {
    /// Build the 16-entry palette with these controls applied.
    #[must_use]
    pub fn palette(&self) -> [u32; 16] {
        PALETTE.map(|argb| self.apply(argb))
    }

    fn apply(&self, argb: u32) -> u32 {
        let channels = [(argb >> 16) & 0xFF, (argb >> 8) & 0xFF, argb & 0xFF].map(|c| c as f32);
        let luma = 0.299 * channels[0] + 0.587 * channels[1] + 0.114 * channels[2];

        let saturation = f32::from(self.saturation) / f32::from(NEUTRAL);
        let contrast = f32::from(self.contrast) / f32::from(NEUTRAL);
        let brightness = (f32::from(self.brightness) - f32::from(NEUTRAL)) / f32::from(NEUTRAL);
        // Gamma 0 would divide by zero; treat it as the smallest step.
        let exponent = f32::from(NEUTRAL) / f32::from(self.gamma.max(1));

        let [r, g, b] = channels.map(|c| {
            let mut v = luma + (c - luma) * saturation;
            v = (v - 128.0) * contrast + 128.0;
            v += brightness * 128.0;
            v = v.clamp(0.0, 255.0);
            v = 255.0 * (v / 255.0).powf(exponent);
            v.round().clamp(0.0, 255.0) as u32
        });
        0xFF00_0000 | (r << 16) | (g << 8) | b
    }
}

/// Mix each pixel with its horizontal neighbours, as a PAL decoder smears
/// chroma along the line. `amount` is 0..=1000; 0 leaves the frame untouched.
pub fn apply_pal_blur(pixels: &mut [u32], width: usize, amount: u16) {
    if amount == 0 || width < 2 {
        return;
    }
    let weight = f32::from(amount.min(BLUR_MAX)) / f32::from(BLUR_MAX) * 0.5;
    let mut row = vec![0u32; width];
    for line in pixels.chunks_mut(width) {
        row[..line.len()].copy_from_slice(line);
        for x in 0..line.len() {
            let left = row[x.saturating_sub(1)];
            let right = row[(x + 1).min(line.len() - 1)];
            line[x] = mix(row[x], left, right, weight);
        }
    }
}

fn mix(centre: u32, left: u32, right: u32, weight: f32) -> u32 {
    let channel = |shift: u32| {
        let c = ((centre >> shift) & 0xFF) as f32;
        let n = (((left >> shift) & 0xFF) + ((right >> shift) & 0xFF)) as f32 / 2.0;
        ((c * (1.0 - weight) + n * weight).round() as u32).min(255)
    };
    0xFF00_0000 | (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_controls_keep_palette() {
        assert_eq!(ColourAdjust::default().palette(), PALETTE);
    }

    #[test]
    fn zero_saturation_is_grey() {
        let adjust = ColourAdjust {
            saturation: 0,
            ..ColourAdjust::default()
        };
        for argb in adjust.palette() {
            let r = (argb >> 16) & 0xFF;
            let g = (argb >> 8) & 0xFF;
            let b = argb & 0xFF;
            assert!(r == g && g == b, "{argb:08X}");
        }
    }

    #[test]
    fn brightness_raises_black() {
        let adjust = ColourAdjust {
            brightness: 1500,
            ..ColourAdjust::default()
        };
        assert_eq!(adjust.palette()[0], 0xFF40_4040);
        assert_eq!(adjust.palette()[1], 0xFFFF_FFFF);
    }

    #[test]
    fn blur_spreads_an_edge() {
        let mut line = [0xFF00_0000, 0xFFFF_FFFF, 0xFF00_0000];
        apply_pal_blur(&mut line, 3, 1000);
        assert_eq!(line[1], 0xFF80_8080);
        assert_eq!(line[0], 0xFF40_4040);
    }

    #[test]
    fn zero_blur_is_identity() {
        let mut line = [0xFF12_3456, 0xFF65_4321];
        apply_pal_blur(&mut line, 2, 0);
        assert_eq!(line, [0xFF12_3456, 0xFF65_4321]);
    }
}
