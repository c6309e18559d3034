//! PNG screenshots of ARGB32 frames, raw or base64 for JSON transport.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Encode an ARGB32 frame as an RGBA PNG into `out`.
pub fn write_png<W: Write>(out: W, pixels: &[u32], width: u32, height: u32) -> io::Result<()> {
    if pixels.len() != width as usize * height as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} pixels for a {width}x{height} frame", pixels.len()),
        ));
    }
    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(io::Error::other)?;

    let rgba: Vec<u8> = pixels
        .iter()
        .flat_map(|&pixel| {
            let [_, r, g, b] = pixel.to_be_bytes();
            [r, g, b, 0xFF]
        })
        .collect();
    writer.write_image_data(&rgba).map_err(io::Error::other)?;
    writer.finish().map_err(io::Error::other)
}

/// PNG bytes of a frame, base64 encoded.
pub fn png_base64(pixels: &[u32], width: u32, height: u32) -> io::Result<String> {
    let mut png = Vec::new();
    write_png(&mut png, pixels, width, height)?;
    Ok(STANDARD.encode(png))
}

pub fn save_screenshot(path: &Path, pixels: &[u32], width: u32, height: u32) -> io::Result<()> {
    let file = fs::File::create(path)?;
    write_png(BufWriter::new(file), pixels, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_png() {
        let pixels = vec![0xFF10_2030; 4 * 3];
        let mut png = Vec::new();
        write_png(&mut png, &pixels, 4, 3).expect("encodes");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let text = png_base64(&pixels, 4, 3).expect("encodes");
        assert_eq!(STANDARD.decode(text).expect("valid base64"), png);
    }

    #[test]
    fn rejects_wrong_geometry() {
        let err = png_base64(&[0; 5], 2, 2).expect_err("size mismatch");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
