//! Conversion of raw frames into single-channel luminance maps.
//!
//! Every supported [`PixelFormat`] reduces to one intensity byte per pixel.
//! Color layouts use the integer weighting `(77 R + 150 G + 29 B) >> 8`
//! (0.299 / 0.587 / 0.114 scaled to an 8-bit shift). Layouts with alpha are
//! blended toward white so transparent pixels read as background. YUV layouts
//! already carry luminance and only need the Y samples extracted.
//!
//! Buffers shorter than the frame dimensions convert the pixels that are
//! present and leave the rest of the map at zero; longer buffers are truncated.

use crate::error::FrameError;
use crate::video_types::{AlphaMode, PixelFormat, RawFrame};

const R_WEIGHT: u32 = 77;
const G_WEIGHT: u32 = 150;
const B_WEIGHT: u32 = 29;

/// A single-channel intensity image, `width * height` bytes in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceMap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl LuminanceMap {
    /// Wrap intensity samples, truncating or zero-padding them to `width * height`.
    pub fn new(mut data: Vec<u8>, width: u32, height: u32) -> Self {
        data.resize(width as usize * height as usize, 0);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Sample at `(x, y)`, or `None` outside the map.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// A copy with every sample inverted (light on dark becomes dark on light).
    pub fn inverted(&self) -> Self {
        Self {
            data: self.data.iter().map(|v| 255 - v).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// A copy rotated 90 degrees counter-clockwise. Width and height swap.
    pub fn rotated_counter_clockwise(&self) -> Self {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![0u8; w * h];
        // New row `ny` is old column `w - 1 - ny`, read top to bottom.
        for ny in 0..w {
            let old_x = w - 1 - ny;
            for nx in 0..h {
                data[ny * h + nx] = self.data[nx * w + old_x];
            }
        }
        Self {
            data,
            width: self.height,
            height: self.width,
        }
    }
}

/// Weighted RGB luminance.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((R_WEIGHT * r as u32 + G_WEIGHT * g as u32 + B_WEIGHT * b as u32) >> 8) as u8
}

/// Blend a luminance value toward white by its alpha.
///
/// Alpha 0 yields 255 and alpha 255 yields `lum` unchanged for both modes.
#[inline]
fn blend_alpha(lum: u8, alpha: u8, mode: AlphaMode) -> u8 {
    let lum = lum as u32;
    let a = alpha as u32;
    let white = 255 * (255 - a);
    match mode {
        AlphaMode::Straight => ((lum * a + white + 127) / 255) as u8,
        AlphaMode::Premultiplied => (lum + (white + 127) / 255).min(255) as u8,
    }
}

/// Expand a 5-bit channel to 8 bits.
#[inline]
fn expand5(c: u16) -> u8 {
    ((c as u32 * 527 + 23) >> 6) as u8
}

/// Expand a 6-bit channel to 8 bits.
#[inline]
fn expand6(c: u16) -> u8 {
    ((c as u32 * 259 + 33) >> 6) as u8
}

/// Resolve [`PixelFormat::Unknown`] from the buffer length; other formats pass through.
///
/// Inference maps 1, 2, 3, and 4 bytes per pixel to Gray8, RGB565, RGB24, and
/// RGB32. Any other ratio, or a length that is not a whole number of pixels,
/// is ambiguous.
pub fn resolve_format(
    len: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<PixelFormat, FrameError> {
    if format != PixelFormat::Unknown {
        return Ok(format);
    }
    let pixels = width as usize * height as usize;
    let ambiguous = FrameError::AmbiguousFormat { len, width, height };
    if pixels == 0 || len % pixels != 0 {
        return Err(ambiguous);
    }
    match len / pixels {
        1 => Ok(PixelFormat::Gray8),
        2 => Ok(PixelFormat::Rgb565),
        3 => Ok(PixelFormat::Rgb24),
        4 => Ok(PixelFormat::Rgb32),
        _ => Err(ambiguous),
    }
}

/// Convert a raw buffer into a luminance map. The input is never modified.
pub fn to_luminance(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    alpha: AlphaMode,
) -> Result<LuminanceMap, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyFrame { width, height });
    }
    let format = resolve_format(data.len(), width, height, format)?;
    let pixels = width as usize * height as usize;
    let mut out = vec![0u8; pixels];

    match format {
        PixelFormat::Gray8 | PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 => {
            let n = pixels.min(data.len());
            out[..n].copy_from_slice(&data[..n]);
        }
        PixelFormat::Gray16 => fill_packed(data, 2, &mut out, |px| px[0]),
        PixelFormat::Rgb24 => fill_packed(data, 3, &mut out, |px| luma(px[0], px[1], px[2])),
        PixelFormat::Bgr24 => fill_packed(data, 3, &mut out, |px| luma(px[2], px[1], px[0])),
        PixelFormat::Rgb32 => fill_packed(data, 4, &mut out, |px| luma(px[0], px[1], px[2])),
        PixelFormat::Bgr32 => fill_packed(data, 4, &mut out, |px| luma(px[2], px[1], px[0])),
        PixelFormat::Argb32 => fill_packed(data, 4, &mut out, |px| {
            blend_alpha(luma(px[1], px[2], px[3]), px[0], alpha)
        }),
        PixelFormat::Rgba32 => fill_packed(data, 4, &mut out, |px| {
            blend_alpha(luma(px[0], px[1], px[2]), px[3], alpha)
        }),
        PixelFormat::Bgra32 => fill_packed(data, 4, &mut out, |px| {
            blend_alpha(luma(px[2], px[1], px[0]), px[3], alpha)
        }),
        PixelFormat::Rgb565 => fill_packed(data, 2, &mut out, |px| {
            let p = u16::from_le_bytes([px[0], px[1]]);
            luma(expand5(p >> 11), expand6((p >> 5) & 0x3F), expand5(p & 0x1F))
        }),
        PixelFormat::Uyvy => fill_y_samples(data, 1, &mut out),
        PixelFormat::Yuyv => fill_y_samples(data, 0, &mut out),
        PixelFormat::Unknown | PixelFormat::Other(_) => {
            return Err(FrameError::UnsupportedFormat(format));
        }
    }

    Ok(LuminanceMap {
        data: out,
        width,
        height,
    })
}

/// Apply `pixel` to each whole `bpp`-byte pixel present in `data`.
fn fill_packed(data: &[u8], bpp: usize, out: &mut [u8], pixel: impl Fn(&[u8]) -> u8) {
    for (dst, px) in out.iter_mut().zip(data.chunks_exact(bpp)) {
        *dst = pixel(px);
    }
}

/// Copy every other byte starting at `offset` (the Y samples of packed 4:2:2).
fn fill_y_samples(data: &[u8], offset: usize, out: &mut [u8]) {
    for (dst, y) in out.iter_mut().zip(data.iter().skip(offset).step_by(2)) {
        *dst = *y;
    }
}

impl RawFrame {
    /// Convert this frame into a luminance map.
    pub fn to_luminance(&self) -> Result<LuminanceMap, FrameError> {
        to_luminance(&self.data, self.width, self.height, self.format, self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_types::fourcc;

    const W: u32 = 4;
    const H: u32 = 3;

    fn uniform(format: PixelFormat, v: u8) -> Vec<u8> {
        let bpp = format.bytes_per_pixel().unwrap_or(1);
        vec![v; (W * H) as usize * bpp]
    }

    fn assert_uniform(map: &LuminanceMap, expected: u8) {
        assert_eq!(map.width(), W);
        assert_eq!(map.height(), H);
        assert!(
            map.data().iter().all(|&v| v == expected),
            "expected all {expected}, got {:?}",
            map.data()
        );
    }

    #[test]
    fn uniform_color_formats_map_to_weighted_sum() {
        for v in [0u8, 1, 17, 128, 200, 255] {
            for format in [
                PixelFormat::Gray8,
                PixelFormat::Rgb24,
                PixelFormat::Bgr24,
                PixelFormat::Rgb32,
                PixelFormat::Bgr32,
                PixelFormat::Uyvy,
                PixelFormat::Yuyv,
                PixelFormat::Gray16,
                PixelFormat::Nv12,
                PixelFormat::Nv21,
            ] {
                let map = to_luminance(&uniform(format, v), W, H, format, AlphaMode::Straight)
                    .unwrap();
                // Weights sum to 256, so equal channels map to themselves.
                assert_uniform(&map, v);
            }
        }
    }

    #[test]
    fn uniform_alpha_formats_blend_with_their_own_alpha() {
        for v in [0u8, 64, 128, 255] {
            let expected = blend_alpha(v, v, AlphaMode::Straight);
            for format in [PixelFormat::Argb32, PixelFormat::Rgba32, PixelFormat::Bgra32] {
                let map = to_luminance(&uniform(format, v), W, H, format, AlphaMode::Straight)
                    .unwrap();
                assert_uniform(&map, expected);
            }
        }
    }

    fn pixel(format: PixelFormat, r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        match format {
            PixelFormat::Argb32 => [a, r, g, b],
            PixelFormat::Rgba32 => [r, g, b, a],
            PixelFormat::Bgra32 => [b, g, r, a],
            other => panic!("not an alpha format: {other}"),
        }
    }

    fn frame_of(px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take((W * H * 4) as usize).collect()
    }

    #[test]
    fn transparent_pixels_read_as_white() {
        for format in [PixelFormat::Argb32, PixelFormat::Rgba32, PixelFormat::Bgra32] {
            for (r, g, b) in [(0, 0, 0), (10, 200, 30), (255, 0, 255)] {
                for mode in [AlphaMode::Straight, AlphaMode::Premultiplied] {
                    let data = frame_of(pixel(format, r, g, b, 0));
                    let map = to_luminance(&data, W, H, format, mode).unwrap();
                    assert_uniform(&map, 255);
                }
            }
        }
    }

    #[test]
    fn opaque_pixels_match_rgb24() {
        for format in [PixelFormat::Argb32, PixelFormat::Rgba32, PixelFormat::Bgra32] {
            for (r, g, b) in [(0, 0, 0), (10, 200, 30), (255, 0, 255), (90, 90, 250)] {
                let rgb: Vec<u8> = [r, g, b]
                    .iter()
                    .copied()
                    .cycle()
                    .take((W * H * 3) as usize)
                    .collect();
                let expected = to_luminance(&rgb, W, H, PixelFormat::Rgb24, AlphaMode::Straight)
                    .unwrap()
                    .data()[0];
                let data = frame_of(pixel(format, r, g, b, 255));
                let map = to_luminance(&data, W, H, format, AlphaMode::Straight).unwrap();
                assert_uniform(&map, expected);
            }
        }
    }

    #[test]
    fn channel_order_follows_tag() {
        let red = luma(255, 0, 0);
        let blue = luma(0, 0, 255);
        assert_ne!(red, blue);

        let rgb = to_luminance(&[255, 0, 0], 1, 1, PixelFormat::Rgb24, AlphaMode::Straight)
            .unwrap();
        let bgr = to_luminance(&[255, 0, 0], 1, 1, PixelFormat::Bgr24, AlphaMode::Straight)
            .unwrap();
        assert_eq!(rgb.data(), &[red]);
        assert_eq!(bgr.data(), &[blue]);

        let rgb32 = to_luminance(&[0, 0, 255, 99], 1, 1, PixelFormat::Rgb32, AlphaMode::Straight)
            .unwrap();
        assert_eq!(rgb32.data(), &[blue], "padding byte must be ignored");
    }

    #[test]
    fn half_alpha_blends_toward_white() {
        let map = to_luminance(&[0, 0, 0, 128], 1, 1, PixelFormat::Rgba32, AlphaMode::Straight)
            .unwrap();
        assert_eq!(map.data(), &[127]);

        let premultiplied =
            to_luminance(&[0, 0, 0, 128], 1, 1, PixelFormat::Rgba32, AlphaMode::Premultiplied)
                .unwrap();
        assert_eq!(premultiplied.data(), &[127]);
    }

    #[test]
    fn rgb565_expands_channels() {
        let white = to_luminance(&[0xFF, 0xFF], 1, 1, PixelFormat::Rgb565, AlphaMode::Straight)
            .unwrap();
        assert_eq!(white.data(), &[255]);

        let black = to_luminance(&[0, 0], 1, 1, PixelFormat::Rgb565, AlphaMode::Straight).unwrap();
        assert_eq!(black.data(), &[0]);

        // Pure green: 0b00000_111111_00000 little-endian.
        let green = to_luminance(&[0xE0, 0x07], 1, 1, PixelFormat::Rgb565, AlphaMode::Straight)
            .unwrap();
        assert_eq!(green.data(), &[luma(0, 255, 0)]);

        // Pure red: 0b11111_000000_00000.
        let red = to_luminance(&[0x00, 0xF8], 1, 1, PixelFormat::Rgb565, AlphaMode::Straight)
            .unwrap();
        assert_eq!(red.data(), &[luma(255, 0, 0)]);
    }

    #[test]
    fn packed_yuv_extracts_y_samples() {
        // Two pixels: U Y0 V Y1 and Y0 U Y1 V.
        let uyvy = to_luminance(&[1, 10, 2, 20], 2, 1, PixelFormat::Uyvy, AlphaMode::Straight)
            .unwrap();
        assert_eq!(uyvy.data(), &[10, 20]);

        let yuyv = to_luminance(&[10, 1, 20, 2], 2, 1, PixelFormat::Yuyv, AlphaMode::Straight)
            .unwrap();
        assert_eq!(yuyv.data(), &[10, 20]);
    }

    #[test]
    fn gray16_keeps_high_byte() {
        let map = to_luminance(&[0xAB, 0x01, 0x10, 0xFF], 2, 1, PixelFormat::Gray16, AlphaMode::Straight)
            .unwrap();
        assert_eq!(map.data(), &[0xAB, 0x10]);
    }

    #[test]
    fn planar_yuv_uses_leading_y_plane() {
        let mut data = vec![7u8; 4];
        data.extend_from_slice(&[128, 128]);
        let map = to_luminance(&data, 2, 2, PixelFormat::Nv21, AlphaMode::Straight).unwrap();
        assert_eq!(map.data(), &[7, 7, 7, 7]);
    }

    #[test]
    fn gray8_is_truncated_or_padded() {
        let long = to_luminance(&[1, 2, 3, 4, 5, 6], 2, 2, PixelFormat::Gray8, AlphaMode::Straight)
            .unwrap();
        assert_eq!(long.data(), &[1, 2, 3, 4]);

        let short = to_luminance(&[1, 2], 2, 2, PixelFormat::Gray8, AlphaMode::Straight).unwrap();
        assert_eq!(short.data(), &[1, 2, 0, 0]);
    }

    #[test]
    fn short_color_buffer_converts_whole_pixels_only() {
        let map = to_luminance(&[9, 9, 9, 9, 9], 2, 2, PixelFormat::Rgb24, AlphaMode::Straight)
            .unwrap();
        assert_eq!(map.data(), &[9, 0, 0, 0]);
    }

    #[test]
    fn unknown_format_is_inferred_from_bytes_per_pixel() {
        for (bpp, expected) in [
            (1, PixelFormat::Gray8),
            (2, PixelFormat::Rgb565),
            (3, PixelFormat::Rgb24),
            (4, PixelFormat::Rgb32),
        ] {
            assert_eq!(
                resolve_format(6 * bpp, 3, 2, PixelFormat::Unknown).unwrap(),
                expected
            );
        }

        let map = to_luminance(&[50; 12], 2, 2, PixelFormat::Unknown, AlphaMode::Straight).unwrap();
        assert_eq!(map.data(), &[50, 50, 50, 50]);
    }

    #[test]
    fn underdetermined_unknown_format_is_ambiguous() {
        for len in [0usize, 5, 30, 7] {
            let err = to_luminance(&vec![0; len], 3, 2, PixelFormat::Unknown, AlphaMode::Straight)
                .unwrap_err();
            assert!(
                matches!(err, FrameError::AmbiguousFormat { .. }),
                "len {len}: {err}"
            );
        }
    }

    #[test]
    fn foreign_tag_is_unsupported() {
        let format = PixelFormat::Other(fourcc(b"MJPG"));
        let err = to_luminance(&[0; 16], 2, 2, format, AlphaMode::Straight).unwrap_err();
        assert_eq!(err, FrameError::UnsupportedFormat(format));
    }

    #[test]
    fn zero_sized_frame_is_rejected() {
        let err = to_luminance(&[], 0, 4, PixelFormat::Gray8, AlphaMode::Straight).unwrap_err();
        assert_eq!(err, FrameError::EmptyFrame { width: 0, height: 4 });
    }

    #[test]
    fn raw_frame_converts_with_its_alpha_mode() {
        let mut frame = RawFrame::new(vec![0, 0, 0, 0], 1, 1, PixelFormat::Rgba32);
        assert_eq!(frame.to_luminance().unwrap().data(), &[255]);
        frame.alpha = AlphaMode::Premultiplied;
        assert_eq!(frame.to_luminance().unwrap().data(), &[255]);
    }

    #[test]
    fn rotation_and_inversion() {
        // 3x2:
        // 1 2 3
        // 4 5 6
        let map = LuminanceMap::new(vec![1, 2, 3, 4, 5, 6], 3, 2);
        let rotated = map.rotated_counter_clockwise();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        // 3 6
        // 2 5
        // 1 4
        assert_eq!(rotated.data(), &[3, 6, 2, 5, 1, 4]);

        let full_turn = rotated
            .rotated_counter_clockwise()
            .rotated_counter_clockwise()
            .rotated_counter_clockwise();
        assert_eq!(full_turn, map);

        assert_eq!(map.inverted().data(), &[254, 253, 252, 251, 250, 249]);
        assert_eq!(map.get(2, 1), Some(6));
        assert_eq!(map.get(3, 0), None);
    }
}
