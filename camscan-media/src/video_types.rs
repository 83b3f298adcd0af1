//! Shared types for captured video frames.

use std::fmt;

/// Build a little-endian FourCC code from its four characters.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24)
}

/// Pixel layout of a raw frame as delivered by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale.
    Gray8,
    /// 16-bit big-endian grayscale.
    Gray16,
    /// R, G, B (3 bytes per pixel).
    Rgb24,
    /// B, G, R (3 bytes per pixel).
    Bgr24,
    /// R, G, B, padding (4 bytes per pixel).
    Rgb32,
    /// B, G, R, padding (4 bytes per pixel).
    Bgr32,
    /// A, R, G, B (4 bytes per pixel).
    Argb32,
    /// R, G, B, A (4 bytes per pixel).
    Rgba32,
    /// B, G, R, A (4 bytes per pixel).
    Bgra32,
    /// Little-endian 16-bit 5/6/5 RGB.
    Rgb565,
    /// Packed 4:2:2, byte order U Y0 V Y1.
    Uyvy,
    /// Packed 4:2:2, byte order Y0 U Y1 V.
    Yuyv,
    /// YUV 4:2:0 semi-planar, interleaved UV after the Y plane.
    Nv12,
    /// YUV 4:2:0 semi-planar, interleaved VU after the Y plane (Android default).
    Nv21,
    /// YUV 4:2:0 planar (Y, U, V planes).
    I420,
    /// Layout not tagged by the capture layer; inferred from bytes per pixel.
    Unknown,
    /// A platform tag with no known layout, kept as its FourCC code.
    Other(u32),
}

impl PixelFormat {
    /// Map a FourCC code to a pixel format. Unrecognized codes become [`Other`](Self::Other).
    pub fn from_fourcc(code: u32) -> Self {
        const GREY: u32 = fourcc(b"GREY");
        const Y800: u32 = fourcc(b"Y800");
        const Y16: u32 = fourcc(b"Y16 ");
        const RGB3: u32 = fourcc(b"RGB3");
        const BGR3: u32 = fourcc(b"BGR3");
        const RGB4: u32 = fourcc(b"RGB4");
        const BGR4: u32 = fourcc(b"BGR4");
        const ARGB: u32 = fourcc(b"ARGB");
        const RGBA: u32 = fourcc(b"RGBA");
        const BGRA: u32 = fourcc(b"BGRA");
        const RGBP: u32 = fourcc(b"RGBP");
        const UYVY: u32 = fourcc(b"UYVY");
        const YUYV: u32 = fourcc(b"YUYV");
        const YUY2: u32 = fourcc(b"YUY2");
        const NV12: u32 = fourcc(b"NV12");
        const NV21: u32 = fourcc(b"NV21");
        const I420: u32 = fourcc(b"I420");
        const YU12: u32 = fourcc(b"YU12");

        match code {
            GREY | Y800 => Self::Gray8,
            Y16 => Self::Gray16,
            RGB3 => Self::Rgb24,
            BGR3 => Self::Bgr24,
            RGB4 => Self::Rgb32,
            BGR4 => Self::Bgr32,
            ARGB => Self::Argb32,
            RGBA => Self::Rgba32,
            BGRA => Self::Bgra32,
            RGBP => Self::Rgb565,
            UYVY => Self::Uyvy,
            YUYV | YUY2 => Self::Yuyv,
            NV12 => Self::Nv12,
            NV21 => Self::Nv21,
            I420 | YU12 => Self::I420,
            other => Self::Other(other),
        }
    }

    /// Bytes per pixel for packed layouts; `None` for planar, unknown, and foreign tags.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Gray8 => Some(1),
            Self::Gray16 | Self::Rgb565 | Self::Uyvy | Self::Yuyv => Some(2),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Rgb32 | Self::Bgr32 | Self::Argb32 | Self::Rgba32 | Self::Bgra32 => Some(4),
            Self::Nv12 | Self::Nv21 | Self::I420 | Self::Unknown | Self::Other(_) => None,
        }
    }

    /// Whether the layout carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Argb32 | Self::Rgba32 | Self::Bgra32)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => {
                let bytes = code.to_le_bytes();
                if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                    write!(f, "fourcc {:?}", String::from_utf8_lossy(&bytes))
                } else {
                    write!(f, "fourcc {code:#010x}")
                }
            }
            other => write!(f, "{other:?}"),
        }
    }
}

/// How color channels relate to the alpha channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlphaMode {
    /// Color channels are independent of alpha.
    #[default]
    Straight,
    /// Color channels were already multiplied by alpha.
    Premultiplied,
}

/// A raw video frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Pixel data.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Alpha interpretation, only meaningful for formats with alpha.
    pub alpha: AlphaMode,
}

impl RawFrame {
    /// A frame with straight (non-premultiplied) alpha.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            alpha: AlphaMode::Straight,
        }
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
