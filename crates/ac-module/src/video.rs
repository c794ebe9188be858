//! Video surface and pixel format types

/// Packed 32-bit pixel format description. Compared whole to detect
/// frame-to-frame format changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelFormat {
    pub bpp: u8,
    pub rshift: u8,
    pub gshift: u8,
    pub bshift: u8,
    pub ashift: u8,
}

impl PixelFormat {
    /// Common xRGB8888 layout
    pub fn xrgb8888() -> Self {
        Self {
            bpp: 32,
            rshift: 16,
            gshift: 8,
            bshift: 0,
            ashift: 24,
        }
    }

    pub fn make_pixel(&self, r: u8, g: u8, b: u8) -> u32 {
        ((r as u32) << self.rshift) | ((g as u32) << self.gshift) | ((b as u32) << self.bshift)
    }
}

/// Target pixel surface modules draw into
#[derive(Debug, Clone)]
pub struct Surface {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Row stride in pixels
    pub pitch: u32,
    pub pixels: Vec<u32>,
}

impl Surface {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            pitch: width,
            pixels: vec![0; (width * height) as usize],
        }
    }

    pub fn line(&self, y: u32) -> &[u32] {
        let start = (y * self.pitch) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn line_mut(&mut self, y: u32) -> &mut [u32] {
        let start = (y * self.pitch) as usize;
        let w = self.width as usize;
        &mut self.pixels[start..start + w]
    }
}

/// Sub-region of the surface actually drawn this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}
