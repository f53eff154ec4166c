//! Geometry and color value types shared across the crate.

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Pack into a 0xRRGGBBAA word, the layout used by the software rasterizer.
    #[must_use]
    pub const fn to_rgba(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    /// Unpack from a 0xRRGGBBAA word.
    #[must_use]
    pub const fn from_rgba(word: u32) -> Self {
        Self {
            r: (word >> 24) as u8,
            g: (word >> 16) as u8,
            b: (word >> 8) as u8,
            a: word as u8,
        }
    }
}

/// 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 2D extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: i32,
    pub height: i32,
}

impl Extent {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Check for a zero or negative area.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel count, clamped to zero for empty extents.
    #[must_use]
    pub const fn area(self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }
}

/// Rectangle with corner and extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub corner: Point,
    pub extent: Extent,
}

impl Rect {
    pub const fn new(corner: Point, extent: Extent) -> Self {
        Self { corner, extent }
    }
}
