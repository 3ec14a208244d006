//! 1-bit label bitmaps.

use image::{GrayImage, Luma};

/// Pixel value of an unprinted dot.
pub const BACKGROUND: u8 = 1;
/// Pixel value of a printed dot.
pub const MARK: u8 = 0;

/// Widest bitmap whose packed rows still fit the 16-bit row length field.
pub const MAX_WIDTH: u32 = u16::MAX as u32 * 8;

/// Monochrome image, row-major, one entry per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    marks: Vec<bool>,
}

impl Bitmap {
    /// Creates an all-background bitmap. `width` is clamped to [`MAX_WIDTH`].
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.min(MAX_WIDTH);
        Bitmap {
            width,
            height,
            marks: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel value at `(x, y)`, [`MARK`] or [`BACKGROUND`].
    ///
    /// Out of range coordinates read as background.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        if self.is_mark(x, y) {
            MARK
        } else {
            BACKGROUND
        }
    }

    pub fn is_mark(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.marks[self.index(x, y)]
    }

    /// Sets one pixel. Out of range coordinates are ignored.
    pub fn set_mark(&mut self, x: u32, y: u32, mark: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.marks[i] = mark;
        }
    }

    /// Iterates rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> + '_ {
        let width = self.width as usize;
        (0..self.height as usize).map(move |y| &self.marks[y * width..(y + 1) * width])
    }

    /// Rotates by 90 degrees clockwise. Width and height swap.
    pub fn rotate_cw(&self) -> Bitmap {
        let mut rotated = Bitmap::new(self.height, self.width);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_mark(x, y) {
                    rotated.set_mark(self.height - 1 - y, x, true);
                }
            }
        }
        rotated
    }

    /// Copies the marks of `src` with its top-left corner at `(x, y)`.
    ///
    /// The offset may be negative; whatever falls outside is clipped.
    pub fn blit(&mut self, src: &Bitmap, x: i64, y: i64) {
        for sy in 0..src.height {
            let dy = y + sy as i64;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x + sx as i64;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                if src.is_mark(sx, sy) {
                    self.set_mark(dx as u32, dy as u32, true);
                }
            }
        }
    }

    /// Thresholds a grayscale image: pixels darker than `threshold` become marks.
    pub fn from_luma(image: &GrayImage, threshold: u8) -> Self {
        let mut bitmap = Bitmap::new(image.width(), image.height());
        for (x, y, Luma([value])) in image.enumerate_pixels() {
            if *value < threshold {
                bitmap.set_mark(x, y, true);
            }
        }
        bitmap
    }

    /// Black on white grayscale copy, used for previews.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([self.pixel(x, y) * u8::MAX])
        })
    }
}
