//! Text to label bitmap.
//!
//! Glyphs come from the Spleen 12x24 bitmap font, scaled by an integer
//! factor. Each input line is centered; the block of lines is centered on a
//! canvas as wide as the printable area of the tape.

use log::debug;
use spleen_font::{PSF2Font, FONT_12X24};

use crate::{
    bitmap::{Bitmap, MAX_WIDTH},
    error::Error,
    media::Media,
};

const GLYPH_WIDTH: u32 = 12;
const GLYPH_HEIGHT: u32 = 24;

/// Largest accepted glyph magnification.
pub const MAX_SCALE: u32 = 16;
/// Largest accepted margin in dots.
pub const MAX_MARGIN: u32 = 1000;

/// How text is laid out on the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Canvas width in dots.
    pub width: u32,
    /// Blank dots before and after the text along the canvas height.
    pub margin: u32,
    /// Integer glyph magnification.
    pub scale: u32,
    /// Run the text along the tape feed direction instead of across it.
    pub rotate: bool,
}

impl RenderOptions {
    pub fn for_media(media: Media) -> Self {
        RenderOptions {
            width: media.printable_dots(),
            ..Self::default()
        }
    }

    /// Rejects layouts that cannot be rendered.
    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.width > MAX_WIDTH {
            return Err(Error::InvalidConfig(format!(
                "width must be between 1 and {} dots, got {}",
                MAX_WIDTH, self.width
            )));
        }
        if !(1..=MAX_SCALE).contains(&self.scale) {
            return Err(Error::InvalidConfig(format!(
                "font scale must be between 1 and {}, got {}",
                MAX_SCALE, self.scale
            )));
        }
        if self.margin > MAX_MARGIN {
            return Err(Error::InvalidConfig(format!(
                "margin must be at most {} dots, got {}",
                MAX_MARGIN, self.margin
            )));
        }
        Ok(())
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: crate::LABEL_WIDTH,
            margin: 10,
            scale: 2,
            rotate: true,
        }
    }
}

/// Renders `text` into a label bitmap of width `options.width`.
///
/// Empty text yields a blank label of minimal height.
pub fn render_text(text: &str, options: &RenderOptions) -> Result<Bitmap, Error> {
    options.validate()?;
    let block = text_block(text, options.scale)?;

    let block = if options.rotate {
        block.rotate_cw()
    } else {
        block
    };

    let height = block
        .height()
        .checked_add(options.margin * 2)
        .ok_or_else(|| Error::InvalidConfig("label is too long to render".to_string()))?;
    let mut bitmap = Bitmap::new(options.width, height);
    let x = (options.width as i64 - block.width() as i64) / 2;
    bitmap.blit(&block, x, options.margin as i64);

    debug!(
        "Rendered {} chars into {}x{} label",
        text.chars().count(),
        bitmap.width(),
        bitmap.height()
    );
    Ok(bitmap)
}

/// Places a prepared bitmap on a label of width `options.width`.
///
/// The image is centered across the tape with the margin above and below.
/// Rotation and scale do not apply.
pub fn render_image(image: &Bitmap, options: &RenderOptions) -> Result<Bitmap, Error> {
    options.validate()?;
    if image.width() > options.width {
        return Err(Error::InvalidConfig(format!(
            "image is {} dots wide, the tape prints at most {}",
            image.width(),
            options.width
        )));
    }

    let height = image
        .height()
        .checked_add(options.margin * 2)
        .ok_or_else(|| Error::InvalidConfig("label is too long to render".to_string()))?;
    let mut bitmap = Bitmap::new(options.width, height);
    let x = (options.width - image.width()) / 2;
    bitmap.blit(image, x as i64, options.margin as i64);
    Ok(bitmap)
}

/// Draws the lines of `text` tightly into a bitmap, each line centered.
///
/// The block is as wide as the longest line and one glyph row per line.
/// Text without any characters has no width.
fn text_block(text: &str, scale: u32) -> Result<Bitmap, Error> {
    let mut font = PSF2Font::new(FONT_12X24).map_err(|_| Error::FontUnavailable)?;

    let lines: Vec<Vec<char>> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r').chars().collect())
        .collect();
    let cell_width = GLYPH_WIDTH * scale;
    let cell_height = GLYPH_HEIGHT * scale;
    let longest = lines.iter().map(|line| line.len()).max().unwrap_or(0);

    let too_large = || {
        Error::InvalidConfig(format!(
            "{} lines of up to {} characters are too large to render",
            lines.len(),
            longest
        ))
    };
    let block_width = u32::try_from(longest)
        .ok()
        .and_then(|n| n.checked_mul(cell_width))
        .ok_or_else(too_large)?;
    let block_height = u32::try_from(lines.len())
        .ok()
        .and_then(|n| n.checked_mul(cell_height))
        .ok_or_else(too_large)?;

    let mut block = Bitmap::new(block_width, block_height);

    for (row, line) in lines.iter().enumerate() {
        let line_width = line.len() as u32 * cell_width;
        let left = block.width().saturating_sub(line_width) / 2;
        let top = row as u32 * cell_height;

        for (col, ch) in line.iter().enumerate() {
            let x = left + col as u32 * cell_width;
            let mut glyph = Bitmap::new(GLYPH_WIDTH, GLYPH_HEIGHT);
            let utf8 = ch.to_string();

            if let Some(rows) = font.glyph_for_utf8(utf8.as_bytes()) {
                for (gy, bits) in rows.enumerate() {
                    for (gx, on) in bits.enumerate() {
                        if on {
                            glyph.set_mark(gx as u32, gy as u32, true);
                        }
                    }
                }
            } else {
                draw_box(&mut glyph);
            }

            block.blit(&scale_up(&glyph, scale), x as i64, top as i64);
        }
    }

    Ok(block)
}

/// Outline drawn for characters the font does not cover.
fn draw_box(glyph: &mut Bitmap) {
    let (w, h) = (glyph.width(), glyph.height());
    for x in 2..w - 2 {
        glyph.set_mark(x, 2, true);
        glyph.set_mark(x, h - 3, true);
    }
    for y in 2..h - 2 {
        glyph.set_mark(2, y, true);
        glyph.set_mark(w - 3, y, true);
    }
}

/// Nearest neighbour magnification.
fn scale_up(src: &Bitmap, scale: u32) -> Bitmap {
    if scale == 1 {
        return src.clone();
    }
    let mut dst = Bitmap::new(src.width() * scale, src.height() * scale);
    for y in 0..dst.height() {
        for x in 0..dst.width() {
            if src.is_mark(x / scale, y / scale) {
                dst.set_mark(x, y, true);
            }
        }
    }
    dst
}
