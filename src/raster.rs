//! Brother raster command stream.
//!
//! ```text
//! [00 x 400]      invalidate, only with `invalidate(true)`
//! 1B 40           ESC @      initialize
//! 1B 69 61 01     ESC i a    switch to raster mode
//! 1B 69 4D nn     ESC i M    no compression, bit 6 of nn = auto cut
//! 67 LL HH ...    g          one per row, LLHH = packed row length
//! 1A              ^Z         print then eject
//! ```

use log::debug;

use crate::bitmap::Bitmap;

pub const INITIALIZE: [u8; 2] = [0x1B, 0x40];
pub const RASTER_MODE: [u8; 4] = [0x1B, 0x69, 0x61, 0x01];
pub const NO_COMPRESSION: [u8; 4] = [0x1B, 0x69, 0x4D, 0x00];
pub const ROW: u8 = 0x67;
pub const PRINT_AND_EJECT: u8 = 0x1A;

const INVALIDATE_LEN: usize = 400;
const AUTO_CUT: u8 = 0b0100_0000;

/// Encodes bitmaps into raster command streams.
///
/// The default encoder emits exactly the initialize, raster mode and
/// compression commands before the rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEncoder {
    invalidate: bool,
    auto_cut: bool,
}

impl RasterEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix the stream with 400 zero bytes, which clears a printer left
    /// in the middle of a previous job.
    pub fn invalidate(self, flag: bool) -> Self {
        RasterEncoder {
            invalidate: flag,
            ..self
        }
    }

    /// Cut the tape after the label.
    pub fn auto_cut(self, flag: bool) -> Self {
        RasterEncoder {
            auto_cut: flag,
            ..self
        }
    }

    /// Builds the full stream for one label.
    pub fn encode(&self, bitmap: &Bitmap) -> Vec<u8> {
        let row_bytes = packed_len(bitmap.width());
        let mut buf: Vec<u8> = Vec::with_capacity(
            INVALIDATE_LEN + 11 + (row_bytes + 3) * bitmap.height() as usize,
        );

        if self.invalidate {
            buf.extend_from_slice(&[0x00; INVALIDATE_LEN]);
        }
        buf.extend_from_slice(&INITIALIZE);
        buf.extend_from_slice(&RASTER_MODE);

        let mut mode = NO_COMPRESSION;
        if self.auto_cut {
            mode[3] |= AUTO_CUT;
        }
        debug!("Various mode: {:X}", mode[3]);
        buf.extend_from_slice(&mode);

        let len = (row_bytes as u16).to_le_bytes();
        for row in bitmap.rows() {
            buf.push(ROW);
            buf.extend_from_slice(&len);
            pack_row(row, &mut buf);
        }

        buf.push(PRINT_AND_EJECT);
        debug!(
            "Encoded {}x{} bitmap into {} bytes",
            bitmap.width(),
            bitmap.height(),
            buf.len()
        );
        buf
    }
}

/// Encodes with the default encoder.
pub fn encode(bitmap: &Bitmap) -> Vec<u8> {
    RasterEncoder::new().encode(bitmap)
}

/// Bytes needed for one packed row of `width` pixels.
pub fn packed_len(width: u32) -> usize {
    (width as usize + 7) / 8
}

/// Packs 8 pixels per byte, first pixel in the most significant bit.
///
/// Unused low bits of a trailing partial byte stay zero.
fn pack_row(row: &[bool], buf: &mut Vec<u8>) {
    for chunk in row.chunks(8) {
        let mut byte: u8 = 0x00;
        for (bit, mark) in chunk.iter().enumerate() {
            if *mark {
                byte |= 1 << (7 - bit);
            }
        }
        buf.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PREFIX: [u8; 10] = [
        0x1B, 0x40, 0x1B, 0x69, 0x61, 0x01, 0x1B, 0x69, 0x4D, 0x00,
    ];

    /// Splits the stream after the prefix into row payloads.
    fn rows(stream: &[u8]) -> Vec<Vec<u8>> {
        assert_eq!(&stream[..PREFIX.len()], &PREFIX);
        assert_eq!(stream.last(), Some(&PRINT_AND_EJECT));

        let body = &stream[PREFIX.len()..stream.len() - 1];
        let mut rows = Vec::new();
        let mut i = 0;
        while i < body.len() {
            assert_eq!(body[i], ROW);
            let len = u16::from_le_bytes([body[i + 1], body[i + 2]]) as usize;
            rows.push(body[i + 3..i + 3 + len].to_vec());
            i += 3 + len;
        }
        rows
    }

    #[test]
    fn blank_image_has_zero_rows() {
        let stream = encode(&Bitmap::new(20, 5));
        let rows = rows(&stream);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row == &vec![0u8; 3]));
    }

    #[test]
    fn padding_bits_stay_zero() {
        let mut bitmap = Bitmap::new(11, 3);
        for y in 0..3 {
            for x in 0..11 {
                bitmap.set_mark(x, y, true);
            }
        }
        for row in rows(&encode(&bitmap)) {
            assert_eq!(row, vec![0xFF, 0b1110_0000]);
        }
    }

    #[test]
    fn row_length_is_little_endian_packed_width() {
        for (width, expected) in [(1u32, 1usize), (8, 1), (9, 2), (696, 87)] {
            let stream = encode(&Bitmap::new(width, 2));
            let len = (expected as u16).to_le_bytes();
            assert_eq!(&stream[PREFIX.len()..PREFIX.len() + 3], &[ROW, len[0], len[1]]);
            let rows = rows(&stream);
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().all(|row| row.len() == expected));
        }
    }

    #[test]
    fn wide_rows_use_both_length_bytes() {
        let stream = encode(&Bitmap::new(2400, 1));
        assert_eq!(&stream[PREFIX.len()..PREFIX.len() + 3], &[ROW, 0x2C, 0x01]);
    }

    #[test]
    fn stream_is_deterministic() {
        let mut bitmap = Bitmap::new(33, 7);
        bitmap.set_mark(3, 4, true);
        bitmap.set_mark(32, 6, true);
        assert_eq!(encode(&bitmap), encode(&bitmap));
    }

    #[test]
    fn sixteen_by_two_example() {
        let mut bitmap = Bitmap::new(16, 2);
        bitmap.set_mark(0, 1, true);

        let mut expected = PREFIX.to_vec();
        expected.extend_from_slice(&[0x67, 0x02, 0x00, 0x00, 0x00]);
        expected.extend_from_slice(&[0x67, 0x02, 0x00, 0x80, 0x00]);
        expected.push(0x1A);
        assert_eq!(encode(&bitmap), expected);
    }

    #[test]
    fn empty_height_has_no_rows() {
        let mut expected = PREFIX.to_vec();
        expected.push(0x1A);
        assert_eq!(encode(&Bitmap::new(696, 0)), expected);
    }

    #[test]
    fn options_change_preamble_only() {
        let bitmap = Bitmap::new(8, 1);
        let stream = RasterEncoder::new()
            .invalidate(true)
            .auto_cut(true)
            .encode(&bitmap);

        assert_eq!(stream.len(), 400 + PREFIX.len() + 4 + 1);
        assert!(stream[..400].iter().all(|b| *b == 0));
        assert_eq!(&stream[400..406], &PREFIX[..6]);
        assert_eq!(&stream[406..410], &[0x1B, 0x69, 0x4D, 0x40]);
        assert_eq!(&stream[410..], &[0x67, 0x01, 0x00, 0x00, 0x1A]);
    }
}
