//! Text to raster stream without a printer attached.

use image::GrayImage;
use labelprint::{
    raster::{self, packed_len, RasterEncoder},
    render_image, render_text, Bitmap, Media, RenderOptions,
};

#[test]
fn rendered_label_encodes_one_row_command_per_line() {
    let label = render_text("QL-810W", &RenderOptions::default()).unwrap();
    let stream = raster::encode(&label);

    let row_bytes = packed_len(label.width());
    assert_eq!(row_bytes, 87);
    assert_eq!(stream.len(), 10 + label.height() as usize * (3 + row_bytes) + 1);
    assert_eq!(&stream[10..13], &[0x67, 87, 0]);
    assert_eq!(stream.last(), Some(&0x1A));
}

#[test]
fn rendered_label_has_ink_only_between_margins() {
    let options = RenderOptions::default();
    let label = render_text("Hi", &options).unwrap();
    let stream = raster::encode(&label);
    let row_bytes = packed_len(label.width());

    let rows: Vec<&[u8]> = stream[10..stream.len() - 1]
        .chunks(3 + row_bytes)
        .map(|row| &row[3..])
        .collect();
    assert_eq!(rows.len() as u32, label.height());

    let inked = |row: &&[u8]| row.iter().any(|b| *b != 0);
    let margin = options.margin as usize;
    assert!(!rows[..margin].iter().any(inked));
    assert!(!rows[rows.len() - margin..].iter().any(inked));
    assert!(rows.iter().any(inked));
}

#[test]
fn narrow_media_narrows_rows() {
    let label = render_text("x", &RenderOptions::for_media(Media::Continuous12)).unwrap();
    assert_eq!(label.width(), 106);

    let stream = RasterEncoder::new().auto_cut(true).encode(&label);
    assert_eq!(&stream[6..10], &[0x1B, 0x69, 0x4D, 0x40]);
    assert_eq!(&stream[10..13], &[0x67, 14, 0]);
}

#[test]
fn grayscale_image_prints_centered() {
    let image = GrayImage::from_fn(16, 2, |x, _| image::Luma([if x < 8 { 0 } else { 255 }]));
    let options = RenderOptions {
        margin: 0,
        ..RenderOptions::default()
    };
    let label = render_image(&Bitmap::from_luma(&image, 128), &options).unwrap();
    let stream = raster::encode(&label);

    // 16 dots centered on 696 start at dot 340, byte 42 bit 4
    let row = &stream[13..13 + 87];
    assert_eq!(&row[42..44], &[0x0F, 0xF0]);
    assert!(row.iter().enumerate().all(|(i, b)| i == 42 || i == 43 || *b == 0));
}
