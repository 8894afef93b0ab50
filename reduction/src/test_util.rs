//! Synthetic FITS fixtures for unit tests.

use std::path::Path;

use fitsio::header::serialize_header;
use fitsio::image::{serialize_image, serialize_image_f32, ImageData};
use fitsio::primary::build_primary_header;
use fitsio::value::Value;

use crate::fits::{value_card, Header};
use crate::frame::{Image, EXPTIME};

fn bitpix_of(data: &ImageData) -> i64 {
    match data {
        ImageData::U8(_) => 8,
        ImageData::I16(_) => 16,
        ImageData::I32(_) => 32,
        ImageData::I64(_) => 64,
        ImageData::F32(_) => -32,
        ImageData::F64(_) => -64,
    }
}

/// Write a primary-only file with the plane stored exactly as given.
pub(crate) fn write_plane(
    path: &Path,
    data: ImageData,
    (height, width): (usize, usize),
    extra: Header,
) {
    let mut cards = build_primary_header(bitpix_of(&data), &[width, height]).unwrap();
    cards.extend(extra);

    let mut bytes = serialize_header(&cards);
    bytes.extend(serialize_image(&data));
    std::fs::write(path, bytes).unwrap();
}

pub(crate) fn write_image(path: &Path, image: &Image, extra: Header) {
    let (height, width) = image.dim();
    let mut cards = build_primary_header(-32, &[width, height]).unwrap();
    cards.extend(extra);

    let pixels: Vec<f32> = image.iter().copied().collect();
    let mut bytes = serialize_header(&cards);
    bytes.extend(serialize_image_f32(&pixels));
    std::fs::write(path, bytes).unwrap();
}

pub(crate) fn write_science(path: &Path, image: &Image, exptime: Option<Value>) {
    let mut header = vec![value_card(
        "OBJECT",
        Value::String("M51".to_string()),
        Some("target"),
    )];
    if let Some(exptime) = exptime {
        header.push(value_card(EXPTIME, exptime, Some("Exposure time in seconds")));
    }
    write_image(path, image, header);
}
