#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use starfuse::core::wcs::Wcs;
use starfuse::types::Band;
use ndarray::Array2;
use std::io::Write;
use std::path::Path;

pub const BLOCK: usize = 2880;

/// Same tangent-plane grid for every synthetic band
pub fn test_wcs(width: usize, height: usize) -> Wcs {
    Wcs::from_scale_rotation(
        (width as f64 / 2.0 + 0.5, height as f64 / 2.0 + 0.5),
        (283.396, 33.029),
        0.063,
        0.0,
        (width, height),
        true,
    )
}

pub fn ramp_band(name: &str, scale: f32) -> Band {
    let pixels = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f32 * scale);
    Band::new(name, pixels, test_wcs(4, 4)).expect("Failed to build band")
}

pub fn constant_band(name: &str, value: f32) -> Band {
    Band::new(name, Array2::from_elem((4, 4), value), test_wcs(4, 4)).expect("Failed to build band")
}

fn card(keyword: &str, value: &str) -> String {
    format!("{:<8}= {:>20}", keyword, value)
}

fn text_card(keyword: &str, value: &str) -> String {
    format!("{:<8}= '{:<8}'", keyword, value)
}

fn header_block(cards: &[String]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for c in cards.iter().map(String::as_str).chain(std::iter::once("END")) {
        bytes.extend_from_slice(format!("{:<80}", c).as_bytes());
    }
    pad(&mut bytes, b' ');
    bytes
}

fn pad(bytes: &mut Vec<u8>, fill: u8) {
    let padded = bytes.len().div_ceil(BLOCK) * BLOCK;
    bytes.resize(padded, fill);
}

fn wcs_cards(width: usize, height: usize) -> Vec<String> {
    let wcs = test_wcs(width, height);
    vec![
        text_card("CTYPE1", "RA---TAN"),
        text_card("CTYPE2", "DEC--TAN"),
        card("CRPIX1", &format!("{:.6}", wcs.crpix.0)),
        card("CRPIX2", &format!("{:.6}", wcs.crpix.1)),
        card("CRVAL1", &format!("{:.6}", wcs.crval.0)),
        card("CRVAL2", &format!("{:.6}", wcs.crval.1)),
        card("CD1_1", &format!("{:E}", wcs.cd[0][0])),
        card("CD1_2", &format!("{:E}", wcs.cd[0][1])),
        card("CD2_1", &format!("{:E}", wcs.cd[1][0])),
        card("CD2_2", &format!("{:E}", wcs.cd[1][1])),
    ]
}

/// JWST-style product: empty primary HDU carrying FILTER, image in a SCI extension
pub fn sci_fits_bytes(filter: Option<&str>, pixels: &Array2<f32>) -> Vec<u8> {
    let (height, width) = pixels.dim();

    let mut primary = vec![card("SIMPLE", "T"), card("BITPIX", "8"), card("NAXIS", "0")];
    if let Some(filter) = filter {
        primary.push(text_card("FILTER", filter));
    }
    let mut bytes = header_block(&primary);

    let mut sci = vec![
        text_card("XTENSION", "IMAGE"),
        card("BITPIX", "-32"),
        card("NAXIS", "2"),
        card("NAXIS1", &width.to_string()),
        card("NAXIS2", &height.to_string()),
        card("PCOUNT", "0"),
        card("GCOUNT", "1"),
        text_card("EXTNAME", "SCI"),
    ];
    sci.extend(wcs_cards(width, height));
    bytes.extend(header_block(&sci));

    let mut data: Vec<u8> = pixels.iter().flat_map(|v| v.to_be_bytes()).collect();
    pad(&mut data, 0);
    bytes.extend(data);
    bytes
}

/// Primary-HDU-only integer image with BZERO and BLANK
pub fn int16_fits_bytes(values: &Array2<i16>, bzero: f64, blank: i16) -> Vec<u8> {
    let (height, width) = values.dim();
    let mut cards = vec![
        card("SIMPLE", "T"),
        card("BITPIX", "16"),
        card("NAXIS", "2"),
        card("NAXIS1", &width.to_string()),
        card("NAXIS2", &height.to_string()),
        card("BSCALE", "1.0"),
        card("BZERO", &format!("{:.1}", bzero)),
        card("BLANK", &blank.to_string()),
    ];
    cards.extend(wcs_cards(width, height));
    let mut bytes = header_block(&cards);

    let mut data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    pad(&mut data, 0);
    bytes.extend(data);
    bytes
}

/// Header declaring a 2^32 x 2^32 double image with no data behind it
pub fn oversized_fits_bytes() -> Vec<u8> {
    let mut cards = vec![
        card("SIMPLE", "T"),
        card("BITPIX", "-64"),
        card("NAXIS", "2"),
        card("NAXIS1", "4294967296"),
        card("NAXIS2", "4294967296"),
    ];
    cards.extend(wcs_cards(4, 4));
    header_block(&cards)
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).expect("Failed to write test file");
}

pub fn write_gz_file(path: &Path, bytes: &[u8]) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("Failed to compress");
    let compressed = encoder.finish().expect("Failed to finish gzip stream");
    std::fs::write(path, compressed).expect("Failed to write test file");
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
