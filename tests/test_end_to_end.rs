mod common;

use common::{constant_band, init_logging, ramp_band, test_wcs};
use ndarray::Array2;
use starfuse::core::pipeline::{derive_output_path, CompositePipeline};
use starfuse::io::tiff_writer::{read_raster, Compression, TiffWriter};
use starfuse::types::{Band, CompositeError, StretchParameters, OUTPUT_MAX};
use std::path::PathBuf;

fn three_bands() -> Vec<Band> {
    vec![
        ramp_band("f150w2", 1.0),
        ramp_band("f300m", 2.0),
        constant_band("f335m", 5.0),
    ]
}

#[test]
fn test_three_band_composite() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("image_rgb_16bit.tiff");

    let pipeline = CompositePipeline::new(0);
    let raster = pipeline
        .run_composite(&three_bands(), &StretchParameters::uniform(3, 0.0, 1.0), &output)
        .expect("Composite failed");

    assert_eq!(raster.shape(), (4, 4, 3));
    assert_eq!(raster.channel_names(), ["f150w2", "f300m", "f335m"]);

    let data = raster.data();
    assert_eq!(data[[0, 0, 0]], 0);
    assert_eq!(data[[3, 3, 0]], OUTPUT_MAX);
    assert_eq!(data[[1, 2, 0]], 26214);
    assert_eq!(data[[0, 0, 1]], 0);
    assert_eq!(data[[3, 3, 1]], OUTPUT_MAX);

    // Constant band has no range to stretch
    let flat = raster.channel(2).expect("missing channel 2");
    assert!(flat.iter().all(|&v| v == 0));

    let decoded = read_raster(&output).expect("Failed to read TIFF back");
    assert_eq!(decoded.data(), raster.data());
    assert_eq!(decoded.channel_names(), raster.channel_names());
}

#[test]
fn test_composite_with_compression() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("compressed.tiff");

    let pipeline = CompositePipeline::new(1).with_writer(TiffWriter::new().with_compression(Some(Compression::Lzw)));
    let raster = pipeline
        .run_composite(&three_bands(), &StretchParameters::uniform(3, 0.1, 0.9), &output)
        .expect("Composite failed");

    let decoded = read_raster(&output).expect("Failed to read TIFF back");
    assert_eq!(decoded.data(), raster.data());
}

#[test]
fn test_existing_output_is_not_replaced() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("m57.tiff");
    let stretch = StretchParameters::uniform(3, 0.0, 1.0);

    CompositePipeline::new(0)
        .run_composite(&three_bands(), &stretch, &output)
        .expect("First write failed");

    let err = CompositePipeline::new(0)
        .run_composite(&three_bands(), &stretch, &output)
        .unwrap_err();
    assert!(matches!(err, CompositeError::WriteFailed { .. }));

    CompositePipeline::new(0)
        .with_writer(TiffWriter::new().with_overwrite(true))
        .run_composite(&three_bands(), &stretch, &output)
        .expect("Overwrite failed");
}

#[test]
fn test_separate_outputs_match_channels() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let inputs = ["M57_f150w2_i2d.fits", "M57_f300m_i2d.fits", "M57_f335m_i2d.fits.gz"];
    let outputs: Vec<PathBuf> = inputs
        .iter()
        .map(|name| derive_output_path(&dir.path().join(name), None).expect("Failed to derive name"))
        .collect();

    let channels = CompositePipeline::new(0)
        .run_separate(&three_bands(), &StretchParameters::uniform(3, 0.0, 1.0), &outputs)
        .expect("Separate run failed");

    assert_eq!(outputs[2], dir.path().join("M57_f335m_i2d.tiff"));
    for (channel, path) in channels.iter().zip(&outputs) {
        let decoded = read_raster(path).expect("Failed to read TIFF back");
        assert_eq!(decoded.shape(), (4, 4, 1));
        assert_eq!(decoded.channel(0).expect("missing channel"), channel.data.view());
        assert_eq!(decoded.channel_names(), [channel.identity.as_str()]);
    }
}

#[test]
fn test_separate_run_leaves_no_partial_output() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let outputs: Vec<PathBuf> = ["a.tiff", "b.tiff", "c.tiff"]
        .iter()
        .map(|name| dir.path().join(name))
        .collect();
    std::fs::write(&outputs[1], b"earlier result").expect("Failed to create file");

    let err = CompositePipeline::new(0)
        .run_separate(&three_bands(), &StretchParameters::uniform(3, 0.0, 1.0), &outputs)
        .unwrap_err();

    assert!(matches!(err, CompositeError::WriteFailed { .. }));
    assert!(!outputs[0].exists());
    assert!(!outputs[2].exists());
    assert_eq!(std::fs::read(&outputs[1]).expect("Failed to read file"), b"earlier result");
}

#[test]
fn test_separate_write_failure_removes_earlier_files() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let outputs = vec![
        dir.path().join("a.tiff"),
        dir.path().join("b.tiff"),
        dir.path().join("missing").join("c.tiff"),
    ];

    let err = CompositePipeline::new(0)
        .run_separate(&three_bands(), &StretchParameters::uniform(3, 0.0, 1.0), &outputs)
        .unwrap_err();

    assert!(matches!(err, CompositeError::WriteFailed { .. }));
    assert!(outputs.iter().all(|p| !p.exists()));
}

#[test]
fn test_failed_alignment_writes_nothing() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("never.tiff");

    let mut singular = test_wcs(4, 4);
    singular.cd = [[0.0, 0.0], [0.0, 0.0]];
    let mut bands = three_bands();
    bands.push(Band::new("broken", Array2::zeros((4, 4)), singular).expect("Failed to build band"));

    let err = CompositePipeline::new(0)
        .run_composite(&bands, &StretchParameters::uniform(4, 0.0, 1.0), &output)
        .unwrap_err();

    assert!(matches!(err, CompositeError::AlignmentFailed { .. }));
    assert!(!output.exists());
}

#[test]
fn test_offset_band_is_black_outside_its_footprint() {
    init_logging();
    let reference = ramp_band("ref", 1.0);

    // Same sky, but the image starts one pixel to the right of the reference
    let mut wcs = test_wcs(4, 4);
    wcs.crpix.0 -= 1.0;
    let shifted = Band::new(
        "shifted",
        Array2::from_shape_fn((4, 4), |(_, c)| c as f32 + 1.0),
        wcs,
    )
    .expect("Failed to build band");
    let ramp = Band::new(
        "ramp",
        Array2::from_shape_fn((4, 4), |(r, c)| (r + c) as f32),
        test_wcs(4, 4),
    )
    .expect("Failed to build band");

    let channels = CompositePipeline::new(0)
        .process(&[reference, shifted, ramp], &StretchParameters::uniform(3, 0.0, 1.0))
        .expect("Processing failed");

    // Column 0 of the reference has no source pixel in the shifted band
    for row in 0..4 {
        assert_eq!(channels[1].data[[row, 0]], 0);
        assert_eq!(channels[1].data[[row, 1]], 0);
        assert_eq!(channels[1].data[[row, 3]], OUTPUT_MAX);
    }
    assert_eq!(channels[2].data[[0, 0]], 0);
    assert_eq!(channels[2].data[[3, 3]], OUTPUT_MAX);
}
