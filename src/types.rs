use crate::core::resample::ResampleError;
use crate::core::wcs::Wcs;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Floating-point science sample; NaN marks unobserved sky
pub type Sample = f32;

/// 2D science image (rows x columns)
pub type BandImage = Array2<Sample>;

/// 2D stretched 16-bit channel (rows x columns)
pub type ChannelImage = Array2<u16>;

/// 3D stacked raster (rows x columns x channels)
pub type RasterCube = Array3<u16>;

/// Largest value a stretched channel sample can take
pub const OUTPUT_MAX: u16 = u16::MAX;

/// One single-filter science image with its sky mapping.
///
/// The pixel array shape always matches the shape declared by the WCS
/// (NAXIS2 rows by NAXIS1 columns); this is checked on construction.
#[derive(Debug, Clone)]
pub struct Band {
    identity: String,
    pixels: BandImage,
    wcs: Wcs,
}

impl Band {
    /// Create a band, rejecting pixel arrays that disagree with the WCS shape
    pub fn new(identity: impl Into<String>, pixels: BandImage, wcs: Wcs) -> CompositeResult<Self> {
        let identity = identity.into();
        let (rows, cols) = pixels.dim();

        if rows == 0 || cols == 0 {
            return Err(CompositeError::InvalidBand {
                band: identity,
                reason: "image has no pixels".to_string(),
            });
        }

        if wcs.shape() != (rows, cols) {
            return Err(CompositeError::InvalidBand {
                band: identity,
                reason: format!(
                    "pixel array is {}x{} but WCS declares {}x{}",
                    rows,
                    cols,
                    wcs.shape().0,
                    wcs.shape().1
                ),
            });
        }

        Ok(Self { identity, pixels, wcs })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn pixels(&self) -> &BandImage {
        &self.pixels
    }

    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn into_parts(self) -> (String, BandImage, Wcs) {
        (self.identity, self.pixels, self.wcs)
    }
}

/// A band after projection onto the reference grid
#[derive(Debug, Clone)]
pub struct AlignedBand {
    pub identity: String,
    pub pixels: BandImage,
    /// true where the source image covers the reference grid
    pub footprint: Array2<bool>,
    /// false for the reference band, which is passed through untouched
    pub resampled: bool,
}

impl AlignedBand {
    /// Fraction of the reference grid covered by this band, in percent
    pub fn coverage_percent(&self) -> f64 {
        let total = self.footprint.len();
        if total == 0 {
            return 0.0;
        }
        let covered = self.footprint.iter().filter(|&&inside| inside).count();
        (covered as f64 / total as f64) * 100.0
    }
}

/// Ordered bands sharing the reference WCS and grid shape.
///
/// Position `i` holds the projection of input band `i`.
#[derive(Debug, Clone)]
pub struct AlignedSet {
    wcs: Wcs,
    reference_index: usize,
    bands: Vec<AlignedBand>,
}

impl AlignedSet {
    pub(crate) fn new(wcs: Wcs, reference_index: usize, bands: Vec<AlignedBand>) -> Self {
        debug_assert!(bands.iter().all(|b| b.pixels.dim() == wcs.shape()));
        Self {
            wcs,
            reference_index,
            bands,
        }
    }

    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    /// (rows, columns) of the reference grid
    pub fn shape(&self) -> (usize, usize) {
        self.wcs.shape()
    }

    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AlignedBand> {
        self.bands.get(index)
    }

    pub fn bands(&self) -> &[AlignedBand] {
        &self.bands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignedBand> {
        self.bands.iter()
    }

    pub fn into_bands(self) -> Vec<AlignedBand> {
        self.bands
    }
}

/// Black and white points of a linear stretch, relative to the observed range.
///
/// 0.0 is the band minimum and 1.0 the band maximum. Values outside [0, 1]
/// are allowed and move the clip point beyond the observed data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchParameters {
    pub black_fraction: f64,
    pub white_fraction: f64,
}

impl Default for StretchParameters {
    fn default() -> Self {
        Self {
            black_fraction: 0.0,
            white_fraction: 1.0,
        }
    }
}

impl StretchParameters {
    pub fn new(black_fraction: f64, white_fraction: f64) -> Self {
        Self {
            black_fraction,
            white_fraction,
        }
    }

    /// Same stretch repeated for `count` bands
    pub fn uniform(count: usize, black_fraction: f64, white_fraction: f64) -> Vec<Self> {
        vec![Self::new(black_fraction, white_fraction); count]
    }

    /// Absolute (black, white) points for an observed [vmin, vmax] range
    pub fn resolve(&self, vmin: f64, vmax: f64) -> (f64, f64) {
        let vrange = vmax - vmin;
        (
            vmin + vrange * self.black_fraction,
            vmin + vrange * self.white_fraction,
        )
    }
}

/// One stretched output channel
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub identity: String,
    pub data: ChannelImage,
}

impl Channel {
    pub fn new(identity: impl Into<String>, data: ChannelImage) -> Self {
        Self {
            identity: identity.into(),
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Stacked multi-channel 16-bit raster, channel order = input band order
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRaster {
    data: RasterCube,
    channel_names: Vec<String>,
}

impl CompositeRaster {
    pub(crate) fn new(data: RasterCube, channel_names: Vec<String>) -> Self {
        debug_assert_eq!(data.dim().2, channel_names.len());
        Self {
            data,
            channel_names,
        }
    }

    pub fn data(&self) -> &RasterCube {
        &self.data
    }

    /// (height, width, channels)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channel_count(&self) -> usize {
        self.data.dim().2
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn channel(&self, index: usize) -> Option<ArrayView2<'_, u16>> {
        if index < self.channel_count() {
            Some(self.data.index_axis(Axis(2), index))
        } else {
            None
        }
    }
}

/// Error types for registration and compositing
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid band '{band}': {reason}")]
    InvalidBand { band: String, reason: String },

    #[error("Reference band index {index} is out of range for {len} band(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Alignment failed for band '{band}': {cause}")]
    AlignmentFailed {
        band: String,
        #[source]
        cause: ResampleError,
    },

    #[error("Shape mismatch in channel {channel}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        channel: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Failed to write {}: {reason}", .path.display())]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),
}

/// Result type for compositing operations
pub type CompositeResult<T> = Result<T, CompositeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wcs(width: usize, height: usize) -> Wcs {
        Wcs::from_scale_rotation((1.0, 1.0), (283.396, 33.029), 0.031, 0.0, (width, height), false)
    }

    #[test]
    fn test_band_shape_must_match_wcs() {
        let pixels = Array2::<f32>::zeros((4, 5));

        assert!(Band::new("F150W2", pixels.clone(), test_wcs(5, 4)).is_ok());

        let err = Band::new("F150W2", pixels, test_wcs(4, 5)).unwrap_err();
        match err {
            CompositeError::InvalidBand { band, .. } => assert_eq!(band, "F150W2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_band_rejected() {
        let pixels = Array2::<f32>::zeros((0, 0));
        assert!(matches!(
            Band::new("empty", pixels, test_wcs(0, 0)),
            Err(CompositeError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_stretch_resolve() {
        let params = StretchParameters::new(0.1, 0.5);
        let (black, white) = params.resolve(10.0, 110.0);
        assert!((black - 20.0).abs() < 1e-12);
        assert!((white - 60.0).abs() < 1e-12);

        let uniform = StretchParameters::uniform(3, 0.0, 0.01);
        assert_eq!(uniform.len(), 3);
        assert!(uniform.iter().all(|p| *p == StretchParameters::new(0.0, 0.01)));
    }

    #[test]
    fn test_raster_channel_view() {
        let mut cube = RasterCube::zeros((2, 3, 2));
        cube[[1, 2, 1]] = 42;
        let raster = CompositeRaster::new(cube, vec!["a".into(), "b".into()]);

        assert_eq!(raster.shape(), (2, 3, 2));
        assert_eq!(raster.channel(1).unwrap()[[1, 2]], 42);
        assert!(raster.channel(2).is_none());
    }
}
