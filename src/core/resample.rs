use crate::core::wcs::{Wcs, WcsError};
use ndarray::{Array2, ArrayView2, Zip};

/// Resampling output on the target grid
#[derive(Debug, Clone)]
pub struct Resampled {
    /// Target-grid samples, NaN outside the source footprint
    pub pixels: Array2<f32>,
    /// true where the target pixel falls inside the source image
    pub footprint: Array2<bool>,
}

impl Resampled {
    pub fn covered_pixels(&self) -> usize {
        self.footprint.iter().filter(|&&inside| inside).count()
    }
}

/// Reasons a band could not be registered onto the target grid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResampleError {
    #[error("projection error: {0}")]
    Projection(#[from] WcsError),

    #[error("source image is empty")]
    EmptySource,

    #[error("resampled array is {found:?}, expected target shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("{0}")]
    Failed(String),
}

/// Sky-to-pixel resampling capability.
///
/// Implementations re-express `source` (mapped by `source_wcs`) on the grid
/// of `target_wcs` with `target_shape` (rows, columns).
pub trait Resampler: Send + Sync {
    fn resample(
        &self,
        source: ArrayView2<'_, f32>,
        source_wcs: &Wcs,
        target_wcs: &Wcs,
        target_shape: (usize, usize),
    ) -> Result<Resampled, ResampleError>;
}

/// Inverse-mapping resampler with bilinear interpolation.
///
/// Each target pixel centre is taken to the sky through the target WCS and
/// back into the source through the source WCS. Source pixels cover
/// `[-0.5, n - 0.5]` along each axis; anything outside is left NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearResampler;

impl BilinearResampler {
    pub fn new() -> Self {
        Self
    }

    fn sample_target_pixel(
        source: &ArrayView2<'_, f32>,
        source_wcs: &Wcs,
        target_wcs: &Wcs,
        row: usize,
        col: usize,
    ) -> Option<f32> {
        let (ra, dec) = target_wcs.pixel_to_sky(col as f64, row as f64);
        let (x, y) = source_wcs.sky_to_pixel(ra, dec).ok()?;
        bilinear_interpolate(source, x, y)
    }
}

impl Resampler for BilinearResampler {
    fn resample(
        &self,
        source: ArrayView2<'_, f32>,
        source_wcs: &Wcs,
        target_wcs: &Wcs,
        target_shape: (usize, usize),
    ) -> Result<Resampled, ResampleError> {
        let (src_rows, src_cols) = source.dim();
        if src_rows == 0 || src_cols == 0 {
            return Err(ResampleError::EmptySource);
        }
        source_wcs.ensure_invertible()?;

        log::debug!(
            "Bilinear resampling {}x{} -> {}x{}",
            src_rows,
            src_cols,
            target_shape.0,
            target_shape.1
        );

        let mut pixels = Array2::from_elem(target_shape, f32::NAN);
        let mut footprint = Array2::from_elem(target_shape, false);

        let fill = |(row, col): (usize, usize), value: &mut f32, inside: &mut bool| {
            if let Some(v) = Self::sample_target_pixel(&source, source_wcs, target_wcs, row, col) {
                *value = v;
                *inside = true;
            }
        };

        #[cfg(feature = "parallel")]
        Zip::indexed(&mut pixels).and(&mut footprint).par_for_each(fill);

        #[cfg(not(feature = "parallel"))]
        Zip::indexed(&mut pixels).and(&mut footprint).for_each(fill);

        Ok(Resampled { pixels, footprint })
    }
}

/// Bilinear interpolation at zero-based (x = column, y = row).
///
/// Returns None outside the source footprint. A missing neighbour with
/// non-zero weight makes the result NaN.
pub fn bilinear_interpolate(image: &ArrayView2<'_, f32>, x: f64, y: f64) -> Option<f32> {
    let (rows, cols) = image.dim();
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    if x < -0.5 || y < -0.5 || x > cols as f64 - 0.5 || y > rows as f64 - 0.5 {
        return None;
    }

    let x = x.clamp(0.0, (cols - 1) as f64);
    let y = y.clamp(0.0, (rows - 1) as f64);

    let x1 = x.floor() as usize;
    let y1 = y.floor() as usize;
    let x2 = (x1 + 1).min(cols - 1);
    let y2 = (y1 + 1).min(rows - 1);

    let dx = x - x1 as f64;
    let dy = y - y1 as f64;

    let taps = [
        (image[[y1, x1]], (1.0 - dx) * (1.0 - dy)),
        (image[[y1, x2]], dx * (1.0 - dy)),
        (image[[y2, x1]], (1.0 - dx) * dy),
        (image[[y2, x2]], dx * dy),
    ];

    let mut interpolated = 0.0f64;
    for (value, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        interpolated += value as f64 * weight;
    }

    Some(interpolated as f32)
}
