use crate::types::{
    AlignedSet, Channel, ChannelImage, CompositeError, CompositeResult, StretchParameters, OUTPUT_MAX,
};
use ndarray::{ArrayView2, Zip};

/// Added to the stretch width so flat images divide safely
pub const RANGE_EPSILON: f64 = 1e-6;

/// Observed range and resolved clip points of one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub vmin: f64,
    pub vmax: f64,
    /// Number of non-missing samples the range was taken over
    pub valid_count: usize,
    pub black: f64,
    pub white: f64,
}

impl ChannelStats {
    pub fn range(&self) -> f64 {
        self.vmax - self.vmin
    }

    /// White point at or below the black point; every sample maps to one value
    pub fn is_degenerate(&self) -> bool {
        self.white <= self.black
    }
}

/// Linear black/white point stretch into the full 16-bit range.
///
/// Missing (non-finite) samples are excluded from the range and rendered
/// black. Arithmetic is done in f64 so results do not depend on how the
/// work is split across threads.
#[derive(Debug, Clone, Copy)]
pub struct ChannelNormalizer {
    epsilon: f64,
}

impl Default for ChannelNormalizer {
    fn default() -> Self {
        Self {
            epsilon: RANGE_EPSILON,
        }
    }
}

impl ChannelNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Observed min/max over non-missing samples and the resolved clip points.
    /// An all-missing band is treated as vmin = vmax = 0.
    pub fn compute_stats(&self, pixels: ArrayView2<'_, f32>, params: &StretchParameters) -> ChannelStats {
        let (vmin, vmax, valid_count) = pixels
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY, 0usize), |(lo, hi, n), &v| {
                let v = v as f64;
                (lo.min(v), hi.max(v), n + 1)
            });

        let (vmin, vmax) = if valid_count == 0 { (0.0, 0.0) } else { (vmin, vmax) };
        let (black, white) = params.resolve(vmin, vmax);

        ChannelStats {
            vmin,
            vmax,
            valid_count,
            black,
            white,
        }
    }

    /// Stretch one band into a 16-bit channel of the same shape
    pub fn normalize(
        &self,
        identity: &str,
        pixels: ArrayView2<'_, f32>,
        params: &StretchParameters,
    ) -> ChannelImage {
        let stats = self.compute_stats(pixels, params);

        log::debug!(
            "{}: min {:.6e}, max {:.6e}, black {:.6e}, white {:.6e} ({} valid samples)",
            identity,
            stats.vmin,
            stats.vmax,
            stats.black,
            stats.white,
            stats.valid_count
        );

        if stats.valid_count == 0 {
            log::warn!("Band '{}' has no observed samples; writing an all-black channel", identity);
        } else if stats.is_degenerate() {
            log::warn!(
                "Degenerate stretch range for band '{}' (black {:.6e}, white {:.6e})",
                identity,
                stats.black,
                stats.white
            );
        }

        let black = stats.black;
        let white = stats.white;
        let epsilon = self.epsilon;
        let stretch = |&v: &f32| stretch_sample(v, black, white, epsilon);

        #[cfg(feature = "parallel")]
        let channel = Zip::from(&pixels).par_map_collect(stretch);

        #[cfg(not(feature = "parallel"))]
        let channel = Zip::from(&pixels).map_collect(stretch);

        channel
    }

    /// Stretch every aligned band with its own parameters, keeping band order
    pub fn normalize_set(
        &self,
        aligned: &AlignedSet,
        params: &[StretchParameters],
    ) -> CompositeResult<Vec<Channel>> {
        if params.len() != aligned.len() {
            return Err(CompositeError::Config(format!(
                "{} stretch parameter set(s) given for {} band(s)",
                params.len(),
                aligned.len()
            )));
        }

        log::info!("Stretching {} band(s) to 0 - {}", aligned.len(), OUTPUT_MAX);

        #[cfg(feature = "parallel")]
        let channels: Vec<Channel> = {
            use rayon::prelude::*;
            aligned
                .bands()
                .par_iter()
                .zip(params.par_iter())
                .map(|(band, p)| Channel::new(band.identity.clone(), self.normalize(&band.identity, band.pixels.view(), p)))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let channels: Vec<Channel> = aligned
            .iter()
            .zip(params.iter())
            .map(|(band, p)| Channel::new(band.identity.clone(), self.normalize(&band.identity, band.pixels.view(), p)))
            .collect();

        Ok(channels)
    }
}

/// Map one sample through the black/white stretch.
///
/// Missing samples (NaN or infinite) are mapped straight to 0 instead of
/// being replaced by 0.0 and then clipped and scaled. The two orders differ
/// whenever 0.0 lies above the black point: replacing first would render a
/// missing sample as a mid-grey `(0 - black) / (white - black)`, while here
/// it is always black.
///
/// Clipping raises to the black point first and then lowers to the white
/// point, so an inverted pair (white < black) saturates.
pub fn stretch_sample(value: f32, black: f64, white: f64, epsilon: f64) -> u16 {
    if !value.is_finite() {
        return 0;
    }
    let clipped = (value as f64).max(black).min(white);
    let normalized = (clipped - black) / (white - black + epsilon);

    if !normalized.is_finite() {
        return 0;
    }

    let scaled = (normalized * OUTPUT_MAX as f64).round();
    scaled.clamp(0.0, OUTPUT_MAX as f64) as u16
}
