use crate::core::resample::{BilinearResampler, ResampleError, Resampler};
use crate::types::{AlignedBand, AlignedSet, Band, CompositeError, CompositeResult};
use ndarray::Array2;

/// Pick the band whose WCS and shape define the output grid
pub fn select_reference(bands: &[Band], index: usize) -> CompositeResult<&Band> {
    bands.get(index).ok_or(CompositeError::IndexOutOfRange {
        index,
        len: bands.len(),
    })
}

/// Projects every band onto the grid of a reference band
pub struct AlignmentOrchestrator<R: Resampler = BilinearResampler> {
    resampler: R,
}

impl AlignmentOrchestrator<BilinearResampler> {
    pub fn new() -> Self {
        Self {
            resampler: BilinearResampler::new(),
        }
    }
}

impl Default for AlignmentOrchestrator<BilinearResampler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resampler> AlignmentOrchestrator<R> {
    pub fn with_resampler(resampler: R) -> Self {
        Self { resampler }
    }

    pub fn resampler(&self) -> &R {
        &self.resampler
    }

    /// Align all bands onto the grid of `bands[reference_index]`.
    ///
    /// The reference band is copied through unchanged. Any resampling
    /// failure aborts the whole alignment.
    pub fn align(&self, bands: &[Band], reference_index: usize) -> CompositeResult<AlignedSet> {
        let reference = select_reference(bands, reference_index)?;
        log::info!(
            "Projecting {} band(s) onto the grid of '{}' ({}x{})",
            bands.len(),
            reference.identity(),
            reference.shape().0,
            reference.shape().1
        );

        #[cfg(feature = "parallel")]
        let aligned: CompositeResult<Vec<AlignedBand>> = {
            use rayon::prelude::*;
            bands
                .par_iter()
                .enumerate()
                .map(|(index, band)| self.align_band(band, reference, index == reference_index))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let aligned: CompositeResult<Vec<AlignedBand>> = bands
            .iter()
            .enumerate()
            .map(|(index, band)| self.align_band(band, reference, index == reference_index))
            .collect();

        let aligned = aligned?;
        log::info!("✅ Alignment completed for {} band(s)", aligned.len());

        Ok(AlignedSet::new(reference.wcs().clone(), reference_index, aligned))
    }

    fn align_band(&self, band: &Band, reference: &Band, is_reference: bool) -> CompositeResult<AlignedBand> {
        let target_shape = reference.shape();

        if is_reference {
            log::debug!("  {} (reference, passed through)", band.identity());
            return Ok(AlignedBand {
                identity: band.identity().to_string(),
                pixels: band.pixels().clone(),
                footprint: Array2::from_elem(target_shape, true),
                resampled: false,
            });
        }

        log::debug!("  {} -> reference grid", band.identity());

        let resampled = self
            .resampler
            .resample(band.pixels().view(), band.wcs(), reference.wcs(), target_shape)
            .map_err(|cause| CompositeError::AlignmentFailed {
                band: band.identity().to_string(),
                cause,
            })?;

        for found in [resampled.pixels.dim(), resampled.footprint.dim()] {
            if found != target_shape {
                return Err(CompositeError::AlignmentFailed {
                    band: band.identity().to_string(),
                    cause: ResampleError::ShapeMismatch {
                        expected: target_shape,
                        found,
                    },
                });
            }
        }

        let aligned = AlignedBand {
            identity: band.identity().to_string(),
            pixels: resampled.pixels,
            footprint: resampled.footprint,
            resampled: true,
        };

        let coverage = aligned.coverage_percent();
        if coverage == 0.0 {
            log::warn!(
                "Band '{}' does not overlap the reference footprint; its channel will be black",
                band.identity()
            );
        } else {
            log::debug!("  {} coverage: {:.1}%", band.identity(), coverage);
        }

        Ok(aligned)
    }
}
