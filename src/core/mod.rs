//! Registration, stretching and compositing

pub mod wcs;
pub mod resample;
pub mod align;
pub mod normalize;
pub mod composite;
pub mod pipeline;

// Re-export main types
pub use wcs::{Wcs, WcsError};
pub use resample::{bilinear_interpolate, BilinearResampler, Resampled, ResampleError, Resampler};
pub use align::{select_reference, AlignmentOrchestrator};
pub use normalize::{stretch_sample, ChannelNormalizer, ChannelStats, RANGE_EPSILON};
pub use composite::Compositor;
pub use pipeline::{derive_output_path, CompositePipeline, PipelineOutput};
