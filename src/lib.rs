//! starfuse: multi-band image registration and tone mapping for astronomy
//!
//! Takes several single-band images of the same sky region (one per filter),
//! projects them onto the pixel grid of a reference band using their celestial
//! WCS, stretches each one between black and white points into the full 16-bit
//! range and writes the result as a lossless 16-bit TIFF, either as one
//! multi-channel composite or one file per band.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AlignedBand, AlignedSet, Band, Channel, CompositeError, CompositeRaster, CompositeResult,
    StretchParameters, OUTPUT_MAX,
};

pub use self::core::{
    AlignmentOrchestrator, BilinearResampler, ChannelNormalizer, CompositePipeline, Compositor,
    PipelineOutput, Resampler, Wcs,
};

pub use io::{read_raster, Compression, FitsLoader, PipelineConfig, TiffWriter};
