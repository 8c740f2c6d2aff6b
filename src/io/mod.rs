//! Reading FITS bands, writing TIFF rasters and loading run configuration

pub mod fits;
pub mod tiff_writer;
pub mod config;

pub use fits::{FitsHeader, FitsLoader, HeaderValue};
pub use tiff_writer::{read_raster, Compression, TiffWriter};
pub use config::{BandEntry, PipelineConfig};
