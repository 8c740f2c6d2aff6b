//! Lossless 16-bit TIFF output through the GDAL GTiff driver.

use crate::types::{Channel, CompositeError, CompositeRaster, CompositeResult};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, Array3, ArrayView2};
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Tag written into TIFFTAG_SOFTWARE
pub const SOFTWARE_TAG: &str = concat!("starfuse ", env!("CARGO_PKG_VERSION"));

/// Lossless TIFF compression schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Deflate,
    Lzw,
}

impl Compression {
    /// Value of the GTiff COMPRESS creation option
    pub fn as_gdal(&self) -> &'static str {
        match self {
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_gdal())
    }
}

impl FromStr for Compression {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEFLATE" | "ZIP" => Ok(Compression::Deflate),
            "LZW" => Ok(Compression::Lzw),
            other => Err(CompositeError::Config(format!(
                "unsupported compression '{}' (expected DEFLATE or LZW)",
                other
            ))),
        }
    }
}

/// Writes composite rasters and single channels as unsigned 16-bit TIFF
#[derive(Debug, Clone, Default)]
pub struct TiffWriter {
    overwrite: bool,
    compression: Option<Compression>,
}

impl TiffWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow replacing an existing file at the destination
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_compression(mut self, compression: Option<Compression>) -> Self {
        self.compression = compression;
        self
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    /// Write an (H, W, C) raster as a C-sample TIFF, channel i in sample i
    pub fn write_composite<P: AsRef<Path>>(&self, raster: &CompositeRaster, path: P) -> CompositeResult<()> {
        let path = path.as_ref();
        let (height, width, channels) = raster.shape();
        log::info!(
            "Writing {}x{}x{} 16-bit TIFF: {}",
            height,
            width,
            channels,
            path.display()
        );

        let planes: Vec<ArrayView2<'_, u16>> = (0..channels).filter_map(|i| raster.channel(i)).collect();
        self.write_planes(path, &planes, raster.channel_names())?;

        log::info!("✅ TIFF saved: {}", path.display());
        Ok(())
    }

    /// Write one channel as a single-sample TIFF
    pub fn write_channel<P: AsRef<Path>>(&self, channel: &Channel, path: P) -> CompositeResult<()> {
        let path = path.as_ref();
        let (height, width) = channel.shape();
        log::info!("Writing {}x{} 16-bit TIFF: {}", height, width, path.display());

        self.write_planes(path, &[channel.data.view()], std::slice::from_ref(&channel.identity))?;

        log::info!("✅ TIFF saved: {}", path.display());
        Ok(())
    }

    fn write_planes(&self, path: &Path, planes: &[ArrayView2<'_, u16>], names: &[String]) -> CompositeResult<()> {
        if planes.is_empty() {
            return Err(CompositeError::WriteFailed {
                path: path.to_path_buf(),
                reason: "nothing to write".to_string(),
            });
        }
        self.reserve(path)?;

        // Closing the dataset reports no errors; the file must decode back to the planes
        match self.encode(path, planes, names).and_then(|()| verify(path, planes)) {
            Ok(()) => Ok(()),
            Err(e) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                Err(CompositeError::WriteFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Claim the destination atomically unless overwriting is allowed
    fn reserve(&self, path: &Path) -> CompositeResult<()> {
        if self.overwrite {
            return Ok(());
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(CompositeError::WriteFailed {
                path: path.to_path_buf(),
                reason: "file already exists and overwrite is disabled".to_string(),
            }),
            Err(e) => Err(CompositeError::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    fn encode(&self, path: &Path, planes: &[ArrayView2<'_, u16>], names: &[String]) -> CompositeResult<()> {
        let (height, width) = planes[0].dim();

        let mut options = vec![RasterCreationOption {
            key: "INTERLEAVE",
            value: "PIXEL",
        }];
        if planes.len() == 3 {
            options.push(RasterCreationOption {
                key: "PHOTOMETRIC",
                value: "RGB",
            });
        }
        if let Some(compression) = self.compression {
            options.push(RasterCreationOption {
                key: "COMPRESS",
                value: compression.as_gdal(),
            });
            options.push(RasterCreationOption {
                key: "PREDICTOR",
                value: "2",
            });
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type_with_options::<u16, _>(
            path,
            width as isize,
            height as isize,
            planes.len() as isize,
            &options,
        )?;

        dataset.set_metadata_item("TIFFTAG_SOFTWARE", SOFTWARE_TAG, "")?;
        dataset.set_metadata_item(
            "TIFFTAG_DATETIME",
            &chrono::Local::now().format("%Y:%m:%d %H:%M:%S").to_string(),
            "",
        )?;

        for (index, plane) in planes.iter().enumerate() {
            let mut rasterband = dataset.rasterband(index as isize + 1)?;
            let flat_data: Vec<u16> = plane.iter().copied().collect();
            let buffer = Buffer::new((width, height), flat_data);
            rasterband.write((0, 0), (width, height), &buffer)?;

            if let Some(name) = names.get(index) {
                rasterband.set_description(name)?;
            }
        }

        Ok(())
    }
}

/// Decode a freshly written file and compare it with what was meant to be written
fn verify(path: &Path, planes: &[ArrayView2<'_, u16>]) -> CompositeResult<()> {
    let decoded = read_raster(path)?;
    let (height, width) = planes[0].dim();

    if decoded.shape() != (height, width, planes.len()) {
        return Err(CompositeError::InvalidFormat(format!(
            "written TIFF decodes as {:?}, expected {:?}",
            decoded.shape(),
            (height, width, planes.len())
        )));
    }
    for (index, plane) in planes.iter().enumerate() {
        let matches = decoded.channel(index).map_or(false, |d| d == *plane);
        if !matches {
            return Err(CompositeError::InvalidFormat(format!(
                "written TIFF sample {} does not match its channel",
                index
            )));
        }
    }
    Ok(())
}

/// Read a 16-bit TIFF back into a (H, W, C) raster with its band descriptions
pub fn read_raster<P: AsRef<Path>>(path: P) -> CompositeResult<CompositeRaster> {
    let path = path.as_ref();
    log::debug!("Reading TIFF: {}", path.display());

    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let count = dataset.raster_count() as usize;

    let mut data = Array3::<u16>::zeros((height, width, count));
    let mut names = Vec::with_capacity(count);

    for index in 0..count {
        let rasterband = dataset.rasterband(index as isize + 1)?;
        let buffer = rasterband.read_as::<u16>((0, 0), (width, height), (width, height), None)?;
        let plane = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| CompositeError::InvalidFormat(format!("Failed to reshape TIFF band: {}", e)))?;
        data.index_axis_mut(ndarray::Axis(2), index).assign(&plane);

        let name = rasterband
            .description()
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("band_{}", index + 1));
        names.push(name);
    }

    Ok(CompositeRaster::new(data, names))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_parsing() {
        assert_eq!("deflate".parse::<Compression>().unwrap(), Compression::Deflate);
        assert_eq!(" LZW ".parse::<Compression>().unwrap(), Compression::Lzw);
        assert_eq!("zip".parse::<Compression>().unwrap(), Compression::Deflate);
        assert!(matches!("jpeg".parse::<Compression>(), Err(CompositeError::Config(_))));
    }

    #[test]
    fn test_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.tiff");
        std::fs::write(&path, b"keep me").unwrap();

        let channel = Channel::new("g", Array2::from_elem((2, 2), 7u16));
        let err = TiffWriter::new().write_channel(&channel, &path).unwrap_err();

        assert!(matches!(err, CompositeError::WriteFailed { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn test_channel_round_trip_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.tiff");
        let data = Array2::from_shape_fn((3, 5), |(r, c)| (r * 1000 + c) as u16);
        let channel = Channel::new("f444w", data.clone());

        TiffWriter::new()
            .with_compression(Some(Compression::Deflate))
            .write_channel(&channel, &path)
            .unwrap();

        let raster = read_raster(&path).unwrap();
        assert_eq!(raster.shape(), (3, 5, 1));
        assert_eq!(raster.channel(0).unwrap(), data.view());
        assert_eq!(raster.channel_names(), ["f444w"]);
    }

    #[test]
    fn test_missing_directory_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.tiff");
        let channel = Channel::new("g", Array2::from_elem((2, 2), 7u16));

        for writer in [TiffWriter::new(), TiffWriter::new().with_overwrite(true)] {
            let err = writer.write_channel(&channel, &path).unwrap_err();
            assert!(matches!(err, CompositeError::WriteFailed { .. }));
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_overwrite_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.tiff");
        std::fs::write(&path, b"old contents").unwrap();

        let channel = Channel::new("g", Array2::from_elem((2, 3), 512u16));
        TiffWriter::new().with_overwrite(true).write_channel(&channel, &path).unwrap();

        let raster = read_raster(&path).unwrap();
        assert_eq!(raster.channel(0).unwrap(), channel.data.view());
    }
}
