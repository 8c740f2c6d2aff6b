use crate::core::align::AlignmentOrchestrator;
use crate::core::composite::Compositor;
use crate::core::normalize::ChannelNormalizer;
use crate::core::resample::{BilinearResampler, Resampler};
use crate::io::config::PipelineConfig;
use crate::io::fits::FitsLoader;
use crate::io::tiff_writer::TiffWriter;
use crate::types::{Band, Channel, CompositeError, CompositeRaster, CompositeResult, StretchParameters};
use regex::Regex;
use std::path::{Path, PathBuf};

/// What a pipeline run produced
#[derive(Debug, Clone)]
pub enum PipelineOutput {
    /// One multi-sample TIFF
    Composite { path: PathBuf, raster: CompositeRaster },
    /// One single-sample TIFF per band, in band order
    Separate { files: Vec<(PathBuf, Channel)> },
}

impl PipelineOutput {
    pub fn written(&self) -> Vec<&Path> {
        match self {
            PipelineOutput::Composite { path, .. } => vec![path.as_path()],
            PipelineOutput::Separate { files } => files.iter().map(|(p, _)| p.as_path()).collect(),
        }
    }
}

/// Align, stretch and encode a set of bands
pub struct CompositePipeline<R: Resampler = BilinearResampler> {
    orchestrator: AlignmentOrchestrator<R>,
    normalizer: ChannelNormalizer,
    writer: TiffWriter,
    reference_index: usize,
}

impl CompositePipeline<BilinearResampler> {
    pub fn new(reference_index: usize) -> Self {
        Self::with_resampler(BilinearResampler::new(), reference_index)
    }

    /// Load every band listed in `config` and write its output
    pub fn run_config(config: &PipelineConfig) -> CompositeResult<PipelineOutput> {
        config.validate()?;

        let pipeline = Self::new(config.reference_index).with_writer(
            TiffWriter::new()
                .with_overwrite(config.overwrite)
                .with_compression(config.compression()?),
        );

        let sources = config.band_sources();
        log::info!("Loading {} band(s)", sources.len());
        let bands = FitsLoader::new().load_bands(&sources)?;
        let stretch = config.stretch_parameters();

        if config.separate {
            let output_dir = config.output_dir();
            let outputs = sources
                .iter()
                .map(|(path, _)| derive_output_path(path, output_dir.as_deref()))
                .collect::<CompositeResult<Vec<_>>>()?;
            let channels = pipeline.run_separate(&bands, &stretch, &outputs)?;
            Ok(PipelineOutput::Separate {
                files: outputs.into_iter().zip(channels).collect(),
            })
        } else {
            let path = config.output_path();
            let raster = pipeline.run_composite(&bands, &stretch, &path)?;
            Ok(PipelineOutput::Composite { path, raster })
        }
    }
}

impl<R: Resampler> CompositePipeline<R> {
    pub fn with_resampler(resampler: R, reference_index: usize) -> Self {
        Self {
            orchestrator: AlignmentOrchestrator::with_resampler(resampler),
            normalizer: ChannelNormalizer::new(),
            writer: TiffWriter::new(),
            reference_index,
        }
    }

    pub fn with_writer(mut self, writer: TiffWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ChannelNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    /// Align onto the reference grid and stretch every band
    pub fn process(&self, bands: &[Band], stretch: &[StretchParameters]) -> CompositeResult<Vec<Channel>> {
        self.process_on_grid(bands, stretch).map(|(channels, _)| channels)
    }

    /// Stretched channels together with the reference grid shape they were aligned to
    fn process_on_grid(
        &self,
        bands: &[Band],
        stretch: &[StretchParameters],
    ) -> CompositeResult<(Vec<Channel>, (usize, usize))> {
        if stretch.len() != bands.len() {
            return Err(CompositeError::Config(format!(
                "{} stretch parameter set(s) given for {} band(s)",
                stretch.len(),
                bands.len()
            )));
        }

        for (band, params) in bands.iter().zip(stretch) {
            log::info!(
                "  {}: black {}, white {}",
                band.identity(),
                params.black_fraction,
                params.white_fraction
            );
        }

        let aligned = self.orchestrator.align(bands, self.reference_index)?;
        let channels = self.normalizer.normalize_set(&aligned, stretch)?;
        Ok((channels, aligned.shape()))
    }

    /// Align, stretch, stack and write one composite TIFF
    pub fn run_composite<P: AsRef<Path>>(
        &self,
        bands: &[Band],
        stretch: &[StretchParameters],
        output: P,
    ) -> CompositeResult<CompositeRaster> {
        let (channels, grid) = self.process_on_grid(bands, stretch)?;
        let raster = Compositor::stack(&channels, grid)?;
        self.writer.write_composite(&raster, output)?;

        log::info!("✅ Composite of {} band(s) completed", raster.channel_count());
        Ok(raster)
    }

    /// Align and stretch every band, then write each to its own TIFF.
    ///
    /// All channels are produced and checked, and every output path is
    /// checked, before the first file is written. If a write fails, files
    /// already written by this call are removed.
    pub fn run_separate(
        &self,
        bands: &[Band],
        stretch: &[StretchParameters],
        outputs: &[PathBuf],
    ) -> CompositeResult<Vec<Channel>> {
        if outputs.len() != bands.len() {
            return Err(CompositeError::Config(format!(
                "{} output path(s) given for {} band(s)",
                outputs.len(),
                bands.len()
            )));
        }
        self.check_outputs(outputs)?;

        let (channels, grid) = self.process_on_grid(bands, stretch)?;
        Compositor::check_shapes(&channels, grid)?;

        for (index, (channel, path)) in channels.iter().zip(outputs).enumerate() {
            if let Err(e) = self.writer.write_channel(channel, path) {
                for written in &outputs[..index] {
                    log::warn!("Removing {} after failed write", written.display());
                    let _ = std::fs::remove_file(written);
                }
                return Err(e);
            }
        }

        log::info!("✅ Wrote {} single-band TIFF(s)", channels.len());
        Ok(channels)
    }

    /// Reject duplicate output paths, and existing ones unless overwriting
    fn check_outputs(&self, outputs: &[PathBuf]) -> CompositeResult<()> {
        for (index, path) in outputs.iter().enumerate() {
            if outputs[..index].contains(path) {
                return Err(CompositeError::Config(format!(
                    "output path used for more than one band: {}",
                    path.display()
                )));
            }
            if !self.writer.overwrite() && path.exists() {
                return Err(CompositeError::WriteFailed {
                    path: path.clone(),
                    reason: "file already exists and overwrite is disabled".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Per-band output name: the input name with `.fit`/`.fits` (optionally
/// gzipped) replaced by `.tiff`, placed in `output_dir` or next to the input
pub fn derive_output_path(input: &Path, output_dir: Option<&Path>) -> CompositeResult<PathBuf> {
    let fits_suffix = Regex::new(r"(?i)\.fits?(\.gz)?$")
        .map_err(|e| CompositeError::Config(format!("Regex error: {}", e)))?;

    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CompositeError::Config(format!("input path has no file name: {}", input.display())))?;
    let stem = fits_suffix.replace(&file_name, "");
    let tiff_name = format!("{}.tiff", stem);

    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    Ok(dir.join(tiff_name))
}
