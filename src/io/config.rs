use crate::io::tiff_writer::Compression;
use crate::types::{CompositeError, CompositeResult, StretchParameters};
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output name used in composite mode when none is configured
pub const DEFAULT_COMPOSITE_NAME: &str = "image_rgb_16bit.tiff";

/// One input band of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandEntry {
    #[serde(rename = "path")]
    pub path: PathBuf,
    /// Overrides the identity read from the file
    #[serde(rename = "name", default)]
    pub name: Option<String>,
    #[serde(rename = "black", default)]
    pub black: Option<f64>,
    #[serde(rename = "white", default)]
    pub white: Option<f64>,
}

/// XML description of a composite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "composite")]
pub struct PipelineConfig {
    #[serde(rename = "referenceIndex", default)]
    pub reference_index: usize,
    #[serde(rename = "output", default)]
    pub output: Option<PathBuf>,
    /// Directory for per-band files in separate mode; defaults to each input's directory
    #[serde(rename = "outputDir", default)]
    pub output_dir: Option<PathBuf>,
    #[serde(rename = "separate", default)]
    pub separate: bool,
    #[serde(rename = "overwrite", default)]
    pub overwrite: bool,
    #[serde(rename = "compression", default)]
    pub compression: Option<String>,
    /// Black fraction for bands that do not set their own
    #[serde(rename = "black", default)]
    pub black: Option<f64>,
    /// White fraction for bands that do not set their own
    #[serde(rename = "white", default)]
    pub white: Option<f64>,
    #[serde(rename = "band", default)]
    pub bands: Vec<BandEntry>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_xml(xml_content: &str) -> CompositeResult<Self> {
        let config: PipelineConfig = from_str(xml_content)
            .map_err(|e| CompositeError::Config(format!("Failed to parse pipeline XML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; relative band and output paths resolve against its directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> CompositeResult<Self> {
        let path = path.as_ref();
        log::info!("Loading pipeline configuration: {}", path.display());

        let xml_content = std::fs::read_to_string(path)?;
        let mut config = Self::from_xml(&xml_content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);

        log::debug!(
            "{} band(s), reference {}, {} mode",
            config.bands.len(),
            config.reference_index,
            if config.separate { "separate" } else { "composite" }
        );
        Ok(config)
    }

    pub fn validate(&self) -> CompositeResult<()> {
        if self.bands.is_empty() {
            return Err(CompositeError::Config("configuration lists no bands".to_string()));
        }

        let fractions = [self.black, self.white]
            .into_iter()
            .chain(self.bands.iter().flat_map(|b| [b.black, b.white]))
            .flatten();
        for value in fractions {
            if !value.is_finite() {
                return Err(CompositeError::Config(format!("stretch fraction {} is not finite", value)));
            }
        }

        self.compression()?;
        Ok(())
    }

    /// Per-band stretch, falling back to the top-level pair and then to (0, 1)
    pub fn stretch_parameters(&self) -> Vec<StretchParameters> {
        let defaults = StretchParameters::default();
        let black = self.black.unwrap_or(defaults.black_fraction);
        let white = self.white.unwrap_or(defaults.white_fraction);

        self.bands
            .iter()
            .map(|b| StretchParameters::new(b.black.unwrap_or(black), b.white.unwrap_or(white)))
            .collect()
    }

    pub fn compression(&self) -> CompositeResult<Option<Compression>> {
        self.compression
            .as_deref()
            .filter(|c| !c.trim().is_empty() && !c.trim().eq_ignore_ascii_case("none"))
            .map(str::parse)
            .transpose()
    }

    /// Band paths with their optional identity overrides, resolved against the config directory
    pub fn band_sources(&self) -> Vec<(PathBuf, Option<String>)> {
        self.bands
            .iter()
            .map(|b| (self.resolve(&b.path), b.name.clone()))
            .collect()
    }

    pub fn output_path(&self) -> PathBuf {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPOSITE_NAME));
        self.resolve(&output)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|d| self.resolve(d))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
