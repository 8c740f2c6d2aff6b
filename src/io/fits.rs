//! FITS image loading for science bands.
//!
//! HDU access, header keys and pixel decoding (including BSCALE/BZERO and
//! gzip-compressed files) go through `fitsio`. This module picks the science
//! HDU, turns BLANK values into NaN and builds the tangent-plane WCS.

use crate::core::wcs::Wcs;
use crate::types::{Band, BandImage, CompositeError, CompositeResult};
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

/// Numeric keys read from an image HDU
const NUMERIC_KEYS: &[&str] = &[
    "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "BSCALE", "BZERO", "BLANK", "CRPIX1", "CRPIX2",
    "CRVAL1", "CRVAL2", "CD1_1", "CD1_2", "CD2_1", "CD2_2", "CDELT1", "CDELT2", "PC1_1",
    "PC1_2", "PC2_1", "PC2_2", "CROTA2",
];

/// Text keys read from an image HDU
const TEXT_KEYS: &[&str] = &["CTYPE1", "CTYPE2", "EXTNAME", "FILTER"];

/// Header card value
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Number(f64),
}

/// The header keys the loader needs from one HDU
#[derive(Debug, Clone, Default)]
pub struct FitsHeader {
    values: HashMap<String, HeaderValue>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the known numeric and text keys present in `hdu`
    pub fn from_hdu(hdu: &FitsHdu, fptr: &mut FitsFile) -> Self {
        let mut header = Self::new();
        for &key in NUMERIC_KEYS {
            if let Ok(value) = hdu.read_key::<f64>(fptr, key) {
                header.insert(key, HeaderValue::Number(value));
            }
        }
        for &key in TEXT_KEYS {
            if let Ok(value) = hdu.read_key::<String>(fptr, key) {
                header.insert(key, HeaderValue::Text(value.trim().to_string()));
            }
        }
        header
    }

    pub fn insert(&mut self, keyword: &str, value: HeaderValue) {
        self.values.insert(keyword.trim().to_uppercase(), value);
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        match self.values.get(keyword) {
            Some(HeaderValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        match self.values.get(keyword) {
            Some(HeaderValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.values.contains_key(keyword)
    }

    fn require_f64(&self, keyword: &str) -> CompositeResult<f64> {
        self.get_f64(keyword)
            .ok_or_else(|| CompositeError::InvalidFormat(format!("missing keyword {}", keyword)))
    }

    /// (NAXIS1, NAXIS2) as array dimensions
    pub fn image_size(&self) -> CompositeResult<(usize, usize)> {
        let axis = |key: &str| -> CompositeResult<usize> {
            let len = self.require_f64(key)?;
            if len.fract() != 0.0 || len < 1.0 || len > u32::MAX as f64 {
                return Err(CompositeError::InvalidFormat(format!("{} is not a valid axis length: {}", key, len)));
            }
            Ok(len as usize)
        };
        Ok((axis("NAXIS1")?, axis("NAXIS2")?))
    }

    /// Physical value that marks undefined integer pixels
    fn blank_value(&self) -> Option<f32> {
        let bitpix = self.get_f64("BITPIX")?;
        if bitpix < 0.0 {
            return None;
        }
        let blank = self.get_f64("BLANK")?;
        let bscale = self.get_f64("BSCALE").unwrap_or(1.0);
        let bzero = self.get_f64("BZERO").unwrap_or(0.0);
        Some((blank * bscale + bzero) as f32)
    }
}

/// Build the celestial WCS described by an image header.
///
/// The linear part comes from CDi_j when present, otherwise from
/// CDELTi with either PCi_j or CROTA2.
pub fn wcs_from_header(header: &FitsHeader) -> CompositeResult<Wcs> {
    let (width, height) = header.image_size()?;

    let ctype1 = header.get_str("CTYPE1").unwrap_or("");
    let ctype2 = header.get_str("CTYPE2").unwrap_or("");
    if !(ctype1.starts_with("RA--") && ctype2.starts_with("DEC-")) {
        return Err(CompositeError::InvalidFormat(format!(
            "unsupported celestial axes '{}' / '{}' (expected RA/DEC)",
            ctype1, ctype2
        )));
    }
    for ctype in [ctype1, ctype2] {
        if ctype.get(5..8) != Some("TAN") {
            return Err(CompositeError::InvalidFormat(format!(
                "unsupported projection in '{}' (only TAN is handled)",
                ctype
            )));
        }
    }

    let crpix = (header.require_f64("CRPIX1")?, header.require_f64("CRPIX2")?);
    let crval = (header.require_f64("CRVAL1")?, header.require_f64("CRVAL2")?);

    let has_cd = ["CD1_1", "CD1_2", "CD2_1", "CD2_2"].iter().any(|k| header.contains(k));
    let cd = if has_cd {
        let cd = |k: &str| header.get_f64(k).unwrap_or(0.0);
        [[cd("CD1_1"), cd("CD1_2")], [cd("CD2_1"), cd("CD2_2")]]
    } else {
        let cdelt1 = header.get_f64("CDELT1").unwrap_or(1.0);
        let cdelt2 = header.get_f64("CDELT2").unwrap_or(1.0);
        let has_pc = ["PC1_1", "PC1_2", "PC2_1", "PC2_2"].iter().any(|k| header.contains(k));

        if has_pc || !header.contains("CROTA2") {
            let pc = |k: &str, default: f64| header.get_f64(k).unwrap_or(default);
            [
                [cdelt1 * pc("PC1_1", 1.0), cdelt1 * pc("PC1_2", 0.0)],
                [cdelt2 * pc("PC2_1", 0.0), cdelt2 * pc("PC2_2", 1.0)],
            ]
        } else {
            let (sin_r, cos_r) = header.require_f64("CROTA2")?.to_radians().sin_cos();
            [
                [cdelt1 * cos_r, -cdelt2 * sin_r],
                [cdelt1 * sin_r, cdelt2 * cos_r],
            ]
        }
    };

    Ok(Wcs::new(crpix, crval, cd, (width, height)))
}

/// Loads science bands from FITS products
#[derive(Debug, Clone)]
pub struct FitsLoader {
    /// EXTNAME of the science extension
    extension: String,
}

impl Default for FitsLoader {
    fn default() -> Self {
        Self {
            extension: "SCI".to_string(),
        }
    }
}

impl FitsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Load one band; identity comes from FILTER or the file stem
    pub fn load_band<P: AsRef<Path>>(&self, path: P) -> CompositeResult<Band> {
        self.load_band_named(path, None)
    }

    /// Load one band with an explicit identity
    pub fn load_band_named<P: AsRef<Path>>(&self, path: P, identity: Option<&str>) -> CompositeResult<Band> {
        let path = path.as_ref();
        log::info!("Reading {}", path.display());

        if !path.exists() {
            return Err(CompositeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("FITS file not found: {}", path.display()),
            )));
        }

        let mut fptr = FitsFile::open(path)?;
        let index = self.find_image_hdu(&mut fptr)?.ok_or_else(|| CompositeError::InvalidBand {
            band: path.display().to_string(),
            reason: format!("no '{}' extension or 2D image HDU found", self.extension),
        })?;

        let hdu = fptr.hdu(index)?;
        let header = FitsHeader::from_hdu(&hdu, &mut fptr);
        let primary_filter = if index == 0 {
            None
        } else {
            let primary = fptr.primary_hdu()?;
            primary.read_key::<String>(&mut fptr, "FILTER").ok()
        };

        let identity = match identity {
            Some(name) => name.to_string(),
            None => band_identity(path, &header, primary_filter.as_deref()),
        };
        let invalid = |e: CompositeError| CompositeError::InvalidBand {
            band: identity.clone(),
            reason: e.to_string(),
        };

        let wcs = wcs_from_header(&header).map_err(invalid)?;
        let raw: Vec<f32> = hdu.read_image(&mut fptr)?;
        let pixels = image_from_raw(raw, &header).map_err(invalid)?;

        log::info!(
            "  {}: image size = {} x {}, pixel scale {:.4} arcsec",
            identity,
            pixels.ncols(),
            pixels.nrows(),
            wcs.pixel_scale_arcsec()
        );

        Band::new(identity, pixels, wcs)
    }

    /// Load several bands, keeping input order.
    ///
    /// Files are read one after another; cfitsio is not guaranteed to be
    /// built reentrant.
    pub fn load_bands<P: AsRef<Path>>(&self, paths: &[(P, Option<String>)]) -> CompositeResult<Vec<Band>> {
        paths
            .iter()
            .map(|(path, name)| self.load_band_named(path, name.as_deref()))
            .collect()
    }

    /// Index of the HDU named like the science extension, else the first image HDU
    fn find_image_hdu(&self, fptr: &mut FitsFile) -> CompositeResult<Option<usize>> {
        let hdu_count = fptr.iter().count();
        let mut first_image = None;

        for i in 0..hdu_count {
            let hdu = fptr.hdu(i)?;
            let has_image = match &hdu.info {
                HduInfo::ImageInfo { shape, .. } => shape.len() >= 2 && shape.iter().all(|&n| n > 0),
                _ => false,
            };
            if !has_image {
                continue;
            }

            let extname = hdu.read_key::<String>(fptr, "EXTNAME").ok();
            if extname.is_some_and(|n| n.trim().eq_ignore_ascii_case(&self.extension)) {
                return Ok(Some(i));
            }
            if first_image.is_none() {
                first_image = Some(i);
            }
        }

        Ok(first_image)
    }
}

/// Shape decoded samples into (NAXIS2, NAXIS1), turning BLANK into NaN
fn image_from_raw(mut raw: Vec<f32>, header: &FitsHeader) -> CompositeResult<BandImage> {
    let (width, height) = header.image_size()?;
    let expected = width
        .checked_mul(height)
        .ok_or_else(|| CompositeError::InvalidFormat(format!("image {} x {} is too large", width, height)))?;
    if raw.len() != expected {
        return Err(CompositeError::InvalidFormat(format!(
            "expected a single {} x {} plane, read {} samples",
            width,
            height,
            raw.len()
        )));
    }

    if let Some(blank) = header.blank_value() {
        raw.iter_mut().filter(|v| **v == blank).for_each(|v| *v = f32::NAN);
    }

    Array2::from_shape_vec((height, width), raw)
        .map_err(|e| CompositeError::InvalidFormat(format!("Failed to reshape image data: {}", e)))
}

fn band_identity(path: &Path, header: &FitsHeader, primary_filter: Option<&str>) -> String {
    header
        .get_str("FILTER")
        .or(primary_filter.map(str::trim))
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| file_identity(path))
}

/// File name without `.gz` and the FITS extension
fn file_identity(path: &Path) -> String {
    let gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let path = if gzipped { path.with_extension("") } else { path.to_path_buf() };

    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
