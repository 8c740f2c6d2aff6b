//! World Coordinate System for tangent-plane (gnomonic) projected images.
//!
//! Pixel coordinates passed in and out of this module are zero-based array
//! positions `(column, row)`. FITS reference pixels (`CRPIX`) are one-based;
//! the conversion happens here so callers never deal with it.

/// Determinants below this are treated as a singular CD matrix
const SINGULAR_THRESHOLD: f64 = 1e-20;

/// Sky-to-pixel mapping failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WcsError {
    #[error("CD matrix is singular (determinant {determinant:e})")]
    Singular { determinant: f64 },

    #[error("sky position (RA {ra:.6}, Dec {dec:.6}) lies outside the tangent-plane hemisphere")]
    Unprojectable { ra: f64, dec: f64 },

    #[error("non-finite coordinate")]
    NonFinite,
}

/// Gnomonic WCS: `(xi, eta) = CD x (pixel - CRPIX)`, then de-projection
/// about `CRVAL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel (CRPIX1, CRPIX2), one-based FITS convention
    pub crpix: (f64, f64),
    /// Reference sky position in degrees (CRVAL1 = RA, CRVAL2 = Dec)
    pub crval: (f64, f64),
    /// Pixel offset to intermediate coordinates, degrees per pixel
    pub cd: [[f64; 2]; 2],
    /// Image dimensions (NAXIS1 = width, NAXIS2 = height)
    pub naxis: (usize, usize),
}

impl Wcs {
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2], naxis: (usize, usize)) -> Self {
        Self {
            crpix,
            crval,
            cd,
            naxis,
        }
    }

    /// Build from pixel scale (arcsec/pixel) and position angle (degrees, North through East)
    pub fn from_scale_rotation(
        crpix: (f64, f64),
        crval: (f64, f64),
        pixel_scale: f64,
        rotation: f64,
        naxis: (usize, usize),
        mirrored: bool,
    ) -> Self {
        let scale_deg = pixel_scale / 3600.0;
        let (sin_r, cos_r) = rotation.to_radians().sin_cos();
        let sign = if mirrored { -1.0 } else { 1.0 };

        let cd = [
            [sign * scale_deg * cos_r, -scale_deg * sin_r],
            [sign * scale_deg * sin_r, scale_deg * cos_r],
        ];

        Self::new(crpix, crval, cd, naxis)
    }

    /// Array shape implied by the WCS: (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.naxis.1, self.naxis.0)
    }

    pub fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }

    /// Fails when sky positions cannot be mapped back to pixels
    pub fn ensure_invertible(&self) -> Result<(), WcsError> {
        let determinant = self.determinant();
        if !determinant.is_finite() || determinant.abs() < SINGULAR_THRESHOLD {
            return Err(WcsError::Singular { determinant });
        }
        Ok(())
    }

    /// Mean pixel scale in arcseconds
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let scale_x = (self.cd[0][0].powi(2) + self.cd[1][0].powi(2)).sqrt();
        let scale_y = (self.cd[0][1].powi(2) + self.cd[1][1].powi(2)).sqrt();
        ((scale_x + scale_y) / 2.0) * 3600.0
    }

    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }

    /// Sky position (RA, Dec in degrees) of a zero-based pixel position
    pub fn pixel_to_sky(&self, col: f64, row: f64) -> (f64, f64) {
        let dx = col + 1.0 - self.crpix.0;
        let dy = row + 1.0 - self.crpix.1;

        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval.0.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi.powi(2) + denom.powi(2)).sqrt());

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Zero-based pixel position (column, row) of a sky position
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), WcsError> {
        if !ra.is_finite() || !dec.is_finite() {
            return Err(WcsError::NonFinite);
        }
        self.ensure_invertible()?;

        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.0).to_radians().sin_cos();

        // Points 90 degrees or more from the tangent point have no gnomonic image
        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return Err(WcsError::Unprojectable { ra, dec });
        }

        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let det = self.determinant();
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;

        Ok((self.crpix.0 + dx - 1.0, self.crpix.1 + dy - 1.0))
    }

    /// Sky position of the image centre
    pub fn center(&self) -> (f64, f64) {
        self.pixel_to_sky(
            (self.naxis.0 as f64 - 1.0) / 2.0,
            (self.naxis.1 as f64 - 1.0) / 2.0,
        )
    }
}
