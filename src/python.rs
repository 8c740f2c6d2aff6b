//! Python bindings, built with the `python` feature

use crate::core::normalize::ChannelNormalizer;
use crate::core::pipeline::CompositePipeline;
use crate::io::config::PipelineConfig;
use crate::io::fits::FitsLoader;
use crate::types::StretchParameters;
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Stretch a 2D float array into uint16 with black/white fractions of its range
#[pyfunction]
#[pyo3(signature = (pixels, black = 0.0, white = 1.0))]
fn normalize_channel(py: Python, pixels: PyReadonlyArray2<f32>, black: f64, white: f64) -> PyResult<PyObject> {
    if !black.is_finite() || !white.is_finite() {
        return Err(PyValueError::new_err("black and white fractions must be finite"));
    }

    let input_array = pixels.as_array().to_owned();
    let channel = ChannelNormalizer::new().normalize("array", input_array.view(), &StretchParameters::new(black, white));

    Ok(channel.to_pyarray(py).into())
}

/// Load the science image of a FITS file
#[pyfunction]
fn load_fits(py: Python, path: String) -> PyResult<PyObject> {
    let band = FitsLoader::new()
        .load_band(&path)
        .map_err(|e| PyValueError::new_err(format!("Failed to load {}: {}", path, e)))?;

    let result = PyDict::new(py);
    result.set_item("identity", band.identity())?;
    result.set_item("data", band.pixels().to_pyarray(py))?;
    result.set_item("rows", band.shape().0)?;
    result.set_item("cols", band.shape().1)?;
    result.set_item("pixel_scale_arcsec", band.wcs().pixel_scale_arcsec())?;
    result.set_item("center", band.wcs().center())?;

    Ok(result.into())
}

/// Run a pipeline XML configuration; returns the written file paths
#[pyfunction]
fn run_config(path: String) -> PyResult<Vec<String>> {
    let config = PipelineConfig::from_file(&path)
        .map_err(|e| PyValueError::new_err(format!("{}", e)))?;

    let output = CompositePipeline::run_config(&config)
        .map_err(|e| PyRuntimeError::new_err(format!("Pipeline failed: {}", e)))?;

    let written = output
        .written()
        .into_iter()
        .map(|p| p.display().to_string())
        .collect();
    Ok(written)
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalize_channel, m)?)?;
    m.add_function(wrap_pyfunction!(load_fits, m)?)?;
    m.add_function(wrap_pyfunction!(run_config, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
