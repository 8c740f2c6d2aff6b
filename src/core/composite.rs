use crate::types::{Channel, CompositeError, CompositeRaster, CompositeResult};
use ndarray::{ArrayView2, Axis};

/// Stacks stretched channels into one (height, width, channels) raster
pub struct Compositor;

impl Compositor {
    /// Check that every channel, the first included, has the reference grid shape
    pub fn check_shapes(channels: &[Channel], expected: (usize, usize)) -> CompositeResult<()> {
        if channels.is_empty() {
            return Err(CompositeError::Config("no channels to composite".to_string()));
        }

        for (index, channel) in channels.iter().enumerate() {
            if channel.shape() != expected {
                return Err(CompositeError::ShapeMismatch {
                    channel: index,
                    expected,
                    found: channel.shape(),
                });
            }
        }

        Ok(())
    }

    /// Stack channels along a new trailing axis, keeping their order
    pub fn stack(channels: &[Channel], expected: (usize, usize)) -> CompositeResult<CompositeRaster> {
        Self::check_shapes(channels, expected)?;
        let (height, width) = expected;
        log::info!(
            "Stacking {} channel(s) into a {}x{}x{} raster",
            channels.len(),
            height,
            width,
            channels.len()
        );

        let views: Vec<ArrayView2<'_, u16>> = channels.iter().map(|c| c.data.view()).collect();
        let data = ndarray::stack(Axis(2), &views)
            .map_err(|e| CompositeError::InvalidFormat(format!("Failed to stack channels: {}", e)))?;

        let names = channels.iter().map(|c| c.identity.clone()).collect();
        Ok(CompositeRaster::new(data, names))
    }
}
