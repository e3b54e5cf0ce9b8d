//! Pixel queries over rendered node outputs.

use image::RgbaImage;

use super::TextureGraph;
use crate::{Error, Result, SampleError, node::NodeId};

/// Pixel position as `(x, y)`, origin top-left
pub type Position = (u32, u32);

fn colour_at(image: &RgbaImage, (x, y): Position) -> std::result::Result<[f32; 4], SampleError> {
    let (width, height) = image.dimensions();
    if x >= width || y >= height {
        tracing::warn!(x, y, width, height, "sample position out of bounds");
        return Err(SampleError::OutOfBounds { x, y, width, height });
    }
    Ok(image.get_pixel(x, y).0.map(|channel| channel as f32 / 255.0))
}

impl TextureGraph {
    /// Evaluates a node and reads its pixels back
    ///
    /// # Returns
    /// `None` when the node cannot produce output
    pub fn image(&mut self, id: NodeId) -> Result<Option<RgbaImage>> {
        match self.output(id)? {
            Some(texture) => self.context.read_pixels(texture).map(Some),
            None => Ok(None),
        }
    }

    fn rendered(&mut self, id: NodeId) -> Result<RgbaImage> {
        self.image(id)?.ok_or(Error::NotEvaluable(id))
    }

    /// RGBA values in `[0, 1]` at each position
    ///
    /// # Arguments
    /// * `id` - Node to evaluate and sample
    /// * `positions` - Pixel positions; out-of-bounds entries fail individually
    ///
    /// # Returns
    /// One entry per position, in order
    ///
    /// # Errors
    /// [`Error::NotEvaluable`] when the node cannot produce output, plus any evaluation error
    pub fn colour_values_at(&mut self, id: NodeId, positions: &[Position]) -> Result<Vec<std::result::Result<[f32; 4], SampleError>>> {
        let image = self.rendered(id)?;
        Ok(positions.iter().map(|&position| colour_at(&image, position)).collect())
    }

    /// Greyscale (red channel) values in `[0, 1]` at each position
    pub fn greyscale_values_at(&mut self, id: NodeId, positions: &[Position]) -> Result<Vec<std::result::Result<f32, SampleError>>> {
        let image = self.rendered(id)?;
        Ok(positions.iter().map(|&position| colour_at(&image, position).map(|colour| colour[0])).collect())
    }

    /// Every pixel position of the node's output size, row by row
    pub fn all_positions(&self, id: NodeId) -> Result<Vec<Position>> {
        let (width, height) = self.size(id)?;
        Ok((0..height).flat_map(|y| (0..width).map(move |x| (x, y))).collect())
    }
}
