//! Interface to the rasterizing backend

use crate::{error::Error, matrix::Matrix, pattern::Pattern, vertex::VertexBatch};

/// Everything besides the geometry which is needed to draw a batch.
///
/// Vertices are in user space and mapped to device space by `matrix`.
/// The control points of gradients are already in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    /// Width and height of the target surface in pixels
    pub surface_size: glam::Vec2,
    pub matrix: Matrix,
    pub inverse: Matrix,
    pub source: Pattern,
    /// Number of clip layers a pixel must be covered by to be drawn
    pub clip_depth: u32,
}

impl DrawState {
    /// Maps a user space position to normalized device coordinates (y pointing up).
    pub fn to_clip_space(&self, position: glam::Vec2) -> glam::Vec2 {
        let device = self.matrix.transform_point(position);
        glam::vec2(2.0 * device.x / self.surface_size.x - 1.0, 1.0 - 2.0 * device.y / self.surface_size.y)
    }
}

/// Consumes batches of triangles.
///
/// The clip region is a stack of layers.
/// A pixel is inside the clip region at depth `d` if it is covered by the first `d` layers.
pub trait Renderer {
    /// Draws the triangle list of `batch` inside the clip region at `state.clip_depth`
    /// and blocks until the backend no longer needs the buffers.
    fn submit(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error>;

    /// Pushes the area covered by `batch` as the layer above `state.clip_depth`.
    fn clip(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error>;

    /// Pops every clip layer above `depth`, a depth of zero removes all clipping.
    fn reset_clip(&mut self, depth: u32) -> Result<(), Error>;

    /// Makes every pixel inside the clip region at `state.clip_depth` transparent.
    fn clear(&mut self, state: &DrawState) -> Result<(), Error>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn submit(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
        (**self).submit(batch, state)
    }

    fn clip(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
        (**self).clip(batch, state)
    }

    fn reset_clip(&mut self, depth: u32) -> Result<(), Error> {
        (**self).reset_clip(depth)
    }

    fn clear(&mut self, state: &DrawState) -> Result<(), Error> {
        (**self).clear(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_space() {
        let state = DrawState {
            surface_size: glam::vec2(200.0, 100.0),
            matrix: Matrix::translation(50.0, 25.0),
            inverse: Matrix::translation(-50.0, -25.0),
            source: Pattern::default(),
            clip_depth: 0,
        };
        assert_eq!(state.to_clip_space(glam::vec2(-50.0, -25.0)), glam::vec2(-1.0, 1.0));
        assert_eq!(state.to_clip_space(glam::vec2(50.0, 25.0)), glam::vec2(0.0, 0.0));
        assert_eq!(state.to_clip_space(glam::vec2(150.0, 75.0)), glam::vec2(1.0, -1.0));
    }
}
