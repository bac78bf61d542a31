//! Paint sources

use crate::matrix::Matrix;

/// Gradients keep at most this many color stops.
pub const MAX_COLOR_STOPS: usize = 16;

/// Straight (not premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// How a gradient is continued outside of the range between its control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extend {
    /// Transparent outside
    None,
    Repeat,
    Reflect,
    /// Continues the first and last color
    Pad,
}

impl Default for Extend {
    fn default() -> Self {
        Extend::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Control points and color stops shared by linear and radial gradients.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gradient {
    /// Start point, or center of the start circle
    pub start: glam::Vec2,
    /// End point, or center of the end circle
    pub end: glam::Vec2,
    /// Radii of the start and end circle, zero for linear gradients
    pub radii: glam::Vec2,
    pub extend: Extend,
    stops: Vec<ColorStop>,
}

impl Gradient {
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Inserts the stop after all stops with a smaller or equal offset.
    fn add_color_stop(&mut self, offset: f32, color: Color) {
        if self.stops.len() >= MAX_COLOR_STOPS {
            log::warn!("gradient already has {} color stops, ignoring stop at {}", MAX_COLOR_STOPS, offset);
            return;
        }
        let offset = offset.clamp(0.0, 1.0);
        let index = self.stops.iter().position(|stop| stop.offset > offset).unwrap_or_else(|| self.stops.len());
        self.stops.insert(index, ColorStop { offset, color });
    }
}

/// Source of the color of filled and stroked geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Solid(Color),
    Linear(Gradient),
    Radial(Gradient),
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Solid(Color::BLACK)
    }
}

impl Pattern {
    pub fn solid(color: Color) -> Self {
        Pattern::Solid(color)
    }

    /// Gradient along the line from `start` to `end`.
    pub fn linear(start: glam::Vec2, end: glam::Vec2) -> Self {
        Pattern::Linear(Gradient {
            start,
            end,
            ..Gradient::default()
        })
    }

    /// Gradient between the circle around `start` and the circle around `end`.
    pub fn radial(start: glam::Vec2, start_radius: f32, end: glam::Vec2, end_radius: f32) -> Self {
        Pattern::Radial(Gradient {
            start,
            end,
            radii: glam::vec2(start_radius, end_radius),
            ..Gradient::default()
        })
    }

    pub fn gradient(&self) -> Option<&Gradient> {
        match self {
            Pattern::Solid(_) => None,
            Pattern::Linear(gradient) | Pattern::Radial(gradient) => Some(gradient),
        }
    }

    fn gradient_mut(&mut self) -> Option<&mut Gradient> {
        match self {
            Pattern::Solid(_) => None,
            Pattern::Linear(gradient) | Pattern::Radial(gradient) => Some(gradient),
        }
    }

    /// Adds a color stop to a gradient, does nothing for solid patterns.
    pub fn add_color_stop(&mut self, offset: f32, color: Color) {
        if let Some(gradient) = self.gradient_mut() {
            gradient.add_color_stop(offset, color);
        }
    }

    pub fn set_extend(&mut self, extend: Extend) {
        if let Some(gradient) = self.gradient_mut() {
            gradient.extend = extend;
        }
    }

    pub fn extend(&self) -> Extend {
        self.gradient().map(|gradient| gradient.extend).unwrap_or_default()
    }

    /// Maps the control points from user space to device space.
    ///
    /// Radii are scaled by the average scale factor of the matrix.
    pub fn transformed(&self, matrix: &Matrix) -> Self {
        let mut pattern = self.clone();
        if let Some(gradient) = pattern.gradient_mut() {
            gradient.start = matrix.transform_point(gradient.start);
            gradient.end = matrix.transform_point(gradient.end);
            gradient.radii *= matrix.average_scale();
        }
        pattern
    }
}
