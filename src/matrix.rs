//! 2D affine transformations
//!
//! Uses the row vector convention of Cairo:
//!
//! ```text
//! x' = xx * x + xy * y + x0
//! y' = yx * x + yy * y + y0
//! ```

use crate::error::Error;

/// 2×3 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub xx: f32,
    pub yx: f32,
    pub xy: f32,
    pub yy: f32,
    pub x0: f32,
    pub y0: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(xx: f32, yx: f32, xy: f32, yy: f32, x0: f32, y0: f32) -> Self {
        Self { xx, yx, xy, yy, x0, y0 }
    }

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scaling(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    /// Returns `b ∘ a`, the transformation which applies `a` first and then `b`.
    pub fn multiply(a: &Self, b: &Self) -> Self {
        Self {
            xx: a.xx * b.xx + a.yx * b.xy,
            yx: a.xx * b.yx + a.yx * b.yy,
            xy: a.xy * b.xx + a.yy * b.xy,
            yy: a.xy * b.yx + a.yy * b.yy,
            x0: a.x0 * b.xx + a.y0 * b.xy + b.x0,
            y0: a.x0 * b.yx + a.y0 * b.yy + b.y0,
        }
    }

    /// Applies a translation before the current transformation.
    pub fn translate(&mut self, tx: f32, ty: f32) {
        *self = Self::multiply(&Self::translation(tx, ty), self);
    }

    /// Applies a scaling before the current transformation.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        *self = Self::multiply(&Self::scaling(sx, sy), self);
    }

    /// Applies a rotation before the current transformation.
    pub fn rotate(&mut self, radians: f32) {
        *self = Self::multiply(&Self::rotation(radians), self);
    }

    pub fn determinant(&self) -> f32 {
        self.xx * self.yy - self.yx * self.xy
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Inverts the matrix in place.
    ///
    /// Leaves the matrix unchanged if it is singular or its determinant is not finite.
    pub fn invert(&mut self) {
        if let Ok(inverse) = self.try_invert() {
            *self = inverse;
        }
    }

    /// Returns the inverse or [`Error::InvalidMatrix`].
    pub fn try_invert(&self) -> Result<Self, Error> {
        // Scale and translation only
        if self.xy == 0.0 && self.yx == 0.0 {
            let mut inverse = *self;
            inverse.x0 = -self.x0;
            inverse.y0 = -self.y0;
            if self.xx != 1.0 {
                if self.xx == 0.0 || !self.xx.is_finite() {
                    return Err(Error::InvalidMatrix);
                }
                inverse.xx = 1.0 / self.xx;
                inverse.x0 *= inverse.xx;
            }
            if self.yy != 1.0 {
                if self.yy == 0.0 || !self.yy.is_finite() {
                    return Err(Error::InvalidMatrix);
                }
                inverse.yy = 1.0 / self.yy;
                inverse.y0 *= inverse.yy;
            }
            return Ok(inverse);
        }
        let determinant = self.determinant();
        if determinant == 0.0 || !determinant.is_finite() {
            return Err(Error::InvalidMatrix);
        }
        let (a, b, c, d, tx, ty) = (self.xx, self.yx, self.xy, self.yy, self.x0, self.y0);
        let adjugate = Self::new(d, -b, -c, a, c * ty - d * tx, b * tx - a * ty);
        let scalar = 1.0 / determinant;
        Ok(Self::new(
            adjugate.xx * scalar,
            adjugate.yx * scalar,
            adjugate.xy * scalar,
            adjugate.yy * scalar,
            adjugate.x0 * scalar,
            adjugate.y0 * scalar,
        ))
    }

    /// Applies only the linear part, used for directions and lengths.
    pub fn transform_distance(&self, d: glam::Vec2) -> glam::Vec2 {
        glam::vec2(self.xx * d.x + self.xy * d.y, self.yx * d.x + self.yy * d.y)
    }

    pub fn transform_point(&self, p: glam::Vec2) -> glam::Vec2 {
        self.transform_distance(p) + glam::vec2(self.x0, self.y0)
    }

    /// Geometric mean of the scale factors, used to map radii.
    pub fn average_scale(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    /// Column major 4×4 representation as expected by shader uniforms.
    pub fn to_cols_array_4x4(&self) -> [[f32; 4]; 4] {
        [
            [self.xx, self.yx, 0.0, 0.0],
            [self.xy, self.yy, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [self.x0, self.y0, 0.0, 1.0],
        ]
    }
}

impl From<Matrix> for glam::Affine2 {
    fn from(m: Matrix) -> Self {
        glam::Affine2::from_cols(glam::vec2(m.xx, m.yx), glam::vec2(m.xy, m.yy), glam::vec2(m.x0, m.y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_matrix_eq(a: &Matrix, b: &Matrix) {
        for (x, y) in [a.xx, a.yx, a.xy, a.yy, a.x0, a.y0].iter().zip([b.xx, b.yx, b.xy, b.yy, b.x0, b.y0].iter()) {
            assert!((x - y).abs() < 1.0e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn inverse_round_trip() {
        let mut m = Matrix::rotation(0.7);
        m.scale(2.0, 3.0);
        m.translate(5.0, -4.0);
        let mut inverse = m;
        inverse.invert();
        assert_matrix_eq(&Matrix::multiply(&inverse, &m), &Matrix::IDENTITY);
        assert_matrix_eq(&Matrix::multiply(&m, &inverse), &Matrix::IDENTITY);
    }

    #[test]
    fn inverse_of_scale_and_translation() {
        let m = Matrix::new(4.0, 0.0, 0.0, 0.5, 8.0, 2.0);
        let inverse = m.try_invert().unwrap();
        assert_matrix_eq(&inverse, &Matrix::new(0.25, 0.0, 0.0, 2.0, -2.0, -4.0));
        let p = glam::vec2(3.0, 7.0);
        let q = inverse.transform_point(m.transform_point(p));
        assert!((p - q).length() < 1.0e-5);
    }

    #[test]
    fn singular_matrix_is_left_unchanged() {
        let singular = Matrix::new(1.0, 2.0, 2.0, 4.0, 3.0, 3.0);
        let mut m = singular;
        m.invert();
        assert_eq!(m, singular);
        assert_eq!(singular.try_invert(), Err(Error::InvalidMatrix));
        let mut zero_scale = Matrix::scaling(0.0, 1.0);
        zero_scale.invert();
        assert_eq!(zero_scale, Matrix::scaling(0.0, 1.0));
        let mut not_finite = Matrix::new(f32::INFINITY, 1.0, 1.0, 1.0, 0.0, 0.0);
        not_finite.invert();
        assert_eq!(not_finite.xx, f32::INFINITY);
    }

    #[test]
    fn operations_are_prepended() {
        let mut m = Matrix::translation(10.0, 0.0);
        m.scale(2.0, 2.0);
        assert_eq!(m.transform_point(glam::vec2(1.0, 1.0)), glam::vec2(12.0, 2.0));
        assert_eq!(m.transform_distance(glam::vec2(1.0, 1.0)), glam::vec2(2.0, 2.0));
        let r = Matrix::rotation(std::f32::consts::FRAC_PI_2);
        let p = r.transform_point(glam::vec2(1.0, 0.0));
        assert!((p - glam::vec2(0.0, 1.0)).length() < 1.0e-6);
    }

    #[test]
    fn affine_conversion() {
        let mut m = Matrix::rotation(0.3);
        m.translate(1.0, 2.0);
        let affine: glam::Affine2 = m.into();
        let p = glam::vec2(-3.0, 4.0);
        assert!((affine.transform_point2(p) - m.transform_point(p)).length() < 1.0e-5);
    }
}
