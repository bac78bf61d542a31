/// Transmutes a slice.
pub fn transmute_slice<S, T>(slice: &[S]) -> &[T] {
    let ptr = slice.as_ptr() as *const T;
    let len = slice.len() * std::mem::size_of::<S>() / std::mem::size_of::<T>();
    unsafe { std::slice::from_raw_parts(ptr, len) }
}

/// Rotates a `glam::Vec2` 90° clockwise.
pub fn rotate_90_degree_clockwise(v: glam::Vec2) -> glam::Vec2 {
    glam::vec2(v[1], -v[0])
}

/// Returns the unit direction of the line from `a` to `b`, computed in double precision.
///
/// The caller guarantees `a != b`, otherwise the result is NaN.
pub fn line_norm_f64(a: glam::DVec2, b: glam::DVec2) -> glam::DVec2 {
    let d = b - a;
    d / d.length()
}

/// Returns the intersection point of two 2D lines (origin, direction).
pub fn line_line_intersection(line_a: (glam::Vec2, glam::Vec2), line_b: (glam::Vec2, glam::Vec2)) -> glam::Vec2 {
    let param_a = glam::Mat2::from_cols(line_b.0 - line_a.0, line_b.1).determinant() / glam::Mat2::from_cols(line_a.1, line_b.1).determinant();
    line_a.0 + line_a.1 * param_a
}

/// Returns double the area of a triangle defined by the three given points.
///
/// Positive if the points are in counter clockwise order (y axis pointing up).
pub fn signed_triangle_area(t: &[glam::Vec2]) -> f32 {
    glam::Mat2::from_cols(t[0] - t[2], t[1] - t[2]).determinant()
}

/// Returns double the signed area of a closed polygon (shoelace formula).
pub fn signed_polygon_area(polygon: &[glam::Vec2]) -> f32 {
    let mut area = 0.0;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        area += a.perp_dot(b);
    }
    area
}

/// Distance of `point` to the line segment from `a` to `b`.
pub fn point_segment_distance(point: glam::Vec2, a: glam::Vec2, b: glam::Vec2) -> f32 {
    let d = b - a;
    let length_squared = d.length_squared();
    if length_squared <= crate::error::ERROR_MARGIN * crate::error::ERROR_MARGIN {
        return point.distance(a);
    }
    let t = ((point - a).dot(d) / length_squared).clamp(0.0, 1.0);
    point.distance(a + d * t)
}

/// Returns true if `p` lies inside or on the border of the triangle `(a, b, c)`.
pub fn point_in_triangle(p: glam::Vec2, a: glam::Vec2, b: glam::Vec2, c: glam::Vec2) -> bool {
    let d0 = (b - a).perp_dot(p - a);
    let d1 = (c - b).perp_dot(p - b);
    let d2 = (a - c).perp_dot(p - c);
    (d0 >= 0.0 && d1 >= 0.0 && d2 >= 0.0) || (d0 <= 0.0 && d1 <= 0.0 && d2 <= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_and_norm() {
        let n = line_norm_f64(glam::dvec2(1.0, 1.0), glam::dvec2(4.0, 5.0));
        assert!((n - glam::dvec2(0.6, 0.8)).length() < 1.0e-12);
        assert_eq!(rotate_90_degree_clockwise(glam::vec2(1.0, 0.0)), glam::vec2(0.0, -1.0));
        let n = line_norm_f64(glam::dvec2(0.0, 0.0), glam::dvec2(0.0, -3.0)).as_vec2();
        assert_eq!(rotate_90_degree_clockwise(n), glam::vec2(-1.0, 0.0));
    }

    #[test]
    fn areas() {
        let square = [glam::vec2(0.0, 0.0), glam::vec2(2.0, 0.0), glam::vec2(2.0, 2.0), glam::vec2(0.0, 2.0)];
        assert_eq!(signed_polygon_area(&square), 8.0);
        assert_eq!(signed_triangle_area(&square[0..3]), 4.0);
        let intersection = line_line_intersection(
            (glam::vec2(0.0, 1.0), glam::vec2(1.0, 0.0)),
            (glam::vec2(3.0, 0.0), glam::vec2(0.0, 1.0)),
        );
        assert_eq!(intersection, glam::vec2(3.0, 1.0));
    }

    #[test]
    fn distances() {
        assert_eq!(point_segment_distance(glam::vec2(1.0, 2.0), glam::vec2(0.0, 0.0), glam::vec2(5.0, 0.0)), 2.0);
        assert_eq!(point_segment_distance(glam::vec2(8.0, 4.0), glam::vec2(0.0, 0.0), glam::vec2(5.0, 0.0)), 5.0);
        assert_eq!(point_segment_distance(glam::vec2(3.0, 4.0), glam::vec2(0.0, 0.0), glam::vec2(0.0, 0.0)), 5.0);
        assert!(point_in_triangle(
            glam::vec2(1.0, 1.0),
            glam::vec2(0.0, 0.0),
            glam::vec2(4.0, 0.0),
            glam::vec2(0.0, 4.0)
        ));
        assert!(!point_in_triangle(
            glam::vec2(3.0, 3.0),
            glam::vec2(0.0, 0.0),
            glam::vec2(4.0, 0.0),
            glam::vec2(0.0, 4.0)
        ));
    }
}
