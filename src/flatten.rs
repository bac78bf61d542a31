//! Approximation of cubic bezier curves by line segments

use crate::{error::Error, utils::point_segment_distance};

/// Subdivision stops at this depth even if the flatness tolerance is not met.
pub const MAX_RECURSION_DEPTH: u32 = 16;

macro_rules! split_curve_at_half {
    ($control_points:expr) => {{
        let p10 = $control_points[0].lerp($control_points[1], 0.5);
        let p11 = $control_points[1].lerp($control_points[2], 0.5);
        let p12 = $control_points[2].lerp($control_points[3], 0.5);
        let p20 = p10.lerp(p11, 0.5);
        let p21 = p11.lerp(p12, 0.5);
        let p30 = p20.lerp(p21, 0.5);
        ([$control_points[0], p10, p20, p30], [p30, p21, p12, $control_points[3]])
    }};
}

fn is_flat(control_points: &[glam::Vec2; 4], tolerance: f32) -> bool {
    let d1 = point_segment_distance(control_points[1], control_points[0], control_points[3]);
    let d2 = point_segment_distance(control_points[2], control_points[0], control_points[3]);
    d1.max(d2) <= tolerance
}

fn subdivide(control_points: &[glam::Vec2; 4], tolerance: f32, depth: u32, output: &mut Vec<glam::Vec2>) -> Result<(), Error> {
    if depth >= MAX_RECURSION_DEPTH || is_flat(control_points, tolerance) {
        return Ok(());
    }
    let (a, b) = split_curve_at_half!(control_points);
    subdivide(&a, tolerance, depth + 1, output)?;
    output.try_reserve(1)?;
    output.push(a[3]);
    subdivide(&b, tolerance, depth + 1, output)
}

/// Appends the on-curve points approximating a cubic bezier curve to `output`.
///
/// Neither the start point nor the end point are emitted.
/// The caller appends the exact end point so that the following segments connect seamlessly.
/// Every chord between two consecutive points deviates less than `tolerance` from the curve,
/// unless the recursion depth limit was hit on degenerate input.
/// Fails with [Error::OutOfMemory] if `output` can not grow, keeping the points appended so far.
pub fn flatten_cubic(control_points: [glam::Vec2; 4], tolerance: f32, output: &mut Vec<glam::Vec2>) -> Result<(), Error> {
    subdivide(&control_points, tolerance.max(f32::EPSILON), 0, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic_point(control_points: &[glam::Vec2; 4], t: f32) -> glam::Vec2 {
        let s = 1.0 - t;
        control_points[0] * (s * s * s) + control_points[1] * (3.0 * s * s * t) + control_points[2] * (3.0 * s * t * t) + control_points[3] * (t * t * t)
    }

    fn max_deviation(control_points: &[glam::Vec2; 4], polyline: &[glam::Vec2]) -> f32 {
        let mut max_deviation: f32 = 0.0;
        for i in 0..=1000 {
            let p = cubic_point(control_points, i as f32 / 1000.0);
            let mut min_distance = f32::MAX;
            for segment in polyline.windows(2) {
                let d = segment[1] - segment[0];
                let t = if d.length_squared() > 0.0 {
                    ((p - segment[0]).dot(d) / d.length_squared()).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                min_distance = min_distance.min(p.distance(segment[0] + d * t));
            }
            max_deviation = max_deviation.max(min_distance);
        }
        max_deviation
    }

    #[test]
    fn stays_within_tolerance() {
        let tolerance = 0.25;
        for control_points in [
            [glam::vec2(0.0, 0.0), glam::vec2(30.0, 100.0), glam::vec2(70.0, -100.0), glam::vec2(100.0, 0.0)],
            [glam::vec2(10.0, 10.0), glam::vec2(200.0, 10.0), glam::vec2(10.0, 200.0), glam::vec2(200.0, 200.0)],
            [glam::vec2(0.0, 0.0), glam::vec2(100.0, 100.0), glam::vec2(0.0, 100.0), glam::vec2(100.0, 0.0)],
        ]
        .iter()
        {
            let mut polyline = vec![control_points[0]];
            flatten_cubic(*control_points, tolerance, &mut polyline).unwrap();
            polyline.push(control_points[3]);
            assert!(polyline.len() > 2);
            assert!(max_deviation(control_points, &polyline) <= tolerance * 1.01);
        }
    }

    #[test]
    fn omits_start_and_end() {
        let control_points = [glam::vec2(0.0, 0.0), glam::vec2(0.0, 50.0), glam::vec2(50.0, 50.0), glam::vec2(50.0, 0.0)];
        let mut points = Vec::new();
        flatten_cubic(control_points, 0.1, &mut points).unwrap();
        assert!(!points.is_empty());
        assert_ne!(points[0], control_points[0]);
        assert_ne!(*points.last().unwrap(), control_points[3]);
    }

    #[test]
    fn straight_curve_needs_no_points() {
        let mut points = Vec::new();
        flatten_cubic(
            [glam::vec2(0.0, 0.0), glam::vec2(1.0, 0.0), glam::vec2(2.0, 0.0), glam::vec2(3.0, 0.0)],
            0.25,
            &mut points,
        )
        .unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn degenerate_input_terminates() {
        let mut points = Vec::new();
        flatten_cubic(
            [glam::vec2(0.0, 0.0), glam::vec2(1.0e30, -1.0e30), glam::vec2(-1.0e30, 1.0e30), glam::vec2(0.0, 0.0)],
            0.0,
            &mut points,
        )
        .unwrap();
        assert!(points.len() < 1 << MAX_RECURSION_DEPTH);
    }
}
