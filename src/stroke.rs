//! Triangulation of stroked subpaths
//!
//! Every segment becomes a quad between two pairs of vertices offset by half the line width to either side.
//! Consecutive quads share the pairs emitted by the [Join] between them,
//! open subpaths get a [Cap] at both ends and closed ones are stitched together at their first point.

use crate::{
    error::{Error, ERROR_MARGIN},
    utils::{line_line_intersection, line_norm_f64, rotate_90_degree_clockwise},
    vertex::VertexBatch,
};
use std::f32::consts::{FRAC_PI_2, PI};

/// Defines what geometry is generated at the ends of open subpaths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cap {
    /// Ends exactly at the end point
    Butt,
    /// Half circle centered at the end point
    Round,
    /// Extends the line by half its width beyond the end point
    Square,
}

impl Default for Cap {
    fn default() -> Self {
        Cap::Butt
    }
}

/// Defines what geometry is generated where two segments meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// Extends the outer edges until they meet, falls back to [Join::Bevel] beyond the miter limit
    Miter,
    /// Circular arc around the shared point
    Round,
    /// Cuts the corner between the two outer edges
    Bevel,
}

impl Default for Join {
    fn default() -> Self {
        Join::Miter
    }
}

/// Defines the geometry generated by a stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeOptions {
    /// Distance between the left and right edge of the ribbon
    pub width: f32,
    pub cap: Cap,
    pub join: Join,
    /// Longest allowed ratio of miter length to line width
    pub miter_limit: f32,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: Cap::default(),
            join: Join::default(),
            miter_limit: 10.0,
        }
    }
}

type Pair = [u32; 2];

struct StrokeBuilder<'a> {
    options: &'a StrokeOptions,
    half_width: f32,
    angle_step: f32,
    batch: &'a mut VertexBatch,
}

impl<'a> StrokeBuilder<'a> {
    fn emit_pair(&mut self, point: glam::Vec2, normal: glam::Vec2) -> Pair {
        let offset = normal * self.half_width;
        [self.batch.push_vertex(point + offset), self.batch.push_vertex(point - offset)]
    }

    /// Triangle fan around `center` from the vertex `start` to the vertex `end`, turning by `sweep` radians.
    fn emit_fan(&mut self, hub: u32, center: glam::Vec2, start: u32, end: u32, sweep: f32) {
        let steps = (sweep.abs() / self.angle_step).ceil().max(1.0) as u32;
        let rotation = glam::Vec2::from_angle(sweep / steps as f32);
        let mut radius = self.batch.vertices[start as usize].position - center;
        let mut previous = start;
        for _ in 1..steps {
            radius = rotation.rotate(radius);
            let next = self.batch.push_vertex(center + radius);
            self.batch.push_triangle(hub, previous, next);
            previous = next;
        }
        self.batch.push_triangle(hub, previous, end);
    }

    /// Emits the pair at an end point of an open subpath, `direction` points away from the subpath.
    fn emit_cap(&mut self, point: glam::Vec2, direction: glam::Vec2, at_start: bool) -> Pair {
        let normal = rotate_90_degree_clockwise(if at_start { -direction } else { direction });
        match self.options.cap {
            Cap::Butt => self.emit_pair(point, normal),
            Cap::Square => self.emit_pair(point + direction * self.half_width, normal),
            Cap::Round => {
                let pair = self.emit_pair(point, normal);
                let center = self.batch.push_vertex(point);
                // Half turn across the tip
                self.emit_fan(center, point, pair[0], pair[1], if at_start { -PI } else { PI });
                pair
            }
        }
    }

    /// Emits the geometry where the segment along `incoming` meets the segment along `outgoing`.
    ///
    /// Returns the pair ending the incoming ribbon and the pair starting the outgoing ribbon.
    fn emit_join(&mut self, point: glam::Vec2, incoming: glam::Vec2, outgoing: glam::Vec2) -> (Pair, Pair) {
        let incoming_normal = rotate_90_degree_clockwise(incoming);
        let outgoing_normal = rotate_90_degree_clockwise(outgoing);
        let cross = incoming.perp_dot(outgoing);
        if cross.abs() <= ERROR_MARGIN && incoming.dot(outgoing) > 0.0 {
            let pair = self.emit_pair(point, incoming_normal);
            return (pair, pair);
        }
        let side = if cross > 0.0 { 1.0 } else { -1.0 };
        let bisector = (incoming_normal + outgoing_normal).normalize_or_zero();
        let cos_half_angle = bisector.dot(incoming_normal);
        let inner_point = if cos_half_angle > ERROR_MARGIN {
            point - bisector * side * self.half_width / cos_half_angle
        } else {
            point
        };
        let outer_pair = |outer: u32, inner: u32| if side > 0.0 { [outer, inner] } else { [inner, outer] };
        if self.options.join == Join::Miter && cos_half_angle > ERROR_MARGIN && 1.0 / cos_half_angle <= self.options.miter_limit {
            let miter = line_line_intersection(
                (point + incoming_normal * side * self.half_width, incoming),
                (point + outgoing_normal * side * self.half_width, outgoing),
            );
            let outer = self.batch.push_vertex(miter);
            let inner = self.batch.push_vertex(inner_point);
            let pair = outer_pair(outer, inner);
            return (pair, pair);
        }
        let inner = self.batch.push_vertex(inner_point);
        let outer_a = self.batch.push_vertex(point + incoming_normal * side * self.half_width);
        let outer_b = self.batch.push_vertex(point + outgoing_normal * side * self.half_width);
        if self.options.join == Join::Round {
            let sweep = incoming.perp_dot(outgoing).atan2(incoming.dot(outgoing));
            self.emit_fan(inner, point, outer_a, outer_b, sweep);
        } else {
            self.batch.push_triangle(inner, outer_a, outer_b);
        }
        (outer_pair(outer_a, inner), outer_pair(outer_b, inner))
    }
}

/// Emits the ribbon of a polyline into `batch`.
///
/// Consecutive duplicate points are skipped, a polyline which collapses to a single point emits nothing.
/// Closed polylines with less than three distinct points are stroked as open polylines.
pub fn stroke_polyline(points: &[glam::Vec2], closed: bool, options: &StrokeOptions, batch: &mut VertexBatch) -> Result<(), Error> {
    if !(options.width > 0.0) {
        return Ok(());
    }
    let mut cleaned = Vec::new();
    cleaned.try_reserve(points.len())?;
    cleaned.extend_from_slice(points);
    let mut points = cleaned;
    points.dedup();
    if closed {
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
    }
    if points.len() < 2 {
        log::debug!("skipping stroke of subpath without length");
        return Ok(());
    }
    let closed = closed && points.len() > 2;
    let half_width = 0.5 * options.width;
    let angle_step = FRAC_PI_2 / half_width;
    // Fans turn by at most half a circle, only round joins and round caps emit them
    let fan_steps = ((PI / angle_step).ceil() as usize).saturating_add(1);
    let join_triangles = if options.join == Join::Round { fan_steps } else { 1 };
    let cap_triangles = if options.cap == Cap::Round && !closed { fan_steps } else { 0 };
    let vertex_count = points
        .len()
        .saturating_mul(join_triangles.saturating_add(3))
        .saturating_add(cap_triangles.saturating_add(3).saturating_mul(2));
    let index_count = points
        .len()
        .saturating_mul(join_triangles.saturating_add(2))
        .saturating_add(cap_triangles.saturating_mul(2))
        .saturating_mul(3);
    batch.reserve(vertex_count, index_count)?;
    let mut builder = StrokeBuilder {
        options,
        half_width,
        angle_step,
        batch,
    };
    let segment_count = if closed { points.len() } else { points.len() - 1 };
    let mut directions: Vec<glam::Vec2> = Vec::new();
    directions.try_reserve(segment_count)?;
    directions.extend((0..segment_count).map(|i| line_norm_f64(points[i].as_dvec2(), points[(i + 1) % points.len()].as_dvec2()).as_vec2()));
    if closed {
        // The pair starting the first ribbon is only known after the last join, patched in afterwards
        let mut seam = None;
        let mut previous = [0, 0];
        for i in 1..=segment_count {
            let (end, start) = builder.emit_join(points[i % points.len()], directions[i - 1], directions[i % segment_count]);
            if seam.is_none() {
                seam = Some(builder.batch.indices.len());
            }
            builder.batch.push_quad(previous, end);
            previous = start;
        }
        if let Some(seam) = seam {
            builder.batch.patch_index(seam, previous[0]);
            builder.batch.patch_index(seam + 2, previous[1]);
            builder.batch.patch_index(seam + 3, previous[1]);
        }
    } else {
        let mut previous = builder.emit_cap(points[0], -directions[0], true);
        for i in 1..segment_count {
            let (end, start) = builder.emit_join(points[i], directions[i - 1], directions[i]);
            builder.batch.push_quad(previous, end);
            previous = start;
        }
        let end = builder.emit_cap(points[segment_count], directions[segment_count - 1], false);
        builder.batch.push_quad(previous, end);
    }
    Ok(())
}
