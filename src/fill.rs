//! Triangulation of filled subpaths
//!
//! Every subpath is filled on its own and treated as a closed polygon.
//! Simple polygons are ear clipped over their own vertices.
//! Self-intersecting or self-touching polygons are cut into horizontal slabs at every vertex and every edge crossing,
//! within a slab the edges do not cross, so the spans between neighboring edges are trapezoids
//! which are emitted whenever the accumulated winding number is inside according to the [FillRule].

use crate::{
    error::Error,
    path::Path,
    utils::{point_in_triangle, signed_polygon_area, signed_triangle_area},
    vertex::VertexBatch,
};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// Inside if an odd number of edges is crossed
    EvenOdd,
    /// Inside if the edges crossed do not cancel out
    NonZero,
}

impl Default for FillRule {
    fn default() -> Self {
        FillRule::NonZero
    }
}

impl FillRule {
    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::EvenOdd => winding % 2 != 0,
            FillRule::NonZero => winding != 0,
        }
    }
}

/// Removes consecutive duplicates, including the ones across the closing edge.
fn clean_polygon(points: &[glam::Vec2]) -> Result<Vec<glam::Vec2>, Error> {
    let mut polygon: Vec<glam::Vec2> = Vec::new();
    polygon.try_reserve(points.len())?;
    for point in points {
        if polygon.last() != Some(point) {
            polygon.push(*point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    Ok(polygon)
}

fn orientation(a: glam::Vec2, b: glam::Vec2, c: glam::Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

fn within_bounds(p: glam::Vec2, a: glam::Vec2, b: glam::Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// True if the segments `(a, b)` and `(c, d)` cross or touch.
fn segments_touch(a: glam::Vec2, b: glam::Vec2, c: glam::Vec2, d: glam::Vec2) -> bool {
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    (d1 == 0.0 && within_bounds(a, c, d))
        || (d2 == 0.0 && within_bounds(b, c, d))
        || (d3 == 0.0 && within_bounds(c, a, b))
        || (d4 == 0.0 && within_bounds(d, a, b))
}

/// True if no two non-adjacent edges of the closed polygon touch and no two adjacent edges fold back onto each other.
pub fn is_simple_polygon(polygon: &[glam::Vec2]) -> bool {
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let c = polygon[(i + 2) % n];
        if (b - a).perp_dot(c - b) == 0.0 && (b - a).dot(c - b) < 0.0 {
            return false;
        }
        for j in i + 2..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_touch(a, b, polygon[j], polygon[(j + 1) % n]) {
                return false;
            }
        }
    }
    true
}

fn ear_clip(polygon: &[glam::Vec2], polygon_orientation: f32, batch: &mut VertexBatch) -> Result<(), Error> {
    let mut remaining: Vec<usize> = Vec::new();
    remaining.try_reserve(polygon.len())?;
    remaining.extend(0..polygon.len());
    let first_index = batch.next_index();
    for point in polygon {
        batch.push_vertex(*point);
    }
    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count).find(|&i| {
            let prev = remaining[(i + count - 1) % count];
            let curr = remaining[i];
            let next = remaining[(i + 1) % count];
            let (a, b, c) = (polygon[prev], polygon[curr], polygon[next]);
            if signed_triangle_area(&[a, b, c]) * polygon_orientation <= 0.0 {
                return false;
            }
            !remaining
                .iter()
                .any(|&j| j != prev && j != curr && j != next && point_in_triangle(polygon[j], a, b, c))
        });
        match ear {
            Some(i) => {
                let prev = remaining[(i + count - 1) % count];
                let next = remaining[(i + 1) % count];
                batch.push_triangle(first_index + prev as u32, first_index + remaining[i] as u32, first_index + next as u32);
                remaining.remove(i);
            }
            None => {
                log::debug!("no ear left in {} remaining vertices, using a fan", count);
                break;
            }
        }
    }
    for i in 1..remaining.len() - 1 {
        batch.push_triangle(
            first_index + remaining[0] as u32,
            first_index + remaining[i] as u32,
            first_index + remaining[i + 1] as u32,
        );
    }
    Ok(())
}

/// Non horizontal polygon edge, ordered from top (smaller y) to bottom.
struct Edge {
    top: glam::Vec2,
    bottom: glam::Vec2,
    winding: i32,
}

impl Edge {
    fn x_at(&self, y: f32) -> f32 {
        if y <= self.top.y {
            self.top.x
        } else if y >= self.bottom.y {
            self.bottom.x
        } else {
            self.top.x + (y - self.top.y) * (self.bottom.x - self.top.x) / (self.bottom.y - self.top.y)
        }
    }

    fn intersection_y(&self, other: &Edge) -> Option<f32> {
        let r = self.bottom - self.top;
        let s = other.bottom - other.top;
        let denominator = r.perp_dot(s);
        if denominator == 0.0 {
            return None;
        }
        let q = other.top - self.top;
        let t = q.perp_dot(s) / denominator;
        let u = q.perp_dot(r) / denominator;
        if t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0 {
            Some(self.top.y + r.y * t)
        } else {
            None
        }
    }
}

fn push_trapezoid(batch: &mut VertexBatch, left: &Edge, right: &Edge, y0: f32, y1: f32, polygon_orientation: f32) -> Result<(), Error> {
    let top_left = glam::vec2(left.x_at(y0), y0);
    let top_right = glam::vec2(right.x_at(y0), y0);
    let bottom_right = glam::vec2(right.x_at(y1), y1);
    let bottom_left = glam::vec2(left.x_at(y1), y1);
    let mut corners = [top_left; 4];
    let mut count = 1;
    for (corner, keep) in [
        (top_right, top_right.x > top_left.x),
        (bottom_right, true),
        (bottom_left, bottom_left.x < bottom_right.x),
    ]
    .iter()
    {
        if *keep {
            corners[count] = *corner;
            count += 1;
        }
    }
    if count < 3 {
        return Ok(());
    }
    let corners = &mut corners[0..count];
    if polygon_orientation < 0.0 {
        corners.reverse();
    }
    batch.reserve(count, (count - 2) * 3)?;
    let first_index = batch.next_index();
    for corner in corners.iter() {
        batch.push_vertex(*corner);
    }
    for i in 1..count as u32 - 1 {
        batch.push_triangle(first_index, first_index + i, first_index + i + 1);
    }
    Ok(())
}

fn trapezoidate(polygon: &[glam::Vec2], fill_rule: FillRule, polygon_orientation: f32, batch: &mut VertexBatch) -> Result<(), Error> {
    let n = polygon.len();
    let mut edges: Vec<Edge> = Vec::new();
    edges.try_reserve(n)?;
    edges.extend((0..n).filter_map(|i| {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        match a.y.partial_cmp(&b.y) {
            Some(Ordering::Less) => Some(Edge { top: a, bottom: b, winding: 1 }),
            Some(Ordering::Greater) => Some(Edge { top: b, bottom: a, winding: -1 }),
            _ => None,
        }
    }));
    let mut events: Vec<f32> = Vec::new();
    events.try_reserve(n)?;
    events.extend(polygon.iter().map(|point| point.y));
    for (i, edge) in edges.iter().enumerate() {
        for other in &edges[i + 1..] {
            if let Some(y) = edge.intersection_y(other) {
                events.try_reserve(1)?;
                events.push(y);
            }
        }
    }
    events.retain(|y| y.is_finite());
    events.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    events.dedup();
    let mut active: Vec<(f32, &Edge)> = Vec::new();
    active.try_reserve(edges.len())?;
    for slab in events.windows(2) {
        let (y0, y1) = (slab[0], slab[1]);
        let middle = 0.5 * (y0 + y1);
        active.clear();
        active.extend(
            edges
                .iter()
                .filter(|edge| edge.top.y < middle && edge.bottom.y > middle)
                .map(|edge| (edge.x_at(middle), edge)),
        );
        active.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let mut winding = 0;
        for pair in active.windows(2) {
            winding += pair[0].1.winding;
            if fill_rule.is_inside(winding) {
                push_trapezoid(batch, pair[0].1, pair[1].1, y0, y1, polygon_orientation)?;
            }
        }
    }
    Ok(())
}

/// Triangulates the closed polygon spanned by `points` and appends the triangles to `batch`.
///
/// Polygons with less than three distinct points are skipped.
/// Fails with [Error::OutOfMemory] if a scratch buffer or `batch` can not grow.
pub fn fill_polygon(points: &[glam::Vec2], fill_rule: FillRule, batch: &mut VertexBatch) -> Result<(), Error> {
    let polygon = clean_polygon(points)?;
    if polygon.len() < 3 {
        log::debug!("skipping fill of degenerate subpath with {} points", polygon.len());
        return Ok(());
    }
    let area = signed_polygon_area(&polygon);
    if is_simple_polygon(&polygon) {
        if area == 0.0 {
            log::debug!("skipping fill of subpath without area");
            return Ok(());
        }
        batch.reserve(polygon.len(), (polygon.len() - 2) * 3)?;
        ear_clip(&polygon, area, batch)
    } else {
        trapezoidate(&polygon, fill_rule, if area < 0.0 { -1.0 } else { 1.0 }, batch)
    }
}

/// Fills every subpath of `path`, open subpaths are closed implicitly.
pub fn fill_path(path: &Path, fill_rule: FillRule, batch: &mut VertexBatch) -> Result<(), Error> {
    for subpath in path.subpaths() {
        fill_polygon(path.subpath_points(&subpath), fill_rule, batch)?;
    }
    Ok(())
}
