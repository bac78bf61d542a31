//! Path construction
//!
//! A [Path] stores all its points in one flat buffer.
//! The subpaths are delimited by a marker table which holds two entries per subpath:
//! The index of its first point and either the index of its last point (open subpath)
//! or the index of its first point again (closed subpath).
//! An odd number of markers means that the last subpath is still being built.
//!
//! Building never panics on allocation failure. Instead the path enters a sticky error state,
//! ignores further commands and reports [Error::OutOfMemory] from [Path::status] until
//! [Path::new_path] is called.

use crate::{error::Error, flatten::flatten_cubic};
use std::f32::consts::PI;

/// Default flatness tolerance for curves, in user space units.
pub const DEFAULT_TOLERANCE: f32 = 0.25;

/// A contiguous run of points in a [Path].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subpath {
    /// Index of the first point
    pub first: usize,
    /// Index of the last point (inclusive)
    pub last: usize,
    /// Closed subpaths connect their last point back to their first point
    pub closed: bool,
}

impl Subpath {
    pub fn len(&self) -> usize {
        self.last + 1 - self.first
    }
}

#[derive(Debug, Clone)]
pub struct Path {
    points: Vec<glam::Vec2>,
    markers: Vec<u32>,
    current_point: Option<glam::Vec2>,
    tolerance: f32,
    error: Option<Error>,
}

impl Default for Path {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Path {
    pub fn new(tolerance: f32) -> Self {
        Self {
            points: Vec::new(),
            markers: Vec::new(),
            current_point: None,
            tolerance,
            error: None,
        }
    }

    /// The error which stopped the path from being built, if any.
    pub fn status(&self) -> Result<(), Error> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f32) {
        self.tolerance = tolerance;
    }

    pub fn points(&self) -> &[glam::Vec2] {
        &self.points
    }

    pub fn markers(&self) -> &[u32] {
        &self.markers
    }

    pub fn current_point(&self) -> Option<glam::Vec2> {
        self.current_point
    }

    pub fn has_current_point(&self) -> bool {
        self.current_point.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True while no subpath is being built.
    pub fn is_finished(&self) -> bool {
        self.markers.len() % 2 == 0
    }

    /// Makes room for `points` more points and `markers` more markers.
    ///
    /// Returns false if the path is (or just went) into the error state.
    fn reserve(&mut self, points: usize, markers: usize) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.points.try_reserve(points).and_then(|()| self.markers.try_reserve(markers)) {
            Ok(()) => true,
            Err(error) => {
                log::warn!("Path can not grow by {} points: {}", points, error);
                self.error = Some(Error::OutOfMemory);
                false
            }
        }
    }

    fn start_sub_path(&mut self) {
        self.markers.push(self.points.len() as u32);
    }

    fn current_sub_path_start(&self) -> Option<usize> {
        if self.is_finished() {
            None
        } else {
            self.markers.last().map(|start| *start as usize)
        }
    }

    fn add_point_and_update_current_point(&mut self, point: glam::Vec2) {
        self.points.push(point);
        self.current_point = Some(point);
    }

    /// Ends the subpath being built as an open subpath.
    ///
    /// Subpaths consisting of a single point are discarded.
    pub fn finish(&mut self) {
        if let Some(start) = self.current_sub_path_start() {
            if self.points.len() - start > 1 {
                if !self.reserve(0, 1) {
                    return;
                }
                self.markers.push((self.points.len() - 1) as u32);
            } else {
                self.points.truncate(start);
                self.markers.pop();
            }
        }
    }

    /// Discards all points and subpaths, clears the current point and the error state.
    pub fn new_path(&mut self) {
        self.points.clear();
        self.markers.clear();
        self.current_point = None;
        self.error = None;
    }

    /// Lets the next drawing command begin a new subpath without connecting to the previous one.
    pub fn new_sub_path(&mut self) {
        if self.is_empty() {
            return;
        }
        self.finish();
        self.current_point = None;
    }

    pub fn move_to(&mut self, point: glam::Vec2) {
        if !self.reserve(0, 1) {
            return;
        }
        self.finish();
        self.current_point = Some(point);
    }

    /// Does nothing if there is no current point.
    pub fn rel_move_to(&mut self, delta: glam::Vec2) {
        if let Some(current_point) = self.current_point {
            self.move_to(current_point + delta);
        }
    }

    pub fn line_to(&mut self, point: glam::Vec2) {
        match self.current_point {
            Some(current_point) => {
                if current_point == point || !self.reserve(2, 1) {
                    return;
                }
                if self.is_finished() {
                    self.start_sub_path();
                    self.points.push(current_point);
                }
                self.add_point_and_update_current_point(point);
            }
            None => self.move_to(point),
        }
    }

    /// Does nothing if there is no current point.
    pub fn rel_line_to(&mut self, delta: glam::Vec2) {
        if let Some(current_point) = self.current_point {
            self.line_to(current_point + delta);
        }
    }

    /// Adds a cubic bezier curve from the current point (or `control_point_a` if there is none) to `end`.
    pub fn curve_to(&mut self, control_point_a: glam::Vec2, control_point_b: glam::Vec2, end: glam::Vec2) {
        let start = self.current_point.unwrap_or(control_point_a);
        if !self.reserve(2, 1) {
            return;
        }
        if self.is_finished() {
            self.start_sub_path();
            self.points.push(start);
        }
        if let Err(error) = flatten_cubic([start, control_point_a, control_point_b, end], self.tolerance, &mut self.points) {
            log::warn!("Curve flattening stopped after {} points", self.points.len());
            self.error = Some(error);
            return;
        }
        if !self.reserve(1, 0) {
            return;
        }
        if *self.points.last().unwrap_or(&start) == end {
            self.current_point = Some(end);
        } else {
            self.add_point_and_update_current_point(end);
        }
    }

    /// Does nothing if there is no current point.
    pub fn rel_curve_to(&mut self, control_point_a: glam::Vec2, control_point_b: glam::Vec2, end: glam::Vec2) {
        if let Some(current_point) = self.current_point {
            self.curve_to(current_point + control_point_a, current_point + control_point_b, current_point + end);
        }
    }

    fn arc_point(center: glam::Vec2, radius: f32, angle: f32) -> glam::Vec2 {
        let (sin, cos) = angle.sin_cos();
        center + glam::vec2(cos, sin) * radius
    }

    /// Connects to the start of an arc and makes sure a subpath is being built which ends at the start.
    ///
    /// Returns false if the arc has no body.
    fn begin_arc(&mut self, start: glam::Vec2, has_body: bool) -> bool {
        if self.current_point.is_some() {
            self.line_to(start);
        } else {
            self.current_point = Some(start);
        }
        if !has_body {
            return false;
        }
        if self.is_finished() {
            self.start_sub_path();
            self.points.push(start);
        }
        true
    }

    fn end_arc(&mut self, end: glam::Vec2) {
        if *self.points.last().unwrap_or(&end) == end {
            self.current_point = Some(end);
        } else {
            self.add_point_and_update_current_point(end);
        }
    }

    /// Emits the arc from `angle_a` sweeping by `span` (negative for decreasing angles) and ending at `angle_b`.
    ///
    /// The intermediate points are spaced `PI / radius` apart and computed from their index,
    /// so the number of points is known before any of them is added.
    fn add_arc(&mut self, center: glam::Vec2, radius: f32, angle_a: f32, span: f32, angle_b: f32) {
        let step = PI / radius;
        let intermediate_points = ((span.abs() / step).ceil() as usize).saturating_sub(1);
        if !self.reserve(intermediate_points.saturating_add(3), 1) {
            return;
        }
        if !self.begin_arc(Self::arc_point(center, radius, angle_a), span != 0.0) {
            return;
        }
        let step = step.copysign(span);
        for i in 1..=intermediate_points {
            self.points.push(Self::arc_point(center, radius, angle_a + i as f32 * step));
        }
        self.end_arc(Self::arc_point(center, radius, angle_b));
    }

    /// Adds a circular arc in the direction of increasing angles.
    ///
    /// If there is a current point a line segment connects it to the start of the arc.
    /// An `angle_b` smaller than `angle_a` is moved up by whole turns.
    pub fn arc(&mut self, center: glam::Vec2, radius: f32, angle_a: f32, angle_b: f32) {
        if !(radius > 0.0) {
            self.line_to(center);
            return;
        }
        let span = angle_b - angle_a;
        if span < 0.0 {
            let span = span.rem_euclid(2.0 * PI);
            self.add_arc(center, radius, angle_a, span, angle_a + span);
        } else {
            self.add_arc(center, radius, angle_a, span, angle_b);
        }
    }

    /// Adds a circular arc in the direction of decreasing angles.
    ///
    /// If there is a current point a line segment connects it to the start of the arc.
    /// An `angle_b` larger than `angle_a` is moved down by whole turns.
    pub fn arc_negative(&mut self, center: glam::Vec2, radius: f32, angle_a: f32, angle_b: f32) {
        if !(radius > 0.0) {
            self.line_to(center);
            return;
        }
        let span = angle_b - angle_a;
        if span > 0.0 {
            let span = -(-span).rem_euclid(2.0 * PI);
            self.add_arc(center, radius, angle_a, span, angle_a + span);
        } else {
            self.add_arc(center, radius, angle_a, span, angle_b);
        }
    }

    /// Adds a closed subpath and moves the current point to the origin corner.
    pub fn rectangle(&mut self, origin: glam::Vec2, size: glam::Vec2) {
        if !self.reserve(4, 3) {
            return;
        }
        self.finish();
        self.start_sub_path();
        self.points.push(origin);
        self.points.push(origin + glam::vec2(size.x, 0.0));
        self.points.push(origin + size);
        self.points.push(origin + glam::vec2(0.0, size.y));
        self.close_path();
        self.current_point = Some(origin);
    }

    /// Closes the subpath being built if it has at least three points.
    pub fn close_path(&mut self) {
        let start = match self.current_sub_path_start() {
            Some(start) => start,
            None => return,
        };
        if self.points.len() - start > 2 && self.reserve(0, 1) {
            self.markers.push(start as u32);
            if self.points[self.points.len() - 1] == self.points[start] {
                self.points.pop();
            }
        }
    }

    /// Number of subpaths including the one being built.
    pub fn subpath_count(&self) -> usize {
        (self.markers.len() + 1) / 2
    }

    /// The subpath at `index`, which must be less than [Path::subpath_count].
    pub fn subpath(&self, index: usize) -> Subpath {
        let first = self.markers[index * 2] as usize;
        match self.markers.get(index * 2 + 1) {
            Some(end) if *end as usize == first => Subpath {
                first,
                last: self
                    .markers
                    .get(index * 2 + 2)
                    .map(|next_start| *next_start as usize - 1)
                    .unwrap_or_else(|| self.points.len() - 1),
                closed: true,
            },
            Some(end) => Subpath {
                first,
                last: *end as usize,
                closed: false,
            },
            None => Subpath {
                first,
                last: self.points.len() - 1,
                closed: false,
            },
        }
    }

    /// Iterates all subpaths including the one being built, which is reported as open.
    pub fn subpaths(&self) -> impl Iterator<Item = Subpath> + '_ {
        (0..self.subpath_count()).map(move |index| self.subpath(index))
    }

    pub fn subpath_points(&self, subpath: &Subpath) -> &[glam::Vec2] {
        &self.points[subpath.first..=subpath.last]
    }
}
