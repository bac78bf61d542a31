//! Immediate mode drawing context
//!
//! Geometry of fills and strokes is accumulated in one [VertexBatch] and handed to the [Renderer]
//! whenever the [DrawState] changes, the batch runs out of space or [Context::flush] is called.
//!
//! Clipping keeps the tessellated clip paths in the saved state, so [Context::restore]
//! can rebuild the clip region of the state it returns to.

use crate::{
    device::{ContextHandle, Surface},
    error::Error,
    fill::{fill_path, fill_polygon, FillRule},
    matrix::Matrix,
    path::Path,
    pattern::{Color, Pattern},
    renderer::{DrawState, Renderer},
    stroke::{stroke_polyline, Cap, Join, StrokeOptions},
    vertex::VertexBatch,
};
use std::rc::Rc;

/// Default vertex capacity of a batch
pub const VBO_SIZE: usize = 4096 * 4;
/// Default index capacity of a batch
pub const IBO_SIZE: usize = VBO_SIZE * 6;
/// Clip layers beyond this depth are ignored
pub const MAX_CLIP_DEPTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Maximal distance between a curve and its flattened polyline, in device space
    pub tolerance: f32,
    /// A batch is flushed before it would exceed this many vertices
    pub max_vertices: usize,
    /// A batch is flushed before it would exceed this many indices
    pub max_indices: usize,
    pub line_width: f32,
    pub miter_limit: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: crate::path::DEFAULT_TOLERANCE,
            max_vertices: VBO_SIZE,
            max_indices: IBO_SIZE,
            line_width: 1.0,
            miter_limit: 10.0,
        }
    }
}

/// A clip layer as it was handed to the renderer.
#[derive(Debug)]
struct Clip {
    batch: VertexBatch,
    state: DrawState,
}

/// Everything which is saved and restored.
#[derive(Debug, Clone)]
struct State {
    path: Path,
    stroke_options: StrokeOptions,
    fill_rule: FillRule,
    source: Pattern,
    matrix: Matrix,
    inverse: Matrix,
    clips: Vec<Rc<Clip>>,
}

pub struct Context<R: Renderer> {
    surface: Rc<Surface>,
    handle: ContextHandle,
    config: Config,
    renderer: R,
    batch: VertexBatch,
    scratch: VertexBatch,
    state: State,
    saved: Vec<State>,
}

impl<R: Renderer> Context<R> {
    pub fn new(surface: Rc<Surface>, renderer: R) -> Self {
        Self::with_config(surface, renderer, Config::default())
    }

    pub fn with_config(surface: Rc<Surface>, renderer: R, config: Config) -> Self {
        let handle = surface.device().register_context();
        Self {
            surface,
            handle,
            renderer,
            batch: VertexBatch::with_capacity(config.max_vertices, config.max_indices),
            scratch: VertexBatch::default(),
            state: State {
                path: Path::new(config.tolerance),
                stroke_options: StrokeOptions {
                    width: config.line_width,
                    miter_limit: config.miter_limit,
                    ..StrokeOptions::default()
                },
                fill_rule: FillRule::default(),
                source: Pattern::default(),
                matrix: Matrix::identity(),
                inverse: Matrix::identity(),
                clips: Vec::new(),
            },
            saved: Vec::new(),
            config,
        }
    }

    pub fn surface(&self) -> &Rc<Surface> {
        &self.surface
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    /// Geometry which was not submitted yet.
    pub fn pending(&self) -> &VertexBatch {
        &self.batch
    }

    pub fn draw_state(&self) -> DrawState {
        DrawState {
            surface_size: self.surface.size(),
            matrix: self.state.matrix,
            inverse: self.state.inverse,
            source: self.state.source.clone(),
            clip_depth: self.state.clips.len() as u32,
        }
    }

    /// Number of clip layers currently applied.
    pub fn clip_depth(&self) -> usize {
        self.state.clips.len()
    }

    /// Submits the pending geometry and waits for the renderer.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.batch.is_empty() {
            return Ok(());
        }
        log::trace!(
            "submitting {} vertices and {} indices",
            self.batch.vertices.len(),
            self.batch.indices.len()
        );
        let state = self.draw_state();
        let result = self.renderer.submit(&self.batch, &state);
        self.batch.clear();
        result
    }

    /// Moves the scratch geometry into the batch, flushing first if it would not fit.
    fn commit_scratch(&mut self) -> Result<(), Error> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        if !self.batch.is_empty()
            && (self.batch.vertices.len() + self.scratch.vertices.len() > self.config.max_vertices
                || self.batch.indices.len() + self.scratch.indices.len() > self.config.max_indices)
        {
            log::debug!("batch is full, flushing");
            self.flush()?;
        }
        self.batch.append(&self.scratch)?;
        self.scratch.clear();
        if self.batch.vertices.len() > self.config.max_vertices || self.batch.indices.len() > self.config.max_indices {
            log::debug!("geometry exceeds the batch capacity on its own, flushing");
            self.flush()?;
        }
        Ok(())
    }

    /// Lets `tessellate` fill the scratch batch and commits it.
    ///
    /// On failure the scratch batch is emptied, so no geometry of a failed call is drawn later.
    fn commit_with(&mut self, tessellate: impl FnOnce(&State, &mut VertexBatch) -> Result<(), Error>) -> Result<(), Error> {
        let result = tessellate(&self.state, &mut self.scratch).and_then(|()| self.commit_scratch());
        if result.is_err() {
            self.scratch.clear();
        }
        result
    }

    // Path construction

    pub fn new_path(&mut self) {
        self.state.path.new_path();
    }

    pub fn new_sub_path(&mut self) {
        self.state.path.new_sub_path();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.state.path.move_to(glam::vec2(x, y));
    }

    pub fn rel_move_to(&mut self, dx: f32, dy: f32) {
        self.state.path.rel_move_to(glam::vec2(dx, dy));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.state.path.line_to(glam::vec2(x, y));
    }

    pub fn rel_line_to(&mut self, dx: f32, dy: f32) {
        self.state.path.rel_line_to(glam::vec2(dx, dy));
    }

    pub fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) {
        self.state.path.curve_to(glam::vec2(x1, y1), glam::vec2(x2, y2), glam::vec2(x3, y3));
    }

    pub fn rel_curve_to(&mut self, dx1: f32, dy1: f32, dx2: f32, dy2: f32, dx3: f32, dy3: f32) {
        self.state
            .path
            .rel_curve_to(glam::vec2(dx1, dy1), glam::vec2(dx2, dy2), glam::vec2(dx3, dy3));
    }

    pub fn arc(&mut self, xc: f32, yc: f32, radius: f32, angle_a: f32, angle_b: f32) {
        self.state.path.arc(glam::vec2(xc, yc), radius, angle_a, angle_b);
    }

    pub fn arc_negative(&mut self, xc: f32, yc: f32, radius: f32, angle_a: f32, angle_b: f32) {
        self.state.path.arc_negative(glam::vec2(xc, yc), radius, angle_a, angle_b);
    }

    pub fn rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.state.path.rectangle(glam::vec2(x, y), glam::vec2(width, height));
    }

    pub fn close_path(&mut self) {
        self.state.path.close_path();
    }

    pub fn current_point(&self) -> Option<glam::Vec2> {
        self.state.path.current_point()
    }

    pub fn has_current_point(&self) -> bool {
        self.state.path.has_current_point()
    }

    // Drawing

    /// Fills every subpath and clears the path.
    pub fn fill(&mut self) -> Result<(), Error> {
        self.fill_preserve()?;
        self.new_path();
        Ok(())
    }

    /// Fills every subpath, open subpaths are closed implicitly without modifying the path.
    ///
    /// Each subpath is committed on its own, so a large path may be split across several flushes.
    pub fn fill_preserve(&mut self) -> Result<(), Error> {
        self.state.path.status()?;
        for index in 0..self.state.path.subpath_count() {
            self.commit_with(|state, scratch| {
                let subpath = state.path.subpath(index);
                fill_polygon(state.path.subpath_points(&subpath), state.fill_rule, scratch)
            })?;
        }
        Ok(())
    }

    /// Strokes every subpath and clears the path.
    pub fn stroke(&mut self) -> Result<(), Error> {
        self.stroke_preserve()?;
        self.new_path();
        Ok(())
    }

    pub fn stroke_preserve(&mut self) -> Result<(), Error> {
        self.state.path.status()?;
        for index in 0..self.state.path.subpath_count() {
            self.commit_with(|state, scratch| {
                let subpath = state.path.subpath(index);
                stroke_polyline(state.path.subpath_points(&subpath), subpath.closed, &state.stroke_options, scratch)
            })?;
        }
        Ok(())
    }

    fn fill_quad(&mut self, corners: [glam::Vec2; 4]) -> Result<(), Error> {
        self.commit_with(|_, scratch| {
            scratch.reserve(4, 6)?;
            let first = scratch.push_vertex(corners[0]);
            for corner in &corners[1..] {
                scratch.push_vertex(*corner);
            }
            scratch.push_quad([first, first + 1], [first + 2, first + 3]);
            Ok(())
        })
    }

    /// Fills a rectangle without touching the path.
    pub fn fill_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<(), Error> {
        if width == 0.0 || height == 0.0 {
            return Ok(());
        }
        self.fill_quad([
            glam::vec2(x, y),
            glam::vec2(x, y + height),
            glam::vec2(x + width, y),
            glam::vec2(x + width, y + height),
        ])
    }

    /// Fills the whole surface with the current source.
    pub fn paint(&mut self) -> Result<(), Error> {
        let size = self.surface.size();
        let inverse = self.state.inverse;
        self.fill_quad([
            inverse.transform_point(glam::vec2(0.0, 0.0)),
            inverse.transform_point(glam::vec2(0.0, size.y)),
            inverse.transform_point(glam::vec2(size.x, 0.0)),
            inverse.transform_point(size),
        ])?;
        self.flush()
    }

    /// Makes the surface transparent inside the current clip region.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.flush()?;
        let state = self.draw_state();
        self.renderer.clear(&state)
    }

    // Clipping

    /// Intersects the clip region with the filled path and clears the path.
    pub fn clip(&mut self) -> Result<(), Error> {
        self.clip_preserve()?;
        self.new_path();
        Ok(())
    }

    /// Intersects the clip region with the area [Context::fill_preserve] would cover.
    ///
    /// Clipping to an empty path leaves nothing drawable until the clip is reset or restored.
    pub fn clip_preserve(&mut self) -> Result<(), Error> {
        self.state.path.status()?;
        if self.state.clips.len() >= MAX_CLIP_DEPTH {
            log::warn!("ignoring clip beyond the depth limit of {}", MAX_CLIP_DEPTH);
            return Ok(());
        }
        self.flush()?;
        let mut batch = VertexBatch::default();
        fill_path(&self.state.path, self.state.fill_rule, &mut batch)?;
        self.state.clips.try_reserve(1)?;
        let state = self.draw_state();
        self.renderer.clip(&batch, &state)?;
        self.state.clips.push(Rc::new(Clip { batch, state }));
        Ok(())
    }

    /// Removes all clipping, states saved before keep their clip region.
    pub fn reset_clip(&mut self) -> Result<(), Error> {
        if self.state.clips.is_empty() {
            return Ok(());
        }
        self.flush()?;
        self.state.clips.clear();
        self.renderer.reset_clip(0)
    }

    // State

    /// Pushes a copy of the path, style, source, matrix and clip region.
    pub fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    /// Pops the last saved state, does nothing without a matching [Context::save].
    ///
    /// The saved state becomes current even if the renderer fails while switching to it.
    pub fn restore(&mut self) -> Result<(), Error> {
        let state = match self.saved.pop() {
            Some(state) => state,
            None => {
                log::debug!("restore without matching save");
                return Ok(());
            }
        };
        let result = self.prepare_restore(&state);
        self.state = state;
        result
    }

    /// Flushes if the draw state changes and rebuilds the clip layers of `state` which are not applied.
    fn prepare_restore(&mut self, state: &State) -> Result<(), Error> {
        let common = state
            .clips
            .iter()
            .zip(self.state.clips.iter())
            .take_while(|(a, b)| Rc::ptr_eq(a, b))
            .count();
        let clips_changed = common != state.clips.len() || common != self.state.clips.len();
        if clips_changed || state.matrix != self.state.matrix || state.source != self.state.source {
            self.flush()?;
        }
        if clips_changed {
            log::debug!("restoring clip depth {} from {}", state.clips.len(), self.state.clips.len());
            self.renderer.reset_clip(common as u32)?;
            for clip in &state.clips[common..] {
                self.renderer.clip(&clip.batch, &clip.state)?;
            }
        }
        Ok(())
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.state.stroke_options.width = width;
    }

    pub fn line_width(&self) -> f32 {
        self.state.stroke_options.width
    }

    pub fn set_line_cap(&mut self, cap: Cap) {
        self.state.stroke_options.cap = cap;
    }

    pub fn line_cap(&self) -> Cap {
        self.state.stroke_options.cap
    }

    pub fn set_line_join(&mut self, join: Join) {
        self.state.stroke_options.join = join;
    }

    pub fn line_join(&self) -> Join {
        self.state.stroke_options.join
    }

    pub fn set_miter_limit(&mut self, miter_limit: f32) {
        self.state.stroke_options.miter_limit = miter_limit;
    }

    pub fn miter_limit(&self) -> f32 {
        self.state.stroke_options.miter_limit
    }

    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        self.state.fill_rule = fill_rule;
    }

    pub fn fill_rule(&self) -> FillRule {
        self.state.fill_rule
    }

    /// Sets the source with its control points locked to the current user space.
    pub fn set_source(&mut self, pattern: &Pattern) -> Result<(), Error> {
        let source = pattern.transformed(&self.state.matrix);
        if source != self.state.source {
            self.flush()?;
            self.state.source = source;
        }
        Ok(())
    }

    pub fn set_source_rgb(&mut self, r: f32, g: f32, b: f32) -> Result<(), Error> {
        self.set_source(&Pattern::Solid(Color::rgb(r, g, b)))
    }

    pub fn set_source_rgba(&mut self, r: f32, g: f32, b: f32, a: f32) -> Result<(), Error> {
        self.set_source(&Pattern::Solid(Color::new(r, g, b, a)))
    }

    /// Current source in device space.
    pub fn source(&self) -> &Pattern {
        &self.state.source
    }

    // Transformations

    /// Replaces the matrix and its inverse, rejects singular matrices.
    pub fn set_matrix(&mut self, matrix: &Matrix) -> Result<(), Error> {
        if *matrix == self.state.matrix {
            return Ok(());
        }
        let inverse = match matrix.try_invert() {
            Ok(inverse) => inverse,
            Err(error) => {
                log::warn!("rejecting singular matrix {:?}", matrix);
                return Err(error);
            }
        };
        self.flush()?;
        self.state.matrix = *matrix;
        self.state.inverse = inverse;
        let scale = matrix.average_scale();
        self.state.path.set_tolerance(self.config.tolerance / scale);
        Ok(())
    }

    pub fn matrix(&self) -> Matrix {
        self.state.matrix
    }

    pub fn identity_matrix(&mut self) -> Result<(), Error> {
        self.set_matrix(&Matrix::identity())
    }

    /// Applies `matrix` before the current transformation.
    pub fn transform(&mut self, matrix: &Matrix) -> Result<(), Error> {
        self.set_matrix(&Matrix::multiply(matrix, &self.state.matrix))
    }

    pub fn translate(&mut self, tx: f32, ty: f32) -> Result<(), Error> {
        self.transform(&Matrix::translation(tx, ty))
    }

    pub fn scale(&mut self, sx: f32, sy: f32) -> Result<(), Error> {
        self.transform(&Matrix::scaling(sx, sy))
    }

    pub fn rotate(&mut self, radians: f32) -> Result<(), Error> {
        self.transform(&Matrix::rotation(radians))
    }

    pub fn user_to_device(&self, point: glam::Vec2) -> glam::Vec2 {
        self.state.matrix.transform_point(point)
    }

    pub fn user_to_device_distance(&self, distance: glam::Vec2) -> glam::Vec2 {
        self.state.matrix.transform_distance(distance)
    }

    pub fn device_to_user(&self, point: glam::Vec2) -> glam::Vec2 {
        self.state.inverse.transform_point(point)
    }

    pub fn device_to_user_distance(&self, distance: glam::Vec2) -> glam::Vec2 {
        self.state.inverse.transform_distance(distance)
    }
}

impl<R: Renderer> Drop for Context<R> {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            log::warn!("dropping pending geometry: {}", error);
        }
        if let Err(error) = self.surface.device().unregister_context(self.handle) {
            log::warn!("{}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{device::Device, pattern::Extend, utils::point_in_triangle};

    #[derive(Debug, Clone, PartialEq)]
    enum ClipEvent {
        Push { depth: u32, triangles: usize },
        Reset(u32),
        Clear(u32),
    }

    #[derive(Default)]
    struct RecordingRenderer {
        submissions: Vec<(VertexBatch, DrawState)>,
        clip_events: Vec<ClipEvent>,
        fail: bool,
    }

    impl RecordingRenderer {
        fn record(&mut self, event: ClipEvent) -> Result<(), Error> {
            if self.fail {
                return Err(Error::Backend("device lost".to_string()));
            }
            self.clip_events.push(event);
            Ok(())
        }
    }

    impl Renderer for RecordingRenderer {
        fn submit(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
            if self.fail {
                return Err(Error::Backend("device lost".to_string()));
            }
            self.submissions.push((batch.clone(), state.clone()));
            Ok(())
        }

        fn clip(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
            self.record(ClipEvent::Push {
                depth: state.clip_depth,
                triangles: batch.triangle_count(),
            })
        }

        fn reset_clip(&mut self, depth: u32) -> Result<(), Error> {
            self.record(ClipEvent::Reset(depth))
        }

        fn clear(&mut self, state: &DrawState) -> Result<(), Error> {
            self.record(ClipEvent::Clear(state.clip_depth))
        }
    }

    fn context(config: Config) -> Context<RecordingRenderer> {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Device::new();
        let surface = Surface::new(&device, 200, 100);
        Context::with_config(surface, RecordingRenderer::default(), config)
    }

    fn submissions(context: &Context<RecordingRenderer>) -> &[(VertexBatch, DrawState)] {
        &context.renderer().submissions
    }

    #[test]
    fn fill_triangle() {
        let mut context = context(Config::default());
        context.move_to(0.0, 0.0);
        context.line_to(10.0, 0.0);
        context.line_to(10.0, 10.0);
        context.close_path();
        context.fill().unwrap();
        assert!(context.path().is_empty());
        assert!(submissions(&context).is_empty());
        context.flush().unwrap();
        let (batch, state) = &submissions(&context)[0];
        assert_eq!(
            batch.triangles().collect::<Vec<_>>(),
            vec![[glam::vec2(0.0, 0.0), glam::vec2(10.0, 0.0), glam::vec2(10.0, 10.0)]]
        );
        assert_eq!(state.source, Pattern::Solid(Color::BLACK));
        assert_eq!(state.surface_size, glam::vec2(200.0, 100.0));
        assert!(context.pending().is_empty());
    }

    #[test]
    fn fill_preserve_keeps_open_subpath() {
        let mut context = context(Config::default());
        context.move_to(0.0, 0.0);
        context.line_to(10.0, 0.0);
        context.line_to(10.0, 10.0);
        let points = context.path().points().to_vec();
        context.fill_preserve().unwrap();
        assert_eq!(context.pending().triangle_count(), 1);
        assert_eq!(context.path().points(), &points[..]);
        assert!(!context.path().is_finished());
        context.line_to(0.0, 10.0);
        context.stroke_preserve().unwrap();
        assert!(context.pending().triangle_count() > 1);
        assert_eq!(context.path().points().len(), 4);
    }

    #[test]
    fn stroke_rectangle() {
        let mut context = context(Config::default());
        context.rectangle(0.0, 0.0, 100.0, 50.0);
        context.set_line_width(2.0);
        context.set_line_cap(Cap::Butt);
        assert_eq!(context.current_point(), Some(glam::vec2(0.0, 0.0)));
        context.stroke().unwrap();
        assert!(!context.has_current_point());
        context.flush().unwrap();
        let (batch, _) = &submissions(&context)[0];
        assert!((batch.covered_area() - 600.0).abs() < 1.0e-2);
    }

    #[test]
    fn implicit_flush() {
        let mut context = context(Config {
            max_vertices: 8,
            max_indices: 48,
            ..Config::default()
        });
        for i in 0..3 {
            context.rectangle(i as f32 * 10.0, 0.0, 5.0, 5.0);
            context.fill().unwrap();
        }
        assert_eq!(submissions(&context).len(), 1);
        assert_eq!(submissions(&context)[0].0.vertices.len(), 8);
        assert_eq!(context.pending().vertices.len(), 4);
        context.flush().unwrap();
        context.flush().unwrap();
        assert_eq!(submissions(&context).len(), 2);
    }

    #[test]
    fn fill_flushes_between_subpaths() {
        let mut context = context(Config {
            max_vertices: 8,
            max_indices: 48,
            ..Config::default()
        });
        for i in 0..3 {
            context.rectangle(i as f32 * 10.0, 0.0, 5.0, 5.0);
        }
        context.fill().unwrap();
        assert_eq!(submissions(&context).len(), 1);
        assert_eq!(submissions(&context)[0].0.vertices.len(), 8);
        assert_eq!(context.pending().vertices[0].position, glam::vec2(20.0, 0.0));
        context.flush().unwrap();
        let covered: f32 = submissions(&context).iter().map(|(batch, _)| batch.covered_area()).sum();
        assert!((covered - 75.0).abs() < 1.0e-4);
    }

    #[test]
    fn stroke_flushes_when_full() {
        let mut context = context(Config {
            max_vertices: 8,
            max_indices: 48,
            ..Config::default()
        });
        context.fill_rectangle(0.0, 0.0, 5.0, 5.0).unwrap();
        context.set_line_width(2.0);
        context.move_to(0.0, 50.0);
        context.line_to(50.0, 50.0);
        context.line_to(50.0, 90.0);
        context.stroke().unwrap();
        assert_eq!(submissions(&context).len(), 1);
        assert_eq!(submissions(&context)[0].0.vertices.len(), 4);
        assert_eq!(context.pending().vertices.len(), 6);
        assert_eq!(context.pending().indices[0], 0);
    }

    #[test]
    fn failed_draw_leaves_no_geometry_behind() {
        let mut context = context(Config {
            max_vertices: 4,
            ..Config::default()
        });
        context.fill_rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        context.renderer_mut().fail = true;
        assert_eq!(
            context.fill_rectangle(50.0, 50.0, 1.0, 1.0),
            Err(Error::Backend("device lost".to_string()))
        );
        context.renderer_mut().fail = false;
        context.set_source_rgb(1.0, 0.0, 0.0).unwrap();
        context.fill_rectangle(10.0, 10.0, 1.0, 1.0).unwrap();
        context.flush().unwrap();
        assert_eq!(submissions(&context).len(), 1);
        let (batch, state) = &submissions(&context)[0];
        assert_eq!(batch.vertices.len(), 4);
        assert!(batch.vertices.iter().all(|vertex| vertex.position.x >= 10.0 && vertex.position.x <= 11.0));
        assert_eq!(state.source, Pattern::Solid(Color::rgb(1.0, 0.0, 0.0)));
    }

    #[test]
    fn path_growth_failure_is_reported_by_drawing() {
        let mut context = context(Config::default());
        context.rectangle(0.0, 0.0, 5.0, 5.0);
        context.arc(0.0, 0.0, 1.0e30, 0.0, 1.0);
        assert_eq!(context.fill(), Err(Error::OutOfMemory));
        assert_eq!(context.stroke_preserve(), Err(Error::OutOfMemory));
        assert_eq!(context.clip_preserve(), Err(Error::OutOfMemory));
        assert!(context.pending().is_empty());
        assert_eq!(context.clip_depth(), 0);
        context.new_path();
        context.rectangle(0.0, 0.0, 5.0, 5.0);
        context.fill().unwrap();
        assert_eq!(context.pending().triangle_count(), 2);
    }

    #[test]
    fn clip_layers_follow_save_and_restore() {
        let mut context = context(Config::default());
        context.fill_rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        context.rectangle(10.0, 10.0, 50.0, 50.0);
        context.clip().unwrap();
        assert!(context.path().is_empty());
        assert_eq!(submissions(&context).len(), 1);
        assert_eq!(submissions(&context)[0].1.clip_depth, 0);
        assert_eq!(context.clip_depth(), 1);
        context.fill_rectangle(0.0, 0.0, 100.0, 100.0).unwrap();
        context.flush().unwrap();
        assert_eq!(submissions(&context)[1].1.clip_depth, 1);

        context.save();
        context.rectangle(20.0, 20.0, 10.0, 10.0);
        context.clip_preserve().unwrap();
        assert!(!context.path().is_empty());
        assert_eq!(context.draw_state().clip_depth, 2);
        context.restore().unwrap();
        assert_eq!(context.clip_depth(), 1);

        context.save();
        context.reset_clip().unwrap();
        assert_eq!(context.clip_depth(), 0);
        context.reset_clip().unwrap();
        context.restore().unwrap();
        assert_eq!(context.clip_depth(), 1);
        assert_eq!(
            context.renderer().clip_events,
            vec![
                ClipEvent::Push { depth: 0, triangles: 2 },
                ClipEvent::Push { depth: 1, triangles: 2 },
                ClipEvent::Reset(1),
                ClipEvent::Reset(0),
                ClipEvent::Reset(0),
                ClipEvent::Push { depth: 0, triangles: 2 },
            ]
        );
    }

    #[test]
    fn clear_flushes_and_respects_clip() {
        let mut context = context(Config::default());
        context.arc(50.0, 50.0, 20.0, 0.0, 2.0 * std::f32::consts::PI);
        context.clip().unwrap();
        context.fill_rectangle(0.0, 0.0, 10.0, 10.0).unwrap();
        context.clear().unwrap();
        assert_eq!(submissions(&context).len(), 1);
        assert!(context.pending().is_empty());
        let events = &context.renderer().clip_events;
        assert!(matches!(events[0], ClipEvent::Push { depth: 0, triangles } if triangles > 2));
        assert_eq!(events[1], ClipEvent::Clear(1));
    }

    #[test]
    fn source_changes_flush() {
        let mut context = context(Config::default());
        context.fill_rectangle(0.0, 0.0, 10.0, 10.0).unwrap();
        context.set_source_rgb(0.0, 0.0, 0.0).unwrap();
        assert!(submissions(&context).is_empty());
        context.set_source_rgba(1.0, 0.0, 0.0, 0.5).unwrap();
        assert_eq!(submissions(&context).len(), 1);
        assert_eq!(submissions(&context)[0].1.source, Pattern::Solid(Color::BLACK));
        context.fill_rectangle(0.0, 0.0, 10.0, 10.0).unwrap();
        context.flush().unwrap();
        assert_eq!(submissions(&context)[1].1.source, Pattern::Solid(Color::new(1.0, 0.0, 0.0, 0.5)));
    }

    #[test]
    fn gradient_is_locked_to_user_space() {
        let mut context = context(Config::default());
        context.translate(10.0, 20.0).unwrap();
        let mut pattern = Pattern::linear(glam::vec2(0.0, 0.0), glam::vec2(5.0, 0.0));
        pattern.add_color_stop(0.0, Color::WHITE);
        pattern.set_extend(Extend::Pad);
        context.set_source(&pattern).unwrap();
        let gradient = context.source().gradient().unwrap();
        assert_eq!(gradient.start, glam::vec2(10.0, 20.0));
        assert_eq!(gradient.end, glam::vec2(15.0, 20.0));
        assert_eq!(gradient.extend, Extend::Pad);
    }

    #[test]
    fn save_and_restore() {
        let mut context = context(Config::default());
        context.move_to(1.0, 1.0);
        context.line_to(2.0, 2.0);
        context.set_line_width(3.0);
        context.save();
        context.new_path();
        context.set_line_width(5.0);
        context.set_line_join(Join::Round);
        context.set_fill_rule(FillRule::EvenOdd);
        context.scale(2.0, 2.0).unwrap();
        assert!(context.path().is_empty());
        context.restore().unwrap();
        assert_eq!(context.path().points(), &[glam::vec2(1.0, 1.0), glam::vec2(2.0, 2.0)]);
        assert_eq!(context.line_width(), 3.0);
        assert_eq!(context.line_join(), Join::Miter);
        assert_eq!(context.fill_rule(), FillRule::NonZero);
        assert!(context.matrix().is_identity());
        context.restore().unwrap();
        assert_eq!(context.line_width(), 3.0);
        assert_eq!(context.miter_limit(), 10.0);
        assert_eq!(context.line_cap(), Cap::Butt);
        assert!(context.renderer().clip_events.is_empty());
    }

    #[test]
    fn matrix_and_inverse_stay_in_sync() {
        let mut context = context(Config::default());
        context.fill_rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        context.translate(100.0, 50.0).unwrap();
        assert_eq!(submissions(&context).len(), 1);
        assert!(submissions(&context)[0].1.matrix.is_identity());
        context.rotate(std::f32::consts::FRAC_PI_2).unwrap();
        context.scale(2.0, 2.0).unwrap();
        let p = glam::vec2(3.0, -1.0);
        let device = context.user_to_device(p);
        assert!((device - glam::vec2(102.0, 56.0)).length() < 1.0e-4);
        assert!((context.device_to_user(device) - p).length() < 1.0e-4);
        assert!((context.user_to_device_distance(glam::vec2(1.0, 0.0)) - glam::vec2(0.0, 2.0)).length() < 1.0e-5);
        assert!((context.device_to_user_distance(glam::vec2(0.0, 2.0)) - glam::vec2(1.0, 0.0)).length() < 1.0e-5);
        assert!((context.path().tolerance() - 0.125).abs() < 1.0e-6);
        let before = context.matrix();
        assert_eq!(context.scale(0.0, 1.0), Err(Error::InvalidMatrix));
        assert_eq!(context.matrix(), before);
        let mut transform = Matrix::identity();
        transform.translate(1.0, 0.0);
        context.identity_matrix().unwrap();
        context.transform(&transform).unwrap();
        assert_eq!(context.draw_state().inverse, Matrix::translation(-1.0, 0.0));
    }

    #[test]
    fn paint_covers_surface() {
        let mut context = context(Config::default());
        context.translate(100.0, 50.0).unwrap();
        context.rotate(0.5).unwrap();
        context.paint().unwrap();
        let (batch, state) = &submissions(&context)[0];
        let device_triangles: Vec<[glam::Vec2; 3]> = batch
            .triangles()
            .map(|t| [state.matrix.transform_point(t[0]), state.matrix.transform_point(t[1]), state.matrix.transform_point(t[2])])
            .collect();
        for &corner in [glam::vec2(0.5, 0.5), glam::vec2(199.5, 0.5), glam::vec2(0.5, 99.5), glam::vec2(199.5, 99.5)].iter() {
            assert!(device_triangles.iter().any(|t| point_in_triangle(corner, t[0], t[1], t[2])));
        }
    }

    #[test]
    fn backend_errors_propagate() {
        let mut context = context(Config::default());
        context.fill_rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        context.renderer_mut().fail = true;
        assert_eq!(context.flush(), Err(Error::Backend("device lost".to_string())));
        assert!(context.pending().is_empty());
        assert_eq!(context.flush(), Ok(()));
    }

    #[test]
    fn contexts_are_registered() {
        let device = Device::new();
        let surface = Surface::new(&device, 10, 10);
        let a = Context::new(surface.clone(), RecordingRenderer::default());
        let b = Context::new(surface, RecordingRenderer::default());
        let handle = a.handle();
        assert_eq!(device.live_contexts(), 2);
        drop(a);
        assert!(!device.is_live(handle));
        assert!(device.is_live(b.handle()));
        drop(b);
        assert_eq!(device.live_contexts(), 0);
        assert_eq!(Rc::strong_count(&device), 1);
    }
}
