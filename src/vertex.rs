use crate::error::Error;

/// Marks a vertex which is colored by the paint source directly without texture lookup.
pub const FLAT_UV: glam::Vec3 = glam::Vec3::new(0.0, 0.0, -1.0);

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Vertex {
    pub position: glam::Vec2,
    pub uv: glam::Vec3,
}

impl Vertex {
    pub fn flat(position: glam::Vec2) -> Self {
        Self { position, uv: FLAT_UV }
    }
}

/// Vertices and triangle list indices which are submitted together.
#[derive(Debug, Clone, Default)]
pub struct VertexBatch {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl VertexBatch {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Makes room for `vertices` and `indices` more elements or reports [`Error::OutOfMemory`].
    pub fn reserve(&mut self, vertices: usize, indices: usize) -> Result<(), Error> {
        self.vertices.try_reserve(vertices)?;
        self.indices.try_reserve(indices)?;
        Ok(())
    }

    /// Index the next pushed vertex will get.
    pub fn next_index(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn push_vertex(&mut self, position: glam::Vec2) -> u32 {
        let index = self.next_index();
        self.vertices.push(Vertex::flat(position));
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Two triangles connecting the left/right pair `previous` to the left/right pair `next`.
    ///
    /// Emits the indices `[previous[0], next[0], previous[1], previous[1], next[0], next[1]]`.
    pub fn push_quad(&mut self, previous: [u32; 2], next: [u32; 2]) {
        self.push_triangle(previous[0], next[0], previous[1]);
        self.push_triangle(previous[1], next[0], next[1]);
    }

    /// Appends all triangles of `other`, rebasing its indices.
    pub fn append(&mut self, other: &VertexBatch) -> Result<(), Error> {
        self.reserve(other.vertices.len(), other.indices.len())?;
        let base = self.next_index();
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|index| index + base));
        Ok(())
    }

    /// Overwrites an already emitted index by its position.
    pub fn patch_index(&mut self, position: usize, index: u32) {
        self.indices[position] = index;
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterates the positions of every emitted triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [glam::Vec2; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(move |t| [self.vertices[t[0] as usize].position, self.vertices[t[1] as usize].position, self.vertices[t[2] as usize].position])
    }

    /// Sum of the absolute areas of all triangles.
    pub fn covered_area(&self) -> f32 {
        self.triangles().map(|t| 0.5 * crate::utils::signed_triangle_area(&t).abs()).sum()
    }
}
