pub(crate) mod topology;

pub use topology::MeshTopologyBuilder;

use crate::error::{MeshError, Result};
use crate::math::Point3;

use super::storage::VertexStorage;
use super::HasVertices;

/// Vertex-level edits valid for every mesh kind.
///
/// On element meshes, deleting vertices also deletes every element that
/// references one of them.
pub struct VertexSetBuilder<'a, M: HasVertices> {
    mesh: &'a mut M,
}

impl<'a, M: HasVertices> VertexSetBuilder<'a, M> {
    /// Creates a builder editing `mesh`.
    pub fn new(mesh: &'a mut M) -> Self {
        Self { mesh }
    }

    /// Appends one vertex at the origin and returns its index.
    pub fn create_vertex(&mut self) -> usize {
        self.mesh.push_point(Point3::origin())
    }

    /// Appends `count` vertices at the origin and returns the first new index.
    pub fn create_vertices(&mut self, count: usize) -> usize {
        let first = self.mesh.nb_vertices();
        for _ in 0..count {
            self.mesh.push_point(Point3::origin());
        }
        first
    }

    /// Appends one vertex with coordinates and returns its index.
    pub fn create_point(&mut self, point: Point3) -> usize {
        self.mesh.push_point(point)
    }

    /// Moves an existing vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the vertex does not exist.
    pub fn set_point(&mut self, vertex: usize, point: Point3) -> Result<()> {
        set_point(&mut *self.mesh, vertex, point)
    }

    /// Deletes the flagged vertices and compacts the survivors.
    ///
    /// Returns the map from old to new vertex indices.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the mask length differs from the
    /// vertex count.
    pub fn delete_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        self.mesh.remove_vertices(to_delete)
    }
}

pub(crate) fn set_point<M: HasVertices + ?Sized>(
    mesh: &mut M,
    vertex: usize,
    point: Point3,
) -> Result<()> {
    let points = mesh.points_mut();
    let len = points.len();
    let slot = points
        .get_mut(vertex)
        .ok_or(MeshError::out_of_range("vertex", vertex, len))?;
    *slot = point;
    Ok(())
}

pub(crate) fn check_mask(mask: &[bool], len: usize, what: &'static str) -> Result<()> {
    if mask.len() != len {
        return Err(MeshError::out_of_range(what, mask.len(), len).into());
    }
    Ok(())
}

/// Maps each old index to its index after removing the flagged entries.
pub(crate) fn old_to_new(to_delete: &[bool]) -> Vec<Option<usize>> {
    let mut next = 0;
    to_delete
        .iter()
        .map(|&deleted| {
            if deleted {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect()
}

/// Advances a vertex revision if the mask deletes anything.
pub(crate) fn advance_revision(revision: &mut u64, to_delete: &[bool]) {
    if to_delete.contains(&true) {
        *revision += 1;
    }
}

pub(crate) fn retain_unmasked<T>(items: &mut Vec<T>, to_delete: &[bool]) {
    let mut flags = to_delete.iter();
    items.retain(|_| !flags.next().copied().unwrap_or(false));
}
