use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::Point3;

use super::builder::{advance_revision, check_mask, old_to_new, retain_unmasked};
use super::storage::VertexStorage;
use super::{HasVertices, MeshKind};

/// A set of vertices with coordinates and no connectivity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    points: Vec<Point3>,
    vertex_revision: u64,
}

impl PointSet {
    /// Creates an empty point set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.points.iter().any(|p| p.coords.iter().any(|c| !c.is_finite())) {
            return Err("non-finite vertex coordinate".into());
        }
        Ok(())
    }
}

impl VertexStorage for PointSet {
    fn points_mut(&mut self) -> &mut Vec<Point3> {
        &mut self.points
    }

    fn push_point(&mut self, point: Point3) -> usize {
        self.points.push(point);
        self.points.len() - 1
    }

    fn remove_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        check_mask(to_delete, self.points.len(), "vertex")?;
        retain_unmasked(&mut self.points, to_delete);
        advance_revision(&mut self.vertex_revision, to_delete);
        Ok(old_to_new(to_delete))
    }
}

impl HasVertices for PointSet {
    fn kind(&self) -> MeshKind {
        MeshKind::PointSet
    }

    fn points(&self) -> &[Point3] {
        &self.points
    }

    fn vertex_revision(&self) -> u64 {
        self.vertex_revision
    }
}
