use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::math::Point3;

use super::builder::{advance_revision, topology};
use super::storage::{ElementStorage, VertexStorage};
use super::{ElementStore, HasAdjacency, HasElements, HasVertices, HasVolumeElements, MeshKind};

/// A solid made of polyhedra.
///
/// Each polyhedron lists its vertices and its facets as ordered lists of
/// local vertex slots; two polyhedra are adjacent through a facet whose
/// vertex set appears reversed in the neighbor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyhedralSolid {
    points: Vec<Point3>,
    polyhedra: ElementStore,
    vertex_revision: u64,
}

impl PolyhedralSolid {
    /// Creates an empty solid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        self.polyhedra.validate(self.points.len())?;
        for element in self.polyhedra.elements() {
            if element.vertices.len() < 4 || element.facets.iter().any(|f| f.len() < 3) {
                return Err("degenerate polyhedron".into());
            }
        }
        Ok(())
    }
}

impl VertexStorage for PolyhedralSolid {
    fn points_mut(&mut self) -> &mut Vec<Point3> {
        &mut self.points
    }

    fn push_point(&mut self, point: Point3) -> usize {
        self.points.push(point);
        self.polyhedra.push_vertex();
        self.points.len() - 1
    }

    fn remove_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        let map = topology::remove_vertices(&mut self.points, &mut self.polyhedra, to_delete)?;
        advance_revision(&mut self.vertex_revision, to_delete);
        Ok(map)
    }
}

impl ElementStorage for PolyhedralSolid {
    fn store(&self) -> &ElementStore {
        &self.polyhedra
    }

    fn store_mut(&mut self) -> &mut ElementStore {
        &mut self.polyhedra
    }

    fn default_facets(&self, _nb_vertices: usize) -> Result<Vec<Vec<usize>>> {
        Err(MeshError::InvalidElement(
            "polyhedra need explicit facets, use create_polyhedron".into(),
        )
        .into())
    }
}

impl HasVertices for PolyhedralSolid {
    fn kind(&self) -> MeshKind {
        MeshKind::PolyhedralSolid
    }

    fn points(&self) -> &[Point3] {
        &self.points
    }

    fn vertex_revision(&self) -> u64 {
        self.vertex_revision
    }
}

impl HasElements for PolyhedralSolid {}

impl HasAdjacency for PolyhedralSolid {}

impl HasVolumeElements for PolyhedralSolid {}
