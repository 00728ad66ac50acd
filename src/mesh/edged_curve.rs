use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::math::Point3;

use super::builder::{advance_revision, topology};
use super::storage::{ElementStorage, VertexStorage};
use super::{ElementStore, HasAdjacency, HasElements, HasVertices, MeshKind};

/// A curve made of two-vertex edges.
///
/// The facets of an edge are its two end vertices, so adjacency links an
/// edge to the next edge through a shared vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgedCurve {
    points: Vec<Point3>,
    edges: ElementStore,
    vertex_revision: u64,
}

impl EdgedCurve {
    /// Creates an empty curve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the Euclidean length of an edge.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the edge does not exist.
    pub fn edge_length(&self, edge: usize) -> Result<f64> {
        let vertices = self.element_vertices(edge)?;
        Ok((self.point(vertices[1])? - self.point(vertices[0])?).norm())
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        self.edges.validate(self.points.len())?;
        if self.edges.elements().iter().any(|e| e.vertices.len() != 2) {
            return Err("edge without exactly two vertices".into());
        }
        Ok(())
    }
}

impl VertexStorage for EdgedCurve {
    fn points_mut(&mut self) -> &mut Vec<Point3> {
        &mut self.points
    }

    fn push_point(&mut self, point: Point3) -> usize {
        self.points.push(point);
        self.edges.push_vertex();
        self.points.len() - 1
    }

    fn remove_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        let map = topology::remove_vertices(&mut self.points, &mut self.edges, to_delete)?;
        advance_revision(&mut self.vertex_revision, to_delete);
        Ok(map)
    }
}

impl ElementStorage for EdgedCurve {
    fn store(&self) -> &ElementStore {
        &self.edges
    }

    fn store_mut(&mut self) -> &mut ElementStore {
        &mut self.edges
    }

    fn default_facets(&self, nb_vertices: usize) -> Result<Vec<Vec<usize>>> {
        if nb_vertices != 2 {
            return Err(MeshError::InvalidElement(format!(
                "an edge needs 2 vertices, got {nb_vertices}"
            ))
            .into());
        }
        Ok(vec![vec![0], vec![1]])
    }
}

impl HasVertices for EdgedCurve {
    fn kind(&self) -> MeshKind {
        MeshKind::EdgedCurve
    }

    fn points(&self) -> &[Point3] {
        &self.points
    }

    fn vertex_revision(&self) -> u64 {
        self.vertex_revision
    }
}

impl HasElements for EdgedCurve {}

impl HasAdjacency for EdgedCurve {}
