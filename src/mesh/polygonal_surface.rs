use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::math::{Point3, Vector3};

use super::builder::{advance_revision, topology};
use super::storage::{ElementStorage, VertexStorage};
use super::{ElementStore, HasAdjacency, HasElements, HasVertices, MeshKind};

/// A surface made of polygons.
///
/// Facet `i` of a polygon is its edge from vertex slot `i` to slot `i + 1`.
/// A surface built with [`PolygonalSurface::triangulated`] only accepts
/// triangles and reports [`MeshKind::TriangulatedSurface`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonalSurface {
    triangulated: bool,
    points: Vec<Point3>,
    polygons: ElementStore,
    vertex_revision: u64,
}

impl PolygonalSurface {
    /// Creates an empty surface accepting any polygon.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty surface accepting only triangles.
    #[must_use]
    pub fn triangulated() -> Self {
        Self {
            triangulated: true,
            ..Self::default()
        }
    }

    /// Returns `true` if this surface only holds triangles.
    #[must_use]
    pub fn is_triangulated(&self) -> bool {
        self.triangulated
    }

    /// Returns the area-weighted normal of a polygon (Newell's method).
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the polygon does not exist.
    pub fn polygon_normal(&self, polygon: usize) -> Result<Vector3> {
        let vertices = self.element_vertices(polygon)?;
        let mut normal = Vector3::zeros();
        for (i, &vertex) in vertices.iter().enumerate() {
            let current = self.point(vertex)?;
            let next = self.point(vertices[(i + 1) % vertices.len()])?;
            normal += current.coords.cross(&next.coords);
        }
        Ok(normal * 0.5)
    }

    /// Returns the area of a polygon.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the polygon does not exist.
    pub fn polygon_area(&self, polygon: usize) -> Result<f64> {
        Ok(self.polygon_normal(polygon)?.norm())
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        self.polygons.validate(self.points.len())?;
        for element in self.polygons.elements() {
            let n = element.vertices.len();
            if n < 3 || (self.triangulated && n != 3) {
                return Err(format!("polygon with {n} vertices"));
            }
        }
        Ok(())
    }
}

impl VertexStorage for PolygonalSurface {
    fn points_mut(&mut self) -> &mut Vec<Point3> {
        &mut self.points
    }

    fn push_point(&mut self, point: Point3) -> usize {
        self.points.push(point);
        self.polygons.push_vertex();
        self.points.len() - 1
    }

    fn remove_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        let map = topology::remove_vertices(&mut self.points, &mut self.polygons, to_delete)?;
        advance_revision(&mut self.vertex_revision, to_delete);
        Ok(map)
    }
}

impl ElementStorage for PolygonalSurface {
    fn store(&self) -> &ElementStore {
        &self.polygons
    }

    fn store_mut(&mut self) -> &mut ElementStore {
        &mut self.polygons
    }

    fn default_facets(&self, nb_vertices: usize) -> Result<Vec<Vec<usize>>> {
        if self.triangulated && nb_vertices != 3 {
            return Err(MeshError::InvalidElement(format!(
                "a triangle needs 3 vertices, got {nb_vertices}"
            ))
            .into());
        }
        if nb_vertices < 3 {
            return Err(MeshError::InvalidElement(format!(
                "a polygon needs at least 3 vertices, got {nb_vertices}"
            ))
            .into());
        }
        Ok((0..nb_vertices)
            .map(|i| vec![i, (i + 1) % nb_vertices])
            .collect())
    }
}

impl HasVertices for PolygonalSurface {
    fn kind(&self) -> MeshKind {
        if self.triangulated {
            MeshKind::TriangulatedSurface
        } else {
            MeshKind::PolygonalSurface
        }
    }

    fn points(&self) -> &[Point3] {
        &self.points
    }

    fn vertex_revision(&self) -> u64 {
        self.vertex_revision
    }
}

impl HasElements for PolygonalSurface {}

impl HasAdjacency for PolygonalSurface {}
