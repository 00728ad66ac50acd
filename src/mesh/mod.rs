pub mod builder;
mod edged_curve;
mod elements;
mod point_set;
mod polygonal_surface;
mod polyhedral_solid;

pub use builder::{MeshTopologyBuilder, VertexSetBuilder};
pub use edged_curve::EdgedCurve;
pub use point_set::PointSet;
pub use polygonal_surface::PolygonalSurface;
pub use polyhedral_solid::PolyhedralSolid;

pub(crate) use elements::ElementStore;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::math::{self, Point3};

/// Tag identifying the concrete mesh variant.
///
/// The tag is fixed when a mesh is constructed and drives the choice of
/// native file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshKind {
    /// Vertices with coordinates and no elements.
    PointSet,
    /// Two-vertex edges.
    EdgedCurve,
    /// Polygons with any number (>= 3) of vertices.
    PolygonalSurface,
    /// Polygons restricted to triangles.
    TriangulatedSurface,
    /// Polyhedra with explicit facet lists.
    PolyhedralSolid,
}

impl MeshKind {
    /// Returns the native file extension of this mesh kind.
    #[must_use]
    pub fn native_extension(self) -> &'static str {
        match self {
            Self::PointSet => "pts",
            Self::EdgedCurve => "edc",
            Self::PolygonalSurface => "psf",
            Self::TriangulatedSurface => "tsf",
            Self::PolyhedralSolid => "pso",
        }
    }

    /// Returns a human readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PointSet => "PointSet",
            Self::EdgedCurve => "EdgedCurve",
            Self::PolygonalSurface => "PolygonalSurface",
            Self::TriangulatedSurface => "TriangulatedSurface",
            Self::PolyhedralSolid => "PolyhedralSolid",
        }
    }
}

/// A vertex slot of a mesh element: the `vertex`-th corner of `element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementVertex {
    /// Element index.
    pub element: usize,
    /// Local vertex slot within the element.
    pub vertex: usize,
}

impl ElementVertex {
    /// Creates a new element vertex reference.
    #[must_use]
    pub fn new(element: usize, vertex: usize) -> Self {
        Self { element, vertex }
    }
}

/// A facet slot of a mesh element: the `facet`-th facet of `element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementFacet {
    /// Element index.
    pub element: usize,
    /// Local facet slot within the element.
    pub facet: usize,
}

impl ElementFacet {
    /// Creates a new element facet reference.
    #[must_use]
    pub fn new(element: usize, facet: usize) -> Self {
        Self { element, facet }
    }
}

pub(crate) mod storage {
    use super::{ElementStore, Point3};
    use crate::error::Result;

    /// Mutable access reserved to the builders of this crate.
    pub trait VertexStorage {
        fn points_mut(&mut self) -> &mut Vec<Point3>;

        /// Appends a vertex, keeping any per-vertex tables in sync.
        fn push_point(&mut self, point: Point3) -> usize;

        /// Removes flagged vertices and returns the old to new index map.
        fn remove_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>>;
    }

    pub trait ElementStorage: VertexStorage {
        fn store(&self) -> &ElementStore;

        fn store_mut(&mut self) -> &mut ElementStore;

        /// Local facet layout of a new element with `nb_vertices` corners.
        fn default_facets(&self, nb_vertices: usize) -> Result<Vec<Vec<usize>>>;
    }
}

/// Meshes owning a set of vertices with coordinates.
pub trait HasVertices: storage::VertexStorage {
    /// Returns the tag of the concrete mesh variant.
    fn kind(&self) -> MeshKind;

    /// Returns all vertex coordinates, indexed by vertex.
    fn points(&self) -> &[Point3];

    /// Returns a counter advanced by every call that deletes at least one
    /// vertex. Vertex indices are only stable between two revisions.
    fn vertex_revision(&self) -> u64;

    /// Returns the number of vertices.
    fn nb_vertices(&self) -> usize {
        self.points().len()
    }

    /// Returns the coordinates of a vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the vertex does not exist.
    fn point(&self, vertex: usize) -> Result<&Point3> {
        let points = self.points();
        points
            .get(vertex)
            .ok_or_else(|| MeshError::out_of_range("vertex", vertex, points.len()).into())
    }
}

/// Meshes owning elements (edges, polygons or polyhedra) built on their vertices.
pub trait HasElements: HasVertices + storage::ElementStorage {
    /// Returns the number of elements.
    fn nb_elements(&self) -> usize {
        self.store().len()
    }

    /// Returns the ordered vertices of an element.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element does not exist.
    fn element_vertices(&self, element: usize) -> Result<&[usize]> {
        Ok(&self.store().element(element)?.vertices)
    }

    /// Returns the mesh vertex at an element vertex slot.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element or the slot does not exist.
    fn element_vertex(&self, element_vertex: ElementVertex) -> Result<usize> {
        let vertices = self.element_vertices(element_vertex.element)?;
        vertices.get(element_vertex.vertex).copied().ok_or_else(|| {
            MeshError::out_of_range("element vertex", element_vertex.vertex, vertices.len())
                .into()
        })
    }

    /// Returns one element slot incident to the vertex, or `None` if the
    /// vertex is isolated.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the vertex does not exist.
    fn element_around_vertex(&self, vertex: usize) -> Result<Option<ElementVertex>> {
        self.store().anchor(vertex)
    }

    /// Returns the arithmetic mean of the element vertex coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element does not exist.
    fn element_barycenter(&self, element: usize) -> Result<Point3> {
        let vertices = self.element_vertices(element)?;
        mean_of(self, vertices)
    }
}

/// Element meshes recording which element lies across each facet.
pub trait HasAdjacency: HasElements {
    /// Returns the number of facets of an element.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element does not exist.
    fn nb_element_facets(&self, element: usize) -> Result<usize> {
        Ok(self.store().element(element)?.facets.len())
    }

    /// Returns the mesh vertices of a facet, in facet order.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element or facet does not exist.
    fn facet_vertices(&self, facet: ElementFacet) -> Result<Vec<usize>> {
        self.store().facet_vertices(facet)
    }

    /// Returns the element across a facet, or `None` on a border facet.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element or facet does not exist.
    fn adjacent(&self, facet: ElementFacet) -> Result<Option<usize>> {
        let element = self.store().element(facet.element)?;
        element.adjacents.get(facet.facet).copied().ok_or_else(|| {
            MeshError::out_of_range("element facet", facet.facet, element.adjacents.len()).into()
        })
    }

    /// Returns the local facets of an element without neighbor.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element does not exist.
    fn facets_on_border(&self, element: usize) -> Result<Vec<usize>> {
        Ok(self
            .store()
            .element(element)?
            .adjacents
            .iter()
            .enumerate()
            .filter(|(_, adjacent)| adjacent.is_none())
            .map(|(facet, _)| facet)
            .collect())
    }

    /// Returns every element around a vertex, walking adjacencies from the
    /// element associated with the vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the vertex does not exist.
    fn elements_around_vertex(&self, vertex: usize) -> Result<Vec<usize>> {
        let Some(start) = self.element_around_vertex(vertex)? else {
            return Ok(Vec::new());
        };
        let store = self.store();
        let mut visited = vec![false; store.len()];
        visited[start.element] = true;
        let mut found = vec![start.element];
        let mut stack = vec![start.element];
        while let Some(current) = stack.pop() {
            let element = store.element(current)?;
            for (local, facet) in element.facets.iter().enumerate() {
                if !facet.iter().any(|&slot| element.vertices[slot] == vertex) {
                    continue;
                }
                if let Some(next) = element.adjacents[local] {
                    if !std::mem::replace(&mut visited[next], true) {
                        found.push(next);
                        stack.push(next);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Returns the arithmetic mean of the facet vertex coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element or facet does not exist.
    fn facet_barycenter(&self, facet: ElementFacet) -> Result<Point3> {
        let vertices = self.facet_vertices(facet)?;
        mean_of(self, &vertices)
    }
}

/// Element meshes whose elements are polyhedra with explicit facet lists.
pub trait HasVolumeElements: HasAdjacency {
    /// Returns the local vertex slots of a polyhedron facet.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the element or facet does not exist.
    fn facet_local_vertices(&self, facet: ElementFacet) -> Result<&[usize]> {
        let element = self.store().element(facet.element)?;
        element.facets.get(facet.facet).map(Vec::as_slice).ok_or_else(|| {
            MeshError::out_of_range("element facet", facet.facet, element.facets.len()).into()
        })
    }
}

fn mean_of<M: HasVertices + ?Sized>(mesh: &M, vertices: &[usize]) -> Result<Point3> {
    let points = vertices
        .iter()
        .map(|&vertex| mesh.point(vertex))
        .collect::<Result<Vec<_>>>()?;
    math::barycenter(points).ok_or_else(|| {
        MeshError::InvalidElement("cannot take the barycenter of no vertex".into()).into()
    })
}
