use std::collections::HashMap;

use crate::error::{MeshError, Result};
use crate::math::Point3;
use crate::mesh::storage::{ElementStorage, VertexStorage};
use crate::mesh::{
    ElementFacet, ElementStore, ElementVertex, HasAdjacency, HasElements, HasVertices,
    HasVolumeElements,
};

use super::{check_mask, old_to_new, retain_unmasked, set_point};

/// Mutation engine for element meshes: vertex and element creation,
/// adjacency computation, deletion with dense re-indexing and the
/// vertex to element association.
///
/// Edits are not transactional. After a failed call the mesh may be
/// partially modified and should be discarded or reloaded.
pub struct MeshTopologyBuilder<'a, M: HasAdjacency> {
    mesh: &'a mut M,
}

impl<'a, M: HasAdjacency> MeshTopologyBuilder<'a, M> {
    /// Creates a builder editing `mesh`.
    pub fn new(mesh: &'a mut M) -> Self {
        Self { mesh }
    }

    /// Returns the mesh being edited.
    #[must_use]
    pub fn mesh(&self) -> &M {
        self.mesh
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

    /// Appends an element over the given ordered vertices and returns its
    /// index. Adjacencies are left unset.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown vertex and
    /// [`MeshError::InvalidElement`] if the vertex count does not suit the
    /// mesh kind.
    pub fn create_element(&mut self, vertices: &[usize]) -> Result<usize> {
        self.check_vertices(vertices)?;
        let facets = self.mesh.default_facets(vertices.len())?;
        Ok(self.mesh.store_mut().push(vertices.to_vec(), facets))
    }

    /// Replaces the mesh vertex at an element slot.
    ///
    /// Adjacencies are not updated.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown element, slot or vertex.
    pub fn set_element_vertex(&mut self, slot: ElementVertex, vertex: usize) -> Result<()> {
        self.check_vertices(&[vertex])?;
        let store = self.mesh.store_mut();
        let element = store.element_mut(slot.element)?;
        let len = element.vertices.len();
        let entry = element
            .vertices
            .get_mut(slot.vertex)
            .ok_or(MeshError::out_of_range("element vertex", slot.vertex, len))?;
        let previous = std::mem::replace(entry, vertex);
        store.set_anchor(vertex, Some(slot))?;
        if previous != vertex && store.anchor(previous)? == Some(slot) {
            store.repair_anchors();
        }
        Ok(())
    }

    /// Records the element across a facet (`None` marks a border facet).
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown element or facet, or
    /// an unknown adjacent element.
    pub fn set_adjacent(&mut self, facet: ElementFacet, adjacent: Option<usize>) -> Result<()> {
        let nb_elements = self.mesh.nb_elements();
        if let Some(adjacent) = adjacent {
            if adjacent >= nb_elements {
                return Err(MeshError::out_of_range("element", adjacent, nb_elements).into());
            }
        }
        let element = self.mesh.store_mut().element_mut(facet.element)?;
        let len = element.adjacents.len();
        let entry = element
            .adjacents
            .get_mut(facet.facet)
            .ok_or(MeshError::out_of_range("element facet", facet.facet, len))?;
        *entry = adjacent;
        Ok(())
    }

    /// Computes the adjacencies of every element.
    ///
    /// # Errors
    ///
    /// Only fails on an internally inconsistent mesh.
    pub fn compute_adjacencies(&mut self) -> Result<()> {
        link_adjacencies(self.mesh.store_mut(), None)
    }

    /// Computes the adjacencies of the given elements. Neighbors may lie
    /// outside `elements`; they receive the reciprocal link.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown element.
    pub fn compute_adjacencies_for(&mut self, elements: &[usize]) -> Result<()> {
        link_adjacencies(self.mesh.store_mut(), Some(elements))
    }

    /// Deletes the flagged vertices, together with every element using one
    /// of them, and compacts the survivors in their original order.
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

    /// Deletes the flagged elements and compacts the survivors in their
    /// original order. Adjacencies towards deleted elements become border
    /// facets.
    ///
    /// Returns the map from old to new element indices.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the mask length differs from the
    /// element count.
    pub fn delete_elements(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        remove_elements(self.mesh.store_mut(), to_delete)
    }

    /// Returns one element slot incident to the vertex, or `None` if the
    /// vertex is isolated.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the vertex does not exist.
    pub fn element_around_vertex(&self, vertex: usize) -> Result<Option<ElementVertex>> {
        self.mesh.element_around_vertex(vertex)
    }

    /// Overrides the element slot associated with a vertex. The slot must
    /// hold that vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown element, slot or
    /// vertex, and [`MeshError::InvalidElement`] if the slot holds another
    /// vertex.
    pub fn associate_vertex(&mut self, slot: ElementVertex, vertex: usize) -> Result<()> {
        self.check_vertices(&[vertex])?;
        let held = self.mesh.element_vertex(slot)?;
        if held != vertex {
            return Err(MeshError::InvalidElement(format!(
                "slot {} of element {} holds vertex {held}, not {vertex}",
                slot.vertex, slot.element
            ))
            .into());
        }
        self.mesh.store_mut().set_anchor(vertex, Some(slot))
    }

    fn check_vertices(&self, vertices: &[usize]) -> Result<()> {
        let nb_vertices = self.mesh.nb_vertices();
        match vertices.iter().find(|&&v| v >= nb_vertices) {
            Some(&vertex) => Err(MeshError::out_of_range("vertex", vertex, nb_vertices).into()),
            None => Ok(()),
        }
    }
}

impl<M: HasVolumeElements> MeshTopologyBuilder<'_, M> {
    /// Appends a polyhedron and returns its index. Each facet is an ordered
    /// list of local slots into `vertices`, oriented outward.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] for an unknown vertex or slot, and
    /// [`MeshError::InvalidElement`] for a degenerate polyhedron.
    pub fn create_polyhedron(
        &mut self,
        vertices: &[usize],
        facets: &[Vec<usize>],
    ) -> Result<usize> {
        self.check_vertices(vertices)?;
        if vertices.len() < 4 || facets.len() < 4 {
            return Err(MeshError::InvalidElement(format!(
                "a polyhedron needs at least 4 vertices and 4 facets, got {} and {}",
                vertices.len(),
                facets.len()
            ))
            .into());
        }
        for facet in facets {
            if facet.len() < 3 {
                return Err(
                    MeshError::InvalidElement("a facet needs at least 3 vertices".into()).into(),
                );
            }
            if let Some(&slot) = facet.iter().find(|&&slot| slot >= vertices.len()) {
                return Err(MeshError::out_of_range("element vertex", slot, vertices.len()).into());
            }
        }
        Ok(self
            .mesh
            .store_mut()
            .push(vertices.to_vec(), facets.to_vec()))
    }
}

/// Pairs facets through a hash index on their sorted vertex sets. A
/// signature shared by exactly two facets of distinct elements is a link;
/// any other facet of a requested element becomes a border facet.
fn link_adjacencies(store: &mut ElementStore, subset: Option<&[usize]>) -> Result<()> {
    let nb_elements = store.len();
    let mut requested = vec![subset.is_none(); nb_elements];
    for &element in subset.unwrap_or_default() {
        let flag = requested
            .get_mut(element)
            .ok_or(MeshError::out_of_range("element", element, nb_elements))?;
        *flag = true;
    }

    let mut facets_by_signature: HashMap<Vec<usize>, Vec<ElementFacet>> = HashMap::new();
    for (index, element) in store.elements().iter().enumerate() {
        for (local, facet) in element.facets.iter().enumerate() {
            let mut signature: Vec<usize> =
                facet.iter().map(|&slot| element.vertices[slot]).collect();
            signature.sort_unstable();
            facets_by_signature
                .entry(signature)
                .or_default()
                .push(ElementFacet::new(index, local));
        }
    }

    let elements = store.elements_mut();
    for facets in facets_by_signature.values() {
        match facets.as_slice() {
            [a, b]
                if a.element != b.element && (requested[a.element] || requested[b.element]) =>
            {
                elements[a.element].adjacents[a.facet] = Some(b.element);
                elements[b.element].adjacents[b.facet] = Some(a.element);
            }
            _ => {
                for facet in facets.iter().filter(|f| requested[f.element]) {
                    elements[facet.element].adjacents[facet.facet] = None;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn remove_elements(
    store: &mut ElementStore,
    to_delete: &[bool],
) -> Result<Vec<Option<usize>>> {
    check_mask(to_delete, store.len(), "element")?;
    let map = old_to_new(to_delete);
    let translate = |old: usize| map.get(old).copied().flatten();

    retain_unmasked(store.elements_mut(), to_delete);
    for element in store.elements_mut() {
        for adjacent in &mut element.adjacents {
            *adjacent = adjacent.and_then(translate);
        }
    }
    for anchor in store.anchors_mut() {
        *anchor = anchor.and_then(|slot| {
            translate(slot.element).map(|element| ElementVertex::new(element, slot.vertex))
        });
    }
    store.repair_anchors();
    Ok(map)
}

pub(crate) fn remove_vertices(
    points: &mut Vec<Point3>,
    store: &mut ElementStore,
    to_delete: &[bool],
) -> Result<Vec<Option<usize>>> {
    check_mask(to_delete, points.len(), "vertex")?;
    // Every element touching a removed vertex goes in the same pass, so
    // the remaining adjacencies are already a fixed point.
    let doomed: Vec<bool> = store
        .elements()
        .iter()
        .map(|element| {
            element
                .vertices
                .iter()
                .any(|&v| to_delete.get(v).copied().unwrap_or(false))
        })
        .collect();
    if doomed.contains(&true) {
        remove_elements(store, &doomed)?;
    }

    let map = old_to_new(to_delete);
    retain_unmasked(points, to_delete);
    retain_unmasked(store.anchors_mut(), to_delete);
    for element in store.elements_mut() {
        for vertex in &mut element.vertices {
            if let Some(new) = map.get(*vertex).copied().flatten() {
                *vertex = new;
            }
        }
    }
    Ok(map)
}
