use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};

use super::{ElementFacet, ElementVertex};

/// One element: ordered vertices, local facet layout and one neighbor slot
/// per facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Element {
    pub vertices: Vec<usize>,
    pub facets: Vec<Vec<usize>>,
    pub adjacents: Vec<Option<usize>>,
}

/// Element connectivity shared by every element mesh kind.
///
/// `anchors` holds, for each mesh vertex, one element slot incident to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ElementStore {
    elements: Vec<Element>,
    anchors: Vec<Option<ElementVertex>>,
}

impl ElementStore {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, element: usize) -> Result<&Element> {
        self.elements
            .get(element)
            .ok_or_else(|| MeshError::out_of_range("element", element, self.elements.len()).into())
    }

    pub fn element_mut(&mut self, element: usize) -> Result<&mut Element> {
        let len = self.elements.len();
        self.elements
            .get_mut(element)
            .ok_or_else(|| MeshError::out_of_range("element", element, len).into())
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<Element> {
        &mut self.elements
    }

    pub fn anchor(&self, vertex: usize) -> Result<Option<ElementVertex>> {
        self.anchors
            .get(vertex)
            .copied()
            .ok_or_else(|| MeshError::out_of_range("vertex", vertex, self.anchors.len()).into())
    }

    pub fn set_anchor(&mut self, vertex: usize, anchor: Option<ElementVertex>) -> Result<()> {
        let len = self.anchors.len();
        let slot = self
            .anchors
            .get_mut(vertex)
            .ok_or(MeshError::out_of_range("vertex", vertex, len))?;
        *slot = anchor;
        Ok(())
    }

    pub fn anchors_mut(&mut self) -> &mut Vec<Option<ElementVertex>> {
        &mut self.anchors
    }

    pub fn push_vertex(&mut self) {
        self.anchors.push(None);
    }

    /// Appends an element and anchors each of its vertices to it.
    pub fn push(&mut self, vertices: Vec<usize>, facets: Vec<Vec<usize>>) -> usize {
        let index = self.elements.len();
        for (slot, &vertex) in vertices.iter().enumerate() {
            if let Some(anchor) = self.anchors.get_mut(vertex) {
                *anchor = Some(ElementVertex::new(index, slot));
            }
        }
        let adjacents = vec![None; facets.len()];
        self.elements.push(Element {
            vertices,
            facets,
            adjacents,
        });
        index
    }

    pub fn facet_vertices(&self, facet: ElementFacet) -> Result<Vec<usize>> {
        let element = self.element(facet.element)?;
        let local = element.facets.get(facet.facet).ok_or(MeshError::out_of_range(
            "element facet",
            facet.facet,
            element.facets.len(),
        ))?;
        Ok(local.iter().map(|&slot| element.vertices[slot]).collect())
    }

    /// Re-anchors every vertex whose anchor is missing or stale, using the
    /// first element slot found for it.
    pub fn repair_anchors(&mut self) {
        let mut missing: Vec<bool> = self
            .anchors
            .iter()
            .enumerate()
            .map(|(vertex, anchor)| match anchor {
                Some(slot) => self
                    .elements
                    .get(slot.element)
                    .and_then(|element| element.vertices.get(slot.vertex))
                    .is_none_or(|&v| v != vertex),
                None => true,
            })
            .collect();
        for (index, element) in self.elements.iter().enumerate() {
            for (slot, &vertex) in element.vertices.iter().enumerate() {
                if missing.get(vertex).copied().unwrap_or(false) {
                    self.anchors[vertex] = Some(ElementVertex::new(index, slot));
                    missing[vertex] = false;
                }
            }
        }
        for (vertex, is_missing) in missing.into_iter().enumerate() {
            if is_missing {
                self.anchors[vertex] = None;
            }
        }
    }

    /// Checks internal consistency against a vertex count.
    pub fn validate(&self, nb_vertices: usize) -> std::result::Result<(), String> {
        if self.anchors.len() != nb_vertices {
            return Err(format!(
                "{} vertex anchors for {nb_vertices} vertices",
                self.anchors.len()
            ));
        }
        let nb_elements = self.elements.len();
        for (index, element) in self.elements.iter().enumerate() {
            if let Some(&vertex) = element.vertices.iter().find(|&&v| v >= nb_vertices) {
                return Err(format!("element {index} references vertex {vertex}"));
            }
            if element.facets.len() != element.adjacents.len() {
                return Err(format!("element {index} has mismatched facet tables"));
            }
            let nb_slots = element.vertices.len();
            if element.facets.iter().flatten().any(|&slot| slot >= nb_slots) {
                return Err(format!("element {index} has a facet outside its vertices"));
            }
            if element.adjacents.iter().flatten().any(|&adj| adj >= nb_elements) {
                return Err(format!("element {index} has a dangling adjacency"));
            }
        }
        for (vertex, anchor) in self.anchors.iter().enumerate() {
            if let Some(slot) = anchor {
                let matches = self
                    .elements
                    .get(slot.element)
                    .and_then(|element| element.vertices.get(slot.vertex))
                    .is_some_and(|&v| v == vertex);
                if !matches {
                    return Err(format!("vertex {vertex} has a stale element anchor"));
                }
            }
        }
        Ok(())
    }
}
