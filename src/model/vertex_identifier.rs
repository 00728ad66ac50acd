use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FormatError, MeshError, ModelError, Result};
use crate::io::archive;

use super::component::{ComponentId, ComponentType};

/// A local vertex of one component mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentVertex {
    /// Owning component.
    pub component: ComponentId,
    /// Vertex index in the component mesh.
    pub vertex: usize,
}

impl ComponentVertex {
    /// Creates a new component vertex reference.
    #[must_use]
    pub fn new(component: ComponentId, vertex: usize) -> Self {
        Self { component, vertex }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalVertices {
    component: ComponentId,
    /// Mesh vertex revision the local indices refer to.
    revision: u64,
    unique: Vec<Option<usize>>,
}

/// Maps local component vertices to model-wide unique vertices.
///
/// Each local vertex of a registered component belongs to at most one
/// unique vertex; a unique vertex may gather any number of local ones.
/// The mapping does not follow mesh edits on its own: whoever renumbers a
/// mesh must call [`UniqueVertexMapping::update_component_vertices`]. Each
/// component records the mesh vertex revision its indices refer to, so a
/// missed renumbering shows up as a revision mismatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniqueVertexMapping {
    members: Vec<Vec<ComponentVertex>>,
    components: HashMap<Uuid, LocalVertices>,
}

impl UniqueVertexMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of unique vertices.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the component takes part in the mapping.
    #[must_use]
    pub fn is_registered(&self, id: &Uuid) -> bool {
        self.components.contains_key(id)
    }

    /// Returns the number of tracked components.
    #[must_use]
    pub fn nb_components(&self) -> usize {
        self.components.len()
    }

    /// Returns the number of local vertices tracked for a component.
    #[must_use]
    pub fn nb_component_vertices(&self, id: &Uuid) -> Option<usize> {
        self.components.get(id).map(|local| local.unique.len())
    }

    /// Returns the mesh vertex revision a tracked component refers to.
    #[must_use]
    pub fn component_revision(&self, id: &Uuid) -> Option<u64> {
        self.components.get(id).map(|local| local.revision)
    }

    /// Starts tracking a component with `nb_vertices` unmapped vertices at
    /// the given mesh vertex revision. Registering an already tracked
    /// component is a no-op.
    pub fn register_component(
        &mut self,
        component: ComponentId,
        nb_vertices: usize,
        revision: u64,
    ) {
        self.components
            .entry(component.id)
            .or_insert_with(|| LocalVertices {
                component,
                revision,
                unique: vec![None; nb_vertices],
            });
    }

    /// Stops tracking a component and detaches its vertices from every
    /// unique vertex. Unique vertices themselves are kept, even if empty.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the component is not tracked.
    pub fn unregister_component(&mut self, id: &Uuid) -> Result<()> {
        let local = self
            .components
            .remove(id)
            .ok_or_else(|| ModelError::UnknownComponent(id.to_string()))?;
        for unique in local.unique.into_iter().flatten() {
            if let Some(members) = self.members.get_mut(unique) {
                members.retain(|cv| cv.component.id != *id);
            }
        }
        Ok(())
    }

    /// Appends `count` unmapped vertices to a tracked component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the component is not tracked.
    pub fn add_component_vertices(&mut self, id: &Uuid, count: usize) -> Result<()> {
        let local = self.local_mut(id)?;
        local.unique.resize(local.unique.len() + count, None);
        Ok(())
    }

    /// Appends one unique vertex and returns its index.
    pub fn create_unique_vertex(&mut self) -> usize {
        self.members.push(Vec::new());
        self.members.len() - 1
    }

    /// Appends `count` unique vertices and returns the first new index.
    pub fn create_unique_vertices(&mut self, count: usize) -> usize {
        let first = self.members.len();
        self.members.resize_with(first + count, Vec::new);
        first
    }

    /// Associates a local vertex with a unique vertex, growing the unique
    /// vertex sequence if needed. A vertex that was already mapped moves to
    /// the new unique vertex.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the component is not
    /// tracked and [`MeshError::OutOfRange`] if the vertex does not exist or
    /// the unique vertex sequence cannot grow to `unique`.
    pub fn set(&mut self, component_vertex: ComponentVertex, unique: usize) -> Result<()> {
        let nb_unique = self.members.len();
        if unique >= nb_unique {
            let additional = unique
                .checked_add(1)
                .map(|len| len - nb_unique)
                .ok_or(MeshError::out_of_range("unique vertex", unique, nb_unique))?;
            // Reserve first: a refused growth leaves the mapping unchanged.
            self.members
                .try_reserve(additional)
                .map_err(|_| MeshError::out_of_range("unique vertex", unique, nb_unique))?;
        }
        let local = self.local_mut(&component_vertex.component.id)?;
        if local.component != component_vertex.component {
            return Err(
                ModelError::UnknownComponent(component_vertex.component.to_string()).into(),
            );
        }
        let len = local.unique.len();
        let slot = local
            .unique
            .get_mut(component_vertex.vertex)
            .ok_or(MeshError::out_of_range("vertex", component_vertex.vertex, len))?;
        let previous = slot.replace(unique);
        if previous == Some(unique) {
            return Ok(());
        }
        if let Some(previous) = previous {
            if let Some(members) = self.members.get_mut(previous) {
                members.retain(|cv| *cv != component_vertex);
            }
        }
        if unique >= self.members.len() {
            self.members.resize_with(unique + 1, Vec::new);
        }
        self.members[unique].push(component_vertex);
        Ok(())
    }

    /// Returns the unique vertex of a local vertex, if mapped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the component is not
    /// tracked and [`MeshError::OutOfRange`] if the vertex does not exist.
    pub fn unique_vertex(&self, component_vertex: ComponentVertex) -> Result<Option<usize>> {
        let local = self
            .components
            .get(&component_vertex.component.id)
            .ok_or_else(|| ModelError::UnknownComponent(component_vertex.component.to_string()))?;
        local
            .unique
            .get(component_vertex.vertex)
            .copied()
            .ok_or_else(|| {
                MeshError::out_of_range("vertex", component_vertex.vertex, local.unique.len())
                    .into()
            })
    }

    /// Returns the local vertices sharing a unique vertex, optionally
    /// restricted to one component type.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] if the unique vertex does not exist.
    pub fn members(
        &self,
        unique: usize,
        filter: Option<ComponentType>,
    ) -> Result<impl Iterator<Item = ComponentVertex> + Clone + '_> {
        let members = self
            .members
            .get(unique)
            .ok_or(MeshError::out_of_range("unique vertex", unique, self.members.len()))?;
        Ok(members
            .iter()
            .copied()
            .filter(move |cv| filter.is_none_or(|t| cv.component.component_type == t)))
    }

    /// Applies a mesh renumbering to a tracked component. Vertices mapped to
    /// `None` are detached from their unique vertex, and a map dropping any
    /// vertex advances the recorded mesh vertex revision by one, matching
    /// the deletion that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the component is not
    /// tracked and [`MeshError::OutOfRange`] if the map does not cover
    /// exactly the tracked vertices.
    pub fn update_component_vertices(
        &mut self,
        id: &Uuid,
        old_to_new: &[Option<usize>],
    ) -> Result<()> {
        let local = self
            .components
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownComponent(id.to_string()))?;
        if old_to_new.len() != local.unique.len() {
            return Err(
                MeshError::out_of_range("vertex", old_to_new.len(), local.unique.len()).into(),
            );
        }
        let nb_new = old_to_new.iter().flatten().count();
        let mut renumbered = vec![None; nb_new];
        for (old, (&unique, &new)) in local.unique.iter().zip(old_to_new).enumerate() {
            let Some(unique) = unique else {
                continue;
            };
            let Some(members) = self.members.get_mut(unique) else {
                continue;
            };
            let target = members
                .iter()
                .position(|cv| cv.component.id == *id && cv.vertex == old);
            match (new, target) {
                (Some(new), Some(position)) => {
                    let slot = renumbered
                        .get_mut(new)
                        .ok_or(MeshError::out_of_range("vertex", new, nb_new))?;
                    *slot = Some(unique);
                    members[position].vertex = new;
                }
                (None, Some(position)) => {
                    members.remove(position);
                }
                _ => {}
            }
        }
        local.unique = renumbered;
        if nb_new < old_to_new.len() {
            local.revision += 1;
        }
        Ok(())
    }

    fn local_mut(&mut self, id: &Uuid) -> Result<&mut LocalVertices> {
        self.components
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownComponent(id.to_string()).into())
    }

    /// Writes the mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        archive::write_record(writer, "unique_vertices", self)
    }

    /// Replaces the mapping with one read from a stream.
    ///
    /// On failure the current mapping is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::CorruptData`] if the stream is truncated,
    /// malformed or inconsistent.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let loaded: Self = archive::read_record(reader, "unique_vertices")?;
        loaded.validate()?;
        *self = loaded;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut nb_mapped = 0;
        for (id, local) in &self.components {
            if *id != local.component.id {
                return Err(corrupt(format!(
                    "{} stored under {id}",
                    local.component
                )));
            }
            nb_mapped += local.unique.iter().flatten().count();
        }
        let mut nb_members = 0;
        for (unique, members) in self.members.iter().enumerate() {
            for cv in members {
                let mapped = self
                    .components
                    .get(&cv.component.id)
                    .and_then(|local| local.unique.get(cv.vertex).copied().flatten());
                if mapped != Some(unique) {
                    return Err(corrupt(format!(
                        "{} vertex {} is listed under unique vertex {unique}",
                        cv.component, cv.vertex
                    )));
                }
            }
            nb_members += members.len();
        }
        if nb_members != nb_mapped {
            return Err(corrupt(format!(
                "{nb_mapped} mapped vertices but {nb_members} members"
            )));
        }
        Ok(())
    }
}

fn corrupt(message: String) -> crate::error::BrepError {
    FormatError::CorruptData(message).into()
}
