use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{BrepError, MeshError, ModelError, Result};
use crate::mesh::{
    EdgedCurve, HasAdjacency, MeshTopologyBuilder, PointSet, PolygonalSurface, PolyhedralSolid,
    VertexSetBuilder,
};

use super::component::{
    Block, Component, ComponentId, ComponentKind, ComponentType, Corner, Line, MeshPayload,
    ModelBoundary, Surface,
};
use super::vertex_identifier::ComponentVertex;
use super::Model;

/// The only way to mutate a [`Model`]: every call updates the component
/// registries, the relation graph and the unique vertex mapping together.
///
/// Vertices created through the mesh builders returned by
/// [`ModelBuilder::line_mesh_builder`] and its siblings are picked up as
/// unmapped vertices. Vertices deleted through them leave the unique
/// vertices stale until [`ModelBuilder::update_unique_vertices`] is called
/// with the returned renumbering; [`ModelBuilder::delete_vertices`] does
/// both in one call.
pub struct ModelBuilder<'a> {
    model: &'a mut Model,
}

impl<'a> ModelBuilder<'a> {
    /// Creates a builder editing `model`.
    pub fn new(model: &'a mut Model) -> Self {
        Self { model }
    }

    /// Renames the model.
    pub fn set_model_name(&mut self, name: impl Into<String>) {
        self.model.name = name.into();
    }

    /// Inserts a new component of kind `K` owning `mesh` and returns its
    /// fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvariantViolation`] if the generated
    /// identifier is already in use.
    pub fn add_component<K: ComponentKind>(&mut self, mesh: K::Mesh) -> Result<Uuid> {
        let component = Component::<K>::new(mesh);
        let id = component.id();
        let component_id = component.component_id();
        if self.model.relationships.is_registered(&id) {
            return Err(misuse(format!("{component_id} already exists")));
        }
        let nb_vertices = MeshPayload::nb_vertices(component.mesh());
        let revision = MeshPayload::vertex_revision(component.mesh());
        K::registry_mut(self.model).add(component)?;
        self.model.relationships.register_node(component_id)?;
        self.model
            .unique_vertices
            .register_component(component_id, nb_vertices, revision);
        Ok(id)
    }

    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_corner(&mut self) -> Result<Uuid> {
        self.add_component::<Corner>(PointSet::new())
    }

    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_line(&mut self) -> Result<Uuid> {
        self.add_component::<Line>(EdgedCurve::new())
    }

    /// Adds a surface meshed by polygons of any size.
    ///
    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_surface(&mut self) -> Result<Uuid> {
        self.add_component::<Surface>(PolygonalSurface::new())
    }

    /// Adds a surface meshed by triangles only.
    ///
    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_triangulated_surface(&mut self) -> Result<Uuid> {
        self.add_component::<Surface>(PolygonalSurface::triangulated())
    }

    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_block(&mut self) -> Result<Uuid> {
        self.add_component::<Block>(PolyhedralSolid::new())
    }

    /// # Errors
    ///
    /// See [`ModelBuilder::add_component`].
    pub fn add_model_boundary(&mut self) -> Result<Uuid> {
        self.add_component::<ModelBoundary>(())
    }

    /// Removes a component with its relations and its unique vertex
    /// entries, and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no component of kind `K` has this
    /// identifier.
    pub fn remove_component<K: ComponentKind>(&mut self, id: &Uuid) -> Result<Component<K>> {
        let component = K::registry_mut(self.model).remove(id)?;
        self.model.relationships.remove_node(id)?;
        self.model.unique_vertices.unregister_component(id)?;
        Ok(component)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the corner does not exist.
    pub fn remove_corner(&mut self, id: &Uuid) -> Result<()> {
        self.remove_component::<Corner>(id).map(drop)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the line does not exist.
    pub fn remove_line(&mut self, id: &Uuid) -> Result<()> {
        self.remove_component::<Line>(id).map(drop)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the surface does not exist.
    pub fn remove_surface(&mut self, id: &Uuid) -> Result<()> {
        self.remove_component::<Surface>(id).map(drop)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the block does not exist.
    pub fn remove_block(&mut self, id: &Uuid) -> Result<()> {
        self.remove_component::<Block>(id).map(drop)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the model boundary does not exist.
    pub fn remove_model_boundary(&mut self, id: &Uuid) -> Result<()> {
        self.remove_component::<ModelBoundary>(id).map(drop)
    }

    /// Renames a component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no component of kind `K` has this
    /// identifier.
    pub fn set_component_name<K: ComponentKind>(
        &mut self,
        id: &Uuid,
        name: impl Into<String>,
    ) -> Result<()> {
        K::registry_mut(self.model).get_mut(id)?.set_name(name.into());
        Ok(())
    }

    /// Replaces the mesh of a component and returns the previous one. The
    /// component's unique vertex entries are dropped; its new vertices start
    /// unmapped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no component of kind `K` has this
    /// identifier.
    pub fn update_mesh<K: ComponentKind>(&mut self, id: &Uuid, mesh: K::Mesh) -> Result<K::Mesh> {
        let nb_vertices = MeshPayload::nb_vertices(&mesh);
        let revision = MeshPayload::vertex_revision(&mesh);
        let component = K::registry_mut(self.model).get_mut(id)?;
        let component_id = component.component_id();
        let previous = component.replace_mesh(mesh);
        let mapping = &mut self.model.unique_vertices;
        mapping.unregister_component(id)?;
        mapping.register_component(component_id, nb_vertices, revision);
        Ok(previous)
    }

    /// Records `boundary` as a boundary of `incident`. The boundary must be
    /// exactly one dimension below the incident component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] for an absent component and
    /// [`ModelError::InvariantViolation`] for incompatible component types.
    pub fn add_boundary_relation(&mut self, boundary: &Uuid, incident: &Uuid) -> Result<()> {
        let (b, i) = (self.existing(boundary)?, self.existing(incident)?);
        match (b.component_type.dimension(), i.component_type.dimension()) {
            (Some(db), Some(di)) if db + 1 == di => {}
            _ => return Err(misuse(format!("{b} cannot be a boundary of {i}"))),
        }
        self.model.relationships.add_boundary_relation(boundary, incident)
    }

    /// Records `internal` as embedded inside `embedding`. The internal
    /// component must be of lower dimension.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] for an absent component and
    /// [`ModelError::InvariantViolation`] for incompatible component types.
    pub fn add_internal_relation(&mut self, internal: &Uuid, embedding: &Uuid) -> Result<()> {
        let (a, e) = (self.existing(internal)?, self.existing(embedding)?);
        match (a.component_type.dimension(), e.component_type.dimension()) {
            (Some(da), Some(de)) if da < de => {}
            _ => return Err(misuse(format!("{a} cannot be internal to {e}"))),
        }
        self.model.relationships.add_internal_relation(internal, embedding)
    }

    /// Records `item` as a member of the model boundary `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] for an absent component and
    /// [`ModelError::InvariantViolation`] if `collection` is not a model
    /// boundary or `item` is one.
    pub fn add_item_in_collection(&mut self, item: &Uuid, collection: &Uuid) -> Result<()> {
        let (i, c) = (self.existing(item)?, self.existing(collection)?);
        if c.component_type != ComponentType::ModelBoundary
            || i.component_type == ComponentType::ModelBoundary
        {
            return Err(misuse(format!("{i} cannot be an item of {c}")));
        }
        self.model.relationships.add_item_in_collection(item, collection)
    }

    /// Returns a builder over the mesh of a corner.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the corner does not exist.
    pub fn corner_mesh_builder(&mut self, id: &Uuid) -> Result<VertexSetBuilder<'_, PointSet>> {
        Ok(VertexSetBuilder::new(self.model.corners.get_mut(id)?.mesh_mut()))
    }

    /// Returns a builder over the mesh of a line.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the line does not exist.
    pub fn line_mesh_builder(&mut self, id: &Uuid) -> Result<MeshTopologyBuilder<'_, EdgedCurve>> {
        Ok(MeshTopologyBuilder::new(self.model.lines.get_mut(id)?.mesh_mut()))
    }

    /// Returns a builder over the mesh of a surface.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the surface does not exist.
    pub fn surface_mesh_builder(
        &mut self,
        id: &Uuid,
    ) -> Result<MeshTopologyBuilder<'_, PolygonalSurface>> {
        Ok(MeshTopologyBuilder::new(self.model.surfaces.get_mut(id)?.mesh_mut()))
    }

    /// Returns a builder over the mesh of a block.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the block does not exist.
    pub fn block_mesh_builder(
        &mut self,
        id: &Uuid,
    ) -> Result<MeshTopologyBuilder<'_, PolyhedralSolid>> {
        Ok(MeshTopologyBuilder::new(self.model.blocks.get_mut(id)?.mesh_mut()))
    }

    /// Appends `count` vertices at the origin to a component mesh and
    /// returns the first new index. The new vertices are unmapped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the component does not exist,
    /// [`ModelError::InvariantViolation`] for a component without mesh or
    /// with stale unique vertices.
    pub fn create_vertices<K: ComponentKind>(&mut self, id: &Uuid, count: usize) -> Result<usize> {
        let component = K::registry(self.model).get(id)?;
        let component_id = component.component_id();
        if component.mesh().mesh_kind().is_none() {
            return Err(misuse(format!("{component_id} carries no mesh")));
        }
        self.sync_vertices(component_id)?;
        let first = K::registry_mut(self.model)
            .get_mut(id)?
            .mesh_mut()
            .create_vertices(count);
        self.sync_vertices(component_id)?;
        Ok(first)
    }

    /// Deletes the flagged vertices of a component mesh, with the elements
    /// using them, and applies the renumbering to the unique vertices.
    ///
    /// Returns the map from old to new vertex indices.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the component does not exist,
    /// [`MeshError::OutOfRange`] for a mask of the wrong length and
    /// [`ModelError::InvariantViolation`] if the unique vertices were stale.
    pub fn delete_vertices<K: ComponentKind>(
        &mut self,
        id: &Uuid,
        to_delete: &[bool],
    ) -> Result<Vec<Option<usize>>> {
        let component_id = K::registry(self.model).get(id)?.component_id();
        self.sync_vertices(component_id)?;
        let old_to_new = K::registry_mut(self.model)
            .get_mut(id)?
            .mesh_mut()
            .delete_vertices(to_delete)?;
        self.model
            .unique_vertices
            .update_component_vertices(id, &old_to_new)?;
        Ok(old_to_new)
    }

    /// Deletes the flagged elements of a component mesh. Vertices are kept,
    /// so the unique vertices are unaffected.
    ///
    /// Returns the map from old to new element indices.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the component does not exist and
    /// [`MeshError::OutOfRange`] for a mask of the wrong length.
    pub fn delete_elements<K>(
        &mut self,
        id: &Uuid,
        to_delete: &[bool],
    ) -> Result<Vec<Option<usize>>>
    where
        K: ComponentKind,
        K::Mesh: HasAdjacency,
    {
        let mesh = K::registry_mut(self.model).get_mut(id)?.mesh_mut();
        MeshTopologyBuilder::new(mesh).delete_elements(to_delete)
    }

    /// Applies a renumbering produced by a mesh builder to the unique
    /// vertices of a component. Renumberings must be applied once each, in
    /// the order the deletions happened.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the component does not exist,
    /// [`MeshError::OutOfRange`] if the map does not cover the tracked
    /// vertices or does not produce the mesh vertex count, and
    /// [`ModelError::InvariantViolation`] if the map is not the next
    /// deletion the mesh went through.
    pub fn update_unique_vertices(
        &mut self,
        id: &Uuid,
        old_to_new: &[Option<usize>],
    ) -> Result<()> {
        let component = self.existing(id)?;
        let (nb_vertices, revision) = self.model.mesh_vertex_state(component)?;
        let nb_new = old_to_new.iter().flatten().count();
        if nb_new > nb_vertices {
            return Err(MeshError::out_of_range("vertex", nb_new, nb_vertices).into());
        }
        let tracked = self.tracked_revision(component)?;
        let drops = u64::from(nb_new < old_to_new.len());
        if tracked + drops != revision {
            return Err(misuse(format!(
                "renumbering of {component} does not follow its vertex revision \
                 {tracked} towards {revision}"
            )));
        }
        self.model
            .unique_vertices
            .update_component_vertices(id, old_to_new)?;
        self.sync_vertices(component)
    }

    /// Appends one unique vertex and returns its index.
    pub fn create_unique_vertex(&mut self) -> usize {
        self.model.unique_vertices.create_unique_vertex()
    }

    /// Appends `count` unique vertices and returns the first new index.
    pub fn create_unique_vertices(&mut self, count: usize) -> usize {
        self.model.unique_vertices.create_unique_vertices(count)
    }

    /// Associates a component vertex with a unique vertex; see
    /// [`super::UniqueVertexMapping::set`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the component does not exist,
    /// [`MeshError::OutOfRange`] if the vertex does not exist and
    /// [`ModelError::InvariantViolation`] if the unique vertices are stale.
    pub fn set_unique_vertex(
        &mut self,
        component_vertex: ComponentVertex,
        unique: usize,
    ) -> Result<()> {
        let component = self.existing(&component_vertex.component.id)?;
        if component != component_vertex.component {
            return Err(ModelError::NotFound(component_vertex.component.to_string()).into());
        }
        let nb_vertices = self.model.nb_mesh_vertices(component)?;
        if component_vertex.vertex >= nb_vertices {
            return Err(
                MeshError::out_of_range("vertex", component_vertex.vertex, nb_vertices).into(),
            );
        }
        self.sync_vertices(component)?;
        self.model.unique_vertices.set(component_vertex, unique)
    }

    /// Copies every component, relation and unique vertex of `other` into
    /// this model under fresh identifiers.
    ///
    /// Returns the map from the identifiers of `other` to the new ones.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` is internally inconsistent.
    pub fn copy_from(&mut self, other: &Model) -> Result<HashMap<Uuid, Uuid>> {
        let mut mapping = HashMap::new();
        self.copy_components::<Corner>(other, &mut mapping)?;
        self.copy_components::<Line>(other, &mut mapping)?;
        self.copy_components::<Surface>(other, &mut mapping)?;
        self.copy_components::<Block>(other, &mut mapping)?;
        self.copy_components::<ModelBoundary>(other, &mut mapping)?;

        let translate = |id: &Uuid| {
            mapping
                .get(id)
                .copied()
                .ok_or_else(|| BrepError::from(ModelError::NotFound(id.to_string())))
        };
        for (kind, from, to) in other.relationships.relations() {
            self.model
                .relationships
                .add_relation(kind, &translate(&from.id)?, &translate(&to.id)?)?;
        }
        let first = self
            .model
            .unique_vertices
            .create_unique_vertices(other.unique_vertices.count());
        for unique in 0..other.unique_vertices.count() {
            for member in other.unique_vertices.members(unique, None)? {
                let component = ComponentId::new(
                    member.component.component_type,
                    translate(&member.component.id)?,
                );
                self.model
                    .unique_vertices
                    .set(ComponentVertex::new(component, member.vertex), first + unique)?;
            }
        }
        Ok(mapping)
    }

    fn copy_components<K: ComponentKind>(
        &mut self,
        other: &Model,
        mapping: &mut HashMap<Uuid, Uuid>,
    ) -> Result<()> {
        for (id, component) in other.components::<K>().iter() {
            let new_id = self.add_component::<K>(component.mesh().clone())?;
            self.set_component_name::<K>(&new_id, component.name())?;
            mapping.insert(*id, new_id);
        }
        Ok(())
    }

    /// Typed identifier of an existing component.
    fn existing(&self, id: &Uuid) -> Result<ComponentId> {
        self.model
            .relationships
            .component_id(id)
            .map_err(|_| ModelError::NotFound(id.to_string()).into())
    }

    fn tracked_revision(&self, component: ComponentId) -> Result<u64> {
        self.model
            .unique_vertices
            .component_revision(&component.id)
            .ok_or_else(|| ModelError::NotFound(component.to_string()).into())
    }

    /// Extends the tracked vertices of a component to the mesh vertex count.
    /// Fails if the mesh deleted vertices the mapping has not seen.
    fn sync_vertices(&mut self, component: ComponentId) -> Result<()> {
        let (nb_vertices, revision) = self.model.mesh_vertex_state(component)?;
        let tracked_revision = self.tracked_revision(component)?;
        if tracked_revision != revision {
            return Err(misuse(format!(
                "unique vertices of {component} are stale: \
                 mesh vertex revision {revision}, tracked {tracked_revision}"
            )));
        }
        let mapping = &mut self.model.unique_vertices;
        let tracked = mapping
            .nb_component_vertices(&component.id)
            .ok_or_else(|| ModelError::NotFound(component.to_string()))?;
        match tracked.cmp(&nb_vertices) {
            Ordering::Less => mapping.add_component_vertices(&component.id, nb_vertices - tracked),
            Ordering::Equal => Ok(()),
            Ordering::Greater => Err(misuse(format!(
                "unique vertices of {component} are stale: \
                 {tracked} tracked for {nb_vertices} mesh vertices"
            ))),
        }
    }
}

fn misuse(message: String) -> BrepError {
    ModelError::InvariantViolation(message).into()
}
