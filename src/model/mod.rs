pub mod builder;
pub mod component;
pub mod registry;
pub mod relationships;
pub mod vertex_identifier;

pub use builder::ModelBuilder;
pub use component::{
    Block, Component, ComponentId, ComponentKind, ComponentType, Corner, Line, MeshPayload,
    ModelBoundary, Surface,
};
pub use registry::ComponentRegistry;
pub use relationships::{Related, RelationKind, RelationshipGraph};
pub use vertex_identifier::{ComponentVertex, UniqueVertexMapping};

use uuid::Uuid;

use crate::error::{MeshError, ModelError, Result};
use crate::mesh::{EdgedCurve, PointSet, PolygonalSurface, PolyhedralSolid};

/// A boundary representation: typed components, the relations between
/// them and the identification of coincident vertices across their meshes.
///
/// Read access is public; every mutation goes through [`ModelBuilder`] so
/// the registries, the graph and the vertex mapping stay consistent.
#[derive(Debug, Clone)]
pub struct Model {
    id: Uuid,
    name: String,
    corners: ComponentRegistry<Corner>,
    lines: ComponentRegistry<Line>,
    surfaces: ComponentRegistry<Surface>,
    blocks: ComponentRegistry<Block>,
    model_boundaries: ComponentRegistry<ModelBoundary>,
    relationships: RelationshipGraph,
    unique_vertices: UniqueVertexMapping,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            corners: ComponentRegistry::new(),
            lines: ComponentRegistry::new(),
            surfaces: ComponentRegistry::new(),
            blocks: ComponentRegistry::new(),
            model_boundaries: ComponentRegistry::new(),
            relationships: RelationshipGraph::new(),
            unique_vertices: UniqueVertexMapping::new(),
        }
    }
}

impl Model {
    /// Creates an empty model with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extension of the model files.
    #[must_use]
    pub fn native_extension() -> &'static str {
        "brep"
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the model name (empty if unset).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the components of kind `K`.
    #[must_use]
    pub fn components<K: ComponentKind>(&self) -> &ComponentRegistry<K> {
        K::registry(self)
    }

    /// Returns one component of kind `K`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn component<K: ComponentKind>(&self, id: &Uuid) -> Result<&Component<K>> {
        K::registry(self).get(id)
    }

    /// Returns the typed identifier of any component of the model.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn component_id(&self, id: &Uuid) -> Result<ComponentId> {
        self.relationships.component_id(id)
    }

    /// Returns the relation graph.
    #[must_use]
    pub fn relationships(&self) -> &RelationshipGraph {
        &self.relationships
    }

    /// Returns the unique vertex mapping.
    #[must_use]
    pub fn unique_vertices(&self) -> &UniqueVertexMapping {
        &self.unique_vertices
    }

    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn corner(&self, id: &Uuid) -> Result<&Component<Corner>> {
        self.corners.get(id)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn line(&self, id: &Uuid) -> Result<&Component<Line>> {
        self.lines.get(id)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn surface(&self, id: &Uuid) -> Result<&Component<Surface>> {
        self.surfaces.get(id)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn block(&self, id: &Uuid) -> Result<&Component<Block>> {
        self.blocks.get(id)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn model_boundary(&self, id: &Uuid) -> Result<&Component<ModelBoundary>> {
        self.model_boundaries.get(id)
    }

    /// Returns the number of corners.
    #[must_use]
    pub fn nb_corners(&self) -> usize {
        self.corners.count()
    }

    /// Returns the number of lines.
    #[must_use]
    pub fn nb_lines(&self) -> usize {
        self.lines.count()
    }

    /// Returns the number of surfaces.
    #[must_use]
    pub fn nb_surfaces(&self) -> usize {
        self.surfaces.count()
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn nb_blocks(&self) -> usize {
        self.blocks.count()
    }

    /// Returns the number of model boundaries.
    #[must_use]
    pub fn nb_model_boundaries(&self) -> usize {
        self.model_boundaries.count()
    }

    /// Returns the mesh of a corner.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn corner_mesh(&self, id: &Uuid) -> Result<&PointSet> {
        Ok(self.corners.get(id)?.mesh())
    }

    /// Returns the mesh of a line.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn line_mesh(&self, id: &Uuid) -> Result<&EdgedCurve> {
        Ok(self.lines.get(id)?.mesh())
    }

    /// Returns the mesh of a surface.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn surface_mesh(&self, id: &Uuid) -> Result<&PolygonalSurface> {
        Ok(self.surfaces.get(id)?.mesh())
    }

    /// Returns the mesh of a block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the identifier is absent.
    pub fn block_mesh(&self, id: &Uuid) -> Result<&PolyhedralSolid> {
        Ok(self.blocks.get(id)?.mesh())
    }

    /// Components bounding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn boundaries(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.boundaries(id)
    }

    /// Components bounded by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn incidences(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.incidences(id)
    }

    /// Components embedded inside `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn internals(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.internals(id)
    }

    /// Components embedding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn embeddings(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.embeddings(id)
    }

    /// Items of the collection `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn items(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.items(id)
    }

    /// Collections containing `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::UnknownComponent`] if no component
    /// has this identifier.
    pub fn collections(&self, id: &Uuid) -> Result<Related<'_>> {
        self.relationships.collections(id)
    }

    /// Returns the number of vertices of a component mesh; zero for model
    /// boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if no component of that
    /// type has this identifier.
    pub fn nb_mesh_vertices(&self, component: ComponentId) -> Result<usize> {
        Ok(self.mesh_vertex_state(component)?.0)
    }

    /// Vertex count and vertex revision of a component mesh.
    pub(crate) fn mesh_vertex_state(&self, component: ComponentId) -> Result<(usize, u64)> {
        let id = &component.id;
        Ok(match component.component_type {
            ComponentType::Corner => vertex_state(self.corners.get(id)?.mesh()),
            ComponentType::Line => vertex_state(self.lines.get(id)?.mesh()),
            ComponentType::Surface => vertex_state(self.surfaces.get(id)?.mesh()),
            ComponentType::Block => vertex_state(self.blocks.get(id)?.mesh()),
            ComponentType::ModelBoundary => vertex_state(self.model_boundaries.get(id)?.mesh()),
        })
    }

    /// Returns the unique vertex of a local vertex, if mapped. Vertices
    /// created after the last unique vertex edit of their component are
    /// unmapped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::NotFound`] if the component is
    /// unknown, [`crate::error::MeshError::OutOfRange`] if the vertex is and
    /// [`ModelError::InvariantViolation`] if vertices of the component were
    /// deleted without updating the unique vertices.
    pub fn unique_vertex(&self, component_vertex: ComponentVertex) -> Result<Option<usize>> {
        let component = component_vertex.component;
        let (nb_vertices, revision) = self.mesh_vertex_state(component)?;
        if component_vertex.vertex >= nb_vertices {
            return Err(
                MeshError::out_of_range("vertex", component_vertex.vertex, nb_vertices).into(),
            );
        }
        if self.unique_vertices.component_revision(&component.id) != Some(revision) {
            return Err(ModelError::InvariantViolation(format!(
                "unique vertices of {component} are stale"
            ))
            .into());
        }
        match self.unique_vertices.nb_component_vertices(&component.id) {
            Some(tracked) if component_vertex.vertex < tracked => {
                self.unique_vertices.unique_vertex(component_vertex)
            }
            _ => Ok(None),
        }
    }

    /// Returns the number of unique vertices.
    #[must_use]
    pub fn nb_unique_vertices(&self) -> usize {
        self.unique_vertices.count()
    }

    /// Returns the local vertices sharing a unique vertex, optionally
    /// restricted to one component type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MeshError::OutOfRange`] if the unique vertex
    /// does not exist.
    pub fn component_mesh_vertices(
        &self,
        unique: usize,
        filter: Option<ComponentType>,
    ) -> Result<impl Iterator<Item = ComponentVertex> + Clone + '_> {
        self.unique_vertices.members(unique, filter)
    }

    pub(crate) fn from_parts(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            ..Self::default()
        }
    }

    pub(crate) fn registry_mut<K: ComponentKind>(&mut self) -> &mut ComponentRegistry<K> {
        K::registry_mut(self)
    }

    pub(crate) fn relationships_mut(&mut self) -> &mut RelationshipGraph {
        &mut self.relationships
    }

    pub(crate) fn unique_vertices_mut(&mut self) -> &mut UniqueVertexMapping {
        &mut self.unique_vertices
    }
}

fn vertex_state<M: MeshPayload>(mesh: &M) -> (usize, u64) {
    (MeshPayload::nb_vertices(mesh), MeshPayload::vertex_revision(mesh))
}
