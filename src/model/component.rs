use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MeshError, Result};
use crate::io::{FormatRegistry, MeshFormats};
use crate::mesh::{
    EdgedCurve, HasVertices, MeshKind, PointSet, PolygonalSurface, PolyhedralSolid,
    VertexSetBuilder,
};

use super::{ComponentRegistry, Model};

/// Closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentType {
    /// Point-like component.
    Corner,
    /// Curve-like component.
    Line,
    /// Surface-like component.
    Surface,
    /// Volume-like component.
    Block,
    /// Collection of components forming part of the model boundary.
    ModelBoundary,
}

impl ComponentType {
    /// Returns the name used as file prefix and in diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Corner => "Corner",
            Self::Line => "Line",
            Self::Surface => "Surface",
            Self::Block => "Block",
            Self::ModelBoundary => "ModelBoundary",
        }
    }

    /// Returns the topological dimension, or `None` for collections.
    #[must_use]
    pub fn dimension(self) -> Option<usize> {
        match self {
            Self::Corner => Some(0),
            Self::Line => Some(1),
            Self::Surface => Some(2),
            Self::Block => Some(3),
            Self::ModelBoundary => None,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressable unit of every relation and mapping: a typed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    /// Kind of the component.
    pub component_type: ComponentType,
    /// Identifier of the component.
    pub id: Uuid,
}

impl ComponentId {
    /// Creates a new component id.
    #[must_use]
    pub fn new(component_type: ComponentType, id: Uuid) -> Self {
        Self { component_type, id }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.component_type, self.id)
    }
}

/// Mesh payload owned by a component.
pub trait MeshPayload:
    fmt::Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Returns the mesh variant tag, or `None` for components without mesh.
    fn mesh_kind(&self) -> Option<MeshKind>;

    /// Returns the number of vertices.
    fn nb_vertices(&self) -> usize;

    /// Returns the counter advanced by each vertex deletion.
    fn vertex_revision(&self) -> u64;

    /// Appends `count` vertices and returns the first new index.
    fn create_vertices(&mut self, count: usize) -> usize;

    /// Deletes the flagged vertices (and dependent elements) and returns the
    /// old to new vertex index map.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::OutOfRange`] on a mask of the wrong length.
    fn delete_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>>;

    /// Checks the internal consistency of a decoded payload.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistency found.
    fn validate(&self) -> std::result::Result<(), String>;

    /// Returns the readers and writers registered for this payload type.
    fn formats(registry: &FormatRegistry) -> Option<&MeshFormats<Self>>;

    /// Mutable counterpart of [`MeshPayload::formats`].
    fn formats_mut(registry: &mut FormatRegistry) -> Option<&mut MeshFormats<Self>>;
}

macro_rules! impl_mesh_payload {
    ($mesh:ty, $field:ident) => {
        impl MeshPayload for $mesh {
            fn mesh_kind(&self) -> Option<MeshKind> {
                Some(self.kind())
            }

            fn nb_vertices(&self) -> usize {
                HasVertices::nb_vertices(self)
            }

            fn vertex_revision(&self) -> u64 {
                HasVertices::vertex_revision(self)
            }

            fn create_vertices(&mut self, count: usize) -> usize {
                VertexSetBuilder::new(self).create_vertices(count)
            }

            fn delete_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
                VertexSetBuilder::new(self).delete_vertices(to_delete)
            }

            fn validate(&self) -> std::result::Result<(), String> {
                <$mesh>::validate(self)
            }

            fn formats(registry: &FormatRegistry) -> Option<&MeshFormats<Self>> {
                Some(&registry.$field)
            }

            fn formats_mut(registry: &mut FormatRegistry) -> Option<&mut MeshFormats<Self>> {
                Some(&mut registry.$field)
            }
        }
    };
}

impl_mesh_payload!(PointSet, point_sets);
impl_mesh_payload!(EdgedCurve, edged_curves);
impl_mesh_payload!(PolygonalSurface, surfaces);
impl_mesh_payload!(PolyhedralSolid, solids);

/// Collections carry no mesh.
impl MeshPayload for () {
    fn mesh_kind(&self) -> Option<MeshKind> {
        None
    }

    fn nb_vertices(&self) -> usize {
        0
    }

    fn vertex_revision(&self) -> u64 {
        0
    }

    fn create_vertices(&mut self, _count: usize) -> usize {
        0
    }

    fn delete_vertices(&mut self, to_delete: &[bool]) -> Result<Vec<Option<usize>>> {
        if to_delete.is_empty() {
            Ok(Vec::new())
        } else {
            Err(MeshError::out_of_range("vertex", to_delete.len(), 0).into())
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    fn formats(_registry: &FormatRegistry) -> Option<&MeshFormats<Self>> {
        None
    }

    fn formats_mut(_registry: &mut FormatRegistry) -> Option<&mut MeshFormats<Self>> {
        None
    }
}

pub(crate) mod sealed {
    use super::{ComponentRegistry, Model};

    /// Where a model keeps the registry of one kind. Not nameable outside
    /// the crate, so registries are only mutated through the builder.
    pub trait Registries: Sized {
        fn registry(model: &Model) -> &ComponentRegistry<Self>
        where
            Self: super::ComponentKind;

        fn registry_mut(model: &mut Model) -> &mut ComponentRegistry<Self>
        where
            Self: super::ComponentKind;
    }
}

/// Static description of one component kind: its type tag and its mesh
/// payload.
pub trait ComponentKind:
    sealed::Registries + fmt::Debug + Clone + Default + Send + Sync + 'static
{
    /// Type tag shared by every component of this kind.
    const TYPE: ComponentType;

    /// Mesh payload type.
    type Mesh: MeshPayload;
}

macro_rules! component_kind {
    ($(#[$doc:meta])* $kind:ident, $mesh:ty, $field:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $kind;

        impl ComponentKind for $kind {
            const TYPE: ComponentType = ComponentType::$kind;
            type Mesh = $mesh;
        }

        impl sealed::Registries for $kind {
            fn registry(model: &Model) -> &ComponentRegistry<Self> {
                &model.$field
            }

            fn registry_mut(model: &mut Model) -> &mut ComponentRegistry<Self> {
                &mut model.$field
            }
        }
    };
}

component_kind!(
    /// Point-like components, meshed by a [`PointSet`].
    Corner, PointSet, corners
);
component_kind!(
    /// Curve-like components, meshed by an [`EdgedCurve`].
    Line, EdgedCurve, lines
);
component_kind!(
    /// Surface-like components, meshed by a [`PolygonalSurface`].
    Surface, PolygonalSurface, surfaces
);
component_kind!(
    /// Volume-like components, meshed by a [`PolyhedralSolid`].
    Block, PolyhedralSolid, blocks
);
component_kind!(
    /// Collections of components forming part of the model boundary.
    ModelBoundary, (), model_boundaries
);

/// An identified, named part of a model owning its mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Component<K: ComponentKind> {
    id: Uuid,
    name: String,
    mesh: K::Mesh,
    #[serde(skip)]
    kind: PhantomData<K>,
}

impl<K: ComponentKind> Component<K> {
    /// Creates a component with a fresh random identifier.
    #[must_use]
    pub fn new(mesh: K::Mesh) -> Self {
        Self::with_id(Uuid::new_v4(), String::new(), mesh)
    }

    pub(crate) fn with_id(id: Uuid, name: String, mesh: K::Mesh) -> Self {
        Self {
            id,
            name,
            mesh,
            kind: PhantomData,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the typed identifier.
    #[must_use]
    pub fn component_id(&self) -> ComponentId {
        ComponentId::new(K::TYPE, self.id)
    }

    /// Returns the name (empty if unset).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mesh.
    #[must_use]
    pub fn mesh(&self) -> &K::Mesh {
        &self.mesh
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn mesh_mut(&mut self) -> &mut K::Mesh {
        &mut self.mesh
    }

    pub(crate) fn replace_mesh(&mut self, mesh: K::Mesh) -> K::Mesh {
        std::mem::replace(&mut self.mesh, mesh)
    }
}
