use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BrepError, FormatError, ModelError, Result};
use crate::mesh::MeshKind;
use crate::model::{
    Block, Component, ComponentId, ComponentKind, ComponentType, Corner, Line, MeshPayload, Model,
    ModelBoundary, Surface,
};

use super::{archive, FormatRegistry};

const IDENTIFIER_FILE: &str = "identifier";
const RELATIONSHIPS_FILE: &str = "relationships";
const UNIQUE_VERTICES_FILE: &str = "unique_vertices";

/// Writes a model under a path.
pub trait ModelOutput: Send + Sync {
    /// # Errors
    ///
    /// Returns the first error raised while writing any part of the model.
    fn save(
        &self,
        model: &Model,
        path: &Path,
        registry: &FormatRegistry,
        params: &SaveParams,
    ) -> Result<()>;
}

/// Reads a model from a path.
pub trait ModelInput: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if any part of the model is missing, unreadable or
    /// inconsistent with the others.
    fn load(&self, path: &Path, registry: &FormatRegistry) -> Result<Model>;
}

/// Options of model persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveParams {
    /// Write the independent parts of the model on the rayon pool.
    pub parallel: bool,
}

impl Default for SaveParams {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Native model layout: a directory holding the identity, the relation
/// graph, the unique vertices, one index per component kind and one mesh
/// file per meshed component.
///
/// A model whose unique vertices are stale is refused with
/// [`ModelError::InvariantViolation`] before anything is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModelFormat;

#[derive(Serialize, Deserialize)]
struct ModelIdentity {
    id: Uuid,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct ComponentHeader {
    id: Uuid,
    name: String,
    mesh_kind: Option<MeshKind>,
}

type Task<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

fn index_file(component_type: ComponentType) -> &'static str {
    match component_type {
        ComponentType::Corner => "corners",
        ComponentType::Line => "lines",
        ComponentType::Surface => "surfaces",
        ComponentType::Block => "blocks",
        ComponentType::ModelBoundary => "model_boundaries",
    }
}

fn mesh_file(component_type: ComponentType, id: Uuid, kind: MeshKind) -> String {
    format!("{component_type}{id}.{}", kind.native_extension())
}

impl ModelOutput for NativeModelFormat {
    fn save(
        &self,
        model: &Model,
        path: &Path,
        registry: &FormatRegistry,
        params: &SaveParams,
    ) -> Result<()> {
        check_consistency(model, invariant_violation)?;
        fs::create_dir_all(path).map_err(|e| FormatError::io(path, e))?;

        let mut tasks: Vec<Task<'_>> = Vec::new();
        tasks.push(Box::new(move || {
            let identity = ModelIdentity {
                id: model.id(),
                name: model.name().to_owned(),
            };
            archive::save_record(&path.join(IDENTIFIER_FILE), IDENTIFIER_FILE, &identity)
        }));
        tasks.push(Box::new(move || {
            archive::save_with(&path.join(RELATIONSHIPS_FILE), |writer| {
                model.relationships().save(writer)
            })
        }));
        tasks.push(Box::new(move || {
            archive::save_with(&path.join(UNIQUE_VERTICES_FILE), |writer| {
                model.unique_vertices().save(writer)
            })
        }));
        push_component_tasks::<Corner>(&mut tasks, model, path, registry);
        push_component_tasks::<Line>(&mut tasks, model, path, registry);
        push_component_tasks::<Surface>(&mut tasks, model, path, registry);
        push_component_tasks::<Block>(&mut tasks, model, path, registry);
        push_component_tasks::<ModelBoundary>(&mut tasks, model, path, registry);

        if params.parallel {
            tasks.into_par_iter().try_for_each(|task| task())
        } else {
            tasks.into_iter().try_for_each(|task| task())
        }
    }
}

fn push_component_tasks<'a, K: ComponentKind>(
    tasks: &mut Vec<Task<'a>>,
    model: &'a Model,
    dir: &'a Path,
    registry: &'a FormatRegistry,
) {
    let components = model.components::<K>();
    tasks.push(Box::new(move || {
        let headers: Vec<ComponentHeader> = components
            .iter()
            .map(|(id, component)| ComponentHeader {
                id: *id,
                name: component.name().to_owned(),
                mesh_kind: component.mesh().mesh_kind(),
            })
            .collect();
        let file = index_file(K::TYPE);
        archive::save_record(&dir.join(file), file, &headers)
    }));
    for (id, component) in components.iter() {
        let Some(kind) = component.mesh().mesh_kind() else {
            continue;
        };
        let id = *id;
        tasks.push(Box::new(move || {
            registry.save_mesh(component.mesh(), dir.join(mesh_file(K::TYPE, id, kind)))
        }));
    }
}

impl ModelInput for NativeModelFormat {
    fn load(&self, path: &Path, registry: &FormatRegistry) -> Result<Model> {
        let identity: ModelIdentity =
            archive::load_record(&path.join(IDENTIFIER_FILE), IDENTIFIER_FILE)?;
        let mut model = Model::from_parts(identity.id, identity.name);
        archive::load_with(&path.join(RELATIONSHIPS_FILE), |reader| {
            model.relationships_mut().load(reader)
        })?;
        archive::load_with(&path.join(UNIQUE_VERTICES_FILE), |reader| {
            model.unique_vertices_mut().load(reader)
        })?;
        load_components::<Corner>(&mut model, path, registry)?;
        load_components::<Line>(&mut model, path, registry)?;
        load_components::<Surface>(&mut model, path, registry)?;
        load_components::<Block>(&mut model, path, registry)?;
        load_components::<ModelBoundary>(&mut model, path, registry)?;
        check_consistency(&model, corrupt)?;
        Ok(model)
    }
}

fn load_components<K: ComponentKind>(
    model: &mut Model,
    dir: &Path,
    registry: &FormatRegistry,
) -> Result<()> {
    let file = index_file(K::TYPE);
    let headers: Vec<ComponentHeader> = archive::load_record(&dir.join(file), file)?;
    for header in headers {
        let mesh: K::Mesh = match header.mesh_kind {
            Some(kind) => {
                let path = dir.join(mesh_file(K::TYPE, header.id, kind));
                let mesh: K::Mesh = registry.load_mesh(path)?;
                if mesh.mesh_kind() != Some(kind) {
                    return Err(FormatError::CorruptData(format!(
                        "{} {} mesh is not a {}",
                        K::TYPE,
                        header.id,
                        kind.name()
                    ))
                    .into());
                }
                mesh
            }
            None => <K::Mesh as Default>::default(),
        };
        if mesh.mesh_kind().is_some() != header.mesh_kind.is_some() {
            return Err(FormatError::CorruptData(format!(
                "{} {} has no mesh file",
                K::TYPE,
                header.id
            ))
            .into());
        }
        model
            .registry_mut::<K>()
            .add(Component::with_id(header.id, header.name, mesh))
            .map_err(|_| {
                FormatError::CorruptData(format!("{} {} is listed twice", K::TYPE, header.id))
            })?;
    }
    Ok(())
}

/// Every component is a graph node of the same type and a tracked
/// component of the vertex mapping, at its mesh vertex revision and with no
/// more tracked vertices than its mesh has, and the other way round.
fn check_consistency(model: &Model, fail: fn(String) -> BrepError) -> Result<()> {
    let mapping = model.unique_vertices();
    let mut nb_components = 0;
    for component in component_ids(model) {
        nb_components += 1;
        if model.relationships().component_id(&component.id).ok() != Some(component) {
            return Err(fail(format!("{component} is missing from the relationships")));
        }
        let (nb_vertices, revision) = model.mesh_vertex_state(component)?;
        let tracked = mapping.nb_component_vertices(&component.id);
        if mapping.component_revision(&component.id) != Some(revision)
            || !tracked.is_some_and(|tracked| tracked <= nb_vertices)
        {
            return Err(fail(format!(
                "{component} vertices do not match the unique vertices"
            )));
        }
    }
    if model.relationships().nb_nodes() != nb_components
        || mapping.nb_components() != nb_components
    {
        return Err(fail(
            "relationships or unique vertices name components absent from the model".into(),
        ));
    }
    Ok(())
}

fn component_ids(model: &Model) -> impl Iterator<Item = ComponentId> + '_ {
    ids_of::<Corner>(model)
        .chain(ids_of::<Line>(model))
        .chain(ids_of::<Surface>(model))
        .chain(ids_of::<Block>(model))
        .chain(ids_of::<ModelBoundary>(model))
}

fn ids_of<K: ComponentKind>(model: &Model) -> impl Iterator<Item = ComponentId> + '_ {
    model
        .components::<K>()
        .iter()
        .map(|(id, _)| ComponentId::new(K::TYPE, *id))
}

fn invariant_violation(message: String) -> BrepError {
    ModelError::InvariantViolation(message).into()
}

fn corrupt(message: String) -> BrepError {
    FormatError::CorruptData(message).into()
}
