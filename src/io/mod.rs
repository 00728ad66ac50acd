pub(crate) mod archive;
mod model;
mod native;

pub use model::{ModelInput, ModelOutput, NativeModelFormat, SaveParams};
pub use native::NativeMeshFormat;

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use tracing::{error, info};

use crate::error::{FormatError, Result};
use crate::mesh::{EdgedCurve, MeshKind, PointSet, PolygonalSurface, PolyhedralSolid};
use crate::model::{MeshPayload, Model};

/// Reads a mesh of type `M` from a file.
pub trait MeshInput<M>: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<M>;
}

/// Writes a mesh of type `M` to a file.
pub trait MeshOutput<M>: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, mesh: &M, path: &Path) -> Result<()>;
}

/// Readers and writers of one mesh type, keyed by file extension.
pub struct MeshFormats<M> {
    inputs: HashMap<String, Box<dyn MeshInput<M>>>,
    outputs: HashMap<String, Box<dyn MeshOutput<M>>>,
}

impl<M> Default for MeshFormats<M> {
    fn default() -> Self {
        Self {
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }
}

impl<M> MeshFormats<M> {
    /// Registers a reader, replacing any previous one for the extension.
    pub fn register_input(&mut self, extension: &str, input: impl MeshInput<M> + 'static) {
        self.inputs
            .insert(extension.to_ascii_lowercase(), Box::new(input));
    }

    /// Registers a writer, replacing any previous one for the extension.
    pub fn register_output(&mut self, extension: &str, output: impl MeshOutput<M> + 'static) {
        self.outputs
            .insert(extension.to_ascii_lowercase(), Box::new(output));
    }

    /// Returns `true` if a reader is registered for the extension.
    #[must_use]
    pub fn has_input(&self, extension: &str) -> bool {
        self.inputs.contains_key(&extension.to_ascii_lowercase())
    }

    /// Returns `true` if a writer is registered for the extension.
    #[must_use]
    pub fn has_output(&self, extension: &str) -> bool {
        self.outputs.contains_key(&extension.to_ascii_lowercase())
    }
}

/// Explicit registry of the file formats available to the I/O layer.
///
/// Built once at startup and passed by reference; there is no global
/// format table.
#[derive(Default)]
pub struct FormatRegistry {
    pub(crate) point_sets: MeshFormats<PointSet>,
    pub(crate) edged_curves: MeshFormats<EdgedCurve>,
    pub(crate) surfaces: MeshFormats<PolygonalSurface>,
    pub(crate) solids: MeshFormats<PolyhedralSolid>,
    model_inputs: HashMap<String, Box<dyn ModelInput>>,
    model_outputs: HashMap<String, Box<dyn ModelOutput>>,
}

impl FormatRegistry {
    /// Creates a registry without any format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the native binary formats of every mesh
    /// kind and of models.
    #[must_use]
    pub fn with_native_formats() -> Self {
        let mut registry = Self::new();
        register_native(&mut registry.point_sets, &[MeshKind::PointSet]);
        register_native(&mut registry.edged_curves, &[MeshKind::EdgedCurve]);
        register_native(
            &mut registry.surfaces,
            &[MeshKind::PolygonalSurface, MeshKind::TriangulatedSurface],
        );
        register_native(&mut registry.solids, &[MeshKind::PolyhedralSolid]);
        registry.register_model_input(Model::native_extension(), NativeModelFormat);
        registry.register_model_output(Model::native_extension(), NativeModelFormat);
        registry
    }

    /// Returns the formats of mesh type `M`, or `None` for payloads that
    /// carry no mesh.
    #[must_use]
    pub fn mesh_formats<M: MeshPayload>(&self) -> Option<&MeshFormats<M>> {
        M::formats(self)
    }

    /// Mutable counterpart of [`FormatRegistry::mesh_formats`], used to
    /// register additional mesh formats.
    pub fn mesh_formats_mut<M: MeshPayload>(&mut self) -> Option<&mut MeshFormats<M>> {
        M::formats_mut(self)
    }

    /// Registers a model reader, replacing any previous one for the extension.
    pub fn register_model_input(&mut self, extension: &str, input: impl ModelInput + 'static) {
        self.model_inputs
            .insert(extension.to_ascii_lowercase(), Box::new(input));
    }

    /// Registers a model writer, replacing any previous one for the extension.
    pub fn register_model_output(&mut self, extension: &str, output: impl ModelOutput + 'static) {
        self.model_outputs
            .insert(extension.to_ascii_lowercase(), Box::new(output));
    }

    /// Writes a mesh with the writer registered for the path extension.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnsupportedFormat`] if no writer matches the
    /// extension, or the writer's error.
    pub fn save_mesh<M: MeshPayload>(&self, mesh: &M, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        logged("saved mesh", path, || {
            let extension = extension(path)?;
            let output = self
                .mesh_formats::<M>()
                .and_then(|formats| formats.outputs.get(&extension))
                .ok_or_else(|| unsupported("mesh output", &extension))?;
            output.save(mesh, path)
        })
    }

    /// Reads a mesh with the reader registered for the path extension.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnsupportedFormat`] if no reader matches the
    /// extension, or the reader's error.
    pub fn load_mesh<M: MeshPayload>(&self, path: impl AsRef<Path>) -> Result<M> {
        let path = path.as_ref();
        logged("loaded mesh", path, || {
            let extension = extension(path)?;
            let input = self
                .mesh_formats::<M>()
                .and_then(|formats| formats.inputs.get(&extension))
                .ok_or_else(|| unsupported("mesh input", &extension))?;
            input.load(path)
        })
    }

    /// Writes a model with the writer registered for the path extension.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnsupportedFormat`] if no writer matches the
    /// extension, or the first error raised by the writer.
    pub fn save_model(
        &self,
        model: &Model,
        path: impl AsRef<Path>,
        params: &SaveParams,
    ) -> Result<()> {
        let path = path.as_ref();
        logged("saved model", path, || {
            let extension = extension(path)?;
            let output = self
                .model_outputs
                .get(&extension)
                .ok_or_else(|| unsupported("model output", &extension))?;
            output.save(model, path, self, params)
        })
    }

    /// Reads a model with the reader registered for the path extension.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnsupportedFormat`] if no reader matches the
    /// extension, or the reader's error.
    pub fn load_model(&self, path: impl AsRef<Path>) -> Result<Model> {
        let path = path.as_ref();
        logged("loaded model", path, || {
            let extension = extension(path)?;
            let input = self
                .model_inputs
                .get(&extension)
                .ok_or_else(|| unsupported("model input", &extension))?;
            input.load(path, self)
        })
    }
}

fn register_native<M: MeshPayload>(formats: &mut MeshFormats<M>, kinds: &[MeshKind]) {
    for &kind in kinds {
        formats.register_input(kind.native_extension(), NativeMeshFormat::new(kind));
        formats.register_output(kind.native_extension(), NativeMeshFormat::new(kind));
    }
}

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            FormatError::UnsupportedFormat(format!("{} has no extension", path.display())).into()
        })
}

fn unsupported(what: &str, extension: &str) -> FormatError {
    FormatError::UnsupportedFormat(format!("no {what} registered for .{extension}"))
}

fn logged<T>(action: &str, path: &Path, run: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    match run() {
        Ok(value) => {
            info!(path = %path.display(), elapsed = ?start.elapsed(), "{action}");
            Ok(value)
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "{action} failed");
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::BrepError;
    use crate::math::Point3;
    use crate::mesh::{
        HasAdjacency, HasElements, HasVertices, MeshTopologyBuilder, VertexSetBuilder,
    };

    #[test]
    fn native_mesh_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::with_native_formats();

        let mut surface = PolygonalSurface::triangulated();
        let mut builder = MeshTopologyBuilder::new(&mut surface);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            builder.create_point(Point3::new(x, y, 0.0));
        }
        builder.create_element(&[0, 1, 2]).unwrap();
        builder.create_element(&[2, 1, 3]).unwrap();
        builder.compute_adjacencies().unwrap();

        let path = dir.path().join("roof.tsf");
        registry.save_mesh(&surface, &path).unwrap();
        let reloaded: PolygonalSurface = registry.load_mesh(&path).unwrap();
        assert_eq!(reloaded, surface);
        assert!(reloaded.is_triangulated());
        assert_eq!(reloaded.nb_elements(), 2);
        assert_eq!(reloaded.facets_on_border(0).unwrap(), vec![0, 2]);
    }

    #[test]
    fn unknown_or_missing_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::with_native_formats();
        let mut points = PointSet::new();
        VertexSetBuilder::new(&mut points).create_point(Point3::new(1.0, 2.0, 3.0));

        for name in ["points.obj", "points"] {
            let err = registry
                .save_mesh(&points, dir.path().join(name))
                .unwrap_err();
            assert!(matches!(
                err,
                BrepError::Format(FormatError::UnsupportedFormat(_))
            ));
        }
        // A surface extension is not a point set format.
        let err = registry
            .save_mesh(&points, dir.path().join("points.psf"))
            .unwrap_err();
        assert!(matches!(
            err,
            BrepError::Format(FormatError::UnsupportedFormat(_))
        ));
        assert_eq!(HasVertices::nb_vertices(&points), 1);
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let registry = FormatRegistry::new();
        assert!(!registry.mesh_formats::<PointSet>().unwrap().has_input("pts"));
        assert!(registry.mesh_formats::<()>().is_none());
        let native = FormatRegistry::with_native_formats();
        assert!(native.mesh_formats::<PolygonalSurface>().unwrap().has_output("TSF"));
    }
}
