use std::path::Path;

use crate::error::{FormatError, Result};
use crate::mesh::MeshKind;
use crate::model::MeshPayload;

use super::{archive, MeshInput, MeshOutput};

/// Native binary format of one mesh kind: a single framed record tagged
/// with the kind name.
#[derive(Debug, Clone, Copy)]
pub struct NativeMeshFormat {
    kind: MeshKind,
}

impl NativeMeshFormat {
    /// Creates the native format of a mesh kind.
    #[must_use]
    pub fn new(kind: MeshKind) -> Self {
        Self { kind }
    }
}

impl<M: MeshPayload> MeshOutput<M> for NativeMeshFormat {
    fn save(&self, mesh: &M, path: &Path) -> Result<()> {
        if mesh.mesh_kind() != Some(self.kind) {
            return Err(FormatError::UnsupportedFormat(format!(
                "cannot write {} as {}",
                mesh.mesh_kind().map_or("a mesh-less payload", MeshKind::name),
                self.kind.name()
            ))
            .into());
        }
        archive::save_record(path, self.kind.name(), mesh)
    }
}

impl<M: MeshPayload> MeshInput<M> for NativeMeshFormat {
    fn load(&self, path: &Path) -> Result<M> {
        let mesh: M = archive::load_record(path, self.kind.name())?;
        if mesh.mesh_kind() != Some(self.kind) {
            return Err(FormatError::CorruptData(format!(
                "{} holds a {} record",
                path.display(),
                self.kind.name()
            ))
            .into());
        }
        mesh.validate()
            .map_err(|reason| FormatError::CorruptData(format!("{}: {reason}", path.display())))?;
        Ok(mesh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::BrepError;
    use crate::mesh::{HasVertices, PolygonalSurface, VertexSetBuilder};

    #[test]
    fn kind_mismatch_is_rejected_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.psf");
        let polygonal = NativeMeshFormat::new(MeshKind::PolygonalSurface);
        let triangulated = NativeMeshFormat::new(MeshKind::TriangulatedSurface);

        let mut surface = PolygonalSurface::new();
        VertexSetBuilder::new(&mut surface).create_vertices(3);
        let err = MeshOutput::save(&triangulated, &surface, &path).unwrap_err();
        assert!(matches!(
            err,
            BrepError::Format(FormatError::UnsupportedFormat(_))
        ));

        MeshOutput::save(&polygonal, &surface, &path).unwrap();
        let reloaded: PolygonalSurface = MeshInput::load(&polygonal, &path).unwrap();
        assert_eq!(HasVertices::nb_vertices(&reloaded), 3);
        let err = MeshInput::<PolygonalSurface>::load(&triangulated, &path).unwrap_err();
        assert!(matches!(err, BrepError::Format(FormatError::CorruptData(_))));
    }
}
