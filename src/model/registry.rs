use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FormatError, ModelError, Result};
use crate::io::archive;

use super::component::{Component, ComponentKind, MeshPayload};

/// Owns every component of one kind, keyed by identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ComponentRegistry<K: ComponentKind> {
    components: HashMap<Uuid, Component<K>>,
}

impl<K: ComponentKind> Default for ComponentRegistry<K> {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
        }
    }
}

impl<K: ComponentKind> ComponentRegistry<K> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a component under its own identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvariantViolation`] if the identifier is taken.
    pub fn add(&mut self, component: Component<K>) -> Result<()> {
        let id = component.id();
        if self.components.contains_key(&id) {
            return Err(ModelError::InvariantViolation(format!(
                "{} {id} already exists",
                K::TYPE
            ))
            .into());
        }
        self.components.insert(id, component);
        Ok(())
    }

    /// Returns a component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the identifier is absent.
    pub fn get(&self, id: &Uuid) -> Result<&Component<K>> {
        self.components
            .get(id)
            .ok_or_else(|| not_found::<K>(id).into())
    }

    /// Returns a mutable component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the identifier is absent.
    pub fn get_mut(&mut self, id: &Uuid) -> Result<&mut Component<K>> {
        self.components
            .get_mut(id)
            .ok_or_else(|| not_found::<K>(id).into())
    }

    /// Removes and returns a component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the identifier is absent.
    pub fn remove(&mut self, id: &Uuid) -> Result<Component<K>> {
        self.components
            .remove(id)
            .ok_or_else(|| not_found::<K>(id).into())
    }

    /// Returns `true` if the identifier is present.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.components.contains_key(id)
    }

    /// Returns the number of components.
    #[must_use]
    pub fn count(&self) -> usize {
        self.components.len()
    }

    /// Iterates over `(id, component)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &Component<K>)> + Clone + '_ {
        self.components.iter()
    }

    /// Iterates mutably over `(id, component)` pairs in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Uuid, &mut Component<K>)> + '_ {
        self.components.iter_mut()
    }

    /// Writes the whole collection, meshes included.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        archive::write_record(writer, &Self::record_tag(), self)
    }

    /// Replaces the contents with a collection read from a stream.
    ///
    /// On failure the current contents are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::CorruptData`] if the stream is truncated,
    /// malformed or inconsistent.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let loaded: Self = archive::read_record(reader, &Self::record_tag())?;
        loaded.validate()?;
        *self = loaded;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (id, component) in &self.components {
            if *id != component.id() {
                return Err(FormatError::CorruptData(format!(
                    "{} stored under {id} has identifier {}",
                    K::TYPE,
                    component.id()
                ))
                .into());
            }
            component.mesh().validate().map_err(|reason| {
                FormatError::CorruptData(format!("{} {id} mesh: {reason}", K::TYPE))
            })?;
        }
        Ok(())
    }

    fn record_tag() -> String {
        format!("{}s", K::TYPE)
    }
}

fn not_found<K: ComponentKind>(id: &Uuid) -> ModelError {
    ModelError::NotFound(format!("{} {id}", K::TYPE))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::BrepError;
    use crate::math::Point3;
    use crate::mesh::{HasVertices, MeshTopologyBuilder, PolygonalSurface};
    use crate::model::Surface;

    fn surface_with_triangle() -> Component<Surface> {
        let mut mesh = PolygonalSurface::new();
        let mut builder = MeshTopologyBuilder::new(&mut mesh);
        builder.create_point(Point3::new(0.0, 0.0, 0.0));
        builder.create_point(Point3::new(1.0, 0.0, 0.0));
        builder.create_point(Point3::new(0.0, 1.0, 0.0));
        builder.create_element(&[0, 1, 2]).unwrap();
        let mut component = Component::new(mesh);
        component.set_name("roof".into());
        component
    }

    #[test]
    fn duplicate_add_is_an_invariant_violation() {
        let mut registry = ComponentRegistry::<Surface>::new();
        let component = surface_with_triangle();
        registry.add(component.clone()).unwrap();
        let err = registry.add(component).unwrap_err();
        assert!(matches!(
            err,
            BrepError::Model(ModelError::InvariantViolation(_))
        ));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let mut registry = ComponentRegistry::<Surface>::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            registry.get(&id),
            Err(BrepError::Model(ModelError::NotFound(_)))
        ));
        assert!(matches!(
            registry.get_mut(&id),
            Err(BrepError::Model(ModelError::NotFound(_)))
        ));
        assert!(matches!(
            registry.remove(&id),
            Err(BrepError::Model(ModelError::NotFound(_)))
        ));
    }

    #[test]
    fn iteration_is_restartable() {
        let mut registry = ComponentRegistry::<Surface>::new();
        for _ in 0..3 {
            registry.add(surface_with_triangle()).unwrap();
        }
        let components = registry.iter();
        assert_eq!(components.clone().count(), 3);
        assert_eq!(components.count(), 3);
        assert!(registry.iter().all(|(id, c)| *id == c.id()));
    }

    #[test]
    fn save_then_load_reproduces_components() {
        let mut registry = ComponentRegistry::<Surface>::new();
        registry.add(surface_with_triangle()).unwrap();
        registry.add(surface_with_triangle()).unwrap();
        let mut bytes = Vec::new();
        registry.save(&mut bytes).unwrap();

        let mut reloaded = ComponentRegistry::<Surface>::new();
        reloaded.load(&mut bytes.as_slice()).unwrap();
        assert_eq!(reloaded.count(), 2);
        for (id, component) in registry.iter() {
            let other = reloaded.get(id).unwrap();
            assert_eq!(other.name(), "roof");
            assert_eq!(other.mesh(), component.mesh());
            assert_eq!(HasVertices::nb_vertices(other.mesh()), 3);
        }
    }

    #[test]
    fn truncated_stream_is_corrupt_and_keeps_contents() {
        let mut registry = ComponentRegistry::<Surface>::new();
        registry.add(surface_with_triangle()).unwrap();
        let mut bytes = Vec::new();
        registry.save(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 5);

        let mut target = ComponentRegistry::<Surface>::new();
        target.add(surface_with_triangle()).unwrap();
        let err = target.load(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BrepError::Format(FormatError::CorruptData(_))));
        assert_eq!(target.count(), 1);
    }
}
