use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::error::{FormatError, ModelError, Result};
use crate::io::archive;

use super::component::ComponentId;

slotmap::new_key_type! {
    /// Arena key of a graph node.
    struct NodeKey;
    /// Arena key of a stored relation.
    struct RelationKey;
}

/// Kind of a stored relation. Each kind is read in two directions:
/// `Boundary` as boundary/incidence, `Internal` as internal/embedding and
/// `Item` as item/collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// `from` is a boundary of `to`.
    Boundary,
    /// `from` is embedded inside `to`.
    Internal,
    /// `from` is an item of the collection `to`.
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Relations ending at the node; yields their origin.
    Incoming,
    /// Relations starting at the node; yields their target.
    Outgoing,
}

#[derive(Debug, Clone)]
struct NodeData {
    component: ComponentId,
    relations: Vec<RelationKey>,
}

#[derive(Debug, Clone, Copy)]
struct RelationData {
    kind: RelationKind,
    from: NodeKey,
    to: NodeKey,
}

/// Typed multigraph over component identifiers.
///
/// Nodes and relations live in arenas; identifiers are mapped to node keys
/// through a hash index. At most one relation exists per ordered
/// `(kind, from, to)` triple.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    nodes: SlotMap<NodeKey, NodeData>,
    relations: SlotMap<RelationKey, RelationData>,
    node_index: HashMap<Uuid, NodeKey>,
    relation_index: HashMap<(RelationKind, NodeKey, NodeKey), RelationKey>,
}

/// Lazy, restartable sequence of components related to one node.
#[derive(Debug, Clone)]
pub struct Related<'a> {
    graph: &'a RelationshipGraph,
    relations: std::slice::Iter<'a, RelationKey>,
    node: NodeKey,
    kind: RelationKind,
    direction: Direction,
}

impl Iterator for Related<'_> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<ComponentId> {
        for key in self.relations.by_ref() {
            let Some(relation) = self.graph.relations.get(*key) else {
                continue;
            };
            if relation.kind != self.kind {
                continue;
            }
            let other = match self.direction {
                Direction::Incoming if relation.to == self.node => relation.from,
                Direction::Outgoing if relation.from == self.node => relation.to,
                _ => continue,
            };
            if let Some(node) = self.graph.nodes.get(other) {
                return Some(node.component);
            }
        }
        None
    }
}

#[derive(Serialize, Deserialize)]
struct GraphRecord {
    nodes: Vec<ComponentId>,
    relations: Vec<(RelationKind, Uuid, Uuid)>,
}

impl RelationshipGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an isolated node. Registering the same component twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvariantViolation`] if the identifier is already
    /// registered under another component type.
    pub fn register_node(&mut self, component: ComponentId) -> Result<()> {
        if let Some(&key) = self.node_index.get(&component.id) {
            let existing = self.nodes[key].component;
            if existing != component {
                return Err(ModelError::InvariantViolation(format!(
                    "{component} is already registered as {existing}"
                ))
                .into());
            }
            return Ok(());
        }
        let key = self.nodes.insert(NodeData {
            component,
            relations: Vec::new(),
        });
        self.node_index.insert(component.id, key);
        Ok(())
    }

    /// Returns `true` if the identifier is a node of the graph.
    #[must_use]
    pub fn is_registered(&self, id: &Uuid) -> bool {
        self.node_index.contains_key(id)
    }

    /// Returns the typed identifier of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn component_id(&self, id: &Uuid) -> Result<ComponentId> {
        Ok(self.nodes[self.node_key(id)?].component)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of stored relations.
    #[must_use]
    pub fn nb_relations(&self) -> usize {
        self.relations.len()
    }

    /// Records `boundary` as a boundary of `incident`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if either endpoint is not registered.
    pub fn add_boundary_relation(&mut self, boundary: &Uuid, incident: &Uuid) -> Result<()> {
        self.add_relation(RelationKind::Boundary, boundary, incident)
    }

    /// Records `internal` as embedded inside `embedding`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if either endpoint is not registered.
    pub fn add_internal_relation(&mut self, internal: &Uuid, embedding: &Uuid) -> Result<()> {
        self.add_relation(RelationKind::Internal, internal, embedding)
    }

    /// Records `item` as a member of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if either endpoint is not registered.
    pub fn add_item_in_collection(&mut self, item: &Uuid, collection: &Uuid) -> Result<()> {
        self.add_relation(RelationKind::Item, item, collection)
    }

    /// Stores one relation, or does nothing if the same `(kind, from, to)`
    /// relation already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if either endpoint is not registered.
    pub fn add_relation(&mut self, kind: RelationKind, from: &Uuid, to: &Uuid) -> Result<()> {
        let from = self.node_key(from)?;
        let to = self.node_key(to)?;
        self.link(kind, from, to);
        Ok(())
    }

    fn link(&mut self, kind: RelationKind, from: NodeKey, to: NodeKey) -> bool {
        if self.relation_index.contains_key(&(kind, from, to)) {
            return false;
        }
        let key = self.relations.insert(RelationData { kind, from, to });
        self.relation_index.insert((kind, from, to), key);
        self.nodes[from].relations.push(key);
        if to != from {
            self.nodes[to].relations.push(key);
        }
        true
    }

    /// Removes a node and every relation touching it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn remove_node(&mut self, id: &Uuid) -> Result<()> {
        let key = self.node_key(id)?;
        self.node_index.remove(id);
        let Some(node) = self.nodes.remove(key) else {
            return Ok(());
        };
        for relation_key in node.relations {
            let Some(relation) = self.relations.remove(relation_key) else {
                continue;
            };
            self.relation_index
                .remove(&(relation.kind, relation.from, relation.to));
            let other = if relation.from == key {
                relation.to
            } else {
                relation.from
            };
            if let Some(other) = self.nodes.get_mut(other) {
                other.relations.retain(|&k| k != relation_key);
            }
        }
        Ok(())
    }

    /// Components bounding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn boundaries(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Boundary, Direction::Incoming)
    }

    /// Components that `id` bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn incidences(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Boundary, Direction::Outgoing)
    }

    /// Components embedded inside `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn internals(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Internal, Direction::Incoming)
    }

    /// Components that `id` is embedded in.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn embeddings(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Internal, Direction::Outgoing)
    }

    /// Items of the collection `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn items(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Item, Direction::Incoming)
    }

    /// Collections containing `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn collections(&self, id: &Uuid) -> Result<Related<'_>> {
        self.related(id, RelationKind::Item, Direction::Outgoing)
    }

    /// Number of components bounding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_boundaries(&self, id: &Uuid) -> Result<usize> {
        Ok(self.boundaries(id)?.count())
    }

    /// Number of components bounded by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_incidences(&self, id: &Uuid) -> Result<usize> {
        Ok(self.incidences(id)?.count())
    }

    /// Number of components embedded inside `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_internals(&self, id: &Uuid) -> Result<usize> {
        Ok(self.internals(id)?.count())
    }

    /// Number of components embedding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_embeddings(&self, id: &Uuid) -> Result<usize> {
        Ok(self.embeddings(id)?.count())
    }

    /// Number of components contained in `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_items(&self, id: &Uuid) -> Result<usize> {
        Ok(self.items(id)?.count())
    }

    /// Number of components containing `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownComponent`] if the identifier is not registered.
    pub fn count_collections(&self, id: &Uuid) -> Result<usize> {
        Ok(self.collections(id)?.count())
    }

    /// Iterates over every stored relation as `(kind, from, to)`.
    pub fn relations(&self) -> impl Iterator<Item = (RelationKind, ComponentId, ComponentId)> + '_ {
        self.relations.values().map(|r| {
            (
                r.kind,
                self.nodes[r.from].component,
                self.nodes[r.to].component,
            )
        })
    }

    fn related(&self, id: &Uuid, kind: RelationKind, direction: Direction) -> Result<Related<'_>> {
        let node = self.node_key(id)?;
        Ok(Related {
            graph: self,
            relations: self.nodes[node].relations.iter(),
            node,
            kind,
            direction,
        })
    }

    fn node_key(&self, id: &Uuid) -> Result<NodeKey> {
        self.node_index
            .get(id)
            .copied()
            .ok_or_else(|| ModelError::UnknownComponent(id.to_string()).into())
    }

    /// Writes every node and relation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let record = GraphRecord {
            nodes: self.nodes.values().map(|node| node.component).collect(),
            relations: self
                .relations()
                .map(|(kind, from, to)| (kind, from.id, to.id))
                .collect(),
        };
        archive::write_record(writer, "relationships", &record)
    }

    /// Replaces the graph with one read from a stream.
    ///
    /// On failure the current graph is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::CorruptData`] if the stream is truncated,
    /// malformed, repeats a node or relation, or names an unknown endpoint.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let record: GraphRecord = archive::read_record(reader, "relationships")?;
        let mut graph = Self::new();
        for component in record.nodes {
            if graph.is_registered(&component.id) {
                return Err(corrupt(format!("node {component} is repeated")));
            }
            graph.register_node(component)?;
        }
        for (kind, from, to) in record.relations {
            let (Some(&a), Some(&b)) = (graph.node_index.get(&from), graph.node_index.get(&to))
            else {
                return Err(corrupt(format!(
                    "relation {kind:?} {from} -> {to} names an unknown node"
                )));
            };
            if !graph.link(kind, a, b) {
                return Err(corrupt(format!(
                    "relation {kind:?} {from} -> {to} is repeated"
                )));
            }
        }
        *self = graph;
        Ok(())
    }
}

fn corrupt(message: String) -> crate::error::BrepError {
    FormatError::CorruptData(message).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::BrepError;
    use crate::model::ComponentType;

    fn graph_with(n: usize) -> (RelationshipGraph, Vec<Uuid>) {
        let mut graph = RelationshipGraph::new();
        let ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            graph
                .register_node(ComponentId::new(ComponentType::Surface, *id))
                .unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn register_is_idempotent() {
        let (mut graph, ids) = graph_with(1);
        graph
            .register_node(ComponentId::new(ComponentType::Surface, ids[0]))
            .unwrap();
        assert_eq!(graph.nb_nodes(), 1);
        let err = graph
            .register_node(ComponentId::new(ComponentType::Line, ids[0]))
            .unwrap_err();
        assert!(matches!(
            err,
            BrepError::Model(ModelError::InvariantViolation(_))
        ));
    }

    #[test]
    fn relation_is_visible_from_both_ends() {
        let (mut graph, ids) = graph_with(2);
        graph.add_boundary_relation(&ids[0], &ids[1]).unwrap();
        let boundaries: Vec<_> = graph.boundaries(&ids[1]).unwrap().collect();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].id, ids[0]);
        assert_eq!(graph.incidences(&ids[0]).unwrap().next().unwrap().id, ids[1]);
        assert_eq!(graph.count_boundaries(&ids[0]).unwrap(), 0);
        assert_eq!(graph.count_incidences(&ids[1]).unwrap(), 0);
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let (mut graph, ids) = graph_with(1);
        let stranger = Uuid::new_v4();
        for result in [
            graph.add_boundary_relation(&ids[0], &stranger),
            graph.add_internal_relation(&stranger, &ids[0]),
            graph.add_item_in_collection(&stranger, &stranger),
            graph.remove_node(&stranger),
        ] {
            assert!(matches!(
                result,
                Err(BrepError::Model(ModelError::UnknownComponent(_)))
            ));
        }
        assert!(graph.count_items(&stranger).is_err());
        assert_eq!(graph.nb_relations(), 0);
    }

    #[test]
    fn removing_a_node_cascades() {
        let (mut graph, ids) = graph_with(3);
        graph.add_boundary_relation(&ids[0], &ids[1]).unwrap();
        graph.add_internal_relation(&ids[1], &ids[2]).unwrap();
        graph.add_item_in_collection(&ids[2], &ids[1]).unwrap();
        graph.remove_node(&ids[1]).unwrap();
        assert_eq!(graph.nb_nodes(), 2);
        assert_eq!(graph.nb_relations(), 0);
        assert_eq!(graph.count_incidences(&ids[0]).unwrap(), 0);
        assert_eq!(graph.count_internals(&ids[2]).unwrap(), 0);
        assert_eq!(graph.count_collections(&ids[2]).unwrap(), 0);
        assert!(!graph.is_registered(&ids[1]));

        // The surviving nodes accept new relations.
        graph.add_boundary_relation(&ids[0], &ids[2]).unwrap();
        assert_eq!(graph.count_boundaries(&ids[2]).unwrap(), 1);
    }

    #[test]
    fn self_relation_counts_once_per_direction() {
        let (mut graph, ids) = graph_with(1);
        graph.add_item_in_collection(&ids[0], &ids[0]).unwrap();
        assert_eq!(graph.count_items(&ids[0]).unwrap(), 1);
        assert_eq!(graph.count_collections(&ids[0]).unwrap(), 1);
        graph.remove_node(&ids[0]).unwrap();
        assert_eq!(graph.nb_relations(), 0);
    }

    #[test]
    fn load_rejects_unknown_endpoints() {
        let record = GraphRecord {
            nodes: vec![ComponentId::new(ComponentType::Block, Uuid::new_v4())],
            relations: vec![(RelationKind::Boundary, Uuid::new_v4(), Uuid::new_v4())],
        };
        let mut bytes = Vec::new();
        archive::write_record(&mut bytes, "relationships", &record).unwrap();

        let (mut graph, _) = graph_with(2);
        let err = graph.load(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BrepError::Format(FormatError::CorruptData(_))));
        assert_eq!(graph.nb_nodes(), 2);
    }

    #[test]
    fn related_sequences_restart() {
        let (mut graph, ids) = graph_with(3);
        graph.add_item_in_collection(&ids[1], &ids[0]).unwrap();
        graph.add_item_in_collection(&ids[2], &ids[0]).unwrap();
        let items = graph.items(&ids[0]).unwrap();
        let first: Vec<_> = items.clone().collect();
        let second: Vec<_> = items.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
