//! Canonical node and connection storage
//!
//! Nodes are appended only, so a node's dense index is stable for the life of
//! the store. Connections live twice: in an ordered array for iteration and in
//! a [`ConnectivityMatrix`] for constant-time pair queries.

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use tracing::debug;

use super::matrix::ConnectivityMatrix;
use crate::config::{DEFAULT_INITIAL_CAPACITY, PhysicsConfig};
use crate::error::{GraphError, GraphResult};

/// Process-unique node identity, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic [`NodeId`] source owned by one store
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// One explored article
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Dense index, assigned by [`GraphStore::push_node`]
    pub index: usize,
    pub title: String,
    pub position: [f32; 2],
    /// Grows by one per incident connection
    pub mass: f32,
    /// Settling coefficient in `0..=1`
    pub temperature: f32,
    /// Whether the node's links have been fetched
    pub expanded: bool,
}

impl Node {
    /// Create an unplaced, massless node. Identity is assigned on push.
    pub fn new(title: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: NodeId(u64::MAX),
            index: usize::MAX,
            title: title.into(),
            position: [x, y],
            mass: 0.0,
            temperature: 1.0,
            expanded: false,
        }
    }

    /// Set the starting temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn radius(&self, config: &PhysicsConfig) -> f32 {
        config.radius(self.mass)
    }
}

/// Undirected edge between two node indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub a: usize,
    pub b: usize,
}

impl Connection {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    /// Whether this connection joins `x` and `y` in either orientation
    pub fn joins(&self, x: usize, y: usize) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Set of independently re-uploadable data channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags(u8);

impl DirtyFlags {
    pub const NONE: Self = Self(0);
    pub const CONNECTIONS: Self = Self(1);
    pub const NODE_POSITIONS: Self = Self(1 << 1);
    pub const NODE_COLORS: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DirtyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Owner of all nodes and connections
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    matrix: ConnectivityMatrix,
    id_to_index: HashMap<NodeId, usize>,
    title_to_index: HashMap<String, usize>,
    ids: IdAllocator,
    dirty: DirtyFlags,
    /// Nodes the host wrote since the last upload; readbacks leave them alone
    host_edited: Vec<bool>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// Create a store whose matrix initially addresses `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            nodes: Vec::with_capacity(capacity),
            connections: Vec::new(),
            matrix: ConnectivityMatrix::new(capacity),
            id_to_index: HashMap::new(),
            title_to_index: HashMap::new(),
            ids: IdAllocator::new(),
            dirty: DirtyFlags::NONE,
            host_edited: Vec::with_capacity(capacity),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Connections in insertion order, except that removal swaps the last
    /// connection into the freed slot. Connection positions are not stable.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Node capacity currently addressed by the connectivity matrix
    pub fn capacity(&self) -> usize {
        self.matrix.capacity()
    }

    pub fn node(&self, index: usize) -> GraphResult<&Node> {
        self.check(index)?;
        Ok(&self.nodes[index])
    }

    /// Mutable access for host-side edits.
    ///
    /// The node is treated as host-edited until the next upload, so a kernel
    /// readback that was issued before the edit will not overwrite it.
    pub fn node_mut(&mut self, index: usize) -> GraphResult<&mut Node> {
        self.check(index)?;
        self.host_edited[index] = true;
        Ok(&mut self.nodes[index])
    }

    /// Append a node, assigning it a fresh id and the next dense index.
    ///
    /// Doubles the capacity and re-addresses every connection when full.
    pub fn push_node(&mut self, mut node: Node) -> usize {
        let index = self.nodes.len();
        if index >= self.matrix.capacity() {
            self.grow(self.matrix.capacity() * 2);
        }

        node.id = self.ids.allocate();
        node.index = index;
        self.id_to_index.insert(node.id, index);
        self.title_to_index.insert(node.title.clone(), index);
        self.nodes.push(node);
        self.host_edited.push(false);
        self.dirty |= DirtyFlags::ALL;
        index
    }

    fn grow(&mut self, capacity: usize) {
        debug!(
            from = self.matrix.capacity(),
            to = capacity,
            edges = self.connections.len(),
            "growing connectivity matrix"
        );
        self.matrix =
            ConnectivityMatrix::rebuilt(capacity, self.connections.iter().map(|c| (c.a, c.b)));
    }

    pub fn is_connected(&self, a: usize, b: usize) -> GraphResult<bool> {
        self.check(a)?;
        self.check(b)?;
        Ok(self.matrix.get(a, b))
    }

    /// Connect or disconnect two nodes.
    ///
    /// Creating a connection adds one unit of mass to both endpoints and
    /// removing one takes it back. Requests that would not change the
    /// connection state, including `a == b`, do nothing.
    pub fn set_connected(&mut self, a: usize, b: usize, want: bool) -> GraphResult<()> {
        self.check(a)?;
        self.check(b)?;
        if a == b || self.matrix.get(a, b) == want {
            return Ok(());
        }

        if want {
            self.connections.push(Connection::new(a, b));
            self.nodes[a].mass += 1.0;
            self.nodes[b].mass += 1.0;
        } else {
            if let Some(pos) = self.connections.iter().position(|c| c.joins(a, b)) {
                self.connections.swap_remove(pos);
            }
            self.nodes[a].mass = (self.nodes[a].mass - 1.0).max(0.0);
            self.nodes[b].mass = (self.nodes[b].mass - 1.0).max(0.0);
        }
        self.matrix.set(a, b, want);
        self.dirty |= DirtyFlags::CONNECTIONS;
        Ok(())
    }

    /// Move a node on the host side (dragging, restore)
    pub fn set_position(&mut self, index: usize, position: [f32; 2]) -> GraphResult<()> {
        self.node_mut(index)?.position = position;
        self.dirty |= DirtyFlags::NODE_POSITIONS;
        Ok(())
    }

    /// Overwrite kernel-owned fields of the leading nodes without marking
    /// anything dirty. Host-edited nodes are skipped. Returns how many nodes
    /// were updated.
    pub fn apply_kinematics<I>(&mut self, updates: I) -> usize
    where
        I: IntoIterator<Item = ([f32; 2], f32)>,
    {
        let mut applied = 0;
        let nodes = self.nodes.iter_mut().zip(&self.host_edited);
        for ((node, &edited), (position, temperature)) in nodes.zip(updates) {
            if edited {
                continue;
            }
            node.position = position;
            node.temperature = temperature;
            applied += 1;
        }
        applied
    }

    pub fn is_host_edited(&self, index: usize) -> bool {
        self.host_edited.get(index).copied().unwrap_or(false)
    }

    /// Release every host edit once the edited values have been uploaded.
    /// Returns how many nodes were held.
    pub fn take_host_edits(&mut self) -> usize {
        let mut held = 0;
        for edited in &mut self.host_edited {
            if std::mem::take(edited) {
                held += 1;
            }
        }
        held
    }

    /// Index of the most recently pushed node with this title
    pub fn find_node_from_title(&self, title: &str) -> Option<usize> {
        self.title_to_index.get(title).copied()
    }

    pub fn index_from_id(&self, id: NodeId) -> Option<usize> {
        self.id_to_index.get(&id).copied()
    }

    /// Mark channels for re-upload and re-render
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Return and clear the pending dirty set
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.dirty)
    }

    /// Remove every node and connection. Ids keep counting up.
    pub fn clear(&mut self) {
        let capacity = self.matrix.capacity();
        self.nodes.clear();
        self.connections.clear();
        self.matrix = ConnectivityMatrix::new(capacity);
        self.id_to_index.clear();
        self.title_to_index.clear();
        self.host_edited.clear();
        self.dirty = DirtyFlags::ALL;
    }

    fn check(&self, index: usize) -> GraphResult<()> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> GraphStore {
        let mut store = GraphStore::with_capacity(4);
        for i in 0..n {
            store.push_node(Node::new(format!("N{i}"), i as f32, 0.0));
        }
        store
    }

    #[test]
    fn push_assigns_dense_index_and_unique_ids() {
        let store = store_with(3);
        let ids: Vec<_> = store.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![NodeId(0), NodeId(1), NodeId(2)]);
        for (i, node) in store.nodes().iter().enumerate() {
            assert_eq!(node.index, i);
            assert_eq!(store.index_from_id(node.id), Some(i));
        }
    }

    #[test]
    fn title_lookup_last_write_wins() {
        let mut store = store_with(2);
        assert_eq!(store.find_node_from_title("N1"), Some(1));
        assert_eq!(store.find_node_from_title("missing"), None);

        let dup = store.push_node(Node::new("N0", 0.0, 0.0));
        assert_eq!(store.find_node_from_title("N0"), Some(dup));
    }

    #[test]
    fn set_connected_twice_yields_one_edge() {
        let mut store = store_with(3);
        store.set_connected(0, 2, true).unwrap();
        store.set_connected(0, 2, true).unwrap();
        store.set_connected(2, 0, true).unwrap();

        assert_eq!(store.connection_count(), 1);
        assert!(store.is_connected(0, 2).unwrap());
        assert!(store.is_connected(2, 0).unwrap());
        assert_eq!(store.node(0).unwrap().mass, 1.0);
        assert_eq!(store.node(2).unwrap().mass, 1.0);
    }

    #[test]
    fn disconnecting_unconnected_pair_is_noop() {
        let mut store = store_with(3);
        store.set_connected(0, 1, true).unwrap();
        store.take_dirty();

        store.set_connected(1, 2, false).unwrap();
        assert_eq!(store.connections(), &[Connection::new(0, 1)]);
        assert!(store.dirty().is_empty());
    }

    #[test]
    fn self_connection_is_ignored() {
        let mut store = store_with(2);
        store.set_connected(1, 1, true).unwrap();
        assert!(!store.is_connected(1, 1).unwrap());
        assert_eq!(store.connection_count(), 0);
        assert_eq!(store.node(1).unwrap().mass, 0.0);
    }

    #[test]
    fn disconnect_swap_removes() {
        let mut store = store_with(4);
        store.set_connected(0, 1, true).unwrap();
        store.set_connected(1, 2, true).unwrap();
        store.set_connected(2, 3, true).unwrap();

        store.set_connected(1, 0, false).unwrap();
        assert_eq!(
            store.connections(),
            &[Connection::new(2, 3), Connection::new(1, 2)]
        );
        assert!(!store.is_connected(0, 1).unwrap());
        assert_eq!(store.node(0).unwrap().mass, 0.0);
        assert_eq!(store.node(1).unwrap().mass, 1.0);
    }

    #[test]
    fn growth_preserves_existing_connections() {
        let mut store = GraphStore::with_capacity(4);
        for i in 0..4 {
            store.push_node(Node::new(format!("N{i}"), 0.0, 0.0));
        }
        let early = [(0, 1), (0, 3), (1, 2), (2, 3)];
        for (a, b) in early {
            store.set_connected(a, b, true).unwrap();
        }

        for i in 4..20 {
            store.push_node(Node::new(format!("N{i}"), 0.0, 0.0));
        }
        assert!(store.capacity() >= 16, "capacity {}", store.capacity());

        for (a, b) in early {
            assert!(store.is_connected(a, b).unwrap(), "lost ({a},{b})");
        }
        assert!(!store.is_connected(0, 2).unwrap());
        assert_eq!(store.connection_count(), early.len());

        store.set_connected(3, 19, true).unwrap();
        assert!(store.is_connected(19, 3).unwrap());
    }

    #[test]
    fn out_of_range_indices_fail_fast() {
        let mut store = store_with(2);
        assert_eq!(
            store.is_connected(0, 2),
            Err(GraphError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert!(store.set_connected(5, 0, true).is_err());
        assert!(store.node(9).is_err());
        assert!(store.set_position(3, [0.0, 0.0]).is_err());
    }

    #[test]
    fn dirty_flags_track_mutations() {
        let mut store = store_with(2);
        assert_eq!(store.take_dirty(), DirtyFlags::ALL);
        assert!(store.take_dirty().is_empty());

        store.set_connected(0, 1, true).unwrap();
        store.set_position(0, [5.0, 5.0]).unwrap();
        let dirty = store.take_dirty();
        assert!(dirty.contains(DirtyFlags::CONNECTIONS));
        assert!(dirty.contains(DirtyFlags::NODE_POSITIONS));
        assert!(!dirty.contains(DirtyFlags::NODE_COLORS));
    }

    #[test]
    fn apply_kinematics_stops_at_node_count() {
        let mut store = store_with(2);
        store.take_dirty();
        let updates = [([1.0, 1.0], 0.5), ([2.0, 2.0], 0.4), ([9.0, 9.0], 0.1)];
        let applied = store.apply_kinematics(updates);
        assert_eq!(applied, 2);
        assert_eq!(store.node(1).unwrap().position, [2.0, 2.0]);
        assert_eq!(store.node(1).unwrap().temperature, 0.4);
        assert!(store.dirty().is_empty());
    }

    #[test]
    fn host_edits_survive_kinematics_until_taken() {
        let mut store = store_with(3);
        store.set_position(1, [50.0, 60.0]).unwrap();
        store.node_mut(2).unwrap().temperature = 1.0;
        assert!(store.is_host_edited(1));
        assert!(!store.is_host_edited(0));

        let updates = [([1.0, 1.0], 0.5), ([2.0, 2.0], 0.4), ([3.0, 3.0], 0.3)];
        assert_eq!(store.apply_kinematics(updates), 1);
        assert_eq!(store.node(0).unwrap().position, [1.0, 1.0]);
        assert_eq!(store.node(1).unwrap().position, [50.0, 60.0]);
        assert_eq!(store.node(2).unwrap().temperature, 1.0);

        assert_eq!(store.take_host_edits(), 2);
        assert_eq!(store.take_host_edits(), 0);
        assert_eq!(store.apply_kinematics(updates), 3);
        assert_eq!(store.node(1).unwrap().position, [2.0, 2.0]);
    }

    #[test]
    fn clear_keeps_ids_monotonic() {
        let mut store = store_with(2);
        store.clear();
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.find_node_from_title("N0"), None);

        let index = store.push_node(Node::new("fresh", 0.0, 0.0));
        assert_eq!(index, 0);
        assert_eq!(store.node(0).unwrap().id, NodeId(2));
    }
}
