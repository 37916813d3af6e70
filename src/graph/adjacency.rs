//! Flattened adjacency for per-node kernels
//!
//! Connections are sorted by `(a, b)` with `a < b`. Each node gets a start
//! pointer to its first incident edge, and each edge carries, per endpoint, the
//! positive distance to that endpoint's next incident edge (0 terminates). A
//! kernel walks a node's edges with nothing but index arithmetic.

use std::fmt;

use tracing::debug;

use super::store::Connection;

/// Sentinel start pointer for a node with no edges
pub const NO_EDGE: i32 = -1;

/// One sorted edge with its per-endpoint chain strides.
///
/// Layout matches the WGSL `Edge` struct for direct buffer upload.
#[repr(C)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Lower endpoint index
    pub a: u32,
    /// Higher endpoint index
    pub b: u32,
    /// Distance to the next edge incident to `a`, or 0
    pub stride_a: i32,
    /// Distance to the next edge incident to `b`, or 0
    pub stride_b: i32,
}

impl EdgeRecord {
    /// The other endpoint and the chain stride for `node`.
    ///
    /// `node` must be one of the endpoints.
    #[inline]
    pub fn step_from(&self, node: u32) -> (u32, i32) {
        if self.a == node {
            (self.b, self.stride_a)
        } else {
            (self.a, self.stride_b)
        }
    }
}

/// Sorted edges plus per-node start pointers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjacencyIndex {
    edges: Vec<EdgeRecord>,
    starts: Vec<i32>,
}

impl AdjacencyIndex {
    /// Build the index for `node_count` nodes from an unordered connection list
    pub fn build(connections: &[Connection], node_count: usize) -> Self {
        let mut edges: Vec<EdgeRecord> = connections
            .iter()
            .map(|c| EdgeRecord {
                a: c.a.min(c.b) as u32,
                b: c.a.max(c.b) as u32,
                stride_a: 0,
                stride_b: 0,
            })
            .collect();
        edges.sort_unstable_by_key(|e| (e.a, e.b));

        let mut starts = vec![NO_EDGE; node_count];
        // Position of the most recent edge seen for each node
        let mut last: Vec<Option<usize>> = vec![None; node_count];

        for pos in 0..edges.len() {
            let (a, b) = (edges[pos].a as usize, edges[pos].b as usize);
            for node in [a, b] {
                match last[node] {
                    Some(prev) => {
                        let stride = (pos - prev) as i32;
                        if edges[prev].a as usize == node {
                            edges[prev].stride_a = stride;
                        } else {
                            edges[prev].stride_b = stride;
                        }
                    }
                    None => starts[node] = pos as i32,
                }
                last[node] = Some(pos);
            }
        }

        debug!(
            nodes = node_count,
            edges = edges.len(),
            "rebuilt adjacency index"
        );
        Self { edges, starts }
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn starts(&self) -> &[i32] {
        &self.starts
    }

    pub fn node_count(&self) -> usize {
        self.starts.len()
    }

    /// Walk the chain of edges incident to `node`.
    ///
    /// Yields `(edge position, neighbour index)` pairs in ascending position.
    pub fn incident(&self, node: usize) -> Incident<'_> {
        incident(&self.edges, &self.starts, node)
    }
}

/// Walk `node`'s chain over raw edge and start arrays, as uploaded to a
/// kernel. A node without a start entry has no edges.
pub fn incident<'a>(edges: &'a [EdgeRecord], starts: &[i32], node: usize) -> Incident<'a> {
    Incident {
        edges,
        node: node as u32,
        next: starts.get(node).copied().unwrap_or(NO_EDGE),
    }
}

/// Iterator over one node's adjacency chain
pub struct Incident<'a> {
    edges: &'a [EdgeRecord],
    node: u32,
    next: i32,
}

impl Iterator for Incident<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < 0 {
            return None;
        }
        let pos = self.next as usize;
        let (other, stride) = self.edges[pos].step_from(self.node);
        self.next = if stride > 0 {
            self.next + stride
        } else {
            NO_EDGE
        };
        Some((pos, other as usize))
    }
}

impl fmt::Display for AdjacencyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "edges:")?;
        for (pos, e) in self.edges.iter().enumerate() {
            writeln!(
                f,
                "  {pos}: {}-{} stride_a={} stride_b={}",
                e.a, e.b, e.stride_a, e.stride_b
            )?;
        }
        writeln!(f, "starts:")?;
        for (node, start) in self.starts.iter().enumerate() {
            writeln!(f, "  {node}: {start}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conns(pairs: &[(usize, usize)]) -> Vec<Connection> {
        pairs.iter().map(|&(a, b)| Connection::new(a, b)).collect()
    }

    #[test]
    fn raw_walk_matches_index_walk() {
        let index = AdjacencyIndex::build(&conns(&[(0, 1), (0, 2), (1, 2), (2, 3)]), 5);
        for node in 0..6 {
            let raw: Vec<_> = incident(index.edges(), index.starts(), node).collect();
            let owned: Vec<_> = index.incident(node).collect();
            assert_eq!(raw, owned, "node {node}");
        }
        // Nodes past the start array have no chain
        assert_eq!(incident(index.edges(), index.starts(), 5).count(), 0);
    }

    #[test]
    fn walk_visits_exactly_incident_edges() {
        let index = AdjacencyIndex::build(&conns(&[(0, 1), (0, 2), (1, 3)]), 5);

        let mut from_zero: Vec<_> = index.incident(0).map(|(_, n)| n).collect();
        from_zero.sort();
        assert_eq!(from_zero, vec![1, 2]);

        let mut from_one: Vec<_> = index.incident(1).map(|(_, n)| n).collect();
        from_one.sort();
        assert_eq!(from_one, vec![0, 3]);

        assert_eq!(index.incident(3).map(|(_, n)| n).collect::<Vec<_>>(), vec![1]);
        assert_eq!(index.incident(4).count(), 0);
        assert_eq!(index.starts()[4], NO_EDGE);
    }

    #[test]
    fn edges_are_sorted_and_normalized() {
        let index = AdjacencyIndex::build(&conns(&[(3, 1), (2, 0), (1, 0)]), 4);
        let pairs: Vec<_> = index.edges().iter().map(|e| (e.a, e.b)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 3)]);
    }

    #[test]
    fn walk_matches_brute_force_on_dense_graph() {
        let mut pairs = Vec::new();
        for i in 0..9 {
            for j in (i + 1)..9 {
                if (i * 7 + j * 3) % 4 != 0 {
                    pairs.push((j, i));
                }
            }
        }
        let index = AdjacencyIndex::build(&conns(&pairs), 10);

        for node in 0..10 {
            let walked: Vec<_> = index.incident(node).map(|(pos, _)| pos).collect();
            let expected: Vec<_> = index
                .edges()
                .iter()
                .enumerate()
                .filter(|(_, e)| e.a as usize == node || e.b as usize == node)
                .map(|(pos, _)| pos)
                .collect();
            assert_eq!(walked, expected, "node {node}");
        }
    }

    #[test]
    fn out_of_range_node_walks_nothing() {
        let index = AdjacencyIndex::build(&conns(&[(0, 1)]), 2);
        assert_eq!(index.incident(7).count(), 0);
    }

    #[test]
    fn table_rendering() {
        let index = AdjacencyIndex::build(&conns(&[(0, 1), (0, 2), (1, 3)]), 5);
        insta::assert_snapshot!(index.to_string(), @r"
        edges:
          0: 0-1 stride_a=1 stride_b=2
          1: 0-2 stride_a=0 stride_b=0
          2: 1-3 stride_a=0 stride_b=0
        starts:
          0: 0
          1: 0
          2: 1
          3: 2
          4: -1
        ");
    }
}
