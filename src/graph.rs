// src/graph.rs
//
// Static warehouse routing graph: directed adjacency list + Dijkstra
// shortest paths. Undirected edges are materialised as two directed
// entries. Avoid-set and A* variants share the same relaxation loop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::NodeIndex;

/// One outgoing adjacency entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub to: NodeIndex,
    pub distance: f64,
    pub directed: bool,
}

/// Result of a shortest-path query.
///
/// When `found`, `nodes[0]` is the source, `nodes[last]` the destination and
/// every adjacent pair is connected by a directed edge of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<NodeIndex>,
    pub total_distance: f64,
    pub found: bool,
}

impl Path {
    pub fn not_found() -> Self {
        Self {
            nodes: Vec::new(),
            total_distance: f64::INFINITY,
            found: false,
        }
    }

    fn trivial(node: NodeIndex) -> Self {
        Self {
            nodes: vec![node],
            total_distance: 0.0,
            found: true,
        }
    }

    /// Node that follows `current` on this path, if any.
    pub fn next_after(&self, current: NodeIndex) -> Option<NodeIndex> {
        let pos = self.nodes.iter().position(|&n| n == current)?;
        self.nodes.get(pos + 1).copied()
    }
}

/// Min-heap entry keyed by tentative distance. BinaryHeap is a max-heap,
/// so the ordering is reversed; ties break on the node index to keep pop
/// order deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    cost: f64,
    node: NodeIndex,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Edge-weighted routing graph over the world's node indices.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    adj: Vec<Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node; returns its index. Only used during world init.
    pub fn add_node(&mut self) -> NodeIndex {
        self.adj.push(Vec::new());
        self.adj.len() - 1
    }

    /// Add an edge. Undirected edges become two directed entries.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, distance: f64, directed: bool) {
        if from >= self.adj.len() || to >= self.adj.len() {
            eprintln!("[graph] WARN: add_edge with invalid index {from}->{to}; ignored");
            return;
        }
        self.adj[from].push(Edge {
            to,
            distance,
            directed,
        });
        if !directed {
            self.adj[to].push(Edge {
                to: from,
                distance,
                directed,
            });
        }
    }

    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    pub fn neighbors(&self, node: NodeIndex) -> &[Edge] {
        self.adj.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.neighbors(from).iter().any(|e| e.to == to)
    }

    /// Distance of the direct edge `from -> to`, or infinity if absent.
    pub fn edge_distance(&self, from: NodeIndex, to: NodeIndex) -> f64 {
        self.neighbors(from)
            .iter()
            .find(|e| e.to == to)
            .map(|e| e.distance)
            .unwrap_or(f64::INFINITY)
    }

    /// Dijkstra shortest path with early termination at the destination.
    pub fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Path {
        self.dijkstra(from, to, &[], |_| 0.0)
    }

    /// Shortest path that never enters any node in `avoid` (except `to`).
    pub fn shortest_path_avoiding(&self, from: NodeIndex, to: NodeIndex, avoid: &[NodeIndex]) -> Path {
        if avoid.contains(&from) || avoid.contains(&to) {
            return Path::not_found();
        }
        self.dijkstra(from, to, avoid, |_| 0.0)
    }

    /// A* with a caller-supplied admissible heuristic. With the zero
    /// heuristic this is exactly `shortest_path`.
    pub fn a_star<H>(&self, from: NodeIndex, to: NodeIndex, heuristic: H) -> Path
    where
        H: Fn(NodeIndex) -> f64,
    {
        self.dijkstra(from, to, &[], heuristic)
    }

    fn dijkstra<H>(&self, from: NodeIndex, to: NodeIndex, avoid: &[NodeIndex], heuristic: H) -> Path
    where
        H: Fn(NodeIndex) -> f64,
    {
        let n = self.adj.len();
        if from >= n || to >= n {
            return Path::not_found();
        }
        if from == to {
            return Path::trivial(from);
        }

        let mut dist = vec![f64::INFINITY; n];
        let mut pred: Vec<Option<NodeIndex>> = vec![None; n];
        let mut visited = vec![false; n];

        // Avoided nodes are pre-marked visited so they are never relaxed.
        for &a in avoid {
            if a < n && a != to {
                visited[a] = true;
            }
        }

        let mut heap = BinaryHeap::new();
        dist[from] = 0.0;
        heap.push(QueueEntry {
            cost: heuristic(from),
            node: from,
        });

        while let Some(QueueEntry { node: u, .. }) = heap.pop() {
            if u == to {
                break;
            }
            if visited[u] {
                continue;
            }
            visited[u] = true;

            for edge in &self.adj[u] {
                let v = edge.to;
                if visited[v] && v != to {
                    continue;
                }
                let tentative = dist[u] + edge.distance;
                if tentative < dist[v] {
                    dist[v] = tentative;
                    pred[v] = Some(u);
                    heap.push(QueueEntry {
                        cost: tentative + heuristic(v),
                        node: v,
                    });
                }
            }
        }

        self.reconstruct(from, to, &pred, &dist)
    }

    fn reconstruct(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        pred: &[Option<NodeIndex>],
        dist: &[f64],
    ) -> Path {
        if !dist[to].is_finite() {
            return Path::not_found();
        }

        let mut reverse = Vec::new();
        let mut current = to;
        loop {
            reverse.push(current);
            if current == from {
                break;
            }
            match pred[current] {
                Some(p) => current = p,
                None => return Path::not_found(),
            }
        }

        reverse.reverse();
        Path {
            nodes: reverse,
            total_distance: dist[to],
            found: true,
        }
    }
}
