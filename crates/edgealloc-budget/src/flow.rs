//! Min-cost maximum flow over real-valued capacities.
//!
//! [`FlowSolver`] is the seam the splittable assigner depends on;
//! [`SuccessiveShortestPath`] is the default implementation. It augments
//! along Bellman-Ford shortest paths in the residual graph, so negative arc
//! costs are allowed as long as the input has no negative cycle.

use tracing::{debug, warn};

/// Residual capacity below this is treated as saturated.
pub const FLOW_EPSILON: f64 = 1e-9;

/// A directed arc as added by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEdge {
    pub from: usize,
    pub to: usize,
    pub capacity: f64,
    pub cost: f64,
}

/// Directed network with a fixed node count.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    nodes: usize,
    edges: Vec<FlowEdge>,
}

impl FlowNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
        }
    }

    /// Add an arc and return its index into [`FlowSolution::flows`].
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64, cost: f64) -> usize {
        self.edges.push(FlowEdge {
            from,
            to,
            capacity: capacity.max(0.0),
            cost,
        });
        self.edges.len() - 1
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }
}

/// Flow on every arc, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    pub flows: Vec<f64>,
    pub total_flow: f64,
    pub total_cost: f64,
}

/// Computes a minimum-cost maximum flow.
///
/// Returns `None` when the solver cannot produce a flow, e.g. because the
/// input contains a negative cycle.
pub trait FlowSolver {
    fn solve(&self, network: &FlowNetwork, source: usize, sink: usize) -> Option<FlowSolution>;
}

/// Successive shortest augmenting paths with Bellman-Ford.
#[derive(Debug, Clone)]
pub struct SuccessiveShortestPath {
    /// Upper bound on augmentations before giving up.
    pub max_augmentations: usize,
}

impl Default for SuccessiveShortestPath {
    fn default() -> Self {
        Self {
            max_augmentations: 100_000,
        }
    }
}

/// Residual arc. Arc `2i` is edge `i` forward, `2i + 1` its reverse.
struct ResidualArc {
    to: usize,
    residual: f64,
    cost: f64,
}

impl SuccessiveShortestPath {
    /// Shortest residual path from `source`; `None` on a negative cycle.
    fn shortest_path(
        arcs: &[ResidualArc],
        adjacency: &[Vec<usize>],
        source: usize,
    ) -> Option<(Vec<f64>, Vec<Option<usize>>)> {
        let n = adjacency.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        dist[source] = 0.0;

        for round in 0..n {
            let mut changed = false;
            for u in 0..n {
                if dist[u] == f64::INFINITY {
                    continue;
                }
                for &a in &adjacency[u] {
                    let arc = &arcs[a];
                    if arc.residual <= FLOW_EPSILON {
                        continue;
                    }
                    let candidate = dist[u] + arc.cost;
                    if candidate < dist[arc.to] - FLOW_EPSILON {
                        dist[arc.to] = candidate;
                        prev[arc.to] = Some(a);
                        changed = true;
                    }
                }
            }
            if !changed {
                return Some((dist, prev));
            }
            if round == n - 1 {
                return None;
            }
        }
        Some((dist, prev))
    }
}

impl FlowSolver for SuccessiveShortestPath {
    fn solve(&self, network: &FlowNetwork, source: usize, sink: usize) -> Option<FlowSolution> {
        let n = network.nodes();
        if source >= n || sink >= n || network.edges().iter().any(|e| e.from >= n || e.to >= n) {
            warn!(nodes = n, source, sink, "flow network references a missing node");
            return None;
        }

        let mut arcs = Vec::with_capacity(network.edges().len() * 2);
        let mut adjacency = vec![Vec::new(); n];
        for edge in network.edges() {
            adjacency[edge.from].push(arcs.len());
            arcs.push(ResidualArc {
                to: edge.to,
                residual: edge.capacity,
                cost: edge.cost,
            });
            adjacency[edge.to].push(arcs.len());
            arcs.push(ResidualArc {
                to: edge.from,
                residual: 0.0,
                cost: -edge.cost,
            });
        }

        let mut total_flow = 0.0;
        let mut total_cost = 0.0;
        let mut augmentations = 0;

        loop {
            let Some((dist, prev)) = Self::shortest_path(&arcs, &adjacency, source) else {
                warn!("negative cycle in residual graph");
                return None;
            };
            if dist[sink] == f64::INFINITY {
                break;
            }

            // Walk back from the sink to find the bottleneck.
            let mut bottleneck = f64::INFINITY;
            let mut node = sink;
            while node != source {
                let a = prev[node]?;
                bottleneck = bottleneck.min(arcs[a].residual);
                node = arcs[a ^ 1].to;
            }
            if bottleneck <= FLOW_EPSILON {
                break;
            }

            let mut node = sink;
            while node != source {
                let a = prev[node]?;
                arcs[a].residual -= bottleneck;
                arcs[a ^ 1].residual += bottleneck;
                node = arcs[a ^ 1].to;
            }
            total_flow += bottleneck;
            total_cost += bottleneck * dist[sink];

            augmentations += 1;
            if augmentations >= self.max_augmentations {
                warn!(augmentations, "flow solver hit its augmentation limit");
                return None;
            }
        }

        // Flow on edge i is the residual accumulated on its reverse arc.
        let flows = (0..network.edges().len()).map(|i| arcs[2 * i + 1].residual).collect();
        debug!(total_flow, total_cost, augmentations, "min-cost flow solved");

        Some(FlowSolution {
            flows,
            total_flow,
            total_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_edge_saturates() {
        let mut net = FlowNetwork::new(2);
        net.add_edge(0, 1, 5.0, 2.0);
        let sol = SuccessiveShortestPath::default().solve(&net, 0, 1).unwrap();
        assert_eq!(sol.total_flow, 5.0);
        assert_eq!(sol.total_cost, 10.0);
        assert_eq!(sol.flows, vec![5.0]);
    }

    #[test]
    fn prefers_cheaper_parallel_route() {
        // 0 -> 1 -> 3 costs 1, 0 -> 2 -> 3 costs 5; sink capacity limits total to 4.
        let mut net = FlowNetwork::new(5);
        let cheap = net.add_edge(0, 1, 3.0, 1.0);
        let dear = net.add_edge(0, 2, 3.0, 5.0);
        net.add_edge(1, 3, 3.0, 0.0);
        net.add_edge(2, 3, 3.0, 0.0);
        net.add_edge(3, 4, 4.0, 0.0);
        let sol = SuccessiveShortestPath::default().solve(&net, 0, 4).unwrap();
        assert_eq!(sol.total_flow, 4.0);
        assert_eq!(sol.flows[cheap], 3.0);
        assert_eq!(sol.flows[dear], 1.0);
        assert_eq!(sol.total_cost, 8.0);
    }

    #[test]
    fn negative_costs_are_supported() {
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 2.0, 0.0);
        let good = net.add_edge(1, 2, 2.0, -10.0);
        let poor = net.add_edge(1, 3, 2.0, -1.0);
        net.add_edge(2, 3, 1.0, 0.0);
        let sol = SuccessiveShortestPath::default().solve(&net, 0, 3).unwrap();
        assert_eq!(sol.total_flow, 2.0);
        assert_eq!(sol.flows[good], 1.0);
        assert_eq!(sol.flows[poor], 1.0);
        assert_eq!(sol.total_cost, -11.0);
    }

    #[test]
    fn rerouting_through_reverse_arcs() {
        // Greedy first path 0-1-2-3 must be partly undone to reach max flow 2.
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 1.0, 0.0);
        net.add_edge(0, 2, 1.0, 2.0);
        net.add_edge(1, 2, 1.0, 0.0);
        net.add_edge(1, 3, 1.0, 2.0);
        net.add_edge(2, 3, 1.0, 0.0);
        let sol = SuccessiveShortestPath::default().solve(&net, 0, 3).unwrap();
        assert_eq!(sol.total_flow, 2.0);
        assert_eq!(sol.total_cost, 4.0);
    }

    #[test]
    fn unreachable_sink_yields_zero_flow() {
        let mut net = FlowNetwork::new(3);
        net.add_edge(0, 1, 1.0, 0.0);
        let sol = SuccessiveShortestPath::default().solve(&net, 0, 2).unwrap();
        assert_eq!(sol.total_flow, 0.0);
        assert_eq!(sol.flows, vec![0.0]);
    }

    #[test]
    fn negative_cycle_is_rejected() {
        let mut net = FlowNetwork::new(3);
        net.add_edge(0, 1, 1.0, 0.0);
        net.add_edge(1, 2, 1.0, -1.0);
        net.add_edge(2, 1, 1.0, -1.0);
        assert!(SuccessiveShortestPath::default().solve(&net, 0, 2).is_none());
    }

    #[test]
    fn bad_node_index_is_rejected() {
        let mut net = FlowNetwork::new(2);
        net.add_edge(0, 7, 1.0, 0.0);
        assert!(SuccessiveShortestPath::default().solve(&net, 0, 1).is_none());
    }
}
