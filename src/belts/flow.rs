//! Bounded-flow feasibility reduction and FIFO push-relabel max-flow.
//!
//! Four stages turn a bounded-flow problem into a plain max-flow
//! instance: lower-bound elimination (folded into node requirement),
//! node splitting for throughput caps, super-source/sink construction,
//! and the max-flow solve itself. Infeasibility is witnessed by a
//! residual-graph reachability cut.

use std::collections::VecDeque;

use indexmap::IndexMap;
use log::{debug, info, warn};

use super::{BeltsInput, BeltsOutput, EdgeFlow, EdgeRef};
use crate::error::{PlannerError, Result};
use crate::tolerance::{clamp_zero, EPSILON};

/// An edge in the residual graph: a forward edge and its paired reverse
/// edge are always adjacent entries (`rev` points at the sibling).
#[derive(Debug, Clone, Copy)]
struct FlowEdge {
    to: usize,
    capacity: f64,
    flow: f64,
    rev: usize,
}

struct FlowNetwork {
    num_nodes: usize,
    adj: Vec<Vec<usize>>,
    edges: Vec<FlowEdge>,
}

impl FlowNetwork {
    fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            adj: vec![Vec::new(); num_nodes],
            edges: Vec::new(),
        }
    }

    /// Adds a forward/reverse edge pair, returning the forward edge's index.
    fn add_edge(&mut self, from: usize, to: usize, capacity: f64) -> usize {
        let fwd = self.edges.len();
        let rev = fwd + 1;
        self.edges.push(FlowEdge {
            to,
            capacity,
            flow: 0.0,
            rev,
        });
        self.adj[from].push(fwd);
        self.edges.push(FlowEdge {
            to: from,
            capacity: 0.0,
            flow: 0.0,
            rev: fwd,
        });
        self.adj[to].push(rev);
        fwd
    }

    fn residual(&self, edge_idx: usize) -> f64 {
        self.edges[edge_idx].capacity - self.edges[edge_idx].flow
    }

    fn push_flow(&mut self, edge_idx: usize, amount: f64) {
        self.edges[edge_idx].flow += amount;
        let rev = self.edges[edge_idx].rev;
        self.edges[rev].flow -= amount;
    }
}

/// FIFO push-relabel (Goldberg-Tarjan). Deterministic given a fixed
/// adjacency order, which we control by building the network in input
/// order. Returns the max-flow value; `net` is left holding the final
/// flow assignment and residual graph.
fn max_flow(net: &mut FlowNetwork, source: usize, sink: usize) -> Result<f64> {
    let n = net.num_nodes;
    let mut height = vec![0usize; n];
    let mut excess = vec![0.0f64; n];
    let mut current = vec![0usize; n];

    let mut active: VecDeque<usize> = VecDeque::new();
    let mut in_queue = vec![false; n];

    height[source] = n;

    let source_edges: Vec<usize> = net.adj[source].clone();
    for edge_idx in source_edges {
        let cap = net.residual(edge_idx);
        if cap > EPSILON {
            let to = net.edges[edge_idx].to;
            net.push_flow(edge_idx, cap);
            excess[to] += cap;
            excess[source] -= cap;
            if to != sink && to != source && !in_queue[to] {
                active.push_back(to);
                in_queue[to] = true;
            }
        }
    }

    let max_iterations = 1_000_000usize.saturating_add(net.edges.len() * 64);
    let mut iterations = 0usize;

    while let Some(u) = active.pop_front() {
        in_queue[u] = false;
        let activated = discharge(net, &mut height, &mut excess, &mut current, u, source, sink);
        iterations += 1;
        if iterations > max_iterations {
            return Err(PlannerError::solver(
                "max-flow",
                "push-relabel did not converge within the iteration budget",
            ));
        }
        for v in activated {
            if !in_queue[v] {
                active.push_back(v);
                in_queue[v] = true;
            }
        }
        if excess[u] > EPSILON && u != source && u != sink && !in_queue[u] {
            active.push_back(u);
            in_queue[u] = true;
        }
    }

    Ok(excess[sink])
}

fn discharge(
    net: &mut FlowNetwork,
    height: &mut [usize],
    excess: &mut [f64],
    current: &mut [usize],
    u: usize,
    source: usize,
    sink: usize,
) -> Vec<usize> {
    let mut activated = Vec::new();

    while excess[u] > EPSILON {
        if current[u] >= net.adj[u].len() {
            relabel(net, height, u);
            current[u] = 0;
        } else {
            let edge_idx = net.adj[u][current[u]];
            let v = net.edges[edge_idx].to;
            let residual = net.residual(edge_idx);

            if residual > EPSILON && height[u] == height[v] + 1 {
                let push_amount = excess[u].min(residual);
                net.push_flow(edge_idx, push_amount);
                excess[u] -= push_amount;

                let was_zero = excess[v] <= EPSILON;
                excess[v] += push_amount;

                if was_zero && v != source && v != sink {
                    activated.push(v);
                }
            } else {
                current[u] += 1;
            }
        }
    }

    activated
}

fn relabel(net: &FlowNetwork, height: &mut [usize], u: usize) {
    let mut min_height = usize::MAX;
    for &edge_idx in &net.adj[u] {
        if net.residual(edge_idx) > EPSILON {
            let v = net.edges[edge_idx].to;
            min_height = min_height.min(height[v]);
        }
    }
    if min_height < usize::MAX {
        height[u] = min_height + 1;
    }
}

/// Nodes reachable from `source` in the residual graph (edges with
/// positive residual capacity).
fn residual_reachable(net: &FlowNetwork, source: usize) -> Vec<bool> {
    let mut reachable = vec![false; net.num_nodes];
    reachable[source] = true;
    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        for &edge_idx in &net.adj[u] {
            if net.residual(edge_idx) > EPSILON {
                let v = net.edges[edge_idx].to;
                if !reachable[v] {
                    reachable[v] = true;
                    queue.push_back(v);
                }
            }
        }
    }
    reachable
}

fn node_in(base: usize) -> usize {
    2 * base
}

fn node_out(base: usize) -> usize {
    2 * base + 1
}

pub fn solve_belts(input: &BeltsInput) -> Result<BeltsOutput> {
    input.validate()?;
    info!(
        "belts solve: {} nodes, {} edges",
        input.nodes.len(),
        input.edges.len()
    );

    let node_index: IndexMap<String, usize> = input
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    let n = input.nodes.len();
    let s_star = 2 * n;
    let t_star = 2 * n + 1;
    let total_internal_nodes = 2 * n + 2;

    let mut imbalance = vec![0.0f64; n];
    for edge in &input.edges {
        if edge.lo > 0.0 {
            let from = node_index[&edge.from];
            let to = node_index[&edge.to];
            imbalance[to] += edge.lo;
            imbalance[from] -= edge.lo;
        }
    }

    let requirement: Vec<f64> = (0..n)
        .map(|i| imbalance[i] + input.nodes[i].supply)
        .collect();
    let total_demand: f64 = requirement.iter().map(|r| r.max(0.0)).sum();

    let mut net = FlowNetwork::new(total_internal_nodes);

    let mut has_incoming = vec![false; n];
    let mut has_outgoing = vec![false; n];
    for edge in &input.edges {
        has_outgoing[node_index[&edge.from]] = true;
        has_incoming[node_index[&edge.to]] = true;
    }

    // Stage 2: node splitting. Every node gets an in/out pair. A node's
    // cap bounds real incoming edge flow, not the supply injected at
    // v:in or the demand drained at v:out, so a pure source (supply > 0,
    // no real incoming edges) or pure sink (supply < 0, no real outgoing
    // edges) gets an infinite internal edge: its cap is satisfied
    // vacuously and must not throttle the injection/extraction itself.
    // An uncapped node's internal edge is likewise infinite, which makes
    // it behave as if unsplit for reachability and saturation purposes.
    for (i, node) in input.nodes.iter().enumerate() {
        let pure_source = node.supply > 0.0 && !has_incoming[i];
        let pure_sink = node.supply < 0.0 && !has_outgoing[i];
        let cap = if pure_source || pure_sink {
            f64::INFINITY
        } else {
            node.cap.unwrap_or(f64::INFINITY)
        };
        net.add_edge(node_in(i), node_out(i), cap);
    }

    // Stage 3: super-source / super-sink.
    for i in 0..n {
        if requirement[i] > EPSILON {
            net.add_edge(s_star, node_in(i), requirement[i]);
        } else if requirement[i] < -EPSILON {
            net.add_edge(node_out(i), t_star, -requirement[i]);
        }
    }

    // Stage 1 (capacity half) + parallel-edge aggregation: group input
    // edges by (from, to), one transformed edge per group, capacity =
    // sum of (hi - lo) over the group.
    let mut group_order: Vec<(usize, usize)> = Vec::new();
    let mut groups: IndexMap<(usize, usize), Vec<usize>> = IndexMap::new();
    for (idx, edge) in input.edges.iter().enumerate() {
        let from = node_index[&edge.from];
        let to = node_index[&edge.to];
        let key = (from, to);
        if !groups.contains_key(&key) {
            group_order.push(key);
        }
        groups.entry(key).or_default().push(idx);
    }

    let mut group_fwd_edge: IndexMap<(usize, usize), usize> = IndexMap::new();
    for &(from, to) in &group_order {
        let members = &groups[&(from, to)];
        let capacity: f64 = members
            .iter()
            .map(|&idx| input.edges[idx].hi - input.edges[idx].lo)
            .sum();
        let fwd = net.add_edge(node_out(from), node_in(to), capacity);
        group_fwd_edge.insert((from, to), fwd);
    }

    let max_flow_value = max_flow(&mut net, s_star, t_star)?;
    debug!(
        "belts: total demand {:.6}, max flow {:.6}",
        total_demand, max_flow_value
    );

    if max_flow_value >= total_demand - EPSILON {
        let mut flows = vec![
            EdgeFlow {
                from: String::new(),
                to: String::new(),
                flow: 0.0,
            };
            input.edges.len()
        ];
        for &(from, to) in &group_order {
            let fwd = group_fwd_edge[&(from, to)];
            let mut remaining = clamp_zero(net.edges[fwd].flow);
            for &idx in &groups[&(from, to)] {
                let edge = &input.edges[idx];
                let capacity = edge.hi - edge.lo;
                let take = remaining.min(capacity);
                remaining -= take;
                flows[idx] = EdgeFlow {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    flow: clamp_zero(edge.lo + take),
                };
            }
        }
        Ok(BeltsOutput::Ok { flows })
    } else {
        warn!(
            "belts infeasible: achieved {:.6} of demand {:.6}",
            max_flow_value, total_demand
        );
        let reachable = residual_reachable(&net, s_star);

        let cut_reachable: Vec<String> = input
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| reachable[node_in(*i)] || reachable[node_out(*i)])
            .map(|(_, node)| node.id.clone())
            .collect();

        let tight_nodes: Vec<String> = input
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| {
                node.cap.is_some()
                    && reachable[node_in(*i)]
                    && !reachable[node_out(*i)]
                    && net.residual(2 * i) <= EPSILON
            })
            .map(|(_, node)| node.id.clone())
            .collect();

        let mut tight_edges = Vec::new();
        for &(from, to) in &group_order {
            let fwd = group_fwd_edge[&(from, to)];
            let crosses_cut = reachable[node_out(from)] && !reachable[node_in(to)];
            if crosses_cut && net.residual(fwd) <= EPSILON {
                for &idx in &groups[&(from, to)] {
                    let edge = &input.edges[idx];
                    tight_edges.push(EdgeRef {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                    });
                }
            }
        }

        let deficit = clamp_zero((total_demand - max_flow_value).max(0.0));

        Ok(BeltsOutput::Infeasible {
            cut_reachable,
            tight_nodes,
            tight_edges,
            deficit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belts::Node;

    fn node(id: &str, cap: Option<f64>, supply: f64) -> Node {
        Node {
            id: id.to_string(),
            cap,
            supply,
        }
    }

    fn edge(from: &str, to: &str, lo: f64, hi: f64) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
            lo,
            hi,
        }
    }

    #[test]
    fn feasible_linear_chain() {
        let input = BeltsInput {
            nodes: vec![
                node("S", None, 50.0),
                node("J", Some(100.0), 0.0),
                node("T", None, -50.0),
            ],
            edges: vec![edge("S", "J", 0.0, 100.0), edge("J", "T", 0.0, 100.0)],
        };
        match solve_belts(&input).unwrap() {
            BeltsOutput::Ok { flows } => {
                assert_eq!(flows.len(), 2);
                assert!((flows[0].flow - 50.0).abs() < 1e-6);
                assert!((flows[1].flow - 50.0).abs() < 1e-6);
            }
            BeltsOutput::Infeasible { .. } => panic!("expected feasible"),
        }
    }

    #[test]
    fn infeasible_bottleneck_reports_deficit() {
        let input = BeltsInput {
            nodes: vec![node("S", None, 50.0), node("T", None, -50.0)],
            edges: vec![edge("S", "T", 0.0, 20.0)],
        };
        match solve_belts(&input).unwrap() {
            BeltsOutput::Infeasible {
                deficit,
                tight_edges,
                ..
            } => {
                assert!((deficit - 30.0).abs() < 1e-6);
                assert_eq!(tight_edges.len(), 1);
                assert_eq!(tight_edges[0].from, "S");
                assert_eq!(tight_edges[0].to, "T");
            }
            BeltsOutput::Ok { .. } => panic!("expected infeasible"),
        }
    }

    #[test]
    fn lower_bound_is_respected() {
        let input = BeltsInput {
            nodes: vec![node("A", None, 10.0), node("B", None, -10.0)],
            edges: vec![edge("A", "B", 5.0, 20.0)],
        };
        match solve_belts(&input).unwrap() {
            BeltsOutput::Ok { flows } => {
                assert!((flows[0].flow - 10.0).abs() < 1e-6);
            }
            BeltsOutput::Infeasible { .. } => panic!("expected feasible"),
        }
    }
}
