//! Dependency graph between combinational rules.
//!
//! An edge `A -> B` means rule `A` writes a net that rule `B` reads before
//! assigning it. Only static reads create edges: elements reached through a
//! run-time index are left to the simulator's fixed-point loop.

use std::collections::HashMap;

use ember_ir::{Design, NetId, NetMap, RuleId, RuleKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::AnalyzeError;
use crate::usage::RuleUsage;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Combinational rule dependencies with a topological rank per rule.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<RuleId, ()>,
    nodes: HashMap<RuleId, NodeIndex>,
    ranks: HashMap<RuleId, u32>,
    order: Vec<RuleId>,
}

impl DependencyGraph {
    /// Builds the graph over every combinational rule of the design.
    ///
    /// `usages` is indexed by rule. Fails with
    /// [`AnalyzeError::CombinationalCycle`] naming every rule on the first
    /// cycle found.
    pub fn build(
        design: &Design,
        nets: &NetMap,
        usages: &[RuleUsage],
    ) -> Result<Self, AnalyzeError> {
        let comb: Vec<RuleId> = design
            .rules_depth_first()
            .into_iter()
            .filter(|r| design.rules[*r].kind == RuleKind::Combinational)
            .collect();

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for rule in &comb {
            nodes.insert(*rule, graph.add_node(*rule));
        }

        let mut writer: HashMap<NetId, RuleId> = HashMap::new();
        for rule in &comb {
            for (signal, _) in &usages[rule.index()].writes {
                writer.insert(nets.net_of(*signal), *rule);
            }
        }
        for reader in &comb {
            for signal in &usages[reader.index()].reads {
                if let Some(w) = writer.get(&nets.net_of(*signal)) {
                    graph.update_edge(nodes[w], nodes[reader], ());
                }
            }
        }

        let finished = find_order(&graph, design)?;
        let mut ranks: HashMap<RuleId, u32> = comb.iter().map(|r| (*r, 0)).collect();
        for node in finished.iter().rev() {
            let rank = ranks[&graph[*node]];
            for succ in graph.neighbors_directed(*node, Direction::Outgoing) {
                let entry = ranks.entry(graph[succ]).or_insert(0);
                *entry = (*entry).max(rank + 1);
            }
        }

        let position: HashMap<RuleId, usize> =
            comb.iter().enumerate().map(|(i, r)| (*r, i)).collect();
        let mut order = comb.clone();
        order.sort_by_key(|r| (ranks[r], position[r]));

        tracing::debug!(
            rules = comb.len(),
            edges = graph.edge_count(),
            levels = ranks.values().max().map_or(0, |m| m + 1),
            "built combinational dependency graph"
        );
        Ok(Self {
            graph,
            nodes,
            ranks,
            order,
        })
    }

    /// Topological rank of a combinational rule; rules without
    /// combinational predecessors have rank 0.
    pub fn rank(&self, rule: RuleId) -> Option<u32> {
        self.ranks.get(&rule).copied()
    }

    /// Combinational rules ordered by rank, ties in design order.
    pub fn order(&self) -> &[RuleId] {
        &self.order
    }

    /// Rules that read what `rule` writes.
    pub fn successors(&self, rule: RuleId) -> Vec<RuleId> {
        let Some(node) = self.nodes.get(&rule) else {
            return Vec::new();
        };
        let mut succ: Vec<RuleId> = self.graph.neighbors(*node).map(|n| self.graph[n]).collect();
        succ.sort();
        succ
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The underlying graph.
    pub fn graph(&self) -> &DiGraph<RuleId, ()> {
        &self.graph
    }
}

/// Depth-first search with white/gray/black coloring.
///
/// Returns nodes in finishing order, or the first cycle found.
fn find_order(graph: &DiGraph<RuleId, ()>, design: &Design) -> Result<Vec<NodeIndex>, AnalyzeError> {
    let succs: Vec<Vec<NodeIndex>> = graph
        .node_indices()
        .map(|n| {
            let mut s: Vec<NodeIndex> = graph.neighbors(n).collect();
            s.sort();
            s
        })
        .collect();
    let mut color = vec![Color::White; graph.node_count()];
    let mut finished = Vec::with_capacity(graph.node_count());

    for start in graph.node_indices() {
        if color[start.index()] != Color::White {
            continue;
        }
        color[start.index()] = Color::Gray;
        let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let Some(next) = succs[node.index()].get(top.1).copied() else {
                color[node.index()] = Color::Black;
                finished.push(node);
                stack.pop();
                continue;
            };
            top.1 += 1;
            match color[next.index()] {
                Color::White => {
                    color[next.index()] = Color::Gray;
                    stack.push((next, 0));
                }
                Color::Gray => {
                    let from = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[from..]
                        .iter()
                        .map(|(n, _)| design.rule_path(graph[*n]))
                        .collect();
                    cycle.push(design.rule_path(graph[next]));
                    tracing::debug!(cycle = %cycle.join(" -> "), "combinational cycle");
                    return Err(AnalyzeError::CombinationalCycle { cycle });
                }
                Color::Black => {}
            }
        }
    }
    Ok(finished)
}
