//! Dependency graph construction, topological ordering and cycle detection
//! (`spec.md` §4.2).
//!
//! Grounded directly on `original_source/Backend/dependency.py`'s
//! `build_dependency_graph`/`get_downstream_cells`/`topological_sort`/
//! `detect_cycle`. The graph is the same shape as the prototype's: a mapping
//! from cell id to the set of cell ids it depends on (its upstream set),
//! built by last-writer-wins resolution of each cell's read set against the
//! write sets of every cell that precedes it in notebook order.

use std::collections::{HashSet, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::analyzer::{self, CellAnalysis};
use crate::cell::{Cell, CellId};

/// A mapping from cell identifier to the set of cell identifiers it depends
/// on (its upstream set). Iteration order over `cells` (the order passed to
/// [`build`]) is preserved so downstream algorithms can produce deterministic
/// output.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<CellId>,
    upstream: FxHashMap<CellId, Vec<CellId>>,
}

impl DependencyGraph {
    /// The cells this one directly depends on, in no particular order.
    pub fn upstream_of(&self, id: &CellId) -> &[CellId] {
        self.upstream.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.upstream.contains_key(id)
    }

    /// All cell ids known to the graph, in the order `build` was given them.
    pub fn cell_order(&self) -> &[CellId] {
        &self.order
    }
}

/// Analyze every cell and build the dependency graph over them.
///
/// Last-writer-wins: if two cells write the same name, the cell that comes
/// later in `cells` is treated as the producer for any downstream read of
/// that name, shadowing the earlier writer entirely (`spec.md` §4.2).
pub fn build(cells: &[Cell]) -> DependencyGraph {
    let analyses: Vec<CellAnalysis> = cells.iter().map(analyzer::analyze).collect();

    let mut writer_of: FxHashMap<String, CellId> = FxHashMap::default();
    for (cell, analysis) in cells.iter().zip(&analyses) {
        for name in &analysis.writes {
            writer_of.insert(name.clone(), cell.id.clone());
        }
    }

    let mut upstream = FxHashMap::default();
    for (cell, analysis) in cells.iter().zip(&analyses) {
        let mut deps = Vec::new();
        for name in &analysis.reads {
            if let Some(producer) = writer_of.get(name) {
                if *producer != cell.id && !deps.contains(producer) {
                    deps.push(producer.clone());
                }
            }
        }
        upstream.insert(cell.id.clone(), deps);
    }

    debug!(cells = cells.len(), "rebuilt dependency graph");

    DependencyGraph {
        order: cells.iter().map(|c| c.id.clone()).collect(),
        upstream,
    }
}

/// All cells that transitively depend on `id` (never includes `id` itself).
///
/// Grounded on `get_downstream_cells`: invert the upstream map into a
/// producer→consumers map, then BFS from `id`.
pub fn downstream(graph: &DependencyGraph, id: &CellId) -> HashSet<CellId> {
    let mut consumers_of: FxHashMap<&CellId, Vec<&CellId>> = FxHashMap::default();
    for cid in &graph.order {
        consumers_of.entry(cid).or_default();
    }
    for cid in &graph.order {
        for dep in graph.upstream_of(cid) {
            consumers_of.entry(dep).or_default().push(cid);
        }
    }

    let mut result = HashSet::new();
    let mut queue: VecDeque<&CellId> = consumers_of
        .get(id)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .collect();

    while let Some(current) = queue.pop_front() {
        if result.insert(current.clone()) {
            if let Some(next) = consumers_of.get(current) {
                queue.extend(next.iter().copied());
            }
        }
    }
    result
}

/// Topologically sort `subset` (dependencies first), restricted to edges
/// that stay within `subset`.
///
/// Standard depth-first post-order: recursing into a node's dependencies
/// before appending the node itself naturally yields a dependencies-first
/// order. A node already on the current recursion stack (i.e. part of a
/// cycle) is silently skipped rather than causing an error — cycle
/// detection is a separate, explicit step (`detect_cycle`).
pub fn topo_sort(graph: &DependencyGraph, subset: &[CellId]) -> Vec<CellId> {
    let subset_set: HashSet<&CellId> = subset.iter().collect();
    let mut visited: HashSet<CellId> = HashSet::new();
    let mut on_stack: HashSet<CellId> = HashSet::new();
    let mut out = Vec::new();

    fn visit(
        node: &CellId,
        graph: &DependencyGraph,
        subset_set: &HashSet<&CellId>,
        visited: &mut HashSet<CellId>,
        on_stack: &mut HashSet<CellId>,
        out: &mut Vec<CellId>,
    ) {
        if visited.contains(node) || on_stack.contains(node) {
            return;
        }
        on_stack.insert(node.clone());
        for dep in graph.upstream_of(node) {
            if subset_set.contains(dep) {
                visit(dep, graph, subset_set, visited, on_stack, out);
            }
        }
        on_stack.remove(node);
        visited.insert(node.clone());
        out.push(node.clone());
    }

    for node in subset {
        visit(node, graph, &subset_set, &mut visited, &mut on_stack, &mut out);
    }
    out
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Color {
    White,
    Gray,
    Black,
}

/// Detect a cycle anywhere in the graph, returning the cycle's members in
/// traversal order if one exists.
///
/// Three-color DFS ported from `detect_cycle`: white/gray/black marks plus a
/// parent pointer per node. When a gray (in-progress) neighbor is
/// encountered, the cycle is reconstructed by walking parent pointers from
/// the current node back to that neighbor.
pub fn detect_cycle(graph: &DependencyGraph) -> Option<Vec<CellId>> {
    let mut color: FxHashMap<CellId, Color> =
        graph.order.iter().map(|c| (c.clone(), Color::White)).collect();
    let mut parent: FxHashMap<CellId, Option<CellId>> =
        graph.order.iter().map(|c| (c.clone(), None)).collect();

    fn dfs(
        node: &CellId,
        graph: &DependencyGraph,
        color: &mut FxHashMap<CellId, Color>,
        parent: &mut FxHashMap<CellId, Option<CellId>>,
    ) -> Option<Vec<CellId>> {
        color.insert(node.clone(), Color::Gray);

        for neighbor in graph.upstream_of(node) {
            let Some(&neighbor_color) = color.get(neighbor) else {
                continue;
            };
            if neighbor_color == Color::Gray {
                let mut cycle = vec![neighbor.clone(), node.clone()];
                let mut current = node.clone();
                loop {
                    let p = parent.get(&current).cloned().flatten();
                    match p {
                        Some(next) if next != *neighbor => {
                            current = next.clone();
                            cycle.push(current.clone());
                        }
                        _ => break,
                    }
                }
                return Some(cycle);
            }
            if neighbor_color == Color::White {
                parent.insert(neighbor.clone(), Some(node.clone()));
                if let Some(cycle) = dfs(neighbor, graph, color, parent) {
                    return Some(cycle);
                }
            }
        }

        color.insert(node.clone(), Color::Black);
        None
    }

    for node in &graph.order {
        if color.get(node) == Some(&Color::White) {
            if let Some(cycle) = dfs(node, graph, &mut color, &mut parent) {
                tracing::warn!(cycle = ?cycle, "cyclic dependency detected");
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    #[test]
    fn simple_dependency() {
        let cells = vec![Cell::code("c1", "x = 10"), Cell::code("c2", "y = x + 5")];
        let graph = build(&cells);
        assert!(graph.upstream_of(&CellId::new("c1")).is_empty());
        assert_eq!(graph.upstream_of(&CellId::new("c2")), &[CellId::new("c1")]);
    }

    #[test]
    fn no_self_dependency() {
        let cells = vec![Cell::code("c1", "x = x + 1")];
        let graph = build(&cells);
        assert!(graph.upstream_of(&CellId::new("c1")).is_empty());
    }

    #[test]
    fn downstream_closure_multi_branch() {
        let cells = vec![
            Cell::code("c1", "x = 1"),
            Cell::code("c2", "y = x + 1"),
            Cell::code("c3", "z = x + 2"),
            Cell::code("c4", "w = y + z"),
        ];
        let graph = build(&cells);
        let down = downstream(&graph, &CellId::new("c1"));
        assert_eq!(
            down,
            HashSet::from([CellId::new("c2"), CellId::new("c3"), CellId::new("c4")])
        );
    }

    #[test]
    fn topo_sort_orders_dependencies_first() {
        let cells = vec![
            Cell::code("c1", "x = 10"),
            Cell::code("c2", "y = x + 5"),
            Cell::code("c3", "z = y * 2"),
        ];
        let graph = build(&cells);
        let ids: Vec<CellId> = cells.iter().map(|c| c.id.clone()).collect();
        let order = topo_sort(&graph, &ids);
        let pos = |id: &str| order.iter().position(|c| c.as_str() == id).unwrap();
        assert!(pos("c1") < pos("c2"));
        assert!(pos("c2") < pos("c3"));
    }

    #[test]
    fn topo_sort_restricted_to_subset() {
        let cells = vec![
            Cell::code("c1", "x = 10"),
            Cell::code("c2", "y = x + 5"),
            Cell::code("c3", "z = y * 2"),
        ];
        let graph = build(&cells);
        let subset = vec![CellId::new("c2"), CellId::new("c3")];
        let order = topo_sort(&graph, &subset);
        assert!(!order.iter().any(|c| c.as_str() == "c1"));
        let pos = |id: &str| order.iter().position(|c| c.as_str() == id).unwrap();
        assert!(pos("c2") < pos("c3"));
    }

    #[test]
    fn detects_direct_cycle() {
        let cells = vec![Cell::code("c1", "x = y"), Cell::code("c2", "y = x")];
        let graph = build(&cells);
        let cycle = detect_cycle(&graph);
        assert!(cycle.is_some());
    }

    #[test]
    fn no_cycle_in_linear_chain() {
        let cells = vec![
            Cell::code("c1", "x = 10"),
            Cell::code("c2", "y = x + 5"),
            Cell::code("c3", "z = y * 2"),
        ];
        let graph = build(&cells);
        assert!(detect_cycle(&graph).is_none());
    }
}
