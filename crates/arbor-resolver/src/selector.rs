//! Nearest-wins version selection over sorted conflict groups.
//!
//! Groups are processed in the order published by the sorter. For each group,
//! the nodes still reachable from the root compete: the shallowest node wins,
//! the first discovered wins among equally deep nodes, except that among
//! siblings expanded from one range the highest version wins. Every range
//! constraint in the group must contain the winning version. Losing nodes are
//! detached from their parents, so their subtrees drop out of later groups.

use std::collections::HashMap;

use arbor_core::dependency::scope;
use arbor_util::errors::ArborError;
use petgraph::graph::NodeIndex;

use crate::conflict::{ConflictReport, VersionConflict};
use crate::context::{GraphTransformer, TransformContext};
use crate::graph::DependencyGraph;
use crate::marker::ConflictMarker;
use crate::sorter::ConflictIdSorter;
use crate::version::{Version, VersionConstraint};

/// Picks one version, scope and optionality per conflict group.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl GraphTransformer for ConflictResolver {
    fn transform(
        &self,
        graph: DependencyGraph,
        context: &mut TransformContext,
    ) -> miette::Result<DependencyGraph> {
        let graph = if context.sorted_conflict_ids.is_none() {
            ConflictIdSorter.transform(graph, context)?
        } else {
            graph
        };
        let conflict_ids = context
            .conflict_ids
            .get_or_insert_with(|| ConflictMarker::mark(&graph));
        let sorted = context.sorted_conflict_ids.as_deref().unwrap_or_default();
        select_versions(graph, conflict_ids, sorted, &mut context.conflicts)
    }
}

/// Resolve every conflict group in `sorted` order, recording lost requests in
/// `report`.
pub fn select_versions(
    mut graph: DependencyGraph,
    conflict_ids: &HashMap<NodeIndex, String>,
    sorted: &[String],
    report: &mut ConflictReport,
) -> miette::Result<DependencyGraph> {
    for key in sorted {
        let mut group = ConflictGroup::new(key);
        let mut depths = vec![None; graph.node_bound()];
        group.select(&graph, conflict_ids, graph.root(), None, 0, &mut depths)?;
        group.apply(&mut graph, conflict_ids, report);
    }
    Ok(graph)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    parent: Option<NodeIndex>,
    depth: usize,
}

struct ConflictGroup<'k> {
    key: &'k str,
    /// Range constraints seen so far; the winner must satisfy all of them.
    constraints: Vec<VersionConstraint>,
    candidates: Vec<(NodeIndex, Position)>,
    /// Parents with children in this group, at the parent's shallowest depth + 1.
    positions: Vec<Position>,
    members: Vec<(NodeIndex, Position)>,
    winner: Option<(NodeIndex, Position)>,
}

fn upsert(entries: &mut Vec<(NodeIndex, Position)>, node: NodeIndex, pos: Position) {
    match entries.iter_mut().find(|(idx, _)| *idx == node) {
        Some(entry) => entry.1 = pos,
        None => entries.push((node, pos)),
    }
}

/// Shallower wins; at equal depth a higher version wins only against a sibling.
fn is_nearer(pos: Position, version: &Version, other: Position, other_version: &Version) -> bool {
    pos.depth < other.depth
        || (pos.depth == other.depth && pos.parent == other.parent && version > other_version)
}

impl<'k> ConflictGroup<'k> {
    fn new(key: &'k str) -> Self {
        Self {
            key,
            constraints: Vec::new(),
            candidates: Vec::new(),
            positions: Vec::new(),
            members: Vec::new(),
            winner: None,
        }
    }

    fn is_acceptable(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.contains_version(version))
    }

    fn select(
        &mut self,
        graph: &DependencyGraph,
        conflict_ids: &HashMap<NodeIndex, String>,
        node: NodeIndex,
        parent: Option<NodeIndex>,
        depth: usize,
        depths: &mut [Option<usize>],
    ) -> Result<(), ArborError> {
        match depths[node.index()] {
            Some(seen) if seen <= depth => return Ok(()),
            _ => depths[node.index()] = Some(depth),
        }

        if conflict_ids.get(&node).map(String::as_str) == Some(self.key) {
            let pos = Position { parent, depth };
            if parent.is_some() {
                self.add_position(pos);
            }
            upsert(&mut self.members, node, pos);

            let current = graph.node(node);
            if current.constraint.is_range() && !self.constraints.contains(&current.constraint) {
                self.constraints.push(current.constraint.clone());
            }
            if !self.is_acceptable(&current.version) {
                if let Some((w, _)) = self.winner {
                    if !self.is_acceptable(&graph.node(w).version) {
                        self.reselect(graph)?;
                    }
                }
                return Ok(());
            }
            upsert(&mut self.candidates, node, pos);
            let nearer = match self.winner {
                None => true,
                Some((w, wpos)) => is_nearer(pos, &current.version, wpos, &graph.node(w).version),
            };
            if nearer {
                self.winner = Some((node, pos));
            }
            if let Some((w, _)) = self.winner {
                if !self.is_acceptable(&graph.node(w).version) {
                    self.reselect(graph)?;
                }
            }
        }

        for child in graph.children(node) {
            self.select(graph, conflict_ids, child, Some(node), depth + 1, depths)?;
        }
        Ok(())
    }

    fn add_position(&mut self, pos: Position) {
        match self.positions.iter_mut().find(|p| p.parent == pos.parent) {
            Some(existing) => existing.depth = existing.depth.min(pos.depth),
            None => self.positions.push(pos),
        }
    }

    /// A new range ruled out the current winner: drop unacceptable candidates
    /// and pick the nearest remaining one.
    fn reselect(&mut self, graph: &DependencyGraph) -> Result<(), ArborError> {
        self.winner = None;
        let candidates = std::mem::take(&mut self.candidates);
        for (idx, pos) in candidates {
            let version = &graph.node(idx).version;
            if !self.is_acceptable(version) {
                continue;
            }
            let nearer = match self.winner {
                None => true,
                Some((w, wpos)) => is_nearer(pos, version, wpos, &graph.node(w).version),
            };
            if nearer {
                self.winner = Some((idx, pos));
            }
            self.candidates.push((idx, pos));
        }
        if self.winner.is_none() {
            return Err(self.unsolvable(graph));
        }
        Ok(())
    }

    fn unsolvable(&self, graph: &DependencyGraph) -> ArborError {
        let mut versions: Vec<String> = Vec::new();
        for constraint in &self.constraints {
            let text = constraint.to_string();
            if !versions.contains(&text) {
                versions.push(text);
            }
        }
        let paths = graph
            .paths_to(|n| n.conflict_key() == self.key)
            .iter()
            .map(|path| {
                path.iter()
                    .map(|&idx| graph.node(idx).artifact.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("\n");
        ArborError::UnsolvableConflict {
            key: self.key.to_string(),
            versions: versions.join(", "),
            paths,
        }
    }

    /// Detach losers, settle the winner's scope and optionality, and report.
    fn apply(
        self,
        graph: &mut DependencyGraph,
        conflict_ids: &HashMap<NodeIndex, String>,
        report: &mut ConflictReport,
    ) {
        let Some((winner, winner_pos)) = self.winner else {
            return;
        };
        let winner_version = graph.node(winner).version.clone();

        let mut kept = winner_pos.parent.is_none().then_some(winner);
        for pos in &self.positions {
            let Some(parent) = pos.parent else {
                continue;
            };
            for child in graph.children(parent) {
                if conflict_ids.get(&child).map(String::as_str) != Some(self.key) {
                    continue;
                }
                if kept.is_none()
                    && winner_pos.depth == pos.depth
                    && graph.node(child).version == winner_version
                {
                    kept = Some(child);
                } else {
                    graph.remove_child(parent, child);
                }
            }
        }

        for &(idx, pos) in &self.members {
            let node = graph.node(idx);
            if Some(idx) == kept || node.constraint.contains_version(&winner_version) {
                continue;
            }
            let reason = if !self.is_acceptable(&node.version) {
                let ranges: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
                format!("outside required range {}", ranges.join(", "))
            } else if pos.depth > winner_pos.depth {
                format!("nearest wins (depth {} vs {})", winner_pos.depth, pos.depth)
            } else {
                format!("first declaration wins (depth {})", pos.depth)
            };
            tracing::debug!("{}: {} loses to {} ({reason})", self.key, node.constraint, winner_version);
            report.add(VersionConflict {
                key: self.key.to_string(),
                requested: node.constraint.to_string(),
                resolved: winner_version.to_string(),
                reason,
            });
        }

        let Some(kept) = kept else {
            return;
        };
        if winner_pos.parent.is_none() {
            return;
        }
        let (scope, optional) = self.effective_scope(graph);
        let node = graph.node_mut(kept);
        if node.scope != scope {
            tracing::trace!("{}: scope {} -> {}", self.key, node.scope, scope);
            node.scope = scope;
        }
        node.optional = optional;
    }

    /// A direct dependency decides scope and optionality. Otherwise the
    /// strongest scope wins and the node is optional only if every occurrence is.
    fn effective_scope(&self, graph: &DependencyGraph) -> (String, bool) {
        if let Some(&(direct, _)) = self.members.iter().find(|(_, pos)| pos.depth == 1) {
            let node = graph.node(direct);
            return (node.scope.clone(), node.optional);
        }
        let mut best: Option<&str> = None;
        for &(idx, _) in &self.members {
            let scope = graph.node(idx).scope.as_str();
            if best.map_or(true, |b| scope::strength(scope) > scope::strength(b)) {
                best = Some(scope);
            }
        }
        let optional = self.members.iter().all(|&(idx, _)| graph.node(idx).optional);
        (best.unwrap_or(scope::COMPILE).to_string(), optional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ChainedTransformer;
    use crate::graph::DependencyNode;
    use arbor_core::artifact::Artifact;

    fn node(artifact: &str, version: &str) -> DependencyNode {
        DependencyNode::new(Artifact::new("g", artifact, version))
    }

    fn ranged(artifact: &str, version: &str, range: &str) -> DependencyNode {
        node(artifact, version).with_constraint(VersionConstraint::parse(range).unwrap())
    }

    fn app() -> DependencyGraph {
        DependencyGraph::new(DependencyNode::root(Artifact::new("g", "app", "1")))
    }

    fn resolve(graph: DependencyGraph) -> miette::Result<(DependencyGraph, TransformContext)> {
        let mut context = TransformContext::new();
        let graph = ChainedTransformer::standard().transform(graph, &mut context)?;
        Ok((graph, context))
    }

    fn versions_of(graph: &DependencyGraph, artifact: &str) -> Vec<String> {
        graph
            .preorder()
            .into_iter()
            .map(|idx| graph.node(idx))
            .filter(|n| n.artifact.artifact_id == artifact)
            .map(|n| n.version.to_string())
            .collect()
    }

    #[test]
    fn nearest_wins() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        g.add_child(a, node("x", "2.0"));
        g.add_child(root, node("x", "1.0"));

        let (g, context) = resolve(g).unwrap();
        assert_eq!(versions_of(&g, "x"), vec!["1.0"]);
        let conflicts: Vec<_> = context.conflicts.for_key("g:x:jar").collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].requested, "2.0");
        assert_eq!(conflicts[0].resolved, "1.0");
        assert_eq!(conflicts[0].reason, "nearest wins (depth 1 vs 2)");
    }

    #[test]
    fn first_declaration_wins_at_equal_depth() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        let b = g.add_child(root, node("b", "1"));
        g.add_child(a, node("x", "1.0"));
        g.add_child(b, node("x", "2.0"));

        let (g, _) = resolve(g).unwrap();
        assert_eq!(versions_of(&g, "x"), vec!["1.0"]);
    }

    #[test]
    fn highest_sibling_from_range_wins() {
        let mut g = app();
        let root = g.root();
        for v in ["1.0", "1.1", "1.2"] {
            g.add_child(root, ranged("x", v, "[1.0,2.0)"));
        }
        let (g, context) = resolve(g).unwrap();
        assert_eq!(versions_of(&g, "x"), vec!["1.2"]);
        assert!(context.conflicts.is_empty());
    }

    #[test]
    fn ranges_override_nearer_versions() {
        let mut g = app();
        let root = g.root();
        g.add_child(root, node("x", "1.0"));
        let a = g.add_child(root, node("a", "1"));
        g.add_child(a, ranged("x", "2.0", "[2.0,3.0)"));
        g.add_child(a, ranged("x", "2.5", "[2.0,3.0)"));

        let (g, context) = resolve(g).unwrap();
        assert_eq!(versions_of(&g, "x"), vec!["2.5"]);
        let conflict = context.conflicts.for_key("g:x:jar").next().unwrap();
        assert_eq!(conflict.requested, "1.0");
        assert!(conflict.reason.starts_with("outside required range"));
    }

    #[test]
    fn disjoint_ranges_are_unsolvable() {
        let mut g = app();
        let root = g.root();
        g.add_child(root, ranged("x", "1.0", "[1.0,2.0)"));
        let a = g.add_child(root, node("a", "1"));
        g.add_child(a, ranged("x", "3.0", "[3.0,4.0)"));

        let err = resolve(g).unwrap_err();
        let err = err.downcast_ref::<ArborError>().unwrap();
        match err {
            ArborError::UnsolvableConflict { key, versions, paths } => {
                assert_eq!(key, "g:x:jar");
                assert_eq!(versions, "[1.0,2.0), [3.0,4.0)");
                assert!(paths.contains("g:app:jar:1 -> g:x:jar:1.0"));
                assert!(paths.contains("g:app:jar:1 -> g:a:jar:1 -> g:x:jar:3.0"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn losing_subtrees_drop_out() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        let b_old = g.add_child(a, node("b", "1.0"));
        g.add_child(b_old, node("only-in-old", "1"));
        g.add_child(root, node("b", "2.0"));

        let (g, _) = resolve(g).unwrap();
        assert_eq!(versions_of(&g, "b"), vec!["2.0"]);
        assert!(versions_of(&g, "only-in-old").is_empty());
    }

    #[test]
    fn direct_scope_wins() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        g.add_child(a, node("x", "1.0").with_scope("compile"));
        g.add_child(root, node("x", "1.0").with_scope("test"));

        let (g, _) = resolve(g).unwrap();
        let x: Vec<_> = g
            .preorder()
            .into_iter()
            .filter(|&i| g.node(i).artifact.artifact_id == "x")
            .collect();
        assert_eq!(x.len(), 1);
        assert_eq!(g.node(x[0]).scope, "test");
    }

    #[test]
    fn strongest_transitive_scope_and_optionality() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        let b = g.add_child(root, node("b", "1"));
        let mut first = node("x", "1.0").with_scope("runtime");
        first.optional = true;
        g.add_child(a, first);
        g.add_child(b, node("x", "1.0").with_scope("compile"));

        let (g, _) = resolve(g).unwrap();
        let x = g
            .preorder()
            .into_iter()
            .find(|&i| g.node(i).artifact.artifact_id == "x")
            .unwrap();
        assert_eq!(g.node(x).scope, "compile");
        assert!(!g.node(x).optional);
    }

    #[test]
    fn cyclic_graph_resolves() {
        let mut g = app();
        let root = g.root();
        let a = g.add_child(root, node("a", "1"));
        let b = g.add_child(a, node("b", "1"));
        g.link(b, a);
        g.add_child(b, node("a", "2"));

        let (g, context) = resolve(g).unwrap();
        assert!(context.cyclic_conflict_ids);
        assert_eq!(versions_of(&g, "a"), vec!["1"]);
    }
}
