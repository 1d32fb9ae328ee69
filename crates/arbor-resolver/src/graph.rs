//! Dependency node graph and cycle-tolerant traversal.
//!
//! The graph is an arena of [`DependencyNode`]s addressed by [`NodeIndex`]. It is
//! not required to be acyclic: collection turns a dependency on an ancestor into
//! a back edge. Children keep their declaration order, which every pass relies
//! on for deterministic output.

use std::collections::HashSet;
use std::fmt;

use arbor_core::artifact::Artifact;
use arbor_core::dependency::{Dependency, Exclusion};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, VisitMap, Visitable};

use crate::version::{Version, VersionConstraint};

/// Per-pass visited set sized to the graph.
pub type VisitedSet = <DiGraph<DependencyNode, usize> as Visitable>::Map;

/// A node in the dependency graph: one requested artifact at one concrete version.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// The artifact, with its version field pinned to `version`.
    pub artifact: Artifact,
    /// What was requested, before range expansion.
    pub constraint: VersionConstraint,
    pub version: Version,
    /// Effective scope. Empty for the root.
    pub scope: String,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
    /// Version declared before dependency management replaced it.
    pub premanaged_version: Option<String>,
    /// Scope declared before dependency management replaced it.
    pub premanaged_scope: Option<String>,
    /// Artifacts this node was relocated from, oldest first.
    pub relocations: Vec<Artifact>,
}

impl DependencyNode {
    /// A compile-scoped node for `artifact`, whose version field is taken literally.
    pub fn new(artifact: Artifact) -> Self {
        let version = Version::parse(&artifact.version);
        Self {
            constraint: VersionConstraint::from_version(version.clone()),
            version,
            artifact,
            scope: arbor_core::dependency::scope::COMPILE.to_string(),
            optional: false,
            exclusions: Vec::new(),
            premanaged_version: None,
            premanaged_scope: None,
            relocations: Vec::new(),
        }
    }

    /// The root of a collection, which has no scope.
    pub fn root(artifact: Artifact) -> Self {
        Self {
            scope: String::new(),
            ..Self::new(artifact)
        }
    }

    /// A node for `dependency` pinned to `version`.
    pub fn from_dependency(
        dependency: &Dependency,
        constraint: VersionConstraint,
        version: Version,
    ) -> Self {
        Self {
            artifact: dependency.artifact.with_version(version.as_str()),
            constraint,
            version,
            scope: dependency.scope.clone(),
            optional: dependency.optional,
            exclusions: dependency.exclusions.clone(),
            premanaged_version: None,
            premanaged_scope: None,
            relocations: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn conflict_key(&self) -> String {
        self.artifact.conflict_key()
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact)?;
        if !self.scope.is_empty() {
            write!(f, " [{}]", self.scope)?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// A rooted, possibly cyclic dependency graph backed by petgraph.
///
/// Edge weights are insertion sequence numbers so children come back in
/// declaration order even after siblings are detached.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<DependencyNode, usize>,
    root: NodeIndex,
    next_edge: usize,
}

impl DependencyGraph {
    pub fn new(root: DependencyNode) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(root);
        Self {
            graph,
            root,
            next_edge: 0,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, idx: NodeIndex) -> &DependencyNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut DependencyNode {
        &mut self.graph[idx]
    }

    /// Add `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, node: DependencyNode) -> NodeIndex {
        let idx = self.graph.add_node(node);
        self.link(parent, idx);
        idx
    }

    /// Add an edge to an existing node, e.g. a back edge to an ancestor.
    /// Linking the same pair twice is a no-op.
    pub fn link(&mut self, parent: NodeIndex, child: NodeIndex) {
        if self.graph.find_edge(parent, child).is_none() {
            self.graph.add_edge(parent, child, self.next_edge);
            self.next_edge += 1;
        }
    }

    /// Children of a node in declaration order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<(usize, NodeIndex)> = self
            .graph
            .edges(idx)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_unstable_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Detach `child` from `parent`. Returns whether an edge was removed.
    pub fn remove_child(&mut self, parent: NodeIndex, child: NodeIndex) -> bool {
        match self.graph.find_edge(parent, child) {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// Upper bound of node indices, for sizing side tables.
    pub fn node_bound(&self) -> usize {
        self.graph.node_count()
    }

    pub fn visit_map(&self) -> VisitedSet {
        self.graph.visit_map()
    }

    /// Walk the graph from the root. See [`DependencyGraph::accept_from`].
    pub fn accept<V: DependencyVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.accept_from(self.root, visitor)
    }

    /// Depth-first walk: children are visited only if `visit_enter` returns
    /// `true`, and siblings are skipped once `visit_leave` returns `false`.
    ///
    /// This does not guard against cycles; wrap the visitor in a [`TreeVisitor`]
    /// or make `visit_enter` refuse nodes already on the path.
    pub fn accept_from<V: DependencyVisitor + ?Sized>(
        &self,
        idx: NodeIndex,
        visitor: &mut V,
    ) -> bool {
        if visitor.visit_enter(self, idx) {
            for child in self.children(idx) {
                if !self.accept_from(child, visitor) {
                    break;
                }
            }
        }
        visitor.visit_leave(self, idx)
    }

    /// Every node reachable from the root, once each, in pre-order.
    pub fn preorder(&self) -> Vec<NodeIndex> {
        let mut visitor = TreeVisitor::new(self, PreorderNodes::default());
        self.accept(&mut visitor);
        visitor.into_inner().nodes
    }

    /// Root-to-node paths for every node accepted by `filter`.
    pub fn paths_to<F>(&self, filter: F) -> Vec<Vec<NodeIndex>>
    where
        F: FnMut(&DependencyNode) -> bool,
    {
        let mut visitor = PathRecordingVisitor::new(filter);
        self.accept(&mut visitor);
        visitor.into_paths()
    }

    /// Render the graph as an indented tree.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.graph[self.root]);
        let mut on_path = HashSet::new();
        on_path.insert(self.root);

        let children = self.children(self.root);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(&mut output, child, "", i == count - 1, 1, max_depth, &mut on_path);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        on_path: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        if !on_path.insert(idx) {
            output.push_str(&format!("{prefix}{connector}{node} (cycle)\n"));
            return;
        }
        output.push_str(&format!("{prefix}{connector}{node}\n"));

        if max_depth.map_or(true, |max| depth < max) {
            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
            let children = self.children(idx);
            let count = children.len();
            for (i, child) in children.into_iter().enumerate() {
                self.print_subtree(
                    output,
                    child,
                    &child_prefix,
                    i == count - 1,
                    depth + 1,
                    max_depth,
                    on_path,
                );
            }
        }

        on_path.remove(&idx);
    }

    /// Find the path from the root to the first node matching `target`.
    ///
    /// Accepts a conflict key (`group:artifact:extension[:classifier]`),
    /// `group:artifact`, or just the artifact id.
    pub fn find_path(&self, target: &str) -> Option<Vec<&DependencyNode>> {
        let mut visitor = PathRecordingVisitor::new(|node: &DependencyNode| {
            let a = &node.artifact;
            node.conflict_key() == target
                || format!("{}:{}", a.group_id, a.artifact_id) == target
                || a.artifact_id == target
        });
        self.accept(&mut visitor);
        let path = visitor.into_paths().into_iter().next()?;
        Some(path.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// Number of nodes reachable from the root, excluding the root.
    pub fn len(&self) -> usize {
        self.preorder().len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }
}

/// Callback interface for [`DependencyGraph::accept`].
pub trait DependencyVisitor {
    /// Called on entering a node. Return `false` to skip its children.
    fn visit_enter(&mut self, graph: &DependencyGraph, node: NodeIndex) -> bool;

    /// Called on leaving a node. Return `false` to skip its remaining siblings.
    fn visit_leave(&mut self, _graph: &DependencyGraph, _node: NodeIndex) -> bool {
        true
    }
}

/// Adapter that presents a (possibly cyclic, multi-parent) graph as a tree:
/// the wrapped visitor sees each node once, on its first encounter.
pub struct TreeVisitor<V> {
    inner: V,
    visited: VisitedSet,
    visits: Vec<bool>,
}

impl<V: DependencyVisitor> TreeVisitor<V> {
    pub fn new(graph: &DependencyGraph, inner: V) -> Self {
        Self {
            inner,
            visited: graph.visit_map(),
            visits: Vec::new(),
        }
    }

    pub fn into_inner(self) -> V {
        self.inner
    }
}

impl<V: DependencyVisitor> DependencyVisitor for TreeVisitor<V> {
    fn visit_enter(&mut self, graph: &DependencyGraph, node: NodeIndex) -> bool {
        let first = self.visited.visit(node);
        self.visits.push(first);
        first && self.inner.visit_enter(graph, node)
    }

    fn visit_leave(&mut self, graph: &DependencyGraph, node: NodeIndex) -> bool {
        match self.visits.pop() {
            Some(true) => self.inner.visit_leave(graph, node),
            _ => true,
        }
    }
}

/// Records the root-to-node path of every node accepted by a filter.
///
/// Nodes already on the current path are not entered again, so the visitor
/// terminates on cyclic graphs.
pub struct PathRecordingVisitor<F> {
    filter: F,
    exclude_children_of_matches: bool,
    parents: Vec<NodeIndex>,
    paths: Vec<Vec<NodeIndex>>,
}

impl<F> PathRecordingVisitor<F>
where
    F: FnMut(&DependencyNode) -> bool,
{
    /// Paths stop at the first match: matches below a matching node are ignored.
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            exclude_children_of_matches: true,
            parents: Vec::new(),
            paths: Vec::new(),
        }
    }

    /// Keep descending below matching nodes, so one path may contain several matches.
    pub fn including_children_of_matches(mut self) -> Self {
        self.exclude_children_of_matches = false;
        self
    }

    pub fn paths(&self) -> &[Vec<NodeIndex>] {
        &self.paths
    }

    pub fn into_paths(self) -> Vec<Vec<NodeIndex>> {
        self.paths
    }
}

impl<F> DependencyVisitor for PathRecordingVisitor<F>
where
    F: FnMut(&DependencyNode) -> bool,
{
    fn visit_enter(&mut self, graph: &DependencyGraph, node: NodeIndex) -> bool {
        if self.parents.contains(&node) {
            self.parents.push(node);
            return false;
        }
        let accept = (self.filter)(graph.node(node));
        self.parents.push(node);
        if accept {
            self.paths.push(self.parents.clone());
        }
        !(self.exclude_children_of_matches && accept)
    }

    fn visit_leave(&mut self, _graph: &DependencyGraph, _node: NodeIndex) -> bool {
        self.parents.pop();
        true
    }
}

/// Collects nodes in pre-order. Wrap in a [`TreeVisitor`] to get each node once.
#[derive(Debug, Default)]
pub struct PreorderNodes {
    pub nodes: Vec<NodeIndex>,
}

impl DependencyVisitor for PreorderNodes {
    fn visit_enter(&mut self, _graph: &DependencyGraph, node: NodeIndex) -> bool {
        self.nodes.push(node);
        true
    }
}
