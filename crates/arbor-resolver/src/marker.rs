//! Conflict group marking.
//!
//! Every node reachable from the root gets the key of its conflict group:
//! `group:artifact:extension[:classifier]`. A node relocated from another
//! artifact also carries that artifact's key, and groups sharing any key are
//! merged; the merged group is named after its earliest discovered key.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::visit::VisitMap;

use crate::context::{GraphTransformer, TransformContext};
use crate::graph::{DependencyGraph, VisitedSet};

/// Labels nodes with conflict group keys. Publishes
/// [`TransformContext::conflict_ids`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictMarker;

impl ConflictMarker {
    /// Map every reachable node to its conflict group key.
    pub fn mark(graph: &DependencyGraph) -> HashMap<NodeIndex, String> {
        let mut marking = Marking {
            visited: graph.visit_map(),
            groups: KeyGroups::default(),
            nodes: Vec::new(),
        };
        marking.visit(graph, graph.root());

        let Marking {
            mut groups, nodes, ..
        } = marking;
        nodes
            .into_iter()
            .map(|(idx, group)| (idx, groups.name(group)))
            .collect()
    }
}

impl GraphTransformer for ConflictMarker {
    fn transform(
        &self,
        graph: DependencyGraph,
        context: &mut TransformContext,
    ) -> miette::Result<DependencyGraph> {
        let ids = Self::mark(&graph);
        tracing::debug!("Marked {} nodes with conflict ids", ids.len());
        context.conflict_ids = Some(ids);
        Ok(graph)
    }
}

struct Marking {
    visited: VisitedSet,
    groups: KeyGroups,
    nodes: Vec<(NodeIndex, usize)>,
}

impl Marking {
    fn visit(&mut self, graph: &DependencyGraph, idx: NodeIndex) {
        if !self.visited.visit(idx) {
            return;
        }
        let node = graph.node(idx);
        let mut keys = vec![node.conflict_key()];
        keys.extend(node.relocations.iter().map(|a| a.conflict_key()));
        let group = self.groups.join(keys);
        self.nodes.push((idx, group));

        for child in graph.children(idx) {
            self.visit(graph, child);
        }
    }
}

/// Union-find over conflict keys. Group indices follow discovery order and a
/// merge always keeps the lower index, so a group's first key is its name.
#[derive(Default)]
struct KeyGroups {
    by_key: HashMap<String, usize>,
    parent: Vec<usize>,
    first_key: Vec<String>,
}

impl KeyGroups {
    fn find(&mut self, mut group: usize) -> usize {
        let mut root = group;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[group] != root {
            let next = self.parent[group];
            self.parent[group] = root;
            group = next;
        }
        root
    }

    /// Put all `keys` into one group and return it.
    fn join(&mut self, keys: Vec<String>) -> usize {
        let mut found: Vec<usize> = Vec::new();
        for key in &keys {
            if let Some(&g) = self.by_key.get(key) {
                found.push(self.find(g));
            }
        }
        let group = match found.iter().min() {
            Some(&g) => g,
            None => {
                let g = self.parent.len();
                self.parent.push(g);
                self.first_key.push(keys[0].clone());
                g
            }
        };
        for other in found {
            self.parent[other] = group;
        }
        for key in keys {
            self.by_key.entry(key).or_insert(group);
        }
        group
    }

    fn name(&mut self, group: usize) -> String {
        let root = self.find(group);
        self.first_key[root].clone()
    }
}
