//! Topological ordering of conflict groups.
//!
//! Edges between nodes induce edges between their conflict groups. The
//! resulting group graph is sorted so that a group comes after every group
//! that depends on it, shallowest groups first. Real cycles between groups are
//! broken deterministically and reported.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::graph::NodeIndex;
use petgraph::visit::VisitMap;

use crate::context::{GraphTransformer, TransformContext};
use crate::graph::{DependencyGraph, VisitedSet};
use crate::marker::ConflictMarker;

/// Sorts conflict groups. Publishes [`TransformContext::sorted_conflict_ids`],
/// [`TransformContext::cyclic_conflict_ids`] and
/// [`TransformContext::conflict_depths`], running the [`ConflictMarker`] first
/// if the context has no conflict ids yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictIdSorter;

/// Output of [`ConflictIdSorter::sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedConflictIds {
    pub keys: Vec<String>,
    pub cyclic: bool,
    /// Shallowest depth at which each group was reached; the root is depth 0.
    pub depths: HashMap<String, usize>,
}

struct ConflictId {
    key: String,
    children: Vec<usize>,
    child_set: HashSet<usize>,
    in_degree: isize,
    min_depth: usize,
}

impl ConflictId {
    fn new(key: String, depth: usize) -> Self {
        Self {
            key,
            children: Vec::new(),
            child_set: HashSet::new(),
            in_degree: 0,
            min_depth: depth,
        }
    }
}

impl ConflictIdSorter {
    pub fn sort(
        graph: &DependencyGraph,
        conflict_ids: &HashMap<NodeIndex, String>,
    ) -> SortedConflictIds {
        let mut dag = ConflictDag {
            graph,
            conflict_ids,
            ids: Vec::new(),
            index: HashMap::new(),
            visited: graph.visit_map(),
        };
        let root_id = conflict_ids
            .get(&graph.root())
            .map(|key| dag.insert(key.clone(), 0));
        dag.build(graph.root(), root_id, 0);

        let mut ids = dag.ids;
        let (keys, cyclic) = topsort(&mut ids);
        let depths = ids.into_iter().map(|id| (id.key, id.min_depth)).collect();
        SortedConflictIds {
            keys,
            cyclic,
            depths,
        }
    }
}

impl GraphTransformer for ConflictIdSorter {
    fn transform(
        &self,
        graph: DependencyGraph,
        context: &mut TransformContext,
    ) -> miette::Result<DependencyGraph> {
        let conflict_ids = context
            .conflict_ids
            .get_or_insert_with(|| ConflictMarker::mark(&graph));
        let sorted = Self::sort(&graph, conflict_ids);
        if sorted.cyclic {
            tracing::debug!("Conflict groups form a cycle, order was forced");
        }
        context.sorted_conflict_ids = Some(sorted.keys);
        context.cyclic_conflict_ids = sorted.cyclic;
        context.conflict_depths = sorted.depths;
        Ok(graph)
    }
}

struct ConflictDag<'a> {
    graph: &'a DependencyGraph,
    conflict_ids: &'a HashMap<NodeIndex, String>,
    /// Insertion ordered.
    ids: Vec<ConflictId>,
    index: HashMap<String, usize>,
    visited: VisitedSet,
}

impl ConflictDag<'_> {
    fn insert(&mut self, key: String, depth: usize) -> usize {
        let id = self.ids.len();
        self.index.insert(key.clone(), id);
        self.ids.push(ConflictId::new(key, depth));
        id
    }

    fn build(&mut self, node: NodeIndex, id: Option<usize>, depth: usize) {
        if !self.visited.visit(node) {
            return;
        }
        let depth = depth + 1;
        for child in self.graph.children(node) {
            let Some(key) = self.conflict_ids.get(&child) else {
                continue;
            };
            let child_id = match self.index.get(key) {
                Some(&existing) => {
                    self.pullup(existing, depth);
                    existing
                }
                None => self.insert(key.clone(), depth),
            };
            if let Some(parent) = id {
                self.add_edge(parent, child_id);
            }
            self.build(child, Some(child_id), depth);
        }
    }

    /// Parallel edges collapse; only the first one counts toward in-degree.
    fn add_edge(&mut self, parent: usize, child: usize) {
        if self.ids[parent].child_set.insert(child) {
            self.ids[parent].children.push(child);
            self.ids[child].in_degree += 1;
        }
    }

    fn pullup(&mut self, id: usize, depth: usize) {
        if depth < self.ids[id].min_depth {
            self.ids[id].min_depth = depth;
            let children = self.ids[id].children.clone();
            for child in children {
                self.pullup(child, depth + 1);
            }
        }
    }
}

/// Roots ordered by minimum depth, then by the order they were queued.
#[derive(Default)]
struct RootQueue {
    heap: BinaryHeap<Reverse<(usize, u64, usize)>>,
    seq: u64,
}

impl RootQueue {
    fn push(&mut self, ids: &[ConflictId], id: usize) {
        self.heap.push(Reverse((ids[id].min_depth, self.seq, id)));
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|Reverse((_, _, id))| id)
    }
}

fn topsort(ids: &mut [ConflictId]) -> (Vec<String>, bool) {
    let mut sorted = Vec::with_capacity(ids.len());
    let mut roots = RootQueue::default();
    for id in 0..ids.len() {
        if ids[id].in_degree <= 0 {
            roots.push(ids, id);
        }
    }
    process_roots(ids, &mut sorted, &mut roots);

    let cyclic = sorted.len() < ids.len();
    while sorted.len() < ids.len() {
        let mut nearest: Option<usize> = None;
        for (i, id) in ids.iter().enumerate() {
            if id.in_degree <= 0 {
                continue;
            }
            let closer = match nearest {
                None => true,
                Some(n) => {
                    id.min_depth < ids[n].min_depth
                        || (id.min_depth == ids[n].min_depth && id.in_degree < ids[n].in_degree)
                }
            };
            if closer {
                nearest = Some(i);
            }
        }
        let Some(nearest) = nearest else {
            break;
        };
        tracing::trace!("Breaking conflict id cycle at {}", ids[nearest].key);
        ids[nearest].in_degree = 0;
        roots.push(ids, nearest);
        process_roots(ids, &mut sorted, &mut roots);
    }

    (sorted, cyclic)
}

fn process_roots(ids: &mut [ConflictId], sorted: &mut Vec<String>, roots: &mut RootQueue) {
    while let Some(root) = roots.pop() {
        sorted.push(ids[root].key.clone());
        for child in ids[root].children.clone() {
            ids[child].in_degree -= 1;
            if ids[child].in_degree == 0 {
                roots.push(ids, child);
            }
        }
    }
}
