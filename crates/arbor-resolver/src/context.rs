//! Shared state and the transformer interface for graph passes.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::conflict::ConflictReport;
use crate::graph::DependencyGraph;
use crate::marker::ConflictMarker;
use crate::selector::ConflictResolver;
use crate::sorter::ConflictIdSorter;

/// Results one pass publishes for the passes after it.
#[derive(Debug, Default)]
pub struct TransformContext {
    /// Conflict group key of every node reachable from the root.
    pub conflict_ids: Option<HashMap<NodeIndex, String>>,
    /// Conflict group keys in processing order.
    pub sorted_conflict_ids: Option<Vec<String>>,
    /// Whether the sorter had to break a cycle between conflict groups.
    pub cyclic_conflict_ids: bool,
    /// Shallowest depth at which each conflict group was reached.
    pub conflict_depths: HashMap<String, usize>,
    pub conflicts: ConflictReport,
}

impl TransformContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A pass over a dependency graph. Passes take the graph by value and hand
/// back the graph the next pass should see.
pub trait GraphTransformer {
    fn transform(
        &self,
        graph: DependencyGraph,
        context: &mut TransformContext,
    ) -> miette::Result<DependencyGraph>;
}

/// Runs transformers in order over one context.
pub struct ChainedTransformer {
    transformers: Vec<Box<dyn GraphTransformer>>,
}

impl ChainedTransformer {
    pub fn new(transformers: Vec<Box<dyn GraphTransformer>>) -> Self {
        Self { transformers }
    }

    /// Conflict marking, conflict id sorting, then nearest-wins selection.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ConflictMarker),
            Box::new(ConflictIdSorter),
            Box::new(ConflictResolver),
        ])
    }
}

impl GraphTransformer for ChainedTransformer {
    fn transform(
        &self,
        graph: DependencyGraph,
        context: &mut TransformContext,
    ) -> miette::Result<DependencyGraph> {
        self.transformers
            .iter()
            .try_fold(graph, |graph, t| t.transform(graph, context))
    }
}
