//! End-to-end resolution: collect the graph, mark and sort conflict groups,
//! select versions, and flatten the result into an ordered artifact list.

use std::collections::HashSet;

use arbor_core::artifact::Artifact;
use arbor_core::config::CollectConfig;
use serde::Serialize;

use crate::collect::{CollectRequest, DependencyCollector, DescriptorReader};
use crate::conflict::ConflictReport;
use crate::context::{ChainedTransformer, GraphTransformer, TransformContext};
use crate::graph::DependencyGraph;

/// The output of dependency resolution.
pub struct ResolutionResult {
    pub graph: DependencyGraph,
    pub conflicts: ConflictReport,
    /// Resolved artifacts in pre-order, without the root.
    pub artifacts: Vec<ResolvedArtifact>,
    /// Conflict groups in the order they were resolved.
    pub sorted_conflict_ids: Vec<String>,
    /// Whether conflict groups depended on each other cyclically.
    pub cyclic: bool,
}

/// A single resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub artifact: Artifact,
    pub scope: String,
    pub optional: bool,
    /// Direct dependencies of this artifact that survived resolution.
    pub dependencies: Vec<Artifact>,
}

impl ResolutionResult {
    /// Artifacts whose scope is one of `scopes`.
    pub fn artifacts_in<'a>(&'a self, scopes: &'a [&str]) -> impl Iterator<Item = &'a ResolvedArtifact> + 'a {
        self.artifacts
            .iter()
            .filter(move |a| scopes.contains(&a.scope.as_str()))
    }
}

/// Collect and resolve the dependencies of `request`.
pub fn resolve(
    reader: &dyn DescriptorReader,
    request: &CollectRequest,
    config: &CollectConfig,
) -> miette::Result<ResolutionResult> {
    let graph = DependencyCollector::new(reader, config).collect(request)?;

    let mut context = TransformContext::new();
    let graph = ChainedTransformer::standard().transform(graph, &mut context)?;

    let artifacts = flatten(&graph);
    tracing::info!(
        "Resolved {} artifacts for {} ({} conflicts)",
        artifacts.len(),
        request.root,
        context.conflicts.len()
    );

    Ok(ResolutionResult {
        graph,
        conflicts: context.conflicts,
        artifacts,
        sorted_conflict_ids: context.sorted_conflict_ids.unwrap_or_default(),
        cyclic: context.cyclic_conflict_ids,
    })
}

/// Reachable nodes below the root in pre-order, each artifact once.
pub fn flatten(graph: &DependencyGraph) -> Vec<ResolvedArtifact> {
    let root = graph.root();
    let mut seen = HashSet::new();
    graph
        .preorder()
        .into_iter()
        .filter(|&idx| idx != root)
        .filter_map(|idx| {
            let node = graph.node(idx);
            if !seen.insert(node.artifact.clone()) {
                return None;
            }
            let dependencies = graph
                .children(idx)
                .into_iter()
                .filter(|&child| child != root)
                .map(|child| graph.node(child).artifact.clone())
                .collect();
            Some(ResolvedArtifact {
                artifact: node.artifact.clone(),
                scope: node.scope.clone(),
                optional: node.optional,
                dependencies,
            })
        })
        .collect()
}
