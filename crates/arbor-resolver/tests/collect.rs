use std::collections::HashMap;

use arbor_core::artifact::Artifact;
use arbor_core::config::CollectConfig;
use arbor_core::dependency::{Dependency, Exclusion};
use arbor_resolver::collect::{CollectRequest, DependencyCollector, Descriptor, DescriptorReader};
use arbor_resolver::graph::DependencyGraph;
use petgraph::graph::NodeIndex;

#[derive(Default)]
struct Repo {
    descriptors: HashMap<String, Descriptor>,
    versions: HashMap<String, Vec<String>>,
}

impl Repo {
    fn pom(mut self, coords: &str, dependencies: Vec<Dependency>) -> Self {
        self.descriptors.insert(coords.to_string(), Descriptor::new(dependencies));
        self
    }

    fn descriptor(mut self, coords: &str, descriptor: Descriptor) -> Self {
        self.descriptors.insert(coords.to_string(), descriptor);
        self
    }

    fn versions(mut self, key: &str, versions: &[&str]) -> Self {
        self.versions
            .insert(key.to_string(), versions.iter().map(|v| v.to_string()).collect());
        self
    }
}

impl DescriptorReader for Repo {
    fn read_descriptor(&self, artifact: &Artifact) -> miette::Result<Option<Descriptor>> {
        Ok(self.descriptors.get(&artifact.to_string()).cloned())
    }

    fn available_versions(&self, artifact: &Artifact) -> miette::Result<Vec<String>> {
        Ok(self
            .versions
            .get(&artifact.conflict_key())
            .cloned()
            .unwrap_or_default())
    }
}

fn dep(coords: &str) -> Dependency {
    Dependency::parse(coords).unwrap()
}

fn scoped(coords: &str, scope: &str) -> Dependency {
    Dependency::new(Artifact::parse(coords).unwrap(), scope)
}

fn app() -> Artifact {
    Artifact::new("g", "app", "1")
}

fn collect(repo: &Repo, request: &CollectRequest) -> DependencyGraph {
    DependencyCollector::new(repo, &CollectConfig::default())
        .collect(request)
        .unwrap()
}

fn child_names(graph: &DependencyGraph, idx: NodeIndex) -> Vec<String> {
    graph
        .children(idx)
        .into_iter()
        .map(|c| graph.node(c).artifact.to_string())
        .collect()
}

fn only_child(graph: &DependencyGraph, idx: NodeIndex) -> NodeIndex {
    let children = graph.children(idx);
    assert_eq!(children.len(), 1, "expected one child of {}", graph.node(idx));
    children[0]
}

#[test]
fn ranges_expand_to_matching_versions_ascending() {
    let repo = Repo::default().versions("g:x:jar", &["2.0", "1.5", "0.9", "1.0", "1.1"]);
    let request = CollectRequest::new(app()).dependency(dep("g:x:[1.0,2.0)"));

    let graph = collect(&repo, &request);
    assert_eq!(
        child_names(&graph, graph.root()),
        vec!["g:x:jar:1.0", "g:x:jar:1.1", "g:x:jar:1.5"]
    );
    let first = graph.children(graph.root())[0];
    assert_eq!(graph.node(first).constraint.to_string(), "[1.0,2.0)");
}

#[test]
fn range_without_matching_versions_fails() {
    let repo = Repo::default().versions("g:x:jar", &["0.9"]);
    let request = CollectRequest::new(app()).dependency(dep("g:x:[1.0,2.0)"));

    let err = DependencyCollector::new(&repo, &CollectConfig::default())
        .collect(&request)
        .unwrap_err();
    assert!(err.to_string().contains("No versions of g:x:jar match [1.0,2.0)"));
}

#[test]
fn invalid_version_constraint_fails() {
    let request = CollectRequest::new(app()).dependency(dep("g:x:[1.0"));
    let result = DependencyCollector::new(&Repo::default(), &CollectConfig::default()).collect(&request);
    assert!(result.is_err());
}

#[test]
fn transitive_test_and_provided_dependencies_are_dropped() {
    let repo = Repo::default().pom(
        "g:a:jar:1",
        vec![
            scoped("g:t:1", "test"),
            scoped("g:p:1", "provided"),
            scoped("g:r:1", "runtime"),
        ],
    );
    let request = CollectRequest::new(app())
        .dependency(dep("g:a:1"))
        .dependency(scoped("g:junit:4", "test"));

    let graph = collect(&repo, &request);
    assert_eq!(
        child_names(&graph, graph.root()),
        vec!["g:a:jar:1", "g:junit:jar:4"]
    );
    let a = graph.children(graph.root())[0];
    let r = only_child(&graph, a);
    assert_eq!(graph.node(r).artifact.artifact_id, "r");
    assert_eq!(graph.node(r).scope, "runtime");
}

#[test]
fn scope_propagates_from_parent() {
    let repo = Repo::default().pom("g:a:jar:1", vec![dep("g:b:1")]);
    let request = CollectRequest::new(app()).dependency(scoped("g:a:1", "test"));

    let graph = collect(&repo, &request);
    let a = only_child(&graph, graph.root());
    let b = only_child(&graph, a);
    assert_eq!(graph.node(a).scope, "test");
    assert_eq!(graph.node(b).scope, "test");
}

#[test]
fn transitive_optional_dependencies_follow_config() {
    let repo = Repo::default().pom("g:a:jar:1", vec![dep("g:o:1").optional(true)]);
    let request = CollectRequest::new(app()).dependency(dep("g:a:1"));

    let graph = collect(&repo, &request);
    let a = only_child(&graph, graph.root());
    assert!(graph.children(a).is_empty());

    let config = CollectConfig {
        include_optional: true,
        ..CollectConfig::default()
    };
    let graph = DependencyCollector::new(&repo, &config).collect(&request).unwrap();
    let a = only_child(&graph, graph.root());
    let o = only_child(&graph, a);
    assert!(graph.node(o).optional);
}

#[test]
fn direct_optional_dependencies_are_kept() {
    let request = CollectRequest::new(app()).dependency(dep("g:o:1").optional(true));
    let graph = collect(&Repo::default(), &request);
    assert_eq!(child_names(&graph, graph.root()), vec!["g:o:jar:1"]);
}

#[test]
fn exclusions_accumulate_down_the_path() {
    let repo = Repo::default()
        .pom("g:a:jar:1", vec![dep("other:x:1"), dep("g:y:1")])
        .pom("g:y:jar:1", vec![dep("other:z:1"), dep("g:w:1")]);
    let request =
        CollectRequest::new(app()).dependency(dep("g:a:1").exclude(Exclusion::new("other", "*")));

    let graph = collect(&repo, &request);
    let a = only_child(&graph, graph.root());
    assert_eq!(child_names(&graph, a), vec!["g:y:jar:1"]);
    let y = only_child(&graph, a);
    assert_eq!(child_names(&graph, y), vec!["g:w:jar:1"]);
}

#[test]
fn management_applies_to_transitive_dependencies() {
    let repo = Repo::default().pom("g:a:jar:1", vec![dep("g:m:1.0")]);
    let request = CollectRequest::new(app())
        .dependency(dep("g:m:1.0"))
        .dependency(dep("g:a:1"))
        .managed(dep("g:m:2.0"));

    let graph = collect(&repo, &request);
    let root_children = graph.children(graph.root());
    let direct = graph.node(root_children[0]);
    assert_eq!(direct.artifact.version, "1.0");
    assert_eq!(direct.premanaged_version, None);

    let transitive = graph.node(only_child(&graph, root_children[1]));
    assert_eq!(transitive.artifact.version, "2.0");
    assert_eq!(transitive.premanaged_version.as_deref(), Some("1.0"));
    assert_eq!(transitive.premanaged_scope, None);
}

#[test]
fn earliest_managed_declaration_wins() {
    let repo = Repo::default()
        .descriptor(
            "g:a:jar:1",
            Descriptor {
                dependencies: vec![dep("g:b:1")],
                managed_dependencies: vec![scoped("g:m:3.0", "runtime")],
                relocation: None,
            },
        )
        .pom("g:b:jar:1", vec![dep("g:m:1.0")]);
    let request = CollectRequest::new(app())
        .dependency(dep("g:a:1"))
        .managed(dep("g:m:2.0"));

    let graph = collect(&repo, &request);
    let a = only_child(&graph, graph.root());
    let b = only_child(&graph, a);
    let m = graph.node(only_child(&graph, b));
    assert_eq!(m.artifact.version, "2.0");
    assert_eq!(m.scope, "compile");
}

#[test]
fn descriptor_management_changes_scope() {
    let repo = Repo::default()
        .descriptor(
            "g:a:jar:1",
            Descriptor {
                dependencies: vec![dep("g:b:1")],
                managed_dependencies: vec![scoped("g:b:1", "runtime")],
                relocation: None,
            },
        );
    let request = CollectRequest::new(app()).dependency(dep("g:a:1"));

    let graph = collect(&repo, &request);
    let b = graph.node(only_child(&graph, only_child(&graph, graph.root())));
    assert_eq!(b.scope, "runtime");
    assert_eq!(b.premanaged_scope.as_deref(), Some("compile"));
    assert_eq!(b.premanaged_version, None);
}

#[test]
fn relocations_are_followed() {
    let repo = Repo::default()
        .descriptor(
            "g:old:jar:1.0",
            Descriptor::relocated_to(Artifact::new("h", "new", "1.0")),
        )
        .pom("h:new:jar:1.0", vec![dep("g:c:1")]);
    let request = CollectRequest::new(app()).dependency(dep("g:old:1.0"));

    let graph = collect(&repo, &request);
    let new = only_child(&graph, graph.root());
    let node = graph.node(new);
    assert_eq!(node.artifact.to_string(), "h:new:jar:1.0");
    assert_eq!(node.relocations, vec![Artifact::new("g", "old", "1.0")]);
    assert_eq!(child_names(&graph, new), vec!["g:c:jar:1"]);
}

#[test]
fn relocation_loops_stop() {
    let repo = Repo::default()
        .descriptor("g:a:jar:1", Descriptor::relocated_to(Artifact::new("g", "b", "1")))
        .descriptor("g:b:jar:1", Descriptor::relocated_to(Artifact::new("g", "a", "1")));
    let request = CollectRequest::new(app()).dependency(dep("g:a:1"));

    let graph = collect(&repo, &request);
    let node = graph.node(only_child(&graph, graph.root()));
    assert_eq!(node.artifact.artifact_id, "b");
    assert_eq!(node.relocations.len(), 1);
}

#[test]
fn cycles_become_back_edges() {
    let repo = Repo::default()
        .pom("g:a:jar:1", vec![dep("g:b:1")])
        .pom("g:b:jar:1", vec![dep("g:a:1")]);
    let request = CollectRequest::new(app()).dependency(dep("g:a:1"));

    let graph = collect(&repo, &request);
    let a = only_child(&graph, graph.root());
    let b = only_child(&graph, a);
    assert_eq!(graph.children(b), vec![a]);
    assert_eq!(graph.len(), 2);
    assert!(graph.print_tree(None).contains("(cycle)"));
}

#[test]
fn missing_descriptor_makes_a_leaf() {
    let request = CollectRequest::new(app()).dependency(dep("g:ghost:1"));
    let graph = collect(&Repo::default(), &request);
    let ghost = only_child(&graph, graph.root());
    assert!(graph.children(ghost).is_empty());
}

#[test]
fn root_descriptor_supplies_dependencies() {
    let repo = Repo::default()
        .descriptor(
            "g:app:jar:1",
            Descriptor {
                dependencies: vec![dep("g:a:1")],
                managed_dependencies: vec![dep("g:b:2")],
                relocation: None,
            },
        )
        .pom("g:a:jar:1", vec![dep("g:b:1")]);

    let graph = collect(&repo, &CollectRequest::new(app()));
    let a = only_child(&graph, graph.root());
    assert_eq!(child_names(&graph, a), vec!["g:b:jar:2"]);
}

#[test]
fn find_path_reports_route_to_node() {
    let repo = Repo::default()
        .pom("g:a:jar:1", vec![dep("g:b:1")])
        .pom("g:b:jar:1", vec![dep("g:c:1")]);
    let request = CollectRequest::new(app()).dependency(dep("g:a:1"));

    let graph = collect(&repo, &request);
    let path: Vec<String> = graph
        .find_path("g:c")
        .unwrap()
        .into_iter()
        .map(|n| n.artifact.artifact_id.clone())
        .collect();
    assert_eq!(path, vec!["app", "a", "b", "c"]);
}
