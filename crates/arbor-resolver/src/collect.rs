//! Dependency graph collection.
//!
//! Starting from a root artifact, declared dependencies are expanded
//! recursively using descriptors read through a [`DescriptorReader`]. Version
//! ranges fan out into one child per matching available version, and a
//! dependency on an artifact already on the current path becomes a back edge.

use std::collections::HashMap;
use std::rc::Rc;

use arbor_core::artifact::Artifact;
use arbor_core::config::CollectConfig;
use arbor_core::dependency::{scope, Dependency, Exclusion};
use arbor_util::errors::ArborError;
use petgraph::graph::NodeIndex;

use crate::graph::{DependencyGraph, DependencyNode};
use crate::version::{Version, VersionConstraint};

/// Source of artifact descriptors (POM-equivalents) and version listings.
pub trait DescriptorReader {
    /// The descriptor of `artifact`, or `None` if it has none.
    fn read_descriptor(&self, artifact: &Artifact) -> miette::Result<Option<Descriptor>>;

    /// Every version of `artifact` (version field ignored) the repositories know about.
    fn available_versions(&self, artifact: &Artifact) -> miette::Result<Vec<String>>;
}

/// What an artifact declares about itself.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
    /// Set when the artifact moved to new coordinates.
    pub relocation: Option<Artifact>,
}

impl Descriptor {
    pub fn new(dependencies: Vec<Dependency>) -> Self {
        Self {
            dependencies,
            ..Self::default()
        }
    }

    pub fn relocated_to(artifact: Artifact) -> Self {
        Self {
            relocation: Some(artifact),
            ..Self::default()
        }
    }
}

/// Input to [`DependencyCollector::collect`].
///
/// When `dependencies` is empty the root's own descriptor supplies them.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub root: Artifact,
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
}

impl CollectRequest {
    pub fn new(root: Artifact) -> Self {
        Self {
            root,
            dependencies: Vec::new(),
            managed_dependencies: Vec::new(),
        }
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn managed(mut self, dependency: Dependency) -> Self {
        self.managed_dependencies.push(dependency);
        self
    }
}

/// Selection and management rules in effect at one level of the recursion.
///
/// Each level derives its children's rules with [`CollectRules::derive`]:
/// exclusions accumulate down the path, managed versions accumulate with the
/// earliest declaration winning, and scope/optional filtering switches on
/// below the direct dependencies.
#[derive(Debug, Clone)]
pub struct CollectRules {
    excluded_scopes: Vec<String>,
    include_optional: bool,
    /// Depth of the dependencies these rules select; direct dependencies are depth 1.
    depth: usize,
    exclusions: Vec<Exclusion>,
    managed: HashMap<String, Dependency>,
}

/// A dependency after management, with the values it replaced.
#[derive(Debug, Clone)]
pub struct ManagedDependency {
    pub dependency: Dependency,
    pub premanaged_version: Option<String>,
    pub premanaged_scope: Option<String>,
}

impl CollectRules {
    pub fn new(config: &CollectConfig) -> Self {
        Self {
            excluded_scopes: config.excluded_scopes.clone(),
            include_optional: config.include_optional,
            depth: 1,
            exclusions: Vec::new(),
            managed: HashMap::new(),
        }
    }

    /// Add managed dependencies; keys already managed keep their entry.
    pub fn with_managed(mut self, managed: &[Dependency]) -> Self {
        for dependency in managed {
            self.managed
                .entry(dependency.artifact.conflict_key())
                .or_insert_with(|| dependency.clone());
        }
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_transitive(&self) -> bool {
        self.depth > 1
    }

    /// Whether `dependency` belongs in the graph. Direct dependencies are only
    /// subject to exclusions.
    pub fn select(&self, dependency: &Dependency) -> bool {
        if self.exclusions.iter().any(|e| e.matches(&dependency.artifact)) {
            return false;
        }
        if !self.is_transitive() {
            return true;
        }
        if self.excluded_scopes.contains(&dependency.scope) {
            return false;
        }
        self.include_optional || !dependency.optional
    }

    /// Apply dependency management. Only transitive dependencies are managed.
    pub fn manage(&self, dependency: &Dependency) -> ManagedDependency {
        let mut result = ManagedDependency {
            dependency: dependency.clone(),
            premanaged_version: None,
            premanaged_scope: None,
        };
        if !self.is_transitive() {
            return result;
        }
        let Some(managed) = self.managed.get(&dependency.artifact.conflict_key()) else {
            return result;
        };
        if managed.artifact.version != dependency.artifact.version {
            result.premanaged_version = Some(dependency.artifact.version.clone());
            result.dependency.artifact.version = managed.artifact.version.clone();
        }
        if managed.scope != dependency.scope {
            result.premanaged_scope = Some(dependency.scope.clone());
            result.dependency.scope = managed.scope.clone();
        }
        result
    }

    /// Rules for the children of `dependency`, whose descriptor is `descriptor`.
    pub fn derive(&self, dependency: &Dependency, descriptor: &Descriptor) -> Self {
        let mut child = self.clone().with_managed(&descriptor.managed_dependencies);
        child.depth += 1;
        child.exclusions.extend(dependency.exclusions.iter().cloned());
        child
    }
}

/// Builds the raw dependency graph for a [`CollectRequest`].
pub struct DependencyCollector<'r> {
    reader: &'r dyn DescriptorReader,
    config: CollectConfig,
}

impl<'r> DependencyCollector<'r> {
    pub fn new(reader: &'r dyn DescriptorReader, config: &CollectConfig) -> Self {
        Self {
            reader,
            config: config.clone(),
        }
    }

    pub fn collect(&self, request: &CollectRequest) -> miette::Result<DependencyGraph> {
        let mut collection = Collection {
            reader: self.reader,
            graph: DependencyGraph::new(DependencyNode::root(request.root.clone())),
            descriptors: HashMap::new(),
            path: Vec::new(),
        };
        let root = collection.graph.root();

        let mut rules = CollectRules::new(&self.config).with_managed(&request.managed_dependencies);
        let dependencies = if request.dependencies.is_empty() {
            match collection.descriptor(&request.root)? {
                Some(descriptor) => {
                    rules = rules.with_managed(&descriptor.managed_dependencies);
                    descriptor.dependencies.clone()
                }
                None => Vec::new(),
            }
        } else {
            request.dependencies.clone()
        };

        collection.path.push((request.root.clone(), root));
        collection.process(root, "", &dependencies, &rules)?;
        tracing::debug!(
            "Collected {} nodes for {}",
            collection.graph.node_bound(),
            request.root
        );
        Ok(collection.graph)
    }
}

struct Collection<'r> {
    reader: &'r dyn DescriptorReader,
    graph: DependencyGraph,
    descriptors: HashMap<Artifact, Option<Rc<Descriptor>>>,
    /// Artifacts from the root to the node being expanded.
    path: Vec<(Artifact, NodeIndex)>,
}

impl Collection<'_> {
    fn process(
        &mut self,
        parent: NodeIndex,
        parent_scope: &str,
        dependencies: &[Dependency],
        rules: &CollectRules,
    ) -> miette::Result<()> {
        for declared in dependencies {
            if !rules.select(declared) {
                tracing::trace!("Skipping {} [{}]", declared.artifact, declared.scope);
                continue;
            }
            let managed = rules.manage(declared);
            let dependency = &managed.dependency;
            let scope = if rules.is_transitive() {
                scope::propagate(parent_scope, &dependency.scope)
                    .map(str::to_string)
                    .unwrap_or_else(|| dependency.scope.clone())
            } else {
                dependency.scope.clone()
            };
            let constraint = VersionConstraint::parse(&dependency.artifact.version)?;

            for version in self.versions(&dependency.artifact, &constraint)? {
                let requested = dependency.artifact.with_version(version.as_str());
                let (artifact, relocations, descriptor) = self.follow_relocations(requested)?;

                if let Some(&(_, ancestor)) = self.path.iter().find(|(a, _)| *a == artifact) {
                    tracing::debug!("Dependency cycle: {artifact} depends on itself");
                    self.graph.link(parent, ancestor);
                    continue;
                }

                let mut node =
                    DependencyNode::from_dependency(dependency, constraint.clone(), version.clone());
                node.version = Version::parse(&artifact.version);
                node.artifact = artifact.clone();
                node.scope = scope.clone();
                node.relocations = relocations;
                node.premanaged_version = managed.premanaged_version.clone();
                node.premanaged_scope = managed.premanaged_scope.clone();
                tracing::trace!("Adding {node} at depth {}", rules.depth());
                let idx = self.graph.add_child(parent, node);

                let Some(descriptor) = descriptor else {
                    continue;
                };
                if descriptor.dependencies.is_empty() {
                    continue;
                }
                let child_rules = rules.derive(dependency, &descriptor);
                self.path.push((artifact, idx));
                let result = self.process(idx, &scope, &descriptor.dependencies, &child_rules);
                self.path.pop();
                result?;
            }
        }
        Ok(())
    }

    /// Concrete versions for a constraint: the preferred version, or every
    /// available version inside the ranges in ascending order.
    fn versions(
        &self,
        artifact: &Artifact,
        constraint: &VersionConstraint,
    ) -> miette::Result<Vec<Version>> {
        if let Some(version) = constraint.version() {
            return Ok(vec![version.clone()]);
        }
        let mut versions: Vec<Version> = self
            .reader
            .available_versions(artifact)?
            .iter()
            .map(|v| Version::parse(v))
            .filter(|v| constraint.contains_version(v))
            .collect();
        versions.sort();
        versions.dedup();
        if versions.is_empty() {
            return Err(ArborError::Resolution {
                message: format!(
                    "No versions of {} match {constraint}",
                    artifact.conflict_key()
                ),
            }
            .into());
        }
        Ok(versions)
    }

    fn descriptor(&mut self, artifact: &Artifact) -> miette::Result<Option<Rc<Descriptor>>> {
        if let Some(cached) = self.descriptors.get(artifact) {
            return Ok(cached.clone());
        }
        let descriptor = self.reader.read_descriptor(artifact)?.map(Rc::new);
        if descriptor.is_none() {
            tracing::warn!("No descriptor for {artifact}, assuming it has no dependencies");
        }
        self.descriptors.insert(artifact.clone(), descriptor.clone());
        Ok(descriptor)
    }

    /// Follow relocations to the final artifact. Returns it with the artifacts
    /// passed on the way and its descriptor.
    fn follow_relocations(
        &mut self,
        mut artifact: Artifact,
    ) -> miette::Result<(Artifact, Vec<Artifact>, Option<Rc<Descriptor>>)> {
        let mut relocations = Vec::new();
        loop {
            let descriptor = self.descriptor(&artifact)?;
            let target = descriptor.as_ref().and_then(|d| d.relocation.clone());
            match target {
                Some(target) if target != artifact && !relocations.contains(&target) => {
                    tracing::debug!("{artifact} was relocated to {target}");
                    relocations.push(std::mem::replace(&mut artifact, target));
                }
                _ => return Ok((artifact, relocations, descriptor)),
            }
        }
    }
}
