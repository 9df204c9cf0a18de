//! Transitive dependency graph walk
//!
//! Starts from a synthetic caller that depends on the root coordinate, so
//! the root is handled exactly like any other dependency. The walk is
//! breadth-first and nearest-wins: the first version reached for a given
//! `group:artifact[:classifier]` is selected, later ones are evicted.

use crate::coordinate::ArtifactCoordinate;
use crate::repository::{Located, RepositoryChain};
use crate::resolve::pom::{self, Dependency, Exclusion, Pom};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Parent and BOM chains deeper than this are treated as cycles
const MAX_DESCRIPTOR_DEPTH: usize = 32;

/// A module selected by the walk
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub coordinate: ArtifactCoordinate,
    pub dep_type: String,
    pub classifier: Option<String>,
    pub packaging: String,
    pub located: Located,
    pub depth: usize,
}

impl ResolvedNode {
    /// File extension of this node's artifact, as Maven's artifact handlers map it
    pub fn extension(&self) -> &str {
        match self.dep_type.as_str() {
            "jar" | "test-jar" | "ejb" | "ejb-client" | "maven-plugin" | "bundle"
            | "java-source" | "javadoc" => "jar",
            other => other,
        }
    }

    /// Whether this node contributes an archive to the classpath
    pub fn has_archive(&self) -> bool {
        match self.dep_type.as_str() {
            "pom" => false,
            // a pom-packaged module referenced as a plain jar has no archive
            "jar" => self.packaging != "pom" || self.classifier.is_some(),
            _ => true,
        }
    }
}

/// Outcome of a graph walk
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub nodes: Vec<ResolvedNode>,
    pub problems: Vec<String>,
}

impl ResolveReport {
    pub fn has_errors(&self) -> bool {
        !self.problems.is_empty()
    }
}

/// Merged, interpolated descriptor of one module
#[derive(Debug, Clone)]
struct Effective {
    packaging: String,
    managed: Vec<Dependency>,
    dependencies: Vec<Dependency>,
}

struct Pending {
    dependency: Dependency,
    scope: String,
    exclusions: Vec<Exclusion>,
    depth: usize,
    required_by: String,
}

/// Graph walk over a repository chain
pub struct GraphWalker<'a> {
    chain: &'a RepositoryChain,
    descriptors: HashMap<String, (Located, Pom)>,
    inherited: HashMap<String, Pom>,
}

impl<'a> GraphWalker<'a> {
    pub fn new(chain: &'a RepositoryChain) -> Self {
        Self {
            chain,
            descriptors: HashMap::new(),
            inherited: HashMap::new(),
        }
    }

    /// Resolve the transitive closure of `root`
    pub fn resolve(&mut self, root: &ArtifactCoordinate) -> ResolveReport {
        let caller = root.caller();
        info!("Resolving {} (via {})", root, caller);

        let mut report = ResolveReport::default();
        let mut selected: HashMap<String, String> = HashMap::new();
        let mut queue = VecDeque::new();

        queue.push_back(Pending {
            dependency: Dependency {
                group: root.group.clone(),
                artifact: root.artifact.clone(),
                version: Some(root.version.clone()),
                scope: Some("compile".to_string()),
                dep_type: "jar".to_string(),
                classifier: None,
                optional: false,
                exclusions: vec![],
            },
            scope: "compile".to_string(),
            exclusions: vec![],
            depth: 0,
            required_by: caller.to_string(),
        });

        while let Some(pending) = queue.pop_front() {
            let dep = &pending.dependency;
            let key = match dep.classifier {
                Some(ref c) => format!("{}:{}:{}", dep.group, dep.artifact, c),
                None => format!("{}:{}", dep.group, dep.artifact),
            };

            let Some(version) = dep.version.clone() else {
                report.problems.push(format!(
                    "{}: no version specified (required by {})",
                    key, pending.required_by
                ));
                continue;
            };

            if let Some(winner) = selected.get(&key) {
                if *winner != version {
                    debug!("{}:{} evicted by {}", key, version, winner);
                }
                continue;
            }
            selected.insert(key.clone(), version.clone());

            if let Some(reason) = pom::unresolvable_version(&version) {
                report.problems.push(format!(
                    "{}:{}: {} (required by {})",
                    key, version, reason, pending.required_by
                ));
                continue;
            }

            let coord = ArtifactCoordinate {
                group: dep.group.clone(),
                artifact: dep.artifact.clone(),
                version,
            };

            let (located, effective) = match self.effective(&coord) {
                Ok(found) => found,
                Err(problem) => {
                    report
                        .problems
                        .push(format!("{} (required by {})", problem, pending.required_by));
                    continue;
                }
            };

            for child in &effective.dependencies {
                if child.optional {
                    continue;
                }
                let declared = child.scope.as_deref().unwrap_or("compile");
                let Some(scope) = transitive_scope(&pending.scope, declared) else {
                    continue;
                };
                if pending
                    .exclusions
                    .iter()
                    .any(|e| e.matches(&child.group, &child.artifact))
                {
                    debug!("{}:{} excluded below {}", child.group, child.artifact, coord);
                    continue;
                }

                let mut exclusions = pending.exclusions.clone();
                exclusions.extend(child.exclusions.iter().cloned());

                queue.push_back(Pending {
                    dependency: child.clone(),
                    scope: scope.to_string(),
                    exclusions,
                    depth: pending.depth + 1,
                    required_by: coord.to_string(),
                });
            }

            report.nodes.push(ResolvedNode {
                coordinate: coord,
                dep_type: dep.dep_type.clone(),
                classifier: dep.classifier.clone(),
                packaging: effective.packaging,
                located,
                depth: pending.depth,
            });
        }

        info!(
            "Resolved {} module(s), {} problem(s)",
            report.nodes.len(),
            report.problems.len()
        );
        report
    }

    /// Locate, inherit, interpolate and apply management for one module
    fn effective(&mut self, coord: &ArtifactCoordinate) -> Result<(Located, Effective), String> {
        let mut visiting = HashSet::new();
        self.effective_inner(coord, &mut visiting)
    }

    fn effective_inner(
        &mut self,
        coord: &ArtifactCoordinate,
        visiting: &mut HashSet<String>,
    ) -> Result<(Located, Effective), String> {
        let (located, _) = self.descriptor(coord)?;
        let mut model = self.inherited(coord, 0)?;

        if located.descriptor.is_none() {
            return Ok((
                located,
                Effective {
                    packaging: "jar".to_string(),
                    managed: vec![],
                    dependencies: vec![],
                },
            ));
        }

        model.interpolate();

        // BOM imports contribute their management after local entries
        let key = coord.to_string();
        if !visiting.insert(key.clone()) || visiting.len() > MAX_DESCRIPTOR_DEPTH {
            return Err(format!("{}: import cycle in dependency management", coord));
        }
        let mut managed = Vec::with_capacity(model.managed.len());
        for entry in &model.managed {
            if !entry.is_import() {
                managed.push(entry.clone());
                continue;
            }
            let Some(ref version) = entry.version else {
                return Err(format!(
                    "{}: imported BOM {}:{} has no version",
                    coord, entry.group, entry.artifact
                ));
            };
            let bom = ArtifactCoordinate {
                group: entry.group.clone(),
                artifact: entry.artifact.clone(),
                version: version.clone(),
            };
            let (_, imported) = self.effective_inner(&bom, visiting)?;
            managed.extend(imported.managed);
        }
        visiting.remove(&key);

        let dependencies = model
            .dependencies
            .iter()
            .map(|dep| apply_management(dep, &managed))
            .collect();

        Ok((
            located,
            Effective {
                packaging: model.packaging().to_string(),
                managed,
                dependencies,
            },
        ))
    }

    /// Raw descriptor of a module, fetched once
    fn descriptor(&mut self, coord: &ArtifactCoordinate) -> Result<(Located, Pom), String> {
        let key = coord.to_string();
        if let Some(found) = self.descriptors.get(&key) {
            return Ok(found.clone());
        }

        let located = match self.chain.locate(coord) {
            Ok(Some(located)) => located,
            Ok(None) => {
                return Err(format!(
                    "module not found: {} (tried {})",
                    coord,
                    self.chain.names().join(", ")
                ))
            }
            Err(e) => return Err(format!("{}: {}", coord, e)),
        };

        let pom = match located.descriptor {
            Some(ref bytes) => Pom::parse(bytes).map_err(|e| {
                format!(
                    "{}: invalid descriptor from {}: {}",
                    coord, located.repository, e
                )
            })?,
            None => Pom::default(),
        };

        self.descriptors.insert(key, (located.clone(), pom.clone()));
        Ok((located, pom))
    }

    /// Descriptor merged with its parent chain, not yet interpolated
    fn inherited(&mut self, coord: &ArtifactCoordinate, depth: usize) -> Result<Pom, String> {
        if depth > MAX_DESCRIPTOR_DEPTH {
            return Err(format!("{}: parent chain too deep or cyclic", coord));
        }
        let key = coord.to_string();
        if let Some(model) = self.inherited.get(&key) {
            return Ok(model.clone());
        }

        let (_, pom) = self.descriptor(coord)?;
        let model = match pom.parent.clone() {
            Some(parent) => {
                let parent_coord = ArtifactCoordinate {
                    group: parent.group,
                    artifact: parent.artifact,
                    version: parent.version,
                };
                let parent_model = self.inherited(&parent_coord, depth + 1)?;
                pom.inherit_from(parent_model)
            }
            None => pom,
        };

        self.inherited.insert(key, model.clone());
        Ok(model)
    }
}

/// Scope a dependency takes on when reached through a parent with `parent_scope`.
///
/// Only `compile` and `runtime` edges are followed transitively.
fn transitive_scope(parent_scope: &str, declared: &str) -> Option<&'static str> {
    match (parent_scope, declared) {
        ("compile", "compile") => Some("compile"),
        ("compile", "runtime") | ("runtime", "compile") | ("runtime", "runtime") => {
            Some("runtime")
        }
        _ => None,
    }
}

/// Fill version and scope from the nearest managed entry
fn apply_management(dep: &Dependency, managed: &[Dependency]) -> Dependency {
    let mut dep = dep.clone();
    let key = dep.management_key();
    if let Some(entry) = managed.iter().find(|m| m.management_key() == key) {
        if dep.version.is_none() {
            dep.version = entry.version.clone();
        }
        if dep.scope.is_none() {
            dep.scope = entry.scope.clone();
        }
        if dep.exclusions.is_empty() {
            dep.exclusions = entry.exclusions.clone();
        }
    }
    dep
}
