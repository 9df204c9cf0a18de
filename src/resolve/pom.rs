//! POM descriptor model
//!
//! Only the parts that drive dependency resolution are read: coordinates,
//! packaging, parent, properties, dependency management and dependencies.

use crate::xml;
use roxmltree::Node;
use std::collections::HashMap;

/// Maximum nesting of `${...}` references
const MAX_INTERPOLATION_DEPTH: usize = 16;

/// Parent reference of a POM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

/// `<exclusion>` entry; either field may be `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub group: String,
    pub artifact: String,
}

impl Exclusion {
    pub fn matches(&self, group: &str, artifact: &str) -> bool {
        (self.group == "*" || self.group == group)
            && (self.artifact == "*" || self.artifact == artifact)
    }
}

/// `<dependency>` entry, either declared or managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub dep_type: String,
    pub classifier: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    /// Key used by dependency management: `group:artifact:type[:classifier]`
    pub fn management_key(&self) -> String {
        match self.classifier {
            Some(ref c) => format!("{}:{}:{}:{}", self.group, self.artifact, self.dep_type, c),
            None => format!("{}:{}:{}", self.group, self.artifact, self.dep_type),
        }
    }

    /// Whether this is a BOM import inside `<dependencyManagement>`
    pub fn is_import(&self) -> bool {
        self.scope.as_deref() == Some("import") && self.dep_type == "pom"
    }

    fn from_node(node: Node<'_, '_>) -> Option<Self> {
        let dep_type = xml::child_text(node, "type").unwrap_or_else(|| "jar".to_string());
        let mut classifier = xml::child_text(node, "classifier");
        if classifier.is_none() && dep_type == "test-jar" {
            classifier = Some("tests".to_string());
        }

        let exclusions = xml::child(node, "exclusions")
            .map(|list| {
                xml::children(list, "exclusion")
                    .filter_map(|e| {
                        Some(Exclusion {
                            group: xml::child_text(e, "groupId")?,
                            artifact: xml::child_text(e, "artifactId")
                                .unwrap_or_else(|| "*".to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            group: xml::child_text(node, "groupId")?,
            artifact: xml::child_text(node, "artifactId")?,
            version: xml::child_text(node, "version"),
            scope: xml::child_text(node, "scope"),
            dep_type,
            classifier,
            optional: xml::child_text(node, "optional").as_deref() == Some("true"),
            exclusions,
        })
    }

    fn interpolate(&mut self, props: &HashMap<String, String>) {
        self.group = interpolate(&self.group, props);
        self.artifact = interpolate(&self.artifact, props);
        for field in [&mut self.version, &mut self.scope, &mut self.classifier]
            .into_iter()
            .flatten()
        {
            *field = interpolate(field, props);
        }
        self.dep_type = interpolate(&self.dep_type, props);
        for exclusion in &mut self.exclusions {
            exclusion.group = interpolate(&exclusion.group, props);
            exclusion.artifact = interpolate(&exclusion.artifact, props);
        }
    }
}

/// A parsed POM, before inheritance
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group: Option<String>,
    pub artifact: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<ParentRef>,
    pub properties: HashMap<String, String>,
    pub managed: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
}

impl Pom {
    /// Parse POM bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');
        let doc = roxmltree::Document::parse(text).map_err(|e| e.to_string())?;
        let project = doc.root_element();
        if project.tag_name().name() != "project" {
            return Err(format!(
                "expected <project>, found <{}>",
                project.tag_name().name()
            ));
        }

        let parent = xml::child(project, "parent").and_then(|p| {
            Some(ParentRef {
                group: xml::child_text(p, "groupId")?,
                artifact: xml::child_text(p, "artifactId")?,
                version: xml::child_text(p, "version")?,
            })
        });

        let properties = xml::child(project, "properties")
            .map(|props| {
                props
                    .children()
                    .filter(|c| c.is_element())
                    .map(|c| {
                        (
                            c.tag_name().name().to_string(),
                            c.text().unwrap_or("").trim().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let managed = xml::descend(project, &["dependencyManagement", "dependencies"])
            .map(dependency_list)
            .unwrap_or_default();
        let dependencies = xml::child(project, "dependencies")
            .map(dependency_list)
            .unwrap_or_default();

        Ok(Self {
            group: xml::child_text(project, "groupId"),
            artifact: xml::child_text(project, "artifactId"),
            version: xml::child_text(project, "version"),
            packaging: xml::child_text(project, "packaging"),
            parent,
            properties,
            managed,
            dependencies,
        })
    }

    /// Overlay this POM on top of its (already merged) parent.
    ///
    /// Child values win; managed entries keep child-first order so lookups
    /// find the nearest declaration.
    pub fn inherit_from(mut self, parent: Pom) -> Pom {
        if self.group.is_none() {
            self.group = parent.group;
        }
        if self.version.is_none() {
            self.version = parent.version;
        }

        let mut properties = parent.properties;
        properties.extend(self.properties);
        self.properties = properties;

        self.managed.extend(parent.managed);

        let mut dependencies = parent.dependencies;
        for dep in self.dependencies {
            let key = dep.management_key();
            dependencies.retain(|d| d.management_key() != key);
            dependencies.push(dep);
        }
        self.dependencies = dependencies;
        self
    }

    /// Properties visible to `${...}` references, including `project.*`
    pub fn interpolation_context(&self) -> HashMap<String, String> {
        let mut ctx = self.properties.clone();
        let mut builtin = |keys: &[&str], value: &Option<String>| {
            if let Some(v) = value {
                for key in keys {
                    ctx.insert((*key).to_string(), v.clone());
                }
            }
        };
        builtin(&["project.groupId", "pom.groupId", "groupId"], &self.group);
        builtin(&["project.artifactId", "pom.artifactId", "artifactId"], &self.artifact);
        builtin(&["project.version", "pom.version", "version"], &self.version);
        builtin(&["project.packaging"], &self.packaging);
        if let Some(ref parent) = self.parent {
            for (key, value) in [
                ("groupId", &parent.group),
                ("artifactId", &parent.artifact),
                ("version", &parent.version),
            ] {
                ctx.insert(format!("project.parent.{}", key), value.clone());
                ctx.insert(format!("parent.{}", key), value.clone());
            }
        }
        ctx
    }

    /// Resolve every `${...}` reference in place
    pub fn interpolate(&mut self) {
        let ctx = self.interpolation_context();
        for dep in self.managed.iter_mut().chain(self.dependencies.iter_mut()) {
            dep.interpolate(&ctx);
        }
        if let Some(ref mut packaging) = self.packaging {
            *packaging = interpolate(packaging, &ctx);
        }
    }

    pub fn packaging(&self) -> &str {
        self.packaging.as_deref().unwrap_or("jar")
    }
}

fn dependency_list(node: Node<'_, '_>) -> Vec<Dependency> {
    xml::children(node, "dependency")
        .filter_map(Dependency::from_node)
        .collect()
}

/// Replace `${name}` references; unknown names are left as-is
pub fn interpolate(value: &str, props: &HashMap<String, String>) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_INTERPOLATION_DEPTH {
        if !current.contains("${") {
            break;
        }
        let next = interpolate_once(&current, props);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn interpolate_once(value: &str, props: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match props.get(name) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Whether a version string still needs resolution before it can be fetched
pub fn unresolvable_version(version: &str) -> Option<&'static str> {
    if version.contains("${") {
        Some("unresolved property")
    } else if version.starts_with('[') || version.starts_with('(') {
        Some("version ranges are not supported")
    } else {
        None
    }
}
