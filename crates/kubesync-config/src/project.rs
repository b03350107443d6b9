//! Project configuration parsing.
//!
//! A project file looks like:
//!
//! ```kdl
//! project "my-app"
//!
//! vars {
//!     namespace "dev"
//!     replicas 2
//! }
//!
//! images {
//!     api image="registry.example.com/api"
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode, KdlValue};
use kubesync_core::{
    BuiltImages, Config, Dependency, Document, ImageConfig, Mapping, Scalar, Variables,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded project definition.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub name: String,
    /// File the project was loaded from.
    pub path: PathBuf,
    pub variables: Variables,
    pub images: BTreeMap<String, ImageConfig>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Document>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_image(mut self, name: impl Into<String>, image: ImageConfig) -> Self {
        self.images.insert(name.into(), image);
        self
    }
}

impl Config for ProjectConfig {
    fn variables(&self) -> &Variables {
        &self.variables
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn image(&self, name: &str) -> Option<&ImageConfig> {
        self.images.get(name)
    }
}

/// A dependency project whose configuration and builds are already known.
pub struct ResolvedDependency {
    name: String,
    config: ProjectConfig,
    built_images: BuiltImages,
    dependencies: Vec<Arc<dyn Dependency>>,
}

impl ResolvedDependency {
    pub fn new(name: impl Into<String>, config: ProjectConfig, built_images: BuiltImages) -> Self {
        Self {
            name: name.into(),
            config,
            built_images,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Arc<dyn Dependency>) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

impl Dependency for ResolvedDependency {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &dyn Config {
        &self.config
    }

    fn built_images(&self) -> &BuiltImages {
        &self.built_images
    }

    fn dependencies(&self) -> &[Arc<dyn Dependency>] {
        &self.dependencies
    }
}

/// Read and parse a project file.
pub fn load_project(path: impl AsRef<Path>) -> ConfigResult<ProjectConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_project(&text, path)
}

/// Parse a project configuration from KDL text.
pub fn parse_project(kdl: &str, path: impl Into<PathBuf>) -> ConfigResult<ProjectConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut name = String::new();
    let mut variables = Variables::new();
    let mut images = BTreeMap::new();

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;
            }
            "vars" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let key = child.name().value().to_string();
                        let value = parse_value(child)?;
                        if variables.insert(key.clone(), value).is_some() {
                            return Err(ConfigError::Duplicate(format!("variable '{}'", key)));
                        }
                    }
                }
            }
            "images" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let (key, image) = parse_image(child)?;
                        if images.contains_key(&key) {
                            return Err(ConfigError::Duplicate(format!("image '{}'", key)));
                        }
                        images.insert(key, image);
                    }
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("project name".to_string()));
    }

    Ok(ProjectConfig {
        name,
        path: path.into(),
        variables,
        images,
    })
}

fn parse_image(node: &KdlNode) -> ConfigResult<(String, ImageConfig)> {
    let name = node.name().value().to_string();
    let image = get_string_prop(node, "image")
        .or_else(|| get_first_string_arg(node))
        .ok_or_else(|| ConfigError::MissingField(format!("image for '{}'", name)))?;

    Ok((name, ImageConfig { image }))
}

/// A variable node: children become a mapping, several arguments a
/// sequence, a single argument a scalar.
fn parse_value(node: &KdlNode) -> ConfigResult<Document> {
    let name = node.name().value();
    let args: Vec<&KdlValue> = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
        .collect();

    if let Some(children) = node.children() {
        if !args.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: name.to_string(),
                message: "a variable takes either arguments or children, not both".to_string(),
            });
        }
        let mut map = Mapping::new();
        for child in children.nodes() {
            map.insert(child.name().value().to_string(), parse_value(child)?);
        }
        return Ok(Document::Mapping(map));
    }

    match args.as_slice() {
        [] => Err(ConfigError::MissingField(format!("value for variable '{}'", name))),
        [value] => scalar_from_kdl(name, value),
        values => values
            .iter()
            .map(|v| scalar_from_kdl(name, v))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Document::Sequence),
    }
}

fn scalar_from_kdl(field: &str, value: &KdlValue) -> ConfigResult<Document> {
    if let Some(s) = value.as_string() {
        return Ok(Document::string(s));
    }
    if let Some(b) = value.as_bool() {
        return Ok(Document::from(b));
    }
    if let Some(i) = value.as_integer() {
        return i64::try_from(i)
            .map(Document::from)
            .map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                message: format!("integer {} out of range", i),
            });
    }
    if let Some(f) = value.as_float() {
        return Ok(Document::from(f));
    }
    Ok(Document::Scalar(Scalar::Null))
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_project() {
        let kdl = r#"
            project "shop"

            vars {
                namespace "dev"
            }

            images {
                api image="registry.example.com/api"
                web "registry.example.com/web"
            }
        "#;

        let project = parse_project(kdl, "/work/shop/kubesync.kdl").unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.path(), Path::new("/work/shop/kubesync.kdl"));
        assert_eq!(project.variables()["namespace"], Document::from("dev"));
        assert_eq!(
            project.image("api").map(|i| i.image.as_str()),
            Some("registry.example.com/api")
        );
        assert_eq!(
            project.image("web").map(|i| i.image.as_str()),
            Some("registry.example.com/web")
        );
    }

    #[test]
    fn test_parse_typed_variables() {
        let kdl = r#"
            project "typed"

            vars {
                replicas 3
                ratio 0.5
                debug #true
                hosts "a.example.com" "b.example.com"
                database {
                    host "localhost"
                    port 5432
                }
            }
        "#;

        let project = parse_project(kdl, "kubesync.kdl").unwrap();
        let vars = project.variables();
        assert_eq!(vars["replicas"], Document::from(3i64));
        assert_eq!(vars["ratio"], Document::from(0.5));
        assert_eq!(vars["debug"], Document::from(true));
        assert_eq!(
            vars["hosts"],
            Document::Sequence(vec!["a.example.com".into(), "b.example.com".into()])
        );
        assert_eq!(vars["database"].get("port"), Some(&Document::from(5432i64)));
    }

    #[test]
    fn test_missing_project_name() {
        let result = parse_project("vars { a \"b\" }", "kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_image_without_repository() {
        let kdl = r#"
            project "broken"
            images {
                api
            }
        "#;
        let result = parse_project(kdl, "kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_duplicate_variable() {
        let kdl = r#"
            project "dupes"
            vars {
                a "1"
                a "2"
            }
        "#;
        let result = parse_project(kdl, "kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_duplicate_image() {
        let kdl = r#"
            project "dupes"
            images {
                api image="a"
                api image="b"
            }
        "#;
        let result = parse_project(kdl, "kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_invalid_kdl() {
        let result = parse_project("project \"unterminated", "kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_project_from_file() {
        let path =
            std::env::temp_dir().join(format!("kubesync-project-{}.kdl", std::process::id()));
        std::fs::write(&path, "project \"from-disk\"\nvars {\n    tier \"backend\"\n}\n").unwrap();

        let project = load_project(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(project.name, "from-disk");
        assert_eq!(project.path, path);
        assert_eq!(project.variables["tier"], Document::from("backend"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_project("/nonexistent/kubesync.kdl");
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_resolved_dependency() {
        let dependency = ResolvedDependency::new(
            "backend",
            ProjectConfig::new("backend", "/work/backend/kubesync.kdl"),
            BuiltImages::new().with("db", "15"),
        );
        assert_eq!(dependency.name(), "backend");
        assert_eq!(dependency.built_images().tag("db"), Some("15"));
        assert!(dependency.dependencies().is_empty());
        assert_eq!(dependency.config().path(), Path::new("/work/backend/kubesync.kdl"));
    }
}
