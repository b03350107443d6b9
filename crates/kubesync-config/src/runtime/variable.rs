//! Runtime variables computed from build and dependency state.
//!
//! Supports variables like:
//! - `${runtime.images.<image>}` - Full image reference (`repository:tag`)
//! - `${runtime.images.<image>.image}` - Image repository
//! - `${runtime.images.<image>.tag}` - Tag from the latest build
//! - `${runtime.dependencies.<dependency>.<...>}` - Any of the above, looked up
//!   in a dependency project

use kubesync_core::{BuiltImages, Config, Dependency, Document};
use std::sync::Arc;
use tracing::trace;

use super::Resolved;
use crate::{ConfigError, ConfigResult, RuntimeVariableError};

/// Namespace prefix shared by every runtime variable.
pub const RUNTIME_PREFIX: &str = "runtime.";

/// A single `runtime.` variable bound to the state it is computed from.
///
/// Nothing is cached: every [`RuntimeVariable::load`] recomputes the value.
pub struct RuntimeVariable<'a> {
    name: &'a str,
    config: &'a dyn Config,
    dependencies: &'a [Arc<dyn Dependency>],
    built_images: &'a BuiltImages,
}

/// Project state a variable path is evaluated against.
#[derive(Clone, Copy)]
struct Scope<'a> {
    config: &'a dyn Config,
    dependencies: &'a [Arc<dyn Dependency>],
    built_images: &'a BuiltImages,
}

impl<'a> RuntimeVariable<'a> {
    pub fn new(
        name: &'a str,
        config: &'a dyn Config,
        dependencies: &'a [Arc<dyn Dependency>],
        built_images: &'a BuiltImages,
    ) -> Self {
        Self {
            name,
            config,
            dependencies,
            built_images,
        }
    }

    /// Compute the variable's value.
    ///
    /// A value that depends on an image tag missing from the built images
    /// resolves to an empty string with `needs_rebuild` set.
    pub fn load(&self) -> ConfigResult<Resolved> {
        let Some(path) = self.name.strip_prefix(RUNTIME_PREFIX) else {
            return Err(ConfigError::UnrecognizedRuntimeVariable(self.name.to_string()));
        };

        let parts: Vec<&str> = path.split('.').collect();
        let scope = Scope {
            config: self.config,
            dependencies: self.dependencies,
            built_images: self.built_images,
        };

        let resolved = self.load_in(scope, &parts)?;
        trace!(
            name = %self.name,
            needs_rebuild = resolved.needs_rebuild,
            "Loaded runtime variable"
        );
        Ok(resolved)
    }

    fn load_in(&self, scope: Scope<'_>, parts: &[&str]) -> ConfigResult<Resolved> {
        match parts {
            ["images", image] => {
                let repository = self.image_repository(scope, image)?;
                Ok(match scope.built_images.tag(image) {
                    Some(tag) => Resolved::fresh(format!("{}:{}", repository, tag)),
                    None => Resolved::rebuild(Document::string("")),
                })
            }
            ["images", image, "image"] => {
                Ok(Resolved::fresh(self.image_repository(scope, image)?.to_string()))
            }
            ["images", image, "tag"] => Ok(match scope.built_images.tag(image) {
                Some(tag) => Resolved::fresh(tag.to_string()),
                None => Resolved::rebuild(Document::string("")),
            }),

            ["dependencies", name, rest @ ..] if !rest.is_empty() => {
                let dependency = scope
                    .dependencies
                    .iter()
                    .find(|d| d.name() == *name)
                    .ok_or_else(|| {
                        self.error(RuntimeVariableError::UnknownDependency(name.to_string()))
                    })?;

                let dependency_scope = Scope {
                    config: dependency.config(),
                    dependencies: dependency.dependencies(),
                    built_images: dependency.built_images(),
                };
                self.load_in(dependency_scope, rest)
            }
            ["dependencies", ..] => Err(self.error(RuntimeVariableError::MalformedReference(
                "expected runtime.dependencies.<name>.<variable>".to_string(),
            ))),

            _ => Err(ConfigError::UnrecognizedRuntimeVariable(self.name.to_string())),
        }
    }

    fn image_repository<'s>(&self, scope: Scope<'s>, image: &str) -> ConfigResult<&'s str> {
        scope
            .config
            .image(image)
            .map(|i| i.image.as_str())
            .ok_or_else(|| self.error(RuntimeVariableError::UnknownImage(image.to_string())))
    }

    fn error(&self, source: RuntimeVariableError) -> ConfigError {
        ConfigError::RuntimeVariable {
            name: self.name.to_string(),
            source,
        }
    }
}
