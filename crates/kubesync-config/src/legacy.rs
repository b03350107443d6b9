//! Legacy `image()` / `tag()` helpers.
//!
//! Older project files referenced built images with helper calls instead of
//! runtime variables:
//! - `image(api)` - same as `${runtime.images.api.image}`
//! - `tag(api)` - same as `${runtime.images.api.tag}`
//! - `image(backend.db)` / `tag(backend.db)` - image `db` of dependency `backend`
//!
//! Helpers naming an image the project does not define are left as they are.

use kubesync_core::{BuiltImages, Config, Dependency, Document};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::ConfigResult;
use crate::runtime::{Resolved, RuntimeVariable};

static HELPER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(image|tag)\(\s*([A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)?)\s*\)").unwrap()
});

/// Rewrites an older placeholder syntax into concrete values.
pub trait LegacyReplacer: Send + Sync {
    /// Rewrite `input`, reporting whether any rewritten value needs a rebuild.
    ///
    /// `seed` holds the built images of the current resolution cycle.
    fn replace(
        &self,
        input: &str,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
        seed: &BuiltImages,
    ) -> ConfigResult<Resolved>;
}

/// The default [`LegacyReplacer`] for `image()` and `tag()` helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyHelpers;

impl LegacyReplacer for LegacyHelpers {
    fn replace(
        &self,
        input: &str,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
        seed: &BuiltImages,
    ) -> ConfigResult<Resolved> {
        let mut needs_rebuild = false;
        let mut output = String::with_capacity(input.len());
        let mut last = 0;

        for caps in HELPER_REGEX.captures_iter(input) {
            let Some(token) = caps.get(0) else {
                continue;
            };
            if !starts_helper(input, token.start()) {
                continue;
            }
            let Some(name) = runtime_name(&caps[1], &caps[2], config, dependencies) else {
                continue;
            };

            let resolved = RuntimeVariable::new(&name, config, dependencies, seed).load()?;
            debug!(helper = %token.as_str(), variable = %name, "Rewrote legacy helper");

            output.push_str(&input[last..token.start()]);
            output.push_str(&resolved.document.to_string());
            last = token.end();
            needs_rebuild = needs_rebuild || resolved.needs_rebuild;
        }
        output.push_str(&input[last..]);

        Ok(Resolved {
            needs_rebuild,
            document: Document::string(output),
        })
    }
}

/// A helper name must not continue a longer identifier such as `my-image`.
fn starts_helper(input: &str, start: usize) -> bool {
    input[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '-'))
}

/// Runtime variable a helper call stands for, if the image it names exists.
fn runtime_name(
    helper: &str,
    reference: &str,
    config: &dyn Config,
    dependencies: &[Arc<dyn Dependency>],
) -> Option<String> {
    match reference.split_once('.') {
        Some((dependency, image)) => dependencies
            .iter()
            .find(|d| d.name() == dependency)
            .filter(|d| d.config().image(image).is_some())
            .map(|_| {
                format!("runtime.dependencies.{}.images.{}.{}", dependency, image, helper)
            }),
        None => config
            .image(reference)
            .map(|_| format!("runtime.images.{}.{}", reference, helper)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProjectConfig, ResolvedDependency};
    use kubesync_core::ImageConfig;

    fn project() -> ProjectConfig {
        ProjectConfig::new("app", "/work/app/kubesync.kdl")
            .with_image(
                "api",
                ImageConfig {
                    image: "registry.example.com/api".to_string(),
                },
            )
    }

    #[test]
    fn test_rewrites_image_and_tag() {
        let built = BuiltImages::new().with("api", "v2");
        let resolved = LegacyHelpers
            .replace("image(api):tag(api)", &project(), &[], &built)
            .unwrap();
        assert!(!resolved.needs_rebuild);
        assert_eq!(resolved.document, Document::from("registry.example.com/api:v2"));
    }

    #[test]
    fn test_missing_tag_needs_rebuild() {
        let resolved = LegacyHelpers
            .replace("tag(api)", &project(), &[], &BuiltImages::new())
            .unwrap();
        assert!(resolved.needs_rebuild);
        assert_eq!(resolved.document, Document::from(""));
    }

    #[test]
    fn test_unknown_image_left_alone() {
        let input = "image(web) and myimage(api) and my-image(api) and my_tag(api)";
        let resolved = LegacyHelpers
            .replace(input, &project(), &[], &BuiltImages::new())
            .unwrap();
        assert!(!resolved.needs_rebuild);
        assert_eq!(resolved.document, Document::from(input));
    }

    #[test]
    fn test_helper_after_separator() {
        let built = BuiltImages::new().with("api", "v2");
        let resolved = LegacyHelpers
            .replace("ref=image(api) (tag(api))", &project(), &[], &built)
            .unwrap();
        assert_eq!(
            resolved.document,
            Document::from("ref=registry.example.com/api (v2)")
        );
    }

    #[test]
    fn test_dependency_helper() {
        let backend = ProjectConfig::new("backend", "/work/backend/kubesync.kdl").with_image(
            "db",
            ImageConfig {
                image: "registry.example.com/db".to_string(),
            },
        );
        let dependencies: Vec<Arc<dyn Dependency>> = vec![Arc::new(ResolvedDependency::new(
            "backend",
            backend,
            BuiltImages::new().with("db", "15"),
        ))];

        let resolved = LegacyHelpers
            .replace(
                "db: image(backend.db):tag(backend.db)",
                &project(),
                &dependencies,
                &BuiltImages::new(),
            )
            .unwrap();
        assert!(!resolved.needs_rebuild);
        assert_eq!(resolved.document, Document::from("db: registry.example.com/db:15"));
    }
}
