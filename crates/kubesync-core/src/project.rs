//! Project and dependency traits consumed by variable resolution.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::Document;

/// Explicit variables by name.
pub type Variables = BTreeMap<String, Document>;

/// An image the project knows how to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image repository, e.g. `registry.example.com/api`.
    pub image: String,
}

/// Configuration of a loaded project.
pub trait Config: Send + Sync {
    /// Explicit variables; always win over runtime values of the same name.
    fn variables(&self) -> &Variables;

    /// Path of the file the configuration was loaded from.
    fn path(&self) -> &Path;

    /// Look up an image definition by its identifier.
    fn image(&self, name: &str) -> Option<&ImageConfig>;
}

/// Another, already resolved, project this one depends on.
pub trait Dependency: Send + Sync {
    fn name(&self) -> &str;

    fn config(&self) -> &dyn Config;

    /// Tags built for this dependency's images.
    fn built_images(&self) -> &BuiltImages;

    /// Dependencies of this dependency.
    fn dependencies(&self) -> &[Arc<dyn Dependency>] {
        &[]
    }
}

/// Snapshot of image identifier to built tag, from the latest build phase.
///
/// Passed by value into each resolution cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltImages(HashMap<String, String>);

impl BuiltImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tag built for an image.
    pub fn insert(&mut self, image: impl Into<String>, tag: impl Into<String>) {
        self.0.insert(image.into(), tag.into());
    }

    pub fn with(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.insert(image, tag);
        self
    }

    /// Tag built for an image, if any.
    pub fn tag(&self, image: &str) -> Option<&str> {
        self.0.get(image).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuiltImages {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A resolved image reference used to select containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{image}")]
pub struct ImageSelector {
    pub image: String,
}

impl ImageSelector {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_images_lookup() {
        let images: BuiltImages = [("api", "v2"), ("web", "abc123")].into_iter().collect();
        assert_eq!(images.tag("api"), Some("v2"));
        assert_eq!(images.tag("worker"), None);
        assert_eq!(images.len(), 2);
        assert!(!images.is_empty());
        assert!(BuiltImages::new().is_empty());
    }

    #[test]
    fn test_built_images_snapshot_is_independent() {
        let original = BuiltImages::new().with("api", "v1");
        let mut snapshot = original.clone();
        snapshot.insert("api", "v2");
        assert_eq!(original.tag("api"), Some("v1"));
        assert_eq!(snapshot.tag("api"), Some("v2"));
    }

    #[test]
    fn test_image_selector_display() {
        let selector = ImageSelector::new("registry.example.com/api:v2");
        assert_eq!(selector.to_string(), "registry.example.com/api:v2");
    }
}
