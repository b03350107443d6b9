//! Multi-pass variable resolution for project documents.
//!
//! A resolution cycle runs three stages over a document:
//! 1. Fill explicit variables, apply legacy helpers (when enabled), then fill
//!    `runtime.` variables
//! 2. Resolve `$(...)` expressions relative to the project directory
//! 3. Fill variables again, without legacy helpers, so placeholders produced
//!    by expressions are resolved too
//!
//! Placeholders that are neither explicit variables nor `runtime.` variables
//! are left in place for later stages.

mod variable;

pub use variable::{RUNTIME_PREFIX, RuntimeVariable};

use kubesync_core::{BuiltImages, Config, Dependency, Document, ImageSelector, Scalar};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::expression::{ExpressionOptions, ExpressionResolver, ShellExpressionResolver};
use crate::legacy::{LegacyHelpers, LegacyReplacer};
use crate::placeholder::parse_string;
use crate::walk::walk;
use crate::{ConfigError, ConfigResult};

/// A resolved value and whether it can only be finalized after a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub needs_rebuild: bool,
    pub document: Document,
}

impl Resolved {
    /// A final value.
    pub fn fresh(document: impl Into<Document>) -> Self {
        Self {
            needs_rebuild: false,
            document: document.into(),
        }
    }

    /// A stand-in value that needs a build before it is final.
    pub fn rebuild(document: impl Into<Document>) -> Self {
        Self {
            needs_rebuild: true,
            document: document.into(),
        }
    }
}

/// Which placeholders an inner pass resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Everything outside the `runtime.` namespace.
    Static,
    /// Only `runtime.` variables.
    Runtime,
}

impl Pass {
    fn accepts(self, name: &str) -> bool {
        let is_runtime = name.starts_with(RUNTIME_PREFIX);
        match self {
            Pass::Static => !is_runtime,
            Pass::Runtime => is_runtime,
        }
    }
}

/// State a single cycle resolves against.
struct Cycle<'a> {
    config: &'a dyn Config,
    dependencies: &'a [Arc<dyn Dependency>],
    built_images: &'a BuiltImages,
}

/// Resolves explicit, runtime and expression values in project documents.
pub struct RuntimeResolver {
    enable_legacy_helpers: bool,
    expressions: Arc<dyn ExpressionResolver>,
    expression_options: ExpressionOptions,
    legacy: Arc<dyn LegacyReplacer>,
}

impl RuntimeResolver {
    /// Create a resolver with the shell expression resolver and the
    /// `image()`/`tag()` legacy helpers.
    pub fn new(enable_legacy_helpers: bool) -> Self {
        Self {
            enable_legacy_helpers,
            expressions: Arc::new(ShellExpressionResolver),
            expression_options: ExpressionOptions::default(),
            legacy: Arc::new(LegacyHelpers),
        }
    }

    pub fn with_expression_resolver(
        mut self,
        expressions: impl ExpressionResolver + 'static,
    ) -> Self {
        self.expressions = Arc::new(expressions);
        self
    }

    pub fn with_expression_options(mut self, options: ExpressionOptions) -> Self {
        self.expression_options = options;
        self
    }

    pub fn with_legacy_replacer(mut self, legacy: impl LegacyReplacer + 'static) -> Self {
        self.legacy = Arc::new(legacy);
        self
    }

    /// Resolve a document as if nothing had been built yet, discarding the
    /// rebuild signal.
    pub fn resolve(
        &self,
        document: Document,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
    ) -> ConfigResult<Document> {
        self.resolve_with_rebuild(document, config, dependencies, BuiltImages::new())
            .map(|resolved| resolved.document)
    }

    /// Like [`RuntimeResolver::resolve`], rendering the result as a string.
    pub fn resolve_as_string(
        &self,
        document: Document,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
    ) -> ConfigResult<String> {
        self.resolve(document, config, dependencies)
            .map(|document| document.to_string())
    }

    /// Like [`RuntimeResolver::resolve_as_string`], wrapped as an image selector.
    pub fn resolve_as_image_selector(
        &self,
        document: Document,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
    ) -> ConfigResult<ImageSelector> {
        self.resolve_as_string(document, config, dependencies)
            .map(ImageSelector::new)
    }

    /// Run a full resolution cycle against a snapshot of built images.
    ///
    /// The document must be a string or a mapping. On error, nothing is
    /// returned; strings already replaced are not restored.
    pub fn resolve_with_rebuild(
        &self,
        document: Document,
        config: &dyn Config,
        dependencies: &[Arc<dyn Dependency>],
        built_images: BuiltImages,
    ) -> ConfigResult<Resolved> {
        if !matches!(document, Document::Mapping(_) | Document::Scalar(Scalar::String(_))) {
            return Err(ConfigError::UnrecognizedDocumentType(document.kind().to_string()));
        }

        debug!(
            path = %config.path().display(),
            built_images = built_images.len(),
            legacy_helpers = self.enable_legacy_helpers,
            "Resolving runtime variables"
        );

        let cycle = Cycle {
            config,
            dependencies,
            built_images: &built_images,
        };

        let first = self.fill_variables(document, &cycle, self.enable_legacy_helpers)?;

        let base_path = config.path().parent().unwrap_or(Path::new(""));
        let document = self.expressions.resolve_all_expressions(
            first.document,
            base_path,
            &self.expression_options,
        )?;

        let second = self.fill_variables(document, &cycle, false)?;
        let needs_rebuild = first.needs_rebuild || second.needs_rebuild;

        debug!(needs_rebuild, "Resolved runtime variables");
        Ok(Resolved {
            needs_rebuild,
            document: second.document,
        })
    }

    fn fill_variables(
        &self,
        document: Document,
        cycle: &Cycle<'_>,
        legacy: bool,
    ) -> ConfigResult<Resolved> {
        match document {
            Document::Scalar(Scalar::String(s)) => self.replace_string(&s, cycle, legacy),
            mut nested @ (Document::Mapping(_) | Document::Sequence(_)) => {
                let needs_rebuild = walk(
                    &mut nested,
                    false,
                    |_, _| true,
                    |needs_rebuild, _, value| {
                        self.replace_string(value, cycle, legacy).map(|resolved| {
                            (needs_rebuild || resolved.needs_rebuild, resolved.document)
                        })
                    },
                )?;
                Ok(Resolved {
                    needs_rebuild,
                    document: nested,
                })
            }
            // Typed values produced by an earlier stage have nothing left to fill
            scalar => Ok(Resolved::fresh(scalar)),
        }
    }

    fn replace_string(
        &self,
        input: &str,
        cycle: &Cycle<'_>,
        legacy: bool,
    ) -> ConfigResult<Resolved> {
        let (needs_rebuild, value) = parse_string(input, false, |acc, name| {
            self.resolve_in_pass(acc, name, cycle, Pass::Static)
        })?;

        let text = match value.into_string() {
            Ok(text) => text,
            Err(document) => {
                return Ok(Resolved {
                    needs_rebuild,
                    document,
                });
            }
        };

        let (needs_rebuild, text) = if legacy {
            let rewritten = self.legacy.replace(
                &text,
                cycle.config,
                cycle.dependencies,
                cycle.built_images,
            )?;
            (needs_rebuild || rewritten.needs_rebuild, rewritten.document.to_string())
        } else {
            (needs_rebuild, text)
        };

        let (needs_rebuild, document) = parse_string(&text, needs_rebuild, |acc, name| {
            self.resolve_in_pass(acc, name, cycle, Pass::Runtime)
        })?;

        Ok(Resolved {
            needs_rebuild,
            document,
        })
    }

    fn resolve_in_pass(
        &self,
        needs_rebuild: bool,
        name: &str,
        cycle: &Cycle<'_>,
        pass: Pass,
    ) -> ConfigResult<(bool, Document)> {
        let resolved = self.resolve_placeholder(name.trim(), cycle, pass)?;
        Ok((needs_rebuild || resolved.needs_rebuild, resolved.document))
    }

    /// Explicit variables first, then runtime variables, otherwise the
    /// placeholder is emitted again for a later stage.
    fn resolve_placeholder(
        &self,
        name: &str,
        cycle: &Cycle<'_>,
        pass: Pass,
    ) -> ConfigResult<Resolved> {
        if !pass.accepts(name) {
            return Ok(deferred(name));
        }

        if let Some(value) = cycle.config.variables().get(name) {
            return Ok(Resolved::fresh(value.clone()));
        }

        if name.starts_with(RUNTIME_PREFIX) {
            return RuntimeVariable::new(
                name,
                cycle.config,
                cycle.dependencies,
                cycle.built_images,
            )
            .load();
        }

        trace!(name = %name, "Leaving placeholder unresolved");
        Ok(deferred(name))
    }
}

impl Default for RuntimeResolver {
    fn default() -> Self {
        Self::new(false)
    }
}

fn deferred(name: &str) -> Resolved {
    Resolved::fresh(format!("${{{}}}", name))
}
