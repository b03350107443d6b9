//! Project configuration and variable resolution for kubesync.
//!
//! This crate handles:
//! - Project definitions (kubesync.kdl)
//! - Document walking and `${...}` placeholder parsing
//! - Runtime variables computed from build and dependency state
//! - Legacy `image()`/`tag()` helpers and `$(...)` expressions
//! - The multi-pass resolver that reports when a rebuild is needed

pub mod error;
pub mod expression;
pub mod legacy;
pub mod placeholder;
pub mod project;
pub mod runtime;
pub mod walk;

pub use error::{ConfigError, ConfigResult, ExpressionError, RuntimeVariableError};
pub use expression::{ExpressionOptions, ExpressionResolver, ShellExpressionResolver};
pub use legacy::{LegacyHelpers, LegacyReplacer};
pub use project::{ProjectConfig, ResolvedDependency, load_project, parse_project};
pub use runtime::{Resolved, RuntimeResolver, RuntimeVariable};
