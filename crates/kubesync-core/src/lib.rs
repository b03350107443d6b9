//! Core types and traits for the kubesync development tool.
//!
//! This crate contains:
//! - The nested configuration document model
//! - Project, dependency and image traits consumed by the resolver
//! - Built-image snapshots and image selectors

pub mod document;
pub mod project;

pub use document::{Document, Mapping, Scalar};
pub use project::{BuiltImages, Config, Dependency, ImageConfig, ImageSelector, Variables};
