//! The rewriting core: class-file renaming, constructor synthesis, and the
//! narrow rewrites for manifests, service-provider configurations, and
//! generic resources, dispatched per archive entry.

mod entry;
mod error;
mod inherit;
mod inject;
mod manifest;
mod remapper;
mod rewrite;
mod services;
mod signature;

pub use crate::entry::{
    generated_resources, rewrite_entry, rewrite_resource, EntryOutcome, JarEntry,
    ABSTRACT_PARAMETER_NAMES_PATH,
};
pub use crate::error::{RemapError, Result};
pub use crate::inherit::{ClassInfo, InheritanceProvider, MethodInfo, NoInheritance, Provenance};
pub use crate::inject::{inject_constructor, MARKER_MESSAGE};
pub use crate::manifest::{rewrite_manifest, Manifest, ManifestSection, MANIFEST_PATH};
pub use crate::remapper::Remapper;
pub use crate::rewrite::{rewrite_class, RewriteOutcome};
pub use crate::services::{rewrite_service_config, ServiceConfig, SERVICES_PREFIX};
