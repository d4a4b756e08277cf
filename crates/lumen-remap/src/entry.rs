//! Per-entry dispatch: one archive entry in, one rewritten entry (or a drop)
//! out. The orchestration layer classifies, fans out, and reassembles.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::inject::inject_constructor;
use crate::manifest::{rewrite_manifest, Manifest, MANIFEST_PATH};
use crate::remapper::Remapper;
use crate::rewrite::rewrite_class;
use crate::services::{rewrite_service_config, ServiceConfig, SERVICES_PREFIX};

/// The generated resource naming abstract-method parameters for decompilers.
pub const ABSTRACT_PARAMETER_NAMES_PATH: &str = "fernflower_abstract_parameter_names.txt";

/// An archive entry, classified by what rewrite applies to it.
#[derive(Debug, Clone)]
pub enum JarEntry {
    Class { name: String, bytes: Vec<u8> },
    Manifest(Manifest),
    ServiceConfig(ServiceConfig),
    Resource { name: String, bytes: Vec<u8> },
}

impl JarEntry {
    pub fn read(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if name == MANIFEST_PATH {
            let text = String::from_utf8_lossy(&bytes);
            return Ok(JarEntry::Manifest(Manifest::parse(&text)?));
        }
        if let Some(service) = name.strip_prefix(SERVICES_PREFIX) {
            if !service.is_empty() && !service.contains('/') {
                let text = String::from_utf8_lossy(&bytes);
                return Ok(JarEntry::ServiceConfig(ServiceConfig::parse(service, &text)));
            }
        }
        if name.ends_with(".class") {
            return Ok(JarEntry::Class {
                name: name.to_string(),
                bytes,
            });
        }
        Ok(JarEntry::Resource {
            name: name.to_string(),
            bytes,
        })
    }

    pub fn into_named_bytes(self) -> (String, Vec<u8>) {
        match self {
            JarEntry::Class { name, bytes } | JarEntry::Resource { name, bytes } => (name, bytes),
            JarEntry::Manifest(manifest) => (MANIFEST_PATH.to_string(), manifest.to_bytes()),
            JarEntry::ServiceConfig(config) => (config.path(), config.to_bytes()),
        }
    }
}

#[derive(Debug)]
pub struct EntryOutcome {
    /// `None` means the entry is dropped from the output.
    pub entry: Option<JarEntry>,
    pub abstract_params: Vec<String>,
}

/// Rewrites one entry. Class entries pass through the rewriting engine and
/// then, when requested, constructor synthesis; each stage produces a new
/// buffer consumed by the next.
pub fn rewrite_entry(
    remapper: &Remapper<'_>,
    entry: JarEntry,
    inject_inits: bool,
) -> Result<EntryOutcome> {
    match entry {
        JarEntry::Class { name, bytes } => {
            let outcome = rewrite_class(remapper, &bytes)?;
            let bytes = if inject_inits {
                inject_constructor(remapper, &outcome.bytes)?
            } else {
                outcome.bytes
            };
            let stem = name.strip_suffix(".class").unwrap_or(&name);
            let mapped = remapper.map_class(stem);
            Ok(EntryOutcome {
                entry: Some(JarEntry::Class {
                    name: format!("{mapped}.class"),
                    bytes,
                }),
                abstract_params: outcome.abstract_params,
            })
        }
        JarEntry::Manifest(manifest) => Ok(EntryOutcome {
            entry: Some(JarEntry::Manifest(rewrite_manifest(remapper, manifest))),
            abstract_params: Vec::new(),
        }),
        JarEntry::ServiceConfig(config) => Ok(EntryOutcome {
            entry: Some(JarEntry::ServiceConfig(rewrite_service_config(
                remapper, config,
            ))),
            abstract_params: Vec::new(),
        }),
        JarEntry::Resource { name, bytes } => Ok(EntryOutcome {
            entry: rewrite_resource(name, bytes),
            abstract_params: Vec::new(),
        }),
    }
}

/// Signature artifacts under `META-INF/` are invalidated by rewriting and
/// dropped; everything else passes through unchanged.
pub fn rewrite_resource(name: String, bytes: Vec<u8>) -> Option<JarEntry> {
    if name.starts_with("META-INF") {
        let extension = name.rsplit('.').next().unwrap_or("");
        if extension == "SF" || extension == "RSA" {
            return None;
        }
    }
    Some(JarEntry::Resource { name, bytes })
}

/// Late-added synthetic resources, to be appended after every entry has been
/// processed. Only non-empty collections produce output; serialization is
/// sorted so the result is independent of processing order.
pub fn generated_resources(abstract_params: &BTreeSet<String>) -> Vec<(String, Vec<u8>)> {
    if abstract_params.is_empty() {
        return Vec::new();
    }
    let data = abstract_params
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes();
    vec![(ABSTRACT_PARAMETER_NAMES_PATH.to_string(), data)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_entries_by_path() {
        assert!(matches!(
            JarEntry::read("a/B.class", vec![]).unwrap(),
            JarEntry::Class { .. }
        ));
        assert!(matches!(
            JarEntry::read("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n".to_vec()).unwrap(),
            JarEntry::Manifest(_)
        ));
        assert!(matches!(
            JarEntry::read("META-INF/services/a.Service", b"a.B\n".to_vec()).unwrap(),
            JarEntry::ServiceConfig(_)
        ));
        assert!(matches!(
            JarEntry::read("assets/logo.png", vec![1, 2]).unwrap(),
            JarEntry::Resource { .. }
        ));
        // A nested path under services/ is not a service file.
        assert!(matches!(
            JarEntry::read("META-INF/services/sub/dir", vec![]).unwrap(),
            JarEntry::Resource { .. }
        ));
    }

    #[test]
    fn drops_signature_artifacts() {
        assert!(rewrite_resource("META-INF/SIGN.SF".to_string(), vec![]).is_none());
        assert!(rewrite_resource("META-INF/SIGN.RSA".to_string(), vec![]).is_none());
        assert!(rewrite_resource("META-INF/LICENSE.txt".to_string(), vec![]).is_some());
        assert!(rewrite_resource("other/SIGN.SF".to_string(), vec![]).is_some());
    }

    #[test]
    fn generated_resources_sort_and_join() {
        let mut params = BTreeSet::new();
        assert!(generated_resources(&params).is_empty());
        params.insert("b/C m ()V".to_string());
        params.insert("a/B m (I)V var1".to_string());
        let resources = generated_resources(&params);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].0, ABSTRACT_PARAMETER_NAMES_PATH);
        assert_eq!(resources[0].1, b"a/B m (I)V var1\nb/C m ()V".to_vec());
    }
}
