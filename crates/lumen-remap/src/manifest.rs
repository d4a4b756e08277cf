//! JAR manifest parsing, rewriting, and 72-byte-wrapped serialization.

use crate::error::{RemapError, Result};
use crate::remapper::Remapper;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const MAIN_CLASS: &str = "Main-Class";
const SHA_256_DIGEST: &str = "SHA-256-Digest";

/// Attribute order is preserved from the source; JAR attribute names compare
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub main: Vec<(String, String)>,
    pub sections: Vec<ManifestSection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSection {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
            } else if let Some(continuation) = line.strip_prefix(' ') {
                let last = current
                    .last_mut()
                    .ok_or(RemapError::Manifest("continuation line without attribute"))?;
                last.push_str(continuation);
            } else {
                current.push(line.to_string());
            }
        }
        if !current.is_empty() {
            blocks.push(current);
        }

        let mut blocks = blocks.into_iter();
        let main = match blocks.next() {
            Some(block) => parse_attributes(&block)?,
            None => Vec::new(),
        };

        let mut sections = Vec::new();
        for block in blocks {
            let mut attributes = parse_attributes(&block)?;
            if attributes.is_empty() || !attributes[0].0.eq_ignore_ascii_case("Name") {
                return Err(RemapError::Manifest("section without Name attribute"));
            }
            let (_, name) = attributes.remove(0);
            sections.push(ManifestSection { name, attributes });
        }

        Ok(Self { main, sections })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.main {
            write_attribute(&mut out, key, value);
        }
        out.extend_from_slice(b"\r\n");
        for section in &self.sections {
            write_attribute(&mut out, "Name", &section.name);
            for (key, value) in &section.attributes {
                write_attribute(&mut out, key, value);
            }
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    pub fn main_attribute(&self, key: &str) -> Option<&str> {
        self.main
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_attributes(block: &[String]) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::with_capacity(block.len());
    for line in block {
        let colon = line
            .find(':')
            .ok_or(RemapError::Manifest("attribute line without separator"))?;
        let key = line[..colon].to_string();
        let value = line[colon + 1..].strip_prefix(' ').unwrap_or(&line[colon + 1..]);
        attributes.push((key, value.to_string()));
    }
    Ok(attributes)
}

/// One attribute line, folded so no physical line exceeds 72 bytes.
fn write_attribute(out: &mut Vec<u8>, key: &str, value: &str) {
    let mut line = format!("{key}: {value}").into_bytes();
    let mut index = 72;
    while index < line.len() {
        line.splice(index..index, *b"\r\n ");
        index += 74;
    }
    out.extend_from_slice(&line);
    out.extend_from_slice(b"\r\n");
}

/// Remaps the main-entry-point attribute and strips per-section content
/// digests, which rewriting invalidates; a section emptied by the removal is
/// dropped entirely.
pub fn rewrite_manifest(remapper: &Remapper<'_>, mut manifest: Manifest) -> Manifest {
    for (key, value) in &mut manifest.main {
        if key.eq_ignore_ascii_case(MAIN_CLASS) {
            let internal = value.replace('.', "/");
            *value = remapper.map_class(&internal).replace('/', ".");
        }
    }

    manifest.sections.retain_mut(|section| {
        let before = section.attributes.len();
        section
            .attributes
            .retain(|(key, _)| !key.eq_ignore_ascii_case(SHA_256_DIGEST));
        let removed = section.attributes.len() != before;
        !(removed && section.attributes.is_empty())
    });

    manifest
}
