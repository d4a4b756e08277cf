//! A classpath-backed [`InheritanceProvider`]: answers superclass, interface,
//! and declared-method queries by reading class files out of JARs and class
//! directories, in classpath order (first hit wins).
//!
//! Lookups are lazy and cached, including negative results; a class that
//! fails to decode is treated as absent rather than failing the query, since
//! resolution misses are not errors for the consumers of this interface.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use lumen_classfile::ClassFile;
use lumen_remap::{ClassInfo, InheritanceProvider, MethodInfo, Provenance};

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("not a jar or class directory: {0}")]
    UnsupportedEntry(PathBuf),
}

enum Source {
    Jar {
        path: PathBuf,
        archive: Mutex<ZipArchive<File>>,
    },
    /// An exploded class directory with an eagerly enumerated class set, so
    /// misses never touch the filesystem.
    Dir {
        root: PathBuf,
        classes: Vec<String>,
    },
}

#[derive(Default)]
pub struct ClasspathInheritance {
    sources: Vec<Source>,
    cache: RwLock<HashMap<String, Option<Arc<ClassInfo>>>>,
}

impl ClasspathInheritance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a JAR or class directory to the search path.
    pub fn add_path(&mut self, path: &Path) -> Result<(), ClasspathError> {
        if path.is_dir() {
            self.add_dir(path)
        } else if path.is_file() {
            self.add_jar(path)
        } else {
            Err(ClasspathError::UnsupportedEntry(path.to_path_buf()))
        }
    }

    pub fn add_jar(&mut self, path: &Path) -> Result<(), ClasspathError> {
        let archive = ZipArchive::new(File::open(path)?)?;
        debug!("classpath += jar {}", path.display());
        self.sources.push(Source::Jar {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
        });
        Ok(())
    }

    pub fn add_dir(&mut self, path: &Path) -> Result<(), ClasspathError> {
        let mut classes = Vec::new();
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file()
                || entry.path().extension() != Some(OsStr::new("class"))
            {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(path) {
                let name = relative.with_extension("");
                let mut internal = String::new();
                for component in name.components() {
                    if !internal.is_empty() {
                        internal.push('/');
                    }
                    internal.push_str(&component.as_os_str().to_string_lossy());
                }
                classes.push(internal);
            }
        }
        debug!(
            "classpath += dir {} ({} classes)",
            path.display(),
            classes.len()
        );
        self.sources.push(Source::Dir {
            root: path.to_path_buf(),
            classes,
        });
        Ok(())
    }

    fn read_class(&self, internal_name: &str) -> Option<Vec<u8>> {
        let entry_name = format!("{internal_name}.class");
        for source in &self.sources {
            match source {
                Source::Jar { path, archive } => {
                    let mut archive = archive.lock().unwrap();
                    match archive.by_name(&entry_name) {
                        Ok(mut entry) => {
                            let mut buf = Vec::with_capacity(entry.size() as usize);
                            if entry.read_to_end(&mut buf).is_ok() {
                                return Some(buf);
                            }
                            debug!("failed to read {entry_name} from {}", path.display());
                        }
                        Err(zip::result::ZipError::FileNotFound) => {}
                        Err(err) => {
                            debug!("zip error for {entry_name} in {}: {err}", path.display());
                        }
                    };
                }
                Source::Dir { root, classes } => {
                    if classes.iter().any(|c| c == internal_name) {
                        if let Ok(buf) = std::fs::read(root.join(&entry_name)) {
                            return Some(buf);
                        }
                    }
                }
            }
        }
        None
    }

    fn load(&self, internal_name: &str) -> Option<Arc<ClassInfo>> {
        let bytes = self.read_class(internal_name)?;
        let class = match ClassFile::parse(&bytes) {
            Ok(class) => class,
            Err(err) => {
                debug!("undecodable class {internal_name}: {err}");
                return None;
            }
        };
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(MethodInfo {
                name: method.name(&class.pool).ok()?,
                descriptor: method.descriptor(&class.pool).ok()?,
                access_flags: method.access_flags,
                provenance: Provenance::Declared,
            });
        }
        Some(Arc::new(ClassInfo {
            name: class.this_class_name().ok()?,
            super_class: class.super_class_name().ok()?,
            interfaces: class.interface_names().ok()?,
            methods,
        }))
    }
}

impl InheritanceProvider for ClasspathInheritance {
    fn class_info(&self, internal_name: &str) -> Option<Arc<ClassInfo>> {
        if let Some(cached) = self.cache.read().unwrap().get(internal_name) {
            return cached.clone();
        }
        let info = self.load(internal_name);
        let mut cache = self.cache.write().unwrap();
        cache
            .entry(internal_name.to_string())
            .or_insert(info)
            .clone()
    }
}
