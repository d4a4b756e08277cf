use std::sync::Arc;

/// Answers "what does class X extend/implement, and what methods does it
/// declare". Implementations are synchronous, side-effect-free lookups; any
/// caching is their own concern.
pub trait InheritanceProvider: Sync {
    fn class_info(&self, internal_name: &str) -> Option<Arc<ClassInfo>>;
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub provenance: Provenance,
}

/// Whether a method inventory entry is the class's own declaration or was
/// flattened in from a parent. Absence from the inventory means absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Declared,
    Inherited,
}

impl ClassInfo {
    pub fn declared_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods
            .iter()
            .filter(|m| m.provenance == Provenance::Declared)
    }
}

/// A provider that knows nothing; lookups miss and member-mapping walks stop
/// at the queried class.
pub struct NoInheritance;

impl InheritanceProvider for NoInheritance {
    fn class_info(&self, _internal_name: &str) -> Option<Arc<ClassInfo>> {
        None
    }
}
