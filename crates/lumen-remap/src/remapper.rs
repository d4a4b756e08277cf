use std::collections::HashSet;

use lumen_classfile::{Error as ClassfileError, Result as ClassfileResult};
use lumen_mappings::{MethodMapping, SymbolTable};

use crate::inherit::InheritanceProvider;
use crate::signature;

/// Name-translation rules shared by every rewrite: class names, descriptors,
/// generic signatures, and inheritance-aware member names.
pub struct Remapper<'a> {
    table: &'a SymbolTable,
    inheritance: &'a dyn InheritanceProvider,
}

impl<'a> Remapper<'a> {
    pub fn new(table: &'a SymbolTable, inheritance: &'a dyn InheritanceProvider) -> Self {
        Self { table, inheritance }
    }

    pub fn table(&self) -> &'a SymbolTable {
        self.table
    }

    pub fn inheritance(&self) -> &'a dyn InheritanceProvider {
        self.inheritance
    }

    pub fn map_class(&self, internal_name: &str) -> String {
        self.table.map_class(internal_name)
    }

    pub fn unmap_class(&self, internal_name: &str) -> String {
        self.table.unmap_class(internal_name)
    }

    /// Maps the payload of a Class constant, which is an internal name or,
    /// for array classes, a field descriptor.
    pub fn map_type(&self, name: &str) -> ClassfileResult<String> {
        if name.starts_with('[') {
            self.map_field_desc(name)
        } else {
            Ok(self.map_class(name))
        }
    }

    pub fn map_field_desc(&self, desc: &str) -> ClassfileResult<String> {
        let mut out = String::with_capacity(desc.len());
        let mut rest = desc;
        while let Some(stripped) = rest.strip_prefix('[') {
            out.push('[');
            rest = stripped;
        }
        match rest.as_bytes().first().copied() {
            Some(b'L') => {
                let end = rest
                    .find(';')
                    .ok_or_else(|| ClassfileError::InvalidDescriptor(desc.to_string()))?;
                out.push('L');
                out.push_str(&self.map_class(&rest[1..end]));
                out.push(';');
                if end + 1 != rest.len() {
                    return Err(ClassfileError::InvalidDescriptor(desc.to_string()));
                }
            }
            Some(b) if rest.len() == 1 && b"BCDFIJSZ".contains(&b) => out.push_str(rest),
            _ => return Err(ClassfileError::InvalidDescriptor(desc.to_string())),
        }
        Ok(out)
    }

    pub fn map_method_desc(&self, desc: &str) -> ClassfileResult<String> {
        let parsed = lumen_classfile::parse_method_descriptor(desc)?;
        let mut out = String::with_capacity(desc.len());
        out.push('(');
        for param in &parsed.params {
            out.push_str(&self.map_field_desc(&param.descriptor())?);
        }
        out.push(')');
        match &parsed.return_type {
            lumen_classfile::ReturnType::Void => out.push('V'),
            lumen_classfile::ReturnType::Type(ty) => {
                out.push_str(&self.map_field_desc(&ty.descriptor())?)
            }
        }
        Ok(out)
    }

    pub fn map_signature(&self, sig: &str) -> ClassfileResult<String> {
        signature::remap_signature(self, sig)
    }

    pub fn map_field_name(&self, owner: &str, name: &str) -> String {
        if owner.starts_with('[') {
            return name.to_string();
        }
        let mut visited = HashSet::new();
        self.find_field(owner, name, &mut visited)
            .unwrap_or_else(|| name.to_string())
    }

    pub fn map_method_name(&self, owner: &str, name: &str, descriptor: &str) -> String {
        if owner.starts_with('[') || name == "<init>" || name == "<clinit>" {
            return name.to_string();
        }
        match self.find_method(owner, name, descriptor) {
            Some(mapping) => mapping.deobf.clone(),
            None => name.to_string(),
        }
    }

    /// Parameter-name lookup for (owner, method, descriptor, slot), walking
    /// the inheritance graph like member-name lookups do.
    pub fn map_param_name(
        &self,
        owner: &str,
        method: &str,
        descriptor: &str,
        slot: u16,
    ) -> Option<String> {
        self.find_method(owner, method, descriptor)
            .and_then(|mapping| mapping.param(slot))
            .map(str::to_string)
    }

    /// The symbol-table entry for a method, completed through the superclass
    /// and interface graph: a miss on the owner consults each parent in
    /// declaration order.
    pub fn find_method(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<&'a MethodMapping> {
        let mut visited = HashSet::new();
        self.find_method_inner(owner, name, descriptor, &mut visited)
    }

    fn find_method_inner(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        visited: &mut HashSet<String>,
    ) -> Option<&'a MethodMapping> {
        if !visited.insert(owner.to_string()) {
            return None;
        }
        if let Some(mapping) = self.table.method(owner, name, descriptor) {
            return Some(mapping);
        }
        let info = self.inheritance.class_info(owner)?;
        if let Some(parent) = &info.super_class {
            if let Some(mapping) = self.find_method_inner(parent, name, descriptor, visited) {
                return Some(mapping);
            }
        }
        for interface in &info.interfaces {
            if let Some(mapping) = self.find_method_inner(interface, name, descriptor, visited) {
                return Some(mapping);
            }
        }
        None
    }

    fn find_field(
        &self,
        owner: &str,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if !visited.insert(owner.to_string()) {
            return None;
        }
        if let Some(mapped) = self.table.field(owner, name) {
            return Some(mapped.to_string());
        }
        let info = self.inheritance.class_info(owner)?;
        if let Some(parent) = &info.super_class {
            if let Some(mapped) = self.find_field(parent, name, visited) {
                return Some(mapped);
            }
        }
        for interface in &info.interfaces {
            if let Some(mapped) = self.find_field(interface, name, visited) {
                return Some(mapped);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inherit::{ClassInfo, NoInheritance};
    use lumen_mappings::parse_tsrg2;
    use std::sync::Arc;

    struct OneParent {
        child: &'static str,
        parent: &'static str,
    }

    impl InheritanceProvider for OneParent {
        fn class_info(&self, internal_name: &str) -> Option<Arc<ClassInfo>> {
            (internal_name == self.child).then(|| {
                Arc::new(ClassInfo {
                    name: self.child.to_string(),
                    super_class: Some(self.parent.to_string()),
                    interfaces: Vec::new(),
                    methods: Vec::new(),
                })
            })
        }
    }

    fn table() -> SymbolTable {
        parse_tsrg2(
            "tsrg2 obf deobf\na/B b/C\n\tfd health\n\tmd (La/B;)La/B; tick\nd/Sub e/Sub\n",
        )
        .unwrap()
    }

    #[test]
    fn maps_descriptors_through_class_names() {
        let table = table();
        let remapper = Remapper::new(&table, &NoInheritance);
        assert_eq!(remapper.map_field_desc("[La/B;").unwrap(), "[Lb/C;");
        assert_eq!(
            remapper.map_method_desc("(ILa/B;)La/B;").unwrap(),
            "(ILb/C;)Lb/C;"
        );
        assert_eq!(remapper.map_type("[[La/B;").unwrap(), "[[Lb/C;");
        assert_eq!(remapper.map_type("a/B").unwrap(), "b/C");
    }

    #[test]
    fn member_lookup_walks_superclasses() {
        let table = table();
        let provider = OneParent {
            child: "d/Sub",
            parent: "a/B",
        };
        let remapper = Remapper::new(&table, &provider);
        // d/Sub declares no mapping for md; the walk finds a/B's.
        assert_eq!(
            remapper.map_method_name("d/Sub", "md", "(La/B;)La/B;"),
            "tick"
        );
        assert_eq!(remapper.map_field_name("d/Sub", "fd"), "health");
        // Constructors never rename.
        assert_eq!(remapper.map_method_name("a/B", "<init>", "()V"), "<init>");
    }

    #[test]
    fn lookup_survives_inheritance_cycles() {
        let table = table();
        let provider = OneParent {
            child: "x/Loop",
            parent: "x/Loop",
        };
        let remapper = Remapper::new(&table, &provider);
        assert_eq!(remapper.map_method_name("x/Loop", "m", "()V"), "m");
    }
}
