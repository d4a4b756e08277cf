use std::collections::{BTreeMap, HashMap};

/// The symbol table: obfuscated → deobfuscated names for classes, fields,
/// methods, and method parameters, plus the reverse class index.
///
/// Built once by the parser; immutable (and freely shared across threads)
/// afterwards.
#[derive(Debug, Default)]
pub struct SymbolTable {
    classes: HashMap<String, ClassMapping>,
    reverse: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct ClassMapping {
    pub deobf: String,
    fields: HashMap<String, FieldMapping>,
    methods: HashMap<MemberKey, MethodMapping>,
}

#[derive(Debug)]
pub struct FieldMapping {
    pub deobf: String,
    /// Present for the three-column field form; informational only, lookups
    /// are keyed by name.
    pub descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Default)]
pub struct MethodMapping {
    pub deobf: String,
    /// Sparse map from local-variable slot to deobfuscated parameter name.
    params: BTreeMap<u16, String>,
}

impl MethodMapping {
    pub fn param(&self, slot: u16) -> Option<&str> {
        self.params.get(&slot).map(String::as_str)
    }
}

impl SymbolTable {
    /// Direct class lookup, no inner-class fallback.
    pub fn class(&self, obf: &str) -> Option<&str> {
        self.classes.get(obf).map(|c| c.deobf.as_str())
    }

    /// Reverse class lookup (deobfuscated → obfuscated), no fallback.
    pub fn class_reverse(&self, deobf: &str) -> Option<&str> {
        self.reverse.get(deobf).map(String::as_str)
    }

    /// Maps a class name, falling back to mapping the outer-class prefix of a
    /// `Outer$Inner` name when the full name has no entry.
    pub fn map_class(&self, obf: &str) -> String {
        self.map_with(obf, &|name| self.class(name))
    }

    /// The reverse of [`map_class`], with the same inner-class fallback.
    ///
    /// [`map_class`]: SymbolTable::map_class
    pub fn unmap_class(&self, deobf: &str) -> String {
        self.map_with(deobf, &|name| self.class_reverse(name))
    }

    fn map_with<'a>(&self, name: &str, lookup: &dyn Fn(&str) -> Option<&'a str>) -> String {
        if let Some(mapped) = lookup(name) {
            return mapped.to_string();
        }
        if let Some(split) = name.rfind('$') {
            let outer = self.map_with(&name[..split], lookup);
            if outer != name[..split] {
                return format!("{outer}${}", &name[split + 1..]);
            }
        }
        name.to_string()
    }

    pub fn field(&self, owner: &str, name: &str) -> Option<&str> {
        self.classes
            .get(owner)?
            .fields
            .get(name)
            .map(|f| f.deobf.as_str())
    }

    pub fn method(&self, owner: &str, name: &str, descriptor: &str) -> Option<&MethodMapping> {
        self.classes.get(owner)?.methods.get(&MemberKey {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    pub fn param(&self, owner: &str, name: &str, descriptor: &str, slot: u16) -> Option<&str> {
        self.method(owner, name, descriptor)?.param(slot)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub(crate) fn insert_class(&mut self, obf: &str, deobf: &str) {
        let entry = self.classes.entry(obf.to_string()).or_default();
        entry.deobf = deobf.to_string();
        self.reverse.insert(deobf.to_string(), obf.to_string());
    }

    pub(crate) fn insert_field(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: Option<&str>,
        deobf: &str,
    ) {
        self.owner_entry(owner).fields.insert(
            name.to_string(),
            FieldMapping {
                deobf: deobf.to_string(),
                descriptor: descriptor.map(str::to_string),
            },
        );
    }

    pub(crate) fn insert_method(&mut self, owner: &str, name: &str, descriptor: &str, deobf: &str) {
        let entry = self
            .owner_entry(owner)
            .methods
            .entry(MemberKey {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
            .or_default();
        entry.deobf = deobf.to_string();
    }

    pub(crate) fn insert_param(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        slot: u16,
        deobf: &str,
    ) {
        let entry = self
            .owner_entry(owner)
            .methods
            .entry(MemberKey {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
            .or_default();
        entry.params.insert(slot, deobf.to_string());
    }

    fn owner_entry(&mut self, owner: &str) -> &mut ClassMapping {
        let entry = self.classes.entry(owner.to_string()).or_default();
        if entry.deobf.is_empty() {
            // Member mapping for a class that has no rename of its own.
            entry.deobf = owner.to_string();
        }
        entry
    }
}
