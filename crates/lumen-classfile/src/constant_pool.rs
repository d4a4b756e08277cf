use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::mutf8;
use crate::reader::Reader;

/// One constant-pool entry. Cross-references are stored as raw 1-based pool
/// indices, exactly as on disk. `Utf8` keeps the raw modified-UTF-8 payload so
/// constants the rewriter never touches round-trip byte-identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { utf8: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap_method: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap_method: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// Phantom second slot occupied by a `Long` or `Double` entry.
    Wide,
}

impl Constant {
    fn kind(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::FieldRef { .. } => "Fieldref",
            Constant::MethodRef { .. } => "Methodref",
            Constant::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
            Constant::Wide => "<wide slot>",
        }
    }
}

/// The constant pool of one class, 1-based like the on-disk format.
///
/// Editing is append-only: existing entries are never rewritten in place, new
/// entries are deduplicated against the pool, and indices handed out earlier
/// stay valid. This is what lets instruction bytes be copied verbatim through
/// a rewrite.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    utf8_cache: Option<HashMap<Vec<u8>, u16>>,
}

impl ConstantPool {
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()?;
        let mut entries = Vec::with_capacity(count.saturating_sub(1) as usize);
        let mut index = 1u16;
        while index < count {
            let tag = reader.read_u1()?;
            let constant = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    Constant::Utf8(reader.read_bytes(len)?.to_vec())
                }
                3 => Constant::Integer(reader.read_u4()?),
                4 => Constant::Float(reader.read_u4()?),
                5 => Constant::Long(reader.read_u8()?),
                6 => Constant::Double(reader.read_u8()?),
                7 => Constant::Class {
                    name: reader.read_u2()?,
                },
                8 => Constant::String {
                    utf8: reader.read_u2()?,
                },
                9 => Constant::FieldRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                10 => Constant::MethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                12 => Constant::NameAndType {
                    name: reader.read_u2()?,
                    descriptor: reader.read_u2()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.read_u1()?,
                    reference: reader.read_u2()?,
                },
                16 => Constant::MethodType {
                    descriptor: reader.read_u2()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_method: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_method: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                19 => Constant::Module {
                    name: reader.read_u2()?,
                },
                20 => Constant::Package {
                    name: reader.read_u2()?,
                },
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            index += 1;
            if wide {
                entries.push(Constant::Wide);
                index += 1;
            }
        }
        Ok(Self {
            entries,
            utf8_cache: None,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16 + 1).to_be_bytes());
        for entry in &self.entries {
            match entry {
                Constant::Utf8(bytes) => {
                    out.push(1);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Float(v) => {
                    out.push(4);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(6);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class { name } => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::String { utf8 } => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => {
                    out.push(9);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(10);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(11);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    out.extend_from_slice(&reference.to_be_bytes());
                }
                Constant::MethodType { descriptor } => {
                    out.push(16);
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::Dynamic {
                    bootstrap_method,
                    name_and_type,
                } => {
                    out.push(17);
                    out.extend_from_slice(&bootstrap_method.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::InvokeDynamic {
                    bootstrap_method,
                    name_and_type,
                } => {
                    out.push(18);
                    out.extend_from_slice(&bootstrap_method.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::Module { name } => {
                    out.push(19);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::Package { name } => {
                    out.push(20);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::Wide => {}
            }
        }
    }

    /// Number of pool slots including the phantom index 0, i.e. the on-disk
    /// `constant_pool_count`.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16 + 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        if index == 0 {
            return Err(Error::InvalidConstantPoolIndex(index));
        }
        self.entries
            .get(index as usize - 1)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub fn entries(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16 + 1, c))
    }

    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(bytes),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<String> {
        mutf8::decode(self.utf8_bytes(index)?)
    }

    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "NameAndType",
                found: other.kind(),
            }),
        }
    }

    /// Replaces the constant at `index`, keeping its slot. Used to repoint an
    /// entry's cross-references at freshly interned constants. Utf8 entries
    /// must never be replaced; the intern cache assumes they are stable.
    pub fn set(&mut self, index: u16, constant: Constant) -> Result<()> {
        if index == 0 || index as usize > self.entries.len() {
            return Err(Error::InvalidConstantPoolIndex(index));
        }
        let slot = &mut self.entries[index as usize - 1];
        debug_assert!(!matches!(slot, Constant::Utf8(_)));
        *slot = constant;
        Ok(())
    }

    fn push(&mut self, constant: Constant) -> Result<u16> {
        let index = self.entries.len() + 1;
        if index > u16::MAX as usize {
            return Err(Error::MalformedAttribute("constant pool overflow"));
        }
        if let (Constant::Utf8(bytes), Some(cache)) = (&constant, self.utf8_cache.as_mut()) {
            cache.insert(bytes.clone(), index as u16);
        }
        self.entries.push(constant);
        Ok(index as u16)
    }

    /// Interns a string, reusing any existing Utf8 entry with the same bytes.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = mutf8::encode(value);
        if self.utf8_cache.is_none() {
            let mut cache = HashMap::new();
            for (index, entry) in self.entries.iter().enumerate() {
                if let Constant::Utf8(existing) = entry {
                    // First occurrence wins so repeated runs intern identically.
                    cache
                        .entry(existing.clone())
                        .or_insert(index as u16 + 1);
                }
            }
            self.utf8_cache = Some(cache);
        }
        if let Some(cache) = &self.utf8_cache {
            if let Some(&index) = cache.get(&bytes) {
                return Ok(index);
            }
        }
        self.push(Constant::Utf8(bytes))
    }

    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.find_or_push(Constant::Class { name: name_index })
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let utf8 = self.add_utf8(value)?;
        self.find_or_push(Constant::String { utf8 })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.find_or_push(Constant::NameAndType { name, descriptor })
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(class)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(class)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    /// Interns an arbitrary constant by structural equality. Prefer the
    /// typed helpers; `Wide` slots cannot be added directly.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        match constant {
            Constant::Utf8(bytes) => {
                // Route through the intern cache.
                let decoded = mutf8::decode(&bytes)?;
                self.add_utf8(&decoded)
            }
            Constant::Wide => Err(Error::InvalidConstantPoolTag(0)),
            other => self.find_or_push(other),
        }
    }

    fn find_or_push(&mut self, constant: Constant) -> Result<u16> {
        for (index, entry) in self.entries.iter().enumerate() {
            if *entry == constant {
                return Ok(index as u16 + 1);
            }
        }
        self.push(constant)
    }
}
