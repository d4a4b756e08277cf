use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// An editable structural model of one class file.
///
/// Built in a single forward decode pass and written back out by a separate
/// emission pass. Names, descriptors, and attribute cross-references are kept
/// as constant-pool indices; attribute payloads are kept raw and decoded on
/// demand by whoever needs to look inside them.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// 0 for `java/lang/Object` and module-info.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub access_flags: u16,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: u16,
    pub info: Vec<u8>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFE_BABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(reader.read_u2()?);
        }

        let fields = parse_members(&mut reader)?;
        let methods = parse_members(&mut reader)?;
        let attributes = parse_attributes(&mut reader)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.pool.write(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out
    }

    pub fn this_class_name(&self) -> Result<String> {
        self.pool.class_name(self.this_class)
    }

    pub fn super_class_name(&self) -> Result<Option<String>> {
        if self.super_class == 0 {
            Ok(None)
        } else {
            Ok(Some(self.pool.class_name(self.super_class)?))
        }
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .iter()
            .map(|&idx| self.pool.class_name(idx))
            .collect()
    }
}

impl Member {
    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.name)
    }

    pub fn descriptor(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.descriptor)
    }
}

/// Finds an attribute by name within a member's or class's attribute list.
pub fn find_attribute<'a>(
    attributes: &'a [Attribute],
    pool: &ConstantPool,
    name: &str,
) -> Option<&'a Attribute> {
    attributes
        .iter()
        .find(|attr| pool.utf8_bytes(attr.name).map_or(false, |b| b == name.as_bytes()))
}

fn parse_members(reader: &mut Reader<'_>) -> Result<Vec<Member>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name = reader.read_u2()?;
        let descriptor = reader.read_u2()?;
        let attributes = parse_attributes(reader)?;
        members.push(Member {
            access_flags,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

pub(crate) fn parse_attributes(reader: &mut Reader<'_>) -> Result<Vec<Attribute>> {
    let count = reader.read_u2()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?.to_vec();
        attributes.push(Attribute { name, info });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[Member]) {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for member in members {
        out.extend_from_slice(&member.access_flags.to_be_bytes());
        out.extend_from_slice(&member.name.to_be_bytes());
        out.extend_from_slice(&member.descriptor.to_be_bytes());
        write_attributes(out, &member.attributes);
    }
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attr in attributes {
        out.extend_from_slice(&attr.name.to_be_bytes());
        out.extend_from_slice(&(attr.info.len() as u32).to_be_bytes());
        out.extend_from_slice(&attr.info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assembles a minimal class by hand: `class a/B extends java/lang/Object`
    /// with one `int` field `x`.
    fn minimal_class_bytes() -> Vec<u8> {
        fn push_u16(out: &mut Vec<u8>, value: u16) {
            out.extend_from_slice(&value.to_be_bytes());
        }
        fn push_utf8(out: &mut Vec<u8>, s: &str) {
            out.push(1);
            push_u16(out, s.len() as u16);
            out.extend_from_slice(s.as_bytes());
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        push_u16(&mut out, 0); // minor
        push_u16(&mut out, 52); // major (Java 8)
        push_u16(&mut out, 7); // constant_pool_count
        push_utf8(&mut out, "a/B"); // 1
        out.push(7); // 2: Class(1)
        push_u16(&mut out, 1);
        push_utf8(&mut out, "java/lang/Object"); // 3
        out.push(7); // 4: Class(3)
        push_u16(&mut out, 3);
        push_utf8(&mut out, "x"); // 5
        push_utf8(&mut out, "I"); // 6
        push_u16(&mut out, 0x0021); // access
        push_u16(&mut out, 2); // this
        push_u16(&mut out, 4); // super
        push_u16(&mut out, 0); // interfaces
        push_u16(&mut out, 1); // fields
        push_u16(&mut out, 0x0002);
        push_u16(&mut out, 5);
        push_u16(&mut out, 6);
        push_u16(&mut out, 0); // field attributes
        push_u16(&mut out, 0); // methods
        push_u16(&mut out, 0); // class attributes
        out
    }

    #[test]
    fn parse_and_emit_round_trips() {
        let bytes = minimal_class_bytes();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.this_class_name().unwrap(), "a/B");
        assert_eq!(
            class.super_class_name().unwrap().as_deref(),
            Some("java/lang/Object")
        );
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].name(&class.pool).unwrap(), "x");
        assert_eq!(class.to_bytes(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_class_bytes();
        bytes[0] = 0;
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = minimal_class_bytes();
        bytes.push(0);
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(Error::TrailingBytes(1))
        ));
    }
}
