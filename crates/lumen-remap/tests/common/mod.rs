//! Hand-assembled class files for exercising the rewriting engine against
//! known byte layouts.

// Each integration-test binary compiles its own copy; not all of them use
// every helper.
#![allow(dead_code)]

use lumen_classfile::attributes::CodeAttribute;
use lumen_classfile::{Attribute, ClassFile, Constant, ConstantPool, Member};

pub struct ClassBuilder {
    pub class: ClassFile,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut pool = ConstantPool::default();
        let this_class = pool.add_class(name).unwrap();
        let super_class = pool.add_class(super_name).unwrap();
        Self {
            class: ClassFile {
                minor_version: 0,
                major_version: 52,
                pool,
                access_flags: 0x0021,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.class.access_flags = flags;
        self
    }

    pub fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        let name = self.class.pool.add_utf8(name).unwrap();
        let descriptor = self.class.pool.add_utf8(descriptor).unwrap();
        self.class.fields.push(Member {
            access_flags,
            name,
            descriptor,
            attributes: Vec::new(),
        });
        self
    }

    pub fn method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> Self {
        let name = self.class.pool.add_utf8(name).unwrap();
        let descriptor = self.class.pool.add_utf8(descriptor).unwrap();
        self.class.methods.push(Member {
            access_flags,
            name,
            descriptor,
            attributes,
        });
        self
    }

    /// A `Code` attribute with the given bytecode and nested attributes.
    pub fn code_attribute(
        pool: &mut ConstantPool,
        code: Vec<u8>,
        attributes: Vec<Attribute>,
    ) -> Attribute {
        let info = CodeAttribute {
            max_stack: 4,
            max_locals: 8,
            code,
            exception_table: Vec::new(),
            attributes,
        }
        .to_bytes();
        Attribute {
            name: pool.add_utf8("Code").unwrap(),
            info,
        }
    }

    pub fn attribute(mut self, name: &str, info: Vec<u8>) -> Self {
        let name = self.class.pool.add_utf8(name).unwrap();
        self.class.attributes.push(Attribute { name, info });
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.class.to_bytes()
    }
}

/// Finds the single InvokeDynamic constant in a parsed class.
pub fn find_invoke_dynamic(class: &ClassFile) -> (u16, u16) {
    for (_, entry) in class.pool.entries() {
        if let Constant::InvokeDynamic {
            bootstrap_method,
            name_and_type,
        } = entry
        {
            return (*bootstrap_method, *name_and_type);
        }
    }
    panic!("no InvokeDynamic constant");
}

pub fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
