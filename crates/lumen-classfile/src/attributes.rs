//! Typed views over attribute payloads the rewriter needs to look inside.
//!
//! Each view parses one attribute's `info` bytes and serializes back to an
//! identical layout; swapping constant-pool indices never changes payload
//! lengths, so enclosing attribute headers stay valid.

use crate::classfile::{parse_attributes, write_attributes, Attribute};
use crate::error::{Error, Result};
use crate::reader::Reader;

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl CodeAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let max_stack = reader.read_u2()?;
        let max_locals = reader.read_u2()?;
        let code_length = reader.read_u4()? as usize;
        let code = reader.read_bytes(code_length)?.to_vec();
        let handler_count = reader.read_u2()? as usize;
        let mut exception_table = Vec::with_capacity(handler_count);
        for _ in 0..handler_count {
            exception_table.push(ExceptionHandler {
                start_pc: reader.read_u2()?,
                end_pc: reader.read_u2()?,
                handler_pc: reader.read_u2()?,
                catch_type: reader.read_u2()?,
            });
        }
        let attributes = parse_attributes(&mut reader)?;
        reader.ensure_empty()?;
        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.max_stack.to_be_bytes());
        out.extend_from_slice(&self.max_locals.to_be_bytes());
        out.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.code);
        out.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for handler in &self.exception_table {
            out.extend_from_slice(&handler.start_pc.to_be_bytes());
            out.extend_from_slice(&handler.end_pc.to_be_bytes());
            out.extend_from_slice(&handler.handler_pc.to_be_bytes());
            out.extend_from_slice(&handler.catch_type.to_be_bytes());
        }
        write_attributes(&mut out, &self.attributes);
        out
    }
}

/// `LocalVariableTable` and `LocalVariableTypeTable` share this layout; the
/// `descriptor` field holds the signature index for the latter.
#[derive(Debug, Clone)]
pub struct LocalVariableTable {
    pub entries: Vec<LocalVariableEntry>,
}

#[derive(Debug, Clone)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name: u16,
    pub descriptor: u16,
    pub index: u16,
}

impl LocalVariableTable {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(LocalVariableEntry {
                start_pc: reader.read_u2()?,
                length: reader.read_u2()?,
                name: reader.read_u2()?,
                descriptor: reader.read_u2()?,
                index: reader.read_u2()?,
            });
        }
        reader.ensure_empty()?;
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.start_pc.to_be_bytes());
            out.extend_from_slice(&entry.length.to_be_bytes());
            out.extend_from_slice(&entry.name.to_be_bytes());
            out.extend_from_slice(&entry.descriptor.to_be_bytes());
            out.extend_from_slice(&entry.index.to_be_bytes());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct InnerClassesAttribute {
    pub entries: Vec<InnerClassEntry>,
}

/// Raw pool indices; `outer_class` and `inner_name` are 0 when absent.
#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    pub inner_class: u16,
    pub outer_class: u16,
    pub inner_name: u16,
    pub access_flags: u16,
}

impl InnerClassesAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(InnerClassEntry {
                inner_class: reader.read_u2()?,
                outer_class: reader.read_u2()?,
                inner_name: reader.read_u2()?,
                access_flags: reader.read_u2()?,
            });
        }
        reader.ensure_empty()?;
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.inner_class.to_be_bytes());
            out.extend_from_slice(&entry.outer_class.to_be_bytes());
            out.extend_from_slice(&entry.inner_name.to_be_bytes());
            out.extend_from_slice(&entry.access_flags.to_be_bytes());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct EnclosingMethodAttribute {
    pub class: u16,
    /// NameAndType index, 0 when the class is not enclosed in a method.
    pub method: u16,
}

impl EnclosingMethodAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let class = reader.read_u2()?;
        let method = reader.read_u2()?;
        reader.ensure_empty()?;
        Ok(Self { class, method })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        out.extend_from_slice(&self.class.to_be_bytes());
        out.extend_from_slice(&self.method.to_be_bytes());
        out
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapMethodsAttribute {
    pub methods: Vec<BootstrapMethod>,
}

#[derive(Debug, Clone)]
pub struct BootstrapMethod {
    /// MethodHandle pool index.
    pub method_ref: u16,
    /// Loadable-constant pool indices.
    pub arguments: Vec<u16>,
}

impl BootstrapMethodsAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(count);
        for _ in 0..count {
            let method_ref = reader.read_u2()?;
            let arg_count = reader.read_u2()? as usize;
            let mut arguments = Vec::with_capacity(arg_count);
            for _ in 0..arg_count {
                arguments.push(reader.read_u2()?);
            }
            methods.push(BootstrapMethod {
                method_ref,
                arguments,
            });
        }
        reader.ensure_empty()?;
        Ok(Self { methods })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.method_ref.to_be_bytes());
            out.extend_from_slice(&(method.arguments.len() as u16).to_be_bytes());
            for arg in &method.arguments {
                out.extend_from_slice(&arg.to_be_bytes());
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct RecordAttribute {
    pub components: Vec<RecordComponent>,
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

impl RecordAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut components = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader.read_u2()?;
            let descriptor = reader.read_u2()?;
            let attributes = parse_attributes(&mut reader)?;
            components.push(RecordComponent {
                name,
                descriptor,
                attributes,
            });
        }
        reader.ensure_empty()?;
        Ok(Self { components })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.components.len() as u16).to_be_bytes());
        for component in &self.components {
            out.extend_from_slice(&component.name.to_be_bytes());
            out.extend_from_slice(&component.descriptor.to_be_bytes());
            write_attributes(&mut out, &component.attributes);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationEntry {
    /// Utf8 index holding a field descriptor.
    pub type_index: u16,
    pub elements: Vec<(u16, ElementValue)>,
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    /// Primitive or string constant: tag plus pool index.
    Const { tag: u8, value: u16 },
    Enum { type_name: u16, const_name: u16 },
    /// Utf8 index holding a return descriptor.
    Class(u16),
    Annotation(AnnotationEntry),
    Array(Vec<ElementValue>),
}

impl AnnotationEntry {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let type_index = reader.read_u2()?;
        let pair_count = reader.read_u2()? as usize;
        let mut elements = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            let name = reader.read_u2()?;
            elements.push((name, ElementValue::parse(reader)?));
        }
        Ok(Self {
            type_index,
            elements,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.type_index.to_be_bytes());
        out.extend_from_slice(&(self.elements.len() as u16).to_be_bytes());
        for (name, value) in &self.elements {
            out.extend_from_slice(&name.to_be_bytes());
            value.write(out);
        }
    }
}

impl ElementValue {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let tag = reader.read_u1()?;
        Ok(match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
                tag,
                value: reader.read_u2()?,
            },
            b'e' => ElementValue::Enum {
                type_name: reader.read_u2()?,
                const_name: reader.read_u2()?,
            },
            b'c' => ElementValue::Class(reader.read_u2()?),
            b'@' => ElementValue::Annotation(AnnotationEntry::parse(reader)?),
            b'[' => {
                let count = reader.read_u2()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(ElementValue::parse(reader)?);
                }
                ElementValue::Array(values)
            }
            _ => return Err(Error::MalformedAttribute("annotation element value")),
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            ElementValue::Const { tag, value } => {
                out.push(*tag);
                out.extend_from_slice(&value.to_be_bytes());
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                out.push(b'e');
                out.extend_from_slice(&type_name.to_be_bytes());
                out.extend_from_slice(&const_name.to_be_bytes());
            }
            ElementValue::Class(index) => {
                out.push(b'c');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementValue::Annotation(annotation) => {
                out.push(b'@');
                annotation.write(out);
            }
            ElementValue::Array(values) => {
                out.push(b'[');
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                for value in values {
                    value.write(out);
                }
            }
        }
    }
}

/// `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`.
#[derive(Debug, Clone)]
pub struct AnnotationsAttribute {
    pub annotations: Vec<AnnotationEntry>,
}

impl AnnotationsAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut annotations = Vec::with_capacity(count);
        for _ in 0..count {
            annotations.push(AnnotationEntry::parse(&mut reader)?);
        }
        reader.ensure_empty()?;
        Ok(Self { annotations })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.annotations.len() as u16).to_be_bytes());
        for annotation in &self.annotations {
            annotation.write(&mut out);
        }
        out
    }
}

/// `RuntimeVisibleParameterAnnotations` / `RuntimeInvisibleParameterAnnotations`.
#[derive(Debug, Clone)]
pub struct ParameterAnnotationsAttribute {
    pub parameters: Vec<Vec<AnnotationEntry>>,
}

impl ParameterAnnotationsAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let param_count = reader.read_u1()? as usize;
        let mut parameters = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            let count = reader.read_u2()? as usize;
            let mut annotations = Vec::with_capacity(count);
            for _ in 0..count {
                annotations.push(AnnotationEntry::parse(&mut reader)?);
            }
            parameters.push(annotations);
        }
        reader.ensure_empty()?;
        Ok(Self { parameters })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.parameters.len() as u8);
        for annotations in &self.parameters {
            out.extend_from_slice(&(annotations.len() as u16).to_be_bytes());
            for annotation in annotations {
                annotation.write(&mut out);
            }
        }
        out
    }
}

/// `AnnotationDefault`.
#[derive(Debug, Clone)]
pub struct AnnotationDefaultAttribute {
    pub value: ElementValue,
}

impl AnnotationDefaultAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let value = ElementValue::parse(&mut reader)?;
        reader.ensure_empty()?;
        Ok(Self { value })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.value.write(&mut out);
        out
    }
}

/// `RuntimeVisibleTypeAnnotations` / `RuntimeInvisibleTypeAnnotations`.
///
/// Target info and type path carry no pool indices, so they are kept as raw
/// bytes; only the nested annotation needs typed access.
#[derive(Debug, Clone)]
pub struct TypeAnnotationsAttribute {
    pub annotations: Vec<TypeAnnotationEntry>,
}

#[derive(Debug, Clone)]
pub struct TypeAnnotationEntry {
    pub target_type: u8,
    pub target_info: Vec<u8>,
    pub type_path: Vec<u8>,
    pub annotation: AnnotationEntry,
}

impl TypeAnnotationsAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()? as usize;
        let mut annotations = Vec::with_capacity(count);
        for _ in 0..count {
            let target_type = reader.read_u1()?;
            let target_len = match target_type {
                0x00 | 0x01 | 0x16 => 1,
                0x10 | 0x11 | 0x12 | 0x17 | 0x42 | 0x43 | 0x44 | 0x45 | 0x46 => 2,
                0x13 | 0x14 | 0x15 => 0,
                0x47..=0x4B => 3,
                0x40 | 0x41 => {
                    let table_length = reader.read_u2()?;
                    let body = reader.read_bytes(table_length as usize * 6)?;
                    let mut target_info = table_length.to_be_bytes().to_vec();
                    target_info.extend_from_slice(body);
                    let path_len = reader.read_u1()?;
                    let mut type_path = vec![path_len];
                    type_path.extend_from_slice(reader.read_bytes(path_len as usize * 2)?);
                    annotations.push(TypeAnnotationEntry {
                        target_type,
                        target_info,
                        type_path,
                        annotation: AnnotationEntry::parse(&mut reader)?,
                    });
                    continue;
                }
                _ => return Err(Error::MalformedAttribute("type annotation target")),
            };
            let target_info = reader.read_bytes(target_len)?.to_vec();
            let path_len = reader.read_u1()?;
            let mut type_path = vec![path_len];
            type_path.extend_from_slice(reader.read_bytes(path_len as usize * 2)?);
            annotations.push(TypeAnnotationEntry {
                target_type,
                target_info,
                type_path,
                annotation: AnnotationEntry::parse(&mut reader)?,
            });
        }
        reader.ensure_empty()?;
        Ok(Self { annotations })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.annotations.len() as u16).to_be_bytes());
        for entry in &self.annotations {
            out.push(entry.target_type);
            out.extend_from_slice(&entry.target_info);
            out.extend_from_slice(&entry.type_path);
            entry.annotation.write(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_attribute_round_trips() {
        let code = CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code: vec![0x2A, 0xB7, 0x00, 0x01, 0xB1],
            exception_table: vec![ExceptionHandler {
                start_pc: 0,
                end_pc: 4,
                handler_pc: 4,
                catch_type: 3,
            }],
            attributes: Vec::new(),
        };
        let bytes = code.to_bytes();
        let reparsed = CodeAttribute::parse(&bytes).unwrap();
        assert_eq!(reparsed.to_bytes(), bytes);
        assert_eq!(reparsed.code, code.code);
    }

    #[test]
    fn annotations_round_trip() {
        let attr = AnnotationsAttribute {
            annotations: vec![AnnotationEntry {
                type_index: 7,
                elements: vec![
                    (8, ElementValue::Const { tag: b's', value: 9 }),
                    (
                        10,
                        ElementValue::Array(vec![ElementValue::Enum {
                            type_name: 11,
                            const_name: 12,
                        }]),
                    ),
                ],
            }],
        };
        let bytes = attr.to_bytes();
        let reparsed = AnnotationsAttribute::parse(&bytes).unwrap();
        assert_eq!(reparsed.to_bytes(), bytes);
    }

    #[test]
    fn local_variable_table_round_trips() {
        let attr = LocalVariableTable {
            entries: vec![LocalVariableEntry {
                start_pc: 0,
                length: 10,
                name: 4,
                descriptor: 5,
                index: 1,
            }],
        };
        let bytes = attr.to_bytes();
        assert_eq!(LocalVariableTable::parse(&bytes).unwrap().to_bytes(), bytes);
    }

    #[test]
    fn bootstrap_methods_round_trip() {
        let attr = BootstrapMethodsAttribute {
            methods: vec![BootstrapMethod {
                method_ref: 20,
                arguments: vec![21, 22, 23],
            }],
        };
        let bytes = attr.to_bytes();
        let reparsed = BootstrapMethodsAttribute::parse(&bytes).unwrap();
        assert_eq!(reparsed.methods[0].arguments, vec![21, 22, 23]);
        assert_eq!(reparsed.to_bytes(), bytes);
    }
}
