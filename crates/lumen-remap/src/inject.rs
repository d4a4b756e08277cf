//! Synthetic-constructor injection for classes whose only constructor was
//! stripped by the obfuscator.
//!
//! The generated constructor exists for structural completeness: it satisfies
//! the superclass contract and final-field initialization, then throws, so it
//! can never be invoked successfully.

use tracing::debug;

use lumen_classfile::attributes::{CodeAttribute, InnerClassesAttribute};
use lumen_classfile::{
    find_attribute, flags, opcodes, parse_field_descriptor, parse_method_descriptor, Attribute,
    BaseType, ClassFile, FieldType, Member,
};

use crate::error::Result;
use crate::remapper::Remapper;

pub const MARKER_MESSAGE: &str = "synthetic constructor - not for invocation";

const NO_ARGS: &str = "()V";

pub fn inject_constructor(remapper: &Remapper<'_>, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut class = ClassFile::parse(bytes)?;
    let this_name = class.this_class_name()?;

    for method in &class.methods {
        if method.name(&class.pool)? == "<init>" {
            return Ok(bytes.to_vec());
        }
    }
    let super_name = match class.super_class_name()? {
        Some(name) => name,
        None => return Ok(bytes.to_vec()),
    };

    let is_static = class.access_flags & flags::ACC_STATIC != 0;

    // The enclosing type, as a field descriptor, from this class's own
    // InnerClasses entry. Anonymous and local classes have no named outer
    // class and are treated as non-nested.
    let mut outer_descriptor: Option<String> = None;
    if let Some(attr) = find_attribute(&class.attributes, &class.pool, "InnerClasses") {
        let parsed = InnerClassesAttribute::parse(&attr.info)?;
        for entry in &parsed.entries {
            if entry.outer_class != 0 && class.pool.class_name(entry.inner_class)? == this_name {
                outer_descriptor = Some(format!(
                    "L{};",
                    class.pool.class_name(entry.outer_class)?
                ));
                break;
            }
        }
    }

    let mut back_reference: Option<String> = None;
    let mut finals: Vec<(String, FieldType)> = Vec::new();
    for field in &class.fields {
        if field.access_flags & flags::ACC_STATIC != 0
            || field.access_flags & flags::ACC_FINAL == 0
        {
            continue;
        }
        let name = field.name(&class.pool)?;
        let descriptor = field.descriptor(&class.pool)?;
        if outer_descriptor.as_deref() == Some(descriptor.as_str())
            && field.access_flags & flags::ACC_SYNTHETIC != 0
        {
            back_reference = Some(name);
        } else {
            finals.push((name, parse_field_descriptor(&descriptor)?));
        }
    }

    let nested = !is_static && back_reference.is_some() && outer_descriptor.is_some();
    let super_descriptor = minimal_super_descriptor(remapper, &super_name)?;

    if !nested && finals.is_empty() && super_descriptor == NO_ARGS {
        // The implicit default constructor story already holds.
        return Ok(bytes.to_vec());
    }

    debug!("adding synthetic <init> to {this_name}");

    let pool = &mut class.pool;
    let super_params = parse_method_descriptor(&super_descriptor)?.params;

    let mut code: Vec<u8> = vec![opcodes::ALOAD_0];
    for param in &super_params {
        code.push(default_load(param));
    }
    let super_init = pool.add_method_ref(&super_name, "<init>", &super_descriptor)?;
    code.push(opcodes::INVOKESPECIAL);
    code.extend_from_slice(&super_init.to_be_bytes());

    if nested {
        let outer = outer_descriptor.as_deref().unwrap();
        let field = back_reference.as_deref().unwrap();
        debug!("  storing enclosing instance in {field}");
        let field_ref = pool.add_field_ref(&this_name, field, outer)?;
        code.push(opcodes::ALOAD_0);
        code.push(opcodes::ALOAD_1);
        code.push(opcodes::PUTFIELD);
        code.extend_from_slice(&field_ref.to_be_bytes());
    }

    for (name, ty) in &finals {
        debug!("  defaulting final field {name}");
        let field_ref = pool.add_field_ref(&this_name, name, &ty.descriptor())?;
        code.push(opcodes::ALOAD_0);
        code.push(default_load(ty));
        code.push(opcodes::PUTFIELD);
        code.extend_from_slice(&field_ref.to_be_bytes());
    }

    let exception = pool.add_class("java/lang/RuntimeException")?;
    code.push(opcodes::NEW);
    code.extend_from_slice(&exception.to_be_bytes());
    code.push(opcodes::DUP);
    let message = pool.add_string(MARKER_MESSAGE)?;
    if message <= u8::MAX as u16 {
        code.push(opcodes::LDC);
        code.push(message as u8);
    } else {
        code.push(opcodes::LDC_W);
        code.extend_from_slice(&message.to_be_bytes());
    }
    let exception_init =
        pool.add_method_ref("java/lang/RuntimeException", "<init>", "(Ljava/lang/String;)V")?;
    code.push(opcodes::INVOKESPECIAL);
    code.extend_from_slice(&exception_init.to_be_bytes());
    code.push(opcodes::ATHROW);

    let super_call_stack = 1 + super_params.iter().map(FieldType::word_size).sum::<u16>();
    let field_store_stack = finals
        .iter()
        .map(|(_, ty)| 1 + ty.word_size())
        .max()
        .unwrap_or(0);
    let max_stack = super_call_stack.max(field_store_stack).max(3);
    let max_locals = if nested { 2 } else { 1 };

    let code_attr = CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    };

    let descriptor = match (nested, outer_descriptor.as_deref()) {
        (true, Some(outer)) => format!("({outer})V"),
        _ => NO_ARGS.to_string(),
    };
    // Synthetic when the constructor takes no parameters at all, i.e. there
    // is no enclosing instance to accept.
    let access_flags = flags::ACC_PRIVATE | if nested { 0 } else { flags::ACC_SYNTHETIC };

    let method = Member {
        access_flags,
        name: pool.add_utf8("<init>")?,
        descriptor: pool.add_utf8(&descriptor)?,
        attributes: vec![Attribute {
            name: pool.add_utf8("Code")?,
            info: code_attr.to_bytes(),
        }],
    };
    class.methods.push(method);

    Ok(class.to_bytes())
}

/// Resolves the smallest constructor the superclass declares.
///
/// The superclass name in a freshly rewritten class may not resolve against a
/// classpath that still holds the original names; a miss retries through the
/// reverse symbol table, and a winner found that way is mapped forward before
/// use. Fewest parameters wins; ties break on the lexicographically smallest
/// descriptor so declaration order never matters. No constructor at all means
/// the implicit no-argument one.
fn minimal_super_descriptor(remapper: &Remapper<'_>, super_name: &str) -> Result<String> {
    let provider = remapper.inheritance();
    let (info, via_reverse) = match provider.class_info(super_name) {
        Some(info) => (Some(info), false),
        None => match provider.class_info(&remapper.unmap_class(super_name)) {
            Some(info) => (Some(info), true),
            None => (None, false),
        },
    };

    let mut best: Option<(usize, String)> = None;
    if let Some(info) = info {
        for method in info.declared_methods() {
            if method.name != "<init>" {
                continue;
            }
            let count = parse_method_descriptor(&method.descriptor)?.params.len();
            let better = match &best {
                None => true,
                Some((best_count, best_descriptor)) => {
                    count < *best_count
                        || (count == *best_count && method.descriptor < *best_descriptor)
                }
            };
            if better {
                best = Some((count, method.descriptor.clone()));
            }
        }
    }

    match best {
        None => Ok(NO_ARGS.to_string()),
        Some((_, descriptor)) if via_reverse => Ok(remapper.map_method_desc(&descriptor)?),
        Some((_, descriptor)) => Ok(descriptor),
    }
}

fn default_load(ty: &FieldType) -> u8 {
    match ty {
        FieldType::Base(BaseType::Float) => opcodes::FCONST_0,
        FieldType::Base(BaseType::Long) => opcodes::LCONST_0,
        FieldType::Base(BaseType::Double) => opcodes::DCONST_0,
        FieldType::Base(_) => opcodes::ICONST_0,
        FieldType::Object(_) | FieldType::Array(_) => opcodes::ACONST_NULL,
    }
}
