//! The class rewriting engine.
//!
//! One decode pass snapshots the class; all name lookups read the snapshot
//! while edits go to the working copy. Pool edits are append-only and
//! structure edits only swap u16 pool indices, so instruction arrays, stack
//! maps, and line tables are carried through byte-for-byte.

use std::collections::HashMap;

use lumen_classfile::attributes::{
    AnnotationDefaultAttribute, AnnotationEntry, AnnotationsAttribute, BootstrapMethodsAttribute,
    CodeAttribute, ElementValue, EnclosingMethodAttribute, InnerClassesAttribute,
    LocalVariableTable, ParameterAnnotationsAttribute, RecordAttribute, TypeAnnotationsAttribute,
};
use lumen_classfile::{
    flags, parse_method_descriptor, Attribute, ClassFile, Constant, ConstantPool,
};

use crate::error::{RemapError, Result};
use crate::remapper::Remapper;

const METAFACTORY_OWNER: &str = "java/lang/invoke/LambdaMetafactory";
const METAFACTORY_NAME: &str = "metafactory";
const METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const ALT_METAFACTORY_NAME: &str = "altMetafactory";
const ALT_METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";
const H_INVOKESTATIC: u8 = 6;

/// The snowman placeholder historically used for unprintable local names.
const PLACEHOLDER: char = '\u{2603}';

/// The result of rewriting one class: the new bytes plus the
/// abstract/native parameter-name records collected along the way. The
/// caller owns merging records across classes.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub bytes: Vec<u8>,
    pub abstract_params: Vec<String>,
}

/// How a BootstrapMethods entry relates to the lambda factory.
enum BootstrapKind {
    Other,
    /// A recognized lambda factory; carries the erased synthetic-method
    /// descriptor from the first bootstrap argument.
    Lambda { erased: String },
    /// A lambda factory whose arguments do not start with a MethodType.
    Malformed,
}

pub fn rewrite_class(remapper: &Remapper<'_>, bytes: &[u8]) -> Result<RewriteOutcome> {
    let original = ClassFile::parse(bytes)?;
    let mut class = original.clone();
    let this_name = original.this_class_name()?;

    let bootstraps = scan_bootstrap_methods(&original)?;
    rewrite_pool(remapper, &original, &mut class.pool, &bootstraps)?;

    let orig_pool = &original.pool;

    let mut fields = std::mem::take(&mut class.fields);
    for (field, field_orig) in fields.iter_mut().zip(&original.fields) {
        let name = orig_pool.utf8(field_orig.name)?;
        let descriptor = orig_pool.utf8(field_orig.descriptor)?;
        let new_name = remapper.map_field_name(&this_name, &name);
        let new_descriptor = remapper.map_field_desc(&descriptor)?;
        if new_name != name {
            field.name = class.pool.add_utf8(&new_name)?;
        }
        if new_descriptor != descriptor {
            field.descriptor = class.pool.add_utf8(&new_descriptor)?;
        }
        rewrite_common_attributes(remapper, orig_pool, &mut class.pool, &mut field.attributes)?;
    }
    class.fields = fields;

    let mut abstract_params = Vec::new();
    let mut methods = std::mem::take(&mut class.methods);
    for (method, method_orig) in methods.iter_mut().zip(&original.methods) {
        let name = orig_pool.utf8(method_orig.name)?;
        let descriptor = orig_pool.utf8(method_orig.descriptor)?;
        let new_name = remapper.map_method_name(&this_name, &name, &descriptor);
        let new_descriptor = remapper.map_method_desc(&descriptor)?;
        if new_name != name {
            method.name = class.pool.add_utf8(&new_name)?;
        }
        if new_descriptor != descriptor {
            method.descriptor = class.pool.add_utf8(&new_descriptor)?;
        }

        if method_orig.access_flags & (flags::ACC_ABSTRACT | flags::ACC_NATIVE) != 0 {
            if let Some(record) = abstract_parameter_record(
                remapper,
                &this_name,
                &name,
                &descriptor,
                method_orig.access_flags,
            )? {
                abstract_params.push(record);
            }
        }

        rewrite_common_attributes(remapper, orig_pool, &mut class.pool, &mut method.attributes)?;
        for attr in &mut method.attributes {
            match orig_pool.utf8(attr.name)?.as_str() {
                "Code" => {
                    attr.info = rewrite_code(
                        remapper,
                        orig_pool,
                        &mut class.pool,
                        &attr.info,
                        &this_name,
                        &name,
                        &descriptor,
                    )?;
                }
                "RuntimeVisibleParameterAnnotations"
                | "RuntimeInvisibleParameterAnnotations" => {
                    let mut parsed = ParameterAnnotationsAttribute::parse(&attr.info)?;
                    for annotations in &mut parsed.parameters {
                        for annotation in annotations {
                            rewrite_annotation(remapper, orig_pool, &mut class.pool, annotation)?;
                        }
                    }
                    attr.info = parsed.to_bytes();
                }
                "AnnotationDefault" => {
                    let mut parsed = AnnotationDefaultAttribute::parse(&attr.info)?;
                    rewrite_element_value(remapper, orig_pool, &mut class.pool, &mut parsed.value)?;
                    attr.info = parsed.to_bytes();
                }
                _ => {}
            }
        }
    }
    class.methods = methods;

    let mut attributes = std::mem::take(&mut class.attributes);
    rewrite_common_attributes(remapper, orig_pool, &mut class.pool, &mut attributes)?;
    for attr in &mut attributes {
        match orig_pool.utf8(attr.name)?.as_str() {
            "InnerClasses" => {
                let mut parsed = InnerClassesAttribute::parse(&attr.info)?;
                for entry in &mut parsed.entries {
                    if entry.inner_name == 0 {
                        continue;
                    }
                    let full = orig_pool.class_name(entry.inner_class)?;
                    let mapped_full = remapper.map_class(&full);
                    if let Some(split) = mapped_full.rfind('$') {
                        let simple = &mapped_full[split + 1..];
                        if simple != orig_pool.utf8(entry.inner_name)? {
                            entry.inner_name = class.pool.add_utf8(simple)?;
                        }
                    }
                }
                attr.info = parsed.to_bytes();
            }
            "EnclosingMethod" => {
                let mut parsed = EnclosingMethodAttribute::parse(&attr.info)?;
                if parsed.method != 0 {
                    let owner = orig_pool.class_name(parsed.class)?;
                    let (name, descriptor) = orig_pool.name_and_type(parsed.method)?;
                    let new_name = remapper.map_method_name(&owner, &name, &descriptor);
                    let new_descriptor = remapper.map_method_desc(&descriptor)?;
                    if new_name != name || new_descriptor != descriptor {
                        parsed.method = class.pool.add_name_and_type(&new_name, &new_descriptor)?;
                    }
                }
                attr.info = parsed.to_bytes();
            }
            "Record" => {
                let mut parsed = RecordAttribute::parse(&attr.info)?;
                for component in &mut parsed.components {
                    let name = orig_pool.utf8(component.name)?;
                    let descriptor = orig_pool.utf8(component.descriptor)?;
                    let new_name = remapper.map_field_name(&this_name, &name);
                    let new_descriptor = remapper.map_field_desc(&descriptor)?;
                    if new_name != name {
                        component.name = class.pool.add_utf8(&new_name)?;
                    }
                    if new_descriptor != descriptor {
                        component.descriptor = class.pool.add_utf8(&new_descriptor)?;
                    }
                    rewrite_common_attributes(
                        remapper,
                        orig_pool,
                        &mut class.pool,
                        &mut component.attributes,
                    )?;
                }
                attr.info = parsed.to_bytes();
            }
            _ => {}
        }
    }
    class.attributes = attributes;

    Ok(RewriteOutcome {
        bytes: class.to_bytes(),
        abstract_params,
    })
}

fn scan_bootstrap_methods(original: &ClassFile) -> Result<Vec<BootstrapKind>> {
    let attr = match lumen_classfile::find_attribute(
        &original.attributes,
        &original.pool,
        "BootstrapMethods",
    ) {
        Some(attr) => attr,
        None => return Ok(Vec::new()),
    };
    let parsed = BootstrapMethodsAttribute::parse(&attr.info)?;
    let mut kinds = Vec::with_capacity(parsed.methods.len());
    for bootstrap in &parsed.methods {
        kinds.push(classify_bootstrap(
            &original.pool,
            bootstrap.method_ref,
            &bootstrap.arguments,
        )?);
    }
    Ok(kinds)
}

fn classify_bootstrap(
    pool: &ConstantPool,
    method_ref: u16,
    arguments: &[u16],
) -> Result<BootstrapKind> {
    let (kind, reference) = match pool.get(method_ref)? {
        Constant::MethodHandle { kind, reference } => (*kind, *reference),
        _ => return Ok(BootstrapKind::Other),
    };
    if kind != H_INVOKESTATIC {
        return Ok(BootstrapKind::Other);
    }
    let (owner, name_and_type) = match pool.get(reference)? {
        Constant::MethodRef {
            class,
            name_and_type,
        }
        | Constant::InterfaceMethodRef {
            class,
            name_and_type,
        } => (pool.class_name(*class)?, *name_and_type),
        _ => return Ok(BootstrapKind::Other),
    };
    if owner != METAFACTORY_OWNER {
        return Ok(BootstrapKind::Other);
    }
    let (name, descriptor) = pool.name_and_type(name_and_type)?;
    let recognized = (name == METAFACTORY_NAME && descriptor == METAFACTORY_DESC)
        || (name == ALT_METAFACTORY_NAME && descriptor == ALT_METAFACTORY_DESC);
    if !recognized {
        return Ok(BootstrapKind::Other);
    }
    // The first constant argument is the erased signature of the method the
    // function object implements.
    match arguments.first().map(|&arg| pool.get(arg)) {
        Some(Ok(Constant::MethodType { descriptor })) => Ok(BootstrapKind::Lambda {
            erased: pool.utf8(*descriptor)?,
        }),
        _ => Ok(BootstrapKind::Malformed),
    }
}

fn rewrite_pool(
    remapper: &Remapper<'_>,
    original: &ClassFile,
    pool: &mut ConstantPool,
    bootstraps: &[BootstrapKind],
) -> Result<()> {
    let orig_pool = &original.pool;
    for (index, entry) in orig_pool.entries() {
        match entry {
            Constant::Class { name } => {
                let name_str = orig_pool.utf8(*name)?;
                let mapped = remapper.map_type(&name_str)?;
                if mapped != name_str {
                    let utf8 = pool.add_utf8(&mapped)?;
                    pool.set(index, Constant::Class { name: utf8 })?;
                }
            }
            Constant::FieldRef {
                class,
                name_and_type,
            } => {
                let owner = orig_pool.class_name(*class)?;
                let (name, descriptor) = orig_pool.name_and_type(*name_and_type)?;
                let new_name = remapper.map_field_name(&owner, &name);
                let new_descriptor = remapper.map_field_desc(&descriptor)?;
                if new_name != name || new_descriptor != descriptor {
                    let nat = pool.add_name_and_type(&new_name, &new_descriptor)?;
                    pool.set(
                        index,
                        Constant::FieldRef {
                            class: *class,
                            name_and_type: nat,
                        },
                    )?;
                }
            }
            Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                let owner = orig_pool.class_name(*class)?;
                let (name, descriptor) = orig_pool.name_and_type(*name_and_type)?;
                let new_name = remapper.map_method_name(&owner, &name, &descriptor);
                let new_descriptor = remapper.map_method_desc(&descriptor)?;
                if new_name != name || new_descriptor != descriptor {
                    let nat = pool.add_name_and_type(&new_name, &new_descriptor)?;
                    let rewritten = match entry {
                        Constant::MethodRef { .. } => Constant::MethodRef {
                            class: *class,
                            name_and_type: nat,
                        },
                        _ => Constant::InterfaceMethodRef {
                            class: *class,
                            name_and_type: nat,
                        },
                    };
                    pool.set(index, rewritten)?;
                }
            }
            Constant::MethodType { descriptor } => {
                let descriptor_str = orig_pool.utf8(*descriptor)?;
                let mapped = remapper.map_method_desc(&descriptor_str)?;
                if mapped != descriptor_str {
                    let utf8 = pool.add_utf8(&mapped)?;
                    pool.set(index, Constant::MethodType { descriptor: utf8 })?;
                }
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = orig_pool.name_and_type(*name_and_type)?;
                let new_name = match bootstraps.get(*bootstrap_method as usize) {
                    Some(BootstrapKind::Lambda { erased }) => {
                        // The synthetic interface method is named against the
                        // functional interface, which is the call site's
                        // declared return type. The generic path would miss
                        // this rename entirely.
                        let interface = parse_method_descriptor(&descriptor)?
                            .return_type
                            .internal_name()
                            .map(str::to_string)
                            .ok_or(RemapError::LambdaShape { index })?;
                        remapper.map_method_name(&interface, &name, erased)
                    }
                    Some(BootstrapKind::Malformed) => {
                        return Err(RemapError::LambdaShape { index })
                    }
                    _ => name.clone(),
                };
                let new_descriptor = remapper.map_method_desc(&descriptor)?;
                if new_name != name || new_descriptor != descriptor {
                    let nat = pool.add_name_and_type(&new_name, &new_descriptor)?;
                    pool.set(
                        index,
                        Constant::InvokeDynamic {
                            bootstrap_method: *bootstrap_method,
                            name_and_type: nat,
                        },
                    )?;
                }
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = orig_pool.name_and_type(*name_and_type)?;
                let new_descriptor = remapper.map_field_desc(&descriptor)?;
                if new_descriptor != descriptor {
                    let nat = pool.add_name_and_type(&name, &new_descriptor)?;
                    pool.set(
                        index,
                        Constant::Dynamic {
                            bootstrap_method: *bootstrap_method,
                            name_and_type: nat,
                        },
                    )?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Rewrites Signature, annotation, and type-annotation attributes; shared by
/// class, field, method, and record-component attribute lists.
fn rewrite_common_attributes(
    remapper: &Remapper<'_>,
    orig_pool: &ConstantPool,
    pool: &mut ConstantPool,
    attributes: &mut [Attribute],
) -> Result<()> {
    for attr in attributes {
        match orig_pool.utf8(attr.name)?.as_str() {
            "Signature" => {
                if attr.info.len() != 2 {
                    return Err(RemapError::ClassFile(
                        lumen_classfile::Error::MalformedAttribute("Signature"),
                    ));
                }
                let index = u16::from_be_bytes([attr.info[0], attr.info[1]]);
                let signature = orig_pool.utf8(index)?;
                let mapped = remapper.map_signature(&signature)?;
                if mapped != signature {
                    let new_index = pool.add_utf8(&mapped)?;
                    attr.info = new_index.to_be_bytes().to_vec();
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let mut parsed = AnnotationsAttribute::parse(&attr.info)?;
                for annotation in &mut parsed.annotations {
                    rewrite_annotation(remapper, orig_pool, pool, annotation)?;
                }
                attr.info = parsed.to_bytes();
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                let mut parsed = TypeAnnotationsAttribute::parse(&attr.info)?;
                for entry in &mut parsed.annotations {
                    rewrite_annotation(remapper, orig_pool, pool, &mut entry.annotation)?;
                }
                attr.info = parsed.to_bytes();
            }
            _ => {}
        }
    }
    Ok(())
}

fn rewrite_annotation(
    remapper: &Remapper<'_>,
    orig_pool: &ConstantPool,
    pool: &mut ConstantPool,
    annotation: &mut AnnotationEntry,
) -> Result<()> {
    let descriptor = orig_pool.utf8(annotation.type_index)?;
    let mapped = remapper.map_field_desc(&descriptor)?;
    if mapped != descriptor {
        annotation.type_index = pool.add_utf8(&mapped)?;
    }
    for (_, value) in &mut annotation.elements {
        rewrite_element_value(remapper, orig_pool, pool, value)?;
    }
    Ok(())
}

fn rewrite_element_value(
    remapper: &Remapper<'_>,
    orig_pool: &ConstantPool,
    pool: &mut ConstantPool,
    value: &mut ElementValue,
) -> Result<()> {
    match value {
        ElementValue::Const { .. } => {}
        ElementValue::Enum { type_name, .. } => {
            let descriptor = orig_pool.utf8(*type_name)?;
            let mapped = remapper.map_field_desc(&descriptor)?;
            if mapped != descriptor {
                *type_name = pool.add_utf8(&mapped)?;
            }
        }
        ElementValue::Class(index) => {
            let descriptor = orig_pool.utf8(*index)?;
            if descriptor != "V" {
                let mapped = remapper.map_field_desc(&descriptor)?;
                if mapped != descriptor {
                    *index = pool.add_utf8(&mapped)?;
                }
            }
        }
        ElementValue::Annotation(inner) => {
            rewrite_annotation(remapper, orig_pool, pool, inner)?;
        }
        ElementValue::Array(values) => {
            for value in values {
                rewrite_element_value(remapper, orig_pool, pool, value)?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn rewrite_code(
    remapper: &Remapper<'_>,
    orig_pool: &ConstantPool,
    pool: &mut ConstantPool,
    info: &[u8],
    owner: &str,
    method_name: &str,
    method_descriptor: &str,
) -> Result<Vec<u8>> {
    let mut code = CodeAttribute::parse(info)?;

    // Per-slot occurrence counters for placeholder renames; reset per method.
    let mut placeholder_seen: HashMap<u16, u32> = HashMap::new();
    // LocalVariableTable and LocalVariableTypeTable entries describing the
    // same variable must agree on the replacement name.
    let mut decisions: HashMap<(u16, u16, u16, u16), u16> = HashMap::new();

    for pass in ["LocalVariableTable", "LocalVariableTypeTable"] {
        for attr in &mut code.attributes {
            if orig_pool.utf8(attr.name)? != pass {
                continue;
            }
            let mut table = LocalVariableTable::parse(&attr.info)?;
            for entry in &mut table.entries {
                let key = (entry.start_pc, entry.length, entry.index, entry.name);
                let new_name = match decisions.get(&key) {
                    Some(&index) => index,
                    None => {
                        let name = orig_pool.utf8(entry.name)?;
                        let mut resolved = remapper
                            .map_param_name(owner, method_name, method_descriptor, entry.index)
                            .unwrap_or_else(|| name.clone());
                        if resolved.starts_with(PLACEHOLDER) {
                            let version = placeholder_seen.entry(entry.index).or_insert(0);
                            *version += 1;
                            resolved = format!("lvt_{}_{}_", entry.index, version);
                        }
                        let index = if resolved != name {
                            pool.add_utf8(&resolved)?
                        } else {
                            entry.name
                        };
                        decisions.insert(key, index);
                        index
                    }
                };
                entry.name = new_name;

                let type_str = orig_pool.utf8(entry.descriptor)?;
                let mapped = if pass == "LocalVariableTable" {
                    remapper.map_field_desc(&type_str)?
                } else {
                    remapper.map_signature(&type_str)?
                };
                if mapped != type_str {
                    entry.descriptor = pool.add_utf8(&mapped)?;
                }
            }
            attr.info = table.to_bytes();
        }
    }

    for attr in &mut code.attributes {
        if matches!(
            orig_pool.utf8(attr.name)?.as_str(),
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations"
        ) {
            let mut parsed = TypeAnnotationsAttribute::parse(&attr.info)?;
            for entry in &mut parsed.annotations {
                rewrite_annotation(remapper, orig_pool, pool, &mut entry.annotation)?;
            }
            attr.info = parsed.to_bytes();
        }
    }

    Ok(code.to_bytes())
}

/// Builds the display-name record for an abstract or native method, which has
/// no local-variable table to carry parameter names.
fn abstract_parameter_record(
    remapper: &Remapper<'_>,
    owner: &str,
    name: &str,
    descriptor: &str,
    access_flags: u16,
) -> Result<Option<String>> {
    let parsed = parse_method_descriptor(descriptor)?;
    if parsed.params.is_empty() {
        return Ok(None);
    }
    let mut names = Vec::with_capacity(parsed.params.len());
    let mut slot: u16 = if access_flags & flags::ACC_STATIC != 0 {
        0
    } else {
        1
    };
    for param in &parsed.params {
        let resolved = remapper
            .map_param_name(owner, name, descriptor, slot)
            .unwrap_or_else(|| format!("var{slot}"));
        names.push(resolved);
        slot += param.word_size();
    }
    Ok(Some(format!(
        "{} {} {} {}",
        remapper.map_class(owner),
        remapper.map_method_name(owner, name, descriptor),
        remapper.map_method_desc(descriptor)?,
        names.join(" ")
    )))
}
