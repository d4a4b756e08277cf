mod common;

use std::sync::Arc;

use common::{read_u16, ClassBuilder};
use lumen_classfile::attributes::{CodeAttribute, InnerClassEntry, InnerClassesAttribute};
use lumen_classfile::{flags, opcodes, ClassFile, Constant};
use lumen_mappings::{parse_tsrg2, SymbolTable};
use lumen_remap::{
    inject_constructor, rewrite_class, ClassInfo, InheritanceProvider, MethodInfo, NoInheritance,
    Provenance, Remapper, MARKER_MESSAGE,
};

fn empty_table() -> SymbolTable {
    parse_tsrg2("tsrg2 obf deobf\n").unwrap()
}

struct FixedInfo {
    name: &'static str,
    constructors: Vec<&'static str>,
}

impl InheritanceProvider for FixedInfo {
    fn class_info(&self, internal_name: &str) -> Option<Arc<ClassInfo>> {
        (internal_name == self.name).then(|| {
            Arc::new(ClassInfo {
                name: self.name.to_string(),
                super_class: Some("java/lang/Object".to_string()),
                interfaces: Vec::new(),
                methods: self
                    .constructors
                    .iter()
                    .map(|descriptor| MethodInfo {
                        name: "<init>".to_string(),
                        descriptor: descriptor.to_string(),
                        access_flags: flags::ACC_PUBLIC,
                        provenance: Provenance::Declared,
                    })
                    .collect(),
            })
        })
    }
}

fn constructor_code(bytes: &[u8]) -> (ClassFile, u16, CodeAttribute) {
    let class = ClassFile::parse(bytes).unwrap();
    let init = class
        .methods
        .iter()
        .find(|m| m.name(&class.pool).unwrap() == "<init>")
        .expect("no constructor injected");
    let access = init.access_flags;
    let code_attr =
        lumen_classfile::find_attribute(&init.attributes, &class.pool, "Code").unwrap();
    let code = CodeAttribute::parse(&code_attr.info).unwrap();
    (class, access, code)
}

/// Mapping `a/B b/C`, a class with one final int field, rewriting then
/// synthesis.
#[test]
fn end_to_end_rename_and_synthesis() {
    let bytes = ClassBuilder::new("a/B", "java/lang/Object")
        .field(flags::ACC_PRIVATE | flags::ACC_FINAL, "a", "I")
        .build();

    let table = parse_tsrg2("tsrg2 obf deobf\na/B b/C\n").unwrap();
    let remapper = Remapper::new(&table, &NoInheritance);
    let rewritten = rewrite_class(&remapper, &bytes).unwrap();
    let injected = inject_constructor(&remapper, &rewritten.bytes).unwrap();

    let (class, access, code) = constructor_code(&injected);
    assert_eq!(class.this_class_name().unwrap(), "b/C");
    assert_eq!(access, flags::ACC_PRIVATE | flags::ACC_SYNTHETIC);

    let init = class
        .methods
        .iter()
        .find(|m| m.name(&class.pool).unwrap() == "<init>")
        .unwrap();
    assert_eq!(init.descriptor(&class.pool).unwrap(), "()V");

    // aload_0; invokespecial Object.<init>()V
    assert_eq!(code.code[0], opcodes::ALOAD_0);
    assert_eq!(code.code[1], opcodes::INVOKESPECIAL);
    let super_ref = read_u16(&code.code, 2);
    match class.pool.get(super_ref).unwrap() {
        Constant::MethodRef {
            class: owner,
            name_and_type,
        } => {
            assert_eq!(class.pool.class_name(*owner).unwrap(), "java/lang/Object");
            assert_eq!(
                class.pool.name_and_type(*name_and_type).unwrap(),
                ("<init>".to_string(), "()V".to_string())
            );
        }
        other => panic!("expected MethodRef, got {other:?}"),
    }

    // aload_0; iconst_0; putfield a:I
    assert_eq!(code.code[4], opcodes::ALOAD_0);
    assert_eq!(code.code[5], opcodes::ICONST_0);
    assert_eq!(code.code[6], opcodes::PUTFIELD);
    let field_ref = read_u16(&code.code, 7);
    match class.pool.get(field_ref).unwrap() {
        Constant::FieldRef { name_and_type, .. } => {
            assert_eq!(
                class.pool.name_and_type(*name_and_type).unwrap(),
                ("a".to_string(), "I".to_string())
            );
        }
        other => panic!("expected FieldRef, got {other:?}"),
    }

    // new RuntimeException; dup; ldc <marker>; invokespecial; athrow
    assert_eq!(code.code[9], opcodes::NEW);
    assert_eq!(code.code[12], opcodes::DUP);
    assert_eq!(code.code[13], opcodes::LDC);
    let message = code.code[14] as u16;
    match class.pool.get(message).unwrap() {
        Constant::String { utf8 } => {
            assert_eq!(class.pool.utf8(*utf8).unwrap(), MARKER_MESSAGE);
        }
        other => panic!("expected String, got {other:?}"),
    }
    assert_eq!(*code.code.last().unwrap(), opcodes::ATHROW);
}

#[test]
fn classes_with_a_constructor_are_untouched() {
    let mut builder = ClassBuilder::new("a/B", "java/lang/Object");
    let code = ClassBuilder::code_attribute(&mut builder.class.pool, vec![0xB1], Vec::new());
    let bytes = builder
        .field(flags::ACC_PRIVATE | flags::ACC_FINAL, "a", "I")
        .method(flags::ACC_PUBLIC, "<init>", "()V", vec![code])
        .build();
    let table = empty_table();
    let remapper = Remapper::new(&table, &NoInheritance);
    assert_eq!(inject_constructor(&remapper, &bytes).unwrap(), bytes);
}

#[test]
fn plain_classes_with_default_super_need_nothing() {
    let bytes = ClassBuilder::new("a/B", "java/lang/Object")
        .field(flags::ACC_PRIVATE, "mutable", "I")
        .build();
    let table = empty_table();
    let remapper = Remapper::new(&table, &NoInheritance);
    assert_eq!(inject_constructor(&remapper, &bytes).unwrap(), bytes);
}

#[test]
fn minimal_super_constructor_breaks_ties_lexicographically() {
    let bytes = ClassBuilder::new("a/B", "s/Parent").build();
    let table = empty_table();
    let provider = FixedInfo {
        name: "s/Parent",
        constructors: vec!["(Ljava/lang/String;I)V", "(Ljava/lang/String;)V", "(I)V"],
    };
    let remapper = Remapper::new(&table, &provider);
    let injected = inject_constructor(&remapper, &bytes).unwrap();

    let (class, _, code) = constructor_code(&injected);
    // iconst_0 for the int parameter, then the (I)V super call: of the two
    // one-argument candidates, "(I)V" sorts below "(Ljava/lang/String;)V".
    assert_eq!(code.code[0], opcodes::ALOAD_0);
    assert_eq!(code.code[1], opcodes::ICONST_0);
    assert_eq!(code.code[2], opcodes::INVOKESPECIAL);
    let super_ref = read_u16(&code.code, 3);
    match class.pool.get(super_ref).unwrap() {
        Constant::MethodRef { name_and_type, .. } => {
            assert_eq!(
                class.pool.name_and_type(*name_and_type).unwrap(),
                ("<init>".to_string(), "(I)V".to_string())
            );
        }
        other => panic!("expected MethodRef, got {other:?}"),
    }
}

#[test]
fn unresolvable_super_falls_back_through_the_reverse_table() {
    // The class has already been renamed: it extends s/Renamed, but the
    // provider only knows the original name o/Orig. The winning descriptor
    // mentions the original name and must be mapped forward before use.
    let bytes = ClassBuilder::new("b/C", "s/Renamed").build();
    let table = parse_tsrg2("tsrg2 obf deobf\no/Orig s/Renamed\na/B b/C\n").unwrap();
    let provider = FixedInfo {
        name: "o/Orig",
        constructors: vec!["(Lo/Orig;)V"],
    };
    let remapper = Remapper::new(&table, &provider);
    let injected = inject_constructor(&remapper, &bytes).unwrap();

    let (class, _, code) = constructor_code(&injected);
    assert_eq!(code.code[1], opcodes::ACONST_NULL);
    let super_ref = read_u16(&code.code, 3);
    match class.pool.get(super_ref).unwrap() {
        Constant::MethodRef {
            class: owner,
            name_and_type,
        } => {
            assert_eq!(class.pool.class_name(*owner).unwrap(), "s/Renamed");
            assert_eq!(
                class.pool.name_and_type(*name_and_type).unwrap(),
                ("<init>".to_string(), "(Ls/Renamed;)V".to_string())
            );
        }
        other => panic!("expected MethodRef, got {other:?}"),
    }
}

#[test]
fn nested_instance_classes_store_the_enclosing_reference() {
    let mut builder = ClassBuilder::new("a/Outer$Inner", "java/lang/Object")
        .field(
            flags::ACC_PRIVATE | flags::ACC_FINAL | flags::ACC_SYNTHETIC,
            "this$0",
            "La/Outer;",
        );
    {
        let pool = &mut builder.class.pool;
        let inner_class = pool.add_class("a/Outer$Inner").unwrap();
        let outer_class = pool.add_class("a/Outer").unwrap();
        let inner_name = pool.add_utf8("Inner").unwrap();
        let info = InnerClassesAttribute {
            entries: vec![InnerClassEntry {
                inner_class,
                outer_class,
                inner_name,
                access_flags: 0,
            }],
        }
        .to_bytes();
        let name = pool.add_utf8("InnerClasses").unwrap();
        builder.class.attributes.push(lumen_classfile::Attribute { name, info });
    }
    let bytes = builder.build();

    let table = empty_table();
    let remapper = Remapper::new(&table, &NoInheritance);
    let injected = inject_constructor(&remapper, &bytes).unwrap();

    let (class, access, code) = constructor_code(&injected);
    // Takes the enclosing instance, so not synthetic.
    assert_eq!(access, flags::ACC_PRIVATE);
    let init = class
        .methods
        .iter()
        .find(|m| m.name(&class.pool).unwrap() == "<init>")
        .unwrap();
    assert_eq!(init.descriptor(&class.pool).unwrap(), "(La/Outer;)V");

    // super(); then this.this$0 = outer.
    assert_eq!(code.code[0], opcodes::ALOAD_0);
    assert_eq!(code.code[1], opcodes::INVOKESPECIAL);
    assert_eq!(code.code[4], opcodes::ALOAD_0);
    assert_eq!(code.code[5], opcodes::ALOAD_1);
    assert_eq!(code.code[6], opcodes::PUTFIELD);
    let field_ref = read_u16(&code.code, 7);
    match class.pool.get(field_ref).unwrap() {
        Constant::FieldRef { name_and_type, .. } => {
            assert_eq!(
                class.pool.name_and_type(*name_and_type).unwrap(),
                ("this$0".to_string(), "La/Outer;".to_string())
            );
        }
        other => panic!("expected FieldRef, got {other:?}"),
    }
    assert_eq!(code.max_locals, 2);
}
