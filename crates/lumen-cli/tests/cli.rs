use std::fs::File;
use std::io::{Read, Write};

use assert_cmd::Command;
use lumen_classfile::{ClassFile, ConstantPool};
use predicates::prelude::*;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn minimal_class(name: &str) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_class = pool.add_class(name).unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    ClassFile {
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
    }
    .to_bytes()
}

#[test]
fn remaps_a_jar_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.jar");
    let output = tmp.path().join("out.jar");
    let mappings = tmp.path().join("names.tsrg");

    let mut zip = ZipWriter::new(File::create(&input).unwrap());
    zip.start_file("a/B.class", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&minimal_class("a/B")).unwrap();
    zip.finish().unwrap();

    std::fs::write(&mappings, "tsrg2 obf deobf\na/B com/example/Renamed\n").unwrap();

    Command::cargo_bin("lumen")
        .unwrap()
        .args(["--jar-in"])
        .arg(&input)
        .args(["--jar-out"])
        .arg(&output)
        .args(["--mappings"])
        .arg(&mappings)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 1 entries"));

    let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
    let mut entry = archive.by_name("com/example/Renamed.class").unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.this_class_name().unwrap(), "com/example/Renamed");
}

#[test]
fn bad_mappings_abort_with_the_offending_line() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.jar");
    let mappings = tmp.path().join("names.tsrg");

    let mut zip = ZipWriter::new(File::create(&input).unwrap());
    zip.start_file("x.txt", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"x").unwrap();
    zip.finish().unwrap();
    std::fs::write(&mappings, "tsrg2 obf deobf\nonly-one-column\n").unwrap();

    Command::cargo_bin("lumen")
        .unwrap()
        .args(["--jar-in"])
        .arg(&input)
        .args(["--jar-out"])
        .arg(tmp.path().join("out.jar"))
        .args(["--mappings"])
        .arg(&mappings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("only-one-column"));
}

#[test]
fn missing_input_jar_is_reported() {
    let tmp = TempDir::new().unwrap();
    let mappings = tmp.path().join("names.tsrg");
    std::fs::write(&mappings, "tsrg2 obf deobf\n").unwrap();

    Command::cargo_bin("lumen")
        .unwrap()
        .args(["--jar-in"])
        .arg(tmp.path().join("absent.jar"))
        .args(["--jar-out"])
        .arg(tmp.path().join("out.jar"))
        .args(["--mappings"])
        .arg(&mappings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("input jar does not exist"));
}
