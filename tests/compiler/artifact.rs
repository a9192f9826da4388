use super::*;

use kcc::attribute_info::AttributeInfo;

const PROGRAM: &str = r#"
    PROGRAM Echo DECLARE INTEGER n BEGIN
        READ n
        WHILE n > 0 DO PRINT n SET n := n - 1 ENDWHILE
    END
"#;

fn attribute_names(class_file: &ClassFile, attributes: &[AttributeInfo]) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|a| class_file.get_utf8(a.attribute_name_index))
        .collect()
}

#[test]
fn test_written_class_reads_back() {
    let compiled = compile(PROGRAM, "Echo");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Echo.class");
    compiled.write_to(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 52);
    assert_eq!(bytes, compiled.to_bytes().unwrap());

    let class_file = kcc::load_class(&path).unwrap();
    assert_eq!(class_file.class_name(class_file.this_class).as_deref(), Some("Echo"));
    assert_eq!(
        class_file.class_name(class_file.super_class).as_deref(),
        Some("java/lang/Object")
    );
    let names: Vec<String> = class_file
        .methods
        .iter()
        .filter_map(|m| class_file.get_utf8(m.name_index))
        .collect();
    assert_eq!(names, vec!["<init>", "main", "<clinit>"]);
}

#[test]
fn test_main_code_carries_frames() {
    let compiled = compile(PROGRAM, "Echo");
    let class_file = &compiled.class_file;
    let code = class_file.method("main").unwrap().attributes[0]
        .parse_code()
        .unwrap();
    assert_eq!(attribute_names(class_file, &code.attributes), vec!["StackMapTable"]);
    assert!(code.max_stack >= 2);
    assert_eq!(code.max_locals, 2);
}

#[test]
fn test_frames_can_be_disabled() {
    let options = CompileOptions {
        generate_stack_map_table: false,
        ..CompileOptions::default()
    };
    let compiled = compile_with(PROGRAM, "Echo", &options);
    let class_file = &compiled.class_file;
    assert_eq!(class_file.major_version, 49);
    let code = class_file.method("main").unwrap().attributes[0]
        .parse_code()
        .unwrap();
    assert!(code.attributes.is_empty());
}

#[test]
fn test_source_file_attribute_is_optional() {
    let plain = compile("PROGRAM p BEGIN END", "Plain");
    assert!(plain.class_file.attributes.is_empty());

    let options = CompileOptions {
        source_file: Some("plain.kc".to_string()),
        ..CompileOptions::default()
    };
    let named = compile_with("PROGRAM p BEGIN END", "Plain", &options);
    assert_eq!(
        attribute_names(&named.class_file, &named.class_file.attributes),
        vec!["SourceFile"]
    );
}

#[test]
fn test_programs_without_read_have_no_console_field() {
    let compiled = compile("PROGRAM p BEGIN PRINT \"x\" END", "NoInput");
    assert!(compiled.class_file.fields.is_empty());
    assert!(compiled.class_file.method("<clinit>").is_none());
}

#[test]
fn test_invalid_class_name_is_rejected() {
    init_logging();
    let err = compile_source("PROGRAM p BEGIN END", "not valid", &CompileOptions::default())
        .unwrap_err();
    assert!(matches!(err.error, kcc::CompileError::Codegen { .. }));
}

#[test]
fn test_oversized_string_literal_is_rejected() {
    init_logging();
    let source = format!("PROGRAM p BEGIN PRINT \"{}\" END", "x".repeat(70_000));
    let err = compile_source(&source, "Huge", &CompileOptions::default()).unwrap_err();
    match err.error {
        kcc::CompileError::Codegen { message } => {
            assert!(message.contains("70000"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_write_leaves_only_the_class_file() {
    let compiled = compile(PROGRAM, "Echo");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Echo.class");
    compiled.write_to(&path).unwrap();
    // overwriting an existing artifact goes through the same staging
    compiled.write_to(&path).unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("Echo.class")]);
}

#[test]
fn test_failed_write_creates_nothing() {
    let compiled = compile(PROGRAM, "Echo");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent").join("Echo.class");
    let err = compiled.write_to(&path).unwrap_err();
    assert!(matches!(err, kcc::CompileError::Io(_)));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
