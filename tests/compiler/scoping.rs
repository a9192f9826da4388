use super::*;

use kcc::{compile_file, parse_program, CompileError, Severity, UndeclaredPolicy};

#[test]
fn test_slots_follow_declaration_order() {
    let compiled = compile(
        "PROGRAM p DECLARE INTEGER a INTEGER b INTEGER c STRING d STRING e BEGIN END",
        "Slots",
    );
    let stores: Vec<Instruction> = main_instructions(&compiled.class_file)
        .into_iter()
        .filter(|i| {
            matches!(
                i,
                Instruction::Istore1
                    | Instruction::Istore2
                    | Instruction::Istore3
                    | Instruction::Astore(_)
                    | Instruction::Istore(_)
            )
        })
        .collect();
    assert_eq!(
        stores,
        vec![
            Instruction::Istore1,
            Instruction::Istore2,
            Instruction::Istore3,
            Instruction::Astore(4),
            Instruction::Astore(5),
        ]
    );
    let code = compiled.class_file.method("main").unwrap().attributes[0]
        .parse_code()
        .unwrap();
    assert_eq!(code.max_locals, 6);
}

#[test]
fn test_redeclaration_is_a_single_warning() {
    let compiled = compile(
        "PROGRAM p DECLARE INTEGER a STRING a BEGIN SET a := 3 PRINT a END",
        "Redeclare",
    );
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].severity, Severity::Warning);
    assert!(!compiled.has_errors());
    // `a` stays an INTEGER in slot 1
    let ins = main_instructions(&compiled.class_file);
    assert!(ins.contains(&Instruction::Iload1));
    assert!(!ins.iter().any(|i| matches!(i, Instruction::Astore(_) | Instruction::Astore2)));
}

#[test]
fn test_undeclared_print_produces_no_artifact() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.kc");
    let output = dir.path().join("Bad.class");
    fs_write(&input, "PROGRAM bad BEGIN PRINT x END");

    let err = compile_file(&input, &output, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err.error, CompileError::UndeclaredVariable { ref name } if name == "x"));
    assert!(!output.exists());
}

#[test]
fn test_undeclared_read_and_set_produce_no_artifact() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("Bad.class");
    for (i, source) in [
        "PROGRAM bad BEGIN READ x END",
        "PROGRAM bad BEGIN SET x := 1 END",
        "PROGRAM bad DECLARE INTEGER a BEGIN SET a := x + 1 END",
        "PROGRAM bad BEGIN IF x > 1 THEN PRINT \"big\" ENDIF END",
    ]
    .iter()
    .enumerate()
    {
        let input = dir.path().join(format!("bad{}.kc", i));
        fs_write(&input, source);
        let err = compile_file(&input, &output, &CompileOptions::default()).unwrap_err();
        assert!(
            matches!(err.error, CompileError::UndeclaredVariable { ref name } if name == "x"),
            "{}",
            source
        );
        assert!(!output.exists(), "{}", source);
    }
}

#[test]
fn test_fatal_error_keeps_earlier_warnings() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.kc");
    let output = dir.path().join("Bad.class");
    fs_write(
        &input,
        "PROGRAM bad DECLARE INTEGER a STRING a BEGIN PRINT a PRINT x END",
    );

    let err = compile_file(&input, &output, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err.error, CompileError::UndeclaredVariable { .. }));
    assert_eq!(err.diagnostics.len(), 1);
    assert_eq!(err.diagnostics[0].severity, Severity::Warning);
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_is_an_io_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.kc");
    let output = dir.path().join("missing").join("Hello.class");
    fs_write(&input, "PROGRAM hello BEGIN PRINT \"hi\" END");

    let err = compile_file(&input, &output, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err.error, CompileError::Io(_)), "{:?}", err);
    assert!(!output.exists());
}

#[test]
fn test_missing_input_is_an_io_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let err = compile_file(
        dir.path().join("absent.kc"),
        dir.path().join("Absent.class"),
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err.error, CompileError::Io(_)));
    assert!(err.diagnostics.is_empty());
}

#[test]
fn test_reported_errors_also_suppress_output() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.kc");
    let output = dir.path().join("Bad.class");
    fs_write(
        &input,
        "PROGRAM bad DECLARE INTEGER a BEGIN SET a := y PRINT z PRINT a END",
    );
    let options = CompileOptions {
        undeclared_policy: UndeclaredPolicy::Report,
        ..CompileOptions::default()
    };

    let diagnostics = compile_file(&input, &output, &options).unwrap();
    assert_eq!(
        diagnostics.iter().filter(|d| d.severity == Severity::Error).count(),
        2
    );
    assert!(!output.exists());
}

#[test]
fn test_successful_compile_writes_named_class() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.kc");
    let output = dir.path().join("Hello.class");
    fs_write(&input, "PROGRAM hello BEGIN PRINT \"hi\" END");

    let diagnostics = compile_file(&input, &output, &CompileOptions::default()).unwrap();
    assert!(diagnostics.is_empty());
    let class_file = kcc::load_class(&output).unwrap();
    assert_eq!(class_file.class_name(class_file.this_class).as_deref(), Some("Hello"));
}

#[test]
fn test_parse_errors_carry_position() {
    let err = parse_program("PROGRAM p\nBEGIN\n  SET := 1\nEND").unwrap_err();
    match err {
        CompileError::Parse { line, column, .. } => assert_eq!((line, column), (3, 7)),
        other => panic!("unexpected error: {:?}", other),
    }
}

fn fs_write(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("failed to write source");
}
