use super::*;

#[test]
fn test_e2e_addition_round_trip() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let output = run_program(
        "PROGRAM Add DECLARE INTEGER a BEGIN SET a := 2 + 3 PRINT a END",
        "Add",
        "",
    );
    assert_eq!(output, "5");
}

#[test]
fn test_e2e_loop_runs_three_times() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Count
        DECLARE INTEGER a
        BEGIN
            SET a := 0
            WHILE a < 3 DO
                SET a := a + 1
                PRINT a
            ENDWHILE
            PRINT "done"
        END
    "#;
    let output = run_program(source, "Count", "");
    assert_eq!(output, "1\n2\n3\ndone");
}

#[test]
fn test_e2e_loop_body_may_not_run() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Skip DECLARE INTEGER a BEGIN
            SET a := 10
            WHILE a = 0 DO PRINT "never" ENDWHILE
            PRINT a
        END
    "#;
    assert_eq!(run_program(source, "Skip", ""), "10");
}

#[test]
fn test_e2e_decision_takes_one_branch() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Branch DECLARE INTEGER a BEGIN
            SET a := 7
            IF a > 5 THEN PRINT "big" ELSE PRINT "small" ENDIF
            IF a < 5 THEN PRINT "big" ELSE PRINT "small" ENDIF
            IF a <> 7 THEN PRINT "wrong" ENDIF
            IF a = 7 THEN PRINT "seven" ENDIF
        END
    "#;
    assert_eq!(run_program(source, "Branch", ""), "big\nsmall\nseven");
}

#[test]
fn test_e2e_arithmetic_and_comparison_values() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Exprs DECLARE INTEGER a INTEGER b INTEGER c BEGIN
            SET a := (10 - 4) * 3 / 2
            SET b := a > 8
            SET c := 1 + (a = 9)
            PRINT a PRINT b PRINT c
            SET a := 100000
            PRINT a
        END
    "#;
    assert_eq!(run_program(source, "Exprs", ""), "9\n1\n2\n100000");
}

#[test]
fn test_e2e_strings_and_input() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Greet DECLARE STRING name INTEGER n BEGIN
            READ name
            PRINT "hello"
            PRINT name
            READ n
            SET n := n * 2
            PRINT n
        END
    "#;
    assert_eq!(run_program(source, "Greet", "knight\n21\n"), "hello\nknight\n42");
}

#[test]
fn test_e2e_nested_control_flow() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Nested DECLARE INTEGER i INTEGER r INTEGER evens BEGIN
            SET i := 0
            WHILE i < 6 DO
                SET r := i - (i / 2) * 2
                IF r = 0 THEN
                    SET evens := evens + 1
                ENDIF
                SET i := i + 1
            ENDWHILE
            PRINT evens
        END
    "#;
    assert_eq!(run_program(source, "Nested", ""), "3");
}

#[test]
fn test_e2e_without_stack_map_frames() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let options = CompileOptions {
        generate_stack_map_table: false,
        ..CompileOptions::default()
    };
    let compiled = compile_with(
        "PROGRAM Old DECLARE INTEGER a BEGIN WHILE a < 2 DO SET a := a + 1 ENDWHILE PRINT a END",
        "Old",
        &options,
    );
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(write_and_run(dir.path(), &compiled, "Old", ""), "2");
}

#[test]
fn test_e2e_number_then_text_input() {
    if !java_available() {
        eprintln!("skipping: java not found");
        return;
    }
    let source = r#"
        PROGRAM Mixed DECLARE INTEGER n STRING s INTEGER m BEGIN
            READ n
            READ s
            READ m
            PRINT n
            PRINT "["
            PRINT s
            PRINT "]"
            SET m := m + n
            PRINT m
        END
    "#;
    assert_eq!(
        run_program(source, "Mixed", "21\nknight errant\n  4 \n"),
        "21\n[\nknight errant\n]\n25"
    );
}
