use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use kcc::code_attribute::{disassemble, Instruction};
use kcc::{compile_source, ClassFile, CompileOptions, CompiledClass};

mod artifact;
mod e2e;
mod scoping;

// --- Test helpers ---

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn java_available() -> bool {
    Command::new("java")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn compile(source: &str, class_name: &str) -> CompiledClass {
    compile_with(source, class_name, &CompileOptions::default())
}

fn compile_with(source: &str, class_name: &str, options: &CompileOptions) -> CompiledClass {
    init_logging();
    compile_source(source, class_name, options).expect("compilation failed")
}

/// Decoded instructions of `main`.
fn main_instructions(class_file: &ClassFile) -> Vec<Instruction> {
    let main = class_file.method("main").expect("no main method");
    let code = main.attributes[0].parse_code().expect("bad Code attribute");
    disassemble(&code.code).expect("bad bytecode")
}

/// Write the class into `dir`, run it with `stdin` as input and return stdout.
fn write_and_run(dir: &Path, compiled: &CompiledClass, class_name: &str, stdin: &str) -> String {
    compiled
        .write_to(dir.join(format!("{}.class", class_name)))
        .expect("failed to write class file");

    let mut child = Command::new("java")
        .arg("-cp")
        .arg(dir)
        .arg(class_name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run java");
    child
        .stdin
        .take()
        .expect("stdin not piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    let run = child.wait_with_output().expect("failed to wait for java");
    assert!(
        run.status.success(),
        "java failed (exit {}): stderr={}",
        run.status,
        String::from_utf8_lossy(&run.stderr)
    );
    String::from_utf8_lossy(&run.stdout).trim().to_string()
}

fn run_program(source: &str, class_name: &str, stdin: &str) -> String {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let compiled = compile(source, class_name);
    write_and_run(dir.path(), &compiled, class_name, stdin)
}
