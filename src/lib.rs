//! A compiler from KnightCode to runnable [Java class files](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html)

use std::path::Path;

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod constant_info;
pub mod field_info;
pub mod method_info;

pub mod code_attribute;

pub mod compile;
pub mod types;

pub use compile::{
    compile_program, compile_source, parse_program, CompileError, CompileFailure, CompileOptions,
    CompiledClass, Diagnostic, Severity, UndeclaredPolicy,
};
pub use types::*;

/// Read a class file back from disk.
///
/// ```no_run
/// let class_file = kcc::load_class("Hello.class").unwrap();
/// println!("version {}.{}", class_file.major_version, class_file.minor_version);
/// ```
pub fn load_class(path: impl AsRef<Path>) -> Result<ClassFile, CompileError> {
    let bytes = std::fs::read(path)?;
    Ok(ClassFile::from_bytes(&bytes)?)
}

/// Compile a KnightCode source file to a class file on disk.
///
/// The class is named after the output file stem. Nothing is written when
/// compilation fails or reports an error diagnostic. The diagnostics are
/// returned either way; on a fatal error they come with the failure.
pub fn compile_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &CompileOptions,
) -> Result<Vec<Diagnostic>, CompileFailure> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let source = std::fs::read_to_string(input).map_err(CompileError::from)?;
    let class_name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            CompileError::codegen(format!(
                "cannot derive a class name from {}",
                output.display()
            ))
        })?;
    let compiled = compile_source(&source, class_name, options)?;
    if !compiled.has_errors() {
        if let Err(error) = compiled.write_to(output) {
            return Err(CompileFailure {
                error,
                diagnostics: compiled.diagnostics,
            });
        }
    }
    Ok(compiled.diagnostics)
}
