pub mod ast;
pub mod class_writer;
pub mod codegen;
pub mod descriptor;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod stackmap;

use std::fmt;
use std::io::Write;
use std::path::Path;

use log::{debug, info};

use crate::types::ConstantPoolError;
use crate::ClassFile;

use self::ast::Program;
use self::lexer::Lexer;
use self::parser::Parser;

#[derive(Debug)]
pub enum CompileError {
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
    UndeclaredVariable {
        name: String,
    },
    DuplicateDeclaration {
        name: String,
    },
    UnresolvedLabel {
        label: usize,
    },
    Codegen {
        message: String,
    },
    Io(std::io::Error),
    Binary(binrw::Error),
}

impl CompileError {
    pub(crate) fn codegen(message: impl Into<String>) -> Self {
        CompileError::Codegen {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse {
                line,
                column,
                message,
            } => write!(f, "parse error at {}:{}: {}", line, column, message),
            CompileError::UndeclaredVariable { name } => {
                write!(f, "variable '{}' has not been declared", name)
            }
            CompileError::DuplicateDeclaration { name } => {
                write!(f, "variable '{}' is already declared in this scope", name)
            }
            CompileError::UnresolvedLabel { label } => {
                write!(f, "internal error: label {} was referenced but never bound", label)
            }
            CompileError::Codegen { message } => write!(f, "codegen error: {}", message),
            CompileError::Io(e) => write!(f, "I/O error: {e}"),
            CompileError::Binary(e) => write!(f, "class file encoding error: {e}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Io(e) => Some(e),
            CompileError::Binary(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}

impl From<binrw::Error> for CompileError {
    fn from(e: binrw::Error) -> Self {
        CompileError::Binary(e)
    }
}

impl From<ConstantPoolError> for CompileError {
    fn from(e: ConstantPoolError) -> Self {
        CompileError::codegen(e.to_string())
    }
}

/// A fatal error together with the diagnostics recorded before it.
#[derive(Debug)]
pub struct CompileFailure {
    pub error: CompileError,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for CompileFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<CompileError> for CompileFailure {
    fn from(error: CompileError) -> Self {
        CompileFailure {
            error,
            diagnostics: Vec::new(),
        }
    }
}

/// How references to undeclared variables are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UndeclaredPolicy {
    /// Abort generation with `CompileError::UndeclaredVariable`.
    #[default]
    Fatal,
    /// Record an error diagnostic and keep generating.
    Report,
}

#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Emit a Java 8 class with `StackMapTable` frames. When false a Java 5
    /// class without frames is written instead.
    pub generate_stack_map_table: bool,
    pub undeclared_policy: UndeclaredPolicy,
    /// Recorded in the `SourceFile` attribute when set.
    pub source_file: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            generate_stack_map_table: true,
            undeclared_policy: UndeclaredPolicy::Fatal,
            source_file: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal problem found during generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// A generated class plus whatever was reported while generating it.
#[derive(Debug)]
pub struct CompiledClass {
    pub class_file: ClassFile,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledClass {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        Ok(self.class_file.to_bytes()?)
    }

    /// Serialize, then move the finished artifact into place. The bytes are
    /// staged in a temporary file next to `path`, so a failed write never
    /// leaves a partial class file behind.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::Builder::new()
            .prefix(".kcc-")
            .suffix(".class.tmp")
            .tempfile_in(dir)?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        staged.persist(path).map_err(|e| e.error)?;
        info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Parse KnightCode source into a program tree.
pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Generate a runnable class named `class_name` (JVM internal form, e.g.
/// `Hello` or `output/Hello`) from a program tree.
pub fn compile_program(
    program: &Program,
    class_name: &str,
    options: &CompileOptions,
) -> Result<CompiledClass, CompileFailure> {
    debug!("compiling program '{}' as class {}", program.name, class_name);
    class_writer::build_class(program, class_name, options)
}

/// Parse and compile in one step.
pub fn compile_source(
    source: &str,
    class_name: &str,
    options: &CompileOptions,
) -> Result<CompiledClass, CompileFailure> {
    let program = parse_program(source)?;
    compile_program(&program, class_name, options)
}
