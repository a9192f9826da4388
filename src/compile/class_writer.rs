use log::{debug, info};

use crate::attribute_info::{AttributeInfo, CodeAttribute};
use crate::code_attribute::assemble;
use crate::field_info::{FieldAccessFlags, FieldInfo};
use crate::method_info::{MethodAccessFlags, MethodInfo};
use crate::types::{MAJOR_VERSION_JAVA_5, MAJOR_VERSION_JAVA_8};
use crate::ClassFile;

use super::ast::Program;
use super::codegen::{CodeGenerator, CONSOLE_FIELD, SCANNER_CLASS, SCANNER_DESCRIPTOR};
use super::descriptor::is_valid_class_name;
use super::emitter::{Emitter, MethodBody, ValueType};
use super::scope::ScopeTable;
use super::stackmap::VType;
use super::{CompileError, CompileFailure, CompileOptions, CompiledClass};

const OBJECT_CLASS: &str = "java/lang/Object";
const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Build the complete class for `program`: constructor, `main`, and the
/// console reader field with its initializer when the program reads input.
///
/// Diagnostics recorded before a fatal error travel with the error.
pub fn build_class(
    program: &Program,
    class_name: &str,
    options: &CompileOptions,
) -> Result<CompiledClass, CompileFailure> {
    let mut generator = CodeGenerator::new(class_name, options);
    match assemble_class(program, class_name, options, &mut generator) {
        Ok(class_file) => Ok(CompiledClass {
            class_file,
            diagnostics: generator.into_diagnostics(),
        }),
        Err(error) => Err(CompileFailure {
            error,
            diagnostics: generator.into_diagnostics(),
        }),
    }
}

fn assemble_class(
    program: &Program,
    class_name: &str,
    options: &CompileOptions,
    generator: &mut CodeGenerator,
) -> Result<ClassFile, CompileError> {
    if !is_valid_class_name(class_name) {
        return Err(CompileError::codegen(format!("invalid class name '{}'", class_name)));
    }

    let frames = options.generate_stack_map_table;
    let major_version = if frames {
        MAJOR_VERSION_JAVA_8
    } else {
        MAJOR_VERSION_JAVA_5
    };
    let mut class_file = ClassFile::new(major_version, class_name, OBJECT_CLASS)?;

    let init = {
        let mut em = Emitter::new(&mut class_file, vec![VType::UninitializedThis], frames);
        em.emit_load(0, ValueType::Reference)?;
        em.emit_invoke_special(OBJECT_CLASS, "<init>", "()V")?;
        em.finalize()?
    };
    add_method(&mut class_file, MethodAccessFlags::PUBLIC, "<init>", "()V", init)?;

    let args_class = class_file.get_or_add_class("[Ljava/lang/String;")?;
    let mut scope = ScopeTable::new();
    let main = {
        let mut em = Emitter::new(&mut class_file, vec![VType::Object(args_class)], frames);
        generator.generate_program(program, &mut scope, &mut em)?;
        em.finalize()?
    };
    add_method(
        &mut class_file,
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "main",
        MAIN_DESCRIPTOR,
        main,
    )?;

    if generator.uses_console_input() {
        add_console_reader(&mut class_file, class_name, frames)?;
    }

    if let Some(source_file) = &options.source_file {
        let name_index = class_file.get_or_add_utf8("SourceFile")?;
        let sourcefile_index = class_file.get_or_add_utf8(source_file)?;
        class_file
            .attributes
            .push(AttributeInfo::source_file(name_index, sourcefile_index));
    }

    class_file.sync_counts();
    info!(
        "generated class {} (version {}, {} constants, {} methods)",
        class_name,
        major_version,
        class_file.const_pool.len(),
        class_file.methods.len()
    );

    Ok(class_file)
}

/// `private static final Scanner stdin = new Scanner(System.in);`
fn add_console_reader(
    class_file: &mut ClassFile,
    class_name: &str,
    frames: bool,
) -> Result<(), CompileError> {
    let name_index = class_file.get_or_add_utf8(CONSOLE_FIELD)?;
    let descriptor_index = class_file.get_or_add_utf8(SCANNER_DESCRIPTOR)?;
    class_file.fields.push(FieldInfo {
        access_flags: FieldAccessFlags::PRIVATE
            | FieldAccessFlags::STATIC
            | FieldAccessFlags::FINAL,
        name_index,
        descriptor_index,
        attributes_count: 0,
        attributes: Vec::new(),
    });

    let clinit = {
        let mut em = Emitter::new(class_file, Vec::new(), frames);
        em.emit_new(SCANNER_CLASS)?;
        em.emit_dup()?;
        em.emit_get_static("java/lang/System", "in", "Ljava/io/InputStream;")?;
        em.emit_invoke_special(SCANNER_CLASS, "<init>", "(Ljava/io/InputStream;)V")?;
        em.emit_put_static(class_name, CONSOLE_FIELD, SCANNER_DESCRIPTOR)?;
        em.finalize()?
    };
    add_method(class_file, MethodAccessFlags::STATIC, "<clinit>", "()V", clinit)
}

fn add_method(
    class_file: &mut ClassFile,
    access_flags: MethodAccessFlags,
    name: &str,
    descriptor: &str,
    body: MethodBody,
) -> Result<(), CompileError> {
    let code = assemble(&body.instructions)?;

    let mut attributes = Vec::new();
    if let Some(table) = &body.stack_map_table {
        let table_name = class_file.get_or_add_utf8("StackMapTable")?;
        attributes.push(AttributeInfo::stack_map_table(table_name, table)?);
    }

    let code_attribute = CodeAttribute {
        max_stack: body.max_stack,
        max_locals: body.max_locals,
        code_length: code.len() as u32,
        code,
        exception_table_length: 0,
        exception_table: Vec::new(),
        attributes_count: attributes.len() as u16,
        attributes,
    };
    let code_name = class_file.get_or_add_utf8("Code")?;
    let code_info = AttributeInfo::code(code_name, &code_attribute)?;

    let name_index = class_file.get_or_add_utf8(name)?;
    let descriptor_index = class_file.get_or_add_utf8(descriptor)?;
    debug!(
        "method {}{}: {} bytes of code, max_stack {}, max_locals {}",
        name, descriptor, code_attribute.code_length, body.max_stack, body.max_locals
    );
    class_file.methods.push(MethodInfo {
        access_flags,
        name_index,
        descriptor_index,
        attributes_count: 1,
        attributes: vec![code_info],
    });
    Ok(())
}
