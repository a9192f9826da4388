use log::{debug, error, warn};

use super::ast::*;
use super::emitter::{BranchCondition, Emitter};
use super::scope::ScopeTable;
use super::{CompileError, CompileOptions, Diagnostic, Severity, UndeclaredPolicy};

pub(crate) const CONSOLE_FIELD: &str = "stdin";
pub(crate) const SCANNER_CLASS: &str = "java/util/Scanner";
pub(crate) const SCANNER_DESCRIPTOR: &str = "Ljava/util/Scanner;";

const SYSTEM_CLASS: &str = "java/lang/System";
const STRING_CLASS: &str = "java/lang/String";
const INTEGER_CLASS: &str = "java/lang/Integer";
const RETURNS_STRING_DESCRIPTOR: &str = "()Ljava/lang/String;";
const PRINT_STREAM_CLASS: &str = "java/io/PrintStream";
const PRINT_STREAM_DESCRIPTOR: &str = "Ljava/io/PrintStream;";

/// Walks a KnightCode program and drives an `Emitter` for `main`.
///
/// The scope table and emitter are passed into every call rather than owned,
/// so the same generator can be pointed at a fresh method body in tests.
pub struct CodeGenerator<'o> {
    class_name: String,
    options: &'o CompileOptions,
    diagnostics: Vec<Diagnostic>,
    uses_console_input: bool,
}

impl<'o> CodeGenerator<'o> {
    pub fn new(class_name: &str, options: &'o CompileOptions) -> Self {
        CodeGenerator {
            class_name: class_name.to_string(),
            options,
            diagnostics: Vec::new(),
            uses_console_input: false,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// True once a `READ` statement has been generated; the class then needs
    /// the shared console reader field.
    pub fn uses_console_input(&self) -> bool {
        self.uses_console_input
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    fn report_error(&mut self, message: String) {
        error!("{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    pub fn generate_program(
        &mut self,
        program: &Program,
        scope: &mut ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        if let Some(declarations) = &program.declare {
            self.gen_declare(declarations, scope, em)?;
        }
        self.gen_block(&program.body, scope, em)
    }

    fn gen_declare(
        &mut self,
        declarations: &[Declaration],
        scope: &mut ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        for decl in declarations {
            let slot = match scope.declare(&decl.name, decl.ty, decl.ty.default_value()) {
                Ok(variable) => variable.slot(),
                Err(CompileError::DuplicateDeclaration { name }) => {
                    self.warn(format!(
                        "variable '{}' is already declared in this scope; ignoring redeclaration as {}",
                        name, decl.ty
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!("declared {} {} in slot {}", decl.ty, decl.name, slot);
            match decl.ty {
                VarType::Integer => em.emit_int_constant(0)?,
                VarType::Text => em.emit_text_constant("")?,
            }
            em.emit_store(slot, decl.ty.into())?;
        }
        Ok(())
    }

    /// Statements of a nested block, in their own scope.
    fn gen_nested(
        &mut self,
        stmts: &[Stmt],
        scope: &mut ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        scope.enter_scope();
        let result = self.gen_block(stmts, scope, em);
        scope.exit_scope();
        result
    }

    fn gen_block(
        &mut self,
        stmts: &[Stmt],
        scope: &mut ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        for stmt in stmts {
            self.gen_stmt(stmt, scope, em)?;
        }
        Ok(())
    }

    /// Slot and type of `name`, following the undeclared-variable policy.
    /// `Ok(None)` means the reference was reported and should be skipped.
    fn resolve(
        &mut self,
        scope: &ScopeTable,
        name: &str,
    ) -> Result<Option<(u16, VarType)>, CompileError> {
        if let Some(variable) = scope.lookup(name) {
            return Ok(Some((variable.slot(), variable.var_type())));
        }
        match self.options.undeclared_policy {
            UndeclaredPolicy::Fatal => Err(CompileError::UndeclaredVariable {
                name: name.to_string(),
            }),
            UndeclaredPolicy::Report => {
                self.report_error(format!("variable '{}' has not been declared", name));
                Ok(None)
            }
        }
    }

    fn gen_stmt(
        &mut self,
        stmt: &Stmt,
        scope: &mut ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        match stmt {
            Stmt::Print(PrintArg::Text(text)) => {
                em.emit_get_static(SYSTEM_CLASS, "out", PRINT_STREAM_DESCRIPTOR)?;
                em.emit_text_constant(text)?;
                em.emit_invoke_virtual(PRINT_STREAM_CLASS, "println", "(Ljava/lang/String;)V")?;
            }
            Stmt::Print(PrintArg::Variable(name)) => {
                let Some((slot, ty)) = self.resolve(scope, name)? else {
                    return Ok(());
                };
                em.emit_get_static(SYSTEM_CLASS, "out", PRINT_STREAM_DESCRIPTOR)?;
                em.emit_load(slot, ty.into())?;
                let descriptor = format!("({})V", ty.descriptor());
                em.emit_invoke_virtual(PRINT_STREAM_CLASS, "println", &descriptor)?;
            }
            Stmt::Read { name } => {
                let Some((slot, ty)) = self.resolve(scope, name)? else {
                    return Ok(());
                };
                self.uses_console_input = true;
                em.emit_get_static(&self.class_name, CONSOLE_FIELD, SCANNER_DESCRIPTOR)?;
                // one line per READ, whatever the type
                em.emit_invoke_virtual(SCANNER_CLASS, "nextLine", RETURNS_STRING_DESCRIPTOR)?;
                if ty == VarType::Integer {
                    em.emit_invoke_virtual(STRING_CLASS, "trim", RETURNS_STRING_DESCRIPTOR)?;
                    em.emit_invoke_static(INTEGER_CLASS, "parseInt", "(Ljava/lang/String;)I")?;
                }
                em.emit_store(slot, ty.into())?;
            }
            Stmt::Setvar { name, value } => {
                let Some((slot, ty)) = self.resolve(scope, name)? else {
                    return Ok(());
                };
                match value {
                    SetValue::Text(text) => {
                        if ty != VarType::Text {
                            self.warn(format!(
                                "assigning a string literal to {} variable '{}'",
                                ty, name
                            ));
                        }
                        em.emit_text_constant(text)?;
                        em.emit_store(slot, ty.into())?;
                        scope.set_value(name, Value::Text(text.clone()))?;
                    }
                    SetValue::Expr(expr) => {
                        let expr_ty = expr_type(scope, expr);
                        if expr_ty != ty {
                            self.warn(format!(
                                "assigning a {} expression to {} variable '{}'",
                                expr_ty, ty, name
                            ));
                        }
                        self.gen_expr(expr, scope, em)?;
                        em.emit_store(slot, ty.into())?;
                        if let Expr::Number(n) = expr {
                            scope.set_value(name, Value::Integer(*n))?;
                        }
                    }
                }
            }
            Stmt::Decision {
                condition,
                then_branch,
                else_branch,
            } => {
                let true_label = em.new_label();
                let end_label = em.new_label();
                self.load_operand(&condition.left, scope, em)?;
                self.load_operand(&condition.right, scope, em)?;
                em.emit_branch(condition.op.into(), true_label)?;
                // the false path falls through: else block (if any), then skip the then block
                if let Some(else_branch) = else_branch {
                    self.gen_nested(else_branch, scope, em)?;
                }
                em.emit_jump(end_label)?;
                em.bind_label(true_label)?;
                self.gen_nested(then_branch, scope, em)?;
                em.bind_label(end_label)?;
            }
            Stmt::Loop { condition, body } => {
                let start_label = em.new_label();
                let end_label = em.new_label();
                em.bind_label(start_label)?;
                self.load_operand(&condition.left, scope, em)?;
                self.load_operand(&condition.right, scope, em)?;
                em.emit_branch(BranchCondition::from(condition.op).negate(), end_label)?;
                self.gen_nested(body, scope, em)?;
                em.emit_jump(start_label)?;
                em.bind_label(end_label)?;
            }
        }
        Ok(())
    }

    fn load_operand(
        &mut self,
        operand: &Operand,
        scope: &ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        match operand {
            Operand::Number(n) => em.emit_int_constant(*n),
            Operand::Ident(name) => self.load_variable(name, scope, em),
        }
    }

    fn load_variable(
        &mut self,
        name: &str,
        scope: &ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        match self.resolve(scope, name)? {
            Some((slot, ty)) => em.emit_load(slot, ty.into()),
            // keeps the stack balanced after a reported error
            None => em.emit_int_constant(0),
        }
    }

    /// Leaves exactly one value on the operand stack.
    pub fn gen_expr(
        &mut self,
        expr: &Expr,
        scope: &ScopeTable,
        em: &mut Emitter,
    ) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => em.emit_int_constant(*n),
            Expr::Ident(name) => self.load_variable(name, scope, em),
            Expr::Paren(inner) => self.gen_expr(inner, scope, em),
            Expr::Binary { op, left, right } => {
                self.gen_expr(left, scope, em)?;
                self.gen_expr(right, scope, em)?;
                em.emit_arithmetic(*op)
            }
            Expr::Compare { op, left, right } => {
                let true_label = em.new_label();
                let end_label = em.new_label();
                self.gen_expr(left, scope, em)?;
                self.gen_expr(right, scope, em)?;
                em.emit_branch((*op).into(), true_label)?;
                em.emit_int_constant(0)?;
                em.emit_jump(end_label)?;
                em.bind_label(true_label)?;
                em.emit_int_constant(1)?;
                em.bind_label(end_label)
            }
        }
    }
}

/// Static type of an expression: identifiers have their declared type,
/// everything else is an integer.
fn expr_type(scope: &ScopeTable, expr: &Expr) -> VarType {
    match expr {
        Expr::Ident(name) => scope
            .lookup(name)
            .map(|v| v.var_type())
            .unwrap_or(VarType::Integer),
        Expr::Paren(inner) => expr_type(scope, inner),
        _ => VarType::Integer,
    }
}
