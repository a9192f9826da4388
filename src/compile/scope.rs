//! Lexically scoped variable table with sequential slot assignment.

use indexmap::IndexMap;
use log::trace;

use super::ast::{Value, VarType};
use super::CompileError;

/// Slot 0 of `main` holds the `String[]` argument.
pub const FIRST_VARIABLE_SLOT: u16 = 1;

/// A declared variable. Name, type and slot are fixed at declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    name: String,
    var_type: VarType,
    slot: u16,
    value: Value,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    /// Last literal recorded for this variable. Bookkeeping only.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug)]
pub struct ScopeTable {
    scopes: Vec<IndexMap<String, Variable>>,
    next_slot: u16,
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTable {
    pub fn new() -> Self {
        ScopeTable {
            scopes: vec![IndexMap::new()],
            next_slot: FIRST_VARIABLE_SLOT,
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(IndexMap::new());
        trace!("enter scope (depth {})", self.scopes.len());
    }

    /// Pops the innermost scope. The outermost scope is never removed.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            trace!("exit scope (depth {})", self.scopes.len());
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// The slot the next declaration will receive.
    pub fn next_slot(&self) -> u16 {
        self.next_slot
    }

    pub fn declare(
        &mut self,
        name: &str,
        var_type: VarType,
        default_value: Value,
    ) -> Result<&Variable, CompileError> {
        let slot = self.next_slot;
        let next_slot = slot.checked_add(1).ok_or_else(|| {
            CompileError::codegen(format!(
                "too many variables: cannot allocate slot for '{}'",
                name
            ))
        })?;

        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| CompileError::codegen("scope stack is empty"))?;
        if scope.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }

        self.next_slot = next_slot;
        let variable = Variable {
            name: name.to_string(),
            var_type,
            slot,
            value: default_value,
        };
        let entry = scope.entry(name.to_string()).or_insert(variable);
        Ok(entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Record `value` on the nearest visible `name`.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), CompileError> {
        let variable = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| CompileError::UndeclaredVariable {
                name: name.to_string(),
            })?;
        variable.value = value;
        Ok(())
    }

    /// Variables of the innermost scope in declaration order.
    pub fn current_scope(&self) -> impl Iterator<Item = &Variable> {
        self.scopes.last().into_iter().flat_map(|scope| scope.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(table: &mut ScopeTable, name: &str, ty: VarType) -> u16 {
        table.declare(name, ty, ty.default_value()).unwrap().slot()
    }

    #[test]
    fn slots_start_at_one_and_increase() {
        let mut table = ScopeTable::new();
        assert_eq!(declare(&mut table, "a", VarType::Integer), 1);
        assert_eq!(declare(&mut table, "b", VarType::Text), 2);
        table.enter_scope();
        assert_eq!(declare(&mut table, "c", VarType::Integer), 3);
        table.exit_scope();
        // slots are not reclaimed
        assert_eq!(declare(&mut table, "d", VarType::Integer), 4);
        assert_eq!(table.next_slot(), 5);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = ScopeTable::new();
        declare(&mut table, "a", VarType::Integer);
        let err = table.declare("a", VarType::Text, VarType::Text.default_value()).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { ref name } if name == "a"));
        let a = table.lookup("a").unwrap();
        assert_eq!(a.slot(), 1);
        assert_eq!(a.var_type(), VarType::Integer);
        assert_eq!(table.next_slot(), 2);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = ScopeTable::new();
        declare(&mut table, "x", VarType::Integer);
        table.enter_scope();
        declare(&mut table, "x", VarType::Text);
        assert_eq!(table.lookup("x").unwrap().slot(), 2);
        table.exit_scope();
        assert_eq!(table.lookup("x").unwrap().slot(), 1);
    }

    #[test]
    fn exiting_the_last_scope_is_a_no_op() {
        let mut table = ScopeTable::new();
        declare(&mut table, "x", VarType::Integer);
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.depth(), 1);
        assert!(table.is_declared("x"));
    }

    #[test]
    fn set_value_updates_nearest_binding() {
        let mut table = ScopeTable::new();
        declare(&mut table, "x", VarType::Integer);
        table.set_value("x", Value::Integer(7)).unwrap();
        assert_eq!(table.lookup("x").unwrap().value(), &Value::Integer(7));
        assert!(matches!(
            table.set_value("missing", Value::Integer(1)),
            Err(CompileError::UndeclaredVariable { .. })
        ));
    }

    #[test]
    fn current_scope_keeps_declaration_order() {
        let mut table = ScopeTable::new();
        for name in ["z", "a", "m"] {
            declare(&mut table, name, VarType::Integer);
        }
        let names: Vec<&str> = table.current_scope().map(Variable::name).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
