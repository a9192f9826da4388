//! Instruction emitter for a single method body.
//!
//! The emitter appends instructions, simulates the operand stack so that
//! `max_stack` and stack map frames come out exact, and resolves branch
//! labels when the body is finalized. It is the only part of code generation
//! that adds entries to the constant pool.

use log::{debug, trace};

use crate::attribute_info::StackMapTableAttribute;
use crate::code_attribute::{byte_addresses, Instruction, WideInstruction};
use crate::ClassFile;

use super::ast::{BinOp, CompareOp, VarType};
use super::descriptor::{parse_field_descriptor, parse_method_descriptor, JvmType};
use super::stackmap::{FrameTracker, VType};
use super::CompileError;

/// Largest code array a method may have.
const MAX_CODE_LENGTH: u32 = 65535;

/// A branch target inside the current method body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label(usize);

impl Label {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Storage category of a local variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Reference,
}

impl From<VarType> for ValueType {
    fn from(ty: VarType) -> Self {
        match ty {
            VarType::Integer => ValueType::Int,
            VarType::Text => ValueType::Reference,
        }
    }
}

/// Two-operand integer comparison used by `emit_branch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchCondition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl BranchCondition {
    /// The condition that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        match self {
            BranchCondition::Eq => BranchCondition::Ne,
            BranchCondition::Ne => BranchCondition::Eq,
            BranchCondition::Lt => BranchCondition::Ge,
            BranchCondition::Ge => BranchCondition::Lt,
            BranchCondition::Gt => BranchCondition::Le,
            BranchCondition::Le => BranchCondition::Gt,
        }
    }

    fn instruction(self) -> Instruction {
        match self {
            BranchCondition::Eq => Instruction::IfIcmpeq(0),
            BranchCondition::Ne => Instruction::IfIcmpne(0),
            BranchCondition::Lt => Instruction::IfIcmplt(0),
            BranchCondition::Ge => Instruction::IfIcmpge(0),
            BranchCondition::Gt => Instruction::IfIcmpgt(0),
            BranchCondition::Le => Instruction::IfIcmple(0),
        }
    }
}

impl From<CompareOp> for BranchCondition {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Gt => BranchCondition::Gt,
            CompareOp::Lt => BranchCondition::Lt,
            CompareOp::Eq => BranchCondition::Eq,
            CompareOp::Ne => BranchCondition::Ne,
        }
    }
}

struct LabelState {
    /// Instruction index the label is bound to.
    position: Option<usize>,
    referenced: bool,
    /// Locals on entry, merged over every incoming edge.
    locals: Vec<VType>,
    /// Operand stack on entry, fixed by the first incoming edge.
    stack: Option<Vec<VType>>,
}

/// A finished method body, ready to be wrapped in a `Code` attribute.
#[derive(Debug)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub stack_map_table: Option<StackMapTableAttribute>,
}

pub struct Emitter<'a> {
    class_file: &'a mut ClassFile,
    instructions: Vec<Instruction>,
    labels: Vec<LabelState>,
    patches: Vec<(usize, Label)>, // (instruction_index, target)
    stack: Vec<VType>,
    max_stack: u16,
    locals: Vec<VType>,
    max_locals: u16,
    reachable: bool,
    code_length: u32,
    initial_locals: Vec<VType>,
    generate_stack_map_table: bool,
}

impl<'a> Emitter<'a> {
    /// `initial_locals` are the locals implied by the method descriptor
    /// (e.g. `[String[]]` for `main`, `[UninitializedThis]` for `<init>`).
    pub fn new(
        class_file: &'a mut ClassFile,
        initial_locals: Vec<VType>,
        generate_stack_map_table: bool,
    ) -> Self {
        Emitter {
            class_file,
            instructions: Vec::new(),
            labels: Vec::new(),
            patches: Vec::new(),
            stack: Vec::new(),
            max_stack: 0,
            max_locals: initial_locals.len() as u16,
            locals: initial_locals.clone(),
            reachable: true,
            code_length: 0,
            initial_locals,
            generate_stack_map_table,
        }
    }

    /// Current simulated operand stack depth.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    fn emit(&mut self, instr: Instruction) -> usize {
        let idx = self.instructions.len();
        self.code_length += instr.byte_size();
        self.instructions.push(instr);
        idx
    }

    fn push(&mut self, vtype: VType) {
        self.stack.push(vtype);
        self.max_stack = self.max_stack.max(self.stack.len() as u16);
    }

    fn pop(&mut self) -> Result<VType, CompileError> {
        self.stack
            .pop()
            .ok_or_else(|| CompileError::codegen("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<(), CompileError> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    fn touch_local(&mut self, slot: u16) {
        self.max_locals = self.max_locals.max(slot + 1);
    }

    fn class_vtype(&mut self, internal_name: &str) -> Result<VType, CompileError> {
        Ok(VType::Object(self.class_file.get_or_add_class(internal_name)?))
    }

    fn vtype_for(&mut self, ty: &JvmType) -> Result<VType, CompileError> {
        if ty.is_int_like() {
            return Ok(VType::Integer);
        }
        match ty.class_constant_name() {
            Some(name) => self.class_vtype(&name),
            None => Err(CompileError::codegen(format!(
                "unsupported operand type {}",
                ty.to_descriptor()
            ))),
        }
    }

    // --- Constants ---

    pub fn emit_int_constant(&mut self, value: i32) -> Result<(), CompileError> {
        let instr = match value {
            -1 => Instruction::Iconstm1,
            0 => Instruction::Iconst0,
            1 => Instruction::Iconst1,
            2 => Instruction::Iconst2,
            3 => Instruction::Iconst3,
            4 => Instruction::Iconst4,
            5 => Instruction::Iconst5,
            v if (-128..=127).contains(&v) => Instruction::Bipush(v as i8),
            v if (-32768..=32767).contains(&v) => Instruction::Sipush(v as i16),
            v => {
                let cp_idx = self.class_file.get_or_add_integer(v)?;
                self.emit_ldc(cp_idx);
                self.push(VType::Integer);
                return Ok(());
            }
        };
        self.emit(instr);
        self.push(VType::Integer);
        Ok(())
    }

    pub fn emit_text_constant(&mut self, value: &str) -> Result<(), CompileError> {
        let cp_idx = self.class_file.get_or_add_string(value)?;
        self.emit_ldc(cp_idx);
        let string = self.class_vtype("java/lang/String")?;
        self.push(string);
        Ok(())
    }

    fn emit_ldc(&mut self, cp_idx: u16) {
        if cp_idx <= 255 {
            self.emit(Instruction::Ldc(cp_idx as u8));
        } else {
            self.emit(Instruction::LdcW(cp_idx));
        }
    }

    // --- Locals ---

    pub fn emit_load(&mut self, slot: u16, ty: ValueType) -> Result<(), CompileError> {
        match ty {
            ValueType::Reference => {
                match slot {
                    0 => self.emit(Instruction::Aload0),
                    1 => self.emit(Instruction::Aload1),
                    2 => self.emit(Instruction::Aload2),
                    3 => self.emit(Instruction::Aload3),
                    s if s <= 255 => self.emit(Instruction::Aload(s as u8)),
                    s => self.emit(Instruction::Wide(WideInstruction::Aload(s))),
                };
                let vtype = match self.locals.get(slot as usize) {
                    Some(v) if v.is_reference() => v.clone(),
                    _ => self.class_vtype("java/lang/String")?,
                };
                self.push(vtype);
            }
            ValueType::Int => {
                match slot {
                    0 => self.emit(Instruction::Iload0),
                    1 => self.emit(Instruction::Iload1),
                    2 => self.emit(Instruction::Iload2),
                    3 => self.emit(Instruction::Iload3),
                    s if s <= 255 => self.emit(Instruction::Iload(s as u8)),
                    s => self.emit(Instruction::Wide(WideInstruction::Iload(s))),
                };
                self.push(VType::Integer);
            }
        }
        self.touch_local(slot);
        Ok(())
    }

    pub fn emit_store(&mut self, slot: u16, ty: ValueType) -> Result<(), CompileError> {
        let value = self.pop()?;
        match ty {
            ValueType::Reference => {
                match slot {
                    0 => self.emit(Instruction::Astore0),
                    1 => self.emit(Instruction::Astore1),
                    2 => self.emit(Instruction::Astore2),
                    3 => self.emit(Instruction::Astore3),
                    s if s <= 255 => self.emit(Instruction::Astore(s as u8)),
                    s => self.emit(Instruction::Wide(WideInstruction::Astore(s))),
                };
            }
            ValueType::Int => {
                match slot {
                    0 => self.emit(Instruction::Istore0),
                    1 => self.emit(Instruction::Istore1),
                    2 => self.emit(Instruction::Istore2),
                    3 => self.emit(Instruction::Istore3),
                    s if s <= 255 => self.emit(Instruction::Istore(s as u8)),
                    s => self.emit(Instruction::Wide(WideInstruction::Istore(s))),
                };
            }
        }
        let idx = slot as usize;
        if self.locals.len() <= idx {
            self.locals.resize(idx + 1, VType::Top);
        }
        self.locals[idx] = value;
        self.touch_local(slot);
        Ok(())
    }

    pub fn emit_arithmetic(&mut self, op: BinOp) -> Result<(), CompileError> {
        self.pop_n(2)?;
        self.emit(match op {
            BinOp::Add => Instruction::Iadd,
            BinOp::Sub => Instruction::Isub,
            BinOp::Mul => Instruction::Imul,
            BinOp::Div => Instruction::Idiv,
        });
        self.push(VType::Integer);
        Ok(())
    }

    // --- Control flow ---

    pub fn new_label(&mut self) -> Label {
        let id = self.labels.len();
        self.labels.push(LabelState {
            position: None,
            referenced: false,
            locals: self.locals.clone(),
            stack: None,
        });
        Label(id)
    }

    fn label_state(&mut self, label: Label) -> Result<&mut LabelState, CompileError> {
        self.labels
            .get_mut(label.0)
            .ok_or_else(|| CompileError::codegen(format!("unknown label {}", label.0)))
    }

    /// Record the current state as one incoming edge of `label`.
    fn record_edge(&mut self, label: Label) -> Result<(), CompileError> {
        let stack = self.stack.clone();
        let locals = self.locals.clone();
        let state = self.label_state(label)?;
        match &state.stack {
            Some(expected) if *expected != stack => {
                return Err(CompileError::codegen(format!(
                    "inconsistent operand stack at label {}: {} vs {} entries",
                    label.0,
                    expected.len(),
                    stack.len()
                )));
            }
            Some(_) => {}
            None => state.stack = Some(stack),
        }
        merge_locals(&mut state.locals, &locals);
        Ok(())
    }

    /// Pops two ints and branches to `label` when `cond` holds.
    pub fn emit_branch(&mut self, cond: BranchCondition, label: Label) -> Result<(), CompileError> {
        self.pop_n(2)?;
        self.record_edge(label)?;
        self.label_state(label)?.referenced = true;
        let idx = self.emit(cond.instruction());
        self.patches.push((idx, label));
        Ok(())
    }

    pub fn emit_jump(&mut self, label: Label) -> Result<(), CompileError> {
        self.record_edge(label)?;
        self.label_state(label)?.referenced = true;
        let idx = self.emit(Instruction::Goto(0));
        self.patches.push((idx, label));
        self.reachable = false;
        self.stack.clear();
        Ok(())
    }

    pub fn bind_label(&mut self, label: Label) -> Result<(), CompileError> {
        let position = self.instructions.len();
        if self.label_state(label)?.position.is_some() {
            return Err(CompileError::codegen(format!("label {} bound twice", label.0)));
        }
        if self.reachable {
            self.record_edge(label)?;
        }
        let state = self.label_state(label)?;
        state.position = Some(position);
        let entry_stack = state.stack.clone().unwrap_or_default();
        let entry_locals = state.locals.clone();
        if !self.reachable {
            self.stack = entry_stack;
            self.locals = entry_locals;
            self.reachable = true;
        }
        trace!("bound label {} at instruction {}", label.0, position);
        Ok(())
    }

    // --- Fields, methods, objects ---

    pub fn emit_get_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), CompileError> {
        let ty = field_type(descriptor)?;
        let vtype = self.vtype_for(&ty)?;
        let cp_idx = self.class_file.get_or_add_field_ref(owner, name, descriptor)?;
        self.emit(Instruction::Getstatic(cp_idx));
        self.push(vtype);
        Ok(())
    }

    pub fn emit_put_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), CompileError> {
        field_type(descriptor)?;
        let cp_idx = self.class_file.get_or_add_field_ref(owner, name, descriptor)?;
        self.pop()?;
        self.emit(Instruction::Putstatic(cp_idx));
        Ok(())
    }

    /// Pops the arguments of a call; returns the return type.
    fn pop_arguments(&mut self, descriptor: &str) -> Result<JvmType, CompileError> {
        let (params, ret) = parse_method_descriptor(descriptor).ok_or_else(|| {
            CompileError::codegen(format!("invalid method descriptor: {}", descriptor))
        })?;
        self.pop_n(params.len())?;
        Ok(ret)
    }

    fn push_return(&mut self, ret: &JvmType) -> Result<(), CompileError> {
        if *ret != JvmType::Void {
            let vtype = self.vtype_for(ret)?;
            self.push(vtype);
        }
        Ok(())
    }

    pub fn emit_invoke_virtual(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), CompileError> {
        let ret = self.pop_arguments(descriptor)?;
        self.pop()?;
        let cp_idx = self.class_file.get_or_add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokevirtual(cp_idx));
        self.push_return(&ret)
    }

    pub fn emit_invoke_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), CompileError> {
        let ret = self.pop_arguments(descriptor)?;
        let cp_idx = self.class_file.get_or_add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokestatic(cp_idx));
        self.push_return(&ret)
    }

    /// Constructor and private calls. Calling `<init>` initializes every copy
    /// of the receiver on the stack and in the locals.
    pub fn emit_invoke_special(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), CompileError> {
        let ret = self.pop_arguments(descriptor)?;
        let receiver = self.pop()?;
        let cp_idx = self.class_file.get_or_add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokespecial(cp_idx));

        if name == "<init>" {
            let initialized = match receiver {
                VType::UninitializedThis => Some(VType::Object(self.class_file.this_class)),
                VType::Uninitialized(_) => Some(self.class_vtype(owner)?),
                _ => None,
            };
            if let Some(initialized) = initialized {
                for v in self.stack.iter_mut().chain(self.locals.iter_mut()) {
                    if *v == receiver {
                        *v = initialized.clone();
                    }
                }
            }
        }
        self.push_return(&ret)
    }

    pub fn emit_new(&mut self, class: &str) -> Result<(), CompileError> {
        let offset = u16::try_from(self.code_length)
            .map_err(|_| CompileError::codegen("method body too large"))?;
        let cp_idx = self.class_file.get_or_add_class(class)?;
        self.emit(Instruction::New(cp_idx));
        self.push(VType::Uninitialized(offset));
        Ok(())
    }

    pub fn emit_dup(&mut self) -> Result<(), CompileError> {
        let top = self
            .stack
            .last()
            .cloned()
            .ok_or_else(|| CompileError::codegen("dup on empty operand stack"))?;
        self.emit(Instruction::Dup);
        self.push(top);
        Ok(())
    }

    /// Append the trailing `return`, resolve branch offsets and build frames.
    pub fn finalize(mut self) -> Result<MethodBody, CompileError> {
        if self.reachable {
            self.emit(Instruction::Return);
        }

        if let Some((idx, _)) = self
            .labels
            .iter()
            .enumerate()
            .find(|(_, l)| l.referenced && l.position.is_none())
        {
            return Err(CompileError::UnresolvedLabel { label: idx });
        }

        if self.code_length > MAX_CODE_LENGTH {
            return Err(CompileError::codegen(format!(
                "method body is {} bytes, limit is {}",
                self.code_length, MAX_CODE_LENGTH
            )));
        }

        let addresses = byte_addresses(&self.instructions);
        let address_of = |position: usize| -> u32 {
            addresses.get(position).copied().unwrap_or(self.code_length)
        };

        for &(instr_idx, label) in &self.patches {
            let position = self.labels[label.0]
                .position
                .ok_or(CompileError::UnresolvedLabel { label: label.0 })?;
            let offset = address_of(position) as i64 - addresses[instr_idx] as i64;
            let offset = i16::try_from(offset).map_err(|_| {
                CompileError::codegen(format!("branch offset {} does not fit in 16 bits", offset))
            })?;
            let instr = &self.instructions[instr_idx];
            let patched = instr.with_branch_offset(offset).ok_or_else(|| {
                CompileError::codegen(format!("cannot patch branch offset on {:?}", instr))
            })?;
            self.instructions[instr_idx] = patched;
        }

        let stack_map_table = if self.generate_stack_map_table {
            let mut tracker = FrameTracker::new(self.initial_locals.clone());
            for label in self.labels.iter().filter(|l| l.referenced) {
                if let Some(position) = label.position {
                    tracker.record_frame(
                        address_of(position),
                        label.locals.clone(),
                        label.stack.clone().unwrap_or_default(),
                    );
                }
            }
            tracker.build()
        } else {
            None
        };

        debug!(
            "finalized method body: {} instructions, {} bytes, max_stack {}, max_locals {}, {} frames",
            self.instructions.len(),
            self.code_length,
            self.max_stack,
            self.max_locals,
            stack_map_table.as_ref().map_or(0, |t| t.entries.len())
        );

        Ok(MethodBody {
            instructions: self.instructions,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            stack_map_table,
        })
    }
}

/// Locals that disagree between two incoming edges become `Top`.
fn field_type(descriptor: &str) -> Result<JvmType, CompileError> {
    parse_field_descriptor(descriptor).ok_or_else(|| {
        CompileError::codegen(format!("invalid field descriptor: {}", descriptor))
    })
}

fn merge_locals(into: &mut Vec<VType>, incoming: &[VType]) {
    if incoming.len() < into.len() {
        into.truncate(incoming.len());
    }
    for (current, other) in into.iter_mut().zip(incoming) {
        if current != other {
            *current = VType::Top;
        }
    }
}
