use crate::attribute_info::{
    StackMapFrame, StackMapFrameInner, StackMapTableAttribute, VerificationTypeInfo,
};

/// Verification type tracked by the emitter for locals and stack entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VType {
    Top,
    Integer,
    Null,
    UninitializedThis,
    Object(u16), // constant pool index for the class
    /// Result of a `new` not yet passed to `<init>`; holds the `new` offset.
    Uninitialized(u16),
}

impl VType {
    pub(crate) fn to_verification_type_info(&self) -> VerificationTypeInfo {
        match self {
            VType::Top => VerificationTypeInfo::Top,
            VType::Integer => VerificationTypeInfo::Integer,
            VType::Null => VerificationTypeInfo::Null,
            VType::UninitializedThis => VerificationTypeInfo::UninitializedThis,
            VType::Object(idx) => VerificationTypeInfo::Object { class: *idx },
            VType::Uninitialized(offset) => VerificationTypeInfo::Uninitialized { offset: *offset },
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            VType::Null | VType::UninitializedThis | VType::Object(_) | VType::Uninitialized(_)
        )
    }
}

/// Frame state at one bytecode offset.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub bytecode_offset: u32,
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

/// Collects frames at branch targets and encodes them as a StackMapTable.
pub struct FrameTracker {
    /// Locals of the implicit frame derived from the method descriptor.
    initial_locals: Vec<VType>,
    snapshots: Vec<FrameSnapshot>,
}

impl FrameTracker {
    pub fn new(initial_locals: Vec<VType>) -> Self {
        FrameTracker {
            initial_locals: trim_locals(initial_locals),
            snapshots: Vec::new(),
        }
    }

    /// Record the frame at `offset`. A later record at the same offset wins.
    pub fn record_frame(&mut self, offset: u32, locals: Vec<VType>, stack: Vec<VType>) {
        let locals = trim_locals(locals);
        if let Some(existing) = self.snapshots.iter_mut().find(|s| s.bytecode_offset == offset) {
            existing.locals = locals;
            existing.stack = stack;
            return;
        }
        self.snapshots.push(FrameSnapshot {
            bytecode_offset: offset,
            locals,
            stack,
        });
    }

    pub fn build(mut self) -> Option<StackMapTableAttribute> {
        if self.snapshots.is_empty() {
            return None;
        }

        self.snapshots.sort_by_key(|s| s.bytecode_offset);

        let mut entries = Vec::new();
        let mut prev_offset: i64 = -1;
        let mut prev_locals = self.initial_locals.clone();

        for snapshot in &self.snapshots {
            let offset_delta = (snapshot.bytecode_offset as i64 - prev_offset - 1) as u16;
            prev_offset = snapshot.bytecode_offset as i64;

            entries.push(encode_frame(
                &prev_locals,
                &snapshot.locals,
                &snapshot.stack,
                offset_delta,
            ));
            prev_locals = snapshot.locals.clone();
        }

        Some(StackMapTableAttribute {
            number_of_entries: entries.len() as u16,
            entries,
        })
    }
}

/// Trailing `Top` entries are implicit in a frame.
fn trim_locals(mut locals: Vec<VType>) -> Vec<VType> {
    while locals.last() == Some(&VType::Top) {
        locals.pop();
    }
    locals
}

/// Choose the most compact frame encoding relative to `prev_locals`.
fn encode_frame(
    prev_locals: &[VType],
    locals: &[VType],
    stack: &[VType],
    offset_delta: u16,
) -> StackMapFrame {
    let same_locals = prev_locals == locals;

    if stack.is_empty() && same_locals {
        if offset_delta <= 63 {
            return StackMapFrame {
                frame_type: offset_delta as u8,
                inner: StackMapFrameInner::SameFrame {},
            };
        }
        return StackMapFrame {
            frame_type: 251,
            inner: StackMapFrameInner::SameFrameExtended { offset_delta },
        };
    }

    if stack.len() == 1 && same_locals {
        let stack_item = stack[0].to_verification_type_info();
        if offset_delta <= 63 {
            return StackMapFrame {
                frame_type: 64 + offset_delta as u8,
                inner: StackMapFrameInner::SameLocals1StackItemFrame { stack: stack_item },
            };
        }
        return StackMapFrame {
            frame_type: 247,
            inner: StackMapFrameInner::SameLocals1StackItemFrameExtended {
                offset_delta,
                stack: stack_item,
            },
        };
    }

    if stack.is_empty() && locals.len() > prev_locals.len() {
        let extra = locals.len() - prev_locals.len();
        if (1..=3).contains(&extra) && locals[..prev_locals.len()] == *prev_locals {
            return StackMapFrame {
                frame_type: 251 + extra as u8,
                inner: StackMapFrameInner::AppendFrame {
                    offset_delta,
                    locals: locals[prev_locals.len()..]
                        .iter()
                        .map(VType::to_verification_type_info)
                        .collect(),
                },
            };
        }
    }

    if stack.is_empty() && locals.len() < prev_locals.len() {
        let chopped = prev_locals.len() - locals.len();
        if (1..=3).contains(&chopped) && prev_locals[..locals.len()] == *locals {
            return StackMapFrame {
                frame_type: (251 - chopped) as u8,
                inner: StackMapFrameInner::ChopFrame { offset_delta },
            };
        }
    }

    let local_vtypes: Vec<VerificationTypeInfo> =
        locals.iter().map(VType::to_verification_type_info).collect();
    let stack_vtypes: Vec<VerificationTypeInfo> =
        stack.iter().map(VType::to_verification_type_info).collect();

    StackMapFrame {
        frame_type: 255,
        inner: StackMapFrameInner::FullFrame {
            offset_delta,
            number_of_locals: local_vtypes.len() as u16,
            locals: local_vtypes,
            number_of_stack_items: stack_vtypes.len() as u16,
            stack: stack_vtypes,
        },
    }
}
