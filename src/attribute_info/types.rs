use std::io::Cursor;

use binrw::{binrw, binwrite, BinResult, BinWrite};

/// A raw attribute: name, length and undecoded payload.
#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct AttributeInfo {
    pub attribute_name_index: u16,
    pub attribute_length: u32,
    #[br(count = attribute_length)]
    pub info: Vec<u8>,
}

impl AttributeInfo {
    fn from_info(attribute_name_index: u16, info: Vec<u8>) -> Self {
        AttributeInfo {
            attribute_name_index,
            attribute_length: info.len() as u32,
            info,
        }
    }

    pub fn code(attribute_name_index: u16, code: &CodeAttribute) -> BinResult<Self> {
        let mut buf = Cursor::new(Vec::new());
        code.write(&mut buf)?;
        Ok(Self::from_info(attribute_name_index, buf.into_inner()))
    }

    pub fn stack_map_table(
        attribute_name_index: u16,
        table: &StackMapTableAttribute,
    ) -> BinResult<Self> {
        let mut buf = Cursor::new(Vec::new());
        table.write(&mut buf)?;
        Ok(Self::from_info(attribute_name_index, buf.into_inner()))
    }

    pub fn source_file(attribute_name_index: u16, sourcefile_index: u16) -> Self {
        Self::from_info(attribute_name_index, sourcefile_index.to_be_bytes().to_vec())
    }

    /// Decode the payload as a `Code` attribute.
    pub fn parse_code(&self) -> BinResult<CodeAttribute> {
        use binrw::BinRead;
        CodeAttribute::read(&mut Cursor::new(&self.info))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: u32,
    #[br(count = code_length)]
    pub code: Vec<u8>,
    pub exception_table_length: u16,
    #[br(count = exception_table_length)]
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binwrite]
#[bw(big)]
pub enum VerificationTypeInfo {
    #[bw(magic = 0u8)]
    Top,
    #[bw(magic = 1u8)]
    Integer,
    #[bw(magic = 2u8)]
    Float,
    #[bw(magic = 3u8)]
    Double,
    #[bw(magic = 4u8)]
    Long,
    #[bw(magic = 5u8)]
    Null,
    #[bw(magic = 6u8)]
    UninitializedThis,
    #[bw(magic = 7u8)]
    Object {
        /// An index into the constant pool for the class of the object
        class: u16,
    },
    #[bw(magic = 8u8)]
    Uninitialized {
        /// Offset into associated code array of a new instruction
        /// that created the object being stored here.
        offset: u16,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binwrite]
#[bw(big)]
pub struct StackMapFrame {
    pub frame_type: u8,
    pub inner: StackMapFrameInner,
}

/// Frame payload; which variant applies is fixed by `frame_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[binwrite]
#[bw(big)]
pub enum StackMapFrameInner {
    SameFrame {},
    SameLocals1StackItemFrame {
        stack: VerificationTypeInfo,
    },
    SameLocals1StackItemFrameExtended {
        offset_delta: u16,
        stack: VerificationTypeInfo,
    },
    ChopFrame {
        offset_delta: u16,
    },
    SameFrameExtended {
        offset_delta: u16,
    },
    AppendFrame {
        offset_delta: u16,
        locals: Vec<VerificationTypeInfo>,
    },
    FullFrame {
        offset_delta: u16,
        number_of_locals: u16,
        locals: Vec<VerificationTypeInfo>,
        number_of_stack_items: u16,
        stack: Vec<VerificationTypeInfo>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binwrite]
#[bw(big)]
pub struct StackMapTableAttribute {
    pub number_of_entries: u16,
    pub entries: Vec<StackMapFrame>,
}
