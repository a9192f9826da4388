use std::fmt;
use std::io::Cursor;

use crate::attribute_info::AttributeInfo;
use crate::constant_info::{
    ClassConstant, ConstantInfo, FieldRefConstant, IntegerConstant, MethodRefConstant,
    NameAndTypeConstant, StringConstant, Utf8Constant,
};
use crate::field_info::FieldInfo;
use crate::method_info::MethodInfo;

use binrw::{binrw, BinRead, BinWrite};

/// Class file major version that requires `StackMapTable` frames (Java 8).
pub const MAJOR_VERSION_JAVA_8: u16 = 52;
/// Last class file major version verified by type inference (Java 5).
pub const MAJOR_VERSION_JAVA_5: u16 = 49;

#[derive(Clone, Debug)]
#[binrw]
#[brw(big, magic = b"\xca\xfe\xba\xbe")]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub const_pool_size: u16,
    #[br(count = const_pool_size.saturating_sub(1))]
    pub const_pool: Vec<ConstantInfo>,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces_count: u16,
    #[br(count = interfaces_count)]
    pub interfaces: Vec<u16>,
    pub fields_count: u16,
    #[br(count = fields_count)]
    pub fields: Vec<FieldInfo>,
    pub methods_count: u16,
    #[br(count = methods_count)]
    pub methods: Vec<MethodInfo>,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[binrw]
#[brw(big)]
pub struct ClassAccessFlags(u16);

bitflags! {
    impl ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;     //	Declared public; may be accessed from outside its package.
        const FINAL = 0x0010;      //	Declared final; no subclasses allowed.
        const SUPER = 0x0020;      //	Treat superclass methods specially when invoked by the invokespecial instruction.
        const SYNTHETIC = 0x1000;  //	Declared synthetic; not present in the source code.
    }
}

/// A constant that cannot be added to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstantPoolError {
    /// The pool is indexed by `u16` and slot 0 is reserved.
    Full,
    /// `CONSTANT_Utf8_info` stores its byte length in a `u16`.
    Utf8TooLong { length: usize },
}

impl fmt::Display for ConstantPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantPoolError::Full => {
                write!(f, "constant pool exceeds {} entries", u16::MAX - 1)
            }
            ConstantPoolError::Utf8TooLong { length } => write!(
                f,
                "string constant is {} bytes long; the limit is {}",
                length,
                u16::MAX
            ),
        }
    }
}

impl std::error::Error for ConstantPoolError {}

impl ClassFile {
    /// An empty public class `this_class extends super_class` at the given version.
    pub fn new(
        major_version: u16,
        this_class: &str,
        super_class: &str,
    ) -> Result<Self, ConstantPoolError> {
        let mut class_file = ClassFile {
            minor_version: 0,
            major_version,
            const_pool_size: 1,
            const_pool: Vec::new(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class: 0,
            super_class: 0,
            interfaces_count: 0,
            interfaces: Vec::new(),
            fields_count: 0,
            fields: Vec::new(),
            methods_count: 0,
            methods: Vec::new(),
            attributes_count: 0,
            attributes: Vec::new(),
        };
        class_file.this_class = class_file.get_or_add_class(this_class)?;
        class_file.super_class = class_file.get_or_add_class(super_class)?;
        Ok(class_file)
    }

    pub fn from_bytes(bytes: &[u8]) -> binrw::BinResult<Self> {
        ClassFile::read(&mut Cursor::new(bytes))
    }

    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.write(&mut out)?;
        Ok(out.into_inner())
    }

    /// Recompute every `*_count` field from the vectors it describes.
    pub fn sync_counts(&mut self) {
        self.const_pool_size = (self.const_pool.len() + 1) as u16;
        self.interfaces_count = self.interfaces.len() as u16;
        self.fields_count = self.fields.len() as u16;
        self.methods_count = self.methods.len() as u16;
        self.attributes_count = self.attributes.len() as u16;
    }

    /// Look up a constant by its 1-based pool index.
    pub fn constant(&self, index: u16) -> Option<&ConstantInfo> {
        if index == 0 {
            return None;
        }
        self.const_pool.get(index as usize - 1)
    }

    pub fn get_utf8(&self, index: u16) -> Option<String> {
        match self.constant(index)? {
            ConstantInfo::Utf8(u) => Some(u.to_string_lossy()),
            _ => None,
        }
    }

    /// Internal name of the class a `Class` constant refers to.
    pub fn class_name(&self, index: u16) -> Option<String> {
        match self.constant(index)? {
            ConstantInfo::Class(c) => self.get_utf8(c.name_index),
            _ => None,
        }
    }

    fn find_constant(&self, predicate: impl Fn(&ConstantInfo) -> bool) -> Option<u16> {
        self.const_pool
            .iter()
            .position(predicate)
            .map(|i| (i + 1) as u16)
    }

    fn push_constant(&mut self, constant: ConstantInfo) -> Result<u16, ConstantPoolError> {
        if self.const_pool.len() + 1 >= u16::MAX as usize {
            return Err(ConstantPoolError::Full);
        }
        self.const_pool.push(constant);
        self.const_pool_size = (self.const_pool.len() + 1) as u16;
        Ok(self.const_pool.len() as u16)
    }

    pub fn get_or_add_utf8(&mut self, value: &str) -> Result<u16, ConstantPoolError> {
        let encoded = Utf8Constant::new(value);
        if encoded.bytes.len() > u16::MAX as usize {
            return Err(ConstantPoolError::Utf8TooLong {
                length: encoded.bytes.len(),
            });
        }
        if let Some(idx) =
            self.find_constant(|c| matches!(c, ConstantInfo::Utf8(u) if *u == encoded))
        {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::Utf8(encoded))
    }

    pub fn get_or_add_integer(&mut self, value: i32) -> Result<u16, ConstantPoolError> {
        if let Some(idx) =
            self.find_constant(|c| matches!(c, ConstantInfo::Integer(i) if i.value == value))
        {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::Integer(IntegerConstant { value }))
    }

    pub fn get_or_add_class(&mut self, internal_name: &str) -> Result<u16, ConstantPoolError> {
        let name_index = self.get_or_add_utf8(internal_name)?;
        if let Some(idx) = self.find_constant(
            |c| matches!(c, ConstantInfo::Class(cls) if cls.name_index == name_index),
        ) {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn get_or_add_string(&mut self, value: &str) -> Result<u16, ConstantPoolError> {
        let string_index = self.get_or_add_utf8(value)?;
        if let Some(idx) = self.find_constant(
            |c| matches!(c, ConstantInfo::String(s) if s.string_index == string_index),
        ) {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn get_or_add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let name_index = self.get_or_add_utf8(name)?;
        let descriptor_index = self.get_or_add_utf8(descriptor)?;
        if let Some(idx) = self.find_constant(|c| {
            matches!(c, ConstantInfo::NameAndType(nt)
                if nt.name_index == name_index && nt.descriptor_index == descriptor_index)
        }) {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn get_or_add_field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let class_index = self.get_or_add_class(owner)?;
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor)?;
        if let Some(idx) = self.find_constant(|c| {
            matches!(c, ConstantInfo::FieldRef(f)
                if f.class_index == class_index && f.name_and_type_index == name_and_type_index)
        }) {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::FieldRef(FieldRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let class_index = self.get_or_add_class(owner)?;
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor)?;
        if let Some(idx) = self.find_constant(|c| {
            matches!(c, ConstantInfo::MethodRef(m)
                if m.class_index == class_index && m.name_and_type_index == name_and_type_index)
        }) {
            return Ok(idx);
        }
        self.push_constant(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    /// Find a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| self.get_utf8(m.name_index).as_deref() == Some(name))
    }
}
