use binrw::binrw;

/// The constant kinds this compiler writes into a class file.
#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub enum ConstantInfo {
    #[brw(magic = 1u8)]
    Utf8(Utf8Constant),
    #[brw(magic = 3u8)]
    Integer(IntegerConstant),
    #[brw(magic = 7u8)]
    Class(ClassConstant),
    #[brw(magic = 8u8)]
    String(StringConstant),
    #[brw(magic = 9u8)]
    FieldRef(FieldRefConstant),
    #[brw(magic = 10u8)]
    MethodRef(MethodRefConstant),
    #[brw(magic = 12u8)]
    NameAndType(NameAndTypeConstant),
}

/// A `CONSTANT_Utf8_info` holding Java "modified UTF-8" bytes.
#[binrw]
#[derive(Clone, Debug, PartialEq, Eq)]
#[brw(big)]
pub struct Utf8Constant {
    #[br(temp)]
    #[bw(calc = bytes.len() as u16)]
    length: u16,
    #[br(count = length)]
    pub bytes: Vec<u8>,
}

impl Utf8Constant {
    pub fn new(value: &str) -> Self {
        Utf8Constant {
            bytes: encode_modified_utf8(value),
        }
    }

    /// Decode back to a Rust string. Invalid sequences become U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        decode_modified_utf8(&self.bytes)
    }
}

impl PartialEq<str> for Utf8Constant {
    fn eq(&self, other: &str) -> bool {
        self.bytes == encode_modified_utf8(other)
    }
}

impl PartialEq<&str> for Utf8Constant {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// NUL is written as two bytes and supplementary characters as a surrogate
/// pair of three-byte sequences (JVMS 4.4.7).
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xe0 == 0xc0 && i + 1 < bytes.len() {
            units.push((((b & 0x1f) as u16) << 6) | (bytes[i + 1] & 0x3f) as u16);
            i += 2;
        } else if b & 0xf0 == 0xe0 && i + 2 < bytes.len() {
            units.push(
                (((b & 0x0f) as u16) << 12)
                    | (((bytes[i + 1] & 0x3f) as u16) << 6)
                    | (bytes[i + 2] & 0x3f) as u16,
            );
            i += 3;
        } else {
            units.push(0xfffd);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct IntegerConstant {
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct ClassConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct StringConstant {
    pub string_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct FieldRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct MethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct NameAndTypeConstant {
    pub name_index: u16,
    pub descriptor_index: u16,
}
