/// JVM field and method descriptor parsing.

/// A JVM type as written in a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<JvmType>),
}

impl JvmType {
    /// Types the verifier treats as `int`.
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            JvmType::Int | JvmType::Byte | JvmType::Char | JvmType::Short | JvmType::Boolean
        )
    }

    pub fn to_descriptor(&self) -> String {
        match self {
            JvmType::Int => "I".into(),
            JvmType::Long => "J".into(),
            JvmType::Float => "F".into(),
            JvmType::Double => "D".into(),
            JvmType::Byte => "B".into(),
            JvmType::Char => "C".into(),
            JvmType::Short => "S".into(),
            JvmType::Boolean => "Z".into(),
            JvmType::Void => "V".into(),
            JvmType::Reference(name) => format!("L{};", name),
            JvmType::Array(inner) => format!("[{}", inner.to_descriptor()),
        }
    }

    /// The name a `Class` constant uses for this reference type: the internal
    /// name for classes, the full descriptor for arrays.
    pub fn class_constant_name(&self) -> Option<String> {
        match self {
            JvmType::Reference(name) => Some(name.clone()),
            JvmType::Array(_) => Some(self.to_descriptor()),
            _ => None,
        }
    }
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns (JvmType, next_position).
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(JvmType, usize)> {
    let bytes = desc.as_bytes();
    match *bytes.get(pos)? {
        b'B' => Some((JvmType::Byte, pos + 1)),
        b'C' => Some((JvmType::Char, pos + 1)),
        b'D' => Some((JvmType::Double, pos + 1)),
        b'F' => Some((JvmType::Float, pos + 1)),
        b'I' => Some((JvmType::Int, pos + 1)),
        b'J' => Some((JvmType::Long, pos + 1)),
        b'S' => Some((JvmType::Short, pos + 1)),
        b'Z' => Some((JvmType::Boolean, pos + 1)),
        b'V' => Some((JvmType::Void, pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            if class_name.is_empty() {
                return None;
            }
            Some((JvmType::Reference(class_name.to_string()), pos + 1 + semi + 1))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            if inner == JvmType::Void {
                return None;
            }
            Some((JvmType::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a complete field descriptor such as `Ljava/io/PrintStream;`.
pub fn parse_field_descriptor(desc: &str) -> Option<JvmType> {
    let (ty, next) = parse_type_at(desc, 0)?;
    if next != desc.len() || ty == JvmType::Void {
        return None;
    }
    Some(ty)
}

/// Parse a method descriptor, e.g. "(II)V" -> ([Int, Int], Void)
pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<JvmType>, JvmType)> {
    if !desc.starts_with('(') {
        return None;
    }
    let close = desc.find(')')?;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        if ty == JvmType::Void {
            return None;
        }
        params.push(ty);
        pos = next;
    }
    let (ret, end) = parse_type_at(desc, close + 1)?;
    if end != desc.len() {
        return None;
    }
    Some((params, ret))
}

/// Whether `name` is usable as a binary class name in internal form
/// (`Hello`, `pkg/Hello`).
pub fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('/').all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
                    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                }
                _ => false,
            }
        })
}
