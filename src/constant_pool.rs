//! Constant pool decoding.
//!
//! The pool is read in two passes: raw entries as they appear on the wire,
//! then a resolution pass that follows the internal index references. Class
//! names are normalized to dotted form exactly once, during resolution, so
//! every later consumer sees the same spelling.

use crate::classfile::ByteReader;
use crate::descriptor::parse_field_descriptor;
use crate::error::ClassFormatError;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// Converts an internal binary name (`java/lang/String`) to dotted form.
pub fn normalize_class_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Normalizes the name stored in a Class constant. Array classes are stored
/// as descriptors and come out in source form (`java.lang.String[]`).
fn resolve_class_name(internal: &str) -> Result<String, ClassFormatError> {
    if internal.starts_with('[') {
        Ok(parse_field_descriptor(internal)?.to_string())
    } else if internal.is_empty() {
        Err(ClassFormatError::InvalidDescriptor(String::new()))
    } else {
        Ok(normalize_class_name(internal))
    }
}

/// Owner, name and descriptor of a field or method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the second slot of a long or double.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(String),
    String(String),
    FieldRef(MemberRef),
    MethodRef(MemberRef),
    InterfaceMethodRef(MemberRef),
    NameAndType {
        name: String,
        descriptor: String,
    },
    MethodHandle {
        kind: u8,
        reference: u16,
    },
    MethodType(String),
    Dynamic {
        bootstrap_method: u16,
        name: String,
        descriptor: String,
    },
    InvokeDynamic {
        bootstrap_method: u16,
        name: String,
        descriptor: String,
    },
    Module(String),
    Package(String),
}

impl Constant {
    /// Whether `ldc`/`ldc_w` may push this constant.
    pub fn is_single_slot_loadable(&self) -> bool {
        matches!(
            self,
            Self::Integer(_)
                | Self::Float(_)
                | Self::String(_)
                | Self::Class(_)
                | Self::MethodHandle { .. }
                | Self::MethodType(_)
                | Self::Dynamic { .. }
        )
    }
}

#[derive(Debug, Clone)]
enum RawConstant {
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap_method: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap_method: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, ClassFormatError> {
        let raw = read_raw(reader)?;
        let entries = resolve(&raw)?;
        Ok(Self { entries })
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFormatError> {
        match self.entries.get(usize::from(index)) {
            None | Some(Constant::Unusable) => Err(ClassFormatError::BadConstantIndex { index }),
            Some(constant) => Ok(constant),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(wrong(index, "Utf8")),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Class(name) => Ok(name),
            _ => Err(wrong(index, "Class")),
        }
    }

    /// Like [`ConstantPool::class_name`], but index 0 means "absent".
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ClassFormatError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub fn field_ref(&self, index: u16) -> Result<&MemberRef, ClassFormatError> {
        match self.get(index)? {
            Constant::FieldRef(member) => Ok(member),
            _ => Err(wrong(index, "Fieldref")),
        }
    }

    /// Resolves a method or interface method reference. The flag is true for
    /// interface method references.
    pub fn method_ref(&self, index: u16) -> Result<(&MemberRef, bool), ClassFormatError> {
        match self.get(index)? {
            Constant::MethodRef(member) => Ok((member, false)),
            Constant::InterfaceMethodRef(member) => Ok((member, true)),
            _ => Err(wrong(index, "Methodref or InterfaceMethodref")),
        }
    }
}

fn wrong(index: u16, expected: &'static str) -> ClassFormatError {
    ClassFormatError::WrongConstantKind { index, expected }
}

fn read_raw(reader: &mut ByteReader<'_>) -> Result<Vec<RawConstant>, ClassFormatError> {
    let count = reader.u16()?;
    if count == 0 {
        return Err(ClassFormatError::BadConstantIndex { index: 0 });
    }

    let mut raw = Vec::with_capacity(usize::from(count));
    raw.push(RawConstant::Unusable);

    while raw.len() < usize::from(count) {
        // Bounded by `count`, which is a u16.
        let index = raw.len() as u16;
        let tag = reader.u8()?;
        let entry = match tag {
            TAG_UTF8 => {
                let len = usize::from(reader.u16()?);
                RawConstant::Utf8(decode_modified_utf8(reader.bytes(len)?, index)?)
            }
            TAG_INTEGER => RawConstant::Integer(reader.i32()?),
            TAG_FLOAT => RawConstant::Float(f32::from_bits(reader.u32()?)),
            TAG_LONG | TAG_DOUBLE => {
                let high = u64::from(reader.u32()?);
                let low = u64::from(reader.u32()?);
                let bits = (high << 32) | low;
                if usize::from(index) + 1 >= usize::from(count) {
                    return Err(ClassFormatError::BadConstantIndex { index: index + 1 });
                }
                raw.push(if tag == TAG_LONG {
                    RawConstant::Long(bits as i64)
                } else {
                    RawConstant::Double(f64::from_bits(bits))
                });
                RawConstant::Unusable
            }
            TAG_CLASS => RawConstant::Class(reader.u16()?),
            TAG_STRING => RawConstant::String(reader.u16()?),
            TAG_FIELD_REF | TAG_METHOD_REF | TAG_INTERFACE_METHOD_REF => {
                let class = reader.u16()?;
                let name_and_type = reader.u16()?;
                match tag {
                    TAG_FIELD_REF => RawConstant::FieldRef {
                        class,
                        name_and_type,
                    },
                    TAG_METHOD_REF => RawConstant::MethodRef {
                        class,
                        name_and_type,
                    },
                    _ => RawConstant::InterfaceMethodRef {
                        class,
                        name_and_type,
                    },
                }
            }
            TAG_NAME_AND_TYPE => RawConstant::NameAndType {
                name: reader.u16()?,
                descriptor: reader.u16()?,
            },
            TAG_METHOD_HANDLE => RawConstant::MethodHandle {
                kind: reader.u8()?,
                reference: reader.u16()?,
            },
            TAG_METHOD_TYPE => RawConstant::MethodType(reader.u16()?),
            TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                let bootstrap_method = reader.u16()?;
                let name_and_type = reader.u16()?;
                if tag == TAG_DYNAMIC {
                    RawConstant::Dynamic {
                        bootstrap_method,
                        name_and_type,
                    }
                } else {
                    RawConstant::InvokeDynamic {
                        bootstrap_method,
                        name_and_type,
                    }
                }
            }
            TAG_MODULE => RawConstant::Module(reader.u16()?),
            TAG_PACKAGE => RawConstant::Package(reader.u16()?),
            _ => return Err(ClassFormatError::InvalidConstantTag { index, tag }),
        };
        raw.push(entry);
    }

    Ok(raw)
}

fn resolve(raw: &[RawConstant]) -> Result<Vec<Constant>, ClassFormatError> {
    // Class names first, so member references reuse the normalized spelling.
    let mut class_names: Vec<Option<String>> = Vec::with_capacity(raw.len());
    for entry in raw {
        class_names.push(match entry {
            RawConstant::Class(name) => Some(resolve_class_name(raw_utf8(raw, *name)?)?),
            _ => None,
        });
    }

    let class_at = |index: u16| -> Result<String, ClassFormatError> {
        match class_names.get(usize::from(index)) {
            Some(Some(name)) => Ok(name.clone()),
            Some(None) if !matches!(raw[usize::from(index)], RawConstant::Unusable) => {
                Err(wrong(index, "Class"))
            }
            _ => Err(ClassFormatError::BadConstantIndex { index }),
        }
    };

    let member = |class: u16, name_and_type: u16| -> Result<MemberRef, ClassFormatError> {
        let (name, descriptor) = raw_name_and_type(raw, name_and_type)?;
        Ok(MemberRef {
            owner: class_at(class)?,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    };

    let mut entries = Vec::with_capacity(raw.len());
    for (slot, entry) in raw.iter().enumerate() {
        let index = slot as u16;
        let constant = match entry {
            RawConstant::Unusable => Constant::Unusable,
            RawConstant::Utf8(text) => Constant::Utf8(text.clone()),
            RawConstant::Integer(value) => Constant::Integer(*value),
            RawConstant::Float(value) => Constant::Float(*value),
            RawConstant::Long(value) => Constant::Long(*value),
            RawConstant::Double(value) => Constant::Double(*value),
            RawConstant::Class(_) => Constant::Class(class_at(index)?),
            RawConstant::String(text) => Constant::String(raw_utf8(raw, *text)?.to_string()),
            RawConstant::FieldRef {
                class,
                name_and_type,
            } => Constant::FieldRef(member(*class, *name_and_type)?),
            RawConstant::MethodRef {
                class,
                name_and_type,
            } => Constant::MethodRef(member(*class, *name_and_type)?),
            RawConstant::InterfaceMethodRef {
                class,
                name_and_type,
            } => Constant::InterfaceMethodRef(member(*class, *name_and_type)?),
            RawConstant::NameAndType { name, descriptor } => Constant::NameAndType {
                name: raw_utf8(raw, *name)?.to_string(),
                descriptor: raw_utf8(raw, *descriptor)?.to_string(),
            },
            RawConstant::MethodHandle { kind, reference } => {
                check_method_handle(raw, index, *kind, *reference)?;
                Constant::MethodHandle {
                    kind: *kind,
                    reference: *reference,
                }
            }
            RawConstant::MethodType(descriptor) => {
                Constant::MethodType(raw_utf8(raw, *descriptor)?.to_string())
            }
            RawConstant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = raw_name_and_type(raw, *name_and_type)?;
                Constant::Dynamic {
                    bootstrap_method: *bootstrap_method,
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                }
            }
            RawConstant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = raw_name_and_type(raw, *name_and_type)?;
                Constant::InvokeDynamic {
                    bootstrap_method: *bootstrap_method,
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                }
            }
            RawConstant::Module(name) => Constant::Module(raw_utf8(raw, *name)?.to_string()),
            RawConstant::Package(name) => {
                Constant::Package(normalize_class_name(raw_utf8(raw, *name)?))
            }
        };
        entries.push(constant);
    }

    Ok(entries)
}

fn raw_entry(raw: &[RawConstant], index: u16) -> Result<&RawConstant, ClassFormatError> {
    match raw.get(usize::from(index)) {
        None | Some(RawConstant::Unusable) => Err(ClassFormatError::BadConstantIndex { index }),
        Some(entry) => Ok(entry),
    }
}

fn raw_utf8(raw: &[RawConstant], index: u16) -> Result<&str, ClassFormatError> {
    match raw_entry(raw, index)? {
        RawConstant::Utf8(text) => Ok(text),
        _ => Err(wrong(index, "Utf8")),
    }
}

fn raw_name_and_type(raw: &[RawConstant], index: u16) -> Result<(&str, &str), ClassFormatError> {
    match raw_entry(raw, index)? {
        RawConstant::NameAndType { name, descriptor } => {
            Ok((raw_utf8(raw, *name)?, raw_utf8(raw, *descriptor)?))
        }
        _ => Err(wrong(index, "NameAndType")),
    }
}

fn check_method_handle(
    raw: &[RawConstant],
    index: u16,
    kind: u8,
    reference: u16,
) -> Result<(), ClassFormatError> {
    let target = raw_entry(raw, reference)?;
    let valid = match kind {
        1..=4 => matches!(target, RawConstant::FieldRef { .. }),
        5 | 8 => matches!(target, RawConstant::MethodRef { .. }),
        6 | 7 => matches!(
            target,
            RawConstant::MethodRef { .. } | RawConstant::InterfaceMethodRef { .. }
        ),
        9 => matches!(target, RawConstant::InterfaceMethodRef { .. }),
        _ => return Err(ClassFormatError::InvalidHandleKind { index, kind }),
    };
    if valid {
        Ok(())
    } else {
        Err(wrong(reference, "member reference matching the handle kind"))
    }
}

/// Decodes the JVM's modified UTF-8: no raw NUL bytes, no 4-byte forms,
/// supplementary characters as surrogate pairs.
fn decode_modified_utf8(bytes: &[u8], index: u16) -> Result<String, ClassFormatError> {
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        // Pure ASCII is valid UTF-8 as-is.
        return std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ClassFormatError::MalformedUtf8 { index });
    }

    let malformed = || ClassFormatError::MalformedUtf8 { index };
    let continuation = |at: usize| -> Result<u16, ClassFormatError> {
        bytes
            .get(at)
            .filter(|&&b| b & 0xc0 == 0x80)
            .map(|&b| u16::from(b & 0x3f))
            .ok_or_else(malformed)
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7f => {
                units.push(u16::from(b));
                i += 1;
            }
            0xc0..=0xdf => {
                units.push((u16::from(b & 0x1f) << 6) | continuation(i + 1)?);
                i += 2;
            }
            0xe0..=0xef => {
                units.push(
                    (u16::from(b & 0x0f) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?,
                );
                i += 3;
            }
            _ => return Err(malformed()),
        }
    }

    // Lone surrogates are legal in string literals, so don't reject them.
    Ok(String::from_utf16_lossy(&units))
}
