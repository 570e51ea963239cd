//! Field and method descriptor decoding.
//!
//! Descriptors are kept raw on the class model; the decoded forms here carry
//! class names already normalized to dotted form.

use std::fmt;

use crate::constant_pool::normalize_class_name;
use crate::error::ClassFormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'D' => Self::Double,
            b'F' => Self::Float,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'S' => Self::Short,
            b'Z' => Self::Boolean,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Double => "double",
            Self::Float => "float",
            Self::Int => "int",
            Self::Long => "long",
            Self::Short => "short",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// The class this type refers to, looking through array dimensions.
    /// `None` for primitives and primitive arrays.
    pub fn referenced_class(&self) -> Option<&str> {
        match self {
            Self::Base(_) => None,
            Self::Object(name) => Some(name),
            Self::Array(component) => component.referenced_class(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(base) => f.write_str(base.keyword()),
            Self::Object(name) => f.write_str(name),
            Self::Array(component) => write!(f, "{component}[]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

pub fn parse_field_descriptor(raw: &str) -> Result<FieldType, ClassFormatError> {
    let (ty, rest) = parse_field_type(raw.as_bytes(), raw)?;
    if !rest.is_empty() {
        return Err(invalid(raw));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(raw: &str) -> Result<MethodDescriptor, ClassFormatError> {
    let mut rest = raw
        .as_bytes()
        .strip_prefix(b"(")
        .ok_or_else(|| invalid(raw))?;

    let mut parameters = Vec::new();
    loop {
        match rest.first() {
            Some(b')') => {
                rest = &rest[1..];
                break;
            }
            Some(_) => {
                let (ty, tail) = parse_field_type(rest, raw)?;
                parameters.push(ty);
                rest = tail;
            }
            None => return Err(invalid(raw)),
        }
    }

    let return_type = if rest == b"V" {
        None
    } else {
        let (ty, tail) = parse_field_type(rest, raw)?;
        if !tail.is_empty() {
            return Err(invalid(raw));
        }
        Some(ty)
    };

    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

fn parse_field_type<'a>(
    bytes: &'a [u8],
    raw: &str,
) -> Result<(FieldType, &'a [u8]), ClassFormatError> {
    let (&tag, rest) = bytes.split_first().ok_or_else(|| invalid(raw))?;
    match tag {
        b'L' => {
            let end = rest
                .iter()
                .position(|&b| b == b';')
                .filter(|&end| end > 0)
                .ok_or_else(|| invalid(raw))?;
            let internal = std::str::from_utf8(&rest[..end]).map_err(|_| invalid(raw))?;
            Ok((
                FieldType::Object(normalize_class_name(internal)),
                &rest[end + 1..],
            ))
        }
        b'[' => {
            let (component, tail) = parse_field_type(rest, raw)?;
            Ok((FieldType::Array(Box::new(component)), tail))
        }
        other => BaseType::from_tag(other)
            .map(|base| (FieldType::Base(base), rest))
            .ok_or_else(|| invalid(raw)),
    }
}

fn invalid(raw: &str) -> ClassFormatError {
    ClassFormatError::InvalidDescriptor(raw.to_string())
}
