//! Where a usage was found.
//!
//! A [`LocationPath`] is a short immutable chain rooted at a
//! [`ClassLocation`] (archive + class). The class is narrowed to a field, to
//! the `extends` or `implements` clause, or to a [`MethodLocation`], which is
//! in turn narrowed to a code line, a parameter or the return type. Usages
//! only ever sit at one of these leaves. Every narrowing
//! step returns a new value; parts are reference counted, so values are cheap
//! to clone and safe to share between threads.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClassLocation {
    pub archive: Arc<str>,
    pub class_name: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodLocation {
    #[serde(flatten)]
    pub class: ClassLocation,
    pub method_name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LocationPath {
    Extends(ClassLocation),
    Implements(ClassLocation),
    Field {
        #[serde(flatten)]
        class: ClassLocation,
        field_name: Arc<str>,
    },
    Code {
        #[serde(flatten)]
        method: MethodLocation,
        /// `None` before the first line-table entry or without a line table.
        line: Option<u16>,
    },
    Parameter {
        #[serde(flatten)]
        method: MethodLocation,
        index: usize,
    },
    Return(MethodLocation),
}

impl ClassLocation {
    pub fn new(archive: impl Into<Arc<str>>, class_name: impl Into<Arc<str>>) -> Self {
        Self {
            archive: archive.into(),
            class_name: class_name.into(),
        }
    }

    pub fn in_extends(&self) -> LocationPath {
        LocationPath::Extends(self.clone())
    }

    pub fn in_implements(&self) -> LocationPath {
        LocationPath::Implements(self.clone())
    }

    pub fn in_field(&self, field_name: &str) -> LocationPath {
        LocationPath::Field {
            class: self.clone(),
            field_name: field_name.into(),
        }
    }

    pub fn in_method(&self, method_name: &str, descriptor: &str) -> MethodLocation {
        MethodLocation {
            class: self.clone(),
            method_name: method_name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl MethodLocation {
    pub fn in_code(&self, line: Option<u16>) -> LocationPath {
        LocationPath::Code {
            method: self.clone(),
            line,
        }
    }

    pub fn in_parameter(&self, index: usize) -> LocationPath {
        LocationPath::Parameter {
            method: self.clone(),
            index,
        }
    }

    pub fn in_return(&self) -> LocationPath {
        LocationPath::Return(self.clone())
    }
}

impl LocationPath {
    pub fn class(&self) -> &ClassLocation {
        match self {
            Self::Extends(class) | Self::Implements(class) => class,
            Self::Field { class, .. } => class,
            Self::Return(method) => &method.class,
            Self::Code { method, .. } | Self::Parameter { method, .. } => &method.class,
        }
    }

    pub fn method(&self) -> Option<&MethodLocation> {
        match self {
            Self::Return(method) => Some(method),
            Self::Code { method, .. } | Self::Parameter { method, .. } => Some(method),
            Self::Extends(_) | Self::Implements(_) | Self::Field { .. } => None,
        }
    }

    /// The source line for code locations that have one.
    pub fn line(&self) -> Option<u16> {
        match self {
            Self::Code { line, .. } => *line,
            _ => None,
        }
    }
}

impl fmt::Display for ClassLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {} in class {}", self.archive, self.class_name)
    }
}

impl fmt::Display for MethodLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in method {} ({})",
            self.class, self.method_name, self.descriptor
        )
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extends(class) => write!(f, "{class} in extends clause"),
            Self::Implements(class) => write!(f, "{class} in implements clause"),
            Self::Field { class, field_name } => write!(f, "{class} in field {field_name}"),
            Self::Code {
                method,
                line: Some(line),
            } => write!(f, "{method} on line {line}"),
            Self::Code { method, line: None } => write!(f, "{method} on an unknown line"),
            Self::Parameter { method, index } => write!(f, "{method} in parameter {index}"),
            Self::Return(method) => write!(f, "{method} in return type"),
        }
    }
}
