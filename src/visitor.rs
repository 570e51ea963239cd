//! Usage extraction.
//!
//! [`visit_class`] walks a parsed [`ClassFile`] once and hands every usage it
//! finds to a handler, in this order: the `extends` and `implements` clauses,
//! field types, then per method its return type, parameter types and the
//! references made by its instructions.

use crate::classfile::{ClassFile, Code, InstructionKind, MethodInfo};
use crate::constant_pool::Constant;
use crate::descriptor::FieldType;
use crate::error::ClassFormatError;
use crate::location::{ClassLocation, LocationPath, MethodLocation};

/// What was referenced. Names are already in dotted form; descriptors are in
/// JVM form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage<'a> {
    Class {
        name: &'a str,
    },
    Method {
        owner: &'a str,
        name: &'a str,
        descriptor: &'a str,
        is_interface: bool,
    },
    Field {
        owner: &'a str,
        name: &'a str,
        descriptor: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent<'a> {
    pub location: LocationPath,
    pub usage: Usage<'a>,
}

/// Emits every usage found in `class`. The class's own name from its header
/// is never emitted.
pub fn visit_class<'a, F>(
    class: &'a ClassFile,
    archive: &str,
    mut handler: F,
) -> Result<(), ClassFormatError>
where
    F: FnMut(UsageEvent<'a>),
{
    let root = ClassLocation::new(archive, class.this_class.as_str());

    if let Some(super_class) = class.super_class.as_deref() {
        emit_class(&mut handler, root.in_extends(), super_class);
    }
    for interface in &class.interfaces {
        emit_class(&mut handler, root.in_implements(), interface);
    }

    for field in &class.fields {
        emit_type(&mut handler, || root.in_field(&field.name), &field.field_type);
    }

    for method in &class.methods {
        visit_method(class, &root, method, &mut handler)?;
    }

    Ok(())
}

fn visit_method<'a, F>(
    class: &'a ClassFile,
    root: &ClassLocation,
    method: &'a MethodInfo,
    handler: &mut F,
) -> Result<(), ClassFormatError>
where
    F: FnMut(UsageEvent<'a>),
{
    let location = root.in_method(&method.name, &method.descriptor);

    if let Some(return_type) = &method.signature.return_type {
        emit_type(handler, || location.in_return(), return_type);
    }
    for (index, parameter) in method.signature.parameters.iter().enumerate() {
        emit_type(handler, || location.in_parameter(index), parameter);
    }

    if let Some(code) = &method.code {
        visit_code(class, &location, code, handler)?;
    }
    Ok(())
}

fn visit_code<'a, F>(
    class: &'a ClassFile,
    method: &MethodLocation,
    code: &'a Code,
    handler: &mut F,
) -> Result<(), ClassFormatError>
where
    F: FnMut(UsageEvent<'a>),
{
    let pool = &class.constant_pool;
    let mut lines = code.line_numbers.iter().peekable();
    let mut current_line = None;

    for instruction in &code.instructions {
        while let Some(entry) = lines.next_if(|entry| u32::from(entry.start_pc) <= instruction.offset) {
            current_line = Some(entry.line);
        }

        match instruction.kind {
            InstructionKind::Invoke { index } => {
                let (member, is_interface) = pool.method_ref(index)?;
                let location = method.in_code(current_line);
                handler(UsageEvent {
                    location: location.clone(),
                    usage: Usage::Method {
                        owner: &member.owner,
                        name: &member.name,
                        descriptor: &member.descriptor,
                        is_interface,
                    },
                });
                emit_class(handler, location, &member.owner);
            }
            InstructionKind::FieldAccess { index } => {
                let member = pool.field_ref(index)?;
                let location = method.in_code(current_line);
                handler(UsageEvent {
                    location: location.clone(),
                    usage: Usage::Field {
                        owner: &member.owner,
                        name: &member.name,
                        descriptor: &member.descriptor,
                    },
                });
                emit_class(handler, location, &member.owner);
            }
            InstructionKind::TypeReference { index } => {
                let name = pool.class_name(index)?;
                emit_class(handler, method.in_code(current_line), name);
            }
            InstructionKind::LoadConstant { index } => {
                if let Constant::Class(name) = pool.get(index)? {
                    emit_class(handler, method.in_code(current_line), name);
                }
            }
            InstructionKind::InvokeDynamic { .. } | InstructionKind::Other => {}
        }
    }

    Ok(())
}

/// Emits a class usage for the element class of `name`, skipping primitive
/// arrays such as `int[]`.
fn emit_class<'a, F>(handler: &mut F, location: LocationPath, name: &'a str)
where
    F: FnMut(UsageEvent<'a>),
{
    let element = name.trim_end_matches("[]");
    if element.len() != name.len() && is_primitive(element) {
        return;
    }
    handler(UsageEvent {
        location,
        usage: Usage::Class { name: element },
    });
}

fn emit_type<'a, F, L>(handler: &mut F, location: L, ty: &'a FieldType)
where
    F: FnMut(UsageEvent<'a>),
    L: FnOnce() -> LocationPath,
{
    if let Some(name) = ty.referenced_class() {
        handler(UsageEvent {
            location: location(),
            usage: Usage::Class { name },
        });
    }
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "byte" | "char" | "double" | "float" | "int" | "long" | "short" | "boolean"
    )
}
