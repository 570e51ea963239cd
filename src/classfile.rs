//! Class-file decoding.
//!
//! [`parse_class`] turns the raw bytes of one `.class` entry into a
//! [`ClassFile`]: header, constant pool, access flags, super class and
//! interfaces, fields, methods (with their Code attribute decoded into
//! instructions, exception table and line numbers) and class attributes.
//! Every structural inconsistency is reported as a [`ClassFormatError`].

use crate::constant_pool::{Constant, ConstantPool};
use crate::descriptor::{FieldType, MethodDescriptor, parse_field_descriptor, parse_method_descriptor};
use crate::error::ClassFormatError;

const MAGIC: u32 = 0xCAFE_BABE;
const MIN_MAJOR_VERSION: u16 = 45;
const MAX_CODE_LENGTH: u32 = 65_535;

const ATTR_CODE: &str = "Code";
const ATTR_LINE_NUMBER_TABLE: &str = "LineNumberTable";
const ATTR_SOURCE_FILE: &str = "SourceFile";

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        if self.remaining() < len {
            return Err(ClassFormatError::Truncated {
                offset: self.pos,
                wanted: len,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ClassFormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFormatError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFormatError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ClassFormatError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFormatError> {
        self.bytes(len).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub source_file: Option<String>,
    pub attributes: Vec<Attribute>,
}

/// An attribute this parser does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub info: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub field_type: FieldType,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: MethodDescriptor,
    pub code: Option<Code>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: u32,
    pub instructions: Vec<Instruction>,
    pub exception_table: Vec<ExceptionHandler>,
    /// Sorted by start offset; entries sharing an offset keep table order.
    pub line_numbers: Vec<LineNumber>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` for a catch-all (`finally`) handler.
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub kind: InstructionKind,
}

/// What an instruction references in the constant pool, if anything.
/// Indexes are checked against the pool while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// invokevirtual, invokespecial, invokestatic, invokeinterface.
    Invoke { index: u16 },
    InvokeDynamic { index: u16 },
    /// getstatic, putstatic, getfield, putfield.
    FieldAccess { index: u16 },
    /// new, anewarray, checkcast, instanceof, multianewarray.
    TypeReference { index: u16 },
    /// ldc, ldc_w, ldc2_w.
    LoadConstant { index: u16 },
    Other,
}

pub mod opcodes {
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const ALOAD: u8 = 0x19;
    pub const ISTORE: u8 = 0x36;
    pub const ASTORE: u8 = 0x3a;
    pub const IINC: u8 = 0x84;
    pub const IFEQ: u8 = 0x99;
    pub const JSR: u8 = 0xa8;
    pub const RET: u8 = 0xa9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const NEWARRAY: u8 = 0xbc;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
    pub const IFNULL: u8 = 0xc6;
    pub const IFNONNULL: u8 = 0xc7;
    pub const GOTO_W: u8 = 0xc8;
    pub const JSR_W: u8 = 0xc9;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
}

pub fn parse_class(bytes: &[u8]) -> Result<ClassFile, ClassFormatError> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic(magic));
    }
    let minor_version = reader.u16()?;
    let major_version = reader.u16()?;
    if major_version < MIN_MAJOR_VERSION {
        return Err(ClassFormatError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let constant_pool = ConstantPool::read(&mut reader)?;
    let access_flags = reader.u16()?;
    let this_class = constant_pool.class_name(reader.u16()?)?.to_string();
    let super_class = constant_pool
        .optional_class_name(reader.u16()?)?
        .map(str::to_string);

    let interface_count = reader.u16()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        interfaces.push(constant_pool.class_name(reader.u16()?)?.to_string());
    }

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(usize::from(field_count));
    for _ in 0..field_count {
        fields.push(read_field(&mut reader, &constant_pool)?);
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(read_method(&mut reader, &constant_pool)?);
    }

    let mut source_file = None;
    let mut attributes = Vec::new();
    for attribute in read_attributes(&mut reader, &constant_pool)? {
        if attribute.name == ATTR_SOURCE_FILE {
            let mut inner = ByteReader::new(&attribute.info);
            source_file = Some(constant_pool.utf8(inner.u16()?)?.to_string());
            expect_consumed(&inner, ATTR_SOURCE_FILE)?;
        }
        attributes.push(attribute);
    }

    if reader.remaining() > 0 {
        return Err(ClassFormatError::TrailingBytes(reader.remaining()));
    }

    Ok(ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        source_file,
        attributes,
    })
}

fn read_field(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<FieldInfo, ClassFormatError> {
    let access_flags = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let descriptor = pool.utf8(reader.u16()?)?.to_string();
    let field_type = parse_field_descriptor(&descriptor)?;
    let attributes = read_attributes(reader, pool)?;
    Ok(FieldInfo {
        access_flags,
        name,
        descriptor,
        field_type,
        attributes,
    })
}

fn read_method(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<MethodInfo, ClassFormatError> {
    let access_flags = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let descriptor = pool.utf8(reader.u16()?)?.to_string();
    let signature = parse_method_descriptor(&descriptor)?;

    let mut code = None;
    let mut attributes = Vec::new();
    for attribute in read_attributes(reader, pool)? {
        if attribute.name == ATTR_CODE {
            code = Some(read_code(&attribute.info, pool)?);
        } else {
            attributes.push(attribute);
        }
    }

    Ok(MethodInfo {
        access_flags,
        name,
        descriptor,
        signature,
        code,
        attributes,
    })
}

fn read_attributes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Attribute>, ClassFormatError> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = pool.utf8(reader.u16()?)?.to_string();
        let len = reader.u32()? as usize;
        let info = reader.bytes(len)?.to_vec();
        attributes.push(Attribute { name, info });
    }
    Ok(attributes)
}

fn expect_consumed(reader: &ByteReader<'_>, name: &str) -> Result<(), ClassFormatError> {
    if reader.remaining() == 0 {
        Ok(())
    } else {
        Err(ClassFormatError::AttributeLength {
            name: name.to_string(),
        })
    }
}

fn read_code(info: &[u8], pool: &ConstantPool) -> Result<Code, ClassFormatError> {
    let mut reader = ByteReader::new(info);
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_length = reader.u32()?;
    if code_length == 0 || code_length > MAX_CODE_LENGTH {
        return Err(ClassFormatError::InvalidCodeLength(code_length));
    }
    let instructions = decode_instructions(reader.bytes(code_length as usize)?, pool)?;

    let handler_count = reader.u16()?;
    let mut exception_table = Vec::with_capacity(usize::from(handler_count));
    for _ in 0..handler_count {
        let start_pc = reader.u16()?;
        let end_pc = reader.u16()?;
        let handler_pc = reader.u16()?;
        let catch_type = pool.optional_class_name(reader.u16()?)?.map(str::to_string);
        exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    let mut line_numbers = Vec::new();
    let mut attributes = Vec::new();
    for attribute in read_attributes(&mut reader, pool)? {
        if attribute.name == ATTR_LINE_NUMBER_TABLE {
            read_line_numbers(&attribute.info, &mut line_numbers)?;
        } else {
            attributes.push(attribute);
        }
    }
    expect_consumed(&reader, ATTR_CODE)?;
    line_numbers.sort_by_key(|entry| entry.start_pc);

    Ok(Code {
        max_stack,
        max_locals,
        code_length,
        instructions,
        exception_table,
        line_numbers,
        attributes,
    })
}

fn read_line_numbers(info: &[u8], out: &mut Vec<LineNumber>) -> Result<(), ClassFormatError> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    for _ in 0..count {
        out.push(LineNumber {
            start_pc: reader.u16()?,
            line: reader.u16()?,
        });
    }
    expect_consumed(&reader, ATTR_LINE_NUMBER_TABLE)
}

/// Decodes the instruction stream and checks every constant-pool operand
/// against the kind of constant its opcode requires.
pub fn decode_instructions(
    code: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<Instruction>, ClassFormatError> {
    use opcodes::*;

    let mut reader = ByteReader::new(code);
    let mut instructions = Vec::new();

    while reader.remaining() > 0 {
        // Code length is capped well below u32::MAX.
        let offset = reader.position() as u32;
        let opcode = reader.u8()?;
        let kind = match opcode {
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => {
                let index = reader.u16()?;
                pool.method_ref(index)?;
                InstructionKind::Invoke { index }
            }
            INVOKEINTERFACE => {
                let index = reader.u16()?;
                reader.skip(2)?;
                match pool.method_ref(index)? {
                    (_, true) => InstructionKind::Invoke { index },
                    (_, false) => {
                        return Err(ClassFormatError::WrongConstantKind {
                            index,
                            expected: "InterfaceMethodref",
                        });
                    }
                }
            }
            INVOKEDYNAMIC => {
                let index = reader.u16()?;
                reader.skip(2)?;
                match pool.get(index)? {
                    Constant::InvokeDynamic { .. } => InstructionKind::InvokeDynamic { index },
                    _ => {
                        return Err(ClassFormatError::WrongConstantKind {
                            index,
                            expected: "InvokeDynamic",
                        });
                    }
                }
            }
            GETSTATIC..=PUTFIELD => {
                let index = reader.u16()?;
                pool.field_ref(index)?;
                InstructionKind::FieldAccess { index }
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                let index = reader.u16()?;
                pool.class_name(index)?;
                InstructionKind::TypeReference { index }
            }
            MULTIANEWARRAY => {
                let index = reader.u16()?;
                reader.skip(1)?;
                pool.class_name(index)?;
                InstructionKind::TypeReference { index }
            }
            LDC | LDC_W => {
                let index = if opcode == LDC {
                    u16::from(reader.u8()?)
                } else {
                    reader.u16()?
                };
                if !pool.get(index)?.is_single_slot_loadable() {
                    return Err(ClassFormatError::WrongConstantKind {
                        index,
                        expected: "loadable constant",
                    });
                }
                InstructionKind::LoadConstant { index }
            }
            LDC2_W => {
                let index = reader.u16()?;
                match pool.get(index)? {
                    Constant::Long(_) | Constant::Double(_) => {}
                    Constant::Dynamic { descriptor, .. } if matches!(descriptor.as_str(), "J" | "D") => {}
                    _ => {
                        return Err(ClassFormatError::WrongConstantKind {
                            index,
                            expected: "Long or Double",
                        });
                    }
                }
                InstructionKind::LoadConstant { index }
            }
            TABLESWITCH => {
                skip_switch_padding(&mut reader)?;
                reader.skip(4)?;
                let low = reader.i32()?;
                let high = reader.i32()?;
                if high < low {
                    return Err(ClassFormatError::InvalidSwitch {
                        kind: "tableswitch",
                        offset,
                    });
                }
                let entries = (i64::from(high) - i64::from(low) + 1) as usize;
                reader.skip(entries.saturating_mul(4))?;
                InstructionKind::Other
            }
            LOOKUPSWITCH => {
                skip_switch_padding(&mut reader)?;
                reader.skip(4)?;
                let pairs = reader.i32()?;
                if pairs < 0 {
                    return Err(ClassFormatError::InvalidSwitch {
                        kind: "lookupswitch",
                        offset,
                    });
                }
                reader.skip((pairs as usize).saturating_mul(8))?;
                InstructionKind::Other
            }
            WIDE => {
                let widened = reader.u8()?;
                match widened {
                    IINC => reader.skip(4)?,
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => reader.skip(2)?,
                    _ => {
                        return Err(ClassFormatError::InvalidOpcode {
                            opcode: widened,
                            offset: offset + 1,
                        });
                    }
                }
                InstructionKind::Other
            }
            _ => {
                let operands = fixed_operand_length(opcode)
                    .ok_or(ClassFormatError::InvalidOpcode { opcode, offset })?;
                reader.skip(operands)?;
                InstructionKind::Other
            }
        };
        instructions.push(Instruction {
            offset,
            opcode,
            kind,
        });
    }

    Ok(instructions)
}

/// Switch operands start at the next multiple of four from the code start.
fn skip_switch_padding(reader: &mut ByteReader<'_>) -> Result<(), ClassFormatError> {
    let padding = (4 - reader.position() % 4) % 4;
    reader.skip(padding)
}

/// Operand byte count for opcodes without constant-pool operands or
/// variable-length encodings. `None` for undefined opcodes.
fn fixed_operand_length(opcode: u8) -> Option<usize> {
    use opcodes::*;

    Some(match opcode {
        BIPUSH | NEWARRAY => 1,
        SIPUSH => 2,
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => 1,
        IINC => 2,
        IFEQ..=JSR | IFNULL | IFNONNULL => 2,
        GOTO_W | JSR_W => 4,
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | 0xac..=0xb1 | 0xbe | 0xbf
        | 0xc2 | 0xc3 => 0,
        _ => return None,
    })
}
