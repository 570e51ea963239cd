#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use zip::write::FileOptions;

pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_0: u8 = 0x03;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const POP: u8 = 0x57;
pub const TABLESWITCH: u8 = 0xaa;
pub const RETURN: u8 = 0xb1;
pub const GETSTATIC: u8 = 0xb2;
pub const PUTSTATIC: u8 = 0xb3;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const NEW: u8 = 0xbb;
pub const ANEWARRAY: u8 = 0xbd;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;
pub const MULTIANEWARRAY: u8 = 0xc5;

/// Assembles minimal version 52 class files. Names are given in internal
/// (slash) form, as they appear on the wire.
pub struct ClassBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
}

impl ClassBuilder {
    pub fn new(name: &str, super_class: Option<&str>) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            next_index: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            field_count: 0,
            methods: Vec::new(),
            method_count: 0,
        };
        builder.this_class = builder.class(name);
        if let Some(super_class) = super_class {
            builder.super_class = builder.class(super_class);
        }
        builder
    }

    fn push_entry(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.pool.extend_from_slice(bytes);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_cache.get(text) {
            return index;
        }
        let mut entry = vec![1];
        entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
        entry.extend_from_slice(text.as_bytes());
        let index = self.push_entry(&entry, 1);
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_cache.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push_entry(&entry, 1);
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let text_index = self.utf8(text);
        let mut entry = vec![8];
        entry.extend_from_slice(&text_index.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(&entry, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut entry = vec![12];
        entry.extend_from_slice(&name_index.to_be_bytes());
        entry.extend_from_slice(&descriptor_index.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        let mut entry = vec![tag];
        entry.extend_from_slice(&class_index.to_be_bytes());
        entry.extend_from_slice(&nat_index.to_be_bytes());
        self.push_entry(&entry, 1)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(11, owner, name, descriptor)
    }

    pub fn implements(&mut self, interface: &str) -> &mut Self {
        let index = self.class(interface);
        self.interfaces.push(index);
        self
    }

    pub fn field(&mut self, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.extend_from_slice(&0x0002u16.to_be_bytes());
        self.fields.extend_from_slice(&name_index.to_be_bytes());
        self.fields.extend_from_slice(&descriptor_index.to_be_bytes());
        self.fields.extend_from_slice(&0u16.to_be_bytes());
        self.field_count += 1;
        self
    }

    /// A method without a Code attribute.
    pub fn abstract_method(&mut self, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.methods.extend_from_slice(&0x0401u16.to_be_bytes());
        self.methods.extend_from_slice(&name_index.to_be_bytes());
        self.methods.extend_from_slice(&descriptor_index.to_be_bytes());
        self.methods.extend_from_slice(&0u16.to_be_bytes());
        self.method_count += 1;
        self
    }

    /// A method with a Code attribute and, when `lines` is not empty, a
    /// LineNumberTable of `(start_pc, line)` pairs.
    pub fn method(
        &mut self,
        name: &str,
        descriptor: &str,
        code: &[u8],
        lines: &[(u16, u16)],
    ) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let code_name = self.utf8("Code");

        let mut attribute = Vec::new();
        attribute.extend_from_slice(&8u16.to_be_bytes());
        attribute.extend_from_slice(&8u16.to_be_bytes());
        attribute.extend_from_slice(&(code.len() as u32).to_be_bytes());
        attribute.extend_from_slice(code);
        attribute.extend_from_slice(&0u16.to_be_bytes());
        if lines.is_empty() {
            attribute.extend_from_slice(&0u16.to_be_bytes());
        } else {
            let table_name = self.utf8("LineNumberTable");
            attribute.extend_from_slice(&1u16.to_be_bytes());
            attribute.extend_from_slice(&table_name.to_be_bytes());
            attribute.extend_from_slice(&(2 + 4 * lines.len() as u32).to_be_bytes());
            attribute.extend_from_slice(&(lines.len() as u16).to_be_bytes());
            for (start_pc, line) in lines {
                attribute.extend_from_slice(&start_pc.to_be_bytes());
                attribute.extend_from_slice(&line.to_be_bytes());
            }
        }

        self.methods.extend_from_slice(&0x0001u16.to_be_bytes());
        self.methods.extend_from_slice(&name_index.to_be_bytes());
        self.methods.extend_from_slice(&descriptor_index.to_be_bytes());
        self.methods.extend_from_slice(&1u16.to_be_bytes());
        self.methods.extend_from_slice(&code_name.to_be_bytes());
        self.methods
            .extend_from_slice(&(attribute.len() as u32).to_be_bytes());
        self.methods.extend_from_slice(&attribute);
        self.method_count += 1;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&self.next_index.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        out.extend_from_slice(&self.field_count.to_be_bytes());
        out.extend_from_slice(&self.fields);
        out.extend_from_slice(&self.method_count.to_be_bytes());
        out.extend_from_slice(&self.methods);
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

/// `a/B` with `void m()` calling `util.List.add` on line 11:
///
/// ```text
/// 0: aconst_null        line 10
/// 1: aconst_null
/// 2: invokeinterface    line 11
/// 7: pop
/// 8: return
/// ```
pub fn class_calling_list_add() -> Vec<u8> {
    let mut class = ClassBuilder::new("a/B", Some("java/lang/Object"));
    let add = class.interface_method_ref("util/List", "add", "(Ljava/lang/Object;)Z");
    let [hi, lo] = add.to_be_bytes();
    let code = [
        ACONST_NULL,
        ACONST_NULL,
        INVOKEINTERFACE,
        hi,
        lo,
        2,
        0,
        POP,
        RETURN,
    ];
    class.method("m", "()V", &code, &[(0, 10), (2, 11)]);
    class.build()
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{nanos}_{n}", std::process::id())
}

pub fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}.{extension}", unique_name(prefix)))
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(unique_name(prefix));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}
