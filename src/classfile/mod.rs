// src/classfile/mod.rs

//! Structural classfile model
//!
//! Parses just enough of a JVM classfile to rewrite constant pool strings and
//! to append field declarations. Method bodies are never interpreted: the
//! method table and class attributes are validated for shape and then kept as
//! an opaque byte region that is written back verbatim.

pub mod constant_pool;
pub mod descriptor;

pub use constant_pool::{Constant, ConstantPool};

use bitflags::bitflags;
use std::ops::Range;
use thiserror::Error;

/// Classfile magic number
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Oldest supported major version (JDK 1.1)
pub const MIN_MAJOR_VERSION: u16 = 45;

/// Newest supported major version (Java SE 25)
pub const MAX_MAJOR_VERSION: u16 = 69;

/// Errors raised while parsing a classfile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("bad magic 0x{0:08X}, not a classfile")]
    BadMagic(u32),

    #[error("unsupported classfile version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("truncated classfile: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    BadConstantTag { index: usize, tag: u8 },

    #[error("constant pool index {index} is not a {expected} constant")]
    BadIndex { index: u16, expected: &'static str },

    #[error("{0} trailing bytes after class attributes")]
    TrailingBytes(usize),

    #[error("constant pool is full")]
    PoolOverflow,

    #[error("{0}")]
    Malformed(String),
}

/// Big-endian cursor over classfile bytes
pub(crate) struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
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
                needed: len,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ClassFormatError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }
}

bitflags! {
    /// Access flags of a `field_info`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

impl FieldAccess {
    /// Parse a flag by its Java keyword (`volatile`, `private`, ...)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::PUBLIC),
            "private" => Some(Self::PRIVATE),
            "protected" => Some(Self::PROTECTED),
            "static" => Some(Self::STATIC),
            "final" => Some(Self::FINAL),
            "volatile" => Some(Self::VOLATILE),
            "transient" => Some(Self::TRANSIENT),
            "synthetic" => Some(Self::SYNTHETIC),
            "enum" => Some(Self::ENUM),
            _ => None,
        }
    }

    /// Check the combination rules the JVM enforces for class fields
    pub fn check(&self) -> Result<(), String> {
        let visibility = *self & (Self::PUBLIC | Self::PRIVATE | Self::PROTECTED);
        if visibility.bits().count_ones() > 1 {
            return Err(format!("conflicting visibility flags {:?}", visibility));
        }
        if self.contains(Self::FINAL | Self::VOLATILE) {
            return Err("a field cannot be both final and volatile".to_string());
        }
        Ok(())
    }
}

/// A raw attribute: name index plus undecoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl RawAttribute {
    fn read(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        let name_index = reader.u16()?;
        let len = reader.u32()? as usize;
        let info = reader.bytes(len)?.to_vec();
        Ok(Self { name_index, info })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name_index.to_be_bytes());
        out.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.info);
    }
}

/// A `field_info` structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<RawAttribute>,
}

impl FieldInfo {
    fn read(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        let access_flags = reader.u16()?;
        let name_index = reader.u16()?;
        let descriptor_index = reader.u16()?;
        let count = reader.u16()?;
        let attributes = (0..count)
            .map(|_| RawAttribute::read(reader))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.name_index.to_be_bytes());
        out.extend_from_slice(&self.descriptor_index.to_be_bytes());
        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attr in &self.attributes {
            attr.write(out);
        }
    }
}

/// A parsed classfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    /// `methods_count`, the method table and the class attributes, verbatim
    trailer: Vec<u8>,
    /// Range of `trailer` holding `methods_count` and the method table
    methods: Range<usize>,
}

impl ClassFile {
    /// Parse classfile bytes
    pub fn parse(data: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ClassReader::new(data);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }

        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(ClassFormatError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let constant_pool = ConstantPool::read(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let interface_count = reader.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| reader.u16())
            .collect::<Result<Vec<_>, _>>()?;

        let field_count = reader.u16()?;
        let fields = (0..field_count)
            .map(|_| FieldInfo::read(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        // Walk the method table and class attributes only to validate their shape
        let trailer_start = reader.position();
        let method_count = reader.u16()?;
        for _ in 0..method_count {
            reader.bytes(6)?;
            let attr_count = reader.u16()?;
            for _ in 0..attr_count {
                RawAttribute::read(&mut reader)?;
            }
        }
        let methods_end = reader.position() - trailer_start;

        let attr_count = reader.u16()?;
        for _ in 0..attr_count {
            RawAttribute::read(&mut reader)?;
        }
        if reader.remaining() > 0 {
            return Err(ClassFormatError::TrailingBytes(reader.remaining()));
        }

        let class = Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            trailer: data[trailer_start..].to_vec(),
            methods: 0..methods_end,
        };

        if class.this_class_name().is_none() {
            return Err(ClassFormatError::BadIndex {
                index: class.this_class,
                expected: "Class",
            });
        }

        Ok(class)
    }

    /// Serialize back to classfile bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.trailer.len() + 1024);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.constant_pool.write(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for iface in &self.interfaces {
            out.extend_from_slice(&iface.to_be_bytes());
        }
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            field.write(&mut out);
        }
        out.extend_from_slice(&self.trailer);
        out
    }

    /// Internal name of this class (`pkg/Service`)
    pub fn this_class_name(&self) -> Option<&[u8]> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Internal name of the superclass, `None` for `java/lang/Object`
    pub fn super_class_name(&self) -> Option<&[u8]> {
        self.constant_pool.class_name(self.super_class)
    }

    /// Internal names of the implemented interfaces
    pub fn interface_names(&self) -> Vec<&[u8]> {
        self.interfaces
            .iter()
            .filter_map(|i| self.constant_pool.class_name(*i))
            .collect()
    }

    /// `methods_count` and the method table, exactly as read
    pub fn method_table(&self) -> &[u8] {
        &self.trailer[self.methods.clone()]
    }

    /// Find a declared field by name
    pub fn field_named(&self, name: &[u8]) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| self.constant_pool.utf8(f.name_index) == Some(name))
    }

    /// Append a field declaration without an initial value or attributes
    ///
    /// Returns the index of the new field in the field table.
    pub fn add_field(
        &mut self,
        name: &str,
        descriptor: &str,
        access: FieldAccess,
    ) -> Result<usize, ClassFormatError> {
        if self.fields.len() >= u16::MAX as usize {
            return Err(ClassFormatError::Malformed(
                "field table is full".to_string(),
            ));
        }
        let name_index = self.constant_pool.intern_utf8(name.as_bytes())?;
        let descriptor_index = self.constant_pool.intern_utf8(descriptor.as_bytes())?;
        self.fields.push(FieldInfo {
            access_flags: access.bits(),
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(self.fields.len() - 1)
    }
}
