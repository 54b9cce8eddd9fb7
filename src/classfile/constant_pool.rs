// src/classfile/constant_pool.rs

//! Constant pool model
//!
//! Entries are kept in their original order with their original indices.
//! `Long` and `Double` occupy two slots; the second slot is represented by
//! [`Constant::Unusable`] so that `entries[i - 1]` is always the constant at
//! index `i`.

use super::{ClassFormatError, ClassReader};

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// Highest index a constant pool may hold (`constant_pool_count` is a u16)
const MAX_POOL_COUNT: usize = u16::MAX as usize;

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Modified UTF-8 bytes, kept undecoded
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Second slot of a `Long` or `Double`
    Unusable,
}

impl Constant {
    /// Number of pool slots the constant occupies
    pub fn slots(&self) -> usize {
        match self {
            Self::Long(_) | Self::Double(_) => 2,
            _ => 1,
        }
    }

    fn read(reader: &mut ClassReader<'_>, index: usize) -> Result<Self, ClassFormatError> {
        let tag = reader.u8()?;
        let constant = match tag {
            TAG_UTF8 => {
                let len = reader.u16()? as usize;
                Self::Utf8(reader.bytes(len)?.to_vec())
            }
            TAG_INTEGER => Self::Integer(reader.u32()?),
            TAG_FLOAT => Self::Float(reader.u32()?),
            TAG_LONG => Self::Long(reader.u64()?),
            TAG_DOUBLE => Self::Double(reader.u64()?),
            TAG_CLASS => Self::Class {
                name_index: reader.u16()?,
            },
            TAG_STRING => Self::String {
                string_index: reader.u16()?,
            },
            TAG_FIELDREF => Self::FieldRef {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            TAG_METHODREF => Self::MethodRef {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            TAG_INTERFACE_METHODREF => Self::InterfaceMethodRef {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            TAG_NAME_AND_TYPE => Self::NameAndType {
                name_index: reader.u16()?,
                descriptor_index: reader.u16()?,
            },
            TAG_METHOD_HANDLE => Self::MethodHandle {
                reference_kind: reader.u8()?,
                reference_index: reader.u16()?,
            },
            TAG_METHOD_TYPE => Self::MethodType {
                descriptor_index: reader.u16()?,
            },
            TAG_DYNAMIC => Self::Dynamic {
                bootstrap_method_attr_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            TAG_INVOKE_DYNAMIC => Self::InvokeDynamic {
                bootstrap_method_attr_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            TAG_MODULE => Self::Module {
                name_index: reader.u16()?,
            },
            TAG_PACKAGE => Self::Package {
                name_index: reader.u16()?,
            },
            other => return Err(ClassFormatError::BadConstantTag { index, tag: other }),
        };
        Ok(constant)
    }

    fn write(&self, out: &mut Vec<u8>) {
        let pair = |out: &mut Vec<u8>, tag: u8, a: u16, b: u16| {
            out.push(tag);
            out.extend_from_slice(&a.to_be_bytes());
            out.extend_from_slice(&b.to_be_bytes());
        };
        let single = |out: &mut Vec<u8>, tag: u8, a: u16| {
            out.push(tag);
            out.extend_from_slice(&a.to_be_bytes());
        };

        match self {
            Self::Utf8(bytes) => {
                out.push(TAG_UTF8);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Self::Integer(v) => {
                out.push(TAG_INTEGER);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Float(v) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Long(v) => {
                out.push(TAG_LONG);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Double(v) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Class { name_index } => single(out, TAG_CLASS, *name_index),
            Self::String { string_index } => single(out, TAG_STRING, *string_index),
            Self::FieldRef {
                class_index,
                name_and_type_index,
            } => pair(out, TAG_FIELDREF, *class_index, *name_and_type_index),
            Self::MethodRef {
                class_index,
                name_and_type_index,
            } => pair(out, TAG_METHODREF, *class_index, *name_and_type_index),
            Self::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => pair(
                out,
                TAG_INTERFACE_METHODREF,
                *class_index,
                *name_and_type_index,
            ),
            Self::NameAndType {
                name_index,
                descriptor_index,
            } => pair(out, TAG_NAME_AND_TYPE, *name_index, *descriptor_index),
            Self::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                out.push(TAG_METHOD_HANDLE);
                out.push(*reference_kind);
                out.extend_from_slice(&reference_index.to_be_bytes());
            }
            Self::MethodType { descriptor_index } => {
                single(out, TAG_METHOD_TYPE, *descriptor_index)
            }
            Self::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => pair(
                out,
                TAG_DYNAMIC,
                *bootstrap_method_attr_index,
                *name_and_type_index,
            ),
            Self::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => pair(
                out,
                TAG_INVOKE_DYNAMIC,
                *bootstrap_method_attr_index,
                *name_and_type_index,
            ),
            Self::Module { name_index } => single(out, TAG_MODULE, *name_index),
            Self::Package { name_index } => single(out, TAG_PACKAGE, *name_index),
            Self::Unusable => {}
        }
    }
}

/// The constant pool of a classfile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Parse the pool, starting at `constant_pool_count`
    pub(crate) fn read(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        let count = reader.u16()? as usize;
        if count == 0 {
            return Err(ClassFormatError::Malformed(
                "constant_pool_count must be at least 1".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(count);
        let mut index = 1;
        while index < count {
            let constant = Constant::read(reader, index)?;
            let slots = constant.slots();
            entries.push(constant);
            if slots == 2 {
                if index + 1 >= count {
                    return Err(ClassFormatError::Malformed(format!(
                        "8-byte constant at index {} overruns the pool",
                        index
                    )));
                }
                entries.push(Constant::Unusable);
            }
            index += slots;
        }

        Ok(Self { entries })
    }

    /// Serialize `constant_pool_count` followed by all entries
    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.entries {
            constant.write(out);
        }
    }

    /// Value of `constant_pool_count` (one more than the highest index)
    pub fn count(&self) -> u16 {
        (self.entries.len() + 1) as u16
    }

    /// Number of slots in use
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a constant by its 1-based index
    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1)
    }

    /// Iterate `(index, constant)` pairs, skipping unusable slots
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| ((i + 1) as u16, c))
    }

    /// Bytes of the Utf8 constant at `index`
    pub fn utf8(&self, index: u16) -> Option<&[u8]> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Internal name referenced by the Class constant at `index`
    pub fn class_name(&self, index: u16) -> Option<&[u8]> {
        match self.get(index) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Find the first Utf8 constant with exactly these bytes
    pub fn find_utf8(&self, value: &[u8]) -> Option<u16> {
        self.iter().find_map(|(index, c)| match c {
            Constant::Utf8(bytes) if bytes == value => Some(index),
            _ => None,
        })
    }

    /// Return the index of a Utf8 constant with this value, appending one if needed
    ///
    /// Appending never moves existing constants.
    pub fn intern_utf8(&mut self, value: &[u8]) -> Result<u16, ClassFormatError> {
        if let Some(index) = self.find_utf8(value) {
            return Ok(index);
        }
        if value.len() > u16::MAX as usize {
            return Err(ClassFormatError::Malformed(format!(
                "Utf8 constant of {} bytes is too long",
                value.len()
            )));
        }
        if self.entries.len() + 1 >= MAX_POOL_COUNT {
            return Err(ClassFormatError::PoolOverflow);
        }
        self.entries.push(Constant::Utf8(value.to_vec()));
        Ok(self.entries.len() as u16)
    }

    /// Replace the contents of a Utf8 constant in place
    pub fn set_utf8(&mut self, index: u16, value: Vec<u8>) -> Result<(), ClassFormatError> {
        if value.len() > u16::MAX as usize {
            return Err(ClassFormatError::Malformed(format!(
                "Utf8 constant #{} would grow to {} bytes",
                index,
                value.len()
            )));
        }
        match index
            .checked_sub(1)
            .and_then(|i| self.entries.get_mut(i as usize))
        {
            Some(Constant::Utf8(bytes)) => {
                *bytes = value;
                Ok(())
            }
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Indices of every Utf8 constant
    pub fn utf8_indices(&self) -> Vec<u16> {
        self.iter()
            .filter(|(_, c)| matches!(c, Constant::Utf8(_)))
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<Vec<Constant>> for ConstantPool {
    fn from(entries: Vec<Constant>) -> Self {
        Self { entries }
    }
}
