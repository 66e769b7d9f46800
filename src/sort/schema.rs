//! Fixed-length record schemas for sort jobs.

use std::fmt;

use crate::common::{Error, Result};

/// Type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// 4-byte little-endian signed integer.
    Integer,
    /// Fixed-length byte string, NUL-padded.
    String,
    /// Floating point. Can be stored but not sorted on.
    Real,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Integer => "integer",
            AttrType::String => "string",
            AttrType::Real => "real",
        };
        f.write_str(name)
    }
}

/// One field of a record: its type and width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub attr_type: AttrType,
    pub size: usize,
}

impl Field {
    pub fn new(attr_type: AttrType, size: usize) -> Self {
        Self { attr_type, size }
    }

    /// A 4-byte integer field.
    pub fn integer() -> Self {
        Self::new(AttrType::Integer, 4)
    }

    /// A fixed-length string field of `size` bytes.
    pub fn string(size: usize) -> Self {
        Self::new(AttrType::String, size)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Ordered list of fields; a record is their concatenation with no padding.
///
/// # Example
/// ```
/// use extsortdb::sort::{Field, Schema};
///
/// let schema = Schema::new(vec![Field::integer(), Field::string(12)])?;
/// assert_eq!(schema.record_len(), 16);
/// assert_eq!(schema.offset_of(1), Some(4));
/// # Ok::<(), extsortdb::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// # Errors
    /// `Configuration` if there are no fields or a field has zero width.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::Configuration("schema has no fields".into()));
        }
        if let Some(i) = fields.iter().position(|f| f.size == 0) {
            return Err(Error::Configuration(format!("field {} has zero size", i)));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<Field> {
        self.fields.get(index).copied()
    }

    /// Bytes per record.
    pub fn record_len(&self) -> usize {
        self.fields.iter().map(|f| f.size).sum()
    }

    /// Byte offset of field `index` within a record.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        if index >= self.fields.len() {
            return None;
        }
        Some(self.fields[..index].iter().map(|f| f.size).sum())
    }
}
