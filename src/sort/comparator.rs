//! Key comparison for fixed-length records.

use std::cmp::Ordering;

use crate::common::{Error, Result};

use super::schema::{AttrType, Schema, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Integer,
    String,
}

/// Orders records by one key field.
///
/// - Integer keys compare as little-endian `i32`.
/// - String keys compare byte-wise as unsigned values over at most the field
///   width, ending early at the first NUL (C `strncmp` rules), so
///   `"ab\0x"` and `"ab\0y"` are equal.
/// - `Descending` reverses the result.
///
/// The comparator carries its whole configuration, so independent sorts can
/// run side by side.
#[derive(Debug, Clone, Copy)]
pub struct RecordComparator {
    key_offset: usize,
    key_len: usize,
    kind: KeyKind,
    order: SortOrder,
}

impl RecordComparator {
    /// Comparator on field `key_index` of `schema`.
    ///
    /// # Errors
    /// `Configuration` if the index is out of range, the key is a `Real`, or
    /// an integer key is not 4 bytes wide.
    pub fn new(schema: &Schema, key_index: usize, order: SortOrder) -> Result<Self> {
        let (field, key_offset) = schema
            .field(key_index)
            .zip(schema.offset_of(key_index))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "key field {} out of range for a schema of {} fields",
                    key_index,
                    schema.len()
                ))
            })?;

        let kind = match field.attr_type {
            AttrType::Integer if field.size == 4 => KeyKind::Integer,
            AttrType::Integer => {
                return Err(Error::Configuration(format!(
                    "integer key must be 4 bytes, got {}",
                    field.size
                )))
            }
            AttrType::String => KeyKind::String,
            other => {
                return Err(Error::Configuration(format!(
                    "cannot sort on a {} key",
                    other
                )))
            }
        };

        Ok(Self {
            key_offset,
            key_len: field.size,
            kind,
            order,
        })
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Compare two records.
    ///
    /// # Panics
    /// Panics if either record is shorter than the key's end offset.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let end = self.key_offset + self.key_len;
        let (ka, kb) = (&a[self.key_offset..end], &b[self.key_offset..end]);

        let ord = match self.kind {
            KeyKind::Integer => decode_i32(ka).cmp(&decode_i32(kb)),
            KeyKind::String => compare_c_strings(ka, kb),
        };

        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

fn decode_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn compare_c_strings(a: &[u8], b: &[u8]) -> Ordering {
    for (&ca, &cb) in a.iter().zip(b) {
        if ca != cb {
            return ca.cmp(&cb);
        }
        if ca == 0 {
            break;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::schema::Field;

    fn int_record(key: i32) -> Vec<u8> {
        let mut record = vec![0xEE; 2];
        record.extend_from_slice(&key.to_le_bytes());
        record
    }

    fn int_schema() -> Schema {
        Schema::new(vec![Field::string(2), Field::integer()]).unwrap()
    }

    #[test]
    fn test_integer_keys() {
        let cmp = RecordComparator::new(&int_schema(), 1, SortOrder::Ascending).unwrap();

        assert_eq!(cmp.compare(&int_record(-5), &int_record(3)), Ordering::Less);
        assert_eq!(cmp.compare(&int_record(300), &int_record(2)), Ordering::Greater);
        assert_eq!(cmp.compare(&int_record(7), &int_record(7)), Ordering::Equal);
    }

    #[test]
    fn test_descending_reverses() {
        let cmp = RecordComparator::new(&int_schema(), 1, SortOrder::Descending).unwrap();

        assert_eq!(cmp.compare(&int_record(-5), &int_record(3)), Ordering::Greater);
        assert_eq!(cmp.compare(&int_record(7), &int_record(7)), Ordering::Equal);
    }

    #[test]
    fn test_string_keys_stop_at_nul() {
        let schema = Schema::new(vec![Field::string(4)]).unwrap();
        let cmp = RecordComparator::new(&schema, 0, SortOrder::Ascending).unwrap();

        assert_eq!(cmp.compare(b"abc\0", b"abd\0"), Ordering::Less);
        assert_eq!(cmp.compare(b"ab\0x", b"ab\0y"), Ordering::Equal);
        assert_eq!(cmp.compare(b"ab\0\0", b"abc\0"), Ordering::Less);
        // Unsigned byte order.
        assert_eq!(cmp.compare(b"\xF0bc\0", b"abc\0"), Ordering::Greater);
    }

    #[test]
    fn test_invalid_keys() {
        let schema = Schema::new(vec![
            Field::new(AttrType::Real, 8),
            Field::new(AttrType::Integer, 8),
        ])
        .unwrap();

        for index in 0..3 {
            assert!(matches!(
                RecordComparator::new(&schema, index, SortOrder::Ascending),
                Err(Error::Configuration(_))
            ));
        }
    }
}
