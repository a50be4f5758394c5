//! Ordered name/type/value metadata entries.

use crate::cursor::ByteCursor;
use crate::error::DecodeResult;

/// Value returned by [`MetadataTable::value_or_undefined`] for absent names.
pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub name: String,
    pub type_name: String,
    /// Payload rendered as text.
    pub value: String,
}

/// Metadata in stream order. Names may repeat; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    entries: Vec<MetadataEntry>,
}

impl MetadataTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a `u32` entry count followed by that many entries.
    pub fn read(cursor: &mut ByteCursor<'_>) -> DecodeResult<Self> {
        let count = cursor.read_u32()?;
        let mut table = Self::new();
        for _ in 0..count {
            let name = cursor.read_string()?;
            let type_name = cursor.read_string()?;
            let value = cursor.read_metadata_value(&type_name)?;
            table.push(MetadataEntry {
                name,
                type_name,
                value,
            });
        }
        Ok(table)
    }

    pub fn push(&mut self, entry: MetadataEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetadataEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Value of the first entry named `name`, or [`UNDEFINED`].
    #[must_use]
    pub fn value_or_undefined(&self, name: &str) -> &str {
        self.get(name).map_or(UNDEFINED, |entry| entry.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MetadataEntry> {
        self.entries.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a MetadataTable {
    type Item = &'a MetadataEntry;
    type IntoIter = std::slice::Iter<'a, MetadataEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, value: &str) -> MetadataEntry {
        MetadataEntry {
            name: name.to_string(),
            type_name: "string".to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn lookup_returns_first_duplicate() {
        let mut table = MetadataTable::new();
        table.push(entry("class", "fog volume"));
        table.push(entry("class", "level set"));
        assert_eq!(table.get("class").unwrap().value, "fog volume");
        assert_eq!(table.len(), 2);
        let order: Vec<_> = table.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(order, ["fog volume", "level set"]);
    }

    #[test]
    fn missing_names_are_undefined() {
        let table = MetadataTable::new();
        assert!(table.get("file_bbox_min").is_none());
        assert_eq!(table.value_or_undefined("file_bbox_min"), UNDEFINED);
    }

    #[test]
    fn reads_typed_entries() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        for (name, ty, payload) in [
            ("class", "string", b"fog volume".to_vec()),
            ("file_voxel_count", "int64", 42i64.to_le_bytes().to_vec()),
        ] {
            for s in [name.as_bytes(), ty.as_bytes(), payload.as_slice()] {
                bytes.extend_from_slice(&u32::try_from(s.len()).unwrap().to_le_bytes());
                bytes.extend_from_slice(s);
            }
        }
        let mut cursor = ByteCursor::new(&bytes);
        let table = MetadataTable::read(&mut cursor).unwrap();
        assert_eq!(table.value_or_undefined("class"), "fog volume");
        assert_eq!(table.get("file_voxel_count").unwrap().type_name, "int64");
        assert_eq!(table.value_or_undefined("file_voxel_count"), "42");
        assert_eq!(cursor.remaining(), 0);
    }
}
