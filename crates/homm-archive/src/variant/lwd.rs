//! LWD: a LOD directory variant, not a distinct container format. Entries
//! hold transparent-bitmap run-length payloads (`homm_codecs::lwd`)
//! instead of LOD bitmaps or sprites, and carry no stored dimensions — a
//! caller-supplied lookup resolves width/height per entry name.

use crate::options::DirectoryOptions;

/// LWD reuses the plain MM LOD directory layout; it has no header fields
/// of its own beyond what `mm_lod` already describes.
#[must_use]
pub fn directory_options(addr_start: u32) -> DirectoryOptions {
    DirectoryOptions::mm_lod(addr_start)
}

/// Resolves an entry's pixel dimensions by name, since LWD blobs never
/// store them. Implementors typically look these up from a companion
/// bitmap format or a fixed table known to the caller.
pub trait DimensionLookup {
    /// Return `(width, height)` for `entry_name`, if known.
    fn dimensions(&self, entry_name: &str) -> Option<(u32, u32)>;
}

/// A lookup that always returns the same fixed dimensions, useful for
/// archives where every LWD entry shares one canvas size.
#[derive(Debug, Clone, Copy)]
pub struct FixedDimensions {
    /// Width applied to every entry.
    pub width: u32,
    /// Height applied to every entry.
    pub height: u32,
}

impl DimensionLookup for FixedDimensions {
    fn dimensions(&self, _entry_name: &str) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

/// A lookup built from an explicit name-to-dimensions table.
#[derive(Debug, Clone, Default)]
pub struct TableDimensions {
    table: std::collections::HashMap<String, (u32, u32)>,
}

impl TableDimensions {
    /// An empty table; populate with [`TableDimensions::insert`].
    #[must_use]
    pub fn new() -> Self {
        TableDimensions {
            table: std::collections::HashMap::new(),
        }
    }

    /// Register `entry_name`'s dimensions.
    pub fn insert(&mut self, entry_name: &str, width: u32, height: u32) {
        self.table.insert(entry_name.to_ascii_lowercase(), (width, height));
    }
}

impl DimensionLookup for TableDimensions {
    fn dimensions(&self, entry_name: &str) -> Option<(u32, u32)> {
        self.table.get(&entry_name.to_ascii_lowercase()).copied()
    }
}

/// Default transparent colour used for LWD pack/unpack when the caller
/// supplies no override: black, matching the archive-wide default.
pub const DEFAULT_TRANSPARENT: (u8, u8, u8) = (0, 0, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_dimensions_applies_to_any_name() {
        let lookup = FixedDimensions { width: 64, height: 64 };
        assert_eq!(lookup.dimensions("whatever"), Some((64, 64)));
    }

    #[test]
    fn table_dimensions_is_case_insensitive() {
        let mut table = TableDimensions::new();
        table.insert("Frame01", 32, 48);
        assert_eq!(table.dimensions("frame01"), Some((32, 48)));
        assert_eq!(table.dimensions("unknown"), None);
    }
}
