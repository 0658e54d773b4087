//! Palette deduplication and ID allocation for Bitmaps LOD companions.
//!
//! Palette blobs live inside a `BitmapsLOD` under names `palNNN` (three
//! decimal digits). `find_same_palette` either returns the id of a
//! byte-identical existing palette or the lowest free id in the
//! appropriate reserved band.

use crate::directory::Directory;
use crate::error::{ArchiveError, Result};

/// Bounds of the three reserved palette-id bands, lowest-free-first.
pub const PALETTE_ID_BANDS: [(u32, u32); 3] = [(1, 999), (1000, 9999), (10000, 32767)];

/// Size in bytes of a stored palette entry: 32-byte bitmap-style header
/// (itself zero, signalling "palette file") plus the 768-byte palette.
pub const PALETTE_ENTRY_SIZE: usize = 32 + 16 + 768;

fn palette_name(id: u32) -> String {
    format!("pal{id:03}")
}

fn parse_palette_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let digits = lower.strip_prefix("pal")?;
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether a stored palette entry's raw bytes equal `palette_bytes` (the
/// trailing 768 bytes of an entry whose total size matches
/// [`PALETTE_ENTRY_SIZE`]).
#[must_use]
pub fn is_same_palette(entry_bytes: &[u8], palette_bytes: &[u8; 768]) -> bool {
    entry_bytes.len() == PALETTE_ENTRY_SIZE && &entry_bytes[entry_bytes.len() - 768..] == palette_bytes
}

/// Scan `directory`'s `palNNN` entries (reading each candidate's bytes via
/// `read_entry`) for one matching `palette_bytes`. Returns its id if found.
pub fn find_existing<F>(directory: &Directory, palette_bytes: &[u8; 768], mut read_entry: F) -> Option<u32>
where
    F: FnMut(usize) -> Vec<u8>,
{
    for (index, entry) in directory.entries().iter().enumerate() {
        let Some(id) = parse_palette_name(&entry.name) else {
            continue;
        };
        if entry.unpacked_size as usize != PALETTE_ENTRY_SIZE {
            continue;
        }
        let bytes = read_entry(index);
        if is_same_palette(&bytes, palette_bytes) {
            return Some(id);
        }
    }
    None
}

/// Lowest unused id across the three reserved bands, in band order.
pub fn lowest_free_id(directory: &Directory) -> Result<u32> {
    let taken: std::collections::HashSet<u32> = directory
        .entries()
        .iter()
        .filter_map(|e| parse_palette_name(&e.name))
        .collect();
    for (lo, hi) in PALETTE_ID_BANDS {
        for id in lo..=hi {
            if !taken.contains(&id) {
                return Ok(id);
            }
        }
    }
    Err(ArchiveError::PaletteIdSpaceExhausted)
}

/// Resolve a palette's id: reuse an existing byte-identical `palNNN` entry,
/// or allocate the lowest free id. Does not mutate `directory`; the caller
/// adds the new entry (keyed by [`palette_name`]) only when this returns a
/// freshly allocated id and no match was found.
pub fn find_same_palette<F>(directory: &Directory, palette_bytes: &[u8; 768], read_entry: F) -> Result<(u32, bool)>
where
    F: FnMut(usize) -> Vec<u8>,
{
    if let Some(id) = find_existing(directory, palette_bytes, read_entry) {
        return Ok((id, true));
    }
    Ok((lowest_free_id(directory)?, false))
}

/// The `palNNN` directory name for `id`.
#[must_use]
pub fn entry_name_for(id: u32) -> String {
    palette_name(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirEntry, Directory};
    use crate::options::DirectoryOptions;

    fn make_entry(name: &str, size: usize) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            addr: 0,
            packed_size: 0,
            unpacked_size: size as u32,
            user_data: Vec::new(),
        }
    }

    #[test]
    fn lowest_free_skips_taken_ids_in_band() {
        let dir = Directory::from_entries(
            DirectoryOptions::mm_lod(0),
            vec![make_entry("pal001", PALETTE_ENTRY_SIZE), make_entry("pal002", PALETTE_ENTRY_SIZE)],
        );
        assert_eq!(lowest_free_id(&dir).unwrap(), 3);
    }

    #[test]
    fn first_bitmap_gets_id_one_on_empty_archive() {
        let dir = Directory::new(DirectoryOptions::mm_lod(0));
        assert_eq!(lowest_free_id(&dir).unwrap(), 1);
    }

    #[test]
    fn dedup_returns_existing_id_for_identical_bytes() {
        let dir = Directory::from_entries(
            DirectoryOptions::mm_lod(0),
            vec![make_entry("pal001", PALETTE_ENTRY_SIZE)],
        );
        let stored = vec![7u8; PALETTE_ENTRY_SIZE];
        let mut palette_bytes = [0u8; 768];
        palette_bytes.copy_from_slice(&stored[stored.len() - 768..]);
        let (id, reused) = find_same_palette(&dir, &palette_bytes, |_| stored.clone()).unwrap();
        assert_eq!(id, 1);
        assert!(reused);
    }

    #[test]
    fn non_palette_names_are_ignored() {
        let dir = Directory::from_entries(
            DirectoryOptions::mm_lod(0),
            vec![make_entry("bitmap1.bmp", 100)],
        );
        assert_eq!(lowest_free_id(&dir).unwrap(), 1);
    }
}
