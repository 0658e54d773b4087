//! The fixed-record directory table shared by every archive variant: find,
//! add, delete, rename, rebuild, and write-on-demand buffering.
//!
//! Unlike the original's streaming file manager, this holds the whole
//! archive body in memory once read — these archives are megabytes, not
//! gigabytes, and an in-memory `Vec<u8>` lets every mutation be a plain
//! slice operation instead of a `begin_write`/`end_write` reference-counted
//! stream dance.

use std::collections::HashMap;

use crate::error::{ArchiveError, Result};
use crate::options::DirectoryOptions;

/// One directory record: a name, its payload's address and size fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, ASCII, case-preserved.
    pub name: String,
    /// Absolute byte offset of the payload within the backing file.
    pub addr: u32,
    /// Size in bytes of the payload as stored on disk.
    pub packed_size: u32,
    /// Logical (decompressed) size of the payload.
    pub unpacked_size: u32,
    /// Opaque per-variant metadata slot (VID's cached-size-plus-one, for
    /// instance). Empty for variants with no such field.
    pub user_data: Vec<u8>,
}

impl DirEntry {
    /// Whether this entry's on-disk bytes are zlib-compressed relative to
    /// [`DirEntry::unpacked_size`].
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.packed_size != 0 && self.packed_size != self.unpacked_size
    }

    /// The size to read from disk at [`DirEntry::addr`].
    #[must_use]
    pub fn on_disk_size(&self) -> u32 {
        if self.packed_size != 0 {
            self.packed_size
        } else {
            self.unpacked_size
        }
    }
}

fn case_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// A variant's directory table plus the write-on-demand staging buffers
/// layered on top of it.
#[derive(Debug, Clone)]
pub struct Directory {
    options: DirectoryOptions,
    entries: Vec<DirEntry>,
    /// Whether entries are currently in case-insensitive sorted order;
    /// `find` uses binary search only while this holds.
    pub sorted: bool,
    /// Games LOD ordering rule: `.blv`/`.odm` entries are kept as a
    /// contiguous suffix regardless of name order.
    pub games_lod: bool,
    write_on_demand: bool,
    pending: HashMap<usize, Vec<u8>>,
}

impl Directory {
    /// An empty directory for `options`.
    #[must_use]
    pub fn new(options: DirectoryOptions) -> Self {
        Directory {
            options,
            entries: Vec::new(),
            sorted: true,
            games_lod: false,
            write_on_demand: false,
            pending: HashMap::new(),
        }
    }

    /// Build a directory from already-parsed entries, checking and
    /// recording whether they are in sorted order.
    #[must_use]
    pub fn from_entries(options: DirectoryOptions, entries: Vec<DirEntry>) -> Self {
        let sorted = entries
            .windows(2)
            .all(|w| case_key(&w[0].name) <= case_key(&w[1].name));
        Directory {
            options,
            entries,
            sorted,
            games_lod: false,
            write_on_demand: false,
            pending: HashMap::new(),
        }
    }

    /// The variant's field-layout configuration.
    #[must_use]
    pub fn options(&self) -> &DirectoryOptions {
        &self.options
    }

    /// Number of entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// All entries in on-disk order.
    #[must_use]
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Enable or disable write-on-demand staging. Disabling flushes any
    /// buffered writes into entry metadata immediately (the actual bytes
    /// are still served from [`Directory::pending_bytes`] until the caller
    /// calls [`Directory::take_pending`] to materialize them).
    pub fn set_write_on_demand(&mut self, v: bool) {
        self.write_on_demand = v;
    }

    /// Whether an index has a staged, not-yet-flushed payload.
    #[must_use]
    pub fn has_pending(&self, index: usize) -> bool {
        self.pending.contains_key(&index)
    }

    /// Borrow a staged payload, if any.
    #[must_use]
    pub fn pending_bytes(&self, index: usize) -> Option<&[u8]> {
        self.pending.get(&index).map(Vec::as_slice)
    }

    /// Drain every staged payload, keyed by directory index, for the
    /// caller to flush to disk.
    pub fn take_pending(&mut self) -> HashMap<usize, Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    /// Case-insensitive lookup. Mirrors the binary search used for sorted
    /// tables and the longest-common-prefix-neighbour heuristic used for
    /// unsorted ones, returning `(found, insertion_index)`.
    #[must_use]
    pub fn find(&self, name: &str) -> (bool, usize) {
        if self.sorted {
            self.find_sorted(name)
        } else {
            self.find_linear(name)
        }
    }

    fn find_sorted(&self, name: &str) -> (bool, usize) {
        let key = case_key(name);
        let mut lo = 0usize;
        let mut hi = self.entries.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match case_key(&self.entries[mid].name).cmp(&key) {
                std::cmp::Ordering::Equal => return (true, mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        (false, lo)
    }

    fn find_linear(&self, name: &str) -> (bool, usize) {
        let key = case_key(name);
        let mut best = 0usize;
        let mut best_same = 0usize;
        let mut best_after = false;
        for (i, entry) in self.entries.iter().enumerate() {
            let other = case_key(&entry.name);
            if other == key {
                return (true, i);
            }
            let same = key
                .bytes()
                .zip(other.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            let after = key > other;
            if same > best_same || (same == best_same && after) {
                best = if after { i + 1 } else { i };
                best_same = same;
                best_after = after;
            }
        }
        let _ = best_after;
        (false, best)
    }

    /// Index to insert `name` at in games-LOD ordering (`.blv`/`.odm`
    /// entries always trail everything else).
    fn find_add_index(&self, name: &str) -> (bool, usize) {
        if !self.games_lod {
            return self.find(name);
        }
        let is_map_file = |n: &str| {
            let lower = n.to_ascii_lowercase();
            lower.ends_with(".blv") || lower.ends_with(".odm")
        };
        let mut split = self.entries.len();
        while split > 0 && !is_map_file(&self.entries[split - 1].name) {
            split -= 1;
        }
        if is_map_file(name) {
            (false, split)
        } else {
            let key = case_key(name);
            let mut lo = 0usize;
            let mut hi = split;
            while lo < hi {
                let mid = (lo + hi) / 2;
                match case_key(&self.entries[mid].name).cmp(&key) {
                    std::cmp::Ordering::Equal => return (true, mid),
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid,
                }
            }
            (false, lo)
        }
    }

    /// Validate `name` against this variant's name-width limit.
    pub fn check_name(&self, name: &str) -> Result<()> {
        if name.len() >= self.options.name_size {
            return Err(ArchiveError::NameTooLong {
                name: name.to_string(),
                max: self.options.name_size,
            });
        }
        Ok(())
    }

    /// Insert or replace `name`'s directory slot, staging `payload` for a
    /// later flush. Returns the entry's index. The caller is responsible
    /// for on-disk placement (`addr`) when not using write-on-demand
    /// staging; this method always stages in `pending` and leaves `addr`
    /// at `u32::MAX` as a placeholder when the entry is new, for the
    /// caller (the variant layer, which knows the backing file's current
    /// length) to patch before a flush.
    pub fn add(
        &mut self,
        name: &str,
        payload: Vec<u8>,
        unpacked_size: u32,
        packed_size: u32,
    ) -> Result<usize> {
        self.check_name(name)?;
        let (found, index) = self.find_add_index(name);
        let entry = DirEntry {
            name: name.to_string(),
            addr: u32::MAX,
            packed_size,
            unpacked_size,
            user_data: Vec::new(),
        };
        if found {
            entry_replace_addr(&mut self.entries, index, &entry);
            self.pending.insert(index, payload);
        } else {
            self.entries.insert(index, entry);
            shift_pending_after_insert(&mut self.pending, index);
            self.pending.insert(index, payload);
        }
        Ok(index)
    }

    /// Remove the entry at `index`, dropping any staged payload.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(ArchiveError::NotFound(index.to_string()));
        }
        self.entries.remove(index);
        self.pending.remove(&index);
        let shifted: HashMap<usize, Vec<u8>> = self
            .pending
            .drain()
            .map(|(i, v)| if i > index { (i - 1, v) } else { (i, v) })
            .collect();
        self.pending = shifted;
        Ok(())
    }

    /// Rename the entry at `index`. If `new_name` collides with another
    /// entry, that entry is deleted first. Returns the entry's post-rename
    /// index (it may move to preserve sort order).
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<usize> {
        self.check_name(new_name)?;
        if index >= self.entries.len() {
            return Err(ArchiveError::NotFound(index.to_string()));
        }
        let (found, collide_index) = self.find(new_name);
        let mut index = index;
        if found && collide_index != index {
            self.delete(collide_index)?;
            if collide_index < index {
                index -= 1;
            }
        } else if found {
            return Ok(index);
        }

        let pending_payload = self.pending.remove(&index);
        let mut entry = self.entries.remove(index);
        let shifted: HashMap<usize, Vec<u8>> = self
            .pending
            .drain()
            .map(|(i, v)| if i > index { (i - 1, v) } else { (i, v) })
            .collect();
        self.pending = shifted;

        entry.name = new_name.to_string();
        let (_, new_index) = self.find_add_index(new_name);
        self.entries.insert(new_index, entry);
        let grown: HashMap<usize, Vec<u8>> = self
            .pending
            .drain()
            .map(|(i, v)| if i >= new_index { (i + 1, v) } else { (i, v) })
            .collect();
        self.pending = grown;
        if let Some(payload) = pending_payload {
            self.pending.insert(new_index, payload);
        }
        Ok(new_index)
    }

    /// Reassign every entry's `addr` sequentially starting at `data_base`,
    /// as a rebuild would: no gaps remain once payloads are rewritten at
    /// these addresses in entry order.
    pub fn defragment_addresses(&mut self, data_base: u32) {
        let mut addr = data_base;
        for entry in &mut self.entries {
            entry.addr = addr;
            addr += entry.on_disk_size();
        }
    }
}

fn entry_replace_addr(entries: &mut [DirEntry], index: usize, replacement: &DirEntry) {
    let keep_addr = entries[index].addr;
    entries[index] = replacement.clone();
    entries[index].addr = keep_addr;
}

fn shift_pending_after_insert(pending: &mut HashMap<usize, Vec<u8>>, index: usize) {
    let shifted: HashMap<usize, Vec<u8>> = pending
        .drain()
        .map(|(i, v)| if i >= index { (i + 1, v) } else { (i, v) })
        .collect();
    *pending = shifted;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, addr: u32, size: u32) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            addr,
            packed_size: 0,
            unpacked_size: size,
            user_data: Vec::new(),
        }
    }

    #[test]
    fn find_sorted_binary_search() {
        let dir = Directory::from_entries(
            DirectoryOptions::heroes(96),
            vec![entry("alpha.bmp", 0, 10), entry("beta.bmp", 10, 10), entry("gamma.bmp", 20, 10)],
        );
        assert!(dir.sorted);
        assert_eq!(dir.find("beta.bmp"), (true, 1));
        assert_eq!(dir.find("BETA.BMP"), (true, 1));
        assert_eq!(dir.find("delta.bmp").0, false);
    }

    #[test]
    fn add_then_delete_round_trips_count() {
        let mut dir = Directory::new(DirectoryOptions::heroes(96));
        let idx = dir.add("loadpr01.bmp", vec![1, 2, 3], 3, 0).unwrap();
        assert_eq!(dir.count(), 1);
        assert!(dir.find("loadpr01.bmp").0);
        dir.delete(idx).unwrap();
        assert_eq!(dir.count(), 0);
        assert!(!dir.find("loadpr01.bmp").0);
    }

    #[test]
    fn rename_moves_entry_and_keeps_payload() {
        let mut dir = Directory::new(DirectoryOptions::heroes(96));
        dir.add("aaa.bmp", vec![1], 1, 0).unwrap();
        let idx = dir.add("zzz.bmp", vec![9, 9], 2, 0).unwrap();
        let new_idx = dir.rename(idx, "bbb.bmp").unwrap();
        assert_eq!(dir.pending_bytes(new_idx), Some(&[9u8, 9u8][..]));
        assert!(dir.find("bbb.bmp").0);
        assert!(!dir.find("zzz.bmp").0);
    }

    #[test]
    fn name_too_long_is_rejected() {
        let mut dir = Directory::new(DirectoryOptions::heroes(96));
        let long_name = "x".repeat(20);
        assert!(dir.add(&long_name, vec![], 0, 0).is_err());
    }

    #[test]
    fn defragment_removes_gaps() {
        let mut dir = Directory::from_entries(
            DirectoryOptions::mm_lod(0x120),
            vec![entry("a", 0x120, 10), entry("b", 0x200_000, 20)],
        );
        dir.defragment_addresses(0x120);
        assert_eq!(dir.entries()[0].addr, 0x120);
        assert_eq!(dir.entries()[1].addr, 0x120 + 10);
    }
}
