//! VID video archive handle: a bare entry count plus an optional trailing
//! size table, dispatched through [`crate::variant::vid`].
//!
//! Unlike LOD and SND, a VID entry's on-disk size is never stored in its
//! own directory record; it is resolved once at open time from an explicit
//! trailer (when present) or from the gaps between entry addresses, and
//! from then on is carried like any other entry size.

use crate::archive::parse_directory_table;
use crate::directory::{DirEntry, Directory};
use crate::error::{ArchiveError, Result};
use crate::options::DirectoryOptions;
use crate::variant::vid;

/// An opened and parsed VID video archive.
pub struct VidArchive {
    directory: Directory,
    bytes: Vec<u8>,
    /// Whether entries are stored without a file extension (the original
    /// scans entry names front-to-back and latches this on the first
    /// extension-less name found; this crate has the whole list up front,
    /// so `any()` over it is equivalent).
    no_extension: bool,
}

impl VidArchive {
    /// Parse a complete VID file already read into memory.
    ///
    /// # Errors
    /// Propagates [`ArchiveError::Truncated`] if the header or directory
    /// table does not fit the declared entry count.
    pub fn open(bytes: Vec<u8>) -> Result<VidArchive> {
        let header = bytes.get(0..4).ok_or(ArchiveError::Truncated {
            what: "VID header",
            declared: 4,
            found: bytes.len(),
        })?;
        let count = u32::from_le_bytes(header.try_into().unwrap());

        let options = DirectoryOptions::vid();
        let mut entries = parse_directory_table(&bytes, 4, &options, count)?;

        let trailer = vid::parse_trailer(&bytes, count);
        let addrs: Vec<u32> = entries.iter().map(|e| e.addr).collect();
        let sizes = vid::resolve_sizes(&trailer, &addrs, bytes.len() as u32);
        for (entry, &size) in entries.iter_mut().zip(&sizes) {
            entry.unpacked_size = size;
            entry.packed_size = size;
        }

        let no_extension = trailer.no_extension || entries.iter().any(|e| !e.name.contains('.'));
        let directory = Directory::from_entries(options, entries);

        Ok(VidArchive {
            directory,
            bytes,
            no_extension,
        })
    }

    /// Create an empty archive. `no_extension` selects whether entries are
    /// stored (and added) without a file extension.
    #[must_use]
    pub fn new(no_extension: bool) -> VidArchive {
        VidArchive {
            directory: Directory::new(DirectoryOptions::vid()),
            bytes: Vec::new(),
            no_extension,
        }
    }

    /// Whether this archive stores entries without a file extension.
    #[must_use]
    pub fn no_extension(&self) -> bool {
        self.no_extension
    }

    /// The directory table.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Read an entry's raw bytes. VID payloads are never compressed at the
    /// directory layer, so this is the same as [`VidArchive::extract`].
    pub fn raw_bytes(&self, index: usize) -> Result<Vec<u8>> {
        if let Some(staged) = self.directory.pending_bytes(index) {
            return Ok(staged.to_vec());
        }
        let entry = self
            .directory
            .entries()
            .get(index)
            .ok_or_else(|| ArchiveError::NotFound(index.to_string()))?;
        let start = entry.addr as usize;
        let len = entry.on_disk_size() as usize;
        self.bytes
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .ok_or(ArchiveError::Truncated {
                what: "entry payload",
                declared: len,
                found: self.bytes.len().saturating_sub(start),
            })
    }

    /// Read an entry's payload. VID entries are never compressed.
    pub fn extract(&self, index: usize) -> Result<Vec<u8>> {
        self.raw_bytes(index)
    }

    /// The extraction filename for `index`: appends `.smk` if the stored
    /// name carries no extension.
    #[must_use]
    pub fn extract_name(&self, index: usize) -> String {
        vid::extract_name(&self.directory.entries()[index].name)
    }

    /// Stage `payload` under `name`. When this archive stores entries
    /// without extensions, a trailing `.smk` on `name` is stripped first.
    pub fn add(&mut self, name: &str, payload: &[u8]) -> Result<usize> {
        let stored_name = if self.no_extension {
            strip_smk_suffix(name)
        } else {
            name.to_string()
        };
        let size = payload.len() as u32;
        self.directory.add(&stored_name, payload.to_vec(), size, size)
    }

    /// Remove the entry at `index`.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        self.directory.delete(index)
    }

    /// Rename the entry at `index`. VID payloads carry no embedded name
    /// copy, so this only touches the directory table.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<usize> {
        self.directory.rename(index, new_name)
    }

    /// Defragment and serialize the archive, consuming all staged writes.
    ///
    /// Always writes an explicit trailing size table: the original avoids
    /// this only to skip rewriting a streaming file in place, which does
    /// not apply here since every save already rebuilds the whole file.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Truncated`] if a staged or on-disk payload
    /// cannot be read in full.
    pub fn rebuild(&mut self) -> Result<Vec<u8>> {
        let pending = self.directory.take_pending();
        let options = *self.directory.options();
        let entries = self.directory.entries().to_vec();

        let mut payloads = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let bytes = if let Some(p) = pending.get(&i) {
                p.clone()
            } else {
                let start = entry.addr as usize;
                let len = entry.on_disk_size() as usize;
                self.bytes
                    .get(start..start + len)
                    .map(<[u8]>::to_vec)
                    .ok_or(ArchiveError::Truncated {
                        what: "entry payload",
                        declared: len,
                        found: self.bytes.len().saturating_sub(start),
                    })?
            };
            payloads.push(bytes);
        }

        let mut addr = options.data_start + (options.item_size as u32) * entries.len() as u32;
        let mut new_entries: Vec<DirEntry> = Vec::with_capacity(entries.len());
        for (entry, payload) in entries.iter().zip(&payloads) {
            let mut e = entry.clone();
            e.addr = addr;
            e.unpacked_size = payload.len() as u32;
            e.packed_size = payload.len() as u32;
            addr += payload.len() as u32;
            new_entries.push(e);
        }

        let need_no_ext = self.no_extension && new_entries.iter().all(|e| !e.name.contains('.'));
        let sizes: Vec<u32> = new_entries.iter().map(|e| e.unpacked_size).collect();
        let trailer = vid::write_trailer(&sizes, need_no_ext, true);

        let mut out = vec![0u8; options.data_start as usize];
        out[..4].copy_from_slice(&(new_entries.len() as u32).to_le_bytes());
        for entry in &new_entries {
            write_vid_record(&mut out, &options, entry);
        }
        for payload in &payloads {
            out.extend_from_slice(payload);
        }
        out.extend_from_slice(&trailer);

        self.directory = Directory::from_entries(options, new_entries);
        self.bytes = out.clone();
        Ok(out)
    }

    /// Serialize the current state. Equivalent to [`VidArchive::rebuild`];
    /// kept as a distinct name for callers expressing "flush" intent.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        self.rebuild()
    }
}

/// Write a VID directory record: name plus address only, since VID stores
/// no size field of its own.
fn write_vid_record(out: &mut Vec<u8>, options: &DirectoryOptions, entry: &DirEntry) {
    let mut rec = vec![0u8; options.item_size];
    let name_bytes = entry.name.as_bytes();
    let len = name_bytes.len().min(options.name_size);
    rec[..len].copy_from_slice(&name_bytes[..len]);
    let rel_addr = entry.addr - options.addr_start;
    rec[options.addr_offset..options.addr_offset + 4].copy_from_slice(&rel_addr.to_le_bytes());
    out.extend_from_slice(&rec);
}

fn strip_smk_suffix(name: &str) -> String {
    if name.len() >= 4 && name[name.len() - 4..].eq_ignore_ascii_case(".smk") {
        name[..name.len() - 4].to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_then_add_then_rebuild_round_trips() {
        let mut archive = VidArchive::new(false);
        let idx = archive.add("intro.smk", b"video bytes here").unwrap();
        let bytes = archive.rebuild().unwrap();

        let reopened = VidArchive::open(bytes).unwrap();
        assert_eq!(reopened.directory().count(), 1);
        assert_eq!(reopened.extract(idx).unwrap(), b"video bytes here");
        assert_eq!(reopened.extract_name(idx), "intro.smk");
    }

    #[test]
    fn no_extension_mode_strips_smk_on_add() {
        let mut archive = VidArchive::new(true);
        let idx = archive.add("intro.smk", b"payload").unwrap();
        assert_eq!(archive.directory().entries()[idx].name, "intro");
        assert_eq!(archive.extract_name(idx), "intro.smk");
    }

    #[test]
    fn rebuild_writes_a_resolvable_size_trailer() {
        let mut archive = VidArchive::new(false);
        archive.add("a.smk", b"aaaa").unwrap();
        archive.add("b.smk", b"bbbbbbbb").unwrap();
        let bytes = archive.rebuild().unwrap();

        let reopened = VidArchive::open(bytes).unwrap();
        assert_eq!(reopened.extract(0).unwrap(), b"aaaa");
        assert_eq!(reopened.extract(1).unwrap(), b"bbbbbbbb");
    }

    #[test]
    fn no_extension_detected_from_entry_names_without_trailer() {
        // Entries stored without extensions, but no explicit trailer: the
        // original latches `no_extension` from the first extension-less
        // name it sees while loading, independent of any trailer signature.
        let mut archive = VidArchive::new(true);
        archive.add("intro", b"payload").unwrap();
        let bytes = archive.rebuild().unwrap();

        let reopened = VidArchive::open(bytes).unwrap();
        assert!(reopened.no_extension());
        assert_eq!(reopened.extract_name(0), "intro.smk");
    }

    #[test]
    fn delete_removes_entry() {
        let mut archive = VidArchive::new(false);
        let idx = archive.add("a.smk", b"payload").unwrap();
        archive.delete(idx).unwrap();
        assert_eq!(archive.directory().count(), 0);
    }
}
