//! SND sound archive handle: a Heroes- or MM-flavoured directory table over
//! `.wav` payloads, dispatched through [`crate::variant::snd`].
//!
//! Both flavours share the same 4-byte header and the same `addr_offset`
//! (0x28), so the flavour can be sniffed from the first entry's payload
//! before the rest of the record layout (which differs between them) is
//! even known.

use crate::archive::{parse_directory_table, write_directory_record};
use crate::directory::Directory;
use crate::error::{ArchiveError, Result};
use crate::variant::snd;
use homm_codecs::zlib;

/// An opened and parsed SND sound archive.
pub struct SndArchive {
    directory: Directory,
    bytes: Vec<u8>,
    /// Whether payloads are zlib-compressed (MM flavour) or stored raw
    /// (Heroes flavour).
    mm: bool,
}

impl SndArchive {
    /// Parse a complete SND file already read into memory.
    ///
    /// # Errors
    /// Propagates [`ArchiveError::Truncated`] if the header or directory
    /// table does not fit the declared entry count.
    pub fn open(bytes: Vec<u8>) -> Result<SndArchive> {
        let header = bytes.get(0..4).ok_or(ArchiveError::Truncated {
            what: "SND header",
            declared: 4,
            found: bytes.len(),
        })?;
        let count = snd::read_header(header.try_into().unwrap());

        // addr_offset is 0x28 in both flavours and data_start is 4 in both,
        // so entry 0's address can be read before `item_size` is known.
        let addr_field_start = 4 + 0x28;
        let mm = bytes
            .get(addr_field_start..addr_field_start + 4)
            .map(|f| u32::from_le_bytes(f.try_into().unwrap()))
            .and_then(|addr| bytes.get(addr as usize..))
            .is_some_and(|first| snd::is_mm_flavour(Some(first)));

        let options = snd::directory_options(mm);
        let entries = parse_directory_table(&bytes, 4, &options, count)?;
        let directory = Directory::from_entries(options, entries);

        Ok(SndArchive { directory, bytes, mm })
    }

    /// Create an empty archive of the requested flavour.
    #[must_use]
    pub fn new(mm: bool) -> SndArchive {
        SndArchive {
            directory: Directory::new(snd::directory_options(mm)),
            bytes: Vec::new(),
            mm,
        }
    }

    /// Whether this archive stores zlib-compressed (MM) payloads.
    #[must_use]
    pub fn is_mm(&self) -> bool {
        self.mm
    }

    /// The directory table.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Read an entry's raw on-disk bytes, from either a staged write or the
    /// backing file.
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

    /// Read and, for the MM flavour, decompress an entry's logical payload.
    ///
    /// Gated explicitly on the archive's detected flavour rather than on
    /// [`crate::DirEntry::is_packed`]: a Heroes-flavour entry parsed from
    /// disk carries no `unpacked_size` field at all (it parses as `0`),
    /// which would make `is_packed` wrongly report every entry compressed.
    pub fn extract(&self, index: usize, tolerant: bool) -> Result<Vec<u8>> {
        let raw = self.raw_bytes(index)?;
        if !self.mm {
            return Ok(raw);
        }
        let entry = &self.directory.entries()[index];
        if !entry.is_packed() {
            return Ok(raw);
        }
        if tolerant {
            Ok(zlib::inflate_tolerant(&raw, entry.unpacked_size as usize))
        } else {
            Ok(zlib::inflate_strict(&raw, entry.unpacked_size as usize)?)
        }
    }

    /// The extraction filename for `index` (always `.wav`).
    #[must_use]
    pub fn extract_name(&self, index: usize) -> String {
        snd::extract_name(&self.directory.entries()[index].name)
    }

    /// Stage `payload` under `name`. MM-flavour archives compress when the
    /// compressed form is strictly smaller; Heroes-flavour archives always
    /// store raw, recording the same value in both size slots so
    /// [`crate::DirEntry::is_packed`] reads false.
    pub fn add(&mut self, name: &str, payload: &[u8]) -> Result<usize> {
        let unpacked_size = payload.len() as u32;
        if self.mm {
            let compressed = zlib::deflate(payload, 6);
            let (stored, packed_size) = if compressed.len() < payload.len() {
                (compressed.clone(), compressed.len() as u32)
            } else {
                (payload.to_vec(), 0)
            };
            self.directory.add(name, stored, unpacked_size, packed_size)
        } else {
            self.directory
                .add(name, payload.to_vec(), unpacked_size, unpacked_size)
        }
    }

    /// Remove the entry at `index`.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        self.directory.delete(index)
    }

    /// Rename the entry at `index`. SND payloads carry no embedded name
    /// copy, so this only touches the directory table.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<usize> {
        self.directory.rename(index, new_name)
    }

    /// Defragment and serialize the archive, consuming all staged writes.
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
        let mut new_entries = Vec::with_capacity(entries.len());
        for (entry, payload) in entries.iter().zip(&payloads) {
            let mut e = entry.clone();
            e.addr = addr;
            e.packed_size = if self.mm {
                if e.packed_size != 0 { payload.len() as u32 } else { 0 }
            } else {
                payload.len() as u32
            };
            addr += payload.len() as u32;
            new_entries.push(e);
        }

        let mut out = vec![0u8; options.data_start as usize];
        out[..4].copy_from_slice(&snd::write_header(new_entries.len() as u32));
        for entry in &new_entries {
            write_directory_record(&mut out, &options, entry);
        }
        for payload in &payloads {
            out.extend_from_slice(payload);
        }

        self.directory = Directory::from_entries(options, new_entries);
        self.bytes = out.clone();
        Ok(out)
    }

    /// Serialize the current state. Equivalent to [`SndArchive::rebuild`];
    /// kept as a distinct name for callers expressing "flush" intent.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        self.rebuild()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heroes_flavour_round_trips_uncompressed() {
        let mut archive = SndArchive::new(false);
        let idx = archive.add("VOICE01", b"raw audio bytes").unwrap();
        let bytes = archive.rebuild().unwrap();

        let reopened = SndArchive::open(bytes).unwrap();
        assert!(!reopened.is_mm());
        assert_eq!(reopened.extract(idx, false).unwrap(), b"raw audio bytes");
        assert_eq!(reopened.extract_name(idx), "VOICE01.wav");
    }

    #[test]
    fn mm_flavour_compresses_and_round_trips() {
        let mut archive = SndArchive::new(true);
        let payload = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let idx = archive.add("VOICE02", &payload).unwrap();
        let bytes = archive.rebuild().unwrap();

        let reopened = SndArchive::open(bytes).unwrap();
        assert!(reopened.is_mm());
        assert_eq!(reopened.extract(idx, false).unwrap(), payload);
    }

    #[test]
    fn flavour_is_detected_from_reopened_bytes_not_carried_state() {
        let mut archive = SndArchive::new(true);
        archive.add("VOICE03", b"some payload data here").unwrap();
        let bytes = archive.rebuild().unwrap();

        // A fresh open, with no prior knowledge of `mm`, must still detect it.
        let reopened = SndArchive::open(bytes).unwrap();
        assert!(reopened.is_mm());
    }

    #[test]
    fn rename_then_extract_preserves_payload() {
        let mut archive = SndArchive::new(false);
        let idx = archive.add("aaa", b"payload").unwrap();
        let idx2 = archive.rename(idx, "bbb").unwrap();
        assert_eq!(archive.extract(idx2, false).unwrap(), b"payload");
        assert_eq!(archive.extract_name(idx2), "bbb.wav");
    }

    #[test]
    fn delete_removes_entry() {
        let mut archive = SndArchive::new(false);
        let idx = archive.add("aaa", b"payload").unwrap();
        archive.delete(idx).unwrap();
        assert_eq!(archive.directory().count(), 0);
    }
}
