//! VID video archive: a bare `u32` count, no stored per-entry size field,
//! and an optional trailing size table bracketed by magic signatures.
//!
//! The original computes each entry's size lazily and caches it in a
//! 4-byte "size + 1" user-data slot, because its file manager is a
//! streaming abstraction where nothing is held in memory ahead of time.
//! This crate materializes the whole directory up front, so every entry's
//! size is simply computed once from address gaps (or read straight out
//! of an explicit trailer, when present) at parse time — no lazy
//! recomputation or cache invalidation to get right.

use crate::variant::signatures::{VID_SIZE_SIG_END, VID_SIZE_SIG_NO_EXT, VID_SIZE_SIG_OLD, VID_SIZE_SIG_START};

/// What, if anything, a VID file's trailer says about entry sizes and
/// naming.
#[derive(Debug, Clone, Default)]
pub struct VidTrailer {
    /// Explicit per-entry sizes, if the trailer carried a size table.
    pub sizes: Option<Vec<u32>>,
    /// Whether entries are stored without a file extension (`.smk` is
    /// implied and stripped/added at extraction).
    pub no_extension: bool,
}

/// Parse a VID file's trailing bytes for a size-table signature. `file`
/// is the complete file, `count` the entry count read from the header.
#[must_use]
pub fn parse_trailer(file: &[u8], count: u32) -> VidTrailer {
    if file.len() < VID_SIZE_SIG_OLD.len() {
        return VidTrailer::default();
    }
    let tail = &file[file.len() - 16..];
    if tail == VID_SIZE_SIG_NO_EXT {
        return VidTrailer {
            sizes: None,
            no_extension: true,
        };
    }
    if tail == VID_SIZE_SIG_OLD {
        let table_start = file.len().saturating_sub(16 + count as usize * 4);
        let sizes = read_u32_table(&file[table_start..file.len() - 16], count);
        return VidTrailer {
            sizes,
            no_extension: false,
        };
    }
    if tail == VID_SIZE_SIG_END {
        let start_pos = file.len().saturating_sub(32 + count as usize * 4);
        if file.len() >= 32 && file[start_pos..start_pos + 16] == VID_SIZE_SIG_START {
            let sizes = read_u32_table(&file[start_pos + 16..file.len() - 16], count);
            return VidTrailer {
                sizes,
                no_extension: false,
            };
        }
    }
    VidTrailer::default()
}

fn read_u32_table(bytes: &[u8], count: u32) -> Option<Vec<u32>> {
    if bytes.len() != count as usize * 4 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect(),
    )
}

/// Compute entry `index`'s size as the gap to the next entry's address (by
/// increasing address order), or to `file_size` for whichever entry sits
/// last.
#[must_use]
pub fn size_from_gaps(addrs: &[u32], index: usize, file_size: u32) -> u32 {
    let start = addrs[index];
    let mut end = file_size;
    for (i, &addr) in addrs.iter().enumerate() {
        if i != index && addr >= start && addr < end {
            end = addr;
        }
    }
    end.saturating_sub(start)
}

/// Resolve each entry's size: prefer an explicit trailer table, otherwise
/// fall back to [`size_from_gaps`] for every entry.
#[must_use]
pub fn resolve_sizes(trailer: &VidTrailer, addrs: &[u32], file_size: u32) -> Vec<u32> {
    if let Some(sizes) = &trailer.sizes {
        return sizes.clone();
    }
    (0..addrs.len())
        .map(|i| size_from_gaps(addrs, i, file_size))
        .collect()
}

/// Build the trailer bytes to append when saving: `[no_ext_sig]? +
/// SIG_START + sizes + SIG_END`, or empty if neither a size table nor the
/// no-extension flag is needed.
#[must_use]
pub fn write_trailer(sizes: &[u32], no_extension: bool, need_size_table: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if no_extension {
        out.extend_from_slice(&VID_SIZE_SIG_NO_EXT);
    }
    if need_size_table {
        out.extend_from_slice(&VID_SIZE_SIG_START);
        for &s in sizes {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out.extend_from_slice(&VID_SIZE_SIG_END);
    }
    out
}

/// Extraction filename: appends `.smk` when the stored name carries no
/// extension.
#[must_use]
pub fn extract_name(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.smk")
    }
}
