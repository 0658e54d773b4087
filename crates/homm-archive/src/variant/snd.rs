//! SND sound archive: a bare `u32` count followed by a Heroes- or
//! MM-flavoured directory table, disambiguated by sniffing the first
//! entry's payload for the zlib magic.

use crate::options::DirectoryOptions;

/// zlib stream magic (`CMF=0x78, FLG=0x9C`, the default-compression
/// header `deflate` emits) used to tell an MM-compressed SND apart from a
/// Heroes uncompressed one.
pub const ZLIB_MAGIC: u16 = 0x789C;

/// Detect whether a SND archive is MM-flavoured by sniffing the first two
/// bytes at the first entry's address. `first_entry_bytes` should be the
/// payload bytes at that address (or fewer, if the file is short); `None`
/// when there are no entries, which defaults to the Heroes flavour.
#[must_use]
pub fn is_mm_flavour(first_entry_bytes: Option<&[u8]>) -> bool {
    match first_entry_bytes {
        Some(bytes) if bytes.len() >= 2 => {
            u16::from_le_bytes([bytes[0], bytes[1]]) == ZLIB_MAGIC
        }
        _ => false,
    }
}

/// Directory layout for a SND archive of the detected flavour.
#[must_use]
pub fn directory_options(mm: bool) -> DirectoryOptions {
    if mm {
        DirectoryOptions::snd_mm()
    } else {
        DirectoryOptions::snd_heroes()
    }
}

/// Serialize the 4-byte SND header (just the entry count).
#[must_use]
pub fn write_header(count: u32) -> [u8; 4] {
    count.to_le_bytes()
}

/// Parse the 4-byte SND header.
#[must_use]
pub fn read_header(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

/// Extraction filename for a SND entry: always `.wav`.
#[must_use]
pub fn extract_name(name: &str) -> String {
    format!("{name}.wav")
}
