//! Archive variant dispatch: the `LodVersion` enum covering all nine
//! directory flavours, the magic-number tables used to recognise them, and
//! the trait every opened archive handle implements.
//!
//! The original modelled each variant as a subclass overriding a handful
//! of virtual methods (`init_options`, `read_header`, `write_header`,
//! `get_extract_name`, ...). Rust has no single-dispatch subclassing story
//! that fits a configuration-plus-behaviour split this shallow, so this
//! crate keeps [`LodVersion`] as a plain enum carrying its own
//! `directory_options()`/`lod_type_strings()` and puts variant-specific
//! file-format logic in sibling modules (`lod`, `snd`, `vid`, `lwd`) that
//! read and write bytes directly — no trait objects, no virtual calls.

pub mod lod;
pub mod lwd;
pub mod snd;
pub mod vid;

use crate::options::DirectoryOptions;

/// 16-byte magic trailers used by VID archives and the Games7 LOD upgrade.
pub mod signatures {
    /// `GamesLOD` → `GamesLOD7` upgrade signature; identical bytes serve as
    /// VID's "sizes stored, no start/end wrapper" trailer.
    pub const VID_SIZE_SIG_OLD: [u8; 16] = [
        0x3E, 0xB9, 0xC5, 0xC5, 0x79, 0x47, 0x48, 0xBD, 0x91, 0x3A, 0xAC, 0xEB, 0x28, 0xEB, 0xE0,
        0x15,
    ];
    /// Marks the start of a VID size table bracketed by start/end magic.
    pub const VID_SIZE_SIG_START: [u8; 16] = [
        0x87, 0x03, 0xC2, 0x4E, 0x26, 0xCF, 0x4C, 0xC6, 0x97, 0xDD, 0xE2, 0xEC, 0xAE, 0xBE, 0xCD,
        0xB4,
    ];
    /// Marks the end of a VID size table bracketed by start/end magic.
    pub const VID_SIZE_SIG_END: [u8; 16] = [
        0x0B, 0x74, 0x52, 0x46, 0x76, 0x09, 0x4D, 0x9F, 0xAF, 0xE5, 0x3F, 0x7E, 0x9B, 0x23, 0x78,
        0x0E,
    ];
    /// Signals that this VID's entries are stored without a file extension.
    pub const VID_SIZE_SIG_NO_EXT: [u8; 16] = [
        0x3F, 0x78, 0xDE, 0x47, 0xE9, 0x2E, 0x40, 0x65, 0x9A, 0xF1, 0x74, 0xBB, 0xAE, 0x9D, 0x77,
        0xD7,
    ];
    /// Alias used at the point of use to upgrade a Games LOD to Games7.
    pub const GAMES_LOD7_SIG: [u8; 16] = VID_SIZE_SIG_OLD;
}

/// The nine archive directory flavours this crate recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LodVersion {
    /// Heroes of Might and Magic 3's single LOD format.
    Heroes,
    /// MM6/MM7 `bitmaps.lod`.
    Bitmaps,
    /// MM6/MM7 `icons.lod`.
    Icons,
    /// MM6/MM7 sprite archive (`sprites08.lod` or similar).
    Sprites,
    /// MM6/MM7 `games.lod`, pre-Games7 trailer.
    Games,
    /// `games.lod` carrying the Games7 trailer signature.
    Games7,
    /// MM6 `chapter.lod`.
    Chapter,
    /// MM7 `chapter.lod` (distinct version string from MM6's).
    Chapter7,
    /// MM8's language/data LOD with wider directory records.
    Mm8,
}

impl LodVersion {
    /// The `(version_string, lod_type_string)` pair stored in the 288-byte
    /// MM header for every non-Heroes variant.
    #[must_use]
    pub fn header_strings(self) -> Option<(&'static str, &'static str)> {
        match self {
            LodVersion::Heroes => None,
            LodVersion::Bitmaps => Some(("MMVI", "bitmaps")),
            LodVersion::Icons => Some(("MMVI", "icons")),
            LodVersion::Sprites => Some(("MMVI", "sprites08")),
            LodVersion::Games | LodVersion::Games7 => Some(("GameMMVI", "maps")),
            LodVersion::Chapter => Some(("MMVI", "chapter")),
            LodVersion::Chapter7 => Some(("MMVII", "chapter")),
            LodVersion::Mm8 => Some(("MMVIII", "language")),
        }
    }

    /// All non-Heroes variants, in the order the original probes them —
    /// used to disambiguate which `(version, lod_type)` pair a header
    /// belongs to.
    #[must_use]
    pub fn mm_variants() -> &'static [LodVersion] {
        &[
            LodVersion::Bitmaps,
            LodVersion::Icons,
            LodVersion::Sprites,
            LodVersion::Games,
            LodVersion::Games7,
            LodVersion::Chapter,
            LodVersion::Chapter7,
            LodVersion::Mm8,
        ]
    }

    /// Directory field layout for this variant, given the archive-relative
    /// address base (`0` for Heroes; the MM header's `ArchiveStart` for the
    /// rest). For Heroes, `addr_start` is ignored in favour of the classic
    /// 96-byte header length; callers that parsed a long (92-byte) header
    /// patch `DirectoryOptions::data_start` themselves afterwards.
    #[must_use]
    pub fn directory_options(self, addr_start: u32) -> DirectoryOptions {
        match self {
            LodVersion::Heroes => DirectoryOptions::heroes(96),
            LodVersion::Mm8 => DirectoryOptions::mm8_lod(addr_start),
            _ => DirectoryOptions::mm_lod(addr_start),
        }
    }

    /// Whether this variant keeps map (`.blv`/`.dlv`/`.odm`/`.ddm`) entries
    /// as a contiguous trailing block regardless of name order.
    #[must_use]
    pub fn is_games_lod(self) -> bool {
        matches!(self, LodVersion::Games | LodVersion::Games7)
    }
}

/// Classifies a raw 12-byte header prefix (signature + version + count) as
/// either the simple Heroes-style layout or the full 288-byte MM layout.
///
/// The second disambiguation rule (`abs(version - count) <= 1 && count >
/// 1000`) exists to recognise archives such as HotA's `HotA.lod`, whose
/// Heroes-style header happens to carry a version field numerically close
/// to its file count.
#[must_use]
pub fn looks_like_simple_heroes_header(version: u32, count: u32) -> bool {
    (version < 1000 && count < 10_000) || (version.abs_diff(count) <= 1 && count > 1000)
}

/// Match an MM header's `(version_string, lod_type_string)` fields against
/// [`LodVersion::mm_variants`], returning the recognised variant.
#[must_use]
pub fn match_mm_variant(version_string: &[u8], lod_type_string: &[u8]) -> Option<LodVersion> {
    for &variant in LodVersion::mm_variants() {
        if let Some((ver, kind)) = variant.header_strings() {
            if version_string == ver.as_bytes() && lod_type_string == kind.as_bytes() {
                return Some(variant);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_heroes_header_detection() {
        assert!(looks_like_simple_heroes_header(20, 50));
        assert!(looks_like_simple_heroes_header(4670, 4669));
        assert!(!looks_like_simple_heroes_header(4670, 10));
    }

    #[test]
    fn match_mm_variant_by_strings() {
        assert_eq!(
            match_mm_variant(b"MMVI", b"bitmaps"),
            Some(LodVersion::Bitmaps)
        );
        assert_eq!(
            match_mm_variant(b"GameMMVI", b"maps"),
            Some(LodVersion::Games)
        );
        assert_eq!(match_mm_variant(b"nope", b"nope"), None);
    }

    #[test]
    fn mm8_uses_wide_directory_records() {
        let opts = LodVersion::Mm8.directory_options(0x500);
        assert_eq!(opts.name_size, 0x40);
        assert_eq!(opts.item_size, 0x4C);
    }
}
