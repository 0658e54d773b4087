//! Heroes and MM6/MM7/MM8 LOD headers: detection, parsing, writing, and
//! the per-variant extract-name and rename-payload-patch rules.

use crate::error::{ArchiveError, Result};
use crate::variant::{LodVersion, match_mm_variant, signatures, looks_like_simple_heroes_header};

/// The classic Heroes 3 96-byte header (signature `\xC8LOD` or, in the
/// long-header HotA case, `LOD\0` with a plausible version/count pair).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroesHeader {
    /// 4-byte file signature, either `\xC8LOD` or `LOD\0`.
    pub signature: [u8; 4],
    /// Reported format version (conventionally 200).
    pub version: u32,
    /// Entry count; kept in sync with the directory on save.
    pub count: u32,
    /// Remaining header bytes, preserved byte for byte across round trips.
    pub unknown: Vec<u8>,
    /// Byte offset where the directory table begins: 92 for the `LOD\0`
    /// long-header form, 96 for the classic `\xC8LOD` form.
    pub data_start: u32,
}

/// The 288-byte MM6/MM7/MM8 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmHeader {
    /// Always `LOD\0` for this family.
    pub signature: [u8; 4],
    /// Version string, e.g. `MMVI`, `GameMMVI`, `MMVIII`.
    pub version_string: String,
    /// Free-text description, e.g. "Bitmaps for MMVI.".
    pub description: String,
    /// Reserved, preserved across round trips.
    pub unk1: i32,
    /// Reserved, preserved across round trips.
    pub unk2: i32,
    /// Reserved, conventionally 1.
    pub archives_count: i32,
    /// Lod-type string, e.g. `bitmaps`, `maps`, `language`.
    pub lod_type: String,
    /// Byte offset where the archive body (and directory table) starts.
    pub archive_start: u32,
    /// Size in bytes of the archive body, `file_size - archive_start`.
    pub archive_size: u32,
    /// Reserved, preserved across round trips.
    pub unk5: i32,
    /// Entry count; kept in sync with the directory on save.
    pub count: u16,
    /// Reserved, preserved across round trips.
    pub unk6: u16,
}

/// Either header flavour, tagged by the variant it belongs to.
#[derive(Debug, Clone)]
pub enum LodHeader {
    /// Heroes 3's flat header.
    Heroes(HeroesHeader),
    /// Any MM6/MM7/MM8 variant's 288-byte header.
    Mm(MmHeader),
}

fn trim_trailing_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Parse a LOD file's leading bytes into its version and header.
///
/// # Errors
/// Returns [`ArchiveError::UnknownSignature`] if the bytes don't start with
/// either a recognised Heroes or MM signature, or
/// [`ArchiveError::MalformedHeader`] if an MM header's version/lod-type
/// pair matches no known variant.
pub fn parse_header(bytes: &[u8]) -> Result<(LodVersion, LodHeader)> {
    if bytes.len() < 12 {
        return Err(ArchiveError::Truncated {
            what: "LOD header",
            declared: 12,
            found: bytes.len(),
        });
    }
    let signature = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let version_field = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let count_field = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    if signature == *b"LOD\0" && !looks_like_simple_heroes_header(version_field, count_field) {
        return parse_mm_header(bytes);
    }

    let data_start: u32 = if signature == *b"LOD\0" { 92 } else { 96 };
    let tail_len = (data_start as usize).saturating_sub(12).min(bytes.len().saturating_sub(12));
    let unknown = bytes.get(12..12 + tail_len).unwrap_or_default().to_vec();
    Ok((
        LodVersion::Heroes,
        LodHeader::Heroes(HeroesHeader {
            signature,
            version: version_field,
            count: count_field,
            unknown,
            data_start,
        }),
    ))
}

fn parse_mm_header(bytes: &[u8]) -> Result<(LodVersion, LodHeader)> {
    if bytes.len() < 288 {
        return Err(ArchiveError::Truncated {
            what: "MM LOD header",
            declared: 288,
            found: bytes.len(),
        });
    }
    let version_string = String::from_utf8_lossy(trim_trailing_nul(&bytes[4..84])).into_owned();
    let description = String::from_utf8_lossy(trim_trailing_nul(&bytes[84..164])).into_owned();
    let unk1 = i32::from_le_bytes(bytes[164..168].try_into().unwrap());
    let unk2 = i32::from_le_bytes(bytes[168..172].try_into().unwrap());
    let archives_count = i32::from_le_bytes(bytes[172..176].try_into().unwrap());
    let lod_type = String::from_utf8_lossy(trim_trailing_nul(&bytes[256..272])).into_owned();
    let archive_start = u32::from_le_bytes(bytes[272..276].try_into().unwrap());
    let archive_size = u32::from_le_bytes(bytes[276..280].try_into().unwrap());
    let unk5 = i32::from_le_bytes(bytes[280..284].try_into().unwrap());
    let count = u16::from_le_bytes(bytes[284..286].try_into().unwrap());
    let unk6 = u16::from_le_bytes(bytes[286..288].try_into().unwrap());

    let version = match_mm_variant(version_string.as_bytes(), lod_type.as_bytes()).ok_or_else(|| {
        ArchiveError::MalformedHeader {
            what: "MM LOD header",
            detail: format!("unrecognised (version={version_string:?}, lod_type={lod_type:?})"),
        }
    })?;

    Ok((
        version,
        LodHeader::Mm(MmHeader {
            signature: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version_string,
            description,
            unk1,
            unk2,
            archives_count,
            lod_type,
            archive_start,
            archive_size,
            unk5,
            count,
            unk6,
        }),
    ))
}

/// Upgrade a freshly parsed `Games` header to `Games7` if its trailing 16
/// bytes, or any `.blv`/`.dlv`/`.odm`/`.ddm` entry's leading 8 bytes, carry
/// the Games7 magic.
#[must_use]
pub fn detect_games7(version: LodVersion, file_tail: Option<&[u8]>, map_entry_prefix: Option<&[u8]>) -> LodVersion {
    if version != LodVersion::Games {
        return version;
    }
    if let Some(tail) = file_tail {
        if tail.len() >= 16 && tail[tail.len() - 16..] == signatures::GAMES_LOD7_SIG {
            return LodVersion::Games7;
        }
    }
    if let Some(prefix) = map_entry_prefix {
        if prefix.len() >= 8 {
            let sig1 = u32::from_le_bytes(prefix[0..4].try_into().unwrap());
            let sig2 = u32::from_le_bytes(prefix[4..8].try_into().unwrap());
            if sig1 == 0x0001_6741 && sig2 == 0x6969_766D {
                return LodVersion::Games7;
            }
        }
    }
    version
}

/// Serialize a Heroes header back to its on-disk bytes (`data_start` long,
/// 92 or 96).
#[must_use]
pub fn write_heroes_header(header: &HeroesHeader, count: u32) -> Vec<u8> {
    let mut out = vec![0u8; header.data_start as usize];
    out[0..4].copy_from_slice(&header.signature);
    out[4..8].copy_from_slice(&count.to_le_bytes());
    out[8..12].copy_from_slice(&count.to_le_bytes());
    let copy_len = header.unknown.len().min(out.len() - 12);
    out[12..12 + copy_len].copy_from_slice(&header.unknown[..copy_len]);
    out
}

/// Serialize an MM header back to its on-disk 288 bytes.
#[must_use]
pub fn write_mm_header(version: LodVersion, header: &MmHeader, count: u16) -> Vec<u8> {
    let mut out = vec![0u8; 288];
    out[0..4].copy_from_slice(b"LOD\0");
    let (ver_str, lod_type) = version.header_strings().unwrap_or(("", ""));
    let vlen = ver_str.len().min(80);
    out[4..4 + vlen].copy_from_slice(&ver_str.as_bytes()[..vlen]);
    let dlen = header.description.len().min(80);
    out[84..84 + dlen].copy_from_slice(&header.description.as_bytes()[..dlen]);
    out[164..168].copy_from_slice(&100i32.to_le_bytes());
    out[168..172].copy_from_slice(&0i32.to_le_bytes());
    out[172..176].copy_from_slice(&1i32.to_le_bytes());
    let tlen = lod_type.len().min(16);
    out[256..256 + tlen].copy_from_slice(&lod_type.as_bytes()[..tlen]);
    out[272..276].copy_from_slice(&header.archive_start.to_le_bytes());
    out[276..280].copy_from_slice(&header.archive_size.to_le_bytes());
    out[280..284].copy_from_slice(&0i32.to_le_bytes());
    out[284..286].copy_from_slice(&count.to_le_bytes());
    out[286..288].copy_from_slice(&0u16.to_le_bytes());
    out
}

/// A new Heroes header for a freshly created archive (`\xC8LOD`, version
/// 200, empty count, 80 zero bytes of trailer).
#[must_use]
pub fn new_heroes_header() -> HeroesHeader {
    HeroesHeader {
        signature: [0xC8, b'L', b'O', b'D'],
        version: 200,
        count: 0,
        unknown: vec![0u8; 80],
        data_start: 96,
    }
}

/// A new MM header for a freshly created archive of `version`.
#[must_use]
pub fn new_mm_header(version: LodVersion, description: &str) -> MmHeader {
    let (ver_str, lod_type) = version.header_strings().unwrap_or(("", ""));
    MmHeader {
        signature: *b"LOD\0",
        version_string: ver_str.to_string(),
        description: description.to_string(),
        unk1: 100,
        unk2: 0,
        archives_count: 1,
        lod_type: lod_type.to_string(),
        archive_start: 0x120,
        archive_size: 0,
        unk5: 0,
        count: 0,
        unk6: 0,
    }
}

/// Maps a stored entry name to its on-disk extraction filename.
///
/// `bitmap_header_peek` is the first 8 bytes of the payload immediately
/// following the name field, used only for `Bitmaps`/`Icons`/`Mm8` to tell
/// a bitmap (`bmp_size != 0`) from a stored palette (`data_size == 0` and
/// the entry is at least `768 + 32` bytes) apart; pass `None` to always
/// fall back to the bare name.
#[must_use]
pub fn extract_name(version: LodVersion, name: &str, entry_size: u32, bitmap_header_peek: Option<[u32; 2]>) -> String {
    match version {
        LodVersion::Heroes => {
            if name.to_ascii_lowercase().ends_with(".pcx") {
                let stem = &name[..name.len() - 4];
                format!("{stem}.bmp")
            } else {
                name.to_string()
            }
        }
        LodVersion::Sprites => format!("{name}.bmp"),
        LodVersion::Bitmaps | LodVersion::Icons | LodVersion::Mm8 => {
            if let Some([bmp_size, data_size]) = bitmap_header_peek {
                if bmp_size != 0 {
                    return format!("{name}.bmp");
                }
                if data_size == 0 && entry_size >= 768 + 32 {
                    return format!("{name}.act");
                }
            }
            name.to_string()
        }
        _ => name.to_string(),
    }
}

/// Whether renaming an entry in this variant requires patching the name
/// bytes stored inside the payload's own header (Bitmaps/Icons/Sprites/MM8
/// all embed a copy of the name right after the directory-level one).
#[must_use]
pub fn rename_patches_payload(version: LodVersion) -> bool {
    matches!(
        version,
        LodVersion::Bitmaps | LodVersion::Icons | LodVersion::Sprites | LodVersion::Mm8
    )
}

/// Build the zero-padded name bytes to write at the start of an entry's
/// payload after a rename, for variants where [`rename_patches_payload`]
/// holds.
#[must_use]
pub fn payload_name_patch(new_name: &str, name_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; name_size];
    let len = new_name.len().min(name_size);
    out[..len].copy_from_slice(&new_name.as_bytes()[..len]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classic_heroes_header() {
        let mut bytes = vec![0u8; 96];
        bytes[0..4].copy_from_slice(&[0xC8, b'L', b'O', b'D']);
        bytes[4..8].copy_from_slice(&200u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&5u32.to_le_bytes());
        let (version, header) = parse_header(&bytes).unwrap();
        assert_eq!(version, LodVersion::Heroes);
        match header {
            LodHeader::Heroes(h) => {
                assert_eq!(h.data_start, 96);
                assert_eq!(h.count, 5);
            }
            LodHeader::Mm(_) => panic!("expected heroes header"),
        }
    }

    #[test]
    fn parses_mm_bitmaps_header() {
        let mut bytes = vec![0u8; 288];
        bytes[0..4].copy_from_slice(b"LOD\0");
        bytes[4..8].copy_from_slice(b"MMVI");
        bytes[256..263].copy_from_slice(b"bitmaps");
        bytes[272..276].copy_from_slice(&0x120u32.to_le_bytes());
        let (version, header) = parse_header(&bytes).unwrap();
        assert_eq!(version, LodVersion::Bitmaps);
        match header {
            LodHeader::Mm(h) => assert_eq!(h.archive_start, 0x120),
            LodHeader::Heroes(_) => panic!("expected MM header"),
        }
    }

    #[test]
    fn hota_long_heroes_header_detected_by_version_count_heuristic() {
        let mut bytes = vec![0u8; 92];
        bytes[0..4].copy_from_slice(b"LOD\0");
        bytes[4..8].copy_from_slice(&4670u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&4669u32.to_le_bytes());
        let (version, header) = parse_header(&bytes).unwrap();
        assert_eq!(version, LodVersion::Heroes);
        match header {
            LodHeader::Heroes(h) => assert_eq!(h.data_start, 92),
            LodHeader::Mm(_) => panic!("expected heroes header"),
        }
    }

    #[test]
    fn extract_name_rewrites_pcx_extension_for_heroes() {
        assert_eq!(
            extract_name(LodVersion::Heroes, "LOADPR01.pcx", 100, None),
            "LOADPR01.bmp"
        );
    }

    #[test]
    fn extract_name_appends_bmp_for_sprites() {
        assert_eq!(extract_name(LodVersion::Sprites, "tr01", 100, None), "tr01.bmp");
    }

    #[test]
    fn extract_name_detects_palette_by_zero_sizes() {
        let name = extract_name(LodVersion::Bitmaps, "pal001", 768 + 32 + 16, Some([0, 0]));
        assert_eq!(name, "pal001.act");
    }

    #[test]
    fn games7_upgrades_on_trailer_signature() {
        let mut tail = vec![0u8; 16];
        tail.copy_from_slice(&signatures::GAMES_LOD7_SIG);
        assert_eq!(
            detect_games7(LodVersion::Games, Some(&tail), None),
            LodVersion::Games7
        );
    }

    #[test]
    fn rename_patches_payload_only_for_named_variants() {
        assert!(rename_patches_payload(LodVersion::Sprites));
        assert!(!rename_patches_payload(LodVersion::Heroes));
        assert!(!rename_patches_payload(LodVersion::Games));
    }
}
