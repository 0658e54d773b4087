//! DEF container: a multi-group, multi-frame sprite animation format.
//!
//! A DEF is parsed into a [`DefFile`] holding the header, palette, group
//! table and frame descriptors; frame pixels are decoded on demand via
//! [`DefFile::decode_frame`] rather than eagerly, since a DEF can hold
//! hundreds of frames and callers usually want only a handful at a time.

pub(crate) mod codec;
pub mod duration;
mod maker;
pub mod toollist;

pub use codec::{DecodedFrame, FrameHeader};
pub use duration::DefContext;
pub use maker::{DefMaker, PackedFrame};

use std::collections::HashMap;

use crate::zlib::read_u32le;
use crate::{CodecError, Palette, Result, palette_from_bytes};

const HEADER_LEN: usize = 16;
const PALETTE_LEN: usize = 768;
const GROUP_HEADER_LEN: usize = 16;
const FRAME_NAME_LEN: usize = 13;

/// Recognised DEF container type codes (§3 invariant list).
pub const VALID_TYPE_CODES: &[u32] = &[0x40, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x49];

/// One frame slot inside a group: a name and an absolute byte offset into
/// the DEF file where its [`FrameHeader`] + line data begin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    /// Frame name, trimmed of its zero padding.
    pub name: String,
    /// Absolute byte offset of the frame block within the DEF file.
    pub offset: u32,
}

/// One animation group within a DEF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Numeric group id (e.g. "walk", "attack" map to conventional ids
    /// the caller already knows; this crate treats it as opaque).
    pub group_num: u32,
    /// Reserved field, preserved for round-trip fidelity.
    pub unk2: u32,
    /// Reserved field, preserved for round-trip fidelity.
    pub unk3: u32,
    /// Frame slots in on-disk order.
    pub frames: Vec<FrameSlot>,
}

/// A parsed DEF file: header, palette, groups and the raw bytes needed to
/// decode any frame on demand.
#[derive(Debug, Clone)]
pub struct DefFile {
    /// Container type code; one of [`VALID_TYPE_CODES`].
    pub type_code: u32,
    /// Logical canvas width.
    pub canvas_width: u32,
    /// Logical canvas height.
    pub canvas_height: u32,
    /// The 256-entry palette; indices 0..8 carry reserved shadow/selection
    /// semantics (see module docs on [`codec`]).
    pub palette: Palette,
    /// Groups in on-disk order.
    pub groups: Vec<Group>,
    bytes: Vec<u8>,
}

fn trim_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl DefFile {
    /// Parse a complete DEF file from `bytes`.
    ///
    /// # Errors
    /// Returns [`CodecError::Corrupt`] if the header, palette, or any
    /// group/frame table is shorter than declared, or the type code is
    /// not one of [`VALID_TYPE_CODES`].
    pub fn parse(bytes: &[u8]) -> Result<DefFile> {
        if bytes.len() < HEADER_LEN + PALETTE_LEN {
            return Err(CodecError::Corrupt {
                what: "DEF header",
                detail: format!("file too short: {} bytes", bytes.len()),
            });
        }
        let mut cur = &bytes[..];
        let type_code = read_u32le(&mut cur)?;
        let canvas_width = read_u32le(&mut cur)?;
        let canvas_height = read_u32le(&mut cur)?;
        let group_count = read_u32le(&mut cur)?;

        if !VALID_TYPE_CODES.contains(&type_code) {
            return Err(CodecError::Corrupt {
                what: "DEF header",
                detail: format!("unrecognised type code {type_code:#x}"),
            });
        }

        let palette = palette_from_bytes(&bytes[HEADER_LEN..HEADER_LEN + PALETTE_LEN])?;

        let mut pos = HEADER_LEN + PALETTE_LEN;
        let mut groups = Vec::with_capacity(group_count as usize);
        for _ in 0..group_count {
            if bytes.len() < pos + GROUP_HEADER_LEN {
                return Err(CodecError::Corrupt {
                    what: "DEF group header",
                    detail: "truncated group header".into(),
                });
            }
            let mut gh = &bytes[pos..pos + GROUP_HEADER_LEN];
            let group_num = read_u32le(&mut gh)?;
            let item_count = read_u32le(&mut gh)?;
            let unk2 = read_u32le(&mut gh)?;
            let unk3 = read_u32le(&mut gh)?;
            pos += GROUP_HEADER_LEN;

            let names_len = item_count as usize * FRAME_NAME_LEN;
            if bytes.len() < pos + names_len {
                return Err(CodecError::Corrupt {
                    what: "DEF frame name table",
                    detail: "truncated frame name table".into(),
                });
            }
            let mut names = Vec::with_capacity(item_count as usize);
            for i in 0..item_count as usize {
                let raw = &bytes[pos + i * FRAME_NAME_LEN..pos + (i + 1) * FRAME_NAME_LEN];
                names.push(trim_name(raw));
            }
            pos += names_len;

            let offsets_len = item_count as usize * 4;
            if bytes.len() < pos + offsets_len {
                return Err(CodecError::Corrupt {
                    what: "DEF frame offset table",
                    detail: "truncated frame offset table".into(),
                });
            }
            let mut frames = Vec::with_capacity(item_count as usize);
            for i in 0..item_count as usize {
                let mut o = &bytes[pos + i * 4..pos + (i + 1) * 4];
                let offset = read_u32le(&mut o)?;
                frames.push(FrameSlot {
                    name: names[i].clone(),
                    offset,
                });
            }
            pos += offsets_len;

            groups.push(Group {
                group_num,
                unk2,
                unk3,
                frames,
            });
        }

        Ok(DefFile {
            type_code,
            canvas_width,
            canvas_height,
            palette,
            groups,
            bytes: bytes.to_vec(),
        })
    }

    /// Flatten the group table into a frame-index -> (group_index,
    /// frame_in_group) mapping, in on-disk order.
    #[must_use]
    pub fn flat_index(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (gi, g) in self.groups.iter().enumerate() {
            for fi in 0..g.frames.len() {
                out.push((gi, fi));
            }
        }
        out
    }

    /// Decode the frame at `(group_index, frame_in_group)` into object and
    /// shadow canvases sized `canvas_width x canvas_height`.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidFrameOffset`] if the slot's offset does
    /// not point at a valid frame header, or [`CodecError::FrameRectOutOfRange`]
    /// if the frame rectangle does not fit the canvas.
    pub fn decode_frame(&self, group_index: usize, frame_in_group: usize) -> Result<DecodedFrame> {
        let slot = self
            .groups
            .get(group_index)
            .and_then(|g| g.frames.get(frame_in_group))
            .ok_or(CodecError::InvalidFrameOffset(0))?;
        codec::decode_frame_at(
            &self.bytes,
            slot.offset,
            self.canvas_width,
            self.canvas_height,
        )
    }

    /// Group-duplicate-aware duration lookup; see [`duration::frame_duration`].
    #[must_use]
    pub fn frame_duration(
        &self,
        ctx: &DefContext,
        def_stem: &str,
        group_index: usize,
    ) -> Vec<u32> {
        let Some(group) = self.groups.get(group_index) else {
            return Vec::new();
        };
        duration::frame_durations_for_group(self.type_code, group, ctx, def_stem)
    }

    /// Build a name -> first-offset map, honouring the "same-name duplicate
    /// frames within a group share a single payload offset" rule: callers
    /// that want to deduplicate storage while re-packing can consult this.
    #[must_use]
    pub fn dedup_offsets_by_name(&self, group_index: usize) -> HashMap<String, u32> {
        let mut map = HashMap::new();
        if let Some(group) = self.groups.get(group_index) {
            for slot in &group.frames {
                map.entry(slot.name.clone()).or_insert(slot.offset);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_palette() -> [u8; 768] {
        let mut p = [0u8; 768];
        for i in 0..256 {
            p[i * 3] = i as u8;
        }
        p
    }

    fn build_minimal_def() -> Vec<u8> {
        // One group, one stored (compression 0) 2x2 frame named "a".
        let mut out = Vec::new();
        out.extend_from_slice(&0x42u32.to_le_bytes()); // type_code
        out.extend_from_slice(&2u32.to_le_bytes()); // canvas_width
        out.extend_from_slice(&2u32.to_le_bytes()); // canvas_height
        out.extend_from_slice(&1u32.to_le_bytes()); // group_count
        out.extend_from_slice(&sample_palette());

        // group header
        out.extend_from_slice(&0u32.to_le_bytes()); // group_num
        out.extend_from_slice(&1u32.to_le_bytes()); // item_count
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        // frame name (13 bytes)
        let mut name = [0u8; 13];
        name[0] = b'a';
        out.extend_from_slice(&name);

        // frame offset placeholder; patched below
        let offset_pos = out.len();
        out.extend_from_slice(&0u32.to_le_bytes());

        let frame_offset = out.len() as u32;
        out[offset_pos..offset_pos + 4].copy_from_slice(&frame_offset.to_le_bytes());

        // frame header: file_size, compression=0, full_w, full_h, frame_w, frame_h, left, top
        let frame_body = [1u8, 2, 3, 4];
        let frame_size = 32 + frame_body.len() as u32;
        out.extend_from_slice(&frame_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // compression 0
        out.extend_from_slice(&2u32.to_le_bytes()); // full_w
        out.extend_from_slice(&2u32.to_le_bytes()); // full_h
        out.extend_from_slice(&2u32.to_le_bytes()); // frame_w
        out.extend_from_slice(&2u32.to_le_bytes()); // frame_h
        out.extend_from_slice(&0u32.to_le_bytes()); // left
        out.extend_from_slice(&0u32.to_le_bytes()); // top
        out.extend_from_slice(&frame_body);

        out
    }

    #[test]
    fn parses_minimal_def() {
        let bytes = build_minimal_def();
        let def = DefFile::parse(&bytes).unwrap();
        assert_eq!(def.type_code, 0x42);
        assert_eq!(def.groups.len(), 1);
        assert_eq!(def.groups[0].frames.len(), 1);
        assert_eq!(def.groups[0].frames[0].name, "a");
    }

    #[test]
    fn rejects_unknown_type_code() {
        let mut bytes = build_minimal_def();
        bytes[0..4].copy_from_slice(&0xFFu32.to_le_bytes());
        assert!(DefFile::parse(&bytes).is_err());
    }

    #[test]
    fn decodes_stored_frame() {
        let bytes = build_minimal_def();
        let def = DefFile::parse(&bytes).unwrap();
        let frame = def.decode_frame(0, 0).unwrap();
        assert_eq!(frame.object[0], 1);
        assert_eq!(frame.object[1], 2);
        assert_eq!(frame.object[2], 3);
        assert_eq!(frame.object[3], 4);
    }
}
