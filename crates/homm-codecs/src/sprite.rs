//! Sprite codec: per-row offset table plus a byte-stream of alternating
//! transparent/opaque run-length opcodes, optionally zlib-framed.

use std::io::{Read, Write};

use crate::zlib::{
    deflate, inflate_strict, read_i16le, read_u32le, write_i16le, write_u32le,
};
use crate::{CodecError, Palette, Result};

const HEADER_LEN: usize = 20;
const LINE_ENTRY_LEN: usize = 8;

/// One decoded row of a sprite: `left`/`right` bound the opaque extent,
/// `pixels` is `width` entries wide with `None` marking transparency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteRow {
    /// Leftmost opaque column (renderer hint).
    pub left: i16,
    /// Rightmost opaque column (renderer hint).
    pub right: i16,
    /// One palette index per column, `None` where transparent.
    pub pixels: Vec<Option<u8>>,
}

/// A decoded sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    /// Full canvas width.
    pub width: u16,
    /// Full canvas height.
    pub height: u16,
    /// Palette id the sprite references.
    pub palette_id: i16,
    /// Rows skipped from the top (not stored, implicitly transparent).
    pub y_skip: i16,
    /// One row per `height - y_skip`.
    pub rows: Vec<SpriteRow>,
}

/// Unpack a sprite record (header + line table + run-length stream).
///
/// # Errors
/// Returns [`CodecError::Corrupt`] if the record is shorter than its
/// declared header/line-table size, or [`CodecError::Inflate`] if the
/// run-length stream is compressed and fails to inflate.
pub fn unpack<R: Read>(mut r: R, record_len: usize) -> Result<Sprite> {
    if record_len < HEADER_LEN {
        return Err(CodecError::Corrupt {
            what: "sprite header",
            detail: format!("record too short: {record_len} bytes"),
        });
    }
    let _size = read_u32le(&mut r)?;
    let width = read_i16le(&mut r)? as u16;
    let height = read_i16le(&mut r)? as u16;
    let palette_id = read_i16le(&mut r)?;
    let _unk1 = read_i16le(&mut r)?;
    let y_skip = read_i16le(&mut r)?;
    let _unk2 = read_i16le(&mut r)?;
    let unpacked_size = read_u32le(&mut r)?;

    let line_count = (height as i32 - y_skip as i32).max(0) as usize;
    let table_len = line_count * LINE_ENTRY_LEN;
    if record_len < HEADER_LEN + table_len {
        return Err(CodecError::Corrupt {
            what: "sprite line table",
            detail: "record shorter than declared line table".into(),
        });
    }

    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        let a1 = read_i16le(&mut r)?;
        let a2 = read_i16le(&mut r)?;
        let pos = read_u32le(&mut r)?;
        lines.push((a1, a2, pos));
    }

    let body_len = record_len - HEADER_LEN - table_len;
    let mut body = vec![0u8; body_len];
    r.read_exact(&mut body)?;
    let stream = if unpacked_size == 0 {
        body
    } else {
        inflate_strict(&body, unpacked_size as usize)?
    };

    let mut rows = Vec::with_capacity(line_count);
    for (a1, a2, pos) in lines {
        let mut cursor = &stream[(pos as usize).min(stream.len())..];
        let mut pixels = vec![None; width as usize];
        let mut x = 0usize;
        while x < width as usize && !cursor.is_empty() {
            let opcode = cursor[0];
            cursor = &cursor[1..];
            if opcode & 0x80 != 0 {
                let run = (opcode & 0x7F) as usize;
                x += run;
            } else {
                let run = opcode as usize;
                let run = run.min(cursor.len());
                for i in 0..run {
                    if x + i < pixels.len() {
                        pixels[x + i] = Some(cursor[i]);
                    }
                }
                cursor = &cursor[run..];
                x += run;
            }
        }
        rows.push(SpriteRow {
            left: a1,
            right: a2,
            pixels,
        });
    }

    Ok(Sprite {
        width,
        height,
        palette_id,
        y_skip,
        rows,
    })
}

/// Render a decoded sprite to RGBA using a companion palette (index 0 of
/// each `Option::None` pixel is transparent, not palette-mapped).
#[must_use]
pub fn to_rgba(sprite: &Sprite, palette: &Palette) -> Vec<[u8; 4]> {
    let mut out = vec![[0u8, 0, 0, 0]; sprite.width as usize * sprite.height as usize];
    let skip = sprite.y_skip.max(0) as usize;
    for (row_idx, row) in sprite.rows.iter().enumerate() {
        let y = skip + row_idx;
        if y >= sprite.height as usize {
            break;
        }
        for (x, px) in row.pixels.iter().enumerate() {
            if let Some(idx) = px {
                let (r, g, b) = palette[*idx as usize];
                out[y * sprite.width as usize + x] = [r, g, b, 0xFF];
            }
        }
    }
    out
}

fn encode_row(pixels: &[Option<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < pixels.len() {
        if pixels[i].is_none() {
            let mut run = 0usize;
            while i + run < pixels.len() && pixels[i + run].is_none() && run < 0x7F {
                run += 1;
            }
            out.push(0x80 | run as u8);
            i += run;
        } else {
            let mut run = 0usize;
            while i + run < pixels.len() && pixels[i + run].is_some() && run < 127 {
                run += 1;
            }
            out.push(run as u8);
            for j in 0..run {
                out.push(pixels[i + j].unwrap_or(0));
            }
            i += run;
        }
    }
    out
}

/// Pack a sprite from per-row indexed pixel data (`None` = transparent).
///
/// `palette_id` must be a valid companion-archive palette id; sprites
/// cannot be added without one (see the archive layer's format checks).
pub fn pack(width: u16, height: u16, y_skip: i16, palette_id: i16, rows: &[Vec<Option<u8>>]) -> Result<Vec<u8>> {
    let mut row_bounds = Vec::with_capacity(rows.len());
    let mut stream = Vec::new();
    for row in rows {
        let left = row.iter().position(Option::is_some).unwrap_or(0) as i16;
        let right = row
            .iter()
            .rposition(Option::is_some)
            .map_or(left, |p| p as i16);
        let offset = stream.len() as u32;
        stream.extend_from_slice(&encode_row(row));
        row_bounds.push((left, right, offset));
    }

    let packed = deflate(&stream, 6);
    let (data, unpacked_size) = if packed.len() < stream.len() {
        (packed, stream.len() as u32)
    } else {
        (stream, 0u32)
    };

    let mut out = Vec::new();
    let header_and_table = HEADER_LEN + row_bounds.len() * LINE_ENTRY_LEN;
    let total_size = (header_and_table + data.len()) as u32;
    write_u32le(&mut out, total_size)?;
    write_i16le(&mut out, width as i16)?;
    write_i16le(&mut out, height as i16)?;
    write_i16le(&mut out, palette_id)?;
    write_i16le(&mut out, 0)?;
    write_i16le(&mut out, y_skip)?;
    write_i16le(&mut out, 0)?;
    write_u32le(&mut out, unpacked_size)?;
    for (a1, a2, pos) in row_bounds {
        write_i16le(&mut out, a1)?;
        write_i16le(&mut out, a2)?;
        write_u32le(&mut out, pos)?;
    }
    out.write_all(&data)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gray_palette() -> Palette {
        let mut p = [(0u8, 0u8, 0u8); 256];
        for (i, e) in p.iter_mut().enumerate() {
            *e = (i as u8, i as u8, i as u8);
        }
        p
    }

    #[test]
    fn pack_unpack_round_trip() {
        let width = 6u16;
        let height = 2u16;
        let rows = vec![
            vec![None, Some(1), Some(2), Some(3), None, None],
            vec![Some(9), Some(9), None, None, None, Some(5)],
        ];
        let packed = pack(width, height, 0, 42, &rows).unwrap();
        let len = packed.len();
        let sprite = unpack(std::io::Cursor::new(packed), len).unwrap();
        assert_eq!(sprite.width, width);
        assert_eq!(sprite.height, height);
        assert_eq!(sprite.palette_id, 42);
        assert_eq!(sprite.rows.len(), 2);
        assert_eq!(sprite.rows[0].pixels, rows[0]);
        assert_eq!(sprite.rows[1].pixels, rows[1]);
    }

    #[test]
    fn to_rgba_marks_transparency() {
        let sprite = Sprite {
            width: 2,
            height: 1,
            palette_id: 0,
            y_skip: 0,
            rows: vec![SpriteRow {
                left: 0,
                right: 0,
                pixels: vec![Some(5), None],
            }],
        };
        let pal = gray_palette();
        let rgba = to_rgba(&sprite, &pal);
        assert_eq!(rgba[0], [5, 5, 5, 0xFF]);
        assert_eq!(rgba[1], [0, 0, 0, 0]);
    }

    fn arb_rows() -> impl proptest::strategy::Strategy<Value = (usize, Vec<Vec<Option<u8>>>)> {
        use proptest::prelude::*;
        (1usize..16).prop_flat_map(|width| {
            proptest::collection::vec(
                proptest::collection::vec(proptest::option::of(0u8..=255u8), width),
                1..8,
            )
            .prop_map(move |rows| (width, rows))
        })
    }

    proptest::proptest! {
        #[test]
        fn pack_unpack_round_trips_for_arbitrary_rows((width, rows) in arb_rows()) {
            let width = width as u16;
            let height = rows.len() as u16;

            let packed = pack(width, height, 0, 1, &rows).unwrap();
            let len = packed.len();
            let sprite = unpack(std::io::Cursor::new(packed), len).unwrap();

            prop_assert_eq!(sprite.width, width);
            prop_assert_eq!(sprite.height, height);
            for (expected, actual) in rows.iter().zip(&sprite.rows) {
                prop_assert_eq!(&actual.pixels, expected);
            }
        }
    }
}
