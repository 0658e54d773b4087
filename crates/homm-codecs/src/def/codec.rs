//! Per-frame DEF decode: the three run-length compression modes and the
//! legacy rectangle-omission quirk.
//!
//! Every mode decodes into two parallel buffers sized `frame_w * frame_h`:
//! an *object* buffer (initialized to 0) and a *shadow* buffer (initialized
//! to 0xFF). A shadow value of 0xFF means "no shadow pixel here, use the
//! object buffer"; any other shadow value is a reserved-palette shadow or
//! selection index (see the DEF palette roles in the container docs).

use crate::zlib::{read_u16le, read_u32le};
use crate::{CodecError, Result};

const FRAME_HEADER_LEN: usize = 32;

/// The eight little-endian `u32` fields stored at the start of every frame
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Size in bytes of the whole frame block, header included.
    pub file_size: u32,
    /// Compression mode: 0 (stored), 1, 2 or 3.
    pub compression: u32,
    /// Canvas width this frame is positioned on.
    pub full_w: u32,
    /// Canvas height this frame is positioned on.
    pub full_h: u32,
    /// Decoded rectangle width.
    pub frame_w: u32,
    /// Decoded rectangle height.
    pub frame_h: u32,
    /// Decoded rectangle left offset on the canvas.
    pub frame_left: i32,
    /// Decoded rectangle top offset on the canvas.
    pub frame_top: i32,
}

/// A decoded frame: object and shadow canvases the size of the frame's own
/// `full_w x full_h`, plus the header that produced them.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// The frame header (after any legacy-quirk normalisation).
    pub header: FrameHeader,
    /// Object-channel canvas, row-major, `full_w * full_h` bytes, 0 where
    /// nothing was drawn.
    pub object: Vec<u8>,
    /// Shadow-channel canvas, row-major, `full_w * full_h` bytes, 0xFF
    /// where nothing was drawn.
    pub shadow: Vec<u8>,
}

fn read_header_at(bytes: &[u8], offset: usize) -> Result<FrameHeader> {
    if bytes.len() < offset + FRAME_HEADER_LEN {
        return Err(CodecError::InvalidFrameOffset(offset as u32));
    }
    let mut cur = &bytes[offset..offset + FRAME_HEADER_LEN];
    let file_size = read_u32le(&mut cur)?;
    let compression = read_u32le(&mut cur)?;
    let full_w = read_u32le(&mut cur)?;
    let full_h = read_u32le(&mut cur)?;
    let frame_w = read_u32le(&mut cur)?;
    let frame_h = read_u32le(&mut cur)?;
    let frame_left = read_u32le(&mut cur)? as i32;
    let frame_top = read_u32le(&mut cur)? as i32;
    Ok(FrameHeader {
        file_size,
        compression,
        full_w,
        full_h,
        frame_w,
        frame_h,
        frame_left,
        frame_top,
    })
}

/// Decode the frame block at absolute `offset` in `bytes`.
///
/// `_canvas_w`/`_canvas_h` are the DEF's own declared canvas dimensions,
/// accepted for API symmetry with the container but not required: each
/// frame block carries its own `full_w`/`full_h`, which is what the
/// decoded canvases are sized to (the two normally agree).
///
/// # Errors
/// Returns [`CodecError::InvalidFrameOffset`] if the header cannot be
/// read, [`CodecError::FrameRectOutOfRange`] if the rectangle does not fit
/// the frame's own canvas, or [`CodecError::UnsupportedCompression`] for
/// an unrecognised compression code.
pub fn decode_frame_at(
    bytes: &[u8],
    offset: u32,
    _canvas_w: u32,
    _canvas_h: u32,
) -> Result<DecodedFrame> {
    let offset = offset as usize;
    let mut header = read_header_at(bytes, offset)?;
    let mut block_start = offset + FRAME_HEADER_LEN;

    // Legacy quirk: these frames never stored the four rectangle fields.
    if header.frame_w > header.full_w
        && header.frame_h > header.full_h
        && header.compression == 1
    {
        header.frame_left = 0;
        header.frame_top = 0;
        header.frame_w = header.full_w;
        header.frame_h = header.full_h;
        block_start -= 16;
    }

    let canvas_len = header.full_w as usize * header.full_h as usize;
    let mut object = vec![0u8; canvas_len];
    let mut shadow = vec![0xFFu8; canvas_len];

    if header.frame_w == 0 || header.frame_h == 0 {
        return Ok(DecodedFrame {
            header,
            object,
            shadow,
        });
    }

    if header.frame_left < 0
        || header.frame_top < 0
        || header.frame_left as u32 + header.frame_w > header.full_w
        || header.frame_top as u32 + header.frame_h > header.full_h
    {
        return Err(CodecError::FrameRectOutOfRange {
            left: header.frame_left,
            top: header.frame_top,
            w: header.frame_w as i32,
            h: header.frame_h as i32,
            canvas_w: header.full_w as i32,
            canvas_h: header.full_h as i32,
        });
    }

    let (frame_obj, frame_sh) = match header.compression {
        0 => decode_stored(bytes, block_start, header.frame_w, header.frame_h)?,
        1 => decode_comp1(bytes, block_start, header.frame_w, header.frame_h)?,
        2 => decode_comp2(bytes, block_start, header.frame_w, header.frame_h)?,
        3 => {
            if header.frame_w % 32 != 0 {
                return Err(CodecError::UnsupportedCompression(3));
            }
            let tiled_h = header.frame_h * (header.frame_w / 32);
            decode_comp2(bytes, block_start, 32, tiled_h)?
        }
        other => return Err(CodecError::UnsupportedCompression(other)),
    };

    blit(
        &mut object,
        &mut shadow,
        header.full_w,
        &frame_obj,
        &frame_sh,
        header.frame_w,
        header.frame_h,
        header.frame_left as u32,
        header.frame_top as u32,
    );

    Ok(DecodedFrame {
        header,
        object,
        shadow,
    })
}

/// Merge a decoded frame's object and shadow canvases into a single RGBA
/// image: shadow value `0xFF` means "use the object buffer" (object index
/// 0 is transparent, any other index is opaque through `palette`); any
/// other shadow value is one of the reserved roles 0..7 and is rendered
/// as a semi-transparent overlay rather than an indexed colour.
#[must_use]
pub fn merge_to_rgba(frame: &DecodedFrame, palette: &crate::Palette) -> Vec<[u8; 4]> {
    frame
        .object
        .iter()
        .zip(frame.shadow.iter())
        .map(|(&obj, &sh)| {
            if sh == 0xFF {
                if obj == 0 {
                    [0, 0, 0, 0]
                } else {
                    let (r, g, b) = palette[obj as usize];
                    [r, g, b, 0xFF]
                }
            } else {
                match sh {
                    0 => [0, 0, 0, 0],
                    1 | 2 | 3 => [0, 0, 0, 96],
                    4 => [0, 0, 0, 128],
                    _ => [0, 0, 0, 200],
                }
            }
        })
        .collect()
}

/// Render a decoded frame's shadow buffer alone, as a "shadow palette"
/// image: each shadow byte is looked up directly in `palette` (the
/// reserved low entries carry the designated shadow colours) rather than
/// blended with the object buffer; `0xFF` (no shadow here) is fully
/// transparent. The counterpart to [`merge_to_rgba`]'s combined view, used
/// where a caller wants the shadow channel as its own image.
#[must_use]
pub fn shadow_channel_to_rgba(frame: &DecodedFrame, palette: &crate::Palette) -> Vec<[u8; 4]> {
    frame
        .shadow
        .iter()
        .map(|&sh| {
            if sh == 0xFF {
                [0, 0, 0, 0]
            } else {
                let (r, g, b) = palette[sh as usize];
                [r, g, b, 0xFF]
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn blit(
    object: &mut [u8],
    shadow: &mut [u8],
    canvas_w: u32,
    frame_obj: &[u8],
    frame_sh: &[u8],
    frame_w: u32,
    frame_h: u32,
    left: u32,
    top: u32,
) {
    for y in 0..frame_h {
        for x in 0..frame_w {
            let src = (y * frame_w + x) as usize;
            let dst = ((top + y) * canvas_w + left + x) as usize;
            object[dst] = frame_obj[src];
            shadow[dst] = frame_sh[src];
        }
    }
}

fn decode_stored(bytes: &[u8], start: usize, w: u32, h: u32) -> Result<(Vec<u8>, Vec<u8>)> {
    let len = (w * h) as usize;
    if bytes.len() < start + len {
        return Err(CodecError::Corrupt {
            what: "DEF stored frame",
            detail: "truncated pixel data".into(),
        });
    }
    let object = bytes[start..start + len].to_vec();
    let shadow = vec![0xFFu8; len];
    Ok((object, shadow))
}

fn decode_comp1(bytes: &[u8], start: usize, w: u32, h: u32) -> Result<(Vec<u8>, Vec<u8>)> {
    let len = (w * h) as usize;
    let mut object = vec![0u8; len];
    let mut shadow = vec![0xFFu8; len];

    let table_len = h as usize * 4;
    if bytes.len() < start + table_len {
        return Err(CodecError::Corrupt {
            what: "DEF compression-1 row table",
            detail: "truncated row offset table".into(),
        });
    }
    let mut offsets = Vec::with_capacity(h as usize);
    for i in 0..h as usize {
        let mut o = &bytes[start + i * 4..start + i * 4 + 4];
        offsets.push(read_u32le(&mut o)?);
    }

    for (row, &row_off) in offsets.iter().enumerate() {
        let mut cur = start + row_off as usize;
        let mut x = 0usize;
        while x < w as usize {
            if cur + 2 > bytes.len() {
                break;
            }
            let code = bytes[cur];
            let value = bytes[cur + 1];
            cur += 2;
            let length = value as usize + 1;
            if code == 0xFF {
                let avail = bytes.len().saturating_sub(cur).min(length);
                for i in 0..avail {
                    if x + i < w as usize {
                        object[row * w as usize + x + i] = bytes[cur + i];
                    }
                }
                cur += avail;
            } else {
                for i in 0..length {
                    if x + i < w as usize {
                        shadow[row * w as usize + x + i] = code;
                    }
                }
            }
            x += length;
        }
    }

    Ok((object, shadow))
}

fn decode_comp2(bytes: &[u8], start: usize, w: u32, h: u32) -> Result<(Vec<u8>, Vec<u8>)> {
    let len = (w as usize) * (h as usize);
    let mut object = vec![0u8; len];
    let mut shadow = vec![0xFFu8; len];

    let table_len = h as usize * 2;
    if bytes.len() < start + table_len {
        return Err(CodecError::Corrupt {
            what: "DEF compression-2/3 row table",
            detail: "truncated row offset table".into(),
        });
    }
    let mut offsets = Vec::with_capacity(h as usize);
    for i in 0..h as usize {
        let mut o = &bytes[start + i * 2..start + i * 2 + 2];
        offsets.push(read_u16le(&mut o)?);
    }

    for (row, &row_off) in offsets.iter().enumerate() {
        let mut cur = start + row_off as usize;
        let mut x = 0usize;
        while x < w as usize {
            if cur >= bytes.len() {
                break;
            }
            let value = bytes[cur];
            cur += 1;
            let code = value >> 5;
            let length = (value & 0x1F) as usize + 1;
            if code == 7 {
                let avail = bytes.len().saturating_sub(cur).min(length);
                for i in 0..avail {
                    if x + i < w as usize {
                        object[row * w as usize + x + i] = bytes[cur + i];
                    }
                }
                cur += avail;
            } else {
                for i in 0..length {
                    if x + i < w as usize {
                        shadow[row * w as usize + x + i] = code;
                        if code == 5 {
                            object[row * w as usize + x + i] = 5;
                        }
                    }
                }
            }
            x += length;
        }
    }

    Ok((object, shadow))
}
