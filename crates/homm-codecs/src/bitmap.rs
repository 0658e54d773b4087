//! LOD bitmap codec: 32-byte header + zlib-framed pixel payload + trailing
//! 768-byte palette, with half-scale mipmap chain generation.

use std::io::{Read, Write};

use crate::zlib::{
    deflate, inflate_strict, inflate_tolerant, read_i16le, read_u32le, write_i16le, write_u32le,
};
use crate::{CodecError, Palette, Result, palette_from_bytes, palette_to_bytes};

const HEADER_LEN: usize = 32;
const PALETTE_LEN: usize = 768;

/// A decoded LOD bitmap: indexed pixels at `width`x`height`, plus any mip levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Base level width in pixels.
    pub width: u32,
    /// Base level height in pixels.
    pub height: u32,
    /// Palette id this bitmap references (0 if embedded in-line elsewhere).
    pub palette_id: i16,
    /// Base-level palette indices, row-major, `width * height` bytes.
    pub pixels: Vec<u8>,
    /// Half, quarter and eighth-scale mip levels, base-to-smallest, present
    /// only when the bitmap was packed with mipmaps.
    pub mips: Vec<Vec<u8>>,
    /// The 256-entry palette trailing the payload.
    pub palette: Palette,
}

fn log2_exact(n: u32) -> Option<u32> {
    if n == 0 || !n.is_power_of_two() {
        None
    } else {
        Some(n.trailing_zeros())
    }
}

/// Unpack a LOD bitmap payload (header + payload + palette) read from `r`.
///
/// `payload_len` is the size of the whole record (header + pixel payload +
/// trailing palette), as stored in the owning archive's directory entry.
///
/// # Errors
/// Returns [`CodecError::Corrupt`] if the header or palette cannot be read,
/// or [`CodecError::Inflate`] if the payload is zlib-compressed and fails
/// to inflate in strict mode.
pub fn unpack<R: Read>(mut r: R, payload_len: usize) -> Result<Bitmap> {
    if payload_len < HEADER_LEN + PALETTE_LEN {
        return Err(CodecError::Corrupt {
            what: "bitmap header",
            detail: format!("record too short: {payload_len} bytes"),
        });
    }

    let bmp_size = read_u32le(&mut r)?;
    let data_size = read_u32le(&mut r)?;
    let width = read_i16le(&mut r)?;
    let height = read_i16le(&mut r)?;
    let width_ln2 = read_i16le(&mut r)?;
    let height_ln2 = read_i16le(&mut r)?;
    let width_minus1 = read_i16le(&mut r)?;
    let height_minus1 = read_i16le(&mut r)?;
    let palette_id = read_i16le(&mut r)?;
    let _reserved = read_i16le(&mut r)?;
    let unpacked_size = read_u32le(&mut r)?;
    let _bits = read_u32le(&mut r)?;

    let width = u32::from(width as u16);
    let height = u32::from(height as u16);
    let _ = (width_ln2, width_minus1, height_ln2, height_minus1);

    let body_len = payload_len - HEADER_LEN - PALETTE_LEN;
    let mut body = vec![0u8; body_len];
    r.read_exact(&mut body)?;

    let mut pal_bytes = [0u8; PALETTE_LEN];
    r.read_exact(&mut pal_bytes)?;
    let palette = palette_from_bytes(&pal_bytes)?;

    let base_len = (width as usize) * (height as usize);
    let total = if unpacked_size == 0 {
        data_size as usize
    } else {
        unpacked_size as usize
    };

    let raw = if unpacked_size == 0 {
        body
    } else {
        inflate_strict(&body, total)?
    };

    let _ = bmp_size;

    if raw.len() < base_len {
        return Err(CodecError::Corrupt {
            what: "bitmap payload",
            detail: format!("expected at least {base_len} pixels, got {}", raw.len()),
        });
    }

    let pixels = raw[..base_len].to_vec();
    let mut mips = Vec::new();
    let mut offset = base_len;
    let mut mw = width / 2;
    let mut mh = height / 2;
    for _ in 0..3 {
        if mw == 0 || mh == 0 {
            break;
        }
        let mlen = (mw as usize) * (mh as usize);
        if offset + mlen > raw.len() {
            break;
        }
        mips.push(raw[offset..offset + mlen].to_vec());
        offset += mlen;
        mw /= 2;
        mh /= 2;
    }

    Ok(Bitmap {
        width,
        height,
        palette_id,
        pixels,
        mips,
        palette,
    })
}

/// Unpack tolerating a truncated or corrupt zlib stream: the pixel payload
/// is zero-padded to `unpacked_size` instead of failing.
///
/// # Errors
/// Returns [`CodecError::Corrupt`] only for a malformed header or palette;
/// inflate failures are absorbed.
pub fn unpack_tolerant<R: Read>(mut r: R, payload_len: usize) -> Result<Bitmap> {
    if payload_len < HEADER_LEN + PALETTE_LEN {
        return Err(CodecError::Corrupt {
            what: "bitmap header",
            detail: format!("record too short: {payload_len} bytes"),
        });
    }
    let mut header = vec![0u8; HEADER_LEN];
    r.read_exact(&mut header)?;
    let mut hr = &header[..];
    let _bmp_size = read_u32le(&mut hr)?;
    let data_size = read_u32le(&mut hr)?;
    let width = u32::from(read_i16le(&mut hr)? as u16);
    let height = u32::from(read_i16le(&mut hr)? as u16);
    let _width_ln2 = read_i16le(&mut hr)?;
    let _height_ln2 = read_i16le(&mut hr)?;
    let _width_minus1 = read_i16le(&mut hr)?;
    let _height_minus1 = read_i16le(&mut hr)?;
    let palette_id = read_i16le(&mut hr)?;
    let _reserved = read_i16le(&mut hr)?;
    let unpacked_size = read_u32le(&mut hr)?;

    let body_len = payload_len - HEADER_LEN - PALETTE_LEN;
    let mut body = vec![0u8; body_len];
    r.read_exact(&mut body)?;
    let mut pal_bytes = [0u8; PALETTE_LEN];
    r.read_exact(&mut pal_bytes)?;
    let palette = palette_from_bytes(&pal_bytes)?;

    let total = if unpacked_size == 0 {
        data_size as usize
    } else {
        unpacked_size as usize
    };
    let raw = if unpacked_size == 0 {
        body
    } else {
        inflate_tolerant(&body, total)
    };

    let base_len = (width as usize) * (height as usize);
    let mut pixels = vec![0u8; base_len];
    let n = base_len.min(raw.len());
    pixels[..n].copy_from_slice(&raw[..n]);

    Ok(Bitmap {
        width,
        height,
        palette_id,
        pixels,
        mips: Vec::new(),
        palette,
    })
}

/// Average four neighbouring pixels for mip generation, excluding any pixel
/// equal to `transparent` from the average when one is supplied.
fn mix4(pal: &Palette, p: [u8; 4], transparent: Option<u8>) -> u8 {
    let opaque: Vec<u8> = match transparent {
        Some(t) => p.into_iter().filter(|&x| x != t).collect(),
        None => p.to_vec(),
    };
    if opaque.is_empty() {
        return transparent.unwrap_or(p[0]);
    }
    let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
    for idx in &opaque {
        let (pr, pg, pb) = pal[*idx as usize];
        r += u32::from(pr);
        g += u32::from(pg);
        b += u32::from(pb);
    }
    let n = opaque.len() as u32;
    let avg = (r / n, g / n, b / n);
    // Nearest palette entry to the averaged colour.
    pal.iter()
        .enumerate()
        .min_by_key(|(_, &(pr, pg, pb))| {
            let dr = i32::from(pr) - avg.0 as i32;
            let dg = i32::from(pg) - avg.1 as i32;
            let db = i32::from(pb) - avg.2 as i32;
            dr * dr + dg * dg + db * db
        })
        .map_or(opaque[0], |(i, _)| i as u8)
}

/// Generate three half-scale mip levels via 2x2 box filtering.
///
/// # Errors
/// Returns [`CodecError::NotPowerOfTwo`] unless both `width` and `height`
/// are powers of two and at least 4.
pub fn generate_mips(
    pixels: &[u8],
    width: u32,
    height: u32,
    palette: &Palette,
    transparent: Option<u8>,
) -> Result<Vec<Vec<u8>>> {
    if log2_exact(width).is_none() || log2_exact(height).is_none() || width < 4 || height < 4 {
        return Err(CodecError::NotPowerOfTwo { width, height });
    }
    let mut mips = Vec::new();
    let (mut src, mut sw, mut sh) = (pixels.to_vec(), width, height);
    for _ in 0..3 {
        let (dw, dh) = (sw / 2, sh / 2);
        if dw == 0 || dh == 0 {
            break;
        }
        let mut dst = vec![0u8; (dw * dh) as usize];
        for y in 0..dh {
            for x in 0..dw {
                let (x0, y0) = (x * 2, y * 2);
                let p = [
                    src[(y0 * sw + x0) as usize],
                    src[(y0 * sw + x0 + 1) as usize],
                    src[((y0 + 1) * sw + x0) as usize],
                    src[((y0 + 1) * sw + x0 + 1) as usize],
                ];
                dst[(y * dw + x) as usize] = mix4(palette, p, transparent);
            }
        }
        mips.push(dst.clone());
        src = dst;
        sw = dw;
        sh = dh;
    }
    Ok(mips)
}

/// Pack a bitmap into a LOD bitmap record (header + payload + palette).
///
/// `with_mips` requests mip chain generation (requires power-of-two
/// dimensions >= 4); `transparent` excludes a colour index from mip
/// averaging. Compresses with zlib at level 6, keeping the raw form only
/// if it is strictly smaller than the compressed form.
///
/// # Errors
/// Returns [`CodecError::NotPowerOfTwo`] if mips are requested for
/// non-power-of-two dimensions.
pub fn pack(
    bmp: &Bitmap,
    with_mips: bool,
    transparent: Option<u8>,
) -> Result<Vec<u8>> {
    let mut raw = bmp.pixels.clone();
    let mut mip_chain: Vec<Vec<u8>> = Vec::new();
    if with_mips {
        mip_chain = generate_mips(&bmp.pixels, bmp.width, bmp.height, &bmp.palette, transparent)?;
        for m in &mip_chain {
            raw.extend_from_slice(m);
        }
    }

    let packed = deflate(&raw, 6);
    let (data, unpacked_size) = if packed.len() < raw.len() {
        (packed, raw.len() as u32)
    } else {
        (raw, 0u32)
    };

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + PALETTE_LEN);
    let bmp_size = (HEADER_LEN + data.len() + PALETTE_LEN) as u32;
    write_u32le(&mut out, bmp_size)?;
    write_u32le(&mut out, data.len() as u32)?;
    write_i16le(&mut out, bmp.width as i16)?;
    write_i16le(&mut out, bmp.height as i16)?;
    write_i16le(&mut out, log2_exact(bmp.width).map_or(0, |v| v as i16))?;
    write_i16le(&mut out, log2_exact(bmp.height).map_or(0, |v| v as i16))?;
    write_i16le(&mut out, (bmp.width as i32 - 1) as i16)?;
    write_i16le(&mut out, (bmp.height as i32 - 1) as i16)?;
    write_i16le(&mut out, bmp.palette_id)?;
    write_i16le(&mut out, 0)?;
    write_u32le(&mut out, unpacked_size)?;
    write_u32le(&mut out, if with_mips { 2 } else { 0 })?;
    out.write_all(&data)?;
    out.write_all(&palette_to_bytes(&bmp.palette))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_palette() -> Palette {
        let mut p = [(0u8, 0u8, 0u8); 256];
        for (i, e) in p.iter_mut().enumerate() {
            *e = (i as u8, i as u8, i as u8);
        }
        p
    }

    #[test]
    fn pack_unpack_round_trip_no_mips() {
        let bmp = Bitmap {
            width: 4,
            height: 4,
            palette_id: 7,
            pixels: (0u8..16).collect(),
            mips: Vec::new(),
            palette: gray_palette(),
        };
        let packed = pack(&bmp, false, None).unwrap();
        let record_len = packed.len();
        let decoded = unpack(std::io::Cursor::new(packed), record_len).unwrap();
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.height, 4);
        assert_eq!(decoded.palette_id, 7);
        assert_eq!(decoded.pixels, bmp.pixels);
    }

    #[test]
    fn pack_unpack_round_trip_with_mips() {
        let w = 8u32;
        let h = 8u32;
        let bmp = Bitmap {
            width: w,
            height: h,
            palette_id: 1,
            pixels: vec![3u8; (w * h) as usize],
            mips: Vec::new(),
            palette: gray_palette(),
        };
        let packed = pack(&bmp, true, None).unwrap();
        let record_len = packed.len();
        let decoded = unpack(std::io::Cursor::new(packed), record_len).unwrap();
        assert_eq!(decoded.mips.len(), 3);
        assert_eq!(decoded.mips[0].len(), 16);
        assert_eq!(decoded.mips[1].len(), 4);
        assert_eq!(decoded.mips[2].len(), 1);
        assert!(decoded.mips[0].iter().all(|&p| p == 3));
    }

    #[test]
    fn mips_reject_non_power_of_two() {
        let bmp = Bitmap {
            width: 5,
            height: 5,
            palette_id: 0,
            pixels: vec![0u8; 25],
            mips: Vec::new(),
            palette: gray_palette(),
        };
        assert!(pack(&bmp, true, None).is_err());
    }
}
