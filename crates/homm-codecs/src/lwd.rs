//! LWD codec: a run-length stream over RGB565 opaque runs and transparent
//! runs. Dimensions are never stored in the blob; the archive layer
//! supplies them per-entry.

use std::io::{Read, Write};

use crate::Result;
use crate::zlib::{read_u16le, write_u16le};

/// One decoded LWD pixel: `None` is transparent, `Some` is 24-bit RGB
/// expanded from the stored RGB565 value.
pub type LwdPixel = Option<(u8, u8, u8)>;

fn rgb565_to_rgb(v: u16) -> (u8, u8, u8) {
    let r5 = (v >> 11) & 0x1F;
    let g6 = (v >> 5) & 0x3F;
    let b5 = v & 0x1F;
    (
        ((r5 << 3) | (r5 >> 2)) as u8,
        ((g6 << 2) | (g6 >> 4)) as u8,
        ((b5 << 3) | (b5 >> 2)) as u8,
    )
}

fn rgb_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((u16::from(r) >> 3) << 11) | ((u16::from(g) >> 2) << 5) | (u16::from(b) >> 3)
}

/// Unpack an LWD pixel stream into `width * height` pixels, row-major.
///
/// # Errors
/// Propagates I/O errors only; a truncated stream simply leaves the
/// remainder transparent, matching the tolerant spirit of the rest of
/// this crate's run-length formats.
pub fn unpack<R: Read>(mut r: R, width: u32, height: u32) -> Result<Vec<LwdPixel>> {
    let total = (width as usize) * (height as usize);
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let Ok(len_field) = read_u16le(&mut r) else {
            break;
        };
        if len_field & 0x8000 != 0 {
            let run = (len_field & 0x7FFF) as usize;
            for _ in 0..run {
                if out.len() >= total {
                    break;
                }
                out.push(None);
            }
        } else {
            let run = len_field as usize;
            for _ in 0..run {
                let Ok(px) = read_u16le(&mut r) else {
                    break;
                };
                if out.len() >= total {
                    break;
                }
                out.push(Some(rgb565_to_rgb(px)));
            }
        }
    }
    out.resize(total, None);
    Ok(out)
}

/// Pack `width * height` pixels into an LWD run-length stream.
///
/// A pixel matching `transparent_color` is encoded as part of a
/// transparent run rather than as opaque RGB565 data. Runs never cross a
/// row boundary: each row of `width` pixels restarts its own run count,
/// matching this format's sibling sprite codec.
pub fn pack(pixels: &[(u8, u8, u8)], width: u32, transparent_color: (u8, u8, u8)) -> Result<Vec<u8>> {
    let mapped: Vec<LwdPixel> = pixels
        .iter()
        .map(|&p| if p == transparent_color { None } else { Some(p) })
        .collect();
    let width = width.max(1) as usize;
    let mut out = Vec::new();
    for row in mapped.chunks(width) {
        let mut i = 0usize;
        while i < row.len() {
            if row[i].is_none() {
                let mut run = 0usize;
                while i + run < row.len() && row[i + run].is_none() && run < 0x7FFF {
                    run += 1;
                }
                write_u16le(&mut out, 0x8000 | run as u16)?;
                i += run;
            } else {
                let mut run = 0usize;
                while i + run < row.len() && row[i + run].is_some() && run < 0x7FFF {
                    run += 1;
                }
                write_u16le(&mut out, run as u16)?;
                for j in 0..run {
                    if let Some((r, g, b)) = row[i + j] {
                        write_u16le(&mut out, rgb_to_rgb565(r, g, b))?;
                    }
                }
                i += run;
            }
        }
    }
    out.write_all(&[])?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let transparent = (0, 0, 0);
        let pixels = vec![
            (0, 0, 0),
            (248, 252, 248), // round-trips cleanly through RGB565
            (248, 252, 248),
            (0, 0, 0),
        ];
        let packed = pack(&pixels, 2, transparent).unwrap();
        let decoded = unpack(std::io::Cursor::new(packed), 2, 2).unwrap();
        assert_eq!(decoded[0], None);
        assert_eq!(decoded[1], Some((248, 252, 248)));
        assert_eq!(decoded[2], Some((248, 252, 248)));
        assert_eq!(decoded[3], None);
    }

    #[test]
    fn runs_do_not_cross_row_boundary() {
        // A fully opaque 2x2 canvas: if runs reset per row, the stream
        // holds two separate 2-pixel runs (2 + 2*2 bytes each = 12 total);
        // a single run spanning both rows would instead pack to 10 bytes.
        let transparent = (0, 0, 0);
        let opaque = (248, 252, 248);
        let pixels = vec![opaque, opaque, opaque, opaque];
        let packed = pack(&pixels, 2, transparent).unwrap();
        assert_eq!(packed.len(), 12);
        let decoded = unpack(std::io::Cursor::new(packed), 2, 2).unwrap();
        assert_eq!(decoded, vec![Some(opaque); 4]);
    }

    #[test]
    fn short_stream_pads_transparent() {
        let decoded = unpack(std::io::Cursor::new(Vec::<u8>::new()), 3, 3).unwrap();
        assert_eq!(decoded.len(), 9);
        assert!(decoded.iter().all(Option::is_none));
    }

    proptest::proptest! {
        #[test]
        fn pack_unpack_round_trips_for_arbitrary_colors(
            width in 1u32..8,
            colors in proptest::collection::vec(proptest::prelude::any::<u16>(), 1..64),
        ) {
            let transparent = rgb565_to_rgb(0);
            let pixels: Vec<(u8, u8, u8)> = colors.iter().map(|&v| rgb565_to_rgb(v)).collect();
            let expected: Vec<LwdPixel> = pixels
                .iter()
                .map(|&p| if p == transparent { None } else { Some(p) })
                .collect();

            let height = (pixels.len() as u32).div_ceil(width);
            let mut padded = pixels.clone();
            padded.resize((width * height) as usize, transparent);
            let expected: Vec<LwdPixel> = {
                let mut e = expected;
                e.resize((width * height) as usize, None);
                e
            };

            let packed = pack(&padded, width, transparent).unwrap();
            let decoded = unpack(std::io::Cursor::new(packed), width, height).unwrap();

            proptest::prop_assert_eq!(decoded, expected);
        }
    }
}
