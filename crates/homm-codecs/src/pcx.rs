//! PCX codec: the Heroes LOD's simple bitmap proxy format. Despite the
//! name this is not the DOS PCX format; it is a 12-byte header plus raw
//! pixel bytes, optionally followed by a 768-byte palette.

use std::io::{Read, Write};

use crate::zlib::{read_u32le, write_u32le};
use crate::{CodecError, Palette, Result, palette_from_bytes, palette_to_bytes};

const HEADER_LEN: usize = 12;
const PALETTE_LEN: usize = 768;

/// A decoded PCX image: either indexed (with a palette) or raw RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pcx {
    /// 8-bit palette-indexed pixels.
    Indexed {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// One palette index per pixel, row-major.
        pixels: Vec<u8>,
        /// The trailing 768-byte palette.
        palette: Palette,
    },
    /// 24-bit RGB pixels, no palette.
    Rgb {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Three bytes per pixel (R, G, B), row-major.
        pixels: Vec<u8>,
    },
}

/// Unpack a PCX record.
///
/// # Errors
/// Returns [`CodecError::Corrupt`] if the declared `image_size` matches
/// neither the indexed (`width*height`) nor RGB (`3*width*height`) form.
pub fn unpack<R: Read>(mut r: R) -> Result<Pcx> {
    let image_size = read_u32le(&mut r)?;
    let width = read_u32le(&mut r)?;
    let height = read_u32le(&mut r)?;

    let indexed_size = (width as usize) * (height as usize);
    let rgb_size = indexed_size * 3;

    if image_size as usize == indexed_size {
        let mut pixels = vec![0u8; indexed_size];
        r.read_exact(&mut pixels)?;
        let mut pal_bytes = [0u8; PALETTE_LEN];
        r.read_exact(&mut pal_bytes)?;
        let palette = palette_from_bytes(&pal_bytes)?;
        Ok(Pcx::Indexed {
            width,
            height,
            pixels,
            palette,
        })
    } else if image_size as usize == rgb_size {
        let mut pixels = vec![0u8; rgb_size];
        r.read_exact(&mut pixels)?;
        Ok(Pcx::Rgb {
            width,
            height,
            pixels,
        })
    } else {
        Err(CodecError::Corrupt {
            what: "PCX header",
            detail: format!(
                "image_size {image_size} matches neither indexed ({indexed_size}) nor rgb ({rgb_size}) form"
            ),
        })
    }
}

/// Pack a PCX record from a decoded image.
pub fn pack(img: &Pcx) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match img {
        Pcx::Indexed {
            width,
            height,
            pixels,
            palette,
        } => {
            write_u32le(&mut out, pixels.len() as u32)?;
            write_u32le(&mut out, *width)?;
            write_u32le(&mut out, *height)?;
            out.write_all(pixels)?;
            out.write_all(&palette_to_bytes(palette))?;
        }
        Pcx::Rgb {
            width,
            height,
            pixels,
        } => {
            write_u32le(&mut out, pixels.len() as u32)?;
            write_u32le(&mut out, *width)?;
            write_u32le(&mut out, *height)?;
            out.write_all(pixels)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_round_trip() {
        let mut pal = [(0u8, 0u8, 0u8); 256];
        pal[1] = (10, 20, 30);
        let img = Pcx::Indexed {
            width: 2,
            height: 2,
            pixels: vec![1, 0, 0, 1],
            palette: pal,
        };
        let packed = pack(&img).unwrap();
        let decoded = unpack(std::io::Cursor::new(packed)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn rgb_round_trip() {
        let img = Pcx::Rgb {
            width: 1,
            height: 2,
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        let packed = pack(&img).unwrap();
        let decoded = unpack(std::io::Cursor::new(packed)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn header_length_constant_matches_layout() {
        assert_eq!(HEADER_LEN, 12);
    }
}
