//! Pixel-level codecs for Heroes of Might and Magic / Might and Magic formats.
//!
//! This crate decodes and encodes the payloads stored inside the archive
//! containers implemented by `homm-archive`. It never opens a file itself;
//! every entry point here works over an in-memory byte slice (or a
//! `std::io::Read`/`Write` pair) handed to it by the caller.
//!
//! Formats covered:
//! - [`bitmap`]: the 32-byte-header LOD bitmap format, with mipmap generation.
//! - [`sprite`]: the offset-table + run-length sprite format.
//! - [`pcx`]: the 12-byte-header Heroes bitmap proxy.
//! - [`lwd`]: RGB565 transparent-run bitmaps.
//! - [`text`]: zero-terminated UTF-8 strings.
//! - [`def`]: the multi-group, multi-frame DEF sprite-animation container.
//!
//! Design principles:
//! - **Symmetric operations**: every `pack`/`unpack` pair round-trips at the
//!   pixel level (see each module's tests).
//! - **No hidden state**: codecs take their configuration (palettes,
//!   transparent colours, predicate hooks) as explicit arguments.
//! - **Strict by default, tolerant by request**: zlib inflate has a strict
//!   mode and a best-effort mode; callers opt into the latter explicitly.

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod bitmap;
pub mod def;
pub mod lwd;
pub mod pcx;
pub mod sprite;
pub mod text;
pub mod zlib;

mod error;

pub use error::CodecError;

/// Result type returned by this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// A palette of 256 RGB triples (768 bytes on disk).
pub type Palette = [(u8, u8, u8); 256];

/// Read a 768-byte Heroes/MM palette blob into 256 RGB triples.
///
/// # Errors
/// Returns [`CodecError::InvalidPalette`] if `bytes` is not exactly 768 bytes long.
pub fn palette_from_bytes(bytes: &[u8]) -> Result<Palette> {
    if bytes.len() != 768 {
        return Err(CodecError::InvalidPalette { len: bytes.len() });
    }
    let mut pal = [(0u8, 0u8, 0u8); 256];
    for (i, entry) in pal.iter_mut().enumerate() {
        let o = i * 3;
        *entry = (bytes[o], bytes[o + 1], bytes[o + 2]);
    }
    Ok(pal)
}

/// Serialize 256 RGB triples back into a 768-byte palette blob.
pub fn palette_to_bytes(pal: &Palette) -> [u8; 768] {
    let mut out = [0u8; 768];
    for (i, &(r, g, b)) in pal.iter().enumerate() {
        let o = i * 3;
        out[o] = r;
        out[o + 1] = g;
        out[o + 2] = b;
    }
    out
}
