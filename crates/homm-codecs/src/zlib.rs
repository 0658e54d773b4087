//! Little-endian byte I/O primitives and zlib framing shared by every codec
//! in this crate.
//!
//! Every format in this crate is little-endian, so the helpers here are
//! thin wrappers over `flate2`'s zlib streams plus a couple of read/write
//! conveniences that the per-format modules lean on instead of repeating
//! `u32::from_le_bytes` boilerplate everywhere.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{self, Read, Write};

use crate::{CodecError, Result};

/// Deflate `data` at the given zlib compression level (0..=9).
pub fn deflate(data: &[u8], level: u32) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
    // Writing to an in-memory Vec<u8> encoder cannot fail.
    enc.write_all(data).expect("in-memory zlib write");
    enc.finish().expect("in-memory zlib finish")
}

/// Inflate `data`, expecting exactly `expected_len` bytes of output.
///
/// # Errors
/// Returns [`CodecError::Inflate`] if the stream is malformed or the output
/// length does not match `expected_len`.
pub fn inflate_strict(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut dec = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len);
    dec.read_to_end(&mut out)
        .map_err(|e| CodecError::Inflate(e.to_string()))?;
    if out.len() != expected_len {
        return Err(CodecError::Inflate(format!(
            "expected {expected_len} bytes, inflated {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Inflate `data`, tolerating truncated or corrupt streams.
///
/// On any stream error the partially-decoded output is zero-padded up to
/// `expected_len` and returned instead of propagating the error. This
/// mirrors the "best-effort partial decompression" mode used when the
/// caller has already decided a damaged archive is still worth reading.
#[must_use]
pub fn inflate_tolerant(data: &[u8], expected_len: usize) -> Vec<u8> {
    let mut dec = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len);
    let mut buf = [0u8; 4096];
    loop {
        match dec.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => {
                tracing::warn!(
                    expected_len,
                    read_so_far = out.len(),
                    "zlib stream error, zero-padding remainder"
                );
                break;
            }
        }
        if out.len() >= expected_len {
            break;
        }
    }
    out.resize(expected_len, 0);
    out
}

/// Read a little-endian `u32` from `r`.
pub fn read_u32le<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian `u16` from `r`.
pub fn read_u16le<R: Read + ?Sized>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian `i16` from `r`.
pub fn read_i16le<R: Read + ?Sized>(r: &mut R) -> io::Result<i16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

/// Write a little-endian `u32` to `w`.
pub fn write_u32le<W: Write + ?Sized>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Write a little-endian `u16` to `w`.
pub fn write_u16le<W: Write + ?Sized>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Write a little-endian `i16` to `w`.
pub fn write_i16le<W: Write + ?Sized>(w: &mut W, v: i16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let packed = deflate(&data, 6);
        assert!(packed.len() < data.len());
        let unpacked = inflate_strict(&packed, data.len()).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn inflate_tolerant_pads_truncated_stream() {
        let data = vec![42u8; 200];
        let packed = deflate(&data, 6);
        let truncated = &packed[..packed.len() / 2];
        let out = inflate_tolerant(truncated, data.len());
        assert_eq!(out.len(), data.len());
    }

    #[test]
    fn le_round_trip() {
        let mut buf = Vec::new();
        write_u32le(&mut buf, 0xDEAD_BEEF).unwrap();
        write_u16le(&mut buf, 0xCAFE).unwrap();
        let mut cur = std::io::Cursor::new(buf);
        assert_eq!(read_u32le(&mut cur).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u16le(&mut cur).unwrap(), 0xCAFE);
    }
}
