//! STR codec: UTF-8 text with a single trailing NUL.

use crate::{CodecError, Result};

/// Decode a STR payload: UTF-8 bytes up to (and excluding) the first NUL.
///
/// # Errors
/// Returns [`CodecError::Corrupt`] if the bytes preceding the NUL are not
/// valid UTF-8.
pub fn unpack(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec()).map_err(|e| CodecError::Corrupt {
        what: "STR text",
        detail: e.to_string(),
    })
}

/// Encode a string as a STR payload: UTF-8 bytes plus one trailing NUL.
#[must_use]
pub fn pack(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.push(0);
    out
}
