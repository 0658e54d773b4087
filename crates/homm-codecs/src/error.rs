use thiserror::Error;

/// Errors raised while decoding or encoding a format in this crate.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An I/O failure while reading or writing a payload stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A palette blob was not exactly 768 bytes.
    #[error("palette must be 768 bytes, got {len}")]
    InvalidPalette {
        /// The length actually observed.
        len: usize,
    },

    /// A header field failed a structural check (magic, size, bounds).
    #[error("corrupt {what}: {detail}")]
    Corrupt {
        /// Which structure failed to parse (e.g. "bitmap header", "DEF frame").
        what: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// zlib inflate failed in strict mode.
    #[error("zlib inflate failed: {0}")]
    Inflate(String),

    /// A bitmap's dimensions are not a power of two but mipmaps were requested.
    #[error("dimensions {width}x{height} are not a power of two; mipmaps require one")]
    NotPowerOfTwo {
        /// Bitmap width.
        width: u32,
        /// Bitmap height.
        height: u32,
    },

    /// A DEF frame's rectangle does not fit inside the canvas.
    #[error("frame rectangle out of range: left={left} top={top} w={w} h={h} canvas={canvas_w}x{canvas_h}")]
    FrameRectOutOfRange {
        /// Frame left offset.
        left: i32,
        /// Frame top offset.
        top: i32,
        /// Frame width.
        w: i32,
        /// Frame height.
        h: i32,
        /// Canvas width.
        canvas_w: i32,
        /// Canvas height.
        canvas_h: i32,
    },

    /// An unsupported or unrecognised DEF compression code.
    #[error("unsupported DEF compression mode {0}")]
    UnsupportedCompression(u32),

    /// A frame offset in a DEF group table does not land on a valid frame block.
    #[error("frame offset {0:#x} does not point to a valid frame block")]
    InvalidFrameOffset(u32),
}
