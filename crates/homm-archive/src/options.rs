//! Per-variant directory field layout, the configuration record that used
//! to be a virtual-method override per archive subclass.

/// Byte offsets and strides describing one archive variant's fixed-record
/// directory table.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryOptions {
    /// Width in bytes of the zero-padded ASCII name field.
    pub name_size: usize,
    /// Byte offset of the little-endian `u32` address field within a record.
    pub addr_offset: usize,
    /// Byte offset of the unpacked-size field, if this variant stores one.
    pub unpacked_size_offset: Option<usize>,
    /// Byte offset of the packed (on-disk) size field, if this variant
    /// stores one. When absent, every entry's on-disk size equals its
    /// unpacked size (the variant never compresses at the directory layer).
    pub packed_size_offset: Option<usize>,
    /// Total size in bytes of one directory record.
    pub item_size: usize,
    /// Byte offset in the backing file where the directory table begins.
    pub data_start: u32,
    /// Base added to every stored address to get an absolute file offset
    /// (MM variants store offsets relative to the archive's own start).
    pub addr_start: u32,
    /// Minimum total file size this variant pads new archives up to.
    pub min_file_size: u32,
}

impl DirectoryOptions {
    /// Heroes LOD: 32-byte records, 16-byte names, explicit packed size.
    #[must_use]
    pub fn heroes(data_start: u32) -> Self {
        DirectoryOptions {
            name_size: 0x10,
            addr_offset: 0x10,
            unpacked_size_offset: Some(0x14),
            packed_size_offset: Some(0x1C),
            item_size: 0x20,
            data_start,
            addr_start: 0,
            min_file_size: 320_092,
        }
    }

    /// MM6/MM7 LOD: 32-byte records, 16-byte names, never compressed at the
    /// directory layer.
    #[must_use]
    pub fn mm_lod(addr_start: u32) -> Self {
        DirectoryOptions {
            name_size: 0x10,
            addr_offset: 0x10,
            unpacked_size_offset: Some(0x14),
            packed_size_offset: None,
            item_size: 0x20,
            data_start: addr_start,
            addr_start,
            min_file_size: 0,
        }
    }

    /// MM8 LOD: 76-byte records, 64-byte names.
    #[must_use]
    pub fn mm8_lod(addr_start: u32) -> Self {
        DirectoryOptions {
            name_size: 0x40,
            addr_offset: 0x40,
            unpacked_size_offset: Some(0x44),
            packed_size_offset: None,
            item_size: 0x4C,
            data_start: addr_start,
            addr_start,
            min_file_size: 0,
        }
    }

    /// SND, Heroes flavour: 48-byte records, no unpacked-size field (the
    /// payload is never compressed).
    #[must_use]
    pub fn snd_heroes() -> Self {
        DirectoryOptions {
            name_size: 0x28,
            addr_offset: 0x28,
            unpacked_size_offset: None,
            packed_size_offset: Some(0x2C),
            item_size: 0x30,
            data_start: 4,
            addr_start: 0,
            min_file_size: 0,
        }
    }

    /// SND, MM flavour: 52-byte records, zlib-compressed payloads.
    #[must_use]
    pub fn snd_mm() -> Self {
        DirectoryOptions {
            name_size: 0x28,
            addr_offset: 0x28,
            unpacked_size_offset: Some(0x30),
            packed_size_offset: Some(0x2C),
            item_size: 0x34,
            data_start: 4,
            addr_start: 0,
            min_file_size: 0,
        }
    }

    /// VID: size is never stored explicitly; entries carry a `u32` "cached
    /// size + 1" user-data slot filled in lazily from address gaps.
    #[must_use]
    pub fn vid() -> Self {
        DirectoryOptions {
            name_size: 0x28,
            addr_offset: 0x28,
            unpacked_size_offset: None,
            packed_size_offset: None,
            item_size: 0x2C,
            data_start: 4,
            addr_start: 0,
            min_file_size: 0,
        }
    }
}
