//! Directory archive layer for Heroes of Might and Magic / Might and Magic
//! LOD, SND, VID and LWD containers.
//!
//! This crate owns the directory table shared by every variant, version
//! auto-detection, the palette registry, and the high-level
//! [`archive::LodArchive`] handle. Payload bytes extracted from an entry
//! are handed to `homm-codecs` for pixel-level decoding; this crate never
//! interprets what a payload's bytes mean beyond its own header fields.
//!
//! Scheduling model: single-threaded and synchronous throughout. There is
//! no internal thread pool; callers wanting parallelism open independent
//! handles on independent files.

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod archive;
pub mod directory;
pub mod error;
pub mod options;
pub mod palette;
pub mod snd_archive;
pub mod variant;
pub mod vid_archive;

pub use archive::LodArchive;
pub use directory::{DirEntry, Directory};
pub use error::{ArchiveError, Result};
pub use options::DirectoryOptions;
pub use snd_archive::SndArchive;
pub use variant::LodVersion;
pub use vid_archive::VidArchive;
