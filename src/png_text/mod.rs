//! PNG text-chunk reading and writing.
//!
//! This module provides two main entry points:
//!
//! - [`PngImage::open`] — Validate a PNG and expose its text metadata
//! - [`write_png`] — Write the image back with a replacement set of text chunks
//!
//! All work happens at the chunk level via `img-parts`: pixel data (`IDAT`) and
//! rendering chunks are copied through byte-for-byte, never decoded.

mod reader;
mod writer;

pub use reader::{PngImage, TextEntry, TextKind, TextMetadata};
pub use writer::{PRESERVED_CHUNKS, encode_text_chunk, write_png};

pub(crate) const CHUNK_TEXT: [u8; 4] = *b"tEXt";
pub(crate) const CHUNK_ZTXT: [u8; 4] = *b"zTXt";
pub(crate) const CHUNK_ITXT: [u8; 4] = *b"iTXt";
pub(crate) const CHUNK_IDAT: [u8; 4] = *b"IDAT";
pub(crate) const CHUNK_IEND: [u8; 4] = *b"IEND";
