use anyhow::{Context, Result, ensure};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use img_parts::Bytes;
use img_parts::png::PngChunk;
use std::io::Write;
use std::path::Path;

use super::reader::{PngImage, TextEntry, TextKind, TextMetadata};
use super::{CHUNK_IDAT, CHUNK_IEND};

/// The only source chunks copied to the output: image data plus the chunks
/// needed to render it with the right colours.
///
/// Everything else (text, EXIF, dpi, timestamps, private chunks, …) is dropped.
pub const PRESERVED_CHUNKS: [[u8; 4]; 9] = [
    *b"IHDR", *b"PLTE", *b"tRNS", *b"gAMA", *b"cHRM", *b"sRGB", *b"iCCP", CHUNK_IDAT, CHUNK_IEND,
];

// PNG keywords are 1-79 Latin-1 bytes.
const MAX_KEYWORD_LEN: usize = 79;

/// Write `image` to `destination` carrying exactly the text entries in `metadata`.
///
/// Strategy:
/// 1. Drop every chunk not listed in [`PRESERVED_CHUNKS`]
/// 2. Insert the new text chunks right before the first `IDAT`
/// 3. Encode the chunk list back to bytes (IDAT untouched) and write it out
///
/// `image` is already fully in memory, so `destination` may be the file it
/// was read from.
pub fn write_png(image: PngImage, metadata: &TextMetadata, destination: &Path) -> Result<()> {
    let mut png = image.into_png();

    let before = png.chunks().len();
    png.chunks_mut()
        .retain(|chunk| PRESERVED_CHUNKS.contains(&chunk.kind()));
    log::debug!("  Removed {} metadata chunk(s)", before - png.chunks().len());

    let insert_at = png
        .chunks()
        .iter()
        .position(|chunk| chunk.kind() == CHUNK_IDAT || chunk.kind() == CHUNK_IEND)
        .unwrap_or(png.chunks().len());

    for (offset, entry) in metadata.entries().iter().enumerate() {
        let chunk = encode_text_chunk(entry)
            .with_context(|| format!("Failed to encode text chunk {:?}", entry.keyword))?;
        png.chunks_mut().insert(insert_at + offset, chunk);
    }

    let output = png.encoder().bytes();
    std::fs::write(destination, &output)
        .with_context(|| format!("Failed to write PNG file {}", destination.display()))?;

    Ok(())
}

/// Encode one text entry as a PNG chunk of its [`TextKind`].
pub fn encode_text_chunk(entry: &TextEntry) -> Result<PngChunk> {
    let mut contents = encode_keyword(&entry.keyword)?;
    contents.push(0);

    match entry.kind {
        TextKind::Text => {
            contents.extend(encode_latin1(&entry.text)?);
        }
        TextKind::CompressedText => {
            contents.push(0); // compression method: zlib
            contents.extend(deflate(&encode_latin1(&entry.text)?)?);
        }
        TextKind::InternationalText => {
            // uncompressed, empty language tag and translated keyword
            contents.extend_from_slice(&[0, 0, 0, 0]);
            contents.extend_from_slice(entry.text.as_bytes());
        }
    }

    Ok(PngChunk::new(entry.kind.chunk_type(), Bytes::from(contents)))
}

fn encode_keyword(keyword: &str) -> Result<Vec<u8>> {
    let bytes = encode_latin1(keyword)?;
    ensure!(
        (1..=MAX_KEYWORD_LEN).contains(&bytes.len()),
        "keyword must be 1-{MAX_KEYWORD_LEN} bytes"
    );
    ensure!(!bytes.contains(&0), "keyword must not contain NUL");
    Ok(bytes)
}

fn encode_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .context("text is not representable in Latin-1")
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
