use anyhow::{Context, Result, anyhow, bail, ensure};
use flate2::read::ZlibDecoder;
use image::{ImageFormat, ImageReader};
use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};
use serde::Serialize;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

use super::{CHUNK_ITXT, CHUNK_TEXT, CHUNK_ZTXT};

/// The three PNG text chunk types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextKind {
    /// `tEXt` — uncompressed Latin-1
    Text,
    /// `zTXt` — zlib-compressed Latin-1
    CompressedText,
    /// `iTXt` — UTF-8, optionally compressed
    InternationalText,
}

impl TextKind {
    pub fn from_chunk_type(kind: [u8; 4]) -> Option<Self> {
        match &kind {
            b"tEXt" => Some(Self::Text),
            b"zTXt" => Some(Self::CompressedText),
            b"iTXt" => Some(Self::InternationalText),
            _ => None,
        }
    }

    pub fn chunk_type(&self) -> [u8; 4] {
        match self {
            Self::Text => CHUNK_TEXT,
            Self::CompressedText => CHUNK_ZTXT,
            Self::InternationalText => CHUNK_ITXT,
        }
    }

    /// Smallest chunk type able to hold `text` uncompressed.
    pub fn for_text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) <= 0xFF) {
            Self::Text
        } else {
            Self::InternationalText
        }
    }
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "tEXt",
            Self::CompressedText => "zTXt",
            Self::InternationalText => "iTXt",
        })
    }
}

/// One keyword/text pair from a PNG text chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextEntry {
    pub keyword: String,
    pub text: String,
    pub kind: TextKind,
}

impl TextEntry {
    pub fn new(keyword: impl Into<String>, text: impl Into<String>, kind: TextKind) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            kind,
        }
    }
}

/// Ordered text metadata of a PNG.
///
/// Also used as the output builder: start from [`TextMetadata::default`] and
/// [`insert`](TextMetadata::insert) the entries to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMetadata {
    entries: Vec<TextEntry>,
}

impl TextMetadata {
    /// Value for `keyword`. With duplicates, the last chunk wins.
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.keyword == keyword)
            .map(|e| e.text.as_str())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Set `keyword` to `text`, replacing any existing entries for it.
    ///
    /// The chunk type is `tEXt` when the text is Latin-1, `iTXt` otherwise.
    pub fn insert(&mut self, keyword: impl Into<String>, text: impl Into<String>) {
        let keyword = keyword.into();
        let text = text.into();
        self.entries.retain(|e| e.keyword != keyword);
        let kind = TextKind::for_text(&text);
        self.entries.push(TextEntry::new(keyword, text, kind));
    }

    pub fn push(&mut self, entry: TextEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for TextMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "  (no text metadata)");
        }
        for entry in &self.entries {
            writeln!(f, "  {:<16} [{}] : {}", entry.keyword, entry.kind, entry.text)?;
        }
        Ok(())
    }
}

/// A validated PNG held in memory as a chunk list.
///
/// The source file is read in one call and its handle is closed before
/// `open` returns.
pub struct PngImage {
    png: Png,
    width: u32,
    height: u32,
}

impl PngImage {
    /// Read and validate a PNG file.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image file {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("Invalid PNG {}", path.display()))
    }

    /// Validate PNG bytes: the header must decode and the chunk stream must parse.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (width, height) =
            ImageReader::with_format(Cursor::new(bytes.as_slice()), ImageFormat::Png)
                .into_dimensions()
                .context("Failed to decode PNG header")?;

        let png = Png::from_bytes(Bytes::from(bytes))
            .map_err(|e| anyhow!("Failed to parse PNG chunks: {e}"))?;

        Ok(Self { png, width, height })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn chunks(&self) -> &[PngChunk] {
        self.png.chunks()
    }

    /// All text entries in chunk order. Malformed text chunks are skipped.
    pub fn text_metadata(&self) -> TextMetadata {
        let mut metadata = TextMetadata::default();
        for chunk in self.png.chunks() {
            match parse_text_chunk(chunk) {
                Ok(Some(entry)) => metadata.push(entry),
                Ok(None) => {}
                Err(e) => log::warn!(
                    "Skipping malformed {} chunk: {e:#}",
                    String::from_utf8_lossy(&chunk.kind())
                ),
            }
        }
        metadata
    }

    /// One line per non-text chunk: type and payload length, in file order.
    pub fn chunk_summary(&self) -> String {
        let mut out = String::new();
        for chunk in self.png.chunks() {
            if TextKind::from_chunk_type(chunk.kind()).is_some() {
                continue;
            }
            out.push_str(&format!(
                "  {} ({} bytes)\n",
                String::from_utf8_lossy(&chunk.kind()),
                chunk.contents().len()
            ));
        }
        out
    }

    pub(crate) fn into_png(self) -> Png {
        self.png
    }
}

/// Decode a text chunk. Returns `Ok(None)` for non-text chunks.
fn parse_text_chunk(chunk: &PngChunk) -> Result<Option<TextEntry>> {
    let Some(kind) = TextKind::from_chunk_type(chunk.kind()) else {
        return Ok(None);
    };

    let (keyword, rest) = split_nul(chunk.contents()).context("missing keyword terminator")?;
    let keyword = latin1_to_string(keyword);

    let text = match kind {
        TextKind::Text => latin1_to_string(rest),
        TextKind::CompressedText => {
            let (&method, compressed) = rest.split_first().context("missing compression method")?;
            ensure!(method == 0, "unknown compression method {method}");
            latin1_to_string(&inflate(compressed)?)
        }
        TextKind::InternationalText => {
            let [flag, method, tail @ ..] = rest else {
                bail!("truncated iTXt header");
            };
            let (_language, tail) = split_nul(tail).context("missing language tag terminator")?;
            let (_translated, text) =
                split_nul(tail).context("missing translated keyword terminator")?;
            let raw = match flag {
                0 => text.to_vec(),
                1 => {
                    ensure!(*method == 0, "unknown compression method {method}");
                    inflate(text)?
                }
                other => bail!("invalid compression flag {other}"),
            };
            String::from_utf8(raw).context("iTXt text is not valid UTF-8")?
        }
    };

    Ok(Some(TextEntry { keyword, text, kind }))
}

fn split_nul(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = data.iter().position(|&b| b == 0)?;
    Some((&data[..pos], &data[pos + 1..]))
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .context("Failed to decompress text")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png_text::test_support::{sample_png, with_text};

    #[test]
    fn reads_all_text_kinds() {
        let bytes = with_text(
            sample_png(2, 2),
            &[
                TextEntry::new("parameters", "café", TextKind::Text),
                TextEntry::new("Comment", "zipped", TextKind::CompressedText),
                TextEntry::new("prompt", "猫 ✨", TextKind::InternationalText),
            ],
        );
        let image = PngImage::from_bytes(bytes).unwrap();
        assert_eq!(image.dimensions(), (2, 2));

        let meta = image.text_metadata();
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("parameters"), Some("café"));
        assert_eq!(meta.get("Comment"), Some("zipped"));
        assert_eq!(meta.get("prompt"), Some("猫 ✨"));
        assert_eq!(meta.entries()[1].kind, TextKind::CompressedText);
    }

    #[test]
    fn no_text_chunks() {
        let image = PngImage::from_bytes(sample_png(1, 1)).unwrap();
        assert!(image.text_metadata().is_empty());
    }

    #[test]
    fn duplicate_keyword_last_wins() {
        let bytes = with_text(
            sample_png(1, 1),
            &[
                TextEntry::new("parameters", "first", TextKind::Text),
                TextEntry::new("parameters", "second", TextKind::Text),
            ],
        );
        let meta = PngImage::from_bytes(bytes).unwrap().text_metadata();
        assert_eq!(meta.get("parameters"), Some("second"));
    }

    #[test]
    fn compressed_itxt() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all("φ prompt".as_bytes()).unwrap();
        let mut contents = b"parameters\0\x01\x00en\0\0".to_vec();
        contents.extend(enc.finish().unwrap());
        let chunk = PngChunk::new(CHUNK_ITXT, Bytes::from(contents));

        let entry = parse_text_chunk(&chunk).unwrap().unwrap();
        assert_eq!(entry.keyword, "parameters");
        assert_eq!(entry.text, "φ prompt");
    }

    #[test]
    fn malformed_chunk_is_error() {
        let chunk = PngChunk::new(CHUNK_TEXT, Bytes::from_static(b"no separator"));
        assert!(parse_text_chunk(&chunk).is_err());

        let chunk = PngChunk::new(CHUNK_ZTXT, Bytes::from_static(b"k\0\x00not zlib"));
        assert!(parse_text_chunk(&chunk).is_err());
    }

    #[test]
    fn non_text_chunk_is_ignored() {
        let chunk = PngChunk::new(*b"gAMA", Bytes::from_static(&[0, 0, 0xB1, 0x8F]));
        assert!(parse_text_chunk(&chunk).unwrap().is_none());
    }

    #[test]
    fn rejects_non_png() {
        assert!(PngImage::from_bytes(b"definitely not a png".to_vec()).is_err());
    }

    #[test]
    fn insert_replaces_and_picks_kind() {
        let mut meta = TextMetadata::default();
        meta.insert("parameters", "a");
        meta.insert("parameters", "ÿ");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.entries()[0].kind, TextKind::Text);

        meta.insert("parameters", "U1f600 ✨");
        assert_eq!(meta.entries()[0].kind, TextKind::InternationalText);
    }

    #[test]
    fn chunk_summary_lists_non_text_chunks() {
        let bytes = with_text(
            sample_png(2, 2),
            &[TextEntry::new("parameters", "p", TextKind::Text)],
        );
        let mut png = Png::from_bytes(Bytes::from(bytes)).unwrap();
        png.chunks_mut().insert(
            1,
            PngChunk::new(*b"pHYs", Bytes::from_static(&[0, 0, 0x0B, 0x13, 0, 0, 0x0B, 0x13, 1])),
        );
        let image = PngImage::from_bytes(png.encoder().bytes().to_vec()).unwrap();

        let summary = image.chunk_summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "  IHDR (13 bytes)");
        assert_eq!(lines[1], "  pHYs (9 bytes)");
        assert!(lines.iter().any(|l| l.starts_with("  IDAT (")));
        assert_eq!(lines.last(), Some(&"  IEND (0 bytes)"));
        assert!(!summary.contains("tEXt"));
    }

    #[test]
    fn display_lists_entries() {
        let mut meta = TextMetadata::default();
        assert!(meta.to_string().contains("no text metadata"));
        meta.insert("parameters", "abc");
        let shown = meta.to_string();
        assert!(shown.contains("parameters"));
        assert!(shown.contains("[tEXt]"));
        assert!(shown.contains("abc"));
    }
}
