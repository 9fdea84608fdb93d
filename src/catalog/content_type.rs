//! Plain-text detection for catalog candidates.
//!
//! Only the first [`SNIFF_LEN`] bytes are inspected. Known signatures are checked
//! first (compressed archives and common binary formats), then the sample is scanned
//! for control bytes that never appear in text.

use crate::error::{Result, RltailError};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected per file
pub const SNIFF_LEN: usize = 512;

/// Coarse classification of a file's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Text the tail and filter machinery can serve
    PlainText,
    /// A compressed stream (gzip, bzip2, xz, zstd)
    Compressed(CompressionType),
    /// Anything else
    Binary,
}

impl ContentKind {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::PlainText)
    }

    /// Short label used in skip warnings
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Compressed(compression) => compression.name(),
            Self::Binary => "application/octet-stream",
        }
    }
}

/// Compression formats recognised by signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl CompressionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

/// Read the head of `path` and classify it.
pub fn sniff(path: &Path) -> Result<ContentKind> {
    let file = File::open(path).map_err(|e| {
        RltailError::file_error(format!("Failed to open {}", path.display()), e)
    })?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| RltailError::file_error("Failed to read file header", e))?;
    Ok(classify(&head))
}

/// Classify a leading sample of file content.
pub fn classify(head: &[u8]) -> ContentKind {
    // Byte-order marks win over everything else
    if head.starts_with(&[0xef, 0xbb, 0xbf])
        || head.starts_with(&[0xfe, 0xff])
        || head.starts_with(&[0xff, 0xfe])
    {
        return ContentKind::PlainText;
    }

    if let Some(compression) = detect_by_magic(head) {
        return ContentKind::Compressed(compression);
    }

    if BINARY_SIGNATURES.iter().any(|sig| head.starts_with(sig)) {
        return ContentKind::Binary;
    }

    if head.iter().any(|&byte| is_binary_byte(byte)) {
        ContentKind::Binary
    } else {
        ContentKind::PlainText
    }
}

/// Signatures of binary formats whose header is otherwise printable
const BINARY_SIGNATURES: &[&[u8]] = &[b"%PDF-", b"%!PS-Adobe-", b"GIF87a", b"GIF89a", b"\x7fELF"];

/// Control bytes that do not occur in text (tab, LF, FF, CR and ESC are allowed)
fn is_binary_byte(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}

/// Detect compression format from magic bytes
///
/// - Gzip: `1f 8b` (RFC 1952)
/// - Bzip2: `42 5a 68` ("BZh" with block size)
/// - XZ: `fd 37 7a 58 5a 00` (XZ format specification)
/// - Zstd: `28 b5 2f fd` (Zstandard frame format)
fn detect_by_magic(magic: &[u8]) -> Option<CompressionType> {
    if magic.starts_with(&[0x1f, 0x8b]) {
        Some(CompressionType::Gzip)
    } else if magic.starts_with(&[0x42, 0x5a, 0x68]) {
        Some(CompressionType::Bzip2)
    } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Some(CompressionType::Zstd)
    } else if magic.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Some(CompressionType::Xz)
    } else {
        None
    }
}
