//! Binary file detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use infer::MatcherType;

/// Bytes inspected for content sniffing.
const SNIFF_LEN: u64 = 512;

/// Share of non-printable bytes above which content counts as binary.
const NON_PRINTABLE_RATIO: f64 = 0.30;

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "pdf", "zip", "gz", "tgz",
    "bz2", "xz", "7z", "rar", "tar", "jar", "war", "exe", "dll", "so", "dylib", "a", "o", "obj",
    "lib", "bin", "class", "pyc", "pyo", "wasm", "mp3", "mp4", "mov", "avi", "mkv", "wav", "flac",
    "ogg", "ttf", "otf", "woff", "woff2", "eot", "sqlite", "db", "parquet", "dat",
];

/// Whether `path` looks like a binary file: known extension first, then
/// `infer` magic numbers, NUL bytes, and the share of non-printable bytes
/// in the first 512. Unreadable files are not binary.
pub fn is_binary(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if by_extension {
        return true;
    }

    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    let read = File::open(path).and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut head));
    if read.is_err() || head.is_empty() {
        return false;
    }
    looks_binary(&head)
}

fn looks_binary(head: &[u8]) -> bool {
    let sniffed = infer::get(head).is_some_and(|kind| {
        !matches!(
            kind.matcher_type(),
            MatcherType::Text | MatcherType::Doc | MatcherType::Book
        )
    });
    if sniffed || head.contains(&0) {
        return true;
    }
    let non_printable = head
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
        .count();
    non_printable as f64 / head.len() as f64 > NON_PRINTABLE_RATIO
}
