//! Text encoding detection and decoding

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::Result;

const CHUNK_SIZE: usize = 8 * 1024;

/// Guess the text encoding of the file at `path`
///
/// At most `threshold` bytes are examined. Input without any non-ASCII
/// byte reports UTF-8.
pub fn detect_encoding(path: &Path, threshold: usize) -> Result<&'static Encoding> {
    let mut file = File::open(path)?;
    let mut detector = EncodingDetector::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut fed = 0usize;
    let mut saw_non_ascii = false;
    let mut first_chunk = true;

    loop {
        let want = CHUNK_SIZE.min(threshold.saturating_sub(fed));
        if want == 0 {
            detector.feed(&[], true);
            break;
        }
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            detector.feed(&[], true);
            break;
        }
        if first_chunk {
            first_chunk = false;
            if let Some((encoding, _)) = Encoding::for_bom(&buf[..n]) {
                return Ok(encoding);
            }
        }
        saw_non_ascii |= detector.feed(&buf[..n], false);
        fed += n;
    }

    if !saw_non_ascii {
        return Ok(UTF_8);
    }
    Ok(detector.guess(None, true))
}

/// Resolve an encoding label, falling back to UTF-8
pub fn encoding_for_label(label: Option<&str>) -> &'static Encoding {
    match label.and_then(|l| Encoding::for_label(l.trim().as_bytes())) {
        Some(encoding) => encoding,
        None => {
            if let Some(label) = label {
                tracing::warn!("Unknown text encoding {:?}, reading as UTF-8", label);
            }
            UTF_8
        }
    }
}

/// Decode `bytes`; a byte order mark overrides the declared encoding
pub fn decode_text<'a>(bytes: &'a [u8], label: Option<&str>) -> Cow<'a, str> {
    let (text, used, had_errors) = encoding_for_label(label).decode(bytes);
    if had_errors {
        tracing::warn!("Malformed {} input replaced while decoding", used.name());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(temp: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_ascii_reports_utf8() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "a.csv", b"x,y\n1,2\n");
        assert_eq!(detect_encoding(&path, 1024).unwrap(), UTF_8);
    }

    #[test]
    fn test_utf8_content() {
        let temp = TempDir::new().unwrap();
        let text = "city,name\nK\u{f6}ln,J\u{fc}rgen\nM\u{fc}nchen,Bj\u{f6}rn\n".repeat(20);
        let path = write(&temp, "u.csv", text.as_bytes());
        assert_eq!(detect_encoding(&path, 64 * 1024).unwrap(), UTF_8);
    }

    #[test]
    fn test_bom_wins() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "bom.csv", b"\xFF\xFEx\x00");
        assert_eq!(detect_encoding(&path, 1024).unwrap().name(), "UTF-16LE");
    }

    #[test]
    fn test_decode_with_label() {
        let text = decode_text(b"caf\xE9", Some("windows-1252"));
        assert_eq!(text, "caf\u{e9}");
        assert_eq!(decode_text(b"plain", None), "plain");
        assert_eq!(encoding_for_label(Some("bogus")), UTF_8);
    }
}
