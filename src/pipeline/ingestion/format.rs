use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::AnalysisType;

/// Broad file categories we handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileCategory {
    Image,
    StructuredText,
    Unsupported,
}

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatDetection {
    pub mime_type: String,
    pub category: FileCategory,
}

impl FileCategory {
    /// Whether this kind of file can feed the given analysis.
    pub fn accepted_for(&self, analysis_type: AnalysisType) -> bool {
        matches!(
            (self, analysis_type),
            (Self::Image, AnalysisType::FundusImage)
                | (Self::StructuredText, AnalysisType::ErgReport)
        )
    }
}

/// Detect file format from magic bytes. For text, the extension only picks
/// between CSV, JSON and plain text once the content is known to be text.
pub fn detect_format(file_name: &str, bytes: &[u8]) -> FormatDetection {
    let header = &bytes[..bytes.len().min(16)];

    let image = match header {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some("image/tiff"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        // BMP: "BM", file size, then four reserved zero bytes
        [b'B', b'M', _, _, _, _, 0, 0, 0, 0, ..] => Some("image/bmp"),
        // HEIC/HEIF: "ftyp" at offset 4 followed by an image brand
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if is_heif_brand(brand) => {
            Some("image/heic")
        }
        _ => None,
    };
    if let Some(mime) = image {
        return FormatDetection {
            mime_type: mime.into(),
            category: FileCategory::Image,
        };
    }

    if header.starts_with(b"%PDF") {
        return unsupported("application/pdf");
    }

    if !is_likely_text(bytes) {
        return unsupported("application/octet-stream");
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
    let first = text.trim_start().chars().next();

    let mime = match extension.as_deref() {
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        _ if matches!(first, Some('{') | Some('[')) => "application/json",
        _ => "text/plain",
    };

    FormatDetection {
        mime_type: mime.into(),
        category: FileCategory::StructuredText,
    }
}

fn is_heif_brand(rest: &[u8]) -> bool {
    const BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"hevc", b"heim", b"heis", b"mif1", b"msf1"];
    rest.len() >= 4 && BRANDS.iter().any(|brand| &rest[..4] == brand.as_slice())
}

fn unsupported(mime: &str) -> FormatDetection {
    FormatDetection {
        mime_type: mime.into(),
        category: FileCategory::Unsupported,
    }
}

/// Valid UTF-8 (on the first 4 KiB) and at least 80% printable.
fn is_likely_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.is_empty() {
        return false;
    }
    let text = match std::str::from_utf8(sample) {
        Ok(t) => t,
        // A multi-byte char may straddle the cut.
        Err(e) if e.valid_up_to() + 4 >= sample.len() && e.valid_up_to() > 0 => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

/// Sanitize a filename: strip path components, limit length.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let clean: String = name.chars().filter(|c| *c != '\0').take(255).collect();

    if clean.trim().is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}
