//! Encoded drawing payloads
//!
//! Drawings arrive as `data:image/<format>;base64,<payload>` URLs produced by
//! the canvas. Only the MIME prefix and the leading magic bytes are checked;
//! the image itself is never decoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Largest data URL accepted for a single drawing
pub const MAX_DATA_URL_LEN: usize = 8 * 1024 * 1024;

/// Base64 characters decoded for the signature check (12 bytes)
const SNIFF_CHARS: usize = 16;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    fn matches_signature(self, head: &[u8]) -> bool {
        match self {
            ImageFormat::Png => head.starts_with(PNG_SIGNATURE),
            ImageFormat::Jpeg => head.starts_with(JPEG_SIGNATURE),
            ImageFormat::Webp => {
                head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP"
            }
        }
    }
}

/// A validated drawing, borrowed from the original data URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub format: ImageFormat,
    /// Base64 payload without the `data:...;base64,` prefix
    pub data: &'a str,
}

/// Parse and sniff a drawing payload. Returns `None` for anything that is not
/// a recognized base64 image.
pub fn parse_data_url(raw: &str) -> Option<DataUrl<'_>> {
    if raw.len() > MAX_DATA_URL_LEN {
        return None;
    }

    let rest = raw.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    let format = ImageFormat::from_mime(mime)?;
    if data.is_empty() {
        return None;
    }

    // Decode only whole base64 quanta from the front of the payload
    let head_len = data.len().min(SNIFF_CHARS) / 4 * 4;
    let head = STANDARD.decode(&data.as_bytes()[..head_len]).ok()?;

    format
        .matches_signature(&head)
        .then_some(DataUrl { format, data })
}

pub fn is_valid_drawing(raw: &str) -> bool {
    parse_data_url(raw).is_some()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_png() {
        let parsed = parse_data_url(fixtures::PNG_DATA_URL).expect("png should parse");
        assert_eq!(parsed.format, ImageFormat::Png);
        assert!(parsed.data.starts_with("iVBORw0KGgo"));
    }

    #[test]
    fn test_accepts_jpeg_and_webp() {
        let jpeg = format!("data:image/jpeg;base64,{}", STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]));
        assert_eq!(parse_data_url(&jpeg).map(|d| d.format), Some(ImageFormat::Jpeg));

        let mut webp = b"RIFF\x24\x00\x00\x00WEBPVP8 ".to_vec();
        webp.extend_from_slice(&[0; 8]);
        let webp = format!("data:image/webp;base64,{}", STANDARD.encode(webp));
        assert_eq!(parse_data_url(&webp).map(|d| d.format), Some(ImageFormat::Webp));
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        assert!(!is_valid_drawing("iVBORw0KGgoAAAANSUhEUgAA"));
        assert!(!is_valid_drawing("data:text/plain;base64,aGVsbG8="));
        assert!(!is_valid_drawing("data:image/png,iVBORw0KGgoAAAANSUhEUgAA"));
        assert!(!is_valid_drawing("data:image/png;base64,"));
    }

    #[test]
    fn test_rejects_mismatched_signature() {
        // Valid base64, but the bytes are not a PNG header
        let fake = format!("data:image/png;base64,{}", STANDARD.encode(b"not really a png"));
        assert!(!is_valid_drawing(&fake));

        // PNG payload labelled as JPEG
        let relabelled = fixtures::PNG_DATA_URL.replacen("image/png", "image/jpeg", 1);
        assert!(!is_valid_drawing(&relabelled));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let mut huge = String::from(fixtures::PNG_DATA_URL);
        huge.push_str(&"A".repeat(MAX_DATA_URL_LEN));
        assert!(!is_valid_drawing(&huge));
    }
}
