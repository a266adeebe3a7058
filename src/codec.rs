//! Record codec
//!
//! Pure byte-level transforms between records and store values.
//!
//! ## Key Format
//! ```text
//! ┌──────────────┬───┬─────────────────────┐
//! │ namespace    │ - │ index (9 digits)    │
//! └──────────────┴───┴─────────────────────┘
//!   "image-000000042"   "label-000000042"
//! ```
//!
//! Indices are zero-padded so lexicographic key order equals numeric order.
//! The counter lives under the reserved key `__counter__` as decimal ASCII.

use std::fmt;
use std::io::Cursor;

use bytes::Bytes;

use crate::error::{Result, ShardError};

/// Reserved metadata key holding the committed record count
pub const COUNTER_KEY: &[u8] = b"__counter__";

/// Width of the zero-padded index in record keys
pub const INDEX_WIDTH: usize = 9;

/// Largest index representable in a record key
pub const MAX_INDEX: u64 = 999_999_999;

// =============================================================================
// Keys
// =============================================================================

/// Key namespace of a record value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Image,
    Label,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Image => "image",
            Namespace::Label => "label",
        }
    }

    /// Key prefix including the separator, e.g. `b"image-"`
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            Namespace::Image => b"image-",
            Namespace::Label => b"label-",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the store key for a record value
///
/// `index_key(Namespace::Image, 42)` → `b"image-000000042"`
pub fn index_key(namespace: Namespace, index: u64) -> Vec<u8> {
    format!("{}-{:0width$}", namespace, index, width = INDEX_WIDTH).into_bytes()
}

/// Parse a record key back into its namespace and index
///
/// Returns `None` for metadata keys and anything not in record key format.
pub fn parse_index_key(key: &[u8]) -> Option<(Namespace, u64)> {
    let namespace = if key.starts_with(Namespace::Image.prefix()) {
        Namespace::Image
    } else if key.starts_with(Namespace::Label.prefix()) {
        Namespace::Label
    } else {
        return None;
    };

    let digits = &key[namespace.prefix().len()..];
    if digits.len() != INDEX_WIDTH || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let index = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((namespace, index))
}

// =============================================================================
// Counter
// =============================================================================

pub fn encode_counter(counter: u64) -> Vec<u8> {
    counter.to_string().into_bytes()
}

/// Decode the counter value; an absent key means zero
pub fn decode_counter(bytes: Option<&[u8]>) -> Result<u64> {
    let Some(bytes) = bytes else {
        return Ok(0);
    };
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            ShardError::Corruption(format!(
                "counter value is not a decimal number: {:?}",
                String::from_utf8_lossy(bytes)
            ))
        })
}

// =============================================================================
// Labels
// =============================================================================

pub fn encode_label(label: &str) -> Bytes {
    Bytes::copy_from_slice(label.as_bytes())
}

/// Decode a stored label; invalid UTF-8 is an integrity error
pub fn decode_label(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ShardError::RecordIntegrity(format!("label is not valid UTF-8: {}", e)))
}

// =============================================================================
// Content
// =============================================================================

/// Image container formats accepted by the content codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl ImageFormat {
    /// Detect the format from the leading signature bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
            image::ImageFormat::WebP => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::WebP => "webp",
        }
    }

    fn to_image(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

/// A stored image payload with its detected format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl ImagePayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the payload into pixels
    pub fn decode(&self) -> Result<image::DynamicImage> {
        decode_pixels(&self.bytes, self.format).map_err(|e| {
            ShardError::RecordIntegrity(format!(
                "stored {} content does not decode: {}",
                self.format.extension(),
                e
            ))
        })
    }
}

fn decode_pixels(bytes: &[u8], format: ImageFormat) -> image::ImageResult<image::DynamicImage> {
    image::ImageReader::with_format(Cursor::new(bytes), format.to_image()).decode()
}

/// Encode source content for storage
///
/// The source must decode as an image. The stored value is the source bytes
/// unchanged, so the original file comes back byte for byte.
pub fn encode_content(source: Bytes) -> Result<Bytes> {
    if source.is_empty() {
        return Err(ShardError::InvalidContent("empty content payload".to_string()));
    }
    let format = ImageFormat::detect(&source).ok_or_else(|| {
        ShardError::InvalidContent("content is not a recognised image format".to_string())
    })?;
    decode_pixels(&source, format).map_err(|e| {
        ShardError::InvalidContent(format!("{} content does not decode: {}", format.extension(), e))
    })?;
    Ok(source)
}

/// Decode a stored content value
///
/// Confirms the container format; pixels are decoded on demand through
/// [`ImagePayload::decode`].
pub fn decode_content(stored: Bytes) -> Result<ImagePayload> {
    let format = ImageFormat::detect(&stored).ok_or_else(|| {
        ShardError::RecordIntegrity("stored content has no recognised image signature".to_string())
    })?;
    Ok(ImagePayload {
        format,
        bytes: stored,
    })
}
