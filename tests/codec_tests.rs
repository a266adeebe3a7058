//! Tests for the record codec
//!
//! These tests verify:
//! - Record key layout and parsing
//! - Counter encoding, including the absent-key default
//! - Label text round trips and invalid UTF-8 handling
//! - Content validation: detection plus a full decode of the source image

use bytes::Bytes;
use shardpack::codec::{
    decode_content, decode_counter, decode_label, encode_content, encode_counter, encode_label,
    index_key, parse_index_key, ImageFormat, Namespace, COUNTER_KEY,
};
use shardpack::ShardError;

mod common;

// =============================================================================
// Key Tests
// =============================================================================

#[test]
fn test_index_key_format() {
    assert_eq!(index_key(Namespace::Image, 7), b"image-000000007".to_vec());
    assert_eq!(index_key(Namespace::Label, 123_456_789), b"label-123456789".to_vec());
}

#[test]
fn test_parse_index_key() {
    assert_eq!(parse_index_key(b"image-000000007"), Some((Namespace::Image, 7)));
    assert_eq!(parse_index_key(b"label-000001000"), Some((Namespace::Label, 1000)));
    assert_eq!(parse_index_key(b"other-000000007"), None);
    assert_eq!(parse_index_key(COUNTER_KEY), None);
}

#[test]
fn test_keys_sort_numerically() {
    let mut keys: Vec<Vec<u8>> = [100u64, 2, 30, 1]
        .iter()
        .map(|&i| index_key(Namespace::Image, i))
        .collect();
    keys.sort();

    let indices: Vec<u64> = keys.iter().map(|k| parse_index_key(k).unwrap().1).collect();
    assert_eq!(indices, vec![1, 2, 30, 100]);
}

// =============================================================================
// Counter Tests
// =============================================================================

#[test]
fn test_counter_is_decimal_ascii() {
    assert_eq!(encode_counter(0), b"0".to_vec());
    assert_eq!(encode_counter(1234), b"1234".to_vec());
    assert_eq!(decode_counter(Some(&b"1234"[..])).unwrap(), 1234);
}

#[test]
fn test_absent_counter_is_zero() {
    assert_eq!(decode_counter(None).unwrap(), 0);
}

#[test]
fn test_garbage_counter_is_corruption() {
    let result = decode_counter(Some(&b"12x"[..]));
    assert!(matches!(result, Err(ShardError::Corruption(_))));
}

// =============================================================================
// Label Tests
// =============================================================================

#[test]
fn test_label_round_trip_is_exact() {
    for label in ["cat", "", "  spaced  out ", "naïve café 東京 🚀", "line\nbreak"] {
        let encoded = encode_label(label);
        assert_eq!(decode_label(&encoded).unwrap(), label);
    }
}

#[test]
fn test_invalid_utf8_label_is_integrity_error() {
    let result = decode_label(&[0xC3, 0x28]);
    assert!(matches!(result, Err(ShardError::RecordIntegrity(_))));
}

// =============================================================================
// Content Tests
// =============================================================================

#[test]
fn test_content_round_trip_is_byte_identical() {
    let source = common::sample_jpeg(42);
    let encoded = encode_content(Bytes::from(source.clone())).unwrap();
    let decoded = decode_content(encoded).unwrap();

    assert_eq!(decoded.format, ImageFormat::Jpeg);
    assert_eq!(decoded.bytes.as_ref(), source.as_slice());
}

#[test]
fn test_detect_formats() {
    assert_eq!(ImageFormat::detect(&common::sample_png(1)), Some(ImageFormat::Png));
    assert_eq!(ImageFormat::detect(b"GIF89a...."), Some(ImageFormat::Gif));
    assert_eq!(ImageFormat::detect(b"BM\x00\x00"), Some(ImageFormat::Bmp));
    assert_eq!(ImageFormat::detect(b"II*\x00rest"), Some(ImageFormat::Tiff));
    assert_eq!(ImageFormat::detect(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
    assert_eq!(ImageFormat::detect(b"plain text"), None);
}

#[test]
fn test_encode_rejects_empty_and_unknown_content() {
    assert!(matches!(
        encode_content(Bytes::new()),
        Err(ShardError::InvalidContent(_))
    ));
    assert!(matches!(
        encode_content(Bytes::from_static(b"not an image")),
        Err(ShardError::InvalidContent(_))
    ));
}

#[test]
fn test_encode_rejects_image_that_does_not_decode() {
    let result = encode_content(Bytes::from(common::broken_jpeg()));
    assert!(matches!(result, Err(ShardError::InvalidContent(_))));

    // A real image cut short fails the same way
    let mut truncated = common::sample_png(3);
    truncated.truncate(truncated.len() / 2);
    let result = encode_content(Bytes::from(truncated));
    assert!(matches!(result, Err(ShardError::InvalidContent(_))));
}

#[test]
fn test_stored_payload_decodes_to_pixels() {
    let stored = encode_content(Bytes::from(common::sample_png(5))).unwrap();
    let payload = decode_content(stored).unwrap();

    let pixels = payload.decode().unwrap();
    assert_eq!((pixels.width(), pixels.height()), (16, 16));
}
