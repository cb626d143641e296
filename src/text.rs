//! Fixed-width Shift-JIS text fields.
//!
//! PMD and VMD files store every name as a fixed-width byte field, padded
//! with NULs. The decoded value is the Shift-JIS text up to the first NUL;
//! trailing bytes are discarded.

use encoding_rs::SHIFT_JIS;

/// Malformed Shift-JIS bytes inside a fixed-width field.
///
/// Surfaced through binrw's custom-error channel by the `try_map` parsers
/// and converted to [`MmdError::Encoding`](crate::MmdError::Encoding) at the
/// load boundary.
#[derive(Debug, Clone)]
pub struct TextDecodeError {
    pub field_len: usize,
}

impl std::fmt::Display for TextDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed Shift-JIS bytes in {}-byte text field",
            self.field_len
        )
    }
}

impl std::error::Error for TextDecodeError {}

/// Decodes a fixed-width Shift-JIS field, truncating at the first NUL.
pub fn decode_fixed_str(raw: &[u8]) -> Result<String, TextDecodeError> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let (decoded, had_errors) = SHIFT_JIS.decode_without_bom_handling(&raw[..end]);
    if had_errors {
        return Err(TextDecodeError {
            field_len: raw.len(),
        });
    }
    Ok(decoded.into_owned())
}

/// Encodes a string into an `N`-byte NUL-padded Shift-JIS field.
///
/// Text that does not fit is truncated at `N` bytes.
pub fn encode_fixed_str<const N: usize>(text: &str) -> [u8; N] {
    let (encoded, _, _) = SHIFT_JIS.encode(text);
    let mut field = [0u8; N];
    let len = encoded.len().min(N);
    field[..len].copy_from_slice(&encoded[..len]);
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii_truncates_at_nul() {
        let raw = *b"model\0garbage bytes\0";
        assert_eq!(decode_fixed_str(&raw).unwrap(), "model");
    }

    #[test]
    fn test_decode_full_width_field() {
        let raw = *b"twenty-byte-field-xx";
        assert_eq!(decode_fixed_str(&raw).unwrap(), "twenty-byte-field-xx");
    }

    #[test]
    fn test_decode_shift_jis_bone_name() {
        // "センター" (center), a stock PMD bone name
        let raw: [u8; 10] = [0x83, 0x5a, 0x83, 0x93, 0x83, 0x5e, 0x81, 0x5b, 0x00, 0x00];
        assert_eq!(decode_fixed_str(&raw).unwrap(), "センター");
    }

    #[test]
    fn test_decode_rejects_malformed_bytes() {
        // 0x82 is a double-byte lead; 0xff is not a valid trail byte
        let raw: [u8; 4] = [0x82, 0xff, 0xff, 0xff];
        assert!(decode_fixed_str(&raw).is_err());
    }

    #[test]
    fn test_encode_round_trip() {
        let field = encode_fixed_str::<20>("センター");
        assert_eq!(decode_fixed_str(&field).unwrap(), "センター");
    }

    #[test]
    fn test_encode_pads_with_nuls() {
        let field = encode_fixed_str::<15>("abc");
        assert_eq!(&field[..3], b"abc");
        assert!(field[3..].iter().all(|&b| b == 0));
    }
}
