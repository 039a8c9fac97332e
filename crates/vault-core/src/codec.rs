//! # Codec
//!
//! Binary ⇄ text conversion for snapshot documents.
//!
//! Standard alphabet with padding, the same text a browser's `btoa`
//! produces, so backups written by older clients stay readable.
//!
//! ```rust
//! use vault_core::codec;
//!
//! let text = codec::encode(b"\x00\xffdragon");
//! assert_eq!(codec::decode(&text).unwrap(), b"\x00\xffdragon");
//! assert_eq!(codec::encode_opt(None), None);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CodecError;

/// Encodes bytes as base64 text. Never fails.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Encodes an optional payload; `None` stays `None`.
pub fn encode_opt(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(encode)
}

/// Decodes base64 text back into bytes.
///
/// ASCII whitespace is skipped so hand-edited or line-wrapped backups still
/// decode. Anything else outside the alphabet is an error.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let result = if text.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: Vec<u8> = text
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(text)
    };
    result.map_err(|e| CodecError(e.to_string()))
}

/// Decodes an optional payload; `None` stays `None`.
pub fn decode_opt(text: Option<&str>) -> Result<Option<Vec<u8>>, CodecError> {
    text.map(decode).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(&[0x89, b'P', b'N', b'G']), "iVBORw==");
    }

    #[test]
    fn test_every_byte_value_survives() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&all)).unwrap(), all);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(decode("Zm9v\nYmFy\r\n").unwrap(), b"foobar");
    }

    #[test]
    fn test_invalid_text_is_an_error() {
        assert!(decode("not base64!").is_err());
        assert!(decode("Zm9").is_err());
    }

    #[test]
    fn test_null_sentinel() {
        assert_eq!(encode_opt(None), None);
        assert_eq!(decode_opt(None).unwrap(), None);
        assert_eq!(decode_opt(Some("Zg==")).unwrap(), Some(b"f".to_vec()));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}
