//! Email parsing: header tokenizing and decoding, MIME metadata and multipart
//! bodies, spam scores, and assembly of whole messages.

pub mod eml;
pub mod header;
pub mod mime;
pub mod spam;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Base64 decoder that accepts missing padding and non-zero trailing bits,
/// both common in encoded words and mail bodies.
pub(crate) const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);
