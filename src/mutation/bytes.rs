use crate::core::{CellValue, DecodedValue, MutateError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};

/// Largest magnitude a decoded 64-bit integer may have and still be
/// reported as a number (2^53, the exact-integer limit of an f64).
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Options for [`decode_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// When `false`, non-numeric payloads are returned as raw bytes
    /// instead of being decoded as UTF-8 text.
    pub decode: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { decode: true }
    }
}

impl DecodeOptions {
    pub fn raw() -> Self {
        Self { decode: false }
    }
}

/// Converts a scalar into the byte form sent on the wire.
///
/// Bytes pass through, integers become 8 big-endian bytes and text is
/// UTF-8 encoded. Anything else cannot be represented and is rejected.
pub fn convert_to_bytes(value: &CellValue) -> Result<Vec<u8>> {
    match value {
        CellValue::Bytes(bytes) => Ok(bytes.clone()),
        CellValue::Integer(i) => Ok(i.to_be_bytes().to_vec()),
        CellValue::Text(s) => Ok(s.as_bytes().to_vec()),
        other => Err(MutateError::Encoding(format!(
            "Cannot convert {} value to bytes",
            other.type_name()
        ))),
    }
}

/// Decodes a base64 cell value returned by the backend.
///
/// An 8-byte payload holding an exactly representable integer is
/// returned as [`DecodedValue::Integer`]. Everything else is text,
/// or raw bytes when `options.decode` is `false`.
pub fn decode_value(encoded: &str, options: DecodeOptions) -> Result<DecodedValue> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| MutateError::Decoding(format!("Invalid base64 value: {}", err)))?;

    if let Some(number) = exact_integer(&bytes) {
        return Ok(DecodedValue::Integer(number));
    }

    if !options.decode {
        return Ok(DecodedValue::Bytes(bytes));
    }

    Ok(DecodedValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

fn exact_integer(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    let number = i64::from_be_bytes(raw);
    (number.unsigned_abs() < MAX_EXACT_INTEGER).then_some(number)
}
