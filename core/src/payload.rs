//! Payload decoding traits and implementations.

use std::fmt::Debug;
use std::str::Utf8Error;

use thiserror::Error;

/// Errors produced when a payload cannot be turned into a reading value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
	/// Payload carried no bytes (or only whitespace)
	#[error("Payload is empty")]
	Empty,

	/// Payload bytes are not valid UTF-8
	#[error("Payload is not valid UTF-8: {0}")]
	InvalidUtf8(#[from] Utf8Error),

	/// Payload text is not a decimal number
	#[error("Payload '{text}' is not a decimal number")]
	NotANumber {
		/// The offending payload text
		text: String,
	},

	/// Payload parsed to NaN or an infinity
	#[error("Payload '{text}' is not a finite number")]
	NotFinite {
		/// The offending payload text
		text: String,
	},
}

/// Trait for turning raw MQTT payload bytes into a reading value.
///
/// Implement this trait to accept other payload encodings.
pub trait PayloadDecoder: Default + Clone + Send + Sync + 'static {
	/// Error type for decoding failures
	type Error: std::error::Error + Debug + Send + Sync + 'static;

	/// Convert bytes from MQTT into a reading value
	fn decode(&self, bytes: &[u8]) -> Result<f64, Self::Error>;
}

/// Default decoder for payloads like `b"72.300000"`.
///
/// Surrounding ASCII whitespace is ignored. The value must be finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalDecoder;

impl DecimalDecoder {
	/// Creates a new decoder.
	pub fn new() -> Self {
		Self
	}
}

impl PayloadDecoder for DecimalDecoder {
	type Error = PayloadError;

	fn decode(&self, bytes: &[u8]) -> Result<f64, Self::Error> {
		let text = std::str::from_utf8(bytes)?.trim_ascii();
		if text.is_empty() {
			return Err(PayloadError::Empty);
		}

		let value: f64 = text.parse().map_err(|_| PayloadError::NotANumber {
			text: text.to_string(),
		})?;
		if !value.is_finite() {
			return Err(PayloadError::NotFinite {
				text: text.to_string(),
			});
		}
		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode(bytes: &[u8]) -> Result<f64, PayloadError> {
		DecimalDecoder::new().decode(bytes)
	}

	#[test]
	fn test_decimal_values() {
		assert_eq!(decode(b"23.5"), Ok(23.5));
		assert_eq!(decode(b"0"), Ok(0.0));
		assert_eq!(decode(b"-1.2e3"), Ok(-1200.0));
		assert_eq!(decode(b"72.300000"), Ok(72.3));
		assert_eq!(decode(b"30"), Ok(30.0));
	}

	#[test]
	fn test_surrounding_whitespace_is_ignored() {
		assert_eq!(decode(b" 72.3\n"), Ok(72.3));
		assert_eq!(decode(b"\t-4\r\n"), Ok(-4.0));
	}

	#[test]
	fn test_empty_payload() {
		assert_eq!(decode(b""), Err(PayloadError::Empty));
		assert_eq!(decode(b"  \n"), Err(PayloadError::Empty));
	}

	#[test]
	fn test_non_numeric_payload() {
		assert_eq!(
			decode(b"abc"),
			Err(PayloadError::NotANumber {
				text: "abc".to_string()
			})
		);
		assert!(matches!(decode(b"1,5"), Err(PayloadError::NotANumber { .. })));
		assert!(matches!(
			decode(b"72.3 F"),
			Err(PayloadError::NotANumber { .. })
		));
	}

	#[test]
	fn test_non_finite_payload() {
		for raw in [&b"NaN"[..], b"inf", b"-infinity", b"1e999"] {
			assert!(
				matches!(decode(raw), Err(PayloadError::NotFinite { .. })),
				"{:?} should be rejected",
				String::from_utf8_lossy(raw)
			);
		}
	}

	#[test]
	fn test_invalid_utf8() {
		assert!(matches!(
			decode(&[0xff, 0xfe, b'1']),
			Err(PayloadError::InvalidUtf8(_))
		));
	}
}
