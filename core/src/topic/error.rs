//! Error types for the topic module

use std::fmt;

use thiserror::Error;

/// Identifies which identity segment of a reading topic was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicSegment {
	/// Second-to-last segment, the session key
	Session,
	/// Last segment, the signal name
	Signal,
}

impl fmt::Display for TopicSegment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| TopicSegment::Session => f.write_str("session"),
			| TopicSegment::Signal => f.write_str("signal"),
		}
	}
}

/// Errors produced while turning a topic name into a reading identity.
///
/// Every variant keeps the full topic string so a single log line is enough
/// to find the offending publisher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Third-from-last segment is not the configured prefix
	#[error(
		"Bad topic name '{topic}': expected '{expected}' as third-from-last \
		 segment, found '{found}'"
	)]
	PrefixMismatch {
		/// The rejected topic
		topic: String,
		/// Prefix the bridge is configured for
		expected: String,
		/// Segment found at the prefix position (empty when missing)
		found: String,
	},

	/// Session or signal segment is empty
	#[error("Bad topic name '{topic}': {segment} segment is empty")]
	EmptySegment {
		/// The rejected topic
		topic: String,
		/// Which segment was empty
		segment: TopicSegment,
	},

	/// Session or signal cannot be used as a document id
	#[error(
		"Bad topic name '{topic}': {segment} '{value}' is not a valid \
		 document id"
	)]
	ReservedSegment {
		/// The rejected topic
		topic: String,
		/// Which segment was rejected
		segment: TopicSegment,
		/// The segment value
		value: String,
	},

	/// Configured prefix cannot be used in a subscription filter
	#[error("Invalid topic prefix '{prefix}': {reason}")]
	InvalidPrefix {
		/// The configured prefix
		prefix: String,
		/// Why it was rejected
		reason: &'static str,
	},
}

impl TopicError {
	/// Creates a new PrefixMismatch error
	pub fn prefix_mismatch(
		topic: impl Into<String>,
		expected: impl Into<String>,
		found: impl Into<String>,
	) -> Self {
		Self::PrefixMismatch {
			topic: topic.into(),
			expected: expected.into(),
			found: found.into(),
		}
	}

	/// Returns the topic string this error refers to, if any
	pub fn topic(&self) -> Option<&str> {
		match self {
			| TopicError::PrefixMismatch { topic, .. }
			| TopicError::EmptySegment { topic, .. }
			| TopicError::ReservedSegment { topic, .. } => Some(topic),
			| TopicError::InvalidPrefix { .. } => None,
		}
	}
}
