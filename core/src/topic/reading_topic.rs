use std::fmt;

use arcstr::{ArcStr, Substr};

use super::error::{TopicError, TopicSegment};

/// Prefix segment readings are published under
pub const DEFAULT_PREFIX: &str = "bbq";

/// Session and signal identity extracted from a topic like
/// `/bbq/{session}/{signal}`.
///
/// Segments are counted from the end of the path: the last one is the
/// signal, the one before it the session and the one before that must be
/// the prefix. Missing segments read as empty strings, so short topics fail
/// the prefix check instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingTopic {
	path: ArcStr,
	session: Substr,
	signal: Substr,
}

impl ReadingTopic {
	/// Split `topic` into session and signal.
	///
	/// Levels are counted from the end: the third-from-last must equal
	/// `prefix`, anything before it is ignored.
	pub fn parse(
		topic: impl Into<ArcStr>,
		prefix: &str,
	) -> Result<Self, TopicError> {
		let path: ArcStr = topic.into();

		let mut segments = path.rsplit('/');
		let signal = segments.next().unwrap_or_default();
		let session = segments.next().unwrap_or_default();
		let found = segments.next().unwrap_or_default();

		if found != prefix {
			return Err(TopicError::prefix_mismatch(
				path.as_str(),
				prefix,
				found,
			));
		}

		validate_segment(&path, TopicSegment::Session, session)?;
		validate_segment(&path, TopicSegment::Signal, signal)?;

		let session = path.substr_from(session);
		let signal = path.substr_from(signal);
		Ok(Self {
			path,
			session,
			signal,
		})
	}

	/// Full topic the reading arrived on
	pub fn topic(&self) -> &str {
		&self.path
	}

	/// Session id, second-to-last level
	pub fn session(&self) -> &str {
		&self.session
	}

	/// Signal name, last level
	pub fn signal(&self) -> &str {
		&self.signal
	}
}

impl fmt::Display for ReadingTopic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}

/// Multi-level wildcard filter covering every reading topic for `prefix`.
pub fn subscription_filter(prefix: &str) -> String {
	format!("/{prefix}/#")
}

/// Checks that `prefix` can be used both as a literal topic level and
/// inside the subscription filter.
pub fn validate_prefix(prefix: &str) -> Result<(), TopicError> {
	let reason = if prefix.is_empty() {
		"prefix is empty"
	} else if prefix.contains('/') {
		"prefix must be a single topic level"
	} else if prefix.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
		"prefix contains illegal characters ('#', '+', or null byte)"
	} else {
		return Ok(());
	};
	Err(TopicError::InvalidPrefix {
		prefix: prefix.to_string(),
		reason,
	})
}

fn validate_segment(
	topic: &str,
	segment: TopicSegment,
	value: &str,
) -> Result<(), TopicError> {
	if value.is_empty() {
		return Err(TopicError::EmptySegment {
			topic: topic.to_string(),
			segment,
		});
	}
	// Firestore refuses these as document or collection ids.
	let reserved = value == "."
		|| value == ".."
		|| (value.len() >= 4
			&& value.starts_with("__")
			&& value.ends_with("__"));
	if reserved {
		return Err(TopicError::ReservedSegment {
			topic: topic.to_string(),
			segment,
			value: value.to_string(),
		});
	}
	Ok(())
}
