//! Topic handling module
//!
//! Parses inbound MQTT topic names of the shape `/{prefix}/{session}/{signal}`
//! into a session/signal identity and builds the wildcard subscription filter
//! that covers them.

pub mod error;
/// Reading topic parsing
pub mod reading_topic;


pub use error::{TopicError, TopicSegment};
pub use reading_topic::{
	DEFAULT_PREFIX, ReadingTopic, subscription_filter, validate_prefix,
};
