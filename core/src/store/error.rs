use thiserror::Error;

/// Errors returned by document store implementations
#[derive(Debug, Error)]
pub enum StoreError {
	/// Backend cannot be reached or refused to serve
	#[error("Document store is unavailable: {0}")]
	Unavailable(String),

	/// Transport-level HTTP failure
	#[error("HTTP request failed: {0}")]
	Request(#[from] reqwest::Error),

	/// Backend answered with a non-success status
	#[error("Commit rejected with status {status}: {message}")]
	Rejected {
		/// HTTP status code
		status: u16,
		/// Error message reported by the backend
		message: String,
	},

	/// An auto-keyed document id collided with an existing document
	#[error("Document '{0}' already exists")]
	AlreadyExists(String),

	/// Access token could not be obtained
	#[error("Failed to obtain access token: {0}")]
	Token(String),

	/// Backend response did not have the expected shape
	#[error("Unexpected response from document store: {0}")]
	InvalidResponse(String),

	/// Store could not be constructed from the given settings
	#[error("Invalid document store configuration: {0}")]
	Configuration(String),
}
