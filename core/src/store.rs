//! Document store module
//!
//! The bridge only ever writes. A store receives [`WriteBatch`]es made of
//! merges into existing documents and appends of new auto-keyed documents,
//! and resolves [`FieldValue::ServerTimestamp`] with its own clock.

pub mod batch;
/// Store error types
pub mod error;
/// Firestore REST implementation
pub mod firestore;
/// In-process implementation
pub mod memory;
pub mod path;
/// Access tokens for the Firestore REST API
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use batch::{FieldValue, Fields, Write, WriteBatch};
pub use error::StoreError;
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::{MemoryStore, StoredDocument, StoredValue};
pub use path::{CollectionPath, DocumentPath, auto_id};
pub use token::TokenSource;

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
	/// Server time the batch was applied at, when the store reports one
	pub commit_time: Option<DateTime<Utc>>,
	/// Number of writes applied
	pub writes: usize,
}

/// Write-only access to a document database.
///
/// Every batch is applied atomically: either all of its writes become
/// visible or none do.
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// Apply all writes of `batch`
	async fn commit(
		&self,
		batch: WriteBatch,
	) -> Result<CommitReceipt, StoreError>;

	/// Create `document` if missing and set `fields` on it
	async fn merge_document(
		&self,
		document: DocumentPath,
		fields: Fields,
	) -> Result<CommitReceipt, StoreError> {
		let mut batch = WriteBatch::new();
		batch.merge(document, fields);
		self.commit(batch).await
	}

	/// Add a new auto-keyed document to `collection`
	async fn add_document(
		&self,
		collection: &CollectionPath,
		fields: Fields,
	) -> Result<DocumentPath, StoreError> {
		let mut batch = WriteBatch::new();
		let document = batch.add(collection, fields);
		self.commit(batch).await?;
		Ok(document)
	}
}
