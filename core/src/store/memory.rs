use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::batch::{FieldValue, Write, WriteBatch};
use super::error::StoreError;
use super::path::{CollectionPath, DocumentPath};
use super::{CommitReceipt, DocumentStore};

/// Field value after server timestamps have been resolved
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
	/// Floating point number
	Double(f64),
	/// UTF-8 text
	String(String),
	/// Explicit or resolved server timestamp
	Timestamp(DateTime<Utc>),
}

impl StoredValue {
	/// The number held by a `Double` value
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			| StoredValue::Double(value) => Some(*value),
			| _ => None,
		}
	}

	/// The instant held by a `Timestamp` value
	pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
		match self {
			| StoredValue::Timestamp(ts) => Some(*ts),
			| _ => None,
		}
	}
}

/// Document contents as held by [`MemoryStore`]
pub type StoredDocument = BTreeMap<String, StoredValue>;

#[derive(Debug, Default)]
struct Inner {
	documents: BTreeMap<DocumentPath, StoredDocument>,
	/// Creation order, so collection listings are stable
	created: Vec<DocumentPath>,
	last_commit_time: Option<DateTime<Utc>>,
	commits: usize,
	unavailable: Option<String>,
}

/// In-process document store.
///
/// Clones share the same contents, so a test can keep one handle for
/// inspection while the bridge owns another. Server timestamps come from
/// the wall clock but never go backwards between commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
	/// Empty, available store
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Make every following commit fail with [`StoreError::Unavailable`]
	/// until [`MemoryStore::set_available`] is called.
	pub fn set_unavailable(&self, reason: impl Into<String>) {
		self.lock().unavailable = Some(reason.into());
	}

	/// Let commits succeed again
	pub fn set_available(&self) {
		self.lock().unavailable = None;
	}

	/// Snapshot of a single document
	pub fn document(&self, path: &DocumentPath) -> Option<StoredDocument> {
		self.lock().documents.get(path).cloned()
	}

	/// Documents directly inside `collection`, in creation order
	pub fn collection(
		&self,
		collection: &CollectionPath,
	) -> Vec<(DocumentPath, StoredDocument)> {
		let inner = self.lock();
		inner
			.created
			.iter()
			.filter(|path| &path.parent() == collection)
			.filter_map(|path| {
				inner
					.documents
					.get(path)
					.map(|doc| (path.clone(), doc.clone()))
			})
			.collect()
	}

	/// Number of successful commits
	pub fn commit_count(&self) -> usize {
		self.lock().commits
	}

	/// Number of stored documents across all collections
	pub fn document_count(&self) -> usize {
		self.lock().documents.len()
	}
}

fn resolve(value: FieldValue, now: DateTime<Utc>) -> StoredValue {
	match value {
		| FieldValue::ServerTimestamp => StoredValue::Timestamp(now),
		| FieldValue::Double(value) => StoredValue::Double(value),
		| FieldValue::String(value) => StoredValue::String(value),
		| FieldValue::Timestamp(ts) => StoredValue::Timestamp(ts),
	}
}

#[async_trait]
impl DocumentStore for MemoryStore {
	async fn commit(
		&self,
		batch: WriteBatch,
	) -> Result<CommitReceipt, StoreError> {
		let mut inner = self.lock();
		if let Some(reason) = &inner.unavailable {
			return Err(StoreError::Unavailable(reason.clone()));
		}

		// Check preconditions for the whole batch before touching anything.
		for write in batch.writes() {
			if let Write::Append { document, .. } = write {
				if inner.documents.contains_key(document) {
					return Err(StoreError::AlreadyExists(document.to_string()));
				}
			}
		}

		let now = match inner.last_commit_time {
			| Some(last) => Utc::now().max(last),
			| None => Utc::now(),
		};
		let writes = batch.len();

		for write in batch {
			match write {
				| Write::Merge { document, fields } => {
					if !inner.documents.contains_key(&document) {
						inner.created.push(document.clone());
					}
					let stored = inner.documents.entry(document).or_default();
					for (name, value) in fields {
						stored.insert(name, resolve(value, now));
					}
				}
				| Write::Append { document, fields } => {
					let stored = fields
						.into_iter()
						.map(|(name, value)| (name, resolve(value, now)))
						.collect();
					inner.created.push(document.clone());
					inner.documents.insert(document, stored);
				}
			}
		}

		inner.last_commit_time = Some(now);
		inner.commits += 1;
		debug!(writes, commit_time = %now, "Committed batch to memory store");

		Ok(CommitReceipt {
			commit_time: Some(now),
			writes,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::Fields;

	fn reading(value: f64) -> Fields {
		Fields::from([
			("timestamp".to_string(), FieldValue::ServerTimestamp),
			("value".to_string(), FieldValue::Double(value)),
		])
	}

	#[tokio::test]
	async fn test_merge_creates_then_overwrites_field() {
		let store = MemoryStore::new();
		let session = CollectionPath::root("sessions").doc("s1");

		store
			.merge_document(
				session.clone(),
				Fields::from([(
					"note".to_string(),
					FieldValue::String("first".into()),
				)]),
			)
			.await
			.unwrap();
		store
			.merge_document(
				session.clone(),
				Fields::from([(
					"last_update".to_string(),
					FieldValue::ServerTimestamp,
				)]),
			)
			.await
			.unwrap();

		let doc = store.document(&session).unwrap();
		assert_eq!(doc.get("note"), Some(&StoredValue::String("first".into())));
		assert!(doc.get("last_update").unwrap().as_timestamp().is_some());
		assert_eq!(store.commit_count(), 2);
	}

	#[tokio::test]
	async fn test_appends_are_listed_in_order() {
		let store = MemoryStore::new();
		let temp =
			CollectionPath::root("sessions").doc("s1").collection("temp");

		let first = store.add_document(&temp, reading(1.0)).await.unwrap();
		let second = store.add_document(&temp, reading(2.0)).await.unwrap();

		let docs = store.collection(&temp);
		assert_eq!(docs.len(), 2);
		assert_eq!(docs[0].0, first);
		assert_eq!(docs[1].0, second);
		assert_eq!(docs[1].1["value"].as_f64(), Some(2.0));
	}

	#[tokio::test]
	async fn test_server_timestamps_never_decrease() {
		let store = MemoryStore::new();
		let temp =
			CollectionPath::root("sessions").doc("s1").collection("temp");

		for i in 0 .. 20 {
			store.add_document(&temp, reading(f64::from(i))).await.unwrap();
		}

		let stamps: Vec<_> = store
			.collection(&temp)
			.iter()
			.map(|(_, doc)| doc["timestamp"].as_timestamp().unwrap())
			.collect();
		assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
	}

	#[tokio::test]
	async fn test_batch_shares_one_commit_time() {
		let store = MemoryStore::new();
		let session = CollectionPath::root("sessions").doc("s1");
		let mut batch = WriteBatch::new();
		batch.merge(
			session.clone(),
			Fields::from([(
				"last_update".to_string(),
				FieldValue::ServerTimestamp,
			)]),
		);
		let reading_path = batch.add(&session.collection("temp"), reading(3.5));

		let receipt = store.commit(batch).await.unwrap();

		let last_update = store.document(&session).unwrap()["last_update"]
			.as_timestamp()
			.unwrap();
		let stamp = store.document(&reading_path).unwrap()["timestamp"]
			.as_timestamp()
			.unwrap();
		assert_eq!(receipt.writes, 2);
		assert_eq!(receipt.commit_time, Some(last_update));
		assert_eq!(last_update, stamp);
	}

	#[tokio::test]
	async fn test_unavailable_store_rejects_whole_batch() {
		let store = MemoryStore::new();
		store.set_unavailable("maintenance");

		let result = store
			.add_document(&CollectionPath::root("sessions"), reading(1.0))
			.await;

		assert!(matches!(result, Err(StoreError::Unavailable(_))));
		assert_eq!(store.document_count(), 0);
		assert_eq!(store.commit_count(), 0);

		store.set_available();
		assert!(
			store
				.add_document(&CollectionPath::root("sessions"), reading(1.0))
				.await
				.is_ok()
		);
	}

	#[tokio::test]
	async fn test_duplicate_append_fails_without_partial_writes() {
		let store = MemoryStore::new();
		let session = CollectionPath::root("sessions").doc("s1");
		let existing = session.collection("temp").doc("fixed");
		store
			.commit(WriteBatch::from(Write::Append {
				document: existing.clone(),
				fields: reading(1.0),
			}))
			.await
			.unwrap();

		let mut batch = WriteBatch::new();
		batch
			.merge(
				session.clone(),
				Fields::from([(
					"last_update".to_string(),
					FieldValue::ServerTimestamp,
				)]),
			)
			.push(Write::Append {
				document: existing.clone(),
				fields: reading(2.0),
			});
		let result = store.commit(batch).await;

		assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
		assert!(store.document(&session).is_none());
		assert_eq!(
			store.document(&existing).unwrap()["value"].as_f64(),
			Some(1.0)
		);
	}
}
