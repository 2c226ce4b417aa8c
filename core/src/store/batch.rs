//! Field values and write batches

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::path::{CollectionPath, DocumentPath, auto_id};

/// Value of a single document field in a write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	/// Replaced by the store's own clock when the write is committed
	ServerTimestamp,
	/// Floating point number
	Double(f64),
	/// UTF-8 text
	String(String),
	/// Fixed point in time
	Timestamp(DateTime<Utc>),
}

/// Field name to value map for one document write
pub type Fields = BTreeMap<String, FieldValue>;

/// A single document mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
	/// Create the document if missing and overwrite only the listed fields
	Merge {
		/// Target document
		document: DocumentPath,
		/// Fields to set
		fields: Fields,
	},
	/// Create a new auto-keyed document; fails if the id is already taken
	Append {
		/// Freshly generated document path inside the target collection
		document: DocumentPath,
		/// Full contents of the new document
		fields: Fields,
	},
}

impl Write {
	/// Document this write targets
	pub fn document(&self) -> &DocumentPath {
		match self {
			| Write::Merge { document, .. }
			| Write::Append { document, .. } => document,
		}
	}

	/// Fields this write sets
	pub fn fields(&self) -> &Fields {
		match self {
			| Write::Merge { fields, .. }
			| Write::Append { fields, .. } => fields,
		}
	}
}

/// Ordered group of writes committed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
	writes: Vec<Write>,
}

impl WriteBatch {
	/// Empty batch
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a merge of `fields` into `document`
	pub fn merge(
		&mut self,
		document: DocumentPath,
		fields: Fields,
	) -> &mut Self {
		self.writes.push(Write::Merge { document, fields });
		self
	}

	/// Queue an already built write
	pub fn push(&mut self, write: Write) -> &mut Self {
		self.writes.push(write);
		self
	}

	/// Queue a new record in `collection` and return its generated path
	pub fn add(
		&mut self,
		collection: &CollectionPath,
		fields: Fields,
	) -> DocumentPath {
		let document = collection.doc(auto_id());
		self.writes.push(Write::Append {
			document: document.clone(),
			fields,
		});
		document
	}

	/// Queued writes, in order
	pub fn writes(&self) -> &[Write] {
		&self.writes
	}

	/// Number of queued writes
	pub fn len(&self) -> usize {
		self.writes.len()
	}

	/// True when nothing is queued
	pub fn is_empty(&self) -> bool {
		self.writes.is_empty()
	}
}

impl From<Write> for WriteBatch {
	fn from(write: Write) -> Self {
		Self {
			writes: vec![write],
		}
	}
}

impl IntoIterator for WriteBatch {
	type IntoIter = std::vec::IntoIter<Write>;
	type Item = Write;

	fn into_iter(self) -> Self::IntoIter {
		self.writes.into_iter()
	}
}
