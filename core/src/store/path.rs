//! Document and collection paths

use std::fmt;

use rand::Rng;

const AUTO_ID_ALPHABET: &[u8] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const AUTO_ID_LEN: usize = 20;

/// Path of a collection: an odd number of segments, e.g. `sessions` or
/// `sessions/42/temp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath {
	segments: Vec<String>,
}

/// Path of a document: an even number of segments, e.g. `sessions/42`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
	segments: Vec<String>,
}

impl CollectionPath {
	/// Top-level collection
	pub fn root(id: impl Into<String>) -> Self {
		Self {
			segments: vec![id.into()],
		}
	}

	/// Document `id` inside this collection
	pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
		let mut segments = self.segments.clone();
		segments.push(id.into());
		DocumentPath { segments }
	}

	/// Last segment of the path
	pub fn id(&self) -> &str {
		self.segments.last().map(String::as_str).unwrap_or_default()
	}

	/// Document this collection is nested under, `None` for root collections
	pub fn parent(&self) -> Option<DocumentPath> {
		(self.segments.len() > 1).then(|| DocumentPath {
			segments: self.segments[.. self.segments.len() - 1].to_vec(),
		})
	}
}

impl DocumentPath {
	/// Sub-collection `id` under this document
	pub fn collection(&self, id: impl Into<String>) -> CollectionPath {
		let mut segments = self.segments.clone();
		segments.push(id.into());
		CollectionPath { segments }
	}

	/// Last segment of the path
	pub fn id(&self) -> &str {
		self.segments.last().map(String::as_str).unwrap_or_default()
	}

	/// Collection holding this document
	pub fn parent(&self) -> CollectionPath {
		CollectionPath {
			segments: self.segments[.. self.segments.len() - 1].to_vec(),
		}
	}
}

impl fmt::Display for CollectionPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.segments.join("/"))
	}
}

impl fmt::Display for DocumentPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.segments.join("/"))
	}
}

/// Random 20 character document id, the same shape Firestore client
/// libraries generate for `add()`.
pub fn auto_id() -> String {
	let mut rng = rand::rng();
	(0 .. AUTO_ID_LEN)
		.map(|_| {
			AUTO_ID_ALPHABET[rng.random_range(0 .. AUTO_ID_ALPHABET.len())]
				as char
		})
		.collect()
}
