use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::batch::{FieldValue, Fields, Write, WriteBatch};
use super::error::StoreError;
use super::token::TokenSource;
use super::{CommitReceipt, DocumentStore};

/// Public Firestore endpoint
pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Connection settings for the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
	/// GCP project id
	pub project_id: String,
	/// Database id inside the project
	pub database_id: String,
	/// Base URL, without a trailing slash
	pub endpoint: String,
	/// Timeout applied to every request
	pub request_timeout: Duration,
}

impl FirestoreConfig {
	/// Config for the `(default)` database of `project_id` on Google Cloud
	pub fn new(project_id: impl Into<String>) -> Self {
		Self {
			project_id: project_id.into(),
			database_id: "(default)".to_string(),
			endpoint: DEFAULT_ENDPOINT.to_string(),
			request_timeout: Duration::from_secs(30),
		}
	}

	/// Config pointing at a local emulator such as `localhost:8080`
	pub fn emulator(project_id: impl Into<String>, host: &str) -> Self {
		Self {
			endpoint: format!("http://{}", host.trim_end_matches('/')),
			..Self::new(project_id)
		}
	}

	/// `projects/{project}/databases/{database}`
	pub fn database_name(&self) -> String {
		format!(
			"projects/{}/databases/{}",
			self.project_id, self.database_id
		)
	}

	fn documents_root(&self) -> String {
		format!("{}/documents", self.database_name())
	}

	fn commit_url(&self) -> String {
		format!(
			"{}/v1/{}/documents:commit",
			self.endpoint,
			self.database_name()
		)
	}
}

/// Document store backed by Firestore's `documents:commit` REST call.
///
/// A batch maps onto a single commit request, which Firestore applies
/// atomically. Server timestamps are sent as `REQUEST_TIME` field
/// transforms.
#[derive(Debug)]
pub struct FirestoreStore {
	client: Client,
	config: FirestoreConfig,
	tokens: TokenSource,
}

impl FirestoreStore {
	/// Build the HTTP client for `config`
	pub fn new(
		config: FirestoreConfig,
		tokens: TokenSource,
	) -> Result<Self, StoreError> {
		let client = Client::builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(|e| StoreError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			config,
			tokens,
		})
	}

	/// Connection settings in use
	pub fn config(&self) -> &FirestoreConfig {
		&self.config
	}
}

#[async_trait]
impl DocumentStore for FirestoreStore {
	async fn commit(
		&self,
		batch: WriteBatch,
	) -> Result<CommitReceipt, StoreError> {
		let writes = batch.len();
		let body = encode_commit(&self.config.documents_root(), &batch);

		let mut request =
			self.client.post(self.config.commit_url()).json(&body);
		if let Some(token) = self.tokens.bearer(&self.client).await? {
			request = request.bearer_auth(token);
		}

		let response = request.send().await.map_err(|e| {
			if e.is_connect() || e.is_timeout() {
				StoreError::Unavailable(e.to_string())
			} else {
				StoreError::Request(e)
			}
		})?;

		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			let message = error_message(&text);
			warn!(status = status.as_u16(), message = %message, "Firestore rejected commit");
			return Err(StoreError::Rejected {
				status: status.as_u16(),
				message,
			});
		}

		let parsed: CommitResponse = response
			.json()
			.await
			.map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
		if parsed.write_results.len() != writes {
			return Err(StoreError::InvalidResponse(format!(
				"expected {writes} write results, got {}",
				parsed.write_results.len()
			)));
		}

		debug!(writes, commit_time = ?parsed.commit_time, "Committed batch to Firestore");
		Ok(CommitReceipt {
			commit_time: parsed.commit_time,
			writes,
		})
	}
}

// === Wire format ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest {
	writes: Vec<WireWrite>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireWrite {
	update: WireDocument,
	#[serde(skip_serializing_if = "Option::is_none")]
	update_mask: Option<DocumentMask>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	update_transforms: Vec<FieldTransform>,
	#[serde(skip_serializing_if = "Option::is_none")]
	current_document: Option<Precondition>,
}

#[derive(Debug, Serialize)]
struct WireDocument {
	name: String,
	fields: std::collections::BTreeMap<String, WireValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
	field_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
	field_path: String,
	set_to_server_value: &'static str,
}

#[derive(Debug, Serialize)]
struct Precondition {
	exists: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum WireValue {
	DoubleValue(f64),
	StringValue(String),
	TimestampValue(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
	#[serde(default)]
	write_results: Vec<serde_json::Value>,
	commit_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
	error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
	message: String,
}

fn encode_commit(documents_root: &str, batch: &WriteBatch) -> CommitRequest {
	CommitRequest {
		writes: batch
			.writes()
			.iter()
			.map(|write| encode_write(documents_root, write))
			.collect(),
	}
}

fn encode_write(documents_root: &str, write: &Write) -> WireWrite {
	let name = format!("{documents_root}/{}", write.document());
	let (fields, transforms) = split_fields(write.fields());

	match write {
		| Write::Merge { .. } => WireWrite {
			update_mask: Some(DocumentMask {
				field_paths: fields
					.keys()
					.map(|k| quote_field_path(k))
					.collect(),
			}),
			update: WireDocument { name, fields },
			update_transforms: transforms,
			current_document: None,
		},
		| Write::Append { .. } => WireWrite {
			update: WireDocument { name, fields },
			update_mask: None,
			update_transforms: transforms,
			current_document: Some(Precondition { exists: false }),
		},
	}
}

/// Separates concrete values from server-side transforms
fn split_fields(
	fields: &Fields,
) -> (std::collections::BTreeMap<String, WireValue>, Vec<FieldTransform>) {
	let mut values = std::collections::BTreeMap::new();
	let mut transforms = Vec::new();
	for (name, value) in fields {
		let wire = match value {
			| FieldValue::ServerTimestamp => {
				transforms.push(FieldTransform {
					field_path: quote_field_path(name),
					set_to_server_value: "REQUEST_TIME",
				});
				continue;
			}
			| FieldValue::Double(v) => WireValue::DoubleValue(*v),
			| FieldValue::String(s) => WireValue::StringValue(s.clone()),
			| FieldValue::Timestamp(ts) => WireValue::TimestampValue(
				ts.to_rfc3339_opts(SecondsFormat::Micros, true),
			),
		};
		values.insert(name.clone(), wire);
	}
	(values, transforms)
}

/// Field paths that are not plain identifiers must be backtick-quoted
fn quote_field_path(name: &str) -> String {
	let simple = name
		.chars()
		.next()
		.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
	if simple {
		name.to_string()
	} else {
		format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
	}
}

fn error_message(body: &str) -> String {
	serde_json::from_str::<ErrorResponse>(body)
		.map(|e| e.error.message)
		.unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::store::CollectionPath;

	const ROOT: &str = "projects/p/databases/(default)/documents";

	#[test]
	fn test_config_urls() {
		let config = FirestoreConfig::new("hjfreyer-bbq");
		assert_eq!(
			config.commit_url(),
			concat!(
				"https://firestore.googleapis.com/v1/",
				"projects/hjfreyer-bbq/databases/(default)/documents:commit",
			)
		);

		let emulator = FirestoreConfig::emulator("demo", "localhost:8080/");
		assert_eq!(
			emulator.commit_url(),
			concat!(
				"http://localhost:8080/v1/",
				"projects/demo/databases/(default)/documents:commit",
			)
		);
	}

	#[test]
	fn test_session_merge_encoding() {
		let mut batch = WriteBatch::new();
		batch.merge(
			CollectionPath::root("sessions").doc("session42"),
			Fields::from([(
				"last_update".to_string(),
				FieldValue::ServerTimestamp,
			)]),
		);

		let body = serde_json::to_value(encode_commit(ROOT, &batch)).unwrap();

		assert_eq!(
			body,
			json!({
				"writes": [{
					"update": {
						"name": format!("{ROOT}/sessions/session42"),
						"fields": {}
					},
					"updateMask": { "fieldPaths": [] },
					"updateTransforms": [{
						"fieldPath": "last_update",
						"setToServerValue": "REQUEST_TIME"
					}]
				}]
			})
		);
	}

	#[test]
	fn test_reading_append_encoding() {
		let mut batch = WriteBatch::new();
		let temp = CollectionPath::root("sessions")
			.doc("session42")
			.collection("temp");
		let document = batch.add(
			&temp,
			Fields::from([
				("timestamp".to_string(), FieldValue::ServerTimestamp),
				("value".to_string(), FieldValue::Double(72.3)),
			]),
		);

		let body = serde_json::to_value(encode_commit(ROOT, &batch)).unwrap();

		assert_eq!(
			body,
			json!({
				"writes": [{
					"update": {
						"name": format!("{ROOT}/{document}"),
						"fields": { "value": { "doubleValue": 72.3 } }
					},
					"updateTransforms": [{
						"fieldPath": "timestamp",
						"setToServerValue": "REQUEST_TIME"
					}],
					"currentDocument": { "exists": false }
				}]
			})
		);
	}

	#[test]
	fn test_merge_mask_lists_concrete_fields() {
		let mut batch = WriteBatch::new();
		batch.merge(
			CollectionPath::root("sessions").doc("s"),
			Fields::from([
				("label".to_string(), FieldValue::String("brisket".into())),
				("my-field".to_string(), FieldValue::Double(1.0)),
			]),
		);

		let body = serde_json::to_value(encode_commit(ROOT, &batch)).unwrap();

		assert_eq!(
			body["writes"][0]["updateMask"]["fieldPaths"],
			json!(["label", "`my-field`"])
		);
		assert_eq!(
			body["writes"][0]["update"]["fields"]["label"],
			json!({ "stringValue": "brisket" })
		);
		assert!(body["writes"][0].get("updateTransforms").is_none());
	}

	#[test]
	fn test_quote_field_path() {
		assert_eq!(quote_field_path("value"), "value");
		assert_eq!(quote_field_path("_a1"), "_a1");
		assert_eq!(quote_field_path("1a"), "`1a`");
		assert_eq!(quote_field_path("a.b"), "`a.b`");
		assert_eq!(quote_field_path("a`b"), "`a\\`b`");
	}

	#[test]
	fn test_commit_response_parsing() {
		let body = r#"{
			"writeResults": [
				{"updateTime": "2024-05-01T12:00:00.123456Z", "transformResults": [{"timestampValue": "2024-05-01T12:00:00.123456Z"}]},
				{"updateTime": "2024-05-01T12:00:00.123456Z"}
			],
			"commitTime": "2024-05-01T12:00:00.123456Z"
		}"#;
		let parsed: CommitResponse = serde_json::from_str(body).unwrap();

		assert_eq!(parsed.write_results.len(), 2);
		assert_eq!(
			parsed
				.commit_time
				.unwrap()
				.to_rfc3339_opts(SecondsFormat::Micros, true),
			"2024-05-01T12:00:00.123456Z"
		);
	}

	#[test]
	fn test_error_message_extraction() {
		let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
		assert_eq!(error_message(body), "Missing or insufficient permissions.");
		assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
	}
}
