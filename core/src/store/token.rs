use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::error::StoreError;

/// Token endpoint of the GCP metadata server
pub const METADATA_TOKEN_URL: &str = concat!(
	"http://metadata.google.internal/computeMetadata/v1/",
	"instance/service-accounts/default/token"
);

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens for Firestore requests come from
pub enum TokenSource {
	/// No authorization header, for the local emulator
	Anonymous,
	/// Fixed token, e.g. from `gcloud auth print-access-token`
	Static(String),
	/// Default service account of the GCP metadata server
	Metadata(MetadataTokens),
}

impl TokenSource {
	/// Metadata server token source using the standard endpoint
	pub fn metadata() -> Self {
		Self::Metadata(MetadataTokens::new(METADATA_TOKEN_URL))
	}

	pub(crate) async fn bearer(
		&self,
		client: &Client,
	) -> Result<Option<String>, StoreError> {
		match self {
			| TokenSource::Anonymous => Ok(None),
			| TokenSource::Static(token) => Ok(Some(token.clone())),
			| TokenSource::Metadata(tokens) => {
				tokens.get(client).await.map(Some)
			}
		}
	}
}

impl fmt::Debug for TokenSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| TokenSource::Anonymous => f.write_str("Anonymous"),
			| TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
			| TokenSource::Metadata(tokens) => {
				f.debug_tuple("Metadata").field(&tokens.url).finish()
			}
		}
	}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
	expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
	value: String,
	expires_at: Instant,
}

impl CachedToken {
	fn is_fresh(&self, now: Instant) -> bool {
		now + REFRESH_MARGIN < self.expires_at
	}
}

/// Access tokens fetched from the metadata server, cached until shortly
/// before they expire.
pub struct MetadataTokens {
	url: String,
	cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokens {
	/// Fetch tokens from `url`
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			cached: Mutex::new(None),
		}
	}

	async fn get(&self, client: &Client) -> Result<String, StoreError> {
		let mut cached = self.cached.lock().await;
		if let Some(token) = cached.as_ref() {
			if token.is_fresh(Instant::now()) {
				return Ok(token.value.clone());
			}
		}

		let response = client
			.get(&self.url)
			.header("Metadata-Flavor", "Google")
			.send()
			.await
			.map_err(|e| StoreError::Token(e.to_string()))?;
		if !response.status().is_success() {
			return Err(StoreError::Token(format!(
				"metadata server answered {}",
				response.status()
			)));
		}
		let token: TokenResponse = response
			.json()
			.await
			.map_err(|e| StoreError::Token(e.to_string()))?;

		debug!(
			expires_in = token.expires_in,
			"Fetched access token from metadata server"
		);
		let fresh = CachedToken {
			value: token.access_token,
			expires_at: Instant::now() + Duration::from_secs(token.expires_in),
		};
		let value = fresh.value.clone();
		*cached = Some(fresh);
		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cached_token_freshness() {
		let now = Instant::now();
		let token = CachedToken {
			value: "t".to_string(),
			expires_at: now + Duration::from_secs(3600),
		};

		assert!(token.is_fresh(now));
		assert!(token.is_fresh(now + Duration::from_secs(3500)));
		assert!(!token.is_fresh(now + Duration::from_secs(3540)));
		assert!(!token.is_fresh(now + Duration::from_secs(4000)));
	}

	#[test]
	fn test_token_response_shape() {
		let body = r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#;
		let token: TokenResponse = serde_json::from_str(body).unwrap();

		assert_eq!(token.access_token, "ya29.abc");
		assert_eq!(token.expires_in, 3599);
	}

	#[test]
	fn test_debug_redacts_static_token() {
		let source = TokenSource::Static("secret".to_string());
		assert!(!format!("{source:?}").contains("secret"));
	}

	#[tokio::test]
	async fn test_static_and_anonymous_bearer() {
		let client = Client::new();

		assert_eq!(TokenSource::Anonymous.bearer(&client).await.unwrap(), None);
		assert_eq!(
			TokenSource::Static("abc".into()).bearer(&client).await.unwrap(),
			Some("abc".to_string())
		);
	}
}
