//!
//! HTTP client for a ThingBook API instance.
//!
//! This module provides an async client for the ThingBook REST API. All
//! resources live under `{base}/api/v1/{resource}`; listings are paginated
//! with `limit`/`offset` query parameters. The [`RemoteApi`] trait is the
//! seam the loading engine depends on, so tests can substitute an in-memory
//! server for the real transport.

use super::types::{ApiError, Record};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Page size used by [`RemoteApi::search`] when scanning a collection for a
/// record with a matching field value.
pub const SEARCH_PAGE_SIZE: usize = 20;

/// Remote operations required by the loading engine.
///
/// The `search` scan is a linear walk over the collection and therefore O(n)
/// per adoption. Acceptable at the expected scale; correctness, not
/// throughput, is this client's contract.
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
	/// Retrieve a single record, e.g. the `status` resource.
	async fn get(&self, resource: &str) -> Result<Record, ApiError>;

	/// Retrieve up to `count` records starting at `offset`.
	///
	/// A page shorter than `count` signals the end of the collection.
	async fn list(&self, resource: &str, count: usize, offset: usize)
	-> Result<Vec<Record>, ApiError>;

	/// Create a record; the response echoes the payload enriched with a
	/// server-assigned `_id`.
	async fn create(&self, resource: &str, payload: &Value) -> Result<Record, ApiError>;

	/// Scan `resource` for the first record whose `field` equals `value`.
	///
	/// Returns `Ok(None)` once a short page is reached without a match.
	async fn search(
		&self,
		resource: &str,
		field: &str,
		value: &str,
	) -> Result<Option<Record>, ApiError> {
		let mut offset = 0;
		loop {
			let page = self.list(resource, SEARCH_PAGE_SIZE, offset).await?;

			for record in &page {
				if record.get(field).and_then(Value::as_str) == Some(value) {
					return Ok(Some(record.clone()));
				}
			}

			if page.len() < SEARCH_PAGE_SIZE {
				return Ok(None);
			}

			offset += SEARCH_PAGE_SIZE;
		}
	}
}

/// ThingBook REST API client
#[derive(Clone)]
pub struct ThingBookClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the ThingBook instance, without the `/api/v1` prefix.
	base_url: String,
}

impl ThingBookClient {
	/// Create a new client for the instance at `base_url`.
	pub fn new(base_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			base_url,
		}
	}

	fn resource_url(&self, resource: &str) -> String {
		format!("{}/api/v1/{}", self.base_url, resource)
	}

	/// Convert a non-success response into `ApiError::Request`, preserving
	/// the server's JSON error body when one is present.
	async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let detail = match response.json::<Value>().await {
			Ok(body) => body.to_string(),
			Err(_) => status
				.canonical_reason()
				.unwrap_or("unknown error")
				.to_string(),
		};

		Err(ApiError::Request {
			status: status.as_u16(),
			detail,
		})
	}
}

#[async_trait::async_trait]
impl RemoteApi for ThingBookClient {
	async fn get(&self, resource: &str) -> Result<Record, ApiError> {
		let url = self.resource_url(resource);
		debug!("GET {}", url);

		let response = self.http_client.get(&url).send().await?;
		let response = Self::error_for_status(response).await?;

		Ok(response.json::<Record>().await?)
	}

	async fn list(
		&self,
		resource: &str,
		count: usize,
		offset: usize,
	) -> Result<Vec<Record>, ApiError> {
		let url = self.resource_url(resource);
		debug!("GET {} (limit={}, offset={})", url, count, offset);

		let response = self
			.http_client
			.get(&url)
			.query(&[("limit", count), ("offset", offset)])
			.send()
			.await?;
		let response = Self::error_for_status(response).await?;

		Ok(response.json::<Vec<Record>>().await?)
	}

	async fn create(&self, resource: &str, payload: &Value) -> Result<Record, ApiError> {
		let url = self.resource_url(resource);
		debug!("POST {}", url);

		let response = self.http_client.post(&url).json(payload).send().await?;
		let response = Self::error_for_status(response).await?;

		Ok(response.json::<Record>().await?)
	}
}
