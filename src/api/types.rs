//! Types for the ThingBook REST API.

use serde::Deserialize;
use serde_json::Value;

/// A single record as returned by the API: a flat JSON object whose `_id`
/// field, when present, is the server-assigned identifier.
pub type Record = serde_json::Map<String, Value>;

/// Field holding the server-assigned identifier on every record.
pub const ID_FIELD: &str = "_id";

/// Response shape of the `status` resource.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRecord {
	/// Deployment name.
	pub name: String,
	/// Deployed version string.
	pub version: String,
	/// Current status, e.g. `OK`.
	pub status: String,
}

/// Error types for remote API operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("server rejected request ({status}): {detail}")]
	Request { status: u16, detail: String },

	#[error("unexpected response body: {0}")]
	UnexpectedBody(String),
}
