//! In-memory test doubles for the remote API and document sources.

use super::LoadError;
use super::source::DocumentSource;
use crate::api::{ApiError, ID_FIELD, Record, RemoteApi};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Build a record literal from field/value pairs.
pub fn record(fields: &[(&str, Value)]) -> Record {
	fields
		.iter()
		.map(|(k, v)| (k.to_string(), v.clone()))
		.collect()
}

/// Box a list of in-memory sources for the scheduler.
pub fn sources(sources: Vec<MemorySource>) -> Vec<Box<dyn DocumentSource>> {
	sources
		.into_iter()
		.map(|s| Box::new(s) as Box<dyn DocumentSource>)
		.collect()
}

/// An already-parsed document handed to the scheduler without file I/O.
pub struct MemorySource {
	label: String,
	document: Value,
}

impl MemorySource {
	pub fn new(label: &str, document: Value) -> Self {
		Self {
			label: label.to_string(),
			document,
		}
	}
}

#[async_trait]
impl DocumentSource for MemorySource {
	fn label(&self) -> String {
		self.label.clone()
	}

	async fn read(&self) -> Result<Value, LoadError> {
		Ok(self.document.clone())
	}
}

#[derive(Default)]
struct FakeState {
	collections: HashMap<String, Vec<Record>>,
	next_id: u64,
	create_log: Vec<String>,
	reject: Option<(u16, String)>,
	fail_lists: Option<(u16, String)>,
}

/// An in-memory ThingBook instance.
///
/// Collections are keyed by their listing path; creation sub-resources
/// (`user/register`, `user/{id}/organization`) route into the corresponding
/// listing collection the same way the real service does.
pub struct FakeRemote {
	state: Mutex<FakeState>,
}

impl FakeRemote {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(FakeState {
				next_id: 1,
				..FakeState::default()
			}),
		}
	}

	/// Pre-populate a collection with an existing remote record.
	pub fn seed(&self, collection: &str, record: Record) {
		let mut state = self.state.lock().unwrap();
		state
			.collections
			.entry(collection.to_string())
			.or_default()
			.push(record);
	}

	/// Make every subsequent create call fail with the given server error.
	pub fn reject_creates(&self, status: u16, detail: &str) {
		self.state.lock().unwrap().reject = Some((status, detail.to_string()));
	}

	/// Make every subsequent list call fail with the given server error.
	pub fn fail_lists(&self, status: u16, detail: &str) {
		self.state.lock().unwrap().fail_lists = Some((status, detail.to_string()));
	}

	/// Resource paths of every create call issued so far, in order.
	pub fn create_log(&self) -> Vec<String> {
		self.state.lock().unwrap().create_log.clone()
	}

	fn listing_collection(resource: &str) -> String {
		if resource == "user/register" {
			return "user".to_string();
		}
		if resource.starts_with("user/") && resource.ends_with("/organization") {
			return "organization".to_string();
		}
		resource.to_string()
	}
}

#[async_trait]
impl RemoteApi for FakeRemote {
	async fn get(&self, resource: &str) -> Result<Record, ApiError> {
		let state = self.state.lock().unwrap();
		state
			.collections
			.get(resource)
			.and_then(|records| records.first())
			.cloned()
			.ok_or_else(|| ApiError::Request {
				status: 404,
				detail: format!("no such resource: {}", resource),
			})
	}

	async fn list(
		&self,
		resource: &str,
		count: usize,
		offset: usize,
	) -> Result<Vec<Record>, ApiError> {
		let state = self.state.lock().unwrap();
		if let Some((status, detail)) = &state.fail_lists {
			return Err(ApiError::Request {
				status: *status,
				detail: detail.clone(),
			});
		}
		Ok(state
			.collections
			.get(resource)
			.map(|records| records.iter().skip(offset).take(count).cloned().collect())
			.unwrap_or_default())
	}

	async fn create(&self, resource: &str, payload: &Value) -> Result<Record, ApiError> {
		let mut state = self.state.lock().unwrap();
		state.create_log.push(resource.to_string());

		if let Some((status, detail)) = &state.reject {
			return Err(ApiError::Request {
				status: *status,
				detail: detail.clone(),
			});
		}

		let mut record = payload
			.as_object()
			.cloned()
			.ok_or_else(|| ApiError::UnexpectedBody("payload is not an object".to_string()))?;
		record.insert(ID_FIELD.to_string(), Value::String(state.next_id.to_string()));
		state.next_id += 1;

		let collection = Self::listing_collection(resource);
		state
			.collections
			.entry(collection)
			.or_default()
			.push(record.clone());

		Ok(record)
	}
}
