//! Recursive walk over one declarative document.
//!
//! A document is a nested mapping. Keys naming one of the six entity kinds
//! hold sequences of attribute records; any other key is namespacing and is
//! recursed into with no semantic effect. Records whose natural key is
//! already in the repository are skipped, which is what makes re-walking a
//! document on a later pass cheap and duplicate-free.

use super::LoadError;
use super::builder::{BuildOutcome, EntityBuilder};
use super::deferral::DeferralSet;
use super::entity::EntityKind;
use super::repository::EntityRepository;
use crate::api::{Record, RemoteApi};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Bound on namespacing recursion, so a malformed document cannot drive
/// unbounded structural recursion.
pub const MAX_DOCUMENT_DEPTH: usize = 16;

/// Walks one parsed document, constructing entities against the repository.
pub struct DocumentWalker<'a> {
	api: &'a dyn RemoteApi,
	repo: &'a mut EntityRepository,
}

impl<'a> DocumentWalker<'a> {
	pub fn new(api: &'a dyn RemoteApi, repo: &'a mut EntityRepository) -> Self {
		Self { api, repo }
	}

	/// Process every record the document declares, in declaration order.
	///
	/// Successes enter the repository; deferrals from every nesting level
	/// flatten into the returned set; failed creates were already logged and
	/// are dropped for this pass.
	pub async fn walk(&mut self, document: &Value) -> Result<DeferralSet, LoadError> {
		self.walk_value(document, 0).await
	}

	/// Visit one mapping level. Entity keys hold record sequences; any other
	/// key is namespacing and recursed into; non-mapping values at
	/// namespacing level are ignored.
	fn walk_value<'b>(
		&'b mut self,
		value: &'b Value,
		depth: usize,
	) -> Pin<Box<dyn Future<Output = Result<DeferralSet, LoadError>> + 'b>> {
		Box::pin(async move {
			let mut deferrals = DeferralSet::new();

			let Some(mapping) = value.as_object() else {
				return Ok(deferrals);
			};

			if depth >= MAX_DOCUMENT_DEPTH {
				return Err(LoadError::Document(format!(
					"document nesting exceeds {} levels",
					MAX_DOCUMENT_DEPTH
				)));
			}

			for (key, value) in mapping {
				match EntityKind::from_document_key(key) {
					Some(kind) => {
						debug!("Processing '{}' entity types...", key);
						let items = value.as_array().ok_or_else(|| {
							LoadError::Document(format!(
								"expected a sequence of records under `{}`",
								key
							))
						})?;

						for item in items {
							self.process_record(kind, key, item, &mut deferrals).await?;
						}
					}
					None => {
						debug!("Recursing into '{}' ...", key);
						deferrals.absorb(self.walk_value(value, depth + 1).await?);
					}
				}
			}

			Ok(deferrals)
		})
	}

	/// Construct one declared record unless its natural key is already
	/// resolved.
	async fn process_record(
		&mut self,
		kind: EntityKind,
		key: &str,
		item: &Value,
		deferrals: &mut DeferralSet,
	) -> Result<(), LoadError> {
		let attributes = item
			.as_object()
			.ok_or_else(|| {
				LoadError::Document(format!("expected a mapping record under `{}`", key))
			})?
			.clone();
		let natural_key = natural_key_of(kind, &attributes)?;

		if self.repo.exists(kind, &natural_key) {
			return Ok(());
		}

		let outcome = EntityBuilder::new(self.api, &*self.repo)
			.build(kind, natural_key, attributes)
			.await?;

		match outcome {
			BuildOutcome::Adopted(entity) | BuildOutcome::Created(entity) => {
				self.repo.add(entity);
			}
			BuildOutcome::Deferred(deferred) => deferrals.push(deferred),
			BuildOutcome::Failed(_) => {}
		}

		Ok(())
	}
}

/// The natural key of a declared record: `email` (falling back to `name`)
/// for users, `name` for everything else.
fn natural_key_of(kind: EntityKind, attributes: &Record) -> Result<String, LoadError> {
	let key = match kind {
		EntityKind::User => attributes
			.get("email")
			.or_else(|| attributes.get("name"))
			.and_then(Value::as_str),
		_ => attributes.get("name").and_then(Value::as_str),
	};

	key.map(str::to_string).ok_or_else(|| {
		LoadError::Document(format!(
			"{} record without a `{}` field",
			kind,
			kind.name_field()
		))
	})
}
