//! Per-entity synchronization: adopt an existing remote record or create one.
//!
//! Construction is the unit of idempotent synchronization. For every kind the
//! builder first tries to adopt a pre-existing remote record with the same
//! natural key, then resolves the kind's fixed dependency references through
//! the repository, and only then issues a create call. Any unresolved
//! reference defers the entity; a rejected create is logged and drops the
//! entity for the run so that later dependents keep deferring.
//!
//! The organization-scoped kinds resolve their references before the adoption
//! scan, because their resource path is parameterized by the owning
//! organization's remote id.

use super::LoadError;
use super::deferral::{DeferredEntity, MissingRef};
use super::entity::{Entity, EntityKind};
use super::repository::EntityRepository;
use crate::api::{ApiError, Record, RemoteApi};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Outcome of one entity construction.
///
/// `Adopted` and `Created` are terminal successes carrying the resolved
/// entity. `Deferred` is recoverable by a later pass. `Failed` is terminal
/// for this run; the entity is discarded and never enters the repository.
#[derive(Debug)]
pub enum BuildOutcome {
	Adopted(Entity),
	Created(Entity),
	Deferred(DeferredEntity),
	Failed(ApiError),
}

/// Builds one entity against the remote instance and the local repository.
pub struct EntityBuilder<'a> {
	api: &'a dyn RemoteApi,
	repo: &'a EntityRepository,
}

impl<'a> EntityBuilder<'a> {
	pub fn new(api: &'a dyn RemoteApi, repo: &'a EntityRepository) -> Self {
		Self { api, repo }
	}

	/// Synchronize one declared record with the remote instance.
	///
	/// `attributes` must be freshly allocated for this record; the builder
	/// mutates it in place as references resolve and remote fields merge in.
	/// Malformed records are a hard [`LoadError::Document`], everything else
	/// is a [`BuildOutcome`].
	pub async fn build(
		&self,
		kind: EntityKind,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		match kind {
			EntityKind::User => self.build_user(natural_key, attributes).await,
			EntityKind::Organization => self.build_organization(natural_key, attributes).await,
			EntityKind::DataSharingFragment => self.build_fragment(natural_key, attributes).await,
			EntityKind::DataSharingTemplate => self.build_template(natural_key, attributes).await,
			EntityKind::OrgTemplate => self.build_org_template(natural_key, attributes).await,
			EntityKind::OrgAgreement => self.build_org_agreement(natural_key, attributes).await,
		}
	}

	async fn build_user(
		&self,
		natural_key: String,
		mut attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		// Documents may declare the email address as `name` for consistency
		// with the other record shapes.
		if !attributes.contains_key("email") {
			attributes.insert("email".to_string(), Value::String(natural_key.clone()));
		}

		let mut entity = Entity::new(EntityKind::User, natural_key, attributes);
		if self.try_adopt(&mut entity, EntityKind::User.collection()).await {
			return Ok(BuildOutcome::Adopted(entity));
		}

		Ok(self.try_create(entity, "user/register").await)
	}

	async fn build_organization(
		&self,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		let mut entity = Entity::new(EntityKind::Organization, natural_key, attributes);
		if self
			.try_adopt(&mut entity, EntityKind::Organization.collection())
			.await
		{
			return Ok(BuildOutcome::Adopted(entity));
		}

		let mut missing = Vec::new();
		let user_id = self.resolve_ref(&entity, "user", EntityKind::User, &mut missing)?;
		let Some(user_id) = user_id else {
			return Ok(BuildOutcome::Deferred(Self::deferred(entity, missing)));
		};

		let resource = format!("user/{}/organization", id_segment(&user_id));
		entity.attributes_mut().insert("user".to_string(), user_id);

		Ok(self.try_create(entity, &resource).await)
	}

	async fn build_fragment(
		&self,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		let collection = EntityKind::DataSharingFragment.collection();
		let mut entity = Entity::new(EntityKind::DataSharingFragment, natural_key, attributes);
		if self.try_adopt(&mut entity, collection).await {
			return Ok(BuildOutcome::Adopted(entity));
		}

		Ok(self.try_create(entity, collection).await)
	}

	async fn build_template(
		&self,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		let collection = EntityKind::DataSharingTemplate.collection();
		let mut entity = Entity::new(EntityKind::DataSharingTemplate, natural_key, attributes);
		if self.try_adopt(&mut entity, collection).await {
			return Ok(BuildOutcome::Adopted(entity));
		}

		let names = ref_list(&entity, "fragments")?;
		let mut missing = Vec::new();
		let mut ids = Vec::new();
		for name in &names {
			match self.repo.remote_id(EntityKind::DataSharingFragment, name) {
				Some(id) => ids.push(id.clone()),
				None => missing.push(MissingRef::new(EntityKind::DataSharingFragment, name)),
			}
		}
		if !missing.is_empty() {
			return Ok(BuildOutcome::Deferred(Self::deferred(entity, missing)));
		}

		entity
			.attributes_mut()
			.insert("fragments".to_string(), Value::Array(ids));

		Ok(self.try_create(entity, collection).await)
	}

	async fn build_org_template(
		&self,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		let mut entity = Entity::new(EntityKind::OrgTemplate, natural_key, attributes);

		let mut missing = Vec::new();
		let org_id = self.resolve_ref(&entity, "org", EntityKind::Organization, &mut missing)?;
		let template_id =
			self.resolve_ref(&entity, "template", EntityKind::DataSharingTemplate, &mut missing)?;
		let (Some(org_id), Some(template_id)) = (org_id, template_id) else {
			return Ok(BuildOutcome::Deferred(Self::deferred(entity, missing)));
		};

		let resource = EntityKind::OrgTemplate
			.collection()
			.replace("{org}", &id_segment(&org_id));
		entity.attributes_mut().insert("org".to_string(), org_id);
		entity
			.attributes_mut()
			.insert("template".to_string(), template_id);

		if self.try_adopt(&mut entity, &resource).await {
			return Ok(BuildOutcome::Adopted(entity));
		}

		Ok(self.try_create(entity, &resource).await)
	}

	async fn build_org_agreement(
		&self,
		natural_key: String,
		attributes: Record,
	) -> Result<BuildOutcome, LoadError> {
		let mut entity = Entity::new(EntityKind::OrgAgreement, natural_key, attributes);

		let mut missing = Vec::new();
		let producer_id =
			self.resolve_ref(&entity, "producer", EntityKind::Organization, &mut missing)?;
		let consumer_id =
			self.resolve_ref(&entity, "consumer", EntityKind::Organization, &mut missing)?;
		let template_id =
			self.resolve_ref(&entity, "template", EntityKind::OrgTemplate, &mut missing)?;
		let (Some(producer_id), Some(consumer_id), Some(template_id)) =
			(producer_id, consumer_id, template_id)
		else {
			return Ok(BuildOutcome::Deferred(Self::deferred(entity, missing)));
		};

		let resource = EntityKind::OrgAgreement
			.collection()
			.replace("{org}", &id_segment(&producer_id));
		entity.attributes_mut().insert("producer".to_string(), producer_id);
		entity.attributes_mut().insert("consumer".to_string(), consumer_id);
		entity.attributes_mut().insert("template".to_string(), template_id);

		if self.try_adopt(&mut entity, &resource).await {
			return Ok(BuildOutcome::Adopted(entity));
		}

		Ok(self.try_create(entity, &resource).await)
	}

	/// Scan `collection` for a remote record with this entity's natural key
	/// and merge it in on a hit. A transport failure during the scan is
	/// treated as a miss; the create call that follows decides the outcome.
	async fn try_adopt(&self, entity: &mut Entity, collection: &str) -> bool {
		let field = entity.kind().name_field();
		match self.api.search(collection, field, entity.natural_key()).await {
			Ok(Some(remote)) => {
				entity.adopt(remote);
				info!("Adopted existing {}", entity);
				true
			}
			Ok(None) => false,
			Err(e) => {
				warn!(
					"Adoption scan of {} for \"{}\" failed, assuming no remote record: {}",
					collection,
					entity.natural_key(),
					e
				);
				false
			}
		}
	}

	/// Issue the create call for a fully resolved entity.
	async fn try_create(&self, mut entity: Entity, resource: &str) -> BuildOutcome {
		let payload = Value::Object(entity.attributes().clone());
		match self.api.create(resource, &payload).await {
			Ok(remote) => {
				entity.mark_created(remote);
				info!("Created new {}", entity);
				BuildOutcome::Created(entity)
			}
			Err(e) => {
				match &e {
					ApiError::Request { detail, .. } => {
						error!(
							"Could not create {} \"{}\": server response: {}",
							entity.kind(),
							entity.natural_key(),
							detail
						);
					}
					other => {
						error!(
							"Could not create {} \"{}\": {}",
							entity.kind(),
							entity.natural_key(),
							other
						);
					}
				}
				BuildOutcome::Failed(e)
			}
		}
	}

	/// Resolve one natural-key reference field through the repository.
	///
	/// A repository miss records a [`MissingRef`] and yields `None`; a
	/// missing or non-string field is a malformed record.
	fn resolve_ref(
		&self,
		entity: &Entity,
		field: &str,
		kind: EntityKind,
		missing: &mut Vec<MissingRef>,
	) -> Result<Option<Value>, LoadError> {
		let name = entity
			.attributes()
			.get(field)
			.and_then(Value::as_str)
			.ok_or_else(|| {
				LoadError::Document(format!(
					"{} \"{}\": expected a {} name in field `{}`",
					entity.kind(),
					entity.natural_key(),
					kind,
					field
				))
			})?;

		match self.repo.remote_id(kind, name) {
			Some(id) => Ok(Some(id.clone())),
			None => {
				missing.push(MissingRef::new(kind, name));
				Ok(None)
			}
		}
	}

	fn deferred(entity: Entity, missing: Vec<MissingRef>) -> DeferredEntity {
		let deferred = DeferredEntity {
			kind: entity.kind(),
			natural_key: entity.natural_key().to_string(),
			missing,
		};
		debug!("Deferring {}", deferred);
		deferred
	}
}

/// Render a remote id for use as a path segment.
fn id_segment(id: &Value) -> String {
	match id {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Read a list of natural-key references from `field`.
fn ref_list(entity: &Entity, field: &str) -> Result<Vec<String>, LoadError> {
	let malformed = || {
		LoadError::Document(format!(
			"{} \"{}\": expected a list of names in field `{}`",
			entity.kind(),
			entity.natural_key(),
			field
		))
	};

	entity
		.attributes()
		.get(field)
		.and_then(Value::as_array)
		.ok_or_else(&malformed)?
		.iter()
		.map(|v| v.as_str().map(str::to_string).ok_or_else(&malformed))
		.collect()
}
