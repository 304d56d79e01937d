//! Entity kinds and the in-memory entity representation.

use crate::api::{ID_FIELD, Record};
use serde_json::Value;
use std::fmt;

/// The closed set of entity kinds a document may declare.
///
/// Each kind carries its document key, the collection it is listed under, and
/// the field holding its natural key. Dependencies between kinds are fixed
/// (see [`EntityBuilder`](super::builder::EntityBuilder)), never data-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
	User,
	Organization,
	DataSharingFragment,
	DataSharingTemplate,
	OrgTemplate,
	OrgAgreement,
}

impl EntityKind {
	/// All kinds, in dependency-friendly order. Used for reporting only; the
	/// engine never relies on this order for correctness.
	pub const ALL: [EntityKind; 6] = [
		EntityKind::User,
		EntityKind::Organization,
		EntityKind::DataSharingFragment,
		EntityKind::DataSharingTemplate,
		EntityKind::OrgTemplate,
		EntityKind::OrgAgreement,
	];

	/// The key under which documents declare records of this kind.
	pub fn document_key(self) -> &'static str {
		match self {
			EntityKind::User => "user",
			EntityKind::Organization => "organization",
			EntityKind::DataSharingFragment => "ds-fragment",
			EntityKind::DataSharingTemplate => "ds-template",
			EntityKind::OrgTemplate => "org-template",
			EntityKind::OrgAgreement => "org-agreement",
		}
	}

	/// Reverse of [`document_key`](Self::document_key); `None` for keys used
	/// as namespacing with no entity semantics.
	pub fn from_document_key(key: &str) -> Option<Self> {
		EntityKind::ALL
			.into_iter()
			.find(|kind| kind.document_key() == key)
	}

	/// The collection this kind is listed under. For the organization-scoped
	/// kinds the returned path contains an `{org}` placeholder which the
	/// builder fills in with the owning organization's remote id.
	pub fn collection(self) -> &'static str {
		match self {
			EntityKind::User => "user",
			EntityKind::Organization => "organization",
			EntityKind::DataSharingFragment => "data-sharing/fragment",
			EntityKind::DataSharingTemplate => "data-sharing/template",
			EntityKind::OrgTemplate => "organization/{org}/template",
			EntityKind::OrgAgreement => "organization/{org}/agreement",
		}
	}

	/// The record field holding this kind's natural key.
	pub fn name_field(self) -> &'static str {
		match self {
			EntityKind::User => "email",
			_ => "name",
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.document_key())
	}
}

/// Resolution state of an entity within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
	/// Declared but not yet synchronized with the remote instance.
	Unresolved,
	/// A pre-existing remote record with the same natural key was reused.
	Adopted,
	/// Created remotely during this run.
	Created,
}

/// One declared record of a given kind, together with its resolution state.
///
/// Attributes are owned by the entity and mutated in place as dependency
/// references are replaced by resolved remote ids and as remote records are
/// merged in.
#[derive(Debug, Clone)]
pub struct Entity {
	kind: EntityKind,
	natural_key: String,
	attributes: Record,
	state: EntityState,
}

impl Entity {
	pub fn new(kind: EntityKind, natural_key: String, attributes: Record) -> Self {
		Self {
			kind,
			natural_key,
			attributes,
			state: EntityState::Unresolved,
		}
	}

	pub fn kind(&self) -> EntityKind {
		self.kind
	}

	/// The name (email, for users) this entity is referenced by.
	pub fn natural_key(&self) -> &str {
		&self.natural_key
	}

	pub fn state(&self) -> EntityState {
		self.state
	}

	pub fn attributes(&self) -> &Record {
		&self.attributes
	}

	pub fn attributes_mut(&mut self) -> &mut Record {
		&mut self.attributes
	}

	/// The server-assigned id, once adopted or created.
	pub fn remote_id(&self) -> Option<&Value> {
		self.attributes.get(ID_FIELD)
	}

	/// Merge a remote record into the attributes and mark the entity adopted.
	pub fn adopt(&mut self, remote: Record) {
		self.attributes.extend(remote);
		self.state = EntityState::Adopted;
	}

	/// Merge the create response into the attributes and mark the entity
	/// created.
	pub fn mark_created(&mut self, remote: Record) {
		self.attributes.extend(remote);
		self.state = EntityState::Created;
	}
}

impl fmt::Display for Entity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let id = match self.remote_id() {
			Some(Value::String(s)) => s.clone(),
			Some(other) => other.to_string(),
			None => "<no id>".to_string(),
		};
		write!(f, "{}: {} ({})", self.kind, id, self.natural_key)
	}
}
