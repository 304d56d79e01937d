//! In-memory repository of resolved entities.
//!
//! The repository maps `(kind, natural key)` to the resolved [`Entity`] and
//! serves two purposes: it marks which declared records have already been
//! processed, and it translates natural-key references into remote ids. A
//! lookup miss is a routine signal (the dependency is not available yet), not
//! an error. Entries are never replaced or removed for the lifetime of a run.

use super::entity::{Entity, EntityKind, EntityState};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct EntityRepository {
	entities: HashMap<(EntityKind, String), Entity>,
}

impl EntityRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn exists(&self, kind: EntityKind, name: &str) -> bool {
		self.entities.contains_key(&(kind, name.to_string()))
	}

	/// Look up a resolved entity. `None` means "not yet available".
	pub fn get(&self, kind: EntityKind, name: &str) -> Option<&Entity> {
		self.entities.get(&(kind, name.to_string()))
	}

	/// The remote id of a resolved entity, if it has one.
	///
	/// An entity whose create call failed is never added here, so `None`
	/// covers both "not processed yet" and "processed but unusable".
	pub fn remote_id(&self, kind: EntityKind, name: &str) -> Option<&Value> {
		self.get(kind, name).and_then(Entity::remote_id)
	}

	/// Insert a resolved entity. The caller must have verified non-existence;
	/// the walker's dispatch guarantees a single insertion attempt per key.
	pub fn add(&mut self, entity: Entity) {
		debug!("{} \"{}\" added to repository", entity.kind(), entity.natural_key());
		self.entities
			.insert((entity.kind(), entity.natural_key().to_string()), entity);
	}

	/// Number of resolved entities currently in the given state.
	pub fn count_in_state(&self, state: EntityState) -> usize {
		self.entities.values().filter(|e| e.state() == state).count()
	}
}
