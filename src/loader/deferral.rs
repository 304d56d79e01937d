//! Deferral signal for entities whose dependencies are not yet available.
//!
//! A deferral is recoverable by construction: the scheduler simply retries
//! the whole document on a later pass, once other documents (or earlier keys
//! of the same document) may have resolved the missing references. It is a
//! collector, not a hard failure.

use super::entity::EntityKind;
use std::fmt;

/// A natural-key reference that did not resolve through the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRef {
	pub kind: EntityKind,
	pub name: String,
}

impl MissingRef {
	pub fn new(kind: EntityKind, name: &str) -> Self {
		Self {
			kind,
			name: name.to_string(),
		}
	}
}

impl fmt::Display for MissingRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} \"{}\"", self.kind, self.name)
	}
}

/// One entity whose construction was deferred, annotated with every
/// unresolved reference found before giving up.
#[derive(Debug, Clone)]
pub struct DeferredEntity {
	pub kind: EntityKind,
	pub natural_key: String,
	pub missing: Vec<MissingRef>,
}

impl fmt::Display for DeferredEntity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} \"{}\" awaiting", self.kind, self.natural_key)?;
		for (i, missing) in self.missing.iter().enumerate() {
			write!(f, "{} {}", if i == 0 { "" } else { "," }, missing)?;
		}
		Ok(())
	}
}

/// Batch-scoped collection of deferred entities.
///
/// Absorbing another set flattens its contents; no nesting is retained. An
/// empty set means the pass fully succeeded.
#[derive(Debug, Clone, Default)]
pub struct DeferralSet {
	deferred: Vec<DeferredEntity>,
}

impl DeferralSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, entity: DeferredEntity) {
		self.deferred.push(entity);
	}

	pub fn absorb(&mut self, other: DeferralSet) {
		self.deferred.extend(other.deferred);
	}

	pub fn is_empty(&self) -> bool {
		self.deferred.is_empty()
	}

	pub fn len(&self) -> usize {
		self.deferred.len()
	}

	pub fn into_entries(self) -> Vec<DeferredEntity> {
		self.deferred
	}
}
