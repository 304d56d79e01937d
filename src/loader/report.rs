//! End-of-run reporting for the load scheduler.
//!
//! Sources still pending when the pass bound is reached are not silently
//! dropped: every entity left unresolved is reported, annotated with the
//! references that never became available, so operators can tell "declared
//! nowhere" apart from "dependency chain too deep for the bound".

use super::deferral::{DeferredEntity, MissingRef};
use super::entity::{EntityKind, EntityState};
use super::repository::EntityRepository;
use tracing::{info, warn};

/// One entity that exhausted the retry bound without resolving.
#[derive(Debug, Clone)]
pub struct UnresolvedEntity {
	pub kind: EntityKind,
	pub name: String,
	/// Which document declared it.
	pub source: String,
	pub missing: Vec<MissingRef>,
}

impl UnresolvedEntity {
	pub fn from_deferred(source: &str, deferred: DeferredEntity) -> Self {
		Self {
			kind: deferred.kind,
			name: deferred.natural_key,
			source: source.to_string(),
			missing: deferred.missing,
		}
	}
}

/// Summary of one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
	/// Passes actually executed.
	pub passes_run: usize,
	/// Entities adopted from pre-existing remote records.
	pub adopted: usize,
	/// Entities created remotely during this run.
	pub created: usize,
	/// Entities still unresolved when the pass bound was reached.
	pub unresolved: Vec<UnresolvedEntity>,
}

impl RunReport {
	pub fn new(passes_run: usize, repo: &EntityRepository) -> Self {
		Self {
			passes_run,
			adopted: repo.count_in_state(EntityState::Adopted),
			created: repo.count_in_state(EntityState::Created),
			unresolved: Vec::new(),
		}
	}

	/// Record every entity a still-pending source left deferred in its final
	/// pass.
	pub fn record_pending(&mut self, source: &str, deferred: Vec<DeferredEntity>) {
		for entry in deferred {
			self.unresolved
				.push(UnresolvedEntity::from_deferred(source, entry));
		}
	}

	/// Whether every declared entity converged to `Adopted` or `Created`.
	pub fn is_complete(&self) -> bool {
		self.unresolved.is_empty()
	}

	/// One-line human-readable summary.
	pub fn summary(&self) -> String {
		format!(
			"{} {}: {} created, {} existing{}",
			self.passes_run,
			if self.passes_run == 1 { "pass" } else { "passes" },
			self.created,
			self.adopted,
			if self.unresolved.is_empty() {
				String::new()
			} else {
				format!(", {} unresolved", self.unresolved.len())
			}
		)
	}

	/// Log the report; unresolved entities each get their own warning naming
	/// the references that never resolved.
	pub fn log(&self) {
		info!("Load finished after {}", self.summary());

		for entry in &self.unresolved {
			let missing = entry
				.missing
				.iter()
				.map(MissingRef::to_string)
				.collect::<Vec<_>>()
				.join(", ");
			warn!(
				"{} \"{}\" ({}) left unresolved; missing: {}",
				entry.kind,
				entry.name,
				entry.source,
				if missing.is_empty() { "<none>" } else { missing.as_str() }
			);
		}
	}
}
