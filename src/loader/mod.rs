//! Dependency-deferred loading engine
//!
//! This module contains the core logic for bulk-loading interrelated records
//! into a ThingBook instance from declarative documents. It is composed of
//! several submodules, each responsible for one aspect of the process:
//!
//! - `entity`: the closed set of entity kinds and the in-memory entity representation.
//! - `repository`: the name-keyed cache of resolved entities, used both for
//!   deduplication and for translating natural-key references into remote ids.
//! - `builder`: per-entity synchronization, adopting existing remote records or
//!   creating new ones after resolving dependency references.
//! - `deferral`: the recoverable "dependency not yet available" signal.
//! - `walker`: the recursive visit over one nested document.
//! - `source`: re-readable document sources (YAML files, in-memory documents).
//! - `scheduler`: the bounded retry loop converging all documents toward a
//!   valid creation order.
//! - `report`: the end-of-run summary of what was created, adopted, or left
//!   unresolved.
//!
//! Execution is strictly sequential; the repository is the only shared
//! mutable state and is touched by a single control flow.

/// Per-entity adopt-or-create logic
pub mod builder;
/// Deferral signal and aggregation
pub mod deferral;
/// Entity kinds and representation
pub mod entity;
/// End-of-run reporting
pub mod report;
/// Name-keyed cache of resolved entities
pub mod repository;
/// Bounded retry loop over pending documents
pub mod scheduler;
/// Re-readable document sources
pub mod source;
/// Recursive document visitor
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use report::RunReport;
pub use repository::EntityRepository;
pub use scheduler::LoadScheduler;
pub use source::{DocumentSource, YamlFileSource};

use crate::api::ApiError;

/// Errors that abort a load run.
///
/// Dependency misses never appear here; they are deferrals, handled by the
/// scheduler. Remote rejections of individual creates are logged and drop
/// the affected entity without aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("API error: {0}")]
	Api(#[from] ApiError),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("YAML parse error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("malformed document: {0}")]
	Document(String),
}
