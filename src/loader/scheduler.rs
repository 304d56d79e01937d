//! Bounded retry scheduler for document loading.
//!
//! The scheduler discovers an admissible creation order without building a
//! dependency graph: it simply re-runs the walker over every still-pending
//! document, up to a fixed pass bound. Each pass can only resolve references
//! one level deeper than the previous one, so a bound of three passes covers
//! the maximum dependency depth of the entity kinds. A document leaves the
//! pending set after a deferral-free pass; whatever is still pending when the
//! bound is reached ends up in the run report.

use super::LoadError;
use super::deferral::DeferredEntity;
use super::report::RunReport;
use super::repository::EntityRepository;
use super::source::DocumentSource;
use super::walker::DocumentWalker;
use crate::api::RemoteApi;
use tracing::{debug, info};

/// Upper bound on full passes over the pending documents.
pub const MAX_PASSES: usize = 3;

struct PendingSource<'s> {
	source: &'s dyn DocumentSource,
	/// Deferrals from this source's most recent pass.
	deferred: Vec<DeferredEntity>,
}

/// Drives up to [`MAX_PASSES`] passes over a set of document sources.
pub struct LoadScheduler<'a> {
	api: &'a dyn RemoteApi,
	max_passes: usize,
}

impl<'a> LoadScheduler<'a> {
	pub fn new(api: &'a dyn RemoteApi) -> Self {
		Self {
			api,
			max_passes: MAX_PASSES,
		}
	}

	/// Process every source to convergence or the pass bound, whichever
	/// comes first. Sources are re-read on every pass; entities already in
	/// the repository are skipped, so no duplicate work is done.
	pub async fn run(
		&self,
		repo: &mut EntityRepository,
		sources: &[Box<dyn DocumentSource>],
	) -> Result<RunReport, LoadError> {
		let mut pending: Vec<PendingSource> = sources
			.iter()
			.map(|source| PendingSource {
				source: source.as_ref(),
				deferred: Vec::new(),
			})
			.collect();

		let mut passes_run = 0;
		for pass in 1..=self.max_passes {
			if pending.is_empty() {
				break;
			}
			passes_run = pass;

			let mut still_pending = Vec::new();
			for mut entry in pending {
				let label = entry.source.label();
				info!(
					"{} document: {}",
					if pass == 1 { "Processing" } else { "Reprocessing" },
					label
				);

				let document = entry.source.read().await?;
				let deferrals = DocumentWalker::new(self.api, repo).walk(&document).await?;

				if deferrals.is_empty() {
					debug!("Document {} completed on pass {}", label, pass);
				} else {
					info!(
						"Document {}: {} record(s) deferred on pass {}",
						label,
						deferrals.len(),
						pass
					);
					entry.deferred = deferrals.into_entries();
					still_pending.push(entry);
				}
			}
			pending = still_pending;
		}

		let mut report = RunReport::new(passes_run, repo);
		for entry in pending {
			report.record_pending(&entry.source.label(), entry.deferred);
		}
		report.log();

		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::entity::{EntityKind, EntityState};
	use crate::loader::testing::{FakeRemote, MemorySource, record, sources};
	use serde_json::json;

	#[tokio::test]
	async fn user_and_organization_split_across_documents_converge_in_two_passes() {
		let api = FakeRemote::new();
		let mut repo = EntityRepository::new();

		// The organization's document comes first, so its user reference
		// cannot resolve until the second pass.
		let docs = sources(vec![
			MemorySource::new(
				"organizations.yml",
				json!({ "organization": [{ "name": "Org1", "user": "a@x.com" }] }),
			),
			MemorySource::new("users.yml", json!({ "user": [{ "name": "a@x.com" }] })),
		]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(report.is_complete());
		assert_eq!(report.passes_run, 2);
		assert_eq!(report.created, 2);

		let org = repo.get(EntityKind::Organization, "Org1").unwrap();
		assert_eq!(org.state(), EntityState::Created);
		let user_id = repo.remote_id(EntityKind::User, "a@x.com").unwrap();
		assert_eq!(org.attributes().get("user"), Some(user_id));
	}

	#[tokio::test]
	async fn agreement_declared_ahead_of_its_chain_converges_by_the_bound() {
		let api = FakeRemote::new();
		let mut repo = EntityRepository::new();

		// The agreement and its template are declared before everything they
		// reference; the deepest chain needs exactly three passes.
		let docs = sources(vec![MemorySource::new(
			"agreement.yml",
			json!({
				"org-agreement": [{
					"name": "Agreement1",
					"producer": "Org1",
					"consumer": "Org2",
					"template": "OrgTemplate1",
				}],
				"org-template": [{
					"name": "OrgTemplate1",
					"org": "Org1",
					"template": "Template1",
				}],
				"user": [{ "name": "a@x.com" }, { "name": "b@x.com" }],
				"organization": [
					{ "name": "Org1", "user": "a@x.com" },
					{ "name": "Org2", "user": "b@x.com" },
				],
				"ds-fragment": [{ "name": "Fragment1" }],
				"ds-template": [{ "name": "Template1", "fragments": ["Fragment1"] }],
			}),
		)]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(report.is_complete());
		assert_eq!(report.passes_run, 3);
		assert_eq!(report.created, 8);

		let agreement = repo.get(EntityKind::OrgAgreement, "Agreement1").unwrap();
		assert_eq!(agreement.state(), EntityState::Created);
		let producer_id = repo.remote_id(EntityKind::Organization, "Org1").unwrap();
		assert_eq!(agreement.attributes().get("producer"), Some(producer_id));

		// The agreement was created under its producer's sub-resource.
		let producer_segment = producer_id.as_str().unwrap();
		assert!(
			api.create_log()
				.contains(&format!("organization/{}/agreement", producer_segment))
		);
	}

	#[tokio::test]
	async fn dangling_reference_is_reported_unresolved_after_the_final_pass() {
		let api = FakeRemote::new();
		let mut repo = EntityRepository::new();

		let docs = sources(vec![MemorySource::new(
			"agreement.yml",
			json!({
				"user": [{ "name": "a@x.com" }, { "name": "b@x.com" }],
				"organization": [
					{ "name": "Org1", "user": "a@x.com" },
					{ "name": "Org2", "user": "b@x.com" },
				],
				"org-agreement": [{
					"name": "Agreement1",
					"producer": "Org1",
					"consumer": "Org2",
					"template": "Phantom",
				}],
			}),
		)]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(!report.is_complete());
		assert_eq!(report.passes_run, 3);
		assert_eq!(report.unresolved.len(), 1);

		let entry = &report.unresolved[0];
		assert_eq!(entry.kind, EntityKind::OrgAgreement);
		assert_eq!(entry.name, "Agreement1");
		assert_eq!(entry.missing.len(), 1);
		assert_eq!(entry.missing[0].kind, EntityKind::OrgTemplate);
		assert_eq!(entry.missing[0].name, "Phantom");

		// Siblings with satisfied dependencies still converged.
		assert_eq!(report.created, 4);
	}

	#[tokio::test]
	async fn a_key_shared_across_documents_is_created_exactly_once() {
		let api = FakeRemote::new();
		let mut repo = EntityRepository::new();

		let fragment_doc = json!({ "ds-fragment": [{ "name": "Fragment1" }] });
		let docs = sources(vec![
			MemorySource::new("one.yml", fragment_doc.clone()),
			MemorySource::new("two.yml", fragment_doc),
		]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(report.is_complete());
		assert_eq!(report.created, 1);
		assert_eq!(api.create_log(), vec!["data-sharing/fragment"]);
	}

	#[tokio::test]
	async fn remotely_seeded_entities_are_adopted_and_satisfy_dependents() {
		let api = FakeRemote::new();
		api.seed("user", record(&[("_id", json!("17")), ("email", json!("a@x.com"))]));
		let mut repo = EntityRepository::new();

		let docs = sources(vec![MemorySource::new(
			"load.yml",
			json!({
				"user": [{ "name": "a@x.com" }],
				"organization": [{ "name": "Org1", "user": "a@x.com" }],
			}),
		)]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(report.is_complete());
		assert_eq!(report.passes_run, 1);
		assert_eq!(report.adopted, 1);
		assert_eq!(report.created, 1);
		// No create for the pre-existing user; the organization resolved
		// against the adopted record's id.
		assert_eq!(api.create_log(), vec!["user/17/organization"]);
	}

	#[tokio::test]
	async fn failed_creates_keep_dependents_deferring_until_the_bound() {
		let api = FakeRemote::new();
		api.reject_creates(500, "database unavailable");
		let mut repo = EntityRepository::new();

		let docs = sources(vec![MemorySource::new(
			"load.yml",
			json!({
				"user": [{ "name": "a@x.com" }],
				"organization": [{ "name": "Org1", "user": "a@x.com" }],
			}),
		)]);

		let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();

		assert!(!report.is_complete());
		assert_eq!(report.passes_run, 3);
		assert_eq!(report.created, 0);
		// The user's create was retried on every pass; the organization kept
		// deferring and is reported with its unmet reference.
		assert_eq!(
			api.create_log(),
			vec!["user/register", "user/register", "user/register"]
		);
		assert_eq!(report.unresolved.len(), 1);
		assert_eq!(report.unresolved[0].kind, EntityKind::Organization);
	}

	#[tokio::test]
	async fn declaration_order_does_not_change_the_converged_state() {
		let forward = json!({
			"user": [{ "name": "a@x.com" }],
			"organization": [{ "name": "Org1", "user": "a@x.com" }],
			"ds-fragment": [{ "name": "Fragment1" }],
			"ds-template": [{ "name": "Template1", "fragments": ["Fragment1"] }],
		});
		let reversed = json!({
			"ds-template": [{ "name": "Template1", "fragments": ["Fragment1"] }],
			"ds-fragment": [{ "name": "Fragment1" }],
			"organization": [{ "name": "Org1", "user": "a@x.com" }],
			"user": [{ "name": "a@x.com" }],
		});

		let mut outcomes = Vec::new();
		for document in [forward, reversed] {
			let api = FakeRemote::new();
			let mut repo = EntityRepository::new();
			let docs = sources(vec![MemorySource::new("load.yml", document)]);

			let report = LoadScheduler::new(&api).run(&mut repo, &docs).await.unwrap();
			assert!(report.is_complete());
			outcomes.push((report.created, report.adopted));
		}

		assert_eq!(outcomes[0], outcomes[1]);
		assert_eq!(outcomes[0], (4, 0));
	}
}
