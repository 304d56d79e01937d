//! Document sources consumed by the scheduler.
//!
//! A source is re-read from scratch on every pass: entities already resolved
//! are skipped through the repository, so re-parsing is the simplest way to
//! retry only what is still pending.

use super::LoadError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// A declarative document the scheduler can re-read on each pass.
#[async_trait]
pub trait DocumentSource: Send + Sync {
	/// Human-readable identity of this source, used in logs and the report.
	fn label(&self) -> String;

	/// Read and parse the document. Called once per pass.
	async fn read(&self) -> Result<Value, LoadError>;
}

/// A document stored as a YAML file on disk.
pub struct YamlFileSource {
	path: PathBuf,
}

impl YamlFileSource {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}
}

#[async_trait]
impl DocumentSource for YamlFileSource {
	fn label(&self) -> String {
		self.path.display().to_string()
	}

	async fn read(&self) -> Result<Value, LoadError> {
		let text = tokio::fs::read_to_string(&self.path).await?;
		Ok(serde_yaml::from_str(&text)?)
	}
}
