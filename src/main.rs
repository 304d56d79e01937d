mod api;
mod loader;

use api::{ApiError, ID_FIELD, RemoteApi, StatusRecord, ThingBookClient};
use clap::{Parser, Subcommand};
use loader::{DocumentSource, EntityRepository, LoadError, LoadScheduler, YamlFileSource};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "thingbook-loader", about = "Interact with a ThingBook API instance")]
struct Cli {
	/// Base URL of the ThingBook instance
	#[arg(short = 'd', long, default_value = "http://localhost:8080")]
	destination: String,

	/// Enable debug logging
	#[arg(short, long, conflicts_with = "silent")]
	verbose: bool,

	/// Only log errors
	#[arg(short, long)]
	silent: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Show the status of the remote instance
	Status,
	/// Create entities from the given YAML document(s)
	Load {
		#[arg(required = true, value_name = "YAML")]
		files: Vec<PathBuf>,
	},
	/// Inspect users
	User {
		#[command(subcommand)]
		command: ListCommand,
	},
	/// Inspect organizations
	Organization {
		#[command(subcommand)]
		command: ListCommand,
	},
}

#[derive(Subcommand)]
enum ListCommand {
	/// Retrieve a page of entities
	List {
		/// Maximum number of entities to retrieve
		#[arg(short, long, default_value_t = 10)]
		count: usize,
		/// Offset of the first entity to retrieve
		#[arg(short, long, default_value_t = 0)]
		offset: usize,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();

	let level = if cli.verbose {
		tracing::Level::DEBUG
	} else if cli.silent {
		tracing::Level::ERROR
	} else {
		tracing::Level::INFO
	};

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
		)
		.with_target(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let client = ThingBookClient::new(cli.destination.clone());

	if let Err(e) = run(cli.command, &client).await {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(command: Command, client: &ThingBookClient) -> Result<(), LoadError> {
	match command {
		Command::Status => {
			let record = client.get("status").await?;
			let status: StatusRecord =
				serde_json::from_value(Value::Object(record)).map_err(ApiError::Json)?;
			println!(
				"{}/{}: {} (as of {})",
				status.name,
				status.version,
				status.status,
				chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
			);
		}
		Command::Load { files } => {
			let sources: Vec<Box<dyn DocumentSource>> = files
				.into_iter()
				.map(|path| Box::new(YamlFileSource::new(path)) as Box<dyn DocumentSource>)
				.collect();

			info!("Loading {} document(s)", sources.len());
			let mut repo = EntityRepository::new();
			let report = LoadScheduler::new(client).run(&mut repo, &sources).await?;
			println!("{}", report.summary());
		}
		Command::User { command } => list(client, "user", command).await?,
		Command::Organization { command } => list(client, "organization", command).await?,
	}

	Ok(())
}

async fn list(
	client: &ThingBookClient,
	resource: &str,
	command: ListCommand,
) -> Result<(), LoadError> {
	let ListCommand::List { count, offset } = command;
	let records = client.list(resource, count, offset).await?;

	println!("{} {}", records.len(), resource);
	for record in &records {
		let id = match record.get(ID_FIELD) {
			Some(Value::String(s)) => s.clone(),
			Some(other) => other.to_string(),
			None => "?".to_string(),
		};
		let name = record
			.get("name")
			.or_else(|| record.get("email"))
			.and_then(Value::as_str)
			.unwrap_or("<unknown>");
		println!("{:>4}: {}", id, name);
	}

	Ok(())
}
