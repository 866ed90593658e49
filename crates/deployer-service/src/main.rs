//! Main entry point for the deployment signer.
//!
//! Signs the deterministic deployment requests of every proxy kind for one
//! chain id and merges the signatures into the per-kind stores under the
//! deterministic config directory.

use clap::Parser;
use deployer_config::Config;
use deployer_core::{DeployerFactories, EngineBuilder, FlowOutcome, RunReport, SigningEngine};
use deployer_types::{truncate_hex, ChainId};
use std::path::{Path, PathBuf};

// Import implementations from individual crates
use deployer_account::implementations::local::create_account;
use deployer_storage::implementations::file::create_storage as create_file_storage;
use deployer_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the deployment signer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Chain id to sign deployments for
	#[arg(value_parser = clap::value_parser!(u64).range(1..))]
	chain_id: ChainId,

	/// Path to configuration file
	#[arg(short, long, default_value = "deployer.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		config = %args.config.display(),
		root = %config.deployer.root.display(),
		"Loaded configuration"
	);

	let engine = build_engine(config).await?;
	match engine.run(args.chain_id).await {
		Ok(report) => {
			log_report(&report);
			Ok(())
		},
		Err(e) => {
			log_report(&e.report);
			Err(e.into())
		},
	}
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Variant for factories that take the deterministic config directory
    ($interface:path, $error:path, path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value, &Path) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the signing engine with every available implementation registered.
async fn build_engine(config: Config) -> Result<SigningEngine, Box<dyn std::error::Error>> {
	let builder = EngineBuilder::new(config);

	let storage_factories = create_factory_map!(
		deployer_storage::StorageInterface,
		deployer_storage::StorageError,
		path,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let account_factories = create_factory_map!(
		deployer_account::AccountInterface,
		deployer_account::AccountError,
		"local" => create_account,
	);

	let factories = DeployerFactories {
		storage_factories,
		account_factories,
	};

	Ok(builder.build(factories).await?)
}

fn log_report(report: &RunReport) {
	for (proxy_kind, outcome) in report.flows() {
		match outcome {
			FlowOutcome::Signed { signature, entries } => tracing::info!(
				chain_id = report.chain_id(),
				proxy_kind = %proxy_kind,
				signature = %truncate_hex(signature.as_str()),
				entries,
				"Signed"
			),
			FlowOutcome::Skipped(miss) => tracing::info!(
				chain_id = report.chain_id(),
				proxy_kind = %proxy_kind,
				reason = ?miss,
				"Skipped"
			),
		}
	}
	let states: Vec<String> = report.states().iter().map(|s| s.to_string()).collect();
	tracing::debug!(chain_id = report.chain_id(), states = %states.join(" -> "), "Run states");
}
