//! Quiver CLI: command-line front end for the artifact registry.

mod commands;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use quiver_registry::query::SortField;
use quiver_registry::{ArtifactKind, Orchestrator, RegistryConfig, RegistryError};
use tracing_subscriber::EnvFilter;

use output::Output;

#[derive(Parser)]
#[command(name = "quiver", version, about = "Quiver artifact registry")]
struct Cli {
    /// Directory to start searching for quiver.toml (default: current directory)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 signing key pair
    Keygen {
        /// Write the private key to this file
        #[arg(long)]
        out: PathBuf,
    },
    /// Register an artifact (or a batch) from a JSON file
    Register {
        /// JSON artifact draft, or an array of drafts
        file: PathBuf,
    },
    /// Query artifacts, across all kinds unless --kind is given
    #[command(alias = "search")]
    Query {
        /// Case-insensitive text matched against names and descriptions
        text: Option<String>,
        #[arg(long)]
        kind: Option<ArtifactKind>,
        /// Namespace (matches descendants too)
        #[arg(long)]
        namespace: Option<String>,
        /// Required tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only published (true) or unpublished (false) artifacts
        #[arg(long)]
        published: Option<bool>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        /// Sort field (name, version, created-at, updated-at, downloads)
        #[arg(long, value_parser = commands::parse_sort_field)]
        sort: Option<SortField>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },
    /// Show one artifact
    Get { kind: ArtifactKind, id: String },
    /// Sign an artifact's content hash
    Sign {
        kind: ArtifactKind,
        id: String,
        /// Private key file written by `quiver keygen`
        #[arg(long)]
        key: PathBuf,
    },
    /// Publish an artifact
    Publish { kind: ArtifactKind, id: String },
    /// Mark an artifact deprecated
    Deprecate {
        kind: ArtifactKind,
        id: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Validate an artifact draft or record without registering it
    Validate { file: PathBuf },
    /// Resolve version requirements (name=requirement) against the registry
    Resolve {
        /// Requirements such as `geo=^1.2` or `auth`
        #[arg(required = true)]
        requirements: Vec<String>,
        /// Print the flat lock list instead of the tree
        #[arg(long)]
        lock: bool,
        /// Root line of the tree, as `name@version`
        #[arg(long, default_value = "root@0.0.0")]
        root: String,
    },
    /// Show what an artifact depends on and what depends on it
    Deps { kind: ArtifactKind, id: String },
    /// Per-kind counts by namespace and version
    Stats,
    /// Sub-registry health
    Health,
    /// Dump every artifact as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a dump written by `quiver export`, skipping bad entries
    Import { file: PathBuf },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit status for an error: the registry error kind's code when the
/// root cause is a registry error, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RegistryError>())
        .map(|e| e.kind().exit_code())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        process::exit(exit_code(&e));
    }
}

async fn open(start: Option<PathBuf>) -> anyhow::Result<Orchestrator> {
    let start = match start {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let (config, base) = match RegistryConfig::find_and_load(&start)? {
        Some((config, dir)) => {
            tracing::debug!(dir = %dir.display(), "loaded quiver.toml");
            (config, dir)
        }
        None => {
            tracing::debug!(dir = %start.display(), "no quiver.toml found, using defaults");
            (RegistryConfig::default(), start)
        }
    };
    let orchestrator = Orchestrator::from_config(&config, &base)?;
    orchestrator.initialize().await?;
    Ok(orchestrator)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output::new(cli.json);
    match cli.command {
        Commands::Keygen { out: path } => commands::keys::keygen(&path, &out),
        command => {
            let orch = open(cli.registry).await?;
            dispatch(&orch, command, &out).await
        }
    }
}

async fn dispatch(orch: &Orchestrator, command: Commands, out: &Output) -> anyhow::Result<()> {
    match command {
        Commands::Keygen { out: path } => commands::keys::keygen(&path, out),
        Commands::Register { file } => commands::artifacts::register(orch, &file, out).await,
        Commands::Query {
            text,
            kind,
            namespace,
            tags,
            published,
            offset,
            limit,
            sort,
            desc,
        } => {
            let filter = commands::artifacts::build_filter(
                text, kind, namespace, tags, published, offset, limit, sort, desc,
            );
            commands::artifacts::query(orch, &filter, out).await
        }
        Commands::Get { kind, id } => commands::artifacts::get(orch, kind, &id, out).await,
        Commands::Validate { file } => commands::artifacts::validate(orch, &file, out).await,
        Commands::Sign { kind, id, key } => {
            commands::lifecycle::sign(orch, kind, &id, &key, out).await
        }
        Commands::Publish { kind, id } => commands::lifecycle::publish(orch, kind, &id, out).await,
        Commands::Deprecate { kind, id, message } => {
            commands::lifecycle::deprecate(orch, kind, &id, message, out).await
        }
        Commands::Resolve {
            requirements,
            lock,
            root,
        } => commands::graph::resolve(orch, &requirements, lock, &root, out).await,
        Commands::Deps { kind, id } => commands::graph::deps(orch, kind, &id, out).await,
        Commands::Stats => commands::report::stats(orch, out).await,
        Commands::Health => commands::report::health(orch, out).await,
        Commands::Export { out: path } => {
            commands::transfer::export(orch, path.as_deref(), out).await
        }
        Commands::Import { file } => commands::transfer::import(orch, &file, out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_code_follows_registry_error_kind() {
        let err = anyhow::Error::new(RegistryError::NotFound { id: "x".into() })
            .context("loading artifact");
        assert_eq!(exit_code(&err), 13);
        assert_eq!(exit_code(&anyhow::anyhow!("plain failure")), 1);
    }

    #[test]
    fn search_alias() {
        let cli = Cli::try_parse_from(["quiver", "search", "geo", "--kind", "data", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Query { text, kind, .. } => {
                assert_eq!(text.as_deref(), Some("geo"));
                assert_eq!(kind, Some(ArtifactKind::Data));
            }
            _ => panic!("expected query"),
        }
    }

    #[tokio::test]
    async fn register_then_get_through_the_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quiver.toml"), "[store]\nroot = \"store\"\n").unwrap();
        let draft = dir.path().join("events.json");
        std::fs::write(
            &draft,
            r#"{
                "name": "events",
                "version": "1.0.0",
                "namespace": "global/analytics",
                "metadata": { "kind": "data", "spec": { "format": "parquet" } }
            }"#,
        )
        .unwrap();

        let out = Output::new(true);
        let orch = open(Some(dir.path().to_path_buf())).await.unwrap();
        commands::artifacts::register(&orch, &draft, &out).await.unwrap();

        let reopened = open(Some(dir.path().to_path_buf())).await.unwrap();
        let id = ArtifactKind::Data.stable_id("global/analytics", "events", "1.0.0");
        assert!(reopened.get(ArtifactKind::Data, &id).await.unwrap().is_some());
        assert!(dir.path().join("store").is_dir());
    }
}
