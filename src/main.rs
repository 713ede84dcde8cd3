//! Persona Vault - tiered personal memory with scope-checked retrieval

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use persona_vault::{
    access::{Credentials, Scope},
    config::{resolve_api_keys_from_env, VaultConfig},
    knowledge::ApprovedKnowledge,
    lifecycle::CandidateOutcome,
    memory::JournalEntryBuilder,
    MemoryEngine,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "persona-vault")]
#[command(version)]
#[command(about = "Tiered personal memory with scope-checked retrieval")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PERSONA_VAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Validate configuration and show what each scope can reach
    Doctor,

    /// Show the vector collection layout
    Collections,

    /// Run an in-process walkthrough
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("persona_vault={}", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)?,
        None => VaultConfig::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::Doctor => {
            run_doctor(&config)?;
        }
        Commands::Collections => {
            show_collections(&config);
        }
        Commands::Demo => {
            run_demo(config).await?;
        }
    }

    Ok(())
}

fn show_config(config: Option<&VaultConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}

fn run_doctor(config: &VaultConfig) -> Result<()> {
    println!("Persona Vault Doctor");
    println!();
    println!("Environment: {}", config.environment);

    println!();
    println!("Checking configuration...");
    match config.validate() {
        Ok(()) => println!("  ✓ Configuration is valid"),
        Err(e) => {
            println!("  ✗ {}", e);
            return Ok(());
        }
    }

    println!();
    println!("Scopes:");
    let policy = config.access_policy()?;
    for scope in Scope::ALL {
        match policy.definition(scope) {
            Some(def) => {
                let tiers: Vec<&str> = def.tiers.iter().map(|t| t.as_str()).collect();
                let requires: Vec<&str> = def.requires.iter().map(String::as_str).collect();
                println!(
                    "  {:<15} tiers [{}] requires {{{}}}",
                    scope.as_str(),
                    tiers.join(", "),
                    requires.join(", ")
                );
            }
            None => println!("  {:<15} not defined (fails closed)", scope.as_str()),
        }
    }

    println!();
    println!("API keys:");
    let keys = resolve_api_keys_from_env(config);
    for (name, key_ref) in [
        ("embedding", &config.embedding.api_key_ref),
        ("vector_db", &config.storage.api_key_ref),
    ] {
        if keys.contains_key(name) {
            println!("  ✓ {} ({})", name, key_ref);
        } else {
            println!("  ℹ {} not set (${})", name, key_ref.to_uppercase());
        }
    }

    println!();
    match &config.storage.vector_db_url {
        Some(url) => println!("Vector DB: {}", url),
        None => println!("Vector DB: in-process store"),
    }

    println!();
    println!("Doctor check complete!");
    Ok(())
}

fn show_collections(config: &VaultConfig) {
    for spec in config.collection_specs() {
        println!(
            "{:<20} tier={:<8} kind={:<17} size={} distance={:?}",
            spec.name,
            spec.tier.as_str(),
            spec.kind.as_str(),
            spec.vector_size,
            spec.distance
        );
    }
}

async fn run_demo(config: VaultConfig) -> Result<()> {
    let engine = MemoryEngine::in_memory(config)?;
    let private = Credentials::new(["private_key"]);
    let restricted = Credentials::new(["restricted_key"]);
    let public = Credentials::new(["public_key"]);

    println!("Ingesting journal entries...");
    let entries = [
        (
            "Today I finally started working on my side project. It feels great to be creative.",
            false,
        ),
        ("A very private thought that should never be made public.", true),
    ];
    for (content, blocked) in entries {
        let entry = JournalEntryBuilder::new(content)
            .elevation_blocked(blocked)
            .build()?;
        let outcome = engine.ingest(&private, entry).await?;
        let state = match &outcome.candidate {
            CandidateOutcome::Created(_) => "candidate created".to_string(),
            CandidateOutcome::Blocked => "blocked from elevation".to_string(),
            CandidateOutcome::Failed(e) => format!("candidate failed: {}", e),
        };
        println!("  {} → {}", outcome.entry.id(), state);
    }

    println!();
    println!("Reviewing candidates...");
    for candidate in engine.list_candidates(&restricted).await? {
        if let Some(c) = candidate.as_candidate() {
            println!("  {} [{}] {}", candidate.id(), c.themes.join(", "), c.summary);
        }
        let memory = engine.promote(&restricted, candidate.id(), None).await?;
        println!("  promoted → persona memory {}", memory.id());
    }

    engine
        .publish(
            ApprovedKnowledge::new(
                "projects",
                "The user is working on a side project to learn new skills.",
                "demo-editor",
            )
            .fallback_response("I cannot answer that."),
        )
        .await?;

    let query = "What is the user working on?";
    println!();
    println!("Query: {}", query);
    for (scope, creds) in [
        (Scope::StrictPrivate, &private),
        (Scope::Restricted, &restricted),
        (Scope::Public, &public),
    ] {
        let results = engine.retrieve(query, scope, creds).await?;
        println!("  {} ({} results)", scope, results.len());
        for result in &results {
            println!("    {:.3} {} {}", result.score, result.record.tier(), result.record.id());
        }
    }

    let answer = engine.answer(query, Scope::Public, &public).await?;
    println!();
    println!("Public answer: {}", answer.text);

    let denied = engine.retrieve(query, Scope::StrictPrivate, &public).await;
    if let Err(e) = denied {
        println!("STRICT_PRIVATE with public credentials: {}", e);
    }

    Ok(())
}
