//! astrum-keys - Credential and AI quota management for Astrumverse
//!
//! Credentials live in one JSON document (`credentials.json` in the data
//! directory). Fields are addressed by their document path, for example
//! `twitter.bearerToken` or `backupAi1.dailyLimit`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libastrum::credentials::mask_secret;
use libastrum::platforms::readiness;
use libastrum::quota::QuotaRotator;
use libastrum::storage::JsonFileStore;
use libastrum::{AstrumError, Config, KeyStore};

/// Fields that hold counters or identifiers rather than secrets
const PLAIN_FIELDS: &[&str] = &[
    "usageCount",
    "dailyLimit",
    "provider",
    "publicationId",
    "personId",
    "userId",
    "appId",
    "clientId",
];

#[derive(Parser)]
#[command(name = "astrum-keys")]
#[command(version)]
#[command(about = "Manage Astrumverse credentials and AI quotas")]
#[command(long_about = "\
astrum-keys - Manage Astrumverse credentials and AI quotas

USAGE EXAMPLES:
    # Which platforms can publish, and how much AI quota is left
    astrum-keys status

    # Store a secret (prompts without echo)
    astrum-keys set devto.apiKey

    # Store from a pipe (for automation)
    echo \"$TOKEN\" | astrum-keys set hashnode.token --stdin

    # Plain values can be given inline
    astrum-keys set backupAi1.provider gemini
    astrum-keys set openai.dailyLimit 200

    # Zero all AI usage counters (astrum-send does this daily)
    astrum-keys reset-usage

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Configuration error
    3 - Invalid input (unknown field, bad value)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show platform readiness and AI provider usage
    Status {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },

    /// Store a credential field
    Set {
        /// Field path, e.g. twitter.bearerToken
        field: String,

        /// Value (prompted for when omitted)
        value: Option<String>,

        /// Read the value from stdin (for automation/agents)
        #[arg(long, conflicts_with = "value")]
        stdin: bool,

        /// Overwrite an existing secret without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show a credential field (masked unless --reveal)
    Get {
        field: String,

        #[arg(long)]
        reveal: bool,
    },

    /// Clear a credential field
    Unset { field: String },

    /// Reset every AI provider's daily usage counter
    ResetUsage,
}

fn main() {
    let cli = Cli::parse();

    libastrum::logging::init_for_cli(cli.verbose);

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<AstrumError>()
            .map(AstrumError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn open_key_store() -> Result<KeyStore> {
    let config = Config::load()?;
    let store = JsonFileStore::new(config.data_dir());
    Ok(KeyStore::new(Arc::new(store)))
}

fn run_command(command: Commands) -> Result<()> {
    let key_store = open_key_store()?;

    match command {
        Commands::Status { format } => show_status(key_store, &format),
        Commands::Set {
            field,
            value,
            stdin,
            force,
        } => set_field(&key_store, &field, value, stdin, force),
        Commands::Get { field, reveal } => {
            let value = key_store.load()?.get_field(&field)?;
            if reveal || is_plain_field(&field) {
                println!("{}", value);
            } else {
                println!("{}", mask_secret(&value));
            }
            Ok(())
        }
        Commands::Unset { field } => {
            key_store.update(|credentials| credentials.set_field(&field, ""))??;
            println!("✓ Cleared {}", field);
            Ok(())
        }
        Commands::ResetUsage => {
            key_store.reset_daily_usage()?;
            println!("✓ AI usage counters reset");
            Ok(())
        }
    }
}

fn is_plain_field(field: &str) -> bool {
    field
        .rsplit('.')
        .next()
        .is_some_and(|leaf| PLAIN_FIELDS.contains(&leaf))
}

fn show_status(key_store: KeyStore, format: &str) -> Result<()> {
    let credentials = key_store.load()?;
    let platforms = readiness(&credentials);
    let dropbox = !credentials.dropbox.access_token.trim().is_empty();
    let usage = QuotaRotator::new(Arc::new(key_store)).usage_report()?;

    if format == "json" {
        let platforms: serde_json::Map<String, serde_json::Value> = platforms
            .iter()
            .map(|(platform, ready)| (platform.as_str().to_string(), (*ready).into()))
            .collect();
        let output = serde_json::json!({
            "platforms": platforms,
            "dropbox": dropbox,
            "ai": usage,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Platforms:");
    for (platform, ready) in &platforms {
        if *ready {
            println!("  ✓ {:<10}", platform.display_name());
            continue;
        }
        let missing: Vec<&str> = platform
            .required_fields()
            .iter()
            .copied()
            .filter(|field| {
                credentials
                    .get_field(&format!("{}.{}", platform.as_str(), field))
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true)
            })
            .collect();
        println!(
            "  ✗ {:<10} missing {}",
            platform.display_name(),
            missing.join(", ")
        );
    }
    println!(
        "  {} {:<10}",
        if dropbox { "✓" } else { "✗" },
        "Dropbox"
    );
    println!();
    println!("AI providers:");
    for provider in usage {
        if provider.configured {
            println!(
                "  {:<8} {:<7} {}/{}",
                provider.slot.section(),
                provider.provider.display_name(),
                provider.usage_count,
                provider.daily_limit
            );
        } else {
            println!("  {:<8} not configured", provider.slot.section());
        }
    }

    Ok(())
}

fn set_field(
    key_store: &KeyStore,
    field: &str,
    value: Option<String>,
    use_stdin: bool,
    force: bool,
) -> Result<()> {
    // Fail on unknown fields before prompting
    let existing = key_store.load()?.get_field(field)?;
    let plain = is_plain_field(field);

    if !plain && !existing.is_empty() && !force {
        if use_stdin || !atty::is(atty::Stream::Stdin) {
            anyhow::bail!(
                "{} is already set. Refusing to overwrite in non-interactive mode; pass --force.",
                field
            );
        }
        print!("{} is already set. Overwrite? [y/N]: ", field);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !matches!(input.trim(), "y" | "Y" | "yes") {
            println!("Cancelled");
            return Ok(());
        }
    }

    let value = match value {
        Some(value) => value,
        None if use_stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read value from stdin")?;
            buffer
        }
        None => {
            if !atty::is(atty::Stream::Stdin) {
                anyhow::bail!("Not a TTY. Use --stdin to read the value from stdin.");
            }
            rpassword::prompt_password(format!("Enter {}: ", field))?
        }
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("Credential value cannot be empty (use 'unset' to clear a field)");
    }

    key_store.update(|credentials| credentials.set_field(field, &value))??;

    if plain {
        println!("✓ Set {} = {}", field, value);
    } else {
        println!("✓ Stored {} ({})", field, mask_secret(&value));
    }
    Ok(())
}
