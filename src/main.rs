use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use licensing_resilience::licensing::{self, LicenseClient, LicenseRecord, LicenseStore};
use licensing_resilience::lifecycle::{signals, startup, Services};

#[derive(Parser)]
#[command(name = "license-guard")]
#[command(about = "License validation, vault and signing utility", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and print the effective configuration
    CheckConfig,
    /// Encrypt text into a vault blob
    Encrypt { plaintext: String },
    /// Decrypt a vault blob
    Decrypt { blob: String },
    /// Sign data with HMAC-SHA256
    Sign { data: String },
    /// Verify an HMAC-SHA256 signature
    Verify { data: String, signature: String },
    /// Issue a signed device token
    IssueToken {
        #[arg(short, long)]
        fingerprint: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: u64,
    },
    /// Verify a signed device token
    VerifyToken { token: String },
    /// Validate a license against the license service and store it
    Validate {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        fingerprint: String,
        /// Accept a stored license this long past expiry when the service is down
        #[arg(long, default_value_t = 0)]
        grace_secs: u64,
    },
    /// Show the stored license
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let services = match startup::start(cli.config.as_deref()) {
        Ok(services) => services,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &services).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, services: &Services) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&services.config)?);
        }
        Commands::Encrypt { plaintext } => {
            println!("{}", services.vault()?.encrypt(&plaintext)?);
        }
        Commands::Decrypt { blob } => {
            println!("{}", services.vault()?.decrypt(blob.trim())?);
        }
        Commands::Sign { data } => {
            println!("{}", services.vault()?.generate_signature(data.as_bytes()));
        }
        Commands::Verify { data, signature } => {
            if !services.vault()?.verify_signature(data.as_bytes(), &signature) {
                return Err("signature does not match".into());
            }
            println!("ok");
        }
        Commands::IssueToken { fingerprint, ttl_secs } => {
            let expires_at = licensing::types::now_secs().saturating_add(ttl_secs);
            println!("{}", licensing::issue_token(&services.vault()?, &fingerprint, expires_at)?);
        }
        Commands::VerifyToken { token } => {
            let claims = licensing::verify_token(&services.vault()?, token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Validate {
            key,
            fingerprint,
            grace_secs,
        } => {
            validate(services, &key, &fingerprint, grace_secs).await?;
        }
        Commands::Status => {
            let store = LicenseStore::new(&services.config.license.store_path, services.vault()?);
            match store.load()? {
                Some(record) => print_record(&record)?,
                None => return Err("no license stored".into()),
            }
        }
    }

    Ok(())
}

async fn validate(
    services: &Services,
    key: &str,
    fingerprint: &str,
    grace_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = LicenseStore::new(&services.config.license.store_path, services.vault()?);
    let client = LicenseClient::new(&services.config, &services.registry, services.events.clone())?;
    let _signals = signals::cancel_on_ctrl_c(services.shutdown.clone());
    let token = services.shutdown.token();

    match client.validate_cancellable(&token, key, fingerprint).await {
        Ok(response) if response.is_valid() => {
            let record = LicenseRecord::from_response(key, fingerprint, &response);
            store.save(&record)?;
            print_record(&record)
        }
        Ok(response) => {
            store.clear()?;
            Err(format!(
                "license rejected ({:?}): {}",
                response.status,
                response.message.unwrap_or_default()
            )
            .into())
        }
        Err(e) if e.is_unavailable() => {
            tracing::warn!(error = %e, "License service unavailable, checking stored license");
            match store.load()? {
                Some(record)
                    if record.license_key == key
                        && record.fingerprint == fingerprint
                        && record.is_active_with_grace(grace_secs) =>
                {
                    print_record(&record)
                }
                _ => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn print_record(record: &LicenseRecord) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}
