use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use acme_dns_oci::{
    validation_record_name, Authenticator, ChallengeSolver, Credentials, OciDnsClient, Overrides,
    Settings,
};

/// DNS-01 challenge hooks for Oracle Cloud Infrastructure DNS
#[derive(Parser, Debug)]
#[command(name = "acme-dns-oci")]
#[command(about = "Publish and remove ACME DNS-01 TXT records in OCI DNS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// OCI CLI configuration file
    #[arg(long, global = true)]
    oci_config: Option<String>,

    /// OCI configuration profile (in the OCI configuration file)
    #[arg(long, global = true)]
    oci_profile: Option<String>,

    /// Use instance principal for authentication
    #[arg(long, global = true)]
    instance_principal: bool,

    /// Compartment OCID to look zones up in
    #[arg(long, global = true)]
    compartment: Option<String>,

    /// OCI DNS API endpoint override
    ///
    /// API key profiles default to `https://dns.{region}.oraclecloud.com`;
    /// set this for regions outside the commercial realm.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Seconds to wait for DNS propagation after publishing the record
    #[arg(long, global = true)]
    propagation_seconds: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish the validation TXT record (certbot --manual-auth-hook)
    Perform(Challenge),

    /// Remove the validation TXT record (certbot --manual-cleanup-hook)
    Cleanup(Challenge),
}

#[derive(Args, Debug)]
struct Challenge {
    /// Domain being validated
    #[arg(long, env = "CERTBOT_DOMAIN")]
    domain: String,

    /// Validation token to publish
    #[arg(long, env = "CERTBOT_VALIDATION")]
    validation: String,

    /// Validation record name (defaults to _acme-challenge.<domain>)
    #[arg(long)]
    record_name: Option<String>,
}

impl Challenge {
    fn record_name(&self) -> String {
        self.record_name
            .clone()
            .unwrap_or_else(|| validation_record_name(&self.domain))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("acme_dns_oci={}", default_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)
        .resolve(Overrides {
            oci_config: cli.oci_config.clone(),
            oci_profile: cli.oci_profile.clone(),
            instance_principal: cli.instance_principal,
            compartment: cli.compartment.clone(),
            endpoint: cli.endpoint.clone(),
            propagation_seconds: cli.propagation_seconds,
        })
        .context("Invalid settings")?;

    let credentials =
        Credentials::from_options(&settings.auth).context("Failed to load OCI credentials")?;
    let client = OciDnsClient::new(&credentials, settings.client.clone())
        .context("Failed to create OCI DNS client")?;
    tracing::debug!("Using OCI DNS endpoint {}", client.endpoint());

    let authenticator = Authenticator::new(client)
        .with_span(tracing::info_span!("acme_dns_oci", pid = std::process::id()));

    match &cli.command {
        Commands::Perform(challenge) => {
            let record_name = challenge.record_name();
            authenticator
                .perform(&challenge.domain, &record_name, &challenge.validation)
                .with_context(|| format!("Failed to publish {}", record_name))?;

            if settings.propagation_seconds > 0 {
                tracing::info!(
                    "Waiting {} seconds for DNS changes to propagate",
                    settings.propagation_seconds
                );
                std::thread::sleep(Duration::from_secs(settings.propagation_seconds));
            }
        }
        Commands::Cleanup(challenge) => {
            let record_name = challenge.record_name();
            authenticator
                .cleanup(&challenge.domain, &record_name, &challenge.validation)
                .with_context(|| format!("Failed to remove {}", record_name))?;
        }
    }

    Ok(())
}
