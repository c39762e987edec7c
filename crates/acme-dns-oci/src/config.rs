//! Settings with environment variable priority
//!
//! Each setting is resolved in this order (first found wins):
//! 1. Command line flags
//! 2. Environment variables (ACME_DNS_OCI_*)
//! 3. Settings file (TOML)
//! 4. Default values (where applicable)

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::authenticator::DEFAULT_PROPAGATION_SECONDS;
use crate::credentials::{validate_options, AuthOptions};
use crate::error::ChallengeError;
use crate::oci::ClientOptions;

/// Environment variable prefix
const ENV_PREFIX: &str = "ACME_DNS_OCI";

/// Settings file contents (every key optional)
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// OCI CLI configuration file
    pub oci_config: Option<String>,

    /// Profile within the OCI configuration file
    pub oci_profile: Option<String>,

    /// Authenticate with the instance principal instead of a config file
    pub instance_principal: Option<bool>,

    /// Compartment OCID used for zone lookups
    pub compartment: Option<String>,

    /// DNS API endpoint override
    pub endpoint: Option<String>,

    /// Seconds to wait after publishing the record
    pub propagation_seconds: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub oci_config: Option<String>,
    pub oci_profile: Option<String>,
    pub instance_principal: bool,
    pub compartment: Option<String>,
    pub endpoint: Option<String>,
    pub propagation_seconds: Option<u64>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub auth: AuthOptions,
    pub client: ClientOptions,
    pub propagation_seconds: u64,
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name))
        .ok()
        .filter(|v| !v.is_empty())
}

fn get_env_u64(name: &str) -> Option<u64> {
    get_env(name).and_then(|v| v.parse().ok())
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Settings {
    /// Load settings from a TOML file (optional)
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        tracing::info!("Loaded settings from {}", path.display());
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Default settings file path, `<config dir>/acme-dns-oci/settings.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("acme-dns-oci")
            .join("settings.toml")
    }

    /// Merge command line, environment and file values
    ///
    /// Conflicting authentication options are rejected here, before any
    /// credential is read.
    pub fn resolve(self, overrides: Overrides) -> Result<ResolvedSettings, ChallengeError> {
        let oci_config = overrides
            .oci_config
            .or_else(|| get_env("CONFIG"))
            .or(self.oci_config)
            .map(|p| PathBuf::from(shellexpand::tilde(&p).as_ref()));

        let profile = overrides
            .oci_profile
            .or_else(|| get_env("PROFILE"))
            .or(self.oci_profile);

        let instance_principal = overrides.instance_principal
            || get_env_bool("INSTANCE_PRINCIPAL")
                .or(self.instance_principal)
                .unwrap_or(false);

        let auth = AuthOptions {
            config_file: oci_config,
            profile,
            instance_principal,
        };
        validate_options(&auth)?;

        let client = ClientOptions {
            endpoint: overrides
                .endpoint
                .or_else(|| get_env("ENDPOINT"))
                .or(self.endpoint),
            compartment_id: overrides
                .compartment
                .or_else(|| get_env("COMPARTMENT"))
                .or(self.compartment),
        };

        let propagation_seconds = overrides
            .propagation_seconds
            .or_else(|| get_env_u64("PROPAGATION_SECONDS"))
            .or(self.propagation_seconds)
            .unwrap_or(DEFAULT_PROPAGATION_SECONDS);

        Ok(ResolvedSettings {
            auth,
            client,
            propagation_seconds,
        })
    }
}
