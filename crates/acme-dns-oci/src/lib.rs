//! ACME DNS-01 challenge solver for OCI DNS
//!
//! This library publishes and removes the `_acme-challenge` TXT record that
//! proves control of a domain. It finds the most specific hosted zone for the
//! validation record, then applies an idempotent add or remove scoped to that
//! zone. It can be embedded in other certificate clients or driven through the
//! `acme-dns-oci` binary as certbot manual hooks.

mod authenticator;
mod config;
mod credentials;
mod dns_provider;
mod error;
mod instance_principal;
mod oci;
mod records;
mod signer;
mod zone;

// Re-export public types
pub use authenticator::{
    validation_record_name, Authenticator, ChallengeSolver, DEFAULT_PROPAGATION_SECONDS,
    DEFAULT_TTL,
};
pub use config::{Overrides, ResolvedSettings, Settings};
pub use credentials::{
    default_config_path, validate_options, ApiKeyProfile, AuthOptions, Credentials,
    DEFAULT_PROFILE,
};
pub use dns_provider::{DnsError, DnsProvider, PatchOutcome, RecordOperation, TxtRecord, Zone};
pub use error::ChallengeError;
pub use instance_principal::{
    certificate_fingerprint, sanitize_pem, tenancy_from_certificate, InstancePrincipalSource,
    RegionInfo, SessionCredentials, METADATA_BASE_URL,
};
pub use oci::{ClientOptions, OciDnsClient, API_VERSION};
pub use records::{add_txt, delete_txt};
pub use signer::{parse_private_key, signing_string, RequestSigner, JSON_CONTENT_TYPE};
pub use zone::{normalize_domain, normalize_name, resolve_zone, ZoneCandidates};

/// Blocking HTTP agent configured the way the OCI client expects
pub fn http_agent() -> ureq::Agent {
    oci::new_agent()
}
