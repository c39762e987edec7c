use thiserror::Error;

use crate::dns_provider::DnsError;

/// Errors surfaced to the host by `perform` and `cleanup`
#[derive(Debug, Error)]
pub enum ChallengeError {
    /// Invalid or conflicting configuration, detected before any network call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The validation record does not live under the challenge domain
    #[error("record name '{record_name}' is not within domain '{domain}'")]
    InvalidRecordName { record_name: String, domain: String },

    /// No zone candidate matched a hosted zone
    #[error(
        "no OCI DNS zone found for {record_name} (tried: {}). \
         Make sure the domain is hosted in OCI DNS and the credentials have permission to read it",
        candidates.join(", ")
    )]
    ZoneNotFound {
        record_name: String,
        candidates: Vec<String>,
    },

    /// Looking up a zone candidate failed for a reason other than "no such zone"
    #[error("failed to look up zone '{candidate}': {source}")]
    Provider {
        candidate: String,
        #[source]
        source: DnsError,
    },

    /// The provider rejected a record patch
    #[error("failed to {operation} TXT record {record_name}: {source}")]
    Patch {
        operation: &'static str,
        record_name: String,
        #[source]
        source: DnsError,
    },
}

impl ChallengeError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
