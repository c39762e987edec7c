//! DNS provider abstraction for challenge record management
//!
//! This trait allows for different DNS backends (OCI, mock for testing, etc.)
//! and exposes only the two call shapes the challenge flow depends on.

use thiserror::Error;

/// A hosted zone that exists in the provider account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider identifier (an OCID for OCI)
    pub id: String,
    /// Zone name, e.g. "example.com"
    pub name: String,
    /// Compartment (account scope) the zone lives in
    pub compartment_id: String,
}

/// A TXT record as written by the challenge flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

/// A single change inside a records patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOperation {
    /// Upsert a TXT record. Same (name, value) with a different TTL updates the TTL.
    Add(TxtRecord),
    /// Remove the TXT record matching (name, value). TTL is not matched.
    Remove { name: String, value: String },
}

impl RecordOperation {
    /// Provider-facing operation name
    pub fn kind(&self) -> &'static str {
        match self {
            RecordOperation::Add(_) => "ADD",
            RecordOperation::Remove { .. } => "REMOVE",
        }
    }

    /// Record name the operation targets
    pub fn record_name(&self) -> &str {
        match self {
            RecordOperation::Add(record) => &record.name,
            RecordOperation::Remove { name, .. } => name,
        }
    }
}

/// Result of a successful records patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Version of the record set after the patch, when the provider reports one
    pub rrset_version: Option<String>,
}

/// Errors from DNS provider operations
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("API error (HTTP {status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("credentials error: {0}")]
    Credentials(String),
}

impl DnsError {
    /// Whether this error means "no such zone" rather than a failed call
    ///
    /// OCI answers 404 for unknown zone names and 400 for names that can never
    /// be zones (e.g. labels starting with an underscore).
    pub fn is_zone_miss(&self) -> bool {
        matches!(self, DnsError::NotFound(_) | DnsError::InvalidRequest(_))
    }
}

/// Trait for DNS providers able to serve a DNS-01 challenge
///
/// Calls are blocking. Idempotency of record operations is the provider's
/// responsibility: adding an existing (name, value) is a no-op or a TTL
/// update, removing an absent one succeeds.
pub trait DnsProvider {
    /// Look up a hosted zone by exact name
    fn get_zone(&self, name: &str) -> Result<Zone, DnsError>;

    /// Apply record operations to the `record_name` sub-resource of `zone`
    ///
    /// The patch is a single provider-side transaction.
    fn patch_records(
        &self,
        zone: &Zone,
        record_name: &str,
        operations: &[RecordOperation],
    ) -> Result<PatchOutcome, DnsError>;
}

impl<P: DnsProvider + ?Sized> DnsProvider for &P {
    fn get_zone(&self, name: &str) -> Result<Zone, DnsError> {
        (**self).get_zone(name)
    }

    fn patch_records(
        &self,
        zone: &Zone,
        record_name: &str,
        operations: &[RecordOperation],
    ) -> Result<PatchOutcome, DnsError> {
        (**self).patch_records(zone, record_name, operations)
    }
}

impl<P: DnsProvider + ?Sized> DnsProvider for std::sync::Arc<P> {
    fn get_zone(&self, name: &str) -> Result<Zone, DnsError> {
        (**self).get_zone(name)
    }

    fn patch_records(
        &self,
        zone: &Zone,
        record_name: &str,
        operations: &[RecordOperation],
    ) -> Result<PatchOutcome, DnsError> {
        (**self).patch_records(zone, record_name, operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_miss_classification() {
        assert!(DnsError::NotFound("x".into()).is_zone_miss());
        assert!(DnsError::InvalidRequest("x".into()).is_zone_miss());
        assert!(!DnsError::Unauthorized("x".into()).is_zone_miss());
        assert!(!DnsError::Transport("x".into()).is_zone_miss());
        assert!(!DnsError::Api {
            status: 500,
            code: "InternalServerError".into(),
            message: "boom".into()
        }
        .is_zone_miss());
    }

    #[test]
    fn test_operation_kind() {
        let add = RecordOperation::Add(TxtRecord {
            name: "_acme-challenge.example.com".into(),
            value: "abc".into(),
            ttl: 60,
        });
        let remove = RecordOperation::Remove {
            name: "_acme-challenge.example.com".into(),
            value: "abc".into(),
        };
        assert_eq!(add.kind(), "ADD");
        assert_eq!(remove.kind(), "REMOVE");
        assert_eq!(remove.record_name(), "_acme-challenge.example.com");
    }
}
