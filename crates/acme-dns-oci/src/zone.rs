//! Zone resolution for validation record names
//!
//! A provider account may host zones at several levels of the same hierarchy
//! (both `dev.example.com` and `example.com`). The record belongs to the most
//! specific one, so candidates are probed from the full record name downward.

use tracing::{debug, info, warn};

use crate::dns_provider::{DnsProvider, Zone};
use crate::error::ChallengeError;

/// Lowercase a DNS name and drop the root dot
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Normalize a challenge domain, stripping a wildcard prefix
pub fn normalize_domain(domain: &str) -> String {
    let domain = normalize_name(domain);
    match domain.strip_prefix("*.") {
        Some(rest) => rest.to_string(),
        None => domain,
    }
}

/// Ordered zone name guesses for a validation record, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCandidates {
    names: Vec<String>,
}

impl ZoneCandidates {
    /// Build the candidate list for `record_name` under `domain`
    ///
    /// Starts with the full record name, then drops one leading label at a
    /// time. Suffixes shorter than two labels are skipped unless they are the
    /// domain itself.
    pub fn new(record_name: &str, domain: &str) -> Result<Self, ChallengeError> {
        let record = normalize_name(record_name);
        let domain = normalize_domain(domain);

        let within_domain = record == domain || record.ends_with(&format!(".{}", domain));
        if domain.is_empty() || !within_domain {
            return Err(ChallengeError::InvalidRecordName {
                record_name: record_name.to_string(),
                domain: domain.to_string(),
            });
        }

        let labels: Vec<&str> = record.split('.').collect();
        if labels.iter().any(|label| label.is_empty()) {
            return Err(ChallengeError::InvalidRecordName {
                record_name: record_name.to_string(),
                domain,
            });
        }

        let names = (0..labels.len())
            .map(|start| labels[start..].join("."))
            .filter(|suffix| suffix.split('.').count() >= 2 || *suffix == domain)
            .collect();

        Ok(Self { names })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.names
    }
}

/// Find the most specific hosted zone for `record_name`
///
/// "Not a zone" answers move on to the next candidate. Any other provider
/// failure (transport, authorization, throttling, server error) aborts the
/// lookup so outages are not reported as a missing zone.
pub fn resolve_zone<P: DnsProvider + ?Sized>(
    provider: &P,
    record_name: &str,
    domain: &str,
) -> Result<Zone, ChallengeError> {
    let candidates = ZoneCandidates::new(record_name, domain)?;
    debug!(candidates = ?candidates, "Zone candidates for {}", record_name);

    for candidate in candidates.iter() {
        debug!("Looking for zone: {}", candidate);
        match provider.get_zone(candidate) {
            Ok(zone) => {
                info!(
                    zone_id = %zone.id,
                    compartment = %zone.compartment_id,
                    "Found zone {} for {}",
                    zone.name,
                    record_name
                );
                return Ok(zone);
            }
            Err(e) if e.is_zone_miss() => {
                debug!("Zone '{}' not found: {}", candidate, e);
            }
            Err(e) => {
                warn!("Zone lookup for '{}' failed: {}", candidate, e);
                return Err(ChallengeError::Provider {
                    candidate: candidate.to_string(),
                    source: e,
                });
            }
        }
    }

    Err(ChallengeError::ZoneNotFound {
        record_name: record_name.to_string(),
        candidates: candidates.into_vec(),
    })
}
