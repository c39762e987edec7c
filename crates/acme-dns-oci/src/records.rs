//! TXT record reconciliation within a resolved zone
//!
//! Each call is one patch against the record name's sub-resource of the zone;
//! nothing else in the zone is listed or modified.

use tracing::{debug, info};

use crate::dns_provider::{DnsProvider, RecordOperation, TxtRecord, Zone};
use crate::error::ChallengeError;

/// Add (or refresh the TTL of) a TXT record
///
/// The provider treats an identical (name, value, ttl) as a no-op and a
/// differing TTL as an in-place update, so this is safe to repeat.
pub fn add_txt<P: DnsProvider + ?Sized>(
    provider: &P,
    zone: &Zone,
    record_name: &str,
    value: &str,
    ttl: u32,
) -> Result<(), ChallengeError> {
    debug!(
        "Setting record {} in zone {} to value {} w/ TTL {}",
        record_name, zone.id, value, ttl
    );

    let operation = RecordOperation::Add(TxtRecord {
        name: record_name.to_string(),
        value: value.to_string(),
        ttl,
    });
    apply(provider, zone, record_name, operation)
}

/// Remove the TXT record matching (name, value)
///
/// TTL is left out of the match since another writer may have changed it
/// since creation. Removing an absent record succeeds.
pub fn delete_txt<P: DnsProvider + ?Sized>(
    provider: &P,
    zone: &Zone,
    record_name: &str,
    value: &str,
) -> Result<(), ChallengeError> {
    debug!(
        "Removing record {} with value {} from zone {}",
        record_name, value, zone.id
    );

    let operation = RecordOperation::Remove {
        name: record_name.to_string(),
        value: value.to_string(),
    };
    apply(provider, zone, record_name, operation)
}

fn apply<P: DnsProvider + ?Sized>(
    provider: &P,
    zone: &Zone,
    record_name: &str,
    operation: RecordOperation,
) -> Result<(), ChallengeError> {
    let kind = operation.kind();
    let verb = match operation {
        RecordOperation::Add(_) => "add",
        RecordOperation::Remove { .. } => "remove",
    };
    let outcome = provider
        .patch_records(zone, record_name, std::slice::from_ref(&operation))
        .map_err(|source| ChallengeError::Patch {
            operation: verb,
            record_name: record_name.to_string(),
            source,
        })?;

    if let Some(version) = &outcome.rrset_version {
        debug!("New rrset version: {}", version);
    }
    info!("{} TXT {} in zone {}: success", kind, record_name, zone.name);
    Ok(())
}
