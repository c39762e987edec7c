//! Mock DNS provider for E2E tests
//!
//! This module provides an in-memory implementation of the DnsProvider trait
//! that follows OCI's record semantics without making real API calls.

use std::collections::HashMap;

use parking_lot::Mutex;

use acme_dns_oci::{DnsError, DnsProvider, PatchOutcome, RecordOperation, TxtRecord, Zone};

/// A provider call, recorded for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetZone(String),
    Patch {
        zone: String,
        record_name: String,
        operations: Vec<RecordOperation>,
    },
}

/// How a simulated zone lookup failure presents itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    Transport,
    Unauthorized,
    InvalidName,
}

#[derive(Default)]
struct State {
    /// zone name -> zone
    zones: HashMap<String, Zone>,
    /// zone id -> records
    records: HashMap<String, Vec<TxtRecord>>,
    calls: Vec<ProviderCall>,
    lookup_failures: HashMap<String, LookupFailure>,
    fail_patch: bool,
    version: u64,
}

/// Mock DNS provider that tracks zone state and every call made
#[derive(Default)]
pub struct MockDnsProvider {
    state: Mutex<State>,
}

impl MockDnsProvider {
    /// Create a mock provider hosting the given zones
    pub fn with_zones(names: &[&str]) -> Self {
        let provider = Self::default();
        for name in names {
            provider.add_zone(name);
        }
        provider
    }

    /// Host a zone, returning it
    pub fn add_zone(&self, name: &str) -> Zone {
        let zone = Zone {
            id: format!("ocid1.dns-zone.oc1..{}", name.replace('.', "-")),
            name: name.to_string(),
            compartment_id: "ocid1.compartment.oc1..test".to_string(),
        };
        self.state.lock().zones.insert(name.to_string(), zone.clone());
        zone
    }

    /// Seed a record directly, bypassing the call log
    pub fn insert_record(&self, zone: &str, record: TxtRecord) {
        let mut state = self.state.lock();
        let zone_id = state.zones[zone].id.clone();
        state.records.entry(zone_id).or_default().push(record);
    }

    /// TXT records currently in a zone
    pub fn records(&self, zone: &str) -> Vec<TxtRecord> {
        let state = self.state.lock();
        state
            .zones
            .get(zone)
            .and_then(|z| state.records.get(&z.id))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `zone` holds a TXT record with this name and value
    pub fn has_record(&self, zone: &str, name: &str, value: &str) -> bool {
        self.records(zone)
            .iter()
            .any(|r| r.name == name && r.value == value)
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().calls.clone()
    }

    /// Names passed to `get_zone`, in order
    pub fn zone_lookups(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::GetZone(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Patches issued, as (zone name, record name, operations)
    pub fn patches(&self) -> Vec<(String, String, Vec<RecordOperation>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Patch {
                    zone,
                    record_name,
                    operations,
                } => Some((zone, record_name, operations)),
                _ => None,
            })
            .collect()
    }

    /// Make lookups of `name` fail
    pub fn fail_lookup(&self, name: &str, failure: LookupFailure) {
        self.state
            .lock()
            .lookup_failures
            .insert(name.to_string(), failure);
    }

    /// Configure mock to reject patches
    pub fn set_fail_patch(&self, fail: bool) {
        self.state.lock().fail_patch = fail;
    }
}

impl DnsProvider for MockDnsProvider {
    fn get_zone(&self, name: &str) -> Result<Zone, DnsError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::GetZone(name.to_string()));

        match state.lookup_failures.get(name) {
            Some(LookupFailure::Transport) => {
                return Err(DnsError::Transport("connection reset".into()))
            }
            Some(LookupFailure::Unauthorized) => {
                return Err(DnsError::Unauthorized("invalid signature".into()))
            }
            Some(LookupFailure::InvalidName) => {
                return Err(DnsError::InvalidRequest("invalid zone name".into()))
            }
            None => {}
        }

        state
            .zones
            .get(name)
            .cloned()
            .ok_or_else(|| DnsError::NotFound(format!("zone {} not found", name)))
    }

    fn patch_records(
        &self,
        zone: &Zone,
        record_name: &str,
        operations: &[RecordOperation],
    ) -> Result<PatchOutcome, DnsError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::Patch {
            zone: zone.name.clone(),
            record_name: record_name.to_string(),
            operations: operations.to_vec(),
        });

        if state.fail_patch {
            return Err(DnsError::Api {
                status: 409,
                code: "Conflict".into(),
                message: "Simulated patch failure".into(),
            });
        }

        let records = state.records.entry(zone.id.clone()).or_default();
        for operation in operations {
            match operation {
                RecordOperation::Add(record) => {
                    match records
                        .iter_mut()
                        .find(|r| r.name == record.name && r.value == record.value)
                    {
                        Some(existing) => existing.ttl = record.ttl,
                        None => records.push(record.clone()),
                    }
                }
                RecordOperation::Remove { name, value } => {
                    records.retain(|r| !(r.name == *name && r.value == *value));
                }
            }
        }
        tracing::debug!(
            "MockDnsProvider: applied {} operation(s) to {}",
            operations.len(),
            record_name
        );

        state.version += 1;
        Ok(PatchOutcome {
            rrset_version: Some(state.version.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str, ttl: u32) -> TxtRecord {
        TxtRecord {
            name: "_acme-challenge.example.com".into(),
            value: value.into(),
            ttl,
        }
    }

    #[test]
    fn test_add_is_upsert() {
        let provider = MockDnsProvider::with_zones(&["example.com"]);
        let zone = provider.get_zone("example.com").unwrap();

        provider
            .patch_records(&zone, "_acme-challenge.example.com", &[RecordOperation::Add(record("a", 60))])
            .unwrap();
        provider
            .patch_records(&zone, "_acme-challenge.example.com", &[RecordOperation::Add(record("a", 300))])
            .unwrap();

        assert_eq!(provider.records("example.com"), vec![record("a", 300)]);
    }

    #[test]
    fn test_unknown_zone() {
        let provider = MockDnsProvider::default();
        assert!(matches!(
            provider.get_zone("example.com"),
            Err(DnsError::NotFound(_))
        ));
        assert_eq!(provider.zone_lookups(), vec!["example.com"]);
    }

    #[test]
    fn test_failure_simulation() {
        let provider = MockDnsProvider::with_zones(&["example.com"]);
        let zone = provider.get_zone("example.com").unwrap();

        provider.set_fail_patch(true);
        let result = provider.patch_records(&zone, "x.example.com", &[]);
        assert!(result.is_err());

        provider.fail_lookup("example.com", LookupFailure::Transport);
        assert!(matches!(
            provider.get_zone("example.com"),
            Err(DnsError::Transport(_))
        ));
    }
}
