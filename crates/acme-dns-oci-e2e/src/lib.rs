//! End-to-end test utilities for the OCI DNS-01 challenge solver
//!
//! This crate provides an in-memory provider, a mock OCI DNS REST API and
//! generated credentials, so the full challenge flow can be tested without
//! an Oracle Cloud account.

pub mod keys;
pub mod mock_dns;
pub mod mock_oci_api;

pub use keys::{instance_certificate, KeyFormat, TestKeys};
pub use mock_dns::{LookupFailure, MockDnsProvider, ProviderCall};
pub use mock_oci_api::{InstanceIdentity, MockOciApi, RecordedRequest, StoredRecord};

/// Initialize tracing for tests (ignored if already installed)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("acme_dns_oci=debug,acme_dns_oci_e2e=debug")
        .with_test_writer()
        .try_init();
}
