//! DNS-01 challenge authenticator
//!
//! Composes a [`DnsProvider`] with the zone resolver and record reconciler and
//! exposes the `perform` / `cleanup` pair a certificate client drives.

use tracing::{info, info_span, Span};

use crate::dns_provider::DnsProvider;
use crate::error::ChallengeError;
use crate::records::{add_txt, delete_txt};
use crate::zone::{normalize_domain, normalize_name, resolve_zone};

/// TTL for challenge records, in seconds
pub const DEFAULT_TTL: u32 = 60;

/// Default time to wait for a new record to propagate, in seconds
pub const DEFAULT_PROPAGATION_SECONDS: u64 = 60;

/// Capability a host certificate client calls to satisfy a DNS-01 challenge
pub trait ChallengeSolver {
    /// Publish `validation` as a TXT record at `validation_record_name`
    fn perform(
        &self,
        domain: &str,
        validation_record_name: &str,
        validation: &str,
    ) -> Result<(), ChallengeError>;

    /// Remove the TXT record published by [`ChallengeSolver::perform`]
    fn cleanup(
        &self,
        domain: &str,
        validation_record_name: &str,
        validation: &str,
    ) -> Result<(), ChallengeError>;
}

/// Challenge solver backed by a DNS provider
pub struct Authenticator<P> {
    provider: P,
    ttl: u32,
    span: Span,
}

impl<P: DnsProvider> Authenticator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            ttl: DEFAULT_TTL,
            span: Span::current(),
        }
    }

    /// Parent span every operation is logged under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// One-line description shown by the host's plugin listing
    pub fn description() -> &'static str {
        "Obtain certificates using a DNS TXT record (if you are using OCI for DNS)."
    }

    pub fn more_info() -> &'static str {
        "This plugin configures a DNS TXT record to respond to a dns-01 challenge using the OCI REST API."
    }
}

impl<P: DnsProvider> ChallengeSolver for Authenticator<P> {
    fn perform(
        &self,
        domain: &str,
        validation_record_name: &str,
        validation: &str,
    ) -> Result<(), ChallengeError> {
        let span = info_span!(parent: &self.span, "perform", domain, record = validation_record_name);
        let _guard = span.enter();

        let record_name = normalize_name(validation_record_name);
        let zone = resolve_zone(&self.provider, &record_name, domain)?;
        add_txt(&self.provider, &zone, &record_name, validation, self.ttl)?;

        info!("Challenge record {} published", record_name);
        Ok(())
    }

    fn cleanup(
        &self,
        domain: &str,
        validation_record_name: &str,
        validation: &str,
    ) -> Result<(), ChallengeError> {
        let span = info_span!(parent: &self.span, "cleanup", domain, record = validation_record_name);
        let _guard = span.enter();

        let record_name = normalize_name(validation_record_name);
        let zone = resolve_zone(&self.provider, &record_name, domain)?;
        delete_txt(&self.provider, &zone, &record_name, validation)?;

        info!("Challenge record {} removed", record_name);
        Ok(())
    }
}

/// Default validation record name for a challenge domain
pub fn validation_record_name(domain: &str) -> String {
    format!("_acme-challenge.{}", normalize_domain(domain))
}
