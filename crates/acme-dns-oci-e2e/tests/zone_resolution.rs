//! Zone resolution tests against the in-memory provider

use acme_dns_oci::{resolve_zone, ChallengeError, DnsError, ZoneCandidates};
use acme_dns_oci_e2e::{init_tracing, LookupFailure, MockDnsProvider};

#[test]
fn test_candidates_end_with_domain_and_shrink() {
    for (subdomain, domain) in [
        ("www", "example.com"),
        ("a.b.c", "example.org"),
        ("dev", "example.co"),
        ("x-y.z", "test.io"),
    ] {
        let record = format!("_acme-challenge.{}.{}", subdomain, domain);
        let candidates = ZoneCandidates::new(&record, domain).unwrap().into_vec();

        assert_eq!(candidates.first(), Some(&record));
        assert_eq!(candidates.last().map(String::as_str), Some(domain));
        let labels: Vec<usize> = candidates.iter().map(|c| c.split('.').count()).collect();
        assert!(
            labels.windows(2).all(|w| w[0] > w[1]),
            "label counts not strictly decreasing: {:?}",
            candidates
        );
    }
}

#[test]
fn test_apex_zone_resolves() {
    init_tracing();
    let provider = MockDnsProvider::with_zones(&["example.com"]);

    let zone = resolve_zone(&provider, "_acme-challenge.www.example.com", "example.com").unwrap();

    assert_eq!(zone.name, "example.com");
    assert_eq!(
        provider.zone_lookups(),
        vec![
            "_acme-challenge.www.example.com",
            "www.example.com",
            "example.com"
        ]
    );
}

#[test]
fn test_most_specific_zone_wins() {
    let provider = MockDnsProvider::with_zones(&["example.com", "dev.example.com"]);

    let zone = resolve_zone(
        &provider,
        "_acme-challenge.api.dev.example.com",
        "example.com",
    )
    .unwrap();

    assert_eq!(zone.name, "dev.example.com");
    // Stops at the first match
    assert_eq!(
        provider.zone_lookups(),
        vec![
            "_acme-challenge.api.dev.example.com",
            "api.dev.example.com",
            "dev.example.com"
        ]
    );
}

#[test]
fn test_no_zone_reports_all_candidates() {
    let provider = MockDnsProvider::with_zones(&["example.org"]);

    let err = resolve_zone(&provider, "_acme-challenge.www.example.com", "example.com").unwrap_err();

    match &err {
        ChallengeError::ZoneNotFound { candidates, .. } => {
            assert_eq!(candidates.len(), 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("www.example.com"));
    assert!(message.contains("permission"));
}

#[test]
fn test_invalid_name_is_a_miss() {
    let provider = MockDnsProvider::with_zones(&["example.com"]);
    provider.fail_lookup("_acme-challenge.example.com", LookupFailure::InvalidName);

    let zone = resolve_zone(&provider, "_acme-challenge.example.com", "example.com").unwrap();
    assert_eq!(zone.name, "example.com");
}

#[test]
fn test_transport_error_aborts_resolution() {
    let provider = MockDnsProvider::with_zones(&["example.com"]);
    provider.fail_lookup("www.example.com", LookupFailure::Transport);

    let err = resolve_zone(&provider, "_acme-challenge.www.example.com", "example.com").unwrap_err();

    match err {
        ChallengeError::Provider { candidate, source } => {
            assert_eq!(candidate, "www.example.com");
            assert!(matches!(source, DnsError::Transport(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // The apex was never tried, so the outage is not masked as "not found"
    assert_eq!(provider.zone_lookups().len(), 2);
}

#[test]
fn test_auth_error_aborts_resolution() {
    let provider = MockDnsProvider::with_zones(&["example.com"]);
    provider.fail_lookup("_acme-challenge.example.com", LookupFailure::Unauthorized);

    let err = resolve_zone(&provider, "_acme-challenge.example.com", "example.com").unwrap_err();

    assert!(matches!(
        err,
        ChallengeError::Provider {
            source: DnsError::Unauthorized(_),
            ..
        }
    ));
    assert_eq!(provider.zone_lookups().len(), 1);
}

#[test]
fn test_record_outside_domain_makes_no_calls() {
    let provider = MockDnsProvider::with_zones(&["example.com"]);

    let err = resolve_zone(&provider, "_acme-challenge.example.net", "example.com").unwrap_err();

    assert!(matches!(err, ChallengeError::InvalidRecordName { .. }));
    assert!(provider.calls().is_empty());
}
