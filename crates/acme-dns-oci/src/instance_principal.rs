//! Instance principal authentication
//!
//! A compute instance proves its identity with the certificate the instance
//! metadata service hands out. That certificate is exchanged at the identity
//! service for a short-lived security token bound to a freshly generated
//! session key; DNS requests are then signed with `ST$<token>`.

use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use ureq::Agent;
use x509_parser::pem::parse_x509_pem;

use crate::dns_provider::DnsError;
use crate::oci::{execute, HttpMethod};
use crate::signer::RequestSigner;

/// Instance metadata service, v2 endpoints
pub const METADATA_BASE_URL: &str = "http://169.254.169.254/opc/v2";

const SESSION_KEY_BITS: usize = 2048;

/// Where to obtain the instance identity from
#[derive(Debug, Clone)]
pub struct InstancePrincipalSource {
    metadata_url: String,
    auth_endpoint: Option<String>,
}

impl Default for InstancePrincipalSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Region details reported by the metadata service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionInfo {
    pub region_identifier: String,
    pub realm_domain_component: String,
}

/// Credentials obtained through federation
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub region: RegionInfo,
    pub signer: RequestSigner,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FederationRequest {
    certificate: String,
    public_key: String,
    intermediate_certificates: Vec<String>,
    purpose: &'static str,
    fingerprint_algorithm: &'static str,
}

#[derive(Deserialize)]
struct FederationResponse {
    token: String,
}

impl InstancePrincipalSource {
    pub fn new() -> Self {
        Self {
            metadata_url: METADATA_BASE_URL.to_string(),
            auth_endpoint: None,
        }
    }

    /// Use a different metadata service base URL
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a fixed federation endpoint instead of `https://auth.{region}.{realm}`
    pub fn with_auth_endpoint(mut self, url: impl Into<String>) -> Self {
        self.auth_endpoint = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Read the region from the metadata service
    pub fn region(&self, agent: &Agent) -> Result<RegionInfo, DnsError> {
        let body = self.metadata(agent, "instance/regionInfo/")?;
        serde_json::from_str(&body)
            .map_err(|e| DnsError::InvalidResponse(format!("region info: {}", e)))
    }

    /// Exchange the instance certificate for a session signer
    pub fn federate(&self, agent: &Agent) -> Result<SessionCredentials, DnsError> {
        let region = self.region(agent)?;
        let leaf_cert = self.metadata(agent, "identity/cert.pem")?;
        let leaf_key = self.metadata(agent, "identity/key.pem")?;
        let intermediate = self.metadata(agent, "identity/intermediate.pem")?;

        let tenancy = tenancy_from_certificate(&leaf_cert)?;
        let fingerprint = certificate_fingerprint(&leaf_cert)?;
        debug!(tenancy = %tenancy, "Federating instance certificate {}", fingerprint);

        let session_key = RsaPrivateKey::new(&mut rand::thread_rng(), SESSION_KEY_BITS)
            .map_err(|e| DnsError::Credentials(format!("session key generation: {}", e)))?;
        let public_key = session_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| DnsError::Credentials(format!("session key encoding: {}", e)))?;

        let request = FederationRequest {
            certificate: sanitize_pem(&leaf_cert),
            public_key: sanitize_pem(&public_key),
            intermediate_certificates: vec![sanitize_pem(&intermediate)],
            purpose: "DEFAULT",
            fingerprint_algorithm: "SHA256",
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| DnsError::InvalidRequest(format!("federation request: {}", e)))?;

        let endpoint = match &self.auth_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://auth.{}.{}",
                region.region_identifier, region.realm_domain_component
            ),
        };
        let leaf_signer = RequestSigner::from_pem(
            format!("{}/fed-x509-sha256/{}", tenancy, fingerprint),
            &leaf_key,
        )?;

        let response = execute(
            agent,
            &leaf_signer,
            HttpMethod::Post,
            &format!("{}/v1/x509", endpoint),
            Some(body),
        )?;
        let token: FederationResponse = response.json()?;

        info!(
            "Obtained instance principal session token for region {}",
            region.region_identifier
        );
        Ok(SessionCredentials {
            region,
            signer: RequestSigner::new(format!("ST${}", token.token), session_key),
        })
    }

    fn metadata(&self, agent: &Agent, path: &str) -> Result<String, DnsError> {
        let url = format!("{}/{}", self.metadata_url, path);
        debug!("Reading instance metadata {}", url);

        let mut response = agent
            .get(&url)
            .header("Authorization", "Bearer Oracle")
            .call()
            .map_err(|e| DnsError::Transport(format!("instance metadata {}: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| DnsError::Transport(format!("instance metadata {}: {}", url, e)))?;

        if status != 200 {
            return Err(DnsError::Credentials(format!(
                "instance metadata {} returned HTTP {}",
                url, status
            )));
        }
        Ok(body)
    }
}

/// Extract the tenancy OCID from an instance certificate's subject
///
/// OCI encodes it as an organizational unit `opc-tenant:<ocid>` (or
/// `opc-identity:<ocid>` on older certificates).
pub fn tenancy_from_certificate(cert_pem: &str) -> Result<String, DnsError> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| DnsError::Credentials(format!("instance certificate PEM: {}", e)))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| DnsError::Credentials(format!("instance certificate: {}", e)))?;

    let tenancy = cert
        .subject()
        .iter_organizational_unit()
        .filter_map(|ou| ou.as_str().ok())
        .find_map(|ou| {
            ou.strip_prefix("opc-tenant:")
                .or_else(|| ou.strip_prefix("opc-identity:"))
        })
        .map(str::to_string)
        .ok_or_else(|| {
            DnsError::Credentials("instance certificate has no tenancy in its subject".to_string())
        });
    tenancy
}

/// SHA-256 fingerprint of a PEM certificate, as colon-separated uppercase hex
pub fn certificate_fingerprint(cert_pem: &str) -> Result<String, DnsError> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| DnsError::Credentials(format!("instance certificate PEM: {}", e)))?;
    Ok(Sha256::digest(&pem.contents)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Strip PEM armor and line breaks
pub fn sanitize_pem(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_pem() {
        let pem = "-----BEGIN PUBLIC KEY-----\nMIIB\nIjAN\n-----END PUBLIC KEY-----\n";
        assert_eq!(sanitize_pem(pem), "MIIBIjAN");
    }

    #[test]
    fn test_metadata_url_trailing_slash() {
        let source = InstancePrincipalSource::new().with_metadata_url("http://127.0.0.1:9/opc/v2/");
        assert_eq!(source.metadata_url, "http://127.0.0.1:9/opc/v2");
    }

    #[test]
    fn test_region_info_deserialize() {
        let info: RegionInfo = serde_json::from_str(
            r#"{"realmKey":"oc1","realmDomainComponent":"oraclecloud.com","regionKey":"IAD","regionIdentifier":"us-ashburn-1"}"#,
        )
        .unwrap();
        assert_eq!(info.region_identifier, "us-ashburn-1");
        assert_eq!(info.realm_domain_component, "oraclecloud.com");
    }

    #[test]
    fn test_tenancy_rejects_garbage() {
        assert!(tenancy_from_certificate("not a certificate").is_err());
    }
}
