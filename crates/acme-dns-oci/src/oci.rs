use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ureq::Agent;

use crate::credentials::Credentials;
use crate::dns_provider::{DnsError, DnsProvider, PatchOutcome, RecordOperation, Zone};
use crate::signer::{RequestSigner, JSON_CONTENT_TYPE};

/// OCI DNS API version segment
pub const API_VERSION: &str = "20180115";

/// OCI DNS API client
pub struct OciDnsClient {
    agent: Agent,
    signer: RequestSigner,
    endpoint: String,
    compartment_id: Option<String>,
}

/// Client settings independent of the credential source
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Base URL overriding `https://dns.{region}.oraclecloud.com`
    pub endpoint: Option<String>,
    /// Compartment to look zones up in
    pub compartment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneResponse {
    id: String,
    name: String,
    compartment_id: String,
}

#[derive(Debug, Serialize)]
struct PatchRecordsRequest<'a> {
    items: Vec<PatchItem<'a>>,
}

#[derive(Debug, Serialize)]
struct PatchItem<'a> {
    operation: &'static str,
    domain: &'a str,
    rtype: &'static str,
    rdata: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RecordCollection {
    #[serde(default)]
    items: Vec<RecordItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordItem {
    rrset_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OciApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl<'a> From<&'a RecordOperation> for PatchItem<'a> {
    fn from(operation: &'a RecordOperation) -> Self {
        match operation {
            RecordOperation::Add(record) => PatchItem {
                operation: "ADD",
                domain: &record.name,
                rtype: "TXT",
                rdata: &record.value,
                ttl: Some(record.ttl),
            },
            RecordOperation::Remove { name, value } => PatchItem {
                operation: "REMOVE",
                domain: name,
                rtype: "TXT",
                rdata: value,
                ttl: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// A raw OCI API response
#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub status: u16,
    pub request_id: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a successful body, or turn an error status into a [`DnsError`]
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DnsError> {
        if !self.is_success() {
            return Err(self.error());
        }
        serde_json::from_str(&self.body).map_err(|e| DnsError::InvalidResponse(e.to_string()))
    }

    /// Map an error status and body to a [`DnsError`]
    pub fn error(&self) -> DnsError {
        let api_error: OciApiError = serde_json::from_str(&self.body).unwrap_or(OciApiError {
            code: String::new(),
            message: self.body.trim().to_string(),
        });
        let detail = match &self.request_id {
            Some(id) => format!("{} (opc-request-id: {})", api_error.message, id),
            None => api_error.message.clone(),
        };

        match self.status {
            404 => DnsError::NotFound(detail),
            400 => DnsError::InvalidRequest(detail),
            401 | 403 => DnsError::Unauthorized(detail),
            status => DnsError::Api {
                status,
                code: api_error.code,
                message: detail,
            },
        }
    }
}

/// Send one signed request
pub(crate) fn execute(
    agent: &Agent,
    signer: &RequestSigner,
    method: HttpMethod,
    url: &str,
    body: Option<Vec<u8>>,
) -> Result<ApiResponse, DnsError> {
    let headers = signer.sign(method.as_str(), url, body.as_deref())?;

    let result = match (method, body) {
        (HttpMethod::Get, _) => {
            let mut request = agent.get(url).header("accept", JSON_CONTENT_TYPE);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request.call()
        }
        (method, body) => {
            let mut request = match method {
                HttpMethod::Patch => agent.patch(url),
                _ => agent.post(url),
            }
            .header("accept", JSON_CONTENT_TYPE);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let body = body.unwrap_or_default();
            request.send(&body[..])
        }
    };

    let mut response = result.map_err(|e| DnsError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let request_id = response
        .headers()
        .get("opc-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| DnsError::Transport(e.to_string()))?;

    debug!(
        status,
        request_id = request_id.as_deref().unwrap_or("-"),
        "{} {}",
        method.as_str(),
        url
    );
    Ok(ApiResponse {
        status,
        request_id,
        body,
    })
}

/// Blocking agent that reports HTTP error statuses as responses
pub(crate) fn new_agent() -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into()
}

impl OciDnsClient {
    /// Create a client from resolved credentials
    ///
    /// Instance principal credentials are federated here, which performs
    /// network calls to the metadata and identity services.
    pub fn new(credentials: &Credentials, options: ClientOptions) -> Result<Self, DnsError> {
        let agent = new_agent();

        let (signer, default_endpoint) = match credentials {
            Credentials::ApiKey(profile) => {
                debug!("Creating OCI DNS client using config file profile");
                let signer = RequestSigner::from_pem(profile.key_id(), profile.private_key_pem())?;
                (signer, endpoint_for(&profile.region, "oraclecloud.com"))
            }
            Credentials::InstancePrincipal(source) => {
                debug!("Creating OCI DNS client using instance principal");
                let session = source.federate(&agent)?;
                let endpoint = endpoint_for(
                    &session.region.region_identifier,
                    &session.region.realm_domain_component,
                );
                (session.signer, endpoint)
            }
        };

        Ok(Self::with_signer(
            agent,
            signer,
            options.endpoint.unwrap_or(default_endpoint),
            options.compartment_id,
        ))
    }

    /// Create a client with an explicit signer and endpoint
    pub fn with_signer(
        agent: Agent,
        signer: RequestSigner,
        endpoint: impl Into<String>,
        compartment_id: Option<String>,
    ) -> Self {
        Self {
            agent,
            signer,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            compartment_id,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn zone_url(&self, name: &str) -> String {
        let mut url = format!("{}/{}/zones/{}", self.endpoint, API_VERSION, name);
        if let Some(compartment) = &self.compartment_id {
            url.push_str("?compartmentId=");
            url.push_str(compartment);
        }
        url
    }

    fn records_url(&self, zone: &Zone, record_name: &str) -> String {
        format!(
            "{}/{}/zones/{}/records/{}",
            self.endpoint, API_VERSION, zone.id, record_name
        )
    }
}

impl DnsProvider for OciDnsClient {
    fn get_zone(&self, name: &str) -> Result<Zone, DnsError> {
        let response = execute(
            &self.agent,
            &self.signer,
            HttpMethod::Get,
            &self.zone_url(name),
            None,
        )?;
        let zone: ZoneResponse = response.json()?;
        Ok(Zone {
            id: zone.id,
            name: zone.name,
            compartment_id: zone.compartment_id,
        })
    }

    fn patch_records(
        &self,
        zone: &Zone,
        record_name: &str,
        operations: &[RecordOperation],
    ) -> Result<PatchOutcome, DnsError> {
        let request = PatchRecordsRequest {
            items: operations.iter().map(PatchItem::from).collect(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| DnsError::InvalidRequest(format!("patch request: {}", e)))?;

        let response = execute(
            &self.agent,
            &self.signer,
            HttpMethod::Patch,
            &self.records_url(zone, record_name),
            Some(body),
        )?;
        if !response.is_success() {
            let error = response.error();
            warn!("Patch of {} in zone {} rejected: {}", record_name, zone.name, error);
            return Err(error);
        }

        let records: RecordCollection = response.json()?;
        Ok(PatchOutcome {
            rrset_version: records.items.into_iter().find_map(|r| r.rrset_version),
        })
    }
}

fn endpoint_for(region: &str, realm_domain: &str) -> String {
    format!("https://dns.{}.{}", region, realm_domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_provider::TxtRecord;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            request_id: Some("req-1".to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_error_status_mapping() {
        let body = r#"{"code":"NotAuthorizedOrNotFound","message":"zone not found"}"#;
        assert!(matches!(response(404, body).error(), DnsError::NotFound(_)));
        assert!(matches!(
            response(400, body).error(),
            DnsError::InvalidRequest(_)
        ));
        assert!(matches!(
            response(401, body).error(),
            DnsError::Unauthorized(_)
        ));
        assert!(matches!(
            response(403, body).error(),
            DnsError::Unauthorized(_)
        ));
        match response(429, r#"{"code":"TooManyRequests","message":"slow down"}"#).error() {
            DnsError::Api { status, code, .. } => {
                assert_eq!(status, 429);
                assert_eq!(code, "TooManyRequests");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_detail_includes_request_id() {
        let error = response(404, r#"{"code":"NotFound","message":"gone"}"#).error();
        assert_eq!(error.to_string(), "not found: gone (opc-request-id: req-1)");
    }

    #[test]
    fn test_error_with_non_json_body() {
        let error = response(502, "Bad Gateway\n").error();
        assert!(error.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_patch_item_serialization() {
        let add = RecordOperation::Add(TxtRecord {
            name: "_acme-challenge.example.com".to_string(),
            value: "abc123".to_string(),
            ttl: 60,
        });
        let remove = RecordOperation::Remove {
            name: "_acme-challenge.example.com".to_string(),
            value: "abc123".to_string(),
        };

        let json = serde_json::to_string(&PatchRecordsRequest {
            items: vec![PatchItem::from(&add), PatchItem::from(&remove)],
        })
        .unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"items":[{"operation":"ADD","domain":"_acme-challenge.example.com","rtype":"TXT","rdata":"abc123","ttl":60},"#,
                r#"{"operation":"REMOVE","domain":"_acme-challenge.example.com","rtype":"TXT","rdata":"abc123"}]}"#
            )
        );
    }

    #[test]
    fn test_rrset_version_from_collection() {
        let records: RecordCollection = serde_json::from_str(
            r#"{"items":[{"domain":"x","rdata":"\"abc\"","rrsetVersion":"7","rtype":"TXT","ttl":60}]}"#,
        )
        .unwrap();
        assert_eq!(records.items[0].rrset_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_urls() {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let client = OciDnsClient::with_signer(
            new_agent(),
            RequestSigner::new("id", key),
            "https://dns.us-phoenix-1.oraclecloud.com/",
            Some("ocid1.compartment.oc1..c".to_string()),
        );
        let zone = Zone {
            id: "ocid1.dns-zone.oc1..z".to_string(),
            name: "example.com".to_string(),
            compartment_id: "ocid1.compartment.oc1..c".to_string(),
        };

        assert_eq!(
            client.zone_url("example.com"),
            "https://dns.us-phoenix-1.oraclecloud.com/20180115/zones/example.com?compartmentId=ocid1.compartment.oc1..c"
        );
        assert_eq!(
            client.records_url(&zone, "_acme-challenge.example.com"),
            "https://dns.us-phoenix-1.oraclecloud.com/20180115/zones/ocid1.dns-zone.oc1..z/records/_acme-challenge.example.com"
        );
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(
            endpoint_for("us-ashburn-1", "oraclecloud.com"),
            "https://dns.us-ashburn-1.oraclecloud.com"
        );
    }
}
