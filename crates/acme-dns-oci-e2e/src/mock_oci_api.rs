//! Mock OCI DNS REST API for E2E tests
//!
//! Serves the two endpoints the challenge flow uses (zone lookup and records
//! patch) from in-memory state, and records every request so tests can check
//! what went over the wire. With an [`InstanceIdentity`] installed it also
//! plays the instance metadata service and the X.509 federation endpoint.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

/// A recorded HTTP request for test assertions
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// HTTP method (GET, PATCH, etc.)
    pub method: String,
    /// Request path and query
    pub uri: String,
    /// Request headers, names lowercased
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Value of the first header called `name`
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// A TXT record held by the mock API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub domain: String,
    pub rdata: String,
    pub ttl: u32,
}

/// Identity handed out by the metadata routes
#[derive(Clone, Debug)]
pub struct InstanceIdentity {
    pub certificate: String,
    pub private_key: String,
    pub intermediate: String,
    pub region: String,
    pub realm_domain: String,
    /// Security token returned by federation
    pub token: String,
}

#[derive(Clone, Debug)]
struct StoredZone {
    id: String,
    name: String,
}

#[derive(Default)]
struct ApiState {
    zones: Vec<StoredZone>,
    /// zone id -> records
    records: HashMap<String, Vec<StoredRecord>>,
    requests: Vec<RecordedRequest>,
    /// Canned response returned instead of normal handling
    forced_response: Option<(StatusCode, String)>,
    instance_identity: Option<InstanceIdentity>,
    version: u64,
}

#[derive(Deserialize)]
struct PatchBody {
    items: Vec<PatchItem>,
}

#[derive(Deserialize)]
struct PatchItem {
    operation: String,
    domain: String,
    rtype: String,
    rdata: String,
    ttl: Option<u32>,
}

/// A mock OCI DNS API listening on an ephemeral local port
pub struct MockOciApi {
    addr: SocketAddr,
    state: Arc<Mutex<ApiState>>,
}

impl MockOciApi {
    /// Start the mock API hosting the given zones
    pub async fn start(zones: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock OCI API");
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(Mutex::new(ApiState::default()));
        {
            let mut state = state.lock();
            for zone in zones {
                state.zones.push(StoredZone {
                    id: zone_id(zone),
                    name: zone.to_string(),
                });
            }
        }

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let state = state_clone.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move {
                            let method = req.method().clone();
                            let uri = req.uri().to_string();
                            let headers: Vec<(String, String)> = req
                                .headers()
                                .iter()
                                .map(|(k, v)| {
                                    (k.as_str().to_string(), v.to_str().unwrap_or("").to_string())
                                })
                                .collect();
                            let body = req
                                .into_body()
                                .collect()
                                .await
                                .map(|b| b.to_bytes().to_vec())
                                .unwrap_or_default();

                            let request = RecordedRequest {
                                method: method.to_string(),
                                uri,
                                headers,
                                body,
                            };
                            let (status, body) = handle(&mut state.lock(), request);

                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .header("content-type", "application/json")
                                    .header("opc-request-id", "mock-request")
                                    .body(Full::new(Bytes::from(body)))
                                    .unwrap(),
                            )
                        }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, state }
    }

    /// Base URL to use as the client endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get all recorded requests
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Records currently stored in a zone
    pub fn records(&self, zone: &str) -> Vec<StoredRecord> {
        self.state
            .lock()
            .records
            .get(&zone_id(zone))
            .cloned()
            .unwrap_or_default()
    }

    /// Answer every request with this status and body until cleared
    pub fn force_response(&self, status: StatusCode, body: serde_json::Value) {
        self.state.lock().forced_response = Some((status, body.to_string()));
    }

    pub fn clear_forced_response(&self) {
        self.state.lock().forced_response = None;
    }

    /// Serve `identity` from `/opc/v2/...` and accept federation at `/v1/x509`
    pub fn set_instance_identity(&self, identity: InstanceIdentity) {
        self.state.lock().instance_identity = Some(identity);
    }
}

/// Zone OCID the mock assigns to a zone name
pub fn zone_id(name: &str) -> String {
    format!("ocid1.dns-zone.oc1..{}", name.replace('.', "-"))
}

fn error(status: StatusCode, code: &str, message: &str) -> (StatusCode, String) {
    (
        status,
        json!({ "code": code, "message": message }).to_string(),
    )
}

fn handle(state: &mut ApiState, request: RecordedRequest) -> (StatusCode, String) {
    state.requests.push(request.clone());

    if let Some((status, body)) = &state.forced_response {
        return (*status, body.clone());
    }

    let path = request.uri.split('?').next().unwrap_or_default().to_string();
    if let Some(item) = path.strip_prefix("/opc/v2/") {
        return metadata(state, &request, item);
    }

    let authorized = request
        .header("authorization")
        .is_some_and(|a| a.starts_with("Signature version=\"1\""));
    if !authorized || request.header("date").is_none() {
        return error(
            StatusCode::UNAUTHORIZED,
            "NotAuthenticated",
            "The required information to complete authentication was not provided",
        );
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("POST", ["v1", "x509"]) => federate(state, &request.body),
        ("GET", ["20180115", "zones", name]) => get_zone(state, name),
        ("PATCH", ["20180115", "zones", zone, "records", domain]) => {
            patch_records(state, zone, domain, &request.body)
        }
        _ => error(StatusCode::NOT_FOUND, "NotFound", "Unknown route"),
    }
}

fn metadata(state: &ApiState, request: &RecordedRequest, item: &str) -> (StatusCode, String) {
    if request.header("authorization") != Some("Bearer Oracle") {
        return error(
            StatusCode::UNAUTHORIZED,
            "NotAuthenticated",
            "Metadata requests require the Bearer Oracle header",
        );
    }
    let Some(identity) = &state.instance_identity else {
        return error(StatusCode::NOT_FOUND, "NotFound", "Not running on an instance");
    };

    match item {
        "instance/regionInfo/" => (
            StatusCode::OK,
            json!({
                "realmKey": "oc1",
                "realmDomainComponent": identity.realm_domain,
                "regionKey": "IAD",
                "regionIdentifier": identity.region,
            })
            .to_string(),
        ),
        "identity/cert.pem" => (StatusCode::OK, identity.certificate.clone()),
        "identity/key.pem" => (StatusCode::OK, identity.private_key.clone()),
        "identity/intermediate.pem" => (StatusCode::OK, identity.intermediate.clone()),
        _ => error(StatusCode::NOT_FOUND, "NotFound", "Unknown metadata item"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FederationBody {
    certificate: String,
    public_key: String,
}

fn federate(state: &ApiState, body: &[u8]) -> (StatusCode, String) {
    let Some(identity) = &state.instance_identity else {
        return error(StatusCode::NOT_FOUND, "NotFound", "Federation is not configured");
    };
    let request: FederationBody = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, "InvalidParameter", &e.to_string()),
    };
    if request.certificate.is_empty() || request.public_key.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "InvalidParameter",
            "certificate and publicKey are required",
        );
    }

    (StatusCode::OK, json!({ "token": identity.token }).to_string())
}

fn get_zone(state: &ApiState, name: &str) -> (StatusCode, String) {
    if name.split('.').any(|label| label.starts_with('_')) {
        return error(
            StatusCode::BAD_REQUEST,
            "InvalidParameter",
            "zoneNameOrId is not a valid zone name",
        );
    }

    match state.zones.iter().find(|z| z.name == name) {
        Some(zone) => (
            StatusCode::OK,
            json!({
                "id": zone.id,
                "name": zone.name,
                "compartmentId": "ocid1.compartment.oc1..mock",
                "zoneType": "PRIMARY",
                "scope": "GLOBAL",
                "lifecycleState": "ACTIVE",
            })
            .to_string(),
        ),
        None => error(
            StatusCode::NOT_FOUND,
            "NotAuthorizedOrNotFound",
            "Authorization failed or requested resource not found",
        ),
    }
}

fn patch_records(
    state: &mut ApiState,
    zone_id: &str,
    domain: &str,
    body: &[u8],
) -> (StatusCode, String) {
    if !state.zones.iter().any(|z| z.id == zone_id) {
        return error(
            StatusCode::NOT_FOUND,
            "NotAuthorizedOrNotFound",
            "Authorization failed or requested resource not found",
        );
    }

    let patch: PatchBody = match serde_json::from_slice(&body[..]) {
        Ok(patch) => patch,
        Err(e) => return error(StatusCode::BAD_REQUEST, "InvalidParameter", &e.to_string()),
    };
    if patch
        .items
        .iter()
        .any(|item| item.domain != domain || item.rtype != "TXT")
    {
        return error(
            StatusCode::BAD_REQUEST,
            "InvalidParameter",
            "Record operations must target the TXT records of the path domain",
        );
    }

    let records = state.records.entry(zone_id.to_string()).or_default();
    for item in patch.items {
        match item.operation.as_str() {
            "ADD" => {
                let ttl = item.ttl.unwrap_or(86400);
                match records
                    .iter_mut()
                    .find(|r| r.domain == item.domain && r.rdata == item.rdata)
                {
                    Some(existing) => existing.ttl = ttl,
                    None => records.push(StoredRecord {
                        domain: item.domain,
                        rdata: item.rdata,
                        ttl,
                    }),
                }
            }
            "REMOVE" => records.retain(|r| !(r.domain == item.domain && r.rdata == item.rdata)),
            other => {
                return error(
                    StatusCode::BAD_REQUEST,
                    "InvalidParameter",
                    &format!("Unsupported operation {}", other),
                )
            }
        }
    }

    let items: Vec<serde_json::Value> = records
        .iter()
        .filter(|r| r.domain == domain)
        .map(|r| {
            json!({
                "domain": r.domain,
                "rdata": format!("\"{}\"", r.rdata),
                "rtype": "TXT",
                "ttl": r.ttl,
                "rrsetVersion": (state.version + 1).to_string(),
            })
        })
        .collect();
    state.version += 1;

    (StatusCode::OK, json!({ "items": items }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn signed(method: &Method, uri: &str, body: &str) -> RecordedRequest {
        RecordedRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            headers: vec![
                ("date".into(), "Thu, 01 Jan 2026 00:00:00 GMT".into()),
                ("authorization".into(), "Signature version=\"1\",keyId=\"x\"".into()),
            ],
            body: body.as_bytes().to_vec(),
        }
    }

    fn state_with(zone: &str) -> ApiState {
        ApiState {
            zones: vec![StoredZone {
                id: zone_id(zone),
                name: zone.to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_unsigned_request_rejected() {
        let mut state = state_with("example.com");
        let mut request = signed(&Method::GET, "/20180115/zones/example.com", "");
        request.headers.clear();
        let (status, _) = handle(&mut state, request);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_get_zone_routes() {
        let mut state = state_with("example.com");
        let (status, _) = handle(&mut state, signed(&Method::GET, "/20180115/zones/example.com", ""));
        assert_eq!(status, StatusCode::OK);
        let (status, _) = handle(&mut state, signed(&Method::GET, "/20180115/zones/example.org", ""));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = handle(
            &mut state,
            signed(&Method::GET, "/20180115/zones/_acme-challenge.example.com", ""),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_metadata_requires_bearer_header() {
        let mut state = state_with("example.com");
        state.instance_identity = Some(InstanceIdentity {
            certificate: "cert".into(),
            private_key: "key".into(),
            intermediate: "intermediate".into(),
            region: "us-ashburn-1".into(),
            realm_domain: "oraclecloud.com".into(),
            token: "token".into(),
        });

        let mut request = signed(&Method::GET, "/opc/v2/identity/cert.pem", "");
        let (status, _) = handle(&mut state, request.clone());
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        request.headers = vec![("authorization".into(), "Bearer Oracle".into())];
        let (status, body) = handle(&mut state, request);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "cert");
    }

    #[test]
    fn test_patch_rejects_foreign_domain() {
        let mut state = state_with("example.com");
        let uri = format!(
            "/20180115/zones/{}/records/_acme-challenge.example.com",
            zone_id("example.com")
        );
        let body = r#"{"items":[{"operation":"ADD","domain":"www.example.com","rtype":"TXT","rdata":"x","ttl":60}]}"#;
        let (status, _) = handle(&mut state, signed(&Method::PATCH, &uri, body));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
