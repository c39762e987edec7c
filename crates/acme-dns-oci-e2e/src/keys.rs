//! Test credential generation
//!
//! Creates API signing keys and OCI configuration files in a temporary
//! directory, and instance identity certificates with `rcgen`.

use std::path::PathBuf;

use rcgen::{CertificateParams, DnType, KeyPair};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tempfile::TempDir;

/// Tenancy written into generated configuration files
pub const TEST_TENANCY: &str = "ocid1.tenancy.oc1..aaaatest";
/// User written into generated configuration files
pub const TEST_USER: &str = "ocid1.user.oc1..aaaatest";
/// API key fingerprint written into generated configuration files
pub const TEST_FINGERPRINT: &str = "12:34:56:78:9a:bc:de:f0";

/// A signing key plus an OCI configuration file that points at it
pub struct TestKeys {
    /// Keeps the files alive for the lifetime of the test
    pub dir: TempDir,
    pub private_key: RsaPrivateKey,
    pub key_path: PathBuf,
    pub config_path: PathBuf,
}

/// Key encoding written to the key file
#[derive(Debug, Clone, Copy)]
pub enum KeyFormat {
    Pkcs8,
    Pkcs1,
}

impl TestKeys {
    /// Generate a key and a config file with a DEFAULT and a `DNS` profile
    pub fn generate() -> Self {
        Self::generate_with(KeyFormat::Pkcs8)
    }

    pub fn generate_with(format: KeyFormat) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        // Small keys keep debug-build tests fast; the mock API does not check sizes
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("Failed to generate key");

        let pem = match format {
            KeyFormat::Pkcs8 => private_key
                .to_pkcs8_pem(LineEnding::LF)
                .expect("Failed to encode key")
                .to_string(),
            KeyFormat::Pkcs1 => private_key
                .to_pkcs1_pem(LineEnding::LF)
                .expect("Failed to encode key")
                .to_string(),
        };
        let key_path = dir.path().join("oci_api_key.pem");
        std::fs::write(&key_path, pem).expect("Failed to write key");

        let config_path = dir.path().join("config");
        std::fs::write(
            &config_path,
            format!(
                "[DEFAULT]\n\
                 user={user}\n\
                 fingerprint={fingerprint}\n\
                 tenancy={tenancy}\n\
                 region=us-ashburn-1\n\
                 key_file=oci_api_key.pem\n\
                 \n\
                 [DNS]\n\
                 region=eu-frankfurt-1\n",
                user = TEST_USER,
                fingerprint = TEST_FINGERPRINT,
                tenancy = TEST_TENANCY,
            ),
        )
        .expect("Failed to write config");

        Self {
            dir,
            private_key,
            key_path,
            config_path,
        }
    }

    /// Key id the client is expected to sign with
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", TEST_TENANCY, TEST_USER, TEST_FINGERPRINT)
    }
}

/// Self-signed certificate shaped like an OCI instance identity certificate
pub fn instance_certificate(tenancy: &str) -> String {
    let key = KeyPair::generate().expect("Failed to generate certificate key");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("Invalid params");
    params
        .distinguished_name
        .push(DnType::CommonName, "ocid1.instance.oc1.iad.test");
    params
        .distinguished_name
        .push(DnType::OrganizationalUnitName, format!("opc-tenant:{}", tenancy));
    params
        .self_signed(&key)
        .expect("Failed to self-sign certificate")
        .pem()
}
