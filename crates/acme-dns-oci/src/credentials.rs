//! Credential selection for the OCI DNS client
//!
//! Two mutually exclusive sources are supported:
//! - an API key profile from the OCI CLI configuration file (`~/.oci/config`)
//! - the instance principal identity of the compute instance we run on
//!
//! The choice is made once, up front, and handed to the client constructor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ChallengeError;
use crate::instance_principal::InstancePrincipalSource;
use crate::signer::parse_private_key;

/// Profile used when none is requested
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Authentication options as supplied by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    /// Explicit OCI configuration file
    pub config_file: Option<PathBuf>,
    /// Profile inside the configuration file
    pub profile: Option<String>,
    /// Authenticate as the compute instance
    pub instance_principal: bool,
}

/// Reject conflicting authentication options
///
/// Runs before any credential is loaded or any request is made.
pub fn validate_options(options: &AuthOptions) -> Result<(), ChallengeError> {
    if options.instance_principal && options.config_file.is_some() {
        return Err(ChallengeError::configuration(
            "conflicting arguments: '--instance-principal' and '--oci-config' cannot be provided together",
        ));
    }
    Ok(())
}

/// Resolved credentials passed to the client constructor
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Static API key from an OCI configuration file profile
    ApiKey(ApiKeyProfile),
    /// Ambient workload identity of the compute instance
    InstancePrincipal(InstancePrincipalSource),
}

impl Credentials {
    /// Validate `options` and pick the matching credential source
    pub fn from_options(options: &AuthOptions) -> Result<Self, ChallengeError> {
        validate_options(options)?;

        if options.instance_principal {
            debug!("Using instance principal authentication");
            return Ok(Self::InstancePrincipal(InstancePrincipalSource::new()));
        }

        let path = match &options.config_file {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        let profile = options.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        debug!("Using OCI config file {:?}, profile {}", path, profile);
        let profile = ApiKeyProfile::load(&path, profile)?;
        profile.check_key()?;
        Ok(Self::ApiKey(profile))
    }
}

/// The default OCI CLI configuration path, `~/.oci/config`
pub fn default_config_path() -> Result<PathBuf, ChallengeError> {
    dirs::home_dir()
        .map(|home| home.join(".oci").join("config"))
        .ok_or_else(|| ChallengeError::configuration("cannot locate home directory for ~/.oci/config"))
}

/// An API key profile read from the OCI configuration file
#[derive(Clone)]
pub struct ApiKeyProfile {
    pub user: String,
    pub tenancy: String,
    pub fingerprint: String,
    pub region: String,
    pub key_file: PathBuf,
    private_key_pem: String,
}

impl std::fmt::Debug for ApiKeyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyProfile")
            .field("user", &self.user)
            .field("tenancy", &self.tenancy)
            .field("fingerprint", &self.fingerprint)
            .field("region", &self.region)
            .field("key_file", &self.key_file)
            .finish_non_exhaustive()
    }
}

impl ApiKeyProfile {
    /// Read `profile` from the configuration file at `path` and load its key
    pub fn load(path: &Path, profile: &str) -> Result<Self, ChallengeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChallengeError::configuration(format!(
                "failed to read OCI config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let sections = parse_config(&content);
        let values = profile_values(&sections, profile).ok_or_else(|| {
            ChallengeError::configuration(format!(
                "profile '{}' not found in {}",
                profile,
                path.display()
            ))
        })?;

        let required = |key: &str| {
            values.get(key).cloned().ok_or_else(|| {
                ChallengeError::configuration(format!(
                    "profile '{}' in {} is missing '{}'",
                    profile,
                    path.display(),
                    key
                ))
            })
        };

        let user = required("user")?;
        let tenancy = required("tenancy")?;
        let fingerprint = required("fingerprint")?;
        let region = required("region")?;
        let key_file = expand_path(&required("key_file")?, path)?;

        if values.get("pass_phrase").is_some_and(|p| !p.is_empty()) {
            return Err(ChallengeError::configuration(
                "encrypted API keys (pass_phrase) are not supported",
            ));
        }

        let private_key_pem = std::fs::read_to_string(&key_file).map_err(|e| {
            ChallengeError::configuration(format!(
                "failed to read key file {}: {}",
                key_file.display(),
                e
            ))
        })?;

        Ok(Self {
            user,
            tenancy,
            fingerprint,
            region,
            key_file,
            private_key_pem,
        })
    }

    /// Key id in the form OCI expects: `tenancy/user/fingerprint`
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }

    /// Validate that the key file holds a usable signing key
    pub fn check_key(&self) -> Result<(), ChallengeError> {
        parse_private_key(&self.private_key_pem)
            .map(|_| ())
            .map_err(|e| ChallengeError::configuration(format!("{}: {}", self.key_file.display(), e)))
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }
}

type Sections = HashMap<String, HashMap<String, String>>;

/// Parse the INI-style OCI configuration file
fn parse_config(content: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

/// Values of `profile`, falling back to DEFAULT for keys it does not set
fn profile_values(sections: &Sections, profile: &str) -> Option<HashMap<String, String>> {
    let own = sections.get(profile)?;
    let mut values = sections.get(DEFAULT_PROFILE).cloned().unwrap_or_default();
    values.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(values)
}

/// Expand `~` and resolve relative key paths against the config file's directory
fn expand_path(raw: &str, config_path: &Path) -> Result<PathBuf, ChallengeError> {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return Ok(path);
    }
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = "\
[DEFAULT]
user=ocid1.user.oc1..default
tenancy=ocid1.tenancy.oc1..tenant
fingerprint=aa:bb:cc
region=us-ashburn-1
key_file=key.pem

# a comment
[OTHER]
user = ocid1.user.oc1..other
region = eu-frankfurt-1
";

    #[test]
    fn test_validate_conflicting_options() {
        let options = AuthOptions {
            config_file: Some(PathBuf::from("/etc/oci/config")),
            profile: None,
            instance_principal: true,
        };
        assert!(matches!(
            validate_options(&options),
            Err(ChallengeError::Configuration(_))
        ));
    }

    #[test]
    fn test_profile_ignored_with_instance_principal() {
        // A leftover profile setting does not block instance principal runs
        let options = AuthOptions {
            config_file: None,
            profile: Some("OTHER".into()),
            instance_principal: true,
        };
        assert!(validate_options(&options).is_ok());
        assert!(matches!(
            Credentials::from_options(&options),
            Ok(Credentials::InstancePrincipal(_))
        ));
    }

    #[test]
    fn test_validate_accepts_single_source() {
        assert!(validate_options(&AuthOptions::default()).is_ok());
        assert!(validate_options(&AuthOptions {
            instance_principal: true,
            ..Default::default()
        })
        .is_ok());
        assert!(validate_options(&AuthOptions {
            config_file: Some(PathBuf::from("config")),
            profile: Some("OTHER".into()),
            instance_principal: false,
        })
        .is_ok());
    }

    #[test]
    fn test_instance_principal_selected() {
        let options = AuthOptions {
            instance_principal: true,
            ..Default::default()
        };
        assert!(matches!(
            Credentials::from_options(&options),
            Ok(Credentials::InstancePrincipal(_))
        ));
    }

    #[test]
    fn test_profile_inherits_default() {
        let sections = parse_config(CONFIG);
        let values = profile_values(&sections, "OTHER").unwrap();
        assert_eq!(values["user"], "ocid1.user.oc1..other");
        assert_eq!(values["region"], "eu-frankfurt-1");
        assert_eq!(values["tenancy"], "ocid1.tenancy.oc1..tenant");
        assert!(profile_values(&sections, "MISSING").is_none());
    }

    #[test]
    fn test_relative_key_file_resolves_next_to_config() {
        let path = expand_path("key.pem", Path::new("/home/me/.oci/config")).unwrap();
        assert_eq!(path, PathBuf::from("/home/me/.oci/key.pem"));
        let path = expand_path("/keys/key.pem", Path::new("/home/me/.oci/config")).unwrap();
        assert_eq!(path, PathBuf::from("/keys/key.pem"));
    }

    #[test]
    fn test_load_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(file, "{}", CONFIG).unwrap();

        let err = ApiKeyProfile::load(&config_path, "DEFAULT").unwrap_err();
        assert!(err.to_string().contains("failed to read key file"));
    }

    #[test]
    fn test_load_missing_required_key() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config");
        std::fs::write(&config_path, "[DEFAULT]\nuser=u\n").unwrap();

        let err = ApiKeyProfile::load(&config_path, "DEFAULT").unwrap_err();
        assert!(err.to_string().contains("missing 'tenancy'"));
    }

    #[test]
    fn test_load_rejects_pass_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config");
        std::fs::write(
            &config_path,
            format!("{}pass_phrase=secret\n", CONFIG.replace("[OTHER]", "[IGNORED]")),
        )
        .unwrap();

        let err = ApiKeyProfile::load(&config_path, "IGNORED").unwrap_err();
        assert!(err.to_string().contains("pass_phrase"));
    }
}
