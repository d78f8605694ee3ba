//! Credential resolution for named profiles.
//!
//! Lookup order for a profile:
//!
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`,
//!    for the `default` profile only
//! 2. `role_arn` + `source_profile`: the source profile is resolved (it may
//!    itself assume a role) and STS `AssumeRole` is called with its keys
//! 3. static keys from the shared credentials file
//!    (`AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials`) or the config
//!    file (`AWS_CONFIG_FILE` or `~/.aws/config`, `[profile name]` sections)
//! 4. `credential_process`: the command's JSON output
//!
//! Settings in the credentials file override the same profile's settings in
//! the config file.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::client::{service_endpoint, QueryClient, DEFAULT_TIMEOUT};
use crate::error::InventoryError;
use crate::providers::sts;

/// Name of the profile that also reads credentials from the environment.
pub const DEFAULT_PROFILE: &str = "default";

/// Region of the STS endpoint when neither profile names one.
pub const DEFAULT_STS_REGION: &str = "us-east-1";

/// Longest `source_profile` chain followed before giving up.
const MAX_ROLE_CHAIN: usize = 8;

/// Static access keys for signing requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: None,
        }
    }

    /// Access key id with everything but the edges masked, for logs.
    pub fn masked_key_id(&self) -> String {
        mask(&self.access_key_id)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.masked_key_id())
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Role assumption settings of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleConfig {
    pub role_arn: String,
    /// Profile whose credentials call `AssumeRole`.
    pub source_profile: String,
    pub external_id: Option<String>,
    pub role_session_name: Option<String>,
    pub duration_seconds: Option<u32>,
    /// Region of the STS endpoint.
    pub region: Option<String>,
}

/// How a profile obtains its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static(Credentials),
    AssumeRole(AssumeRoleConfig),
    /// Shell command printing credentials as JSON.
    Process(String),
}

type Section = HashMap<String, String>;

/// Locations of the shared credentials and config files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFiles {
    pub credentials: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl CredentialFiles {
    pub fn new(credentials: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            credentials: Some(credentials.into()),
            config: Some(config.into()),
        }
    }

    /// Standard locations, honoring `AWS_SHARED_CREDENTIALS_FILE` and `AWS_CONFIG_FILE`.
    pub fn from_env() -> Self {
        let aws_dir = dirs::home_dir().map(|home| home.join(".aws"));
        let credentials = env::var_os("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("credentials")));
        let config = env::var_os("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("config")));
        Self {
            credentials,
            config,
        }
    }

    /// Settings of `profile`, config file first, credentials file on top.
    fn section(&self, profile: &str) -> Option<Section> {
        let mut merged: Option<Section> = None;
        for path in [&self.config, &self.credentials].into_iter().flatten() {
            if let Some(section) = read_section(path, profile) {
                merged.get_or_insert_with(HashMap::new).extend(section);
            }
        }
        merged
    }

    /// Region configured for `profile`, if any.
    pub fn region(&self, profile: &str) -> Option<String> {
        self.section(profile)?.get("region").cloned()
    }

    /// Decide how `profile` obtains its credentials.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Credentials` if the profile is missing, names
    /// a role without a `source_profile`, or uses an unsupported method.
    pub fn source(&self, profile: &str) -> Result<CredentialSource, InventoryError> {
        let section = self.section(profile).ok_or_else(|| {
            InventoryError::Credentials(format!("no credentials found for profile '{}'", profile))
        })?;

        if let Some(role_arn) = section.get("role_arn") {
            let source_profile = section.get("source_profile").ok_or_else(|| {
                InventoryError::Credentials(format!(
                    "profile '{}' sets role_arn without source_profile",
                    profile
                ))
            })?;
            return Ok(CredentialSource::AssumeRole(AssumeRoleConfig {
                role_arn: role_arn.clone(),
                source_profile: source_profile.clone(),
                external_id: section.get("external_id").cloned(),
                role_session_name: section.get("role_session_name").cloned(),
                duration_seconds: section.get("duration_seconds").and_then(|s| s.parse().ok()),
                region: section.get("region").cloned(),
            }));
        }

        if let Some(creds) = static_keys(&section) {
            return Ok(CredentialSource::Static(creds));
        }

        if let Some(command) = section.get("credential_process") {
            return Ok(CredentialSource::Process(command.clone()));
        }

        if section.contains_key("sso_session") || section.contains_key("sso_start_url") {
            return Err(InventoryError::Credentials(format!(
                "profile '{}' uses SSO, which is not supported; export temporary credentials instead",
                profile
            )));
        }

        Err(InventoryError::Credentials(format!(
            "no credentials found for profile '{}'",
            profile
        )))
    }

    /// Static keys of `profile`, ignoring any other method it configures.
    fn static_credentials(&self, profile: &str) -> Option<Credentials> {
        static_keys(&self.section(profile)?)
    }
}

fn static_keys(section: &Section) -> Option<Credentials> {
    Some(Credentials {
        access_key_id: section.get("aws_access_key_id")?.clone(),
        secret_access_key: section.get("aws_secret_access_key")?.clone(),
        session_token: section.get("aws_session_token").cloned(),
    })
}

/// Resolves and caches credentials per profile.
#[derive(Debug)]
pub struct CredentialResolver {
    files: CredentialFiles,
    use_env: bool,
    timeout: Duration,
    sts_endpoint: Option<String>,
    cache: Mutex<HashMap<String, Credentials>>,
}

impl CredentialResolver {
    pub fn new(files: CredentialFiles) -> Self {
        Self {
            files,
            use_env: true,
            timeout: DEFAULT_TIMEOUT,
            sts_endpoint: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver over the standard file locations.
    pub fn from_env() -> Self {
        Self::new(CredentialFiles::from_env())
    }

    /// Ignore `AWS_ACCESS_KEY_ID` and friends, even for `default`.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `AssumeRole` calls to `endpoint` instead of the regional STS endpoint.
    pub fn with_sts_endpoint(mut self, endpoint: &str) -> Self {
        self.sts_endpoint = Some(endpoint.to_string());
        self
    }

    /// Credentials for `profile`, following role chains.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Credentials` for unresolvable profiles, loops
    /// in `source_profile`, or a failing `credential_process`; STS failures
    /// surface as `InventoryError::Provider`.
    pub async fn resolve(&self, profile: &str) -> Result<Credentials, InventoryError> {
        if let Some(creds) = self.cached(profile) {
            return Ok(creds);
        }

        let mut roles: Vec<AssumeRoleConfig> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = profile.to_string();

        let mut creds = loop {
            if !visited.insert(current.clone()) || roles.len() > MAX_ROLE_CHAIN {
                return Err(InventoryError::Credentials(format!(
                    "source_profile chain of '{}' loops at '{}'",
                    profile, current
                )));
            }
            if let Some(creds) = self.cached(&current) {
                break creds;
            }
            if self.use_env && current == DEFAULT_PROFILE {
                if let Some(creds) = load_from_env() {
                    debug!("loaded credentials from environment");
                    break creds;
                }
            }

            match self.files.source(&current)? {
                CredentialSource::Static(creds) => {
                    debug!(profile = %current, "loaded static credentials");
                    break creds;
                }
                CredentialSource::Process(command) => {
                    debug!(profile = %current, "running credential_process");
                    break run_credential_process(&command).await?;
                }
                CredentialSource::AssumeRole(config) => {
                    let source = config.source_profile.clone();
                    if source == current {
                        let own = self.files.static_credentials(&current).ok_or_else(|| {
                            InventoryError::Credentials(format!(
                                "profile '{}' is its own source_profile but has no keys",
                                current
                            ))
                        })?;
                        roles.push(config);
                        break own;
                    }
                    roles.push(config);
                    current = source;
                }
            }
        };

        for config in roles.iter().rev() {
            let region = config
                .region
                .clone()
                .or_else(|| self.files.region(&config.source_profile))
                .unwrap_or_else(|| DEFAULT_STS_REGION.to_string());
            let endpoint = self
                .sts_endpoint
                .clone()
                .unwrap_or_else(|| service_endpoint(sts::SERVICE, &region));
            let client = QueryClient::new(self.timeout, sts::SERVICE, &region, &endpoint, creds)?;
            creds = sts::assume_role(&client, config).await?;
            debug!(role_arn = %config.role_arn, access_key = %creds.masked_key_id(), "assumed role");
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(profile.to_string(), creds.clone());
        }
        Ok(creds)
    }

    fn cached(&self, profile: &str) -> Option<Credentials> {
        self.cache.lock().ok()?.get(profile).cloned()
    }
}

/// Resolve credentials for `profile` from the environment and standard files.
pub async fn load_credentials(profile: &str) -> Result<Credentials, InventoryError> {
    CredentialResolver::from_env().resolve(profile).await
}

fn load_from_env() -> Option<Credentials> {
    let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    Some(Credentials {
        access_key_id,
        secret_access_key,
        session_token: env::var("AWS_SESSION_TOKEN").ok(),
    })
}

/// JSON printed by a `credential_process` command.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessOutput {
    version: Option<i64>,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

/// Run `command` through the shell and read credentials from its stdout.
pub async fn run_credential_process(command: &str) -> Result<Credentials, InventoryError> {
    #[cfg(not(windows))]
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await;

    #[cfg(windows)]
    let output = tokio::process::Command::new("cmd")
        .arg("/C")
        .arg(command)
        .output()
        .await;

    let output = output.map_err(|e| {
        InventoryError::Credentials(format!("failed to run credential_process: {}", e))
    })?;
    if !output.status.success() {
        return Err(InventoryError::Credentials(format!(
            "credential_process failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_process_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_process_output(stdout: &str) -> Result<Credentials, InventoryError> {
    let parsed: ProcessOutput = serde_json::from_str(stdout).map_err(|e| {
        InventoryError::Credentials(format!("invalid credential_process output: {}", e))
    })?;
    if let Some(version) = parsed.version.filter(|v| *v != 1) {
        return Err(InventoryError::Credentials(format!(
            "unsupported credential_process version {}",
            version
        )));
    }
    Ok(Credentials {
        access_key_id: parsed.access_key_id,
        secret_access_key: parsed.secret_access_key,
        session_token: parsed.session_token,
    })
}

fn read_section(path: &Path, profile: &str) -> Option<Section> {
    let content = fs::read_to_string(path).ok()?;
    parse_ini(&content).remove(profile)
}

/// Parse an INI file into sections; `[profile name]` headers are stored as `name`.
fn parse_ini(content: &str) -> HashMap<String, Section> {
    let mut sections: HashMap<String, Section> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header.strip_prefix("profile ").unwrap_or(header).trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
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
