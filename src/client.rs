//! HTTP client wrappers for signed Query-protocol requests.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::Client;
use tracing::{debug, trace};

use crate::credentials::{CredentialResolver, Credentials};
use crate::error::InventoryError;
use crate::provider::SourceFactory;

/// Default timeout for provider requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// SigV4 signing name of the EC2 service.
const EC2_SERVICE: &str = "ec2";

/// Body content type of Query-protocol requests.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Regional endpoint of `service`.
pub fn service_endpoint(service: &str, region: &str) -> String {
    let domain = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };
    format!("https://{}.{}.{}", service, region, domain)
}

/// Regional EC2 endpoint.
pub fn default_endpoint(region: &str) -> String {
    service_endpoint(EC2_SERVICE, region)
}

/// HTTP client for one service, region and set of credentials.
///
/// Every request is a form-encoded POST to the endpoint root, signed with
/// SigV4 for `service`.
#[derive(Debug, Clone)]
pub struct QueryClient {
    inner: Client,
    endpoint: String,
    region: String,
    service: &'static str,
    credentials: Credentials,
}

impl QueryClient {
    pub fn new(
        timeout: Duration,
        service: &'static str,
        region: &str,
        endpoint: &str,
        credentials: Credentials,
    ) -> Result<Self, reqwest::Error> {
        let inner = Client::builder().timeout(timeout).build()?;
        debug!(
            service,
            region,
            endpoint,
            access_key = %credentials.masked_key_id(),
            "creating client"
        );
        Ok(Self {
            inner,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            region: region.to_string(),
            service,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        self.service
    }

    /// POST a signed form body to the endpoint root.
    ///
    /// Returns the status code and body text; non-success statuses are left
    /// for the caller to interpret.
    pub async fn post_form(&self, body: String) -> Result<(u16, String), InventoryError> {
        let url = format!("{}/", self.endpoint);
        let parsed = url::Url::parse(&url)
            .map_err(|e| InventoryError::InvalidArgument(format!("endpoint {}: {}", url, e)))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(InventoryError::InvalidArgument(format!(
                    "endpoint {} has no host",
                    url
                )))
            }
        };

        let headers = [("host", host.as_str()), ("content-type", FORM_CONTENT_TYPE)];
        let signed = self.sign("POST", parsed.path(), &headers, body.as_bytes())?;

        let mut request = self
            .inner
            .post(&url)
            .header("content-type", FORM_CONTENT_TYPE);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        trace!(url = %url, body = %body, "sending request");
        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(service = self.service, status, bytes = text.len(), "received response");

        Ok((status, text))
    }

    /// Compute SigV4 headers for a request.
    fn sign(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>, InventoryError> {
        let creds = aws_credential_types::Credentials::new(
            &self.credentials.access_key_id,
            &self.credentials.secret_access_key,
            self.credentials.session_token.clone(),
            None,
            "ec2-inventory",
        );
        let identity: Identity = creds.into();

        let params = SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| InventoryError::Signing(e.to_string()))?
            .into();

        let signable = SignableRequest::new(
            method,
            path,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| InventoryError::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| InventoryError::Signing(e.to_string()))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

/// EC2 client scoped to one region and one set of credentials.
#[derive(Debug, Clone)]
pub struct Ec2Client {
    query: QueryClient,
}

impl Ec2Client {
    /// Create a client with the given timeout, region, endpoint and credentials.
    pub fn new(
        timeout: Duration,
        region: &str,
        endpoint: &str,
        credentials: Credentials,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            query: QueryClient::new(timeout, EC2_SERVICE, region, endpoint, credentials)?,
        })
    }

    /// Create a client for the regional endpoint with the default timeout.
    pub fn for_region(region: &str, credentials: Credentials) -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_TIMEOUT, region, &default_endpoint(region), credentials)
    }

    pub fn endpoint(&self) -> &str {
        self.query.endpoint()
    }

    pub fn region(&self) -> &str {
        self.query.region()
    }

    pub fn query(&self) -> &QueryClient {
        &self.query
    }
}

/// Builds an [`Ec2Client`] per (profile, region) fetch unit.
///
/// Credentials are resolved once per profile and reused across regions.
#[derive(Debug)]
pub struct Ec2ClientFactory {
    timeout: Duration,
    endpoint_url: Option<String>,
    credentials: Option<Credentials>,
    resolver: CredentialResolver,
}

impl Default for Ec2ClientFactory {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            endpoint_url: None,
            credentials: None,
            resolver: CredentialResolver::from_env(),
        }
    }
}

impl Ec2ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send every request to `endpoint_url` instead of the regional endpoint.
    pub fn with_endpoint_url(mut self, endpoint_url: &str) -> Self {
        self.endpoint_url = Some(endpoint_url.to_string());
        self
    }

    /// Use fixed credentials for every profile instead of resolving them.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Resolve profile credentials with `resolver`.
    pub fn with_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = resolver;
        self
    }
}

#[async_trait]
impl SourceFactory for Ec2ClientFactory {
    type Source = Ec2Client;

    async fn connect(&self, profile: &str, region: &str) -> Result<Ec2Client, InventoryError> {
        let credentials = match &self.credentials {
            Some(creds) => creds.clone(),
            None => self.resolver.resolve(profile).await?,
        };
        let endpoint = self
            .endpoint_url
            .clone()
            .unwrap_or_else(|| default_endpoint(region));
        Ok(Ec2Client::new(self.timeout, region, &endpoint, credentials)?)
    }
}
