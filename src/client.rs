//! Management API client.
//! Imports bundles and deploys revisions through the Apigee management API.

use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

use crate::archive::AssetKind;
use crate::error::{Error, Result};

const DEFAULT_STATUS_MESSAGE: &str = "management API request failed";

/// Connection settings for the management API.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub api_host: Url,
    pub org: String,
    pub token: String,
    pub timeout: Option<Duration>,
}

/// A revision created by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRevision {
    pub name: String,
    pub revision: String,
}

/// A deployment request for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub kind: AssetKind,
    pub name: String,
    pub revision: String,
    pub environment: String,
    pub service_account: String,
}

/// Remote calls the deployment pipeline needs.
pub trait ManagementClient {
    /// Imports the zip bundle at `archive` as a new revision of `name`.
    fn import_bundle(&self, kind: AssetKind, name: &str, archive: &Path)
        -> Result<ImportedRevision>;

    /// Deploys a revision to one environment.
    fn deploy(&self, request: &DeployRequest) -> Result<()>;
}

/// HTTP transport for the management API. One request per call, no retries.
pub struct HttpManagementClient {
    options: ConnectOptions,
    client: Client,
}

impl std::fmt::Debug for HttpManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpManagementClient")
            .field("api_host", &self.options.api_host)
            .field("org", &self.options.org)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    name: String,
    revision: serde_json::Value,
}

impl HttpManagementClient {
    /// Builds the HTTP client and checks that the organization is reachable
    /// with the given token.
    ///
    /// # Errors
    /// * `Error::RemoteConnectError` if the client cannot be built or the
    ///   organization lookup fails
    pub fn connect(options: ConnectOptions) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| Error::RemoteConnectError {
            message: format!("failed to create HTTP client: {}", e),
            status: None,
        })?;
        let this = Self { options, client };

        let url = this.url(&["v1", "organizations", this.options.org.as_str()])?;
        debug!("GET {}", url);
        let response = this
            .client
            .get(url)
            .header(AUTHORIZATION, this.bearer())
            .send()
            .map_err(|e| Error::RemoteConnectError {
                message: format!("HTTP request failed: {}", e),
                status: None,
            })?;
        let (status, body) = read_response(response);
        if !(200..300).contains(&status) {
            return Err(Error::RemoteConnectError {
                message: failure_message(status, &body),
                status: Some(status),
            });
        }
        Ok(this)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.options.token)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.options.api_host.clone();
        url.path_segments_mut()
            .map_err(|_| Error::RemoteConnectError {
                message: format!("invalid API host: {}", self.options.api_host),
                status: None,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl ManagementClient for HttpManagementClient {
    fn import_bundle(
        &self,
        kind: AssetKind,
        name: &str,
        archive: &Path,
    ) -> Result<ImportedRevision> {
        let import_error = |message: String, status: Option<u16>| Error::RemoteImportError {
            message,
            status,
        };

        let mut url = self
            .url(&["v1", "organizations", self.options.org.as_str(), kind.collection()])
            .map_err(|e| import_error(e.to_string(), None))?;
        url.query_pairs_mut().append_pair("name", name).append_pair("action", "import");

        let form = multipart::Form::new()
            .file("file", archive)
            .map_err(|e| import_error(format!("cannot read bundle: {}", e), None))?;

        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .map_err(|e| import_error(format!("HTTP request failed: {}", e), None))?;

        let (status, body) = read_response(response);
        if !(200..300).contains(&status) {
            return Err(import_error(failure_message(status, &body), Some(status)));
        }

        let parsed: ImportResponse = serde_json::from_str(&body)
            .map_err(|e| import_error(format!("failed to parse response: {}", e), Some(status)))?;
        let revision = match parsed.revision {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(import_error(
                    format!("unexpected revision in response: {}", other),
                    Some(status),
                ))
            }
        };

        Ok(ImportedRevision { name: parsed.name, revision })
    }

    fn deploy(&self, request: &DeployRequest) -> Result<()> {
        let deploy_error = |message: String, status: Option<u16>| Error::RemoteDeployError {
            environment: request.environment.clone(),
            message,
            status,
        };

        let mut url = self
            .url(&[
                "v1",
                "organizations",
                self.options.org.as_str(),
                "environments",
                request.environment.as_str(),
                request.kind.collection(),
                request.name.as_str(),
                "revisions",
                request.revision.as_str(),
                "deployments",
            ])
            .map_err(|e| deploy_error(e.to_string(), None))?;
        url.query_pairs_mut()
            .append_pair("override", "true")
            .append_pair("serviceAccount", &request.service_account);

        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .map_err(|e| deploy_error(format!("HTTP request failed: {}", e), None))?;

        let (status, body) = read_response(response);
        if !(200..300).contains(&status) {
            return Err(deploy_error(failure_message(status, &body), Some(status)));
        }
        Ok(())
    }
}

fn read_response(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    (status, response.text().unwrap_or_default())
}

fn failure_message(status: u16, body: &str) -> String {
    extract_error_message(body).unwrap_or_else(|| {
        if !body.trim().is_empty() {
            body.to_string()
        } else if status >= 500 {
            "Server error".to_string()
        } else {
            format!("{} (status {})", DEFAULT_STATUS_MESSAGE, status)
        }
    })
}

fn extract_error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<serde_json::Value>(body).ok()?;

    if let Some(msg) = parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(|message| message.as_str())
    {
        return Some(msg.to_string());
    }

    parsed.get("message").and_then(|message| message.as_str()).map(ToOwned::to_owned)
}
