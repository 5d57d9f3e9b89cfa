//! # Remote Branch Gateway
//!
//! Queries and mutates the branch namespace of a hosted repository over its
//! REST API.
//!
//! The [`BranchGateway`] trait is the seam the orchestrator and the ref
//! resolver talk to, so tests can swap in an in-memory implementation. The
//! production implementation, [`BitbucketGateway`], wraps one shared
//! `reqwest` blocking client built by [`http_client`] and injected at
//! construction.
//!
//! ## Status handling
//!
//! - 2xx: success, the body is decoded.
//! - 404 on a lookup: [`Lookup::NotFound`], a normal result.
//! - Anything else: [`Error::Gateway`] with method, URL, status and body.
//!   Authentication failures and rate limiting land here too; nothing is
//!   retried.
//! - No response at all: [`Error::Network`].
//!
//! Mutations (`create_branch`, `create_file_commit`) are replaced by
//! [`Effect::Simulated`] values under dry-run. Lookups always hit the network,
//! so callers that must stay offline under dry-run skip them.

use crate::config::{Credentials, RepositoryCoordinates};
use crate::defaults;
use crate::effect::{Effect, ExecutionMode, SimulatedAction};
use crate::error::{Error, Result};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

/// Outcome of a lookup where "not there" is a normal answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// A branch as returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBranch {
    pub name: String,
    pub commit: Option<String>,
}

/// A commit that was made, by either commit path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    /// Commit id, when the backend reports one.
    pub id: Option<String>,
}

/// Parameters of a single-file commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommit {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
}

/// Operations on the hosted repository's branch namespace.
pub trait BranchGateway {
    /// The repository's default branch name.
    fn default_branch(&self) -> Result<String>;

    /// Commit id of the branch tip.
    fn find_branch(&self, name: &str) -> Result<Lookup<String>>;

    /// Commit id a tag points at.
    fn find_tag(&self, name: &str) -> Result<Lookup<String>>;

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.find_branch(name)?.is_found())
    }

    /// Create `name` pointing at `from_commit`.
    ///
    /// Not idempotent: creating an existing branch is an error.
    fn create_branch(&self, name: &str, from_commit: &str) -> Result<Effect<CreatedBranch>>;

    /// Commit one file on `commit.branch`, advancing its tip.
    fn create_file_commit(&self, commit: &FileCommit) -> Result<Effect<CommitReceipt>>;
}

/// Build the shared API client with the fixed per-request timeout.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(defaults::HTTP_TIMEOUT)
        .user_agent(concat!("bb-brancher/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Network {
            url: String::new(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    mainbranch: Option<NamedRef>,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefInfo {
    name: Option<String>,
    target: Option<RefTarget>,
}

#[derive(Debug, Deserialize)]
struct RefTarget {
    hash: Option<String>,
}

/// Bitbucket Cloud (API 2.0) implementation of [`BranchGateway`].
pub struct BitbucketGateway {
    client: Client,
    coordinates: RepositoryCoordinates,
    credentials: Option<Credentials>,
    mode: ExecutionMode,
}

impl BitbucketGateway {
    pub fn new(
        client: Client,
        coordinates: RepositoryCoordinates,
        credentials: Option<Credentials>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            client,
            coordinates,
            credentials,
            mode,
        }
    }

    /// `<base>/repositories/<workspace>/<repo>/<segments...>`, percent-encoded.
    fn repo_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.coordinates.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::config(format!(
                    "baseUrl cannot be used as an API root: {}",
                    self.coordinates.base_url
                ))
            })?
            .pop_if_empty()
            .push("repositories")
            .push(&self.coordinates.workspace)
            .push(&self.coordinates.repo_slug)
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.app_password))
            }
            None => request,
        }
    }

    fn send(&self, method: &str, url: &Url, request: RequestBuilder) -> Result<Response> {
        debug!("{} {}", method, url);
        self.authorized(request).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch a ref; 404 is `NotFound`.
    fn get_ref(&self, kind: &str, name: &str) -> Result<Lookup<String>> {
        let url = self.repo_url(&["refs", kind, name])?;
        let response = self.send("GET", &url, self.client.get(url.clone()))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} '{}' not found", kind, name);
            return Ok(Lookup::NotFound);
        }
        let (status, body) = read_success("GET", &url, response)?;
        let info: RefInfo = decode("GET", &url, status, &body)?;
        match info.target.and_then(|t| t.hash) {
            Some(hash) => Ok(Lookup::Found(hash)),
            None => Err(malformed("GET", &url, status, &body, "missing target.hash")),
        }
    }
}

impl BranchGateway for BitbucketGateway {
    fn default_branch(&self) -> Result<String> {
        let url = self.repo_url(&[])?;
        let response = self.send("GET", &url, self.client.get(url.clone()))?;
        let (status, body) = read_success("GET", &url, response)?;
        let info: RepositoryInfo = decode("GET", &url, status, &body)?;
        Ok(info
            .mainbranch
            .and_then(|b| b.name)
            .or(info.default_branch)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| defaults::FALLBACK_DEFAULT_BRANCH.to_string()))
    }

    fn find_branch(&self, name: &str) -> Result<Lookup<String>> {
        self.get_ref("branches", name)
    }

    fn find_tag(&self, name: &str) -> Result<Lookup<String>> {
        self.get_ref("tags", name)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let url = self.repo_url(&["refs", "branches", name])?;
        let response = self.send("GET", &url, self.client.get(url.clone()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        read_success("GET", &url, response)?;
        Ok(true)
    }

    fn create_branch(&self, name: &str, from_commit: &str) -> Result<Effect<CreatedBranch>> {
        if self.mode.is_dry_run() {
            return Ok(Effect::Simulated(SimulatedAction::CreateBranch {
                name: name.to_string(),
                from: from_commit.to_string(),
            }));
        }

        let url = self.repo_url(&["refs", "branches"])?;
        let payload = json!({ "name": name, "target": { "hash": from_commit } });
        let response = self.send("POST", &url, self.client.post(url.clone()).json(&payload))?;
        let (status, body) = read_success("POST", &url, response)?;

        // Some servers answer 201 with an empty body.
        let info: Option<RefInfo> = if body.trim().is_empty() {
            None
        } else {
            Some(decode("POST", &url, status, &body)?)
        };
        let (created_name, commit) = match info {
            Some(info) => (info.name, info.target.and_then(|t| t.hash)),
            None => (None, None),
        };
        Ok(Effect::Applied(CreatedBranch {
            name: created_name.unwrap_or_else(|| name.to_string()),
            commit,
        }))
    }

    fn create_file_commit(&self, commit: &FileCommit) -> Result<Effect<CommitReceipt>> {
        if self.mode.is_dry_run() {
            return Ok(Effect::Simulated(SimulatedAction::CreateCommit {
                branch: commit.branch.clone(),
                message: commit.message.clone(),
                file_path: commit.path.clone(),
            }));
        }

        let url = self.repo_url(&["src"])?;
        let form = reqwest::blocking::multipart::Form::new()
            .text(commit.path.clone(), commit.content.clone())
            .text("branch", commit.branch.clone())
            .text("message", commit.message.clone());
        let response = self.send("POST", &url, self.client.post(url.clone()).multipart(form))?;

        let id = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(commit_id_from_location);
        read_success("POST", &url, response)?;
        Ok(Effect::Applied(CommitReceipt { id }))
    }
}

/// Last path segment of a `.../commit/<hash>` location.
fn commit_id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
}

/// Read the body of a 2xx response, or turn the response into a `Gateway` error.
fn read_success(method: &str, url: &Url, response: Response) -> Result<(u16, String)> {
    let status = response.status();
    let body = response.text().map_err(|e| Error::Network {
        url: url.to_string(),
        message: format!("Failed to read response body: {}", e),
    })?;
    if !status.is_success() {
        return Err(Error::Gateway {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok((status.as_u16(), body))
}

fn decode<T: DeserializeOwned>(method: &str, url: &Url, status: u16, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| malformed(method, url, status, body, &e.to_string()))
}

fn malformed(method: &str, url: &Url, status: u16, body: &str, reason: &str) -> Error {
    Error::Gateway {
        method: method.to_string(),
        url: url.to_string(),
        status,
        body: format!("unexpected response ({}): {}", reason, body),
    }
}
