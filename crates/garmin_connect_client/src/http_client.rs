//! HTTP client implementation for Garmin Connect.
//!
//! This module provides a reqwest-based implementation of the
//! [`GarminConnectClient`](crate::GarminConnectClient) trait. The session
//! (cookie store plus authenticated flag) lives inside the client value.

use crate::endpoints::{Endpoints, LOGIN_QUERY, USER_AGENT};
use crate::utils::{GRANTING_TICKET_COOKIE, find_cookie, service_ticket};
use crate::{DownloadOutcome, FileType, GarminConnectClient, GarminError, SEARCH_LIMIT};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::SET_COOKIE;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Size of the write buffer used when streaming a download to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Client for Garmin Connect using reqwest with a cookie store.
#[derive(Clone, Debug)]
pub struct ReqwestGarminClient {
    endpoints: Endpoints,
    client: reqwest::Client,
    authenticated: bool,
}

impl ReqwestGarminClient {
    /// Create a new, unauthenticated client.
    ///
    /// # Arguments
    /// * `endpoints` - Base URLs of the SSO and Connect services
    pub fn new(endpoints: Endpoints) -> Result<Self, GarminError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            endpoints,
            client,
            authenticated: false,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

/// Ticket-granting cookie set by this response. Cookies left in the store by
/// an earlier session do not count.
fn granting_ticket(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| find_cookie(v, GRANTING_TICKET_COOKIE))
        .map(str::to_string)
}

fn ensure_ok(resp: &reqwest::Response, context: &'static str) -> Result<(), GarminError> {
    let status = resp.status();
    if status != StatusCode::OK {
        tracing::debug!(context, status = status.as_u16(), "unexpected status");
        return Err(GarminError::Status {
            context,
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream a response body into `destination`.
///
/// Bytes land in a `.part` sibling first; it is renamed into place only once
/// the whole body is on disk, and removed if anything fails.
async fn write_body(resp: reqwest::Response, destination: &Path) -> Result<u64, GarminError> {
    let partial = partial_path(destination);
    match stream_body(resp, &partial).await {
        Ok(written) => {
            if let Err(e) = tokio::fs::rename(&partial, destination).await {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.into());
            }
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), error = %cleanup, "could not remove partial download");
            }
            Err(e)
        }
    }
}

async fn stream_body(resp: reqwest::Response, path: &Path) -> Result<u64, GarminError> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
    let mut stream = resp.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        writer.write_all(&bytes).await?;
        written = written.saturating_add(bytes.len() as u64);
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(written)
}

#[async_trait]
impl GarminConnectClient for ReqwestGarminClient {
    async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), GarminError> {
        self.authenticated = false;
        let login_url = self.endpoints.login_url();

        // Step 1: the credential POST is refused without the session cookie set here.
        tracing::debug!("login step 1: requesting session cookie");
        let resp = self.client.get(&login_url).query(LOGIN_QUERY).send().await?;
        ensure_ok(&resp, "login step 1")?;

        // Step 2: post credentials; the service answers 200 even when they are wrong.
        tracing::debug!("login step 2: posting credentials");
        let form = [
            ("username", username),
            ("password", password.expose_secret()),
            ("embed", "true"),
            ("lt", "e1s1"),
            ("_eventId", "submit"),
            ("displayNameRequired", "false"),
        ];
        let resp = self
            .client
            .post(&login_url)
            .query(LOGIN_QUERY)
            .form(&form)
            .send()
            .await?;
        ensure_ok(&resp, "login step 2")?;
        let granting = granting_ticket(&resp).ok_or_else(|| {
            GarminError::Auth(format!("couldn't find {GRANTING_TICKET_COOKIE} cookie"))
        })?;

        // Step 3: exchange the service ticket for an authenticated Connect session.
        tracing::debug!("login step 3: exchanging service ticket");
        let ticket = service_ticket(&granting);
        let resp = self
            .client
            .get(self.endpoints.post_auth_url())
            .query(&[("ticket", ticket.as_str())])
            .send()
            .await?;
        ensure_ok(&resp, "login step 3")?;

        self.authenticated = true;
        tracing::info!(username, "logged in to Garmin Connect");
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn search(&self, start: u64, limit: u32) -> Result<serde_json::Value, GarminError> {
        if limit > SEARCH_LIMIT {
            return Err(GarminError::Precondition(format!(
                "search limit {limit} exceeds the server maximum of {SEARCH_LIMIT}"
            )));
        }
        if !self.authenticated {
            return Err(GarminError::Precondition(
                "you must be logged in to search".into(),
            ));
        }
        let qp = [("start", start.to_string()), ("limit", limit.to_string())];
        let resp = self
            .client
            .get(self.endpoints.search_url())
            .query(&qp)
            .send()
            .await?;
        ensure_ok(&resp, "search")?;
        Ok(resp.json().await?)
    }

    async fn download(
        &self,
        activity_id: &str,
        destination: &Path,
        filetype: FileType,
    ) -> Result<DownloadOutcome, GarminError> {
        let url = self.endpoints.download_url(filetype, activity_id);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NO_CONTENT {
            tracing::debug!(activity_id, %filetype, "filetype not available");
            return Ok(DownloadOutcome::Unavailable);
        }
        ensure_ok(&resp, "download")?;
        let bytes = write_body(resp, destination).await?;
        Ok(DownloadOutcome::Saved { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_new_is_unauthenticated() {
        let client = ReqwestGarminClient::new(Endpoints::new("http://localhost", "http://localhost"))
            .expect("client");
        assert!(!client.is_authenticated());
        assert_eq!(client.endpoints().login_url(), "http://localhost/sso/login");
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/activity_1.tcx")),
            PathBuf::from("/tmp/activity_1.tcx.part")
        );
    }

    #[tokio::test]
    async fn search_requires_login() {
        let client = ReqwestGarminClient::new(Endpoints::default()).expect("client");
        let res = client.search(0, 10).await;
        assert!(matches!(res, Err(GarminError::Precondition(_))));
    }

    #[tokio::test]
    async fn search_rejects_limit_over_cap() {
        let client = ReqwestGarminClient::new(Endpoints::default()).expect("client");
        let res = client.search(0, SEARCH_LIMIT + 1).await;
        match res {
            Err(GarminError::Precondition(msg)) => assert!(msg.contains("101")),
            other => panic!("expected precondition error, got {other:?}"),
        }
    }
}
