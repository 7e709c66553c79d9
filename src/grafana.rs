// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Grafana HTTP API access.
//!
//! Only three endpoints are needed:
//!
//! - `POST /api/folders` to create the folder of a branch,
//! - `POST /api/dashboards/db` to import a dashboard into that folder,
//! - `DELETE /api/folders/<uid>` to remove the folder once the branch is gone.
//!
//! Creation and import both request overwrite semantics, which turns every
//! call into a create-or-update and makes re-running a deployment harmless.

use crate::{
    config::{Credentials, GrafanaSettings},
    uid::FolderUid,
};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, info, instrument, warn};

/// Folder creation request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPayload<'a> {
    pub uid: &'a str,
    pub title: &'a str,
    pub overwrite: bool,
}

/// Dashboard import request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload<'a> {
    pub dashboard: &'a RawValue,
    pub folder_uid: &'a str,
    pub overwrite: bool,
}

/// Dashboard server operations needed for deployment.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Create folder, or keep it if it already exists.
    async fn create_folder(&self, uid: &FolderUid, title: &str) -> Result<()>;

    /// Import dashboard into folder, overwriting any dashboard with same uid.
    async fn import_dashboard(&self, dashboard: &RawValue, folder_uid: &FolderUid) -> Result<()>;

    /// Delete folder along with every dashboard inside of it.
    async fn delete_folder(&self, uid: &FolderUid) -> Result<()>;
}

/// HTTP client for a single Grafana server.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: String,
    client: Client,
    credentials: Credentials,
    fail_on_status: bool,
}

impl GrafanaClient {
    /// Construct new Grafana client.
    ///
    /// # Errors
    ///
    /// - Return [`GrafanaError::Request`] if HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        settings: &GrafanaSettings,
    ) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self::with_client(
            base_url,
            credentials,
            client,
            settings.fail_on_status,
        ))
    }

    /// Construct new Grafana client around custom HTTP client.
    pub fn with_client(
        base_url: impl Into<String>,
        credentials: Credentials,
        client: Client,
        fail_on_status: bool,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
            fail_on_status,
        }
    }

    /// Base URL of Grafana server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.credentials.user, Some(&self.credentials.password))
    }

    /// Check response status and log response body.
    ///
    /// Failed statuses only become errors when `fail_on_status` is set.
    /// Otherwise they are logged and the deployment carries on.
    async fn handle_response(&self, response: Response) -> Result<()> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status.is_success() {
            debug!("grafana responded {status}: {body}");
            return Ok(());
        }

        if self.fail_on_status {
            return Err(GrafanaError::api_error(status, body));
        }

        warn!("grafana responded {status}: {body}");
        Ok(())
    }
}

#[async_trait]
impl DashboardApi for GrafanaClient {
    #[instrument(skip(self), level = "debug")]
    async fn create_folder(&self, uid: &FolderUid, title: &str) -> Result<()> {
        info!("create grafana folder {title} with uid {uid}");
        let url = format!("{}/api/folders", self.base_url);
        let payload = FolderPayload {
            uid: uid.as_str(),
            title,
            overwrite: true,
        };
        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await?;

        // INVARIANT: A folder that already exists counts as created.
        if response.status() == StatusCode::CONFLICT {
            info!("grafana folder {uid} already exists");
            return Ok(());
        }

        self.handle_response(response).await
    }

    #[instrument(skip(self, dashboard), level = "debug")]
    async fn import_dashboard(&self, dashboard: &RawValue, folder_uid: &FolderUid) -> Result<()> {
        let url = format!("{}/api/dashboards/db", self.base_url);
        let payload = DashboardPayload {
            dashboard,
            folder_uid: folder_uid.as_str(),
            overwrite: true,
        };
        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_folder(&self, uid: &FolderUid) -> Result<()> {
        info!("delete grafana folder {uid}");
        let url = format!("{}/api/folders/{uid}", self.base_url);
        let response = self.authorized(self.client.delete(&url)).send().await?;

        // INVARIANT: A folder that is already gone counts as deleted.
        if response.status() == StatusCode::NOT_FOUND {
            info!("grafana folder {uid} does not exist");
            return Ok(());
        }

        self.handle_response(response).await
    }
}

/// Grafana API error types.
#[derive(Debug, thiserror::Error)]
pub enum GrafanaError {
    /// Request could not be sent or its response could not be received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Grafana answered with a failed status.
    #[error("grafana API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl GrafanaError {
    /// Create API error from status code and response body.
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = GrafanaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve exactly one HTTP exchange, handing back the raw request.
    async fn serve_once(status: u16, body: &'static str) -> anyhow::Result<(String, JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = stream.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status} Whatever\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8_lossy(&request).into_owned()
        });

        Ok((url, handle))
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };

        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        request.len() >= header_end + 4 + content_length
    }

    fn body_of(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn client(url: &str, fail_on_status: bool) -> GrafanaClient {
        GrafanaClient::with_client(
            url,
            Credentials {
                user: "admin".into(),
                password: "admin".into(),
            },
            Client::builder().no_proxy().build().unwrap(),
            fail_on_status,
        )
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = client("https://grafana.dev.local/", true);
        assert_eq!(client.base_url(), "https://grafana.dev.local");
    }

    #[test]
    fn serialize_dashboard_payload() -> anyhow::Result<()> {
        let dashboard = RawValue::from_string(r#"{"id":null,"uid":"uid-abc"}"#.into())?;
        let payload = DashboardPayload {
            dashboard: &dashboard,
            folder_uid: "featurelogin",
            overwrite: true,
        };

        assert_eq!(
            serde_json::to_string(&payload)?,
            r#"{"dashboard":{"id":null,"uid":"uid-abc"},"folderUid":"featurelogin","overwrite":true}"#
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_folder_posts_payload_with_basic_auth() -> anyhow::Result<()> {
        let (url, server) = serve_once(200, r#"{"id": 1}"#).await?;
        let uid = FolderUid::derive("feature/login");

        client(&url, true).create_folder(&uid, "featurelogin").await?;

        let request = server.await?;
        assert!(request.starts_with("POST /api/folders HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: basic ywrtaw46ywrtaw4="));
        assert_eq!(
            body_of(&request),
            json!({"uid": "featurelogin", "title": "featurelogin", "overwrite": true})
        );

        Ok(())
    }

    #[tokio::test]
    async fn import_dashboard_posts_payload() -> anyhow::Result<()> {
        let (url, server) = serve_once(200, r#"{"status": "success"}"#).await?;
        let uid = FolderUid::derive("feature/login");
        let dashboard = RawValue::from_string(r#"{"id":null,"title":"A"}"#.into())?;

        client(&url, true).import_dashboard(&dashboard, &uid).await?;

        let request = server.await?;
        assert!(request.starts_with("POST /api/dashboards/db HTTP/1.1"));
        assert_eq!(
            body_of(&request),
            json!({
                "dashboard": {"id": null, "title": "A"},
                "folderUid": "featurelogin",
                "overwrite": true,
            })
        );

        Ok(())
    }

    #[tokio::test]
    async fn failed_status_is_fatal_by_default() -> anyhow::Result<()> {
        let (url, server) = serve_once(412, r#"{"message": "version-mismatch"}"#).await?;
        let uid = FolderUid::derive("master");

        let result = client(&url, true).create_folder(&uid, "master").await;
        server.await?;

        match result {
            Err(GrafanaError::Api { status, message }) => {
                assert_eq!(status, 412);
                assert!(message.contains("version-mismatch"));
            }
            other => panic!("expected api error, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn create_existing_folder_succeeds() -> anyhow::Result<()> {
        let (url, server) =
            serve_once(409, r#"{"message": "a folder with the same uid already exists"}"#).await?;
        let uid = FolderUid::derive("feature/login");

        client(&url, true).create_folder(&uid, "featurelogin").await?;

        let request = server.await?;
        assert!(request.starts_with("POST /api/folders HTTP/1.1"));

        Ok(())
    }

    #[tokio::test]
    async fn failed_status_is_logged_when_lenient() -> anyhow::Result<()> {
        let (url, server) = serve_once(500, r#"{"message": "boom"}"#).await?;
        let uid = FolderUid::derive("master");

        client(&url, false).create_folder(&uid, "master").await?;
        server.await?;

        Ok(())
    }

    #[tokio::test]
    async fn delete_missing_folder_succeeds() -> anyhow::Result<()> {
        let (url, server) = serve_once(404, r#"{"message": "folder not found"}"#).await?;
        let uid = FolderUid::derive("feature/login");

        client(&url, true).delete_folder(&uid).await?;

        let request = server.await?;
        assert!(request.starts_with("DELETE /api/folders/featurelogin HTTP/1.1"));

        Ok(())
    }

    #[tokio::test]
    async fn unreachable_server_fails() {
        let uid = FolderUid::derive("master");
        // Port 9 is discard; nothing listens there on test machines.
        let result = client("http://127.0.0.1:9", true)
            .create_folder(&uid, "master")
            .await;
        assert!(matches!(result, Err(GrafanaError::Request(_))));
    }
}
