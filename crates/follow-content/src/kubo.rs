//! HTTP RPC adapter for a local content node.
//!
//! Speaks the node's `/api/v0` RPC surface (`id`, `name/resolve`, `cat`,
//! `add`, `name/publish`, `pin/add`). Every endpoint is a `POST` with its
//! arguments in the query string; errors come back as a JSON body with a
//! `Message` field.

use std::time::Duration;

use async_trait::async_trait;
use follow_types::{ContentId, ContentPath, IdentityId};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ContentError, ContentResult};
use crate::traits::ContentStore;
use crate::types::{AddOptions, DocumentEntry, PublishOptions, PublishRecord};

/// Default RPC address of a local node.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// [`ContentStore`] backed by a content node's HTTP RPC API.
#[derive(Clone, Debug)]
pub struct KuboClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Option<Duration>,
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

#[derive(Deserialize)]
struct AddLine {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Deserialize)]
struct PublishResponse {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(rename = "Message", default)]
    message: String,
}

impl KuboClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, None)
    }

    /// Client whose HTTP requests are additionally bounded by `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder().user_agent("follow/0.1");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: builder.build().unwrap_or_default(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/v0/{name}", self.base_url)
    }

    async fn call(
        &self,
        name: &'static str,
        query: &[(&str, String)],
        form: Option<Form>,
    ) -> ContentResult<reqwest::Response> {
        let mut request = self.http.post(self.endpoint(name)).query(query);
        if let Some(form) = form {
            request = request.multipart(form);
        }
        let response = request.send().await.map_err(|e| self.transport_error(name, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_rpc_error(name, status.as_u16(), &body))
    }

    async fn call_json<T: for<'de> Deserialize<'de>>(
        &self,
        name: &'static str,
        query: &[(&str, String)],
    ) -> ContentResult<T> {
        let response = self.call(name, query, None).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(name, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::InvalidResponse(format!("{name}: {e}")))
    }

    fn transport_error(&self, op: &'static str, e: reqwest::Error) -> ContentError {
        match self.timeout {
            Some(after) if e.is_timeout() => ContentError::Timeout { op, after },
            _ => ContentError::Transport(format!("{op}: {e}")),
        }
    }
}

/// Map a non-success RPC reply onto the error taxonomy.
pub(crate) fn classify_rpc_error(endpoint: &str, status: u16, body: &str) -> ContentError {
    let message = serde_json::from_str::<RpcError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let lowered = message.to_lowercase();
    match endpoint {
        "name/resolve"
            if lowered.contains("could not resolve")
                || lowered.contains("not found")
                || lowered.contains("expired") =>
        {
            ContentError::NotFound(message)
        }
        "cat" => ContentError::fetch("cat", message),
        "pin/add" if lowered.contains("not found") => ContentError::NotFound(message),
        _ => ContentError::Rejected(format!("{endpoint} ({status}): {message}")),
    }
}

/// Root id of an `add` reply: the unnamed directory line when wrapping,
/// otherwise the last added entry.
pub(crate) fn parse_add_response(body: &str, wrapped: bool) -> ContentResult<ContentId> {
    let mut lines = Vec::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: AddLine = serde_json::from_str(line)
            .map_err(|e| ContentError::InvalidResponse(format!("add: {e}")))?;
        lines.push(parsed);
    }
    let root = if wrapped {
        lines.iter().rev().find(|l| l.name.is_empty())
    } else {
        lines.last()
    };
    root.map(|l| ContentId::new(l.hash.clone()))
        .ok_or_else(|| ContentError::InvalidResponse("add: no root entry in reply".into()))
}

/// Lifetime in the node's duration syntax (`8760h`, `90s`).
pub(crate) fn format_lifetime(lifetime: Duration) -> String {
    let secs = lifetime.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{secs}s")
    }
}

#[async_trait]
impl ContentStore for KuboClient {
    async fn self_id(&self) -> ContentResult<IdentityId> {
        let reply: IdResponse = self.call_json("id", &[]).await?;
        Ok(IdentityId::new(reply.id))
    }

    async fn resolve_name(&self, name: &IdentityId) -> ContentResult<ContentId> {
        let reply: ResolveResponse = self
            .call_json("name/resolve", &[("arg", name.to_string())])
            .await?;
        let path = ContentPath::parse(&reply.path)
            .map_err(|e| ContentError::InvalidResponse(format!("name/resolve: {e}")))?;
        debug!(name = %name.short(), path = %path, "name resolved");
        Ok(path.root)
    }

    async fn get_bytes(&self, path: &ContentPath) -> ContentResult<Vec<u8>> {
        let response = self.call("cat", &[("arg", path.to_string())], None).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error("cat", e))?;
        Ok(bytes.to_vec())
    }

    async fn add_document(
        &self,
        entries: &[DocumentEntry],
        options: &AddOptions,
    ) -> ContentResult<ContentId> {
        if entries.is_empty() {
            return Err(ContentError::Rejected("no entries to add".into()));
        }
        let mut form = Form::new();
        for entry in entries {
            let part = Part::bytes(entry.content.clone()).file_name(entry.path.clone());
            form = form.part("file", part);
        }
        let query = [
            ("pin", options.pin.to_string()),
            ("wrap-with-directory", options.wrap_with_directory.to_string()),
            ("timeout", format!("{}ms", options.timeout.as_millis())),
            ("progress", "false".to_string()),
        ];
        let response = self.call("add", &query, Some(form)).await?;
        let body = response.text().await.map_err(|e| self.transport_error("add", e))?;
        parse_add_response(&body, options.wrap_with_directory)
    }

    async fn publish_name(
        &self,
        cid: &ContentId,
        options: &PublishOptions,
    ) -> ContentResult<PublishRecord> {
        let query = [
            ("arg", format!("/ipfs/{cid}")),
            ("lifetime", format_lifetime(options.lifetime)),
        ];
        let reply: PublishResponse = self.call_json("name/publish", &query).await?;
        let value = ContentPath::parse(&reply.value)
            .map_err(|e| ContentError::InvalidResponse(format!("name/publish: {e}")))?;
        Ok(PublishRecord {
            name: IdentityId::new(reply.name),
            value: value.root,
        })
    }

    async fn pin(&self, cid: &ContentId) -> ContentResult<()> {
        self.call("pin/add", &[("arg", cid.to_string())], None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls() {
        let client = KuboClient::new("http://127.0.0.1:5001/");
        assert_eq!(client.base_url(), "http://127.0.0.1:5001");
        assert_eq!(client.endpoint("name/resolve"), "http://127.0.0.1:5001/api/v0/name/resolve");
        assert_eq!(KuboClient::new(DEFAULT_API_URL).base_url(), DEFAULT_API_URL);
    }

    #[test]
    fn wrapped_add_returns_directory_line() {
        let body = concat!(
            "{\"Name\":\"post.json\",\"Hash\":\"QmFile1\",\"Size\":\"20\"}\n",
            "{\"Name\":\"index.html\",\"Hash\":\"QmFile2\",\"Size\":\"90\"}\n",
            "{\"Name\":\"\",\"Hash\":\"QmDirectory\",\"Size\":\"200\"}\n",
        );
        assert_eq!(parse_add_response(body, true).unwrap().as_str(), "QmDirectory");
    }

    #[test]
    fn unwrapped_add_returns_last_line() {
        let body = "{\"Name\":\"QmOnly\",\"Hash\":\"QmOnly\"}\n";
        assert_eq!(parse_add_response(body, false).unwrap().as_str(), "QmOnly");
    }

    #[test]
    fn add_without_root_is_invalid() {
        let body = "{\"Name\":\"a\",\"Hash\":\"QmA\"}\n";
        assert!(matches!(
            parse_add_response(body, true).unwrap_err(),
            ContentError::InvalidResponse(_)
        ));
        assert!(parse_add_response("garbage", false).is_err());
    }

    #[test]
    fn resolve_failure_is_not_found() {
        let body = r#"{"Message":"could not resolve name","Code":0,"Type":"error"}"#;
        assert!(classify_rpc_error("name/resolve", 500, body).is_not_found());
    }

    #[test]
    fn cat_failure_is_fetch_failure() {
        let body = r#"{"Message":"context deadline exceeded","Code":0,"Type":"error"}"#;
        assert!(matches!(
            classify_rpc_error("cat", 500, body),
            ContentError::FetchFailure { .. }
        ));
    }

    #[test]
    fn other_failures_are_rejections() {
        let err = classify_rpc_error("name/publish", 500, "plain text failure");
        match err {
            ContentError::Rejected(msg) => assert!(msg.contains("plain text failure")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_node_times_out_with_configured_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client = KuboClient::with_timeout(format!("http://{addr}"), Some(Duration::from_millis(100)));
        match client.self_id().await.unwrap_err() {
            ContentError::Timeout { op, after } => {
                assert_eq!(op, "id");
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lifetime_formatting() {
        assert_eq!(format_lifetime(crate::types::DEFAULT_LIFETIME), "8760h");
        assert_eq!(format_lifetime(Duration::from_secs(90)), "90s");
        assert_eq!(format_lifetime(Duration::ZERO), "0s");
    }
}
