use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::app::ports::ObjectStorePort;
use crate::error::{IngestError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    done: bool,
    rewrite_token: Option<String>,
}

/// Cloud Storage over the JSON API with a bearer token
pub struct GcsObjectStore {
    client: Client,
    endpoint: Url,
    token: String,
}

impl GcsObjectStore {
    pub fn new(endpoint: &str, token: String) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| IngestError::Config(format!("invalid storage endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            token,
        })
    }

    /// Endpoint plus path segments; each segment is percent-encoded, `/` included
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::Config(format!("storage endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(resp: Response, action: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IngestError::Storage {
            message: format!("{action} failed with status {status}: {body}"),
        })
    }
}

#[async_trait]
impl ObjectStorePort for GcsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url(&["storage", "v1", "b", bucket, "o", key])?;
        let resp = self
            .client
            .get(url)
            .query(&[("alt", "media")])
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(IngestError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: key.to_string(),
            });
        }
        let resp = Self::check(resp, &format!("download gs://{bucket}/{key}")).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        let resp = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check(resp, &format!("upload gs://{bucket}/{key}")).await?;
        debug!(bucket, key, "Uploaded object");
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let url = self.url(&["storage", "v1", "b", bucket, "o"])?;
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .client
                .get(url.clone())
                .query(&[("fields", "items(name),nextPageToken")])
                .bearer_auth(&self.token);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let resp = Self::check(req.send().await?, &format!("list gs://{bucket}")).await?;
            let page: ObjectList = resp.json().await?;
            keys.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let url = self.url(&["storage", "v1", "b", bucket, "o", key])?;
        let resp = self.client.delete(url).bearer_auth(&self.token).send().await?;
        Self::check(resp, &format!("delete gs://{bucket}/{key}")).await?;
        debug!(bucket, key, "Deleted object");
        Ok(())
    }

    async fn promote(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        // Server-side rewrite replaces `to` in one step; large objects need several calls
        let url = self.url(&["storage", "v1", "b", bucket, "o", from, "rewriteTo", "b", bucket, "o", to])?;
        let mut rewrite_token: Option<String> = None;
        loop {
            let mut req = self.client.post(url.clone()).bearer_auth(&self.token);
            if let Some(token) = &rewrite_token {
                req = req.query(&[("rewriteToken", token)]);
            }
            let resp = Self::check(req.send().await?, &format!("rewrite gs://{bucket}/{from}")).await?;
            let progress: RewriteResponse = resp.json().await?;
            if progress.done {
                break;
            }
            rewrite_token = progress.rewrite_token;
        }
        self.delete(bucket, from).await
    }
}
