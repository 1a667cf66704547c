use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::app::ports::WarehousePort;
use crate::error::{IngestError, Result};

const QUERY_TIMEOUT_MS: u64 = 10_000;
const MAX_POLLS: usize = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    total_rows: Option<String>,
    #[serde(default)]
    rows: Vec<serde_json::Value>,
    job_reference: Option<JobReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl QueryResponse {
    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
            || self
                .total_rows
                .as_deref()
                .and_then(|n| n.parse::<u64>().ok())
                .is_some_and(|n| n > 0)
    }
}

/// BigQuery `jobs.query` over REST, billed to `project_id`
pub struct BigQueryWarehouse {
    client: Client,
    endpoint: Url,
    project_id: String,
    token: String,
}

impl BigQueryWarehouse {
    pub fn new(endpoint: &str, project_id: &str, token: String) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| IngestError::Config(format!("invalid bigquery endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(QUERY_TIMEOUT_MS * 2))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            project_id: project_id.to_string(),
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::Config(format!("bigquery endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .extend(["bigquery", "v2", "projects", self.project_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn decode(resp: reqwest::Response) -> Result<QueryResponse> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(IngestError::Query {
                message: format!("{status}: {message}"),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WarehousePort for BigQueryWarehouse {
    async fn query_has_rows(&self, sql: &str) -> Result<bool> {
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "maxResults": 1,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        let resp = self
            .client
            .post(self.url(&["queries"])?)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let mut result = Self::decode(resp).await?;

        // jobs.query returns early for slow queries; wait on the job until it finishes
        let mut polls = 0;
        while !result.job_complete {
            polls += 1;
            if polls > MAX_POLLS {
                return Err(IngestError::Query {
                    message: "query did not complete".to_string(),
                });
            }
            let job = result.job_reference.as_ref().ok_or_else(|| IngestError::Query {
                message: "incomplete query without a job reference".to_string(),
            })?;
            debug!(job_id = %job.job_id, polls, "Waiting for query job");

            let timeout = QUERY_TIMEOUT_MS.to_string();
            let mut req = self
                .client
                .get(self.url(&["queries", job.job_id.as_str()])?)
                .bearer_auth(&self.token)
                .query(&[("maxResults", "1"), ("timeoutMs", timeout.as_str())]);
            if let Some(location) = &job.location {
                req = req.query(&[("location", location)]);
            }
            result = Self::decode(req.send().await?).await?;
        }

        Ok(result.has_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_is_scoped_to_project() {
        let warehouse = BigQueryWarehouse::new("https://bigquery.googleapis.com", "shopping-store-415510", "t".into()).unwrap();
        assert_eq!(
            warehouse.url(&["queries"]).unwrap().as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/shopping-store-415510/queries"
        );
    }

    #[test]
    fn rows_or_total_rows_count_as_populated() {
        let with_rows: QueryResponse =
            serde_json::from_str(r#"{"jobComplete": true, "totalRows": "12", "rows": [{"f": [{"v": "Asha"}]}]}"#).unwrap();
        assert!(with_rows.has_rows());

        let empty: QueryResponse = serde_json::from_str(r#"{"jobComplete": true, "totalRows": "0"}"#).unwrap();
        assert!(!empty.has_rows());

        let pending: QueryResponse = serde_json::from_str(
            r#"{"jobComplete": false, "jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"}}"#,
        )
        .unwrap();
        assert!(!pending.job_complete);
        assert_eq!(pending.job_reference.unwrap().job_id, "job_1");
    }
}
