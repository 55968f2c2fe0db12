use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::protocol::{ErrorBody, JobRecord, StatusResponse, SubmitRequest, SubmitResponse};
use super::{ClientError, ScanBackend};
use crate::core::{JobUpdate, ScanJob, ScanTicket, TrackerError};

/// HTTP client for the scan service.
pub struct HttpScanClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpScanClient {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ScanBackend for HttpScanClient {
    async fn submit(&self, domain: &str) -> Result<ScanTicket, TrackerError> {
        let request = SubmitRequest {
            domain: domain.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint("scan"))
            .json(&request)
            .send()
            .await
            .map_err(|e| TrackerError::Submission(e.into()))?;

        let body: SubmitResponse = read_json(response)
            .await
            .map_err(TrackerError::Submission)?;

        debug!(job_id = %body.scan_id, domain = %domain, "Scan accepted");
        Ok(body.into_ticket())
    }

    async fn fetch_status(&self, id: &str) -> Result<JobUpdate, TrackerError> {
        let poll_error = |source: ClientError| TrackerError::Poll {
            id: id.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.endpoint(&format!("scan/{}", id)))
            .send()
            .await
            .map_err(|e| poll_error(e.into()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrackerError::UnknownJob(id.to_string()));
        }

        let body: StatusResponse = read_json(response).await.map_err(poll_error)?;
        Ok(body.into_update(id))
    }

    async fn fetch_all(&self) -> Result<Vec<ScanJob>, TrackerError> {
        let response = self
            .client
            .get(self.endpoint("scan/all"))
            .send()
            .await
            .map_err(|e| TrackerError::List(e.into()))?;

        let records: Vec<JobRecord> = read_json(response).await.map_err(TrackerError::List)?;
        Ok(super::protocol::normalize_list(records))
    }
}

/// Turn a response into `T`, or a [`ClientError`] carrying the service's message.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) if text.is_empty() => status.canonical_reason().unwrap_or("").to_string(),
            Err(_) => text,
        };
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpScanClient::with_client("http://localhost:8010/", reqwest::Client::new());
        assert_eq!(client.base_url(), "http://localhost:8010");
        assert_eq!(client.endpoint("scan/all"), "http://localhost:8010/scan/all");
    }
}
