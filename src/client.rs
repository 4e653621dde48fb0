//! HTTP client for the CI backend.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::{HTTP_POOL_MAX_IDLE_PER_HOST, HTTP_TIMEOUT_SECS};
use crate::error::WatchError;
use crate::model::{ApplicationResults, Job, JobsResponse, Resource, ResourceKind, ResultType};
use crate::query::JobQuery;

/// Which queue a job is removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveFrom {
    Queued,
    Running,
}

impl RemoveFrom {
    fn as_str(&self) -> &'static str {
        match self {
            RemoveFrom::Queued => "queued",
            RemoveFrom::Running => "running",
        }
    }
}

#[derive(Clone)]
pub struct CiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CiClient {
    pub fn new(base_url: &str) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
            .build()?;
        Self::with_http(http, base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, WatchError> {
        // A trailing slash makes relative joins append instead of replace.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| WatchError::InvalidRequest(format!("Invalid backend URL {}: {}", base_url, e)))?;
        Ok(CiClient { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, segments: &[&str]) -> Result<Url, WatchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WatchError::InvalidRequest("Backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET /jobs` with the query's filters, flattened to display order.
    pub async fn fetch_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, WatchError> {
        let mut url = self.url(&["jobs"])?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        debug!("Fetching jobs: {}", url);

        let response: JobsResponse = self.get_json(url).await?;
        Ok(response.into_jobs())
    }

    /// `GET /job/{uid}`.
    pub async fn fetch_job(&self, uid: &str) -> Result<Job, WatchError> {
        let url = self.url(&["job", uid])?;
        self.get_json(url).await
    }

    /// Fetch one result document. `Ok(None)` means the backend has no such
    /// resource for this job.
    pub async fn fetch_resource(
        &self,
        uid: &str,
        kind: ResourceKind,
    ) -> Result<Option<Resource>, WatchError> {
        let file = format!("{}.json", kind.as_str());
        let url = self.url(&["results", uid, &file])?;
        match self.get_text(url).await {
            Ok(body) => Resource::decode(kind, &body).map(Some),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the full log of a finished job from the URL the job advertises.
    pub async fn fetch_output_text(&self, output_url: &str) -> Result<Option<String>, WatchError> {
        let url = self
            .base_url
            .join(output_url)
            .map_err(|e| WatchError::InvalidRequest(format!("Invalid output URL {}: {}", output_url, e)))?;
        match self.get_text(url).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `GET /results/{uid}/output/{compile|run_test}/{application}/app.json`.
    pub async fn fetch_application_results(
        &self,
        uid: &str,
        result_type: ResultType,
        application: &str,
    ) -> Result<Option<ApplicationResults>, WatchError> {
        let mut segments = vec!["results", uid, "output", result_type.output_dir()];
        segments.extend(application.split('/'));
        segments.push("app.json");
        let url = self.url(&segments)?;
        match self.get_text(url).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Raw log of one application/target/toolchain run.
    pub async fn fetch_target_log(
        &self,
        uid: &str,
        result_type: ResultType,
        application: &str,
        target: &str,
        toolchain: &str,
    ) -> Result<Option<String>, WatchError> {
        let file = format!("{}:{}.txt", target, toolchain);
        let mut segments = vec!["results", uid, "output", result_type.output_dir()];
        segments.extend(application.split('/'));
        segments.push(&file);
        let url = self.url(&segments)?;
        match self.get_text(url).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `DELETE /jobs/{queued|running}/{uid}`: cancel a queued job or abort a
    /// running one.
    pub async fn remove_job(&self, from: RemoveFrom, uid: &str, token: &str) -> Result<(), WatchError> {
        let url = self.url(&["jobs", from.as_str(), uid])?;
        info!("DELETE {}", url);
        let resp = self
            .http
            .delete(url.clone())
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;
        check_status(resp.status(), &url)
    }

    /// `POST /jobs/finished/{uid}`: restart a finished job.
    pub async fn restart_job(&self, uid: &str, token: &str) -> Result<(), WatchError> {
        let url = self.url(&["jobs", "finished", uid])?;
        info!("POST {}", url);
        let resp = self
            .http
            .post(url.clone())
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check_status(resp.status(), &url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, WatchError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_text(&self, url: Url) -> Result<String, WatchError> {
        let resp = self.http.get(url.clone()).send().await?;
        check_status(resp.status(), &url)?;
        Ok(resp.text().await?)
    }
}

fn check_status(status: StatusCode, url: &Url) -> Result<(), WatchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(WatchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}
