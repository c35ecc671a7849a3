//! Taskcluster REST client
//!
//! Every call goes through the taskcluster proxy of the decision task's
//! worker, which signs requests with the task's scopes. No credentials are
//! handled here.
//!
//! ## Endpoints
//!
//! - `GET  {proxy}/index/v1/task/{namespace}`
//! - `GET  {proxy}/queue/v1/task/{task_id}`
//! - `PUT  {proxy}/queue/v1/task/{task_id}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use decision_tasks::{IndexedTask, LookupError, TaskId, TaskIndex};

use crate::definition::TaskDefinition;
use crate::error::{Result, TaskclusterError};
use crate::submit::TaskQueue;

/// Proxy address inside a docker-worker task
pub const DEFAULT_PROXY_URL: &str = "http://taskcluster";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedTaskResponse {
    task_id: String,
}

/// Client for the index and queue services
pub struct TaskclusterClient {
    base: Url,
    client: Client,
}

impl TaskclusterClient {
    /// Create a client talking to `proxy_url`
    pub fn new(proxy_url: &str) -> Result<Self> {
        let mut base = Url::parse(proxy_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("decision/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { base, client })
    }

    /// URL of an index namespace lookup
    pub fn index_url(&self, namespace: &str) -> Result<Url> {
        Ok(self.base.join(&format!("index/v1/task/{}", namespace))?)
    }

    /// URL of a queue task
    pub fn queue_url(&self, task_id: &TaskId) -> Result<Url> {
        Ok(self.base.join(&format!("queue/v1/task/{}", task_id))?)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TaskclusterError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    /// Task indexed under `namespace`
    pub async fn find_indexed_task(&self, namespace: &str) -> Result<Option<TaskId>> {
        let url = self.index_url(namespace)?;
        debug!(%url, "looking up index");

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let indexed: IndexedTaskResponse = Self::check(response).await?.json().await?;
        Ok(Some(TaskId::new(indexed.task_id)))
    }

    /// Full definition of a task, as stored by the queue
    pub async fn fetch_task(&self, task_id: &TaskId) -> Result<Value> {
        let url = self.queue_url(task_id)?;
        debug!(%url, "fetching task");

        let response = self.client.get(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Create a task
    pub async fn put_task(&self, task_id: &TaskId, definition: &TaskDefinition) -> Result<Value> {
        let url = self.queue_url(task_id)?;
        info!(task_id = %task_id, name = %definition.metadata.name, "creating task");

        let response = self.client.put(url).json(definition).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

/// Creation time of a task definition
pub fn parse_created(definition: &Value) -> Result<DateTime<Utc>> {
    let created = definition
        .get("created")
        .and_then(Value::as_str)
        .ok_or_else(|| TaskclusterError::InvalidResponse("task has no 'created' field".into()))?;

    DateTime::parse_from_rfc3339(created)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| TaskclusterError::InvalidResponse(format!("created '{}': {}", created, e)))
}

#[async_trait]
impl TaskIndex for TaskclusterClient {
    async fn find_task(&self, namespace: &str) -> std::result::Result<Option<TaskId>, LookupError> {
        Ok(self.find_indexed_task(namespace).await?)
    }

    async fn get_task(&self, task_id: &TaskId) -> std::result::Result<IndexedTask, LookupError> {
        let definition = self.fetch_task(task_id).await?;
        Ok(IndexedTask {
            task_id: task_id.clone(),
            created: parse_created(&definition)?,
        })
    }
}

#[async_trait]
impl TaskQueue for TaskclusterClient {
    async fn create_task(&self, task_id: &TaskId, definition: &TaskDefinition) -> Result<()> {
        self.put_task(task_id, definition).await.map(|_| ())
    }

    async fn task(&self, task_id: &TaskId) -> Result<Value> {
        self.fetch_task(task_id).await
    }
}
