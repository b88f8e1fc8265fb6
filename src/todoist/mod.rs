//! Todoist API client, focused on the single question the decision engine
//! asks: does a section contain an incomplete task due on or before today?
//!
//! Transport and API failures are retried a small fixed number of times with
//! a fixed delay before surfacing a terminal [`OracleError::Api`]; the engine
//! treats that as fail-safe deny.

use crate::engine::TaskOracle;
use crate::error::OracleError;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.todoist.com";

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TodoistClient {
    client: Client,
    base_url: String,
    api_key: String,
    tz: Tz,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub is_completed: bool,
    pub due: Option<Due>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Due {
    /// `YYYY-MM-DD`, optionally with a time suffix for datetime dues.
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

impl TodoistClient {
    pub fn new(api_key: &str, tz: Tz) -> Result<Self, OracleError> {
        Self::with_base_url(api_key, tz, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, tz: Tz, base_url: &str) -> Result<Self, OracleError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(OracleError::Configuration("api key is required".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            tz,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Shortens the inter-attempt delay; used by tests and fast-cycle setups.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn fetch_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, String> {
        let url = format!("{}{path}", self.base_url);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).bearer_auth(&self.api_key).query(query);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query(&[("cursor", cursor)]);
            }

            let response = request.send().await.map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("http status {}", response.status()));
            }
            let page: Page<T> = response.json().await.map_err(|e| e.to_string())?;

            items.extend(page.results);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn fetch_section_tasks(&self, section_id: &str) -> Result<Vec<Task>, String> {
        self.fetch_paginated("/api/v1/tasks", &[("section_id", section_id)])
            .await
    }

    /// All projects visible to the configured token. Setup helper for finding
    /// section ids; not part of the check cycle.
    pub async fn list_projects(&self) -> Result<Vec<Project>, OracleError> {
        self.fetch_paginated("/api/v1/projects", &[])
            .await
            .map_err(|message| OracleError::Api {
                attempts: 1,
                message,
            })
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>, OracleError> {
        self.fetch_paginated("/api/v1/sections", &[])
            .await
            .map_err(|message| OracleError::Api {
                attempts: 1,
                message,
            })
    }
}

/// True iff any task is both incomplete and due on or before `today`.
/// Tasks without a due date never count; unparseable due dates are logged
/// and skipped rather than failing the whole check.
fn any_incomplete_due_by(tasks: &[Task], today: NaiveDate) -> bool {
    for task in tasks {
        if task.is_completed {
            continue;
        }
        let Some(due) = &task.due else { continue };
        let Some(date_part) = due.date.get(..10) else {
            error!(task_id = %task.id, due = %due.date, "due date too short to parse; skipping task");
            continue;
        };
        match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            Ok(due_date) if due_date <= today => {
                warn!(
                    task_id = %task.id,
                    content = %task.content,
                    due = %due.date,
                    "found incomplete task due on or before today"
                );
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    task_id = %task.id,
                    due = %due.date,
                    error = %e,
                    "could not parse due date; skipping task"
                );
            }
        }
    }
    false
}

#[async_trait]
impl TaskOracle for TodoistClient {
    async fn has_incomplete_tasks(&self, section_id: &str) -> Result<bool, OracleError> {
        if section_id.trim().is_empty() {
            return Err(OracleError::Client("section_id cannot be empty".into()));
        }

        let today = Utc::now().with_timezone(&self.tz).date_naive();
        debug!(%today, section_id, "checking for incomplete tasks");

        for attempt in 1..=MAX_RETRIES {
            match self.fetch_section_tasks(section_id).await {
                Ok(tasks) => {
                    info!(
                        attempt,
                        section_id,
                        count = tasks.len(),
                        "fetched tasks for section"
                    );
                    return Ok(any_incomplete_due_by(&tasks, today));
                }
                Err(message) if attempt < MAX_RETRIES => {
                    warn!(
                        attempt,
                        max = MAX_RETRIES,
                        section_id,
                        error = %message,
                        "todoist call failed; retrying after delay"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(message) => {
                    error!(
                        attempts = MAX_RETRIES,
                        section_id,
                        error = %message,
                        "retry budget exhausted fetching tasks"
                    );
                    return Err(OracleError::Api {
                        attempts: MAX_RETRIES,
                        message,
                    });
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}
