//! OCR client: upload a receipt or statement, poll the job, fetch the result.
//!
//! The service answers a poll either with a 302 to the result, or with a job
//! body that may carry `result_url` and a fresh `polling_url`.

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use tally_core::ServiceError;

use crate::config::OcrSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Receipt,
    Statement,
}

impl DocumentKind {
    pub fn service(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "Receipt parser",
            DocumentKind::Statement => "Statement parser",
        }
    }
}

/// What one poll response says to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Ready(String),
    Pending { polling_url: Option<String> },
}

/// Read a poll response: a 302 `Location`, or `result_url` / `polling_url`
/// from the (optionally `job`-wrapped) body.
pub fn poll_step(status: StatusCode, location: Option<&str>, body: Option<&Value>) -> PollStep {
    if status == StatusCode::FOUND {
        if let Some(url) = location.filter(|l| !l.is_empty()) {
            return PollStep::Ready(url.to_string());
        }
    }
    let job = body.map(|b| b.get("job").unwrap_or(b));
    let field = |key: &str| {
        job.and_then(|j| j.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match field("result_url") {
        Some(url) => PollStep::Ready(url),
        None => PollStep::Pending {
            polling_url: field("polling_url"),
        },
    }
}

pub struct OcrClient {
    http: reqwest::Client,
    cfg: OcrSection,
}

impl OcrClient {
    pub fn new(cfg: &OcrSection) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
        })
    }

    fn credentials(&self, kind: DocumentKind) -> Result<(&str, &str), ServiceError> {
        let model = match kind {
            DocumentKind::Receipt => self.cfg.receipt_model.as_deref(),
            DocumentKind::Statement => self.cfg.statement_model.as_deref(),
        };
        match (self.cfg.api_key.as_deref(), model) {
            (Some(key), Some(model)) => Ok((key, model)),
            _ => Err(ServiceError::NotConfigured {
                service: kind.service(),
            }),
        }
    }

    /// Upload `path`, wait for the job and return the inference JSON.
    pub async fn parse(&self, kind: DocumentKind, path: &Path) -> Result<Value> {
        let polling_url = self.enqueue(kind, path).await?;
        let result_url = self.poll(kind, polling_url).await?;
        self.fetch_result(kind, &result_url).await
    }

    pub async fn enqueue(&self, kind: DocumentKind, path: &Path) -> Result<String> {
        let (key, model) = self.credentials(kind)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model_id", model.to_string());

        let resp = self
            .http
            .post(&self.cfg.enqueue_url)
            .header(AUTHORIZATION, key)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("{} request", kind.service()))?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            return Err(failed(kind, format!("{status} {details}")));
        }

        let body: Value = resp.json().await.context("parse enqueue response")?;
        let job = body.get("job").unwrap_or(&body);
        match job.get("polling_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(failed(kind, format!("no polling_url in {body}"))),
        }
    }

    /// Poll until the result URL shows up, at most `poll_attempts` times.
    pub async fn poll(&self, kind: DocumentKind, mut polling_url: String) -> Result<String> {
        let (key, _) = self.credentials(kind)?;
        let delay = Duration::from_millis(self.cfg.poll_delay_ms);

        for attempt in 1..=self.cfg.poll_attempts {
            let resp = self
                .http
                .get(&polling_url)
                .header(AUTHORIZATION, key)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .with_context(|| format!("{} poll", kind.service()))?;

            let status = resp.status();
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body: Option<Value> = if status == StatusCode::FOUND {
                None
            } else {
                resp.json().await.ok()
            };

            match poll_step(status, location.as_deref(), body.as_ref()) {
                PollStep::Ready(url) => return Ok(url),
                PollStep::Pending { polling_url: next } => {
                    tracing::debug!(attempt, %status, "ocr job pending");
                    if let Some(next) = next {
                        polling_url = next;
                    }
                }
            }
            tokio::time::sleep(delay).await;
        }

        tracing::warn!(attempts = self.cfg.poll_attempts, service = kind.service(), "ocr job timed out");
        Err(ServiceError::TimedOut {
            service: kind.service(),
        }
        .into())
    }

    pub async fn fetch_result(&self, kind: DocumentKind, result_url: &str) -> Result<Value> {
        let (key, _) = self.credentials(kind)?;
        let resp = self
            .http
            .get(result_url)
            .header(AUTHORIZATION, key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("{} result", kind.service()))?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            return Err(failed(kind, format!("{status} {details}")));
        }
        resp.json().await.context("parse ocr result")
    }
}

fn failed(kind: DocumentKind, details: String) -> anyhow::Error {
    ServiceError::Failed {
        service: kind.service(),
        details,
    }
    .into()
}
