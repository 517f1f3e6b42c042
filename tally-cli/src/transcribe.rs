use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;

use tally_core::ServiceError;

use crate::config::TranscriptionSection;

const SERVICE: &str = "Transcription";

/// Speech-to-text for voice expenses.
pub struct Transcriber {
    http: reqwest::Client,
    cfg: TranscriptionSection,
}

#[derive(Deserialize)]
struct TranscriptionResp {
    #[serde(default)]
    text: String,
}

impl Transcriber {
    pub fn new(cfg: &TranscriptionSection) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg: cfg.clone(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/audio/transcriptions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }

    pub async fn transcribe(&self, audio: &Path) -> Result<String> {
        let key = self
            .cfg
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ServiceError::NotConfigured { service: SERVICE })?;

        let bytes = tokio::fs::read(audio)
            .await
            .with_context(|| format!("read {}", audio.display()))?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.webm".to_string());
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", self.cfg.model.clone());

        let resp = self
            .http
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .multipart(form)
            .send()
            .await
            .context("transcription request")?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Failed {
                service: SERVICE,
                details: format!("{status} {details}"),
            }
            .into());
        }

        let out: TranscriptionResp = resp.json().await.context("parse transcription response")?;
        Ok(out.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let cfg = TranscriptionSection {
            base_url: "http://localhost:8080/".to_string(),
            ..TranscriptionSection::default()
        };
        assert_eq!(
            Transcriber::new(&cfg).endpoint(),
            "http://localhost:8080/v1/audio/transcriptions"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let t = Transcriber::new(&TranscriptionSection::default());
        let err = t.transcribe(Path::new("memo.webm")).await.unwrap_err();
        assert_eq!(err.to_string(), "Transcription is not configured.");
    }
}
