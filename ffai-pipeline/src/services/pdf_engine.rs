//! HTML-to-PDF rendering engine

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Orientation, PageSize, PdfSettings};

/// PDF generation errors
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("PDF render failed: {0}")]
    Render(String),

    #[error("Rendered PDF too small ({0} bytes), treating as corrupt")]
    TooSmall(usize),

    #[error("Rendered PDF too large ({0} bytes)")]
    Oversize(usize),

    #[error("PDF storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Recording PDF artifact failed: {0}")]
    Record(String),
}

/// Page configuration handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSettings {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margin_mm: u32,
}

impl From<&PdfSettings> for PageSettings {
    fn from(settings: &PdfSettings) -> Self {
        Self {
            page_size: settings.page_size,
            orientation: settings.orientation,
            margin_mm: settings.margin_mm,
        }
    }
}

#[async_trait]
pub trait PdfEngine: Send + Sync {
    async fn render(&self, html: &str, page: &PageSettings) -> Result<Vec<u8>, PdfError>;
}

/// Engine backed by an HTTP render service
///
/// POSTs `{html, page_size, orientation, margin_mm}` as JSON and expects the
/// PDF bytes as the response body.
pub struct HttpPdfEngine {
    client: reqwest::Client,
    url: String,
}

impl HttpPdfEngine {
    pub fn new(url: impl Into<String>) -> Result<Self, PdfError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PdfError::EngineUnavailable(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    html: &'a str,
    #[serde(flatten)]
    page: &'a PageSettings,
}

#[async_trait]
impl PdfEngine for HttpPdfEngine {
    async fn render(&self, html: &str, page: &PageSettings) -> Result<Vec<u8>, PdfError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RenderRequest { html, page })
            .send()
            .await
            .map_err(|e| PdfError::EngineUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdfError::Render(format!("{}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PdfError::Render(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Engine used when no render service is configured
pub struct UnavailablePdfEngine;

#[async_trait]
impl PdfEngine for UnavailablePdfEngine {
    async fn render(&self, _html: &str, _page: &PageSettings) -> Result<Vec<u8>, PdfError> {
        Err(PdfError::EngineUnavailable("no PDF engine configured".to_string()))
    }
}
