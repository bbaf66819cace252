// Image generation and OCR ports. Both are slow, unreliable network services.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image service is not configured")]
    NotConfigured,
    #[error("Image service failed: {0}")]
    Service(String),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR service failed: {0}")]
    Service(String),
    #[error("OCR service returned no text")]
    Empty,
    #[error("OCR timed out")]
    TimedOut,
}

/// Data for a rendered profile / welcome card.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileCard {
    pub user_id: u64,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub headline: String,
    pub subtitle: Option<String>,
}

#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// Returns PNG bytes. May take several seconds.
    async fn render_card(&self, card: &ProfileCard) -> Result<Vec<u8>, ImageError>;
}

#[async_trait]
pub trait OcrService: Send + Sync {
    async fn recognize_text(&self, image_url: &str, language: &str) -> Result<String, OcrError>;
}
