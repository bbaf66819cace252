use crate::core::media::{ImageError, ImageRenderer, ProfileCard};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Posts the card data as JSON to an image service that answers with PNG bytes.
pub struct HttpCardRenderer {
    client: Client,
    endpoint: Option<String>,
}

impl HttpCardRenderer {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
        })
    }
}

#[async_trait]
impl ImageRenderer for HttpCardRenderer {
    async fn render_card(&self, card: &ProfileCard) -> Result<Vec<u8>, ImageError> {
        let endpoint = self.endpoint.as_deref().ok_or(ImageError::NotConfigured)?;

        let response = self
            .client
            .post(endpoint)
            .json(card)
            .send()
            .await
            .map_err(|e| ImageError::Service(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ImageError::Service(format!("{} - {}", status, text)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Service(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_renderer_fails_fast() {
        let renderer = HttpCardRenderer::new(None, Duration::from_secs(1)).unwrap();
        let card = ProfileCard {
            user_id: 1,
            username: "a".into(),
            display_name: "A".into(),
            avatar_url: String::new(),
            headline: "hi".into(),
            subtitle: None,
        };
        assert!(matches!(
            renderer.render_card(&card).await,
            Err(ImageError::NotConfigured)
        ));
    }
}
