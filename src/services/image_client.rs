// src/services/image_client.rs
use crate::errors::StyleSenseError;
use crate::models::ImageKind;
use crate::services::gateway::ModelGateway;
use crate::services::transport::GenerateRequest;
use log::debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ImageRequestClient {
    gateway: Arc<ModelGateway>,
    model: String,
}

impl ImageRequestClient {
    pub fn new(gateway: Arc<ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    /// Generates one illustration and returns it as a `data:` URI.
    ///
    /// `Ok(None)` means the call succeeded but the model sent no image.
    /// Rate limits are retried by the gateway; a `RateLimited` error here
    /// means the retry budget ran out.
    pub async fn request_image(
        &self,
        subject: &str,
        kind: ImageKind,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, StyleSenseError> {
        let request = GenerateRequest::new(&self.model, image_prompt(subject, kind))
            .with_image_output(kind.aspect_ratio());

        let response = self.gateway.call(&request, cancel).await?;
        match response.first_inline_data() {
            Some((mime_type, data)) => Ok(Some(data_uri(mime_type, data))),
            None => {
                debug!("model returned no image for {:?}", kind);
                Ok(None)
            }
        }
    }
}

/// The payload arrives base64 encoded already, so wrapping it is enough
/// to make it directly renderable.
pub fn data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data.trim())
}

fn image_prompt(subject: &str, kind: ImageKind) -> String {
    match kind {
        ImageKind::OutfitPortrait => format!(
            "Full-length fashion editorial photograph of a model wearing this outfit, \
             head to toe, clean studio background, soft natural light: {}",
            subject
        ),
        ImageKind::TrendMoodboard => format!(
            "Fashion moodboard collage capturing this trend, magazine layout with \
             fabric swatches and styled pieces: {}",
            subject
        ),
        ImageKind::PaletteSwatch => format!(
            "Abstract artistic color palette of overlapping paint swatches and fabric \
             textures, no text, no people: {}",
            subject
        ),
    }
}
