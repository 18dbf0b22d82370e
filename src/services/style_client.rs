// src/services/style_client.rs
use crate::errors::StyleSenseError;
use crate::models::*;
use crate::services::gateway::ModelGateway;
use crate::services::response_decoder;
use crate::services::transport::GenerateRequest;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Recommendations per batch. Fixed, not user configurable.
pub const RECOMMENDATION_COUNT: usize = 3;
pub const TREND_COUNT: usize = 4;

pub struct StyleRequestClient {
    gateway: Arc<ModelGateway>,
    model: String,
}

impl StyleRequestClient {
    pub fn new(gateway: Arc<ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub async fn request_outfit_recommendations(
        &self,
        params: &StyleRequestParameters,
        cancel: &CancellationToken,
    ) -> Result<StyleAnalysisResult, StyleSenseError> {
        let mut request = GenerateRequest::new(&self.model, outfit_prompt(params))
            .with_schema(recommendation_schema());
        if let Some(image) = &params.reference_image {
            request = request.with_image(&image.mime_type, image.data.clone());
        }

        let response = self.gateway.call(&request, cancel).await?;
        let raw = response.text();
        let mut result: StyleAnalysisResult = response_decoder::decode(&raw)?;

        if result.recommendations.len() > RECOMMENDATION_COUNT {
            warn!(
                "model returned {} recommendations, keeping the first {}",
                result.recommendations.len(),
                RECOMMENDATION_COUNT
            );
            result.recommendations.truncate(RECOMMENDATION_COUNT);
        }
        if result.recommendations.len() < RECOMMENDATION_COUNT
            || result.summary.trim().is_empty()
            || result
                .recommendations
                .iter()
                .any(|r| r.name.trim().is_empty() || r.styling_tip.trim().is_empty())
        {
            return Err(StyleSenseError::malformed(&raw));
        }

        assign_unique_ids(&mut result.recommendations);
        for recommendation in &mut result.recommendations {
            recommendation.image_url = None;
        }

        info!(
            "received {} recommendations for {} / {} / {}",
            result.recommendations.len(),
            params.occasion,
            params.vibe,
            params.budget
        );
        Ok(result)
    }

    pub async fn request_color_analysis(
        &self,
        image: &ReferenceImage,
        cancel: &CancellationToken,
    ) -> Result<PersonalColorProfile, StyleSenseError> {
        let request = GenerateRequest::new(&self.model, color_analysis_prompt())
            .with_image(&image.mime_type, image.data.clone())
            .with_schema(color_profile_schema());

        let response = self.gateway.call(&request, cancel).await?;
        let raw = response.text();
        let mut profile: PersonalColorProfile = response_decoder::decode(&raw)?;
        if profile.best_colors.is_empty() {
            return Err(StyleSenseError::malformed(&raw));
        }
        profile.palette_image_url = None;

        info!(
            "color analysis: {} with {} undertone",
            profile.season, profile.undertone
        );
        Ok(profile)
    }

    pub async fn request_seasonal_trends(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<TrendItem>, StyleSenseError> {
        let request =
            GenerateRequest::new(&self.model, trends_prompt()).with_schema(trends_schema());

        let response = self.gateway.call(&request, cancel).await?;
        let raw = response.text();
        let mut trends = match response_decoder::decode::<TrendsEnvelope>(&raw)? {
            TrendsEnvelope::Bare(items) | TrendsEnvelope::Wrapped { trends: items } => items,
        };

        if trends.len() < TREND_COUNT {
            warn!("expected {} trends, model returned {}", TREND_COUNT, trends.len());
            return Err(StyleSenseError::malformed(&raw));
        }
        trends.truncate(TREND_COUNT);
        for trend in &mut trends {
            trend.image_url = None;
        }
        Ok(trends)
    }
}

/// Trend lists come back either bare or under a `trends` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum TrendsEnvelope {
    Bare(Vec<TrendItem>),
    Wrapped { trends: Vec<TrendItem> },
}

/// Keeps model-supplied identifiers when they are present and unique
/// within the batch; otherwise every item gets a fresh one so later image
/// updates can target items unambiguously.
fn assign_unique_ids(recommendations: &mut [OutfitRecommendation]) {
    let mut seen = HashSet::new();
    let usable = recommendations
        .iter()
        .all(|r| !r.id.trim().is_empty() && seen.insert(r.id.trim().to_string()));
    if usable {
        return;
    }
    for recommendation in recommendations.iter_mut() {
        recommendation.id = Uuid::new_v4().to_string();
    }
}

fn outfit_prompt(params: &StyleRequestParameters) -> String {
    let mut prompt = format!(
        "You are a professional personal stylist. Suggest exactly {count} distinct outfits \
         for the following brief.\n\
         Occasion: {occasion}\n\
         Style vibe: {vibe}\n\
         Budget: {budget}\n",
        count = RECOMMENDATION_COUNT,
        occasion = params.occasion,
        vibe = params.vibe,
        budget = params.budget,
    );

    if let Some(palette) = &params.palette {
        prompt.push_str(&format!(
            "The client is a {} type with a {} undertone. Favour these colors: {}. \
             Avoid these colors: {}.\n",
            palette.season,
            palette.undertone,
            palette.best_colors.join(", "),
            palette.avoid_colors.join(", ")
        ));
    }

    if params.reference_image.is_some() {
        prompt.push_str(
            "A reference photo is attached. Build the outfits around the pieces or \
             style visible in it.\n",
        );
    }

    prompt.push_str(
        "For each outfit give a short name, a description, the key items, the \
         accessories, one practical styling tip and a note on which season or weather \
         it suits. Finish with a one-paragraph summary of the overall styling direction. \
         Respond with JSON only.",
    );
    prompt
}

fn color_analysis_prompt() -> String {
    format!(
        "You are an expert in seasonal color analysis. Study the skin tone, hair and \
         eye color of the person in the attached photo. Classify their season as one of \
         {seasons} and their undertone as one of {undertones}. List the colors that \
         flatter them most and the colors they should avoid, and describe the palette \
         in two or three sentences. Respond with JSON only.",
        seasons = Season::labels().join(", "),
        undertones = Undertone::labels().join(", "),
    )
}

fn trends_prompt() -> String {
    format!(
        "You are a fashion trend forecaster. List exactly {TREND_COUNT} fashion trends \
         that matter this season. For each give a title, a two-sentence description and a \
         short context tag such as the setting or category it belongs to. \
         Respond with JSON only."
    )
}

fn string_array() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

fn recommendation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "recommendations": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "keyItems": string_array(),
                        "accessories": string_array(),
                        "stylingTip": { "type": "STRING" },
                        "seasonalContext": { "type": "STRING" }
                    },
                    "required": [
                        "id", "name", "description", "keyItems",
                        "accessories", "stylingTip", "seasonalContext"
                    ]
                }
            },
            "summary": { "type": "STRING" }
        },
        "required": ["recommendations", "summary"]
    })
}

fn color_profile_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "season": { "type": "STRING", "enum": Season::labels() },
            "undertone": { "type": "STRING", "enum": Undertone::labels() },
            "bestColors": string_array(),
            "avoidColors": string_array(),
            "description": { "type": "STRING" }
        },
        "required": ["season", "undertone", "bestColors", "avoidColors", "description"]
    })
}

fn trends_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "description": { "type": "STRING" },
                "context": { "type": "STRING" }
            },
            "required": ["title", "description", "context"]
        }
    })
}
