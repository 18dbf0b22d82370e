// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares a closed enumeration whose wire form is a human label
/// ("Date Night", "Mid-Range") shared by the UI, the prompts and the
/// model's structured output.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        format!(
                            "unknown {} '{}', expected one of: {}",
                            stringify!($name),
                            wanted,
                            Self::labels().join(", ")
                        )
                    })
            }
        }
    };
}

labelled_enum!(Occasion {
    Casual => "Casual",
    Work => "Work",
    DateNight => "Date Night",
    FormalEvent => "Formal Event",
    Party => "Party",
    Vacation => "Vacation",
});

labelled_enum!(Vibe {
    Minimalist => "Minimalist",
    Bohemian => "Bohemian",
    Streetwear => "Streetwear",
    Classic => "Classic",
    Edgy => "Edgy",
    Romantic => "Romantic",
});

labelled_enum!(BudgetTier {
    Budget => "Budget-Friendly",
    MidRange => "Mid-Range",
    Luxury => "Luxury",
});

labelled_enum!(
    /// Seasonal color type. Anything else coming back from the model is a
    /// contract violation.
    Season {
        Spring => "Spring",
        Summer => "Summer",
        Autumn => "Autumn",
        Winter => "Winter",
    }
);

labelled_enum!(Undertone {
    Warm => "Warm",
    Cool => "Cool",
    Neutral => "Neutral",
});

/// An image inlined into a model request.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct StyleRequestParameters {
    pub occasion: Occasion,
    pub vibe: Vibe,
    pub budget: BudgetTier,
    pub reference_image: Option<ReferenceImage>,
    pub palette: Option<PersonalColorProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitRecommendation {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub key_items: Vec<String>,
    pub accessories: Vec<String>,
    pub styling_tip: String,
    pub seasonal_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleAnalysisResult {
    pub recommendations: Vec<OutfitRecommendation>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalColorProfile {
    pub season: Season,
    pub undertone: Undertone,
    pub best_colors: Vec<String>,
    pub avoid_colors: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub title: String,
    pub description: String,
    pub context: String,
    #[serde(
        default,
        rename = "imageUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOutfit {
    #[serde(flatten)]
    pub outfit: OutfitRecommendation,
    pub saved_at: DateTime<Utc>,
}

/// Which illustration to generate. Each kind owns exactly one aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    OutfitPortrait,
    TrendMoodboard,
    PaletteSwatch,
}

impl ImageKind {
    pub fn aspect_ratio(self) -> &'static str {
        match self {
            ImageKind::OutfitPortrait => "3:4",
            ImageKind::TrendMoodboard => "16:9",
            ImageKind::PaletteSwatch => "1:1",
        }
    }
}

/// A batch item whose illustration arrives after the item itself.
/// Items are valid and displayable while the image is still absent.
pub trait DeferredImage {
    fn image_kind(&self) -> ImageKind;
    fn image_subject(&self) -> String;
    fn attach_image(&mut self, url: String);
}

impl DeferredImage for OutfitRecommendation {
    fn image_kind(&self) -> ImageKind {
        ImageKind::OutfitPortrait
    }

    fn image_subject(&self) -> String {
        format!(
            "{}: {}. Key pieces: {}. Accessories: {}.",
            self.name,
            self.description,
            self.key_items.join(", "),
            self.accessories.join(", ")
        )
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl DeferredImage for TrendItem {
    fn image_kind(&self) -> ImageKind {
        ImageKind::TrendMoodboard
    }

    fn image_subject(&self) -> String {
        format!("{} ({}): {}", self.title, self.context, self.description)
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl DeferredImage for PersonalColorProfile {
    fn image_kind(&self) -> ImageKind {
        ImageKind::PaletteSwatch
    }

    fn image_subject(&self) -> String {
        format!(
            "{} palette with {} undertone: {}",
            self.season,
            self.undertone,
            self.best_colors.join(", ")
        )
    }

    fn attach_image(&mut self, url: String) {
        self.palette_image_url = Some(url);
    }
}

/// What a board entry holds while its deferred images are being filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Batch {
    Outfits(StyleAnalysisResult),
    Trends(Vec<TrendItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Filling,
    Complete,
    Partial,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub batch: Batch,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("mid-range".parse::<BudgetTier>(), Ok(BudgetTier::MidRange));
        assert_eq!(" Date Night ".parse::<Occasion>(), Ok(Occasion::DateNight));
        assert!("Monsoon".parse::<Season>().is_err());
    }

    #[test]
    fn profile_rejects_out_of_domain_season() {
        let raw = serde_json::json!({
            "season": "Monsoon",
            "undertone": "Warm",
            "bestColors": [],
            "avoidColors": [],
            "description": "x"
        });
        assert!(serde_json::from_value::<PersonalColorProfile>(raw).is_err());
    }

    #[test]
    fn recommendation_without_image_is_valid() {
        let raw = serde_json::json!({
            "name": "Linen Layers",
            "description": "Easy neutrals",
            "keyItems": ["linen shirt"],
            "accessories": ["tote"],
            "stylingTip": "Roll the sleeves",
            "seasonalContext": "Late summer"
        });
        let outfit: OutfitRecommendation = serde_json::from_value(raw).unwrap();
        assert!(outfit.id.is_empty());
        assert!(outfit.image_url.is_none());
        let back = serde_json::to_value(&outfit).unwrap();
        assert!(back.get("imageUrl").is_none());
    }

    #[test]
    fn saved_outfit_flattens_recommendation() {
        let saved = SavedOutfit {
            outfit: OutfitRecommendation {
                id: "a".into(),
                name: "n".into(),
                description: "d".into(),
                key_items: vec![],
                accessories: vec![],
                styling_tip: "t".into(),
                seasonal_context: "s".into(),
                image_url: None,
            },
            saved_at: Utc::now(),
        };
        let value = serde_json::to_value(&saved).unwrap();
        assert_eq!(value["id"], "a");
        assert!(value.get("savedAt").is_some());
    }

    #[test]
    fn every_image_kind_has_one_aspect_ratio() {
        assert_eq!(ImageKind::OutfitPortrait.aspect_ratio(), "3:4");
        assert_eq!(ImageKind::TrendMoodboard.aspect_ratio(), "16:9");
        assert_eq!(ImageKind::PaletteSwatch.aspect_ratio(), "1:1");
    }
}
