// src/services/stylist.rs
//! End-to-end flows: the primary request is answered right away, and the
//! deferred illustrations are filled afterwards in a background task.
//!
//! Primary failures go back to the caller. Image failures only leave the
//! image field empty.

use crate::errors::StyleSenseError;
use crate::models::*;
use crate::services::board::{BatchBoard, BatchPublisher, FillSlot};
use crate::services::image_client::ImageRequestClient;
use crate::services::sequencer::{PacedSequencer, SequenceReport};
use crate::services::store::ProfileStore;
use crate::services::style_client::StyleRequestClient;
use log::{info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct Stylist {
    style: StyleRequestClient,
    images: Arc<ImageRequestClient>,
    sequencer: PacedSequencer,
    store: ProfileStore,
    board: Arc<BatchBoard>,
}

/// A primary result plus the handle of the task filling its images.
pub struct Started<T> {
    pub batch_id: Uuid,
    pub value: T,
    pub fill: JoinHandle<SequenceReport>,
}

impl Stylist {
    pub fn new(
        style: StyleRequestClient,
        images: ImageRequestClient,
        sequencer: PacedSequencer,
        store: ProfileStore,
        board: Arc<BatchBoard>,
    ) -> Self {
        Self {
            style,
            images: Arc::new(images),
            sequencer,
            store,
            board,
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn board(&self) -> &BatchBoard {
        &self.board
    }

    pub async fn recommend(
        &self,
        mut params: StyleRequestParameters,
        use_color_profile: bool,
    ) -> Result<Started<StyleAnalysisResult>, StyleSenseError> {
        if use_color_profile && params.palette.is_none() {
            params.palette = self.store.color_profile().await?;
        }

        let cancel = self.board.supersede(FillSlot::Outfits);
        let result = self
            .style
            .request_outfit_recommendations(&params, &cancel)
            .await?;

        let publisher = self.board.open(Batch::Outfits(result.clone()), cancel);
        let requests = image_requests(&result.recommendations);
        let batch_id = publisher.batch_id();
        let fill = self.spawn_fill(publisher, requests);

        Ok(Started {
            batch_id,
            value: result,
            fill,
        })
    }

    pub async fn seasonal_trends(&self) -> Result<Started<Vec<TrendItem>>, StyleSenseError> {
        let cancel = self.board.supersede(FillSlot::Trends);
        let trends = self.style.request_seasonal_trends(&cancel).await?;

        let publisher = self.board.open(Batch::Trends(trends.clone()), cancel);
        let requests = image_requests(&trends);
        let batch_id = publisher.batch_id();
        let fill = self.spawn_fill(publisher, requests);

        Ok(Started {
            batch_id,
            value: trends,
            fill,
        })
    }

    /// Analyses the photo and persists the profile. The palette swatch is
    /// generated afterwards and written back only if the stored profile is
    /// still the one it was generated for.
    pub async fn analyze_colors(
        &self,
        photo: &ReferenceImage,
    ) -> Result<(PersonalColorProfile, JoinHandle<SequenceReport>), StyleSenseError> {
        let cancel = self.board.supersede(FillSlot::Palette);
        let profile = self.style.request_color_analysis(photo, &cancel).await?;
        self.store.set_color_profile(&profile).await?;

        let images = self.images.clone();
        let store = self.store.clone();
        let sequencer = self.sequencer;
        let original = profile.clone();
        let request = (profile.image_subject(), profile.image_kind());

        let fill = tokio::spawn(async move {
            let mut swatch = None;
            let report = sequencer
                .run(
                    vec![request],
                    |(subject, kind)| {
                        let images = images.clone();
                        let token = cancel.clone();
                        async move { images.request_image(&subject, kind, &token).await }
                    },
                    |_, url| swatch = Some(url),
                    &cancel,
                )
                .await;

            if let Some(url) = swatch {
                match store.color_profile().await {
                    Ok(Some(current)) if current == original => {
                        let mut updated = current;
                        updated.attach_image(url);
                        if let Err(e) = store.set_color_profile(&updated).await {
                            warn!("failed to persist palette image: {}", e);
                        }
                    }
                    Ok(_) => info!("color profile changed, dropping stale palette image"),
                    Err(e) => warn!("failed to reload color profile: {}", e),
                }
            }
            report
        });

        Ok((profile, fill))
    }

    fn spawn_fill(
        &self,
        publisher: BatchPublisher,
        requests: Vec<(String, ImageKind)>,
    ) -> JoinHandle<SequenceReport> {
        let images = self.images.clone();
        let sequencer = self.sequencer;

        tokio::spawn(async move {
            let cancel = publisher.cancel_token().clone();
            let report = sequencer
                .run(
                    requests,
                    |(subject, kind)| {
                        let images = images.clone();
                        let token = cancel.clone();
                        async move { images.request_image(&subject, kind, &token).await }
                    },
                    |index, url| publisher.attach_image(index, url),
                    &cancel,
                )
                .await;

            info!(
                "batch {} image fill finished{}: {} ok, {} without image, {} failed, {} skipped",
                publisher.batch_id(),
                if report.is_partial() { " with partial results" } else { "" },
                report.succeeded,
                report.empty,
                report.failed,
                report.skipped
            );
            publisher.finish(report.status());
            report
        })
    }
}

fn image_requests<T: DeferredImage>(items: &[T]) -> Vec<(String, ImageKind)> {
    items
        .iter()
        .map(|item| (item.image_subject(), item.image_kind()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::ModelGateway;
    use crate::services::retry::RetryPolicy;
    use crate::services::store::MemoryStore;
    use crate::services::testing::{MockTransport, image_response, test_key, text_response};
    use crate::services::transport::ContentPart;
    use serde_json::json;
    use std::time::Duration;

    fn stylist(transport: Arc<MockTransport>) -> Stylist {
        let gateway = Arc::new(ModelGateway::new(
            transport,
            test_key(),
            RetryPolicy::new(2, Duration::from_millis(100)),
        ));
        Stylist::new(
            StyleRequestClient::new(gateway.clone(), "text-model"),
            ImageRequestClient::new(gateway, "image-model"),
            PacedSequencer::new(Duration::from_millis(800)),
            ProfileStore::new(Arc::new(MemoryStore::default())),
            Arc::new(BatchBoard::new()),
        )
    }

    fn recommendations_text() -> String {
        let outfit = |id: &str| {
            json!({
                "id": id,
                "name": format!("Look {id}"),
                "description": "d",
                "keyItems": ["knit"],
                "accessories": ["scarf"],
                "stylingTip": "Layer it",
                "seasonalContext": "Autumn"
            })
        };
        json!({
            "recommendations": [outfit("r1"), outfit("r2"), outfit("r3")],
            "summary": "Cozy layers"
        })
        .to_string()
    }

    fn params() -> StyleRequestParameters {
        StyleRequestParameters {
            occasion: Occasion::Casual,
            vibe: Vibe::Minimalist,
            budget: BudgetTier::MidRange,
            reference_image: None,
            palette: None,
        }
    }

    fn outfit_images(snapshot: &BatchSnapshot) -> Vec<Option<String>> {
        match &snapshot.batch {
            Batch::Outfits(result) => result
                .recommendations
                .iter()
                .map(|r| r.image_url.clone())
                .collect(),
            other => panic!("unexpected batch: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recommendation_images_fill_progressively() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&recommendations_text())),
            Ok(image_response("image/png", "AAA")),
            Ok(image_response("image/png", "BBB")),
            Ok(image_response("image/png", "CCC")),
        ]));
        let stylist = stylist(transport.clone());

        let started = stylist.recommend(params(), false).await.unwrap();
        assert!(started.value.recommendations.iter().all(|r| r.image_url.is_none()));

        let report = started.fill.await.unwrap();
        assert_eq!(report.succeeded, 3);

        let snapshot = stylist.board().snapshot(&started.batch_id).unwrap();
        assert_eq!(snapshot.status, BatchStatus::Complete);
        assert_eq!(
            outfit_images(&snapshot),
            vec![
                Some("data:image/png;base64,AAA".to_string()),
                Some("data:image/png;base64,BBB".to_string()),
                Some("data:image/png;base64,CCC".to_string()),
            ]
        );
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn single_rate_limit_on_image_is_waited_out() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&recommendations_text())),
            Err(StyleSenseError::RateLimited("status 429".into())),
            Ok(image_response("image/png", "AAA")),
            Ok(image_response("image/png", "BBB")),
            Ok(image_response("image/png", "CCC")),
        ]));
        let stylist = stylist(transport.clone());

        let started = stylist.recommend(params(), false).await.unwrap();
        let report = started.fill.await.unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.stopped, None);
        let snapshot = stylist.board().snapshot(&started.batch_id).unwrap();
        assert_eq!(snapshot.status, BatchStatus::Complete);
        assert_eq!(
            outfit_images(&snapshot),
            vec![
                Some("data:image/png;base64,AAA".to_string()),
                Some("data:image/png;base64,BBB".to_string()),
                Some("data:image/png;base64,CCC".to_string()),
            ]
        );
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn image_without_payload_leaves_partial_batch() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&recommendations_text())),
            Ok(image_response("image/png", "AAA")),
            Ok(text_response("I can't draw that.")),
            Ok(image_response("image/png", "CCC")),
        ]));
        let stylist = stylist(transport.clone());

        let started = stylist.recommend(params(), false).await.unwrap();
        let report = started.fill.await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.empty, 1);
        let snapshot = stylist.board().snapshot(&started.batch_id).unwrap();
        assert_eq!(snapshot.status, BatchStatus::Partial);
        assert_eq!(
            outfit_images(&snapshot),
            vec![
                Some("data:image/png;base64,AAA".to_string()),
                None,
                Some("data:image/png;base64,CCC".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_limit_leaves_partial_batch() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&recommendations_text())),
            Ok(image_response("image/png", "AAA")),
            Err(StyleSenseError::RateLimited("status 429".into())),
            Err(StyleSenseError::RateLimited("status 429".into())),
        ]));
        let stylist = stylist(transport.clone());

        let started = stylist.recommend(params(), false).await.unwrap();
        let report = started.fill.await.unwrap();

        assert!(report.is_partial());
        let snapshot = stylist.board().snapshot(&started.batch_id).unwrap();
        assert_eq!(snapshot.status, BatchStatus::Partial);
        assert_eq!(
            outfit_images(&snapshot),
            vec![Some("data:image/png;base64,AAA".to_string()), None, None]
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn new_request_cancels_previous_fill() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&recommendations_text())),
            Ok(text_response(&recommendations_text())),
            Ok(image_response("image/png", "AAA")),
            Ok(image_response("image/png", "BBB")),
            Ok(image_response("image/png", "CCC")),
        ]));
        let stylist = stylist(transport.clone());

        let first = stylist.recommend(params(), false).await.unwrap();
        let second = stylist.recommend(params(), false).await.unwrap();

        let first_report = first.fill.await.unwrap();
        assert_eq!(first_report.succeeded, 0);
        assert_eq!(
            stylist.board().snapshot(&first.batch_id).unwrap().status,
            BatchStatus::Cancelled
        );

        let second_report = second.fill.await.unwrap();
        assert_eq!(second_report.succeeded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stored_palette_feeds_recommendations() {
        let transport = Arc::new(MockTransport::new(vec![Ok(text_response(
            &recommendations_text(),
        ))]));
        let stylist = stylist(transport.clone());
        stylist
            .store()
            .set_color_profile(&PersonalColorProfile {
                season: Season::Summer,
                undertone: Undertone::Cool,
                best_colors: vec!["dusty rose".into()],
                avoid_colors: vec!["orange".into()],
                description: "Soft".into(),
                palette_image_url: None,
            })
            .await
            .unwrap();

        let started = stylist.recommend(params(), true).await.unwrap();
        started.fill.abort();

        match &transport.requests()[0].parts[0] {
            ContentPart::Text(prompt) => assert!(prompt.contains("dusty rose")),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn color_analysis_persists_profile_then_palette() {
        let profile_text = json!({
            "season": "Spring",
            "undertone": "Warm",
            "bestColors": ["coral", "peach"],
            "avoidColors": ["black"],
            "description": "Light and warm"
        })
        .to_string();
        let transport = Arc::new(MockTransport::new(vec![
            Ok(text_response(&profile_text)),
            Ok(image_response("image/png", "PAL")),
        ]));
        let stylist = stylist(transport.clone());
        let photo = ReferenceImage {
            mime_type: "image/jpeg".into(),
            data: bytes::Bytes::from_static(b"jpeg"),
        };

        let (profile, fill) = stylist.analyze_colors(&photo).await.unwrap();
        assert_eq!(profile.season, Season::Spring);
        assert!(profile.palette_image_url.is_none());

        fill.await.unwrap();
        let stored = stylist.store().color_profile().await.unwrap().unwrap();
        assert_eq!(
            stored.palette_image_url.as_deref(),
            Some("data:image/png;base64,PAL")
        );
        assert_eq!(transport.requests()[1].aspect_ratio, Some("1:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn trend_failure_surfaces_to_caller() {
        let transport = Arc::new(MockTransport::new(vec![Ok(text_response(
            "Sorry, no trends today.",
        ))]));
        let stylist = stylist(transport);
        let err = stylist.seasonal_trends().await.err().unwrap();
        assert!(matches!(err, StyleSenseError::MalformedResponse { .. }));
    }
}
