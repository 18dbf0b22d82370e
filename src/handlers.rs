// src/handlers.rs
use crate::services::sequencer::SequenceReport;
use crate::{AppState, errors::StyleSenseError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt;
use log::{debug, error};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::task::JoinHandle;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/v1")
            .route("/recommendations", web::post().to(recommend_outfits))
            .route("/batches/{batch_id}", web::get().to(get_batch))
            .route("/color-analysis", web::post().to(analyze_colors))
            .route("/color-profile", web::get().to(get_color_profile))
            .route("/color-profile", web::delete().to(clear_color_profile))
            .route("/trends", web::get().to(seasonal_trends))
            .route("/saved-outfits", web::get().to(list_saved_outfits))
            .route("/saved-outfits", web::post().to(save_outfit))
            .route("/saved-outfits/{outfit_id}", web::delete().to(remove_saved_outfit)),
    );
}

async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "stylesense",
        "version": env!("CARGO_PKG_VERSION"),
        "configured": data.configured
    }))
}

/// Text fields and the (single) image file of a multipart form.
#[derive(Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    image: Option<Vec<u8>>,
}

impl UploadForm {
    fn required<T>(&self, name: &str) -> Result<T, StyleSenseError>
    where
        T: FromStr<Err = String>,
    {
        self.fields
            .get(name)
            .ok_or_else(|| StyleSenseError::Validation(format!("missing field '{}'", name)))?
            .parse()
            .map_err(StyleSenseError::Validation)
    }

    fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| matches!(v.trim(), "true" | "1" | "on"))
    }
}

/// Image fills outlive the request that started them; this logs how each
/// one ended.
fn watch_fill(label: String, fill: JoinHandle<SequenceReport>) {
    tokio::spawn(async move {
        match fill.await {
            Ok(report) => debug!("{} fill ended {:?}: {:?}", label, report.status(), report),
            Err(e) if e.is_cancelled() => debug!("{} fill aborted", label),
            Err(e) => error!("{} fill panicked: {}", label, e),
        }
    });
}

async fn read_form(mut payload: Multipart) -> Result<UploadForm, StyleSenseError> {
    let mut form = UploadForm::default();
    let invalid = |e: actix_multipart::MultipartError| {
        StyleSenseError::Validation(format!("Invalid multipart body: {}", e))
    };

    while let Some(mut field) = payload.try_next().await.map_err(invalid)? {
        let name = field.name().to_string();
        let is_file = field.content_disposition().get_filename().is_some();

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid)? {
            if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(StyleSenseError::Validation(
                    "Upload exceeds the 20MB limit".to_string(),
                ));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file || name == "image" {
            if !data.is_empty() {
                form.image = Some(data);
            }
        } else {
            let value = String::from_utf8(data).map_err(|_| {
                StyleSenseError::Validation(format!("field '{}' is not valid UTF-8", name))
            })?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

pub async fn recommend_outfits(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let form = read_form(payload).await?;

    let reference_image = match &form.image {
        Some(bytes) => Some(data.image_processor.prepare_reference(bytes)?),
        None => None,
    };
    let params = StyleRequestParameters {
        occasion: form.required("occasion")?,
        vibe: form.required("vibe")?,
        budget: form.required("budget")?,
        reference_image,
        palette: None,
    };

    let started = data
        .stylist
        .recommend(params, form.flag("use_color_profile"))
        .await?;
    watch_fill(format!("batch {}", started.batch_id), started.fill);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "batch_id": started.batch_id,
        "result": started.value
    })))
}

pub async fn get_batch(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let batch_id = path.into_inner();
    let snapshot = data
        .stylist
        .board()
        .snapshot(&batch_id)
        .ok_or_else(|| StyleSenseError::NotFound(format!("batch {}", batch_id)))?;

    Ok(HttpResponse::Ok().json(&snapshot))
}

pub async fn analyze_colors(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let form = read_form(payload).await?;
    let image = form
        .image
        .as_deref()
        .ok_or_else(|| StyleSenseError::Validation("an image file is required".to_string()))?;
    let photo = data.image_processor.prepare_reference(image)?;

    let (profile, fill) = data.stylist.analyze_colors(&photo).await?;
    watch_fill("palette".to_string(), fill);
    Ok(HttpResponse::Ok().json(&profile))
}

pub async fn get_color_profile(
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let profile = data
        .stylist
        .store()
        .color_profile()
        .await?
        .ok_or_else(|| StyleSenseError::NotFound("color profile".to_string()))?;

    Ok(HttpResponse::Ok().json(&profile))
}

pub async fn clear_color_profile(
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    data.stylist.store().clear_color_profile().await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn seasonal_trends(data: web::Data<AppState>) -> Result<HttpResponse, StyleSenseError> {
    let started = data.stylist.seasonal_trends().await?;
    watch_fill(format!("batch {}", started.batch_id), started.fill);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "batch_id": started.batch_id,
        "trends": started.value
    })))
}

pub async fn list_saved_outfits(
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let saved = data.stylist.store().saved_outfits().await?;
    Ok(HttpResponse::Ok().json(&saved))
}

pub async fn save_outfit(
    data: web::Data<AppState>,
    body: web::Json<OutfitRecommendation>,
) -> Result<HttpResponse, StyleSenseError> {
    let saved = data.stylist.store().save_outfit(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&saved))
}

pub async fn remove_saved_outfit(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StyleSenseError> {
    let saved = data.stylist.store().remove_outfit(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&saved))
}
