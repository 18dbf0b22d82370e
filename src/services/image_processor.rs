// src/services/image_processor.rs
use crate::errors::StyleSenseError;
use crate::models::ReferenceImage;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};

/// Longest edge sent upstream. Larger photos cost tokens without helping
/// the color or outfit analysis.
const MAX_EDGE: u32 = 1536;
/// Inline payloads are base64 encoded, which grows them by about a third.
const MAX_INLINE_BYTES: usize = 3_750_000;
const MAX_INPUT_EDGE: u32 = 8192;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn mime_type(&self, data: &[u8]) -> Result<&'static str, StyleSenseError> {
        let format = image::guess_format(data).map_err(|e| {
            StyleSenseError::ImageProcessing(format!("Unrecognised image data: {}", e))
        })?;
        match format {
            ImgFormat::Png => Ok("image/png"),
            ImgFormat::Jpeg => Ok("image/jpeg"),
            ImgFormat::WebP => Ok("image/webp"),
            ImgFormat::Gif => Ok("image/gif"),
            other => Err(StyleSenseError::ImageProcessing(format!(
                "Unsupported image format: {:?}",
                other
            ))),
        }
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), StyleSenseError> {
        let img = image::load_from_memory(data)
            .map_err(|e| StyleSenseError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();
        if width > MAX_INPUT_EDGE || height > MAX_INPUT_EDGE {
            return Err(StyleSenseError::ImageProcessing(format!(
                "Image dimensions exceed {0}x{0}",
                MAX_INPUT_EDGE
            )));
        }

        Ok((width, height))
    }

    /// Validates an uploaded photo and shrinks it when it is too large to
    /// inline into a model request. Small images pass through untouched.
    pub fn prepare_reference(&self, data: &[u8]) -> Result<ReferenceImage, StyleSenseError> {
        if data.is_empty() {
            return Err(StyleSenseError::Validation("Empty image upload".to_string()));
        }
        let mime_type = self.mime_type(data)?;
        let (width, height) = self.validate_image(data)?;

        if width <= MAX_EDGE && height <= MAX_EDGE && data.len() <= MAX_INLINE_BYTES {
            return Ok(ReferenceImage {
                mime_type: mime_type.to_string(),
                data: Bytes::copy_from_slice(data),
            });
        }

        let img = image::load_from_memory(data)
            .map_err(|e| StyleSenseError::ImageProcessing(format!("Failed to load image: {}", e)))?;
        let resized = self.downscale(img, MAX_EDGE);

        let mut output = Vec::new();
        DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Jpeg)
            .map_err(|e| {
                StyleSenseError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(ReferenceImage {
            mime_type: "image/jpeg".to_string(),
            data: Bytes::from(output),
        })
    }

    fn downscale(&self, img: DynamicImage, max_edge: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let ratio = (max_edge as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);
        img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}
