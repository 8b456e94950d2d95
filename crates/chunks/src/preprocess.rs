//! Optional payload reduction before encoding.
//!
//! Only image payloads are reduced: they are decoded, bounded to a maximum
//! side length, and re-encoded as JPEG. Everything else passes through.

use crate::error::PreprocessingError;
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use quire_core::config::PreprocessConfig;
use tracing::{debug, instrument};

/// Reduces a payload before it is encoded and stored.
///
/// Implementations must not assume ownership semantics beyond the cheap
/// `Bytes` clone: the caller keeps the original to fall back on.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn preprocess(
        &self,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<Bytes, PreprocessingError>;
}

/// Returns every payload unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

#[async_trait]
impl Preprocessor for PassThrough {
    async fn preprocess(
        &self,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<Bytes, PreprocessingError> {
        Ok(data)
    }
}

/// JPEG re-encoding for image payloads.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    quality: u8,
    max_dimension: Option<u32>,
}

impl ImagePreprocessor {
    pub fn new(quality: u8, max_dimension: Option<u32>) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_dimension,
        }
    }

    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self::new(config.jpeg_quality, config.max_dimension)
    }
}

#[async_trait]
impl Preprocessor for ImagePreprocessor {
    #[instrument(skip(self, data), fields(input_len = data.len()))]
    async fn preprocess(
        &self,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<Bytes, PreprocessingError> {
        // The bytes decide; the declared type is only a hint.
        let format = match image::guess_format(&data) {
            Ok(format) => format,
            Err(_) => match content_type {
                Some(ct) if ct.starts_with("image/") => {
                    return Err(PreprocessingError::Unrecognized {
                        content_type: ct.to_string(),
                    });
                }
                _ => return Ok(data),
            },
        };

        let quality = self.quality;
        let max_dimension = self.max_dimension;
        let input = data.clone();
        let reduced = tokio::task::spawn_blocking(move || {
            reencode(&input, format, quality, max_dimension)
        })
        .await
        .map_err(|e| PreprocessingError::Task(e.to_string()))??;

        if reduced.len() >= data.len() {
            debug!(output_len = reduced.len(), "re-encoding did not shrink payload, keeping original");
            return Ok(data);
        }
        debug!(output_len = reduced.len(), ?format, "image re-encoded");
        Ok(Bytes::from(reduced))
    }
}

fn reencode(
    data: &[u8],
    format: ImageFormat,
    quality: u8,
    max_dimension: Option<u32>,
) -> Result<Vec<u8>, PreprocessingError> {
    let mut img: DynamicImage = image::load_from_memory_with_format(data, format)?;
    if let Some(max) = max_dimension
        && (img.width() > max || img.height() > max)
    {
        img = img.resize(max, max, FilterType::Triangle);
    }

    let mut out = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out)
}
