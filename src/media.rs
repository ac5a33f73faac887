use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::domain::EncodedImage;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub label: String,
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    UnsupportedFormat(String),
    TooLarge { bytes: usize, limit: usize },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io(err) => write!(f, "could not read image: {}", err),
            ImageError::UnsupportedFormat(label) => {
                write!(f, "'{}' is not a JPEG, PNG, GIF or WebP image", label)
            }
            ImageError::TooLarge { bytes, limit } => {
                write!(f, "image is {} bytes, limit is {}", bytes, limit)
            }
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImageError::Io(err) => Some(err),
            ImageError::UnsupportedFormat(_) => None,
            ImageError::TooLarge { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(value: std::io::Error) -> Self {
        ImageError::Io(value)
    }
}

/// Turns a raw upload into the encoded payload stored on a spot.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    async fn encode(&self, raw: &RawImage) -> Result<EncodedImage, ImageError>;
}

/// Wraps already-compressed images into base64 data URLs. It does not
/// resample; oversized inputs are rejected instead.
#[derive(Debug, Clone)]
pub struct DataUrlPipeline {
    max_bytes: usize,
}

impl DataUrlPipeline {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for DataUrlPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

#[async_trait]
impl ImagePipeline for DataUrlPipeline {
    async fn encode(&self, raw: &RawImage) -> Result<EncodedImage, ImageError> {
        let media_type = sniff_media_type(&raw.bytes)
            .ok_or_else(|| ImageError::UnsupportedFormat(raw.label.clone()))?;
        if raw.bytes.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                bytes: raw.bytes.len(),
                limit: self.max_bytes,
            });
        }
        Ok(EncodedImage::new(format!(
            "data:{};base64,{}",
            media_type,
            STANDARD.encode(&raw.bytes)
        )))
    }
}

pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{sniff_media_type, DataUrlPipeline, ImageError, ImagePipeline, RawImage};

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn sniffs_supported_formats() {
        assert_eq!(sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_media_type(PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_media_type(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_media_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_media_type(b"%PDF-1.7"), None);
    }

    #[tokio::test]
    async fn encodes_png_as_data_url() {
        let pipeline = DataUrlPipeline::default();
        let encoded = pipeline
            .encode(&RawImage::new("a.png", PNG_HEADER.to_vec()))
            .await
            .expect("png should encode");
        assert!(encoded.as_str().starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(encoded.media_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn rejects_unknown_and_oversized_inputs() {
        let pipeline = DataUrlPipeline::new(8);
        let unknown = pipeline
            .encode(&RawImage::new("notes.txt", b"hello".to_vec()))
            .await;
        assert!(matches!(unknown, Err(ImageError::UnsupportedFormat(label)) if label == "notes.txt"));

        let big = pipeline
            .encode(&RawImage::new("big.png", PNG_HEADER.to_vec()))
            .await;
        assert!(matches!(
            big,
            Err(ImageError::TooLarge { bytes: 16, limit: 8 })
        ));
    }
}
