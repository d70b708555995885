use std::path::PathBuf;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, codecs::jpeg::JpegEncoder, imageops::FilterType};
use sha2::{Digest, Sha256};

use crate::routes::expense::model::Receipt;

pub const OPTIMIZED_WIDTH: u32 = 640;
pub const OPTIMIZED_HEIGHT: u32 = 360;
const JPEG_QUALITY: u8 = 80;
const RECEIPTS_DIR: &str = "receipts";

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("receipt is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("receipt is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("receipt image format is not supported")]
    UnsupportedFormat,

    #[error("failed to process receipt image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to store receipt: {0}")]
    Io(#[from] std::io::Error),

    #[error("receipt worker stopped: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

struct Rendered {
    hash: String,
    extension: &'static str,
    original: Vec<u8>,
    optimized: Vec<u8>,
}

/// Stores receipt images on local disk under `upload_dir/receipts`, with a
/// cover-fit 640x360 JPEG next to each original.
#[derive(Debug, Clone)]
pub struct ReceiptProcessor {
    upload_dir: PathBuf,
    public_base_url: String,
    max_encoded_bytes: Option<usize>,
}

impl ReceiptProcessor {
    pub fn new(upload_dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_encoded_bytes: None,
        }
    }

    pub fn with_max_encoded_bytes(mut self, limit: usize) -> Self {
        self.max_encoded_bytes = Some(limit);
        self
    }

    /// Accepts raw base64 or a `data:image/...;base64,` URL.
    pub async fn process(&self, encoded: &str) -> Result<Receipt, ReceiptError> {
        if let Some(limit) = self.max_encoded_bytes {
            if encoded.len() > limit {
                return Err(ReceiptError::TooLarge {
                    size: encoded.len(),
                    limit,
                });
            }
        }
        let bytes = STANDARD.decode(strip_data_url(encoded).trim())?;
        let rendered = tokio::task::spawn_blocking(move || render(bytes)).await??;

        let dir = self.upload_dir.join(RECEIPTS_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let original_name = format!("{}.{}", rendered.hash, rendered.extension);
        let optimized_name = format!(
            "{}_{}x{}.jpg",
            rendered.hash, OPTIMIZED_WIDTH, OPTIMIZED_HEIGHT
        );
        tokio::fs::write(dir.join(&original_name), &rendered.original).await?;
        tokio::fs::write(dir.join(&optimized_name), &rendered.optimized).await?;

        tracing::debug!(hash = %rendered.hash, "stored receipt");
        Ok(Receipt {
            original_url: self.public_url(&original_name),
            optimized_url: self.public_url(&optimized_name),
        })
    }

    fn public_url(&self, file_name: &str) -> String {
        format!(
            "{}/uploads/{}/{}",
            self.public_base_url, RECEIPTS_DIR, file_name
        )
    }
}

fn strip_data_url(encoded: &str) -> &str {
    match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    }
}

fn render(original: Vec<u8>) -> Result<Rendered, ReceiptError> {
    let format = image::guess_format(&original)?;
    let extension = match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        _ => return Err(ReceiptError::UnsupportedFormat),
    };

    let decoded = image::load_from_memory_with_format(&original, format)?;
    let resized = decoded
        .resize_to_fill(OPTIMIZED_WIDTH, OPTIMIZED_HEIGHT, FilterType::Lanczos3)
        .to_rgb8();

    let mut optimized = Vec::new();
    JpegEncoder::new_with_quality(&mut optimized, JPEG_QUALITY).encode_image(&resized)?;

    let hash = Sha256::digest(&original)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    Ok(Rendered {
        hash,
        extension,
        original,
        optimized,
    })
}
