//! # Local media store
//!
//! Filesystem implementation of `MediaStorage` with content-addressable
//! storage and directory sharding. Uploads are downscaled and re-encoded
//! as JPEG before they are stored, the same normalization the mobile
//! client applies before upload.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;
use mime::Mime;
use sha2::{Digest, Sha256};
use tokio::fs;

use domains::{CatalogError, MediaStorage, Result};

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
    /// Uploads wider than this are downscaled, aspect preserved.
    max_width: u32,
    jpeg_quality: u8,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        LocalMediaStore {
            root_path: root,
            url_prefix,
            max_width: 1000,
            jpeg_quality: 70,
        }
    }

    pub fn with_limits(mut self, max_width: u32, jpeg_quality: u8) -> Self {
        self.max_width = max_width;
        self.jpeg_quality = jpeg_quality;
        self
    }

    /// Generates a sharded path: "ab/cd/ef...hash.jpg"
    fn sharded_path(&self, hash: &str) -> PathBuf {
        let mut path = self.root_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(format!("{hash}.jpg"));
        path
    }

    fn path_for_uri(&self, uri: &str) -> Result<PathBuf> {
        let rel = uri
            .strip_prefix(&self.url_prefix)
            .ok_or_else(|| CatalogError::not_found("blob", uri))?
            .trim_start_matches('/');
        Ok(self.root_path.join(rel))
    }

    /// Decodes, downscales to the width cap, and re-encodes as JPEG.
    fn normalize(&self, data: &[u8]) -> Result<Vec<u8>> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CatalogError::Internal(e.to_string()))?
            .decode()
            .map_err(|e| {
                CatalogError::validation("images", format!("unreadable image data: {e}"))
            })?;

        let img = if img.width() > self.max_width {
            let scaled_height = ((self.max_width as f64) * (img.height() as f64)
                / (img.width() as f64))
                .round()
                .max(1.0) as u32;
            img.thumbnail(self.max_width, scaled_height)
        } else {
            img
        };

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        img.write_with_encoder(encoder)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        Ok(out)
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStore {
    /// Stores an upload under its SHA-256 hash. Identical images
    /// deduplicate automatically.
    async fn put(&self, data: Bytes, content_type: &Mime) -> Result<String> {
        if content_type.type_() != mime::IMAGE {
            return Err(CatalogError::validation(
                "images",
                format!("unsupported content type {content_type}"),
            ));
        }
        let normalized = self.normalize(&data)?;

        let mut hasher = Sha256::new();
        hasher.update(&normalized);
        let hash = hex::encode(hasher.finalize());

        let target = self.sharded_path(&hash);
        let parent = target
            .parent()
            .ok_or_else(|| CatalogError::Internal("degenerate media path".to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        if fs::metadata(&target).await.is_err() {
            fs::write(&target, &normalized)
                .await
                .map_err(|e| CatalogError::Internal(e.to_string()))?;
            tracing::debug!(%hash, "stored upload");
        }

        Ok(format!(
            "{}/{}/{}/{hash}.jpg",
            self.url_prefix,
            &hash[0..2],
            &hash[2..4]
        ))
    }

    async fn fetch(&self, uri: &str) -> Result<Bytes> {
        let path = self.path_for_uri(uri)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::not_found("blob", uri))
            }
            Err(e) => Err(CatalogError::Internal(e.to_string())),
        }
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.path_for_uri(uri)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use uuid::Uuid;

    fn store() -> LocalMediaStore {
        let root = std::env::temp_dir().join(format!("pt-media-{}", Uuid::now_v7()));
        LocalMediaStore::new(root, "/static/uploads".to_string())
    }

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 180, 40]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn stores_and_fetches_under_stable_uri() {
        let store = store();
        let uri = store.put(png_bytes(64, 48), &mime::IMAGE_PNG).await.unwrap();
        assert!(uri.starts_with("/static/uploads/"));
        assert!(uri.ends_with(".jpg"));

        let bytes = store.fetch(&uri).await.unwrap();
        assert!(!bytes.is_empty());

        // Same pixels, same address.
        let again = store.put(png_bytes(64, 48), &mime::IMAGE_PNG).await.unwrap();
        assert_eq!(uri, again);
    }

    #[tokio::test]
    async fn oversized_uploads_are_downscaled() {
        let store = store();
        let uri = store.put(png_bytes(2000, 500), &mime::IMAGE_PNG).await.unwrap();
        let stored = store.fetch(&uri).await.unwrap();

        let img = ImageReader::new(Cursor::new(stored.as_ref()))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(img.width(), 1000);
        assert_eq!(img.height(), 250);
    }

    #[tokio::test]
    async fn rejects_non_image_payloads() {
        let store = store();
        let err = store
            .put(Bytes::from_static(b"not pixels"), &mime::TEXT_PLAIN)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "images", .. }));

        let err = store
            .put(Bytes::from_static(b"garbage"), &mime::IMAGE_JPEG)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "images", .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store();
        let uri = store.put(png_bytes(10, 10), &mime::IMAGE_PNG).await.unwrap();
        store.delete(&uri).await.unwrap();
        store.delete(&uri).await.unwrap();
        assert!(store.fetch(&uri).await.unwrap_err().is_not_found());
    }
}
