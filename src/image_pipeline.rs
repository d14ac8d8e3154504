//! Cover-art fetching, thumbnailing, and thumbnail-cache helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use log::{debug, info};
use thiserror::Error;
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::backends::{CatalogError, MusicCatalog};
use crate::cache_store::{write_file_atomic, CacheStore, IMAGE_EXTENSIONS};

pub const DEFAULT_THUMBNAIL_MAX_EDGE_PX: u32 = 320;
const THUMBNAIL_JPEG_QUALITY: u8 = 90;
const RESIZED_EXTENSION: &str = "jpg";
const FALLBACK_IMAGE_EXTENSION: &str = "jpg";

/// Why a thumbnail could not be produced. Never fatal for the caller.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("thumbnail cache I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("cover art for {0} could not be decoded")]
    Decode(u64),
    #[error("thumbnail encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Fetches cover art and keeps a bounded-size copy in the thumbnail cache.
pub struct ThumbnailProcessor {
    catalog: Arc<dyn MusicCatalog>,
    store: Arc<CacheStore>,
    max_edge_px: u32,
}

impl ThumbnailProcessor {
    pub fn new(catalog: Arc<dyn MusicCatalog>, store: Arc<CacheStore>, max_edge_px: u32) -> Self {
        Self {
            catalog,
            store,
            max_edge_px: max_edge_px.max(1),
        }
    }

    /// Returns a cached thumbnail for `id`, fetching and downsampling cover art when absent.
    ///
    /// The original download stays on disk next to the resized `<id>.jpg`.
    pub fn cache_thumbnail(&self, id: u64) -> Result<PathBuf, ThumbnailError> {
        if let Some(existing) = self.store.find_thumbnail(id)? {
            match image_dimensions_with_fallback(&existing) {
                Some((width, height)) if width.max(height) <= self.max_edge_px => {
                    return Ok(existing);
                }
                Some(_) => {
                    // An oversized original means the resize step never finished.
                    debug!(
                        "Thumbnail: resizing leftover original {}",
                        existing.display()
                    );
                    let bytes = fs::read(&existing)?;
                    return self.bound_thumbnail(id, existing, &bytes);
                }
                None => {
                    debug!(
                        "Thumbnail: discarding undecodable cached image {}",
                        existing.display()
                    );
                    if let Err(err) = fs::remove_file(&existing) {
                        debug!(
                            "Thumbnail: failed to remove {}: {err}",
                            existing.display()
                        );
                    }
                }
            }
        }

        let cover_url = self.catalog.cover_url(id)?;
        let bytes = self.catalog.fetch_bytes(&cover_url)?;
        let original_path = self
            .store
            .thumbnail_path(id, &image_extension_from_url(&cover_url));
        write_file_atomic(&original_path, &bytes)?;
        self.bound_thumbnail(id, original_path, &bytes)
    }

    /// Returns `original_path` when it fits the bound, else writes and returns `<id>.jpg`.
    fn bound_thumbnail(
        &self,
        id: u64,
        original_path: PathBuf,
        bytes: &[u8],
    ) -> Result<PathBuf, ThumbnailError> {
        let decoded =
            decode_image_from_memory_with_fallback(bytes).ok_or(ThumbnailError::Decode(id))?;
        let (source_width, source_height) = decoded.dimensions();
        if source_width.max(source_height) <= self.max_edge_px {
            return Ok(original_path);
        }

        let (target_width, target_height) =
            fit_to_max_edge(source_width, source_height, self.max_edge_px);
        let resized = decoded.resize_exact(target_width, target_height, FilterType::Lanczos3);
        let target_path = self.store.thumbnail_path(id, RESIZED_EXTENSION);
        write_file_atomic(&target_path, &encode_jpeg(&resized)?)?;
        info!(
            "Thumbnail: cached {}x{} cover for {} at {}",
            target_width,
            target_height,
            id,
            target_path.display()
        );
        Ok(target_path)
    }
}

/// Lower-cased image extension of a cover URL, ignoring any query string.
fn image_extension_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let file_name = without_query.rsplit('/').next().unwrap_or_default();
    file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .filter(|extension| IMAGE_EXTENSIONS.contains(&extension.as_str()))
        .unwrap_or_else(|| FALLBACK_IMAGE_EXTENSION.to_string())
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, THUMBNAIL_JPEG_QUALITY).encode_image(&rgb)?;
    Ok(encoded)
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

fn decode_image_from_memory_with_fallback(bytes: &[u8]) -> Option<DynamicImage> {
    // Cover hosts occasionally serve JPEGs with trailing garbage; retry those non-strictly.
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
}

fn image_dimensions_with_fallback(path: &Path) -> Option<(u32, u32)> {
    image::image_dimensions(path).ok().or_else(|| {
        let bytes = fs::read(path).ok()?;
        decode_image_from_memory_with_fallback(&bytes).map(|decoded| decoded.dimensions())
    })
}

/// Scales so the longer edge equals `max_edge`, rounding the other edge.
/// Square images count as landscape.
fn fit_to_max_edge(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let clamped = max_edge.max(1);
    if width.max(height) <= clamped {
        return (width, height);
    }
    if width >= height {
        let scaled_height =
            ((u64::from(height) * u64::from(clamped)) + (u64::from(width) / 2)) / u64::from(width);
        (clamped, scaled_height.max(1) as u32)
    } else {
        let scaled_width =
            ((u64::from(width) * u64::from(clamped)) + (u64::from(height) / 2)) / u64::from(height);
        (scaled_width.max(1) as u32, clamped)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{
        decode_image_from_memory_with_fallback, fit_to_max_edge, image_extension_from_url,
        ThumbnailError, ThumbnailProcessor, DEFAULT_THUMBNAIL_MAX_EDGE_PX,
    };
    use crate::backends::fake::FakeCatalog;
    use crate::cache_store::tests::temp_cache_paths;
    use crate::cache_store::CacheStore;
    use image::{
        codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb,
        RgbImage, Rgba,
    };
    use std::fs;
    use std::io::Cursor;
    use std::sync::Arc;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let source = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            width,
            height,
            Rgba([8, 16, 24, 255]),
        ));
        let mut cursor = Cursor::new(Vec::<u8>::new());
        source
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("png encoding should succeed");
        cursor.into_inner()
    }

    #[test]
    fn test_fit_to_max_edge_preserves_aspect_ratio() {
        assert_eq!(fit_to_max_edge(640, 480, 320), (320, 240));
        assert_eq!(fit_to_max_edge(480, 640, 320), (240, 320));
        assert_eq!(fit_to_max_edge(320, 320, 320), (320, 320));
        assert_eq!(fit_to_max_edge(1000, 1000, 320), (320, 320));
        assert_eq!(fit_to_max_edge(128, 64, 320), (128, 64));
    }

    #[test]
    fn test_image_extension_from_url() {
        assert_eq!(image_extension_from_url("http://p1/a/109951.PNG"), "png");
        assert_eq!(image_extension_from_url("http://p1/a/cover.jpg?param=300y300"), "jpg");
        assert_eq!(image_extension_from_url("http://p1.host/a/cover"), "jpg");
    }

    #[test]
    fn test_decode_image_from_memory_with_fallback_decodes_jpeg_with_trailing_bytes() {
        let rgb = RgbImage::from_pixel(12, 9, Rgb([90, 140, 210]));
        let mut encoded = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut encoded, 85);
            encoder
                .encode_image(&rgb)
                .expect("jpeg encoding should succeed");
        }
        encoded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let decoded = decode_image_from_memory_with_fallback(&encoded)
            .expect("fallback decoder should decode jpeg bytes");
        assert_eq!(decoded.dimensions(), (12, 9));
        assert!(decode_image_from_memory_with_fallback(b"definitely-not-an-image").is_none());
    }

    fn processor_with_cover(
        name: &str,
        id: u64,
        cover_url: &str,
        bytes: Vec<u8>,
    ) -> (ThumbnailProcessor, Arc<FakeCatalog>, Arc<CacheStore>) {
        let mut catalog = FakeCatalog::default();
        catalog.covers.insert(id, cover_url.to_string());
        catalog.downloads.insert(cover_url.to_string(), bytes);
        let catalog = Arc::new(catalog);
        let store = Arc::new(CacheStore::new(temp_cache_paths(name)));
        let processor = ThumbnailProcessor::new(
            catalog.clone(),
            store.clone(),
            DEFAULT_THUMBNAIL_MAX_EDGE_PX,
        );
        (processor, catalog, store)
    }

    #[test]
    fn test_oversized_landscape_cover_is_resized_to_jpeg_and_original_kept() {
        let (processor, _, store) =
            processor_with_cover("thumb_landscape", 7, "http://p1/7.png", png_bytes(640, 480));

        let path = processor.cache_thumbnail(7).expect("thumbnail should be cached");
        assert_eq!(path, store.thumbnail_path(7, "jpg"));
        assert_eq!(
            image::image_dimensions(&path).expect("thumbnail readable"),
            (320, 240)
        );
        assert!(store.thumbnail_path(7, "png").exists());

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_oversized_portrait_cover_is_resized() {
        let (processor, _, store) =
            processor_with_cover("thumb_portrait", 8, "http://p1/8.png", png_bytes(480, 640));

        let path = processor.cache_thumbnail(8).expect("thumbnail should be cached");
        assert_eq!(
            image::image_dimensions(&path).expect("thumbnail readable"),
            (240, 320)
        );

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_cover_within_bound_is_returned_unchanged() {
        let original = png_bytes(320, 320);
        let (processor, _, store) =
            processor_with_cover("thumb_small", 9, "http://p1/9.png", original.clone());

        let path = processor.cache_thumbnail(9).expect("thumbnail should be cached");
        assert_eq!(path, store.thumbnail_path(9, "png"));
        assert_eq!(fs::read(&path).expect("thumbnail readable"), original);
        assert!(!store.thumbnail_path(9, "jpg").exists());

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_cached_thumbnail_is_reused_without_catalog_calls() {
        let (processor, catalog, store) =
            processor_with_cover("thumb_reuse", 10, "http://p1/10.png", png_bytes(640, 480));

        let first = processor.cache_thumbnail(10).expect("first call caches");
        let second = processor.cache_thumbnail(10).expect("second call reuses");
        assert_eq!(first, second);
        assert_eq!(catalog.count_calls("cover:"), 1);
        assert_eq!(catalog.count_calls("fetch:"), 1);

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_missing_cover_is_a_catalog_error() {
        let catalog = Arc::new(FakeCatalog::default());
        let store = Arc::new(CacheStore::new(temp_cache_paths("thumb_missing")));
        let processor = ThumbnailProcessor::new(catalog, store.clone(), 320);

        let result = processor.cache_thumbnail(11);
        assert!(matches!(result, Err(ThumbnailError::Catalog(_))));

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_undecodable_cover_is_rejected() {
        let (processor, _, store) =
            processor_with_cover("thumb_garbage", 12, "http://p1/12.jpg", b"not an image".to_vec());

        let result = processor.cache_thumbnail(12);
        assert!(matches!(result, Err(ThumbnailError::Decode(12))));

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_leftover_oversized_original_is_resized_on_next_call() {
        let catalog = Arc::new(FakeCatalog::default());
        let store = Arc::new(CacheStore::new(temp_cache_paths("thumb_leftover")));
        fs::write(store.thumbnail_path(13, "png"), png_bytes(640, 480))
            .expect("should seed oversized original");
        let processor = ThumbnailProcessor::new(
            catalog.clone(),
            store.clone(),
            DEFAULT_THUMBNAIL_MAX_EDGE_PX,
        );

        let path = processor.cache_thumbnail(13).expect("thumbnail should be resized");

        assert_eq!(path, store.thumbnail_path(13, "jpg"));
        assert_eq!(
            image::image_dimensions(&path).expect("thumbnail readable"),
            (320, 240)
        );
        assert!(store.thumbnail_path(13, "png").exists());
        assert!(catalog.calls().is_empty());

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }

    #[test]
    fn test_undecodable_cached_thumbnail_is_replaced() {
        let (processor, catalog, store) =
            processor_with_cover("thumb_corrupt", 14, "http://p1/14.png", png_bytes(64, 64));
        fs::write(store.thumbnail_path(14, "jpg"), b"truncated").expect("should seed corrupt file");

        let path = processor.cache_thumbnail(14).expect("thumbnail should be refetched");

        assert_eq!(path, store.thumbnail_path(14, "png"));
        assert!(!store.thumbnail_path(14, "jpg").exists());
        assert_eq!(catalog.count_calls("cover:"), 1);

        fs::remove_dir_all(&store.paths().audio_dir).expect("fixture should be removable");
    }
}
