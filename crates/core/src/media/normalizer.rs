//! Resize-and-re-encode of uploaded images.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use tempfile::NamedTempFile;

use super::codec::{ImageCodec, OutputFormat, RasterCodec, TargetFormat};
use super::error::NormalizeError;

/// Default maximum output width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 1200;

/// Temp file prefix for normalized artifacts.
const ARTIFACT_PREFIX: &str = "procimg_";

/// A freshly written normalized image.
///
/// The artifact is deleted when this value is dropped.
#[derive(Debug)]
pub struct NormalizedImage {
    /// Temp file holding the encoded output.
    pub file: NamedTempFile,
    /// Encoding of the output.
    pub format: OutputFormat,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Whether the image was downsized.
    pub resized: bool,
}

impl NormalizedImage {
    /// Path of the artifact on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Downsizes images wider than a limit and re-encodes them.
///
/// The input file is never modified.
#[derive(Clone)]
pub struct ImageNormalizer {
    codec: Arc<dyn ImageCodec>,
    temp_dir: PathBuf,
}

impl ImageNormalizer {
    /// Create a normalizer with an injected codec.
    #[must_use]
    pub fn new(codec: Arc<dyn ImageCodec>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            codec,
            temp_dir: temp_dir.into(),
        }
    }

    /// Create a normalizer backed by [`RasterCodec`].
    #[must_use]
    pub fn with_raster_codec(temp_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(RasterCodec), temp_dir)
    }

    /// Normalize the image at `input`.
    ///
    /// Blocking; call from `spawn_blocking` in async contexts.
    ///
    /// # Errors
    ///
    /// Every error means "no artifact": the caller should store the original
    /// bytes. [`NormalizeError::NotAnImage`] is the expected outcome for
    /// documents and other non-raster uploads.
    pub fn normalize(
        &self,
        input: &Path,
        max_width: u32,
        target: TargetFormat,
    ) -> Result<NormalizedImage, NormalizeError> {
        let decoded = self.codec.decode(input)?;
        let (src_width, src_height) = (decoded.image.width(), decoded.image.height());
        let (width, height) = target_dimensions(src_width, src_height, max_width);
        let resized = (width, height) != (src_width, src_height);

        let image = if resized {
            decoded
                .image
                .resize_exact(width, height, FilterType::Lanczos3)
        } else {
            decoded.image
        };

        let format = target.resolve(decoded.format);
        let mut file = tempfile::Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .tempfile_in(&self.temp_dir)
            .map_err(NormalizeError::TempFile)?;
        self.codec.encode(&image, format, file.as_file_mut())?;

        Ok(NormalizedImage {
            file,
            format,
            width,
            height,
            resized,
        })
    }
}

/// Output dimensions for a `width` x `height` image capped at `max_width`.
///
/// Wider images are scaled to `max_width` with
/// `height = round(max_width * height / width)`, never below 1. Narrower
/// images, and any image when `max_width` is 0, keep their size.
#[must_use]
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width == 0 || width <= max_width {
        return (width, height);
    }

    let (w, h, max) = (u64::from(width), u64::from(height), u64::from(max_width));
    let scaled = (2 * max * h + w) / (2 * w);
    let scaled = u32::try_from(scaled).unwrap_or(height).max(1);
    (max_width, scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn read_back(path: &Path) -> (image::ImageFormat, u32, u32) {
        let reader = ImageReader::open(path)
            .expect("open")
            .with_guessed_format()
            .expect("guess");
        let format = reader.format().expect("known format");
        let (w, h) = reader.into_dimensions().expect("dimensions");
        (format, w, h)
    }

    fn write_jpeg(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("input.jpg");
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save(&path)
            .expect("save jpeg");
        path
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions(2000, 1000, 1200), (1200, 600));
        assert_eq!(target_dimensions(2000, 1333, 1200), (1200, 800));
        assert_eq!(target_dimensions(1200, 900, 1200), (1200, 900));
        assert_eq!(target_dimensions(640, 480, 1200), (640, 480));
        assert_eq!(target_dimensions(10_000, 1, 1200), (1200, 1));
        assert_eq!(target_dimensions(3000, 2000, 0), (3000, 2000));
    }

    #[test]
    fn test_wide_jpeg_is_resized_to_webp() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_jpeg(dir.path(), 2000, 1000);
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let out = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::default())
            .expect("normalize");

        assert!(out.resized);
        assert_eq!(out.format, OutputFormat::WebP);
        assert_eq!(
            read_back(out.path()),
            (image::ImageFormat::WebP, 1200, 600)
        );
        assert!(input.exists(), "input must be left in place");
    }

    #[test]
    fn test_photo_webp_is_smaller_than_source_jpeg() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("photo.jpg");
        // Gradients plus fine texture, roughly what a camera produces
        let photo = RgbImage::from_fn(2000, 1500, |x, y| {
            let noise = ((x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 23) as u8;
            Rgb([
                (x * 200 / 2000) as u8 + noise,
                (y * 200 / 1500) as u8 + noise,
                ((x + y) * 200 / 3500) as u8 + noise,
            ])
        });
        let mut out = std::fs::File::create(&input).expect("create");
        DynamicImage::ImageRgb8(photo)
            .write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut out, 85,
            ))
            .expect("encode jpeg");
        drop(out);
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let normalized = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::default())
            .expect("normalize");

        let source_len = std::fs::metadata(&input).expect("meta").len();
        let output_len = std::fs::metadata(normalized.path()).expect("meta").len();
        assert_eq!(
            read_back(normalized.path()),
            (image::ImageFormat::WebP, 1200, 900)
        );
        assert!(
            output_len < source_len,
            "webp {output_len} bytes should be smaller than jpeg {source_len} bytes"
        );
    }

    #[test]
    fn test_narrow_image_keeps_dimensions() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_jpeg(dir.path(), 800, 600);
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let out = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::Keep)
            .expect("normalize");

        assert!(!out.resized);
        assert_eq!(out.format, OutputFormat::Jpeg);
        assert_eq!(read_back(out.path()), (image::ImageFormat::Jpeg, 800, 600));
    }

    #[test]
    fn test_png_with_alpha_to_png() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("input.png");
        RgbaImage::from_pixel(1500, 300, Rgba([0, 0, 255, 128]))
            .save(&input)
            .expect("save png");
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let out = normalizer
            .normalize(&input, 1000, TargetFormat::Convert(OutputFormat::Png))
            .expect("normalize");

        assert_eq!(read_back(out.path()), (image::ImageFormat::Png, 1000, 200));
    }

    #[test]
    fn test_non_image_is_not_an_image() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"just some text, definitely not pixels").expect("write");
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let err = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::default())
            .unwrap_err();

        assert!(err.is_not_an_image());
    }

    #[test]
    fn test_truncated_image_is_codec_error_and_leaves_no_artifact() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0").expect("write");
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let err = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::default())
            .unwrap_err();

        assert!(matches!(err, NormalizeError::Codec(_)));
        let leftovers = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(ARTIFACT_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_artifact_removed_on_drop() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_jpeg(dir.path(), 50, 50);
        let normalizer = ImageNormalizer::with_raster_codec(dir.path());

        let out = normalizer
            .normalize(&input, DEFAULT_MAX_WIDTH, TargetFormat::default())
            .expect("normalize");
        let path = out.path().to_path_buf();
        assert!(path.exists());

        drop(out);
        assert!(!path.exists());
    }
}
