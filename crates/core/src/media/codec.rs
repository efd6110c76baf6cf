//! Image codec capability and its `image`-crate implementation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ImageFormat, ImageReader};

use super::error::NormalizeError;

/// JPEG output quality.
pub const JPEG_QUALITY: u8 = 85;

/// Lossy WebP output quality (0-100).
pub const WEBP_QUALITY: f32 = 80.0;

/// Encodings the normalizer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// WebP.
    WebP,
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// GIF (first frame only).
    Gif,
}

impl OutputFormat {
    /// Map a detected source format. `None` for formats we do not handle.
    #[must_use]
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// MIME type.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }
}

/// Requested output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Re-encode in the detected source format.
    Keep,
    /// Convert to the given format.
    Convert(OutputFormat),
}

impl TargetFormat {
    /// Resolve against the source format.
    #[must_use]
    pub fn resolve(self, source: OutputFormat) -> OutputFormat {
        match self {
            Self::Keep => source,
            Self::Convert(format) => format,
        }
    }
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self::Convert(OutputFormat::WebP)
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Convert(OutputFormat::WebP)),
            "jpg" | "jpeg" => Ok(Self::Convert(OutputFormat::Jpeg)),
            "png" => Ok(Self::Convert(OutputFormat::Png)),
            "" | "original" | "keep" => Ok(Self::Keep),
            other => Err(format!("unsupported image format '{other}'")),
        }
    }
}

/// A decoded raster image and the format it was stored in.
#[derive(Debug)]
pub struct DecodedImage {
    /// Pixel data.
    pub image: DynamicImage,
    /// Detected source format.
    pub format: OutputFormat,
}

/// Decode/encode capability used by the normalizer.
///
/// Implementations are blocking and are run on the blocking thread pool.
pub trait ImageCodec: Send + Sync {
    /// Decode the file at `path`.
    ///
    /// # Errors
    ///
    /// [`NormalizeError::NotAnImage`] when the content is not a supported
    /// raster format; other variants for I/O or codec failures.
    fn decode(&self, path: &Path) -> Result<DecodedImage, NormalizeError>;

    /// Encode `image` as `format` into `out`.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        out: &mut File,
    ) -> Result<(), NormalizeError>;
}

/// [`ImageCodec`] backed by the `image` crate.
///
/// Re-encoding never copies EXIF, so any orientation tag is dropped and the
/// stored pixel order is what viewers get.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, path: &Path) -> Result<DecodedImage, NormalizeError> {
        let reader = ImageReader::open(path)
            .and_then(ImageReader::with_guessed_format)
            .map_err(NormalizeError::Unreadable)?;

        let format = reader
            .format()
            .and_then(OutputFormat::from_image_format)
            .ok_or(NormalizeError::NotAnImage)?;

        let image = reader.decode()?;
        Ok(DecodedImage { image, format })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        out: &mut File,
    ) -> Result<(), NormalizeError> {
        let mut writer = BufWriter::new(out);

        match format {
            // libwebp takes 8-bit RGB or RGBA only
            OutputFormat::WebP => {
                let pixels = if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                };
                let encoder = webp::Encoder::from_image(&pixels)
                    .map_err(|e| NormalizeError::WebP(e.to_string()))?;
                writer
                    .write_all(&encoder.encode(WEBP_QUALITY))
                    .map_err(NormalizeError::TempFile)?;
            }
            OutputFormat::Jpeg => {
                let pixels = DynamicImage::ImageRgb8(image.to_rgb8());
                pixels.write_with_encoder(JpegEncoder::new_with_quality(
                    &mut writer,
                    JPEG_QUALITY,
                ))?;
            }
            // Default compression is zlib level 6
            OutputFormat::Png => {
                image.write_with_encoder(PngEncoder::new_with_quality(
                    &mut writer,
                    CompressionType::Default,
                    PngFilter::Adaptive,
                ))?;
            }
            OutputFormat::Gif => {
                DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut writer, ImageFormat::Gif)?;
            }
        }

        writer.flush().map_err(NormalizeError::TempFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_parse() {
        assert_eq!(
            "webp".parse::<TargetFormat>(),
            Ok(TargetFormat::Convert(OutputFormat::WebP))
        );
        assert_eq!(
            "JPG".parse::<TargetFormat>(),
            Ok(TargetFormat::Convert(OutputFormat::Jpeg))
        );
        assert_eq!(
            "jpeg".parse::<TargetFormat>(),
            Ok(TargetFormat::Convert(OutputFormat::Jpeg))
        );
        assert_eq!(
            "png".parse::<TargetFormat>(),
            Ok(TargetFormat::Convert(OutputFormat::Png))
        );
        assert_eq!("original".parse::<TargetFormat>(), Ok(TargetFormat::Keep));
        assert_eq!("".parse::<TargetFormat>(), Ok(TargetFormat::Keep));
        assert!("tiff".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn test_target_format_resolve() {
        assert_eq!(TargetFormat::Keep.resolve(OutputFormat::Png), OutputFormat::Png);
        assert_eq!(
            TargetFormat::Convert(OutputFormat::Jpeg).resolve(OutputFormat::Png),
            OutputFormat::Jpeg
        );
        assert_eq!(TargetFormat::default().resolve(OutputFormat::Gif), OutputFormat::WebP);
    }

    #[test]
    fn test_output_format_mapping() {
        assert_eq!(
            OutputFormat::from_image_format(ImageFormat::Jpeg),
            Some(OutputFormat::Jpeg)
        );
        assert_eq!(OutputFormat::from_image_format(ImageFormat::Bmp), None);
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::WebP.mime_type(), "image/webp");
    }
}
