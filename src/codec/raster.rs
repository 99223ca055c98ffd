//! JPEG and PNG codecs backed by the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};

use crate::config::ImageType;
use crate::error::{BdirError, Result};
use crate::Raster;

use super::traits::{CodecInfo, ImageCodec};
use super::ImageKind;

/// Convert any decoded image to an 8-bit gray or RGB raster.
fn raster_from_dynamic(image: DynamicImage) -> Raster {
    let (width, height) = (image.width(), image.height());
    match image.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            Raster::new(width, height, 1, image.into_luma8().into_raw())
        }
        _ => Raster::new(width, height, 3, image.into_rgb8().into_raw()),
    }
}

fn color_type(raster: &Raster) -> ExtendedColorType {
    if raster.channels == 1 {
        ExtendedColorType::L8
    } else {
        ExtendedColorType::Rgb8
    }
}

fn decode_with(data: &[u8], format: ImageFormat, kind: ImageKind) -> Result<Raster> {
    let image = image::load_from_memory_with_format(data, format).map_err(|e| {
        BdirError::ImageDecode {
            kind,
            cause: e.to_string(),
        }
    })?;
    Ok(raster_from_dynamic(image))
}

fn encode_error(format: ImageType, cause: impl ToString) -> BdirError {
    BdirError::ImageEncode {
        format,
        cause: cause.to_string(),
    }
}

/// Baseline JPEG codec.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    /// Encoder quality (1-100).
    pub quality: u8,
}

impl JpegCodec {
    /// Create a JPEG codec with the given encoder quality.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(90)
    }
}

impl ImageCodec for JpegCodec {
    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "JPEG",
            kind: ImageKind::Jpeg,
            lossless: false,
            can_decode: true,
            can_encode: true,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Raster> {
        decode_with(data, ImageFormat::Jpeg, ImageKind::Jpeg)
    }

    fn encode(&self, raster: &Raster) -> Result<Vec<u8>> {
        raster
            .validate()
            .map_err(|e| encode_error(ImageType::Jpeg, e))?;

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(&raster.pixels, raster.width, raster.height, color_type(raster))
            .map_err(|e| encode_error(ImageType::Jpeg, e))?;

        log::debug!(
            "Encoded {}x{} raster to {} JPEG bytes (quality {})",
            raster.width,
            raster.height,
            out.len(),
            self.quality
        );
        Ok(out)
    }
}

/// PNG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "PNG",
            kind: ImageKind::Png,
            lossless: true,
            can_decode: true,
            can_encode: true,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Raster> {
        decode_with(data, ImageFormat::Png, ImageKind::Png)
    }

    fn encode(&self, raster: &Raster) -> Result<Vec<u8>> {
        raster
            .validate()
            .map_err(|e| encode_error(ImageType::Png, e))?;

        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&raster.pixels, raster.width, raster.height, color_type(raster))
            .map_err(|e| encode_error(ImageType::Png, e))?;

        log::debug!(
            "Encoded {}x{} raster to {} PNG bytes",
            raster.width,
            raster.height,
            out.len()
        );
        Ok(out)
    }
}
