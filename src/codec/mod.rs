//! Image codecs and the transcoder for embedded biometric images.
//!
//! This module provides the `ImageCodec` capability trait and implementations for:
//! - JPEG 2000 (via OpenJPEG, decode only)
//! - JPEG and PNG (via the `image` crate)
//! - WSQ (application-supplied decoder; container sniffing only here)

mod jpeg2000;
mod raster;
pub mod sniff;
mod traits;
pub mod wsq;

pub use jpeg2000::{parse_siz, Jpeg2000Codec, SizSegment};
pub use raster::{JpegCodec, PngCodec};
pub use traits::{CodecInfo, ImageCodec};
pub use wsq::UnavailableWsqCodec;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ImageType, TargetFormat};
use crate::error::{BdirError, Result};
use crate::Raster;

/// Image formats recognised inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageKind {
    /// JPEG 2000 codestream or JP2 container.
    Jpeg2000,
    /// Wavelet Scalar Quantization.
    Wsq,
    /// Baseline JPEG.
    Jpeg,
    /// PNG.
    Png,
}

impl From<TargetFormat> for ImageKind {
    fn from(target: TargetFormat) -> Self {
        match target {
            TargetFormat::Jpeg => ImageKind::Jpeg,
            TargetFormat::Png => ImageKind::Png,
        }
    }
}

impl From<ImageKind> for ImageType {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Jpeg2000 => ImageType::Jpeg2000,
            ImageKind::Wsq => ImageType::Wsq,
            ImageKind::Jpeg => ImageType::Jpeg,
            ImageKind::Png => ImageType::Png,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ImageType::from(*self).fmt(f)
    }
}

/// Decodes embedded images and re-encodes them to JPEG or PNG.
#[derive(Clone)]
pub struct ImageTranscoder {
    jpeg2000: Jpeg2000Codec,
    jpeg: JpegCodec,
    png: PngCodec,
    wsq: Arc<dyn ImageCodec>,
}

impl ImageTranscoder {
    /// Create a transcoder with default JPEG quality and no WSQ decoder.
    pub fn new() -> Self {
        Self {
            jpeg2000: Jpeg2000Codec::new(),
            jpeg: JpegCodec::default(),
            png: PngCodec,
            wsq: Arc::new(UnavailableWsqCodec),
        }
    }

    /// Set the JPEG encoder quality.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg = JpegCodec::new(quality);
        self
    }

    /// Plug in a WSQ decoder.
    pub fn with_wsq_decoder(mut self, decoder: Arc<dyn ImageCodec>) -> Self {
        self.wsq = decoder;
        self
    }

    /// Get the codec responsible for a format.
    pub fn codec(&self, kind: ImageKind) -> &dyn ImageCodec {
        match kind {
            ImageKind::Jpeg2000 => &self.jpeg2000,
            ImageKind::Wsq => self.wsq.as_ref(),
            ImageKind::Jpeg => &self.jpeg,
            ImageKind::Png => &self.png,
        }
    }

    /// The configured WSQ decoder.
    pub fn wsq_decoder(&self) -> &dyn ImageCodec {
        self.wsq.as_ref()
    }

    /// Classify bytes, trying cheap signatures before a WSQ decode.
    pub fn classify(&self, bytes: &[u8]) -> Option<ImageKind> {
        sniff::classify(bytes, self.wsq.as_ref())
    }

    /// Decode bytes of a known format.
    pub fn decode(&self, bytes: &[u8], kind: ImageKind) -> Result<Raster> {
        let raster = self.codec(kind).decode(bytes)?;

        if kind == ImageKind::Wsq && raster.channels != 1 {
            return Err(BdirError::ImageDecode {
                kind,
                cause: format!("WSQ decoder returned {} channels", raster.channels),
            });
        }
        raster.validate().map_err(|e| BdirError::ImageDecode {
            kind,
            cause: e.to_string(),
        })?;

        Ok(raster)
    }

    /// Encode a raster to the target format.
    pub fn encode(&self, raster: &Raster, target: TargetFormat) -> Result<Vec<u8>> {
        self.codec(target.into()).encode(raster)
    }

    /// Decode then encode. Bytes already in the target format are returned unchanged.
    pub fn transcode(&self, bytes: &[u8], from: ImageKind, to: TargetFormat) -> Result<Vec<u8>> {
        if from == ImageKind::from(to) {
            log::debug!("Image already {}, passing through", to);
            return Ok(bytes.to_vec());
        }

        let raster = self.decode(bytes, from)?;
        let encoded = self.encode(&raster, to)?;

        log::debug!(
            "Transcoded {} ({} bytes) to {} ({} bytes)",
            from,
            bytes.len(),
            to,
            encoded.len()
        );
        Ok(encoded)
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ImageTranscoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTranscoder")
            .field("jpeg_quality", &self.jpeg.quality)
            .field("wsq", &self.wsq.info().name)
            .finish()
    }
}
