//! Codec trait definitions.

use crate::config::ImageType;
use crate::error::{BdirError, Result};
use crate::Raster;

use super::ImageKind;

/// Information about a codec.
#[derive(Debug, Clone)]
pub struct CodecInfo {
    /// Human-readable codec name.
    pub name: &'static str,
    /// Image format handled by the codec.
    pub kind: ImageKind,
    /// Whether the format reconstructs pixels exactly.
    pub lossless: bool,
    /// Whether `decode` is backed by a real decoder.
    pub can_decode: bool,
    /// Whether `encode` is backed by a real encoder.
    pub can_encode: bool,
}

/// Image codec capability consumed by the transcoder.
///
/// Implementations only ever see 8-bit rasters: one channel for gray,
/// three interleaved channels for RGB.
pub trait ImageCodec: Send + Sync {
    /// Get codec information.
    fn info(&self) -> CodecInfo;

    /// Decode compressed bytes to a raster.
    fn decode(&self, data: &[u8]) -> Result<Raster>;

    /// Encode a raster to compressed bytes.
    fn encode(&self, _raster: &Raster) -> Result<Vec<u8>> {
        let info = self.info();
        Err(BdirError::ImageEncode {
            format: ImageType::from(info.kind),
            cause: format!("{} is a decode-only codec", info.name),
        })
    }
}
